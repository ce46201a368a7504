//! Authorization phases and the navigation guard
//!
//! Views declare the minimum [`AuthPhase`] they need; [`guard`] is the one
//! place that decides whether a navigation proceeds.

use serde::Serialize;
use std::fmt;

/// Where a user is in the connect-and-register flow, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthPhase {
    Anonymous,
    /// Wallet or registration check in flight
    Connecting,
    ConnectedUnregistered,
    Registering,
    Active,
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthPhase::Anonymous => "anonymous",
            AuthPhase::Connecting => "connecting",
            AuthPhase::ConnectedUnregistered => "connected (unregistered)",
            AuthPhase::Registering => "registering",
            AuthPhase::Active => "active",
        };
        f.write_str(name)
    }
}

/// Application pages
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Dashboard,
    Notes,
    NoteCreate,
    NoteView(String),
    NoteEdit(String),
    Tasks,
    TaskCreate,
    Kanban,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Notes => "/dashboard/notes".to_string(),
            Route::NoteCreate => "/dashboard/notes/create".to_string(),
            Route::NoteView(id) => format!("/dashboard/notes/{}", id),
            Route::NoteEdit(id) => format!("/dashboard/notes/edit/{}", id),
            Route::Tasks => "/dashboard/tasks".to_string(),
            Route::TaskCreate => "/dashboard/tasks/new".to_string(),
            Route::Kanban => "/dashboard/kanban".to_string(),
        }
    }

    /// Parse an absolute path; trailing slashes are ignored
    pub fn parse(path: &str) -> Option<Route> {
        if !path.starts_with('/') {
            return None;
        }
        let trimmed = path.trim_end_matches('/');
        let segments: Vec<&str> = trimmed.split('/').skip(1).collect();

        match segments.as_slice() {
            [] => Some(Route::Home),
            ["dashboard"] => Some(Route::Dashboard),
            ["dashboard", "notes"] => Some(Route::Notes),
            ["dashboard", "notes", "create"] => Some(Route::NoteCreate),
            ["dashboard", "notes", "edit", id] if !id.is_empty() => {
                Some(Route::NoteEdit(id.to_string()))
            }
            ["dashboard", "notes", id] if !id.is_empty() => Some(Route::NoteView(id.to_string())),
            ["dashboard", "tasks"] => Some(Route::Tasks),
            ["dashboard", "tasks", "new"] => Some(Route::TaskCreate),
            ["dashboard", "kanban"] => Some(Route::Kanban),
            _ => None,
        }
    }

    /// Minimum phase needed to view the page
    pub fn required_phase(&self) -> AuthPhase {
        match self {
            Route::Home => AuthPhase::Anonymous,
            _ => AuthPhase::Active,
        }
    }

    /// Listing page to fall back to when this page's entity is missing
    pub fn fallback(&self) -> Route {
        match self {
            Route::NoteCreate | Route::NoteView(_) | Route::NoteEdit(_) => Route::Notes,
            Route::TaskCreate => Route::Tasks,
            Route::Notes | Route::Tasks | Route::Kanban => Route::Dashboard,
            Route::Dashboard | Route::Home => Route::Home,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Outcome of a navigation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Allow,
    /// The phase is still settling; show a loading state
    Pending,
    Redirect(Route),
}

/// Decide whether `phase` may view `route`
pub fn guard(route: &Route, phase: AuthPhase) -> Navigation {
    if phase == AuthPhase::Connecting {
        return Navigation::Pending;
    }

    match route {
        Route::Home if phase == AuthPhase::Active => Navigation::Redirect(Route::Dashboard),
        _ if phase >= route.required_phase() => Navigation::Allow,
        _ => Navigation::Redirect(Route::Home),
    }
}
