//! Session State
//!
//! Connection and registration state for the current user, plus the single
//! navigation guard every page goes through.
//!
//! ## Architecture
//!
//! - **AuthSnapshot**: session, registration and in-flight flags
//! - **AuthPhase**: ordered phases derived from a snapshot
//! - **Route / guard**: per-page minimum phase and the redirect policy
//! - **SessionManager**: drives transitions and follows wallet events

mod error;
mod manager;
mod phase;

pub use error::{SessionError, SessionResult};
pub use manager::{AuthSnapshot, ProviderSubscription, SessionManager};
pub use phase::{guard, AuthPhase, Navigation, Route};
