//! Forge CLI
//!
//! Command-line front end for Forge:
//! - Connect a wallet and register with the contract
//! - Manage notes and tasks
//! - Show the kanban board and dashboard
//! - Follow wallet account/chain changes

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use forge::config::{generate_default_config, Config};
use forge::ledger::{
    ContractConnector, GatewayError, LedgerGateway, MemoryLedger, Note, RegisterOutcome,
    RpcConnector, Task, TaskStatus,
};
use forge::session::{AuthSnapshot, Navigation, Route, SessionManager};
use forge::wallet::{JsonRpcProvider, MemoryWallet, WalletConnector, WalletProvider};
use forge::workspace::{KanbanBoard, Loaded, NoteDraft, TaskDraft, Workspace};

#[derive(Parser)]
#[command(name = "forge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Notes and tasks stored on-chain")]
#[command(long_about = "Forge keeps your notes and tasks in a smart contract.\nWrites are signed by your wallet and confirmed on the ledger.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Wallet JSON-RPC endpoint
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Contract address
    #[arg(long, global = true)]
    pub contract: Option<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect the wallet and check registration
    Connect,

    /// Show connection and registration status
    Status,

    /// Register the connected account with the contract
    Register,

    /// Manage notes
    Note {
        #[command(subcommand)]
        action: NoteCommand,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        action: TaskCommand,
    },

    /// Show tasks as a kanban board
    Board,

    /// Show note and task counts
    Dashboard,

    /// Follow wallet account and chain changes until interrupted
    Watch,

    /// Run a walkthrough against an in-memory wallet and ledger
    Demo,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum NoteCommand {
    /// Create a note
    Create {
        title: String,
        #[arg(short, long, default_value = "")]
        content: String,
    },
    /// List notes, optionally filtered
    List {
        /// Case-insensitive search on title and content
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one note
    Show { id: String },
    /// Replace a note's title and content
    Update {
        id: String,
        title: String,
        #[arg(short, long, default_value = "")]
        content: String,
    },
    /// Attach a content identifier (e.g. an IPFS CID)
    Attach { id: String, cid: String },
    /// Delete a note
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// Create a task
    Create {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// todo, in-progress or done
        #[arg(short, long, default_value = "todo")]
        status: TaskStatus,
    },
    /// List tasks, optionally filtered
    List {
        /// Case-insensitive search on title and description
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one task
    Show { id: String },
    /// Replace a task's title, description and status
    Update {
        id: String,
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        #[arg(short, long, default_value = "todo")]
        status: TaskStatus,
    },
    /// Flip a task between open and completed
    Toggle { id: String },
    /// Move a task to another board column
    Move { id: String, status: TaskStatus },
    /// Delete a task
    Delete { id: String },
}

/// Wired-up application
struct App {
    session: Arc<SessionManager>,
    workspace: Workspace,
    json: bool,
}

impl App {
    fn new(
        provider: Arc<dyn WalletProvider>,
        connector: Arc<dyn ContractConnector>,
        contract_address: &str,
        json: bool,
    ) -> Self {
        let gateway = Arc::new(LedgerGateway::new(
            contract_address,
            Some(provider.clone()),
            connector,
        ));
        let session = Arc::new(SessionManager::new(
            WalletConnector::with_provider(provider),
            gateway.clone(),
        ));

        Self {
            session,
            workspace: Workspace::new(gateway),
            json,
        }
    }

    /// Connect and make sure `route` is reachable in the resulting phase
    async fn enter(&self, route: Route) -> anyhow::Result<()> {
        self.session.connect().await;

        match self.session.guard(&route) {
            Navigation::Allow => Ok(()),
            Navigation::Pending => bail!("Wallet connection is still in progress, try again"),
            Navigation::Redirect(_) => {
                let snapshot = self.session.snapshot();
                if let Some(error) = snapshot.session.error {
                    bail!("Wallet not connected: {}", error);
                }
                if !snapshot.session.is_authenticated {
                    bail!("Wallet not connected");
                }
                bail!(
                    "Account {} is {}; run `forge register` first",
                    snapshot.session.address.unwrap_or_default(),
                    snapshot.registration
                )
            }
        }
    }

    fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce()) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text();
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let config = generate_default_config();
        match output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, &config)?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", config),
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default()?,
    };
    if let Some(url) = &cli.rpc_url {
        config.wallet.rpc_url = url.clone();
    }
    if let Some(address) = &cli.contract {
        config.ledger.contract_address = address.clone();
    }

    forge::logging::init(&config.logging)?;
    tracing::debug!(rpc_url = %config.wallet.rpc_url, contract = %config.ledger.contract_address, "Starting");

    if let Commands::Demo = cli.command {
        return run_demo(cli.json).await;
    }

    let provider = Arc::new(
        JsonRpcProvider::new(config.wallet.rpc_config())
            .map_err(|e| anyhow!("Cannot create wallet provider: {}", e))?,
    );
    let connector = Arc::new(RpcConnector::new(config.ledger.confirmation()));
    let app = App::new(
        provider,
        connector,
        &config.ledger.contract_address,
        cli.json,
    );

    run(&app, cli.command).await
}

async fn run(app: &App, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Connect => {
            let snapshot = app.session.connect().await;
            print_status(app, &snapshot)?;
            if let Some(error) = snapshot.session.error {
                bail!(error);
            }
        }

        Commands::Status => {
            let snapshot = app.session.check_connection().await;
            print_status(app, &snapshot)?;
        }

        Commands::Register => {
            app.session.connect().await;
            let outcome = app.session.register_user().await?;
            let value = json!({
                "registered": true,
                "txHash": outcome.receipt().map(|r| r.tx_hash.clone()),
            });
            app.emit(&value, || match &outcome {
                RegisterOutcome::Registered(receipt) => {
                    println!("Registered (tx {})", receipt.tx_hash)
                }
                RegisterOutcome::AlreadyRegistered => println!("Already registered"),
            })?;
        }

        Commands::Note { action } => run_note(app, action).await?,
        Commands::Task { action } => run_task(app, action).await?,

        Commands::Board => {
            app.enter(Route::Kanban).await?;
            let board = app.workspace.board().await?;
            app.emit(&board, || print_board(&board))?;
        }

        Commands::Dashboard => {
            app.enter(Route::Dashboard).await?;
            let summary = app.workspace.dashboard().await?;
            app.emit(&summary, || {
                println!("Notes: {}", summary.note_count);
                println!("Tasks: {}", summary.task_count);
            })?;
        }

        Commands::Watch => {
            let snapshot = app.session.connect().await;
            print_status(app, &snapshot)?;

            let _subscription = app
                .session
                .watch()
                .ok_or_else(|| anyhow!("No wallet provider is installed"))?;
            let mut updates = app.session.updates();
            updates.borrow_and_update();

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = updates.borrow_and_update().clone();
                        print_status(app, &snapshot)?;
                    }
                }
            }
        }

        // Both run before any wallet is set up
        Commands::Demo | Commands::Config { .. } => {}
    }

    Ok(())
}

async fn run_note(app: &App, action: NoteCommand) -> anyhow::Result<()> {
    match action {
        NoteCommand::Create { title, content } => {
            app.enter(Route::NoteCreate).await?;
            let note = app.workspace.create_note(&NoteDraft::new(title, content)).await?;
            app.emit(&note, || println!("Created note {}", note.id))?;
        }
        NoteCommand::List { search } => {
            app.enter(Route::Notes).await?;
            let notes = app
                .workspace
                .search_notes(search.as_deref().unwrap_or_default())
                .await?;
            app.emit(&notes, || {
                if notes.is_empty() {
                    println!("No notes found.");
                }
                for note in &notes {
                    println!("{:<38} {}", note.id, note.title);
                }
            })?;
        }
        NoteCommand::Show { id } => {
            app.enter(Route::NoteView(id.clone())).await?;
            match app.workspace.load_note(&id).await? {
                Loaded::Found(note) => app.emit(&note, || print_note(&note))?,
                Loaded::Redirect(route) => bail!("Note {} not found (see {})", id, route),
            }
        }
        NoteCommand::Update { id, title, content } => {
            app.enter(Route::NoteEdit(id.clone())).await?;
            let note = app
                .workspace
                .update_note(&id, &NoteDraft::new(title, content))
                .await?;
            app.emit(&note, || println!("Updated note {}", note.id))?;
        }
        NoteCommand::Attach { id, cid } => {
            app.enter(Route::NoteView(id.clone())).await?;
            let note = app.workspace.attach_to_note(&id, &cid).await?;
            app.emit(&note, || {
                println!("Attached {} to note {} ({} attachments)", cid, note.id, note.attachments.len())
            })?;
        }
        NoteCommand::Delete { id } => {
            app.enter(Route::Notes).await?;
            let receipt = app.workspace.delete_note(&id).await?;
            app.emit(&receipt, || println!("Deleted note {}", id))?;
        }
    }
    Ok(())
}

async fn run_task(app: &App, action: TaskCommand) -> anyhow::Result<()> {
    match action {
        TaskCommand::Create {
            title,
            description,
            status,
        } => {
            app.enter(Route::TaskCreate).await?;
            let draft = TaskDraft::new(title, description).with_status(status);
            let task = app.workspace.create_task(&draft).await?;
            app.emit(&task, || println!("Created task {}", task.id))?;
        }
        TaskCommand::List { search } => {
            app.enter(Route::Tasks).await?;
            let tasks = app
                .workspace
                .search_tasks(search.as_deref().unwrap_or_default())
                .await?;
            app.emit(&tasks, || {
                if tasks.is_empty() {
                    println!("No tasks found.");
                }
                for task in &tasks {
                    print_task_line(task);
                }
            })?;
        }
        TaskCommand::Show { id } => {
            app.enter(Route::Tasks).await?;
            match app.workspace.load_task(&id).await? {
                Loaded::Found(task) => app.emit(&task, || print_task(&task))?,
                Loaded::Redirect(route) => bail!("Task {} not found (see {})", id, route),
            }
        }
        TaskCommand::Update {
            id,
            title,
            description,
            status,
        } => {
            app.enter(Route::Tasks).await?;
            let draft = TaskDraft::new(title, description).with_status(status);
            let task = app.workspace.update_task(&id, &draft).await?;
            app.emit(&task, || println!("Updated task {}", task.id))?;
        }
        TaskCommand::Toggle { id } => {
            app.enter(Route::Tasks).await?;
            let task = app.workspace.toggle_task(&id).await?;
            app.emit(&task, || print_task_line(&task))?;
        }
        TaskCommand::Move { id, status } => {
            app.enter(Route::Kanban).await?;
            let mut board = app.workspace.board().await?;
            let task = board.move_task(&app.workspace, &id, status).await?;
            app.emit(&task, || print_task_line(&task))?;
        }
        TaskCommand::Delete { id } => {
            app.enter(Route::Tasks).await?;
            let receipt = app.workspace.delete_task(&id).await?;
            app.emit(&receipt, || println!("Deleted task {}", id))?;
        }
    }
    Ok(())
}

/// Walk through connect, register and a note's lifecycle on in-memory parts
async fn run_demo(json_output: bool) -> anyhow::Result<()> {
    let account = "0xA1A1a1A1a1a1a1a1a1A1a1a1a1a1A1a1A1a1a1A1";
    let wallet: Arc<dyn WalletProvider> = Arc::new(MemoryWallet::with_account(account, 1337));
    let app = App::new(
        wallet,
        Arc::new(MemoryLedger::new()),
        forge::config::DEFAULT_CONTRACT_ADDRESS,
        json_output,
    );
    let gateway = app.workspace.gateway().clone();

    let snapshot = app.session.connect().await;
    println!("connect        -> {} ({})", account, snapshot.phase());

    let outcome = app.session.register_user().await?;
    println!("register       -> {:?}", outcome.receipt().map(|r| &r.tx_hash));
    let again = app.session.register_user().await?;
    println!("register again -> {:?}", again);

    println!("getNoteIds     -> {:?}", gateway.get_note_ids().await?);

    gateway.create_note("n1", "Hello", "World").await?;
    let note = gateway.get_note("n1").await?;
    println!("getNote(n1)    -> {}", serde_json::to_string(&note)?);

    gateway.delete_note("n1").await?;
    match gateway.get_note("n1").await {
        Err(e @ GatewayError::NotFound { .. }) => println!("getNote(n1)    -> {}", e),
        Ok(_) => bail!("note n1 survived deletion"),
        Err(e) => return Err(e).context("unexpected failure after delete"),
    }

    let task = app
        .workspace
        .create_task(&TaskDraft::new("Try the board", "move me along"))
        .await?;
    let mut board = app.workspace.board().await?;
    board
        .move_task(&app.workspace, &task.id, TaskStatus::InProgress)
        .await?;
    print_board(&board);

    let snapshot = app.session.disconnect().await;
    println!("disconnect     -> {}", snapshot.phase());
    Ok(())
}

fn print_status(app: &App, snapshot: &AuthSnapshot) -> anyhow::Result<()> {
    let value = json!({
        "session": snapshot.session,
        "registration": snapshot.registration,
        "phase": snapshot.phase(),
    });
    app.emit(&value, || {
        println!("Phase:        {}", snapshot.phase());
        match &snapshot.session.address {
            Some(address) => println!("Account:      {}", address),
            None => println!("Account:      (not connected)"),
        }
        if let Some(chain_id) = &snapshot.session.chain_id {
            println!("Chain:        {}", chain_id);
        }
        println!("Registration: {}", snapshot.registration);
        if let Some(error) = &snapshot.session.error {
            println!("Error:        {}", error);
        }
    })
}

fn format_time(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn print_note(note: &Note) {
    println!("{}", note.title);
    println!("{}", "-".repeat(note.title.len().max(8)));
    println!("{}", note.content);
    println!();
    for cid in &note.attachments {
        println!("Attachment: {}", cid);
    }
    println!("Created: {}", format_time(note.created_at));
    println!("Updated: {}", format_time(note.updated_at));
}

fn print_task_line(task: &Task) {
    let mark = if task.completed { "x" } else { " " };
    println!("[{}] {:<38} {:<12} {}", mark, task.id, task.status, task.title);
}

fn print_task(task: &Task) {
    print_task_line(task);
    if !task.description.is_empty() {
        println!("    {}", task.description);
    }
    println!("    Created: {}", format_time(task.created_at));
    println!("    Updated: {}", format_time(task.updated_at));
}

fn print_board(board: &KanbanBoard) {
    for (status, tasks) in board.columns() {
        println!("{} ({})", status, tasks.len());
        for task in tasks {
            println!("  - {} [{}]", task.title, task.id);
        }
    }
}
