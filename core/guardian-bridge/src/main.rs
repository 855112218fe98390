//! guardian-bridge: command-line host for the focus guardian.
//!
//! Stands in for the page side of the guardian and talks to the daemon over
//! its Unix socket.
//!
//! ## Subcommands
//!
//! - `relay`: Messaging Bridge over stdin, one page event per line
//! - `start` / `end`: call the page API for a session
//! - `status`: print the session summary
//! - `overlay`: print the overlay markup pending for a tab
//! - `health`: check that the daemon is up

mod daemon_client;
mod logging;
mod page;

use clap::{Parser, Subcommand};
use guardian_core::{
    load_config, BridgeOutcome, MessagingBridge, OverlayView, PageApi, StatusSummary,
    StorageConfig,
};

use daemon_client::DaemonRelay;
use page::LoopbackPort;

const DEFAULT_PAGE_ORIGIN: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(name = "guardian-bridge")]
#[command(about = "Focus guardian page bridge")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay page events (JSON lines of {"origin", "data"}) from stdin
    Relay {
        /// Origin of the page the bridge is attached to
        #[arg(long, default_value = DEFAULT_PAGE_ORIGIN)]
        origin: String,
    },

    /// Start a flow session
    Start {
        #[arg(long)]
        task_id: String,

        /// Allowed site; repeat for more. Defaults to the configured list
        #[arg(long = "site", value_name = "HOST")]
        sites: Vec<String>,

        #[arg(long, default_value = DEFAULT_PAGE_ORIGIN)]
        origin: String,
    },

    /// End the active flow session
    End {
        #[arg(long)]
        session_id: Option<String>,

        #[arg(long, default_value = DEFAULT_PAGE_ORIGIN)]
        origin: String,
    },

    /// Show the current session
    Status,

    /// Print the overlay markup queued for a tab, if any
    Overlay {
        #[arg(long)]
        tab_id: u32,
    },

    /// Check whether the daemon is reachable and healthy
    Health,
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Relay { origin } => run_relay(origin),
        Commands::Start {
            task_id,
            sites,
            origin,
        } => run_start(&task_id, sites, origin),
        Commands::End { session_id, origin } => run_end(session_id.as_deref(), origin),
        Commands::Status => run_status(),
        Commands::Overlay { tab_id } => run_overlay(tab_id),
        Commands::Health => run_health(),
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "guardian-bridge failed");
        eprintln!("guardian-bridge: {}", err);
        std::process::exit(1);
    }
}

fn run_relay(origin: String) -> Result<(), String> {
    let mut bridge = MessagingBridge::new(origin, DaemonRelay);
    let stdin = std::io::stdin();
    let stats = page::relay_events(stdin.lock(), &mut bridge)
        .map_err(|err| format!("Failed to read page events: {}", err))?;
    tracing::info!(?stats, "Page event stream closed");
    Ok(())
}

fn run_start(task_id: &str, sites: Vec<String>, origin: String) -> Result<(), String> {
    let sites = if sites.is_empty() {
        let storage = StorageConfig::resolve().map_err(String::from)?;
        load_config(&storage).default_allowed_sites
    } else {
        sites
    };

    let port = LoopbackPort::new(MessagingBridge::new(origin.clone(), DaemonRelay));
    let mut api = PageApi::new(origin, port);
    api.start_session(task_id, &sites);
    expect_relayed(api.port().last_outcome())?;

    println!("Flow session started for {} ({} allowed sites)", task_id, sites.len());
    Ok(())
}

fn run_end(session_id: Option<&str>, origin: String) -> Result<(), String> {
    let port = LoopbackPort::new(MessagingBridge::new(origin.clone(), DaemonRelay));
    let mut api = PageApi::new(origin, port);
    api.end_session(session_id);
    expect_relayed(api.port().last_outcome())?;

    println!("Flow session ended");
    Ok(())
}

fn run_status() -> Result<(), String> {
    let status = daemon_client::session_status().map_err(|err| err.to_string())?;
    print!("{}", StatusSummary::from_status(&status, chrono::Utc::now()));
    Ok(())
}

fn run_overlay(tab_id: u32) -> Result<(), String> {
    let command = daemon_client::take_overlay(tab_id).map_err(|err| err.to_string())?;
    if let Some(command) = command {
        let view = OverlayView {
            hostname: command.hostname,
            task_id: command.task_id,
        };
        println!("{}", view.render_html());
    }
    Ok(())
}

fn run_health() -> Result<(), String> {
    let health = daemon_client::daemon_health();
    println!("{}", describe_health(health));
    match health {
        Some(true) => Ok(()),
        Some(false) => Err("daemon reported an unhealthy status".to_string()),
        None => Err("daemon is not reachable".to_string()),
    }
}

fn describe_health(health: Option<bool>) -> &'static str {
    match health {
        Some(true) => "Daemon healthy",
        Some(false) => "Daemon unhealthy",
        None => "Daemon unavailable",
    }
}

fn expect_relayed(outcome: Option<BridgeOutcome>) -> Result<(), String> {
    match outcome {
        Some(BridgeOutcome::Relayed(_)) => Ok(()),
        Some(BridgeOutcome::RelayFailed(kind)) => {
            Err(format!("{:?} could not be delivered to the daemon", kind))
        }
        other => Err(format!("page message was not relayed ({:?})", other)),
    }
}
