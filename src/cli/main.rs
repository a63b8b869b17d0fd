//! dieselsync command line
//!
//! A thin host around the sync engine: inspect connectivity and the offline
//! queue, force a drain, or read a dataset the way a field device would.
//! Output is JSON on stdout; logs go to stderr.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use dieselsync::client::sync::network_monitor::{NetworkInfo, ReachabilityCheck, SubscriptionObserver, TcpReachability};
use dieselsync::client::sync::DeleteOptions;
use dieselsync::client::{Config, SyncEngine};
use dieselsync::shared::models::{LogFilter, NewEntry};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dieselsync")]
#[command(about = "Offline-first diesel tracking sync core")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true, default_value_t = false)]
    pretty: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe the backend and print the connection state
    Status,
    /// Print the offline queue
    Queue,
    /// Replay the queue now, ignoring backoff
    Drain,
    /// Move failed changes back into the queue and drain
    Retry,
    /// Drop every pending and failed change
    ClearQueue,
    Machines,
    Logs {
        #[arg(long)]
        machine: Option<String>,
        #[arg(long)]
        since: Option<DateTime<Utc>>,
        #[arg(long)]
        until: Option<DateTime<Utc>>,
        #[arg(long)]
        limit: Option<usize>,
    },
    Inventory,
    Alerts,
    /// Record a diesel fill
    Entry {
        #[arg(long)]
        machine: String,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        end: f64,
        #[arg(long)]
        diesel: f64,
        #[arg(long)]
        remarks: Option<String>,
    },
    /// Set an alert's status (open, acknowledged, resolved, dismissed)
    AlertStatus { id: String, status: String },
    DeleteMachine {
        name: String,
        /// Delete even if log entries reference it
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Re-create the most recently deleted machine with this name
    RestoreMachine { name: String },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .with_writer(std::io::stderr)
        .init();
}

/// One reachability check up front; the backend probe decides the rest
async fn network_observer(config: &Config) -> Arc<SubscriptionObserver> {
    let info = match reqwest::Url::parse(config.endpoint_url())
        .ok()
        .and_then(|url| TcpReachability::for_endpoint(&url, config.app().request_timeout))
    {
        Some(check) => check.check().await,
        None => NetworkInfo::online("unknown"),
    };
    Arc::new(SubscriptionObserver::new(info))
}

fn print<T: Serialize>(value: &T, pretty: bool) -> Result<(), serde_json::Error> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", out);
    Ok(())
}

async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let config = Config::from_env()?;
    let observer = network_observer(&config).await;
    let engine = SyncEngine::open(&config, Some(observer)).await?;
    engine.check_connection().await;

    let pretty = cli.pretty;
    let ok = match cli.command {
        Command::Status => {
            print(&engine.connection_status().await, pretty)?;
            true
        }
        Command::Queue => {
            print(&engine.offline_queue_status().await, pretty)?;
            true
        }
        Command::Drain => {
            let report = engine.drain_queue().await;
            print(&report, pretty)?;
            report.exhausted.is_empty()
        }
        Command::Retry => {
            let report = engine.retry_failed_items().await;
            print(&report, pretty)?;
            report.exhausted.is_empty()
        }
        Command::ClearQueue => {
            let response = engine.clear_offline_queue().await;
            print(&response, pretty)?;
            response.success
        }
        Command::Machines => {
            print(&engine.get_machines().await, pretty)?;
            true
        }
        Command::Logs {
            machine,
            since,
            until,
            limit,
        } => {
            let filter = LogFilter {
                machine_name: machine,
                since,
                until,
                limit,
            };
            print(&engine.get_logs(Some(filter)).await, pretty)?;
            true
        }
        Command::Inventory => {
            print(&engine.get_inventory().await, pretty)?;
            true
        }
        Command::Alerts => {
            print(&engine.get_alerts_data().await, pretty)?;
            true
        }
        Command::Entry {
            machine,
            start,
            end,
            diesel,
            remarks,
        } => {
            let response = engine
                .submit_entry(NewEntry {
                    machine_name: machine,
                    start_reading: start,
                    end_reading: end,
                    diesel_filled: diesel,
                    remarks,
                    ..Default::default()
                })
                .await;
            print(&response, pretty)?;
            response.success
        }
        Command::AlertStatus { id, status } => {
            let response = engine.update_alert_status(&id, &status).await;
            print(&response, pretty)?;
            response.success
        }
        Command::DeleteMachine { name, force } => {
            let response = engine.delete_machine(&name, DeleteOptions { force }).await;
            print(&response, pretty)?;
            response.success
        }
        Command::RestoreMachine { name } => {
            let response = engine.restore_deleted_machine(&name).await;
            print(&response, pretty)?;
            response.success
        }
    };

    engine.shutdown();
    Ok(ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!(error = %e, "dieselsync failed");
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}
