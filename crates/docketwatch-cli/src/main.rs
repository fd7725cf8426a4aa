mod api;
mod config;
mod wiring;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use docketwatch_core::{Clock, FilingType, Matter, SystemClock};
use tracing_subscriber::EnvFilter;

use crate::api::ApiContext;
use crate::config::Config;
use crate::wiring::App;

#[derive(Parser)]
#[command(name = "docketwatch", version, about = "Patent and trademark docket watcher")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, env = "DOCKETWATCH_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP trigger surface.
    Serve {
        /// Listen address, overriding `server.listen`.
        #[arg(long)]
        listen: Option<String>,
        /// Start the scheduler regardless of `schedule.autostart`.
        #[arg(long)]
        scheduler: bool,
    },
    /// Run one sweep over every registered matter.
    Sweep,
    /// Process specific matters by CRM id or application number.
    Process {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Manage the matter registry.
    Matters {
        #[command(subcommand)]
        action: MattersAction,
    },
    /// Inspect the processed state.
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum MattersAction {
    /// List registered matters.
    List,
    /// Register a matter.
    Add {
        crm_id: String,
        application_number: String,
        /// `patent` or `trademark`.
        #[arg(long = "type")]
        filing_type: FilingType,
        #[arg(long)]
        title: Option<String>,
    },
    /// Remove a matter by CRM id or application number.
    Remove { id: String },
}

#[derive(Subcommand)]
enum StateAction {
    /// Print the last processed date per application number.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    init_tracing(&config);
    tracing::debug!("docketwatch v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve { listen, scheduler } => serve(&config, listen, scheduler).await,
        Command::Sweep => {
            let app = App::build(&config)?;
            let report = app.orchestrator.sweep().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Process { ids } => {
            let app = App::build(&config)?;
            let report = app.orchestrator.process_targeted(&ids).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.success {
                Ok(())
            } else {
                anyhow::bail!("{}", report.message)
            }
        }
        Command::Matters { action } => matters(&config, action),
        Command::State {
            action: StateAction::Show,
        } => {
            let state = wiring::state_store(&config).load();
            if state.is_empty() {
                println!("No processed documents recorded.");
            }
            for (application, date) in state.iter() {
                println!("{application:<16} {date}");
            }
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    std::panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "panic");
    }));
}

async fn serve(config: &Config, listen: Option<String>, start_scheduler: bool) -> anyhow::Result<()> {
    let app = App::build(config)?;
    if start_scheduler || config.schedule.autostart {
        app.scheduler.start();
    }

    let ctx = ApiContext::new(app.clone(), config.server.api_key.clone());
    let listen = listen.unwrap_or_else(|| config.server.listen.clone());
    let server = api::start_server(&listen, api::router(ctx)).await?;
    tracing::info!(addr = %server.addr(), "docketwatch serving");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    tracing::info!("shutting down");
    app.scheduler.stop();
    server.shutdown().await;
    Ok(())
}

fn matters(config: &Config, action: MattersAction) -> anyhow::Result<()> {
    let registry = wiring::registry(config);
    match action {
        MattersAction::List => {
            let matters = registry.list()?;
            if matters.is_empty() {
                println!("No matters registered.");
            }
            for m in matters {
                println!(
                    "{:<14} {:<10} {:<14} {:<12} {}",
                    m.crm_id,
                    m.filing_type.as_str(),
                    m.application_number,
                    m.status,
                    m.title.as_deref().unwrap_or("")
                );
            }
        }
        MattersAction::Add {
            crm_id,
            application_number,
            filing_type,
            title,
        } => {
            let mut matter = Matter::new(crm_id, &application_number, filing_type, SystemClock.now());
            if let Some(title) = title {
                matter = matter.with_title(title);
            }
            let matter = registry.register(matter)?;
            println!("Registered {} ({})", matter.crm_id, matter.application_number);
        }
        MattersAction::Remove { id } => {
            let matter = registry.remove(&id)?;
            println!("Removed {} ({})", matter.crm_id, matter.application_number);
        }
    }
    Ok(())
}
