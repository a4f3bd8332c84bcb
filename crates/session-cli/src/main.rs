mod scenario;
mod telemetry;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use session_store::{is_valid_session_id, SessionStore, StoreConfig};

#[derive(Parser)]
#[command(name = "session-cli")]
#[command(about = "Exercise and inspect the in-process session store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Idle time after which sessions expire
    #[arg(long, env = "SESSION__MAX_AGE_SECS")]
    max_age_secs: Option<u64>,

    /// Sweep expired sessions on every n-th lookup
    #[arg(long, env = "SESSION__SWEEP_INTERVAL")]
    sweep_interval: Option<u64>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a session ID is well-formed
    CheckId { id: String },
    /// Walk through create, select, counter update and drop
    Demo,
    /// Hammer the store from concurrent workers and print stats
    Load {
        #[arg(long, default_value_t = 10_000)]
        sessions: usize,
        #[arg(long, default_value_t = 8)]
        workers: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init_telemetry(cli.json);

    let mut cfg = StoreConfig::load()?;
    if let Some(secs) = cli.max_age_secs {
        cfg = cfg.with_max_age_secs(secs);
    }
    if let Some(interval) = cli.sweep_interval {
        cfg = cfg.with_sweep_interval(interval);
    }
    cfg.validate()?;

    match cli.command {
        Commands::CheckId { id } => {
            if is_valid_session_id(&id) {
                println!("valid");
            } else {
                println!("invalid");
                std::process::exit(1);
            }
        }
        Commands::Demo => {
            let store = SessionStore::new(cfg);
            let report = scenario::run_demo(&store).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Load { sessions, workers } => {
            let store = Arc::new(SessionStore::new(cfg));
            let report = scenario::run_load(store, sessions, workers).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
