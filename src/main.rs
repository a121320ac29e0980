use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use minimarket_guard::config::GuardConfig;
use minimarket_guard::{ApiGuard, BreakerEvent};

/// Check shared rate limits and record circuit breaker events.
#[derive(Debug, Parser)]
#[command(name = "minimarket-guard", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one rate limit check and print the decision and headers
    Check {
        /// Authenticated user id
        #[arg(long)]
        user: Option<String>,

        /// Client IP address
        #[arg(long)]
        ip: Option<String>,

        /// Number of consecutive checks to run
        #[arg(long, default_value_t = 1)]
        repeat: u32,
    },
    /// Record a call outcome for a dependency and print the breaker status
    Record {
        /// Dependency key
        #[arg(long)]
        key: String,

        #[arg(long, value_enum)]
        event: EventArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EventArg {
    Success,
    Failure,
}

impl From<EventArg> for BreakerEvent {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Success => BreakerEvent::Success,
            EventArg::Failure => BreakerEvent::Failure,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = GuardConfig::load(cli.config.as_deref())?;
    let guard = ApiGuard::from_config(&config)?;

    match cli.command {
        Command::Check { user, ip, repeat } => {
            for _ in 0..repeat {
                let admission = guard.check(user.as_deref(), ip.as_deref()).await;
                println!("{}", serde_json::to_string(&admission)?);
            }
        }
        Command::Record { key, event } => {
            let status = guard.record(&key, event.into()).await;
            println!("{}", serde_json::to_string(&status)?);
        }
    }

    Ok(())
}
