use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::sync::SessionConfig;

const DEFAULT_DATABASE_URL: &str = "sqlite://./cost_tracker.db";
const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

#[derive(Debug, Parser)]
#[command(name = "cost-tracker", version, about = "Construction project budgets and costs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The terminal client is the default when no subcommand is given.
    pub fn into_command(self) -> Command {
        self.command
            .unwrap_or_else(|| Command::Tui(TuiArgs::parse_from(["tui"])))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the hosted store (auth + REST tables over SQLite)
    Serve(ServeArgs),
    /// Run the terminal client
    Tui(TuiArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    #[arg(long, env = "TRACKER_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    #[arg(
        long,
        env = "TRACKER_SESSION_TTL_HOURS",
        default_value_t = 168,
        help = "Lifetime of an issued access token"
    )]
    pub session_ttl_hours: i64,

    #[arg(
        long,
        env = "TRACKER_TOKEN_TTL_MINUTES",
        default_value_t = 60,
        help = "Lifetime of confirmation and recovery tokens"
    )]
    pub token_ttl_minutes: i64,
}

impl ServeArgs {
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours.max(1))
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.token_ttl_minutes.max(1))
    }
}

#[derive(Debug, Clone, Parser)]
pub struct TuiArgs {
    #[arg(long, env = "TRACKER_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    #[arg(
        long,
        env = "TRACKER_SESSION_FILE",
        default_value = ".cost-tracker-session.json",
        help = "Where the signed-in session is kept between runs"
    )]
    pub session_file: PathBuf,

    #[arg(long, env = "TRACKER_RECOVERY_TIMEOUT_SECS", default_value_t = 10)]
    pub recovery_timeout_secs: u64,

    #[arg(long, env = "TRACKER_FAILSAFE_SECS", default_value_t = 5)]
    pub failsafe_secs: u64,

    #[arg(long, env = "TRACKER_HTTP_TIMEOUT_SECS", default_value_t = 15)]
    pub http_timeout_secs: u64,

    #[arg(long, env = "TRACKER_LOG_FILE", default_value = "cost-tracker.log")]
    pub log_file: PathBuf,
}

impl TuiArgs {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
            failsafe: Duration::from_secs(self.failsafe_secs),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}
