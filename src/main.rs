// src/main.rs
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

use construction_cost_tracker::config::{Cli, Command};
use construction_cost_tracker::database::db::{connection, migrate};
use construction_cost_tracker::{backend, cli, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    match Cli::parse().into_command() {
        Command::Serve(args) => {
            let _guard = logging::init_stderr()?;
            info!(database_url = %args.database_url, "starting hosted store");

            let pool = connection::get_db_pool(&args.database_url).await?;
            migrate::run_migrations(&pool).await?;
            backend::run_server(pool, &args).await?;
        }
        Command::Tui(args) => {
            let _guard = logging::init_file(&args.log_file)?;
            cli::run(&args).await?;
        }
    }
    Ok(())
}
