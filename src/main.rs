use std::{process::ExitCode, sync::Arc};

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::debug;

use setwise::{
    cli::{Cli, Commands},
    commands::{self, App, OutputFmt},
    config::Config,
    db,
    engine::{Collaborators, Engine},
    logging,
    store::SqliteStore,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = Config::default_path()?;
    let config = Config::load(&config_path)?;
    logging::init(&config.log_level)?;

    let fmt = OutputFmt::from_flag(cli.json);
    let user = cli.user;

    match cli.cmd {
        Commands::Config(cmd) => commands::config::handle(cmd, &config_path, fmt),
        Commands::Session(cmd) => {
            let app = open_app(config, user, fmt).await?;
            commands::session::handle(cmd, &app).await
        }
        Commands::Plan(cmd) => {
            let app = open_app(config, user, fmt).await?;
            commands::plan::handle(cmd, &app).await
        }
        Commands::Exercise(cmd) => {
            let app = open_app(config, user, fmt).await?;
            commands::exercise::handle(cmd, &app).await
        }
        Commands::Records { exercise } => {
            let app = open_app(config, user, fmt).await?;
            commands::records::handle(exercise, &app).await
        }
    }
}

async fn open_app(config: Config, user: Option<String>, fmt: OutputFmt) -> Result<App> {
    let db_path = config.database_path();
    debug!(path = %db_path, "opening database");
    let pool = db::open(&db_path).await?;

    let engine = Engine::new(Collaborators::shared(Arc::new(SqliteStore::new(pool))))
        .with_settings(config.engine_settings());

    Ok(App {
        engine,
        user: user.unwrap_or_else(|| config.user.clone()),
        config,
        fmt,
    })
}
