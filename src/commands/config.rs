use std::{collections::BTreeMap, path::Path};

use anyhow::Result;
use colored::Colorize;

use crate::{
    cli::ConfigCmd,
    commands::{OutputFmt, emit},
    config::{Config, DB_ENV},
};

/// Config commands work on the file alone; they never open the database.
pub fn handle(cmd: ConfigCmd, config_path: &Path, fmt: OutputFmt) -> Result<()> {
    let mut cfg = Config::load(config_path)?;

    match cmd {
        ConfigCmd::List => {
            let entries: BTreeMap<_, _> = cfg.entries().into_iter().collect();
            emit(fmt, &entries, || {
                println!(
                    "{} {}",
                    "Config:".cyan().bold(),
                    config_path.display().to_string().dimmed()
                );
                for (k, v) in cfg.entries() {
                    println!("  {} = {}", k.green(), v);
                }
                if std::env::var_os(DB_ENV).is_some() {
                    println!(
                        "{} `{}` is set and overrides `database` ({})",
                        "note:".blue().bold(),
                        DB_ENV,
                        cfg.database_path()
                    );
                }
            })?;
        }

        ConfigCmd::Get { key } => {
            let val = cfg.get(&key)?;
            emit(fmt, &val, || println!("{}", val))?;
        }

        ConfigCmd::Set { key, val } => {
            cfg.set(&key, &val)?;
            cfg.save(config_path)?;
            println!("{} set `{}` = `{}`", "ok:".green().bold(), key.green(), cfg.get(&key)?);
        }

        ConfigCmd::Unset { key } => {
            cfg.unset(&key)?;
            cfg.save(config_path)?;
            println!(
                "{} reset `{}` to `{}`",
                "ok:".green().bold(),
                key.green(),
                cfg.get(&key)?
            );
        }
    }

    Ok(())
}
