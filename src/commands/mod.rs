pub mod config;
pub mod exercise;
pub mod plan;
pub mod records;
pub mod session;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use crate::{config::Config, engine::Engine, models::Plan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFmt {
    Human,
    Json,
}

impl OutputFmt {
    pub fn from_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Human }
    }
}

/// Prints `value` as JSON, or runs `human` for the colorful rendering.
pub fn emit<T, F>(fmt: OutputFmt, value: &T, human: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce(),
{
    match fmt {
        OutputFmt::Json => {
            let out = serde_json::to_string_pretty(value).context("Failed to encode JSON")?;
            println!("{out}");
        }
        OutputFmt::Human => human(),
    }
    Ok(())
}

/// Display width of `s` once ANSI color escapes are stripped.
pub fn plain_len(s: &str) -> usize {
    let mut n = 0;
    let mut esc = false;
    for c in s.chars() {
        match (esc, c) {
            (true, 'm') => esc = false,
            (true, _) => {}
            (false, '\x1b') => esc = true,
            (false, _) => n += 1,
        }
    }
    n
}

/// Prints rows of `(left, right)` with the right column aligned.
pub fn print_columns(rows: Vec<(String, String)>) {
    let pad_plain = rows.iter().map(|(l, _)| plain_len(l)).max().unwrap_or(0);
    for (l, r) in rows {
        if r.is_empty() {
            println!("{l}");
        } else {
            let pad = pad_plain + (l.chars().count() - plain_len(&l));
            println!("{:<pad$} {} {}", l, "|".blue(), r, pad = pad);
        }
    }
}

/// Everything a command handler needs.
pub struct App {
    pub engine: Engine,
    pub config: Config,
    pub user: String,
    pub fmt: OutputFmt,
}

impl App {
    /// Resolves a plan by its 1-based index in `plan list` or by exact name.
    pub async fn resolve_plan(&self, arg: &str) -> Result<Option<Plan>> {
        if let Ok(idx) = arg.parse::<usize>() {
            let plans = self.engine.plans().list().await?;
            return Ok(idx.checked_sub(1).and_then(|i| plans.into_iter().nth(i)));
        }
        Ok(self.engine.plans().find_by_name(arg).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_len_ignores_color_codes() {
        colored::control::set_override(true);
        let s = format!("{} set", "Bench".bold().yellow());
        assert_eq!(plain_len(&s), "Bench set".len());
        colored::control::unset_override();
    }
}
