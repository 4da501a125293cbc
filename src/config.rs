//! User configuration, stored as TOML under the platform config directory.

use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

use crate::engine::EngineSettings;

/// Overrides `database` when set.
pub const DB_ENV: &str = "SETWISE_DB";

pub const KEYS: &[&str] = &[
    "database",
    "user",
    "log_level",
    "rest_step_seconds",
    "safety_cutoff_minutes",
    "tick_millis",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: String,
    pub user: String,
    pub log_level: String,
    /// Seconds added or removed by a bare `session rest +` / `-`.
    pub rest_step_seconds: u32,
    pub safety_cutoff_minutes: u32,
    pub tick_millis: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: "./setwise.db".to_string(),
            user: "local".to_string(),
            log_level: "info".to_string(),
            rest_step_seconds: 15,
            safety_cutoff_minutes: 180,
            tick_millis: 1000,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join("setwise").join("config.toml"))
            .context("Could not determine config directory")
    }

    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config `{}`", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config `{}`", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create `{}`", dir.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, raw).with_context(|| format!("Failed to write config `{}`", path.display()))
    }

    pub fn get(&self, key: &str) -> Result<String> {
        let val = match check_key(key)? {
            "database" => self.database.clone(),
            "user" => self.user.clone(),
            "log_level" => self.log_level.clone(),
            "rest_step_seconds" => self.rest_step_seconds.to_string(),
            "safety_cutoff_minutes" => self.safety_cutoff_minutes.to_string(),
            _ => self.tick_millis.to_string(),
        };
        Ok(val)
    }

    pub fn set(&mut self, key: &str, val: &str) -> Result<()> {
        match check_key(key)? {
            "database" => self.database = non_empty(key, val)?,
            "user" => self.user = non_empty(key, val)?,
            "log_level" => self.log_level = non_empty(key, val)?,
            "rest_step_seconds" => self.rest_step_seconds = positive(key, val)?,
            "safety_cutoff_minutes" => self.safety_cutoff_minutes = positive(key, val)?,
            _ => self.tick_millis = positive(key, val)?,
        }
        Ok(())
    }

    /// Restores the default for `key`.
    pub fn unset(&mut self, key: &str) -> Result<()> {
        let defaults = Self::default();
        let val = defaults.get(key)?;
        self.set(key, &val)
    }

    pub fn entries(&self) -> Vec<(&'static str, String)> {
        KEYS.iter()
            .filter_map(|k| self.get(k).ok().map(|v| (*k, v)))
            .collect()
    }

    pub fn database_path(&self) -> String {
        env::var(DB_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| self.database.clone())
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            tick_period: Duration::from_millis(self.tick_millis.max(1)),
            safety_cutoff: Duration::from_secs(u64::from(self.safety_cutoff_minutes) * 60),
        }
    }
}

fn check_key(key: &str) -> Result<&'static str> {
    if let Some(k) = KEYS.iter().find(|k| **k == key) {
        return Ok(*k);
    }

    let hint = KEYS
        .iter()
        .map(|k| (*k, jaro_winkler(key, k)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .filter(|(_, score)| *score >= 0.85)
        .map(|(k, _)| format!(" (did you mean `{k}`?)"))
        .unwrap_or_default();
    bail!("unknown config key `{key}`{hint}")
}

fn non_empty(key: &str, val: &str) -> Result<String> {
    let val = val.trim();
    if val.is_empty() {
        bail!("`{key}` cannot be empty");
    }
    Ok(val.to_string())
}

fn positive<T>(key: &str, val: &str) -> Result<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    match val.trim().parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => bail!("`{key}` must be a positive whole number, got `{val}`"),
    }
}
