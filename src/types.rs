use once_cell::sync::Lazy;
use std::{collections::HashSet, fmt::Display, str::FromStr};
use strsim::jaro_winkler;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Muscle {
    Biceps,
    Triceps,
    Forearms,
    Chest,
    Shoulders,
    Back,
    Quads,
    Hamstrings,
    Glutes,
    Calves,
    Abs,
}

impl Display for Muscle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Biceps => "biceps",
            Self::Triceps => "triceps",
            Self::Forearms => "forearms",
            Self::Chest => "chest",
            Self::Shoulders => "shoulders",
            Self::Back => "back",
            Self::Quads => "quads",
            Self::Hamstrings => "hamstrings",
            Self::Glutes => "glutes",
            Self::Calves => "calves",
            Self::Abs => "abs",
        };

        write!(f, "{}", s)
    }
}

pub static ALLOWED_MUSCLES: Lazy<HashSet<String>> = Lazy::new(|| {
    Muscle::value_variants()
        .iter()
        .map(ToString::to_string)
        .collect()
});

/// Returns the canonical lowercase muscle name or `None` if not allowed.
pub fn canonical_muscle<S: AsRef<str>>(m: S) -> Option<String> {
    let m = m.as_ref().trim().to_ascii_lowercase();
    ALLOWED_MUSCLES.contains(&m).then_some(m)
}

/// Return the closest allowed muscle for `input` if it scores high enough
/// *and* clearly better than the runner-up.
pub fn best_muscle_suggestion(input: &str) -> Option<&'static str> {
    const MIN_SCORE: f64 = 0.80;
    const GAP: f64 = 0.02;

    let inp = input.trim().to_ascii_lowercase();
    if inp.is_empty() {
        return None;
    }

    let mut scores: Vec<(&'static str, f64)> = ALLOWED_MUSCLES
        .iter()
        .map(|m| (m.as_str(), jaro_winkler(&inp, m)))
        .collect();

    // Highest score first.
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (best_muscle, best_score) = *scores.first()?;
    let second_score = scores.get(1).map(|(_, s)| *s).unwrap_or(0.0);

    if best_score >= MIN_SCORE && best_score - second_score >= GAP {
        Some(best_muscle)
    } else {
        None
    }
}

/// How `session rest` moves the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestDelta {
    /// Bare `+`: one configured step longer.
    StepUp,
    /// Bare `-`: one configured step shorter.
    StepDown,
    /// Signed number of seconds.
    Seconds(i64),
}

impl RestDelta {
    pub fn seconds(self, step: i64) -> i64 {
        match self {
            Self::StepUp => step,
            Self::StepDown => -step,
            Self::Seconds(s) => s,
        }
    }
}

impl FromStr for RestDelta {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" => Ok(Self::StepUp),
            "-" => Ok(Self::StepDown),
            other => other
                .trim_start_matches('+')
                .parse::<i64>()
                .map(Self::Seconds)
                .map_err(|_| format!("expected `+`, `-` or a number of seconds, got `{other}`")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExerciseDef {
    pub name: String,
    pub description: Option<String>,
    pub primary_muscle: String,
}

#[derive(Debug, Deserialize)]
pub struct ExerciseImport {
    pub exercise: Vec<ExerciseDef>,
}

fn default_sets() -> u32 {
    3
}

fn default_rest() -> u32 {
    90
}

/// One `[[exercise]]` entry of a plan file.
#[derive(Debug, Deserialize)]
pub struct PlanExerciseDef {
    pub name: String,
    #[serde(default = "default_sets")]
    pub sets: u32,
    pub reps: u32,
    #[serde(default)]
    pub weight: f64,
    /// Seconds between sets.
    #[serde(default = "default_rest")]
    pub rest: u32,
}

#[derive(Debug, Deserialize)]
pub struct PlanImport {
    pub name: String,
    #[serde(default)]
    pub exercise: Vec<PlanExerciseDef>,
}
