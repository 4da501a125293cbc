use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::Type;

use crate::utils::epley_1rm;

/// Lifecycle status of a workout session.
/// `Completed` and `Abandoned` are terminal; everything else is "active".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Paused,
    Resting,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }

    /// Paused and resting both hold `pause_start_time` open.
    pub fn holds_pause(self) -> bool {
        matches!(self, Self::Paused | Self::Resting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Paused => "PAUSED",
            Self::Resting => "RESTING",
            Self::Completed => "COMPLETED",
            Self::Abandoned => "ABANDONED",
        }
    }
}

impl Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InProgress => "in progress",
            Self::Paused => "paused",
            Self::Resting => "resting",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        };

        write!(f, "{}", s)
    }
}

/// Target for one set, copied from the plan when the session starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannedSet {
    pub set_number: u32,
    pub target_weight: f64,
    pub target_reps: u32,
}

/// Recorded outcome of one set attempt.
/// Skipped sets carry zero actual values and never count towards volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedSet {
    pub set_number: u32,
    pub planned_weight: f64,
    pub planned_reps: u32,
    pub actual_weight: f64,
    pub actual_reps: u32,
    pub is_completed: bool,
    pub is_skipped: bool,
    pub completed_at: DateTime<Utc>,
}

impl ExecutedSet {
    pub fn completed(planned: &PlannedSet, weight: f64, reps: u32, at: DateTime<Utc>) -> Self {
        Self {
            set_number: planned.set_number,
            planned_weight: planned.target_weight,
            planned_reps: planned.target_reps,
            actual_weight: weight,
            actual_reps: reps,
            is_completed: true,
            is_skipped: false,
            completed_at: at,
        }
    }

    pub fn skipped(planned: &PlannedSet, at: DateTime<Utc>) -> Self {
        Self {
            set_number: planned.set_number,
            planned_weight: planned.target_weight,
            planned_reps: planned.target_reps,
            actual_weight: 0.0,
            actual_reps: 0,
            is_completed: false,
            is_skipped: true,
            completed_at: at,
        }
    }

    pub fn volume(&self) -> f64 {
        if self.is_completed {
            self.actual_weight * f64::from(self.actual_reps)
        } else {
            0.0
        }
    }
}

/// One exercise slot of a running session: the plan's targets plus
/// whatever has been executed so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedExercise {
    pub exercise_id: String,
    pub name: String,
    pub order_index: u32,
    pub planned_sets: Vec<PlannedSet>,
    pub executed_sets: Vec<ExecutedSet>,
    pub rest_between_sets: u32,
}

impl ExecutedExercise {
    pub fn executed(&self, set_number: u32) -> Option<&ExecutedSet> {
        self.executed_sets.iter().find(|s| s.set_number == set_number)
    }

    /// Stores `set`, replacing any earlier outcome for the same set number.
    pub fn record(&mut self, set: ExecutedSet) {
        match self
            .executed_sets
            .iter_mut()
            .find(|s| s.set_number == set.set_number)
        {
            Some(existing) => *existing = set,
            None => {
                self.executed_sets.push(set);
                self.executed_sets.sort_by_key(|s| s.set_number);
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        self.planned_sets
            .iter()
            .all(|p| self.executed(p.set_number).is_some_and(|e| e.is_completed))
    }
}

/// Position of the set awaiting input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pointer {
    pub exercise_index: usize,
    pub set_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub plan_name: String,
    pub start_time: DateTime<Utc>,
    pub pause_start_time: Option<DateTime<Utc>>,
    pub paused_duration_ms: i64,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub exercises: Vec<ExecutedExercise>,
    pub completion_percentage: f64,
    pub total_volume: f64,
    pub pointer: Pointer,
    /// Length of the running rest in milliseconds, manual adjustments included.
    pub rest_target_ms: Option<i64>,
}

impl WorkoutSession {
    pub fn current_exercise(&self) -> Option<&ExecutedExercise> {
        self.exercises.get(self.pointer.exercise_index)
    }

    pub fn current_exercise_mut(&mut self) -> Option<&mut ExecutedExercise> {
        self.exercises.get_mut(self.pointer.exercise_index)
    }

    pub fn current_planned_set(&self) -> Option<&PlannedSet> {
        self.current_exercise()
            .and_then(|e| e.planned_sets.get(self.pointer.set_index))
    }

    /// Every planned set has an outcome, completed or skipped.
    pub fn is_fully_attempted(&self) -> bool {
        let planned: usize = self.exercises.iter().map(|e| e.planned_sets.len()).sum();
        planned > 0
            && self.exercises.iter().all(|e| {
                e.planned_sets
                    .iter()
                    .all(|p| e.executed(p.set_number).is_some())
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordType {
    MaxWeight,
    MaxReps,
    MaxVolume,
    MaxOneRepMax,
}

impl RecordType {
    pub const ALL: [RecordType; 4] = [
        Self::MaxWeight,
        Self::MaxReps,
        Self::MaxVolume,
        Self::MaxOneRepMax,
    ];

    /// Value this record type ranks a (weight, reps) pair by.
    pub fn measure(self, weight: f64, reps: u32) -> f64 {
        match self {
            Self::MaxWeight => weight,
            Self::MaxReps => f64::from(reps),
            Self::MaxVolume => weight * f64::from(reps),
            Self::MaxOneRepMax => epley_1rm(weight, reps),
        }
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MaxWeight => "max weight",
            Self::MaxReps => "max reps",
            Self::MaxVolume => "max volume",
            Self::MaxOneRepMax => "max 1RM",
        };

        write!(f, "{}", s)
    }
}

/// An achievement. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub id: String,
    pub user_id: String,
    pub exercise_id: String,
    pub exercise_name: String,
    pub record_type: RecordType,
    pub weight: f64,
    pub reps: u32,
    pub one_rep_max: f64,
    pub volume: f64,
    pub achieved_at: DateTime<Utc>,
    pub session_id: String,
}

impl PersonalRecord {
    pub fn value(&self) -> f64 {
        match self.record_type {
            RecordType::MaxWeight => self.weight,
            RecordType::MaxReps => f64::from(self.reps),
            RecordType::MaxVolume => self.volume,
            RecordType::MaxOneRepMax => self.one_rep_max,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub exercises: Vec<PlanExercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanExercise {
    pub exercise_id: String,
    pub name: String,
    pub rest_seconds: u32,
    pub sets: Vec<PlannedSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub primary_muscle: String,
    pub description: Option<String>,
}
