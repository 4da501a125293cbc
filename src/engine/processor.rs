//! Recording set outcomes and deciding where the pointer goes next.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    progress,
    state::{self, Transition},
};
use crate::{
    error::SessionError,
    models::{ExecutedSet, PlannedSet, Pointer, SessionStatus, WorkoutSession},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SetOutcome {
    Completed { weight: f64, reps: u32 },
    Skipped,
}

/// What happens after a set has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advance {
    /// That was the last set of the workout; the caller confirms the finish.
    Finished,
    /// Pointer moved immediately (skips).
    Moved(Pointer),
    /// Rest started; the pointer moves when it ends.
    Resting { rest_ms: i64 },
}

#[derive(Debug, Clone)]
pub struct ProcessedSet {
    pub session: WorkoutSession,
    pub recorded: ExecutedSet,
    pub exercise_id: String,
    pub exercise_name: String,
    pub advance: Advance,
}

/// Checks user-entered values before anything is written.
pub fn validate_input(weight: f64, reps: i64) -> Result<(f64, u32), SessionError> {
    if !weight.is_finite() || weight <= 0.0 {
        return Err(SessionError::InvalidInput(format!(
            "weight must be a positive number, got {weight}"
        )));
    }
    let reps = u32::try_from(reps)
        .ok()
        .filter(|r| *r > 0)
        .ok_or_else(|| {
            SessionError::InvalidInput(format!("reps must be a positive whole number, got {reps}"))
        })?;

    Ok((weight, reps))
}

/// Parses raw text (as typed on the command line) into set values.
pub fn parse_set_input(weight: &str, reps: &str) -> Result<(f64, u32), SessionError> {
    let w = weight
        .trim()
        .parse::<f64>()
        .map_err(|_| {
            SessionError::InvalidInput(format!("weight `{weight}` is not a number"))
        })?;
    let r = reps
        .trim()
        .parse::<i64>()
        .map_err(|_| {
            SessionError::InvalidInput(format!("reps `{reps}` is not a whole number"))
        })?;

    validate_input(w, r)
}

/// First set of the workout, stepping over exercises with no planned sets.
pub fn first_pointer(session: &WorkoutSession) -> Option<Pointer> {
    session
        .exercises
        .iter()
        .position(|e| !e.planned_sets.is_empty())
        .map(|idx| Pointer {
            exercise_index: idx,
            set_index: 0,
        })
}

/// Next set position after `from`, stepping over exercises with no
/// planned sets. `None` when `from` is the last set of the workout.
pub fn next_pointer(session: &WorkoutSession, from: Pointer) -> Option<Pointer> {
    let exercise = session.exercises.get(from.exercise_index)?;
    if from.set_index + 1 < exercise.planned_sets.len() {
        return Some(Pointer {
            exercise_index: from.exercise_index,
            set_index: from.set_index + 1,
        });
    }

    session
        .exercises
        .iter()
        .enumerate()
        .skip(from.exercise_index + 1)
        .find(|(_, e)| !e.planned_sets.is_empty())
        .map(|(idx, _)| Pointer {
            exercise_index: idx,
            set_index: 0,
        })
}

/// Records `outcome` for the set under the pointer and returns the
/// resulting snapshot. Pure: persisting it is the caller's job.
pub fn process(
    session: &WorkoutSession,
    outcome: SetOutcome,
    now: DateTime<Utc>,
) -> Result<ProcessedSet, SessionError> {
    let action = match outcome {
        SetOutcome::Completed { .. } => "complete a set",
        SetOutcome::Skipped => "skip a set",
    };
    state::ensure_status(session, SessionStatus::InProgress, action)?;

    let pointer = session.pointer;
    let mut next = session.clone();
    let exercise = next
        .current_exercise_mut()
        .ok_or_else(|| {
            SessionError::InvalidInput("there is no exercise at the current position".into())
        })?;
    let planned = *exercise
        .planned_sets
        .get(pointer.set_index)
        .ok_or_else(|| {
            SessionError::InvalidInput("there is no set at the current position".into())
        })?;

    // A skip never overwrites work already done; it only moves on.
    let kept = exercise
        .executed(planned.set_number)
        .filter(|e| e.is_completed)
        .cloned();
    let recorded = match (outcome, kept) {
        (SetOutcome::Completed { weight, reps }, _) => {
            let set = ExecutedSet::completed(&planned, weight, reps, now);
            exercise.record(set.clone());
            set
        }
        (SetOutcome::Skipped, Some(done)) => done,
        (SetOutcome::Skipped, None) => {
            let set = ExecutedSet::skipped(&planned, now);
            exercise.record(set.clone());
            set
        }
    };
    let exercise_id = exercise.exercise_id.clone();
    let exercise_name = exercise.name.clone();
    let rest_ms = i64::from(exercise.rest_between_sets) * 1000;

    next.completion_percentage = progress::completion_percentage(&next.exercises);
    next.total_volume = progress::total_volume(&next.exercises);

    let advance = match (next_pointer(&next, pointer), outcome) {
        (None, SetOutcome::Skipped) if recorded.is_completed => {
            return Err(SessionError::InvalidInput(
                "the last set is already completed, finish the workout instead".into(),
            ));
        }
        (None, _) => Advance::Finished,
        (Some(p), SetOutcome::Skipped) => {
            next.pointer = p;
            Advance::Moved(p)
        }
        (Some(_), SetOutcome::Completed { .. }) => {
            next = state::apply(&next, Transition::BeginRest, now)?;
            next.rest_target_ms = Some(rest_ms);
            Advance::Resting { rest_ms }
        }
    };

    Ok(ProcessedSet {
        session: next,
        recorded,
        exercise_id,
        exercise_name,
        advance,
    })
}

/// Appends a planned set to the current exercise, copying the targets of
/// its last set.
pub fn add_set(session: &WorkoutSession) -> Result<WorkoutSession, SessionError> {
    state::ensure_active(session, "add a set")?;
    let mut next = session.clone();
    let exercise = next
        .current_exercise_mut()
        .ok_or_else(|| {
            SessionError::InvalidInput("there is no exercise at the current position".into())
        })?;

    let number = exercise.planned_sets.iter().map(|s| s.set_number).max().unwrap_or(0) + 1;
    let (weight, reps) = exercise
        .planned_sets
        .last()
        .map_or((0.0, 0), |s| (s.target_weight, s.target_reps));
    exercise.planned_sets.push(PlannedSet {
        set_number: number,
        target_weight: weight,
        target_reps: reps,
    });

    next.completion_percentage = progress::completion_percentage(&next.exercises);
    Ok(next)
}

/// Drops the last planned set of the current exercise along with any
/// outcome recorded for it. The only remaining set cannot be removed.
pub fn remove_set(session: &WorkoutSession) -> Result<WorkoutSession, SessionError> {
    state::ensure_active(session, "remove a set")?;
    let mut next = session.clone();
    let pointer = next.pointer;
    let exercise = next
        .current_exercise_mut()
        .ok_or_else(|| {
            SessionError::InvalidInput("there is no exercise at the current position".into())
        })?;

    if exercise.planned_sets.len() <= 1 {
        return Err(SessionError::InvalidInput(
            "an exercise needs at least one set".into(),
        ));
    }
    if let Some(removed) = exercise.planned_sets.pop() {
        exercise
            .executed_sets
            .retain(|s| s.set_number != removed.set_number);
    }
    let last_index = exercise.planned_sets.len() - 1;
    if pointer.set_index > last_index {
        next.pointer.set_index = last_index;
    }

    next.completion_percentage = progress::completion_percentage(&next.exercises);
    next.total_volume = progress::total_volume(&next.exercises);
    Ok(next)
}
