//! Timer readings derived from a session snapshot and the wall clock.
//!
//! Neither timer keeps its own counter: elapsed time comes from
//! `start_time`, `pause_start_time` and `paused_duration_ms`; the rest
//! countdown from `pause_start_time` and `rest_target_ms`. A tick is
//! therefore a pure function of (snapshot, now).

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::{SessionStatus, WorkoutSession};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);
pub const SAFETY_CUTOFF: Duration = Duration::from_secs(3 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    Idle,
    EndRest,
    ForcePause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerReading {
    pub elapsed_ms: i64,
    pub rest_remaining_ms: Option<i64>,
    pub action: TickAction,
}

/// Total workout time, frozen while paused and fixed once finished.
pub fn elapsed_ms(session: &WorkoutSession, now: DateTime<Utc>) -> i64 {
    let reference = match session.status {
        SessionStatus::Paused => session.pause_start_time.unwrap_or(now),
        SessionStatus::Completed | SessionStatus::Abandoned => session.end_time.unwrap_or(now),
        SessionStatus::InProgress | SessionStatus::Resting => now,
    };

    ((reference - session.start_time).num_milliseconds() - session.paused_duration_ms).max(0)
}

/// Milliseconds already spent in the current rest.
fn rest_elapsed_ms(session: &WorkoutSession, now: DateTime<Utc>) -> i64 {
    session
        .pause_start_time
        .map_or(0, |started| (now - started).num_milliseconds().max(0))
}

pub fn rest_remaining_ms(session: &WorkoutSession, now: DateTime<Utc>) -> Option<i64> {
    if session.status != SessionStatus::Resting {
        return None;
    }
    let target = session.rest_target_ms.unwrap_or(0);
    Some((target - rest_elapsed_ms(session, now)).max(0))
}

/// The rest target that leaves `remaining + delta` on the countdown,
/// never less than zero.
pub fn adjusted_rest_target(session: &WorkoutSession, delta_secs: i64, now: DateTime<Utc>) -> i64 {
    let spent = rest_elapsed_ms(session, now);
    let remaining = rest_remaining_ms(session, now).unwrap_or(0);
    let remaining = (remaining + delta_secs * 1000).max(0);
    spent + remaining
}

pub fn evaluate(session: &WorkoutSession, now: DateTime<Utc>, cutoff: Duration) -> TimerReading {
    let elapsed = elapsed_ms(session, now);
    let rest = rest_remaining_ms(session, now);

    let action = match session.status {
        SessionStatus::InProgress | SessionStatus::Resting
            if elapsed > cutoff.as_millis() as i64 =>
        {
            TickAction::ForcePause
        }
        SessionStatus::Resting if rest.is_some_and(|r| r <= 0) => TickAction::EndRest,
        _ => TickAction::Idle,
    };

    TimerReading {
        elapsed_ms: elapsed,
        rest_remaining_ms: rest,
        action,
    }
}
