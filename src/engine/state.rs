//! Session state machine.
//!
//! All status changes go through [`apply`], which checks legality against
//! [`next_status`] and performs the pause bookkeeping that goes with the
//! move. Nothing here touches the store or the clock on its own.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    error::SessionError,
    models::{SessionStatus, WorkoutSession},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Pause,
    Resume,
    BeginRest,
    EndRest,
    /// Safety cutoff. Unlike `Pause` it may interrupt a rest.
    ForcePause,
    Complete,
    Abandon,
}

impl Transition {
    pub fn action(self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::BeginRest => "start resting",
            Self::EndRest => "end the rest",
            Self::ForcePause => "force a pause",
            Self::Complete => "complete the workout",
            Self::Abandon => "abandon the workout",
        }
    }
}

pub fn next_status(from: SessionStatus, transition: Transition) -> Option<SessionStatus> {
    use SessionStatus::*;
    use Transition::*;

    match (from, transition) {
        (InProgress, Pause) => Some(Paused),
        (Paused, Resume) => Some(InProgress),
        (InProgress, BeginRest) => Some(Resting),
        (Resting, EndRest) => Some(InProgress),
        (InProgress | Resting, ForcePause) => Some(Paused),
        (InProgress | Paused | Resting, Complete) => Some(Completed),
        (InProgress | Paused | Resting, Abandon) => Some(Abandoned),
        _ => None,
    }
}

/// Rejects any command against a finished session.
pub fn ensure_active(session: &WorkoutSession, action: &'static str) -> Result<(), SessionError> {
    if session.status.is_terminal() {
        return Err(SessionError::InvalidTransition {
            status: session.status,
            action,
        });
    }
    Ok(())
}

pub fn ensure_status(
    session: &WorkoutSession,
    expected: SessionStatus,
    action: &'static str,
) -> Result<(), SessionError> {
    if session.status != expected {
        return Err(SessionError::InvalidTransition {
            status: session.status,
            action,
        });
    }
    Ok(())
}

/// Returns the snapshot that results from `transition` at `now`.
pub fn apply(
    session: &WorkoutSession,
    transition: Transition,
    now: DateTime<Utc>,
) -> Result<WorkoutSession, SessionError> {
    let from = session.status;
    let to = next_status(from, transition).ok_or(SessionError::InvalidTransition {
        status: from,
        action: transition.action(),
    })?;

    let mut next = session.clone();
    next.status = to;

    if to.holds_pause() {
        if next.pause_start_time.is_none() {
            next.pause_start_time = Some(now);
        }
    } else {
        fold_pause(&mut next, now);
    }

    if to != SessionStatus::Resting {
        next.rest_target_ms = None;
    }

    if to.is_terminal() {
        next.end_time = Some(now);
    }

    debug!(session = %next.id, %from, %to, "status transition");
    Ok(next)
}

/// Closes an open pause interval into `paused_duration_ms`.
fn fold_pause(session: &mut WorkoutSession, now: DateTime<Utc>) {
    if let Some(started) = session.pause_start_time.take() {
        let interval = (now - started).num_milliseconds().max(0);
        session.paused_duration_ms += interval;
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::models::Pointer;

    fn session(now: DateTime<Utc>) -> WorkoutSession {
        WorkoutSession {
            id: "s1".into(),
            user_id: "u1".into(),
            plan_id: "p1".into(),
            plan_name: "Push".into(),
            start_time: now,
            pause_start_time: None,
            paused_duration_ms: 0,
            end_time: None,
            status: SessionStatus::InProgress,
            exercises: Vec::new(),
            completion_percentage: 0.0,
            total_volume: 0.0,
            pointer: Pointer::default(),
            rest_target_ms: None,
        }
    }

    #[test]
    fn pause_and_resume_accumulate_paused_time() {
        let t0 = Utc::now();
        let s = session(t0);

        let paused = apply(&s, Transition::Pause, t0 + Duration::seconds(10)).unwrap();
        assert_eq!(paused.status, SessionStatus::Paused);
        assert_eq!(paused.pause_start_time, Some(t0 + Duration::seconds(10)));

        let resumed = apply(&paused, Transition::Resume, t0 + Duration::seconds(25)).unwrap();
        assert_eq!(resumed.status, SessionStatus::InProgress);
        assert_eq!(resumed.pause_start_time, None);
        assert_eq!(resumed.paused_duration_ms, 15_000);
        assert_eq!(resumed.start_time, t0);
    }

    #[test]
    fn resume_is_only_legal_from_paused() {
        let t0 = Utc::now();
        let s = session(t0);
        let err = apply(&s, Transition::Resume, t0).unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidTransition {
                status: SessionStatus::InProgress,
                ..
            }
        ));

        let resting = apply(&s, Transition::BeginRest, t0).unwrap();
        assert!(apply(&resting, Transition::Resume, t0).is_err());
        assert!(apply(&resting, Transition::Pause, t0).is_err());
        assert!(apply(&resting, Transition::EndRest, t0).is_ok());
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let t0 = Utc::now();
        let done = apply(&session(t0), Transition::Complete, t0).unwrap();
        for t in [
            Transition::Pause,
            Transition::Resume,
            Transition::BeginRest,
            Transition::EndRest,
            Transition::ForcePause,
            Transition::Complete,
            Transition::Abandon,
        ] {
            assert!(apply(&done, t, t0).is_err(), "{t:?} accepted after completion");
        }
        assert!(ensure_active(&done, "pause").is_err());
    }

    #[test]
    fn force_pause_keeps_the_rest_start() {
        let t0 = Utc::now();
        let mut resting = apply(&session(t0), Transition::BeginRest, t0).unwrap();
        resting.rest_target_ms = Some(60_000);

        let paused = apply(&resting, Transition::ForcePause, t0 + Duration::seconds(5)).unwrap();
        assert_eq!(paused.status, SessionStatus::Paused);
        assert_eq!(paused.pause_start_time, Some(t0));
        assert_eq!(paused.rest_target_ms, None);
    }

    #[test]
    fn finishing_closes_the_open_pause() {
        let t0 = Utc::now();
        let paused = apply(&session(t0), Transition::Pause, t0).unwrap();
        let abandoned = apply(&paused, Transition::Abandon, t0 + Duration::seconds(3)).unwrap();

        assert_eq!(abandoned.status, SessionStatus::Abandoned);
        assert_eq!(abandoned.paused_duration_ms, 3_000);
        assert_eq!(abandoned.pause_start_time, None);
        assert_eq!(abandoned.end_time, Some(t0 + Duration::seconds(3)));
    }
}
