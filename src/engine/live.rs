use std::{
    future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use super::{
    Engine,
    processor::{self, Advance, SetOutcome},
    records::{self, SetCandidate},
    state::{self, Transition},
    timer::{self, TickAction},
};
use crate::{
    error::SessionError,
    models::{ExecutedSet, PersonalRecord, PlannedSet, Pointer, SessionStatus, WorkoutSession},
};

/// What the presentation layer renders: the stored snapshot plus the
/// values derived from it at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session: WorkoutSession,
    pub elapsed_ms: i64,
    pub rest_remaining_ms: Option<i64>,
    pub is_resting: bool,
    pub pointer: Pointer,
    /// Targets of the set under the pointer; the next input defaults.
    pub current_target: Option<PlannedSet>,
    pub fully_attempted: bool,
    pub new_records: Vec<PersonalRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SetResult {
    pub view: SessionView,
    pub recorded: ExecutedSet,
    pub advance: Advance,
    /// Records broken by this set. Empty for skips or when detection failed.
    pub new_records: Vec<PersonalRecord>,
}

/// A binding to one stored session.
///
/// Clones share the same gate, notifications and ticker.
#[derive(Clone)]
pub struct LiveSession {
    inner: Arc<Inner>,
}

struct Inner {
    engine: Engine,
    session_id: String,
    gate: tokio::sync::Mutex<()>,
    new_records: Mutex<Vec<PersonalRecord>>,
    views: watch::Sender<Option<SessionView>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LiveSession {
    pub(super) fn new(engine: Engine, session_id: String) -> Self {
        let (views, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                engine,
                session_id,
                gate: tokio::sync::Mutex::new(()),
                new_records: Mutex::new(Vec::new()),
                views,
                ticker: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.session_id
    }

    fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    fn now(&self) -> DateTime<Utc> {
        self.engine().clock.now()
    }

    async fn load(&self) -> Result<WorkoutSession, SessionError> {
        self.engine()
            .sessions()
            .get_by_id(self.id())
            .await?
            .ok_or_else(|| SessionError::SessionNotFound(self.id().to_string()))
    }

    async fn persist(&self, session: &WorkoutSession) -> Result<(), SessionError> {
        self.engine().sessions().update(session).await?;
        Ok(())
    }

    fn view_of(&self, session: WorkoutSession, now: DateTime<Utc>) -> SessionView {
        let reading = timer::evaluate(&session, now, self.engine().settings.safety_cutoff);
        let view = SessionView {
            elapsed_ms: reading.elapsed_ms,
            rest_remaining_ms: reading.rest_remaining_ms,
            is_resting: session.status == SessionStatus::Resting,
            pointer: session.pointer,
            current_target: session.current_planned_set().copied(),
            fully_attempted: session.is_fully_attempted(),
            new_records: self.new_records(),
            session,
        };
        self.inner.views.send_replace(Some(view.clone()));
        view
    }

    /// Applies whatever the timers say is due at `now`.
    async fn reconcile(
        &self,
        session: WorkoutSession,
        now: DateTime<Utc>,
    ) -> Result<WorkoutSession, SessionError> {
        let reading = timer::evaluate(&session, now, self.engine().settings.safety_cutoff);

        match reading.action {
            TickAction::Idle => Ok(session),
            TickAction::EndRest => self.end_rest(session, now).await,
            TickAction::ForcePause => {
                warn!(
                    session = %session.id,
                    elapsed_ms = reading.elapsed_ms,
                    "safety cutoff reached, pausing session"
                );
                let next = state::apply(&session, Transition::ForcePause, now)?;
                self.persist(&next).await?;
                Ok(next)
            }
        }
    }

    /// Leaves `RESTING` and moves the pointer one set forward. The write is
    /// conditional on the stored row still resting at the same pointer, so
    /// a rest can only ever be ended (and the pointer advanced) once.
    async fn end_rest(
        &self,
        session: WorkoutSession,
        now: DateTime<Utc>,
    ) -> Result<WorkoutSession, SessionError> {
        let rested_at = session.pointer;
        let mut next = state::apply(&session, Transition::EndRest, now)?;
        if let Some(p) = processor::next_pointer(&next, rested_at) {
            next.pointer = p;
        }

        let written = self
            .engine()
            .sessions()
            .update_if_unchanged(&next, SessionStatus::Resting, rested_at)
            .await?;

        if written {
            debug!(session = %next.id, from = ?rested_at, to = ?next.pointer, "rest over");
            Ok(next)
        } else {
            self.load().await
        }
    }

    /// Runs a command against a freshly loaded and reconciled snapshot and
    /// persists the result.
    async fn command<F>(&self, f: F) -> Result<SessionView, SessionError>
    where
        F: FnOnce(&WorkoutSession, DateTime<Utc>) -> Result<WorkoutSession, SessionError>,
    {
        let _gate = self.inner.gate.lock().await;
        let now = self.now();
        let current = self.load().await?;
        let current = self.reconcile(current, now).await?;

        let next = f(&current, now)?;
        self.persist(&next).await?;
        Ok(self.view_of(next, now))
    }

    /// One scheduler step: reload, apply due timer transitions, emit a view.
    pub async fn tick(&self) -> Result<SessionView, SessionError> {
        let _gate = self.inner.gate.lock().await;
        let now = self.now();
        let current = self.load().await?;
        let current = self.reconcile(current, now).await?;
        Ok(self.view_of(current, now))
    }

    pub async fn view(&self) -> Result<SessionView, SessionError> {
        self.tick().await
    }

    pub async fn pause(&self) -> Result<SessionView, SessionError> {
        self.command(|s, now| state::apply(s, Transition::Pause, now)).await
    }

    pub async fn resume(&self) -> Result<SessionView, SessionError> {
        self.command(|s, now| state::apply(s, Transition::Resume, now)).await
    }

    pub async fn skip_rest(&self) -> Result<SessionView, SessionError> {
        let _gate = self.inner.gate.lock().await;
        let now = self.now();
        let current = self.load().await?;
        state::ensure_status(&current, SessionStatus::Resting, "skip the rest")?;

        let next = self.end_rest(current, now).await?;
        Ok(self.view_of(next, now))
    }

    /// Moves the rest countdown by `delta_secs` (negative shortens it).
    pub async fn adjust_rest_time(&self, delta_secs: i64) -> Result<SessionView, SessionError> {
        self.command(move |s, now| {
            state::ensure_status(s, SessionStatus::Resting, "adjust the rest")?;
            let mut next = s.clone();
            next.rest_target_ms = Some(timer::adjusted_rest_target(s, delta_secs, now));
            Ok(next)
        })
        .await
    }

    pub async fn complete_current_set(
        &self,
        weight: f64,
        reps: i64,
    ) -> Result<SetResult, SessionError> {
        let (weight, reps) = processor::validate_input(weight, reps)?;
        self.record_set(SetOutcome::Completed { weight, reps }).await
    }

    pub async fn skip_current_set(&self) -> Result<SetResult, SessionError> {
        self.record_set(SetOutcome::Skipped).await
    }

    async fn record_set(&self, outcome: SetOutcome) -> Result<SetResult, SessionError> {
        let _gate = self.inner.gate.lock().await;
        let now = self.now();
        let current = self.load().await?;
        let current = self.reconcile(current, now).await?;

        let processed = processor::process(&current, outcome, now)?;
        self.persist(&processed.session).await?;
        info!(
            session = %processed.session.id,
            exercise = %processed.exercise_name,
            set = processed.recorded.set_number,
            skipped = processed.recorded.is_skipped,
            "set recorded"
        );

        let mut new_records = Vec::new();
        if let SetOutcome::Completed { weight, reps } = outcome {
            let candidate = SetCandidate {
                user_id: &processed.session.user_id,
                exercise_id: &processed.exercise_id,
                exercise_name: &processed.exercise_name,
                session_id: &processed.session.id,
                weight,
                reps,
                achieved_at: now,
            };
            // The set outcome is already stored; a detector failure must not undo it.
            match records::detect(self.engine().records(), &candidate).await {
                Ok(found) => new_records = found,
                Err(e) => warn!(
                    session = %processed.session.id,
                    error = %e,
                    "personal record detection failed"
                ),
            }
            if !new_records.is_empty() {
                lock(&self.inner.new_records).extend(new_records.iter().cloned());
            }
        }

        let view = self.view_of(processed.session, now);
        Ok(SetResult {
            view,
            recorded: processed.recorded,
            advance: processed.advance,
            new_records,
        })
    }

    pub async fn add_set_to_current_exercise(&self) -> Result<SessionView, SessionError> {
        self.command(|s, _| processor::add_set(s)).await
    }

    pub async fn remove_set_from_current_exercise(&self) -> Result<SessionView, SessionError> {
        self.command(|s, _| processor::remove_set(s)).await
    }

    /// Finishes the workout. Only the user confirms this; reaching the last
    /// set never does it automatically.
    pub async fn complete(&self) -> Result<SessionView, SessionError> {
        let view = self
            .command(|s, now| state::apply(s, Transition::Complete, now))
            .await?;
        info!(
            session = %view.session.id,
            completion = view.session.completion_percentage,
            volume = view.session.total_volume,
            "session completed"
        );
        Ok(view)
    }

    /// Stops the workout for good. The end time is written before the
    /// terminal snapshot, so a failure in between leaves the session active.
    pub async fn abandon(&self) -> Result<SessionView, SessionError> {
        let _gate = self.inner.gate.lock().await;
        let now = self.now();
        let current = self.load().await?;
        let abandoned = state::apply(&current, Transition::Abandon, now)?;

        self.engine().sessions().update_end_time(self.id(), now).await?;
        self.persist(&abandoned).await?;
        info!(
            session = %self.id(),
            paused_ms = abandoned.paused_duration_ms,
            "session abandoned"
        );

        let stored = self.load().await?;
        Ok(self.view_of(stored, now))
    }

    pub fn new_records(&self) -> Vec<PersonalRecord> {
        lock(&self.inner.new_records).clone()
    }

    pub fn clear_new_record_notifications(&self) {
        lock(&self.inner.new_records).clear();
    }

    /// Subscribes to live views. The first observer starts the ticker; it
    /// stops once every receiver is dropped or the session is finished.
    pub fn observe(&self) -> watch::Receiver<Option<SessionView>> {
        let rx = self.inner.views.subscribe();

        let mut ticker = lock(&self.inner.ticker);
        if ticker.as_ref().is_none_or(JoinHandle::is_finished) {
            let live = self.clone();
            *ticker = Some(tokio::spawn(async move { live.run_ticker().await }));
        }
        rx
    }

    async fn run_ticker(self) {
        let id = self.id().to_string();
        let mut updates = match self.engine().sessions().subscribe(&id).await {
            Ok(rx) => Some(rx),
            Err(e) => {
                warn!(session = %id, error = %e, "live updates unavailable, ticking only");
                None
            }
        };

        let mut interval = time::interval(self.engine().settings.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!(session = %id, "ticker started");

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = next_update(&mut updates) => {
                    if changed.is_err() {
                        updates = None;
                        continue;
                    }
                }
                () = self.inner.views.closed() => {
                    debug!(session = %id, "no observers left");
                    break;
                }
            }

            match self.tick().await {
                Ok(view) if view.session.status.is_terminal() => {
                    debug!(session = %id, status = %view.session.status, "session finished");
                    break;
                }
                Ok(_) => {}
                Err(SessionError::SessionNotFound(_)) => {
                    self.inner.views.send_replace(None);
                    break;
                }
                Err(e) => warn!(session = %id, error = %e, "tick failed"),
            }
        }
        debug!(session = %id, "ticker stopped");
    }
}

async fn next_update(
    rx: &mut Option<watch::Receiver<Option<WorkoutSession>>>,
) -> Result<(), watch::error::RecvError> {
    match rx {
        Some(rx) => rx.changed().await,
        None => future::pending().await,
    }
}
