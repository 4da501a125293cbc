//! The active workout session engine.
//!
//! [`Engine`] owns the collaborators (stores, catalog, clock) and creates
//! [`LiveSession`] bindings. A binding serializes its commands and ticks
//! through an async gate and re-reads the stored session on every call;
//! the store is the only source of truth.

pub mod processor;
pub mod progress;
pub mod records;
pub mod state;
pub mod timer;

mod live;

use std::{sync::Arc, time::Duration};

use tracing::{info, warn};
use uuid::Uuid;

pub use live::{LiveSession, SessionView, SetResult};

use crate::{
    clock::{Clock, SystemClock},
    error::SessionError,
    models::{ExecutedExercise, Pointer, SessionStatus, WorkoutSession},
    store::{ExerciseCatalog, PlanStore, RecordStore, SessionStore},
};

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub tick_period: Duration,
    pub safety_cutoff: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_period: timer::TICK_PERIOD,
            safety_cutoff: timer::SAFETY_CUTOFF,
        }
    }
}

/// External collaborators the engine depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub sessions: Arc<dyn SessionStore>,
    pub records: Arc<dyn RecordStore>,
    pub plans: Arc<dyn PlanStore>,
    pub catalog: Arc<dyn ExerciseCatalog>,
}

impl Collaborators {
    /// All four seams served by one backend.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: SessionStore + RecordStore + PlanStore + ExerciseCatalog + 'static,
    {
        Self {
            sessions: store.clone(),
            records: store.clone(),
            plans: store.clone(),
            catalog: store,
        }
    }
}

#[derive(Clone)]
pub struct Engine {
    parts: Collaborators,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(parts: Collaborators) -> Self {
        Self {
            parts,
            clock: Arc::new(SystemClock),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn sessions(&self) -> &dyn SessionStore {
        self.parts.sessions.as_ref()
    }

    pub fn records(&self) -> &dyn RecordStore {
        self.parts.records.as_ref()
    }

    pub fn plans(&self) -> &dyn PlanStore {
        self.parts.plans.as_ref()
    }

    pub fn catalog(&self) -> &dyn ExerciseCatalog {
        self.parts.catalog.as_ref()
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Creates a session from `plan_id` for `user_id` and binds to it.
    pub async fn start(&self, plan_id: &str, user_id: &str) -> Result<LiveSession, SessionError> {
        let plan = self
            .plans()
            .get_by_id(plan_id)
            .await?
            .ok_or_else(|| SessionError::PlanNotFound(plan_id.to_string()))?;

        let mut exercises = Vec::with_capacity(plan.exercises.len());
        for (idx, pe) in plan.exercises.iter().enumerate() {
            let name = match self.catalog().get_by_id(&pe.exercise_id).await? {
                Some(ex) => ex.name,
                None => {
                    warn!(
                        exercise = %pe.exercise_id,
                        "exercise missing from catalog, using plan name"
                    );
                    pe.name.clone()
                }
            };

            exercises.push(ExecutedExercise {
                exercise_id: pe.exercise_id.clone(),
                name,
                order_index: u32::try_from(idx).unwrap_or(u32::MAX),
                planned_sets: pe.sets.clone(),
                executed_sets: Vec::new(),
                rest_between_sets: pe.rest_seconds,
            });
        }

        let mut session = WorkoutSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            plan_id: plan.id.clone(),
            plan_name: plan.name.clone(),
            start_time: self.clock.now(),
            pause_start_time: None,
            paused_duration_ms: 0,
            end_time: None,
            status: SessionStatus::InProgress,
            exercises,
            completion_percentage: 0.0,
            total_volume: 0.0,
            pointer: Pointer::default(),
            rest_target_ms: None,
        };
        if let Some(first) = processor::first_pointer(&session) {
            session.pointer = first;
        }

        self.sessions().insert(&session).await?;
        info!(session = %session.id, user = user_id, plan = %plan.name, "session started");

        Ok(LiveSession::new(self.clone(), session.id))
    }

    /// Binds to an existing session.
    pub async fn attach(&self, session_id: &str) -> Result<LiveSession, SessionError> {
        if self.sessions().get_by_id(session_id).await?.is_none() {
            return Err(SessionError::SessionNotFound(session_id.to_string()));
        }
        Ok(LiveSession::new(self.clone(), session_id.to_string()))
    }

    /// Binds to the user's non-terminal session, if any.
    pub async fn active(&self, user_id: &str) -> Result<Option<LiveSession>, SessionError> {
        Ok(self
            .sessions()
            .active_for_user(user_id)
            .await?
            .map(|s| LiveSession::new(self.clone(), s.id)))
    }
}
