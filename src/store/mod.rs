//! Persistence seams used by the engine.
//!
//! The engine only talks to these traits; [`SqliteStore`] is the one
//! implementation shipped with the binary.

mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

pub use sqlite::SqliteStore;

use crate::{
    error::StoreError,
    models::{Exercise, PersonalRecord, Plan, Pointer, RecordType, SessionStatus, WorkoutSession},
};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<WorkoutSession>, StoreError>;

    /// Live view of one session. Every write through this store is
    /// published; `None` means the row is gone.
    async fn subscribe(
        &self,
        id: &str,
    ) -> Result<watch::Receiver<Option<WorkoutSession>>, StoreError>;

    /// Fails with [`StoreError::ActiveSessionExists`] when the owner already
    /// holds a non-terminal session. The check and the insert are atomic.
    async fn insert(&self, session: &WorkoutSession) -> Result<(), StoreError>;

    async fn update(&self, session: &WorkoutSession) -> Result<(), StoreError>;

    /// Writes `session` only if the stored row still has the given status
    /// and pointer. Returns whether the write happened.
    async fn update_if_unchanged(
        &self,
        session: &WorkoutSession,
        status: SessionStatus,
        pointer: Pointer,
    ) -> Result<bool, StoreError>;

    async fn update_status(&self, id: &str, status: SessionStatus) -> Result<(), StoreError>;

    async fn update_end_time(&self, id: &str, time: DateTime<Utc>) -> Result<(), StoreError>;

    async fn active_for_user(&self, user_id: &str) -> Result<Option<WorkoutSession>, StoreError>;

    /// Most recent first.
    async fn list_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<WorkoutSession>, StoreError>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn best_by_type(
        &self,
        user_id: &str,
        exercise_id: &str,
        record_type: RecordType,
    ) -> Result<Option<PersonalRecord>, StoreError>;

    /// All or nothing.
    async fn insert_all(&self, records: &[PersonalRecord]) -> Result<(), StoreError>;

    async fn list_for_user(
        &self,
        user_id: &str,
        exercise_id: Option<&str>,
    ) -> Result<Vec<PersonalRecord>, StoreError>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<Plan>, StoreError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Plan>, StoreError>;
    async fn insert(&self, plan: &Plan) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<Plan>, StoreError>;
}

#[async_trait]
pub trait ExerciseCatalog: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<Exercise>, StoreError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Exercise>, StoreError>;
    /// Returns `false` when an exercise with that name already exists.
    async fn insert(&self, exercise: &Exercise) -> Result<bool, StoreError>;
    async fn list(&self, muscle: Option<&str>) -> Result<Vec<Exercise>, StoreError>;
}
