//! Personal record detection for a single completed set.

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::StoreError,
    models::{PersonalRecord, RecordType},
    store::RecordStore,
    utils::epley_1rm,
};

/// A freshly completed set, as seen by the detector.
#[derive(Debug, Clone)]
pub struct SetCandidate<'a> {
    pub user_id: &'a str,
    pub exercise_id: &'a str,
    pub exercise_name: &'a str,
    pub session_id: &'a str,
    pub weight: f64,
    pub reps: u32,
    pub achieved_at: DateTime<Utc>,
}

impl SetCandidate<'_> {
    fn to_record(&self, record_type: RecordType) -> PersonalRecord {
        PersonalRecord {
            id: Uuid::new_v4().to_string(),
            user_id: self.user_id.to_string(),
            exercise_id: self.exercise_id.to_string(),
            exercise_name: self.exercise_name.to_string(),
            record_type,
            weight: self.weight,
            reps: self.reps,
            one_rep_max: epley_1rm(self.weight, self.reps),
            volume: self.weight * f64::from(self.reps),
            achieved_at: self.achieved_at,
            session_id: self.session_id.to_string(),
        }
    }
}

/// Compares the candidate against the stored best of each record type
/// independently and persists every type it strictly beats (or that has no
/// best yet). Returns the records written, possibly none.
pub async fn detect(
    store: &dyn RecordStore,
    candidate: &SetCandidate<'_>,
) -> Result<Vec<PersonalRecord>, StoreError> {
    let mut broken = Vec::new();

    for record_type in RecordType::ALL {
        let value = record_type.measure(candidate.weight, candidate.reps);
        let best = store
            .best_by_type(candidate.user_id, candidate.exercise_id, record_type)
            .await?;

        if best.is_none_or(|b| value > b.value()) {
            broken.push(candidate.to_record(record_type));
        }
    }

    if !broken.is_empty() {
        store.insert_all(&broken).await?;
        for r in &broken {
            info!(
                user = candidate.user_id,
                exercise = candidate.exercise_name,
                kind = %r.record_type,
                value = r.value(),
                "new personal record"
            );
        }
    }

    Ok(broken)
}
