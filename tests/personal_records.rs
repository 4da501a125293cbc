mod common;

use std::{collections::BTreeSet, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use common::{ex, harness};
use setwise::{
    engine::{Collaborators, Engine},
    error::StoreError,
    models::{PersonalRecord, RecordType},
    store::RecordStore,
    utils::epley_1rm,
};

const USER: &str = "athlete-1";

fn prior(exercise_id: &str, record_type: RecordType, weight: f64, reps: u32) -> PersonalRecord {
    PersonalRecord {
        id: format!("prior-{record_type:?}"),
        user_id: USER.into(),
        exercise_id: exercise_id.into(),
        exercise_name: "Bench Press".into(),
        record_type,
        weight,
        reps,
        one_rep_max: epley_1rm(weight, reps),
        volume: weight * f64::from(reps),
        achieved_at: Utc::now(),
        session_id: "earlier".into(),
    }
}

fn types(records: &[PersonalRecord]) -> BTreeSet<String> {
    records.iter().map(|r| format!("{:?}", r.record_type)).collect()
}

#[tokio::test]
async fn first_set_sets_every_record() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    let result = live.complete_current_set(100.0, 5).await?;
    assert_eq!(result.new_records.len(), 4);

    let one_rm = result
        .new_records
        .iter()
        .find(|r| r.record_type == RecordType::MaxOneRepMax)
        .map(|r| r.one_rep_max);
    assert!(one_rm.is_some_and(|v| (v - 116.666_666).abs() < 1e-3), "{one_rm:?}");

    // Notifications accumulate on the binding until cleared.
    assert_eq!(live.new_records().len(), 4);
    assert_eq!(result.view.new_records.len(), 4);
    live.clear_new_record_notifications();
    assert!(live.new_records().is_empty());
    Ok(())
}

#[tokio::test]
async fn each_record_type_is_judged_on_its_own() -> Result<()> {
    let h = harness().await?;
    let plan = h.plan("Bench", &[ex("Bench Press", 3, 80.0, 10, 60)]).await?;
    let bench = plan.exercises[0].exercise_id.clone();

    h.engine
        .records()
        .insert_all(&[
            prior(&bench, RecordType::MaxWeight, 75.0, 5),
            prior(&bench, RecordType::MaxVolume, 70.0, 10),
            prior(&bench, RecordType::MaxReps, 40.0, 15),
            prior(&bench, RecordType::MaxOneRepMax, 100.0, 3),
        ])
        .await?;

    let live = h.engine.start(&plan.id, USER).await?;
    let result = live.complete_current_set(80.0, 10).await?;

    assert_eq!(
        types(&result.new_records),
        BTreeSet::from(["MaxVolume".to_string(), "MaxWeight".to_string()])
    );

    let best = h
        .engine
        .records()
        .best_by_type(USER, &bench, RecordType::MaxWeight)
        .await?;
    assert_eq!(best.map(|r| r.weight), Some(80.0));

    let reps = h
        .engine
        .records()
        .best_by_type(USER, &bench, RecordType::MaxReps)
        .await?;
    assert_eq!(reps.map(|r| r.reps), Some(15));
    Ok(())
}

#[tokio::test]
async fn matching_a_record_does_not_break_it() -> Result<()> {
    let h = harness().await?;
    let plan = h.plan("Bench", &[ex("Bench Press", 3, 80.0, 10, 60)]).await?;
    let live = h.engine.start(&plan.id, USER).await?;

    live.complete_current_set(80.0, 10).await?;
    live.skip_rest().await?;
    let again = live.complete_current_set(80.0, 10).await?;
    assert!(again.new_records.is_empty());

    live.skip_rest().await?;
    let heavier = live.complete_current_set(82.5, 10).await?;
    assert_eq!(
        types(&heavier.new_records),
        BTreeSet::from([
            "MaxOneRepMax".to_string(),
            "MaxVolume".to_string(),
            "MaxWeight".to_string()
        ])
    );

    let all = h.engine.records().list_for_user(USER, None).await?;
    assert_eq!(all.len(), 7);
    Ok(())
}

#[tokio::test]
async fn records_are_kept_per_user() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;

    let a = h.engine.start(&plan.id, "athlete-a").await?;
    a.complete_current_set(100.0, 5).await?;

    let b = h.engine.start(&plan.id, "athlete-b").await?;
    let result = b.complete_current_set(60.0, 5).await?;
    assert_eq!(result.new_records.len(), 4);
    Ok(())
}

struct BrokenRecords;

#[async_trait]
impl RecordStore for BrokenRecords {
    async fn best_by_type(
        &self,
        _user_id: &str,
        _exercise_id: &str,
        _record_type: RecordType,
    ) -> Result<Option<PersonalRecord>, StoreError> {
        Err(StoreError::Corrupt("record table unavailable".into()))
    }

    async fn insert_all(&self, _records: &[PersonalRecord]) -> Result<(), StoreError> {
        Err(StoreError::Corrupt("record table unavailable".into()))
    }

    async fn list_for_user(
        &self,
        _user_id: &str,
        _exercise_id: Option<&str>,
    ) -> Result<Vec<PersonalRecord>, StoreError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn detector_failure_does_not_lose_the_set() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;

    let mut parts = Collaborators::shared(h.store.clone());
    parts.records = Arc::new(BrokenRecords);
    let engine = Engine::new(parts).with_clock(h.clock.clone());

    let live = engine.start(&plan.id, USER).await?;
    let result = live.complete_current_set(100.0, 5).await?;
    assert!(result.new_records.is_empty());

    let stored = live.view().await?.session;
    assert_eq!(stored.exercises[0].executed_sets.len(), 1);
    assert_eq!(stored.total_volume, 500.0);
    Ok(())
}
