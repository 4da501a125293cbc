mod common;

use std::time::Duration;

use anyhow::{Result, anyhow};
use common::{ex, harness, harness_with};
use setwise::{
    clock::Clock,
    engine::{Collaborators, Engine, EngineSettings, processor::Advance},
    error::SessionError,
    models::{Pointer, SessionStatus},
};

const USER: &str = "athlete-1";

#[tokio::test]
async fn start_creates_an_in_progress_session() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;

    let live = h.engine.start(&plan.id, USER).await?;
    let view = live.view().await?;

    assert_eq!(view.session.status, SessionStatus::InProgress);
    assert_eq!(view.session.plan_name, "Push Day");
    assert_eq!(view.session.exercises.len(), 2);
    assert_eq!(view.session.exercises[0].name, "Bench Press");
    assert_eq!(view.pointer, Pointer::default());
    assert_eq!(view.elapsed_ms, 0);
    assert_eq!(view.current_target.map(|t| t.target_reps), Some(5));
    assert!(!view.is_resting);
    Ok(())
}

#[tokio::test]
async fn second_start_conflicts_and_writes_nothing() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    h.engine.start(&plan.id, USER).await?;

    let err = h.engine.start(&plan.id, USER).await.err();
    assert!(matches!(err, Some(SessionError::SessionConflict { .. })), "{err:?}");

    let stored = h.engine.sessions().list_for_user(USER, 10).await?;
    assert_eq!(stored.len(), 1);

    // Another user is unaffected.
    h.engine.start(&plan.id, "athlete-2").await?;
    Ok(())
}

#[tokio::test]
async fn missing_plan_and_session_are_reported() -> Result<()> {
    let h = harness().await?;

    let err = h.engine.start("no-such-plan", USER).await.err();
    assert!(matches!(err, Some(SessionError::PlanNotFound(_))), "{err:?}");
    assert!(h.engine.sessions().list_for_user(USER, 10).await?.is_empty());

    let err = h.engine.attach("no-such-session").await.err();
    assert!(matches!(err, Some(SessionError::SessionNotFound(_))), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn completed_set_rests_then_advances_after_thirty_ticks() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    let result = live.complete_current_set(100.0, 5).await?;
    assert_eq!(result.advance, Advance::Resting { rest_ms: 30_000 });
    assert_eq!(result.view.session.status, SessionStatus::Resting);
    assert_eq!(result.view.rest_remaining_ms, Some(30_000));

    for second in 1..=30 {
        h.clock.advance_secs(1);
        let view = live.tick().await?;
        if second < 30 {
            assert!(view.is_resting, "rest ended early at {second}s");
            assert_eq!(view.rest_remaining_ms, Some(30_000 - second * 1000));
        }
    }

    let view = live.view().await?;
    assert_eq!(view.session.status, SessionStatus::InProgress);
    assert_eq!(
        view.pointer,
        Pointer {
            exercise_index: 0,
            set_index: 1
        }
    );
    assert_eq!(view.rest_remaining_ms, None);
    Ok(())
}

#[tokio::test]
async fn last_set_of_an_exercise_moves_to_the_next_exercise() -> Result<()> {
    let h = harness().await?;
    let plan = h
        .plan("Short", &[ex("Squat", 1, 100.0, 5, 10), ex("Lunge", 1, 20.0, 10, 10)])
        .await?;
    let live = h.engine.start(&plan.id, USER).await?;

    live.complete_current_set(100.0, 5).await?;
    let view = live.skip_rest().await?;
    assert_eq!(
        view.pointer,
        Pointer {
            exercise_index: 1,
            set_index: 0
        }
    );

    let result = live.complete_current_set(20.0, 10).await?;
    assert_eq!(result.advance, Advance::Finished);
    assert_eq!(result.view.session.status, SessionStatus::InProgress);
    assert!(result.view.fully_attempted);
    assert_eq!(result.view.session.completion_percentage, 100.0);
    Ok(())
}

#[tokio::test]
async fn pause_freezes_elapsed_time() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    h.clock.advance_secs(60);
    let paused = live.pause().await?;
    assert_eq!(paused.session.status, SessionStatus::Paused);
    assert_eq!(paused.elapsed_ms, 60_000);

    h.clock.advance_secs(120);
    assert_eq!(live.tick().await?.elapsed_ms, 60_000);

    let resumed = live.resume().await?;
    assert_eq!(resumed.elapsed_ms, 60_000);
    assert_eq!(resumed.session.paused_duration_ms, 120_000);

    h.clock.advance_secs(10);
    assert_eq!(live.tick().await?.elapsed_ms, 70_000);
    Ok(())
}

#[tokio::test]
async fn elapsed_time_never_decreases_while_in_progress() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    let mut last = 0;
    for _ in 0..20 {
        h.clock.advance_secs(3);
        let view = live.tick().await?;
        assert!(view.elapsed_ms >= last);
        last = view.elapsed_ms;
    }
    assert_eq!(last, 60_000);
    Ok(())
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_write() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;
    let before = live.view().await?.session;

    for (weight, reps) in [(0.0, 5), (-20.0, 5), (60.0, 0), (60.0, -3), (f64::NAN, 5)] {
        let err = live.complete_current_set(weight, reps).await.err();
        assert!(matches!(err, Some(SessionError::InvalidInput(_))), "{weight} x {reps}: {err:?}");
    }

    let after = live.view().await?.session;
    assert_eq!(before, after);
    Ok(())
}

#[tokio::test]
async fn completing_the_same_set_twice_keeps_the_latest_values() -> Result<()> {
    let h = harness().await?;
    let plan = h.plan("Single", &[ex("Deadlift", 1, 140.0, 3, 120)]).await?;
    let live = h.engine.start(&plan.id, USER).await?;

    live.complete_current_set(140.0, 3).await?;
    let result = live.complete_current_set(145.0, 2).await?;

    let sets = &result.view.session.exercises[0].executed_sets;
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].actual_weight, 145.0);
    assert_eq!(sets[0].actual_reps, 2);
    assert_eq!(result.view.session.total_volume, 290.0);
    Ok(())
}

#[tokio::test]
async fn skipping_leaves_volume_untouched() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    live.complete_current_set(100.0, 5).await?;
    live.skip_rest().await?;
    let result = live.skip_current_set().await?;

    assert!(result.recorded.is_skipped);
    assert!(result.new_records.is_empty());
    assert_eq!(
        result.advance,
        Advance::Moved(Pointer {
            exercise_index: 0,
            set_index: 2
        })
    );

    let session = result.view.session;
    assert_eq!(session.status, SessionStatus::InProgress);
    assert_eq!(session.total_volume, 500.0);
    // One of five planned sets completed.
    assert_eq!(session.completion_percentage, 20.0);
    Ok(())
}

#[tokio::test]
async fn skipping_a_finished_last_set_keeps_its_volume() -> Result<()> {
    let h = harness().await?;
    let plan = h.plan("Single", &[ex("Deadlift", 1, 140.0, 3, 120)]).await?;
    let live = h.engine.start(&plan.id, USER).await?;

    let done = live.complete_current_set(140.0, 3).await?;
    assert_eq!(done.advance, Advance::Finished);

    let err = live.skip_current_set().await.err();
    assert!(matches!(err, Some(SessionError::InvalidInput(_))), "{err:?}");

    let session = live.view().await?.session;
    assert_eq!(session.status, SessionStatus::InProgress);
    assert!(session.exercises[0].executed_sets[0].is_completed);
    assert_eq!(session.total_volume, 420.0);
    assert_eq!(session.completion_percentage, 100.0);
    Ok(())
}

#[tokio::test]
async fn skipping_after_an_interrupted_rest_keeps_the_completed_set() -> Result<()> {
    let h = harness_with(EngineSettings {
        safety_cutoff: Duration::from_secs(60),
        ..EngineSettings::default()
    })
    .await?;
    let plan = h.plan("Long rests", &[ex("Row", 2, 60.0, 8, 600)]).await?;
    let live = h.engine.start(&plan.id, USER).await?;

    h.clock.advance_secs(50);
    live.complete_current_set(60.0, 8).await?;
    h.clock.advance_secs(20);
    let view = live.tick().await?;
    assert_eq!(view.session.status, SessionStatus::Paused);
    assert_eq!(view.pointer.set_index, 0);

    // A binding with the default cutoff can carry on from the interrupted set.
    let relaxed = Engine::new(Collaborators::shared(h.store.clone())).with_clock(h.clock.clone());
    let live = relaxed.attach(live.id()).await?;
    live.resume().await?;
    let result = live.skip_current_set().await?;

    assert!(result.recorded.is_completed);
    assert_eq!(
        result.advance,
        Advance::Moved(Pointer {
            exercise_index: 0,
            set_index: 1
        })
    );
    let session = result.view.session;
    assert_eq!(session.exercises[0].executed_sets.len(), 1);
    assert_eq!(session.total_volume, 480.0);
    assert_eq!(session.completion_percentage, 50.0);
    Ok(())
}

#[tokio::test]
async fn sets_are_only_accepted_while_in_progress() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    live.complete_current_set(100.0, 5).await?;
    let err = live.complete_current_set(100.0, 5).await.err();
    assert!(matches!(err, Some(SessionError::InvalidTransition { .. })), "{err:?}");

    live.skip_rest().await?;
    live.pause().await?;
    let err = live.skip_current_set().await.err();
    assert!(matches!(err, Some(SessionError::InvalidTransition { .. })), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn rest_can_be_lengthened_and_shortened() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;
    live.complete_current_set(100.0, 5).await?;

    h.clock.advance_secs(10);
    let view = live.adjust_rest_time(15).await?;
    assert_eq!(view.rest_remaining_ms, Some(35_000));

    let view = live.adjust_rest_time(-30).await?;
    assert_eq!(view.rest_remaining_ms, Some(5_000));

    // Shortening past zero ends the rest on the next tick.
    live.adjust_rest_time(-60).await?;
    let view = live.tick().await?;
    assert_eq!(view.session.status, SessionStatus::InProgress);
    assert_eq!(view.pointer.set_index, 1);

    let err = live.adjust_rest_time(10).await.err();
    assert!(matches!(err, Some(SessionError::InvalidTransition { .. })), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn skip_rest_racing_expiry_advances_once() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let first = h.engine.start(&plan.id, USER).await?;
    let second = h.engine.attach(first.id()).await?;

    first.complete_current_set(100.0, 5).await?;
    h.clock.advance_secs(45);

    let (ticked, skipped) = tokio::join!(first.tick(), second.skip_rest());
    ticked?;
    if let Err(e) = skipped {
        assert!(matches!(e, SessionError::InvalidTransition { .. }), "{e:?}");
    }

    let view = first.view().await?;
    assert_eq!(view.session.status, SessionStatus::InProgress);
    assert_eq!(
        view.pointer,
        Pointer {
            exercise_index: 0,
            set_index: 1
        }
    );

    // Once the rest is over a late skip is refused.
    let err = second.skip_rest().await.err();
    assert!(matches!(err, Some(SessionError::InvalidTransition { .. })), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn safety_cutoff_forces_a_pause() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    h.clock.advance_secs(3 * 60 * 60);
    assert_eq!(live.tick().await?.session.status, SessionStatus::InProgress);

    h.clock.advance_secs(1);
    let view = live.tick().await?;
    assert_eq!(view.session.status, SessionStatus::Paused);
    assert_eq!(view.elapsed_ms, (3 * 60 * 60 + 1) * 1000);

    // Past the cutoff every tick pauses again; only finishing remains.
    let view = live.resume().await?;
    assert_eq!(view.session.status, SessionStatus::InProgress);
    h.clock.advance_secs(1);
    assert_eq!(live.tick().await?.session.status, SessionStatus::Paused);

    let view = live.complete().await?;
    assert_eq!(view.session.status, SessionStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn safety_cutoff_interrupts_a_rest() -> Result<()> {
    let h = harness_with(EngineSettings {
        safety_cutoff: Duration::from_secs(60),
        ..EngineSettings::default()
    })
    .await?;
    let plan = h.plan("Long rests", &[ex("Row", 2, 60.0, 8, 600)]).await?;
    let live = h.engine.start(&plan.id, USER).await?;

    h.clock.advance_secs(50);
    live.complete_current_set(60.0, 8).await?;
    h.clock.advance_secs(20);

    let view = live.tick().await?;
    assert_eq!(view.session.status, SessionStatus::Paused);
    assert_eq!(view.pointer.set_index, 0);
    assert!(view.rest_remaining_ms.is_none());
    Ok(())
}

#[tokio::test]
async fn finishing_ends_the_session_for_good() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    live.complete_current_set(100.0, 5).await?;
    h.clock.advance_secs(90);
    let view = live.complete().await?;

    assert_eq!(view.session.status, SessionStatus::Completed);
    assert!(view.session.end_time.is_some());
    assert!(view.session.pause_start_time.is_none());
    assert!(view.rest_remaining_ms.is_none());

    let err = live.pause().await.err();
    assert!(matches!(err, Some(SessionError::InvalidTransition { .. })), "{err:?}");
    let err = live.add_set_to_current_exercise().await.err();
    assert!(matches!(err, Some(SessionError::InvalidTransition { .. })), "{err:?}");

    assert!(h.engine.active(USER).await?.is_none());
    h.engine.start(&plan.id, USER).await?;
    Ok(())
}

#[tokio::test]
async fn abandoning_frees_the_user() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    h.clock.advance_secs(30);
    let view = live.abandon().await?;
    assert_eq!(view.session.status, SessionStatus::Abandoned);
    assert_eq!(view.session.end_time, Some(h.clock.now()));

    let err = live.abandon().await.err();
    assert!(matches!(err, Some(SessionError::InvalidTransition { .. })), "{err:?}");
    assert!(h.engine.active(USER).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn abandoning_while_paused_closes_the_pause() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    h.clock.advance_secs(10);
    live.pause().await?;
    h.clock.advance_secs(20);
    let view = live.abandon().await?;
    assert_eq!(view.elapsed_ms, 10_000);

    let stored = h.engine.sessions().get_by_id(live.id()).await?;
    let stored = stored.ok_or_else(|| anyhow!("session vanished"))?;
    assert_eq!(stored.status, SessionStatus::Abandoned);
    assert_eq!(stored.pause_start_time, None);
    assert_eq!(stored.paused_duration_ms, 20_000);
    assert_eq!(stored.end_time, Some(h.clock.now()));
    Ok(())
}

#[tokio::test]
async fn abandoning_while_resting_drops_the_rest() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    h.clock.advance_secs(40);
    live.complete_current_set(100.0, 5).await?;
    h.clock.advance_secs(12);
    let view = live.abandon().await?;
    assert!(view.rest_remaining_ms.is_none());
    assert_eq!(view.elapsed_ms, 40_000);

    let stored = h.engine.sessions().get_by_id(live.id()).await?;
    let stored = stored.ok_or_else(|| anyhow!("session vanished"))?;
    assert_eq!(stored.status, SessionStatus::Abandoned);
    assert_eq!(stored.pause_start_time, None);
    assert_eq!(stored.paused_duration_ms, 12_000);
    assert_eq!(stored.rest_target_ms, None);
    assert_eq!(stored.total_volume, 500.0);

    // Elapsed time stays put long after the fact.
    h.clock.advance_secs(3600);
    assert_eq!(live.view().await?.elapsed_ms, 40_000);
    Ok(())
}

#[tokio::test]
async fn field_level_writes_reach_subscribers() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    let sessions = h.engine.sessions();
    let mut rx = sessions.subscribe(live.id()).await?;
    sessions.update_status(live.id(), SessionStatus::Paused).await?;

    tokio::time::timeout(Duration::from_secs(1), rx.changed()).await??;
    let seen = rx.borrow_and_update().clone();
    assert_eq!(seen.map(|s| s.status), Some(SessionStatus::Paused));
    Ok(())
}

#[tokio::test]
async fn sets_can_be_added_and_removed() -> Result<()> {
    let h = harness().await?;
    let plan = h.plan("Curls", &[ex("Curl", 2, 15.0, 12, 45)]).await?;
    let live = h.engine.start(&plan.id, USER).await?;

    let view = live.add_set_to_current_exercise().await?;
    let planned = &view.session.exercises[0].planned_sets;
    assert_eq!(planned.len(), 3);
    assert_eq!(planned[2].set_number, 3);
    assert_eq!(planned[2].target_weight, 15.0);
    assert_eq!(planned[2].target_reps, 12);

    live.remove_set_from_current_exercise().await?;
    let view = live.remove_set_from_current_exercise().await?;
    assert_eq!(view.session.exercises[0].planned_sets.len(), 1);

    let err = live.remove_set_from_current_exercise().await.err();
    assert!(matches!(err, Some(SessionError::InvalidInput(_))), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn observer_ticker_ends_rest_on_its_own() -> Result<()> {
    let h = harness_with(EngineSettings {
        tick_period: Duration::from_millis(10),
        ..EngineSettings::default()
    })
    .await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;
    live.complete_current_set(100.0, 5).await?;

    let mut rx = live.observe();
    h.clock.advance_secs(31);

    let view = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            rx.changed().await?;
            let current = rx.borrow_and_update().clone();
            if let Some(view) = current.filter(|v| !v.is_resting) {
                return anyhow::Ok(view);
            }
        }
    })
    .await??;

    assert_eq!(view.session.status, SessionStatus::InProgress);
    assert_eq!(view.pointer.set_index, 1);
    Ok(())
}

#[tokio::test]
async fn store_subscribers_see_every_write() -> Result<()> {
    let h = harness().await?;
    let plan = h.push_day().await?;
    let live = h.engine.start(&plan.id, USER).await?;

    let mut rx = h.engine.sessions().subscribe(live.id()).await?;
    live.pause().await?;

    tokio::time::timeout(Duration::from_secs(1), rx.changed()).await??;
    let seen = rx.borrow_and_update().clone();
    assert_eq!(seen.map(|s| s.status), Some(SessionStatus::Paused));
    Ok(())
}
