#![allow(dead_code)]
//! Shared setup for the integration tests: an in-memory database, a manual
//! clock and a few seeded plans.

use std::sync::{Arc, Once};

use anyhow::{Result, anyhow};
use chrono::{TimeZone, Utc};
use setwise::{
    clock::ManualClock,
    db,
    engine::{Collaborators, Engine, EngineSettings},
    models::{Exercise, Plan, PlanExercise, PlannedSet},
    store::SqliteStore,
};
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Quiet logging for tests; `TEST_LOG=debug` to see engine events.
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("trace") => tracing::Level::TRACE,
            Ok("debug") => tracing::Level::DEBUG,
            Ok("info") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

pub struct Harness {
    pub engine: Engine,
    pub clock: Arc<ManualClock>,
    pub store: Arc<SqliteStore>,
}

pub struct SeedExercise {
    pub name: &'static str,
    pub sets: u32,
    pub weight: f64,
    pub reps: u32,
    pub rest: u32,
}

pub const fn ex(name: &'static str, sets: u32, weight: f64, reps: u32, rest: u32) -> SeedExercise {
    SeedExercise {
        name,
        sets,
        weight,
        reps,
        rest,
    }
}

pub async fn harness() -> Result<Harness> {
    harness_with(EngineSettings::default()).await
}

pub async fn harness_with(settings: EngineSettings) -> Result<Harness> {
    init_test_logging();

    let pool = db::open_in_memory().await?;
    let store = Arc::new(SqliteStore::new(pool));
    let start = Utc
        .with_ymd_and_hms(2026, 5, 4, 18, 0, 0)
        .single()
        .ok_or_else(|| anyhow!("bad start time"))?;
    let clock = Arc::new(ManualClock::new(start));

    let engine = Engine::new(Collaborators::shared(store.clone()))
        .with_clock(clock.clone())
        .with_settings(settings);

    Ok(Harness { engine, clock, store })
}

impl Harness {
    /// Adds the exercises to the catalog (if missing) and stores a plan.
    pub async fn plan(&self, name: &str, seeds: &[SeedExercise]) -> Result<Plan> {
        let mut exercises = Vec::with_capacity(seeds.len());
        for seed in seeds {
            let catalog = self.engine.catalog();
            let exercise = match catalog.find_by_name(seed.name).await? {
                Some(found) => found,
                None => {
                    let new = Exercise {
                        id: Uuid::new_v4().to_string(),
                        name: seed.name.to_string(),
                        primary_muscle: "chest".to_string(),
                        description: None,
                    };
                    catalog.insert(&new).await?;
                    new
                }
            };

            exercises.push(PlanExercise {
                exercise_id: exercise.id,
                name: exercise.name,
                rest_seconds: seed.rest,
                sets: (1..=seed.sets)
                    .map(|n| PlannedSet {
                        set_number: n,
                        target_weight: seed.weight,
                        target_reps: seed.reps,
                    })
                    .collect(),
            });
        }

        let plan = Plan {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            exercises,
        };
        self.engine.plans().insert(&plan).await?;
        Ok(plan)
    }

    pub async fn push_day(&self) -> Result<Plan> {
        self.plan(
            "Push Day",
            &[ex("Bench Press", 3, 100.0, 5, 30), ex("Overhead Press", 2, 50.0, 8, 60)],
        )
        .await
    }
}
