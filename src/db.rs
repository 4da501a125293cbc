use std::str::FromStr;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::debug;

use crate::error::StoreError;

pub type DB = SqlitePool;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS exercises (
        id             TEXT PRIMARY KEY,
        name           TEXT NOT NULL UNIQUE,
        primary_muscle TEXT NOT NULL,
        description    TEXT,
        created_at     TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS plans (
        id         TEXT PRIMARY KEY,
        name       TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS plan_exercises (
        plan_id      TEXT NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
        order_index  INTEGER NOT NULL,
        exercise_id  TEXT NOT NULL REFERENCES exercises(id),
        rest_seconds INTEGER NOT NULL,
        PRIMARY KEY (plan_id, order_index)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS plan_sets (
        plan_id       TEXT NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
        order_index   INTEGER NOT NULL,
        set_number    INTEGER NOT NULL,
        target_weight REAL NOT NULL,
        target_reps   INTEGER NOT NULL,
        PRIMARY KEY (plan_id, order_index, set_number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS workout_sessions (
        id                     TEXT PRIMARY KEY,
        user_id                TEXT NOT NULL,
        plan_id                TEXT NOT NULL,
        plan_name              TEXT NOT NULL,
        start_time             TEXT NOT NULL,
        pause_start_time       TEXT,
        paused_duration_ms     INTEGER NOT NULL DEFAULT 0,
        end_time               TEXT,
        status                 TEXT NOT NULL,
        exercises              TEXT NOT NULL,
        completion_percentage  REAL NOT NULL DEFAULT 0,
        total_volume           REAL NOT NULL DEFAULT 0,
        current_exercise_index INTEGER NOT NULL DEFAULT 0,
        current_set_index      INTEGER NOT NULL DEFAULT 0,
        rest_target_ms         INTEGER
    )
    "#,
    // At most one non-terminal session per user.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS workout_sessions_one_active
    ON workout_sessions (user_id)
    WHERE status IN ('IN_PROGRESS', 'PAUSED', 'RESTING')
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS personal_records (
        id            TEXT PRIMARY KEY,
        user_id       TEXT NOT NULL,
        exercise_id   TEXT NOT NULL,
        exercise_name TEXT NOT NULL,
        record_type   TEXT NOT NULL,
        weight        REAL NOT NULL,
        reps          INTEGER NOT NULL,
        one_rep_max   REAL NOT NULL,
        volume        REAL NOT NULL,
        achieved_at   TEXT NOT NULL,
        session_id    TEXT NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS personal_records_lookup
    ON personal_records (user_id, exercise_id, record_type)
    "#,
];

pub async fn open(path: &str) -> Result<DB, StoreError> {
    let opts = SqliteConnectOptions::from_str(path)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

/// A private database that lives as long as the returned pool.
/// Every sqlite `:memory:` connection is its own database, so the pool is
/// pinned to a single connection that is never recycled.
pub async fn open_in_memory() -> Result<DB, StoreError> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &DB) -> Result<(), StoreError> {
    for stmt in SCHEMA {
        sqlx::query(stmt).execute(pool).await?;
    }
    debug!(statements = SCHEMA.len(), "schema up to date");
    Ok(())
}
