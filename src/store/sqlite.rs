use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, sqlite::SqliteRow};
use tokio::sync::watch;
use tracing::debug;

use super::{ExerciseCatalog, PlanStore, RecordStore, SessionStore};
use crate::{
    db::DB,
    error::StoreError,
    models::{
        Exercise, PersonalRecord, Plan, PlanExercise, PlannedSet, Pointer, RecordType,
        SessionStatus, WorkoutSession,
    },
};

// SQLITE_CONSTRAINT_UNIQUE
const UNIQUE_VIOLATION: &str = "2067";

type Watchers = HashMap<String, watch::Sender<Option<WorkoutSession>>>;

/// SQLite-backed implementation of every store trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: DB,
    watchers: Arc<Mutex<Watchers>>,
}

impl SqliteStore {
    pub fn new(pool: DB) -> Self {
        Self {
            pool,
            watchers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn pool(&self) -> &DB {
        &self.pool
    }

    fn watchers(&self) -> MutexGuard<'_, Watchers> {
        self.watchers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, id: &str, session: Option<WorkoutSession>) {
        let mut watchers = self.watchers();
        let Some(tx) = watchers.get(id) else {
            return;
        };
        if tx.receiver_count() == 0 {
            watchers.remove(id);
        } else {
            tx.send_replace(session);
        }
    }

    async fn republish(&self, id: &str) -> Result<(), StoreError> {
        let fresh = SessionStore::get_by_id(self, id).await?;
        self.publish(id, fresh);
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
    )
}

fn to_index(value: i64, column: &str) -> Result<usize, StoreError> {
    usize::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} = {value}")))
}

fn to_count(value: i64, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} = {value}")))
}

fn session_from_row(row: &SqliteRow) -> Result<WorkoutSession, StoreError> {
    let exercises: String = row.try_get("exercises")?;

    Ok(WorkoutSession {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        plan_id: row.try_get("plan_id")?,
        plan_name: row.try_get("plan_name")?,
        start_time: row.try_get("start_time")?,
        pause_start_time: row.try_get("pause_start_time")?,
        paused_duration_ms: row.try_get("paused_duration_ms")?,
        end_time: row.try_get("end_time")?,
        status: row.try_get("status")?,
        exercises: serde_json::from_str(&exercises)?,
        completion_percentage: row.try_get("completion_percentage")?,
        total_volume: row.try_get("total_volume")?,
        pointer: Pointer {
            exercise_index: to_index(
                row.try_get("current_exercise_index")?,
                "current_exercise_index",
            )?,
            set_index: to_index(row.try_get("current_set_index")?, "current_set_index")?,
        },
        rest_target_ms: row.try_get("rest_target_ms")?,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<PersonalRecord, StoreError> {
    Ok(PersonalRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        exercise_id: row.try_get("exercise_id")?,
        exercise_name: row.try_get("exercise_name")?,
        record_type: row.try_get("record_type")?,
        weight: row.try_get("weight")?,
        reps: to_count(row.try_get("reps")?, "reps")?,
        one_rep_max: row.try_get("one_rep_max")?,
        volume: row.try_get("volume")?,
        achieved_at: row.try_get("achieved_at")?,
        session_id: row.try_get("session_id")?,
    })
}

fn exercise_from_row(row: &SqliteRow) -> Result<Exercise, StoreError> {
    Ok(Exercise {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        primary_muscle: row.try_get("primary_muscle")?,
        description: row.try_get("description")?,
    })
}

/// Column a record type is ranked by.
fn ranking_column(record_type: RecordType) -> &'static str {
    match record_type {
        RecordType::MaxWeight => "weight",
        RecordType::MaxReps => "reps",
        RecordType::MaxVolume => "volume",
        RecordType::MaxOneRepMax => "one_rep_max",
    }
}

const SESSION_COLUMNS: &str = r#"
    id, user_id, plan_id, plan_name, start_time, pause_start_time,
    paused_duration_ms, end_time, status, exercises, completion_percentage,
    total_volume, current_exercise_index, current_set_index, rest_target_ms
"#;

#[async_trait]
impl SessionStore for SqliteStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<WorkoutSession>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM workout_sessions WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn subscribe(
        &self,
        id: &str,
    ) -> Result<watch::Receiver<Option<WorkoutSession>>, StoreError> {
        let current = SessionStore::get_by_id(self, id).await?;

        let mut watchers = self.watchers();
        let tx = watchers
            .entry(id.to_string())
            .or_insert_with(|| watch::channel(None).0);
        tx.send_replace(current);
        Ok(tx.subscribe())
    }

    async fn insert(&self, session: &WorkoutSession) -> Result<(), StoreError> {
        let exercises = serde_json::to_string(&session.exercises)?;

        let res = sqlx::query(&format!(
            "INSERT INTO workout_sessions ({SESSION_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.plan_id)
        .bind(&session.plan_name)
        .bind(session.start_time)
        .bind(session.pause_start_time)
        .bind(session.paused_duration_ms)
        .bind(session.end_time)
        .bind(session.status)
        .bind(exercises)
        .bind(session.completion_percentage)
        .bind(session.total_volume)
        .bind(session.pointer.exercise_index as i64)
        .bind(session.pointer.set_index as i64)
        .bind(session.rest_target_ms)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => {
                self.publish(&session.id, Some(session.clone()));
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => Err(StoreError::ActiveSessionExists {
                user_id: session.user_id.clone(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, session: &WorkoutSession) -> Result<(), StoreError> {
        if write_session(&self.pool, session, None).await? {
            self.publish(&session.id, Some(session.clone()));
            Ok(())
        } else {
            Err(StoreError::NotFound {
                kind: "session",
                id: session.id.clone(),
            })
        }
    }

    async fn update_if_unchanged(
        &self,
        session: &WorkoutSession,
        status: SessionStatus,
        pointer: Pointer,
    ) -> Result<bool, StoreError> {
        let written = write_session(&self.pool, session, Some((status, pointer))).await?;
        if written {
            self.publish(&session.id, Some(session.clone()));
        } else {
            debug!(session = %session.id, %status, "conditional write skipped");
        }
        Ok(written)
    }

    async fn update_status(&self, id: &str, status: SessionStatus) -> Result<(), StoreError> {
        let res = sqlx::query("UPDATE workout_sessions SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await;

        match res {
            Ok(info) if info.rows_affected() == 1 => self.republish(id).await,
            Ok(_) => Err(StoreError::NotFound {
                kind: "session",
                id: id.to_string(),
            }),
            Err(e) if is_unique_violation(&e) => {
                let user_id: String =
                    sqlx::query_scalar("SELECT user_id FROM workout_sessions WHERE id = ?")
                        .bind(id)
                        .fetch_one(&self.pool)
                        .await?;
                Err(StoreError::ActiveSessionExists { user_id })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_end_time(&self, id: &str, time: DateTime<Utc>) -> Result<(), StoreError> {
        let info = sqlx::query("UPDATE workout_sessions SET end_time = ? WHERE id = ?")
            .bind(time)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if info.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                kind: "session",
                id: id.to_string(),
            });
        }
        self.republish(id).await
    }

    async fn active_for_user(&self, user_id: &str) -> Result<Option<WorkoutSession>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM workout_sessions \
             WHERE user_id = ? AND status IN ('IN_PROGRESS', 'PAUSED', 'RESTING') \
             LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(session_from_row).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<WorkoutSession>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM workout_sessions \
             WHERE user_id = ? ORDER BY start_time DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(session_from_row).collect()
    }
}

/// Full snapshot write. With `guard` set the row must still carry that
/// status and pointer. Returns whether a row was written.
async fn write_session(
    pool: &DB,
    session: &WorkoutSession,
    guard: Option<(SessionStatus, Pointer)>,
) -> Result<bool, StoreError> {
    let exercises = serde_json::to_string(&session.exercises)?;
    let expected_status = guard.map(|(status, _)| status);
    let expected_exercise = guard.map(|(_, p)| p.exercise_index as i64);
    let expected_set = guard.map(|(_, p)| p.set_index as i64);

    let info = sqlx::query(
        r#"
        UPDATE workout_sessions
        SET pause_start_time = ?,
            paused_duration_ms = ?,
            end_time = ?,
            status = ?,
            exercises = ?,
            completion_percentage = ?,
            total_volume = ?,
            current_exercise_index = ?,
            current_set_index = ?,
            rest_target_ms = ?
        WHERE id = ?
          AND (? IS NULL OR (status = ? AND current_exercise_index = ? AND current_set_index = ?))
        "#,
    )
    .bind(session.pause_start_time)
    .bind(session.paused_duration_ms)
    .bind(session.end_time)
    .bind(session.status)
    .bind(exercises)
    .bind(session.completion_percentage)
    .bind(session.total_volume)
    .bind(session.pointer.exercise_index as i64)
    .bind(session.pointer.set_index as i64)
    .bind(session.rest_target_ms)
    .bind(&session.id)
    .bind(expected_status)
    .bind(expected_status)
    .bind(expected_exercise)
    .bind(expected_set)
    .execute(pool)
    .await?;

    Ok(info.rows_affected() == 1)
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn best_by_type(
        &self,
        user_id: &str,
        exercise_id: &str,
        record_type: RecordType,
    ) -> Result<Option<PersonalRecord>, StoreError> {
        let column = ranking_column(record_type);
        let row = sqlx::query(&format!(
            r#"
            SELECT *
            FROM personal_records
            WHERE user_id = ? AND exercise_id = ? AND record_type = ?
            ORDER BY {column} DESC, achieved_at ASC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(exercise_id)
        .bind(record_type)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn insert_all(&self, records: &[PersonalRecord]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for r in records {
            sqlx::query(
                r#"
                INSERT INTO personal_records (
                    id, user_id, exercise_id, exercise_name, record_type,
                    weight, reps, one_rep_max, volume, achieved_at, session_id
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&r.id)
            .bind(&r.user_id)
            .bind(&r.exercise_id)
            .bind(&r.exercise_name)
            .bind(r.record_type)
            .bind(r.weight)
            .bind(i64::from(r.reps))
            .bind(r.one_rep_max)
            .bind(r.volume)
            .bind(r.achieved_at)
            .bind(&r.session_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        exercise_id: Option<&str>,
    ) -> Result<Vec<PersonalRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT *
            FROM personal_records
            WHERE user_id = ? AND (? IS NULL OR exercise_id = ?)
            ORDER BY exercise_name, record_type, achieved_at DESC
            "#,
        )
        .bind(user_id)
        .bind(exercise_id)
        .bind(exercise_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}

#[async_trait]
impl PlanStore for SqliteStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Plan>, StoreError> {
        let Some(name) = sqlx::query_scalar::<_, String>("SELECT name FROM plans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let exercise_rows = sqlx::query(
            r#"
            SELECT pe.order_index, pe.exercise_id, pe.rest_seconds, e.name
            FROM plan_exercises pe
            JOIN exercises e ON e.id = pe.exercise_id
            WHERE pe.plan_id = ?
            ORDER BY pe.order_index
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let set_rows = sqlx::query(
            r#"
            SELECT order_index, set_number, target_weight, target_reps
            FROM plan_sets
            WHERE plan_id = ?
            ORDER BY order_index, set_number
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut sets_by_exercise: HashMap<i64, Vec<PlannedSet>> = HashMap::new();
        for r in &set_rows {
            let order_index: i64 = r.try_get("order_index")?;
            sets_by_exercise.entry(order_index).or_default().push(PlannedSet {
                set_number: to_count(r.try_get("set_number")?, "set_number")?,
                target_weight: r.try_get("target_weight")?,
                target_reps: to_count(r.try_get("target_reps")?, "target_reps")?,
            });
        }

        let exercises = exercise_rows
            .iter()
            .map(|r| {
                let order_index: i64 = r.try_get("order_index")?;
                Ok(PlanExercise {
                    exercise_id: r.try_get("exercise_id")?,
                    name: r.try_get("name")?,
                    rest_seconds: to_count(r.try_get("rest_seconds")?, "rest_seconds")?,
                    sets: sets_by_exercise.remove(&order_index).unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Some(Plan {
            id: id.to_string(),
            name,
            exercises,
        }))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Plan>, StoreError> {
        let id: Option<String> = sqlx::query_scalar("SELECT id FROM plans WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match id {
            Some(id) => PlanStore::get_by_id(self, &id).await,
            None => Ok(None),
        }
    }

    async fn insert(&self, plan: &Plan) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO plans (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&plan.id)
            .bind(&plan.name)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

        for (idx, ex) in plan.exercises.iter().enumerate() {
            let order_index = idx as i64;
            sqlx::query(
                "INSERT INTO plan_exercises (plan_id, order_index, exercise_id, rest_seconds) VALUES (?, ?, ?, ?)",
            )
            .bind(&plan.id)
            .bind(order_index)
            .bind(&ex.exercise_id)
            .bind(i64::from(ex.rest_seconds))
            .execute(&mut *tx)
            .await?;

            for set in &ex.sets {
                sqlx::query(
                    r#"
                    INSERT INTO plan_sets (plan_id, order_index, set_number, target_weight, target_reps)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&plan.id)
                .bind(order_index)
                .bind(i64::from(set.set_number))
                .bind(set.target_weight)
                .bind(i64::from(set.target_reps))
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Plan>, StoreError> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM plans ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        let mut plans = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(plan) = PlanStore::get_by_id(self, &id).await? {
                plans.push(plan);
            }
        }
        Ok(plans)
    }
}

#[async_trait]
impl ExerciseCatalog for SqliteStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Exercise>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, primary_muscle, description FROM exercises WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(exercise_from_row).transpose()
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Exercise>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, primary_muscle, description FROM exercises WHERE name = ? COLLATE NOCASE",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(exercise_from_row).transpose()
    }

    async fn insert(&self, exercise: &Exercise) -> Result<bool, StoreError> {
        let res = sqlx::query(
            r#"
            INSERT INTO exercises (id, name, primary_muscle, description, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&exercise.id)
        .bind(&exercise.name)
        .bind(&exercise.primary_muscle)
        .bind(&exercise.description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match res {
            Ok(info) => Ok(info.rows_affected() == 1),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, muscle: Option<&str>) -> Result<Vec<Exercise>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, primary_muscle, description
            FROM exercises
            WHERE ? IS NULL OR primary_muscle = ?
            ORDER BY name
            "#,
        )
        .bind(muscle)
        .bind(muscle)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(exercise_from_row).collect()
    }
}
