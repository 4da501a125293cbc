use anyhow::{Result, bail};
use colored::Colorize;
use itertools::Itertools;
use serde::Serialize;

use crate::{
    commands::{App, emit},
    models::{PersonalRecord, RecordType},
};

#[derive(Serialize)]
struct BestJson {
    exercise: String,
    record_type: RecordType,
    weight: f64,
    reps: u32,
    one_rep_max: f64,
    volume: f64,
    achieved_at: String,
}

/// Keeps the current best of each type; older, beaten records are history.
fn current_bests(records: &[PersonalRecord]) -> Vec<BestJson> {
    records
        .iter()
        .into_group_map_by(|r| (r.exercise_name.clone(), r.record_type))
        .into_iter()
        .filter_map(|(_, group)| {
            group
                .into_iter()
                .max_by(|a, b| {
                    a.value()
                        .total_cmp(&b.value())
                        .then(b.achieved_at.cmp(&a.achieved_at))
                })
        })
        .sorted_by(|a, b| {
            a.exercise_name
                .cmp(&b.exercise_name)
                .then(RecordType::ALL.iter().position(|t| *t == a.record_type).cmp(
                    &RecordType::ALL.iter().position(|t| *t == b.record_type),
                ))
        })
        .map(|r| BestJson {
            exercise: r.exercise_name.clone(),
            record_type: r.record_type,
            weight: r.weight,
            reps: r.reps,
            one_rep_max: r.one_rep_max,
            volume: r.volume,
            achieved_at: r.achieved_at.format("%d-%m-%Y").to_string(),
        })
        .collect()
}

pub async fn handle(exercise: Option<String>, app: &App) -> Result<()> {
    let exercise_id = match &exercise {
        Some(name) => match app.engine.catalog().find_by_name(name).await? {
            Some(ex) => Some(ex.id),
            None => bail!("no exercise named `{name}` (see `exercise list`)"),
        },
        None => None,
    };

    let records = app
        .engine
        .records()
        .list_for_user(&app.user, exercise_id.as_deref())
        .await?;
    let bests = current_bests(&records);

    emit(app.fmt, &bests, || {
        if bests.is_empty() {
            println!("{}", "  (no personal records yet)".dimmed());
            return;
        }

        println!("{}", "Personal records:".cyan().bold());
        for (name, group) in &bests.iter().chunk_by(|b| b.exercise.as_str()) {
            println!(" {} {}", "•".yellow(), name.bold());
            for b in group {
                println!(
                    "     {:<11} {} × {}  {}",
                    b.record_type.to_string(),
                    b.weight,
                    b.reps,
                    format!("1RM {:.1} • {} kg • {}", b.one_rep_max, b.volume, b.achieved_at).dimmed()
                );
            }
        }
    })
}
