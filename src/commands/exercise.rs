use std::{collections::BTreeSet, path::Path};

use anyhow::{Context, Result, bail};
use colored::Colorize;
use uuid::Uuid;

use crate::{
    cli::ExerciseCmd,
    commands::{App, emit, print_columns},
    models::Exercise,
    types::{ALLOWED_MUSCLES, ExerciseImport, best_muscle_suggestion, canonical_muscle},
};

fn unknown_muscle(name: &str, muscle: &str) -> String {
    match best_muscle_suggestion(muscle) {
        Some(sug) => format!("`{name}` – unknown muscle `{muscle}` -- did you mean: `{}`?", sug.green()),
        None => format!("`{name}` – unknown muscle `{muscle}`"),
    }
}

fn allowed_muscles() -> String {
    let mut allowed = ALLOWED_MUSCLES.iter().map(String::as_str).collect::<Vec<_>>();
    allowed.sort_unstable();
    allowed.join(", ")
}

pub async fn handle(cmd: ExerciseCmd, app: &App) -> Result<()> {
    let catalog = app.engine.catalog();

    match cmd {
        ExerciseCmd::Add { name, muscle, desc } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                bail!("exercise name cannot be empty");
            }
            let Some(muscle) = canonical_muscle(&muscle) else {
                bail!(
                    "{}\n{} {}",
                    unknown_muscle(&name, &muscle),
                    "Allowed muscles:".cyan().bold(),
                    allowed_muscles()
                );
            };

            let exercise = Exercise {
                id: Uuid::new_v4().to_string(),
                name,
                primary_muscle: muscle,
                description: desc.filter(|d| !d.trim().is_empty()),
            };

            if catalog.insert(&exercise).await? {
                println!("{} Exercise \"{}\" added", "ok:".green().bold(), exercise.name);
            } else {
                println!(
                    "{} Exercise \"{}\" already exists – use `ex list` to view all exercises",
                    "warning:".yellow().bold(),
                    exercise.name
                );
            }
        }

        ExerciseCmd::Import { file } => {
            let toml_str = tokio::fs::read_to_string(Path::new(&file))
                .await
                .with_context(|| format!("Could not read file: `{}`", file))?;

            let import: ExerciseImport = toml::from_str(&toml_str)
                .context("Failed to parse TOML: Expected `[[exercise]] entries`")?;

            if import.exercise.is_empty() {
                println!("{}", "warning: no [[exercise]] entries found".yellow().bold());
                return Ok(());
            }

            let mut inserted = 0;
            let mut skipped = 0;
            let mut unknowns: BTreeSet<String> = BTreeSet::new();

            for ex in import.exercise {
                let name = ex.name.trim();
                if name.is_empty() {
                    println!("{} entry without a name skipped", "warning:".yellow().bold());
                    skipped += 1;
                    continue;
                }

                let Some(muscle) = canonical_muscle(&ex.primary_muscle) else {
                    println!(
                        "{} {} skipped",
                        "warning:".yellow().bold(),
                        unknown_muscle(name, &ex.primary_muscle)
                    );
                    skipped += 1;
                    unknowns.insert(ex.primary_muscle);
                    continue;
                };

                let exercise = Exercise {
                    id: Uuid::new_v4().to_string(),
                    name: name.to_string(),
                    primary_muscle: muscle,
                    description: ex.description,
                };

                let added = catalog
                    .insert(&exercise)
                    .await
                    .with_context(|| format!("DB error inserting `{}`", exercise.name))?;

                if added {
                    inserted += 1;
                    println!("{} `{}`", "ok:".green().bold(), exercise.name);
                } else {
                    skipped += 1;
                    println!("{} `{}` (already exists)", "info:".blue().bold(), exercise.name);
                }
            }

            println!(
                "\n{} {} inserted, {} skipped",
                "Summary:".cyan().bold(),
                inserted,
                skipped
            );

            if !unknowns.is_empty() {
                let bad = unknowns.into_iter().collect::<Vec<_>>().join(", ");

                println!();
                println!("{} {}", "Unknown muscles:".yellow().bold(), bad);
                println!("{} {}", "Allowed muscles:".cyan().bold(), allowed_muscles());
                println!(
                    "{} Muscle names are case-insensitive (e.g. `chest` == `CHEST` == `Chest`)",
                    "note:".blue().bold()
                )
            }
        }

        ExerciseCmd::List { muscle } => {
            let filter = muscle.map(|m| m.to_string());
            let exercises = catalog.list(filter.as_deref()).await?;

            emit(app.fmt, &exercises, || {
                if exercises.is_empty() {
                    println!("{}", "  (no exercises found)".dimmed());
                    return;
                }

                println!("{}", "Exercises:".cyan().bold());
                let idx_w = exercises.len().to_string().len();
                let lines = exercises
                    .iter()
                    .enumerate()
                    .map(|(i, ex)| {
                        let left = format!(
                            " {} • {} ({})",
                            format!("{:>idx_w$}", i + 1).yellow(),
                            ex.name.bold(),
                            ex.primary_muscle.yellow()
                        );
                        let right = ex
                            .description
                            .as_deref()
                            .map(|d| d.dimmed().to_string())
                            .unwrap_or_default();
                        (left, right)
                    })
                    .collect();
                print_columns(lines);
            })?;
        }
    }

    Ok(())
}
