use std::fs::read_to_string;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    cli::PlanCmd,
    commands::{App, emit, print_columns},
    models::{Plan, PlanExercise, PlannedSet},
    types::PlanImport,
};

#[derive(Serialize)]
struct PlanJson<'a> {
    idx: usize,
    #[serde(flatten)]
    plan: &'a Plan,
}

pub async fn handle(cmd: PlanCmd, app: &App) -> Result<()> {
    match cmd {
        PlanCmd::Import { files } => {
            if files.is_empty() {
                println!("{} no plan file provided", "warning:".yellow().bold());
            }
            for f in files {
                if let Err(e) = import_single_plan(app, &f).await {
                    match e.downcast_ref::<std::io::Error>() {
                        Some(io) if io.kind() == std::io::ErrorKind::NotFound => println!(
                            "{} cannot open file `{}` – file not found",
                            "error:".red().bold(),
                            f
                        ),
                        _ => return Err(e),
                    }
                }
            }
        }

        PlanCmd::List => {
            let plans = app.engine.plans().list().await?;
            let rows: Vec<PlanJson> = plans
                .iter()
                .enumerate()
                .map(|(i, plan)| PlanJson { idx: i + 1, plan })
                .collect();
            emit(app.fmt, &rows, || print_list(&rows))?;
        }

        PlanCmd::Show { plan } => {
            let Some(found) = app.resolve_plan(&plan).await? else {
                bail!("no plan `{plan}` (see `plan list`)");
            };
            emit(app.fmt, &found, || print_plan(&found))?;
        }
    }

    Ok(())
}

async fn import_single_plan(app: &App, file: &str) -> Result<()> {
    let raw = read_to_string(file)?;
    let import: PlanImport = toml::from_str(&raw).with_context(|| format!("parsing `{file}`"))?;

    if import.exercise.is_empty() {
        println!(
            "{} `{}` has no [[exercise]] entries – skipping",
            "warning:".yellow().bold(),
            import.name
        );
        return Ok(());
    }

    if app.engine.plans().find_by_name(&import.name).await?.is_some() {
        println!(
            "{} plan `{}` already exists – skipping",
            "warning:".yellow().bold(),
            import.name
        );
        return Ok(());
    }

    let mut exercises = Vec::with_capacity(import.exercise.len());
    let mut missing = Vec::new();
    for def in &import.exercise {
        if def.sets == 0 || def.reps == 0 {
            bail!("`{}` in `{file}` needs at least one set and one rep", def.name);
        }
        if !def.weight.is_finite() || def.weight < 0.0 {
            bail!("`{}` in `{file}` has an invalid weight", def.name);
        }

        let Some(ex) = app.engine.catalog().find_by_name(&def.name).await? else {
            missing.push(def.name.as_str());
            continue;
        };

        exercises.push(PlanExercise {
            exercise_id: ex.id,
            name: ex.name,
            rest_seconds: def.rest,
            sets: (1..=def.sets)
                .map(|n| PlannedSet {
                    set_number: n,
                    target_weight: def.weight,
                    target_reps: def.reps,
                })
                .collect(),
        });
    }

    if !missing.is_empty() {
        println!(
            "{} cannot import plan `{}` – missing exercises: {} (add them with `exercise add`)",
            "warning:".yellow().bold(),
            import.name,
            missing.join(", ")
        );
        return Ok(());
    }

    let plan = Plan {
        id: Uuid::new_v4().to_string(),
        name: import.name,
        exercises,
    };
    app.engine
        .plans()
        .insert(&plan)
        .await
        .with_context(|| format!("DB error inserting plan `{}`", plan.name))?;

    println!(
        "{} imported plan `{}` ({} exercises)",
        "ok:".green().bold(),
        plan.name,
        plan.exercises.len()
    );
    Ok(())
}

fn print_list(rows: &[PlanJson]) {
    if rows.is_empty() {
        println!("{}", "  (no plans found)".dimmed());
        return;
    }

    println!("{}", "Plans:".cyan().bold());
    let idx_w = rows.len().to_string().len();
    let lines = rows
        .iter()
        .map(|r| {
            let sets: usize = r.plan.exercises.iter().map(|e| e.sets.len()).sum();
            let left = format!(
                " {} • {}",
                format!("{:>idx_w$}", r.idx).yellow(),
                r.plan.name.bold()
            );
            let right = format!("{} exercises, {} sets", r.plan.exercises.len(), sets)
                .dimmed()
                .to_string();
            (left, right)
        })
        .collect();
    print_columns(lines);
}

fn print_plan(plan: &Plan) {
    println!("{} {}", "Plan:".cyan().bold(), plan.name.bold());

    let last = plan.exercises.len().saturating_sub(1);
    for (i, ex) in plan.exercises.iter().enumerate() {
        let connector = if i == last { "└─" } else { "├─" };
        let targets = ex
            .sets
            .iter()
            .map(|s| format!("{}×{}", s.target_weight, s.target_reps))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            " {} {} {} {}",
            connector,
            ex.name.bold(),
            targets,
            format!("(rest {}s)", ex.rest_seconds).dimmed()
        );
    }
}
