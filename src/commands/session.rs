use anyhow::{Context, Result, bail};
use colored::Colorize;
use serde::Serialize;

use crate::{
    cli::SessionCmd,
    commands::{App, OutputFmt, emit, print_columns},
    engine::{LiveSession, SessionView, SetResult, processor::{self, Advance}},
    models::{ExecutedExercise, PersonalRecord, SessionStatus, WorkoutSession},
    utils::{format_duration, format_millis},
};

pub async fn handle(cmd: SessionCmd, app: &App) -> Result<()> {
    match cmd {
        SessionCmd::Start { plan } => {
            let Some(found) = app.resolve_plan(&plan).await? else {
                bail!("no plan `{plan}` (see `plan list`)");
            };

            let live = app.engine.start(&found.id, &app.user).await?;
            let view = live.view().await?;
            emit(app.fmt, &view, || {
                println!(
                    "{} started `{}` ({} exercises)",
                    "ok:".green().bold(),
                    found.name.bold(),
                    found.exercises.len()
                );
                render(&view);
            })?;
        }

        SessionCmd::Show => match app.engine.active(&app.user).await? {
            Some(live) => {
                let view = live.view().await?;
                emit(app.fmt, &view, || render(&view))?;
            }
            None => emit(app.fmt, &Option::<SessionView>::None, no_session)?,
        },

        SessionCmd::Watch => watch(app).await?,

        SessionCmd::Pause => {
            let view = current(app).await?.pause().await?;
            report(app.fmt, &view, "paused")?;
        }

        SessionCmd::Resume => {
            let view = current(app).await?.resume().await?;
            report(app.fmt, &view, "resumed")?;
        }

        SessionCmd::SkipRest => {
            let view = current(app).await?.skip_rest().await?;
            report(app.fmt, &view, "rest skipped")?;
        }

        SessionCmd::Rest { delta } => {
            let step = i64::from(app.config.rest_step_seconds);
            let secs = delta.seconds(step);
            let view = current(app).await?.adjust_rest_time(secs).await?;
            report(app.fmt, &view, &format!("rest adjusted by {secs:+}s"))?;
        }

        SessionCmd::Done { weight, reps } => {
            // Validate before touching the session.
            let (weight, reps) = processor::parse_set_input(&weight, &reps)?;
            let live = current(app).await?;
            let result = live.complete_current_set(weight, i64::from(reps)).await?;
            emit(app.fmt, &result, || render_set(&result))?;
            live.clear_new_record_notifications();
        }

        SessionCmd::Skip => {
            let result = current(app).await?.skip_current_set().await?;
            emit(app.fmt, &result, || render_set(&result))?;
        }

        SessionCmd::AddSet => {
            let view = current(app).await?.add_set_to_current_exercise().await?;
            report(app.fmt, &view, "set added")?;
        }

        SessionCmd::RemoveSet => {
            let view = current(app).await?.remove_set_from_current_exercise().await?;
            report(app.fmt, &view, "set removed")?;
        }

        SessionCmd::Finish => {
            let view = current(app).await?.complete().await?;
            emit(app.fmt, &view, || {
                println!(
                    "{} session finished in {} – {:.0}% complete, {} kg moved",
                    "ok:".green().bold(),
                    format_millis(view.elapsed_ms).bold(),
                    view.session.completion_percentage,
                    view.session.total_volume
                );
            })?;
        }

        SessionCmd::Abandon => {
            let view = current(app).await?.abandon().await?;
            emit(app.fmt, &view, || {
                println!("{} session abandoned", "ok:".green().bold());
            })?;
        }

        SessionCmd::Log { limit } => {
            let sessions = app.engine.sessions().list_for_user(&app.user, limit).await?;
            let rows: Vec<LogJson> = sessions.iter().map(LogJson::from).collect();
            emit(app.fmt, &rows, || print_log(&rows))?;
        }
    }

    Ok(())
}

async fn current(app: &App) -> Result<LiveSession> {
    app.engine
        .active(&app.user)
        .await?
        .with_context(|| {
            format!(
                "no active session for `{}` – start one with `session start <plan>`",
                app.user
            )
        })
}

fn no_session() {
    println!("{}", "  (no active session)".dimmed());
}

fn report(fmt: OutputFmt, view: &SessionView, what: &str) -> Result<()> {
    emit(fmt, view, || {
        println!("{} {}", "ok:".green().bold(), what);
        render(view);
    })
}

async fn watch(app: &App) -> Result<()> {
    let live = current(app).await?;
    let mut rx = live.observe();

    loop {
        let view = rx.borrow_and_update().clone();
        match view {
            Some(view) => {
                emit(app.fmt, &view, || {
                    println!();
                    render(&view);
                })?;
                if view.session.status.is_terminal() {
                    break;
                }
            }
            None if app.fmt == OutputFmt::Human => {
                println!("{}", "waiting for the first tick…".dimmed())
            }
            None => {}
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(())
}

fn status_label(status: SessionStatus) -> colored::ColoredString {
    let s = status.to_string();
    match status {
        SessionStatus::InProgress => s.green().bold(),
        SessionStatus::Paused => s.yellow().bold(),
        SessionStatus::Resting => s.cyan().bold(),
        SessionStatus::Completed => s.blue().bold(),
        SessionStatus::Abandoned => s.red().bold(),
    }
}

fn render(view: &SessionView) {
    let s = &view.session;
    println!(
        "{} {} • {} • {}",
        "Session:".cyan().bold(),
        s.plan_name.bold(),
        status_label(s.status),
        format_millis(view.elapsed_ms)
    );

    if let Some(rest) = view.rest_remaining_ms {
        println!("  {} {} left", "rest:".cyan(), format_millis(rest).bold());
    }

    for (i, ex) in s.exercises.iter().enumerate() {
        let is_current = i == view.pointer.exercise_index && !s.status.is_terminal();
        let marker = if is_current { "›".yellow().bold() } else { " ".normal() };
        println!("{} {} {}", marker, format!("{}.", i + 1).yellow(), ex.name.bold());
        render_sets(ex, is_current.then_some(view.pointer.set_index));
    }

    println!(
        "  {} {:.0}% complete, {} kg",
        "progress:".cyan(),
        s.completion_percentage,
        s.total_volume
    );

    if view.fully_attempted && !s.status.is_terminal() {
        println!(
            "{} every set is logged – run `session finish` to wrap up",
            "note:".blue().bold()
        );
    }
    render_records(&view.new_records);
}

fn render_sets(ex: &ExecutedExercise, current: Option<usize>) {
    for (j, planned) in ex.planned_sets.iter().enumerate() {
        let target = format!("{} × {}", planned.target_weight, planned.target_reps);
        let line = match ex.executed(planned.set_number) {
            Some(done) if done.is_skipped => format!("{} {}", "–".dimmed(), "skipped".dimmed()),
            Some(done) => format!(
                "{} {} × {}",
                "✓".green(),
                done.actual_weight,
                done.actual_reps
            ),
            None if current == Some(j) => format!("{} {}", "›".yellow().bold(), target.bold()),
            None => format!("{} {}", "·".dimmed(), target.dimmed()),
        };
        println!("     set {} {}", planned.set_number, line);
    }
}

fn render_records(records: &[PersonalRecord]) {
    for r in records {
        println!(
            "{} new {} on {}: {} × {} (1RM {:.1})",
            "PR!".magenta().bold(),
            r.record_type,
            r.exercise_name.bold(),
            r.weight,
            r.reps,
            r.one_rep_max
        );
    }
}

fn render_set(result: &SetResult) {
    let set = &result.recorded;
    if set.is_skipped {
        println!("{} set {} skipped", "ok:".green().bold(), set.set_number);
    } else {
        println!(
            "{} set {} logged: {} × {}",
            "ok:".green().bold(),
            set.set_number,
            set.actual_weight,
            set.actual_reps
        );
    }

    match result.advance {
        Advance::Resting { rest_ms } => {
            println!("  {} {}", "rest:".cyan(), format_millis(rest_ms).bold());
        }
        Advance::Moved(_) => {}
        Advance::Finished => println!(
            "{} that was the last set – run `session finish` to wrap up",
            "note:".blue().bold()
        ),
    }

    render_records(&result.new_records);
}

#[derive(Serialize)]
struct LogJson {
    id: String,
    plan: String,
    status: SessionStatus,
    started: String,
    duration: Option<String>,
    completion_percentage: f64,
    total_volume: f64,
}

impl From<&WorkoutSession> for LogJson {
    fn from(s: &WorkoutSession) -> Self {
        Self {
            id: s.id.clone(),
            plan: s.plan_name.clone(),
            status: s.status,
            started: s.start_time.format("%d-%m-%Y %H:%M").to_string(),
            duration: s.end_time.map(|end| {
                let paused = chrono::Duration::milliseconds(s.paused_duration_ms);
                format_duration(end - s.start_time - paused)
            }),
            completion_percentage: s.completion_percentage,
            total_volume: s.total_volume,
        }
    }
}

fn print_log(rows: &[LogJson]) {
    if rows.is_empty() {
        println!("{}", "  (no sessions yet)".dimmed());
        return;
    }

    println!("{}", "Sessions:".cyan().bold());
    let lines = rows
        .iter()
        .map(|r| {
            let left = format!(
                " {} • {} ({})",
                r.started.yellow(),
                r.plan.bold(),
                status_label(r.status)
            );
            let right = format!(
                "{} • {:.0}% • {} kg",
                r.duration.as_deref().unwrap_or("--:--:--"),
                r.completion_percentage,
                r.total_volume
            )
            .dimmed()
            .to_string();
            (left, right)
        })
        .collect();
    print_columns(lines);
}
