//! Completion and volume derived from a session's executed sets.

use crate::models::ExecutedExercise;

/// Share of planned sets (across all exercises) that have a completed
/// outcome, in percent. Zero when nothing is planned.
pub fn completion_percentage(exercises: &[ExecutedExercise]) -> f64 {
    let planned: usize = exercises.iter().map(|e| e.planned_sets.len()).sum();
    if planned == 0 {
        return 0.0;
    }

    let completed = exercises
        .iter()
        .flat_map(|e| {
            e.planned_sets
                .iter()
                .filter(|p| e.executed(p.set_number).is_some_and(|s| s.is_completed))
        })
        .count();

    (100.0 * completed as f64 / planned as f64).clamp(0.0, 100.0)
}

pub fn total_volume(exercises: &[ExecutedExercise]) -> f64 {
    exercises
        .iter()
        .flat_map(|e| e.executed_sets.iter())
        .map(|s| s.volume())
        .sum()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{ExecutedSet, PlannedSet};

    fn exercise(sets: u32) -> ExecutedExercise {
        ExecutedExercise {
            exercise_id: "bench".into(),
            name: "Bench press".into(),
            order_index: 0,
            planned_sets: (1..=sets)
                .map(|n| PlannedSet {
                    set_number: n,
                    target_weight: 60.0,
                    target_reps: 8,
                })
                .collect(),
            executed_sets: Vec::new(),
            rest_between_sets: 90,
        }
    }

    #[test]
    fn empty_plan_is_zero_percent() {
        assert_eq!(completion_percentage(&[]), 0.0);
        assert_eq!(completion_percentage(&[exercise(0)]), 0.0);
    }

    #[test]
    fn skipped_sets_do_not_count() {
        let mut ex = exercise(4);
        let now = Utc::now();
        let planned = ex.planned_sets.clone();
        ex.record(ExecutedSet::completed(&planned[0], 60.0, 8, now));
        ex.record(ExecutedSet::skipped(&planned[1], now));

        let exercises = [ex];
        assert_eq!(completion_percentage(&exercises), 25.0);
        assert_eq!(total_volume(&exercises), 480.0);
    }

    #[test]
    fn all_completed_is_exactly_one_hundred() {
        let mut ex = exercise(3);
        let now = Utc::now();
        for p in ex.planned_sets.clone() {
            ex.record(ExecutedSet::completed(&p, 50.0, 10, now));
        }

        let exercises = [ex, exercise(0)];
        assert_eq!(completion_percentage(&exercises), 100.0);
        assert_eq!(total_volume(&exercises), 1500.0);
    }
}
