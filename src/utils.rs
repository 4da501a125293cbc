/// Epley estimate. A single rep is its own max.
pub fn epley_1rm(weight: f64, reps: u32) -> f64 {
    if reps == 1 {
        weight
    } else {
        weight * (1.0 + f64::from(reps) / 30.0)
    }
}

pub fn format_duration(duration: chrono::Duration) -> String {
    let hours = duration.num_hours();
    let minutes = duration.num_minutes() % 60;
    let seconds = duration.num_seconds() % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

pub fn format_millis(ms: i64) -> String {
    format_duration(chrono::Duration::milliseconds(ms.max(0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epley_single_rep_is_the_weight() {
        assert_eq!(epley_1rm(100.0, 1), 100.0);
    }

    #[test]
    fn epley_scales_with_reps() {
        assert!((epley_1rm(100.0, 5) - 116.666_666).abs() < 1e-3);
        assert!((epley_1rm(100.0, 30) - 200.0).abs() < 1e-9);
    }

    #[test]
    fn durations_render_as_clock() {
        assert_eq!(format_millis(3_723_000), "01:02:03");
        assert_eq!(format_millis(-5), "00:00:00");
    }
}
