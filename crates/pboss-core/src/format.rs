/// Clamp a backend-supplied second count into a displayable value.
/// Negative, NaN and infinite inputs violate the backend contract and become 0.
pub fn clamp_seconds(seconds: f64) -> f64 {
    if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        0.0
    }
}

/// Render a duration for display.
///
/// - `"0m"` for exactly zero
/// - `"<1m"` for anything above zero and below a minute
/// - `"Ym"` below an hour
/// - `"Xh Ym"` from one hour on, with minutes modulo 60
pub fn format_duration(seconds: f64) -> String {
    let seconds = clamp_seconds(seconds);
    if seconds == 0.0 {
        return "0m".to_string();
    }
    if seconds < 60.0 {
        return "<1m".to_string();
    }
    let total_minutes = (seconds / 60.0).floor() as u64;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Goal text for display; an empty goal is valid and shows as `(none)`.
pub fn goal_label(goal: &str) -> &str {
    if goal.is_empty() {
        "(none)"
    } else {
        goal
    }
}
