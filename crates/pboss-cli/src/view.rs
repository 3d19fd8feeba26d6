//! Display strings shared by the terminal UI and plain mode.

use pboss_core::{format_duration, goal_label, EndOfDayReport, Persona, Totals};

pub const CONSENT_TEXT: &str = "Productivity Boss watches which application is in focus and how long \
you are idle, so your persona can nudge you and report on your day. \
Tracking data stays on this machine.";

pub const KEY_HINT: &str =
    "No API key stored. Persona messages fall back to canned text (set one with `k` or `pboss key set`).";

pub fn persona_line(persona: &Persona) -> String {
    format!("Persona: {}", persona.label())
}

pub fn goal_line(goal: &str) -> String {
    format!("Goal: {}", goal_label(goal))
}

/// `Work:`, `Distractions:` and `Idle:` lines.
pub fn counter_lines(totals: &Totals) -> [String; 3] {
    [
        format!("Work: {}", format_duration(totals.work)),
        format!("Distractions: {}", format_duration(totals.distraction)),
        format!("Idle: {}", format_duration(totals.idle)),
    ]
}

pub fn report_lines(report: &EndOfDayReport) -> Vec<String> {
    let mut lines = vec![
        format!("Day report for {} with {}", report.date, report.persona.label()),
        goal_line(&report.goal),
        format!("Work time: {}", format_duration(report.totals.work)),
        format!("Distraction time: {}", format_duration(report.totals.distraction)),
        format!("Idle time: {}", format_duration(report.totals.idle)),
    ];
    if !report.message.is_empty() {
        lines.push(String::new());
        lines.push(report.message.clone());
    }
    lines
}
