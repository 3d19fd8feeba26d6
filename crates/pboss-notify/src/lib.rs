use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;

use pboss_core::{format_duration, goal_label, EndOfDayReport, Persona};

// ── Config ──

/// Notification channel, stored in `config.json` under key `notify_channels`.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum Channel {
    #[serde(rename = "desktop")]
    Desktop {
        #[serde(default = "all_events")]
        events: Vec<String>,
    },
    #[serde(rename = "ntfy")]
    Ntfy {
        url: String,
        #[serde(default = "all_events")]
        events: Vec<String>,
    },
    #[serde(rename = "webhook")]
    Webhook {
        url: String,
        #[serde(default = "all_events")]
        events: Vec<String>,
    },
}

fn all_events() -> Vec<String> {
    vec!["*".to_string()]
}

impl Channel {
    fn events(&self) -> &[String] {
        match self {
            Channel::Desktop { events } => events,
            Channel::Ntfy { events, .. } => events,
            Channel::Webhook { events, .. } => events,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Channel::Desktop { .. } => "desktop".to_string(),
            Channel::Ntfy { url, .. } => format!("ntfy({url})"),
            Channel::Webhook { url, .. } => format!("webhook({url})"),
        }
    }

    /// Whether this channel's `events` filter accepts `event`.
    pub fn matches(&self, event: &NotifyEvent) -> bool {
        let name = event.event_name();
        self.events().iter().any(|e| e == name || e == "*")
    }
}

/// Top-level notify configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub channels: Vec<Channel>,
}

impl NotifyConfig {
    /// Build from the loaded config. A missing `notify_channels` key means a
    /// single desktop channel; an unparseable one means no channels.
    pub fn from_config(config: &pboss_core::Config) -> Self {
        let channels = match &config.notify_channels {
            None => vec![Channel::Desktop {
                events: all_events(),
            }],
            Some(val) => match serde_json::from_value(val.clone()) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(error = %e, "notify_channels is malformed, notifications disabled");
                    Vec::new()
                }
            },
        };
        Self {
            enabled: config.notifications,
            channels,
        }
    }
}

// ── Notification Events ──

#[derive(Debug, Clone, PartialEq)]
pub enum NotifyEvent {
    /// A persona message delivered by a status poll.
    Nudge { persona: String, message: String },
    /// The end-of-day summary.
    DayReport {
        persona: String,
        goal: String,
        work: String,
        distraction: String,
        idle: String,
        message: String,
    },
}

impl NotifyEvent {
    pub fn nudge(persona: &Persona, message: &str) -> Self {
        NotifyEvent::Nudge {
            persona: persona.label(),
            message: message.to_string(),
        }
    }

    pub fn day_report(report: &EndOfDayReport) -> Self {
        NotifyEvent::DayReport {
            persona: report.persona.label(),
            goal: goal_label(&report.goal).to_string(),
            work: format_duration(report.totals.work),
            distraction: format_duration(report.totals.distraction),
            idle: format_duration(report.totals.idle),
            message: report.message.clone(),
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            NotifyEvent::Nudge { .. } => "nudge",
            NotifyEvent::DayReport { .. } => "day_report",
        }
    }

    /// Short title and body, shared by desktop and ntfy.
    pub fn headline(&self) -> (String, String) {
        match self {
            NotifyEvent::Nudge { persona, message } => (persona.clone(), message.clone()),
            NotifyEvent::DayReport {
                persona,
                work,
                distraction,
                idle,
                message,
                ..
            } => {
                let totals = format!("Work {work} · Distractions {distraction} · Idle {idle}");
                let body = if message.is_empty() {
                    totals
                } else {
                    format!("{totals}\n{message}")
                };
                (format!("Day over: {persona}"), body)
            }
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            NotifyEvent::Nudge { persona, message } => serde_json::json!({
                "persona": persona,
                "message": message,
            }),
            NotifyEvent::DayReport {
                persona,
                goal,
                work,
                distraction,
                idle,
                message,
            } => serde_json::json!({
                "persona": persona,
                "goal": goal,
                "work": work,
                "distraction": distraction,
                "idle": idle,
                "message": message,
            }),
        }
    }
}

// ── Notifier ──

/// Notification permission, modelled on the browser Notification API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Permission {
    #[default]
    Default,
    Granted,
    Denied,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Ask the user (or the environment) for permission to notify.
    async fn request_permission(&self) -> Permission;

    /// Deliver one event. Failures are logged by the implementation.
    async fn notify(&self, event: &NotifyEvent);
}

/// Production notifier: fans events out to the configured channels.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    config: NotifyConfig,
}

impl ChannelNotifier {
    pub fn new(config: NotifyConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Notifier for ChannelNotifier {
    async fn request_permission(&self) -> Permission {
        if self.config.enabled && !self.config.channels.is_empty() {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }

    /// Returns as soon as delivery is handed to a blocking worker; slow
    /// channels never hold up the caller.
    async fn notify(&self, event: &NotifyEvent) {
        let config = self.config.clone();
        let event = event.clone();
        tokio::task::spawn_blocking(move || dispatch(&config, &event));
    }
}

/// Test notifier: answers permission with a fixed value and records every
/// delivered event.
#[derive(Debug, Default)]
pub struct CollectNotifier {
    answer: Permission,
    asked: AtomicUsize,
    events: Mutex<Vec<NotifyEvent>>,
}

impl CollectNotifier {
    pub fn new(answer: Permission) -> Self {
        Self {
            answer,
            ..Self::default()
        }
    }

    pub fn times_asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<NotifyEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Notifier for CollectNotifier {
    async fn request_permission(&self) -> Permission {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer
    }

    async fn notify(&self, event: &NotifyEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Dispatch ──

const TIMEOUT: Duration = Duration::from_secs(5);

/// Send `event` to every channel whose filter matches.
/// Errors are logged but never propagated.
pub fn dispatch(config: &NotifyConfig, event: &NotifyEvent) {
    for channel in &config.channels {
        if !channel.matches(event) {
            continue;
        }
        if let Err(e) = send(channel, event) {
            tracing::warn!(channel = %channel.display_name(), error = %e, "notification failed");
        }
    }
}

/// Send `event` now to every channel subscribed to it and report each
/// outcome. Unlike [`dispatch`], failures are returned instead of logged.
pub fn test_channels(config: &NotifyConfig, event: &NotifyEvent) -> Vec<(String, Result<(), String>)> {
    config
        .channels
        .iter()
        .filter(|ch| ch.matches(event))
        .map(|ch| (ch.display_name(), send(ch, event).map_err(|e| e.to_string())))
        .collect()
}

fn send(channel: &Channel, event: &NotifyEvent) -> anyhow::Result<()> {
    match channel {
        Channel::Desktop { .. } => send_desktop(event),
        Channel::Ntfy { url, .. } => send_ntfy(url, event),
        Channel::Webhook { url, .. } => send_webhook(url, event),
    }
}

fn agent() -> ureq::Agent {
    ureq::Agent::config_builder()
        .timeout_global(Some(TIMEOUT))
        .build()
        .new_agent()
}

// ── Desktop ──

fn send_desktop(event: &NotifyEvent) -> anyhow::Result<()> {
    let (title, body) = event.headline();
    let status = desktop_command(&title, &body).status()?;
    if !status.success() {
        anyhow::bail!("notifier exited with {status}");
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn desktop_command(title: &str, body: &str) -> Command {
    let script = format!(
        "display notification {} with title {}",
        applescript_quote(body),
        applescript_quote(title)
    );
    let mut cmd = Command::new("osascript");
    cmd.arg("-e").arg(script);
    cmd
}

#[cfg(not(target_os = "macos"))]
fn desktop_command(title: &str, body: &str) -> Command {
    let mut cmd = Command::new("notify-send");
    cmd.arg("--app-name=pboss").arg(title).arg(body);
    cmd
}

#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn applescript_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

// ── ntfy ──

fn send_ntfy(url: &str, event: &NotifyEvent) -> anyhow::Result<()> {
    let (title, body, priority) = format_ntfy(event);
    agent()
        .post(url)
        .header("Title", &title)
        .header("Priority", priority)
        .send(&body)?;
    Ok(())
}

fn format_ntfy(event: &NotifyEvent) -> (String, String, &'static str) {
    let (title, body) = event.headline();
    let priority = match event {
        NotifyEvent::Nudge { .. } => "high",
        NotifyEvent::DayReport { .. } => "default",
    };
    (title, body, priority)
}

// ── Webhook (generic JSON POST) ──

fn send_webhook(url: &str, event: &NotifyEvent) -> anyhow::Result<()> {
    let payload = format_webhook(event);
    agent()
        .post(url)
        .header("Content-Type", "application/json")
        .send(payload.to_string())?;
    Ok(())
}

fn format_webhook(event: &NotifyEvent) -> serde_json::Value {
    serde_json::json!({
        "event_type": event.event_name(),
        "data": event.to_json(),
    })
}

// ── Tests ──
