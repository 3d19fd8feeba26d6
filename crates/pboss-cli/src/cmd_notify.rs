use clap::{Subcommand, ValueEnum};

use pboss_core::{format_duration, Config, PbossPaths};
use pboss_notify::{Channel, NotifyConfig, NotifyEvent};

#[derive(Subcommand)]
pub enum NotifyCmd {
    /// Send a sample nudge or day report to the channels subscribed to it
    Test {
        #[arg(long, value_enum, default_value_t = SampleEvent::Nudge)]
        event: SampleEvent,
    },
    /// Show each channel and which pboss events it receives
    Status,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SampleEvent {
    Nudge,
    #[value(name = "day_report")]
    DayReport,
}

impl SampleEvent {
    fn event(self) -> NotifyEvent {
        match self {
            SampleEvent::Nudge => NotifyEvent::Nudge {
                persona: "Productivity Boss".to_string(),
                message: "Test nudge: notifications are working.".to_string(),
            },
            SampleEvent::DayReport => NotifyEvent::DayReport {
                persona: "Productivity Boss".to_string(),
                goal: "Test report".to_string(),
                work: format_duration(7384.0),
                distraction: format_duration(300.0),
                idle: format_duration(40.0),
                message: "Notifications are working.".to_string(),
            },
        }
    }
}

pub fn run(cmd: NotifyCmd, paths: &PbossPaths) -> anyhow::Result<()> {
    let config = NotifyConfig::from_config(&Config::load(paths));
    match cmd {
        NotifyCmd::Test { event } => run_test(&config, event.event()),
        NotifyCmd::Status => {
            for line in status_lines(&config) {
                println!("{line}");
            }
            Ok(())
        }
    }
}

fn run_test(config: &NotifyConfig, event: NotifyEvent) -> anyhow::Result<()> {
    if config.channels.is_empty() {
        println!("No notification channels configured.");
        println!();
        println!("Nudges and day reports go to channels listed under \"notify_channels\":");
        println!(
            "  pboss config set notify_channels '[{{\"type\":\"ntfy\",\"url\":\"https://ntfy.sh/my-topic\",\"events\":[\"nudge\"]}}]'"
        );
        return Ok(());
    }
    if !config.enabled {
        println!("Note: notifications = false, so a running day sends nothing.");
    }

    let name = event.event_name();
    println!("Sending a test {name}...");
    for ch in config.channels.iter().filter(|ch| !ch.matches(&event)) {
        println!("  SKIP {} (not subscribed to {name})", ch.display_name());
    }
    for (channel, result) in pboss_notify::test_channels(config, &event) {
        match result {
            Ok(()) => println!("  OK   {channel}"),
            Err(e) => println!("  ERR  {channel}: {e}"),
        }
    }
    Ok(())
}

/// Comma-separated pboss events `channel` receives.
fn receives(channel: &Channel) -> String {
    let names: Vec<&str> = [SampleEvent::Nudge, SampleEvent::DayReport]
        .into_iter()
        .map(SampleEvent::event)
        .filter(|e| channel.matches(e))
        .map(|e| e.event_name())
        .collect();
    if names.is_empty() {
        "nothing (filter matches no pboss event)".to_string()
    } else {
        names.join(", ")
    }
}

fn status_lines(config: &NotifyConfig) -> Vec<String> {
    let mut lines = Vec::new();
    if !config.enabled {
        lines.push("Notifications are off (notifications = false); nudges only show in the app.".into());
    }
    if config.channels.is_empty() {
        lines.push("No notification channels configured.".into());
        return lines;
    }
    lines.push(format!("{} channel(s) configured:", config.channels.len()));
    for ch in &config.channels {
        lines.push(format!("  - {}: {}", ch.display_name(), receives(ch)));
    }
    lines
}
