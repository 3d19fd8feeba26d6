mod cmd_config;
mod cmd_day;
mod cmd_key;
mod cmd_notify;
mod logging;
mod plain;
mod view;
#[cfg(feature = "tui")]
mod tui;

use clap::{Parser, Subcommand};

use pboss_core::PbossPaths;

#[derive(Parser)]
#[command(
    name = "pboss",
    version,
    about = "Plan a day, pick a persona, and let the tracker keep you honest"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start a tracking day (interactive unless --plain)
    Day {
        /// Print status lines instead of opening the terminal UI
        #[arg(long)]
        plain: bool,
        /// Persona id (plain mode; defaults to the last persona used)
        #[arg(long)]
        persona: Option<String>,
        /// Goal for the day (plain mode)
        #[arg(long, default_value = "")]
        goal: String,
        /// Accept the tracking consent if it is still pending (plain mode)
        #[arg(long)]
        accept_consent: bool,
        /// Also log to stderr (plain mode)
        #[arg(long)]
        verbose: bool,
    },
    /// Manage the API key handed to the backend
    Key {
        #[command(subcommand)]
        cmd: cmd_key::KeyCmd,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
    /// Notification channels
    Notify {
        #[command(subcommand)]
        cmd: cmd_notify::NotifyCmd,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = PbossPaths::discover();

    match cli.cmd {
        None => cmd_day::execute(&paths, cmd_day::DayArgs::default()),
        Some(Command::Day {
            plain,
            persona,
            goal,
            accept_consent,
            verbose,
        }) => cmd_day::execute(
            &paths,
            cmd_day::DayArgs {
                plain,
                persona,
                goal,
                accept_consent,
                verbose,
            },
        ),
        Some(Command::Key { cmd }) => cmd_key::run(cmd),
        Some(Command::Config { cmd }) => cmd_config::run(cmd, &paths),
        Some(Command::Notify { cmd }) => cmd_notify::run(cmd, &paths),
    }
}
