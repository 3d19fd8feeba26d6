use clap::Subcommand;

use pboss_core::config::{parse_value, read_map, write_map};
use pboss_core::PbossPaths;

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value
    Set {
        /// Config key (e.g. poll_interval_secs)
        key: String,
        /// Config value (true/false/number/JSON/string)
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Print the config file location
    Path,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, paths: &PbossPaths) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Set { key, value } => set(paths, &key, &value),
        ConfigCmd::Get { key } => get(paths, &key),
        ConfigCmd::List => list(paths),
        ConfigCmd::Path => {
            println!("{}", paths.config_json.display());
            Ok(())
        }
    }
}

// ── Command Implementations ──

/// `pboss config set <key> <value>`
pub fn set(paths: &PbossPaths, key: &str, value: &str) -> anyhow::Result<()> {
    paths.ensure_layout()?;
    let mut config = read_map(&paths.config_json)?;
    config.insert(key.to_string(), parse_value(value));
    write_map(&paths.config_json, &config)?;
    println!("{key} = {value}");
    Ok(())
}

/// `pboss config get <key>`
pub fn get(paths: &PbossPaths, key: &str) -> anyhow::Result<()> {
    let config = read_map(&paths.config_json)?;
    match config.get(key) {
        Some(val) => println!("{val}"),
        None => println!("(not set)"),
    }
    Ok(())
}

/// `pboss config list`
pub fn list(paths: &PbossPaths) -> anyhow::Result<()> {
    let config = read_map(&paths.config_json)?;
    if config.is_empty() {
        println!("(no config set)");
    } else {
        for (k, v) in &config {
            println!("{k} = {v}");
        }
    }
    Ok(())
}
