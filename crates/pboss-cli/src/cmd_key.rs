use clap::Subcommand;

use pboss_secret::{mask, CredentialStore, KeyringStore};

#[derive(Subcommand)]
pub enum KeyCmd {
    /// Store the API key in the OS keychain
    Set {
        /// The key (e.g. sk-...)
        key: String,
    },
    /// Show the stored key, masked
    Show,
}

pub fn run(cmd: KeyCmd) -> anyhow::Result<()> {
    let store = KeyringStore::default();
    match cmd {
        KeyCmd::Set { key } => set(&store, &key),
        KeyCmd::Show => show(&store),
    }
}

fn set(store: &dyn CredentialStore, key: &str) -> anyhow::Result<()> {
    println!("{}", set_message(store.store(key.trim())?));
    Ok(())
}

fn show(store: &dyn CredentialStore) -> anyhow::Result<()> {
    println!("{}", show_message(store.read()?.as_deref()));
    Ok(())
}

fn set_message(stored: bool) -> &'static str {
    if stored {
        "API key stored."
    } else {
        "Empty key, not stored."
    }
}

fn show_message(key: Option<&str>) -> String {
    match key {
        Some(k) => mask(k),
        None => "(no key stored)".to_string(),
    }
}
