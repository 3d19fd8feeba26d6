use std::sync::Arc;

use pboss_client::HttpBackend;
use pboss_core::{Config, PbossPaths, PersonaId};
use pboss_launch::{BackendProcess, LaunchError, LaunchSpec, ProbeSettings};
use pboss_notify::{ChannelNotifier, NotifyConfig};
use pboss_secret::{CredentialStore, KeyringStore};
use pboss_session::{Command, SessionHandle, SessionSettings, Update};
use tokio::sync::mpsc;

use crate::plain::{self, PlainOptions};

#[derive(Debug, Default)]
pub struct DayArgs {
    pub plain: bool,
    pub persona: Option<PersonaId>,
    pub goal: String,
    pub accept_consent: bool,
    pub verbose: bool,
}

/// `pboss day`: bring up the backend if configured, then run one tracking
/// day in the terminal UI or in plain mode.
pub fn execute(paths: &PbossPaths, args: DayArgs) -> anyhow::Result<()> {
    let _guard = crate::logging::init(paths, args.plain && args.verbose);
    let config = Config::load(paths);
    tracing::info!(backend = %config.backend_url, plain = args.plain, "pboss day");
    tokio::runtime::Runtime::new()?.block_on(run(config, args))
}

async fn run(config: Config, args: DayArgs) -> anyhow::Result<()> {
    let secrets: Arc<dyn CredentialStore> = Arc::new(KeyringStore::default());
    let api_key = secrets.read().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "credential store unreadable, starting backend without a key");
        None
    });
    let api_key_present = api_key.is_some();
    let backend_process = start_backend(&config, api_key, args.plain).await?;

    let backend = HttpBackend::new(&config.backend_url, config.request_timeout())?;
    let notifier = ChannelNotifier::new(NotifyConfig::from_config(&config));
    let (handle, updates, task) = pboss_session::spawn(
        Arc::new(backend),
        secrets,
        Arc::new(notifier),
        SessionSettings::from_config(&config),
        api_key_present,
    );

    // dropping the watch kills the backend
    let _watch = backend_process.map(|process| {
        let handle = handle.clone();
        process.watch(move |status| {
            let _ = handle.try_send(Command::BackendExited(status.to_string()));
        })
    });

    let result = present(&args, handle.clone(), updates).await;
    handle.send(Command::Shutdown).await;
    if let Err(e) = task.await {
        tracing::warn!(error = %e, "session task panicked");
    }
    result
}

async fn present(
    args: &DayArgs,
    handle: SessionHandle,
    updates: mpsc::UnboundedReceiver<Update>,
) -> anyhow::Result<()> {
    let opts = PlainOptions {
        persona: args.persona.clone(),
        goal: args.goal.clone(),
        accept_consent: args.accept_consent,
    };
    #[cfg(feature = "tui")]
    if !args.plain {
        return tokio::task::spawn_blocking(move || crate::tui::run(handle, updates)).await?;
    }
    plain::run(handle, updates, opts).await
}

/// Spawn `backend_command` and wait for its port. On timeout the user picks
/// retry or quit.
async fn start_backend(
    config: &Config,
    api_key: Option<String>,
    inherit_output: bool,
) -> anyhow::Result<Option<BackendProcess>> {
    let Some(mut spec) = LaunchSpec::from_config(config, api_key)? else {
        tracing::debug!("no backend_command configured, assuming the backend is running");
        return Ok(None);
    };
    spec.inherit_output = inherit_output;
    let settings = ProbeSettings::from_config(config);

    loop {
        let mut process = BackendProcess::spawn(&spec)?;
        match process.wait_ready(settings).await {
            Ok(_) => return Ok(Some(process)),
            Err(e @ LaunchError::Timeout { .. }) => {
                process.shutdown().await;
                let message = e.to_string();
                let prompt = message.clone();
                let retry = tokio::task::spawn_blocking(move || ask_retry(&prompt)).await??;
                if !retry {
                    anyhow::bail!("Backend did not start: {message}");
                }
                tracing::info!("retrying backend launch");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn ask_retry(message: &str) -> std::io::Result<bool> {
    use std::io::Write;

    eprint!("{message}\nRetry or quit? [r/Q] ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(is_retry(&line))
}

fn is_retry(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "r" | "retry")
}
