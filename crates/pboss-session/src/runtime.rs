use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use pboss_client::Backend;
use pboss_core::PersonaId;
use pboss_notify::Notifier;
use pboss_secret::CredentialStore;

use crate::client::{SessionClient, SessionSettings, Update};
use crate::SessionError;

/// Request from the view to the session task.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    AcceptConsent,
    Start { persona: PersonaId, goal: String },
    End,
    SaveApiKey(String),
    /// The supervised backend exited; carries its exit status.
    BackendExited(String),
    Shutdown,
}

impl Command {
    /// Name for logs. The key carried by `SaveApiKey` is never logged.
    pub fn name(&self) -> &'static str {
        match self {
            Command::AcceptConsent => "accept_consent",
            Command::Start { .. } => "start",
            Command::End => "end",
            Command::SaveApiKey(_) => "save_api_key",
            Command::BackendExited(_) => "backend_exited",
            Command::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sending half of a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Queue a command. Returns `false` once the session task has stopped.
    pub async fn send(&self, command: Command) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Non-blocking send, for synchronous callers such as the TUI key loop.
    pub fn try_send(&self, command: Command) -> bool {
        self.commands.try_send(command).is_ok()
    }
}

/// Spawn the session task. It initializes immediately and then serves
/// commands and timer ticks one at a time until `Shutdown` or until every
/// handle is dropped. `api_key_present` is the caller's one startup read of
/// the credential store.
pub fn spawn(
    backend: Arc<dyn Backend>,
    secrets: Arc<dyn CredentialStore>,
    notifier: Arc<dyn Notifier>,
    settings: SessionSettings,
    api_key_present: bool,
) -> (SessionHandle, mpsc::UnboundedReceiver<Update>, JoinHandle<()>) {
    let (updates_tx, updates_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::channel(16);
    let client = SessionClient::new(backend, secrets, notifier, settings, updates_tx)
        .with_api_key_present(api_key_present);
    let task = tokio::spawn(run(client, commands_rx));
    (
        SessionHandle {
            commands: commands_tx,
        },
        updates_rx,
        task,
    )
}

async fn run(mut client: SessionClient, mut commands: mpsc::Receiver<Command>) {
    if let Err(e) = client.initialize().await {
        client.emit(Update::failed(&e));
        return;
    }
    loop {
        let result = tokio::select! {
            cmd = commands.recv() => match cmd {
                None | Some(Command::Shutdown) => break,
                Some(cmd) => handle(&mut client, cmd).await,
            },
            generation = client.next_tick() => client.on_tick(generation).await,
        };
        if let Err(e) = result {
            client.emit(Update::failed(&e));
        }
    }
    tracing::debug!(phase = %client.phase(), "session task stopped");
}

async fn handle(client: &mut SessionClient, command: Command) -> Result<(), SessionError> {
    tracing::debug!(command = command.name(), "session command");
    match command {
        Command::AcceptConsent => client.accept_consent().await,
        Command::Start { persona, goal } => client.start(&persona, &goal).await,
        Command::End => client.end().await,
        Command::SaveApiKey(key) => client.save_api_key(&key),
        Command::BackendExited(status) => client.backend_exited(&status),
        Command::Shutdown => Ok(()),
    }
}
