use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use pboss_client::Backend;
use pboss_core::{
    Config, EndOfDayReport, Persona, PersonaBook, PersonaId, Phase, Preferences, StartRequest,
    Totals,
};
use pboss_notify::{Notifier, NotifyEvent};
use pboss_secret::CredentialStore;

use crate::gate::NotificationGate;
use crate::timer::{Generation, PollTimer};
use crate::{FailureKind, SessionError};

/// Timing knobs of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub persona_retry_delay: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            persona_retry_delay: Duration::from_millis(1000),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            persona_retry_delay: config.persona_retry_delay(),
        }
    }
}

/// State change pushed to the view.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Initialization finished.
    Ready {
        personas: Vec<Persona>,
        preselected: Option<PersonaId>,
        consent_required: bool,
        api_key_present: bool,
    },
    ConsentAccepted,
    /// Setup → Active. Counters restart at zero.
    Started {
        goal: String,
        persona: Persona,
        message: Option<String>,
    },
    /// A successful poll. `message` is set only when the backend sent a new one.
    Status {
        totals: Totals,
        message: Option<String>,
    },
    /// Active → Reported.
    Ended(EndOfDayReport),
    ApiKeySaved { stored: bool },
    Failed { kind: FailureKind, message: String },
}

impl Update {
    pub fn failed(err: &SessionError) -> Self {
        Update::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Local shadow of an active day.
#[derive(Debug)]
struct ActiveSession {
    /// Goal as sent at Start; the report shows this, not later input.
    goal: String,
    persona: Persona,
    /// `None` once polling has stopped.
    poll: Option<PollTimer>,
}

#[derive(Debug)]
enum PhaseState {
    Setup,
    Active(ActiveSession),
    Reported(EndOfDayReport),
}

/// Drives one tracking day against the backend.
///
/// Every operation runs to completion before the next starts; the runtime
/// serializes them on a single task.
pub struct SessionClient {
    backend: Arc<dyn Backend>,
    secrets: Arc<dyn CredentialStore>,
    gate: NotificationGate,
    settings: SessionSettings,
    personas: PersonaBook,
    consent_given: bool,
    state: PhaseState,
    next_generation: Generation,
    /// Key presence already read by the caller; `None` means read the store.
    known_api_key: Option<bool>,
    updates: mpsc::UnboundedSender<Update>,
}

impl SessionClient {
    pub fn new(
        backend: Arc<dyn Backend>,
        secrets: Arc<dyn CredentialStore>,
        notifier: Arc<dyn Notifier>,
        settings: SessionSettings,
        updates: mpsc::UnboundedSender<Update>,
    ) -> Self {
        Self {
            backend,
            secrets,
            gate: NotificationGate::new(notifier),
            settings,
            personas: PersonaBook::default(),
            consent_given: false,
            state: PhaseState::Setup,
            next_generation: 0,
            known_api_key: None,
            updates,
        }
    }

    /// Use a key presence the caller already read, so `initialize` does not
    /// consult the credential store again.
    pub fn with_api_key_present(mut self, present: bool) -> Self {
        self.known_api_key = Some(present);
        self
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            PhaseState::Setup => Phase::Setup,
            PhaseState::Active(_) => Phase::Active,
            PhaseState::Reported(_) => Phase::Reported,
        }
    }

    pub fn personas(&self) -> &PersonaBook {
        &self.personas
    }

    pub fn consent_given(&self) -> bool {
        self.consent_given
    }

    /// Whether a poll timer is currently running.
    pub fn polling(&self) -> bool {
        matches!(&self.state, PhaseState::Active(s) if s.poll.is_some())
    }

    pub fn report(&self) -> Option<&EndOfDayReport> {
        match &self.state {
            PhaseState::Reported(r) => Some(r),
            _ => None,
        }
    }

    /// Next timer tick. Pending forever while no timer runs. Cancel safe.
    pub async fn next_tick(&mut self) -> Generation {
        match &mut self.state {
            PhaseState::Active(ActiveSession {
                poll: Some(timer), ..
            }) => timer.tick().await,
            _ => std::future::pending().await,
        }
    }

    pub(crate) fn emit(&self, update: Update) {
        // the view may already be gone during shutdown
        let _ = self.updates.send(update);
    }

    // ── Initialize ──

    /// Load personas (retrying once), then preferences, then check the
    /// credential store.
    pub async fn initialize(&mut self) -> Result<(), SessionError> {
        let list = match self.backend.list_personas().await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, delay_ms = self.settings.persona_retry_delay.as_millis() as u64, "persona fetch failed, retrying once");
                tokio::time::sleep(self.settings.persona_retry_delay).await;
                self.backend.list_personas().await.map_err(|e| {
                    tracing::error!(error = %e, "persona fetch failed after retry");
                    SessionError::Startup(e)
                })?
            }
        };
        self.personas = PersonaBook::new(list);
        if self.personas.is_empty() {
            tracing::warn!("backend returned no personas");
        }

        let prefs = match self.backend.preferences().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "preferences unavailable, using defaults");
                Preferences::degraded()
            }
        };
        self.consent_given = prefs.consent_given;
        let preselected = prefs
            .preselected()
            .filter(|id| self.personas.contains(id))
            .map(str::to_string);

        let api_key_present = match self.known_api_key {
            Some(present) => present,
            None => match self.secrets.read() {
                Ok(key) => key.is_some(),
                Err(e) => {
                    tracing::warn!(error = %e, "credential store unreadable");
                    false
                }
            },
        };

        tracing::info!(
            personas = self.personas.len(),
            consent = self.consent_given,
            api_key_present,
            "session initialized"
        );
        self.emit(Update::Ready {
            personas: self.personas.as_slice().to_vec(),
            preselected,
            consent_required: !self.consent_given,
            api_key_present,
        });
        Ok(())
    }

    // ── Consent ──

    pub async fn accept_consent(&mut self) -> Result<(), SessionError> {
        self.backend
            .accept_consent()
            .await
            .map_err(SessionError::Consent)?;
        self.consent_given = true;
        tracing::info!("consent recorded");
        self.emit(Update::ConsentAccepted);
        Ok(())
    }

    // ── Start ──

    pub async fn start(&mut self, persona_id: &str, goal: &str) -> Result<(), SessionError> {
        if !matches!(self.state, PhaseState::Setup) {
            tracing::debug!(phase = %self.phase(), "start ignored outside setup");
            return Ok(());
        }
        if !self.consent_given {
            return Err(SessionError::ConsentPending);
        }
        let persona_id = persona_id.trim();
        if persona_id.is_empty() {
            return Err(SessionError::NoPersona);
        }
        let persona = self
            .personas
            .get(persona_id)
            .cloned()
            .ok_or_else(|| SessionError::UnknownPersona(persona_id.to_string()))?;
        let goal = goal.trim().to_string();

        let request = StartRequest {
            goals: goal.clone(),
            persona: persona.id.clone(),
        };
        let response = self
            .backend
            .start_day(&request)
            .await
            .map_err(SessionError::start)?;

        let message = response
            .initial_message()
            .or_else(|| persona.greeting())
            .map(str::to_string);
        let poll = self.arm_timer();
        tracing::info!(persona = %persona.id, goal = %goal, "day started");
        self.emit(Update::Started {
            goal: goal.clone(),
            persona: persona.clone(),
            message,
        });
        self.state = PhaseState::Active(ActiveSession {
            goal,
            persona,
            poll: Some(poll),
        });

        self.poll().await
    }

    fn arm_timer(&mut self) -> PollTimer {
        self.next_generation += 1;
        PollTimer::start(self.settings.poll_interval, self.next_generation)
    }

    // ── Poll ──

    /// Handle a timer tick. Ticks from a stopped or replaced timer are dropped.
    /// A poll that outlasts several periods is followed by at most one tick.
    pub async fn on_tick(&mut self, generation: Generation) -> Result<(), SessionError> {
        let current = match &self.state {
            PhaseState::Active(s) => s.poll.as_ref().map(PollTimer::generation),
            _ => None,
        };
        if current != Some(generation) {
            tracing::debug!(generation, ?current, "stale tick ignored");
            return Ok(());
        }
        self.poll().await
    }

    /// Fetch a status snapshot. On failure polling stops for good.
    async fn poll(&mut self) -> Result<(), SessionError> {
        if !matches!(self.state, PhaseState::Active(_)) {
            return Ok(());
        }
        match self.backend.status().await {
            Ok(snapshot) => {
                let message = snapshot.nudge().map(str::to_string);
                self.emit(Update::Status {
                    totals: snapshot.totals(),
                    message: message.clone(),
                });
                if let (Some(message), PhaseState::Active(s)) = (message, &self.state) {
                    let event = NotifyEvent::nudge(&s.persona, &message);
                    self.gate.deliver(event).await;
                }
                Ok(())
            }
            Err(e) => {
                self.stop_polling();
                tracing::error!(error = %e, "status poll failed, polling stopped");
                Err(SessionError::ConnectionLost(e))
            }
        }
    }

    fn stop_polling(&mut self) -> bool {
        match &mut self.state {
            PhaseState::Active(s) => s.poll.take().is_some(),
            _ => false,
        }
    }

    /// The supervised backend process died.
    pub fn backend_exited(&mut self, status: &str) -> Result<(), SessionError> {
        self.stop_polling();
        tracing::error!(status, "backend exited");
        Err(SessionError::BackendExited(status.to_string()))
    }

    // ── End ──

    /// End the day. Outside Active this does nothing.
    ///
    /// On failure the day stays Active and polling resumes on a fresh timer,
    /// unless the connection was already lost.
    pub async fn end(&mut self) -> Result<(), SessionError> {
        let (goal, persona) = match &self.state {
            PhaseState::Active(s) => (s.goal.clone(), s.persona.clone()),
            _ => {
                tracing::debug!(phase = %self.phase(), "end ignored outside active");
                return Ok(());
            }
        };
        let was_polling = self.stop_polling();

        match self.backend.end_day().await {
            Ok(end) => {
                let report = EndOfDayReport::new(goal, persona, end, today());
                tracing::info!(work = report.totals.work, "day ended");
                self.state = PhaseState::Reported(report.clone());
                self.emit(Update::Ended(report.clone()));
                self.gate.deliver(NotifyEvent::day_report(&report)).await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "end failed, day remains active");
                if was_polling {
                    let timer = self.arm_timer();
                    if let PhaseState::Active(s) = &mut self.state {
                        s.poll = Some(timer);
                    }
                }
                Err(SessionError::End(e))
            }
        }
    }

    // ── API key ──

    pub fn save_api_key(&mut self, key: &str) -> Result<(), SessionError> {
        let stored = self.secrets.store(key.trim())?;
        self.emit(Update::ApiKeySaved { stored });
        Ok(())
    }
}

fn today() -> time::Date {
    time::OffsetDateTime::now_local()
        .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
        .date()
}
