use tokio::sync::mpsc;

use pboss_core::{PersonaId, Persona};
use pboss_session::{Command, FailureKind, SessionHandle, Update};

use crate::view;

#[derive(Debug, Clone, Default)]
pub struct PlainOptions {
    pub persona: Option<PersonaId>,
    pub goal: String,
    pub accept_consent: bool,
}

/// What the loop should do after an update or an interrupt.
#[derive(Debug, PartialEq)]
pub enum Action {
    Wait,
    Send(Command),
    Finish,
    Fail(String),
}

/// Line-oriented view of a session.
pub struct PlainView {
    opts: PlainOptions,
    chosen: Option<PersonaId>,
    persona: Option<Persona>,
    active: bool,
    ending: bool,
}

impl PlainView {
    pub fn new(opts: PlainOptions) -> Self {
        Self {
            opts,
            chosen: None,
            persona: None,
            active: false,
            ending: false,
        }
    }

    fn start(&self) -> Action {
        Action::Send(Command::Start {
            persona: self.chosen.clone().unwrap_or_default(),
            goal: self.opts.goal.clone(),
        })
    }

    fn speaker(&self) -> String {
        self.persona
            .as_ref()
            .map(Persona::label)
            .unwrap_or_else(|| "pboss".to_string())
    }

    pub fn on_update(&mut self, update: Update, out: &mut Vec<String>) -> Action {
        match update {
            Update::Ready {
                personas,
                preselected,
                consent_required,
                api_key_present,
            } => {
                if !api_key_present {
                    out.push(view::KEY_HINT.to_string());
                }
                self.chosen = self.opts.persona.clone().or(preselected);
                if self.chosen.is_none() {
                    let ids: Vec<&str> = personas.iter().map(|p| p.id.as_str()).collect();
                    return Action::Fail(format!(
                        "Please select a persona with --persona (one of: {}).",
                        ids.join(", ")
                    ));
                }
                if !consent_required {
                    return self.start();
                }
                out.push(view::CONSENT_TEXT.to_string());
                if self.opts.accept_consent {
                    out.push("Recording consent...".to_string());
                    Action::Send(Command::AcceptConsent)
                } else {
                    Action::Fail("Consent required. Rerun with --accept-consent to accept.".into())
                }
            }
            Update::ConsentAccepted => self.start(),
            Update::Started {
                goal,
                persona,
                message,
            } => {
                self.active = true;
                out.push(view::persona_line(&persona));
                out.push(view::goal_line(&goal));
                self.persona = Some(persona);
                if let Some(message) = message {
                    out.push(format!("{}: {message}", self.speaker()));
                }
                out.push("Tracking. Press Ctrl-C to end the day.".to_string());
                Action::Wait
            }
            Update::Status { totals, message } => {
                out.push(view::counter_lines(&totals).join("  "));
                if let Some(message) = message {
                    out.push(format!("{}: {message}", self.speaker()));
                }
                Action::Wait
            }
            Update::Ended(report) => {
                out.push(String::new());
                out.extend(view::report_lines(&report));
                Action::Finish
            }
            Update::ApiKeySaved { .. } => Action::Wait,
            Update::Failed { kind, message } => match kind {
                FailureKind::EndFailed => {
                    self.ending = false;
                    out.push(message);
                    out.push("Press Ctrl-C to try again.".to_string());
                    Action::Wait
                }
                _ if kind.is_fatal() || !self.active => Action::Fail(message),
                _ => {
                    out.push(message);
                    Action::Wait
                }
            },
        }
    }

    /// Ctrl-C: end an active day, or leave if none is running.
    pub fn on_interrupt(&mut self, out: &mut Vec<String>) -> Action {
        if !self.active {
            return Action::Finish;
        }
        if self.ending {
            return Action::Wait;
        }
        self.ending = true;
        out.push("Ending day...".to_string());
        Action::Send(Command::End)
    }
}

pub async fn run(
    handle: SessionHandle,
    mut updates: mpsc::UnboundedReceiver<Update>,
    opts: PlainOptions,
) -> anyhow::Result<()> {
    let (interrupt_tx, mut interrupts) = mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    })?;

    let mut view = PlainView::new(opts);
    loop {
        let mut out = Vec::new();
        let action = tokio::select! {
            update = updates.recv() => match update {
                Some(update) => view.on_update(update, &mut out),
                None => Action::Fail("Session stopped unexpectedly.".into()),
            },
            Some(()) = interrupts.recv() => view.on_interrupt(&mut out),
        };
        for line in out {
            println!("{line}");
        }
        match action {
            Action::Wait => {}
            Action::Send(cmd) => {
                if !handle.send(cmd).await {
                    anyhow::bail!("Session stopped unexpectedly.");
                }
            }
            Action::Finish => return Ok(()),
            Action::Fail(message) => anyhow::bail!(message),
        }
    }
}
