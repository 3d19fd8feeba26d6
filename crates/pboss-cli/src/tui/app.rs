use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use pboss_core::{EndOfDayReport, Persona, Phase, Totals};
use pboss_session::{Command, FailureKind, Update};

/// Request sent to the session and not yet answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Consent,
    Start,
    End,
    SaveKey,
}

/// Which text field, if any, receives typed characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Personas,
    Goal,
    ApiKey,
}

/// Application state for the TUI.
pub struct App {
    pub should_quit: bool,
    /// `false` until the session reports it is initialized.
    pub ready: bool,
    pub phase: Phase,
    pub focus: Focus,
    pub pending: Option<Pending>,

    // Setup
    pub personas: Vec<Persona>,
    pub selected: Option<usize>,
    pub goal_input: String,
    pub key_input: String,
    pub consent_required: bool,
    pub api_key_present: bool,

    // Active
    pub persona: Option<Persona>,
    pub goal: String,
    pub totals: Totals,
    pub message: Option<String>,

    // Reported
    pub report: Option<EndOfDayReport>,

    pub notice: Option<String>,
    pub error: Option<(FailureKind, String)>,
}

impl App {
    pub fn new() -> Self {
        Self {
            should_quit: false,
            ready: false,
            phase: Phase::Setup,
            focus: Focus::Personas,
            pending: None,
            personas: Vec::new(),
            selected: None,
            goal_input: String::new(),
            key_input: String::new(),
            consent_required: false,
            api_key_present: true,
            persona: None,
            goal: String::new(),
            totals: Totals::default(),
            message: None,
            report: None,
            notice: None,
            error: None,
        }
    }

    pub fn show_consent(&self) -> bool {
        self.ready && self.consent_required && self.phase == Phase::Setup
    }

    /// A fatal error leaves nothing to do but quit.
    pub fn is_dead(&self) -> bool {
        matches!(self.error, Some((kind, _)) if kind.is_fatal())
    }

    pub fn selected_persona(&self) -> Option<&Persona> {
        self.selected.and_then(|i| self.personas.get(i))
    }

    // ── Session updates ──

    pub fn apply(&mut self, update: Update) {
        match update {
            Update::Ready {
                personas,
                preselected,
                consent_required,
                api_key_present,
            } => {
                self.selected = preselected
                    .as_deref()
                    .and_then(|id| personas.iter().position(|p| p.id == id));
                self.personas = personas;
                self.consent_required = consent_required;
                self.api_key_present = api_key_present;
                self.ready = true;
            }
            Update::ConsentAccepted => {
                self.consent_required = false;
                self.pending = None;
            }
            Update::Started {
                goal,
                persona,
                message,
            } => {
                self.phase = Phase::Active;
                self.goal = goal;
                self.persona = Some(persona);
                self.totals = Totals::default();
                self.message = message;
                self.focus = Focus::Personas;
                self.pending = None;
                self.error = None;
            }
            Update::Status { totals, message } => {
                self.totals = totals;
                if message.is_some() {
                    self.message = message;
                }
            }
            Update::Ended(report) => {
                self.phase = Phase::Reported;
                self.report = Some(report);
                self.pending = None;
                self.error = None;
            }
            Update::ApiKeySaved { stored } => {
                self.pending = None;
                self.api_key_present |= stored;
                self.notice = Some(if stored {
                    "API key saved.".to_string()
                } else {
                    "Empty key, not stored.".to_string()
                });
            }
            Update::Failed { kind, message } => {
                self.pending = None;
                self.error = Some((kind, message));
            }
        }
    }

    /// The session task is gone.
    pub fn session_closed(&mut self) {
        if !self.is_dead() {
            self.error = Some((
                FailureKind::ConnectionLost,
                "Session stopped. Please restart the app.".to_string(),
            ));
        }
    }

    // ── Keys ──

    /// Handle a key press. Returns the command to send, if any.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Command> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return None;
        }
        if self.is_dead() {
            if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter) {
                self.should_quit = true;
            }
            return None;
        }
        if !self.ready {
            if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                self.should_quit = true;
            }
            return None;
        }
        if self.show_consent() {
            return self.consent_key(key);
        }
        match self.phase {
            Phase::Setup => self.setup_key(key),
            Phase::Active => self.active_key(key),
            Phase::Reported => {
                if matches!(
                    key.code,
                    KeyCode::Enter | KeyCode::Char('c') | KeyCode::Char('q') | KeyCode::Esc
                ) {
                    self.should_quit = true;
                }
                None
            }
        }
    }

    /// Mark `pending` and hand out `command`, unless a request is in flight.
    fn request(&mut self, pending: Pending, command: Command) -> Option<Command> {
        if self.pending.is_some() {
            return None;
        }
        self.pending = Some(pending);
        self.error = None;
        self.notice = None;
        Some(command)
    }

    fn consent_key(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Char('a') | KeyCode::Enter => {
                self.request(Pending::Consent, Command::AcceptConsent)
            }
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            _ => None,
        }
    }

    fn setup_key(&mut self, key: KeyEvent) -> Option<Command> {
        match self.focus {
            Focus::Goal => {
                match key.code {
                    KeyCode::Char(c) => self.goal_input.push(c),
                    KeyCode::Backspace => {
                        self.goal_input.pop();
                    }
                    KeyCode::Enter | KeyCode::Tab | KeyCode::Esc => self.focus = Focus::Personas,
                    _ => {}
                }
                None
            }
            Focus::ApiKey => match key.code {
                KeyCode::Char(c) => {
                    self.key_input.push(c);
                    None
                }
                KeyCode::Backspace => {
                    self.key_input.pop();
                    None
                }
                KeyCode::Esc => {
                    self.key_input.clear();
                    self.focus = Focus::Personas;
                    None
                }
                KeyCode::Enter => {
                    let key = std::mem::take(&mut self.key_input);
                    self.focus = Focus::Personas;
                    self.request(Pending::SaveKey, Command::SaveApiKey(key))
                }
                _ => None,
            },
            Focus::Personas => match key.code {
                KeyCode::Char('q') | KeyCode::Esc => {
                    self.should_quit = true;
                    None
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.select_next();
                    None
                }
                KeyCode::Up => {
                    self.select_prev();
                    None
                }
                KeyCode::Tab | KeyCode::Char('g') => {
                    self.focus = Focus::Goal;
                    None
                }
                KeyCode::Char('k') => {
                    self.key_input.clear();
                    self.focus = Focus::ApiKey;
                    None
                }
                KeyCode::Enter | KeyCode::Char('s') => {
                    let persona = self
                        .selected_persona()
                        .map(|p| p.id.clone())
                        .unwrap_or_default();
                    let goal = self.goal_input.clone();
                    self.request(Pending::Start, Command::Start { persona, goal })
                }
                _ => None,
            },
        }
    }

    fn active_key(&mut self, key: KeyEvent) -> Option<Command> {
        match key.code {
            KeyCode::Char('e') => self.request(Pending::End, Command::End),
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
                None
            }
            _ => None,
        }
    }

    fn select_next(&mut self) {
        if self.personas.is_empty() {
            return;
        }
        self.selected = Some(match self.selected {
            Some(i) => (i + 1).min(self.personas.len() - 1),
            None => 0,
        });
    }

    fn select_prev(&mut self) {
        if self.personas.is_empty() {
            return;
        }
        self.selected = Some(self.selected.map_or(0, |i| i.saturating_sub(1)));
    }
}
