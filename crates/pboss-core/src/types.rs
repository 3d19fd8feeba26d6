use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Persona identifier as issued by the backend (e.g. "drill_sergeant").
pub type PersonaId = String;

// ── Personas ──

/// A persona profile as served by `GET /api/personas`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Persona {
    pub id: PersonaId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Optional greeting shown when a day starts without a backend message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub greeting: Option<String>,
}

impl Persona {
    /// Display label: `"<icon> <name>"`, or just the name when no icon is set.
    pub fn label(&self) -> String {
        match self.icon.as_deref().map(str::trim) {
            Some(icon) if !icon.is_empty() => format!("{icon} {}", self.name),
            _ => self.name.clone(),
        }
    }

    pub fn greeting(&self) -> Option<&str> {
        self.greeting.as_deref().filter(|g| !g.trim().is_empty())
    }
}

/// Personas loaded once per launch, kept in backend order and indexed by id.
#[derive(Debug, Clone, Default)]
pub struct PersonaBook {
    personas: Vec<Persona>,
    index: HashMap<PersonaId, usize>,
}

impl PersonaBook {
    /// Build from the backend list. A repeated id keeps its first entry.
    pub fn new(list: Vec<Persona>) -> Self {
        let mut personas = Vec::with_capacity(list.len());
        let mut index = HashMap::with_capacity(list.len());
        for persona in list {
            if index.contains_key(&persona.id) {
                continue;
            }
            index.insert(persona.id.clone(), personas.len());
            personas.push(persona);
        }
        Self { personas, index }
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.index.get(id).map(|&i| &self.personas[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn as_slice(&self) -> &[Persona] {
        &self.personas
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}

// ── Preferences ──

/// Non-sensitive preferences served by `GET /api/prefs`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Preferences {
    #[serde(default)]
    pub consent_given: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_persona: Option<PersonaId>,
}

impl Preferences {
    /// Defaults applied when preferences cannot be fetched: consent is assumed
    /// and nothing is preselected.
    pub fn degraded() -> Self {
        Self {
            consent_given: true,
            last_persona: None,
        }
    }

    /// The persona to preselect, ignoring the empty string the backend uses
    /// for "never chosen".
    pub fn preselected(&self) -> Option<&str> {
        self.last_persona.as_deref().filter(|p| !p.is_empty())
    }
}

// ── Session phase ──

/// Client-side phase of a tracking day. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    Active,
    Reported,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Setup => "setup",
            Phase::Active => "active",
            Phase::Reported => "reported",
        };
        f.write_str(s)
    }
}

// ── Wire payloads ──

/// Body of `POST /api/start_day`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartRequest {
    pub goals: String,
    pub persona: PersonaId,
}

/// Response of `POST /api/start_day`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartResponse {
    #[serde(default)]
    pub initial_message: Option<String>,
}

impl StartResponse {
    pub fn initial_message(&self) -> Option<&str> {
        non_empty(self.initial_message.as_deref())
    }
}

/// Accumulated work/distraction/idle seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub work: f64,
    pub distraction: f64,
    pub idle: f64,
}

/// Point-in-time read from `GET /api/status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub work_time: f64,
    #[serde(default)]
    pub distraction_time: f64,
    #[serde(default)]
    pub idle_time: f64,
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusSnapshot {
    pub fn totals(&self) -> Totals {
        Totals {
            work: self.work_time,
            distraction: self.distraction_time,
            idle: self.idle_time,
        }
    }

    /// A new nudge, if any. Empty or absent means "keep the last message".
    pub fn nudge(&self) -> Option<&str> {
        non_empty(self.message.as_deref())
    }
}

/// Response of `GET /api/end_day`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndResponse {
    #[serde(default)]
    pub work_time: f64,
    #[serde(default)]
    pub distraction_time: f64,
    #[serde(default)]
    pub idle_time: f64,
    #[serde(default)]
    pub persona_report: Option<String>,
}

impl EndResponse {
    pub fn totals(&self) -> Totals {
        Totals {
            work: self.work_time,
            distraction: self.distraction_time,
            idle: self.idle_time,
        }
    }
}

// ── Report ──

/// Terminal snapshot of a finished day. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndOfDayReport {
    /// Goal as captured at Start, not as currently typed.
    pub goal: String,
    pub persona: Persona,
    pub totals: Totals,
    pub message: String,
    pub date: time::Date,
}

impl EndOfDayReport {
    pub fn new(goal: String, persona: Persona, end: EndResponse, date: time::Date) -> Self {
        Self {
            goal,
            persona,
            totals: end.totals(),
            message: end.persona_report.unwrap_or_default(),
            date,
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|m| !m.is_empty())
}
