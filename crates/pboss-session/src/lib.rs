//! Session client: one tracking day from Setup through Active to Reported.
//!
//! [`SessionClient`] holds the state machine and talks to the backend.
//! [`spawn`] runs it on its own task, fed by [`Command`]s and emitting
//! [`Update`]s for whichever view is attached.

mod client;
mod error;
mod gate;
mod runtime;
mod timer;

pub use client::{SessionClient, SessionSettings, Update};
pub use error::{FailureKind, SessionError};
pub use gate::NotificationGate;
pub use runtime::{spawn, Command, SessionHandle};
pub use timer::{Generation, PollTimer};
