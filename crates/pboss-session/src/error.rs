use pboss_client::ApiError;
use pboss_secret::SecretError;

/// How a failure should be treated by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Personas unreachable after the retry. The app cannot continue.
    StartupConnectivity,
    /// Rejected locally before any network call.
    Validation,
    /// The backend (or the keychain) refused an operation; local state is unchanged.
    Operation,
    /// Polling stopped because the backend went away. Restart required.
    ConnectionLost,
    /// End failed; the day is still active and may be ended again.
    EndFailed,
}

impl FailureKind {
    /// Whether the app is unusable after this failure.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            FailureKind::StartupConnectivity | FailureKind::ConnectionLost
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Could not connect to backend. Please ensure the application is running properly.")]
    Startup(#[source] ApiError),

    #[error("Please select a persona.")]
    NoPersona,

    #[error("Unknown persona \"{0}\". Please select a persona.")]
    UnknownPersona(String),

    #[error("Please accept the tracking consent before starting the day.")]
    ConsentPending,

    #[error("Unable to record consent. Please try again.")]
    Consent(#[source] ApiError),

    #[error("Error starting day: {message}")]
    Start {
        message: String,
        #[source]
        source: ApiError,
    },

    #[error("Lost connection to backend. Please restart the app.")]
    ConnectionLost(#[source] ApiError),

    #[error("Backend terminated unexpectedly ({0}). Please restart the app.")]
    BackendExited(String),

    #[error("Error ending day: {0}")]
    End(#[source] ApiError),

    #[error("Could not save API key: {0}")]
    SaveKey(#[from] SecretError),
}

impl SessionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SessionError::Startup(_) => FailureKind::StartupConnectivity,
            SessionError::NoPersona
            | SessionError::UnknownPersona(_)
            | SessionError::ConsentPending => FailureKind::Validation,
            SessionError::Consent(_) | SessionError::Start { .. } | SessionError::SaveKey(_) => {
                FailureKind::Operation
            }
            SessionError::ConnectionLost(_) | SessionError::BackendExited(_) => {
                FailureKind::ConnectionLost
            }
            SessionError::End(_) => FailureKind::EndFailed,
        }
    }

    /// Build the Start failure, preferring the text the backend sent.
    pub(crate) fn start(source: ApiError) -> Self {
        let message = source
            .backend_message()
            .unwrap_or_else(|| "Failed to start day".to_string());
        SessionError::Start { message, source }
    }
}
