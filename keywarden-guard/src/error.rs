use keywarden_authenticator::{ValidationError, WebAuthnError};

/// Errors produced while authorizing a remote request or pairing.
#[derive(Debug, PartialEq, Eq)]
pub enum AuthorizationError {
    /// Another authorization or pairing attempt is already in flight. The
    /// caller must retry later; attempts are never queued.
    InProgress,

    /// The request kind has no authorization flow.
    UnknownType,

    /// The request misses a field its kind requires. Raised before any side
    /// effect happens.
    MissingData,

    /// A session with this browser is already paired.
    SessionExists,

    /// The pairing payload is malformed.
    InvalidSession,

    /// Admin login was requested but no team session is present.
    NoTeamSession,

    /// Admin login was requested but the user is not a team admin.
    NotAdmin,

    /// The request references an account that is not stored on this device.
    AccountNotFound,

    /// The user declined or failed the authentication prompt.
    Authentication(ValidationError),

    /// The WebAuthn engine failed.
    WebAuthn(WebAuthnError),

    /// The session channel failed to deliver a response.
    Transport(String),

    /// The account store failed.
    Storage(String),
}

impl std::fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProgress => write!(f, "another authorization is in progress"),
            Self::UnknownType => write!(f, "request kind has no authorization flow"),
            Self::MissingData => write!(f, "request misses a required field"),
            Self::SessionExists => write!(f, "session already exists"),
            Self::InvalidSession => write!(f, "malformed pairing payload"),
            Self::NoTeamSession => write!(f, "no team session found"),
            Self::NotAdmin => write!(f, "not a team admin"),
            Self::AccountNotFound => write!(f, "account not found"),
            Self::Authentication(err) => write!(f, "authentication: {err}"),
            Self::WebAuthn(err) => write!(f, "webauthn: {err}"),
            Self::Transport(reason) => write!(f, "session channel: {reason}"),
            Self::Storage(reason) => write!(f, "account store: {reason}"),
        }
    }
}

impl std::error::Error for AuthorizationError {}

impl From<ValidationError> for AuthorizationError {
    fn from(err: ValidationError) -> Self {
        AuthorizationError::Authentication(err)
    }
}

impl From<WebAuthnError> for AuthorizationError {
    fn from(err: WebAuthnError) -> Self {
        AuthorizationError::WebAuthn(err)
    }
}
