/// An opaque token proving the user passed the platform's presence and
/// verification gate. The engine never inspects it; it only threads it
/// through to storage implementations that demand one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedContext {
    /// Whether the context was freshly established for this operation.
    pub fresh: bool,
}

/// Errors from the user validation gate.
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// The user declined the authentication prompt.
    UserCancelled,
    /// The platform gate failed for another reason.
    Failed,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserCancelled => write!(f, "user cancelled authentication"),
            Self::Failed => write!(f, "user authentication failed"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Pluggable user presence/verification gate.
///
/// This call may block indefinitely on human interaction; no timeout is
/// imposed here, outer UI layers own that policy.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait::async_trait]
pub trait UserValidation {
    /// Present `reason` to the user and collect an authenticated context.
    ///
    /// * `reason` - Human-readable explanation of what is being authorized.
    /// * `require_fresh` - Demand a fresh gesture rather than a cached context.
    async fn authenticate(
        &self,
        reason: &str,
        require_fresh: bool,
    ) -> Result<AuthenticatedContext, ValidationError>;
}

#[cfg(any(test, feature = "testable"))]
impl MockUserValidation {
    /// A mock that approves any number of authentication prompts.
    pub fn approving() -> Self {
        let mut mock = MockUserValidation::new();
        mock.expect_authenticate()
            .returning(|_, fresh| Ok(AuthenticatedContext { fresh }));
        mock
    }

    /// A mock whose user declines every prompt.
    pub fn declining() -> Self {
        let mut mock = MockUserValidation::new();
        mock.expect_authenticate()
            .returning(|_, _| Err(ValidationError::UserCancelled));
        mock
    }
}
