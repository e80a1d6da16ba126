//! The single-flight authorization coordinator.
//!
//! At most one user-facing authorization (request or pairing) runs at a time
//! process-wide. The flag is an explicit handle owned by the guard, never
//! ambient state, and its release is tied to a scope guard so every exit
//! path, including panics, clears it.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use keywarden_authenticator::{SecretStore, UserValidation};
use keywarden_types::{AuthorizationRequest, RequestLogEntry, RequestLogStorage};

use crate::{
    authorizer::Authorizer,
    error::AuthorizationError,
    session::{AccountStore, Pairing, SessionChannel, SessionFactory, SessionResponse},
};

/// The shared single-flight flag. Clone handles freely; they all observe the
/// same flag.
#[derive(Debug, Clone, Default)]
pub struct InFlight(Arc<AtomicBool>);

impl InFlight {
    /// A released flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an authorization is currently in flight.
    pub fn in_progress(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Claim the flag. Fails with [`AuthorizationError::InProgress`] when
    /// already claimed; attempts are never queued.
    fn acquire(&self) -> Result<FlightGuard, AuthorizationError> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AuthorizationError::InProgress)?;
        Ok(FlightGuard(Arc::clone(&self.0)))
    }
}

/// Holds the single-flight claim; releases it when dropped.
struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Coordinates inbound requests and pairing attempts.
///
/// Owns the collaborating seams the flows need: the secret store the WebAuthn
/// engine persists into, the account store, the outbound session channel and
/// the user-validation gate.
pub struct AuthorizationGuard<S, A, C, V> {
    store: S,
    accounts: A,
    channel: C,
    validation: V,
    in_flight: InFlight,
    log: RequestLogStorage,
}

impl<S, A, C, V> AuthorizationGuard<S, A, C, V>
where
    S: SecretStore,
    A: AccountStore + Send,
    C: SessionChannel + Sync,
    V: UserValidation + Sync,
{
    /// A guard over the given seams with a released single-flight flag and an
    /// empty request log.
    pub fn new(store: S, accounts: A, channel: C, validation: V) -> Self {
        Self {
            store,
            accounts,
            channel,
            validation,
            in_flight: InFlight::new(),
            log: RequestLogStorage::new(),
        }
    }

    /// A handle to the single-flight flag, for UI layers that need to query
    /// it.
    pub fn in_flight(&self) -> InFlight {
        self.in_flight.clone()
    }

    /// Everything that was asked of this device, oldest first.
    pub fn request_log(&self) -> &RequestLogStorage {
        &self.log
    }

    /// Dispatch an inbound request to its authorization flow and run it.
    ///
    /// The request is logged once its kind maps to a flow. On a flow error
    /// the browser receives a best-effort error message; the error is still
    /// returned to the caller. The single-flight claim is released on every
    /// path out of this function.
    pub async fn handle_request(
        &mut self,
        request: &AuthorizationRequest,
    ) -> Result<SessionResponse, AuthorizationError> {
        let _guard = self.in_flight.acquire()?;

        let authorizer = Authorizer::for_request(request)?;
        self.log
            .save(RequestLogEntry::from_request(request, authorizer.kind()));

        match authorizer
            .authorize(
                &mut self.store,
                &mut self.accounts,
                &self.channel,
                &self.validation,
            )
            .await
        {
            Ok(response) => Ok(response),
            Err(AuthorizationError::Authentication(err)) => {
                // the user said no; tell the browser it was rejected
                authorizer.reject(&self.channel).await;
                Err(AuthorizationError::Authentication(err))
            }
            Err(err) => {
                authorizer.cancel(&self.channel, Some(err.to_string())).await;
                Err(err)
            }
        }
    }

    /// Reject an inbound request without running its flow.
    pub async fn reject_request(&self, request: &AuthorizationRequest) {
        if let Ok(authorizer) = Authorizer::for_request(request) {
            authorizer.reject(&self.channel).await;
        }
    }

    /// Pair with a browser or team from a scanned payload.
    ///
    /// Validates the parameters, authenticates the user, refuses duplicate
    /// sessions and hands the pairing to the session factory. Holds the
    /// single-flight claim for the whole handshake.
    pub async fn pair<F>(
        &mut self,
        factory: &mut F,
        parameters: &HashMap<String, String>,
    ) -> Result<String, AuthorizationError>
    where
        F: SessionFactory + Send,
    {
        let _guard = self.in_flight.acquire()?;

        let pairing = Pairing::parse(parameters)?;
        self.validation
            .authenticate("Pair with a new browser", false)
            .await?;
        if factory.exists(&pairing.session_id()).await {
            return Err(AuthorizationError::SessionExists);
        }
        factory.initiate(pairing).await
    }
}
