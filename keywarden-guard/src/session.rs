//! Seams towards the paired browser session and the stored accounts.
//!
//! The transport itself (message queues, push notifications, encryption to
//! the browser's public key) lives outside this crate; authorization only
//! needs to hand a typed response to a channel and look accounts up.

use std::collections::HashMap;

use async_trait::async_trait;
use keywarden_authenticator::WebAuthnCredential;
use keywarden_types::{
    crypto::sha256,
    encoding::base64url,
    RequestKind,
};
use serde::{Deserialize, Serialize};

use crate::error::AuthorizationError;

/// A site an account is registered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Site identifier as provided by the browser.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The site URL.
    pub url: String,
}

/// A stored account, optionally carrying a WebAuthn credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Deterministic identifier, see [`Account::identifier`].
    pub id: String,
    /// The username at the site(s).
    pub username: String,
    /// The sites this account is registered with.
    pub sites: Vec<Site>,
    /// The WebAuthn credential, when one was registered.
    pub webauthn: Option<WebAuthnCredential>,
}

impl Account {
    /// The deterministic account identifier: lowercase hex of
    /// `sha256(site_id || username)`. Hex so the first 16 decoded bytes can
    /// serve as the WebAuthn credential id.
    pub fn identifier(site_id: &str, username: &str) -> String {
        let mut input = site_id.as_bytes().to_vec();
        input.extend_from_slice(username.as_bytes());
        data_encoding::HEXLOWER.encode(&sha256(&input))
    }
}

/// A paired team session, as far as authorization needs to know it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSession {
    /// The session identifier.
    pub id: String,
    /// The team this session belongs to.
    #[serde(rename = "teamID")]
    pub team_id: String,
    /// Whether the local user administrates the team.
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

/// Account and team-session storage consumed by the authorization flows.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait]
pub trait AccountStore {
    /// Look an account up by id.
    async fn get(&self, account_id: &str) -> Result<Option<Account>, AuthorizationError>;

    /// Store a new account.
    async fn create(&mut self, account: Account) -> Result<(), AuthorizationError>;

    /// Replace a stored account.
    async fn update(&mut self, account: Account) -> Result<(), AuthorizationError>;

    /// All paired team sessions.
    async fn team_sessions(&self) -> Result<Vec<TeamSession>, AuthorizationError>;

    /// The seed of the given team session, for admin portal login.
    async fn team_seed(&self, session_id: &str) -> Result<Vec<u8>, AuthorizationError>;
}

/// In-memory [`AccountStore`], for tests and single-process use.
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    accounts: HashMap<String, Account>,
    teams: Vec<(TeamSession, Vec<u8>)>,
}

impl MemoryAccounts {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a team session with its seed.
    pub fn add_team_session(&mut self, session: TeamSession, seed: Vec<u8>) {
        self.teams.push((session, seed));
    }
}

#[async_trait]
impl AccountStore for MemoryAccounts {
    async fn get(&self, account_id: &str) -> Result<Option<Account>, AuthorizationError> {
        Ok(self.accounts.get(account_id).cloned())
    }

    async fn create(&mut self, account: Account) -> Result<(), AuthorizationError> {
        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn update(&mut self, account: Account) -> Result<(), AuthorizationError> {
        self.accounts.insert(account.id.clone(), account);
        Ok(())
    }

    async fn team_sessions(&self) -> Result<Vec<TeamSession>, AuthorizationError> {
        Ok(self.teams.iter().map(|(session, _)| session.clone()).collect())
    }

    async fn team_seed(&self, session_id: &str) -> Result<Vec<u8>, AuthorizationError> {
        self.teams
            .iter()
            .find(|(session, _)| session.id == session_id)
            .map(|(_, seed)| seed.clone())
            .ok_or(AuthorizationError::NoTeamSession)
    }
}

/// A typed response sent back over the session channel. Binary fields cross
/// the channel base64url-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionResponse {
    /// Assertion or attestation result for a WebAuthn request.
    #[serde(rename_all = "camelCase")]
    WebAuthn {
        /// The request kind being answered.
        kind: RequestKind,
        /// The account the credential belongs to.
        account_id: String,
        /// Absent when a registration was requested without attestation.
        signature: Option<String>,
        /// The counter value promised in the signed data.
        counter: Option<u32>,
        /// The device attestation certificate chain, attestations only.
        certificates: Option<Vec<String>>,
    },

    /// The stored account a login-family or account-mutation request asked
    /// about.
    #[serde(rename_all = "camelCase")]
    Credentials {
        /// The request kind being answered.
        kind: RequestKind,
        /// The stored account's id.
        account_id: String,
        /// The stored account's username.
        username: String,
    },

    /// Credentials for every account of a bulk login.
    #[serde(rename_all = "camelCase")]
    BulkCredentials {
        /// `(account id, username)` per requested account, in request order.
        accounts: Vec<(String, String)>,
    },

    /// Acknowledgement of a bulk import announcement.
    #[serde(rename_all = "camelCase")]
    Acknowledged {
        /// The request kind being answered.
        kind: RequestKind,
        /// The number of accounts the import announced.
        count: usize,
    },

    /// The team seed an admin portal login or organisation creation needs.
    #[serde(rename_all = "camelCase")]
    TeamSeed {
        /// The admin team session the seed belongs to.
        session_id: String,
        /// The team id.
        team_id: String,
        /// The seed, base64url.
        seed: String,
    },
}

/// Outbound side of a paired browser session.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait]
pub trait SessionChannel {
    /// Deliver a response to the given browser tab.
    async fn send(
        &self,
        response: SessionResponse,
        browser_tab: u32,
    ) -> Result<(), AuthorizationError>;

    /// Tell the browser a request was rejected or failed. Best-effort from
    /// the caller's perspective.
    async fn cancel_request(
        &self,
        reason: RequestKind,
        browser_tab: u32,
        error: Option<String>,
    ) -> Result<(), AuthorizationError>;
}

/// A parsed pairing payload, scanned as URL parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    /// The browser's public key, base64url.
    pub browser_public_key: String,
    /// Seed of the shared pairing message queue.
    pub queue_seed: String,
    /// The pairing browser's name.
    pub browser: String,
    /// The pairing browser's operating system.
    pub os: String,
    /// Protocol version, 0 when the payload carries none.
    pub version: u32,
    /// Present for team pairings (`t=1`).
    pub team: Option<TeamPairing>,
}

/// The extra material a team pairing carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamPairing {
    /// The organisation's public key.
    pub organisation_key: String,
    /// The team being paired with.
    pub team_id: String,
}

impl Pairing {
    /// Parse the scanned parameters: `p` browser pubkey, `q` queue seed,
    /// `b` browser, `o` os, optional `v` version, `t=1` marks a team pairing
    /// which additionally requires `k` (organisation key) and `i` (team id).
    pub fn parse(parameters: &HashMap<String, String>) -> Result<Self, AuthorizationError> {
        let browser_public_key = parameters
            .get("p")
            .ok_or(AuthorizationError::InvalidSession)?
            .clone();
        let queue_seed = parameters
            .get("q")
            .ok_or(AuthorizationError::InvalidSession)?
            .clone();
        let browser = parameters
            .get("b")
            .ok_or(AuthorizationError::InvalidSession)?
            .clone();
        let os = parameters
            .get("o")
            .ok_or(AuthorizationError::InvalidSession)?
            .clone();
        let version = parameters
            .get("v")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        let team = if parameters.get("t").map(String::as_str) == Some("1") {
            let organisation_key = parameters
                .get("k")
                .ok_or(AuthorizationError::InvalidSession)?
                .clone();
            let team_id = parameters
                .get("i")
                .ok_or(AuthorizationError::InvalidSession)?
                .clone();
            Some(TeamPairing {
                organisation_key,
                team_id,
            })
        } else {
            None
        };
        Ok(Self {
            browser_public_key,
            queue_seed,
            browser,
            os,
            version,
            team,
        })
    }

    /// The session id a pairing would establish: the base64url hash of the
    /// browser's public key. Used for duplicate detection before initiation.
    pub fn session_id(&self) -> String {
        base64url(&sha256(self.browser_public_key.as_bytes()))
    }
}

/// Establishes new sessions from accepted pairings. The key exchange and
/// queue setup behind it are transport concerns.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait]
pub trait SessionFactory {
    /// Whether a session with this id is already paired.
    async fn exists(&self, session_id: &str) -> bool;

    /// Establish the session, returning its id.
    async fn initiate(&mut self, pairing: Pairing) -> Result<String, AuthorizationError>;
}
