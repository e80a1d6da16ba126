use serde::{Deserialize, Serialize};

use crate::{WebAuthnAlgorithm, WebAuthnExtensions};

/// Every message type a paired session can send. The mapping from kind to
/// authorization behaviour is total: kinds without an authorization flow
/// ([`RequestKind::Reject`], [`RequestKind::Error`]) are rejected explicitly,
/// never silently ignored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum RequestKind {
    /// Register a new site account, with or without logging in afterwards.
    AddSite,
    /// Add a site to an already stored account.
    AddToExisting,
    /// Import a batch of accounts at once.
    AddBulk,
    /// Change the password of a stored account.
    Change,
    /// Log in with a stored account.
    Login,
    /// Fill a password field without a full login.
    Fill,
    /// Return the credentials of a stored account.
    GetDetails,
    /// Log in to several tabs at once.
    BulkLogin,
    /// Log in to the team administration portal.
    AdminLogin,
    /// Create a new WebAuthn credential.
    WebAuthnCreate,
    /// Sign a WebAuthn challenge with an existing credential.
    WebAuthnLogin,
    /// Update the stored metadata of an account.
    UpdateAccount,
    /// Convert a team into an organisation.
    CreateOrganisation,
    /// Add a WebAuthn credential to an already stored account.
    AddWebAuthnToExisting,
    /// The user rejected a request; outbound only.
    Reject,
    /// An error response; outbound only.
    Error,
}

/// An inbound remote request, already authenticated at the transport layer.
///
/// All fields are optional at the wire level; each authorization flow
/// validates the fields its kind requires before any side effect happens.
/// The camelCase field names are the protocol vocabulary shared with the
/// companion extension and must match exactly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationRequest {
    /// The kind of request; selects the authorization flow.
    #[serde(rename = "type")]
    pub kind: Option<RequestKind>,

    /// The browser tab the response should be routed to.
    #[serde(rename = "browserTab")]
    pub browser_tab: Option<u32>,

    /// Human-readable site name.
    #[serde(rename = "siteName")]
    pub site_name: Option<String>,

    /// Site URL.
    #[serde(rename = "siteURL")]
    pub site_url: Option<String>,

    /// Site identifier.
    #[serde(rename = "siteID")]
    pub site_id: Option<String>,

    /// The stored account this request operates on.
    #[serde(rename = "accountID")]
    pub account_id: Option<String>,

    /// The stored accounts a bulk login operates on.
    #[serde(rename = "accountIDs")]
    pub account_ids: Option<Vec<String>>,

    /// The username for a new account.
    pub username: Option<String>,

    /// The WebAuthn relying party id.
    #[serde(rename = "relyingPartyId")]
    pub relying_party_id: Option<String>,

    /// Candidate algorithms in the relying party's order of preference.
    pub algorithms: Option<Vec<WebAuthnAlgorithm>>,

    /// For WebAuthn requests: the base64 challenge (login) or client-data
    /// hash (registration attestation).
    pub challenge: Option<String>,

    /// Requested WebAuthn extensions.
    #[serde(rename = "webAuthnExtensions")]
    pub webauthn_extensions: Option<WebAuthnExtensions>,

    /// Number of accounts in a bulk import.
    pub count: Option<usize>,

    /// The organisation name for organisation creation.
    #[serde(rename = "organisationName")]
    pub organisation_name: Option<String>,

    /// The id of the session this request arrived on.
    #[serde(rename = "sessionID")]
    pub session_id: Option<String>,

    /// Transport-layer timestamp, milliseconds since the epoch.
    #[serde(rename = "sentTimestamp")]
    pub sent_timestamp: Option<u64>,
}
