//! One authorization flow per request kind.
//!
//! [`Authorizer::for_request`] is a total mapping from [`RequestKind`] to a
//! flow: every kind either constructs its variant after validating the fields
//! it requires, or fails [`AuthorizationError::UnknownType`]. Adding a kind is
//! a compile-time exercise, the match is exhaustive.

use keywarden_authenticator::{
    Attestation, SecretStore, UserValidation, WebAuthnCredential,
};
use keywarden_types::{
    encoding::base64url, AuthorizationRequest, RequestKind, WebAuthnAlgorithm, WebAuthnExtensions,
};

use crate::{
    error::AuthorizationError,
    session::{Account, AccountStore, SessionChannel, SessionResponse, Site, TeamSession},
};

/// The validated authorization flow for one inbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum Authorizer {
    /// Store a new password account.
    AddSite(AddSite),
    /// Add a site to a stored account.
    AddToExisting(AccountTarget),
    /// Announce a bulk import.
    AddBulk(AddBulk),
    /// Change a stored account's password.
    Change(AccountTarget),
    /// Login, fill or credential details for one account.
    Login(AccountTarget),
    /// Log several accounts in at once.
    BulkLogin(BulkLogin),
    /// Send the team seed for admin portal login.
    AdminLogin(AdminLogin),
    /// Register a new WebAuthn credential on a fresh account.
    WebAuthnRegistration(WebAuthnRegistration),
    /// Sign a WebAuthn challenge with a stored credential.
    WebAuthnLogin(WebAuthnLogin),
    /// Update stored account metadata.
    UpdateAccount(UpdateAccount),
    /// Convert a team into an organisation.
    CreateOrganisation(CreateOrganisation),
    /// Register a WebAuthn credential on a stored account.
    AddWebAuthnToExisting(AddWebAuthnToExisting),
}

/// Validated fields for storing a new password account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddSite {
    kind: RequestKind,
    browser_tab: u32,
    site: Site,
    username: String,
}

/// Flows that only need a browser tab and a stored account id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountTarget {
    kind: RequestKind,
    browser_tab: u32,
    account_id: String,
    site_name: Option<String>,
}

/// Validated fields for a bulk import announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddBulk {
    browser_tab: u32,
    count: usize,
}

/// Validated fields for logging several accounts in at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkLogin {
    browser_tab: u32,
    account_ids: Vec<String>,
}

/// Validated fields for a team admin portal login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminLogin {
    browser_tab: u32,
}

/// Validated fields for registering a WebAuthn credential on a new account.
#[derive(Debug, Clone, PartialEq)]
pub struct WebAuthnRegistration {
    browser_tab: u32,
    site: Site,
    username: String,
    relying_party_id: String,
    algorithms: Vec<WebAuthnAlgorithm>,
    client_data_hash: Option<String>,
    extensions: Option<WebAuthnExtensions>,
}

/// Validated fields for signing a WebAuthn challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebAuthnLogin {
    browser_tab: u32,
    account_id: String,
    relying_party_id: String,
    challenge: String,
}

/// Validated fields for updating stored account metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAccount {
    browser_tab: u32,
    account_id: String,
    username: Option<String>,
}

/// Validated fields for converting a team into an organisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOrganisation {
    browser_tab: u32,
    organisation_name: String,
}

/// Validated fields for binding a WebAuthn credential to a stored account.
#[derive(Debug, Clone, PartialEq)]
pub struct AddWebAuthnToExisting {
    browser_tab: u32,
    account_id: String,
    relying_party_id: String,
    algorithms: Vec<WebAuthnAlgorithm>,
    client_data_hash: Option<String>,
    extensions: Option<WebAuthnExtensions>,
}

impl Authorizer {
    /// Map a request to its flow, validating the fields the kind requires.
    /// Fails before any side effect: [`AuthorizationError::UnknownType`] for
    /// kinds without a flow, [`AuthorizationError::MissingData`] for absent
    /// required fields.
    pub fn for_request(request: &AuthorizationRequest) -> Result<Self, AuthorizationError> {
        let kind = request.kind.ok_or(AuthorizationError::UnknownType)?;
        match kind {
            RequestKind::AddSite => Ok(Self::AddSite(AddSite {
                kind,
                browser_tab: required(request.browser_tab)?,
                site: required_site(request)?,
                username: required(request.username.clone())?,
            })),
            RequestKind::AddToExisting | RequestKind::Change | RequestKind::Login
            | RequestKind::Fill | RequestKind::GetDetails => {
                let target = AccountTarget {
                    kind,
                    browser_tab: required(request.browser_tab)?,
                    account_id: required(request.account_id.clone())?,
                    site_name: request.site_name.clone(),
                };
                Ok(match kind {
                    RequestKind::AddToExisting => Self::AddToExisting(target),
                    RequestKind::Change => Self::Change(target),
                    _ => Self::Login(target),
                })
            }
            RequestKind::AddBulk => Ok(Self::AddBulk(AddBulk {
                browser_tab: required(request.browser_tab)?,
                count: required(request.count)?,
            })),
            RequestKind::BulkLogin => Ok(Self::BulkLogin(BulkLogin {
                browser_tab: required(request.browser_tab)?,
                account_ids: required(request.account_ids.clone())?,
            })),
            RequestKind::AdminLogin => Ok(Self::AdminLogin(AdminLogin {
                browser_tab: required(request.browser_tab)?,
            })),
            RequestKind::WebAuthnCreate => Ok(Self::WebAuthnRegistration(WebAuthnRegistration {
                browser_tab: required(request.browser_tab)?,
                site: required_site(request)?,
                username: required(request.username.clone())?,
                relying_party_id: required(request.relying_party_id.clone())?,
                algorithms: required(request.algorithms.clone())?,
                client_data_hash: request.challenge.clone(),
                extensions: request.webauthn_extensions.clone(),
            })),
            RequestKind::WebAuthnLogin => Ok(Self::WebAuthnLogin(WebAuthnLogin {
                browser_tab: required(request.browser_tab)?,
                account_id: required(request.account_id.clone())?,
                relying_party_id: required(request.relying_party_id.clone())?,
                challenge: required(request.challenge.clone())?,
            })),
            RequestKind::UpdateAccount => Ok(Self::UpdateAccount(UpdateAccount {
                browser_tab: required(request.browser_tab)?,
                account_id: required(request.account_id.clone())?,
                username: request.username.clone(),
            })),
            RequestKind::CreateOrganisation => Ok(Self::CreateOrganisation(CreateOrganisation {
                browser_tab: required(request.browser_tab)?,
                organisation_name: required(request.organisation_name.clone())?,
            })),
            RequestKind::AddWebAuthnToExisting => {
                Ok(Self::AddWebAuthnToExisting(AddWebAuthnToExisting {
                    browser_tab: required(request.browser_tab)?,
                    account_id: required(request.account_id.clone())?,
                    relying_party_id: required(request.relying_party_id.clone())?,
                    algorithms: required(request.algorithms.clone())?,
                    client_data_hash: request.challenge.clone(),
                    extensions: request.webauthn_extensions.clone(),
                }))
            }
            RequestKind::Reject | RequestKind::Error => Err(AuthorizationError::UnknownType),
        }
    }

    /// The request kind this flow answers.
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::AddSite(flow) => flow.kind,
            Self::AddToExisting(flow) | Self::Change(flow) | Self::Login(flow) => flow.kind,
            Self::AddBulk(_) => RequestKind::AddBulk,
            Self::BulkLogin(_) => RequestKind::BulkLogin,
            Self::AdminLogin(_) => RequestKind::AdminLogin,
            Self::WebAuthnRegistration(_) => RequestKind::WebAuthnCreate,
            Self::WebAuthnLogin(_) => RequestKind::WebAuthnLogin,
            Self::UpdateAccount(_) => RequestKind::UpdateAccount,
            Self::CreateOrganisation(_) => RequestKind::CreateOrganisation,
            Self::AddWebAuthnToExisting(_) => RequestKind::AddWebAuthnToExisting,
        }
    }

    /// The browser tab the response is routed to.
    pub fn browser_tab(&self) -> u32 {
        match self {
            Self::AddSite(flow) => flow.browser_tab,
            Self::AddToExisting(flow) | Self::Change(flow) | Self::Login(flow) => flow.browser_tab,
            Self::AddBulk(flow) => flow.browser_tab,
            Self::BulkLogin(flow) => flow.browser_tab,
            Self::AdminLogin(flow) => flow.browser_tab,
            Self::WebAuthnRegistration(flow) => flow.browser_tab,
            Self::WebAuthnLogin(flow) => flow.browser_tab,
            Self::UpdateAccount(flow) => flow.browser_tab,
            Self::CreateOrganisation(flow) => flow.browser_tab,
            Self::AddWebAuthnToExisting(flow) => flow.browser_tab,
        }
    }

    /// The reason string presented at the user-authentication prompt.
    pub fn authentication_reason(&self) -> String {
        match self {
            Self::AddSite(flow) => format!("Add account for {}", flow.site.name),
            Self::AddToExisting(flow) => reason_with_site("Add site to account", flow),
            Self::Change(flow) => reason_with_site("Change password", flow),
            Self::Login(flow) => reason_with_site("Log in", flow),
            Self::AddBulk(flow) => format!("Import {} accounts", flow.count),
            Self::BulkLogin(flow) => format!("Log in to {} tabs", flow.account_ids.len()),
            Self::AdminLogin(_) => "Log in to the team admin portal".to_owned(),
            Self::WebAuthnRegistration(flow) => format!("Add account for {}", flow.site.name),
            Self::WebAuthnLogin(flow) => format!("Log in to {}", flow.relying_party_id),
            Self::UpdateAccount(_) => "Update account".to_owned(),
            Self::CreateOrganisation(flow) => {
                format!("Create organisation {}", flow.organisation_name)
            }
            Self::AddWebAuthnToExisting(flow) => {
                format!("Add key for {}", flow.relying_party_id)
            }
        }
    }

    /// Run the flow: authenticate the user, perform the side effect, send the
    /// typed response over the session channel. Any error leaves the stores
    /// untouched beyond what the failing step already committed.
    pub async fn authorize<S, A, C, V>(
        &self,
        store: &mut S,
        accounts: &mut A,
        channel: &C,
        validation: &V,
    ) -> Result<SessionResponse, AuthorizationError>
    where
        S: SecretStore,
        A: AccountStore + Send,
        C: SessionChannel + Sync,
        V: UserValidation + Sync,
    {
        validation
            .authenticate(&self.authentication_reason(), false)
            .await?;

        let response = match self {
            Self::AddSite(flow) => flow.run(accounts).await?,
            Self::AddToExisting(flow) | Self::Change(flow) | Self::Login(flow) => {
                flow.run(accounts).await?
            }
            Self::AddBulk(flow) => SessionResponse::Acknowledged {
                kind: RequestKind::AddBulk,
                count: flow.count,
            },
            Self::BulkLogin(flow) => flow.run(accounts).await?,
            Self::AdminLogin(flow) => flow.run(accounts).await?,
            Self::WebAuthnRegistration(flow) => flow.run(store, accounts).await?,
            Self::WebAuthnLogin(flow) => flow.run(store, accounts).await?,
            Self::UpdateAccount(flow) => flow.run(accounts).await?,
            Self::CreateOrganisation(flow) => flow.run(accounts).await?,
            Self::AddWebAuthnToExisting(flow) => flow.run(store, accounts).await?,
        };

        channel.send(response.clone(), self.browser_tab()).await?;
        Ok(response)
    }

    /// Tell the browser the user rejected this request. Transport failures
    /// are logged, not propagated: from the user's perspective the rejection
    /// already happened.
    pub async fn reject<C: SessionChannel + Sync>(&self, channel: &C) {
        self.cancel(channel, None).await;
    }

    /// Send a reject or error response, best-effort.
    pub async fn cancel<C: SessionChannel + Sync>(&self, channel: &C, error: Option<String>) {
        let reason = if error.is_some() {
            RequestKind::Error
        } else {
            RequestKind::Reject
        };
        if let Err(err) = channel
            .cancel_request(reason, self.browser_tab(), error)
            .await
        {
            log::error!("reject message could not be sent: {err}");
        }
    }
}

impl AddSite {
    async fn run<A: AccountStore + Send>(
        &self,
        accounts: &mut A,
    ) -> Result<SessionResponse, AuthorizationError> {
        let account = Account {
            id: Account::identifier(&self.site.id, &self.username),
            username: self.username.clone(),
            sites: vec![self.site.clone()],
            webauthn: None,
        };
        accounts.create(account.clone()).await?;
        Ok(SessionResponse::Credentials {
            kind: self.kind,
            account_id: account.id,
            username: account.username,
        })
    }
}

impl AccountTarget {
    async fn run<A: AccountStore + Send>(
        &self,
        accounts: &mut A,
    ) -> Result<SessionResponse, AuthorizationError> {
        let account = accounts
            .get(&self.account_id)
            .await?
            .ok_or(AuthorizationError::AccountNotFound)?;
        Ok(SessionResponse::Credentials {
            kind: self.kind,
            account_id: account.id,
            username: account.username,
        })
    }
}

impl BulkLogin {
    async fn run<A: AccountStore + Send>(
        &self,
        accounts: &mut A,
    ) -> Result<SessionResponse, AuthorizationError> {
        let mut found = Vec::with_capacity(self.account_ids.len());
        for id in &self.account_ids {
            let account = accounts
                .get(id)
                .await?
                .ok_or(AuthorizationError::AccountNotFound)?;
            found.push((account.id, account.username));
        }
        Ok(SessionResponse::BulkCredentials { accounts: found })
    }
}

impl AdminLogin {
    async fn run<A: AccountStore + Send>(
        &self,
        accounts: &mut A,
    ) -> Result<SessionResponse, AuthorizationError> {
        let session = admin_session(accounts).await?;
        let seed = accounts.team_seed(&session.id).await?;
        Ok(SessionResponse::TeamSeed {
            session_id: session.id,
            team_id: session.team_id,
            seed: base64url(&seed),
        })
    }
}

impl WebAuthnRegistration {
    async fn run<S, A>(
        &self,
        store: &mut S,
        accounts: &mut A,
    ) -> Result<SessionResponse, AuthorizationError>
    where
        S: SecretStore,
        A: AccountStore + Send,
    {
        let account_id = Account::identifier(&self.site.id, &self.username);
        let mut credential = WebAuthnCredential::new(&self.relying_party_id, &self.algorithms)?;
        let key = credential.generate_key_pair(store, &account_id).await?;
        credential.save(store, &account_id, &key).await?;

        let attestation = attest(store, &mut credential, &account_id, self.client_data_hash.as_deref(), self.extensions.clone()).await?;

        let account = Account {
            id: account_id.clone(),
            username: self.username.clone(),
            sites: vec![self.site.clone()],
            webauthn: Some(credential),
        };
        accounts.create(account).await?;

        Ok(webauthn_response(
            RequestKind::WebAuthnCreate,
            account_id,
            attestation,
        ))
    }
}

impl WebAuthnLogin {
    async fn run<S, A>(
        &self,
        store: &mut S,
        accounts: &mut A,
    ) -> Result<SessionResponse, AuthorizationError>
    where
        S: SecretStore,
        A: AccountStore + Send,
    {
        let mut account = accounts
            .get(&self.account_id)
            .await?
            .ok_or(AuthorizationError::AccountNotFound)?;
        let credential = account
            .webauthn
            .as_mut()
            .ok_or(AuthorizationError::AccountNotFound)?;

        let (signature, counter) = credential
            .sign(store, &self.account_id, &self.challenge, &self.relying_party_id)
            .await?;
        accounts.update(account.clone()).await?;

        Ok(SessionResponse::WebAuthn {
            kind: RequestKind::WebAuthnLogin,
            account_id: self.account_id.clone(),
            signature: Some(signature),
            counter: Some(counter),
            certificates: None,
        })
    }
}

impl UpdateAccount {
    async fn run<A: AccountStore + Send>(
        &self,
        accounts: &mut A,
    ) -> Result<SessionResponse, AuthorizationError> {
        let mut account = accounts
            .get(&self.account_id)
            .await?
            .ok_or(AuthorizationError::AccountNotFound)?;
        if let Some(username) = &self.username {
            account.username = username.clone();
        }
        accounts.update(account.clone()).await?;
        Ok(SessionResponse::Credentials {
            kind: RequestKind::UpdateAccount,
            account_id: account.id,
            username: account.username,
        })
    }
}

impl CreateOrganisation {
    async fn run<A: AccountStore + Send>(
        &self,
        accounts: &mut A,
    ) -> Result<SessionResponse, AuthorizationError> {
        let session = admin_session(accounts).await?;
        let seed = accounts.team_seed(&session.id).await?;
        Ok(SessionResponse::TeamSeed {
            session_id: session.id,
            team_id: session.team_id,
            seed: base64url(&seed),
        })
    }
}

impl AddWebAuthnToExisting {
    async fn run<S, A>(
        &self,
        store: &mut S,
        accounts: &mut A,
    ) -> Result<SessionResponse, AuthorizationError>
    where
        S: SecretStore,
        A: AccountStore + Send,
    {
        let mut account = accounts
            .get(&self.account_id)
            .await?
            .ok_or(AuthorizationError::AccountNotFound)?;

        let mut credential = WebAuthnCredential::new(&self.relying_party_id, &self.algorithms)?;
        let key = credential.generate_key_pair(store, &self.account_id).await?;
        credential.save(store, &self.account_id, &key).await?;

        let attestation = attest(store, &mut credential, &self.account_id, self.client_data_hash.as_deref(), self.extensions.clone()).await?;

        account.webauthn = Some(credential);
        accounts.update(account).await?;

        Ok(webauthn_response(
            RequestKind::AddWebAuthnToExisting,
            self.account_id.clone(),
            attestation,
        ))
    }
}

/// The first admin team session, or why there is none.
async fn admin_session<A: AccountStore + Send>(
    accounts: &mut A,
) -> Result<TeamSession, AuthorizationError> {
    let sessions = accounts.team_sessions().await?;
    if sessions.is_empty() {
        return Err(AuthorizationError::NoTeamSession);
    }
    sessions
        .into_iter()
        .find(|session| session.is_admin)
        .ok_or(AuthorizationError::NotAdmin)
}

/// Sign an attestation when the relying party supplied a client-data hash;
/// registrations without one complete unattested.
async fn attest<S: SecretStore>(
    store: &mut S,
    credential: &mut WebAuthnCredential,
    account_id: &str,
    client_data_hash: Option<&str>,
    extensions: Option<WebAuthnExtensions>,
) -> Result<Option<(String, u32, Option<Vec<String>>)>, AuthorizationError> {
    let Some(client_data_hash) = client_data_hash else {
        return Ok(None);
    };
    let output = credential
        .sign_attestation(store, account_id, client_data_hash, extensions)
        .await?;
    let certificates = Attestation::certificate(store)
        .await?
        .map(|cert| vec![base64url(&cert)]);
    Ok(Some((output.signature, output.counter, certificates)))
}

fn webauthn_response(
    kind: RequestKind,
    account_id: String,
    attestation: Option<(String, u32, Option<Vec<String>>)>,
) -> SessionResponse {
    match attestation {
        Some((signature, counter, certificates)) => SessionResponse::WebAuthn {
            kind,
            account_id,
            signature: Some(signature),
            counter: Some(counter),
            certificates,
        },
        None => SessionResponse::WebAuthn {
            kind,
            account_id,
            signature: None,
            counter: None,
            certificates: None,
        },
    }
}

fn required<T>(field: Option<T>) -> Result<T, AuthorizationError> {
    field.ok_or(AuthorizationError::MissingData)
}

fn required_site(request: &AuthorizationRequest) -> Result<Site, AuthorizationError> {
    Ok(Site {
        id: required(request.site_id.clone())?,
        name: required(request.site_name.clone())?,
        url: required(request.site_url.clone())?,
    })
}

fn reason_with_site(action: &str, target: &AccountTarget) -> String {
    match &target.site_name {
        Some(site) => format!("{action} for {site}"),
        None => action.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use keywarden_authenticator::{MemoryStore, MockUserValidation};

    use super::*;
    use crate::session::{MemoryAccounts, MockSessionChannel};

    fn webauthn_create_request() -> AuthorizationRequest {
        AuthorizationRequest {
            kind: Some(RequestKind::WebAuthnCreate),
            browser_tab: Some(1),
            site_name: Some("Example".into()),
            site_url: Some("https://example.com".into()),
            site_id: Some("site-1".into()),
            username: Some("alice".into()),
            relying_party_id: Some("example.com".into()),
            algorithms: Some(vec![WebAuthnAlgorithm::EdDsa]),
            challenge: Some("YWJj".into()),
            ..Default::default()
        }
    }

    fn sending_channel() -> MockSessionChannel {
        let mut channel = MockSessionChannel::new();
        channel.expect_send().returning(|_, _| Ok(()));
        channel
    }

    #[test]
    fn outbound_kinds_have_no_flow() {
        for kind in [RequestKind::Reject, RequestKind::Error] {
            let request = AuthorizationRequest {
                kind: Some(kind),
                browser_tab: Some(1),
                ..Default::default()
            };
            assert_eq!(
                Authorizer::for_request(&request).err(),
                Some(AuthorizationError::UnknownType)
            );
        }
    }

    #[test]
    fn kindless_request_has_no_flow() {
        assert_eq!(
            Authorizer::for_request(&AuthorizationRequest::default()).err(),
            Some(AuthorizationError::UnknownType)
        );
    }

    #[test]
    fn missing_required_field_fails_validation() {
        let mut request = webauthn_create_request();
        request.relying_party_id = None;
        assert_eq!(
            Authorizer::for_request(&request).err(),
            Some(AuthorizationError::MissingData)
        );

        let login = AuthorizationRequest {
            kind: Some(RequestKind::Login),
            browser_tab: Some(1),
            ..Default::default()
        };
        assert_eq!(
            Authorizer::for_request(&login).err(),
            Some(AuthorizationError::MissingData)
        );
    }

    #[test]
    fn login_family_shares_one_flow() {
        for kind in [RequestKind::Login, RequestKind::Fill, RequestKind::GetDetails] {
            let request = AuthorizationRequest {
                kind: Some(kind),
                browser_tab: Some(3),
                account_id: Some("a1".into()),
                ..Default::default()
            };
            let authorizer = Authorizer::for_request(&request).unwrap();
            assert!(matches!(authorizer, Authorizer::Login(_)));
            assert_eq!(authorizer.kind(), kind);
        }
    }

    #[tokio::test]
    async fn registration_creates_account_with_credential_and_attests() {
        let mut store = MemoryStore::with_webauthn_seed(&[7; 32]);
        let mut accounts = MemoryAccounts::new();
        let validation = MockUserValidation::approving();
        let channel = sending_channel();

        let authorizer = Authorizer::for_request(&webauthn_create_request()).unwrap();
        let response = authorizer
            .authorize(&mut store, &mut accounts, &channel, &validation)
            .await
            .unwrap();

        let SessionResponse::WebAuthn { account_id, signature, counter, .. } = response else {
            panic!("expected a webauthn response");
        };
        assert!(signature.is_some());
        assert_eq!(counter, Some(1));

        let account = accounts.get(&account_id).await.unwrap().unwrap();
        let credential = account.webauthn.expect("credential attached");
        assert_eq!(credential.rp_id(), "example.com");
        assert_eq!(credential.counter(), 1);
    }

    #[tokio::test]
    async fn registration_without_client_data_skips_attestation() {
        let mut store = MemoryStore::with_webauthn_seed(&[7; 32]);
        let mut accounts = MemoryAccounts::new();
        let validation = MockUserValidation::approving();
        let channel = sending_channel();

        let mut request = webauthn_create_request();
        request.challenge = None;
        let authorizer = Authorizer::for_request(&request).unwrap();
        let response = authorizer
            .authorize(&mut store, &mut accounts, &channel, &validation)
            .await
            .unwrap();

        let SessionResponse::WebAuthn { signature, counter, .. } = response else {
            panic!("expected a webauthn response");
        };
        assert!(signature.is_none());
        assert!(counter.is_none());
    }

    #[tokio::test]
    async fn declined_authentication_reaches_no_store() {
        let mut store = MemoryStore::with_webauthn_seed(&[7; 32]);
        let mut accounts = MemoryAccounts::new();
        let validation = MockUserValidation::declining();
        let channel = MockSessionChannel::new();

        let authorizer = Authorizer::for_request(&webauthn_create_request()).unwrap();
        let result = authorizer
            .authorize(&mut store, &mut accounts, &channel, &validation)
            .await;
        assert!(matches!(
            result,
            Err(AuthorizationError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn login_flow_signs_with_the_stored_credential() {
        let mut store = MemoryStore::with_webauthn_seed(&[7; 32]);
        let mut accounts = MemoryAccounts::new();
        let validation = MockUserValidation::approving();
        let channel = sending_channel();

        // register first
        let register = Authorizer::for_request(&webauthn_create_request()).unwrap();
        let SessionResponse::WebAuthn { account_id, .. } = register
            .authorize(&mut store, &mut accounts, &channel, &validation)
            .await
            .unwrap()
        else {
            panic!("expected a webauthn response");
        };

        let request = AuthorizationRequest {
            kind: Some(RequestKind::WebAuthnLogin),
            browser_tab: Some(1),
            account_id: Some(account_id.clone()),
            relying_party_id: Some("example.com".into()),
            challenge: Some("YWJj".into()),
            ..Default::default()
        };
        let login = Authorizer::for_request(&request).unwrap();
        let response = login
            .authorize(&mut store, &mut accounts, &channel, &validation)
            .await
            .unwrap();

        let SessionResponse::WebAuthn { counter, certificates, .. } = response else {
            panic!("expected a webauthn response");
        };
        assert_eq!(counter, Some(2));
        assert!(certificates.is_none());

        // the counter survived in the stored account
        let account = accounts.get(&account_id).await.unwrap().unwrap();
        assert_eq!(account.webauthn.unwrap().counter(), 2);
    }

    #[tokio::test]
    async fn admin_login_requires_an_admin_session() {
        let mut store = MemoryStore::new();
        let validation = MockUserValidation::approving();
        let channel = sending_channel();
        let request = AuthorizationRequest {
            kind: Some(RequestKind::AdminLogin),
            browser_tab: Some(1),
            ..Default::default()
        };
        let authorizer = Authorizer::for_request(&request).unwrap();

        let mut accounts = MemoryAccounts::new();
        assert_eq!(
            authorizer
                .authorize(&mut store, &mut accounts, &channel, &validation)
                .await
                .err(),
            Some(AuthorizationError::NoTeamSession)
        );

        accounts.add_team_session(
            TeamSession {
                id: "t1".into(),
                team_id: "team".into(),
                is_admin: false,
            },
            vec![9; 32],
        );
        assert_eq!(
            authorizer
                .authorize(&mut store, &mut accounts, &channel, &validation)
                .await
                .err(),
            Some(AuthorizationError::NotAdmin)
        );

        accounts.add_team_session(
            TeamSession {
                id: "t2".into(),
                team_id: "team".into(),
                is_admin: true,
            },
            vec![9; 32],
        );
        let response = authorizer
            .authorize(&mut store, &mut accounts, &channel, &validation)
            .await
            .unwrap();
        assert_eq!(
            response,
            SessionResponse::TeamSeed {
                session_id: "t2".into(),
                team_id: "team".into(),
                seed: base64url(&[9; 32]),
            }
        );
    }

    #[tokio::test]
    async fn reject_swallows_transport_failure() {
        let mut channel = MockSessionChannel::new();
        channel
            .expect_cancel_request()
            .times(1)
            .returning(|_, _, _| Err(AuthorizationError::Transport("offline".into())));

        let request = AuthorizationRequest {
            kind: Some(RequestKind::Login),
            browser_tab: Some(1),
            account_id: Some("a1".into()),
            ..Default::default()
        };
        let authorizer = Authorizer::for_request(&request).unwrap();
        // must not propagate the transport error
        authorizer.reject(&channel).await;
    }

    #[tokio::test]
    async fn cancel_with_error_sends_error_kind() {
        let mut channel = MockSessionChannel::new();
        channel
            .expect_cancel_request()
            .withf(|reason, tab, error| {
                *reason == RequestKind::Error && *tab == 1 && error.is_some()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let request = AuthorizationRequest {
            kind: Some(RequestKind::Login),
            browser_tab: Some(1),
            account_id: Some("a1".into()),
            ..Default::default()
        };
        let authorizer = Authorizer::for_request(&request).unwrap();
        authorizer.cancel(&channel, Some("boom".into())).await;
    }
}
