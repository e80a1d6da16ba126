use keywarden_types::{
    crypto::sha256,
    encoding::{base64url, try_from_base64url, try_from_hex},
    Aaguid, AttestedCredential, AuthenticatorData, WebAuthnAlgorithm, WebAuthnExtensions,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::WebAuthnError,
    kdf::{derive_key, derive_key_of_length, WEBAUTHN_CONTEXT},
    secret_store::{SecretStore, Service},
    signing_key::SigningKey,
};

/// The identifier the root webauthn seed is stored under.
pub const WEBAUTHN_SEED_ID: &str = "webauthn-seed";

/// Every algorithm the signing backend supports.
const SUPPORTED_ALGORITHMS: [WebAuthnAlgorithm; 4] = [
    WebAuthnAlgorithm::EdDsa,
    WebAuthnAlgorithm::Es256,
    WebAuthnAlgorithm::Es384,
    WebAuthnAlgorithm::Es512,
];

/// The result of a self-attestation: relying parties verify the signature
/// over the authenticator data, so those exact bytes are surfaced alongside
/// the counter that was promised in them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationOutput {
    /// Base64url signature over `authenticator data || client data hash`.
    pub signature: String,
    /// The counter value embedded in the signed data.
    pub counter: u32,
    /// The raw authenticator-data bytes that were signed.
    pub auth_data: Vec<u8>,
}

/// A WebAuthn credential binding one account to one relying party.
///
/// The signing key is never stored for the EdDSA path: it is re-derived from
/// the root seed, the relying party id, the account id and the per-credential
/// salt. The counter increments exactly once per authenticator-data
/// construction and is persisted before the signature is produced, so a
/// counter value can never be promised in a signature without being durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAuthnCredential {
    /// The relying party id this credential is scoped to.
    #[serde(rename = "id")]
    rp_id: String,
    algorithm: WebAuthnAlgorithm,
    salt: [u8; 8],
    counter: u32,
}

impl WebAuthnCredential {
    /// Create a new credential for `rp_id`, negotiating the algorithm from
    /// the relying party's ordered preference list against the full backend
    /// capability set.
    pub fn new(rp_id: &str, algorithms: &[WebAuthnAlgorithm]) -> Result<Self, WebAuthnError> {
        Self::new_with_support(rp_id, algorithms, &SUPPORTED_ALGORITHMS)
    }

    /// Like [`WebAuthnCredential::new`] with an explicit capability set.
    pub fn new_with_support(
        rp_id: &str,
        algorithms: &[WebAuthnAlgorithm],
        supported: &[WebAuthnAlgorithm],
    ) -> Result<Self, WebAuthnError> {
        let algorithm = WebAuthnAlgorithm::negotiate(algorithms, supported)
            .ok_or(WebAuthnError::NotSupported)?;
        Ok(Self {
            rp_id: rp_id.to_owned(),
            algorithm,
            salt: rand::random(),
            counter: 0,
        })
    }

    /// Restore a credential from its persisted state.
    pub async fn load<S: SecretStore>(
        store: &S,
        account_id: &str,
    ) -> Result<Self, WebAuthnError> {
        let bytes = store
            .get(account_id, Service::WebauthnCredential)
            .await?
            .ok_or(WebAuthnError::KeyNotFound)?;
        serde_json::from_slice(&bytes).map_err(|_| WebAuthnError::InvalidEncoding)
    }

    /// The relying party id.
    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    /// The negotiated algorithm.
    pub fn algorithm(&self) -> WebAuthnAlgorithm {
        self.algorithm
    }

    /// The current use counter.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Derive the signing key for `account_id` from the root seed.
    ///
    /// Two hops: the per-relying-party key indexed by `sha256(rp_id)`, then
    /// the signing seed with an account-bound context and the stored salt.
    pub async fn generate_key_pair<S: SecretStore>(
        &self,
        store: &S,
        account_id: &str,
    ) -> Result<SigningKey, WebAuthnError> {
        let root = store
            .get(WEBAUTHN_SEED_ID, Service::Seed)
            .await?
            .ok_or(WebAuthnError::SeedUnavailable)?;
        let site_key = derive_key(&root, WEBAUTHN_CONTEXT, &sha256(self.rp_id.as_bytes()));
        let context = account_context(account_id);
        let seed = derive_key_of_length(
            &site_key,
            &context,
            &self.salt,
            self.algorithm.scalar_length(),
        );
        SigningKey::from_seed(self.algorithm, &seed)
    }

    /// Persist the signing key and the credential state.
    ///
    /// EdDSA stores the raw key pair (private seed plus public attribute);
    /// the ECDSA variants store the curve-typed private handle.
    pub async fn save<S: SecretStore>(
        &self,
        store: &mut S,
        account_id: &str,
        key: &SigningKey,
    ) -> Result<(), WebAuthnError> {
        match self.algorithm {
            WebAuthnAlgorithm::EdDsa => {
                store
                    .save(
                        account_id,
                        Service::Webauthn,
                        key.private_key_bytes(),
                        Some(key.public_key()),
                    )
                    .await?;
            }
            _ => {
                store
                    .save(account_id, Service::WebauthnKey, key.private_key_bytes(), None)
                    .await?;
            }
        }
        self.persist(store, account_id).await
    }

    /// Remove the key material and credential state for `account_id`.
    pub async fn delete<S: SecretStore>(
        &self,
        store: &mut S,
        account_id: &str,
    ) -> Result<(), WebAuthnError> {
        match self.algorithm {
            WebAuthnAlgorithm::EdDsa => store.delete(account_id, Service::Webauthn).await?,
            _ => store.delete(account_id, Service::WebauthnKey).await?,
        }
        store.delete(account_id, Service::WebauthnCredential).await
    }

    /// The raw public key for `account_id`.
    pub async fn public_key<S: SecretStore>(
        &self,
        store: &S,
        account_id: &str,
    ) -> Result<Vec<u8>, WebAuthnError> {
        match self.algorithm {
            WebAuthnAlgorithm::EdDsa => store
                .attributes(account_id, Service::Webauthn)
                .await?
                .ok_or(WebAuthnError::KeyNotFound),
            _ => Ok(self.signing_key(store, account_id).await?.public_key()),
        }
    }

    /// Sign a WebAuthn challenge, producing an assertion.
    ///
    /// Fails with [`WebAuthnError::WrongRpId`] before any state change if
    /// `rp_id` is not the id this credential was created for.
    pub async fn sign<S: SecretStore>(
        &mut self,
        store: &mut S,
        account_id: &str,
        challenge: &str,
        rp_id: &str,
    ) -> Result<(String, u32), WebAuthnError> {
        if rp_id != self.rp_id {
            return Err(WebAuthnError::WrongRpId);
        }
        let challenge = try_from_base64url(challenge).ok_or(WebAuthnError::InvalidEncoding)?;
        let auth_data = self.next_authenticator_data(store, account_id, None, None).await?;

        let key = self.signing_key(store, account_id).await?;
        let mut message = auth_data.to_vec();
        message.extend_from_slice(&challenge);
        Ok((base64url(&key.sign(&message)), self.counter))
    }

    /// Produce a self-attestation over `client_data_hash` for a freshly
    /// registered credential, embedding the attested-credential block and the
    /// requested extensions.
    pub async fn sign_attestation<S: SecretStore>(
        &mut self,
        store: &mut S,
        account_id: &str,
        client_data_hash: &str,
        extensions: Option<WebAuthnExtensions>,
    ) -> Result<AttestationOutput, WebAuthnError> {
        let client_data_hash =
            try_from_base64url(client_data_hash).ok_or(WebAuthnError::InvalidEncoding)?;
        let attested = self.attested_credential(store, account_id).await?;
        let auth_data = self
            .next_authenticator_data(store, account_id, Some(attested), extensions)
            .await?;

        let key = self.signing_key(store, account_id).await?;
        let auth_data = auth_data.to_vec();
        let mut message = auth_data.clone();
        message.extend_from_slice(&client_data_hash);
        Ok(AttestationOutput {
            signature: base64url(&key.sign(&message)),
            counter: self.counter,
            auth_data,
        })
    }

    // Increment the counter and persist the credential state before anything
    // is signed. A crash after this point leaves the durable counter ahead of
    // any signature, never behind.
    async fn next_authenticator_data<S: SecretStore>(
        &mut self,
        store: &mut S,
        account_id: &str,
        attested: Option<AttestedCredential>,
        extensions: Option<WebAuthnExtensions>,
    ) -> Result<AuthenticatorData, WebAuthnError> {
        self.counter += 1;
        if let Err(err) = self.persist(store, account_id).await {
            self.counter -= 1;
            return Err(err);
        }

        let mut data = AuthenticatorData::new(&self.rp_id, self.counter);
        if let Some(attested) = attested {
            data = data.set_attested_credential(attested);
        }
        Ok(data.set_extensions(extensions))
    }

    async fn attested_credential<S: SecretStore>(
        &self,
        store: &S,
        account_id: &str,
    ) -> Result<AttestedCredential, WebAuthnError> {
        let mut credential_id = try_from_hex(account_id).ok_or(WebAuthnError::InvalidEncoding)?;
        credential_id.truncate(16);
        let public_key = self.public_key(store, account_id).await?;
        Ok(AttestedCredential::new(
            Aaguid::DEVICE,
            credential_id,
            self.algorithm,
            public_key,
        )?)
    }

    async fn signing_key<S: SecretStore>(
        &self,
        store: &S,
        account_id: &str,
    ) -> Result<SigningKey, WebAuthnError> {
        let service = match self.algorithm {
            WebAuthnAlgorithm::EdDsa => Service::Webauthn,
            _ => Service::WebauthnKey,
        };
        let bytes = store
            .get(account_id, service)
            .await?
            .ok_or(WebAuthnError::KeyNotFound)?;
        SigningKey::from_scalar_bytes(self.algorithm, &bytes)
    }

    async fn persist<S: SecretStore>(
        &self,
        store: &mut S,
        account_id: &str,
    ) -> Result<(), WebAuthnError> {
        // SAFETY: the credential state contains no non-serializable values.
        let bytes = serde_json::to_vec(self).unwrap();
        store
            .update(account_id, Service::WebauthnCredential, bytes)
            .await
    }
}

/// The account-bound derivation context: the first 8 characters of the
/// base64url account-id hash.
fn account_context(account_id: &str) -> String {
    let hash = base64url(&sha256(account_id.as_bytes()));
    hash.chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use keywarden_types::Flags;
    use signature::Verifier;

    use super::*;
    use crate::secret_store::MemoryStore;

    // 32 hex-decodable characters so the credential id can be derived.
    const ACCOUNT_ID: &str = "d3b68b92d654b38c02612af0a8dd8cd3";

    fn zero_salt(credential: &mut WebAuthnCredential) {
        credential.salt = [0; 8];
    }

    async fn registered(
        algorithm: WebAuthnAlgorithm,
    ) -> (WebAuthnCredential, MemoryStore) {
        let mut store = MemoryStore::with_webauthn_seed(&[0x5a; 32]);
        let mut credential = WebAuthnCredential::new("example.com", &[algorithm]).unwrap();
        zero_salt(&mut credential);
        let key = credential.generate_key_pair(&store, ACCOUNT_ID).await.unwrap();
        credential.save(&mut store, ACCOUNT_ID, &key).await.unwrap();
        (credential, store)
    }

    #[tokio::test]
    async fn eddsa_end_to_end_assertion() {
        let (mut credential, mut store) = registered(WebAuthnAlgorithm::EdDsa).await;
        // base64("abc")
        let (signature, counter) = credential
            .sign(&mut store, ACCOUNT_ID, "YWJj", "example.com")
            .await
            .unwrap();
        assert_eq!(counter, 1);

        let mut expected = sha256(b"example.com").to_vec();
        expected.push(0x05);
        expected.extend([0, 0, 0, 1]);
        expected.extend(b"abc");

        let public: [u8; 32] = credential
            .public_key(&store, ACCOUNT_ID)
            .await
            .unwrap()
            .try_into()
            .unwrap();
        let verifier = ed25519_dalek::VerifyingKey::from_bytes(&public).unwrap();
        let signature =
            ed25519_dalek::Signature::from_slice(&try_from_base64url(&signature).unwrap())
                .unwrap();
        verifier.verify(&expected, &signature).unwrap();
    }

    #[tokio::test]
    async fn url_safe_challenge_is_accepted() {
        let (mut credential, mut store) = registered(WebAuthnAlgorithm::EdDsa).await;
        // base64url of [0xfb, 0xff]; the standard alphabet spells it "+/8"
        let (_, counter) = credential
            .sign(&mut store, ACCOUNT_ID, "-_8", "example.com")
            .await
            .unwrap();
        assert_eq!(counter, 1);
    }

    #[tokio::test]
    async fn signatures_use_the_url_safe_alphabet() {
        let (mut credential, mut store) = registered(WebAuthnAlgorithm::EdDsa).await;
        for _ in 0..8 {
            let (signature, _) = credential
                .sign(&mut store, ACCOUNT_ID, "YWJj", "example.com")
                .await
                .unwrap();
            assert!(!signature.contains('+'));
            assert!(!signature.contains('/'));
            assert!(!signature.contains('='));
        }
    }

    #[tokio::test]
    async fn counter_is_strictly_monotonic_across_operations() {
        let (mut credential, mut store) = registered(WebAuthnAlgorithm::Es256).await;
        let mut seen = Vec::new();
        for _ in 0..3 {
            let (_, counter) = credential
                .sign(&mut store, ACCOUNT_ID, "YWJj", "example.com")
                .await
                .unwrap();
            seen.push(counter);
        }
        let output = credential
            .sign_attestation(&mut store, ACCOUNT_ID, "YWJj", None)
            .await
            .unwrap();
        seen.push(output.counter);
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn counter_survives_reload() {
        let (mut credential, mut store) = registered(WebAuthnAlgorithm::EdDsa).await;
        credential
            .sign(&mut store, ACCOUNT_ID, "YWJj", "example.com")
            .await
            .unwrap();

        let restored = WebAuthnCredential::load(&store, ACCOUNT_ID).await.unwrap();
        assert_eq!(restored.counter(), 1);
        assert_eq!(restored, credential);
    }

    #[tokio::test]
    async fn wrong_rp_id_fails_without_counter_increment() {
        let (mut credential, mut store) = registered(WebAuthnAlgorithm::EdDsa).await;
        let result = credential
            .sign(&mut store, ACCOUNT_ID, "YWJj", "attacker.example")
            .await;
        assert_eq!(result, Err(WebAuthnError::WrongRpId));
        assert_eq!(credential.counter(), 0);
        let stored = WebAuthnCredential::load(&store, ACCOUNT_ID).await.unwrap();
        assert_eq!(stored.counter(), 0);
    }

    #[tokio::test]
    async fn attestation_sets_at_flag_and_embeds_cose_key() {
        let (mut credential, mut store) = registered(WebAuthnAlgorithm::Es256).await;
        let output = credential
            .sign_attestation(&mut store, ACCOUNT_ID, "YWJj", None)
            .await
            .unwrap();
        assert_eq!(output.counter, 1);
        let flags = Flags::try_from(output.auth_data[32]).unwrap();
        assert!(flags.contains(Flags::AT));
        assert!(!flags.contains(Flags::ED));
        // aaguid follows the 37-byte header
        assert_eq!(&output.auth_data[37..53], &Aaguid::DEVICE.0);
        // credential id is the first 16 bytes of the hex-decoded account id
        assert_eq!(
            &output.auth_data[55..71],
            &try_from_hex(ACCOUNT_ID).unwrap()[..16]
        );
    }

    #[tokio::test]
    async fn attestation_with_extensions_sets_ed_flag() {
        let (mut credential, mut store) = registered(WebAuthnAlgorithm::EdDsa).await;
        let output = credential
            .sign_attestation(
                &mut store,
                ACCOUNT_ID,
                "YWJj",
                Some(WebAuthnExtensions {
                    hmac_secret: Some(true),
                    credential_protection_policy: None,
                }),
            )
            .await
            .unwrap();
        let flags = Flags::try_from(output.auth_data[32]).unwrap();
        assert!(flags.contains(Flags::ED));
        assert!(output.auth_data.ends_with(&[0xf5]));
    }

    #[tokio::test]
    async fn attestation_signature_verifies_with_the_credential_key() {
        let (mut credential, mut store) = registered(WebAuthnAlgorithm::Es256).await;
        let output = credential
            .sign_attestation(&mut store, ACCOUNT_ID, "YWJj", None)
            .await
            .unwrap();

        let raw = credential.public_key(&store, ACCOUNT_ID).await.unwrap();
        let mut sec1 = vec![0x04];
        sec1.extend_from_slice(&raw);
        let verifier = p256::ecdsa::VerifyingKey::from_sec1_bytes(&sec1).unwrap();
        let mut message = output.auth_data.clone();
        message.extend(b"abc");
        let signature =
            p256::ecdsa::Signature::from_der(&try_from_base64url(&output.signature).unwrap())
                .unwrap();
        verifier.verify(&message, &signature).unwrap();
    }

    #[tokio::test]
    async fn missing_seed_is_surfaced() {
        let store = MemoryStore::new();
        let credential =
            WebAuthnCredential::new("example.com", &[WebAuthnAlgorithm::EdDsa]).unwrap();
        assert_eq!(
            credential.generate_key_pair(&store, ACCOUNT_ID).await.err(),
            Some(WebAuthnError::SeedUnavailable)
        );
    }

    #[tokio::test]
    async fn unsupported_candidate_list_is_rejected() {
        assert_eq!(
            WebAuthnCredential::new_with_support(
                "example.com",
                &[WebAuthnAlgorithm::Es384],
                &[WebAuthnAlgorithm::EdDsa]
            )
            .err(),
            Some(WebAuthnError::NotSupported)
        );
    }

    #[tokio::test]
    async fn delete_removes_key_material_and_state() {
        let (credential, mut store) = registered(WebAuthnAlgorithm::Es384).await;
        credential.delete(&mut store, ACCOUNT_ID).await.unwrap();
        assert!(!store.has(ACCOUNT_ID, Service::WebauthnKey).await);
        assert!(!store.has(ACCOUNT_ID, Service::WebauthnCredential).await);
    }

    #[tokio::test]
    async fn key_regenerates_identically_from_the_root_seed() {
        let (credential, store) = registered(WebAuthnAlgorithm::EdDsa).await;
        let again = credential.generate_key_pair(&store, ACCOUNT_ID).await.unwrap();
        assert_eq!(
            credential.public_key(&store, ACCOUNT_ID).await.unwrap(),
            again.public_key()
        );
    }
}
