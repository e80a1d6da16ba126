use std::collections::HashMap;

use crate::error::WebAuthnError;

/// The service classes secrets are filed under. Mirrors the storage
/// discipline of the credential engine: EdDSA key pairs, curve-typed ECDSA
/// handles and credential state live in separate classes so deletion of one
/// never touches another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Root seeds.
    Seed,
    /// EdDSA WebAuthn key pairs: the private seed as secret, the public key
    /// as attribute data.
    Webauthn,
    /// Curve-typed ECDSA private-key handles.
    WebauthnKey,
    /// Serialized credential state (algorithm, salt, counter).
    WebauthnCredential,
    /// Device attestation key and certificate.
    Attestation,
    /// Team seeds for admin login.
    TeamSeed,
}

/// Identifier-keyed secret storage with an optional attribute blob per entry.
///
/// The engine never assumes a storage medium; implementations may gate access
/// behind an authenticated context. All operations may suspend on human
/// interaction.
#[async_trait::async_trait]
pub trait SecretStore {
    /// Fetch the secret stored under `id` and `service`, if any.
    async fn get(&self, id: &str, service: Service) -> Result<Option<Vec<u8>>, WebAuthnError>;

    /// Fetch the attribute blob stored alongside the secret, if any.
    async fn attributes(
        &self,
        id: &str,
        service: Service,
    ) -> Result<Option<Vec<u8>>, WebAuthnError>;

    /// Store a new secret with an optional attribute blob.
    async fn save(
        &mut self,
        id: &str,
        service: Service,
        secret: Vec<u8>,
        attributes: Option<Vec<u8>>,
    ) -> Result<(), WebAuthnError>;

    /// Replace the secret stored under `id`, keeping the attribute blob.
    async fn update(
        &mut self,
        id: &str,
        service: Service,
        secret: Vec<u8>,
    ) -> Result<(), WebAuthnError>;

    /// Remove the entry under `id` and `service`.
    async fn delete(&mut self, id: &str, service: Service) -> Result<(), WebAuthnError>;

    /// Whether an entry exists under `id` and `service`.
    async fn has(&self, id: &str, service: Service) -> bool;
}

#[derive(Debug, Clone)]
struct Entry {
    secret: Vec<u8>,
    attributes: Option<Vec<u8>>,
}

/// In-memory store.
///
/// Useful for tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<(String, Service), Entry>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a root webauthn seed under the conventional id.
    pub fn with_webauthn_seed(seed: &[u8]) -> Self {
        let mut store = Self::new();
        store.entries.insert(
            (crate::credential::WEBAUTHN_SEED_ID.to_owned(), Service::Seed),
            Entry {
                secret: seed.to_vec(),
                attributes: None,
            },
        );
        store
    }
}

#[async_trait::async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, id: &str, service: Service) -> Result<Option<Vec<u8>>, WebAuthnError> {
        Ok(self
            .entries
            .get(&(id.to_owned(), service))
            .map(|entry| entry.secret.clone()))
    }

    async fn attributes(
        &self,
        id: &str,
        service: Service,
    ) -> Result<Option<Vec<u8>>, WebAuthnError> {
        Ok(self
            .entries
            .get(&(id.to_owned(), service))
            .and_then(|entry| entry.attributes.clone()))
    }

    async fn save(
        &mut self,
        id: &str,
        service: Service,
        secret: Vec<u8>,
        attributes: Option<Vec<u8>>,
    ) -> Result<(), WebAuthnError> {
        self.entries
            .insert((id.to_owned(), service), Entry { secret, attributes });
        Ok(())
    }

    async fn update(
        &mut self,
        id: &str,
        service: Service,
        secret: Vec<u8>,
    ) -> Result<(), WebAuthnError> {
        match self.entries.get_mut(&(id.to_owned(), service)) {
            Some(entry) => {
                entry.secret = secret;
                Ok(())
            }
            None => {
                self.entries
                    .insert((id.to_owned(), service), Entry { secret, attributes: None });
                Ok(())
            }
        }
    }

    async fn delete(&mut self, id: &str, service: Service) -> Result<(), WebAuthnError> {
        self.entries
            .remove(&(id.to_owned(), service))
            .map(|_| ())
            .ok_or(WebAuthnError::KeyNotFound)
    }

    async fn has(&self, id: &str, service: Service) -> bool {
        self.entries.contains_key(&(id.to_owned(), service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn service_classes_do_not_collide() {
        let mut store = MemoryStore::new();
        store
            .save("acc", Service::Webauthn, vec![1], None)
            .await
            .unwrap();
        store
            .save("acc", Service::WebauthnKey, vec![2], None)
            .await
            .unwrap();

        assert_eq!(store.get("acc", Service::Webauthn).await.unwrap(), Some(vec![1]));
        assert_eq!(store.get("acc", Service::WebauthnKey).await.unwrap(), Some(vec![2]));

        store.delete("acc", Service::Webauthn).await.unwrap();
        assert!(!store.has("acc", Service::Webauthn).await);
        assert!(store.has("acc", Service::WebauthnKey).await);
    }

    #[tokio::test]
    async fn attributes_survive_update() {
        let mut store = MemoryStore::new();
        store
            .save("acc", Service::Webauthn, vec![1], Some(vec![9]))
            .await
            .unwrap();
        store.update("acc", Service::Webauthn, vec![2]).await.unwrap();
        assert_eq!(store.get("acc", Service::Webauthn).await.unwrap(), Some(vec![2]));
        assert_eq!(
            store.attributes("acc", Service::Webauthn).await.unwrap(),
            Some(vec![9])
        );
    }

    #[tokio::test]
    async fn deleting_missing_entry_is_key_not_found() {
        let mut store = MemoryStore::new();
        assert_eq!(
            store.delete("nope", Service::Webauthn).await,
            Err(WebAuthnError::KeyNotFound)
        );
    }
}
