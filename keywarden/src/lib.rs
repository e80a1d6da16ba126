//! # Keywarden
//!
//! Keywarden turns a device into a WebAuthn/FIDO2-style authenticator and a
//! remote authorization endpoint for a paired browser extension. It is
//! comprised of three sub-libraries:
//!
//! - `keywarden-authenticator` - usable as [`authenticator`]: deterministic
//!   per-relying-party key derivation, algorithm-polymorphic signing,
//!   credentials with a monotonic use counter, and the one-time device
//!   attestation enrollment.
//! - `keywarden-guard` - usable as [`guard`]: dispatches inbound remote
//!   requests to their authorization flows, enforces that a single
//!   authorization is in flight at a time, and drives the pairing handshake.
//! - `keywarden-types` - usable as [`types`]: the wire-exact structures both
//!   depend on — authenticator data, COSE keys, flags, the request protocol
//!   vocabulary.
//!
//! Platform concerns enter through traits: secret storage
//! ([`authenticator::SecretStore`]), the user presence/verification gate
//! ([`authenticator::UserValidation`]), the outbound session channel
//! ([`guard::SessionChannel`]) and session establishment
//! ([`guard::SessionFactory`]). The in-memory implementations shipped here
//! are suitable for tests and demos.
//!
//! ### Example: registering and asserting a credential
//!
//! ```
//! use keywarden::authenticator::{MemoryStore, WebAuthnCredential};
//! use keywarden::types::WebAuthnAlgorithm;
//!
//! # tokio_test::block_on(async {
//! // The root seed would come from the device's secret storage.
//! let mut store = MemoryStore::with_webauthn_seed(&[0x17; 32]);
//! let account_id = "d3b68b92d654b38c02612af0a8dd8cd3";
//!
//! // Negotiate an algorithm from the relying party's preference list.
//! let mut credential =
//!     WebAuthnCredential::new("example.com", &[WebAuthnAlgorithm::EdDsa]).unwrap();
//! let key = credential.generate_key_pair(&store, account_id).await.unwrap();
//! credential.save(&mut store, account_id, &key).await.unwrap();
//!
//! // Sign a challenge; the counter increments and is persisted first.
//! let (signature, counter) = credential
//!     .sign(&mut store, account_id, "YWJj", "example.com")
//!     .await
//!     .unwrap();
//! assert_eq!(counter, 1);
//! assert!(!signature.is_empty());
//! # })
//! ```

pub use keywarden_authenticator as authenticator;
pub use keywarden_guard as guard;
pub use keywarden_types as types;
