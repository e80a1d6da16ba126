//! # Keywarden Authenticator
//!
//! The on-device WebAuthn engine: deterministic per-relying-party key
//! derivation, algorithm-polymorphic signing, credential state with a
//! monotonic use counter, and the one-time device attestation enrollment.
//!
//! Storage and user verification are defined through traits so the engine
//! carries no platform policy: the [`SecretStore`] only requires
//! identifier-keyed get/put/delete, and the [`UserValidation`] seam yields an
//! opaque authenticated context.
//!
//! ## Why RustCrypto?
//!
//! The signing backend is the pure-Rust [RustCrypto] stack (plus
//! `ed25519-dalek` for EdDSA): deterministic key construction from derived
//! seeds is a hard requirement here, since credential keys are regenerated
//! from the root seed rather than stored.
//!
//! [RustCrypto]: https://github.com/RustCrypto

mod attestation;
mod credential;
mod error;
mod kdf;
mod secret_store;
mod signing_key;
mod user_validation;

pub use self::{
    attestation::{Attestation, CertificationRequestBuilder, EnrollmentApi, ATTESTATION_KEY_ID},
    credential::{AttestationOutput, WebAuthnCredential, WEBAUTHN_SEED_ID},
    error::WebAuthnError,
    kdf::{derive_key, derive_key_of_length, WEBAUTHN_CONTEXT},
    secret_store::{MemoryStore, SecretStore, Service},
    signing_key::SigningKey,
    user_validation::{AuthenticatedContext, UserValidation, ValidationError},
};

#[cfg(any(test, feature = "testable"))]
pub use self::{attestation::MockEnrollmentApi, user_validation::MockUserValidation};
