//! # Keywarden Types
//!
//! Shared type definitions for the keywarden authenticator engine and the
//! remote-request authorization protocol. Everything in this crate that
//! crosses a wire boundary is byte-exact: the authenticator-data layout, the
//! COSE public-key fragments, and the request/response field names are the
//! protocol vocabulary that relying parties and the companion extension
//! depend on.

mod aaguid;
mod algorithm;
mod auth_data;
mod extensions;
mod flags;
mod request;
mod request_log;

pub mod crypto;
pub mod encoding;

pub use self::{
    aaguid::Aaguid,
    algorithm::WebAuthnAlgorithm,
    auth_data::{AttestedCredential, AuthenticatorData, InvalidCredentialData},
    extensions::WebAuthnExtensions,
    flags::Flags,
    request::{AuthorizationRequest, RequestKind},
    request_log::{RequestLogEntry, RequestLogStorage},
};
