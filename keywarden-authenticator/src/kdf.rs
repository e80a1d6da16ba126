//! Deterministic key derivation.
//!
//! A credential signing key is reached in two hops from the root webauthn
//! seed: first a per-relying-party key indexed by `sha256(rp_id)`, then the
//! signing seed indexed by the credential's stored salt with an account-bound
//! context. Re-deriving with identical inputs always yields the identical
//! key, so the EdDSA path needs no redundant key storage at all.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

/// Domain-separation context for the per-relying-party derivation hop.
pub const WEBAUTHN_CONTEXT: &str = "webauthn";

/// Derive a 32-byte key from `parent` with a domain-separation `context` and
/// an `index` byte sequence.
pub fn derive_key(parent: &[u8], context: &str, index: &[u8]) -> [u8; 32] {
    // SAFETY: HMAC-SHA256 accepts keys of any length.
    let mut mac = HmacSha256::new_from_slice(parent).unwrap();
    mac.update(&[1]);
    mac.update(context.as_bytes());
    mac.update(index);
    mac.finalize().into_bytes().into()
}

/// Derive `length` bytes from `parent`, expanding HMAC-SHA256 in counter
/// mode. Used for the 48- and 66-byte scalars of the larger curves.
pub fn derive_key_of_length(
    parent: &[u8],
    context: &str,
    index: &[u8],
    length: usize,
) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(length));
    let mut block: u8 = 1;
    while out.len() < length {
        // SAFETY: HMAC-SHA256 accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(parent).unwrap();
        mac.update(&[block]);
        mac.update(context.as_bytes());
        mac.update(index);
        let digest = mac.finalize().into_bytes();
        let take = usize::min(32, length - out.len());
        out.extend_from_slice(&digest[..take]);
        block = block.wrapping_add(1);
    }
    out
}
