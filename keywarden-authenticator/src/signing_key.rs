use keywarden_types::WebAuthnAlgorithm;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use signature::Signer;

use crate::error::WebAuthnError;

/// An algorithm-polymorphic signing key.
///
/// Each variant owns its curve-typed private key and knows its own raw-byte
/// widths and signature convention: EdDSA signatures are raw 64-byte values,
/// ECDSA signatures are DER-encoded. Public keys are returned as fixed-width
/// raw coordinates; leading zero bytes are never truncated.
pub enum SigningKey {
    /// Ed25519.
    EdDsa(ed25519_dalek::SigningKey),
    /// ECDSA over P-256.
    Es256(p256::ecdsa::SigningKey),
    /// ECDSA over P-384.
    Es384(p384::ecdsa::SigningKey),
    /// ECDSA over P-521.
    Es512(p521::ecdsa::SigningKey),
}

impl SigningKey {
    /// Construct a key deterministically from a derived seed.
    ///
    /// The seed must be exactly [`WebAuthnAlgorithm::scalar_length`] bytes.
    /// P-521 seeds are clamped to the scalar range by masking the top byte
    /// down to its single meaningful bit.
    pub fn from_seed(algorithm: WebAuthnAlgorithm, seed: &[u8]) -> Result<Self, WebAuthnError> {
        if seed.len() != algorithm.scalar_length() {
            return Err(WebAuthnError::InvalidKeyMaterial);
        }
        match algorithm {
            WebAuthnAlgorithm::Es512 => {
                let mut clamped = seed.to_vec();
                clamped[0] &= 0x01;
                Self::from_scalar_bytes(algorithm, &clamped)
            }
            _ => Self::from_scalar_bytes(algorithm, seed),
        }
    }

    /// Construct a key from stored scalar bytes, as persisted by
    /// [`SigningKey::private_key_bytes`].
    pub fn from_scalar_bytes(
        algorithm: WebAuthnAlgorithm,
        bytes: &[u8],
    ) -> Result<Self, WebAuthnError> {
        match algorithm {
            WebAuthnAlgorithm::EdDsa => {
                let seed: &[u8; 32] = bytes
                    .try_into()
                    .map_err(|_| WebAuthnError::InvalidKeyMaterial)?;
                Ok(Self::EdDsa(ed25519_dalek::SigningKey::from_bytes(seed)))
            }
            WebAuthnAlgorithm::Es256 => p256::ecdsa::SigningKey::from_slice(bytes)
                .map(Self::Es256)
                .map_err(|_| WebAuthnError::InvalidKeyMaterial),
            WebAuthnAlgorithm::Es384 => p384::ecdsa::SigningKey::from_slice(bytes)
                .map(Self::Es384)
                .map_err(|_| WebAuthnError::InvalidKeyMaterial),
            WebAuthnAlgorithm::Es512 => p521::ecdsa::SigningKey::from_slice(bytes)
                .map(Self::Es512)
                .map_err(|_| WebAuthnError::InvalidKeyMaterial),
        }
    }

    /// The algorithm this key signs with.
    pub fn algorithm(&self) -> WebAuthnAlgorithm {
        match self {
            Self::EdDsa(_) => WebAuthnAlgorithm::EdDsa,
            Self::Es256(_) => WebAuthnAlgorithm::Es256,
            Self::Es384(_) => WebAuthnAlgorithm::Es384,
            Self::Es512(_) => WebAuthnAlgorithm::Es512,
        }
    }

    /// Sign `message`, producing a raw 64-byte signature for EdDSA and a DER
    /// signature for the ECDSA curves.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        match self {
            Self::EdDsa(key) => key.sign(message).to_bytes().to_vec(),
            Self::Es256(key) => {
                let signature: p256::ecdsa::Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            }
            Self::Es384(key) => {
                let signature: p384::ecdsa::Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            }
            Self::Es512(key) => {
                let signature: p521::ecdsa::Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            }
        }
    }

    /// The raw public key: 32 bytes for EdDSA, uncompressed fixed-width
    /// `X || Y` coordinates for the ECDSA curves.
    pub fn public_key(&self) -> Vec<u8> {
        match self {
            Self::EdDsa(key) => key.verifying_key().to_bytes().to_vec(),
            Self::Es256(key) => raw_coordinates(&key.verifying_key().to_encoded_point(false)),
            Self::Es384(key) => raw_coordinates(&key.verifying_key().to_encoded_point(false)),
            Self::Es512(key) => {
                // p521 0.13 does not expose `verifying_key`; derive the
                // public point at the curve level instead.
                // SAFETY: the scalar bytes come from a valid signing key
                let secret = p521::SecretKey::from_slice(&key.to_bytes()).unwrap();
                raw_coordinates(&secret.public_key().to_encoded_point(false))
            }
        }
    }

    /// The private scalar bytes, suitable for the secret store.
    pub fn private_key_bytes(&self) -> Vec<u8> {
        match self {
            Self::EdDsa(key) => key.to_bytes().to_vec(),
            Self::Es256(key) => key.to_bytes().to_vec(),
            Self::Es384(key) => key.to_bytes().to_vec(),
            Self::Es512(key) => key.to_bytes().to_vec(),
        }
    }
}

/// Concatenate the fixed-width affine coordinates of an uncompressed point.
fn raw_coordinates<P: AsRef<[u8]>>(point: &P) -> Vec<u8> {
    // uncompressed SEC1: 0x04 || X || Y
    point.as_ref()[1..].to_vec()
}
