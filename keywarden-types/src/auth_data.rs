use std::num::TryFromIntError;

use ciborium::value::Value;
use coset::{iana, iana::EnumI64, CborSerializable, CoseKey, CoseKeyBuilder, Label};

use crate::{crypto::sha256, Aaguid, Flags, WebAuthnAlgorithm, WebAuthnExtensions};

/// The authenticator data structure encodes contextual bindings made by the
/// authenticator: the relying party the operation is scoped to, the state of
/// user presence and verification, and the signature counter. Relying parties
/// verify signatures over these exact bytes, so the layout produced by
/// [`AuthenticatorData::to_vec`] must never change.
///
/// <https://w3c.github.io/webauthn/#sctn-authenticator-data>
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    /// SHA-256 hash of the RP ID the credential is scoped to.
    rp_id_hash: [u8; 32],

    /// The flag byte. See [Flags] for the individual bits.
    pub flags: Flags,

    /// Signature counter, 32-bit unsigned big-endian integer. The caller
    /// increments the persisted counter before constructing this value.
    pub counter: u32,

    /// An optional [AttestedCredential]; when present [`Flags::AT`] is set
    /// during serialization.
    pub attested_credential: Option<AttestedCredential>,

    /// Extension outputs. Only a non-empty map is encoded and sets
    /// [`Flags::ED`].
    pub extensions: Option<WebAuthnExtensions>,
}

impl AuthenticatorData {
    /// Create authenticator data for an RP ID and counter value.
    ///
    /// The flags start at their default: user present and user verified.
    pub fn new(rp_id: &str, counter: u32) -> Self {
        Self {
            rp_id_hash: sha256(rp_id.as_bytes()),
            flags: Flags::default(),
            counter,
            attested_credential: None,
            extensions: None,
        }
    }

    /// Add an [`AttestedCredential`] block, marking this as registration data.
    pub fn set_attested_credential(mut self, credential: AttestedCredential) -> Self {
        self.attested_credential = Some(credential);
        self
    }

    /// Request encoding of the given extension outputs. An empty map is
    /// dropped and does not set [`Flags::ED`].
    pub fn set_extensions(mut self, extensions: Option<WebAuthnExtensions>) -> Self {
        self.extensions = extensions.filter(|ext| !ext.is_empty());
        self
    }

    /// Get read access to the RP ID hash
    pub fn rp_id_hash(&self) -> &[u8] {
        &self.rp_id_hash
    }

    /// Encode the authenticator data to its byte representation.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut flags = self.flags;
        if self.attested_credential.is_some() {
            flags |= Flags::AT;
        }
        if self.extensions.is_some() {
            flags |= Flags::ED;
        }

        self.rp_id_hash
            .into_iter()
            .chain(std::iter::once(u8::from(flags)))
            .chain(self.counter.to_be_bytes())
            .chain(
                self.attested_credential
                    .clone()
                    .map(AttestedCredential::into_iter)
                    .into_iter()
                    .flatten(),
            )
            .chain(
                self.extensions
                    .as_ref()
                    .map(extension_bytes)
                    .into_iter()
                    .flatten(),
            )
            .collect()
    }
}

/// Encode the extension outputs as a CBOR map with one entry per present and
/// truthy extension, `credProtect` first. The `credProtect` output is always
/// policy level 1 and `hmac-secret` always reports support.
fn extension_bytes(extensions: &WebAuthnExtensions) -> Vec<u8> {
    let mut entries = Vec::new();
    if extensions.credential_protection_policy.is_some() {
        entries.push((Value::Text("credProtect".into()), Value::Integer(1.into())));
    }
    if extensions.hmac_secret == Some(true) {
        entries.push((Value::Text("hmac-secret".into()), Value::Bool(true)));
    }

    let mut bytes = Vec::new();
    // SAFETY: serializing a map of text keys and scalar values into a Vec
    // cannot fail.
    ciborium::ser::into_writer(&Value::Map(entries), &mut bytes).unwrap();
    bytes
}

/// Attested credential data is a variable-length byte block added to the
/// authenticator data when producing an attestation for a new credential.
///
/// <https://w3c.github.io/webauthn/#attested-credential-data>
#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredential {
    /// The AAGUID of the authenticator.
    pub aaguid: Aaguid,

    /// The credential ID whose length is prepended to the byte block. Not
    /// public so it cannot be made longer than a u16 length prefix allows.
    credential_id: Vec<u8>,

    /// The algorithm the public key belongs to; fixes the COSE layout.
    pub algorithm: WebAuthnAlgorithm,

    /// The raw public key: 32 bytes for EdDSA, the fixed-width `X || Y`
    /// coordinates for the ECDSA curves, leading zero bytes preserved.
    public_key: Vec<u8>,
}

impl AttestedCredential {
    /// Create a new [AttestedCredential].
    ///
    /// # Error
    /// Fails if the credential id length cannot be represented by a u16 or the
    /// public key does not have the exact raw width of the algorithm.
    pub fn new(
        aaguid: Aaguid,
        credential_id: Vec<u8>,
        algorithm: WebAuthnAlgorithm,
        public_key: Vec<u8>,
    ) -> Result<Self, InvalidCredentialData> {
        u16::try_from(credential_id.len()).map_err(InvalidCredentialData::CredentialIdTooLong)?;
        let expected = match algorithm {
            WebAuthnAlgorithm::EdDsa => 32,
            ecdsa => ecdsa.coordinate_length() * 2,
        };
        if public_key.len() != expected {
            return Err(InvalidCredentialData::PublicKeyLength {
                expected,
                got: public_key.len(),
            });
        }
        Ok(Self {
            aaguid,
            credential_id,
            algorithm,
            public_key,
        })
    }

    /// Get read access to the credential ID.
    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    /// The COSE_Key encoding of the public key. The byte layout is fixed per
    /// algorithm: CTAP2 canonical CBOR with `kty`, `alg`, `crv` and the raw
    /// coordinate(s), nothing else.
    pub fn cose_key_bytes(&self) -> Vec<u8> {
        let key = match self.algorithm {
            WebAuthnAlgorithm::EdDsa => okp_public_key(&self.public_key),
            ecdsa => {
                let width = ecdsa.coordinate_length();
                let (x, y) = self.public_key.split_at(width);
                let (curve, alg) = match ecdsa {
                    WebAuthnAlgorithm::Es256 => (iana::EllipticCurve::P_256, iana::Algorithm::ES256),
                    WebAuthnAlgorithm::Es384 => (iana::EllipticCurve::P_384, iana::Algorithm::ES384),
                    _ => (iana::EllipticCurve::P_521, iana::Algorithm::ES512),
                };
                CoseKeyBuilder::new_ec2_pub_key(curve, x.to_vec(), y.to_vec())
                    .algorithm(alg)
                    .build()
            }
        };
        // SAFETY: a key built from validated coordinates always serializes.
        key.to_vec().unwrap()
    }

    /// Custom implementation rather than IntoIterator because the iterator
    /// type is complicated.
    fn into_iter(self) -> impl Iterator<Item = u8> {
        let cose_key = self.cose_key_bytes();
        // SAFETY: the length has been asserted to fit a u16 in the constructor.
        let id_len = u16::try_from(self.credential_id.len()).unwrap();
        self.aaguid
            .0
            .into_iter()
            .chain(id_len.to_be_bytes())
            .chain(self.credential_id)
            .chain(cose_key)
    }
}

/// Build the OKP/Ed25519 COSE key: `{1: 1, 3: -8, -1: 6, -2: x}` in canonical
/// order.
fn okp_public_key(x: &[u8]) -> CoseKey {
    CoseKey {
        kty: coset::RegisteredLabel::Assigned(iana::KeyType::OKP),
        alg: Some(coset::RegisteredLabelWithPrivate::Assigned(
            iana::Algorithm::EdDSA,
        )),
        params: vec![
            (
                Label::Int(iana::OkpKeyParameter::Crv.to_i64()),
                Value::Integer(iana::EllipticCurve::Ed25519.to_i64().into()),
            ),
            (
                Label::Int(iana::OkpKeyParameter::X.to_i64()),
                Value::Bytes(x.to_vec()),
            ),
        ],
        ..Default::default()
    }
}

/// The attested-credential block could not be constructed.
#[derive(Debug)]
pub enum InvalidCredentialData {
    /// A credential ID can be a maximum of 65535 bytes.
    CredentialIdTooLong(TryFromIntError),
    /// The raw public key had the wrong width for the algorithm.
    PublicKeyLength {
        /// The width the algorithm requires.
        expected: usize,
        /// The width that was provided.
        got: usize,
    },
}

impl std::fmt::Display for InvalidCredentialData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CredentialIdTooLong(_) => write!(f, "credential id does not fit a u16 length"),
            Self::PublicKeyLength { expected, got } => {
                write!(f, "public key width {got} does not match algorithm width {expected}")
            }
        }
    }
}

impl std::error::Error for InvalidCredentialData {}
