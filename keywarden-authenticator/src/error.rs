use keywarden_types::InvalidCredentialData;

/// Errors produced by the authenticator engine.
#[derive(Debug, PartialEq, Eq)]
pub enum WebAuthnError {
    /// The relying party id presented at sign time does not match the id the
    /// credential was created for. Always fatal to the sign attempt; may
    /// signal a cross-origin replay.
    WrongRpId,

    /// None of the offered algorithms is supported by this platform, or the
    /// requested algorithm capability is missing. Recoverable by falling back
    /// or informing the user, never a crash.
    NotSupported,

    /// The referenced key material was not present in the secret store.
    KeyNotFound,

    /// The root seed the credential keys derive from is unavailable.
    SeedUnavailable,

    /// A base64 or hexadecimal field could not be decoded.
    InvalidEncoding,

    /// A derived scalar was rejected by the curve implementation.
    InvalidKeyMaterial,

    /// The secret store failed to persist or return data.
    Storage(String),

    /// A DER length exceeded the two-byte long form this encoder supports.
    LengthOverflow,
}

impl std::fmt::Display for WebAuthnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WrongRpId => write!(f, "relying party id does not match the credential"),
            Self::NotSupported => write!(f, "no offered algorithm is supported"),
            Self::KeyNotFound => write!(f, "key not found in the secret store"),
            Self::SeedUnavailable => write!(f, "root seed unavailable"),
            Self::InvalidEncoding => write!(f, "malformed base64 or hex field"),
            Self::InvalidKeyMaterial => write!(f, "derived key rejected by the curve"),
            Self::Storage(reason) => write!(f, "secret store failure: {reason}"),
            Self::LengthOverflow => write!(f, "DER length exceeds 32767 bytes"),
        }
    }
}

impl std::error::Error for WebAuthnError {}

impl From<InvalidCredentialData> for WebAuthnError {
    fn from(_: InvalidCredentialData) -> Self {
        WebAuthnError::InvalidEncoding
    }
}
