use serde::{Deserialize, Serialize};

/// The signature algorithms this authenticator can negotiate with a relying
/// party, tagged with their COSE algorithm identifiers.
///
/// The algorithm is chosen once at credential creation from the relying
/// party's ordered preference list and is immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(try_from = "i64", into = "i64")]
pub enum WebAuthnAlgorithm {
    /// Ed25519 EdDSA, COSE identifier -8.
    EdDsa,
    /// ECDSA over P-256 with SHA-256, COSE identifier -7.
    Es256,
    /// ECDSA over P-384 with SHA-384, COSE identifier -35.
    Es384,
    /// ECDSA over P-521 with SHA-512, COSE identifier -36.
    Es512,
}

impl WebAuthnAlgorithm {
    /// The raw width of one public-key coordinate on this curve.
    ///
    /// The 521-bit curve encodes its coordinates as [`Self::coordinate_length`]
    /// bytes, one more than this, to preserve the sign-extension zero byte.
    pub const fn key_length(self) -> usize {
        match self {
            Self::EdDsa | Self::Es256 => 32,
            Self::Es384 => 48,
            Self::Es512 => 65,
        }
    }

    /// The fixed coordinate width relying parties expect in COSE key maps.
    pub const fn coordinate_length(self) -> usize {
        match self {
            Self::Es512 => 66,
            other => other.key_length(),
        }
    }

    /// The scalar width of a private key for this algorithm.
    pub const fn scalar_length(self) -> usize {
        match self {
            Self::EdDsa | Self::Es256 => 32,
            Self::Es384 => 48,
            Self::Es512 => 66,
        }
    }

    /// The COSE algorithm identifier.
    pub const fn cose_identifier(self) -> i64 {
        match self {
            Self::EdDsa => -8,
            Self::Es256 => -7,
            Self::Es384 => -35,
            Self::Es512 => -36,
        }
    }

    /// Select the first algorithm in the relying party's preference order that
    /// is present in `supported`. EdDSA acts as a fallback when none of the
    /// preferred algorithms are available but the relying party accepts it.
    pub fn negotiate(
        preferred: &[WebAuthnAlgorithm],
        supported: &[WebAuthnAlgorithm],
    ) -> Option<WebAuthnAlgorithm> {
        preferred
            .iter()
            .find(|alg| supported.contains(alg))
            .or_else(|| {
                preferred
                    .iter()
                    .find(|alg| matches!(alg, WebAuthnAlgorithm::EdDsa))
            })
            .copied()
    }
}

impl From<WebAuthnAlgorithm> for i64 {
    fn from(alg: WebAuthnAlgorithm) -> Self {
        alg.cose_identifier()
    }
}

impl TryFrom<i64> for WebAuthnAlgorithm {
    type Error = UnknownAlgorithm;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -8 => Ok(Self::EdDsa),
            -7 => Ok(Self::Es256),
            -35 => Ok(Self::Es384),
            -36 => Ok(Self::Es512),
            other => Err(UnknownAlgorithm(other)),
        }
    }
}

/// The COSE identifier did not match any algorithm this authenticator knows.
#[derive(Debug, PartialEq, Eq)]
pub struct UnknownAlgorithm(pub i64);

impl std::fmt::Display for UnknownAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown COSE algorithm identifier {}", self.0)
    }
}

impl std::error::Error for UnknownAlgorithm {}
