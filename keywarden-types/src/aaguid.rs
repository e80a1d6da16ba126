use serde::{Deserialize, Serialize};

/// An Authenticator Attestation GUID is a 128-bit identifier indicating the
/// type of the authenticator.
///
/// Every keywarden installation reports the same fixed identifier, so relying
/// parties can recognise the authenticator model without being able to track
/// individual devices. The same 16 bytes are embedded in the device
/// certificate-signing request during attestation enrollment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Aaguid(pub [u8; Self::LEN]);

impl Aaguid {
    const LEN: usize = 16;

    /// The fixed identifier reported by this authenticator.
    pub const DEVICE: Aaguid = Aaguid([
        0xd6, 0xd0, 0xbd, 0xc3, 0x62, 0xee, 0xc4, 0xdb, 0xde, 0x8d, 0x7a, 0x65, 0x6e, 0x4a, 0x44,
        0x87,
    ]);

    /// Generate an empty AAGUID, used when doing self or no attestation.
    pub const fn new_empty() -> Self {
        Self([0; 16])
    }
}

impl Default for Aaguid {
    fn default() -> Self {
        Self::DEVICE
    }
}

impl From<[u8; 16]> for Aaguid {
    fn from(inner: [u8; 16]) -> Self {
        Aaguid(inner)
    }
}

impl Serialize for Aaguid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Aaguid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct AaguidVisitor;
        impl<'de> serde::de::Visitor<'de> for AaguidVisitor {
            type Value = Aaguid;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "A byte string of {} bytes long", Aaguid::LEN)
            }

            fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.try_into().map(Aaguid).map_err(|_| {
                    E::custom(format!("Byte string of len {}, is not of len 16", v.len()))
                })
            }
        }
        deserializer.deserialize_bytes(AaguidVisitor)
    }
}
