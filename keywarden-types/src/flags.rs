use bitflags::bitflags;

bitflags! {
    /// Flags for authenticator data
    ///
    /// <https://w3c.github.io/webauthn/#authdata-flags>
    #[repr(transparent)]
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct Flags: u8 {
        /// User Present, bit 0
        const UP = 1 << 0;
        /// User Verified, bit 2
        const UV = 1 << 2;
        /// Attested Credential Data, bit 6
        const AT = 1 << 6;
        /// Extension Data Included, bit 7
        const ED = 1 << 7;
    }
}

impl Default for Flags {
    /// Every operation this authenticator performs is gated by user
    /// authentication, so presence and verification are always reported.
    fn default() -> Self {
        Flags::UP | Flags::UV
    }
}

impl From<Flags> for u8 {
    fn from(src: Flags) -> Self {
        src.bits()
    }
}

impl TryFrom<u8> for Flags {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Flags::from_bits(value).ok_or(())
    }
}
