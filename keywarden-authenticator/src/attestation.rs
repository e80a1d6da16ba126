//! One-time device attestation enrollment.
//!
//! The device proves possession of a freshly generated P-256 key by sending a
//! self-signed PKCS#10 certification request to the enrollment backend, which
//! answers with a certificate. Key and certificate are stored together under
//! [`Service::Attestation`] and enrollment becomes a no-op from then on.
//!
//! The request is assembled byte by byte rather than through an ASN.1 crate:
//! the backend pins the exact subject layout and the FIDO extension block, so
//! the encoder only needs definite-length sequences up to two length bytes.

use async_trait::async_trait;
use keywarden_types::Aaguid;
use signature::Signer;

use crate::{
    error::WebAuthnError,
    secret_store::{SecretStore, Service},
};

/// The identifier the attestation key and certificate are stored under.
pub const ATTESTATION_KEY_ID: &str = "attestation-key";

/// The PKCS#9 extensionRequest attribute carrying the `basicConstraints`
/// (CA:FALSE) and FIDO `id-fido-gen-ce-aaguid` extensions. The AAGUID octet
/// string content follows directly after this block.
const EXTENSION_REQUEST: [u8; 52] = [
    0xa0, 0x42, 0x30, 0x40, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x09, 0x0e,
    0x31, 0x33, 0x30, 0x31, 0x30, 0x0c, 0x06, 0x03, 0x55, 0x1d, 0x13, 0x01, 0x01, 0xff, 0x04,
    0x02, 0x30, 0x00, 0x30, 0x21, 0x06, 0x0b, 0x2b, 0x06, 0x01, 0x04, 0x01, 0x82, 0xe5, 0x1c,
    0x01, 0x01, 0x04, 0x04, 0x12, 0x04, 0x10,
];

/// AlgorithmIdentifier for ecdsa-with-SHA256.
const SIGNATURE_ALGORITHM: [u8; 12] = [
    0x30, 0x0a, 0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x04, 0x03, 0x02,
];

// X.520 attribute type arcs under 2.5.4.
const OID_COUNTRY: u8 = 0x06;
const OID_ORGANIZATION: u8 = 0x0a;
const OID_ORGANIZATIONAL_UNIT: u8 = 0x0b;
const OID_COMMON_NAME: u8 = 0x03;

const TAG_UTF8_STRING: u8 = 0x0c;
const TAG_PRINTABLE_STRING: u8 = 0x13;

/// The backend endpoints attestation enrollment talks to.
#[cfg_attr(any(test, feature = "testable"), mockall::automock)]
#[async_trait]
pub trait EnrollmentApi {
    /// Fetch a fresh enrollment challenge.
    async fn challenge(&self) -> Result<String, WebAuthnError>;

    /// Submit the certification request, returning the issued certificate.
    async fn enroll(&self, challenge: &str, csr: &[u8]) -> Result<Vec<u8>, WebAuthnError>;
}

/// Builds the self-signed PKCS#10 request the enrollment backend expects.
#[derive(Debug, Clone)]
pub struct CertificationRequestBuilder {
    organisation: String,
}

impl CertificationRequestBuilder {
    /// A builder with the given organisation in the subject name.
    pub fn new(organisation: &str) -> Self {
        Self {
            organisation: organisation.to_owned(),
        }
    }

    /// Encode and self-sign the certification request for `key`.
    pub fn build(&self, key: &p256::ecdsa::SigningKey) -> Result<Vec<u8>, WebAuthnError> {
        let info = self.request_info(key.verifying_key())?;

        let signature: p256::ecdsa::Signature = key.sign(&info);
        let mut bits = vec![0x00];
        bits.extend_from_slice(signature.to_der().as_bytes());

        let mut request = info;
        request.extend(SIGNATURE_ALGORITHM);
        request.extend(wrap(0x03, bits)?);
        wrap(0x30, request)
    }

    /// The CertificationRequestInfo sequence: the bytes the signature covers.
    fn request_info(
        &self,
        verifying_key: &p256::ecdsa::VerifyingKey,
    ) -> Result<Vec<u8>, WebAuthnError> {
        use p256::pkcs8::EncodePublicKey;

        // version INTEGER 0
        let mut info = vec![0x02, 0x01, 0x00];

        let mut subject = Vec::new();
        subject.extend(rdn(
            OID_ORGANIZATIONAL_UNIT,
            TAG_UTF8_STRING,
            b"Authenticator Attestation",
        )?);
        subject.extend(rdn(
            OID_COMMON_NAME,
            TAG_UTF8_STRING,
            b"Keywarden FIDO Attestation v1",
        )?);
        subject.extend(rdn(OID_COUNTRY, TAG_PRINTABLE_STRING, b"NL")?);
        subject.extend(rdn(
            OID_ORGANIZATION,
            TAG_UTF8_STRING,
            self.organisation.as_bytes(),
        )?);
        info.extend(wrap(0x30, subject)?);

        let spki = verifying_key
            .to_public_key_der()
            .map_err(|_| WebAuthnError::InvalidKeyMaterial)?;
        info.extend_from_slice(spki.as_bytes());

        info.extend(EXTENSION_REQUEST);
        info.extend(Aaguid::DEVICE.0);
        wrap(0x30, info)
    }
}

/// One relativeDistinguishedName: `SET { SEQUENCE { 2.5.4.<arc>, value } }`.
fn rdn(arc: u8, tag: u8, value: &[u8]) -> Result<Vec<u8>, WebAuthnError> {
    let mut attribute = vec![0x06, 0x03, 0x55, 0x04, arc, tag];
    attribute.extend(der_length(value.len())?);
    attribute.extend_from_slice(value);
    wrap(0x31, wrap(0x30, attribute)?)
}

/// Prepend `tag` and the definite-length header to `content`.
fn wrap(tag: u8, content: Vec<u8>) -> Result<Vec<u8>, WebAuthnError> {
    let mut out = vec![tag];
    out.extend(der_length(content.len())?);
    out.extend(content);
    Ok(out)
}

/// DER definite length: short form below 128, long form with one or two
/// length bytes above. Anything needing more than two does not occur in a
/// certification request and is rejected.
fn der_length(length: usize) -> Result<Vec<u8>, WebAuthnError> {
    match length {
        // SAFETY: the match arms guarantee the value fits a u8.
        0..=0x7f => Ok(vec![u8::try_from(length).unwrap()]),
        0x80..=0xff => Ok(vec![0x81, u8::try_from(length).unwrap()]),
        0x100..=0x7fff => {
            // SAFETY: the match arm guarantees the value fits a u16.
            let bytes = u16::try_from(length).unwrap().to_be_bytes();
            Ok(vec![0x82, bytes[0], bytes[1]])
        }
        _ => Err(WebAuthnError::LengthOverflow),
    }
}

/// Drives the one-time enrollment of the device attestation key.
pub struct Attestation;

impl Attestation {
    /// Whether the device already holds an attestation key and certificate.
    pub async fn is_enrolled<S: SecretStore>(store: &S) -> bool {
        store.has(ATTESTATION_KEY_ID, Service::Attestation).await
    }

    /// Generate an attestation key, submit the certification request and
    /// persist key and certificate. Succeeds without touching the backend if
    /// the device is already enrolled.
    pub async fn enroll<S, A>(
        store: &mut S,
        api: &A,
        builder: &CertificationRequestBuilder,
    ) -> Result<(), WebAuthnError>
    where
        S: SecretStore,
        A: EnrollmentApi + Sync,
    {
        if Self::is_enrolled(store).await {
            return Ok(());
        }

        let challenge = api.challenge().await?;
        let key = p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng);
        let csr = builder.build(&key)?;
        let certificate = api.enroll(&challenge, &csr).await?;

        log::info!("attestation enrollment complete, storing certificate");
        store
            .save(
                ATTESTATION_KEY_ID,
                Service::Attestation,
                key.to_bytes().to_vec(),
                Some(certificate),
            )
            .await
    }

    /// The certificate issued at enrollment, if any.
    pub async fn certificate<S: SecretStore>(store: &S) -> Result<Option<Vec<u8>>, WebAuthnError> {
        store.attributes(ATTESTATION_KEY_ID, Service::Attestation).await
    }
}

#[cfg(test)]
mod tests {
    use signature::Verifier;

    use super::*;
    use crate::secret_store::MemoryStore;

    #[test]
    fn der_length_forms() {
        assert_eq!(der_length(0).unwrap(), vec![0x00]);
        assert_eq!(der_length(127).unwrap(), vec![0x7f]);
        assert_eq!(der_length(128).unwrap(), vec![0x81, 0x80]);
        assert_eq!(der_length(255).unwrap(), vec![0x81, 0xff]);
        assert_eq!(der_length(256).unwrap(), vec![0x82, 0x01, 0x00]);
        assert_eq!(der_length(32767).unwrap(), vec![0x82, 0x7f, 0xff]);
        assert_eq!(der_length(32768), Err(WebAuthnError::LengthOverflow));
    }

    #[test]
    fn name_independent_rdns_match_the_reference_encoding() {
        // These blocks are fixed by the backend and independent of the
        // product name, so they are pinned byte for byte.
        let ou = rdn(OID_ORGANIZATIONAL_UNIT, TAG_UTF8_STRING, b"Authenticator Attestation")
            .unwrap();
        let mut expected = vec![
            0x31, 0x22, 0x30, 0x20, 0x06, 0x03, 0x55, 0x04, 0x0b, 0x0c, 0x19,
        ];
        expected.extend(b"Authenticator Attestation");
        assert_eq!(ou, expected);

        let country = rdn(OID_COUNTRY, TAG_PRINTABLE_STRING, b"NL").unwrap();
        assert_eq!(
            country,
            vec![0x31, 0x0b, 0x30, 0x09, 0x06, 0x03, 0x55, 0x04, 0x06, 0x13, 0x02, 0x4e, 0x4c]
        );
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    #[test]
    fn request_is_a_sequence_with_pinned_extension_block() {
        let key = p256::ecdsa::SigningKey::from_slice(&[0x33; 32]).unwrap();
        let builder = CertificationRequestBuilder::new("Keywarden");
        let csr = builder.build(&key).unwrap();

        // both the request and the info sequence exceed 255 bytes, so each
        // header is the four-byte long form
        assert_eq!(&csr[..2], &[0x30, 0x82]);
        assert_eq!(&csr[4..6], &[0x30, 0x82]);
        // the version integer opens the info sequence, after both headers
        assert_eq!(&csr[8..11], &[0x02, 0x01, 0x00]);

        let extensions = find(&csr, &EXTENSION_REQUEST).expect("extension block present");
        assert_eq!(
            &csr[extensions + EXTENSION_REQUEST.len()..][..16],
            &Aaguid::DEVICE.0
        );
    }

    #[test]
    fn request_signature_verifies_over_the_info_sequence() {
        let key = p256::ecdsa::SigningKey::from_slice(&[0x44; 32]).unwrap();
        let builder = CertificationRequestBuilder::new("Keywarden");
        let csr = builder.build(&key).unwrap();

        let algorithm = find(&csr, &SIGNATURE_ALGORITHM).expect("signature algorithm present");
        let info = &csr[4..algorithm];
        assert_eq!(info, builder.request_info(key.verifying_key()).unwrap());

        // BIT STRING: tag, one length byte, leading zero, DER signature
        let bits = &csr[algorithm + SIGNATURE_ALGORITHM.len()..];
        assert_eq!(bits[0], 0x03);
        assert_eq!(bits[2], 0x00);
        let signature = p256::ecdsa::Signature::from_der(&bits[3..]).unwrap();
        key.verifying_key().verify(info, &signature).unwrap();
    }

    #[tokio::test]
    async fn enrollment_is_one_shot() {
        let mut store = MemoryStore::new();
        let builder = CertificationRequestBuilder::new("Keywarden");

        let mut api = MockEnrollmentApi::new();
        api.expect_challenge()
            .times(1)
            .returning(|| Ok("nonce".into()));
        api.expect_enroll()
            .times(1)
            .returning(|_, _| Ok(vec![0xca, 0xfe]));

        Attestation::enroll(&mut store, &api, &builder).await.unwrap();
        assert!(Attestation::is_enrolled(&store).await);
        assert_eq!(
            Attestation::certificate(&store).await.unwrap(),
            Some(vec![0xca, 0xfe])
        );

        // the mock panics on a second backend call
        Attestation::enroll(&mut store, &api, &builder).await.unwrap();
    }

    #[tokio::test]
    async fn backend_failure_leaves_the_device_unenrolled() {
        let mut store = MemoryStore::new();
        let mut api = MockEnrollmentApi::new();
        api.expect_challenge()
            .returning(|| Err(WebAuthnError::Storage("offline".into())));

        let builder = CertificationRequestBuilder::new("Keywarden");
        let result = Attestation::enroll(&mut store, &api, &builder).await;
        assert!(result.is_err());
        assert!(!Attestation::is_enrolled(&store).await);
    }
}
