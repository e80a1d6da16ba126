use serde::{Deserialize, Serialize};

/// The WebAuthn extensions a relying party may request at registration time.
///
/// Extension support is closed to these two keys; the short field names `hs`
/// and `cp` are part of the request protocol vocabulary and must not change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAuthnExtensions {
    /// Whether the relying party requested the `hmac-secret` extension.
    #[serde(rename = "hs", skip_serializing_if = "Option::is_none")]
    pub hmac_secret: Option<bool>,

    /// The requested `credProtect` policy level.
    #[serde(rename = "cp", skip_serializing_if = "Option::is_none")]
    pub credential_protection_policy: Option<i64>,
}

impl WebAuthnExtensions {
    /// Whether any extension would actually be encoded into authenticator data.
    ///
    /// Only extensions literally present and truthy count; `hs: false` is
    /// treated the same as an absent entry.
    pub fn is_empty(&self) -> bool {
        self.credential_protection_policy.is_none() && self.hmac_secret != Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::WebAuthnExtensions;

    #[test]
    fn wire_names_are_hs_and_cp() {
        let ext = WebAuthnExtensions {
            hmac_secret: Some(true),
            credential_protection_policy: Some(1),
        };
        assert_eq!(
            serde_json::to_string(&ext).unwrap(),
            r#"{"hs":true,"cp":1}"#
        );
    }

    #[test]
    fn false_hmac_secret_counts_as_empty() {
        let ext = WebAuthnExtensions {
            hmac_secret: Some(false),
            credential_protection_policy: None,
        };
        assert!(ext.is_empty());
        assert!(WebAuthnExtensions::default().is_empty());
    }
}
