//! Utility functions for encoding binary fields in a consistent way across the
//! `keywarden` crates. All binary material crossing the session boundary is
//! base64url without padding.

use data_encoding::{BASE64, BASE64URL, BASE64URL_NOPAD, BASE64_NOPAD, HEXLOWER_PERMISSIVE};

/// Convert bytes to base64 without padding
pub fn base64(data: &[u8]) -> String {
    BASE64_NOPAD.encode(data)
}

/// Convert bytes to base64url without padding
pub fn base64url(data: &[u8]) -> String {
    BASE64URL_NOPAD.encode(data)
}

/// Try parsing from base64 with or without padding
pub fn try_from_base64(input: &str) -> Option<Vec<u8>> {
    let padding = BASE64.specification().padding?;
    let sane_string = input.trim_end_matches(padding);
    BASE64_NOPAD.decode(sane_string.as_bytes()).ok()
}

/// Try parsing from base64url with or without padding
pub fn try_from_base64url(input: &str) -> Option<Vec<u8>> {
    let padding = BASE64URL.specification().padding?;
    let sane_string = input.trim_end_matches(padding);
    BASE64URL_NOPAD.decode(sane_string.as_bytes()).ok()
}

/// Decode a hexadecimal string, accepting both upper and lower case digits.
pub fn try_from_hex(input: &str) -> Option<Vec<u8>> {
    HEXLOWER_PERMISSIVE.decode(input.as_bytes()).ok()
}
