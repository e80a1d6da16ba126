use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{AuthorizationRequest, RequestKind};

/// One entry in the request log: which session asked what, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    /// Human-readable site name, when the request carried one.
    #[serde(rename = "siteName")]
    pub site_name: Option<String>,

    /// The session the request arrived on.
    #[serde(rename = "sessionID")]
    pub session_id: Option<String>,

    /// The request kind.
    #[serde(rename = "type")]
    pub kind: RequestKind,

    /// Milliseconds since the epoch at which the request was received.
    pub timestamp: u64,
}

impl RequestLogEntry {
    /// Build a log entry from an inbound request. Uses the transport timestamp
    /// when present, the local clock otherwise.
    pub fn from_request(request: &AuthorizationRequest, kind: RequestKind) -> Self {
        let timestamp = request.sent_timestamp.unwrap_or_else(now_millis);
        Self {
            site_name: request.site_name.clone(),
            session_id: request.session_id.clone(),
            kind,
            timestamp,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Append-only store of authorization requests, filterable per session.
/// Persistence of the serialized entries is the caller's concern.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RequestLogStorage {
    entries: Vec<RequestLogEntry>,
}

impl RequestLogStorage {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn save(&mut self, entry: RequestLogEntry) {
        self.entries.push(entry);
    }

    /// All entries logged for the given session, oldest first.
    pub fn for_session(&self, session_id: &str) -> Vec<&RequestLogEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.session_id.as_deref() == Some(session_id))
            .collect()
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[RequestLogEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(session: &str, kind: RequestKind) -> RequestLogEntry {
        RequestLogEntry {
            site_name: Some("example".into()),
            session_id: Some(session.into()),
            kind,
            timestamp: 1,
        }
    }

    #[test]
    fn filters_by_session() {
        let mut log = RequestLogStorage::new();
        log.save(entry("a", RequestKind::Login));
        log.save(entry("b", RequestKind::Change));
        log.save(entry("a", RequestKind::WebAuthnLogin));

        let for_a = log.for_session("a");
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].kind, RequestKind::Login);
        assert_eq!(for_a[1].kind, RequestKind::WebAuthnLogin);
        assert!(log.for_session("c").is_empty());
    }

    #[test]
    fn entries_round_trip_through_json() {
        let mut log = RequestLogStorage::new();
        log.save(entry("a", RequestKind::AdminLogin));
        let json = serde_json::to_string(&log).unwrap();
        let restored: RequestLogStorage = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.entries(), log.entries());
    }
}
