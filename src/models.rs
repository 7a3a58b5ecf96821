//! Paste document and API request/response models.

use serde::{Deserialize, Serialize};

/// One named file inside a paste.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasteFile {
    pub name: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syntax_hint: Option<String>,
}

/// A stored paste. File order is preserved and meaningful (display order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteDocument {
    pub id: String,
    pub files: Vec<PasteFile>,
    /// Creation time, unix seconds
    pub created_at: u64,
    /// Expiry time, unix seconds; past values mean the paste is tombstoned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    /// Opaque creator token; only the matching owner may delete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_token: Option<String>,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub size_bytes: u64,
}

impl PasteDocument {
    /// Whether the document is logically deleted at `now` (unix seconds).
    pub fn expired(&self, now_secs: u64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now_secs)
    }

    pub fn summary(&self) -> PasteSummary {
        PasteSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            file_count: self.files.len(),
            size_bytes: self.size_bytes,
            views: self.views,
        }
    }
}

/// Request body for creating a paste.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePasteRequest {
    pub files: Vec<PasteFile>,
    /// Requested lifetime in seconds; server default applies when omitted
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    /// Existing owner token to attach this paste to
    #[serde(default)]
    pub owner_token: Option<String>,
    /// When true and no owner_token is given, a fresh owner token is
    /// issued and returned so the creator can manage the paste later
    #[serde(default)]
    pub claim: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePasteResponse {
    pub id: String,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_token: Option<String>,
}

/// Paste info for owner listings; content is omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteSummary {
    pub id: String,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    pub file_count: usize,
    pub size_bytes: u64,
    pub views: u64,
}

/// Process-wide request statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_requests: u64,
    /// Unix seconds of the most recent non-introspection request
    pub latest_request_time: u64,
    pub uptime_seconds: u64,
}
