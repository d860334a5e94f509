/// Durable download queue types
use super::DownloadId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a queued download request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Waiting to be submitted
    Pending,
    /// Accepted by the server
    Submitted,
    /// Last submission attempt failed
    Failed,
}

impl DownloadStatus {
    /// Convert to string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Failed => "failed",
        }
    }

    /// Parse from string
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "submitted" => Some(Self::Submitted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether a sync pass should (re)submit this entry
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user-initiated download request that survives restarts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDownload {
    pub id: DownloadId,
    pub url: String,
    pub title: Option<String>,
    pub status: DownloadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub attempts: u32,
    pub error: Option<String>,
    /// Server-side id once submitted
    pub remote_id: Option<String>,
}

/// One accepted entry of a `POST /download` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedDownload {
    pub id: String,
}

/// In-progress download as reported by `GET /download`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDownload {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Filter for the download status listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFilter {
    Pending,
    Downloading,
}

impl DownloadFilter {
    /// Query-string value
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
        }
    }
}

/// Result of asking for a download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnqueueOutcome {
    /// Whether the request was accepted (submitted or durably queued)
    pub success: bool,
    /// Local queue id when durably queued, server id when submitted directly
    pub id: Option<String>,
}
