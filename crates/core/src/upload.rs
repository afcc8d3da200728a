//! Upload options and lifecycle.

use serde::{Deserialize, Serialize};

/// Upload handle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    /// Handle is open and accepting bytes.
    Open,
    /// Upload was committed to the catalog.
    Committed,
    /// Upload was explicitly aborted.
    Aborted,
    /// A chunk or catalog write failed and the upload was rolled back.
    Failed,
}

impl UploadState {
    /// Check if the handle can still receive bytes.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Check if the handle reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Aborted | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }
}

/// Per-upload options.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadOptions {
    /// Chunk size override (uses the bucket default if not specified).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
    /// Caller-supplied metadata stored with the revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl UploadOptions {
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_state_flags() {
        assert!(UploadState::Open.is_active());
        assert!(!UploadState::Open.is_terminal());
        for state in [
            UploadState::Committed,
            UploadState::Aborted,
            UploadState::Failed,
        ] {
            assert!(!state.is_active());
            assert!(state.is_terminal());
        }
    }

    #[test]
    fn test_upload_options_builders() {
        let options = UploadOptions::default()
            .with_chunk_size(4)
            .with_metadata(serde_json::json!({"owner": "ci"}));
        assert_eq!(options.chunk_size, Some(4));
        assert_eq!(options.metadata.unwrap()["owner"], "ci");
    }
}
