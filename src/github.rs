//! GitHub Actions artifact API client
//!
//! Two calls against the hosting API: listing the artifacts of a workflow
//! run, and downloading one artifact's zip archive. Both are authenticated
//! with the per-target token. No retries, no pagination, no rate limiting.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::io::Write;
use tracing::debug;

/// Production API base URL
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// One build artifact as reported by the listing endpoint
///
/// Field names follow the GitHub REST wire format.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Artifact {
    /// Numeric artifact id
    pub id: i64,
    /// Opaque node id
    #[serde(default)]
    pub node_id: String,
    /// Display name
    pub name: String,
    /// Size in bytes
    #[serde(default)]
    pub size_in_bytes: u64,
    /// API URL of the artifact itself
    #[serde(default)]
    pub url: String,
    /// Locator of the downloadable zip archive
    pub archive_download_url: String,
    /// Whether the artifact has expired and can no longer be downloaded
    #[serde(default)]
    pub expired: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp
    pub updated_at: DateTime<Utc>,
    /// Expiry timestamp
    pub expires_at: DateTime<Utc>,
}

impl Artifact {
    /// Environment variables exposed to before/after hook commands
    pub fn hook_env(&self) -> Vec<(String, String)> {
        vec![
            ("ARTIFACT_ID".to_string(), self.id.to_string()),
            ("ARTIFACT_NAME".to_string(), self.name.clone()),
            ("ARTIFACT_SIZE".to_string(), self.size_in_bytes.to_string()),
            ("ARTIFACT_URL".to_string(), self.url.clone()),
            (
                "ARTIFACT_DOWNLOAD_URL".to_string(),
                self.archive_download_url.clone(),
            ),
        ]
    }
}

/// Result of one artifact-listing call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtifactList {
    /// Total number of artifacts reported by the API
    #[serde(default)]
    pub total_count: i64,
    /// Artifacts in the order returned by the API
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

/// Client for the artifact listing and download endpoints
#[derive(Clone)]
pub struct ArtifactClient {
    http: reqwest::Client,
    base_url: String,
}

impl Default for ArtifactClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactClient {
    /// Create a client against the production API
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_API_BASE)
    }

    /// Create a client against a custom API base URL (used by tests)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// List the artifacts of a workflow run
    ///
    /// `repo` must be an "owner/name" identifier.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedRepository`] if `repo` does not split into exactly
    /// two components, [`Error::Network`] on transport failure, and
    /// [`Error::Decode`] if the response body is not the expected JSON.
    pub async fn list_artifacts(
        &self,
        repo: &str,
        run_id: i64,
        token: &str,
    ) -> Result<ArtifactList> {
        let (owner, name) = split_repo(repo)?;

        let url = format!(
            "{}/repos/{}/{}/actions/runs/{}/artifacts",
            self.base_url, owner, name, run_id
        );
        debug!(url = %url, "requesting artifact list");

        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("token {token}"))
            .send()
            .await?;

        // Read the body as text first so a bad payload surfaces as a decode
        // error rather than a transport error.
        let body = response.text().await?;
        debug!(response = %body, "artifact list response");

        let list: ArtifactList = serde_json::from_str(&body)?;
        Ok(list)
    }

    /// Download an artifact archive, streaming the body into `dest`
    ///
    /// The body is copied chunk by chunk so a large archive is never held
    /// in memory in full. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// [`Error::Network`] on transport failure, [`Error::Io`] if `dest`
    /// cannot be written.
    pub async fn download<W: Write>(&self, url: &str, token: &str, dest: &mut W) -> Result<u64> {
        debug!(url = %url, "downloading artifact archive");

        let mut response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("token {token}"))
            .send()
            .await?;

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            dest.write_all(&chunk)?;
            written += chunk.len() as u64;
        }

        debug!(size = written, "artifact archive downloaded");
        Ok(written)
    }
}

/// Split an "owner/name" repository identifier into its two components
fn split_repo(repo: &str) -> Result<(&str, &str)> {
    let mut parts = repo.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {
            Ok((owner, name))
        }
        _ => Err(Error::MalformedRepository(repo.to_string())),
    }
}
