//! Server-side download submission and status.

use crate::client::error_for_response;
use crate::error::{Result, ServerClientError};
use crate::types::SubmitDownloadsRequest;
use encore_core::{DownloadFilter, RemoteDownload, SubmittedDownload};
use reqwest::Client;
use tracing::{debug, info};

/// Download client for the Encore server.
pub struct DownloadClient<'a> {
    http: &'a Client,
    base_url: &'a str,
    access_token: &'a str,
}

impl<'a> DownloadClient<'a> {
    pub(crate) fn new(http: &'a Client, base_url: &'a str, access_token: &'a str) -> Self {
        Self {
            http,
            base_url,
            access_token,
        }
    }

    /// Submit URLs for the server to download.
    pub async fn submit(&self, urls: &[String], auto_start: bool) -> Result<Vec<SubmittedDownload>> {
        let url = format!("{}/download", self.base_url);
        debug!(url = %url, count = urls.len(), "Submitting downloads");

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.access_token)
            .json(&SubmitDownloadsRequest { urls, auto_start })
            .send()
            .await
            .map_err(ServerClientError::from_send)?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        let submitted: Vec<SubmittedDownload> = response.json().await.map_err(|e| {
            ServerClientError::ParseError(format!("Failed to parse download response: {}", e))
        })?;

        info!(accepted = submitted.len(), "Downloads submitted");
        Ok(submitted)
    }

    /// List downloads the server still has in progress.
    pub async fn list(&self, filter: DownloadFilter) -> Result<Vec<RemoteDownload>> {
        let url = format!("{}/download", self.base_url);
        debug!(url = %url, filter = filter.as_str(), "Listing downloads");

        let response = self
            .http
            .get(&url)
            .query(&[("filter", filter.as_str())])
            .bearer_auth(self.access_token)
            .send()
            .await
            .map_err(ServerClientError::from_send)?;

        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }

        response.json().await.map_err(|e| {
            ServerClientError::ParseError(format!("Failed to parse download list: {}", e))
        })
    }
}
