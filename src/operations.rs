use std::fmt::{self, Display};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::model::*;

#[cfg(test)]
use mockall::automock;

#[derive(Debug)]
pub enum FetchError {
    Transport(reqwest::Error),
    Status(StatusCode),
    Decode(serde_json::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e)
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FetchError::Transport(e) => write!(f, "transport error: {}", e),
            FetchError::Status(code) => write!(f, "unexpected status: {}", code),
            FetchError::Decode(e) => write!(f, "malformed body: {}", e),
        }
    }
}

impl std::error::Error for FetchError {}

pub fn status_path(event_id: u64) -> String {
    format!("/api/events/{}/voting/status/", event_id)
}

pub fn results_path(event_id: u64) -> String {
    format!("/api/events/{}/voting/results/", event_id)
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait VotingApi {
    async fn voting_status(&self, event_id: u64) -> Result<ApiResponse<VotingStatus>, FetchError>;
    async fn voting_results(&self, event_id: u64) -> Result<ApiResponse<VotingResults>, FetchError>;
}

#[derive(Clone)]
pub struct HttpVotingApi {
    client: Client,
    base_url: String,
}

impl HttpVotingApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<HttpVotingApi, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(HttpVotingApi {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        decode_envelope(status, &bytes)
    }
}

/// Decodes a response body into its envelope before looking at the HTTP
/// status. A body that says `"success": false` is an unsuccessful envelope
/// whatever its status code or payload shape.
pub fn decode_envelope<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<ApiResponse<T>, FetchError> {
    match serde_json::from_slice::<ApiResponse<T>>(body) {
        Ok(envelope) if status.is_success() || !envelope.success => Ok(envelope),
        Ok(_) => Err(FetchError::Status(status)),
        Err(e) => match serde_json::from_slice::<ApiResponse<IgnoredAny>>(body) {
            Ok(envelope) if !envelope.success => Ok(ApiResponse { success: false, data: None }),
            _ if !status.is_success() => Err(FetchError::Status(status)),
            _ => Err(FetchError::Decode(e)),
        },
    }
}

#[async_trait]
impl VotingApi for HttpVotingApi {
    async fn voting_status(&self, event_id: u64) -> Result<ApiResponse<VotingStatus>, FetchError> {
        self.get_json(&status_path(event_id)).await
    }

    async fn voting_results(&self, event_id: u64) -> Result<ApiResponse<VotingResults>, FetchError> {
        self.get_json(&results_path(event_id)).await
    }
}
