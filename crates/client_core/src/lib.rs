use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{License, LicenseId, Licensee, LicenseeId, Owner, OwnerId, OwnerSummary, Song, SongId},
    error::ApiError,
    protocol::{
        GreetRequest, GreetResponse, LicensePayload, LicenseePayload, OwnerPayload,
        ProtectedPayload, SongPayload,
    },
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub mod form;

pub use form::{
    EventFlow, FailurePolicy, FormError, FormModel, FormSnapshot, FormTarget, GreetingSink,
    NameSource, SubmitControl, SubmitEvent, SubmitHandler, SubmitState,
};

/// Remote capability consumed by the form handler.
#[async_trait]
pub trait GreetingService: Send + Sync {
    async fn greet(&self, name: &str) -> Result<String>;
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url '{url}': {reason}")]
    InvalidServerUrl { url: String, reason: String },
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("server rejected {endpoint} (HTTP {status}): {error}")]
    Api {
        endpoint: String,
        status: u16,
        error: ApiError,
    },
    #[error("server returned HTTP {status} for {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },
}

impl ClientError {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// HTTP client for the licensing backend.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    server_url: String,
}

impl BackendClient {
    pub fn new(server_url: &str) -> Result<Self, ClientError> {
        Self::with_http_client(server_url, Client::new())
    }

    pub fn with_http_client(server_url: &str, http: Client) -> Result<Self, ClientError> {
        let trimmed = server_url.trim().trim_end_matches('/');
        let parsed = Url::parse(trimmed).map_err(|err| ClientError::InvalidServerUrl {
            url: server_url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidServerUrl {
                url: server_url.to_string(),
                reason: "server_url must start with http:// or https://".to_string(),
            });
        }

        Ok(Self {
            http,
            server_url: trimmed.to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub async fn greet(&self, name: &str) -> Result<String, ClientError> {
        let response: GreetResponse = self
            .post_json(
                "/greet",
                &GreetRequest {
                    name: name.to_string(),
                },
            )
            .await?;
        Ok(response.greeting)
    }

    pub async fn health(&self) -> Result<(), ClientError> {
        let endpoint = self.endpoint("/healthz");
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|source| transport(&endpoint, source))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::UnexpectedStatus {
                endpoint,
                status: response.status().as_u16(),
            })
        }
    }

    pub async fn list_songs(&self) -> Result<Vec<Song>, ClientError> {
        self.get_json("/songs").await
    }

    pub async fn get_song(&self, song_id: SongId) -> Result<Song, ClientError> {
        self.get_json(&format!("/songs/{song_id}")).await
    }

    pub async fn create_song(&self, payload: &SongPayload) -> Result<Song, ClientError> {
        self.post_json("/songs", payload).await
    }

    pub async fn get_song_owner(&self, song_id: SongId) -> Result<OwnerSummary, ClientError> {
        self.get_json(&format!("/songs/{song_id}/owner")).await
    }

    pub async fn create_owner(&self, payload: &OwnerPayload) -> Result<Owner, ClientError> {
        self.post_json("/owners", payload).await
    }

    pub async fn owner_license_requests(&self, owner_id: OwnerId) -> Result<Vec<License>, ClientError> {
        self.get_json(&format!("/owners/{owner_id}/license_requests"))
            .await
    }

    pub async fn create_licensee(&self, payload: &LicenseePayload) -> Result<Licensee, ClientError> {
        self.post_json("/licensees", payload).await
    }

    pub async fn get_licensee(&self, licensee_id: LicenseeId) -> Result<Licensee, ClientError> {
        self.get_json(&format!("/licensees/{licensee_id}")).await
    }

    pub async fn licensee_licenses(
        &self,
        licensee_id: LicenseeId,
    ) -> Result<Vec<License>, ClientError> {
        self.get_json(&format!("/licensees/{licensee_id}/licenses"))
            .await
    }

    pub async fn request_license(&self, payload: &LicensePayload) -> Result<License, ClientError> {
        self.post_json("/licenses", payload).await
    }

    pub async fn get_license(&self, license_id: LicenseId) -> Result<License, ClientError> {
        self.get_json(&format!("/licenses/{license_id}")).await
    }

    pub async fn approve_license(
        &self,
        license_id: LicenseId,
        auth_key: &str,
    ) -> Result<License, ClientError> {
        self.post_json(
            &format!("/licenses/{license_id}/approve"),
            &ProtectedPayload {
                auth_key: auth_key.to_string(),
            },
        )
        .await
    }

    pub async fn revoke_license(
        &self,
        license_id: LicenseId,
        auth_key: &str,
    ) -> Result<License, ClientError> {
        self.post_json(
            &format!("/licenses/{license_id}/revoke"),
            &ProtectedPayload {
                auth_key: auth_key.to_string(),
            },
        )
        .await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.server_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let endpoint = self.endpoint(path);
        debug!(%endpoint, "GET");
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|source| transport(&endpoint, source))?;
        decode(endpoint, response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let endpoint = self.endpoint(path);
        debug!(%endpoint, "POST");
        let response = self
            .http
            .post(&endpoint)
            .json(body)
            .send()
            .await
            .map_err(|source| transport(&endpoint, source))?;
        decode(endpoint, response).await
    }
}

#[async_trait]
impl GreetingService for BackendClient {
    async fn greet(&self, name: &str) -> Result<String> {
        Ok(BackendClient::greet(self, name).await?)
    }
}

async fn decode<T: DeserializeOwned>(endpoint: String, response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<T>()
            .await
            .map_err(|source| transport(&endpoint, source));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|source| transport(&endpoint, source))?;
    match serde_json::from_slice::<ApiError>(&bytes) {
        Ok(error) => {
            warn!(%endpoint, status = status.as_u16(), code = ?error.code, "server returned api error");
            Err(ClientError::Api {
                endpoint,
                status: status.as_u16(),
                error,
            })
        }
        Err(_) => Err(ClientError::UnexpectedStatus {
            endpoint,
            status: status.as_u16(),
        }),
    }
}

fn transport(endpoint: &str, source: reqwest::Error) -> ClientError {
    ClientError::Transport {
        endpoint: endpoint.to_string(),
        source,
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
