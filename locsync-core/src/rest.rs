//! reqwest-backed [`RemoteClient`].
//!
//! Every request carries the `x-auth-token` header. Calls time out after one
//! minute; once in flight a request is never cancelled by this crate.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;

use crate::contract::{RemoteClient, RemoteResponse};
use crate::error::SyncError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const AUTH_HEADER: &str = "x-auth-token";

pub struct RestClient {
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(access_token: &str) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(access_token)
            .map_err(|e| SyncError::Config(format!("access_token is not a valid header: {e}")))?;
        headers.insert(AUTH_HEADER, token);
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        tracing::debug!("Initialised REST client");
        Ok(RestClient { http })
    }

    async fn read_checked(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> Result<Vec<u8>, SyncError> {
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        if status.is_success() {
            return Ok(body);
        }
        match status {
            StatusCode::UNAUTHORIZED => {
                tracing::error!(url, "User is not authorised for this request. Check `access_token` in configuration.");
                Err(SyncError::Unauthorized)
            }
            StatusCode::NOT_FOUND => {
                tracing::debug!(url, "Remote resource not found");
                Err(SyncError::NotFound(url.to_string()))
            }
            _ => {
                let body = String::from_utf8_lossy(&body).into_owned();
                tracing::debug!(url, status = %status, body = %body, "Unsuccessful request");
                Err(SyncError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    async fn into_remote_response(response: reqwest::Response) -> Result<RemoteResponse, SyncError> {
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(RemoteResponse { status, body })
    }
}

#[async_trait]
impl RemoteClient for RestClient {
    async fn get_from_server(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        let response = self.http.get(url).send().await.map_err(|e| {
            tracing::error!(error = ?e, url, "GET request failed");
            e
        })?;
        self.read_checked(url, response).await
    }

    async fn post_to_server(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<RemoteResponse, SyncError> {
        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;
        Self::into_remote_response(response).await
    }

    async fn put_to_server(
        &self,
        url: &str,
        body: serde_json::Value,
    ) -> Result<RemoteResponse, SyncError> {
        let response = self
            .http
            .put(url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;
        Self::into_remote_response(response).await
    }

    async fn delete_from_server(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        let response = self.http.delete(url).send().await.map_err(|e| {
            tracing::error!(error = ?e, url, "DELETE request failed");
            e
        })?;
        self.read_checked(url, response).await
    }
}
