//! Common utilities for the gateway client
//!
//! Provides the HTTP wrapper shared by every installer call.

use crate::error::GatewayError;
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// HTTP client wrapper with basic authentication
pub struct HttpClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, username: String, password: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
    }

    async fn check(path: &str, method: &str, response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::NotFound(format!("{} - {}", path, body)));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Authentication(format!(
                "{} {} rejected: {} - {}",
                method, path, status, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api(format!(
                "{} {} failed: {} - {}",
                method, path, status, body
            )));
        }
        Ok(response)
    }

    async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, GatewayError> {
        let response_text = response.text().await?;
        serde_json::from_str(&response_text).map_err(|e| {
            GatewayError::Api(format!(
                "error decoding response body: {} - Response (first 500 chars): {}",
                e,
                response_text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Make a GET request
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, GatewayError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self.authorized(self.client.get(&url)).send().await?;
        let response = Self::check(path, "GET", response).await?;
        Self::decode(response).await
    }

    /// POST an action whose body is ignored
    pub async fn post_action(&self, path: &str, body: &serde_json::Value) -> Result<(), GatewayError> {
        let url = self.build_url(path);
        debug!("POST {}", url);

        let response = self.authorized(self.client.post(&url)).json(body).send().await?;
        Self::check(path, "POST", response).await?;
        Ok(())
    }

    /// POST and hand back the status code and body without judging them
    ///
    /// Used by calls whose error responses carry a meaningful envelope.
    pub async fn post_raw(&self, path: &str, body: &serde_json::Value) -> Result<(StatusCode, String), GatewayError> {
        let url = self.build_url(path);
        debug!("POST {} (raw)", url);

        let response = self.authorized(self.client.post(&url)).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    /// POST a multipart form and decode the JSON answer
    pub async fn post_multipart<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: Form,
    ) -> Result<T, GatewayError> {
        let url = self.build_url(path);
        debug!("POST {} (multipart)", url);

        let response = self.authorized(self.client.post(&url)).multipart(form).send().await?;
        let response = Self::check(path, "POST", response).await?;
        Self::decode(response).await
    }
}
