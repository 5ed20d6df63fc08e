//! Common utilities for the PowerFlex API client
//!
//! Provides the authenticated HTTP wrapper shared by every API call.

use crate::error::PowerFlexError;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

/// HTTP client wrapper with PowerFlex token authentication
///
/// PowerFlex issues a session token from `/api/login` (basic auth with the
/// user's password). Every other call uses basic auth with the token as the
/// password. The token is cached and refreshed once when the array answers 401.
pub struct HttpClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    token: RwLock<Option<String>>,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, username: String, password: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username,
            password,
            token: RwLock::new(None),
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

    /// Log in and cache a fresh session token
    pub async fn login(&self) -> Result<String, PowerFlexError> {
        let url = self.build_url("/api/login");
        debug!("GET {} (login as {})", url, self.username);

        let response = self.client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(PowerFlexError::Http)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PowerFlexError::Authentication(format!(
                "login rejected for user {}: {} - {}",
                self.username, status, body
            )));
        }
        if !status.is_success() {
            return Err(PowerFlexError::Api(format!("login failed: {} - {}", status, body)));
        }

        // The token comes back as a bare JSON string
        let token = body.trim().trim_matches('"').to_string();
        if token.is_empty() {
            return Err(PowerFlexError::Authentication("login returned an empty token".to_string()));
        }
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn current_token(&self) -> Result<String, PowerFlexError> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }
        self.login().await
    }

    /// Send a request, logging in again once if the token has expired
    async fn send<F>(&self, build: F) -> Result<Response, PowerFlexError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.current_token().await?;
        let response = build(&self.client)
            .basic_auth(&self.username, Some(&token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(PowerFlexError::Http)?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!("PowerFlex session expired, logging in again");
        let token = self.login().await?;
        build(&self.client)
            .basic_auth(&self.username, Some(&token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(PowerFlexError::Http)
    }

    async fn check(path: &str, method: &str, response: Response) -> Result<Response, PowerFlexError> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(PowerFlexError::NotFound(format!(
                "Resource not found: {} - {}",
                path, body
            )));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(PowerFlexError::Authentication(format!(
                "{} {} rejected: {} - {}",
                method, path, status, body
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PowerFlexError::Api(format!(
                "{} {} failed: {} - {}",
                method, path, status, body
            )));
        }
        Ok(response)
    }

    /// Make a GET request
    pub async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
    ) -> Result<T, PowerFlexError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self.send(|client| client.get(&url)).await?;
        let response = Self::check(path, "GET", response).await?;

        let response_text = response.text().await?;
        serde_json::from_str(&response_text).map_err(|e| {
            PowerFlexError::Api(format!(
                "error decoding response body: {} - Response (first 500 chars): {}",
                e,
                response_text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// POST an action that returns no meaningful body
    ///
    /// PowerFlex actions answer with `{}` or an empty body on success.
    pub async fn post_action(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(), PowerFlexError> {
        let url = self.build_url(path);
        debug!("POST {} with body: {}", url, body);

        let response = self.send(|client| client.post(&url).json(body)).await?;
        Self::check(path, "POST", response).await?;
        Ok(())
    }
}
