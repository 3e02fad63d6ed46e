//! REST boundary client: auth, contact snapshot and per-conversation
//! history fetches.

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::UserId,
    error::{ApiFailure, ErrorBody},
    protocol::{AuthResponse, Message, User},
};
use tracing::debug;

use crate::config::ClientConfig;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    username: &'a str,
    password: &'a str,
    display_name: &'a str,
}

pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: config.base_url.clone(),
            token: None,
        }
    }

    pub fn with_token(config: &ClientConfig, token: impl Into<String>) -> Self {
        let mut client = Self::new(config);
        client.token = Some(token.into());
        client
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Invalidates the stored credential wholesale.
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<AuthResponse> {
        let response = self
            .http
            .post(format!("{}/api/login", self.base_url))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .context("login request failed")?;
        let auth: AuthResponse = decode_or_failure(response).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    /// Registers a new account. The display name defaults to the username
    /// when not given.
    pub async fn register(
        &mut self,
        username: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<AuthResponse> {
        let response = self
            .http
            .post(format!("{}/api/register", self.base_url))
            .json(&RegisterRequest {
                username,
                password,
                display_name: display_name.unwrap_or(username),
            })
            .send()
            .await
            .context("register request failed")?;
        let auth: AuthResponse = decode_or_failure(response).await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    /// Fetches the directory snapshot.
    pub async fn fetch_users(&self) -> Result<Vec<User>> {
        let response = self
            .authed(format!("{}/api/users", self.base_url))?
            .send()
            .await
            .context("users fetch failed")?;
        let users: Vec<User> = decode_or_failure(response).await?;
        debug!(count = users.len(), "rest: fetched user snapshot");
        Ok(users)
    }

    /// Fetches the message history for the conversation with `peer`.
    pub async fn fetch_messages(&self, peer: &UserId) -> Result<Vec<Message>> {
        let response = self
            .authed(format!("{}/api/messages/{}", self.base_url, peer))?
            .send()
            .await
            .context("messages fetch failed")?;
        let messages: Vec<Message> = decode_or_failure(response).await?;
        debug!(peer = %peer, count = messages.len(), "rest: fetched conversation");
        Ok(messages)
    }

    fn authed(&self, url: String) -> Result<reqwest::RequestBuilder> {
        let token = self
            .token
            .as_deref()
            .context("missing bearer credential")?;
        Ok(self.http.get(url).bearer_auth(token))
    }
}

/// Decodes a success body, or turns a failure status into an [`ApiFailure`]
/// carrying the server-provided `message`/`error` detail when present.
async fn decode_or_failure<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.context("invalid response body");
    }
    let detail = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.detail().map(str::to_string))
        .unwrap_or_else(|| format!("request failed with status {status}"));
    Err(ApiFailure::new(status.as_u16(), detail).into())
}
