use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    ApiError, BalanceResponse, ChatService, CredentialsRequest, LoginResponse, ProfileResponse,
    SendMessageRequest, SendMessageResponse,
};
use crate::utils::auth::add_auth_headers;
use crate::utils::url::{construct_api_url, normalize_base_url};

const USER_DETAILS_PATH: &str = "user/details/";
const USERS_PATH: &str = "users/";
const TOKEN_BALANCE_PATH: &str = "tokens/balance/";
const SEND_MESSAGE_PATH: &str = "chat/send_message/";
const LOGIN_PATH: &str = "auth/login/";

/// HTTP implementation of [`ChatService`].
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client for `base_url` (for example `http://127.0.0.1:8000/api`).
    ///
    /// Without a timeout the transport defaults apply.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize_base_url(base_url),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        construct_api_url(&self.base_url, path)
    }

    async fn get_authorized<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        debug!(%url, "GET");
        let response = add_auth_headers(self.client.get(&url), token)
            .send()
            .await?;
        read_json(response).await
    }
}

/// Check the status, then decode the body.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        debug!(%status, "request failed");
        return Err(ApiError::from_status(status, &body));
    }
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl ChatService for ApiClient {
    async fn verify_identity(&self, token: &str) -> Result<ProfileResponse, ApiError> {
        self.get_authorized(USER_DETAILS_PATH, token).await
    }

    async fn fetch_profile(&self, token: &str) -> Result<ProfileResponse, ApiError> {
        self.get_authorized(USERS_PATH, token).await
    }

    async fn fetch_balance(&self, token: &str) -> Result<u64, ApiError> {
        let balance: BalanceResponse = self.get_authorized(TOKEN_BALANCE_PATH, token).await?;
        Ok(balance.tokens)
    }

    async fn send_message(
        &self,
        token: &str,
        message: &str,
    ) -> Result<SendMessageResponse, ApiError> {
        let url = self.endpoint(SEND_MESSAGE_PATH);
        debug!(%url, chars = message.chars().count(), "POST chat message");
        let response = add_auth_headers(self.client.post(&url), token)
            .json(&SendMessageRequest { message })
            .send()
            .await?;
        read_json(response).await
    }

    async fn register(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let url = self.endpoint(USERS_PATH);
        debug!(%url, %username, "POST registration");
        let response = self
            .client
            .post(&url)
            .json(&CredentialsRequest { username, password })
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }

    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        let url = self.endpoint(LOGIN_PATH);
        debug!(%url, %username, "POST login");
        let response = self
            .client
            .post(&url)
            .json(&CredentialsRequest { username, password })
            .send()
            .await?;
        let login: LoginResponse = read_json(response).await?;
        Ok(login.token)
    }
}
