//! Account flows: registration and login.
//!
//! Registration never produces a session on its own. Login writes the
//! returned token to the credential store, after which the session guard
//! takes over as on any other start.

pub mod store;
pub mod ui;

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::api::{ApiError, ChatService};
use crate::auth::store::{CredentialError, CredentialStore};

#[derive(Debug)]
pub enum AccountError {
    /// Rejected before any request was made.
    Invalid(&'static str),
    /// The service refused the request, with its error text.
    Api(ApiError),
    Credentials(CredentialError),
}

impl fmt::Display for AccountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountError::Invalid(reason) => write!(f, "{reason}"),
            AccountError::Api(ApiError::Status { message, .. }) => write!(f, "{message}"),
            AccountError::Api(err) => write!(f, "{err}"),
            AccountError::Credentials(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AccountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AccountError::Invalid(_) => None,
            AccountError::Api(err) => Some(err),
            AccountError::Credentials(err) => Some(err),
        }
    }
}

impl From<ApiError> for AccountError {
    fn from(err: ApiError) -> Self {
        AccountError::Api(err)
    }
}

impl From<CredentialError> for AccountError {
    fn from(err: CredentialError) -> Self {
        AccountError::Credentials(err)
    }
}

/// Input of the registration form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl Registration {
    pub fn validate(&self) -> Result<(), AccountError> {
        validate_credentials(&self.username, &self.password)?;
        if self.password != self.confirm_password {
            return Err(AccountError::Invalid("Passwords do not match"));
        }
        Ok(())
    }
}

fn validate_credentials(username: &str, password: &str) -> Result<(), AccountError> {
    if username.trim().is_empty() {
        return Err(AccountError::Invalid("Username cannot be empty"));
    }
    if password.is_empty() {
        return Err(AccountError::Invalid("Password cannot be empty"));
    }
    Ok(())
}

pub struct AccountManager {
    api: Arc<dyn ChatService>,
    credentials: Arc<dyn CredentialStore>,
}

impl AccountManager {
    pub fn new(api: Arc<dyn ChatService>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { api, credentials }
    }

    /// Create an account. The caller still has to log in afterwards.
    pub async fn register(&self, registration: &Registration) -> Result<(), AccountError> {
        registration.validate()?;
        self.api
            .register(registration.username.trim(), &registration.password)
            .await?;
        info!(username = %registration.username.trim(), "account registered");
        Ok(())
    }

    /// Exchange credentials for a token and persist it.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), AccountError> {
        validate_credentials(username, password)?;
        let token = self.api.login(username.trim(), password).await?;
        self.credentials.store(&token)?;
        info!(username = %username.trim(), "logged in");
        Ok(())
    }
}
