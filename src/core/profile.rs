use std::sync::Arc;

use tracing::{debug, warn};

use crate::api::{ApiError, ChatService};
use crate::auth::store::CredentialStore;
use crate::core::session::{discard_credential, LoginReason, LoginRequired, Session};

/// Identity and quota of the logged-in user.
///
/// The balance only ever comes from the server: a chat reply or a profile
/// (re)fetch. Nothing in the client decrements it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub username: String,
    pub token_balance: u64,
}

impl UserProfile {
    pub fn new(username: impl Into<String>, token_balance: u64) -> Self {
        Self {
            username: username.into(),
            token_balance,
        }
    }

    pub fn can_send(&self) -> bool {
        self.token_balance > 0
    }
}

/// Fetches the profile of an authenticated session.
///
/// A failed fetch rejects the session and discards the stored credential;
/// no stale profile is ever handed back.
#[derive(Clone)]
pub struct ProfileLoader {
    api: Arc<dyn ChatService>,
    credentials: Arc<dyn CredentialStore>,
}

impl ProfileLoader {
    pub fn new(api: Arc<dyn ChatService>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { api, credentials }
    }

    /// Load the profile, reusing the identity cached by the session guard on
    /// the first call after verification.
    pub async fn load_profile(&self, session: &mut Session) -> Result<UserProfile, LoginRequired> {
        let Some(token) = session.token().map(str::to_owned) else {
            return Err(LoginRequired(LoginReason::NoCredential));
        };

        if let Some(identity) = session.take_verified_identity() {
            debug!(username = %identity.username, "profile from verified identity");
            return Ok(UserProfile::new(identity.username, identity.tokens));
        }

        match self.api.fetch_profile(&token).await {
            Ok(profile) => {
                debug!(username = %profile.username, tokens = profile.tokens, "profile loaded");
                Ok(UserProfile::new(profile.username, profile.tokens))
            }
            Err(err) => Err(self.reject(session, &err)),
        }
    }

    /// Resynchronize only the balance of an existing profile.
    pub async fn refresh_balance(
        &self,
        session: &mut Session,
        profile: &mut UserProfile,
    ) -> Result<u64, LoginRequired> {
        let Some(token) = session.token().map(str::to_owned) else {
            return Err(LoginRequired(LoginReason::NoCredential));
        };

        match self.fetch_balance(&token).await {
            Ok(tokens) => {
                profile.token_balance = tokens;
                Ok(tokens)
            }
            Err(err) => Err(self.reject(session, &err)),
        }
    }

    async fn fetch_balance(&self, token: &str) -> Result<u64, ApiError> {
        let tokens = self.api.fetch_balance(token).await?;
        debug!(tokens, "balance resynchronized");
        Ok(tokens)
    }

    fn reject(&self, session: &mut Session, err: &ApiError) -> LoginRequired {
        warn!(error = %err, "profile fetch failed; rejecting session");
        session.reject();
        discard_credential(self.credentials.as_ref());
        LoginRequired(LoginReason::Rejected)
    }
}
