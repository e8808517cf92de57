//! Startup: session guard, then profile loader, then the chat controller.

use std::sync::Arc;

use tracing::debug;

use crate::api::ChatService;
use crate::auth::store::CredentialStore;
use crate::auth::AccountManager;
use crate::core::chat::ChatController;
use crate::core::profile::ProfileLoader;
use crate::core::session::{LoginReason, SessionError, SessionGuard, SessionOutcome};

pub enum StartOutcome {
    Ready(ChatController),
    LoginRequired(LoginReason),
}

/// Wires the service and the credential store into the protected flow.
#[derive(Clone)]
pub struct App {
    api: Arc<dyn ChatService>,
    credentials: Arc<dyn CredentialStore>,
}

impl App {
    pub fn new(api: Arc<dyn ChatService>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { api, credentials }
    }

    pub fn accounts(&self) -> AccountManager {
        AccountManager::new(self.api.clone(), self.credentials.clone())
    }

    /// Enter the protected view. Each gate either hands over to the next or
    /// sends the caller back to login; nothing past a failed gate runs.
    pub async fn start(&self) -> Result<StartOutcome, SessionError> {
        let guard = SessionGuard::new(self.api.clone(), self.credentials.clone());
        let mut session = match guard.ensure_session().await? {
            SessionOutcome::Authenticated(session) => session,
            SessionOutcome::LoginRequired(reason) => {
                return Ok(StartOutcome::LoginRequired(reason));
            }
        };

        let loader = ProfileLoader::new(self.api.clone(), self.credentials.clone());
        let profile = match loader.load_profile(&mut session).await {
            Ok(profile) => profile,
            Err(required) => return Ok(StartOutcome::LoginRequired(required.0)),
        };

        debug!(username = %profile.username, balance = profile.token_balance, "chat ready");
        Ok(StartOutcome::Ready(ChatController::new(
            self.api.clone(),
            self.credentials.clone(),
            session,
            profile,
        )))
    }
}
