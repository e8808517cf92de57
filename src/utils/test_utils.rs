use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::api::{ApiError, ChatService, ProfileResponse, SendMessageResponse};
use crate::auth::store::MemoryCredentialStore;
use crate::core::chat::ChatController;
use crate::core::profile::UserProfile;
use crate::core::session::Session;

/// Scripted in-process stand-in for the chat service.
#[derive(Default)]
pub struct FakeChatService {
    identity: Mutex<Option<ProfileResponse>>,
    verify_error: Mutex<Option<ApiError>>,
    profile_error: Mutex<Option<ApiError>>,
    balance: Mutex<Option<Result<u64, ApiError>>>,
    send_results: Mutex<VecDeque<Result<SendMessageResponse, ApiError>>>,
    login_result: Mutex<Option<Result<String, ApiError>>>,
    register_error: Mutex<Option<ApiError>>,
    sent_messages: Mutex<Vec<String>>,
    last_token: Mutex<Option<String>>,
    send_gate: Mutex<Option<Arc<Notify>>>,
    send_started: Arc<Notify>,
    balance_gate: Mutex<Option<Arc<Notify>>>,
    balance_started: Arc<Notify>,
    calls: AtomicUsize,
    profile_calls: AtomicUsize,
    balance_calls: AtomicUsize,
}

pub fn reply(text: &str, remaining_tokens: u64) -> Result<SendMessageResponse, ApiError> {
    Ok(SendMessageResponse {
        response: text.to_string(),
        remaining_tokens,
        predicted_intent: None,
    })
}

impl FakeChatService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(self, username: &str, tokens: u64) -> Self {
        *self.identity.lock().unwrap() = Some(ProfileResponse {
            username: username.to_string(),
            tokens,
        });
        self
    }

    pub fn with_verify_error(self, err: ApiError) -> Self {
        *self.verify_error.lock().unwrap() = Some(err);
        self
    }

    pub fn with_profile_error(self, err: ApiError) -> Self {
        *self.profile_error.lock().unwrap() = Some(err);
        self
    }

    pub fn with_balance(self, balance: Result<u64, ApiError>) -> Self {
        *self.balance.lock().unwrap() = Some(balance);
        self
    }

    pub fn with_login(self, result: Result<String, ApiError>) -> Self {
        *self.login_result.lock().unwrap() = Some(result);
        self
    }

    pub fn with_register_error(self, err: ApiError) -> Self {
        *self.register_error.lock().unwrap() = Some(err);
        self
    }

    /// Queue the result of the next `send_message` call.
    pub fn push_send(&self, result: Result<SendMessageResponse, ApiError>) {
        self.send_results.lock().unwrap().push_back(result);
    }

    /// Hold every `send_message` call until the returned gate is notified.
    pub fn gate_sends(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.send_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Notified whenever a `send_message` call starts.
    pub fn send_started(&self) -> Arc<Notify> {
        self.send_started.clone()
    }

    /// Hold every `fetch_balance` call until the returned gate is notified.
    pub fn gate_balance(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.balance_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Notified whenever a `fetch_balance` call starts.
    pub fn balance_started(&self) -> Arc<Notify> {
        self.balance_started.clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.sent_messages.lock().unwrap().clone()
    }

    pub fn last_token(&self) -> Option<String> {
        self.last_token.lock().unwrap().clone()
    }

    fn record(&self, token: Option<&str>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = token {
            *self.last_token.lock().unwrap() = Some(token.to_string());
        }
    }

    fn identity(&self) -> Result<ProfileResponse, ApiError> {
        self.identity
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Network("no identity scripted".into()))
    }
}

#[async_trait]
impl ChatService for FakeChatService {
    async fn verify_identity(&self, token: &str) -> Result<ProfileResponse, ApiError> {
        self.record(Some(token));
        if let Some(err) = self.verify_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.identity()
    }

    async fn fetch_profile(&self, token: &str) -> Result<ProfileResponse, ApiError> {
        self.record(Some(token));
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.profile_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.identity()
    }

    async fn fetch_balance(&self, token: &str) -> Result<u64, ApiError> {
        self.record(Some(token));
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.balance_started.notify_one();

        let gate = self.balance_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.balance
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ApiError::Network("no balance scripted".into())))
    }

    async fn send_message(
        &self,
        token: &str,
        message: &str,
    ) -> Result<SendMessageResponse, ApiError> {
        self.record(Some(token));
        self.sent_messages.lock().unwrap().push(message.to_string());
        self.send_started.notify_one();

        let gate = self.send_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        self.send_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Network("no send result scripted".into())))
    }

    async fn register(&self, _username: &str, _password: &str) -> Result<(), ApiError> {
        self.record(None);
        match self.register_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn login(&self, _username: &str, _password: &str) -> Result<String, ApiError> {
        self.record(None);
        self.login_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(ApiError::Network("no login scripted".into())))
    }
}

/// A controller over an authenticated session with the given balance.
pub fn create_test_controller(
    balance: u64,
) -> (ChatController, Arc<FakeChatService>, Arc<MemoryCredentialStore>) {
    let api = Arc::new(FakeChatService::new().with_identity("ada", balance));
    let store = Arc::new(MemoryCredentialStore::with_token("test-token"));
    let controller = ChatController::new(
        api.clone(),
        store.clone(),
        Session::authenticated("test-token"),
        UserProfile::new("ada", balance),
    );
    (controller, api, store)
}
