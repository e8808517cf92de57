//! The quota-metered chat controller.
//!
//! One controller owns the session, profile, transcript and draft of a
//! logged-in user. Sends are serialized by a sending flag; controller state
//! sits behind an async mutex that is released while a request is in flight,
//! so `logout` and reads never wait on the network. Each reset bumps a
//! generation counter and results from an older generation are dropped.
//! Balance writes carry an epoch so a slow resync never overwrites a newer
//! balance from a chat reply.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{ApiError, ChatService, SendMessageResponse};
use crate::auth::store::CredentialStore;
use crate::core::message::{ChatMessage, MessageId, Transcript};
use crate::core::notice::Notice;
use crate::core::profile::{ProfileLoader, UserProfile};
use crate::core::session::{discard_credential, LoginReason, LoginRequired, Session};


/// Balance at or below which a completed send raises a low-balance notice.
pub const LOW_BALANCE_THRESHOLD: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// The draft holds non-blank text.
    Composing,
    Sending,
}

/// How the last send attempt settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeOutcome {
    Confirmed,
    Blocked,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyInput,
    SendInFlight,
    NotAuthenticated,
}

/// Result of a single `submit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing happened: no state change, no request.
    Ignored(IgnoreReason),
    /// Zero balance; the transcript is untouched.
    Blocked,
    Delivered {
        reply: String,
        remaining_tokens: u64,
        low_balance: bool,
    },
    /// The user message stays in the transcript marked failed.
    Failed { error: ApiError, retryable: bool },
    /// The session ended during the send; go back to login.
    LoginRequired(LoginReason),
    /// The controller was reset while the request was in flight.
    Discarded,
}

/// Read-only view for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSnapshot {
    pub profile: Option<UserProfile>,
    pub messages: Vec<ChatMessage>,
    pub draft: String,
    pub phase: Phase,
    pub last_outcome: Option<ExchangeOutcome>,
}

struct ChatState {
    session: Session,
    profile: Option<UserProfile>,
    transcript: Transcript,
    draft: String,
    generation: u64,
    /// Bumped on every profile or balance write.
    balance_epoch: u64,
    last_outcome: Option<ExchangeOutcome>,
    notices: VecDeque<Notice>,
}

/// Copy of what a profile resync needs, taken so the lock can be released.
struct ProfileSync {
    session: Session,
    profile: UserProfile,
    generation: u64,
    balance_epoch: u64,
}

impl ChatState {
    fn begin_sync(&self) -> Option<ProfileSync> {
        if !self.session.is_authenticated() {
            return None;
        }
        Some(ProfileSync {
            session: self.session.clone(),
            profile: self.profile.clone()?,
            generation: self.generation,
            balance_epoch: self.balance_epoch,
        })
    }

    fn set_balance(&mut self, tokens: u64) {
        if let Some(profile) = self.profile.as_mut() {
            profile.token_balance = tokens;
        }
        self.balance_epoch += 1;
    }

    fn phase(&self, sending: bool) -> Phase {
        if sending && self.session.is_authenticated() {
            Phase::Sending
        } else if self.draft.trim().is_empty() {
            Phase::Idle
        } else {
            Phase::Composing
        }
    }

    /// Drop everything tied to the current session and queue `notice`.
    fn clear(&mut self, notice: Notice) {
        self.profile = None;
        self.transcript.clear();
        self.draft.clear();
        self.generation += 1;
        self.last_outcome = None;
        self.notices.clear();
        self.notices.push_back(notice);
    }
}

/// Clears the sending flag when dropped, whatever path the send took.
struct SendingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SendingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct ChatController {
    api: Arc<dyn ChatService>,
    credentials: Arc<dyn CredentialStore>,
    profiles: ProfileLoader,
    state: Mutex<ChatState>,
    sending: AtomicBool,
}

impl ChatController {
    pub fn new(
        api: Arc<dyn ChatService>,
        credentials: Arc<dyn CredentialStore>,
        session: Session,
        profile: UserProfile,
    ) -> Self {
        let profiles = ProfileLoader::new(api.clone(), credentials.clone());
        Self {
            api,
            credentials,
            profiles,
            state: Mutex::new(ChatState {
                session,
                profile: Some(profile),
                transcript: Transcript::new(),
                draft: String::new(),
                generation: 0,
                balance_epoch: 0,
                last_outcome: None,
                notices: VecDeque::new(),
            }),
            sending: AtomicBool::new(false),
        }
    }

    pub async fn set_draft(&self, text: impl Into<String>) {
        self.state.lock().await.draft = text.into();
    }

    pub async fn draft(&self) -> String {
        self.state.lock().await.draft.clone()
    }

    /// Submit the current draft. The draft is cleared once the message is
    /// echoed into the transcript; a blocked or ignored submit keeps it.
    pub async fn submit_draft(&self) -> SubmitOutcome {
        let draft = self.draft().await;
        self.submit(&draft).await
    }

    /// Send one user message.
    ///
    /// Blank input, a submit without a live session and a submit while
    /// another is in flight are ignored. A zero balance blocks without a
    /// request. Otherwise the message is echoed as pending, sent, and settled
    /// from the server's answer. The draft is cleared only if it holds `text`.
    pub async fn submit(&self, text: &str) -> SubmitOutcome {
        if text.trim().is_empty() {
            return SubmitOutcome::Ignored(IgnoreReason::EmptyInput);
        }
        if !self.is_authenticated().await {
            return SubmitOutcome::Ignored(IgnoreReason::NotAuthenticated);
        }

        let Some(_sending) = SendingGuard::acquire(&self.sending) else {
            debug!("send already in flight; ignoring submit");
            return SubmitOutcome::Ignored(IgnoreReason::SendInFlight);
        };

        let (token, generation, message_id) = {
            let mut state = self.state.lock().await;
            let Some(token) = state.session.token().map(str::to_owned) else {
                return SubmitOutcome::Ignored(IgnoreReason::NotAuthenticated);
            };
            let Some(profile) = state.profile.as_ref() else {
                return SubmitOutcome::Ignored(IgnoreReason::NotAuthenticated);
            };

            if !profile.can_send() {
                info!("balance exhausted; send blocked");
                state.last_outcome = Some(ExchangeOutcome::Blocked);
                state.notices.push_back(Notice::InsufficientTokens);
                return SubmitOutcome::Blocked;
            }

            let id = state.transcript.push_user(text);
            if state.draft == text {
                state.draft.clear();
            }
            (token, state.generation, id)
        };

        debug!(message = ?message_id, "sending message");
        let result = self.api.send_message(&token, text).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!(message = ?message_id, "session reset during send; discarding result");
            return SubmitOutcome::Discarded;
        }

        let error = match result {
            Ok(response) => return Self::apply_reply(&mut state, message_id, response),
            Err(error) => error,
        };

        settle_failed(&mut state, message_id);
        state.last_outcome = Some(ExchangeOutcome::Failed);

        if error.is_auth_rejection() {
            warn!(error = %error, "session rejected during send");
            state.session.reject();
            discard_credential(self.credentials.as_ref());
            state.clear(Notice::SessionExpired);
            return SubmitOutcome::LoginRequired(LoginReason::Expired);
        }

        if error.is_quota_refusal() {
            info!("server refused send for quota; resynchronizing balance");
            state.notices.push_back(Notice::InsufficientTokens);
            let sync = state.begin_sync();
            drop(state);
            if let Some(sync) = sync {
                if let Err(required) = self.sync_balance(sync).await {
                    return SubmitOutcome::LoginRequired(required.0);
                }
            }
            return SubmitOutcome::Failed {
                error,
                retryable: false,
            };
        }

        warn!(error = %error, "send failed");
        state.notices.push_back(Notice::SendFailed {
            reason: error.to_string(),
        });
        SubmitOutcome::Failed {
            error,
            retryable: true,
        }
    }

    fn apply_reply(
        state: &mut ChatState,
        message_id: MessageId,
        response: SendMessageResponse,
    ) -> SubmitOutcome {
        if let Err(err) = state.transcript.confirm(message_id) {
            warn!(error = %err, "could not confirm sent message");
        }
        let remaining = response.remaining_tokens;
        state
            .transcript
            .push_assistant(response.response.clone(), remaining);
        state.set_balance(remaining);
        state.last_outcome = Some(ExchangeOutcome::Confirmed);

        let low_balance = (1..=LOW_BALANCE_THRESHOLD).contains(&remaining);
        if low_balance {
            state.notices.push_back(Notice::LowBalance { remaining });
        }
        debug!(remaining, "message confirmed");

        SubmitOutcome::Delivered {
            reply: response.response,
            remaining_tokens: remaining,
            low_balance,
        }
    }

    /// Re-read the balance from the server, outside the state lock.
    pub async fn refresh_balance(&self) -> Result<u64, LoginRequired> {
        let sync = self.begin_sync().await?;
        self.sync_balance(sync).await
    }

    /// Refetch the whole profile (`GET users/`), outside the state lock.
    pub async fn reload_profile(&self) -> Result<UserProfile, LoginRequired> {
        let mut sync = self.begin_sync().await?;
        let result = self
            .profiles
            .load_profile(&mut sync.session)
            .await
            .map(|profile| sync.profile = profile);
        self.finish_sync(sync, result).await
    }

    async fn begin_sync(&self) -> Result<ProfileSync, LoginRequired> {
        self.state
            .lock()
            .await
            .begin_sync()
            .ok_or(LoginRequired(LoginReason::NoCredential))
    }

    async fn sync_balance(&self, mut sync: ProfileSync) -> Result<u64, LoginRequired> {
        let result = self
            .profiles
            .refresh_balance(&mut sync.session, &mut sync.profile)
            .await
            .map(|_| ());
        self.finish_sync(sync, result)
            .await
            .map(|profile| profile.token_balance)
    }

    /// Apply a resync result. A balance written since the resync started is
    /// newer than the one fetched, so it is kept.
    async fn finish_sync(
        &self,
        sync: ProfileSync,
        result: Result<(), LoginRequired>,
    ) -> Result<UserProfile, LoginRequired> {
        let mut state = self.state.lock().await;
        if state.generation != sync.generation {
            return Err(LoginRequired(LoginReason::LoggedOut));
        }

        if result.is_err() {
            state.session.reject();
            state.clear(Notice::SessionExpired);
            return Err(LoginRequired(LoginReason::Expired));
        }

        if state.balance_epoch != sync.balance_epoch {
            debug!("balance changed during resync; keeping the newer value");
            return Ok(state.profile.clone().unwrap_or(sync.profile));
        }

        state.profile = Some(sync.profile.clone());
        state.balance_epoch += 1;
        Ok(sync.profile)
    }

    /// End the session: credential, session, profile and transcript go in
    /// one step. An in-flight send resolves into `Discarded`.
    pub async fn logout(&self) -> LoginRequired {
        let mut state = self.state.lock().await;
        discard_credential(self.credentials.as_ref());
        state.session.end();
        state.clear(Notice::LoggedOut);
        info!("logged out");
        LoginRequired(LoginReason::LoggedOut)
    }

    pub async fn phase(&self) -> Phase {
        let state = self.state.lock().await;
        state.phase(self.sending.load(Ordering::Acquire))
    }

    pub async fn last_outcome(&self) -> Option<ExchangeOutcome> {
        self.state.lock().await.last_outcome
    }

    pub async fn profile(&self) -> Option<UserProfile> {
        self.state.lock().await.profile.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.session.is_authenticated()
    }

    pub async fn snapshot(&self) -> ChatSnapshot {
        let state = self.state.lock().await;
        ChatSnapshot {
            profile: state.profile.clone(),
            messages: state.transcript.messages().to_vec(),
            draft: state.draft.clone(),
            phase: state.phase(self.sending.load(Ordering::Acquire)),
            last_outcome: state.last_outcome,
        }
    }

    /// Take every queued notice, oldest first.
    pub async fn drain_notices(&self) -> Vec<Notice> {
        self.state.lock().await.notices.drain(..).collect()
    }
}

fn settle_failed(state: &mut ChatState, message_id: MessageId) {
    if let Err(err) = state.transcript.fail(message_id) {
        warn!(error = %err, "could not mark message failed");
    }
}
