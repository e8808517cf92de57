use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{ChatService, ProfileResponse};
use crate::auth::store::{CredentialError, CredentialStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    Pending,
    Authenticated,
    Rejected,
}

/// Identity returned by the verification call, kept for the profile loader
/// so the first profile load needs no second request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub username: String,
    pub tokens: u64,
}

impl From<ProfileResponse> for VerifiedIdentity {
    fn from(response: ProfileResponse) -> Self {
        Self {
            username: response.username,
            tokens: response.tokens,
        }
    }
}

/// The authenticated identity context for protected calls.
///
/// Only an `Authenticated` session hands out its token.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: Option<String>,
    status: SessionStatus,
    verified: Option<VerifiedIdentity>,
}

impl Session {
    pub fn unauthenticated() -> Self {
        Self {
            token: None,
            status: SessionStatus::Unauthenticated,
            verified: None,
        }
    }

    fn pending(token: String) -> Self {
        Self {
            token: Some(token),
            status: SessionStatus::Pending,
            verified: None,
        }
    }

    /// An already verified session, for callers that did their own check.
    pub fn authenticated(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            status: SessionStatus::Authenticated,
            verified: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn token(&self) -> Option<&str> {
        if self.is_authenticated() {
            self.token.as_deref()
        } else {
            None
        }
    }

    pub(crate) fn take_verified_identity(&mut self) -> Option<VerifiedIdentity> {
        self.verified.take()
    }

    fn mark_authenticated(&mut self, identity: VerifiedIdentity) {
        self.status = SessionStatus::Authenticated;
        self.verified = Some(identity);
    }

    /// Server refused the token: forget it.
    pub(crate) fn reject(&mut self) {
        self.token = None;
        self.verified = None;
        self.status = SessionStatus::Rejected;
    }

    /// Explicit logout: forget everything.
    pub(crate) fn end(&mut self) {
        self.token = None;
        self.verified = None;
        self.status = SessionStatus::Unauthenticated;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("verified", &self.verified)
            .finish()
    }
}

/// Why the caller must send the user back to the login entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginReason {
    /// Nothing in the credential store.
    NoCredential,
    /// A stored token was refused or could not be verified.
    Rejected,
    /// The server rejected the token mid-session.
    Expired,
    LoggedOut,
}

impl fmt::Display for LoginReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginReason::NoCredential => write!(f, "not logged in"),
            LoginReason::Rejected => write!(f, "stored session was rejected"),
            LoginReason::Expired => write!(f, "session expired"),
            LoginReason::LoggedOut => write!(f, "logged out"),
        }
    }
}

/// Signal to redirect to login, carrying the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginRequired(pub LoginReason);

impl fmt::Display for LoginRequired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "login required: {}", self.0)
    }
}

impl Error for LoginRequired {}

#[derive(Debug)]
pub enum SessionOutcome {
    Authenticated(Session),
    LoginRequired(LoginReason),
}

/// Failures of the guard itself, as opposed to a rejected session.
#[derive(Debug)]
pub enum SessionError {
    Credentials(CredentialError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Credentials(err) => write!(f, "cannot read stored session: {err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SessionError::Credentials(err) => Some(err),
        }
    }
}

impl From<CredentialError> for SessionError {
    fn from(err: CredentialError) -> Self {
        SessionError::Credentials(err)
    }
}

/// Discard the stored credential after a rejection. Store failures are
/// logged and otherwise ignored.
pub(crate) fn discard_credential(credentials: &dyn CredentialStore) {
    if let Err(err) = credentials.clear() {
        warn!(error = %err, "failed to discard stored credential");
    }
}

/// Gate in front of every protected view.
#[derive(Clone)]
pub struct SessionGuard {
    api: Arc<dyn ChatService>,
    credentials: Arc<dyn CredentialStore>,
}

impl SessionGuard {
    pub fn new(api: Arc<dyn ChatService>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { api, credentials }
    }

    /// Check the stored credential against the server.
    ///
    /// No credential means no network call. Any verification failure,
    /// transient or not, discards the credential; there is no retry.
    pub async fn ensure_session(&self) -> Result<SessionOutcome, SessionError> {
        let Some(token) = self.credentials.load()? else {
            debug!("no stored credential; login required");
            return Ok(SessionOutcome::LoginRequired(LoginReason::NoCredential));
        };

        let mut session = Session::pending(token.clone());
        match self.api.verify_identity(&token).await {
            Ok(identity) => {
                info!(username = %identity.username, "session verified");
                session.mark_authenticated(identity.into());
                Ok(SessionOutcome::Authenticated(session))
            }
            Err(err) => {
                warn!(error = %err, "session verification failed; discarding credential");
                session.reject();
                discard_credential(self.credentials.as_ref());
                Ok(SessionOutcome::LoginRequired(LoginReason::Rejected))
            }
        }
    }
}
