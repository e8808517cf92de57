use std::fmt;

/// Severity the presentation layer uses to pick an affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Warning,
    Error,
}

/// User-visible conditions raised by the chat controller.
///
/// Each condition has its own variant so the presentation layer can tell a
/// quota block from a failed send from a logged-out session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Balance is zero (or the server refused the send for quota).
    InsufficientTokens,
    /// Advisory: the balance after a send is at or below the threshold.
    LowBalance { remaining: u64 },
    /// The send did not go through; the user may compose it again.
    SendFailed { reason: String },
    /// The server rejected the session; a fresh login is required.
    SessionExpired,
    LoggedOut,
}

impl Notice {
    pub fn kind(&self) -> NoticeKind {
        match self {
            Notice::InsufficientTokens | Notice::LowBalance { .. } => NoticeKind::Warning,
            Notice::SendFailed { .. } | Notice::SessionExpired => NoticeKind::Error,
            Notice::LoggedOut => NoticeKind::Info,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::InsufficientTokens => {
                write!(f, "Insufficient tokens: renewal required before sending.")
            }
            Notice::LowBalance { remaining } => write!(
                f,
                "Your token balance is low ({remaining} left). Consider renewing soon."
            ),
            Notice::SendFailed { reason } => {
                write!(f, "Failed to send message ({reason}). Try again.")
            }
            Notice::SessionExpired => write!(f, "Your session has expired. Please log in again."),
            Notice::LoggedOut => write!(f, "Logged out."),
        }
    }
}
