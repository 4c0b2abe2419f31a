//! User-facing notices. Front ends decide how to show them; the client only
//! emits them through an injected [`Notifier`].

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
    LoginRequired,
    SessionExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn login_required() -> Self {
        Self {
            kind: NoticeKind::LoginRequired,
            message: "Please log in to continue.".to_string(),
        }
    }

    pub fn session_expired() -> Self {
        Self {
            kind: NoticeKind::SessionExpired,
            message: "Your session has expired. Please log in again.".to_string(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log and nowhere else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.kind {
            NoticeKind::Success => tracing::info!(message = %notice.message, "notice"),
            _ => tracing::warn!(kind = ?notice.kind, message = %notice.message, "notice"),
        }
    }
}

impl Notifier for mpsc::UnboundedSender<Notice> {
    fn notify(&self, notice: Notice) {
        // A closed receiver means nobody is displaying notices any more.
        let _ = self.send(notice);
    }
}
