use std::sync::{Arc, PoisonError, RwLock};

use pickboard_shared::{User, UserId};

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub is_authenticated: bool,
    pub user: Option<User>,
    pub is_loading: bool,
}

impl Default for Session {
    /// A fresh session is still loading until the first identity check settles.
    fn default() -> Self {
        Self {
            is_authenticated: false,
            user: None,
            is_loading: true,
        }
    }
}

/// Shared handle to the session owned by the application root.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Session>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Session {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update(&self, f: impl FnOnce(&mut Session)) {
        let mut session = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut session);
    }

    pub fn sign_in(&self, user: User) {
        self.update(|s| {
            s.is_authenticated = true;
            s.user = Some(user);
            s.is_loading = false;
        });
    }

    pub fn sign_out(&self) {
        self.update(|s| {
            s.is_authenticated = false;
            s.user = None;
            s.is_loading = false;
        });
    }

    pub fn set_loading(&self, loading: bool) {
        self.update(|s| s.is_loading = loading);
    }

    pub fn is_authenticated(&self) -> bool {
        self.snapshot().is_authenticated
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.snapshot().user.map(|u| u.id)
    }

    /// Blocks mutating actions for a visitor who is known not to be logged in.
    /// While the session is still loading the server gets to decide.
    pub fn require_login(&self) -> Result<(), ApiError> {
        let session = self.snapshot();
        if !session.is_loading && !session.is_authenticated {
            return Err(ApiError::LoginRequired);
        }
        Ok(())
    }
}
