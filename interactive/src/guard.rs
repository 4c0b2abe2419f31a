//! Session guard: replays requests that fail authentication after one shared
//! session refresh.
//!
//! The first request to see a 401 owns the refresh. Requests that hit a 401
//! while that refresh is running park a continuation in a FIFO queue and are
//! released together once it settles: replayed on success, failed with the
//! refresh error otherwise. A replayed request that is rejected again is
//! terminal and never starts another cycle.

use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use pickboard_shared::User;
use tokio::sync::oneshot;

use crate::api::{ApiRequest, ApiResponse, Transport};
use crate::error::ApiError;
use crate::notice::{Notice, Notifier};
use crate::session::SessionHandle;

pub const REFRESH_PATH: &str = "/users/refresh";

type Continuation = oneshot::Sender<Result<(), ApiError>>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    queue: VecDeque<Continuation>,
}

pub struct SessionGuard {
    transport: Arc<dyn Transport>,
    session: SessionHandle,
    notifier: Arc<dyn Notifier>,
    refresh: Mutex<RefreshState>,
}

/// Releases the in-flight flag if the refresh owner goes away before
/// settling, so parked requests fail instead of waiting forever.
struct InFlight<'a> {
    guard: &'a SessionGuard,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(mut self, outcome: &Result<(), ApiError>) {
        self.settled = true;
        self.guard.release(outcome);
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.guard
                .release(&Err(ApiError::Transport("session refresh abandoned".to_string())));
        }
    }
}

impl SessionGuard {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: SessionHandle,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            transport,
            session,
            notifier,
            refresh: Mutex::new(RefreshState::default()),
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Number of requests parked behind the running refresh.
    pub fn queued(&self) -> usize {
        self.state().queue.len()
    }

    pub fn refresh_in_flight(&self) -> bool {
        self.state().in_flight
    }

    fn state(&self) -> std::sync::MutexGuard<'_, RefreshState> {
        self.refresh.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sends `request`, recovering once from an expired session.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.transport.execute(request).await?;
        if !response.is_unauthenticated() || !request.recover_session {
            return response.check();
        }

        self.recover().await?;

        tracing::debug!(path = %request.path, "replaying after refresh");
        let replay = self.transport.execute(request).await?;
        if replay.is_unauthenticated() {
            tracing::warn!(path = %request.path, "rejected again after refresh");
            return Err(ApiError::Unauthenticated(replay.detail()));
        }
        replay.check()
    }

    /// Waits for a usable session: either joins the refresh already running
    /// or runs one.
    async fn recover(&self) -> Result<(), ApiError> {
        let waiter = {
            let mut state = self.state();
            if state.in_flight {
                let (tx, rx) = oneshot::channel();
                state.queue.push_back(tx);
                Some(rx)
            } else {
                state.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            return rx.await.unwrap_or_else(|_| {
                Err(ApiError::Transport("session refresh abandoned".to_string()))
            });
        }

        let in_flight = InFlight {
            guard: self,
            settled: false,
        };
        let was_authenticated = self.session.is_authenticated();
        let mut outcome = self.refresh_session().await;
        // Nobody to tell that a session expired if there never was one.
        if !was_authenticated {
            if let Err(ApiError::SessionExpired(detail)) = outcome {
                outcome = Err(ApiError::Unauthenticated(detail));
            }
        }
        in_flight.settle(&outcome);

        if let Err(err) = &outcome {
            tracing::warn!(error = %err, "session refresh failed");
            self.session.sign_out();
            if was_authenticated {
                self.notifier.notify(Notice::session_expired());
            }
        }
        outcome
    }

    /// Calls the refresh endpoint directly, bypassing the guard.
    async fn refresh_session(&self) -> Result<(), ApiError> {
        tracing::info!("refreshing session");
        let response = self
            .transport
            .execute(&ApiRequest::post(REFRESH_PATH).without_recovery())
            .await
            .map_err(|e| ApiError::SessionExpired(e.to_string()))?;

        if !response.status.is_success() {
            return Err(ApiError::SessionExpired(response.detail()));
        }
        if let Ok(user) = response.json::<User>() {
            self.session.sign_in(user);
        }
        Ok(())
    }

    /// Clears the in-flight flag and settles every parked continuation in
    /// arrival order. Both happen under one lock so no waiter is missed.
    fn release(&self, outcome: &Result<(), ApiError>) {
        let queued = {
            let mut state = self.state();
            state.in_flight = false;
            mem::take(&mut state.queue)
        };
        if !queued.is_empty() {
            tracing::debug!(count = queued.len(), ok = outcome.is_ok(), "releasing queued requests");
        }
        for tx in queued {
            let _ = tx.send(outcome.clone());
        }
    }
}
