use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::{ApiRequest, HttpTransport, Transport};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::guard::SessionGuard;
use crate::notice::{Notice, Notifier};
use crate::session::SessionHandle;

/// Entry point for backend calls. Cheap to clone; every clone shares the
/// same session, guard and notifier.
#[derive(Clone)]
pub struct Client {
    guard: Arc<SessionGuard>,
}

impl Client {
    pub fn new(config: &ClientConfig, notifier: Arc<dyn Notifier>) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(config)?;
        tracing::info!(api_url = transport.base_url(), "client ready");
        Ok(Self::with_transport(Arc::new(transport), notifier))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, notifier: Arc<dyn Notifier>) -> Self {
        let guard = SessionGuard::new(transport, SessionHandle::new(), notifier);
        Self {
            guard: Arc::new(guard),
        }
    }

    pub fn session(&self) -> &SessionHandle {
        self.guard.session()
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    pub fn notify(&self, notice: Notice) {
        self.guard.notifier().notify(notice);
    }

    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.guard.send(&request).await?;
        response.json()
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        self.request(ApiRequest::get(path).query(query)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(ApiRequest::post(path).json(body)?).await
    }

    /// POST without a body.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(ApiRequest::post(path)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(ApiRequest::put(path).json(body)?).await
    }

    pub async fn put_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(ApiRequest::put(path)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(ApiRequest::delete(path)).await
    }

    /// Turns a failed action into a notice. `fallback` names the action for
    /// generic failures.
    pub fn report(&self, err: &ApiError, fallback: &str) {
        tracing::debug!(error = %err, action = fallback, "action failed");
        let notice = match err {
            // The guard has already told the user.
            ApiError::SessionExpired(_) => return,
            ApiError::LoginRequired | ApiError::Unauthenticated(_) => Notice::login_required(),
            ApiError::AlreadyVoted => Notice::error("You have already voted on this topic."),
            ApiError::Invalid(reason) => Notice::error(reason.clone()),
            other => Notice::error(format!("{fallback}: {other}")),
        };
        self.notify(notice);
    }

    /// Reports `result`'s error, if any, and hands the result back.
    pub fn reported<T>(&self, result: Result<T, ApiError>, fallback: &str) -> Result<T, ApiError> {
        if let Err(err) = &result {
            self.report(err, fallback);
        }
        result
    }
}
