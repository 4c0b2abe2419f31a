//! Scripted in-memory transport for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::Semaphore;

use crate::api::{ApiRequest, ApiResponse, Transport};
use crate::error::ApiError;

type Handler = dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync;

#[derive(Clone)]
pub(crate) struct FakeTransport {
    handler: Arc<Handler>,
    gates: HashMap<String, Arc<Semaphore>>,
    log: Arc<Mutex<Vec<ApiRequest>>>,
}

pub(crate) fn json_response(status: StatusCode, body: serde_json::Value) -> ApiResponse {
    ApiResponse::new(status, body.to_string())
}

impl FakeTransport {
    pub(crate) fn new(handler: impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            gates: HashMap::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Calls to `path` wait for a permit on `gate` before being answered.
    /// Permits are consumed.
    pub(crate) fn with_gate(mut self, path: &str, gate: Arc<Semaphore>) -> Self {
        self.gates.insert(path.to_string(), gate);
        self
    }

    pub(crate) fn calls(&self, path: &str) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.log.lock().unwrap().push(request.clone());
        if let Some(gate) = self.gates.get(&request.path) {
            gate.acquire()
                .await
                .map_err(|e| ApiError::Transport(e.to_string()))?
                .forget();
        }
        Ok((self.handler)(request))
    }
}
