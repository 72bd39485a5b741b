//! Shared test helpers — available to all `#[cfg(test)]` modules in the crate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::auth_api::AuthApi;
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::session::SessionManager;
use crate::storage::MemoryTokenStore;
use crate::transport::Transport;

pub const BASE_URL: &str = "http://api.test/api/v1";

pub const USER_JSON: &str = r#"{"id":"00000000-0000-0000-0000-0000000000aa","email":"ada@example.com","username":"ada","created_at":"2024-01-01T00:00:00","is_active":true}"#;

pub fn todo_json(id: u8, title: &str, is_done: bool) -> String {
    format!(
        r#"{{"id":"00000000-0000-0000-0000-0000000000{id:02x}","title":"{title}","is_done":{is_done},"user_id":"00000000-0000-0000-0000-0000000000aa","created_at":"2024-01-01T00:00:00","updated_at":"2024-01-02T00:00:00"}}"#
    )
}

pub fn token_json(token: &str) -> String {
    format!(r#"{{"access_token":"{token}","token_type":"bearer","user":{USER_JSON}}}"#)
}

pub fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: Vec::new(),
        body: body.to_string(),
    }
}

/// Transport that replays queued responses in order and records every
/// request it receives. An empty queue answers with a network failure.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<HttpResponse, ApiError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    cancel_on_request: Mutex<Option<CancellationToken>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, status: u16, body: &str) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(response(status, body)));
        self
    }

    pub fn fail(&self, message: &str) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(ApiError::Network(message.to_string())));
        self
    }

    /// Cancel `scope` while the next request is in flight, before its reply
    /// is handed back.
    pub fn cancel_on_next_request(&self, scope: CancellationToken) -> &Self {
        *self.cancel_on_request.lock().unwrap() = Some(scope);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests.lock().unwrap().push(request);
        if let Some(scope) = self.cancel_on_request.lock().unwrap().take() {
            scope.cancel();
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Network("no scripted reply".to_string())))
    }
}

/// A session over the given transport and an in-memory store.
pub fn session_with(
    transport: Arc<ScriptedTransport>,
    store: Arc<MemoryTokenStore>,
) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(AuthApi::new(BASE_URL), transport, store))
}
