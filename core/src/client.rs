//! Authenticated CRUD proxy to the todo API.
//!
//! # Design
//! `TodoClient` can only be constructed from a `SessionManager`, so every
//! dependent that talks to the todo API is wired to a live session. Each
//! operation reads the current bearer token, runs the `TodoApi` builder, the
//! transport and the matching parser, and passes errors straight through:
//! no retry, no backoff. A 401 additionally clears the session, keeping the
//! stored and in-memory token in lockstep.
//!
//! A client may be bound to a `CancellationToken` with [`TodoClient::scoped`].
//! Once the scope is cancelled, pending and future calls on that client
//! resolve to `ApiError::Cancelled`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::session::SessionManager;
use crate::todo_api::TodoApi;
use crate::transport::Transport;
use crate::types::{CreateTodo, Todo, UpdateTodo};

#[derive(Clone)]
pub struct TodoClient {
    session: Arc<SessionManager>,
    api: TodoApi,
    transport: Arc<dyn Transport>,
    scope: Option<CancellationToken>,
}

impl TodoClient {
    pub fn new(session: Arc<SessionManager>, api: TodoApi, transport: Arc<dyn Transport>) -> Self {
        Self {
            session,
            api,
            transport,
            scope: None,
        }
    }

    /// Share the session's transport.
    pub fn for_session(session: Arc<SessionManager>, base_url: &str) -> Self {
        let transport = session.transport();
        Self::new(session, TodoApi::new(base_url), transport)
    }

    /// A copy of this client whose requests end when `scope` is cancelled.
    pub fn scoped(&self, scope: CancellationToken) -> Self {
        Self {
            scope: Some(scope),
            ..self.clone()
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub async fn list_all(&self) -> Result<Vec<Todo>, ApiError> {
        let token = self.session.bearer_token()?;
        let response = self.send(&token, self.api.build_list_todos(&token)).await?;
        self.settle(&token, self.api.parse_list_todos(response))
    }

    /// Completed todos only; filtered server-side.
    pub async fn list_done(&self) -> Result<Vec<Todo>, ApiError> {
        let token = self.session.bearer_token()?;
        let response = self.send(&token, self.api.build_list_done(&token)).await?;
        self.settle(&token, self.api.parse_list_done(response))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Todo, ApiError> {
        let token = self.session.bearer_token()?;
        let response = self.send(&token, self.api.build_get_todo(&token, id)).await?;
        self.settle(&token, self.api.parse_get_todo(response))
    }

    pub async fn create(&self, input: &CreateTodo) -> Result<Todo, ApiError> {
        let token = self.session.bearer_token()?;
        let request = self.api.build_create_todo(&token, input)?;
        let response = self.send(&token, request).await?;
        let todo = self.settle(&token, self.api.parse_create_todo(response))?;
        debug!(todo_id = %todo.id, "created todo");
        Ok(todo)
    }

    /// Partial update: only the supplied fields change.
    pub async fn update(&self, id: Uuid, input: &UpdateTodo) -> Result<Todo, ApiError> {
        let token = self.session.bearer_token()?;
        let request = self.api.build_update_todo(&token, id, input)?;
        let response = self.send(&token, request).await?;
        self.settle(&token, self.api.parse_update_todo(response))
    }

    /// Deleting an id that does not exist is a `NotFound` error.
    pub async fn delete(&self, id: Uuid) -> Result<(), ApiError> {
        let token = self.session.bearer_token()?;
        let response = self.send(&token, self.api.build_delete_todo(&token, id)).await?;
        self.settle(&token, self.api.parse_delete_todo(response))?;
        debug!(todo_id = %id, "deleted todo");
        Ok(())
    }

    pub async fn toggle_done(&self, id: Uuid, is_done: bool) -> Result<Todo, ApiError> {
        self.update(id, &UpdateTodo::done(is_done)).await
    }

    async fn send(&self, token: &str, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = request.method.as_str(), path = %request.path, "todo request");
        let Some(scope) = &self.scope else {
            return self.transport.execute(request).await;
        };
        if scope.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let result = tokio::select! {
            biased;
            _ = scope.cancelled() => Err(ApiError::Cancelled),
            result = self.transport.execute(request) => result,
        };
        // A response that lands after cancellation is dropped too, but a
        // rejection of the token still ends the session.
        if scope.is_cancelled() {
            debug!("discarding response for cancelled scope");
            if let Ok(response) = &result {
                if response.status == 401 {
                    self.session.reject_token(token);
                }
            }
            return Err(ApiError::Cancelled);
        }
        result
    }

    fn settle<T>(&self, token: &str, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(e) = &result {
            if e.is_auth_rejected() {
                self.session.reject_token(token);
            }
        }
        result
    }
}

impl std::fmt::Debug for TodoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoClient")
            .field("api", &self.api)
            .field("scoped", &self.scope.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryTokenStore, TokenStore};
    use crate::testutil::{session_with, todo_json, token_json, ScriptedTransport, BASE_URL};

    async fn logged_in(transport: &Arc<ScriptedTransport>, store: &Arc<MemoryTokenStore>) -> TodoClient {
        transport.reply(200, &token_json("tok"));
        let session = session_with(transport.clone(), store.clone());
        session.login("ada@example.com", "secret1").await.unwrap();
        TodoClient::for_session(session, BASE_URL)
    }

    #[tokio::test]
    async fn requests_carry_the_session_token() {
        let transport = ScriptedTransport::new();
        let store = Arc::new(MemoryTokenStore::new());
        let client = logged_in(&transport, &store).await;
        transport.reply(200, &format!("[{}]", todo_json(1, "Milk", false)));

        let todos = client.list_all().await.unwrap();
        assert_eq!(todos.len(), 1);

        let sent = transport.requests();
        let list = sent.last().unwrap();
        assert_eq!(list.path, format!("{BASE_URL}/todos"));
        assert_eq!(list.header("authorization"), Some("Bearer tok"));
        assert_eq!(list.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn no_session_means_no_request() {
        let transport = ScriptedTransport::new();
        let session = session_with(transport.clone(), Arc::new(MemoryTokenStore::new()));
        let client = TodoClient::for_session(session, BASE_URL);

        let err = client.list_done().await.unwrap_err();
        assert!(matches!(err, ApiError::NotAuthenticated));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn auth_rejection_clears_the_session() {
        let transport = ScriptedTransport::new();
        let store = Arc::new(MemoryTokenStore::new());
        let client = logged_in(&transport, &store).await;
        transport.reply(401, r#"{"detail":"Could not validate credentials"}"#);

        let err = client.create(&CreateTodo::new("x")).await.unwrap_err();
        assert!(err.is_auth_rejected());
        assert_eq!(store.load().unwrap(), None);
        assert!(!client.session().auth_state().is_authenticated);
    }

    #[tokio::test]
    async fn other_errors_keep_the_session() {
        let transport = ScriptedTransport::new();
        let store = Arc::new(MemoryTokenStore::new());
        let client = logged_in(&transport, &store).await;
        transport.reply(404, r#"{"detail":"Todo not found"}"#);

        let err = client.delete(Uuid::nil()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.load().unwrap().as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn toggle_done_sends_only_is_done() {
        let transport = ScriptedTransport::new();
        let store = Arc::new(MemoryTokenStore::new());
        let client = logged_in(&transport, &store).await;
        transport.reply(200, &todo_json(1, "Milk", true));

        let id: Uuid = "00000000-0000-0000-0000-000000000001".parse().unwrap();
        let todo = client.toggle_done(id, true).await.unwrap();
        assert!(todo.is_done);

        let sent = transport.requests();
        let put = sent.last().unwrap();
        assert!(put.path.ends_with(&format!("/todos/{id}")));
        let body: serde_json::Value = serde_json::from_str(put.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "is_done": true }));
    }

    #[tokio::test]
    async fn cancelled_scope_short_circuits() {
        let transport = ScriptedTransport::new();
        let store = Arc::new(MemoryTokenStore::new());
        let client = logged_in(&transport, &store).await;
        let sent_before = transport.requests().len();

        let scope = CancellationToken::new();
        let scoped = client.scoped(scope.clone());
        scope.cancel();

        let err = scoped.list_all().await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert_eq!(transport.requests().len(), sent_before);
    }

    #[tokio::test]
    async fn rejection_arriving_after_cancel_still_clears_the_session() {
        let transport = ScriptedTransport::new();
        let store = Arc::new(MemoryTokenStore::new());
        let client = logged_in(&transport, &store).await;

        let scope = CancellationToken::new();
        let scoped = client.scoped(scope.clone());
        transport
            .cancel_on_next_request(scope)
            .reply(401, r#"{"detail":"Could not validate credentials"}"#);

        let err = scoped.list_all().await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert_eq!(store.load().unwrap(), None);
        assert!(!client.session().auth_state().is_authenticated);
    }

    #[tokio::test]
    async fn success_arriving_after_cancel_is_dropped() {
        let transport = ScriptedTransport::new();
        let store = Arc::new(MemoryTokenStore::new());
        let client = logged_in(&transport, &store).await;

        let scope = CancellationToken::new();
        let scoped = client.scoped(scope.clone());
        transport
            .cancel_on_next_request(scope)
            .reply(200, &todo_json(1, "Milk", false));

        let err = scoped.create(&CreateTodo::new("Milk")).await.unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert_eq!(store.load().unwrap().as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn unscoped_clone_ignores_cancellation() {
        let transport = ScriptedTransport::new();
        let store = Arc::new(MemoryTokenStore::new());
        let client = logged_in(&transport, &store).await;
        let scope = CancellationToken::new();
        let _scoped = client.scoped(scope.clone());
        scope.cancel();
        transport.reply(200, "[]");

        assert!(client.list_all().await.unwrap().is_empty());
    }
}
