//! Last-known mirror of the user's todos.
//!
//! # Design
//! `TodoMirror` is a view-side cache, never the source of truth. Successful
//! writes are applied from the server's response (append, replace in place,
//! drop). A failed write may leave the mirror out of step with the server,
//! so every write error except `Cancelled` triggers a re-fetch before the
//! original error is returned. Cancelled calls leave the mirror untouched.

use tracing::warn;
use uuid::Uuid;

use crate::client::TodoClient;
use crate::error::ApiError;
use crate::types::{CreateTodo, Todo, UpdateTodo};

#[derive(Debug, Clone, Default)]
pub struct TodoMirror {
    todos: Vec<Todo>,
}

impl TodoMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn len(&self) -> usize {
        self.todos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == id)
    }

    /// Replace the contents with the server's current list.
    pub async fn refresh(&mut self, client: &TodoClient) -> Result<(), ApiError> {
        self.todos = client.list_all().await?;
        Ok(())
    }

    pub async fn add(&mut self, client: &TodoClient, title: &str) -> Result<&Todo, ApiError> {
        let result = client.create(&CreateTodo::new(title)).await;
        let created = self.reconcile_on_error(client, result).await?;
        self.todos.push(created);
        Ok(&self.todos[self.todos.len() - 1])
    }

    pub async fn rename(&mut self, client: &TodoClient, id: Uuid, title: &str) -> Result<&Todo, ApiError> {
        let result = client.update(id, &UpdateTodo::title(title)).await;
        let updated = self.reconcile_on_error(client, result).await?;
        Ok(self.upsert(updated))
    }

    pub async fn set_done(&mut self, client: &TodoClient, id: Uuid, is_done: bool) -> Result<&Todo, ApiError> {
        let result = client.toggle_done(id, is_done).await;
        let updated = self.reconcile_on_error(client, result).await?;
        Ok(self.upsert(updated))
    }

    /// Flip the done flag of a mirrored todo.
    pub async fn toggle(&mut self, client: &TodoClient, id: Uuid) -> Result<&Todo, ApiError> {
        let is_done = match self.get(id) {
            Some(todo) => todo.is_done,
            None => {
                return Err(ApiError::NotFound {
                    message: "Todo not found".to_string(),
                })
            }
        };
        self.set_done(client, id, !is_done).await
    }

    pub async fn remove(&mut self, client: &TodoClient, id: Uuid) -> Result<(), ApiError> {
        let result = client.delete(id).await;
        self.reconcile_on_error(client, result).await?;
        self.todos.retain(|t| t.id != id);
        Ok(())
    }

    fn upsert(&mut self, todo: Todo) -> &Todo {
        match self.todos.iter().position(|t| t.id == todo.id) {
            Some(index) => {
                self.todos[index] = todo;
                &self.todos[index]
            }
            None => {
                self.todos.push(todo);
                &self.todos[self.todos.len() - 1]
            }
        }
    }

    async fn reconcile_on_error<T>(
        &mut self,
        client: &TodoClient,
        result: Result<T, ApiError>,
    ) -> Result<T, ApiError> {
        match result {
            Err(ApiError::Cancelled) => Err(ApiError::Cancelled),
            Err(e) => {
                if let Err(refresh_err) = self.refresh(client).await {
                    warn!(error = %refresh_err, "failed to re-sync todos after write error");
                }
                Err(e)
            }
            ok => ok,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::MemoryTokenStore;
    use crate::testutil::{session_with, todo_json, token_json, ScriptedTransport, BASE_URL};
    use tokio_util::sync::CancellationToken;

    fn id(n: u8) -> Uuid {
        format!("00000000-0000-0000-0000-0000000000{n:02x}").parse().unwrap()
    }

    async fn client(transport: &Arc<ScriptedTransport>) -> TodoClient {
        transport.reply(200, &token_json("tok"));
        let session = session_with(transport.clone(), Arc::new(MemoryTokenStore::new()));
        session.login("ada@example.com", "secret1").await.unwrap();
        TodoClient::for_session(session, BASE_URL)
    }

    #[tokio::test]
    async fn successful_writes_apply_server_response() {
        let transport = ScriptedTransport::new();
        let client = client(&transport).await;
        let mut mirror = TodoMirror::new();

        transport.reply(200, &format!("[{}]", todo_json(1, "Milk", false)));
        mirror.refresh(&client).await.unwrap();
        assert_eq!(mirror.len(), 1);

        transport.reply(201, &todo_json(2, "Eggs", false));
        mirror.add(&client, "Eggs").await.unwrap();
        assert_eq!(mirror.todos()[1].title, "Eggs");

        transport.reply(200, &todo_json(1, "Milk", true));
        let toggled = mirror.toggle(&client, id(1)).await.unwrap();
        assert!(toggled.is_done);
        assert_eq!(mirror.todos()[0].id, id(1));

        transport.reply(200, &todo_json(2, "Bread", false));
        mirror.rename(&client, id(2), "Bread").await.unwrap();
        assert_eq!(mirror.get(id(2)).unwrap().title, "Bread");

        transport.reply(200, r#"{"msg":"Deleted"}"#);
        mirror.remove(&client, id(1)).await.unwrap();
        assert_eq!(mirror.len(), 1);
        assert!(mirror.get(id(1)).is_none());
    }

    #[tokio::test]
    async fn write_error_resyncs_from_server() {
        let transport = ScriptedTransport::new();
        let client = client(&transport).await;
        let mut mirror = TodoMirror::new();
        transport.reply(200, &format!("[{},{}]", todo_json(1, "Milk", false), todo_json(2, "Eggs", false)));
        mirror.refresh(&client).await.unwrap();

        // Someone else deleted todo 1; the server now has only todo 2.
        transport
            .reply(404, r#"{"detail":"Todo not found"}"#)
            .reply(200, &format!("[{}]", todo_json(2, "Eggs", false)));
        let err = mirror.set_done(&client, id(1), true).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(mirror.len(), 1);
        assert_eq!(mirror.todos()[0].id, id(2));
    }

    #[tokio::test]
    async fn failed_resync_still_reports_the_write_error() {
        let transport = ScriptedTransport::new();
        let client = client(&transport).await;
        let mut mirror = TodoMirror::new();

        transport.reply(422, r#"{"detail":[{"msg":"title too short"}]}"#).fail("down");
        let err = mirror.add(&client, "").await.unwrap_err();
        assert_eq!(err.to_string(), "title too short");
        assert!(mirror.is_empty());
    }

    #[tokio::test]
    async fn cancelled_write_leaves_mirror_alone() {
        let transport = ScriptedTransport::new();
        let client = client(&transport).await;
        let mut mirror = TodoMirror::new();
        transport.reply(200, &format!("[{}]", todo_json(1, "Milk", false)));
        mirror.refresh(&client).await.unwrap();
        let sent = transport.requests().len();

        let scope = CancellationToken::new();
        scope.cancel();
        let err = mirror
            .remove(&client.scoped(scope), id(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert_eq!(mirror.len(), 1);
        assert_eq!(transport.requests().len(), sent);
    }

    #[tokio::test]
    async fn toggle_of_unknown_id_is_not_found() {
        let transport = ScriptedTransport::new();
        let client = client(&transport).await;
        let mut mirror = TodoMirror::new();
        let err = mirror.toggle(&client, id(9)).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
