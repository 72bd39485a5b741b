//! Stateless HTTP request builder and response parser for the todo routes.
//!
//! # Design
//! `TodoApi` holds only a `base_url` and carries no mutable state between
//! calls. Each CRUD operation is split into a `build_*` method that produces
//! an `HttpRequest` and a `parse_*` method that consumes an `HttpResponse`.
//! Every builder takes the bearer token explicitly; the session-aware
//! `TodoClient` supplies it.

use uuid::Uuid;

use crate::error::ApiError;
use crate::http::{bearer_headers, HttpMethod, HttpRequest, HttpResponse};
use crate::response::{check_status, parse_json};
use crate::types::{CreateTodo, Todo, UpdateTodo};

pub const LIST_FAILED: &str = "Failed to fetch todos";
pub const LIST_DONE_FAILED: &str = "Failed to fetch done todos";
pub const GET_FAILED: &str = "Failed to fetch todo";
pub const CREATE_FAILED: &str = "Failed to create todo";
pub const UPDATE_FAILED: &str = "Failed to update todo";
pub const DELETE_FAILED: &str = "Failed to delete todo";

const MISSING_TODO: &str = "Todo not found";

#[derive(Debug, Clone)]
pub struct TodoApi {
    base_url: String,
}

impl TodoApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn build_list_todos(&self, token: &str) -> HttpRequest {
        self.request(HttpMethod::Get, "/todos".to_string(), token, None)
    }

    pub fn build_list_done(&self, token: &str) -> HttpRequest {
        self.request(HttpMethod::Get, "/todo/done".to_string(), token, None)
    }

    pub fn build_get_todo(&self, token: &str, id: Uuid) -> HttpRequest {
        self.request(HttpMethod::Get, format!("/todo/{id}"), token, None)
    }

    pub fn build_create_todo(&self, token: &str, input: &CreateTodo) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(self.request(HttpMethod::Post, "/todos".to_string(), token, Some(body)))
    }

    pub fn build_update_todo(
        &self,
        token: &str,
        id: Uuid,
        input: &UpdateTodo,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(self.request(HttpMethod::Put, format!("/todos/{id}"), token, Some(body)))
    }

    pub fn build_delete_todo(&self, token: &str, id: Uuid) -> HttpRequest {
        self.request(HttpMethod::Delete, format!("/todos/{id}"), token, None)
    }

    pub fn parse_list_todos(&self, response: HttpResponse) -> Result<Vec<Todo>, ApiError> {
        check_status(&response, LIST_FAILED)?;
        parse_json(&response)
    }

    pub fn parse_list_done(&self, response: HttpResponse) -> Result<Vec<Todo>, ApiError> {
        check_status(&response, LIST_DONE_FAILED)?;
        parse_json(&response)
    }

    pub fn parse_get_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response, GET_FAILED)?;
        parse_record(&response)
    }

    pub fn parse_create_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response, CREATE_FAILED)?;
        parse_json(&response)
    }

    pub fn parse_update_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        check_status(&response, UPDATE_FAILED)?;
        parse_record(&response)
    }

    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response, DELETE_FAILED)
    }

    fn request(&self, method: HttpMethod, route: String, token: &str, body: Option<String>) -> HttpRequest {
        HttpRequest {
            method,
            path: format!("{}{route}", self.base_url),
            headers: bearer_headers(token),
            body,
        }
    }
}

/// Some backends answer a lookup of a missing record with `200 false`
/// instead of a 404.
fn parse_record(response: &HttpResponse) -> Result<Todo, ApiError> {
    if response.body.trim() == "false" {
        return Err(ApiError::NotFound {
            message: MISSING_TODO.to_string(),
        });
    }
    parse_json(response)
}
