//! Client core for the todo service: session management and the todo API.
//!
//! # Overview
//! - [`SessionManager`] owns authentication state: the current user, the
//!   bearer token and its durable copy. It restores a persisted session on
//!   startup and exposes login, register and logout.
//! - [`TodoClient`] performs authenticated CRUD calls using the session's
//!   token.
//! - [`TodoMirror`] is an optional last-known copy of the user's todos for
//!   views that render a list.
//!
//! # Design
//! - Request construction and response parsing are pure (`AuthApi`,
//!   `TodoApi`: `build_*` / `parse_*`), so the I/O boundary is explicit and
//!   any HTTP client can drive them.
//! - Network I/O goes through the [`Transport`] trait; [`ReqwestTransport`]
//!   is the production implementation.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod auth_api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod mirror;
mod response;
pub mod session;
pub mod storage;
pub mod todo_api;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testutil;

pub use auth_api::AuthApi;
pub use client::TodoClient;
pub use config::{ClientConfig, ConfigError};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use mirror::TodoMirror;
pub use session::{AuthState, Destination, SessionManager};
pub use storage::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use todo_api::TodoApi;
pub use transport::{ReqwestTransport, Transport};
pub use types::{CreateTodo, LoginRequest, RegisterRequest, Todo, TokenResponse, UpdateTodo, User};

pub use tokio_util::sync::CancellationToken;
