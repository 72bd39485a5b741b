//! In-memory implementation of the todo REST API.
//!
//! Serves `/api/v1/auth/*` and the todo routes with the same shapes and
//! error bodies (`{"detail": ...}`) as the production backend. Accounts,
//! tokens and todos live in process memory; tokens are opaque random strings
//! with no expiry. This is a test double, not a security boundary.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub is_done: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: User,
}

#[derive(Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateTodo {
    pub title: String,
    #[serde(default)]
    pub is_done: bool,
}

#[derive(Deserialize)]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub is_done: Option<bool>,
}

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
pub struct Store {
    accounts: HashMap<Uuid, Account>,
    tokens: HashMap<String, Uuid>,
    /// Insertion order is the listing order.
    todos: Vec<Todo>,
}

impl Store {
    fn account_by_email(&self, email: &str) -> Option<&Account> {
        self.accounts.values().find(|a| a.user.email == email)
    }

    fn issue_token(&mut self, user_id: Uuid) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.insert(token.clone(), user_id);
        token
    }

    fn owned_mut(&mut self, id: Uuid, user_id: Uuid) -> Option<&mut Todo> {
        self.todos.iter_mut().find(|t| t.id == id && t.user_id == user_id)
    }
}

pub type Db = Arc<RwLock<Store>>;

/// An error response carrying a `detail` body.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    detail: Value,
}

impl ApiFailure {
    fn new(status: StatusCode, detail: &str) -> Self {
        Self {
            status,
            detail: Value::String(detail.to_string()),
        }
    }

    /// Field validation failure in the list-of-errors shape.
    fn invalid(field: &str, msg: &str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: json!([{ "loc": ["body", field], "msg": msg, "type": "value_error" }]),
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Could not validate credentials")
    }

    fn todo_not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Todo not found")
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub fn app() -> Router {
    router(Db::default())
}

/// Build the router around existing state, all routes under `/api/v1`.
pub fn router(db: Db) -> Router {
    let api = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todo/done", get(list_done))
        .route("/todo/{id}", get(get_todo))
        .route("/todos/{id}", put(update_todo).delete(delete_todo))
        .with_state(db);
    Router::new().nest("/api/v1", api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn authenticate(db: &Db, headers: &HeaderMap) -> Result<Uuid, ApiFailure> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(ApiFailure::unauthorized)?;
    let store = db.read().await;
    let user_id = store.tokens.get(token).copied().ok_or_else(ApiFailure::unauthorized)?;
    if !store.accounts.contains_key(&user_id) {
        return Err(ApiFailure::unauthorized());
    }
    Ok(user_id)
}

fn validate_title(title: &str) -> Result<(), ApiFailure> {
    let len = title.chars().count();
    if len == 0 || len > 200 {
        return Err(ApiFailure::invalid(
            "title",
            "String should have between 1 and 200 characters",
        ));
    }
    Ok(())
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<RegisterInput>,
) -> Result<Json<TokenResponse>, ApiFailure> {
    if !input.email.contains('@') {
        return Err(ApiFailure::invalid("email", "value is not a valid email address"));
    }
    let username_len = input.username.chars().count();
    if !(3..=50).contains(&username_len) {
        return Err(ApiFailure::invalid(
            "username",
            "String should have between 3 and 50 characters",
        ));
    }
    if input.password.chars().count() < 6 {
        return Err(ApiFailure::invalid(
            "password",
            "String should have at least 6 characters",
        ));
    }

    let mut store = db.write().await;
    if store.account_by_email(&input.email).is_some() {
        return Err(ApiFailure::new(StatusCode::BAD_REQUEST, "Email already registered"));
    }
    let user = User {
        id: Uuid::new_v4(),
        email: input.email,
        username: input.username,
        created_at: Utc::now(),
        is_active: true,
    };
    store.accounts.insert(
        user.id,
        Account {
            user: user.clone(),
            password: input.password,
        },
    );
    let access_token = store.issue_token(user.id);
    tracing::debug!(user_id = %user.id, "registered user");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user,
    }))
}

async fn login(
    State(db): State<Db>,
    Json(input): Json<LoginInput>,
) -> Result<Json<TokenResponse>, ApiFailure> {
    let mut store = db.write().await;
    let user = match store.account_by_email(&input.email) {
        Some(account) if account.password == input.password => account.user.clone(),
        _ => {
            return Err(ApiFailure::new(
                StatusCode::UNAUTHORIZED,
                "Incorrect email or password",
            ))
        }
    };
    if !user.is_active {
        return Err(ApiFailure::new(StatusCode::BAD_REQUEST, "Inactive user"));
    }
    let access_token = store.issue_token(user.id);
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user,
    }))
}

async fn me(State(db): State<Db>, headers: HeaderMap) -> Result<Json<User>, ApiFailure> {
    let user_id = authenticate(&db, &headers).await?;
    let store = db.read().await;
    store
        .accounts
        .get(&user_id)
        .map(|a| Json(a.user.clone()))
        .ok_or_else(ApiFailure::unauthorized)
}

async fn list_todos(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Vec<Todo>>, ApiFailure> {
    let user_id = authenticate(&db, &headers).await?;
    let store = db.read().await;
    Ok(Json(
        store.todos.iter().filter(|t| t.user_id == user_id).cloned().collect(),
    ))
}

async fn list_done(State(db): State<Db>, headers: HeaderMap) -> Result<Json<Vec<Todo>>, ApiFailure> {
    let user_id = authenticate(&db, &headers).await?;
    let store = db.read().await;
    Ok(Json(
        store
            .todos
            .iter()
            .filter(|t| t.user_id == user_id && t.is_done)
            .cloned()
            .collect(),
    ))
}

async fn create_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateTodo>,
) -> Result<(StatusCode, Json<Todo>), ApiFailure> {
    let user_id = authenticate(&db, &headers).await?;
    validate_title(&input.title)?;
    let now = Utc::now();
    let todo = Todo {
        id: Uuid::new_v4(),
        title: input.title,
        is_done: input.is_done,
        user_id,
        created_at: now,
        updated_at: now,
    };
    db.write().await.todos.push(todo.clone());
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn get_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Todo>, ApiFailure> {
    let user_id = authenticate(&db, &headers).await?;
    let store = db.read().await;
    store
        .todos
        .iter()
        .find(|t| t.id == id && t.user_id == user_id)
        .cloned()
        .map(Json)
        .ok_or_else(ApiFailure::todo_not_found)
}

async fn update_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateTodo>,
) -> Result<Json<Todo>, ApiFailure> {
    let user_id = authenticate(&db, &headers).await?;
    if let Some(title) = &input.title {
        validate_title(title)?;
    }
    let mut store = db.write().await;
    let todo = store.owned_mut(id, user_id).ok_or_else(ApiFailure::todo_not_found)?;
    if let Some(title) = input.title {
        todo.title = title;
    }
    if let Some(is_done) = input.is_done {
        todo.is_done = is_done;
    }
    todo.updated_at = Utc::now();
    Ok(Json(todo.clone()))
}

async fn delete_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiFailure> {
    let user_id = authenticate(&db, &headers).await?;
    let mut store = db.write().await;
    let before = store.todos.len();
    store.todos.retain(|t| !(t.id == id && t.user_id == user_id));
    if store.todos.len() == before {
        return Err(ApiFailure::todo_not_found());
    }
    Ok(Json(json!({ "msg": "Deleted" })))
}
