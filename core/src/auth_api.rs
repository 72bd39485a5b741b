//! Request builder and response parser for the `/auth` routes.

use crate::error::ApiError;
use crate::http::{bearer_headers, json_headers, HttpMethod, HttpRequest, HttpResponse};
use crate::response::{check_status, parse_json};
use crate::types::{LoginRequest, RegisterRequest, TokenResponse, User};

pub const LOGIN_FAILED: &str = "Login failed";
pub const REGISTER_FAILED: &str = "Registration failed";
pub const VALIDATE_FAILED: &str = "Could not validate credentials";

#[derive(Debug, Clone)]
pub struct AuthApi {
    base_url: String,
}

impl AuthApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn build_login(&self, input: &LoginRequest) -> Result<HttpRequest, ApiError> {
        self.post("/auth/login", input)
    }

    pub fn build_register(&self, input: &RegisterRequest) -> Result<HttpRequest, ApiError> {
        self.post("/auth/register", input)
    }

    /// Identity lookup used to validate a persisted token.
    pub fn build_me(&self, token: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            path: format!("{}/auth/me", self.base_url),
            headers: bearer_headers(token),
            body: None,
        }
    }

    /// Parse a login or register response. `default_message` is reported
    /// when a failed response carries no `detail`.
    pub fn parse_token_response(
        &self,
        response: HttpResponse,
        default_message: &str,
    ) -> Result<TokenResponse, ApiError> {
        check_status(&response, default_message)?;
        let parsed: TokenResponse = parse_json(&response)?;
        if parsed.access_token.is_empty() {
            return Err(ApiError::DeserializationError("empty access_token".to_string()));
        }
        Ok(parsed)
    }

    pub fn parse_me(&self, response: HttpResponse) -> Result<User, ApiError> {
        check_status(&response, VALIDATE_FAILED)?;
        parse_json(&response)
    }

    fn post<T: serde::Serialize>(&self, route: &str, input: &T) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            path: format!("{}{route}", self.base_url),
            headers: json_headers(),
            body: Some(body),
        })
    }
}
