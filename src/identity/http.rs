//! HTTP adapter for the portal identity service.
//!
//! Thin `reqwest` wrapper over `/auth/login`, `/auth/register` and
//! `/auth/me`. Status and body interpretation live in pure functions
//! (`interpret`, `classify_failure`) so they can be tested without a server.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures and timeouts become `Network`; 401/403 become
//! `InvalidCredentials`; 400/409/422 become `Validation` with whatever field
//! messages the body carries; everything else is `Server`.

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::IdentityApi;
use super::types::{AuthSuccess, Credentials, RegistrationPayload};
use crate::error::{AuthError, FieldErrors};
use crate::session::User;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const LOGIN_PATH: &str = "/auth/login";
const REGISTER_PATH: &str = "/auth/register";
const ME_PATH: &str = "/auth/me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpIdentityClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpIdentityClient {
    /// `base_url` includes any mount prefix, e.g. `https://portal.example/api`.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialized.
    pub fn new(base_url: impl Into<String>, timeouts: Timeouts) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Ok(Self { http, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<AuthSuccess, AuthError> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;
        decode_success(status, &body)
    }
}

#[async_trait::async_trait]
impl IdentityApi for HttpIdentityClient {
    async fn login(&self, credentials: &Credentials) -> Result<AuthSuccess, AuthError> {
        tracing::debug!(email = %credentials.email, "identity login");
        self.post_json(LOGIN_PATH, credentials).await
    }

    async fn register(&self, payload: &RegistrationPayload) -> Result<AuthSuccess, AuthError> {
        tracing::debug!(email = %payload.email, role = %payload.role, "identity register");
        self.post_json(REGISTER_PATH, payload).await
    }

    async fn validate_token(&self, token: &str) -> Result<User, AuthError> {
        // The service reads the token from the query string; the bearer
        // header covers deployments that expect the standard scheme.
        let response = self
            .http
            .get(self.url(ME_PATH))
            .bearer_auth(token)
            .query(&[("token", token)])
            .send()
            .await
            .map_err(transport)?;
        match read::<MeBody>(response).await {
            Ok(MeBody::Wrapped { user } | MeBody::Bare(user)) => Ok(user),
            Err(AuthError::Server { status: Some(404), message }) => Err(AuthError::InvalidCredentials(message)),
            Err(e) => Err(e),
        }
    }
}

/// `/auth/me` answers either `{user: {...}}` or the bare user object.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum MeBody {
    Wrapped { user: User },
    Bare(User),
}

async fn read<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AuthError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(transport)?;
    interpret(status, &body)
}

fn transport(error: reqwest::Error) -> AuthError {
    if error.is_timeout() {
        AuthError::Network(format!("request timed out: {error}"))
    } else {
        AuthError::Network(error.to_string())
    }
}

// =============================================================================
// INTERPRETATION
// =============================================================================

/// Turn a status + body into the decoded payload or a classified error.
pub(crate) fn interpret<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, AuthError> {
    if !(200..300).contains(&status) {
        return Err(classify_failure(status, body));
    }
    serde_json::from_str(body).map_err(|e| AuthError::Server {
        status: Some(status),
        message: format!("malformed response: {e}"),
    })
}

/// `interpret` for login/register replies, which must carry a usable token.
pub(crate) fn decode_success(status: u16, body: &str) -> Result<AuthSuccess, AuthError> {
    interpret::<AuthSuccess>(status, body)?.verified(Some(status))
}

pub(crate) fn classify_failure(status: u16, body: &str) -> AuthError {
    let (message, fields) = parse_error_body(body);
    match status {
        401 | 403 => AuthError::InvalidCredentials(message.unwrap_or_else(|| "unauthorized".to_owned())),
        409 => AuthError::Validation {
            message: message.unwrap_or_else(|| "Email already registered".to_owned()),
            fields,
        },
        400 | 422 => AuthError::Validation { message: message.unwrap_or_default(), fields },
        _ => AuthError::Server {
            status: Some(status),
            message: message.unwrap_or_else(|| format!("unexpected status {status}")),
        },
    }
}

/// Accepts `{error, fields}`, `{detail: "msg"}` and pydantic's
/// `{detail: [{loc, msg}]}` shapes.
fn parse_error_body(body: &str) -> (Option<String>, FieldErrors) {
    let mut fields = FieldErrors::new();
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return (None, fields);
    };

    if let Some(map) = value.get("fields").and_then(Value::as_object) {
        for (field, reason) in map {
            let reason = match reason {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            fields.insert(field.clone(), reason);
        }
    }

    let mut message = ["error", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(ToOwned::to_owned);

    match value.get("detail") {
        Some(Value::String(detail)) => {
            message.get_or_insert_with(|| detail.clone());
        }
        Some(Value::Array(items)) => {
            for item in items {
                let reason = item.get("msg").and_then(Value::as_str);
                let field = item
                    .get("loc")
                    .and_then(Value::as_array)
                    .and_then(|loc| loc.last())
                    .and_then(Value::as_str);
                if let (Some(field), Some(reason)) = (field, reason) {
                    fields.entry(field.to_owned()).or_insert_with(|| reason.to_owned());
                }
            }
        }
        _ => {}
    }

    (message, fields)
}
