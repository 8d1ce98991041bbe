// crates/types/src/token.rs
//! JWT credential pair issued by the backend (SimpleJWT shape).

use serde::{Deserialize, Serialize};

/// Access/refresh token pair. At most one pair is current at a time;
/// it is replaced atomically on successful renewal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived bearer credential, required on every authenticated call.
    pub access: String,
    /// Long-lived credential, used only to mint a new pair.
    pub refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

/// Body for `POST {auth_base}login/`.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    /// Driver CPF, used as the username by the backend.
    pub username: String,
    pub password: String,
}

/// Body for `POST {auth_base}token/refresh/`.
#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Response of the login and refresh endpoints. The refresh field is only
/// present when the server rotates refresh tokens.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
