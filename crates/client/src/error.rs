// crates/client/src/error.rs
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by [`crate::auth::AuthSession`].
#[derive(Debug, Error)]
pub enum AuthError {
    /// Transport failure or timeout. Recoverable by a later retry; the stored
    /// credentials are left untouched.
    #[error("network error talking to {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The refresh token is missing, was rejected, or the renewal endpoint
    /// answered with garbage. Fatal for the session: stored tokens are
    /// cleared and the caller must re-authenticate.
    #[error("session expired, re-authentication required")]
    SessionExpired,

    /// The request already carried an Authorization header. The session
    /// injects the bearer token itself; a pre-set header would either leak a
    /// stale token or get silently replaced, so it is refused outright.
    #[error("request for {url} already carries an Authorization header")]
    AlreadyAuthorized { url: String },

    /// Login was rejected by the auth endpoint (wrong CPF/password, blocked
    /// driver, ...).
    #[error("login rejected ({status}): {detail}")]
    LoginRejected { status: StatusCode, detail: String },

    /// Persisting the credential store failed after a successful login.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub(crate) fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// True for failures the user can recover from by simply retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// Errors from the high-level manifest API ([`crate::api::ManifestoClient`]).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Non-2xx answer that passed through the auth layer unchanged, with the
    /// backend `mensagem` when one could be decoded from the body.
    #[error("server answered {status}: {mensagem}")]
    Status { status: StatusCode, mensagem: String },

    /// 2xx answer whose body did not decode into the expected shape.
    #[error("malformed response from {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors reading or writing the on-disk credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error accessing credential store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no writable config directory found for the credential store")]
    NoConfigDir,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_transient_classification() {
        assert!(!AuthError::SessionExpired.is_transient());
        assert!(!AuthError::AlreadyAuthorized { url: "u".into() }.is_transient());
    }

    #[test]
    fn test_store_error_display_includes_path() {
        let err = StoreError::io(
            "/tmp/credentials.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/credentials.json"));
    }

    #[test]
    fn test_api_error_wraps_auth() {
        let err: ApiError = AuthError::SessionExpired.into();
        assert!(matches!(err, ApiError::Auth(AuthError::SessionExpired)));
    }
}
