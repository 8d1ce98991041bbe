// crates/client/src/auth.rs
//! Authenticated HTTP session with transparent token renewal.
//!
//! [`AuthSession::authorized_request`] owns the whole token lifecycle so
//! callers never touch it: inject the current access token, dispatch, and on
//! a 401 renew via the refresh token and retry the same request exactly once.
//! There are no retry loops — a second 401 passes through to the caller, and
//! a failed renewal clears the stored pair and reports `SessionExpired`.

use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};
use tokio::sync::Mutex;

use manifesto_types::{LoginRequest, MensagemResponse, RefreshRequest, TokenPair, TokenResponse};

use crate::config::ClientConfig;
use crate::error::AuthError;
use crate::request::ApiRequest;
use crate::store::CredentialStore;

pub struct AuthSession {
    http: Client,
    config: ClientConfig,
    store: Arc<CredentialStore>,
    /// Serializes renewals: concurrent 401s trigger at most one refresh call,
    /// the losers re-check the store and reuse the winner's result.
    renew_flight: Mutex<()>,
}

impl AuthSession {
    pub fn new(config: ClientConfig, store: Arc<CredentialStore>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            config,
            store,
            renew_flight: Mutex::new(()),
        })
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Authenticate the driver and store the issued token pair.
    pub async fn login(&self, cpf: &str, senha: &str) -> Result<(), AuthError> {
        let url = format!("{}login/", self.config.auth_base);
        let resp = self
            .http
            .post(&url)
            .json(&LoginRequest {
                username: cpf.to_string(),
                password: senha.to_string(),
            })
            .send()
            .await
            .map_err(|e| AuthError::network(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp
                .json::<MensagemResponse>()
                .await
                .map(|m| m.mensagem)
                .unwrap_or_else(|_| "credenciais inválidas".to_string());
            return Err(AuthError::LoginRejected { status, detail });
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::network(&url, e))?;
        let refresh = body.refresh.ok_or(AuthError::LoginRejected {
            status,
            detail: "resposta de login sem refresh token".to_string(),
        })?;
        self.store
            .set_tokens(TokenPair::new(body.access, refresh))
            .await?;
        tracing::info!("motorista autenticado");
        Ok(())
    }

    /// Drop the stored credentials.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.store.clear_tokens().await?;
        Ok(())
    }

    /// Dispatch `req` with the current access token, recovering once from an
    /// expired token.
    ///
    /// - Transport failure: returned as [`AuthError::Network`], no renewal.
    /// - 401: renew, then retry the same request once with the fresh token;
    ///   the retry's response passes through whatever its status.
    /// - Failed renewal: stored tokens are cleared, [`AuthError::SessionExpired`].
    /// - Everything else (2xx, other 4xx, 5xx) passes through unmodified.
    pub async fn authorized_request(&self, req: &ApiRequest) -> Result<Response, AuthError> {
        if req.carries_authorization() {
            return Err(AuthError::AlreadyAuthorized {
                url: req.url().to_string(),
            });
        }

        let access = self
            .store
            .access_token()
            .await
            .ok_or(AuthError::SessionExpired)?;

        let resp = self.dispatch(req, &access).await?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        tracing::warn!(url = %req.url(), "access token rejeitado (401), tentando renovar");
        if self.renew_unless_replaced(&access).await {
            let fresh = self
                .store
                .access_token()
                .await
                .ok_or(AuthError::SessionExpired)?;
            // Single retry; no recursive 401 handling.
            self.dispatch(req, &fresh).await
        } else {
            if let Err(e) = self.store.clear_tokens().await {
                tracing::warn!(error = %e, "falha ao limpar credenciais expiradas");
            }
            Err(AuthError::SessionExpired)
        }
    }

    /// Mint a new token pair from the refresh token. Returns `false` on any
    /// failure (missing refresh token, non-2xx, malformed body, transport)
    /// without mutating the stored pair.
    pub async fn renew(&self) -> bool {
        let stale = self.store.access_token().await;
        self.renew_unless_replaced(stale.as_deref().unwrap_or_default())
            .await
    }

    /// Renewal behind the single-flight mutex. `stale_access` is the token
    /// that was just rejected; if the store already holds a different one, a
    /// concurrent caller won the race and no network call is needed.
    async fn renew_unless_replaced(&self, stale_access: &str) -> bool {
        let _flight = self.renew_flight.lock().await;

        if let Some(current) = self.store.access_token().await {
            if current != stale_access {
                tracing::debug!("token já renovado por chamada concorrente");
                return true;
            }
        }

        let Some(refresh) = self.store.refresh_token().await else {
            tracing::warn!("sem refresh token, renovação impossível");
            return false;
        };

        let url = format!("{}token/refresh/", self.config.auth_base);
        // Deliberately a bare POST: the renewal endpoint must never route
        // back through authorized_request's 401 handling.
        let resp = match self
            .http
            .post(&url)
            .json(&RefreshRequest {
                refresh: refresh.clone(),
            })
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(error = %e, "falha de rede na renovação do token");
                return false;
            }
        };

        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), "renovação de token recusada");
            return false;
        }

        let body: TokenResponse = match resp.json().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "resposta de renovação malformada");
                return false;
            }
        };

        // The server only sends a new refresh token when rotation is on.
        let new_refresh = body.refresh.unwrap_or(refresh);
        if let Err(e) = self
            .store
            .set_tokens(TokenPair::new(body.access, new_refresh))
            .await
        {
            tracing::error!(error = %e, "falha ao persistir tokens renovados");
            return false;
        }
        tracing::info!("access token renovado");
        true
    }

    async fn dispatch(&self, req: &ApiRequest, access_token: &str) -> Result<Response, AuthError> {
        req.build(&self.http, access_token)
            .send()
            .await
            .map_err(|e| AuthError::network(req.url(), e))
    }
}
