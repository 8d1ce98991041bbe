// crates/client/src/store.rs
//! Durable credential store: token pair + active manifest key.
//!
//! Mirrors what the PWA kept in localStorage (`accessToken`, `refreshToken`,
//! `manifesto_ativo`), persisted as one JSON file under the platform config
//! dir so an in-flight manifest survives a restart.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use manifesto_types::TokenPair;

use crate::error::StoreError;

/// Store file: `<config_dir>/manifesto/credentials.json`.
pub fn default_store_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("manifesto").join("credentials.json"))
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredState {
    tokens: Option<TokenPair>,
    /// Manifest number with an enrichment job in flight, if any.
    manifesto_ativo: Option<String>,
    saved_at: Option<DateTime<Utc>>,
}

/// In-memory credential state with write-through JSON persistence.
///
/// Reads are lock-cheap snapshots; the only writer paths are login, renewal
/// and logout, so a single `RwLock` is plenty.
pub struct CredentialStore {
    path: PathBuf,
    state: RwLock<StoredState>,
}

impl CredentialStore {
    /// Open the store at `path`, loading existing state if present.
    /// A malformed file is logged and treated as empty rather than fatal —
    /// the worst case is the driver logging in again.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<StoredState>(&bytes) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "credential store corrupted, starting empty");
                    StoredState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredState::default(),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Open the store at the default platform location.
    pub fn open_default() -> Result<Self, StoreError> {
        let path = default_store_path().ok_or(StoreError::NoConfigDir)?;
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the access token current right now.
    pub async fn access_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .tokens
            .as_ref()
            .map(|t| t.access.clone())
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.state
            .read()
            .await
            .tokens
            .as_ref()
            .map(|t| t.refresh.clone())
    }

    pub async fn has_tokens(&self) -> bool {
        self.state.read().await.tokens.is_some()
    }

    /// Atomically replace the current token pair and persist.
    pub async fn set_tokens(&self, tokens: TokenPair) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.tokens = Some(tokens);
        state.saved_at = Some(Utc::now());
        self.persist(&state)
    }

    /// Drop both tokens (logout or irrecoverable renewal failure). The active
    /// manifest key is kept — it belongs to the driver, not to the session.
    pub async fn clear_tokens(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.tokens = None;
        state.saved_at = Some(Utc::now());
        self.persist(&state)
    }

    pub async fn manifesto_ativo(&self) -> Option<String> {
        self.state.read().await.manifesto_ativo.clone()
    }

    pub async fn set_manifesto_ativo(&self, numero: impl Into<String>) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.manifesto_ativo = Some(numero.into());
        self.persist(&state)
    }

    pub async fn clear_manifesto_ativo(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.manifesto_ativo = None;
        self.persist(&state)
    }

    /// Write-through: serialize to a sibling temp file, then rename over the
    /// store so a crash mid-write never leaves a truncated file.
    fn persist(&self, state: &StoredState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(state).unwrap_or_default();
        std::fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| StoreError::io(&self.path, e))
    }
}
