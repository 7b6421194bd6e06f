//! Auth store collaborator.
//!
//! The store owns the current token pair and user profile. The session
//! manager only reads tokens, writes refreshed ones, and clears everything
//! on teardown. [`FileAuthStore`] persists to a JSON file so that
//! [`AuthStore::reload`] can pick up a login made by another process.

use super::api::{TokenPair, UserProfile};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("auth store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("auth store contents are malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn is_authenticated(&self) -> bool;
    async fn tokens(&self) -> Option<TokenPair>;
    async fn user(&self) -> Option<UserProfile>;
    async fn set_tokens(&self, tokens: TokenPair) -> Result<(), StoreError>;
    async fn set_user(&self, user: UserProfile) -> Result<(), StoreError>;
    /// Re-read persisted state. Stores without persistence do nothing.
    async fn reload(&self) -> Result<(), StoreError>;
    async fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    #[serde(default)]
    pub tokens: Option<TokenPair>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl AuthState {
    fn is_authenticated(&self) -> bool {
        self.tokens
            .as_ref()
            .is_some_and(|tokens| !tokens.token.is_empty())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAuthStore {
    state: RwLock<AuthState>,
}

impl InMemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            state: RwLock::new(AuthState {
                tokens: Some(tokens),
                user: None,
            }),
        }
    }
}

#[async_trait]
impl AuthStore for InMemoryAuthStore {
    async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    async fn tokens(&self) -> Option<TokenPair> {
        self.state.read().await.tokens.clone()
    }

    async fn user(&self) -> Option<UserProfile> {
        self.state.read().await.user.clone()
    }

    async fn set_tokens(&self, tokens: TokenPair) -> Result<(), StoreError> {
        self.state.write().await.tokens = Some(tokens);
        Ok(())
    }

    async fn set_user(&self, user: UserProfile) -> Result<(), StoreError> {
        self.state.write().await.user = Some(user);
        Ok(())
    }

    async fn reload(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.state.write().await = AuthState::default();
        Ok(())
    }
}

/// JSON-file backed store. Writes go to a sibling temp file first and are
/// renamed into place.
#[derive(Debug)]
pub struct FileAuthStore {
    path: PathBuf,
    state: RwLock<AuthState>,
}

impl FileAuthStore {
    /// Open the store at `path`, loading whatever is already there.
    /// A missing file is an empty, unauthenticated store.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            state: RwLock::new(AuthState::default()),
        };
        store.reload().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_state(&self) -> Result<AuthState, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(AuthState::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AuthState::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, state: &AuthState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthStore for FileAuthStore {
    async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    async fn tokens(&self) -> Option<TokenPair> {
        self.state.read().await.tokens.clone()
    }

    async fn user(&self) -> Option<UserProfile> {
        self.state.read().await.user.clone()
    }

    async fn set_tokens(&self, tokens: TokenPair) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.tokens = Some(tokens);
        self.persist(&state).await
    }

    async fn set_user(&self, user: UserProfile) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.user = Some(user);
        self.persist(&state).await
    }

    async fn reload(&self) -> Result<(), StoreError> {
        let fresh = self.read_state().await?;
        *self.state.write().await = fresh;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.state.write().await = AuthState::default();
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
