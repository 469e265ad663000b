use crate::error::AccessError;
use crate::identity::resolve_identity;
use crate::model::Identity;
use crate::session::{ClusterSession, Connect};
use serde::Serialize;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Durable home of the session token (the raw kubeconfig).
pub trait TokenStore: Send + Sync {
    fn load(&self) -> impl Future<Output = io::Result<Option<String>>> + Send;
    fn save(&self, token: &str) -> impl Future<Output = io::Result<()>> + Send;
    fn clear(&self) -> impl Future<Output = io::Result<()>> + Send;
}

#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl AsRef<Path>, entry: &str) -> Self {
        Self {
            path: dir.as_ref().join(entry),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    async fn load(&self) -> io::Result<Option<String>> {
        match fs::read_to_string(&self.path).await {
            Ok(token) if token.trim().is_empty() => Ok(None),
            Ok(token) => Ok(Some(token)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        write_private(&self.path, token).await
    }

    async fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path).await {
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            result => result,
        }
    }
}

#[cfg(unix)]
async fn write_private(path: &Path, contents: &str) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    // mode() only applies on creation
    file.set_permissions(std::fs::Permissions::from_mode(0o600))
        .await?;
    file.write_all(contents.as_bytes()).await?;
    file.flush().await
}

#[cfg(not(unix))]
async fn write_private(path: &Path, contents: &str) -> io::Result<()> {
    fs::write(path, contents).await
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize)]
pub enum AuthState {
    LoggedOut,
    Authenticating,
    LoggedIn,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Kubeconfig is required")]
    MissingCredential,
    #[error("not logged in")]
    NotLoggedIn,
    #[error("session rejected by the cluster (HTTP {0})")]
    Rejected(u16),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("session store: {0}")]
    Store(#[from] io::Error),
}

/// Login/logout lifecycle over a [`ClusterSession`] and a [`TokenStore`].
pub struct AuthProvider<C: Connect, S: TokenStore> {
    session: Arc<ClusterSession<C>>,
    store: S,
    state: RwLock<AuthState>,
}

impl<C: Connect, S: TokenStore> AuthProvider<C, S> {
    pub fn new(session: Arc<ClusterSession<C>>, store: S) -> Self {
        Self {
            session,
            store,
            state: RwLock::new(AuthState::LoggedOut),
        }
    }

    pub async fn state(&self) -> AuthState {
        *self.state.read().await
    }

    async fn set_state(&self, next: AuthState) {
        let mut state = self.state.write().await;
        if *state != next {
            debug!(from = ?*state, to = ?next, "auth state");
            *state = next;
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn login(&self, credential: &str) -> Result<(), AuthError> {
        if credential.trim().is_empty() {
            return Err(AuthError::MissingCredential);
        }

        self.set_state(AuthState::Authenticating).await;
        if let Err(error) = self.session.initialize(credential).await {
            warn!(%error, "login failed");
            self.set_state(AuthState::LoggedOut).await;
            return Err(error.into());
        }
        if let Err(error) = self.store.save(credential).await {
            self.set_state(AuthState::LoggedOut).await;
            return Err(error.into());
        }

        self.set_state(AuthState::LoggedIn).await;
        info!("logged in");
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), AuthError> {
        let cleared = self.store.clear().await;
        self.set_state(AuthState::LoggedOut).await;
        info!("logged out");
        cleared.map_err(AuthError::from)
    }

    /// Re-initializes the cluster client from the persisted token. Without a
    /// token this rejects without any cluster call.
    #[tracing::instrument(skip_all)]
    pub async fn check_auth(&self) -> Result<(), AuthError> {
        let token = match self.store.load().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.set_state(AuthState::LoggedOut).await;
                return Err(AuthError::NotLoggedIn);
            }
            Err(error) => {
                warn!(%error, "stored session is unreadable");
                self.set_state(AuthState::LoggedOut).await;
                return Err(error.into());
            }
        };

        if let Err(error) = self.session.initialize(&token).await {
            warn!(%error, "stored session is no longer usable");
            self.forget_token().await;
            self.set_state(AuthState::LoggedOut).await;
            return Err(error.into());
        }

        self.set_state(AuthState::LoggedIn).await;
        Ok(())
    }

    /// 401 and 403 end the session; any other status is left to the caller.
    pub async fn check_error(&self, status: Option<u16>) -> Result<(), AuthError> {
        match status {
            Some(status @ (401 | 403)) => {
                warn!(status, "cluster rejected credentials, logging out");
                self.forget_token().await;
                self.set_state(AuthState::LoggedOut).await;
                Err(AuthError::Rejected(status))
            }
            _ => Ok(()),
        }
    }

    pub async fn get_identity(&self) -> Result<Identity, AuthError> {
        let token = self.store.load().await?.ok_or(AuthError::NotLoggedIn)?;
        Ok(resolve_identity(&token))
    }

    pub fn get_permissions(&self) -> Vec<String> {
        vec!["admin".to_string()]
    }

    async fn forget_token(&self) {
        if let Err(error) = self.store.clear().await {
            warn!(%error, "failed to clear stored session");
        }
    }
}
