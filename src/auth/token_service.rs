//! Token acquisition and refresh.
//!
//! Every successful call overwrites the Credential Store in one write;
//! every terminal failure clears it. The only state held here is an
//! in-memory copy of the current access token, which is never trusted
//! over the store.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Mutex as AsyncMutex;

use super::central_api::{AuthorityClient, TokenResponse};
use super::credentials::{preview, Credentials, UserProfile};
use crate::error::{SyncError, SyncResult};
use crate::traits::CredentialStore;

/// Acquires, refreshes, and persists credentials.
pub struct TokenService {
    authority: Arc<AuthorityClient>,
    store: Arc<dyn CredentialStore>,
    cached: Mutex<Option<String>>,
    /// Serializes refreshes inside this process.
    refresh_lock: AsyncMutex<()>,
}

impl TokenService {
    pub fn new(authority: Arc<AuthorityClient>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            authority,
            store,
            cached: Mutex::new(None),
            refresh_lock: AsyncMutex::new(()),
        }
    }

    fn cache(&self) -> MutexGuard<'_, Option<String>> {
        self.cached
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Exchange an identity assertion for a credential pair and persist it.
    ///
    /// Nothing is written when the exchange fails.
    pub async fn authenticate(&self, assertion: &str) -> SyncResult<Credentials> {
        tracing::info!("Exchanging identity assertion for credentials");
        let TokenResponse {
            access_token,
            refresh_token,
            user,
        } = self.authority.exchange_identity(assertion).await?;

        let creds = Credentials::new(access_token, refresh_token);
        self.install(&creds, user.as_ref()).await?;
        tracing::info!("Authenticated ({})", creds.token_preview());
        Ok(creds)
    }

    /// Persist a credential record (and optional profile) as the current one.
    ///
    /// Shared by `authenticate` and accepted external offers.
    pub async fn install(
        &self,
        creds: &Credentials,
        profile: Option<&UserProfile>,
    ) -> SyncResult<()> {
        self.store.save(creds).await?;
        self.adopt(creds);
        if let Some(profile) = profile {
            // A profile write failure never fails sign-in
            if let Err(e) = self.store.save_profile(profile).await {
                tracing::warn!("Failed to store user profile: {}", e);
            }
        }
        Ok(())
    }

    /// Exchange the refresh token of `current` for a new pair.
    ///
    /// Keeps the prior refresh token when the authority omits one. A denied
    /// refresh, or a record with no refresh token, clears the store.
    pub async fn refresh(&self, current: &Credentials) -> SyncResult<Credentials> {
        let Some(refresh_token) = current.refresh_token.clone() else {
            tracing::warn!("No refresh token available, clearing credentials");
            self.clear().await?;
            return Err(SyncError::RefreshDenied("no refresh token".to_string()));
        };

        tracing::info!("Refreshing access token ({})", current.token_preview());
        match self.authority.refresh(&refresh_token).await {
            Ok(response) => {
                let creds = Credentials {
                    access_token: Some(response.access_token),
                    refresh_token: response.refresh_token.or(Some(refresh_token)),
                };
                self.store.save(&creds).await?;
                self.adopt(&creds);
                tracing::info!("Token refreshed ({})", creds.token_preview());
                Ok(creds)
            }
            Err(SyncError::RefreshDenied(reason)) => {
                tracing::error!("Refresh denied: {}", reason);
                self.clear().await?;
                Err(SyncError::RefreshDenied(reason))
            }
            Err(e) => {
                tracing::warn!("Refresh failed, keeping credentials: {}", e);
                Err(e)
            }
        }
    }

    /// Recover from a rejection of `rejected`.
    ///
    /// Single-flight within this process. If the store already holds a
    /// different access token, another caller or context has refreshed and
    /// that record is adopted without spending the refresh token again.
    pub async fn refresh_rejected(&self, rejected: &str) -> SyncResult<Credentials> {
        let _guard = self.refresh_lock.lock().await;

        let stored = self.store.load().await?;
        if let Some(token) = stored.access_token.as_deref() {
            if token != rejected {
                tracing::info!(
                    "Adopting token refreshed elsewhere ({} replaced {})",
                    preview(token),
                    preview(rejected)
                );
                self.adopt(&stored);
                return Ok(stored);
            }
        }

        self.refresh(&stored).await
    }

    /// Remove both tokens from the store and drop the cached copy.
    pub async fn clear(&self) -> SyncResult<()> {
        self.drop_cache();
        self.store.clear().await?;
        Ok(())
    }

    /// Update the in-memory copy from a record observed in the store.
    pub fn adopt(&self, creds: &Credentials) {
        *self.cache() = creds.access_token.clone();
    }

    /// The last access token this process saw.
    pub fn cached_token(&self) -> Option<String> {
        self.cache().clone()
    }

    pub fn drop_cache(&self) {
        self.cache().take();
    }
}
