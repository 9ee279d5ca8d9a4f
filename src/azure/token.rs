//! Bearer token acquisition for Azure Resource Manager.
//!
//! Tokens are acquired via `azure_identity` (managed identity or service
//! principal) and cached until shortly before expiry, so a cleaning pass
//! that deletes many snapshots reuses one token.

use std::sync::Arc;

use async_trait::async_trait;
use azure_core::credentials::{AccessToken, Secret, TokenCredential};
use azure_identity::{
    ClientSecretCredential, ManagedIdentityCredential, ManagedIdentityCredentialOptions,
    UserAssignedId,
};
use tokio::sync::RwLock;

use super::ArmError;
use crate::config::AzureAuth;

/// The scope required for Azure Resource Manager authentication.
pub const AZURE_MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Buffer time before token expiry to trigger refresh (5 minutes).
const TOKEN_REFRESH_BUFFER_SECS: u64 = 300;

/// Source of pre-formatted `Bearer {token}` header values.
///
/// Abstracted behind a trait so the ARM client can be exercised in tests
/// without an Azure credential.
#[async_trait]
pub trait BearerTokenSource: Send + Sync {
    async fn bearer_header(&self) -> Result<Arc<str>, ArmError>;
}

/// A cached access token with its expiration time.
#[derive(Debug, Clone)]
struct CachedToken {
    /// Pre-formatted header value: "Bearer {token}"
    bearer_header: Arc<str>,
    /// Expiration with the refresh safety margin already applied.
    expires_at: std::time::Instant,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        std::time::Instant::now() >= self.expires_at
    }
}

/// Token source backed by an `azure_identity` credential.
pub struct AzureTokenSource {
    credential: Arc<dyn TokenCredential>,
    auth_type: &'static str,
    cached_token: RwLock<Option<CachedToken>>,
}

impl std::fmt::Debug for AzureTokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureTokenSource")
            .field("type", &self.auth_type)
            .finish()
    }
}

impl AzureTokenSource {
    /// Creates a token source for a service principal with a client secret.
    pub fn from_azure_ad(
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Self, ArmError> {
        let credential = ClientSecretCredential::new(
            tenant_id,
            client_id.to_string(),
            Secret::new(client_secret.to_string()),
            None, // Use default options (Azure Public Cloud)
        )
        .map_err(|e| ArmError::Auth(format!("Failed to create client secret credential: {e}")))?;

        Ok(Self {
            credential,
            auth_type: "AzureAD",
            cached_token: RwLock::new(None),
        })
    }

    /// Creates a token source for a managed identity.
    ///
    /// For a user-assigned managed identity, pass its client id; for a
    /// system-assigned identity, pass None.
    pub fn from_managed_identity(client_id: Option<&str>) -> Result<Self, ArmError> {
        let options = client_id.map(|id| {
            tracing::info!(client_id = %id, "Using user-assigned managed identity");
            ManagedIdentityCredentialOptions {
                user_assigned_id: Some(UserAssignedId::ClientId(id.to_string())),
                ..Default::default()
            }
        });

        let credential = ManagedIdentityCredential::new(options).map_err(|e| {
            ArmError::Auth(format!("Failed to create managed identity credential: {e}"))
        })?;

        Ok(Self {
            credential,
            auth_type: "ManagedIdentity",
            cached_token: RwLock::new(None),
        })
    }

    /// Creates a token source from the Azure auth configuration.
    pub fn from_config(auth: &AzureAuth) -> Result<Self, ArmError> {
        match auth {
            AzureAuth::ManagedIdentity { client_id } => {
                Self::from_managed_identity(client_id.as_deref())
            }
            AzureAuth::AzureAd {
                tenant_id,
                client_id,
                client_secret,
            } => Self::from_azure_ad(tenant_id, client_id, client_secret),
        }
    }
}

#[async_trait]
impl BearerTokenSource for AzureTokenSource {
    /// Returns a valid `Bearer {token}` header value, refreshing the cached
    /// token when it is within the safety margin of expiring.
    async fn bearer_header(&self) -> Result<Arc<str>, ArmError> {
        // Fast path: check if we have a valid cached token
        {
            let cache = self.cached_token.read().await;
            if let Some(ref cached) = *cache
                && !cached.is_expired()
            {
                return Ok(cached.bearer_header.clone());
            }
        }

        let mut cache = self.cached_token.write().await;

        // Double-check after acquiring write lock (another task may have refreshed)
        if let Some(ref cached) = *cache
            && !cached.is_expired()
        {
            return Ok(cached.bearer_header.clone());
        }

        let scopes = &[AZURE_MANAGEMENT_SCOPE];
        let access_token: AccessToken = self
            .credential
            .get_token(scopes, None)
            .await
            .map_err(|e| ArmError::Auth(format!("Failed to get Azure token: {e}")))?;

        let now = time::OffsetDateTime::now_utc();
        let expires_in = access_token.expires_on - now;
        let expires_in_secs = expires_in.whole_seconds().max(0) as u64;
        let safety_margin = std::time::Duration::from_secs(TOKEN_REFRESH_BUFFER_SECS);
        let expires_at = std::time::Instant::now()
            + std::time::Duration::from_secs(expires_in_secs).saturating_sub(safety_margin);

        let bearer_header: Arc<str> = format!("Bearer {}", access_token.token.secret()).into();

        *cache = Some(CachedToken {
            bearer_header: bearer_header.clone(),
            expires_at,
        });

        tracing::debug!(
            auth_type = self.auth_type,
            expires_in_secs,
            "Acquired new Azure management token"
        );

        Ok(bearer_header)
    }
}
