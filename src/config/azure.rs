//! Azure scope and authentication configuration.

use serde::{Deserialize, Serialize};

use super::ConfigError;

fn default_management_endpoint() -> String {
    "https://management.azure.com".into()
}

/// Azure subscription scope and credentials for the cleaner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AzureConfig {
    /// Subscription containing the snapshots.
    pub subscription_id: String,

    /// Resource group containing the snapshots.
    pub resource_group: String,

    /// How to authenticate against Azure Resource Manager.
    #[serde(default)]
    pub auth: AzureAuth,

    /// Management endpoint base URL. Override for sovereign clouds.
    #[serde(default = "default_management_endpoint")]
    pub management_endpoint: String,
}

impl AzureConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if self.subscription_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "azure.subscription_id must not be empty".into(),
            ));
        }
        if self.resource_group.trim().is_empty() {
            return Err(ConfigError::Validation(
                "azure.resource_group must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Azure authentication method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum AzureAuth {
    /// Managed identity (App Service / VM). System-assigned by default;
    /// set `client_id` for a user-assigned identity.
    ManagedIdentity {
        #[serde(default)]
        client_id: Option<String>,
    },
    /// Service principal with a client secret.
    AzureAd {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

impl Default for AzureAuth {
    fn default() -> Self {
        Self::ManagedIdentity { client_id: None }
    }
}
