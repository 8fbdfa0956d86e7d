//! Authenticate an application to Azure, provision a Key Vault through the
//! management plane and round-trip a secret through the vault's data plane.
//!
//! ```no_run
//! use azure_keyvault_auth::{workflow, Settings, WorkflowOptions};
//!
//! # async fn demo() -> Result<(), azure_keyvault_auth::KeyVaultError> {
//! let settings = Settings::from_env();
//! let round_trip = workflow::run(&settings, &WorkflowOptions::default(), &mut |p| println!("{}", p)).await?;
//! println!("{}", round_trip.value);
//! # Ok(())
//! # }
//! ```

mod challenge;
mod client;
pub mod cloud;
pub mod config;
pub mod credential;
mod management;
pub mod names;
pub mod readiness;
mod resource_group;
mod secret;
mod vault;
pub mod workflow;

pub use challenge::Challenge;
pub use client::SecretClient;
pub use cloud::AzureEnvironment;
pub use config::{EnvSource, Settings, SettingsFile, SettingsSource};
pub use credential::{
    BearerToken, CallbackCredential, ClientSecretCredential, DefaultCredential,
    EnvironmentCredential, ManagedIdentityCredential, TokenCredential, TokenRequest,
};
pub use management::ManagementClient;
pub use readiness::{PollPolicy, Propagation};
pub use resource_group::ResourceGroup;
pub use secret::{Secret, SecretPager, SecretProperties, SecretVersion};
pub use vault::{
    AccessPolicyEntry, Permissions, Sku, SkuName, VaultDescriptor, VaultProperties, VaultResource,
};
pub use workflow::{AuthStyle, Progress, RoundTrip, WorkflowOptions};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyVaultError {
    #[error("missing credential setting {0}")]
    MissingCredential(&'static str),
    #[error("malformed identifier for {field}: {value:?}")]
    MalformedIdentifier { field: &'static str, value: String },
    #[error("authentication failed")]
    AuthenticationFailure(#[source] anyhow::Error),
    #[error("provisioning failed with status {status} ({code}): {message}")]
    ProvisioningFailure {
        status: u16,
        code: String,
        message: String,
    },
    #[error("failed to retrieve access token")]
    TokenAcquisitionFailure(#[source] anyhow::Error),
    #[error("secret {0} not found")]
    SecretNotFound(String),
    #[error("secret {0} is disabled")]
    SecretDisabled(String),
    #[error("request failed")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response with status {status}: {body}")]
    UnexpectedResponse { status: u16, body: String },
}

impl KeyVaultError {
    pub(crate) fn malformed(field: &'static str, value: impl Into<String>) -> Self {
        KeyVaultError::MalformedIdentifier {
            field,
            value: value.into(),
        }
    }
}
