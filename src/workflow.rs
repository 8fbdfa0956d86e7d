//! The end-to-end sample: settings, management credentials, resource group,
//! vault, propagation wait, data-plane authentication and a secret round trip.
//!
//! Every step needs the output of the one before it, so they run strictly in
//! sequence and the first failure ends the run. Nothing created is rolled back.

use crate::client::SecretClient;
use crate::cloud::AzureEnvironment;
use crate::config::Settings;
use crate::credential::{
    CallbackCredential, ClientSecretCredential, DefaultCredential, TokenCredential, TokenRequest,
};
use crate::management::ManagementClient;
use crate::names::{generate_vault_name, validate_vault_name};
use crate::readiness::Propagation;
use crate::resource_group::ResourceGroup;
use crate::secret::{validate_name, SecretProperties, SecretVersion};
use crate::vault::{VaultDescriptor, VaultResource};
use crate::KeyVaultError;
use std::fmt;
use std::sync::Arc;
use tracing::info;

pub const SAMPLE_SECRET_NAME: &str = "test-secret";
pub const SAMPLE_SECRET_VALUE: &str = "test-secret-value-using-adal";

/// How the data-plane client gets its tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthStyle {
    /// Service principal exchange run from a callback for each challenge.
    Callback,
    /// Whatever ambient identity resolves first.
    Ambient,
}

#[derive(Debug, Clone)]
pub struct WorkflowOptions {
    /// Generated when absent.
    pub vault_name: Option<String>,
    pub auth: AuthStyle,
    pub propagation: Propagation,
    pub list_secrets: bool,
    pub secret_name: String,
    pub secret_value: String,
    pub environment: AzureEnvironment,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            vault_name: None,
            auth: AuthStyle::Callback,
            propagation: Propagation::default(),
            list_secrets: false,
            secret_name: SAMPLE_SECRET_NAME.to_owned(),
            secret_value: SAMPLE_SECRET_VALUE.to_owned(),
            environment: AzureEnvironment::global(),
        }
    }
}

/// Console-facing milestones of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    CreatingResourceGroup,
    CreatingVault(String),
    Authenticating(AuthStyle),
    VaultUri(String),
    WaitingForPropagation,
    Retrieved { name: String, value: String },
    Listed(String),
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::CreatingResourceGroup => write!(f, "Creating sample resource group"),
            Progress::CreatingVault(name) => write!(f, "Creating sample Key Vault - {}", name),
            Progress::Authenticating(AuthStyle::Callback) => {
                write!(f, "Authenticating to Key Vault using ADAL callback.")
            }
            Progress::Authenticating(AuthStyle::Ambient) => {
                write!(f, "Authenticating to Key Vault using ambient credentials.")
            }
            Progress::VaultUri(uri) => write!(f, "{}", uri),
            Progress::WaitingForPropagation => write!(f, "Waiting for the Key Vault to become reachable"),
            Progress::Retrieved { name, value } => write!(f, "Retrieved \"{}\", value=\"{}\"", name, value),
            Progress::Listed(name) => write!(f, "Found enabled secret \"{}\"", name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoundTrip {
    pub resource_group: ResourceGroup,
    pub vault: VaultResource,
    pub version: SecretVersion,
    pub value: String,
    pub listed: Vec<SecretProperties>,
}

/// Runs the sample against Azure with the credentials in `settings`.
pub async fn run(
    settings: &Settings,
    options: &WorkflowOptions,
    progress: &mut dyn FnMut(Progress),
) -> Result<RoundTrip, KeyVaultError> {
    let management = ManagementClient::from_settings(settings, options.environment.clone())?;
    let data_credential: Arc<dyn TokenCredential> = match options.auth {
        AuthStyle::Callback => service_principal_callback(settings)?,
        AuthStyle::Ambient => Arc::new(DefaultCredential::new()),
    };
    run_with(&management, data_credential, settings, options, progress).await
}

/// The callback handed to the data-plane client: exchanges the configured
/// client id and secret for a token at whatever authority the vault names.
pub fn service_principal_callback(settings: &Settings) -> Result<Arc<dyn TokenCredential>, KeyVaultError> {
    let exchange = Arc::new(ClientSecretCredential::from_settings(settings)?);
    Ok(Arc::new(CallbackCredential::new(move |request: TokenRequest| {
        let exchange = exchange.clone();
        async move {
            let token = exchange.get_token(&request).await?;
            Ok(Some(token.secret().to_owned()))
        }
    })))
}

/// Runs the sample with explicit clients; `settings` supplies the resource
/// group, location and the identity the vault's access policy is granted to.
pub async fn run_with(
    management: &ManagementClient,
    data_credential: Arc<dyn TokenCredential>,
    settings: &Settings,
    options: &WorkflowOptions,
    progress: &mut dyn FnMut(Progress),
) -> Result<RoundTrip, KeyVaultError> {
    let vault_name = options.vault_name.clone().unwrap_or_else(generate_vault_name);
    validate_vault_name(&vault_name)?;
    validate_name(&options.secret_name)?;
    let descriptor = VaultDescriptor::with_full_secret_access(
        settings.location(),
        settings.tenant_uuid()?,
        settings.client_object_id()?,
    );

    progress(Progress::CreatingResourceGroup);
    let resource_group = management
        .ensure_resource_group(settings.resource_group_name(), settings.location())
        .await?;

    progress(Progress::CreatingVault(vault_name.clone()));
    let vault = management
        .create_or_update_vault(resource_group.name(), &vault_name, &descriptor)
        .await?;

    let mut client = SecretClient::new(vault.vault_uri(), data_credential)?;
    progress(Progress::WaitingForPropagation);
    options.propagation.wait(&mut client).await?;

    progress(Progress::Authenticating(options.auth));
    progress(Progress::VaultUri(vault.vault_uri().clone()));

    let version = client
        .set_secret(&options.secret_name, &options.secret_value)
        .await?;
    let secret = client.get_secret(&options.secret_name).await?;
    progress(Progress::Retrieved {
        name: options.secret_name.clone(),
        value: secret.value().clone(),
    });

    let listed = if options.list_secrets {
        let listed = client.list_secrets().collect_all().await?;
        for properties in &listed {
            progress(Progress::Listed(properties.name().clone()));
        }
        listed
    } else {
        Vec::new()
    };

    info!(vault = %vault.name(), version = %version.version(), "Secret round trip complete");
    Ok(RoundTrip {
        resource_group,
        vault,
        version,
        value: secret.value().clone(),
        listed,
    })
}
