//! Sample settings and the sources they are read from.

use crate::KeyVaultError;
use anyhow::Context;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use uuid::Uuid;

pub const CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
pub const TENANT_ID: &str = "AZURE_TENANT_ID";
pub const SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";
pub const CLIENT_OID: &str = "AZURE_CLIENT_OID";
pub const RESOURCE_GROUP: &str = "AZURE_RESOURCE_GROUP";
pub const LOCATION: &str = "AZURE_LOCATION";

pub const DEFAULT_RESOURCE_GROUP: &str = "azure-sample-group";
pub const DEFAULT_LOCATION: &str = "westus";

/// A key/value store settings can be read from.
pub trait SettingsSource {
    fn get(&self, key: &str) -> Option<String>;
}

/// The process environment, after an optional `.env` file has been loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl SettingsSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A static settings store backed by a JSON object of the same keys as the
/// environment variables.
#[derive(Debug, Default, Clone)]
pub struct SettingsFile {
    values: HashMap<String, String>,
}

impl SettingsFile {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let values = serde_json::from_str::<HashMap<String, String>>(raw)?;
        Ok(Self { values })
    }
}

impl SettingsSource for SettingsFile {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

impl SettingsSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Identity and topology parameters of the sample.
///
/// Identity fields are optional here; their absence only surfaces as
/// [`KeyVaultError::MissingCredential`] once something asks for them.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    client_id: Option<String>,
    client_secret: Option<String>,
    tenant_id: Option<String>,
    subscription_id: Option<String>,
    client_oid: Option<String>,
    resource_group_name: String,
    location: String,
}

impl Settings {
    pub fn from_source(source: &dyn SettingsSource) -> Self {
        let read = |key: &str| source.get(key).filter(|v| !v.trim().is_empty());
        Self {
            client_id: read(CLIENT_ID),
            client_secret: read(CLIENT_SECRET),
            tenant_id: read(TENANT_ID),
            subscription_id: read(SUBSCRIPTION_ID),
            client_oid: read(CLIENT_OID),
            resource_group_name: read(RESOURCE_GROUP).unwrap_or_else(|| DEFAULT_RESOURCE_GROUP.to_owned()),
            location: read(LOCATION).unwrap_or_else(|| DEFAULT_LOCATION.to_owned()),
        }
    }

    /// Reads settings from the environment, loading `.env` first if there is one.
    pub fn from_env() -> Self {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_source(&EnvSource)
    }

    pub fn client_id(&self) -> Result<&str, KeyVaultError> {
        required(&self.client_id, CLIENT_ID)
    }

    pub fn client_secret(&self) -> Result<&str, KeyVaultError> {
        required(&self.client_secret, CLIENT_SECRET)
    }

    pub fn tenant_id(&self) -> Result<&str, KeyVaultError> {
        required(&self.tenant_id, TENANT_ID)
    }

    pub fn subscription_id(&self) -> Result<&str, KeyVaultError> {
        required(&self.subscription_id, SUBSCRIPTION_ID)
    }

    pub fn client_oid(&self) -> Result<&str, KeyVaultError> {
        required(&self.client_oid, CLIENT_OID)
    }

    pub fn tenant_uuid(&self) -> Result<Uuid, KeyVaultError> {
        parse_uuid(TENANT_ID, self.tenant_id()?)
    }

    pub fn client_object_id(&self) -> Result<Uuid, KeyVaultError> {
        parse_uuid(CLIENT_OID, self.client_oid()?)
    }

    pub fn resource_group_name(&self) -> &str {
        &self.resource_group_name
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

fn required<'a>(value: &'a Option<String>, key: &'static str) -> Result<&'a str, KeyVaultError> {
    value.as_deref().ok_or(KeyVaultError::MissingCredential(key))
}

pub(crate) fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, KeyVaultError> {
    Uuid::parse_str(value.trim()).map_err(|_| KeyVaultError::malformed(field, value))
}
