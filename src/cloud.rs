//! Endpoints of the Azure cloud the sample talks to.

const PUBLIC_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const PUBLIC_RESOURCE_MANAGER: &str = "https://management.azure.com";
const PUBLIC_KEYVAULT_RESOURCE: &str = "https://vault.azure.net";
const PUBLIC_ENDPOINT_SUFFIX: &str = "vault.azure.net";

#[derive(Debug, Clone, PartialEq)]
pub struct AzureEnvironment {
    pub authority_host: String,
    pub resource_manager: String,
    pub keyvault_resource: String,
    pub keyvault_dns_suffix: String,
}

impl AzureEnvironment {
    /// The Azure public cloud.
    pub fn global() -> Self {
        Self {
            authority_host: PUBLIC_AUTHORITY_HOST.to_owned(),
            resource_manager: PUBLIC_RESOURCE_MANAGER.to_owned(),
            keyvault_resource: PUBLIC_KEYVAULT_RESOURCE.to_owned(),
            keyvault_dns_suffix: PUBLIC_ENDPOINT_SUFFIX.to_owned(),
        }
    }

    /// Authority URL for a tenant, e.g. `https://login.microsoftonline.com/{tenant}`.
    pub fn authority(&self, tenant_id: &str) -> String {
        format!("{}/{}", self.authority_host.trim_end_matches('/'), tenant_id)
    }

    /// Resource identifier tokens for the management plane are requested for.
    pub fn management_resource(&self) -> String {
        format!("{}/", self.resource_manager.trim_end_matches('/'))
    }

    /// Vault URI for a vault name in this cloud.
    pub fn vault_uri(&self, vault_name: &str) -> String {
        format!("https://{}.{}/", vault_name, self.keyvault_dns_suffix)
    }
}

impl Default for AzureEnvironment {
    fn default() -> Self {
        Self::global()
    }
}
