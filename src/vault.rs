use crate::management::ManagementClient;
use crate::names::validate_vault_name;
use crate::KeyVaultError;
use getset::Getters;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

const API_VERSION: &str = "2019-09-01";

/// Secret permission granting every secret operation.
pub const ALL_SECRET_PERMISSIONS: &str = "all";

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SkuName {
    Standard,
    Premium,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Sku {
    pub family: String,
    pub name: SkuName,
}

impl Sku {
    pub fn standard() -> Self {
        Self {
            family: "A".to_owned(),
            name: SkuName::Standard,
        }
    }
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct Permissions {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<String>,
}

impl Permissions {
    pub fn all_secrets() -> Self {
        Self {
            secrets: vec![ALL_SECRET_PERMISSIONS.to_owned()],
            ..Self::default()
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicyEntry {
    pub tenant_id: Uuid,
    pub object_id: Uuid,
    pub permissions: Permissions,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VaultProperties {
    pub tenant_id: Uuid,
    pub sku: Sku,
    pub access_policies: Vec<AccessPolicyEntry>,
}

/// Parameters of a vault create-or-update call.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VaultDescriptor {
    pub location: String,
    pub properties: VaultProperties,
}

impl VaultDescriptor {
    /// A standard-tier vault with a single access policy granting `object_id`
    /// every secret permission.
    pub fn with_full_secret_access(location: &str, tenant_id: Uuid, object_id: Uuid) -> Self {
        Self {
            location: location.to_owned(),
            properties: VaultProperties {
                tenant_id,
                sku: Sku::standard(),
                access_policies: vec![AccessPolicyEntry {
                    tenant_id,
                    object_id,
                    permissions: Permissions::all_secrets(),
                }],
            },
        }
    }
}

/// A provisioned vault. Its URI may not resolve until DNS has propagated.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct VaultResource {
    id: String,
    name: String,
    location: String,
    vault_uri: String,
    provisioning_state: Option<String>,
}

#[derive(Deserialize, Debug)]
struct VaultResponse {
    id: String,
    name: String,
    location: String,
    properties: VaultResponseProperties,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct VaultResponseProperties {
    #[serde(default)]
    vault_uri: Option<String>,
    #[serde(default)]
    provisioning_state: Option<String>,
}

impl ManagementClient {
    /// Creates or updates `vault_name` in `resource_group`.
    ///
    /// Fails with `ProvisioningFailure` when the name is taken anywhere in the
    /// cloud or the request is rejected by quota or policy.
    pub async fn create_or_update_vault(
        &self,
        resource_group: &str,
        vault_name: &str,
        descriptor: &VaultDescriptor,
    ) -> Result<VaultResource, KeyVaultError> {
        validate_vault_name(vault_name)?;
        let uri = self.endpoint(
            &format!(
                "resourceGroups/{}/providers/Microsoft.KeyVault/vaults/{}",
                resource_group, vault_name
            ),
            API_VERSION,
        )?;
        let body = serde_json::to_value(descriptor).map_err(|e| KeyVaultError::malformed("vault descriptor", e.to_string()))?;
        let resp = self.put_authed(uri, &body).await?;
        let vault = serde_json::from_str::<VaultResponse>(&resp.body).map_err(|_| {
            KeyVaultError::UnexpectedResponse {
                status: resp.status.as_u16(),
                body: resp.body.clone(),
            }
        })?;

        let vault_uri = match vault.properties.vault_uri {
            Some(uri) => uri,
            None => self.environment.vault_uri(&vault.name),
        };
        info!(vault = %vault.name, %vault_uri, "Vault created");
        Ok(VaultResource {
            id: vault.id,
            name: vault.name,
            location: vault.location,
            vault_uri,
            provisioning_state: vault.properties.provisioning_state,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_secret_access_descriptor_serializes_to_arm_shape() {
        let tenant = Uuid::parse_str("bc598e67-03d8-44d5-aa46-8289b9a39a14").unwrap();
        let object = Uuid::parse_str("c1a6d79b-082b-4798-b362-a77e96de50db").unwrap();
        let descriptor = VaultDescriptor::with_full_secret_access("westus", tenant, object);

        assert_eq!(descriptor.properties.access_policies.len(), 1);
        assert_eq!(
            serde_json::to_value(&descriptor).unwrap(),
            json!({
                "location": "westus",
                "properties": {
                    "tenantId": "bc598e67-03d8-44d5-aa46-8289b9a39a14",
                    "sku": { "family": "A", "name": "standard" },
                    "accessPolicies": [{
                        "tenantId": "bc598e67-03d8-44d5-aa46-8289b9a39a14",
                        "objectId": "c1a6d79b-082b-4798-b362-a77e96de50db",
                        "permissions": { "secrets": ["all"] }
                    }]
                }
            })
        );
    }
}
