use crate::management::ManagementClient;
use crate::KeyVaultError;
use getset::Getters;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

const API_VERSION: &str = "2019-10-01";

#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct ResourceGroup {
    id: String,
    name: String,
    location: String,
    provisioning_state: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ResourceGroupResponse {
    id: String,
    name: String,
    location: String,
    #[serde(default)]
    properties: Option<ResourceGroupResponseProperties>,
}

#[derive(Deserialize, Debug)]
struct ResourceGroupResponseProperties {
    #[serde(rename = "provisioningState")]
    provisioning_state: Option<String>,
}

impl ManagementClient {
    /// Creates the resource group, or updates it in place if it already
    /// exists. Repeating the call with the same arguments changes nothing.
    pub async fn ensure_resource_group(&self, name: &str, location: &str) -> Result<ResourceGroup, KeyVaultError> {
        let uri = self.endpoint(&format!("resourcegroups/{}", name), API_VERSION)?;
        let resp = self.put_authed(uri, &json!({ "location": location })).await?;
        let group = serde_json::from_str::<ResourceGroupResponse>(&resp.body).map_err(|_| {
            KeyVaultError::UnexpectedResponse {
                status: resp.status.as_u16(),
                body: resp.body.clone(),
            }
        })?;
        info!(resource_group = %group.name, location = %group.location, "Resource group ready");
        Ok(ResourceGroup {
            id: group.id,
            name: group.name,
            location: group.location,
            provisioning_state: group.properties.and_then(|p| p.provisioning_state),
        })
    }
}
