use crate::client::RawResponse;
use crate::cloud::AzureEnvironment;
use crate::config::Settings;
use crate::credential::{ClientSecretCredential, TokenCredential, TokenRequest};
use crate::KeyVaultError;
use anyhow::anyhow;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Client for the Azure Resource Manager operations the sample needs.
///
/// Construction is local; the credential is first used by the first request.
pub struct ManagementClient {
    credential: Arc<dyn TokenCredential>,
    subscription_id: String,
    tenant_id: String,
    pub(crate) environment: AzureEnvironment,
    http: reqwest::Client,
}

#[derive(Deserialize, Debug)]
struct ArmErrorEnvelope {
    error: ArmErrorDetail,
}

#[derive(Deserialize, Debug)]
struct ArmErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl ManagementClient {
    pub fn new(
        credential: Arc<dyn TokenCredential>,
        subscription_id: &str,
        tenant_id: &str,
        environment: AzureEnvironment,
    ) -> Self {
        Self {
            credential,
            subscription_id: subscription_id.to_owned(),
            tenant_id: tenant_id.to_owned(),
            environment,
            http: reqwest::Client::new(),
        }
    }

    /// Service principal credentials for the management plane, taken from settings.
    pub fn from_settings(settings: &Settings, environment: AzureEnvironment) -> Result<Self, KeyVaultError> {
        let credential = ClientSecretCredential::from_settings(settings)?;
        Ok(Self::new(
            Arc::new(credential),
            settings.subscription_id()?,
            settings.tenant_id()?,
            environment,
        ))
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn environment(&self) -> &AzureEnvironment {
        &self.environment
    }

    pub(crate) fn endpoint(&self, path: &str, api_version: &str) -> Result<Url, KeyVaultError> {
        let uri = format!(
            "{}/subscriptions/{}/{}",
            self.environment.resource_manager.trim_end_matches('/'),
            self.subscription_id,
            path
        );
        Url::parse_with_params(&uri, &[("api-version", api_version)])
            .map_err(|_| KeyVaultError::malformed("management endpoint", uri))
    }

    pub(crate) async fn put_authed(&self, uri: Url, body: &Value) -> Result<RawResponse, KeyVaultError> {
        let request = TokenRequest::new(
            self.environment.authority(&self.tenant_id),
            self.environment.management_resource(),
        );
        let token = self.credential.get_token(&request).await?;

        debug!(path = uri.path(), "Sending management request");
        let resp = self
            .http
            .put(uri)
            .bearer_auth(token.secret())
            .json(body)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_success() {
            return Ok(RawResponse { status, body });
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(KeyVaultError::AuthenticationFailure(anyhow!(
                "Resource Manager rejected the access token: {}",
                body
            )));
        }
        Err(provisioning_failure(status, &body))
    }
}

fn provisioning_failure(status: StatusCode, body: &str) -> KeyVaultError {
    let (code, message) = match serde_json::from_str::<ArmErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.code, envelope.error.message),
        Err(_) => (String::new(), body.to_owned()),
    };
    KeyVaultError::ProvisioningFailure {
        status: status.as_u16(),
        code,
        message,
    }
}

impl fmt::Debug for ManagementClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementClient")
            .field("subscription_id", &self.subscription_id)
            .field("tenant_id", &self.tenant_id)
            .field("environment", &self.environment)
            .finish()
    }
}
