//! Ways of producing a bearer token for a target resource.
//!
//! Both the management plane and the vault data plane only ever ask a
//! [`TokenCredential`] for a token; which identity answers is up to the
//! implementation handed to the client.

use crate::config::{EnvSource, Settings, SettingsSource};
use crate::KeyVaultError;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use azure_sdk_auth_aad::authorize_non_interactive;
use chrono::{DateTime, TimeZone, Utc};
use getset::Getters;
use oauth2::{AccessToken, ClientId, ClientSecret};
use serde::Deserialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const IMDS_TIMEOUT: Duration = Duration::from_secs(5);

/// Hosts `authorize_non_interactive` exchanges against.
const PUBLIC_AUTHORITY_HOSTS: &[&str] = &["login.microsoftonline.com", "login.windows.net"];

/// What a token is being asked for: the authority that issues it and the
/// resource it must be scoped to.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRequest {
    pub authority: String,
    pub resource: String,
    pub scope: Option<String>,
}

impl TokenRequest {
    pub fn new(authority: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            resource: resource.into(),
            scope: None,
        }
    }

    /// Last path segment of the authority, which names the tenant.
    pub fn tenant(&self) -> Option<String> {
        Url::parse(&self.authority)
            .ok()?
            .path_segments()?
            .filter(|s| !s.is_empty())
            .last()
            .map(str::to_owned)
    }
}

#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct BearerToken {
    access_token: AccessToken,
    expires_on: Option<DateTime<Utc>>,
}

impl BearerToken {
    pub fn new(token: impl Into<String>, expires_on: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: AccessToken::new(token.into()),
            expires_on,
        }
    }

    pub fn secret(&self) -> &str {
        self.access_token.secret()
    }
}

#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, request: &TokenRequest) -> Result<BearerToken, KeyVaultError>;
}

/// Service principal credential: exchanges a client id and secret for a
/// token with Azure Active Directory.
#[derive(Debug, Clone)]
pub struct ClientSecretCredential {
    client_id: ClientId,
    client_secret: ClientSecret,
    tenant_id: String,
    http: Arc<reqwest::Client>,
}

impl ClientSecretCredential {
    pub fn new(client_id: &str, client_secret: &str, tenant_id: &str) -> Self {
        Self {
            client_id: ClientId::new(client_id.to_owned()),
            client_secret: ClientSecret::new(client_secret.to_owned()),
            tenant_id: tenant_id.to_owned(),
            http: Arc::new(reqwest::Client::new()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, KeyVaultError> {
        Ok(Self::new(
            settings.client_id()?,
            settings.client_secret()?,
            settings.tenant_id()?,
        ))
    }
}

impl ClientSecretCredential {
    /// Client credentials grant against an authority outside the public
    /// cloud, e.g. a sovereign cloud or a local test server.
    async fn exchange_at(&self, token_endpoint: Url, resource: &str) -> Result<BearerToken, KeyVaultError> {
        let resp = self
            .http
            .post(token_endpoint.clone())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.secret().as_str()),
                ("resource", resource),
            ])
            .send()
            .await
            .with_context(|| format!("Token endpoint {} is unreachable", token_endpoint))
            .map_err(KeyVaultError::AuthenticationFailure)?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(KeyVaultError::AuthenticationFailure(anyhow!(
                "Token endpoint returned {}: {}",
                status,
                body
            )));
        }

        let token = serde_json::from_str::<TokenResponse>(&body)
            .context("Malformed token response")
            .map_err(KeyVaultError::AuthenticationFailure)?;
        let expires_on = token.expires_on.as_ref().and_then(epoch_seconds);
        Ok(BearerToken::new(token.access_token, expires_on))
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, request: &TokenRequest) -> Result<BearerToken, KeyVaultError> {
        let authority = Url::parse(&request.authority)
            .map_err(|_| KeyVaultError::malformed("authority", request.authority.as_str()))?;
        let tenant = request
            .tenant()
            .filter(|t| t != "common")
            .unwrap_or_else(|| self.tenant_id.clone());
        debug!(%tenant, authority = %request.authority, resource = %request.resource, "Acquiring token with client credentials");

        let public = authority
            .host_str()
            .map_or(false, |host| PUBLIC_AUTHORITY_HOSTS.contains(&host));
        if !public {
            let token_endpoint = authority
                .join(&format!("/{}/oauth2/token", tenant))
                .map_err(|_| KeyVaultError::malformed("authority", request.authority.as_str()))?;
            return self.exchange_at(token_endpoint, &request.resource).await;
        }

        let token = authorize_non_interactive(
            self.http.clone(),
            &self.client_id,
            &self.client_secret,
            &request.resource,
            &tenant,
        )
        .await
        .with_context(|| "Failed to authenticate to Azure Active Directory")
        .map_err(KeyVaultError::AuthenticationFailure)?;
        Ok(BearerToken {
            access_token: token.access_token().clone(),
            expires_on: Some(token.expires_on),
        })
    }
}

/// Hands token acquisition to a caller-supplied async callback. A callback
/// answering `None` means no token could be produced.
///
/// ```
/// use azure_keyvault_auth::CallbackCredential;
///
/// let credential = CallbackCredential::new(|_request| async { Ok(Some("token".to_owned())) });
/// ```
pub struct CallbackCredential<F> {
    callback: F,
}

impl<F, Fut> CallbackCredential<F>
where
    F: Fn(TokenRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<String>, KeyVaultError>> + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> fmt::Debug for CallbackCredential<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackCredential").finish()
    }
}

#[async_trait]
impl<F, Fut> TokenCredential for CallbackCredential<F>
where
    F: Fn(TokenRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<String>, KeyVaultError>> + Send,
{
    async fn get_token(&self, request: &TokenRequest) -> Result<BearerToken, KeyVaultError> {
        match (self.callback)(request.clone()).await? {
            Some(token) => Ok(BearerToken::new(token, None)),
            None => Err(KeyVaultError::TokenAcquisitionFailure(anyhow!(
                "Failed to retrieve access token for {}",
                request.resource
            ))),
        }
    }
}

/// Client secret credential read from `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`
/// and `AZURE_TENANT_ID` each time a token is requested.
pub struct EnvironmentCredential {
    source: Box<dyn SettingsSource + Send + Sync>,
}

impl EnvironmentCredential {
    pub fn new() -> Self {
        Self::with_source(EnvSource)
    }

    pub fn with_source(source: impl SettingsSource + Send + Sync + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }
}

impl Default for EnvironmentCredential {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnvironmentCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentCredential").finish()
    }
}

#[async_trait]
impl TokenCredential for EnvironmentCredential {
    async fn get_token(&self, request: &TokenRequest) -> Result<BearerToken, KeyVaultError> {
        let settings = Settings::from_source(self.source.as_ref());
        ClientSecretCredential::from_settings(&settings)?
            .get_token(request)
            .await
    }
}

#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: Option<serde_json::Value>,
}

/// Token from the instance metadata service of an Azure host.
#[derive(Debug, Clone)]
pub struct ManagedIdentityCredential {
    endpoint: String,
    client_id: Option<String>,
    http: reqwest::Client,
}

impl ManagedIdentityCredential {
    pub fn new() -> Self {
        Self::with_endpoint(IMDS_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client_id: None,
            http: reqwest::Client::new(),
        }
    }

    /// Selects a user-assigned identity.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

impl Default for ManagedIdentityCredential {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    async fn get_token(&self, request: &TokenRequest) -> Result<BearerToken, KeyVaultError> {
        let mut params = vec![
            ("api-version", IMDS_API_VERSION),
            ("resource", request.resource.as_str()),
        ];
        if let Some(client_id) = &self.client_id {
            params.push(("client_id", client_id.as_str()));
        }
        let uri = Url::parse_with_params(&self.endpoint, &params)
            .map_err(|_| KeyVaultError::malformed("managed identity endpoint", self.endpoint.as_str()))?;

        let resp = self
            .http
            .get(uri)
            .header("Metadata", "true")
            .timeout(IMDS_TIMEOUT)
            .send()
            .await
            .context("Managed identity endpoint is unreachable")
            .map_err(KeyVaultError::TokenAcquisitionFailure)?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(KeyVaultError::TokenAcquisitionFailure(anyhow!(
                "Managed identity endpoint returned {}: {}",
                status,
                body
            )));
        }

        let token = serde_json::from_str::<TokenResponse>(&body)
            .context("Malformed managed identity token response")
            .map_err(KeyVaultError::TokenAcquisitionFailure)?;
        let expires_on = token.expires_on.as_ref().and_then(epoch_seconds);
        Ok(BearerToken::new(token.access_token, expires_on))
    }
}

fn epoch_seconds(value: &serde_json::Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        serde_json::Value::Number(n) => n.as_i64()?,
        serde_json::Value::String(s) => s.parse().ok()?,
        _ => return None,
    };
    Utc.timestamp_opt(secs, 0).single()
}

/// Ambient credential resolution: each credential is tried in order and the
/// first token produced wins.
pub struct DefaultCredential {
    sources: Vec<(&'static str, Arc<dyn TokenCredential>)>,
}

impl DefaultCredential {
    /// Environment service principal first, then managed identity.
    pub fn new() -> Self {
        Self::empty()
            .with_source("environment", Arc::new(EnvironmentCredential::new()))
            .with_source("managed identity", Arc::new(ManagedIdentityCredential::new()))
    }

    pub fn empty() -> Self {
        Self { sources: Vec::new() }
    }

    pub fn with_source(mut self, name: &'static str, credential: Arc<dyn TokenCredential>) -> Self {
        self.sources.push((name, credential));
        self
    }
}

impl Default for DefaultCredential {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.sources.iter().map(|(name, _)| *name).collect();
        f.debug_struct("DefaultCredential").field("sources", &names).finish()
    }
}

#[async_trait]
impl TokenCredential for DefaultCredential {
    async fn get_token(&self, request: &TokenRequest) -> Result<BearerToken, KeyVaultError> {
        let mut failures = Vec::new();
        for (name, credential) in &self.sources {
            match credential.get_token(request).await {
                Ok(token) => {
                    debug!(credential = %name, "Acquired token");
                    return Ok(token);
                }
                Err(e) => {
                    warn!(credential = %name, error = %e, "Credential could not acquire a token");
                    failures.push(format!("{}: {}", name, e));
                }
            }
        }
        Err(KeyVaultError::TokenAcquisitionFailure(anyhow!(
            "No credential could acquire a token for {} ({})",
            request.resource,
            failures.join("; ")
        )))
    }
}
