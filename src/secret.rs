use crate::client::{RawResponse, SecretClient};
use crate::KeyVaultError;
use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use getset::Getters;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use tracing::{debug, info};

const DEFAULT_PAGE_SIZE: usize = 25;
const MAX_SECRET_NAME_LEN: usize = 127;

/// A version of a secret created by `set_secret`.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct SecretVersion {
    id: String,
    name: String,
    version: String,
}

#[derive(Debug, Clone, Getters)]
#[getset(get = "pub")]
pub struct Secret {
    id: String,
    name: String,
    version: String,
    value: String,
    enabled: bool,
    managed: bool,
    time_created: DateTime<Utc>,
    time_updated: DateTime<Utc>,
}

/// Secret metadata as returned by a listing; never carries a value.
#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct SecretProperties {
    id: String,
    name: String,
    enabled: bool,
    managed: bool,
}

#[derive(Deserialize, Debug)]
pub(crate) struct KeyVaultSecretBundle {
    value: String,
    id: String,
    #[serde(default)]
    managed: bool,
    attributes: KeyVaultSecretBundleAttributes,
}

#[derive(Deserialize, Debug)]
pub(crate) struct KeyVaultSecretBundleAttributes {
    enabled: bool,
    #[serde(with = "ts_seconds")]
    created: DateTime<Utc>,
    #[serde(with = "ts_seconds")]
    updated: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct KeyVaultSecretItem {
    id: String,
    #[serde(default)]
    managed: bool,
    #[serde(default)]
    attributes: Option<KeyVaultSecretItemAttributes>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct KeyVaultSecretItemAttributes {
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Deserialize, Debug)]
pub(crate) struct KeyVaultGetSecretsResponse {
    value: Vec<KeyVaultSecretItem>,
    #[serde(rename = "nextLink", default)]
    next_link: Option<String>,
}

#[derive(Deserialize, Debug)]
struct KeyVaultErrorEnvelope {
    error: KeyVaultErrorDetail,
}

#[derive(Deserialize, Debug)]
struct KeyVaultErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    innererror: Option<Box<KeyVaultErrorDetail>>,
}

impl KeyVaultErrorDetail {
    fn is_disabled(&self) -> bool {
        self.code.as_deref() == Some("SecretDisabled")
            || self
                .message
                .as_deref()
                .map_or(false, |m| m.contains("disabled secret"))
            || self.innererror.as_ref().map_or(false, |inner| inner.is_disabled())
    }
}

impl SecretClient {
    /// Sets a secret in the Key Vault, creating a new version of it.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn demo(client: &mut azure_keyvault_auth::SecretClient) -> Result<(), azure_keyvault_auth::KeyVaultError> {
    /// let version = client.set_secret("test-secret", "test-secret-value-using-adal").await?;
    /// println!("{}", version.version());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn set_secret(&mut self, secret_name: &str, new_secret_value: &str) -> Result<SecretVersion, KeyVaultError> {
        validate_name(secret_name)?;
        let uri = self.endpoint(&format!("secrets/{}", secret_name), &[])?;

        let mut request_body = Map::new();
        request_body.insert("value".to_owned(), Value::String(new_secret_value.to_owned()));

        let resp = self
            .put_authed(uri, Value::Object(request_body).to_string())
            .await?;
        let bundle = parse_secret_response(secret_name, resp)?;
        let (name, version) = split_secret_id(&bundle.id);
        info!(secret = %name, %version, "Set secret");
        Ok(SecretVersion {
            id: bundle.id,
            name,
            version,
        })
    }

    /// Gets the latest version of a secret from the Key Vault.
    /// For a specific version, use `get_secret_with_version`.
    pub async fn get_secret(&mut self, secret_name: &str) -> Result<Secret, KeyVaultError> {
        self.get_secret_with_version(secret_name, "").await
    }

    /// Gets a secret from the Key Vault with a specific version.
    /// If you need the latest version, use `get_secret`.
    pub async fn get_secret_with_version(
        &mut self,
        secret_name: &str,
        secret_version_name: &str,
    ) -> Result<Secret, KeyVaultError> {
        validate_name(secret_name)?;
        let uri = self.endpoint(&format!("secrets/{}/{}", secret_name, secret_version_name), &[])?;
        let resp = self.get_authed(uri).await?;
        let bundle = parse_secret_response(secret_name, resp)?;
        let (name, version) = split_secret_id(&bundle.id);
        Ok(Secret {
            id: bundle.id,
            name,
            version,
            value: bundle.value,
            enabled: bundle.attributes.enabled,
            managed: bundle.managed,
            time_created: bundle.attributes.created,
            time_updated: bundle.attributes.updated,
        })
    }

    /// Lists the secrets in the Key Vault, one server page at a time.
    /// Managed and disabled secrets are skipped.
    pub fn list_secrets(&mut self) -> SecretPager<'_> {
        self.list_secrets_with_page_size(DEFAULT_PAGE_SIZE)
    }

    pub fn list_secrets_with_page_size(&mut self, max_secrets: usize) -> SecretPager<'_> {
        let first = self.endpoint("secrets", &[("maxresults", &max_secrets.to_string())]);
        SecretPager {
            client: self,
            next: Some(first),
            buffer: VecDeque::new(),
        }
    }

    /// Enumerates the vault and fetches the value of every listed secret.
    pub async fn enabled_secret_values(&mut self) -> Result<Vec<Secret>, KeyVaultError> {
        let listed = self.list_secrets().collect_all().await?;
        let mut secrets = Vec::with_capacity(listed.len());
        for properties in listed {
            secrets.push(self.get_secret(&properties.name).await?);
        }
        Ok(secrets)
    }

    /// Cheapest authenticated call against the vault: a one-item listing.
    pub async fn probe(&mut self) -> Result<(), KeyVaultError> {
        let uri = self.endpoint("secrets", &[("maxresults", "1")])?;
        let resp = self.get_authed(uri).await?;
        if resp.status.is_success() {
            Ok(())
        } else {
            Err(unexpected(resp))
        }
    }

    async fn fetch_page(&mut self, uri: Url) -> Result<KeyVaultGetSecretsResponse, KeyVaultError> {
        let resp = self.get_authed(uri).await?;
        if !resp.status.is_success() {
            return Err(unexpected(resp));
        }
        serde_json::from_str::<KeyVaultGetSecretsResponse>(&resp.body).map_err(|_| unexpected(resp))
    }
}

/// Lazily pages through a vault's secrets. Not restartable: once consumed,
/// list again from the client.
#[derive(Debug)]
pub struct SecretPager<'c> {
    client: &'c mut SecretClient,
    next: Option<Result<Url, KeyVaultError>>,
    buffer: VecDeque<SecretProperties>,
}

impl<'c> SecretPager<'c> {
    pub async fn next(&mut self) -> Result<Option<SecretProperties>, KeyVaultError> {
        loop {
            if let Some(properties) = self.buffer.pop_front() {
                return Ok(Some(properties));
            }
            let uri = match self.next.take() {
                Some(uri) => uri?,
                None => return Ok(None),
            };
            let page = self.client.fetch_page(uri).await?;
            self.next = page
                .next_link
                .filter(|link| !link.is_empty())
                .map(|link| Url::parse(&link).map_err(|_| KeyVaultError::malformed("nextLink", link)));

            for item in page.value {
                let properties = SecretProperties::from(item);
                if properties.managed {
                    debug!(secret = %properties.name, "Skipping managed secret");
                } else if !properties.enabled {
                    debug!(secret = %properties.name, "Skipping disabled secret");
                } else {
                    self.buffer.push_back(properties);
                }
            }
        }
    }

    pub async fn collect_all(mut self) -> Result<Vec<SecretProperties>, KeyVaultError> {
        let mut all = Vec::new();
        while let Some(properties) = self.next().await? {
            all.push(properties);
        }
        Ok(all)
    }
}

impl From<KeyVaultSecretItem> for SecretProperties {
    fn from(item: KeyVaultSecretItem) -> Self {
        let (name, _) = split_secret_id(&item.id);
        SecretProperties {
            enabled: item.attributes.map_or(true, |a| a.enabled),
            managed: item.managed,
            name,
            id: item.id,
        }
    }
}

fn parse_secret_response(secret_name: &str, resp: RawResponse) -> Result<KeyVaultSecretBundle, KeyVaultError> {
    match resp.status {
        s if s.is_success() => {
            serde_json::from_str::<KeyVaultSecretBundle>(&resp.body).map_err(|_| unexpected(resp))
        }
        StatusCode::NOT_FOUND => Err(KeyVaultError::SecretNotFound(secret_name.to_owned())),
        StatusCode::FORBIDDEN if is_disabled_response(&resp.body) => {
            Err(KeyVaultError::SecretDisabled(secret_name.to_owned()))
        }
        _ => Err(unexpected(resp)),
    }
}

fn is_disabled_response(body: &str) -> bool {
    serde_json::from_str::<KeyVaultErrorEnvelope>(body).map_or(false, |e| e.error.is_disabled())
}

fn unexpected(resp: RawResponse) -> KeyVaultError {
    KeyVaultError::UnexpectedResponse {
        status: resp.status.as_u16(),
        body: resp.body,
    }
}

/// Splits `https://{vault}/secrets/{name}/{version}` into name and version.
fn split_secret_id(id: &str) -> (String, String) {
    let path = Url::parse(id)
        .map(|u| u.path().to_owned())
        .unwrap_or_else(|_| id.to_owned());
    let mut segments = path
        .split('/')
        .filter(|s| !s.is_empty())
        .skip_while(|s| *s != "secrets")
        .skip(1);
    let name = segments.next().unwrap_or_default().to_owned();
    let version = segments.next().unwrap_or_default().to_owned();
    (name, version)
}

pub(crate) fn validate_name(secret_name: &str) -> Result<(), KeyVaultError> {
    let valid = !secret_name.is_empty()
        && secret_name.len() <= MAX_SECRET_NAME_LEN
        && secret_name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(KeyVaultError::malformed("secret name", secret_name))
    }
}
