use crate::challenge::Challenge;
use crate::credential::TokenCredential;
use crate::KeyVaultError;
use anyhow::anyhow;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode, Url};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub(crate) const API_VERSION: &str = "7.0";

/// Client for Key Vault secret operations - setting a secret, getting a secret, listing secrets.
///
/// The first request to a vault goes out without a token; the `401` challenge
/// it receives names the authority and resource the credential is then asked
/// for. Every later request asks the credential for a fresh token.
///
/// # Examples
///
/// ```
/// use azure_keyvault_auth::{CallbackCredential, SecretClient};
/// use std::sync::Arc;
///
/// let credential = CallbackCredential::new(|_request| async { Ok(Some("token".to_owned())) });
/// let client = SecretClient::new("https://test-keyvault.vault.azure.net/", Arc::new(credential));
/// assert!(client.is_ok());
/// ```
pub struct SecretClient {
    pub(crate) vault_uri: Url,
    credential: Arc<dyn TokenCredential>,
    challenge: Option<Challenge>,
    http: reqwest::Client,
}

pub(crate) struct RawResponse {
    pub(crate) status: StatusCode,
    pub(crate) body: String,
}

impl SecretClient {
    pub fn new(vault_uri: &str, credential: Arc<dyn TokenCredential>) -> Result<Self, KeyVaultError> {
        let mut vault_uri = Url::parse(vault_uri).map_err(|_| KeyVaultError::malformed("vault URI", vault_uri))?;
        if !vault_uri.path().ends_with('/') {
            let path = format!("{}/", vault_uri.path());
            vault_uri.set_path(&path);
        }
        Ok(Self {
            vault_uri,
            credential,
            challenge: None,
            http: reqwest::Client::new(),
        })
    }

    pub fn vault_uri(&self) -> &str {
        self.vault_uri.as_str()
    }

    /// Challenge learned from the vault, if a request has been made yet.
    pub fn challenge(&self) -> Option<&Challenge> {
        self.challenge.as_ref()
    }

    pub(crate) fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, KeyVaultError> {
        let mut uri = self
            .vault_uri
            .join(path)
            .map_err(|_| KeyVaultError::malformed("secret path", path))?;
        uri.query_pairs_mut()
            .append_pair("api-version", API_VERSION)
            .extend_pairs(params);
        Ok(uri)
    }

    pub(crate) async fn get_authed(&mut self, uri: Url) -> Result<RawResponse, KeyVaultError> {
        self.send_authed(Method::GET, uri, None).await
    }

    pub(crate) async fn put_authed(&mut self, uri: Url, body: String) -> Result<RawResponse, KeyVaultError> {
        self.send_authed(Method::PUT, uri, Some(body)).await
    }

    async fn send_authed(
        &mut self,
        method: Method,
        uri: Url,
        body: Option<String>,
    ) -> Result<RawResponse, KeyVaultError> {
        let challenge = match self.challenge.clone() {
            Some(challenge) => challenge,
            None => {
                // The probe never carries the payload.
                let resp = self.send(method.clone(), uri.clone(), None, None).await?;
                if resp.status != StatusCode::UNAUTHORIZED {
                    return Ok(resp.into());
                }
                let challenge = resp.challenge.ok_or_else(|| {
                    KeyVaultError::AuthenticationFailure(anyhow!(
                        "Key Vault returned 401 without a bearer challenge"
                    ))
                })?;
                debug!(authority = %challenge.authority, resource = %challenge.resource, "Received Key Vault challenge");
                self.challenge = Some(challenge.clone());
                challenge
            }
        };

        let token = self.credential.get_token(&challenge.token_request()).await?;
        let resp = self.send(method, uri, body, Some(token.secret())).await?;
        if resp.status == StatusCode::UNAUTHORIZED {
            return Err(KeyVaultError::AuthenticationFailure(anyhow!(
                "Key Vault rejected the access token: {}",
                resp.body
            )));
        }
        Ok(resp.into())
    }

    async fn send(
        &self,
        method: Method,
        uri: Url,
        body: Option<String>,
        token: Option<&str>,
    ) -> Result<ChallengedResponse, KeyVaultError> {
        debug!(%method, path = uri.path(), authenticated = token.is_some(), "Sending Key Vault request");
        let mut request = self.http.request(method, uri);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        let resp = request.send().await?;
        let status = resp.status();
        let challenge = Challenge::from_headers(resp.headers());
        let body = resp.text().await?;
        Ok(ChallengedResponse {
            status,
            body,
            challenge,
        })
    }
}

struct ChallengedResponse {
    status: StatusCode,
    body: String,
    challenge: Option<Challenge>,
}

impl From<ChallengedResponse> for RawResponse {
    fn from(resp: ChallengedResponse) -> Self {
        RawResponse {
            status: resp.status,
            body: resp.body,
        }
    }
}

impl fmt::Debug for SecretClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretClient")
            .field("vault_uri", &self.vault_uri.as_str())
            .field("challenge", &self.challenge)
            .finish()
    }
}
