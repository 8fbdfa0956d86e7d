use crate::credential::TokenRequest;
use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use std::collections::HashMap;

/// A `Bearer` challenge returned by Key Vault on an unauthenticated request.
///
/// Key Vault answers with either the legacy form
/// `Bearer authorization="https://login.windows.net/{tenant}", resource="https://vault.azure.net"`
/// or the newer `authorization_uri=".." scope=".."` form.
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    pub authority: String,
    pub resource: String,
    pub scope: Option<String>,
}

impl Challenge {
    pub fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let mut parts = header.splitn(2, char::is_whitespace);
        if !parts.next()?.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let params = parts.next().unwrap_or_default();

        let mut values = HashMap::new();
        for part in params.split(|c| c == ',' || c == ' ') {
            let mut kv = part.splitn(2, '=');
            let key = kv.next().unwrap_or_default().trim();
            if let Some(value) = kv.next() {
                values.insert(key.to_ascii_lowercase(), value.trim().trim_matches('"').to_owned());
            }
        }

        let authority = values
            .remove("authorization")
            .or_else(|| values.remove("authorization_uri"))?;
        let scope = values.remove("scope");
        let resource = values
            .remove("resource")
            .or_else(|| scope.as_deref().map(|s| s.trim_end_matches("/.default").to_owned()))?;

        Some(Self {
            authority,
            resource,
            scope,
        })
    }

    pub(crate) fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get_all(WWW_AUTHENTICATE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(Challenge::parse)
    }

    pub fn token_request(&self) -> TokenRequest {
        TokenRequest {
            authority: self.authority.clone(),
            resource: self.resource.clone(),
            scope: self.scope.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_challenge() {
        let challenge = Challenge::parse(
            r#"Bearer authorization="https://login.windows.net/72f988bf-86f1-41af-91ab-2d7cd011db47", resource="https://vault.azure.net""#,
        )
        .unwrap();
        assert_eq!(
            challenge.authority,
            "https://login.windows.net/72f988bf-86f1-41af-91ab-2d7cd011db47"
        );
        assert_eq!(challenge.resource, "https://vault.azure.net");
        assert_eq!(challenge.scope, None);
    }

    #[test]
    fn derives_resource_from_scope() {
        let challenge = Challenge::parse(
            r#"Bearer authorization_uri="https://login.microsoftonline.com/tenant" scope="https://vault.azure.net/.default""#,
        )
        .unwrap();
        assert_eq!(challenge.authority, "https://login.microsoftonline.com/tenant");
        assert_eq!(challenge.resource, "https://vault.azure.net");
        assert_eq!(challenge.scope.as_deref(), Some("https://vault.azure.net/.default"));
    }

    #[test]
    fn rejects_other_schemes() {
        assert!(Challenge::parse(r#"Basic realm="vault""#).is_none());
        assert!(Challenge::parse("Bearer").is_none());
        assert!(Challenge::parse(
            r#"Bearerfoo authorization="https://login.windows.net/tenant", resource="https://vault.azure.net""#
        )
        .is_none());
        assert!(Challenge::parse(
            r#"bearer	authorization="https://login.windows.net/tenant", resource="https://vault.azure.net""#
        )
        .is_some());
        assert!(Challenge::parse(r#"Bearer resource="https://vault.azure.net""#).is_none());
    }
}
