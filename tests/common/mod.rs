#![allow(dead_code)]

use azure_keyvault_auth::{AzureEnvironment, CallbackCredential, TokenCredential, TokenRequest};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

pub const TENANT_ID: &str = "bc598e67-03d8-44d5-aa46-8289b9a39a14";
pub const CLIENT_OID: &str = "c1a6d79b-082b-4798-b362-a77e96de50db";
pub const VAULT_RESOURCE: &str = "https://vault.azure.net";

/// A credential that always answers with `token`.
pub fn static_credential(token: &'static str) -> Arc<dyn TokenCredential> {
    Arc::new(CallbackCredential::new(move |_| async move { Ok(Some(token.to_owned())) }))
}

/// A credential answering with `token` that records every request it sees.
pub fn recording_credential(token: &'static str) -> (Arc<dyn TokenCredential>, Arc<Mutex<Vec<TokenRequest>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let credential = CallbackCredential::new(move |request: TokenRequest| {
        recorder.lock().unwrap().push(request);
        async move { Ok(Some(token.to_owned())) }
    });
    (Arc::new(credential), seen)
}

/// Every endpoint pointed at the mock server.
pub fn mock_environment() -> AzureEnvironment {
    AzureEnvironment {
        authority_host: mockito::server_url(),
        resource_manager: mockito::server_url(),
        ..AzureEnvironment::global()
    }
}

pub fn vault_uri(vault: &str) -> String {
    format!("{}/vaults/{}/", mockito::server_url(), vault)
}

pub fn challenge_header() -> String {
    format!(
        "Bearer authorization=\"{}/{}\", resource=\"{}\"",
        mockito::server_url(),
        TENANT_ID,
        VAULT_RESOURCE
    )
}

pub fn secret_bundle(vault: &str, name: &str, version: &str, value: &str, enabled: bool) -> Value {
    json!({
        "value": value,
        "id": format!("{}secrets/{}/{}", vault_uri(vault), name, version),
        "attributes": {
            "enabled": enabled,
            "created": 1_493_938_410,
            "updated": 1_493_938_410,
            "recoveryLevel": "Purgeable"
        }
    })
}

pub fn secret_item(vault: &str, name: &str, enabled: bool, managed: bool) -> Value {
    let mut item = json!({
        "id": format!("{}secrets/{}", vault_uri(vault), name),
        "attributes": { "enabled": enabled, "created": 1_493_938_410, "updated": 1_493_938_410 }
    });
    if managed {
        item["managed"] = json!(true);
    }
    item
}
