mod common;

use azure_keyvault_auth::{KeyVaultError, ManagementClient, VaultDescriptor};
use common::*;
use mockito::{mock, Matcher};
use serde_json::json;
use uuid::Uuid;

fn client(subscription: &str, token: &'static str) -> ManagementClient {
    ManagementClient::new(static_credential(token), subscription, TENANT_ID, mock_environment())
}

fn descriptor() -> VaultDescriptor {
    VaultDescriptor::with_full_secret_access(
        "westus",
        Uuid::parse_str(TENANT_ID).unwrap(),
        Uuid::parse_str(CLIENT_OID).unwrap(),
    )
}

fn vault_path(subscription: &str, vault: &str) -> Matcher {
    Matcher::Regex(format!(
        "^/subscriptions/{}/resourceGroups/azure-sample-group/providers/Microsoft.KeyVault/vaults/{}",
        subscription, vault
    ))
}

#[tokio::test]
async fn ensuring_a_resource_group_is_idempotent() {
    let group = mock(
        "PUT",
        Matcher::Regex("^/subscriptions/sub-rg/resourcegroups/azure-sample-group".to_owned()),
    )
    .match_header("authorization", "Bearer mgmt-token")
    .match_body(Matcher::Json(json!({ "location": "westus" })))
    .with_status(200)
    .with_body(
        json!({
            "id": "/subscriptions/sub-rg/resourceGroups/azure-sample-group",
            "name": "azure-sample-group",
            "location": "westus",
            "properties": { "provisioningState": "Succeeded" }
        })
        .to_string(),
    )
    .expect(2)
    .create();

    let (credential, seen) = recording_credential("mgmt-token");
    let client = ManagementClient::new(credential, "sub-rg", TENANT_ID, mock_environment());
    let first = client.ensure_resource_group("azure-sample-group", "westus").await.unwrap();
    let second = client.ensure_resource_group("azure-sample-group", "westus").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.id(), "/subscriptions/sub-rg/resourceGroups/azure-sample-group");
    assert_eq!(first.provisioning_state().as_deref(), Some("Succeeded"));
    group.assert();

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].authority, format!("{}/{}", mockito::server_url(), TENANT_ID));
    assert_eq!(seen[0].resource, format!("{}/", mockito::server_url()));
}

#[tokio::test]
async fn creates_a_vault_with_a_full_secret_access_policy() {
    let vault = mock("PUT", vault_path("sub-vault", "kv-test-create"))
        .match_header("authorization", "Bearer mgmt-token")
        .match_body(Matcher::Json(json!({
            "location": "westus",
            "properties": {
                "tenantId": TENANT_ID,
                "sku": { "family": "A", "name": "standard" },
                "accessPolicies": [{
                    "tenantId": TENANT_ID,
                    "objectId": CLIENT_OID,
                    "permissions": { "secrets": ["all"] }
                }]
            }
        })))
        .with_status(200)
        .with_body(
            json!({
                "id": "/subscriptions/sub-vault/resourceGroups/azure-sample-group/providers/Microsoft.KeyVault/vaults/kv-test-create",
                "name": "kv-test-create",
                "type": "Microsoft.KeyVault/vaults",
                "location": "westus",
                "properties": {
                    "tenantId": TENANT_ID,
                    "vaultUri": "https://kv-test-create.vault.azure.net/",
                    "provisioningState": "Succeeded"
                }
            })
            .to_string(),
        )
        .create();

    let created = client("sub-vault", "mgmt-token")
        .create_or_update_vault("azure-sample-group", "kv-test-create", &descriptor())
        .await
        .unwrap();
    assert_eq!(created.name(), "kv-test-create");
    assert_eq!(created.vault_uri(), "https://kv-test-create.vault.azure.net/");
    assert_eq!(created.provisioning_state().as_deref(), Some("Succeeded"));
    vault.assert();
}

#[tokio::test]
async fn vault_uri_falls_back_to_the_cloud_suffix() {
    let _vault = mock("PUT", vault_path("sub-nouri", "kv-test-nouri"))
        .with_status(201)
        .with_body(
            json!({
                "id": "/subscriptions/sub-nouri/resourceGroups/azure-sample-group/providers/Microsoft.KeyVault/vaults/kv-test-nouri",
                "name": "kv-test-nouri",
                "location": "westus",
                "properties": { "provisioningState": "Creating" }
            })
            .to_string(),
        )
        .create();

    let created = client("sub-nouri", "mgmt-token")
        .create_or_update_vault("azure-sample-group", "kv-test-nouri", &descriptor())
        .await
        .unwrap();
    assert_eq!(created.vault_uri(), "https://kv-test-nouri.vault.azure.net/");
}

#[tokio::test]
async fn globally_taken_vault_name_fails_provisioning() {
    let _vault = mock("PUT", vault_path("sub-taken", "kv-taken"))
        .with_status(409)
        .with_body(
            r#"{"error":{"code":"VaultAlreadyExists","message":"The vault name 'kv-taken' is already in use. Vault names are globally unique."}}"#,
        )
        .create();

    let err = client("sub-taken", "mgmt-token")
        .create_or_update_vault("azure-sample-group", "kv-taken", &descriptor())
        .await
        .unwrap_err();
    match err {
        KeyVaultError::ProvisioningFailure { status, code, .. } => {
            assert_eq!(status, 409);
            assert_eq!(code, "VaultAlreadyExists");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn rejected_management_token_fails_authentication() {
    let _group = mock(
        "PUT",
        Matcher::Regex("^/subscriptions/sub-unauth/resourcegroups/".to_owned()),
    )
    .with_status(401)
    .with_body(r#"{"error":{"code":"InvalidAuthenticationToken","message":"The access token is invalid."}}"#)
    .create();

    let err = client("sub-unauth", "bad-token")
        .ensure_resource_group("azure-sample-group", "westus")
        .await
        .unwrap_err();
    assert!(matches!(err, KeyVaultError::AuthenticationFailure(_)), "{:?}", err);
}

#[tokio::test]
async fn invalid_vault_names_are_rejected_locally() {
    let never = mock("PUT", Matcher::Regex("^/subscriptions/sub-invalid/".to_owned()))
        .expect(0)
        .create();

    let err = client("sub-invalid", "mgmt-token")
        .create_or_update_vault("azure-sample-group", "not_a_vault", &descriptor())
        .await
        .unwrap_err();
    assert!(matches!(err, KeyVaultError::MalformedIdentifier { .. }));
    never.assert();
}
