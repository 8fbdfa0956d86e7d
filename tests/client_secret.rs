mod common;

use azure_keyvault_auth::{ClientSecretCredential, KeyVaultError, ManagementClient, Settings, TokenCredential, TokenRequest};
use common::*;
use mockito::{mock, Matcher};
use serde_json::json;
use std::collections::HashMap;

const CLIENT_ID: &str = "c1a6d79b-082b-4798-b362-a77e96de50db";

fn authority(tenant: &str) -> String {
    format!("{}/{}", mockito::server_url(), tenant)
}

fn credentials_form(resource: &str) -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
        Matcher::UrlEncoded("client_id".into(), CLIENT_ID.into()),
        Matcher::UrlEncoded("client_secret".into(), "SUPER_SECRET_KEY".into()),
        Matcher::UrlEncoded("resource".into(), resource.into()),
    ])
}

#[tokio::test]
async fn exchanges_at_the_challenge_authority() {
    let token_endpoint = mock("POST", "/tenant-exchange/oauth2/token")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(credentials_form(VAULT_RESOURCE))
        .with_status(200)
        .with_body(
            json!({
                "token_type": "Bearer",
                "expires_on": "1506484173",
                "resource": VAULT_RESOURCE,
                "access_token": "sp-token"
            })
            .to_string(),
        )
        .expect(1)
        .create();

    let credential = ClientSecretCredential::new(CLIENT_ID, "SUPER_SECRET_KEY", TENANT_ID);
    let token = credential
        .get_token(&TokenRequest::new(authority("tenant-exchange"), VAULT_RESOURCE))
        .await
        .unwrap();

    assert_eq!(token.secret(), "sp-token");
    assert!(token.expires_on().is_some());
    token_endpoint.assert();
}

#[tokio::test]
async fn common_authority_uses_the_configured_tenant() {
    let token_endpoint = mock("POST", "/tenant-configured/oauth2/token")
        .with_status(200)
        .with_body(r#"{"access_token":"sp-token","expires_on":1506484173}"#)
        .expect(1)
        .create();

    let credential = ClientSecretCredential::new(CLIENT_ID, "SUPER_SECRET_KEY", "tenant-configured");
    let token = credential
        .get_token(&TokenRequest::new(authority("common"), VAULT_RESOURCE))
        .await
        .unwrap();

    assert_eq!(token.secret(), "sp-token");
    token_endpoint.assert();
}

#[tokio::test]
async fn rejected_client_secret_fails_authentication() {
    let _token_endpoint = mock("POST", "/tenant-rejected/oauth2/token")
        .with_status(400)
        .with_body(
            r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret is provided."}"#,
        )
        .create();

    let credential = ClientSecretCredential::new(CLIENT_ID, "SUPER_SECRET_KEY", TENANT_ID);
    let err = credential
        .get_token(&TokenRequest::new(authority("tenant-rejected"), VAULT_RESOURCE))
        .await
        .unwrap_err();

    match err {
        KeyVaultError::AuthenticationFailure(e) => assert!(e.to_string().contains("AADSTS7000215")),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn management_client_from_settings_uses_the_configured_authority() {
    let token_endpoint = mock("POST", "/tenant-management/oauth2/token")
        .match_body(credentials_form(&format!("{}/", mockito::server_url())))
        .with_status(200)
        .with_body(r#"{"access_token":"mgmt-token","expires_on":"1506484173"}"#)
        .expect(1)
        .create();
    let group = mock(
        "PUT",
        Matcher::Regex("^/subscriptions/sub-sp/resourcegroups/azure-sample-group".to_owned()),
    )
    .match_header("authorization", "Bearer mgmt-token")
    .with_status(200)
    .with_body(r#"{"id":"/subscriptions/sub-sp/resourceGroups/azure-sample-group","name":"azure-sample-group","location":"westus"}"#)
    .expect(1)
    .create();

    let values: HashMap<String, String> = vec![
        ("AZURE_CLIENT_ID", CLIENT_ID),
        ("AZURE_CLIENT_SECRET", "SUPER_SECRET_KEY"),
        ("AZURE_TENANT_ID", "tenant-management"),
        ("AZURE_SUBSCRIPTION_ID", "sub-sp"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect();
    let client = ManagementClient::from_settings(&Settings::from_source(&values), mock_environment()).unwrap();
    client.ensure_resource_group("azure-sample-group", "westus").await.unwrap();

    token_endpoint.assert();
    group.assert();
}
