//! HTTP-level tests for the registry client
//!
//! Tests cover:
//! - Tag listing with Link-header pagination
//! - Descriptor resolution from header digests and computed body digests
//! - Error mapping (404 vs other statuses)
//! - Basic, bearer and client-credential challenge handling
//! - Retries through `RetryingRegistry` and a full scan over HTTP

mod common;

use common::*;
use sigscan_core::{Credentials, RetryPolicy, RetryStrategy};
use sigscan_image::{
    sig_tag_of, Digest, Registry, RegistryClient, RegistryError, RepositoryRef, RetryingRegistry,
    Scanner,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn server_repo(server: &MockServer) -> RepositoryRef {
    RepositoryRef::new(&server.uri(), NAMESPACE_REPO).unwrap()
}

fn basic() -> Credentials {
    Credentials::Basic {
        username: "u".to_string(),
        password: "p".to_string(),
    }
}

#[tokio::test]
async fn test_list_tags_single_page() {
    let server = MockServer::start().await;
    mock_tags(&server, &["v1", "latest"]).await;

    let client = RegistryClient::new(Credentials::Anonymous).unwrap();
    let tags = client.list_tags(&server_repo(&server)).await.unwrap();
    assert_eq!(tags, vec!["v1", "latest"]);
}

#[tokio::test]
async fn test_list_tags_follows_link_pagination() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(tags_path()))
        .and(query_param("last", "v2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "name": NAMESPACE_REPO, "tags": ["v3"] })),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(tags_path()))
        .and(query_param("n", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(
                    "link",
                    format!(r#"<{}?n=2&last=v2>; rel="next""#, tags_path()).as_str(),
                )
                .set_body_json(serde_json::json!({ "name": NAMESPACE_REPO, "tags": ["v1", "v2"] })),
        )
        .mount(&server)
        .await;

    let client = RegistryClient::new(Credentials::Anonymous)
        .unwrap()
        .with_page_size(2);
    let tags = client.list_tags(&server_repo(&server)).await.unwrap();
    assert_eq!(tags, vec!["v1", "v2", "v3"]);
}

#[tokio::test]
async fn test_list_tags_null_tags_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(tags_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "name": NAMESPACE_REPO, "tags": null })),
        )
        .mount(&server)
        .await;

    let client = RegistryClient::new(Credentials::Anonymous).unwrap();
    assert!(client.list_tags(&server_repo(&server)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_descriptor_uses_content_digest_header() {
    let server = MockServer::start().await;
    mock_manifest(&server, "v1", &format!("sha256:{}", HEX_A)).await;

    let client = RegistryClient::new(Credentials::Anonymous).unwrap();
    let image = server_repo(&server).tag("v1").unwrap();
    let descriptor = client.get_descriptor(&image).await.unwrap();

    assert_eq!(descriptor.digest, digest(HEX_A));
    assert_eq!(descriptor.media_type, OCI_MANIFEST);
    assert_eq!(descriptor.size, Some(r#"{"schemaVersion":2}"#.len() as u64));
}

#[tokio::test]
async fn test_descriptor_digest_computed_from_body() {
    let server = MockServer::start().await;
    let body = r#"{"schemaVersion":2,"mediaType":"application/vnd.oci.image.manifest.v1+json"}"#;
    Mock::given(method("GET"))
        .and(path(manifest_path("v1")))
        .and(header_exists("accept"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, OCI_MANIFEST))
        .mount(&server)
        .await;

    let client = RegistryClient::new(Credentials::Anonymous).unwrap();
    let image = server_repo(&server).tag("v1").unwrap();
    let descriptor = client.get_descriptor(&image).await.unwrap();

    assert_eq!(descriptor.digest, Digest::of_bytes(body.as_bytes()));
}

#[tokio::test]
async fn test_descriptor_not_found() {
    let server = MockServer::start().await;
    mock_status(&server, &manifest_path("missing"), 404).await;

    let client = RegistryClient::new(Credentials::Anonymous).unwrap();
    let image = server_repo(&server).tag("missing").unwrap();
    let err = client.get_descriptor(&image).await.unwrap_err();

    assert!(err.is_not_found());
    assert!(err.to_string().contains("missing"));
}

#[tokio::test]
async fn test_server_error_is_communication_failure() {
    let server = MockServer::start().await;
    mock_status(&server, &manifest_path("v1"), 500).await;

    let client = RegistryClient::new(Credentials::Anonymous).unwrap();
    let image = server_repo(&server).tag("v1").unwrap();
    let err = client.get_descriptor(&image).await.unwrap_err();

    assert!(matches!(err, RegistryError::Communication { .. }));
    assert_eq!(err.status(), Some(500));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_digest_header_is_rejected() {
    let server = MockServer::start().await;
    mock_manifest(&server, "v1", "sha256:not-hex").await;

    let client = RegistryClient::new(Credentials::Anonymous).unwrap();
    let image = server_repo(&server).tag("v1").unwrap();
    let err = client.get_descriptor(&image).await.unwrap_err();
    assert!(err.to_string().contains("malformed digest"));
}

#[tokio::test]
async fn test_basic_challenge_retries_with_credentials() {
    let server = MockServer::start().await;
    // base64("u:p")
    mock_authorized_tags(&server, "Basic dTpw", &["v1"]).await;
    mock_challenge(&server, &tags_path(), r#"Basic realm="Registry""#).await;

    let client = RegistryClient::new(basic()).unwrap();
    let tags = client.list_tags(&server_repo(&server)).await.unwrap();
    assert_eq!(tags, vec!["v1"]);
}

#[tokio::test]
async fn test_basic_challenge_without_credentials_fails() {
    let server = MockServer::start().await;
    mock_challenge(&server, &tags_path(), r#"Basic realm="Registry""#).await;

    let client = RegistryClient::new(Credentials::Anonymous).unwrap();
    let err = client.list_tags(&server_repo(&server)).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_bearer_challenge_exchanges_token_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/token"))
        .and(query_param("service", "registry.test"))
        .and(query_param("scope", "repository:ns/app:pull"))
        .and(header("authorization", "Basic dTpw"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "t0k" })))
        .expect(1)
        .mount(&server)
        .await;

    mock_authorized_tags(&server, "Bearer t0k", &["v1", "v2"]).await;
    mock_challenge(&server, &tags_path(), &bearer_challenge(&server)).await;

    let client = RegistryClient::new(basic()).unwrap();
    let repository = server_repo(&server);

    assert_eq!(client.list_tags(&repository).await.unwrap(), vec!["v1", "v2"]);
    // Second call reuses the cached token
    assert_eq!(client.list_tags(&repository).await.unwrap(), vec!["v1", "v2"]);
}

#[tokio::test]
async fn test_client_credentials_token_exchange() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=svc"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "access_token": "cc" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    mock_authorized_tags(&server, "Bearer cc", &["v1"]).await;
    mock_challenge(&server, &tags_path(), &bearer_challenge(&server)).await;

    let client = RegistryClient::new(Credentials::ClientCredentials {
        client_id: "svc".to_string(),
        client_secret: "s3cret".to_string(),
    })
    .unwrap();
    let tags = client.list_tags(&server_repo(&server)).await.unwrap();
    assert_eq!(tags, vec!["v1"]);
}

#[tokio::test]
async fn test_failed_token_exchange_reports_status() {
    let server = MockServer::start().await;
    mock_status(&server, "/token", 403).await;
    mock_challenge(&server, &tags_path(), &bearer_challenge(&server)).await;

    let client = RegistryClient::new(basic()).unwrap();
    let err = client.list_tags(&server_repo(&server)).await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    assert!(err.to_string().contains("token request"));
}

#[tokio::test]
async fn test_static_bearer_token_is_sent_directly() {
    let server = MockServer::start().await;
    mock_authorized_tags(&server, "Bearer static", &["v1"]).await;

    let client = RegistryClient::new(Credentials::Bearer {
        token: "static".to_string(),
    })
    .unwrap();
    assert_eq!(
        client.list_tags(&server_repo(&server)).await.unwrap(),
        vec!["v1"]
    );
}

#[tokio::test]
async fn test_retrying_registry_recovers_from_server_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(tags_path()))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mock_tags(&server, &["v1"]).await;

    let policy = RetryPolicy {
        max_attempts: 3,
        strategy: RetryStrategy::None,
        ..RetryPolicy::default()
    };
    let registry = RetryingRegistry::new(
        RegistryClient::new(Credentials::Anonymous).unwrap(),
        policy,
        CancellationToken::new(),
    )
    .with_jitter(false);

    let tags = registry.list_tags(&server_repo(&server)).await.unwrap();
    assert_eq!(tags, vec!["v1"]);
}

#[tokio::test]
async fn test_scan_over_http() {
    let server = MockServer::start().await;
    let sig_a = sig_tag_of(HEX_A);
    let sig_b = sig_tag_of(HEX_B);

    mock_tags(&server, &["v1", &sig_a, &sig_b]).await;
    mock_manifest(&server, "v1", &format!("sha256:{}", HEX_A)).await;
    mock_manifest(&server, &sig_a, &format!("sha256:{}", HEX_C)).await;
    mock_manifest(&server, &sig_b, &format!("sha256:{}", HEX_D)).await;

    let scanner = Scanner::new(
        RegistryClient::new(Credentials::Anonymous).unwrap(),
        settings(),
        CancellationToken::new(),
    );
    let report = scanner.scan(&server_repo(&server)).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.tags.len(), 1);
    assert!(report.tags[0].signed_by_listing);
    assert_eq!(report.tags[0].signed_by_probe, Some(true));
    assert_eq!(report.orphaned_signatures, vec![sig_b]);
    assert_eq!(report.signatures[1].digest, digest(HEX_D));
}
