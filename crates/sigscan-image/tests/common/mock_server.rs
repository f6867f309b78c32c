//! Mock server helpers for registry HTTP testing
//!
//! Sets up wiremock endpoints shaped like the OCI distribution API.

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::constants::{NAMESPACE_REPO, OCI_MANIFEST};

pub fn tags_path() -> String {
    format!("/v2/{}/tags/list", NAMESPACE_REPO)
}

pub fn manifest_path(reference: &str) -> String {
    format!("/v2/{}/manifests/{}", NAMESPACE_REPO, reference)
}

/// Tag listing returned in one page
pub async fn mock_tags(server: &MockServer, tags: &[&str]) {
    Mock::given(method("GET"))
        .and(path(tags_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "name": NAMESPACE_REPO, "tags": tags })),
        )
        .mount(server)
        .await;
}

/// Manifest for `reference` with a `Docker-Content-Digest` header
pub async fn mock_manifest(server: &MockServer, reference: &str, digest: &str) {
    Mock::given(method("GET"))
        .and(path(manifest_path(reference)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("docker-content-digest", digest)
                .set_body_raw(r#"{"schemaVersion":2}"#, OCI_MANIFEST),
        )
        .mount(server)
        .await;
}

/// Any request to `path` answered with `status`
pub async fn mock_status(server: &MockServer, endpoint: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Unauthenticated requests to `endpoint` get a 401 with `challenge`
pub async fn mock_challenge(server: &MockServer, endpoint: &str, challenge: &str) {
    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(401).insert_header("www-authenticate", challenge))
        .mount(server)
        .await;
}

/// Tag listing served only to requests carrying `authorization`
pub async fn mock_authorized_tags(server: &MockServer, authorization: &str, tags: &[&str]) {
    Mock::given(method("GET"))
        .and(path(tags_path()))
        .and(header("authorization", authorization))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "name": NAMESPACE_REPO, "tags": tags })),
        )
        .mount(server)
        .await;
}

/// Bearer challenge pointing at the mock server's `/token` realm
pub fn bearer_challenge(server: &MockServer) -> String {
    format!(
        r#"Bearer realm="{}/token",service="registry.test",scope="repository:{}:pull""#,
        server.uri(),
        NAMESPACE_REPO
    )
}
