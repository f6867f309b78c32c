use crate::auth::{parse_challenge, Authenticator, CachedAuth, Challenge};
use crate::error::RegistryError;
use crate::types::{Descriptor, Digest, ImageReference, RepositoryRef};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, WWW_AUTHENTICATE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use sigscan_core::{Credentials, ScanConfig};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Manifest media types accepted when resolving a reference
const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json,\
application/vnd.oci.image.index.v1+json,\
application/vnd.docker.distribution.manifest.v2+json,\
application/vnd.docker.distribution.manifest.list.v2+json";

const DEFAULT_PAGE_SIZE: usize = 1000;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The two registry operations the scanner depends on.
///
/// Implementations report absence as [`RegistryError::NotFound`] and every
/// other failure as [`RegistryError::Communication`].
#[async_trait]
pub trait Registry: Send + Sync {
    /// List every tag of a repository
    async fn list_tags(&self, repository: &RepositoryRef) -> Result<Vec<String>, RegistryError>;

    /// Resolve a tag or digest to its manifest descriptor
    async fn get_descriptor(&self, image: &ImageReference) -> Result<Descriptor, RegistryError>;
}

/// Client for interacting with OCI-compatible container registries
pub struct RegistryClient {
    client: reqwest::Client,
    auth: Authenticator,
    page_size: usize,
}

impl RegistryClient {
    /// Create a client with the default request timeout
    pub fn new(credentials: Credentials) -> Result<Self, RegistryError> {
        Self::with_timeout(credentials, DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit per-request timeout
    pub fn with_timeout(credentials: Credentials, timeout: Duration) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sigscan/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::transport("http client", e))?;

        Ok(Self {
            client,
            auth: Authenticator::new(credentials),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Build a client from the loaded configuration
    pub fn from_config(config: &ScanConfig) -> Result<Self, RegistryError> {
        Self::with_timeout(
            config.credentials.clone(),
            Duration::from_secs(config.settings.request_timeout_secs),
        )
    }

    /// Number of tags requested per page when listing
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn authorize(&self, request: RequestBuilder, repository: &RepositoryRef) -> RequestBuilder {
        if let Credentials::Bearer { token } = self.auth.credentials() {
            return request.bearer_auth(token);
        }
        match self.auth.cached(&repository.repository) {
            Some(CachedAuth::Bearer(token)) => request.bearer_auth(token),
            Some(CachedAuth::Basic) => match self.auth.basic_pair() {
                Some((username, password)) => request.basic_auth(username, Some(password)),
                None => request,
            },
            None => request,
        }
    }

    /// Send a request, answering one authentication challenge if the registry raises it
    async fn send<F>(
        &self,
        repository: &RepositoryRef,
        reference: &str,
        build: F,
    ) -> Result<Response, RegistryError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let response = self
            .authorize(build(), repository)
            .send()
            .await
            .map_err(|e| RegistryError::transport(reference, e))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|h| h.to_str().ok())
            .and_then(parse_challenge);

        let Some(challenge) = challenge else {
            return Ok(response);
        };
        if !self.authenticate(repository, reference, challenge).await? {
            return Ok(response);
        }

        self.authorize(build(), repository)
            .send()
            .await
            .map_err(|e| RegistryError::transport(reference, e))
    }

    /// Returns whether new credentials were obtained for the repository
    async fn authenticate(
        &self,
        repository: &RepositoryRef,
        reference: &str,
        challenge: Challenge,
    ) -> Result<bool, RegistryError> {
        if matches!(self.auth.credentials(), Credentials::Bearer { .. }) {
            return Ok(false);
        }

        match challenge {
            Challenge::Basic => {
                if self.auth.basic_pair().is_none() {
                    return Ok(false);
                }
                debug!("Registry requested basic auth for {}", repository);
                self.auth.store(&repository.repository, CachedAuth::Basic);
                Ok(true)
            }
            Challenge::Bearer {
                realm,
                service,
                scope,
            } => {
                let scope =
                    scope.unwrap_or_else(|| format!("repository:{}:pull", repository.repository));
                let token = self
                    .fetch_token(&realm, service.as_deref(), &scope, reference)
                    .await?;
                self.auth
                    .store(&repository.repository, CachedAuth::Bearer(token));
                Ok(true)
            }
        }
    }

    /// Exchange credentials for a bearer token at the challenge realm
    async fn fetch_token(
        &self,
        realm: &str,
        service: Option<&str>,
        scope: &str,
        reference: &str,
    ) -> Result<String, RegistryError> {
        let mut url = Url::parse(realm).map_err(|e| {
            RegistryError::communication(
                reference,
                None,
                format!("invalid token realm '{}': {}", realm, e),
            )
        })?;

        debug!(
            "Requesting {} token from {} (scope {})",
            self.auth.credentials().scheme(),
            realm,
            scope
        );

        let request = match self.auth.credentials() {
            Credentials::ClientCredentials {
                client_id,
                client_secret,
            } => {
                let mut form = url::form_urlencoded::Serializer::new(String::new());
                form.append_pair("grant_type", "client_credentials")
                    .append_pair("client_id", client_id)
                    .append_pair("client_secret", client_secret)
                    .append_pair("scope", scope);
                if let Some(service) = service {
                    form.append_pair("service", service);
                }
                self.client
                    .post(url)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(form.finish())
            }
            _ => {
                {
                    let mut query = url.query_pairs_mut();
                    if let Some(service) = service {
                        query.append_pair("service", service);
                    }
                    query.append_pair("scope", scope);
                }
                let request = self.client.get(url);
                match self.auth.basic_pair() {
                    Some((username, password)) => request.basic_auth(username, Some(password)),
                    None => request,
                }
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::transport(reference, e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(RegistryError::communication(
                reference,
                Some(status.as_u16()),
                format!("token request to {} failed ({})", realm, status),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| RegistryError::transport(reference, e))?;

        token.token.or(token.access_token).ok_or_else(|| {
            RegistryError::communication(reference, None, "token response carried no token")
        })
    }
}

#[async_trait]
impl Registry for RegistryClient {
    /// List all tags for a repository (handles pagination)
    async fn list_tags(&self, repository: &RepositoryRef) -> Result<Vec<String>, RegistryError> {
        let base = repository.base_url();
        let reference = repository.to_string();
        let mut all_tags = Vec::new();
        let mut url = format!(
            "{}/v2/{}/tags/list?n={}",
            base, repository.repository, self.page_size
        );

        loop {
            debug!("Listing tags from: {}", url);

            let response = self
                .send(repository, &reference, || self.client.get(&url))
                .await?;
            let response = check_status(response, &reference).await?;

            let next_url = response
                .headers()
                .get("link")
                .and_then(|h| h.to_str().ok())
                .and_then(|link| parse_link_header(link, &base));

            let page: TagsResponse = response
                .json()
                .await
                .map_err(|e| RegistryError::transport(&reference, e))?;

            all_tags.extend(page.tags.unwrap_or_default());

            match next_url {
                Some(next) if next != url => url = next,
                _ => break,
            }
        }

        trace!("Found {} tags total", all_tags.len());
        Ok(all_tags)
    }

    async fn get_descriptor(&self, image: &ImageReference) -> Result<Descriptor, RegistryError> {
        let repository = &image.repository;
        let reference = image.to_string();
        let url = format!(
            "{}/v2/{}/manifests/{}",
            repository.base_url(),
            repository.repository,
            image.reference
        );

        debug!("Fetching manifest from: {}", url);

        let response = self
            .send(repository, &reference, || {
                self.client.get(&url).header(ACCEPT, MANIFEST_ACCEPT)
            })
            .await?;
        let response = check_status(response, &reference).await?;

        let header_digest = response
            .headers()
            .get("docker-content-digest")
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let body = response
            .bytes()
            .await
            .map_err(|e| RegistryError::transport(&reference, e))?;

        let digest = match header_digest {
            Some(value) => Digest::parse(&value).map_err(|e| {
                RegistryError::communication(
                    &reference,
                    None,
                    format!("registry returned a malformed digest: {}", e),
                )
            })?,
            None => Digest::of_bytes(&body),
        };

        let media_type = content_type
            .or_else(|| {
                serde_json::from_slice::<ManifestHead>(&body)
                    .ok()
                    .and_then(|m| m.media_type)
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(Descriptor {
            digest,
            media_type,
            size: Some(body.len() as u64),
        })
    }
}

/// Map non-success statuses onto the error taxonomy
async fn check_status(response: Response, reference: &str) -> Result<Response, RegistryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RegistryError::not_found(reference));
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.trim().chars().take(200).collect();
    let message = match (status, body.is_empty()) {
        (StatusCode::UNAUTHORIZED, _) => {
            format!("HTTP {}: check the configured registry credentials", status)
        }
        (_, true) => format!("HTTP {}", status),
        (_, false) => format!("HTTP {}: {}", status, body),
    };
    Err(RegistryError::communication(
        reference,
        Some(status.as_u16()),
        message,
    ))
}

/// Parse Link header for pagination
/// Format: </v2/repo/tags/list?n=100&last=tag>; rel="next"
fn parse_link_header(link: &str, base_url: &str) -> Option<String> {
    for part in link.split(',') {
        let part = part.trim();
        if part.contains("rel=\"next\"") {
            let (_, rest) = part.split_once('<')?;
            let (url, _) = rest.split_once('>')?;
            if url.starts_with('/') {
                return Some(format!("{}{}", base_url, url));
            }
            return Some(url.to_string());
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestHead {
    #[serde(default)]
    media_type: Option<String>,
}
