//! Configuration file loading and credential resolution

use crate::error::{Error, Result};
use crate::types::ScanSettings;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::fmt;
use std::fs;
use tracing::{debug, warn};

/// Configuration file read when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// On-disk layout of config.yaml
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    registry_url: String,
    #[serde(default)]
    compartment_ocid: String,
    #[serde(default)]
    image_repository: String,
    #[serde(default)]
    image_tag: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    scan: ScanSettings,
}

/// The single authentication scheme used for every registry call
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Credentials {
    /// No credentials; token exchanges are attempted anonymously
    #[default]
    Anonymous,
    /// HTTP basic username/password
    Basic { username: String, password: String },
    /// Pre-issued bearer access token, sent as-is
    Bearer { token: String },
    /// OAuth-style client credentials, exchanged at the registry token realm
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
}

impl Credentials {
    /// Short scheme name for logs
    pub fn scheme(&self) -> &'static str {
        match self {
            Credentials::Anonymous => "anonymous",
            Credentials::Basic { .. } => "basic",
            Credentials::Bearer { .. } => "bearer",
            Credentials::ClientCredentials { .. } => "client-credentials",
        }
    }
}

// Secrets never reach logs or panic messages.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Anonymous => write!(f, "Anonymous"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
            Credentials::ClientCredentials { client_id, .. } => f
                .debug_struct("ClientCredentials")
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
        }
    }
}

/// Loaded and validated sigscan configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Registry host, optionally with an explicit `http://` or `https://` scheme
    pub registry_url: String,

    /// Compartment / namespace path prefixed to the repository (may be empty)
    pub namespace: String,

    /// Repository name inside the namespace
    pub repository: String,

    /// Optional fixed tag used by `inspect`
    pub image_tag: Option<String>,

    /// Resolved authentication scheme
    pub credentials: Credentials,

    /// Scan tuning
    pub settings: ScanSettings,

    /// Path the configuration was read from, if any
    pub config_path: Option<Utf8PathBuf>,
}

impl ScanConfig {
    /// Load configuration from `path`, or `config.yaml` in the working directory
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Utf8Path::new(DEFAULT_CONFIG_FILE));
        debug!("Loading configuration from {}", path);

        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(path.as_str())
            } else {
                Error::Io(e)
            }
        })?;

        let mut config = Self::from_yaml(&content)?;
        config.config_path = Some(path.to_owned());
        Ok(config)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml_ng::from_str(content)?;

        let registry_url = required("registry_url", &file.registry_url)?;
        let repository = required("image_repository", &file.image_repository)?;
        let namespace = file.compartment_ocid.trim().trim_matches('/').to_string();

        if file.scan.concurrency == 0 {
            return Err(Error::invalid_config("scan.concurrency must be at least 1"));
        }
        if file.scan.request_timeout_secs == 0 {
            return Err(Error::invalid_config(
                "scan.request_timeout_secs must be at least 1",
            ));
        }
        if file.scan.retry.max_attempts == 0 {
            return Err(Error::invalid_config(
                "scan.retry.max_attempts must be at least 1",
            ));
        }

        let credentials = resolve_credentials(&file)?;
        debug!("Using {} registry authentication", credentials.scheme());

        Ok(Self {
            registry_url,
            namespace,
            repository,
            image_tag: non_empty(file.image_tag),
            credentials,
            settings: file.scan,
            config_path: None,
        })
    }

    /// Repository path as addressed on the registry (`namespace/repository`)
    pub fn repository_path(&self) -> String {
        if self.namespace.is_empty() {
            self.repository.clone()
        } else {
            format!("{}/{}", self.namespace, self.repository)
        }
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::missing_field(field));
    }
    Ok(trimmed.to_string())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Pick one scheme: access token, then username/password, then client credentials.
fn resolve_credentials(file: &ConfigFile) -> Result<Credentials> {
    let token = non_empty(file.access_token.clone());
    let basic = pair(
        "username",
        file.username.clone(),
        "password",
        file.password.clone(),
    )?;
    let client = pair(
        "client_id",
        file.client_id.clone(),
        "client_secret",
        file.client_secret.clone(),
    )?;

    let configured = [token.is_some(), basic.is_some(), client.is_some()]
        .iter()
        .filter(|set| **set)
        .count();
    if configured > 1 {
        warn!("Multiple authentication schemes configured; using the highest precedence one");
    }

    if let Some(token) = token {
        return Ok(Credentials::Bearer { token });
    }
    if let Some((username, password)) = basic {
        return Ok(Credentials::Basic { username, password });
    }
    if let Some((client_id, client_secret)) = client {
        return Ok(Credentials::ClientCredentials {
            client_id,
            client_secret,
        });
    }
    Ok(Credentials::Anonymous)
}

fn pair(
    first_name: &str,
    first: Option<String>,
    second_name: &str,
    second: Option<String>,
) -> Result<Option<(String, String)>> {
    match (non_empty(first), non_empty(second)) {
        (Some(a), Some(b)) => Ok(Some((a, b))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(Error::missing_field(second_name)),
        (None, Some(_)) => Err(Error::missing_field(first_name)),
    }
}
