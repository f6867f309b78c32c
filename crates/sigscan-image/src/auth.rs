//! Registry authentication: credentials plus the tokens obtained with them

use sigscan_core::Credentials;
use std::collections::HashMap;
use std::sync::RwLock;

/// Credentials supplied once and reused for every registry call.
///
/// Bearer tokens obtained through a token exchange are cached per
/// repository, so only the first call against a repository pays for the
/// exchange.
#[derive(Debug, Default)]
pub struct Authenticator {
    credentials: Credentials,
    tokens: RwLock<HashMap<String, CachedAuth>>,
}

#[derive(Clone, PartialEq, Eq)]
pub(crate) enum CachedAuth {
    /// The registry asked for HTTP basic credentials
    Basic,
    /// Token issued by the registry's token realm
    Bearer(String),
}

impl std::fmt::Debug for CachedAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CachedAuth::Basic => write!(f, "Basic"),
            CachedAuth::Bearer(_) => write!(f, "Bearer(<redacted>)"),
        }
    }
}

impl Authenticator {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn cached(&self, repository: &str) -> Option<CachedAuth> {
        self.tokens
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(repository)
            .cloned()
    }

    pub(crate) fn store(&self, repository: &str, auth: CachedAuth) {
        self.tokens
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(repository.to_string(), auth);
    }

    /// Username/password to present for basic auth, if any
    pub(crate) fn basic_pair(&self) -> Option<(&str, &str)> {
        match &self.credentials {
            Credentials::Basic { username, password } => Some((username, password)),
            Credentials::ClientCredentials {
                client_id,
                client_secret,
            } => Some((client_id, client_secret)),
            _ => None,
        }
    }
}

/// A parsed `WWW-Authenticate` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Challenge {
    Basic,
    Bearer {
        realm: String,
        service: Option<String>,
        scope: Option<String>,
    },
}

/// Parse `Basic realm="..."` or `Bearer realm="...",service="...",scope="..."`
pub(crate) fn parse_challenge(header: &str) -> Option<Challenge> {
    let header = header.trim();
    let (scheme, params) = header.split_once(char::is_whitespace).unwrap_or((header, ""));

    if scheme.eq_ignore_ascii_case("basic") {
        return Some(Challenge::Basic);
    }
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let params = parse_params(params);
    let realm = params.get("realm")?.clone();
    Some(Challenge::Bearer {
        realm,
        service: params.get("service").cloned(),
        scope: params.get("scope").cloned(),
    })
}

// Values are quoted and may contain commas (e.g. multiple scopes), so this
// walks the string instead of splitting on ','.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim();

    while !rest.is_empty() {
        let Some((key, after_key)) = rest.split_once('=') else {
            break;
        };
        let key = key.trim().trim_start_matches(',').trim().to_ascii_lowercase();
        let after_key = after_key.trim_start();

        let (value, remainder) = if let Some(quoted) = after_key.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after_key.find(',') {
                Some(end) => (&after_key[..end], &after_key[end..]),
                None => (after_key, ""),
            }
        };

        params.insert(key, value.to_string());
        rest = remainder.trim_start().trim_start_matches(',').trim_start();
    }

    params
}
