//! Relay configuration.
//!
//! Loaded once at startup from a TOML file and validated all-or-nothing into
//! an immutable [`RelayConfig`]. Secrets can be written inline or indirected
//! through environment variable names (`secret_env`, `token_env`).
//!
//! Secrets of unbound sources stay indirected and are read per request, so
//! rotating an environment-provided webhook secret does not need a config
//! reload. Every destination token, and the inbound credential of every
//! explicit route binding (apps and sources with a `route`), is resolved here
//! and must be present.

mod error;
mod raw;

use std::collections::{BTreeMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use axum::http::HeaderName;
use url::Url;

pub use error::ConfigError;
use raw::{RawApp, RawBinding, RawConfig, RawDestination, RawRoute, RawSource};

use crate::auth::{AuthKind, AuthStrategy};
use crate::env::ReadEnv;
use crate::resolve::{AddressingConvention, ConventionKind};
use crate::telemetry::LogLevel;

pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);
pub const DEFAULT_APPS_PREFIX: &str = "/v1/webhooks/apps";
pub const DEFAULT_HOSTS_PREFIX: &str = "/v1/webhooks/hosts";
pub const HEALTH_PATH: &str = "/healthz";

/// Where a secret comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretRef {
    Inline(String),
    Env(String),
}

impl SecretRef {
    /// Current value, or `None` when the variable is unset or blank.
    pub fn resolve<E: ReadEnv + ?Sized>(&self, env: &E) -> Option<String> {
        match self {
            Self::Inline(value) => Some(value.clone()),
            Self::Env(var) => env.non_empty_var(var),
        }
    }

    pub fn env_var(&self) -> Option<&str> {
        match self {
            Self::Inline(_) => None,
            Self::Env(var) => Some(var),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub id: String,
    /// Without trailing `/`.
    pub base_url: String,
    pub timeout: Duration,
    /// Sent as `Authorization: Bearer <token>` with enveloped payloads.
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Declared under `[sources]`.
    Source,
    /// Declared under `[apps]`: explicit binding, credential checked at load.
    App,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBinding {
    pub destination: String,
    pub topic: Option<String>,
    /// Event name used when wrapping the payload; `None` means passthrough.
    pub envelope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub id: String,
    pub kind: SourceKind,
    pub auth: AuthStrategy,
    pub secret: SecretRef,
    pub binding: Option<RouteBinding>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMount {
    pub prefix: String,
    pub convention: AddressingConvention,
}

impl RouteMount {
    pub fn usage(&self) -> Vec<String> {
        self.convention.usage(&self.prefix)
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    host: IpAddr,
    port: u16,
    log_level: LogLevel,
    allowed_origins: Option<Vec<String>>,
    destinations: BTreeMap<String, Destination>,
    sources: BTreeMap<String, Source>,
    mounts: Vec<RouteMount>,
}

impl RelayConfig {
    /// Reads and validates a TOML config file.
    pub fn from_file<E: ReadEnv + ?Sized>(path: impl AsRef<Path>, env: &E) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, env)
    }

    pub fn from_toml_str<E: ReadEnv + ?Sized>(content: &str, env: &E) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;
        Self::validate(raw, env)
    }

    fn validate<E: ReadEnv + ?Sized>(raw: RawConfig, env: &E) -> Result<Self, ConfigError> {
        let host = match raw.server.host.as_deref().map(str::trim) {
            None => DEFAULT_HOST,
            Some(host) => host.parse().map_err(|_| ConfigError::InvalidHost {
                host: host.to_string(),
            })?,
        };

        let log_level = match raw.server.log_level.as_deref() {
            None => LogLevel::default(),
            Some(value) => value.parse().map_err(|_| ConfigError::UnknownLogLevel {
                value: value.to_string(),
            })?,
        };

        let allowed_origins = match raw.server.allowed_origins {
            None => None,
            Some(origins) => {
                let origins: Vec<String> = origins
                    .iter()
                    .map(|o| o.trim())
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect();
                if origins.is_empty() {
                    return Err(ConfigError::EmptyOrigins);
                }
                Some(origins)
            }
        };

        let mut destinations = BTreeMap::new();
        for (id, raw_dest) in raw.destinations {
            let destination = build_destination(&id, raw_dest, env)?;
            destinations.insert(id, destination);
        }

        let mut sources = BTreeMap::new();
        for (id, raw_source) in raw.sources {
            let source = build_source(&id, raw_source, &destinations, env)?;
            sources.insert(id, source);
        }
        for (id, raw_app) in raw.apps {
            if sources.contains_key(&id) {
                return Err(ConfigError::DuplicateId { id });
            }
            let app = build_app(&id, raw_app, &destinations, env)?;
            sources.insert(id, app);
        }

        let mounts = build_mounts(raw.routes, &sources, &destinations)?;

        Ok(Self {
            host,
            port: raw.server.port.unwrap_or(DEFAULT_PORT),
            log_level,
            allowed_origins,
            destinations,
            sources,
            mounts,
        })
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn allowed_origins(&self) -> Option<&[String]> {
        self.allowed_origins.as_deref()
    }

    pub fn destination(&self, id: &str) -> Option<&Destination> {
        self.destinations.get(id)
    }

    pub fn source(&self, id: &str) -> Option<&Source> {
        self.sources.get(id)
    }

    pub fn destination_ids(&self) -> Vec<&str> {
        self.destinations.keys().map(String::as_str).collect()
    }

    pub fn source_ids(&self, kind: SourceKind) -> Vec<&str> {
        self.sources
            .values()
            .filter(|s| s.kind == kind)
            .map(|s| s.id.as_str())
            .collect()
    }

    pub fn mounts(&self) -> &[RouteMount] {
        &self.mounts
    }

    pub fn usage(&self) -> Vec<String> {
        self.mounts.iter().flat_map(RouteMount::usage).collect()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_field(field: &'static str) -> &'static str {
    match field {
        "secret" => "secret_env",
        "token" => "token_env",
        _ => field,
    }
}

fn secret_ref(
    owner: &str,
    field: &'static str,
    inline: Option<String>,
    env_name: Option<String>,
) -> Result<Option<SecretRef>, ConfigError> {
    match (inline, env_name) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingSecret {
            owner: owner.to_string(),
            field,
        }),
        (Some(value), None) if value.trim().is_empty() => Err(ConfigError::EmptySecret {
            owner: owner.to_string(),
            field,
        }),
        (Some(value), None) => Ok(Some(SecretRef::Inline(value))),
        (None, Some(var)) if var.trim().is_empty() => Err(ConfigError::EmptySecret {
            owner: owner.to_string(),
            field: env_field(field),
        }),
        (None, Some(var)) => Ok(Some(SecretRef::Env(var.trim().to_string()))),
        (None, None) => Ok(None),
    }
}

fn resolve_now<E: ReadEnv + ?Sized>(owner: &str, secret: SecretRef, env: &E) -> Result<String, ConfigError> {
    match secret {
        SecretRef::Inline(value) => Ok(value),
        SecretRef::Env(var) => env.non_empty_var(&var).ok_or(ConfigError::MissingEnvVar {
            var,
            owner: owner.to_string(),
        }),
    }
}

fn parse_header(owner: &str, header: Option<String>) -> Result<Option<HeaderName>, ConfigError> {
    match non_blank(header) {
        None => Ok(None),
        Some(name) => HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes())
            .map(Some)
            .map_err(|_| ConfigError::InvalidHeader {
                owner: owner.to_string(),
                header: name,
            }),
    }
}

fn build_destination<E: ReadEnv + ?Sized>(
    id: &str,
    raw: RawDestination,
    env: &E,
) -> Result<Destination, ConfigError> {
    let owner = format!("destination '{id}'");

    let base_url = non_blank(raw.base_url)
        .map(|u| u.trim_end_matches('/').to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ConfigError::MissingBaseUrl {
            destination: id.to_string(),
        })?;

    let invalid = |message: String| ConfigError::InvalidBaseUrl {
        destination: id.to_string(),
        url: base_url.clone(),
        message,
    };
    let parsed = Url::parse(&base_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https".to_string()));
    }

    let timeout = match raw.timeout_ms {
        None => DEFAULT_TIMEOUT,
        Some(0) => {
            return Err(ConfigError::ZeroTimeout {
                destination: id.to_string(),
            });
        }
        Some(ms) => Duration::from_millis(ms),
    };

    let token = secret_ref(&owner, "token", raw.token, raw.token_env)?.ok_or_else(|| {
        ConfigError::MissingSecretRef {
            owner: owner.clone(),
            field: "token",
        }
    })?;
    let token = resolve_now(&owner, token, env)?;

    Ok(Destination {
        id: id.to_string(),
        base_url,
        timeout,
        token,
    })
}

fn build_binding(
    owner: &str,
    destination: String,
    topic: Option<String>,
    envelope: Option<String>,
    destinations: &BTreeMap<String, Destination>,
) -> Result<RouteBinding, ConfigError> {
    let target = destinations
        .get(destination.trim())
        .ok_or_else(|| ConfigError::UnknownDestination {
            owner: owner.to_string(),
            destination: destination.clone(),
        })?;

    Ok(RouteBinding {
        destination: target.id.clone(),
        topic: non_blank(topic),
        envelope: non_blank(envelope),
    })
}

fn build_source<E: ReadEnv + ?Sized>(
    id: &str,
    raw: RawSource,
    destinations: &BTreeMap<String, Destination>,
    env: &E,
) -> Result<Source, ConfigError> {
    let owner = format!("source '{id}'");
    let header = parse_header(&owner, raw.header)?;
    let secret = secret_ref(&owner, "secret", raw.secret, raw.secret_env)?.ok_or_else(|| {
        ConfigError::MissingSecretRef {
            owner: owner.clone(),
            field: "secret",
        }
    })?;
    let binding = raw
        .route
        .map(|RawBinding { destination, topic, envelope }| {
            build_binding(&owner, destination, topic, envelope, destinations)
        })
        .transpose()?;

    // A bound source is an explicit pairing; its credential must exist now.
    let secret = match binding {
        Some(_) => SecretRef::Inline(resolve_now(&owner, secret, env)?),
        None => secret,
    };

    Ok(Source {
        id: id.to_string(),
        kind: SourceKind::Source,
        auth: AuthStrategy::new(raw.auth, header),
        secret,
        binding,
    })
}

fn build_app<E: ReadEnv + ?Sized>(
    id: &str,
    raw: RawApp,
    destinations: &BTreeMap<String, Destination>,
    env: &E,
) -> Result<Source, ConfigError> {
    let owner = format!("app '{id}'");
    let header = parse_header(&owner, raw.header)?;
    let secret = secret_ref(&owner, "token", raw.token, raw.token_env)?.ok_or_else(|| {
        ConfigError::MissingSecretRef {
            owner: owner.clone(),
            field: "token",
        }
    })?;
    let token = resolve_now(&owner, secret, env)?;

    let destination = non_blank(raw.destination).ok_or_else(|| ConfigError::MissingDestinationRef {
        owner: owner.clone(),
    })?;
    let binding = build_binding(&owner, destination, raw.topic, raw.envelope, destinations)?;

    Ok(Source {
        id: id.to_string(),
        kind: SourceKind::App,
        auth: AuthStrategy::new(raw.auth.unwrap_or(AuthKind::Token), header),
        secret: SecretRef::Inline(token),
        binding: Some(binding),
    })
}

fn default_mounts() -> Vec<RouteMount> {
    vec![
        RouteMount {
            prefix: DEFAULT_APPS_PREFIX.to_string(),
            convention: AddressingConvention::SourceFirst,
        },
        RouteMount {
            prefix: DEFAULT_HOSTS_PREFIX.to_string(),
            convention: AddressingConvention::DestinationFirst,
        },
    ]
}

fn build_mounts(
    routes: Vec<RawRoute>,
    sources: &BTreeMap<String, Source>,
    destinations: &BTreeMap<String, Destination>,
) -> Result<Vec<RouteMount>, ConfigError> {
    if routes.is_empty() {
        return Ok(default_mounts());
    }

    let mut seen = HashSet::new();
    let mut mounts = Vec::with_capacity(routes.len());

    for route in routes {
        let prefix = route.prefix.trim().to_string();
        if !is_literal_prefix(&prefix) {
            return Err(ConfigError::InvalidPrefix { prefix });
        }
        if prefix == HEALTH_PATH {
            return Err(ConfigError::ReservedPrefix { prefix });
        }
        if !seen.insert(prefix.clone()) {
            return Err(ConfigError::DuplicatePrefix { prefix });
        }

        let convention = match route.convention {
            ConventionKind::SourceFirst => AddressingConvention::SourceFirst,
            ConventionKind::DestinationFirst => AddressingConvention::DestinationFirst,
            ConventionKind::Fixed => {
                let owner = format!("route '{prefix}'");
                let (Some(source), Some(destination)) = (non_blank(route.source), non_blank(route.destination))
                else {
                    return Err(ConfigError::FixedRouteIncomplete { prefix });
                };
                if !sources.contains_key(&source) {
                    return Err(ConfigError::UnknownSource {
                        owner,
                        source_id: source,
                    });
                }
                if !destinations.contains_key(&destination) {
                    return Err(ConfigError::UnknownDestination { owner, destination });
                }
                AddressingConvention::Fixed {
                    source,
                    destination,
                    topic: non_blank(route.topic),
                }
            }
        };

        mounts.push(RouteMount { prefix, convention });
    }

    // A path mount owns everything below its prefix.
    for parent in mounts.iter().filter(|m| !matches!(m.convention, AddressingConvention::Fixed { .. })) {
        let below = format!("{}/", parent.prefix);
        if let Some(nested) = mounts.iter().find(|m| m.prefix.starts_with(&below)) {
            return Err(ConfigError::OverlappingPrefix {
                prefix: nested.prefix.clone(),
                parent: parent.prefix.clone(),
            });
        }
    }

    Ok(mounts)
}

/// `/seg[/seg...]` with plain segments; anything the router would read as a
/// pattern (`{param}`, `{*rest}`, `:param`) or that can never match is refused.
fn is_literal_prefix(prefix: &str) -> bool {
    let Some(rest) = prefix.strip_prefix('/') else {
        return false;
    };
    !rest.is_empty()
        && rest.split('/').all(|segment| {
            !segment.is_empty()
                && !segment.starts_with(':')
                && !segment
                    .chars()
                    .any(|c| matches!(c, '{' | '}' | '*' | '?' | '#') || c.is_whitespace())
        })
}
