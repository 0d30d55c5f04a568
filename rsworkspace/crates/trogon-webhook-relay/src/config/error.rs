//! Configuration loading and validation errors.
//!
//! Every variant is fatal: the relay refuses to start rather than serve with
//! a partially valid configuration.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid listen host '{host}'")]
    InvalidHost { host: String },

    #[error("unknown log level '{value}' (expected error, warn, info or debug)")]
    UnknownLogLevel { value: String },

    #[error("server.allowed_origins must contain at least one non-empty origin")]
    EmptyOrigins,

    #[error("destination '{destination}' has no base_url")]
    MissingBaseUrl { destination: String },

    #[error("destination '{destination}' has invalid base_url '{url}': {message}")]
    InvalidBaseUrl {
        destination: String,
        url: String,
        message: String,
    },

    #[error("destination '{destination}' has timeout_ms = 0")]
    ZeroTimeout { destination: String },

    #[error("{owner} sets both {field} and {field}_env")]
    ConflictingSecret { owner: String, field: &'static str },

    #[error("{owner} has an empty {field}")]
    EmptySecret { owner: String, field: &'static str },

    #[error("environment variable '{var}' not set (required for {owner})")]
    MissingEnvVar { var: String, owner: String },

    #[error("{owner} declares no {field} (set {field} or {field}_env)")]
    MissingSecretRef { owner: String, field: &'static str },

    #[error("{owner} has invalid header name '{header}'")]
    InvalidHeader { owner: String, header: String },

    #[error("{owner} does not name a destination")]
    MissingDestinationRef { owner: String },

    #[error("{owner} references undeclared destination '{destination}'")]
    UnknownDestination { owner: String, destination: String },

    #[error("{owner} references undeclared source '{source_id}'")]
    UnknownSource { owner: String, source_id: String },

    #[error("id '{id}' is declared in both [sources] and [apps]")]
    DuplicateId { id: String },

    #[error("route prefix '{prefix}' must be '/'-separated literal segments without a trailing '/'")]
    InvalidPrefix { prefix: String },

    #[error("route prefix '{prefix}' is nested under path mount '{parent}'")]
    OverlappingPrefix { prefix: String, parent: String },

    #[error("route prefix '{prefix}' is reserved")]
    ReservedPrefix { prefix: String },

    #[error("route prefix '{prefix}' is declared more than once")]
    DuplicatePrefix { prefix: String },

    #[error("fixed route '{prefix}' must set both source and destination")]
    FixedRouteIncomplete { prefix: String },
}
