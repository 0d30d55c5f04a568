//! Untyped TOML layer, deserialized as-is and validated by
//! [`RelayConfig`](super::RelayConfig).

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::auth::AuthKind;
use crate::resolve::ConventionKind;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    pub server: RawServer,
    #[serde(default)]
    pub destinations: BTreeMap<String, RawDestination>,
    #[serde(default)]
    pub sources: BTreeMap<String, RawSource>,
    #[serde(default)]
    pub apps: BTreeMap<String, RawApp>,
    #[serde(default)]
    pub routes: Vec<RawRoute>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawServer {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDestination {
    pub base_url: Option<String>,
    pub timeout_ms: Option<u64>,
    pub token: Option<String>,
    pub token_env: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawSource {
    pub auth: AuthKind,
    pub secret: Option<String>,
    pub secret_env: Option<String>,
    pub header: Option<String>,
    pub route: Option<RawBinding>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBinding {
    pub destination: String,
    pub topic: Option<String>,
    pub envelope: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawApp {
    pub auth: Option<AuthKind>,
    pub token: Option<String>,
    pub token_env: Option<String>,
    pub header: Option<String>,
    pub destination: Option<String>,
    pub topic: Option<String>,
    pub envelope: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRoute {
    pub prefix: String,
    pub convention: ConventionKind,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub topic: Option<String>,
}
