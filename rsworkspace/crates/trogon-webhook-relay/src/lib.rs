//! # trogon-webhook-relay
//!
//! Authenticating webhook relay that forwards third-party callbacks to agent
//! hosts.
//!
//! ## How it works
//!
//! 1. A webhook provider sends `POST <mount>/<path>`. The mount's addressing
//!    convention turns the path into a `(source, destination, topic)` triple,
//!    e.g. `/v1/webhooks/apps/github/hosts/nima` → `(github, nima, github)`.
//! 2. The source and destination must be declared in the config file; a source
//!    bound to one destination may not be reached through another.
//! 3. The raw body is checked with the source's auth strategy
//!    (`hmac_sha256`, `bearer` or `token`). Rejections answer `401` and the
//!    reason only goes to the debug log.
//! 4. The body is forwarded once, under the destination's timeout, either
//!    verbatim to `<base_url>/webhooks/<topic>` or wrapped in an agent event
//!    envelope and sent to `<base_url>/hooks/agent` with the destination token.
//! 5. The downstream status, `content-type` and body are returned as-is.
//!    Timeouts answer `504`, other transport failures `502`.
//!
//! ## Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | `GET` | `/healthz` | Declared sources, apps, hosts and mounts |
//! | `POST` | `/v1/webhooks/apps/:source[/hosts]/:destination[/:topic]` | Source-first mount |
//! | `POST` | `/v1/webhooks/hosts/:destination[/apps]/:source[/:topic]` | Destination-first mount |
//!
//! Mounts are replaced wholesale when the config file declares `[[routes]]`.
//!
//! ## Configuration
//!
//! TOML file (see [`config`]); secrets may be inline or named through
//! `secret_env` / `token_env`. CLI flags and env vars:
//!
//! | Flag | Variable | Default | Description |
//! |---|---|---|---|
//! | `--config` | `RELAY_CONFIG` | `config/webhook-relay.toml` | Config file path |
//! | `--host` | `HOST` | from file, else `0.0.0.0` | Listen address |
//! | `--port` | `PORT` | from file, else `8787` | Listen port |
//! | | `RUST_LOG` | from `server.log_level` | Overrides the log filter |

pub mod auth;
pub mod config;
pub mod env;
pub mod envelope;
pub mod error;
pub mod forward;
pub mod resolve;
pub mod server;
pub mod signature;
pub mod telemetry;

pub use config::{ConfigError, RelayConfig};
pub use error::RelayError;
pub use server::{AppState, router, serve};
