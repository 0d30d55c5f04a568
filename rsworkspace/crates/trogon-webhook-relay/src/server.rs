use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::{debug, info, instrument, warn};

use crate::auth::AuthVerdict;
use crate::config::{Destination, HEALTH_PATH, RelayConfig, Source, SourceKind};
use crate::env::ReadEnv;
use crate::envelope;
use crate::error::RelayError;
use crate::forward::{
    Forwarder, OutboundRequest, RELAY_ID, agent_hook_url, envelope_headers, passthrough_headers, webhook_url,
};
use crate::resolve::{AddressingConvention, ResolvedRoute, resolve};

/// Upper bound on a buffered inbound body.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared, read-only request context.
#[derive(Clone)]
pub struct AppState {
    config: Arc<RelayConfig>,
    env: Arc<dyn ReadEnv + Send + Sync>,
    forwarder: Forwarder,
}

impl AppState {
    pub fn new(config: RelayConfig, env: Arc<dyn ReadEnv + Send + Sync>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            config: Arc::new(config),
            env,
            forwarder: Forwarder::new()?,
        })
    }
}

/// Builds the relay router: `/healthz`, one handler per route mount and a
/// `not_found` fallback listing what is accepted.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new().route(HEALTH_PATH, get(healthz));

    for mount in state.config.mounts() {
        let convention = Arc::new(mount.convention.clone());

        app = match mount.convention {
            AddressingConvention::Fixed { .. } => app.route(
                &mount.prefix,
                post(move |State(state): State<AppState>, request: Request| {
                    let convention = Arc::clone(&convention);
                    async move { relay(&state, &convention, "", request).await }
                }),
            ),
            AddressingConvention::SourceFirst | AddressingConvention::DestinationFirst => app
                .route(&mount.prefix, post(missing_path))
                .route(&format!("{}/", mount.prefix), post(missing_path))
                .route(
                    &format!("{}/{{*path}}", mount.prefix),
                    post(
                        move |State(state): State<AppState>,
                              path: Result<Path<String>, PathRejection>,
                              request: Request| {
                            let convention = Arc::clone(&convention);
                            async move { relay_path(&state, &convention, path, request).await }
                        },
                    ),
                ),
        };
    }

    let cors = state.config.allowed_origins().map(cors_layer);
    let app = app.fallback(not_found).with_state(state);
    match cors {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

/// Serves until the listener fails. Peer addresses are made available to
/// handlers for `x-forwarded-for`.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    info!(
        addr = %addr,
        mounts = state.config.mounts().len(),
        destinations = state.config.destination_ids().len(),
        "Webhook relay listening"
    );

    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring allowed origin that is not a valid header value");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = &state.config;
    Json(json!({
        "ok": true,
        "service": RELAY_ID,
        "sources": config.source_ids(SourceKind::Source),
        "apps": config.source_ids(SourceKind::App),
        "hosts": config.destination_ids(),
        "routes": config.usage(),
    }))
}

async fn not_found(State(state): State<AppState>) -> Response {
    let config = &state.config;
    let body = json!({
        "ok": false,
        "error": "not_found",
        "usage": config.usage(),
        "sources": config.source_ids(SourceKind::Source),
        "apps": config.source_ids(SourceKind::App),
        "hosts": config.destination_ids(),
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

async fn missing_path() -> RelayError {
    RelayError::InvalidPath
}

/// Path mounts: the remainder must percent-decode to UTF-8.
async fn relay_path(
    state: &AppState,
    convention: &AddressingConvention,
    path: Result<Path<String>, PathRejection>,
    request: Request,
) -> Result<Response, RelayError> {
    let Path(path) = path.map_err(|rejection| {
        debug!(error = %rejection, "Rejected undecodable webhook path");
        RelayError::InvalidPath
    })?;
    relay(state, convention, &path, request).await
}

#[instrument(
    name = "webhook.relay",
    skip_all,
    fields(
        source = tracing::field::Empty,
        destination = tracing::field::Empty,
        topic = tracing::field::Empty,
    )
)]
async fn relay(
    state: &AppState,
    convention: &AddressingConvention,
    path: &str,
    request: Request,
) -> Result<Response, RelayError> {
    let route = resolve(convention, path).map_err(|_| RelayError::InvalidPath)?;

    let span = tracing::Span::current();
    span.record("source", route.source.as_str());
    span.record("destination", route.destination.as_str());

    let source = state
        .config
        .source(&route.source)
        .ok_or_else(|| RelayError::UnknownSource(route.source.clone()))?;
    let destination = state
        .config
        .destination(&route.destination)
        .ok_or_else(|| RelayError::UnknownDestination(route.destination.clone()))?;

    let topic = effective_topic(source, &route);
    span.record("topic", topic.as_str());
    debug!(convention = ?convention.kind(), "Resolved webhook route");

    if let Some(binding) = &source.binding {
        if binding.destination != destination.id {
            debug!(bound_to = %binding.destination, "Source reached through a foreign destination");
            return Err(RelayError::RouteNotAllowed);
        }
    }

    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| RelayError::ReadBody(e.to_string()))?;

    authenticate(state, source, &parts, &body)?;

    let outbound = outbound_request(source, destination, &topic, &parts, body)?;
    let forwarded = state.forwarder.execute(outbound).await?;

    info!(
        source = %source.id,
        topic = %topic,
        destination = %destination.id,
        status = forwarded.status.as_u16(),
        bytes = forwarded.body.len(),
        "Forwarded webhook"
    );
    Ok(forwarded.into_response())
}

/// A binding's topic wins over the one in the path.
fn effective_topic(source: &Source, route: &ResolvedRoute) -> String {
    source
        .binding
        .as_ref()
        .and_then(|b| b.topic.clone())
        .unwrap_or_else(|| route.topic.clone())
}

fn authenticate(state: &AppState, source: &Source, parts: &Parts, body: &[u8]) -> Result<(), RelayError> {
    let secret = source.secret.resolve(state.env.as_ref());

    match source.auth.verify(&parts.headers, body, secret.as_deref()) {
        AuthVerdict::Accepted => {
            debug!(auth = ?source.auth.kind(), "Accepted webhook credentials");
            Ok(())
        }
        AuthVerdict::MissingSecretConfig => match source.secret.env_var() {
            Some(var) => Err(RelayError::MissingSecretEnv(var.to_string())),
            None => Err(RelayError::ConfigFault(format!("source '{}' has no secret", source.id))),
        },
        verdict => {
            debug!(
                reason = verdict.reason(),
                header = %source.auth.header(),
                "Rejected webhook credentials"
            );
            Err(RelayError::Unauthorized)
        }
    }
}

fn outbound_request(
    source: &Source,
    destination: &Destination,
    topic: &str,
    parts: &Parts,
    body: Bytes,
) -> Result<OutboundRequest, RelayError> {
    let envelope_name = source.binding.as_ref().and_then(|b| b.envelope.as_deref());

    let Some(name) = envelope_name else {
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        return Ok(OutboundRequest {
            url: webhook_url(&destination.base_url, topic, parts.uri.query()),
            headers: passthrough_headers(&parts.headers, remote),
            body,
            timeout: destination.timeout,
        });
    };

    let headers = envelope_headers(&destination.token).map_err(|_| {
        RelayError::ConfigFault(format!(
            "destination '{}' token is not a valid header value",
            destination.id
        ))
    })?;

    Ok(OutboundRequest {
        url: agent_hook_url(&destination.base_url),
        headers,
        body: envelope::wrap(name, &body),
        timeout: destination.timeout,
    })
}
