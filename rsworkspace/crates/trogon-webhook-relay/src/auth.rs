//! Inbound authentication strategies.
//!
//! Each source declares exactly one [`AuthStrategy`]. Verification is a pure
//! function of the request headers, the raw body and the configured secret,
//! and returns an [`AuthVerdict`] carrying the reason for the outcome.

use axum::http::{HeaderMap, HeaderName, header::AUTHORIZATION};
use serde::Deserialize;

use crate::signature::{self, SHA256_PREFIX, constant_time_eq};

const BEARER_PREFIX: &[u8] = b"Bearer ";
const GITHUB_SIGNATURE_HEADER: HeaderName = HeaderName::from_static("x-hub-signature-256");

/// Config-file spelling of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    HmacSha256,
    Bearer,
    Token,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// `sha256=<hex>` HMAC of the raw body, keyed by the secret.
    HmacSha256 { header: HeaderName },
    /// Header must equal `Bearer <secret>` exactly.
    Bearer { header: HeaderName },
    /// Exact match first, then a match with an optional case-insensitive
    /// `Bearer ` prefix stripped from both sides.
    Token { header: HeaderName },
}

/// Outcome of one strategy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthVerdict {
    Accepted,
    MissingSecretConfig,
    MissingCredential,
    SchemeMismatch,
    SignatureMismatch,
}

impl AuthVerdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Reason code written to the debug log.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Accepted => "ok",
            Self::MissingSecretConfig => "missing_secret_config",
            Self::MissingCredential => "missing_credential",
            Self::SchemeMismatch => "scheme_mismatch",
            Self::SignatureMismatch => "signature_mismatch",
        }
    }
}

impl AuthStrategy {
    /// Builds a strategy, falling back to its conventional header.
    pub fn new(kind: AuthKind, header: Option<HeaderName>) -> Self {
        match kind {
            AuthKind::HmacSha256 => Self::HmacSha256 {
                header: header.unwrap_or(GITHUB_SIGNATURE_HEADER),
            },
            AuthKind::Bearer => Self::Bearer {
                header: header.unwrap_or(AUTHORIZATION),
            },
            AuthKind::Token => Self::Token {
                header: header.unwrap_or(AUTHORIZATION),
            },
        }
    }

    pub fn kind(&self) -> AuthKind {
        match self {
            Self::HmacSha256 { .. } => AuthKind::HmacSha256,
            Self::Bearer { .. } => AuthKind::Bearer,
            Self::Token { .. } => AuthKind::Token,
        }
    }

    pub fn header(&self) -> &HeaderName {
        match self {
            Self::HmacSha256 { header } | Self::Bearer { header } | Self::Token { header } => header,
        }
    }

    pub fn verify(&self, headers: &HeaderMap, body: &[u8], secret: Option<&str>) -> AuthVerdict {
        let Some(secret) = secret.filter(|s| !s.is_empty()) else {
            return AuthVerdict::MissingSecretConfig;
        };

        let Some(provided) = headers.get(self.header()).map(|v| v.as_bytes()) else {
            return AuthVerdict::MissingCredential;
        };

        match self {
            Self::HmacSha256 { .. } => verify_hmac(secret, body, provided),
            Self::Bearer { .. } => verify_bearer(secret, provided),
            Self::Token { .. } => verify_token(secret, provided),
        }
    }
}

fn verify_hmac(secret: &str, body: &[u8], provided: &[u8]) -> AuthVerdict {
    let Some(hex) = provided.strip_prefix(SHA256_PREFIX.as_bytes()) else {
        return AuthVerdict::SchemeMismatch;
    };
    if signature::verify_hex(secret, body, hex) {
        AuthVerdict::Accepted
    } else {
        AuthVerdict::SignatureMismatch
    }
}

fn verify_bearer(secret: &str, provided: &[u8]) -> AuthVerdict {
    let Some(token) = provided.strip_prefix(BEARER_PREFIX) else {
        return AuthVerdict::SchemeMismatch;
    };
    if constant_time_eq(token, secret.as_bytes()) {
        AuthVerdict::Accepted
    } else {
        AuthVerdict::SignatureMismatch
    }
}

fn verify_token(secret: &str, provided: &[u8]) -> AuthVerdict {
    let expected = secret.as_bytes();
    if constant_time_eq(provided, expected)
        || constant_time_eq(strip_bearer(provided), strip_bearer(expected))
    {
        AuthVerdict::Accepted
    } else {
        AuthVerdict::SignatureMismatch
    }
}

fn strip_bearer(value: &[u8]) -> &[u8] {
    match value.split_at_checked(BEARER_PREFIX.len()) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case(BEARER_PREFIX) => rest,
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    fn hmac() -> AuthStrategy {
        AuthStrategy::new(AuthKind::HmacSha256, None)
    }

    #[test]
    fn default_headers_per_kind() {
        assert_eq!(hmac().header().as_str(), "x-hub-signature-256");
        assert_eq!(AuthStrategy::new(AuthKind::Bearer, None).header(), &AUTHORIZATION);
        assert_eq!(AuthStrategy::new(AuthKind::Token, None).header(), &AUTHORIZATION);

        let custom = AuthStrategy::new(AuthKind::Token, Some(HeaderName::from_static("x-api-key")));
        assert_eq!(custom.header().as_str(), "x-api-key");
        assert_eq!(custom.kind(), AuthKind::Token);
    }

    #[test]
    fn unconfigured_secret_is_reported_before_anything_else() {
        for strategy in [
            hmac(),
            AuthStrategy::new(AuthKind::Bearer, None),
            AuthStrategy::new(AuthKind::Token, None),
        ] {
            assert_eq!(strategy.verify(&HeaderMap::new(), b"", None), AuthVerdict::MissingSecretConfig);
            assert_eq!(
                strategy.verify(&HeaderMap::new(), b"", Some("")),
                AuthVerdict::MissingSecretConfig
            );
        }
    }

    #[test]
    fn hmac_accepts_valid_signature() {
        let body = br#"{"zen":"Keep it logically awesome."}"#;
        let mut map = HeaderMap::new();
        map.insert(
            "x-hub-signature-256",
            HeaderValue::from_str(&signature::sign("gh-secret", body)).unwrap(),
        );
        assert_eq!(hmac().verify(&map, body, Some("gh-secret")), AuthVerdict::Accepted);
    }

    #[test]
    fn hmac_rejects_tampered_body() {
        let body = b"payload".to_vec();
        let mut map = HeaderMap::new();
        map.insert(
            "x-hub-signature-256",
            HeaderValue::from_str(&signature::sign("gh-secret", &body)).unwrap(),
        );
        let mut tampered = body.clone();
        tampered[0] = b'P';
        assert_eq!(
            hmac().verify(&map, &tampered, Some("gh-secret")),
            AuthVerdict::SignatureMismatch
        );
    }

    #[test]
    fn hmac_missing_header_and_missing_prefix() {
        assert_eq!(
            hmac().verify(&HeaderMap::new(), b"x", Some("s")),
            AuthVerdict::MissingCredential
        );

        let digest = signature::hex_digest("s", b"x");
        let mut map = HeaderMap::new();
        map.insert("x-hub-signature-256", HeaderValue::from_str(&digest).unwrap());
        assert_eq!(hmac().verify(&map, b"x", Some("s")), AuthVerdict::SchemeMismatch);

        let map = headers(&[("x-hub-signature-256", "sha1=abcdef")]);
        assert_eq!(hmac().verify(&map, b"x", Some("s")), AuthVerdict::SchemeMismatch);
    }

    #[test]
    fn bearer_requires_exact_value() {
        let bearer = AuthStrategy::new(AuthKind::Bearer, None);

        let ok = headers(&[("authorization", "Bearer krisp-secret")]);
        assert_eq!(bearer.verify(&ok, b"", Some("krisp-secret")), AuthVerdict::Accepted);

        let wrong = headers(&[("authorization", "Bearer other")]);
        assert_eq!(bearer.verify(&wrong, b"", Some("krisp-secret")), AuthVerdict::SignatureMismatch);

        let bare = headers(&[("authorization", "krisp-secret")]);
        assert_eq!(bearer.verify(&bare, b"", Some("krisp-secret")), AuthVerdict::SchemeMismatch);

        // The scheme is matched case-sensitively.
        let lower = headers(&[("authorization", "bearer krisp-secret")]);
        assert_eq!(bearer.verify(&lower, b"", Some("krisp-secret")), AuthVerdict::SchemeMismatch);

        assert_eq!(
            bearer.verify(&HeaderMap::new(), b"", Some("krisp-secret")),
            AuthVerdict::MissingCredential
        );
    }

    #[test]
    fn token_matches_with_or_without_prefix_on_either_side() {
        let token = AuthStrategy::new(AuthKind::Token, None);

        let cases = [
            ("abc123", "abc123"),
            ("Bearer abc123", "abc123"),
            ("abc123", "Bearer abc123"),
            ("bearer abc123", "BEARER abc123"),
            ("Bearer abc123", "Bearer abc123"),
        ];
        for (provided, secret) in cases {
            let mut map = HeaderMap::new();
            map.insert(AUTHORIZATION, HeaderValue::from_static(provided));
            assert_eq!(
                token.verify(&map, b"", Some(secret)),
                AuthVerdict::Accepted,
                "{provided:?} vs {secret:?}"
            );
        }
    }

    #[test]
    fn token_rejects_different_value() {
        let token = AuthStrategy::new(AuthKind::Token, None);
        let map = headers(&[("authorization", "Bearer abc124")]);
        assert_eq!(token.verify(&map, b"", Some("abc123")), AuthVerdict::SignatureMismatch);

        let map = headers(&[("authorization", "Basic abc123")]);
        assert_eq!(token.verify(&map, b"", Some("abc123")), AuthVerdict::SignatureMismatch);
    }

    #[test]
    fn strip_bearer_handles_short_values() {
        assert_eq!(strip_bearer(b"Bear"), b"Bear");
        assert_eq!(strip_bearer(b"Bearer "), b"");
        assert_eq!(strip_bearer(b"BeArEr x"), b"x");
    }

    #[test]
    fn reason_codes() {
        assert!(AuthVerdict::Accepted.is_accepted());
        assert!(!AuthVerdict::SchemeMismatch.is_accepted());
        assert_eq!(AuthVerdict::Accepted.reason(), "ok");
        assert_eq!(AuthVerdict::MissingSecretConfig.reason(), "missing_secret_config");
        assert_eq!(AuthVerdict::MissingCredential.reason(), "missing_credential");
        assert_eq!(AuthVerdict::SchemeMismatch.reason(), "scheme_mismatch");
        assert_eq!(AuthVerdict::SignatureMismatch.reason(), "signature_mismatch");
    }
}
