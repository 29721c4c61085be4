//! Credential verification for Parley.
//!
//! The chat subsystem never issues credentials; it only verifies an opaque
//! bearer token and resolves it to a principal. The token reaches a
//! WebSocket connection through handshake metadata (cookie or query string),
//! and REST requests through the `Authorization` header.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{ChatError, Result};

/// Identity resolved from a credential.
///
/// Derived once per connection at handshake and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// User ID.
    pub id: String,
    /// Role, if the credential carries one.
    pub role: Option<String>,
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: String,
    /// User role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
}

impl JwtClaims {
    /// Create claims for a user, valid for `ttl_secs` from now.
    pub fn new(user_id: impl Into<String>, role: Option<String>, ttl_secs: u64) -> Self {
        let now = chrono::Utc::now().timestamp() as u64;
        Self {
            sub: user_id.into(),
            role,
            iat: now,
            exp: now + ttl_secs,
        }
    }
}

/// Encode claims into a signed token.
///
/// Credential issuance is an external concern; this helper exists for test
/// fixtures and local tooling.
pub fn encode_token(secret: &str, claims: &JwtClaims) -> Result<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ChatError::Config(format!("failed to encode token: {e}")))
}

/// Verifies a bearer credential and yields a principal identity.
pub trait TokenVerifier: Send + Sync {
    /// Verify the token, returning the resolved principal.
    fn verify(&self, token: &str) -> Result<Principal>;
}

/// JWT-based token verifier.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    /// Create a new verifier from a secret key.
    pub fn new(secret: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        Self {
            decoding_key,
            validation,
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Principal> {
        let token_data = decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                ChatError::Unauthenticated("invalid or expired token".to_string())
            })?;

        Ok(Principal {
            id: token_data.claims.sub,
            role: token_data.claims.role,
        })
    }
}

/// Raw metadata available at connection establishment.
///
/// Kept transport-neutral: the WebSocket handler fills in whatever channels
/// its transport exposes.
#[derive(Debug, Clone, Default)]
pub struct HandshakeMetadata {
    /// Raw `Cookie` header value, if present.
    pub cookie_header: Option<String>,
    /// Raw query string, if present.
    pub query: Option<String>,
}

/// Strategy for pulling a credential out of handshake metadata.
pub trait TokenExtractor: Send + Sync {
    /// Extract the raw token, or None if absent.
    fn extract_token(&self, meta: &HandshakeMetadata) -> Option<String>;
}

/// Default extraction strategy: a named cookie, falling back to a `token`
/// query parameter.
#[derive(Debug, Clone)]
pub struct CookieTokenExtractor {
    cookie_name: String,
}

impl CookieTokenExtractor {
    /// Create an extractor reading the given cookie name.
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
        }
    }
}

impl Default for CookieTokenExtractor {
    fn default() -> Self {
        Self::new("accessToken")
    }
}

impl TokenExtractor for CookieTokenExtractor {
    fn extract_token(&self, meta: &HandshakeMetadata) -> Option<String> {
        if let Some(cookie_header) = &meta.cookie_header {
            let prefix = format!("{}=", self.cookie_name);
            if let Some(value) = cookie_header
                .split("; ")
                .find_map(|pair| pair.trim().strip_prefix(prefix.as_str()))
            {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }

        // Fall back to a token query parameter
        let query = meta.query.as_deref()?;
        query.split('&').find_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next()?;
            if key == "token" && !value.is_empty() {
                urlencoding::decode(value).ok().map(|s| s.into_owned())
            } else {
                None
            }
        })
    }
}
