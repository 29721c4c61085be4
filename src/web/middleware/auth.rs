//! JWT authentication for the REST surface.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        Request,
    },
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::auth::{JwtVerifier, Principal, TokenVerifier};
use crate::web::error::ApiError;

/// Shared verification state for the REST surface.
pub struct AuthState {
    /// Token verifier.
    pub verifier: JwtVerifier,
    /// Cookie carrying the access token.
    pub cookie_name: String,
}

impl AuthState {
    /// Create auth state from a secret and cookie name.
    pub fn new(secret: &str, cookie_name: impl Into<String>) -> Self {
        Self {
            verifier: JwtVerifier::new(secret),
            cookie_name: cookie_name.into(),
        }
    }
}

/// Extractor for authenticated users.
///
/// Use this extractor to require authentication for a handler. The token is
/// read from the `Authorization: Bearer` header first, then from the access
/// token cookie.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            // Auth state is set by the jwt_auth middleware
            let auth_state = parts
                .extensions
                .get::<Arc<AuthState>>()
                .cloned()
                .ok_or_else(|| ApiError::internal("Auth state not configured"))?;

            // Try the Authorization header first
            let token = parts
                .headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|header| header.strip_prefix("Bearer "))
                .map(|t| t.to_string());

            // Fall back to the access token cookie
            let token = match token {
                Some(t) => t,
                None => parts
                    .headers
                    .get(COOKIE)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|header| {
                        header.split("; ").find_map(|pair| {
                            pair.strip_prefix(auth_state.cookie_name.as_str())
                                .and_then(|rest| rest.strip_prefix('='))
                                .map(|t| t.to_string())
                        })
                    })
                    .ok_or_else(|| ApiError::unauthorized("Missing authorization"))?,
            };

            let principal = auth_state.verifier.verify(&token).map_err(|e| {
                tracing::debug!("token verification failed: {}", e);
                ApiError::unauthorized("Invalid or expired token")
            })?;

            Ok(AuthUser(principal))
        })
    }
}

/// Middleware function to inject auth state into request extensions.
pub async fn jwt_auth(auth_state: Arc<AuthState>, mut request: Request<Body>, next: Next) -> Response {
    request.extensions_mut().insert(auth_state);
    next.run(request).await
}
