//! CORS middleware configuration.

use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, COOKIE};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

/// Create a CORS layer from configuration.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::OPTIONS];

    // When origins are specified, use credentials mode with explicit headers
    // so the browser sends the access token cookie. With no origins (dev
    // mode), stay permissive without credentials.
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(Any)
            .allow_origin(Any);
    }

    let parsed_origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    if parsed_origins.is_empty() {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(Any)
            .allow_origin(Any)
    } else {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT, COOKIE])
            .allow_credentials(true)
            .allow_origin(parsed_origins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_cors_layer_empty_origins() {
        let _layer = create_cors_layer(&[]);
        // Should not panic
    }

    #[test]
    fn test_create_cors_layer_with_origins() {
        let origins = vec!["http://localhost:3000".to_string()];
        let _layer = create_cors_layer(&origins);
        // Should not panic
    }

    #[test]
    fn test_create_cors_layer_invalid_origins() {
        let origins = vec!["\u{0}not a header value".to_string()];
        let _layer = create_cors_layer(&origins);
        // Falls back to permissive mode
    }
}
