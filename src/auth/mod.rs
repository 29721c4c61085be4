//! Authentication for Parley.

mod token;

pub use token::{
    encode_token, CookieTokenExtractor, HandshakeMetadata, JwtClaims, JwtVerifier, Principal,
    TokenExtractor, TokenVerifier,
};
