//! Authentication header helpers
//!
//! The chat service authenticates every protected call with a
//! `Authorization: Token <token>` header rather than the usual bearer scheme.

use reqwest::header::AUTHORIZATION;

/// Name of the authorization scheme the service expects.
pub const TOKEN_SCHEME: &str = "Token";

/// Render the value of the `Authorization` header for a session token.
pub fn authorization_value(token: &str) -> String {
    format!("{TOKEN_SCHEME} {token}")
}

/// Attach the session token to an outgoing request.
pub fn add_auth_headers(request: reqwest::RequestBuilder, token: &str) -> reqwest::RequestBuilder {
    request.header(AUTHORIZATION, authorization_value(token))
}
