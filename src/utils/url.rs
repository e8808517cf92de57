//! URL helpers for building service endpoints
//!
//! The service base URL usually ends in `/api`, while endpoint paths carry
//! the trailing slash the server routes require (`chat/send_message/`).
//! Joining must neither double nor drop slashes at the seam.

/// Strip trailing slashes from a base URL.
///
/// # Examples
///
/// ```
/// use creditchat::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://127.0.0.1:8000/api/"), "http://127.0.0.1:8000/api");
/// assert_eq!(normalize_base_url("http://127.0.0.1:8000/api"), "http://127.0.0.1:8000/api");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path, keeping the endpoint's trailing slash.
///
/// # Examples
///
/// ```
/// use creditchat::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://127.0.0.1:8000/api/", "/chat/send_message/"),
///     "http://127.0.0.1:8000/api/chat/send_message/"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{normalized_base}/{endpoint}")
}
