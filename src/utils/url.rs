//! URL helpers for API endpoints and inline payloads.

/// Join a base URL and an endpoint path with exactly one slash between them.
///
/// ```
/// use verum::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.openai.com/v1/", "/chat/completions"),
///     "https://api.openai.com/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// True for `http://` and `https://` URLs with a non-empty host part.
pub fn is_http_url(url: &str) -> bool {
    ["https://", "http://"].iter().any(|scheme| {
        url.strip_prefix(scheme)
            .is_some_and(|rest| !rest.trim_matches('/').is_empty())
    })
}

/// Build a `data:` URL for a base64 payload.
pub fn data_url(mime_type: &str, base64_data: &str) -> String {
    let mime_type = if mime_type.trim().is_empty() {
        "application/octet-stream"
    } else {
        mime_type
    };
    format!("data:{mime_type};base64,{base64_data}")
}
