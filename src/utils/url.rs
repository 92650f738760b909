//! URL helpers for building daemon endpoints from a user-supplied host.

/// Strip trailing slashes so endpoints can be appended without doubling them.
///
/// # Examples
///
/// ```
/// use ollama_tui::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:11434"), "http://localhost:11434");
/// assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
/// assert_eq!(normalize_base_url("http://gpu-box:11434///"), "http://gpu-box:11434");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a daemon host and an endpoint path with exactly one slash.
///
/// # Examples
///
/// ```
/// use ollama_tui::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:11434", "api/tags"),
///     "http://localhost:11434/api/tags"
/// );
/// assert_eq!(
///     construct_api_url("http://localhost:11434/", "/api/chat"),
///     "http://localhost:11434/api/chat"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}
