//! Small helpers shared by config, remote and storage code.

/// Trimmed text, or `None` when absent or blank
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// Only plain http(s) endpoints are accepted for the remote store
pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| value.starts_with(scheme))
}

/// Trim `value` and keep at most `max_chars` characters
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.trim().chars().take(max_chars).collect()
}

/// Wall clock in unix milliseconds; every stored timestamp uses this unit
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
