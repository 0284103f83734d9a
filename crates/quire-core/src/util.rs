//! Small helpers shared by the client, the repositories and the CLI.

/// Longest server response body echoed back inside an error message.
const ERROR_EXCERPT_CHARS: usize = 180;

/// Trim optional text, treating blank values as absent.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Whether `value` names an `http://` or `https://` endpoint.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// First characters of a server response body, for error messages.
pub fn compact_text(value: &str) -> String {
    value.trim().chars().take(ERROR_EXCERPT_CHARS).collect()
}

/// Wall clock in Unix milliseconds, the unit of note timestamps.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
