//! Shared utility functions used across multiple modules.

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Check if a string starts with `http://` or `https://`.
pub fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

const ERROR_BODY_MAX_CHARS: usize = 180;

/// One-line summary of an error response body that is not a Firestore error
/// payload, such as a proxy's HTML error page or a plain-text message.
///
/// Markup is dropped when the body looks like HTML, whitespace runs collapse
/// to single spaces and long bodies are cut with a trailing `...`.
pub fn summarize_error_body(body: &str) -> String {
    let body = body.trim();
    let text = if body.starts_with('<') {
        strip_markup(body)
    } else {
        body.to_string()
    };
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= ERROR_BODY_MAX_CHARS {
        return collapsed;
    }
    let mut truncated = collapsed
        .chars()
        .take(ERROR_BODY_MAX_CHARS - 3)
        .collect::<String>();
    truncated.push_str("...");
    truncated
}

fn strip_markup(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            _ => text.push(ch),
        }
    }
    text
}
