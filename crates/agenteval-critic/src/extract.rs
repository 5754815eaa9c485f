//! Locate the structured JSON payload inside a free-form reply.
//!
//! Lookup order:
//! 1. the last `<tag> ... </tag>` block
//! 2. a fenced code block whose body is JSON
//! 3. the first balanced `{...}` or `[...]` span that parses as JSON

use tracing::debug;

/// Find the JSON payload in `reply`, preferring a `<tag>` block
pub fn extract_json<'a>(reply: &'a str, tag: &str) -> Option<&'a str> {
    if let Some(block) = tagged_block(reply, tag) {
        debug!(tag, len = block.len(), "Found tagged block");
        return Some(block);
    }
    if let Some(block) = fenced_block(reply) {
        debug!(len = block.len(), "Found fenced block");
        return Some(block);
    }
    first_json_span(reply)
}

fn tagged_block<'a>(reply: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = reply.rfind(&open)? + open.len();
    let end = reply[start..].find(&close)? + start;
    let body = strip_fence(reply[start..end].trim());
    (!body.is_empty()).then_some(body)
}

fn fenced_block(reply: &str) -> Option<&str> {
    let mut rest = reply;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        // Skip the info string (e.g. `json`)
        let body_start = after.find('\n')? + 1;
        let body = &after[body_start..];
        let close = body.find("```")?;
        let candidate = body[..close].trim();
        if candidate.starts_with('{') || candidate.starts_with('[') {
            return Some(candidate);
        }
        rest = &body[close + 3..];
    }
    None
}

fn strip_fence(body: &str) -> &str {
    if !body.starts_with("```") {
        return body;
    }
    let inner = match body.find('\n') {
        Some(pos) => &body[pos + 1..],
        None => return body,
    };
    inner.trim_end().trim_end_matches("```").trim()
}

fn first_json_span(reply: &str) -> Option<&str> {
    for (start, ch) in reply.char_indices() {
        if ch != '{' && ch != '[' {
            continue;
        }
        if let Some(end) = balanced_end(&reply[start..]) {
            let candidate = &reply[start..start + end];
            if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                return Some(candidate);
            }
        }
    }
    None
}

/// Byte length of the balanced bracket span at the start of `text`
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
