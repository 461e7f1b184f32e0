//! JSON extraction from model chatter.
//!
//! Providers are asked for strict JSON but routinely wrap it in markdown
//! fences or commentary. These helpers pull the first plausible JSON
//! object or array out of a response.

/// Contents of the first fenced code block, if any.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip the info string ("json", "js", ...) up to the first newline
    let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn delimited<'a>(text: &'a str, open: char, close: char) -> Option<&'a str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Extract a JSON object from a response, looking inside code fences
/// first and falling back to the outermost brace pair.
pub fn extract_json_object(text: &str) -> Result<String, String> {
    if let Some(block) = fenced_block(text) {
        if let Some(object) = delimited(block, '{', '}') {
            return Ok(object.to_string());
        }
    }
    delimited(text, '{', '}')
        .map(|s| s.to_string())
        .ok_or_else(|| "no JSON object found in response".to_string())
}

/// Extract a JSON array from a response, same search order as
/// [`extract_json_object`].
pub fn extract_json_array(text: &str) -> Result<String, String> {
    if let Some(block) = fenced_block(text) {
        if let Some(array) = delimited(block, '[', ']') {
            return Ok(array.to_string());
        }
    }
    delimited(text, '[', ']')
        .map(|s| s.to_string())
        .ok_or_else(|| "no JSON array found in response".to_string())
}
