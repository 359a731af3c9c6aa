use anyhow::Context;
use serde_json::Value;

/// Locates the JSON object inside a model reply: the body of a Markdown code
/// fence when present, otherwise the span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if let Some(fenced) = trimmed.strip_prefix("```") {
        // Drop the info string (`json`, `JSON`, ...) on the opening line.
        let body = fenced.split_once('\n').map_or("", |(_, rest)| rest);
        let body = body.rfind("```").map_or(body, |end| &body[..end]);
        return Some(body.trim().to_string());
    }

    let open = trimmed.find('{')?;
    let close = trimmed.rfind('}')?;
    (open < close).then(|| trimmed[open..=close].to_string())
}

/// Parses a model's text reply into a JSON object.
pub fn parse_reply(text: &str) -> anyhow::Result<Value> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let value = serde_json::from_str::<Value>(&json_str)
        .with_context(|| format!("model reply is not valid JSON: {json_str}"))?;
    anyhow::ensure!(value.is_object(), "model reply is not a JSON object: {json_str}");
    Ok(value)
}
