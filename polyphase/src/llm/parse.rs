//! Two ways to get `ToolCall`s out of an assistant turn, per §6's "two
//! fallbacks must exist": native structured tool calls (already parsed by
//! the backend into `CompletionResponse::tool_calls`), and a text-fallback
//! extractor for models that emit JSON-ish blocks inline in `content`
//! instead. Both produce the same `ToolCall` shape.

use super::types::ToolCall;

/// Native tool calls are already on the response; this just clones them out
/// for a uniform call site alongside `parse_text_tool_calls`.
pub fn parse_native_tool_calls(tool_calls: &[ToolCall]) -> Vec<ToolCall> {
    tool_calls.to_vec()
}

/// Extract tool calls from fenced ```tool_call { ... } ``` blocks or bare
/// `{"tool": "...", "args": {...}}` JSON objects embedded in free text.
pub fn parse_text_tool_calls(content: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut counter = 0usize;

    for candidate in extract_json_candidates(content) {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&candidate) else {
            continue;
        };
        let Some(name) = value.get("tool").and_then(|v| v.as_str()) else {
            continue;
        };
        let input = value.get("args").cloned().unwrap_or(serde_json::json!({}));
        counter += 1;
        calls.push(ToolCall {
            id: format!("text-call-{}", counter),
            name: name.to_string(),
            input,
        });
    }

    calls
}

/// Pull out fenced code blocks tagged `tool_call` or `json`, plus any
/// top-level `{...}` span, as candidate JSON strings.
fn extract_json_candidates(content: &str) -> Vec<String> {
    let mut candidates = Vec::new();

    let mut rest = content;
    while let Some(start) = rest.find("```") {
        let after_fence = &rest[start + 3..];
        let after_lang = after_fence.trim_start_matches(|c: char| c.is_alphanumeric());
        let after_lang = after_lang.strip_prefix('\n').unwrap_or(after_lang);
        if let Some(end) = after_lang.find("```") {
            candidates.push(after_lang[..end].trim().to_string());
            rest = &after_lang[end + 3..];
        } else {
            break;
        }
    }

    if candidates.is_empty() {
        if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
            if end > start {
                candidates.push(content[start..=end].to_string());
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_tool_call_block() {
        let content = "Let me fix that.\n```tool_call\n{\"tool\": \"read_file\", \"args\": {\"path\": \"a.py\"}}\n```\n";
        let calls = parse_text_tool_calls(content);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "read_file");
        assert_eq!(calls[0].input["path"], "a.py");
    }

    #[test]
    fn parses_bare_json_object_without_fence() {
        let content = r#"{"tool": "run_command", "args": {"command": "ls"}}"#;
        let calls = parse_text_tool_calls(content);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "run_command");
    }

    #[test]
    fn ignores_prose_with_no_tool_call() {
        let calls = parse_text_tool_calls("Just thinking out loud, no action yet.");
        assert!(calls.is_empty());
    }

    #[test]
    fn native_tool_calls_pass_through_unchanged() {
        let native = vec![ToolCall {
            id: "1".into(),
            name: "grep".into(),
            input: serde_json::json!({"pattern": "foo"}),
        }];
        let parsed = parse_native_tool_calls(&native);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "grep");
    }
}
