//! Lenient extraction of tool invocations from model text.
//!
//! Model output is untrusted prose that may contain a JSON object
//! anywhere inside it, wrapped in code fences, surrounded by commentary,
//! or mildly malformed (trailing commas, unquoted keys, comments). The
//! extractor locates the outermost `{…}` with a string-aware brace scan
//! and parses it with `serde_json` first, falling back to `json5` for
//! tolerant parsing. Failure to find or parse an object is a recoverable
//! condition reported as `None`, never an error.

use serde_json::Value;

use super::ToolInvocation;

/// Extract a tool invocation from free-form model text.
///
/// Returns `None` when no parseable JSON object is present. A parsed
/// object missing `tool_name` yields an invocation with an empty name,
/// which resolution maps to the unknown-tool sentinel.
pub fn extract_invocation(raw: &str) -> Option<ToolInvocation> {
    let candidate = find_object(raw)?;
    let value = parse_lenient(candidate)?;
    let object = value.as_object()?;

    let tool_name = object
        .get("tool_name")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let tool_args = object
        .get("tool_args")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));

    Some(ToolInvocation {
        tool_name,
        tool_args,
    })
}

/// Locate the outermost balanced `{…}` slice, skipping braces inside
/// string literals.
fn find_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let bytes = raw.as_bytes();

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match byte {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parse strictly, then leniently.
fn parse_lenient(candidate: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Some(value);
    }
    json5::from_str::<Value>(candidate).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_json_object() {
        let inv = extract_invocation(
            r#"{"tool_name": "respond", "tool_args": {"text": "done"}}"#,
        )
        .unwrap();
        assert_eq!(inv.tool_name, "respond");
        assert_eq!(inv.tool_args, json!({"text": "done"}));
    }

    #[test]
    fn test_object_with_surrounding_prose() {
        let raw = "I will use a tool now.\n\
                   {\"tool_name\": \"search\", \"tool_args\": {\"q\": \"rust\"}}\n\
                   That should do it.";
        let inv = extract_invocation(raw).unwrap();
        assert_eq!(inv.tool_name, "search");
    }

    #[test]
    fn test_code_fenced_object() {
        let raw = "```json\n{\"tool_name\": \"respond\", \"tool_args\": {}}\n```";
        let inv = extract_invocation(raw).unwrap();
        assert_eq!(inv.tool_name, "respond");
    }

    #[test]
    fn test_trailing_comma_tolerated() {
        let raw = r#"{"tool_name": "respond", "tool_args": {"text": "hi",},}"#;
        let inv = extract_invocation(raw).unwrap();
        assert_eq!(inv.tool_name, "respond");
        assert_eq!(inv.tool_args["text"], "hi");
    }

    #[test]
    fn test_unquoted_keys_tolerated() {
        let raw = r#"{tool_name: "respond", tool_args: {text: "hi"}}"#;
        let inv = extract_invocation(raw).unwrap();
        assert_eq!(inv.tool_name, "respond");
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let raw = r#"{"tool_name": "respond", "tool_args": {"text": "a } inside"}}"#;
        let inv = extract_invocation(raw).unwrap();
        assert_eq!(inv.tool_args["text"], "a } inside");
    }

    #[test]
    fn test_missing_tool_name_yields_empty_name() {
        let inv = extract_invocation(r#"{"tool_args": {"x": 1}}"#).unwrap();
        assert_eq!(inv.tool_name, "");
    }

    #[test]
    fn test_missing_args_yields_empty_object() {
        let inv = extract_invocation(r#"{"tool_name": "respond"}"#).unwrap();
        assert!(inv.tool_args.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_plain_text_is_none() {
        assert!(extract_invocation("just a plain sentence").is_none());
        assert!(extract_invocation("").is_none());
    }

    #[test]
    fn test_unbalanced_braces_is_none() {
        assert!(extract_invocation("{\"tool_name\": \"x\"").is_none());
    }

    #[test]
    fn test_non_object_json_is_none() {
        assert!(extract_invocation("[1, 2, 3]").is_none());
    }
}
