//! Model output sanitization.
//!
//! Models routinely wrap JSON in markdown fences or conversational filler.
//! This strips the wrapping and isolates the JSON object substring so the
//! caller's `serde_json` parse sees only the payload.

/// Strip markdown code fences and isolate the JSON object span.
///
/// Removes ```` ```json ```` and ```` ``` ```` markers anywhere in the
/// text, trims whitespace, then returns the substring from the first `{`
/// to the last `}` inclusive.
///
/// Known limitation: the span scan is not brace-balance aware. Two sibling
/// JSON objects, or a `}` inside a string literal past the real closing
/// brace, will extract the wrong span. Assumes a single top-level object.
///
/// If no `{…}` span exists the trimmed text is returned unchanged; the
/// caller's JSON parse then fails, which is the expected failure path.
pub fn isolate_json(text: &str) -> String {
    let stripped = text.replace("```json", "").replace("```", "");
    let trimmed = stripped.trim();

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => trimmed[start..=end].to_string(),
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_fenced_block() {
        let raw = "```json\n{\"patient\": {\"mrn\": \"A12\"}}\n```";
        assert_eq!(isolate_json(raw), "{\"patient\": {\"mrn\": \"A12\"}}");
    }

    #[test]
    fn extracts_object_with_surrounding_chatter() {
        let raw = "Sure! Here is the structured data:\n\n{\"a\": 1}\n\nLet me know if you need more.";
        assert_eq!(isolate_json(raw), "{\"a\": 1}");
    }

    #[test]
    fn strips_untagged_fences() {
        let raw = "```\n{\"a\": 1}\n```";
        assert_eq!(isolate_json(raw), "{\"a\": 1}");
    }

    #[test]
    fn nested_objects_keep_outermost_span() {
        let raw = "{\"clinical\": {\"vitals\": {\"bp\": \"120/80\"}}}";
        assert_eq!(isolate_json(raw), raw);
    }

    #[test]
    fn no_braces_returns_trimmed_text() {
        assert_eq!(
            isolate_json("  Error with Ollama: connection failed  "),
            "Error with Ollama: connection failed"
        );
    }

    #[test]
    fn close_brace_before_open_brace_returns_trimmed_text() {
        assert_eq!(isolate_json("} not json {"), "} not json {");
    }

    #[test]
    fn empty_input_returns_empty() {
        assert_eq!(isolate_json(""), "");
    }

    #[test]
    fn multiline_object_preserved_verbatim() {
        let raw = "```json\n{\n  \"alerts\": [],\n  \"summary\": \"stable\"\n}\n```\n";
        assert_eq!(isolate_json(raw), "{\n  \"alerts\": [],\n  \"summary\": \"stable\"\n}");
    }

    #[test]
    fn sibling_objects_span_both_known_limitation() {
        // Documented behavior: greedy first-{/last-} scan, not brace-aware.
        let raw = "{\"a\": 1} {\"b\": 2}";
        assert_eq!(isolate_json(raw), "{\"a\": 1} {\"b\": 2}");
    }
}
