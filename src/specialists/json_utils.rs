//! JSON extraction from free-form specialist output.

/// Extract the first JSON object from specialist output.
///
/// Prefers the body of a fenced ```json (or bare ```) block; otherwise scans
/// for the first balanced `{ ... }` object, ignoring braces inside strings.
pub fn extract_json_block(text: &str) -> Option<&str> {
    for fence in ["```json", "```"] {
        if let Some(start) = text.find(fence) {
            let body_start = start + fence.len();
            if let Some(len) = text[body_start..].find("```") {
                let body = text[body_start..body_start + len].trim();
                if body.starts_with('{') {
                    return Some(body);
                }
            }
        }
    }

    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_json_fence() {
        let text = "Assessment follows:\n```json\n{\"score\": 0.8}\n```\nThanks";
        assert_eq!(extract_json_block(text), Some("{\"score\": 0.8}"));
    }

    #[test]
    fn test_extract_from_bare_fence() {
        let text = "```\n{\"issues\": []}\n```";
        assert_eq!(extract_json_block(text), Some("{\"issues\": []}"));
    }

    #[test]
    fn test_extract_first_balanced_object() {
        let text = r#"score {"score": 0.7, "rationale": "uses {braces}"} then {"other": 1}"#;
        assert_eq!(
            extract_json_block(text),
            Some(r#"{"score": 0.7, "rationale": "uses {braces}"}"#)
        );
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let text = r#"{"rationale": "said \"}\" twice", "score": 0.5}"#;
        assert_eq!(extract_json_block(text), Some(text));
    }

    #[test]
    fn test_no_json() {
        assert_eq!(extract_json_block("plain text"), None);
        assert_eq!(extract_json_block("{ unterminated"), None);
    }
}
