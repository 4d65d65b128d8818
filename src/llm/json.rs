//! Robust JSON extraction from untrusted LLM text output.
//!
//! Direct port of `ai_service.py::safe_json_parse`'s staged-fallback
//! strategy: LLMs reliably wrap JSON in markdown fences, prepend chatter, or
//! emit trailing commas and raw newlines inside string values. Each stage
//! only runs if the previous one failed to parse.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn code_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap())
}

fn json_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)[\[{].*[\]}]").unwrap())
}

fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*([}\]])").unwrap())
}

fn string_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""(?:[^"\\]|\\.)*""#).unwrap())
}

/// Parse `content` as JSON, trying progressively more aggressive repairs.
/// Returns `None` if every strategy fails.
pub fn safe_json_parse(content: &str) -> Option<Value> {
    if content.is_empty() {
        return None;
    }

    // Stage 1: direct parse.
    if let Ok(v) = serde_json::from_str(content) {
        return Some(v);
    }

    // Stage 2: extract from a markdown code fence.
    if let Some(caps) = code_block_re().captures(content) {
        if let Ok(v) = serde_json::from_str(&caps[1]) {
            return Some(v);
        }
    }

    // Stage 3: find the outermost JSON-looking span.
    let Some(span) = json_span_re().find(content) else {
        return None;
    };
    let json_str = span.as_str();

    if let Ok(v) = serde_json::from_str(json_str) {
        return Some(v);
    }

    // Stage 4: strip trailing commas, escape raw newlines inside strings.
    let no_trailing_commas = trailing_comma_re().replace_all(json_str, "$1");
    let newlines_escaped = string_literal_re().replace_all(&no_trailing_commas, |caps: &regex::Captures| {
        caps[0].replace('\n', "\\n").replace('\r', "\\r")
    });
    if let Ok(v) = serde_json::from_str(&newlines_escaped) {
        return Some(v);
    }

    // Stage 5: line-by-line repair for a string literal broken across lines.
    if let Some(v) = repair_multiline_strings(&newlines_escaped) {
        return Some(v);
    }

    None
}

fn repair_multiline_strings(cleaned: &str) -> Option<Value> {
    let mut repaired_lines: Vec<String> = Vec::new();
    let mut in_string = false;

    for line in cleaned.lines() {
        let quote_count = count_unescaped_quotes(line);
        if in_string {
            if let Some(last) = repaired_lines.last_mut() {
                let trimmed = last.trim_end_matches('"').to_string();
                *last = format!("{trimmed}\\n{}", line.trim_start());
            }
            if quote_count % 2 == 1 {
                in_string = false;
            }
        } else {
            repaired_lines.push(line.to_string());
            if quote_count % 2 == 1 {
                in_string = true;
            }
        }
    }

    serde_json::from_str(&repaired_lines.join("\n")).ok()
}

fn count_unescaped_quotes(line: &str) -> usize {
    let mut count = 0;
    let mut escaped = false;
    for c in line.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => count += 1,
            _ => {}
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_clean_json_directly() {
        let v = safe_json_parse(r#"{"a": 1}"#).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn strips_markdown_code_fence() {
        let input = "```json\n{\"a\": 1}\n```";
        let v = safe_json_parse(input).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn extracts_json_span_amid_chatter() {
        let input = "Sure, here you go:\n{\"a\": 1}\nHope that helps!";
        let v = safe_json_parse(input).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn strips_trailing_commas() {
        let input = r#"{"a": 1, "b": [1, 2,],}"#;
        let v = safe_json_parse(input).unwrap();
        assert_eq!(v, json!({"a": 1, "b": [1, 2]}));
    }

    #[test]
    fn returns_none_on_total_garbage() {
        assert!(safe_json_parse("not json at all, just words").is_none());
    }

    #[test]
    fn returns_none_on_empty_input() {
        assert!(safe_json_parse("").is_none());
    }
}
