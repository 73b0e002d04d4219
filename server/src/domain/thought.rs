//! Embedded reasoning extraction
//!
//! Agents may wrap their private reasoning in `<thought>...</thought>`. Only
//! the first block is extracted; any later blocks stay in the remainder.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedMessage {
    pub thought: Option<String>,
    pub content: String,
}

fn thought_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<thought>(.*?)</thought>").expect("Invalid regex"))
}

/// Split `raw` into its first thought block (trimmed) and the trimmed remainder.
pub fn extract_thought(raw: &str) -> ParsedMessage {
    let re = thought_block();
    match re.captures(raw) {
        Some(caps) => {
            let thought = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();
            let content = re.replacen(raw, 1, "").trim().to_string();
            ParsedMessage {
                thought: Some(thought),
                content,
            }
        }
        None => ParsedMessage {
            thought: None,
            content: raw.trim().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_thought_block() {
        let parsed = extract_thought("<thought>plan X</thought>do Y");
        assert_eq!(parsed.thought.as_deref(), Some("plan X"));
        assert_eq!(parsed.content, "do Y");
    }

    #[test]
    fn test_no_block_returns_trimmed_original() {
        let parsed = extract_thought("  just text \n");
        assert_eq!(parsed.thought, None);
        assert_eq!(parsed.content, "just text");
    }

    #[test]
    fn test_multiline_thought_is_trimmed() {
        let parsed = extract_thought("before <thought>\n  step 1\n  step 2\n</thought> after");
        assert_eq!(parsed.thought.as_deref(), Some("step 1\n  step 2"));
        assert_eq!(parsed.content, "before  after");
    }

    #[test]
    fn test_only_first_block_is_removed() {
        let parsed = extract_thought("<thought>a</thought>mid<thought>b</thought>");
        assert_eq!(parsed.thought.as_deref(), Some("a"));
        assert_eq!(parsed.content, "mid<thought>b</thought>");
    }

    #[test]
    fn test_unclosed_block_is_not_a_thought() {
        let parsed = extract_thought("<thought>never closed");
        assert_eq!(parsed.thought, None);
        assert_eq!(parsed.content, "<thought>never closed");
    }
}
