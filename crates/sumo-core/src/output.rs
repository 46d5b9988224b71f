//! Bounded rendering of subprocess output for tool responses.
//!
//! SUMO tools can emit megabytes of progress chatter on stdout. Tool results
//! travel back over a JSON-RPC frame, so stdout/stderr excerpts are capped and
//! only the tail is kept, since errors show up at the end of the stream.

pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 8_000;

/// Resolve the output cap, honoring the `SUMO_MCP_MAX_OUTPUT_CHARS` override.
pub fn max_output_chars() -> usize {
    std::env::var("SUMO_MCP_MAX_OUTPUT_CHARS")
        .ok()
        .and_then(|raw| raw.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_OUTPUT_CHARS)
}

/// Truncate `text` to at most `max_chars` characters, keeping the tail.
///
/// When truncation happens the returned string is prefixed with a marker line
/// noting how much was dropped.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.is_empty() || max_chars == 0 {
        return String::new();
    }

    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }

    let skip = total - max_chars;
    let tail: String = text.chars().skip(skip).collect();
    format!(
        "... <truncated {skip} chars; showing last {max_chars} of {total}> ...\n{tail}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_passes_through_unchanged() {
        assert_eq!(truncate_text("hello", 100), "hello");
    }

    #[test]
    fn empty_text_and_zero_cap_yield_empty_string() {
        assert_eq!(truncate_text("", 100), "");
        assert_eq!(truncate_text("anything", 0), "");
    }

    #[test]
    fn long_text_keeps_tail_with_marker() {
        let text = "abcdefghij";
        let out = truncate_text(text, 4);
        assert_eq!(
            out,
            "... <truncated 6 chars; showing last 4 of 10> ...\nghij"
        );
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        // Four multibyte characters, cap of two.
        let text = "éééé";
        let out = truncate_text(text, 2);
        assert!(out.ends_with("éé"));
        assert!(out.contains("truncated 2 chars; showing last 2 of 4"));
    }

    #[test]
    fn text_exactly_at_cap_is_not_truncated() {
        assert_eq!(truncate_text("1234", 4), "1234");
    }
}
