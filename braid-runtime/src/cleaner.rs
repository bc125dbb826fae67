//! Final-response cleanup.
//!
//! Chat-tuned models leak template control markers into their output, and a
//! retracted stop sequence can leave stray punctuation at the edges. The
//! cleaner strips the known markers (repeatedly, since removing one can
//! splice another together), drops leading bytes outside printable ASCII,
//! trims surrounding whitespace, and cuts the response at the first
//! fabricated conversation turn. Deterministic and model-independent.

const STOP_MARKERS: [&str; 14] = [
    "<|im_end|>",
    "<|im_start|>",
    "<end_of_turn>",
    "<start_of_turn>",
    "</s>",
    "<s>",
    "<|endoftext|>",
    "<|end|>",
    "<|start|>",
    "<eos>",
    "<bos>",
    "\n<|im_end|>",
    "\n<end_of_turn>",
    "\n</s>",
];

const MAX_CLEANUP_ROUNDS: usize = 5;

/// Clean one stream's final response text.
pub fn clean_response(text: &str) -> String {
    let mut text = text.to_owned();

    let mut rounds = 0;
    let mut found = true;
    while found && rounds < MAX_CLEANUP_ROUNDS {
        found = false;
        rounds += 1;
        for marker in STOP_MARKERS {
            if text.contains(marker) {
                text = text.replace(marker, "");
                found = true;
            }
        }
    }

    // Leading '?' and anything outside printable ASCII is detokeniser
    // residue, not content.
    let start = text
        .find(|c: char| c != '?' && (' '..='~').contains(&c))
        .unwrap_or(text.len());
    let mut text = text.split_off(start);

    text.truncate(text.trim_end().len());
    let trimmed_start = text.len() - text.trim_start().len();
    let mut text = text.split_off(trimmed_start);

    if let Some(pos) = text.find("\n\nUser:") {
        text.truncate(pos);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(clean_response("The answer is 42."), "The answer is 42.");
    }

    #[test]
    fn markers_are_removed_everywhere() {
        assert_eq!(clean_response("Hello<|im_end|> world</s>"), "Hello world");
    }

    #[test]
    fn splice_regenerated_markers_are_caught_by_later_rounds() {
        // removing the inner marker splices an outer one together
        assert_eq!(clean_response("ok<|im_<|im_end|>end|>"), "ok");
    }

    #[test]
    fn leading_junk_is_stripped() {
        assert_eq!(clean_response("???Hi"), "Hi");
        assert_eq!(clean_response("\u{1}\u{2}Hi"), "Hi");
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        assert_eq!(clean_response("  padded  \n"), "padded");
    }

    #[test]
    fn truncates_at_fabricated_turn() {
        assert_eq!(
            clean_response("Paris is the capital.\n\nUser: and Spain?"),
            "Paris is the capital."
        );
    }

    #[test]
    fn all_junk_collapses_to_empty() {
        assert_eq!(clean_response("???"), "");
        assert_eq!(clean_response(""), "");
        assert_eq!(clean_response("<|endoftext|>"), "");
    }

    #[test]
    fn marker_storm_stops_after_bounded_rounds() {
        // deeply nested splicing beyond the round cap leaves residue rather
        // than looping forever
        let nested = "<|im_<|im_<|im_<|im_<|im_<|im_end|>end|>end|>end|>end|>end|>";
        let cleaned = clean_response(nested);
        assert!(cleaned.contains("im_"));
    }
}
