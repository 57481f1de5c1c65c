//! Acknowledgement and closure phrase detection

use regex::Regex;
use std::sync::OnceLock;

static ACK_RE: OnceLock<Regex> = OnceLock::new();

const CLOSURE_WORDS: [&str; 6] = ["solved", "resolved", "close", "closing", "done", "fixed"];
const SHORT_UTTERANCE_WORDS: usize = 6;

fn ack_re() -> &'static Regex {
    ACK_RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*(yes|yep|yeah|y|ok|okay|k|fine|great|good|perfect|thanks|thank you|thx|cheers|no that'?s all|that'?s all|all good|all set|done|solved|resolved|bye|goodbye|see ya|see you)\.?\s*$",
        )
        .unwrap()
    })
}

/// Whether an utterance only acknowledges or closes the current task.
///
/// Either a whole-utterance stock phrase ("thanks", "all set."), or a short
/// utterance mentioning a closure word ("ok that's fixed now").
pub fn is_acknowledgement(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    if ack_re().is_match(trimmed) {
        return true;
    }
    let lowered = trimmed.to_lowercase();
    lowered.split_whitespace().count() <= SHORT_UTTERANCE_WORDS
        && CLOSURE_WORDS.iter().any(|w| lowered.contains(w))
}
