//! Response shaper — post-processes a candidate reply into a single short,
//! single-question utterance.
//!
//! Whatever the LLM (or a fallback path) produced, the shaped reply is
//! guaranteed to contain no list lines, at most two sentences, exactly one
//! question mark, and at most `max_chars` characters. A reply identical to
//! the previous assistant turn gets a clarification suffix so the dialogue
//! never visibly repeats itself, which is a real risk when a fallback
//! question is reused.

use std::sync::LazyLock;

use regex::Regex;

use crate::extract::normalize;

static LIST_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[•\-*]|\d+\.)\s").expect("list pattern compiles"));

/// Shape `raw` into the final reply. Pure over its inputs; cannot fail.
///
/// `fallback_question` is appended (as the question) when `raw` carries no
/// question of its own. `previous_assistant` is the immediately preceding
/// assistant turn, used for the anti-repeat check.
pub fn shape_reply(
    raw: &str,
    fallback_question: &str,
    previous_assistant: Option<&str>,
    max_chars: usize,
) -> String {
    let flat = strip_list_lines(raw);
    let parts = sentences(&flat);

    let mut text = if flat.contains('?') {
        let limited = parts.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
        match limited.find('?') {
            // Exactly one question: everything after the first '?' is dropped.
            Some(idx) => limited[..=idx].to_string(),
            // The question sat beyond the two-sentence cap; ask the fallback.
            None => one_sentence_plus_fallback(&parts, fallback_question),
        }
    } else {
        one_sentence_plus_fallback(&parts, fallback_question)
    };

    if text.chars().count() > max_chars {
        let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        let kept = kept.trim_end().trim_end_matches(['.', '!', '?', ',', ';']);
        text = format!("{}?", kept.trim_end());
    }

    if let Some(prev) = previous_assistant {
        if normalize(prev) == normalize(&text) {
            let base = text.trim_end_matches('?').trim_end().to_string();
            text = format!("{base} (quick clarification)?");
        }
    }

    text
}

/// Drop bullet/numbered lines and collapse the rest onto one line.
fn strip_list_lines(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !LIST_LINE.is_match(line))
        .collect();
    normalize_spacing(&kept.join(" "))
}

fn normalize_spacing(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split on sentence-terminal punctuation, keeping the terminator with its
/// sentence.
fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            out.push(current.trim().to_string());
            current.clear();
        }
    }
    let tail = current.trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

fn one_sentence_plus_fallback(parts: &[String], fallback_question: &str) -> String {
    let question = format!("{}?", fallback_question.trim_end().trim_end_matches('?'));
    match parts.first() {
        Some(first) if !first.is_empty() && !first.contains('?') => {
            format!("{} {}", first, question)
        }
        _ => question,
    }
}
