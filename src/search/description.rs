use std::sync::OnceLock;

use regex::Regex;

pub const DEFAULT_MAX_LENGTH: usize = 150;

static SENTENCE_END: OnceLock<Regex> = OnceLock::new();

fn sentence_end() -> &'static Regex {
    SENTENCE_END.get_or_init(|| Regex::new(r"[.!?]+").expect("valid sentence regex"))
}

/// Builds a short feed description from extracted article text.
///
/// Whole sentences are taken in order until the next one would push the
/// result past `max_length` characters. If not even the first sentence fits,
/// the raw text is cut at `max_length` and suffixed with `...`.
pub fn generate_description(text: &str, max_length: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut description = String::new();
    let mut length = 0;

    for sentence in sentence_end()
        .split(text)
        .filter(|s| !s.trim().is_empty())
    {
        if length + sentence.chars().count() > max_length {
            break;
        }
        description.push_str(sentence.trim());
        description.push_str(". ");
        length = description.chars().count();
    }

    let description = description.trim();
    if !description.is_empty() {
        return description.to_string();
    }

    let truncated: String = text.chars().take(max_length).collect();
    format!("{truncated}...")
}
