//! Code-aware tokenizer for the BM25 index.
//!
//! Input is split into runs of `[A-Za-z0-9]`, each run is further split at
//! camelCase boundaries (underscore splits fall out for free, since `_` is
//! already a non-alphanumeric run separator), every piece is lowercased,
//! and anything shorter than two characters is discarded. Stop words are
//! deliberately not removed: code identifiers rarely collide with English
//! stop words, and removing them would hurt identifier recall.

/// Tokenize `text` into a lazy sequence of lowercase tokens of length >= 2.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|run| !run.is_empty())
        .flat_map(split_camel_case)
        .map(|s| s.to_lowercase())
        .filter(|s| s.chars().count() >= 2)
}

/// Split a single alphanumeric run at camelCase boundaries
/// (`fooBarBaz` -> `foo`, `Bar`, `Baz`) and at acronym boundaries
/// (`HTTPRequest` -> `HTTP`, `Request`). A boundary occurs wherever an
/// uppercase letter directly follows a lowercase letter or digit, or
/// wherever an uppercase run ends just before a capitalized word (the
/// last uppercase letter of a run, when followed by a lowercase letter
/// and preceded by another uppercase letter, starts the next word).
fn split_camel_case(run: &str) -> Vec<&str> {
    if run.is_empty() {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut start = 0usize;
    let chars: Vec<char> = run.chars().collect();

    for i in 1..chars.len() {
        let prev = chars[i - 1];
        let curr = chars[i];
        let next = chars.get(i + 1);

        let lower_to_upper = curr.is_ascii_uppercase() && (prev.is_ascii_lowercase() || prev.is_ascii_digit());
        let acronym_end = curr.is_ascii_uppercase()
            && prev.is_ascii_uppercase()
            && next.is_some_and(|n| n.is_ascii_lowercase());

        if lower_to_upper || acronym_end {
            let byte_idx = chars[..i].iter().collect::<String>().len();
            parts.push(&run[start..byte_idx]);
            start = byte_idx;
        }
    }
    parts.push(&run[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        tokenize(s).collect()
    }

    #[test]
    fn splits_camel_case() {
        assert_eq!(toks("fooBarBaz"), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn splits_snake_case_via_non_alphanumeric_run_boundary() {
        assert_eq!(toks("foo_bar_baz"), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn get_user_data_from_api() {
        let tokens = toks("getUserDataFromAPI");
        assert!(tokens.contains(&"get".to_string()));
        assert!(tokens.contains(&"user".to_string()));
        assert!(tokens.contains(&"data".to_string()));
        assert!(tokens.contains(&"api".to_string()));
    }

    #[test]
    fn discards_short_tokens() {
        assert_eq!(toks("a bb c dd"), vec!["bb", "dd"]);
    }

    #[test]
    fn lowercases_everything() {
        assert_eq!(toks("HTTPRequest"), vec!["http", "request"]);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(toks("").is_empty());
        assert!(toks("   ").is_empty());
    }

    #[test]
    fn preserves_input_order() {
        assert_eq!(toks("zebra apple mango"), vec!["zebra", "apple", "mango"]);
    }
}
