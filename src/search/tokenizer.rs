use regex::Regex;
use std::sync::LazyLock;

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s.,\-?!;:]+").expect("separator pattern is valid"));

/// Splits on runs of whitespace and `. , - ? ! ; :`. Order and case are kept;
/// empty tokens (leading or trailing separators) are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    SEPARATORS
        .split(text)
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}
