//! Text preprocessing for narration.
//!
//! Labels come straight from simulators, so they may carry stray whitespace
//! or line breaks. [`clean_for_speech`] tidies them for the speech service
//! and [`dedupe_key`] produces the comparison form used for coalescing.

/// Punctuation that does not change what is said.
///
/// Operators such as `<`, `>` and `=` are deliberately absent: "4 < 7" and
/// "4 > 7" must not coalesce.
const SILENT_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '\'', '"', '(', ')', '[', ']', '{', '}', '…', '¡', '¿', '“',
    '”', '‘', '’',
];

/// Collapse runs of whitespace to single spaces and trim.
#[must_use]
pub fn clean_for_speech(text: &str) -> String {
    collapse_whitespace(text)
}

/// Normalized form of `text` for duplicate detection.
///
/// Lowercased, silent punctuation removed, whitespace collapsed. An empty
/// result means there is nothing worth speaking.
#[must_use]
pub fn dedupe_key(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !SILENT_PUNCTUATION.contains(c))
        .flat_map(char::to_lowercase)
        .collect();
    collapse_whitespace(&stripped)
}

fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev_space = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else {
            result.push(c);
            prev_space = false;
        }
    }

    result.trim().to_string()
}
