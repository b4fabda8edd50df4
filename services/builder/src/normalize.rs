use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lookup key for a place name: lowercased, trimmed, diacritics removed.
///
/// Idempotent, so normalizing an already-normalized key is a no-op.
pub fn normalize(text: &str) -> String {
    // Decompose before lowercasing: a few precomposed capitals (e.g. 'İ')
    // lowercase into a base letter plus a combining mark.
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();
    folded.trim().to_string()
}
