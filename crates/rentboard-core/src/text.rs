//! Text normalization for keyword and location matching.
//!
//! Listing text and saved-search keywords are folded through the same
//! pipeline so matching is case- and diacritic-insensitive: Unicode
//! lowercasing, folding of common Latin diacritics and Cyrillic ё, then
//! splitting on non-alphanumeric boundaries.

/// Lowercase and fold diacritics, preserving non-letter characters.
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .flat_map(char::to_lowercase)
        .map(fold_char)
        .collect()
}

/// Split normalized text into alphanumeric tokens.
pub fn tokenize(input: &str) -> Vec<String> {
    normalize(input)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// Map an already-lowercased character to its base form.
const fn fold_char(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'ç' => 'c',
        'ñ' => 'n',
        'ё' => 'е',
        _ => c,
    }
}
