//! Random resource-name generation.

/// Alphabet for generated name suffixes: consonants plus digits, so the
/// suffix never spells an accidental word.
const SUFFIX_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxyz0123456789";

/// Length of a generated suffix.
const SUFFIX_LEN: usize = 5;

/// Prefix used for auto-generated namespace names.
pub const NAMESPACE_PREFIX: &str = "kest-";

/// Draw a 5-character suffix uniformly from the consonant/digit alphabet.
pub fn random_suffix() -> String {
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[fastrand::usize(..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// A generated name: the given prefix plus a random suffix.
pub fn generated_name(prefix: &str) -> String {
    format!("{prefix}{}", random_suffix())
}
