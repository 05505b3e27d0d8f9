//! Text canonicalization for phrase matching and index keys.

/// Canonicalize text to the comparison form used by the matcher.
///
/// Lowercases, maps German diacritics to their ASCII digraphs
/// (ä→ae, ö→oe, ü→ue, ß→ss), strips everything outside `[a-z0-9\s]`
/// (so "geht's" becomes "gehts", one word), collapses whitespace runs
/// and trims.
///
/// Idempotent: `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let mut mapped = String::with_capacity(text.len());
    for ch in text.to_lowercase().chars() {
        match ch {
            'ä' => mapped.push_str("ae"),
            'ö' => mapped.push_str("oe"),
            'ü' => mapped.push_str("ue"),
            'ß' => mapped.push_str("ss"),
            'a'..='z' | '0'..='9' => mapped.push(ch),
            // Underscores separate words in index keys; treating them as
            // whitespace keeps key derivation idempotent.
            '_' => mapped.push(' '),
            c if c.is_whitespace() => mapped.push(' '),
            _ => {}
        }
    }
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive the stable index key for a phrase: normalized text with internal
/// spaces replaced by underscores.
///
/// Also idempotent: underscores in an already-derived key re-normalize to
/// spaces and are joined back, so `phrase_key(phrase_key(x)) == phrase_key(x)`
/// and `phrase_key(normalize(x)) == phrase_key(x)`.
///
/// Two distinct phrases may normalize identically; they share one key and
/// one index bucket. That is tolerated, not an error.
pub fn phrase_key(text: &str) -> String {
    normalize(text).replace(' ', "_")
}

/// Recover a displayable phrase from an index key (the degraded-mode source
/// of phrases when no catalog file is present).
pub fn key_to_display(key: &str) -> String {
    key.replace('_', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_diacritics() {
        assert_eq!(normalize("Grüß dich!"), "gruess dich");
        assert_eq!(normalize("SCHÖN"), "schoen");
        assert_eq!(normalize("Ärger über Müll"), "aerger ueber muell");
    }

    #[test]
    fn test_strips_punctuation_and_collapses_whitespace() {
        assert_eq!(normalize("Wie geht's?"), "wie gehts");
        assert_eq!(normalize("  ein\t test \n hier  "), "ein test hier");
        assert_eq!(normalize("-- (nichts!) --"), "nichts");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for s in [
            "Grüß dich!",
            "Wie geht's?",
            "  schon   normal  ",
            "123 Mal täglich",
            "",
        ] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_phrase_key_derivation() {
        assert_eq!(phrase_key("Guten Morgen"), "guten_morgen");
        assert_eq!(phrase_key("Wie geht's?"), "wie_gehts");
        // Stable under re-application and under pre-normalized input.
        assert_eq!(phrase_key("guten_morgen"), "guten_morgen");
        assert_eq!(phrase_key(&normalize("Guten Morgen")), "guten_morgen");
    }

    #[test]
    fn test_key_to_display_round_trip() {
        assert_eq!(key_to_display("guten_morgen"), "guten morgen");
        assert_eq!(phrase_key(&key_to_display("guten_morgen")), "guten_morgen");
    }
}
