//! Answer checking: trim, fold case, compare

/// Canonical form of an answer for comparison
pub fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Whether `user_answer` matches `expected` after normalization
///
/// Equality is the only criterion; there is no fuzzy matching or partial
/// credit, and diacritics are significant ("Apfel" != "Äpfel").
pub fn is_correct(user_answer: &str, expected: &str) -> bool {
    normalize(user_answer) == normalize(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_and_case_fold() {
        assert!(is_correct("Apfel ", "apfel"));
        assert!(is_correct("  HAUS", "Haus"));
        assert!(is_correct("guten morgen", "Guten Morgen\n"));
    }

    #[test]
    fn test_mismatch() {
        assert!(!is_correct("apple", "apfel"));
        assert!(!is_correct("Apfel", "Äpfel"));
        assert!(!is_correct("der Apfel", "Apfel"));
    }

    #[test]
    fn test_empty_answer() {
        assert!(!is_correct("", "apfel"));
        assert!(!is_correct("   ", "apfel"));
        assert!(is_correct(" ", ""));
    }

    #[test]
    fn test_unicode_case_folding() {
        assert!(is_correct("ÜBUNG", "übung"));
        assert!(is_correct("Σοφία", "σοφία"));
    }
}
