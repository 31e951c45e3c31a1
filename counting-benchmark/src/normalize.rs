//! Normalization of numeric model answers

/// Parse a model answer that should be a bare integer.
///
/// Surrounding whitespace and a leading sign are accepted; anything else
/// (words, units, decimals, digit groups) is treated as unparseable and
/// yields `None`, as does a missing answer.
pub fn normalize_count(answer: Option<&str>) -> Option<i64> {
    let text = answer?.trim();
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<i64>().ok()
}

/// Render a normalized count as a table cell
pub fn format_count(count: Option<i64>) -> Option<String> {
    count.map(|c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_integers() {
        assert_eq!(normalize_count(Some("12")), Some(12));
        assert_eq!(normalize_count(Some(" 12\n")), Some(12));
        assert_eq!(normalize_count(Some("+7")), Some(7));
        assert_eq!(normalize_count(Some("-3")), Some(-3));
        assert_eq!(normalize_count(Some("0")), Some(0));
    }

    #[test]
    fn test_words_are_missing_not_errors() {
        assert_eq!(normalize_count(Some("twelve")), None);
        assert_eq!(normalize_count(Some("12 apples")), None);
        assert_eq!(normalize_count(Some("There are 12 apples.")), None);
    }

    #[test]
    fn test_malformed_numbers() {
        assert_eq!(normalize_count(Some("12.")), None);
        assert_eq!(normalize_count(Some("12.5")), None);
        assert_eq!(normalize_count(Some("1,200")), None);
        assert_eq!(normalize_count(Some("")), None);
        assert_eq!(normalize_count(Some("+")), None);
        assert_eq!(normalize_count(Some("99999999999999999999999")), None);
    }

    #[test]
    fn test_missing_answer() {
        assert_eq!(normalize_count(None), None);
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(Some(40)), Some("40".to_string()));
        assert_eq!(format_count(None), None);
    }
}
