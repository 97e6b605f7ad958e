//! Identifier parsing helpers shared by every loader.

/// Parses a milepost reference of the form `"663+0.0150"` into miles along
/// the corridor (`663.015`). Returns `None` for anything that does not match
/// the `major+minor` form.
#[must_use]
pub fn parse_milepost(raw: &str) -> Option<f64> {
    let mut parts = raw.trim().split('+');
    let major = parts.next()?.parse::<f64>().ok()?;
    let minor = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(major + minor)
}

/// Trims and uppercases a corridor or route identifier.
#[must_use]
pub fn normalize_id(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Strips a single trailing letter from a departmental route string, after
/// normalizing it. Route suffix letters mark subsections of the same signed
/// route (`"N-1A"` -> `"N-1"`); routes without a suffix pass through
/// (`"U-8133"` -> `"U-8133"`).
#[must_use]
pub fn strip_trailing_letter(route_id: &str) -> String {
    let mut normalized = normalize_id(route_id);
    if normalized
        .chars()
        .last()
        .is_some_and(|c| c.is_ascii_alphabetic())
    {
        normalized.pop();
    }
    normalized
}

/// Parses an optional numeric CSV field, treating empty and malformed
/// values as absent.
#[must_use]
pub fn parse_optional_f64(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_milepost_reference() {
        assert_eq!(parse_milepost("663+0.0150"), Some(663.015));
        assert_eq!(parse_milepost("000+0.0000"), Some(0.0));
        assert_eq!(parse_milepost(" 012+1.5 "), Some(13.5));
    }

    #[test]
    fn rejects_malformed_milepost() {
        assert_eq!(parse_milepost("663"), None);
        assert_eq!(parse_milepost("663+0.1+0.2"), None);
        assert_eq!(parse_milepost("abc+0.5"), None);
        assert_eq!(parse_milepost(""), None);
    }

    #[test]
    fn strips_single_trailing_letter() {
        assert_eq!(strip_trailing_letter("N-1A"), "N-1");
        assert_eq!(strip_trailing_letter("n-1a"), "N-1");
        assert_eq!(strip_trailing_letter("U-8133"), "U-8133");
        assert_eq!(strip_trailing_letter(""), "");
    }

    #[test]
    fn normalizes_identifiers() {
        assert_eq!(normalize_id("  c000001 "), "C000001");
    }

    #[test]
    fn parses_optional_numbers() {
        assert_eq!(parse_optional_f64("4000"), Some(4000.0));
        assert_eq!(parse_optional_f64("  "), None);
        assert_eq!(parse_optional_f64("n/a"), None);
    }
}
