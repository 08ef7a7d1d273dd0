/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// Clean a raw cell; empty cells are missing.
pub fn clean_cell(raw: &str) -> Option<String> {
    let c = clean_str(raw);
    if c.is_empty() {
        None
    } else {
        Some(c.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_strips_whitespace_and_wrapping_quotes() {
        assert_eq!(clean_str("  PG-13 "), "PG-13");
        assert_eq!(clean_str("\" 90 min\""), "90 min");
        assert_eq!(clean_str("\""), "\"");
        assert_eq!(clean_cell("   "), None);
        assert_eq!(clean_cell(" x "), Some("x".to_string()));
    }
}
