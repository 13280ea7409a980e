//! Small shared helpers: slugs, email-domain checks, date display.

/// Convert a client name to a URL-safe kebab-case slug.
///
/// Example: "Acme Corp" → "acme-corp"
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Whether an email belongs to the configured internal domain.
///
/// Comparison is case-insensitive on the domain part. An email without
/// an `@` is treated as external (it can't match the domain).
pub fn is_internal_email(email: &str, internal_domain: &str) -> bool {
    match email.rsplit_once('@') {
        Some((_, domain)) => domain.eq_ignore_ascii_case(internal_domain),
        None => false,
    }
}

/// Render an ISO-8601 timestamp as `YYYY-MM-DD` for display.
///
/// Falls back to the first 10 characters of the raw string when the
/// timestamp doesn't parse (dates from external sources vary).
pub fn format_date(iso: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(iso) {
        Ok(dt) => dt.format("%Y-%m-%d").to_string(),
        Err(_) => iso.chars().take(10).collect(),
    }
}

/// Render an ISO-8601 timestamp as `YYYY-MM-DD HH:MM` for display.
pub fn format_datetime(iso: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(iso) {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => iso.chars().take(16).collect::<String>().replace('T', " "),
    }
}

/// Current UTC time as an RFC 3339 string, the storage format for all
/// timestamp columns.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Case-insensitive occurrence count, the relevance score for LIKE-based
/// search results.
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack
        .to_lowercase()
        .matches(&needle.to_lowercase())
        .count()
}

/// A short excerpt around the first case-insensitive occurrence of `needle`,
/// with ellipses marking cut edges. Returns the head of the text when the
/// needle isn't present. Slicing is char-safe.
pub fn excerpt(text: &str, needle: &str, radius: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let hit = if needle.is_empty() {
        None
    } else {
        // Anchor on the lowercased text; char offsets there line up with the
        // original for all but exotic case-expanding characters, so clamp.
        let lower = text.to_lowercase();
        lower
            .find(&needle.to_lowercase())
            .map(|byte_pos| lower[..byte_pos].chars().count().min(chars.len()))
    };

    let (start, end) = match hit {
        Some(pos) => (pos.saturating_sub(radius), (pos + radius).min(chars.len())),
        None => (0, (radius * 2).min(chars.len())),
    };

    let mut out = String::new();
    if start > 0 {
        out.push_str("...");
    }
    out.extend(&chars[start..end]);
    if end < chars.len() {
        out.push_str("...");
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
    }

    #[test]
    fn test_slugify_underscores_and_case() {
        assert_eq!(slugify("Goji_Labs Internal"), "goji-labs-internal");
    }

    #[test]
    fn test_slugify_collapses_punctuation() {
        assert_eq!(slugify("NB44 - Intuit"), "nb44-intuit");
    }

    #[test]
    fn test_internal_email() {
        assert!(is_internal_email("adam@gojilabs.com", "gojilabs.com"));
        assert!(is_internal_email("Adam@GojiLabs.com", "gojilabs.com"));
        assert!(!is_internal_email("sarah@acme.com", "gojilabs.com"));
        assert!(!is_internal_email("not-an-email", "gojilabs.com"));
    }

    #[test]
    fn test_format_date_rfc3339() {
        assert_eq!(format_date("2026-03-15T10:30:00+00:00"), "2026-03-15");
        assert_eq!(format_date("2026-03-15T10:30:00Z"), "2026-03-15");
    }

    #[test]
    fn test_format_date_fallback() {
        assert_eq!(format_date("2026-03-15 oddness"), "2026-03-15");
        assert_eq!(format_date(""), "");
    }

    #[test]
    fn test_format_datetime() {
        assert_eq!(format_datetime("2026-03-15T10:30:00Z"), "2026-03-15 10:30");
        assert_eq!(format_datetime("2026-03-15T10:30"), "2026-03-15 10:30");
    }

    #[test]
    fn test_count_occurrences() {
        assert_eq!(count_occurrences("Budget, budget, BUDGET", "budget"), 3);
        assert_eq!(count_occurrences("nothing here", "budget"), 0);
        assert_eq!(count_occurrences("anything", ""), 0);
    }

    #[test]
    fn test_excerpt_centers_on_match() {
        let text = format!("{} budget talk {}", "x".repeat(300), "y".repeat(300));
        let ex = excerpt(&text, "budget", 20);
        assert!(ex.contains("budget"));
        assert!(ex.starts_with("..."));
        assert!(ex.ends_with("..."));
        assert!(ex.len() < 80);
    }

    #[test]
    fn test_excerpt_no_match_returns_head() {
        let ex = excerpt("short text without the word", "zzz", 100);
        assert_eq!(ex, "short text without the word");
    }
}
