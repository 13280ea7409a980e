//! Client detection from meeting titles and attendee data.
//!
//! Priority: user-defined aliases beat known client names, which beat title
//! patterns, which beat attendee-company inference. The caller supplies the
//! alias pairs longest-alias-first so overlapping aliases resolve the same
//! way every run.

use std::sync::OnceLock;

use regex::Regex;

use crate::granola::cache::Attendee;
use crate::util::is_internal_email;

/// Company values that never identify a client.
const NON_CLIENT_COMPANIES: [&str; 3] = ["unknown", "goji labs", "gojilabs"];

/// Result of detecting a client for one meeting.
#[derive(Debug, Clone)]
pub struct DetectedClient {
    pub name: String,
    pub method: DetectMethod,
}

/// Which rule produced the match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectMethod {
    /// User-defined alias found in the title.
    Alias,
    /// A known client's name appears in the title.
    KnownClient,
    /// Title pattern like "Client x Goji", "Client:", "Record Client".
    TitlePattern,
    /// All external attendees belong to one company.
    AttendeeCompany,
}

// Compile-once title patterns via OnceLock.
fn re_partner() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^([A-Za-z0-9]+)\s+x\s+Goji").unwrap())
}

fn re_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^([A-Za-z0-9]+):").unwrap())
}

fn re_record() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^Record\s+([A-Za-z0-9]+)").unwrap())
}

/// Detect the client for a meeting from its title and attendees.
///
/// `aliases` maps lowercased alias strings to canonical client names, in
/// match-priority order (longest alias first, ties alphabetical).
/// `known_clients` is scanned in the order given.
pub fn detect(
    title: &str,
    attendees: &[Attendee],
    known_clients: &[String],
    aliases: &[(String, String)],
    internal_domain: &str,
) -> Option<DetectedClient> {
    if title.is_empty() {
        return None;
    }
    let title_lower = title.to_lowercase();

    // 1. Aliases first: user-defined mappings always win.
    for (alias, canonical) in aliases {
        if title_lower.contains(alias.as_str()) {
            return Some(DetectedClient {
                name: canonical.clone(),
                method: DetectMethod::Alias,
            });
        }
    }

    // 2. Known client name appears in the title.
    for client in known_clients {
        if title_lower.contains(&client.to_lowercase()) {
            return Some(DetectedClient {
                name: client.clone(),
                method: DetectMethod::KnownClient,
            });
        }
    }

    // 3. Title pattern extraction, fixed order.
    for re in [re_partner(), re_prefix(), re_record()] {
        if let Some(caps) = re.captures(title) {
            if let Some(name) = caps.get(1) {
                return Some(DetectedClient {
                    name: name.as_str().to_string(),
                    method: DetectMethod::TitlePattern,
                });
            }
        }
    }

    // 4. External attendee company: exactly one distinct value identifies
    // the client, zero or several is ambiguous.
    let mut external_companies: Vec<&str> = Vec::new();
    for att in attendees {
        let Some(ref email) = att.email else { continue };
        if email.is_empty() || is_internal_email(email, internal_domain) {
            continue;
        }
        let Some(ref company) = att.company else { continue };
        if company.is_empty() {
            continue;
        }
        let company_lower = company.to_lowercase();
        if NON_CLIENT_COMPANIES.contains(&company_lower.as_str()) {
            continue;
        }
        if !external_companies.contains(&company.as_str()) {
            external_companies.push(company);
        }
    }

    if external_companies.len() == 1 {
        return Some(DetectedClient {
            name: external_companies[0].to_string(),
            method: DetectMethod::AttendeeCompany,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn att(email: Option<&str>, company: Option<&str>) -> Attendee {
        Attendee {
            email: email.map(String::from),
            name: None,
            company: company.map(String::from),
        }
    }

    const DOMAIN: &str = "gojilabs.com";

    #[test]
    fn test_empty_title_never_matches() {
        let attendees = vec![att(Some("a@ext.com"), Some("Acme"))];
        let clients = vec!["Acme".to_string()];
        let result = detect("", &attendees, &clients, &[], DOMAIN);
        assert!(result.is_none());
    }

    #[test]
    fn test_alias_beats_known_client() {
        let clients = vec!["Mothership".to_string()];
        let aliases = vec![("mothership".to_string(), "NGynS".to_string())];
        let result = detect("Mothership weekly", &[], &clients, &aliases, DOMAIN).unwrap();
        assert_eq!(result.name, "NGynS");
        assert_eq!(result.method, DetectMethod::Alias);
    }

    #[test]
    fn test_alias_matches_any_case() {
        let aliases = vec![("nb44".to_string(), "NB44 Corp".to_string())];
        let result = detect("NB44 standup", &[], &[], &aliases, DOMAIN).unwrap();
        assert_eq!(result.name, "NB44 Corp");
    }

    #[test]
    fn test_first_alias_in_order_wins() {
        // Caller supplies longest-first; overlapping aliases resolve by order.
        let aliases = vec![
            ("acme corp".to_string(), "Acme Corporation".to_string()),
            ("acme".to_string(), "Acme Inc".to_string()),
        ];
        let result = detect("Acme Corp sync", &[], &[], &aliases, DOMAIN).unwrap();
        assert_eq!(result.name, "Acme Corporation");
    }

    #[test]
    fn test_known_client_case_insensitive() {
        let clients = vec!["NGynS".to_string()];
        let result = detect("ngyns design review", &[], &clients, &[], DOMAIN).unwrap();
        assert_eq!(result.name, "NGynS");
        assert_eq!(result.method, DetectMethod::KnownClient);
    }

    #[test]
    fn test_pattern_x_goji() {
        let result = detect("NGynS x Goji Weekly", &[], &[], &[], DOMAIN).unwrap();
        assert_eq!(result.name, "NGynS");
        assert_eq!(result.method, DetectMethod::TitlePattern);
    }

    #[test]
    fn test_pattern_colon_prefix() {
        let result = detect("GS1: roadmap review", &[], &[], &[], DOMAIN).unwrap();
        assert_eq!(result.name, "GS1");
        assert_eq!(result.method, DetectMethod::TitlePattern);
    }

    #[test]
    fn test_pattern_record_prefix() {
        let result = detect("record NB44 walkthrough", &[], &[], &[], DOMAIN).unwrap();
        assert_eq!(result.name, "NB44");
        assert_eq!(result.method, DetectMethod::TitlePattern);
    }

    #[test]
    fn test_pattern_order_x_goji_before_colon() {
        // "Acme x Goji: notes" satisfies both; the partner pattern runs first.
        let result = detect("Acme x Goji: notes", &[], &[], &[], DOMAIN);
        assert_eq!(result.unwrap().name, "Acme");
    }

    #[test]
    fn test_single_external_company() {
        let attendees = vec![
            att(Some("a@ext.com"), Some("Acme")),
            att(Some("b@ext.com"), Some("Acme")),
            att(Some("me@gojilabs.com"), Some("Goji Labs")),
        ];
        let result = detect("Untitled sync", &attendees, &[], &[], DOMAIN).unwrap();
        assert_eq!(result.name, "Acme");
        assert_eq!(result.method, DetectMethod::AttendeeCompany);
    }

    #[test]
    fn test_multiple_external_companies_ambiguous() {
        let attendees = vec![
            att(Some("a@ext.com"), Some("Acme")),
            att(Some("b@other.com"), Some("Beta")),
        ];
        let result = detect("Untitled sync", &attendees, &[], &[], DOMAIN);
        assert!(result.is_none());
    }

    #[test]
    fn test_excluded_companies_ignored() {
        let attendees = vec![
            att(Some("a@ext.com"), Some("Unknown")),
            att(Some("b@ext.com"), Some("Goji Labs")),
            att(Some("c@ext.com"), Some("Acme")),
        ];
        let result = detect("Untitled sync", &attendees, &[], &[], DOMAIN).unwrap();
        assert_eq!(result.name, "Acme");
    }

    #[test]
    fn test_internal_domain_compared_case_insensitively() {
        let attendees = vec![
            att(Some("me@GojiLabs.com"), Some("Acme")),
            att(Some("a@ext.com"), Some("Beta")),
        ];
        let result = detect("Untitled sync", &attendees, &[], &[], DOMAIN).unwrap();
        assert_eq!(result.name, "Beta");
    }

    #[test]
    fn test_attendees_missing_fields_skipped() {
        let attendees = vec![
            att(None, Some("Acme")),
            att(Some("a@ext.com"), None),
            att(Some(""), Some("Beta")),
        ];
        let result = detect("Untitled sync", &attendees, &[], &[], DOMAIN);
        assert!(result.is_none());
    }

    #[test]
    fn test_internal_only_attendees_no_match() {
        let attendees = vec![
            att(Some("me@gojilabs.com"), Some("Goji Labs")),
            att(Some("you@gojilabs.com"), Some("Goji Labs")),
        ];
        let result = detect("Untitled sync", &attendees, &[], &[], DOMAIN);
        assert!(result.is_none());
    }

    #[test]
    fn test_title_rules_beat_attendees() {
        let attendees = vec![att(Some("a@ext.com"), Some("Beta"))];
        let clients = vec!["Acme".to_string()];
        let result = detect("Acme check-in", &attendees, &clients, &[], DOMAIN).unwrap();
        assert_eq!(result.name, "Acme");
        assert_eq!(result.method, DetectMethod::KnownClient);
    }
}
