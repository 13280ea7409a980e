//! Markdown rendering for tool responses.
//!
//! Every tool returns human-readable text. The rendering lives here, away
//! from the transport layer, so the exact response shapes are testable
//! without an MCP client.

use std::collections::HashMap;

use crate::archive::ArchiveReport;
use crate::db::{
    ArchiveStats, ClientWithCount, ContextSearchHit, DbClient, DbClientContext, DbIntegration,
    DbMeeting, MeetingOverview, MeetingSearchHit,
};
use crate::util::{format_date, format_datetime};

/// Display cap for notes in a details card.
pub const NOTES_LIMIT: usize = 10_000;
/// Display cap for a full transcript.
pub const TRANSCRIPT_LIMIT: usize = 50_000;

/// Char-safe truncation, appending the notice when text was cut.
fn truncate_with_notice(text: &str, limit: usize, notice: &str) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let head: String = text.chars().take(limit).collect();
    format!("{}\n\n{}", head, notice)
}

/// One-line meeting summary: `[id] YYYY-MM-DD - title (client)`.
pub fn meeting_summary(m: &MeetingOverview) -> String {
    let client = m.client_name.as_deref().unwrap_or("Unassigned");
    format!(
        "[{}] {} - {} ({})",
        m.id,
        format_date(&m.meeting_date),
        m.title,
        client
    )
}

/// Full details card: metadata, summary, notes. Never the transcript; that
/// has its own tool and its own display cap.
pub fn meeting_details(m: &DbMeeting) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("# {}", m.title));
    lines.push(format!("**Date:** {}", format_datetime(&m.meeting_date)));
    if let Some(ref client) = m.client_name {
        lines.push(format!("**Client:** {}", client));
    }
    if m.meeting_type != "general" {
        lines.push(format!("**Type:** {}", m.meeting_type));
    }
    lines.push(format!("**Meeting ID:** {}", m.id));
    lines.push(String::new());

    if let Some(ref summary) = m.summary_overview {
        lines.push("## Summary".to_string());
        lines.push(summary.clone());
        lines.push(String::new());
    }

    let notes = m.enhanced_notes.as_deref().or(m.manual_notes.as_deref());
    if let Some(notes) = notes {
        lines.push("## Notes".to_string());
        lines.push(truncate_with_notice(
            notes,
            NOTES_LIMIT,
            "[Notes truncated - showing the first 10000 characters]",
        ));
        lines.push(String::new());
    }

    lines.push("Use get_meeting_transcript(meeting_id) for the word-for-word record.".to_string());

    lines.join("\n")
}

pub fn meeting_transcript(m: &DbMeeting) -> String {
    let Some(ref transcript) = m.transcript else {
        return format!("No transcript available for meeting '{}'.", m.title);
    };

    let lines = [
        format!("# Transcript: {}", m.title),
        format!("**Date:** {}", format_date(&m.meeting_date)),
        String::new(),
        truncate_with_notice(
            transcript,
            TRANSCRIPT_LIMIT,
            "[Transcript truncated - showing the first 50000 characters]",
        ),
    ];

    lines.join("\n")
}

pub fn client_list(clients: &[ClientWithCount]) -> String {
    if clients.is_empty() {
        return "No clients found. Meetings may not be tagged with clients yet.".to_string();
    }

    let mut lines = vec!["# Clients\n".to_string()];
    for client in clients {
        lines.push(format!(
            "- **{}**: {} meetings",
            client.name, client.meeting_count
        ));
    }
    lines.join("\n")
}

pub fn recent_meetings(days: u32, meetings: &[MeetingOverview]) -> String {
    if meetings.is_empty() {
        return format!("No meetings found in the last {} days.", days);
    }

    let mut lines = vec![format!("# Meetings from last {} days\n", days)];
    for m in meetings {
        lines.push(format!("- {}", meeting_summary(m)));
    }
    lines.join("\n")
}

pub fn client_meetings(client_name: &str, meetings: &[MeetingOverview]) -> String {
    let mut lines = vec![format!(
        "# Meetings for {} ({} total)\n",
        client_name,
        meetings.len()
    )];
    for m in meetings {
        lines.push(format!("- {}", meeting_summary(m)));
    }
    lines.join("\n")
}

pub fn search_results(query: &str, hits: &[MeetingSearchHit]) -> String {
    if hits.is_empty() {
        return format!("No meetings found matching '{}'.", query);
    }

    let mut lines = vec![format!(
        "# Search results for '{}' ({} matches)\n",
        query,
        hits.len()
    )];
    for hit in hits {
        let client = hit.client_name.as_deref().unwrap_or("Unassigned");
        lines.push(format!(
            "## [{}] {} - {} ({})",
            hit.id,
            format_date(&hit.meeting_date),
            hit.title,
            client
        ));
        lines.push(format!("*Relevance: {}*\n", hit.rank));
        lines.push(hit.excerpt.clone());
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn title_matches(title_search: &str, meetings: &[MeetingOverview]) -> String {
    if meetings.is_empty() {
        return format!(
            "No meetings found with title containing '{}'.",
            title_search
        );
    }

    let mut lines = vec![format!("# Meetings matching '{}'\n", title_search)];
    for m in meetings {
        lines.push(format!("- {}", meeting_summary(m)));
    }
    lines.push("\nUse get_meeting_details(meeting_id) to see full details.".to_string());
    lines.join("\n")
}

pub fn archive_stats(stats: &ArchiveStats) -> String {
    let mut lines = vec![
        "# Meeting Archive Statistics\n".to_string(),
        format!("**Total meetings archived:** {}", stats.total_meetings),
        format!("**Total clients:** {}", stats.by_client.len()),
        format!(
            "**Meetings in last 30 days:** {}",
            stats.meetings_last_30_days
        ),
        String::new(),
        "## Top Clients by Meeting Count".to_string(),
    ];
    for client in stats.by_client.iter().take(5) {
        lines.push(format!(
            "- {}: {} meetings",
            client.name, client.meeting_count
        ));
    }
    lines.join("\n")
}

pub fn archive_report(report: &ArchiveReport) -> String {
    if report.already_archived == report.checked && report.errors.is_empty() && report.checked > 0 {
        return format!(
            "All {} recent meetings are already archived. Nothing new to add.",
            report.checked
        );
    }

    let mut lines = vec![
        "# Archive Results\n".to_string(),
        format!("**Checked:** {} meetings", report.checked),
        format!("**Already archived:** {}", report.already_archived),
        format!("**Newly archived:** {}", report.archived.len()),
    ];

    if !report.archived.is_empty() {
        lines.push("\n## Archived Meetings".to_string());
        for (title, client) in &report.archived {
            let short: String = title.chars().take(50).collect();
            match client {
                Some(name) => lines.push(format!("- {} → {}", short, name)),
                None => lines.push(format!("- {}", short)),
            }
        }
    }

    if !report.errors.is_empty() {
        lines.push(format!("\n**Errors:** {}", report.errors.len()));
        for error in report.errors.iter().take(3) {
            lines.push(format!("  - {}", error));
        }
    }

    lines.join("\n")
}

pub fn context_list(client_name: &str, docs: &[DbClientContext]) -> String {
    if docs.is_empty() {
        return format!("No context documents found for {}.", client_name);
    }

    let mut lines = vec![format!("# Context Documents for {}\n", client_name)];
    for doc in docs {
        let url_note = match doc.source_url {
            Some(ref url) => format!(" ([link]({}))", url),
            None => String::new(),
        };
        lines.push(format!(
            "- **[{}]** {} ({}) - {}{}",
            doc.id,
            doc.title,
            doc.context_type,
            format_date(&doc.updated_at),
            url_note
        ));
    }
    lines.push("\nUse `get_client_context(id)` to retrieve full content.".to_string());
    lines.join("\n")
}

pub fn context_details(doc: &DbClientContext) -> String {
    let mut lines = vec![
        format!("# {}", doc.title),
        format!("**Client:** {}", doc.client_name),
        format!("**Type:** {}", doc.context_type),
        format!("**Updated:** {}", format_datetime(&doc.updated_at)),
    ];
    if let Some(ref url) = doc.source_url {
        lines.push(format!("**Source:** {}", url));
    }
    lines.push(String::new());
    lines.push(doc.content.clone());
    lines.join("\n")
}

pub fn context_search_results(query: &str, hits: &[ContextSearchHit]) -> String {
    let mut lines = vec![format!("# Search Results for '{}'\n", query)];
    for hit in hits {
        lines.push(format!("## [{}] {}", hit.id, hit.title));
        lines.push(format!(
            "*Client: {} | Type: {} | Relevance: {}*\n",
            hit.client_name, hit.context_type, hit.rank
        ));
        lines.push(hit.preview.clone());
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Pull a string value out of an integration's metadata JSON.
pub fn metadata_value(metadata: Option<&str>, key: &str) -> Option<String> {
    let raw = metadata?;
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value.get(key)?.as_str().map(String::from)
}

fn integration_line(link: &DbIntegration) -> String {
    match link.integration_type.as_str() {
        "linear_team" => {
            let name_note = match link.external_name {
                Some(ref n) => format!(" ({})", n),
                None => String::new(),
            };
            let key_note = match metadata_value(link.metadata.as_deref(), "team_key") {
                Some(key) => format!(" [key: {}]", key),
                None => String::new(),
            };
            format!("  - Linear: {}{}{}", link.external_id, name_note, key_note)
        }
        "slack" => {
            let ext_note =
                match metadata_value(link.metadata.as_deref(), "external_channel_id") {
                    Some(ext) => format!(", external: {}", ext),
                    None => String::new(),
                };
            format!("  - Slack: internal: {}{}", link.external_id, ext_note)
        }
        other => {
            let name_note = match link.external_name {
                Some(ref n) => format!(" ({})", n),
                None => String::new(),
            };
            format!("  - {}: {}{}", other, link.external_id, name_note)
        }
    }
}

/// Linked and not-yet-linked clients with their integration rows.
pub fn integration_status(clients: &[ClientWithCount], links: &[DbIntegration]) -> String {
    let mut by_client: HashMap<i64, Vec<&DbIntegration>> = HashMap::new();
    for link in links {
        by_client.entry(link.client_id).or_default().push(link);
    }

    let mut linked = Vec::new();
    let mut unlinked = Vec::new();

    for client in clients {
        let header = format!("- **{}** ({} meetings)", client.name, client.meeting_count);
        match by_client.get(&client.id) {
            Some(client_links) => {
                let mut parts = vec![header];
                for link in client_links {
                    parts.push(integration_line(link));
                }
                linked.push(parts.join("\n"));
            }
            None => unlinked.push(header),
        }
    }

    let mut lines = vec!["# Client Integration Status\n".to_string()];
    if !linked.is_empty() {
        lines.push("## Linked\n".to_string());
        lines.extend(linked);
        lines.push(String::new());
    }
    if !unlinked.is_empty() {
        lines.push("## Not Linked\n".to_string());
        lines.extend(unlinked);
    }
    if clients.is_empty() {
        lines.push("No clients found.".to_string());
    }
    lines.join("\n")
}

/// Everything configured for one client: notes plus each integration.
pub fn client_config(client: &DbClient, links: &[DbIntegration]) -> String {
    let mut lines = vec![format!("# Configuration for {}\n", client.name)];

    if let Some(ref notes) = client.notes {
        lines.push("## Notes".to_string());
        lines.push(notes.clone());
        lines.push(String::new());
    }

    for link in links {
        match link.integration_type.as_str() {
            "linear_team" => {
                let name_note = match link.external_name {
                    Some(ref n) => format!(" ({})", n),
                    None => String::new(),
                };
                lines.push("## Linear Team".to_string());
                lines.push(format!("**Team ID:** {}{}", link.external_id, name_note));
                if let Some(key) = metadata_value(link.metadata.as_deref(), "team_key") {
                    lines.push(format!("**Team Key:** {}", key));
                }
                lines.push(String::new());
            }
            "slack" => {
                lines.push("## Slack Channels".to_string());
                lines.push(format!("**Internal:** {}", link.external_id));
                if let Some(ext) =
                    metadata_value(link.metadata.as_deref(), "external_channel_id")
                {
                    lines.push(format!("**External:** {}", ext));
                }
                lines.push(String::new());
            }
            other => {
                let name_note = match link.external_name {
                    Some(ref n) => format!(" ({})", n),
                    None => String::new(),
                };
                lines.push(format!("## {}", other));
                lines.push(format!("**ID:** {}{}", link.external_id, name_note));
                lines.push(String::new());
            }
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overview(id: i64, title: &str, client: Option<&str>) -> MeetingOverview {
        MeetingOverview {
            id,
            title: title.to_string(),
            meeting_date: "2026-03-15T10:30:00Z".to_string(),
            meeting_type: "general".to_string(),
            client_name: client.map(String::from),
        }
    }

    fn meeting(title: &str) -> DbMeeting {
        DbMeeting {
            id: 7,
            granola_document_id: "doc-7".to_string(),
            title: title.to_string(),
            meeting_date: "2026-03-15T10:30:00Z".to_string(),
            transcript: None,
            enhanced_notes: None,
            manual_notes: None,
            combined_markdown: None,
            summary_overview: None,
            meeting_type: "general".to_string(),
            client_id: None,
            meeting_series_id: None,
            archived_at: "2026-03-15T11:00:00Z".to_string(),
            client_name: None,
        }
    }

    #[test]
    fn test_meeting_summary_line() {
        assert_eq!(
            meeting_summary(&overview(3, "Acme Sync", Some("Acme"))),
            "[3] 2026-03-15 - Acme Sync (Acme)"
        );
        assert_eq!(
            meeting_summary(&overview(4, "Standup", None)),
            "[4] 2026-03-15 - Standup (Unassigned)"
        );
    }

    #[test]
    fn test_details_prefers_enhanced_notes() {
        let mut m = meeting("Planning");
        m.manual_notes = Some("manual".to_string());
        m.enhanced_notes = Some("enhanced".to_string());
        let card = meeting_details(&m);
        assert!(card.contains("## Notes\nenhanced"));
        assert!(!card.contains("manual"));

        m.enhanced_notes = None;
        let card = meeting_details(&m);
        assert!(card.contains("## Notes\nmanual"));
    }

    #[test]
    fn test_details_never_includes_transcript() {
        let mut m = meeting("Planning");
        m.transcript = Some("SECRET WORDS".to_string());
        let card = meeting_details(&m);
        assert!(!card.contains("SECRET WORDS"));
        assert!(card.contains("get_meeting_transcript"));
    }

    #[test]
    fn test_details_hides_general_type() {
        let mut m = meeting("Planning");
        let card = meeting_details(&m);
        assert!(!card.contains("**Type:**"));

        m.meeting_type = "standup".to_string();
        let card = meeting_details(&m);
        assert!(card.contains("**Type:** standup"));
    }

    #[test]
    fn test_notes_truncated_at_limit() {
        let mut m = meeting("Planning");
        m.enhanced_notes = Some("x".repeat(NOTES_LIMIT + 10));
        let card = meeting_details(&m);
        assert!(card.contains("[Notes truncated"));
    }

    #[test]
    fn test_transcript_truncated_at_limit() {
        let mut m = meeting("Planning");
        m.transcript = Some("y".repeat(TRANSCRIPT_LIMIT + 1));
        let text = meeting_transcript(&m);
        assert!(text.starts_with("# Transcript: Planning"));
        assert!(text.contains("[Transcript truncated"));

        m.transcript = Some("short".to_string());
        assert!(!meeting_transcript(&m).contains("truncated"));
    }

    #[test]
    fn test_transcript_missing() {
        let m = meeting("Planning");
        assert_eq!(
            meeting_transcript(&m),
            "No transcript available for meeting 'Planning'."
        );
    }

    #[test]
    fn test_archive_report_all_archived() {
        let report = ArchiveReport {
            checked: 5,
            already_archived: 5,
            ..Default::default()
        };
        assert_eq!(
            archive_report(&report),
            "All 5 recent meetings are already archived. Nothing new to add."
        );
    }

    #[test]
    fn test_archive_report_lists_new_meetings() {
        let report = ArchiveReport {
            checked: 3,
            already_archived: 1,
            archived: vec![
                ("Acme Sync".to_string(), Some("Acme".to_string())),
                ("Untitled".to_string(), None),
            ],
            errors: vec!["Bad doc: parse failure".to_string()],
        };
        let text = archive_report(&report);
        assert!(text.contains("**Checked:** 3 meetings"));
        assert!(text.contains("**Newly archived:** 2"));
        assert!(text.contains("- Acme Sync → Acme"));
        assert!(text.contains("- Untitled"));
        assert!(text.contains("**Errors:** 1"));
        assert!(text.contains("Bad doc: parse failure"));
    }

    #[test]
    fn test_integration_status_grouping() {
        let clients = vec![
            ClientWithCount {
                id: 1,
                name: "Acme".to_string(),
                meeting_count: 4,
            },
            ClientWithCount {
                id: 2,
                name: "Beta".to_string(),
                meeting_count: 1,
            },
        ];
        let links = vec![DbIntegration {
            client_id: 1,
            client_name: "Acme".to_string(),
            integration_type: "linear_team".to_string(),
            external_id: "team-123".to_string(),
            external_name: Some("Acme Eng".to_string()),
            metadata: Some(r#"{"team_key":"ACME"}"#.to_string()),
            created_at: "2026-03-01T00:00:00Z".to_string(),
            updated_at: "2026-03-01T00:00:00Z".to_string(),
        }];

        let text = integration_status(&clients, &links);
        assert!(text.contains("## Linked"));
        assert!(text.contains("- **Acme** (4 meetings)"));
        assert!(text.contains("  - Linear: team-123 (Acme Eng) [key: ACME]"));
        assert!(text.contains("## Not Linked"));
        assert!(text.contains("- **Beta** (1 meetings)"));
    }

    #[test]
    fn test_metadata_value() {
        assert_eq!(
            metadata_value(Some(r#"{"team_key":"GS1"}"#), "team_key").as_deref(),
            Some("GS1")
        );
        assert_eq!(metadata_value(Some("not json"), "team_key"), None);
        assert_eq!(metadata_value(None, "team_key"), None);
    }
}
