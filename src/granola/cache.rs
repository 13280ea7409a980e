//! Granola cache file reader.
//!
//! The cache file at `~/Library/Application Support/Granola/cache-v3.json`
//! contains a double-JSON-encoded structure: the top-level `cache` field is
//! a JSON string that must be parsed again to get the actual data. Inside,
//! `state.documents` maps document id to meeting metadata and
//! `state.transcripts` maps document id to raw transcript entries.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Top-level cache file structure (double-encoded).
#[derive(Debug, Deserialize)]
struct CacheFile {
    cache: String,
}

/// Inner cache state after second JSON parse.
#[derive(Debug, Deserialize)]
struct CacheState {
    state: InnerState,
}

#[derive(Debug, Deserialize)]
struct InnerState {
    #[serde(default)]
    documents: HashMap<String, GranolaDocumentRaw>,
    #[serde(default)]
    transcripts: HashMap<String, serde_json::Value>,
}

/// Raw document from the cache (before extraction).
#[derive(Debug, Deserialize)]
struct GranolaDocumentRaw {
    id: Option<String>,
    title: Option<String>,
    #[serde(default, alias = "createdAt")]
    created_at: Option<String>,
    #[serde(default)]
    notes_markdown: Option<String>,
    #[serde(rename = "type")]
    doc_type: Option<String>,
    #[serde(default)]
    valid_meeting: Option<bool>,
    /// The panel last opened in Granola, which holds the AI-enhanced notes
    /// as structured content.
    #[serde(default)]
    last_viewed_panel: Option<serde_json::Value>,
    google_calendar_event: Option<RawCalendarEvent>,
    people: Option<RawPeople>,
}

#[derive(Debug, Deserialize)]
struct RawCalendarEvent {
    #[serde(default)]
    attendees: Vec<RawCalendarAttendee>,
}

#[derive(Debug, Deserialize)]
struct RawCalendarAttendee {
    email: Option<String>,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPeople {
    #[serde(default)]
    attendees: Vec<RawPersonAttendee>,
}

#[derive(Debug, Deserialize)]
struct RawPersonAttendee {
    email: Option<String>,
    name: Option<String>,
    details: Option<RawPersonDetails>,
}

#[derive(Debug, Deserialize)]
struct RawPersonDetails {
    company: Option<RawCompany>,
}

#[derive(Debug, Deserialize)]
struct RawCompany {
    name: Option<String>,
}

/// A meeting participant with whatever enrichment Granola had for them.
#[derive(Debug, Clone, PartialEq)]
pub struct Attendee {
    pub email: Option<String>,
    pub name: Option<String>,
    pub company: Option<String>,
}

/// The separable content streams of one meeting document.
#[derive(Debug, Clone, Default)]
pub struct ContentParts {
    /// Raw transcript with speaker labels, when Granola captured one.
    pub transcript: Option<String>,
    /// Granola's AI-generated notes, flattened to markdown.
    pub enhanced_notes: Option<String>,
    /// Notes the user typed by hand during the meeting.
    pub manual_notes: Option<String>,
    /// Notes and transcript joined into one markdown document.
    pub combined_markdown: Option<String>,
}

/// A parsed Granola document ready for archiving.
#[derive(Debug, Clone)]
pub struct GranolaDocument {
    pub id: String,
    /// May be empty; the archive pipeline substitutes "Untitled".
    pub title: String,
    pub created_at: Option<String>,
    pub attendees: Vec<Attendee>,
    pub parts: ContentParts,
}

/// Read and parse the Granola cache file.
///
/// Returns meeting documents newest-first. Documents explicitly marked
/// invalid, or typed as something other than a meeting, are skipped.
pub fn read_cache(cache_path: &Path) -> Result<Vec<GranolaDocument>, String> {
    let raw = std::fs::read_to_string(cache_path)
        .map_err(|e| format!("Failed to read Granola cache: {}", e))?;

    let cache_file: CacheFile = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse Granola cache outer JSON: {}", e))?;

    let cache_state: CacheState = serde_json::from_str(&cache_file.cache)
        .map_err(|e| format!("Failed to parse Granola cache inner JSON: {}", e))?;

    let mut documents = Vec::new();

    for (key, doc) in &cache_state.state.documents {
        if doc.valid_meeting == Some(false) {
            continue;
        }
        if let Some(ref t) = doc.doc_type {
            if t != "meeting" {
                continue;
            }
        }

        let id = doc.id.as_deref().unwrap_or(key).to_string();
        let title = doc.title.clone().unwrap_or_default();
        let parts = extract_content_parts(doc, &id, &cache_state.state.transcripts);
        let attendees = extract_attendees(doc);

        documents.push(GranolaDocument {
            id,
            title,
            created_at: doc.created_at.clone(),
            attendees,
            parts,
        });
    }

    // Newest first; documents without a timestamp sort last.
    documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(documents)
}

fn extract_content_parts(
    doc: &GranolaDocumentRaw,
    doc_id: &str,
    transcripts: &HashMap<String, serde_json::Value>,
) -> ContentParts {
    let transcript = transcripts
        .get(doc_id)
        .and_then(flatten_transcript)
        .filter(|t| !t.trim().is_empty());

    let manual_notes = doc
        .notes_markdown
        .clone()
        .filter(|n| !n.trim().is_empty());

    let enhanced_notes = doc
        .last_viewed_panel
        .as_ref()
        .and_then(|panel| panel.get("content"))
        .and_then(structured_to_markdown);

    let combined_markdown = combine_parts(
        enhanced_notes.as_deref().or(manual_notes.as_deref()),
        transcript.as_deref(),
    );

    ContentParts {
        transcript,
        enhanced_notes,
        manual_notes,
        combined_markdown,
    }
}

/// Extract transcript text from a cache entry, which may be a plain string,
/// an object with a text field, or an array of timed segments.
fn flatten_transcript(value: &serde_json::Value) -> Option<String> {
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }

    if let Some(obj) = value.as_object() {
        if let Some(text) = obj.get("text").and_then(|v| v.as_str()) {
            return Some(text.to_string());
        }
        if let Some(text) = obj.get("transcript").and_then(|v| v.as_str()) {
            return Some(text.to_string());
        }
    }

    if let Some(segments) = value.as_array() {
        let mut lines = Vec::new();
        for segment in segments {
            if let Some(s) = segment.as_str() {
                lines.push(s.to_string());
                continue;
            }
            let Some(text) = segment.get("text").and_then(|v| v.as_str()) else {
                continue;
            };
            // "microphone" is the local speaker, everything else came
            // through the system audio.
            match segment.get("source").and_then(|v| v.as_str()) {
                Some("microphone") => lines.push(format!("Me: {}", text)),
                Some(_) => lines.push(format!("Them: {}", text)),
                None => lines.push(text.to_string()),
            }
        }
        if lines.is_empty() {
            return None;
        }
        return Some(lines.join("\n"));
    }

    None
}

/// Flatten Granola's structured panel content (a ProseMirror-style node
/// tree) into markdown.
fn structured_to_markdown(content: &serde_json::Value) -> Option<String> {
    let mut blocks = Vec::new();
    collect_blocks(content, &mut blocks);
    if blocks.is_empty() {
        return None;
    }
    Some(blocks.join("\n"))
}

fn collect_blocks(node: &serde_json::Value, blocks: &mut Vec<String>) {
    match node.get("type").and_then(|v| v.as_str()) {
        Some("heading") => {
            let level = node
                .get("attrs")
                .and_then(|a| a.get("level"))
                .and_then(|l| l.as_u64())
                .unwrap_or(1) as usize;
            let text = inline_text(node);
            if !text.is_empty() {
                blocks.push(format!("{} {}", "#".repeat(level), text));
            }
        }
        Some("listItem") => {
            let text = inline_text(node);
            if !text.is_empty() {
                blocks.push(format!("- {}", text));
            }
        }
        Some("paragraph") => {
            let text = inline_text(node);
            if !text.is_empty() {
                blocks.push(text);
            }
        }
        _ => {
            if let Some(children) = node.get("content").and_then(|v| v.as_array()) {
                for child in children {
                    collect_blocks(child, blocks);
                }
            }
        }
    }
}

/// Concatenated text of every leaf under a node.
fn inline_text(node: &serde_json::Value) -> String {
    let mut out = String::new();
    push_text(node, &mut out);
    out.trim().to_string()
}

fn push_text(node: &serde_json::Value, out: &mut String) {
    if let Some(text) = node.get("text").and_then(|v| v.as_str()) {
        out.push_str(text);
    }
    if let Some(children) = node.get("content").and_then(|v| v.as_array()) {
        for child in children {
            push_text(child, out);
        }
    }
}

fn combine_parts(notes: Option<&str>, transcript: Option<&str>) -> Option<String> {
    let mut sections = Vec::new();
    if let Some(n) = notes {
        sections.push(format!("## Notes\n\n{}", n));
    }
    if let Some(t) = transcript {
        sections.push(format!("## Transcript\n\n{}", t));
    }
    if sections.is_empty() {
        return None;
    }
    Some(sections.join("\n\n"))
}

/// Merge people data with calendar invitees, de-duplicated by email.
/// People entries come first since they carry company enrichment.
fn extract_attendees(doc: &GranolaDocumentRaw) -> Vec<Attendee> {
    let mut attendees: Vec<Attendee> = Vec::new();
    let mut seen_emails: Vec<String> = Vec::new();

    if let Some(ref people) = doc.people {
        for person in &people.attendees {
            let email = person.email.as_ref().map(|e| e.to_lowercase());
            if let Some(ref e) = email {
                if seen_emails.contains(e) {
                    continue;
                }
                seen_emails.push(e.clone());
            }
            let company = person
                .details
                .as_ref()
                .and_then(|d| d.company.as_ref())
                .and_then(|c| c.name.clone());
            attendees.push(Attendee {
                email,
                name: person.name.clone(),
                company,
            });
        }
    }

    if let Some(ref cal_event) = doc.google_calendar_event {
        for invitee in &cal_event.attendees {
            let Some(ref email) = invitee.email else {
                continue;
            };
            let lower = email.to_lowercase();
            if seen_emails.contains(&lower) {
                continue;
            }
            seen_emails.push(lower.clone());
            attendees.push(Attendee {
                email: Some(lower),
                name: invitee.display_name.clone(),
                company: None,
            });
        }
    }

    attendees
}
