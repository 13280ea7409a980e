//! Cereal MCP Server — exposes the Granola meeting archive to Claude Desktop.
//!
//! Standalone binary that communicates over stdio using the Model Context Protocol.
//! Owns the SQLite archive and the Granola cache reader, so a single server
//! handles both archiving new meetings and answering questions about old ones.
//!
//! Build: `cargo build --bin cereal-mcp`
//! Usage: spawned by Claude Desktop as configured in claude_desktop_config.json.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rmcp::model::*;
use rmcp::schemars::JsonSchema;
use rmcp::{tool, ServerHandler, ServiceExt};
use serde::Deserialize;

use cereal::archive;
use cereal::config::Config;
use cereal::db::ArchiveDb;
use cereal::format;
use cereal::util::format_date;

// =============================================================================
// Server State
// =============================================================================

/// MCP server for the Cereal meeting archive.
#[derive(Clone)]
struct CerealMcp {
    /// Database connection. Wrapped in Arc<Mutex> because rusqlite::Connection
    /// is not Send+Sync, and MCP tool calls are sequential over stdio anyway.
    db: Arc<Mutex<ArchiveDb>>,
    /// Email domain treated as internal during client detection.
    internal_domain: String,
    /// Location of Granola's cache-v3.json.
    cache_path: PathBuf,
}

// =============================================================================
// Tool Parameter Types
// =============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
struct ArchiveNewMeetingsParams {
    /// Maximum number of cache documents to process (default 10).
    #[schemars(description = "Max meetings to process in this run (default 10)")]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListRecentMeetingsParams {
    /// How many days back to look (default 7).
    #[schemars(description = "Number of days to look back (default 7)")]
    days: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct GetClientMeetingsParams {
    /// Name of the client, matched case-insensitively.
    #[schemars(description = "Client name (e.g. \"NGynS\", \"Mothership\")")]
    client_name: String,
    /// Maximum number of meetings to return (default 10).
    #[schemars(description = "Max meetings to return (default 10)")]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchMeetingsParams {
    /// Text to search for across titles, notes, and transcripts.
    #[schemars(description = "Search query text")]
    query: String,
    /// Maximum number of results (default 5).
    #[schemars(description = "Max results (default 5)")]
    limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MeetingIdParams {
    /// Database ID of the meeting (shown in brackets in listings).
    #[schemars(description = "Meeting ID from listings")]
    meeting_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct FindMeetingByTitleParams {
    /// Text the meeting title must contain.
    #[schemars(description = "Partial meeting title to match")]
    title_search: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct MergeClientsParams {
    /// Client to merge FROM; deleted afterwards.
    #[schemars(description = "Client to merge FROM (will be deleted)")]
    source_name: String,
    /// Client to merge INTO; created when missing.
    #[schemars(description = "Client to merge INTO (will be kept)")]
    target_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct RenameClientParams {
    /// Current client name.
    #[schemars(description = "Current client name")]
    old_name: String,
    /// New name for the client.
    #[schemars(description = "New name for the client")]
    new_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AddClientAliasParams {
    /// The alternate name to recognize (e.g. "Acme Corp").
    #[schemars(description = "Alternate name to recognize")]
    alias: String,
    /// The canonical client name it maps to (e.g. "Acme").
    #[schemars(description = "Canonical client name the alias maps to")]
    client_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListClientAliasesParams {
    /// Show aliases for this client only; omit for all aliases.
    #[schemars(description = "Optional client name to filter by")]
    client_name: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct DeleteClientAliasParams {
    /// The alias to remove.
    #[schemars(description = "Alias to remove")]
    alias: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AssignMeetingParams {
    /// Database ID of the meeting to reassign.
    #[schemars(description = "Meeting ID from listings")]
    meeting_id: i64,
    /// Client to assign the meeting to; created when missing.
    #[schemars(description = "Client name to assign the meeting to")]
    client_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AddClientContextParams {
    /// Client the document belongs to; created when missing.
    #[schemars(description = "Client name")]
    client_name: String,
    /// Short title for the document.
    #[schemars(description = "Document title")]
    title: String,
    /// Full text content.
    #[schemars(description = "Document content")]
    content: String,
    /// Document type: note, email, document, or meeting_prep (default note).
    #[schemars(description = "Type: note, email, document, or meeting_prep (default note)")]
    context_type: Option<String>,
    /// Optional URL the content came from.
    #[schemars(description = "Optional source URL")]
    source_url: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ListClientContextParams {
    /// Client whose documents to list.
    #[schemars(description = "Client name")]
    client_name: String,
    /// Only show documents of this type.
    #[schemars(description = "Optional type filter (note, email, document, meeting_prep)")]
    context_type: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ContextIdParams {
    /// Database ID of the context document (shown in brackets in listings).
    #[schemars(description = "Context document ID from listings")]
    context_id: i64,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchClientContextParams {
    /// Text to search for in titles and content.
    #[schemars(description = "Search query text")]
    query: String,
    /// Limit the search to one client.
    #[schemars(description = "Optional client name to scope the search")]
    client_name: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UpdateClientContextParams {
    /// Database ID of the context document to update.
    #[schemars(description = "Context document ID from listings")]
    context_id: i64,
    /// New title.
    #[schemars(description = "New title (optional)")]
    title: Option<String>,
    /// New content, replacing the existing text.
    #[schemars(description = "New content, replaces existing (optional)")]
    content: Option<String>,
    /// New document type.
    #[schemars(description = "New type (optional)")]
    context_type: Option<String>,
    /// New source URL.
    #[schemars(description = "New source URL (optional)")]
    source_url: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct LinkLinearParams {
    /// Client to link; created when missing.
    #[schemars(description = "Client name")]
    client_name: String,
    /// Linear team ID (e.g. "team_abc123").
    #[schemars(description = "Linear team ID")]
    linear_team_id: String,
    /// Human-readable team name.
    #[schemars(description = "Optional team name")]
    linear_team_name: Option<String>,
    /// Team key/prefix used in issue IDs (e.g. "WANDER" from "WANDER-504").
    #[schemars(description = "Optional team key used in issue IDs")]
    linear_team_key: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct LinkSlackParams {
    /// Client to link; created when missing.
    #[schemars(description = "Client name")]
    client_name: String,
    /// Slack channel ID of the internal team channel.
    #[schemars(description = "Slack channel ID for the internal team channel")]
    internal_channel_id: String,
    /// Slack channel ID of the external/shared channel.
    #[schemars(description = "Optional Slack channel ID for the external/shared channel")]
    external_channel_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ClientNameParams {
    /// Name of the client.
    #[schemars(description = "Client name")]
    client_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct UnlinkIntegrationParams {
    /// Client to unlink.
    #[schemars(description = "Client name")]
    client_name: String,
    /// Type of integration to remove (default "linear_team").
    #[schemars(description = "Integration type to remove (default linear_team)")]
    integration_type: Option<String>,
}

// =============================================================================
// Tools
// =============================================================================

#[tool(tool_box)]
impl CerealMcp {
    fn new(db: ArchiveDb, config: &Config) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            internal_domain: config.internal_domain.clone(),
            cache_path: PathBuf::from(&config.granola.cache_path),
        }
    }

    // --- Archive & browse ---

    #[tool(description = "Archive new meetings from the Granola cache into the database. Detects clients from titles and attendees, stores notes and transcripts, and reports what was archived. Run this when the user wants the latest meetings pulled in.")]
    fn archive_new_meetings(&self, #[tool(aggr)] params: ArchiveNewMeetingsParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let limit = params.limit.unwrap_or(10);
        match archive::archive_new_meetings(&db, &self.cache_path, &self.internal_domain, limit) {
            Ok(report) => format::archive_report(&report),
            Err(e) => e,
        }
    }

    #[tool(description = "List meetings archived in the last N days (default 7). Returns meeting IDs, dates, titles, and clients. Use this when the user asks what meetings happened recently.")]
    fn list_recent_meetings(&self, #[tool(aggr)] params: ListRecentMeetingsParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let days = params.days.unwrap_or(7);
        match db.get_recent_meetings(days) {
            Ok(meetings) => format::recent_meetings(days, &meetings),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Get archived meetings for one client, newest first. Use this when the user asks about the history with a specific client.")]
    fn get_client_meetings(&self, #[tool(aggr)] params: GetClientMeetingsParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let limit = params.limit.unwrap_or(10);

        let client = match db.get_client_by_name(&params.client_name) {
            Ok(client) => client,
            Err(e) => return format!("Error: {e}"),
        };
        let Some(client) = client else {
            let suggestions = db
                .suggest_client_names(&params.client_name)
                .unwrap_or_default();
            if suggestions.is_empty() {
                return format!("No meetings found for client '{}'.", params.client_name);
            }
            return format!(
                "No meetings found for '{}'. Did you mean: {}?",
                params.client_name,
                suggestions.join(", ")
            );
        };

        match db.get_meetings_for_client(client.id, limit) {
            Ok(meetings) if meetings.is_empty() => {
                format!("No meetings found for client '{}'.", params.client_name)
            }
            Ok(meetings) => format::client_meetings(&client.name, &meetings),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Search archived meetings by keyword across titles, notes, and transcripts. Returns ranked matches with excerpts. Use this when the user asks when or where something was discussed.")]
    fn search_meetings(&self, #[tool(aggr)] params: SearchMeetingsParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let limit = params.limit.unwrap_or(5);
        match db.search_meetings(&params.query, limit) {
            Ok(hits) => format::search_results(&params.query, &hits),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Get full details for one meeting: date, client, summary, and notes. The transcript is excluded; call get_meeting_transcript when exact wording matters.")]
    fn get_meeting_details(&self, #[tool(aggr)] params: MeetingIdParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        match db.get_meeting_by_id(params.meeting_id) {
            Ok(Some(meeting)) => format::meeting_details(&meeting),
            Ok(None) => format!("Meeting with ID {} not found.", params.meeting_id),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Get the word-for-word transcript of a meeting. Transcripts can be very long; prefer get_meeting_details unless the user needs exact quotes.")]
    fn get_meeting_transcript(&self, #[tool(aggr)] params: MeetingIdParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        match db.get_meeting_by_id(params.meeting_id) {
            Ok(Some(meeting)) => format::meeting_transcript(&meeting),
            Ok(None) => format!("Meeting with ID {} not found.", params.meeting_id),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Find meetings whose title contains the given text. Returns up to 10 matches, newest first. Use this to locate a meeting the user remembers by name.")]
    fn find_meeting_by_title(&self, #[tool(aggr)] params: FindMeetingByTitleParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        match db.find_meetings_by_title(&params.title_search) {
            Ok(meetings) => format::title_matches(&params.title_search, &meetings),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Get archive statistics: total meetings, meetings in the last 30 days, and the top clients by meeting count.")]
    fn get_meeting_stats(&self) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        match db.get_archive_stats() {
            Ok(stats) => format::archive_stats(&stats),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "List all known clients with their meeting counts.")]
    fn list_clients(&self) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        match db.get_clients_with_meeting_counts() {
            Ok(clients) => format::client_list(&clients),
            Err(e) => format!("Error: {e}"),
        }
    }

    // --- Client management ---

    #[tool(description = "Merge one client into another, reassigning all meetings and context documents. Use this to consolidate duplicates (e.g. \"NB44 - Intuit\" into \"NB44\"). Creates an alias so future auto-detection maps the old name to the target.")]
    fn merge_clients(&self, #[tool(aggr)] params: MergeClientsParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let source = match db.get_client_by_name(&params.source_name) {
            Ok(Some(client)) => client,
            Ok(None) => return format!("Source client '{}' not found.", params.source_name),
            Err(e) => return format!("Error: {e}"),
        };

        match db.merge_clients(&source.name, &params.target_name) {
            Ok((target, outcome)) => {
                let lines = [
                    format!("# Merged \"{}\" into \"{}\"\n", source.name, target.name),
                    format!("- Reassigned {} meetings", outcome.meetings_moved),
                    format!("- Reassigned {} context documents", outcome.context_moved),
                    format!("- Created alias: \"{}\" → \"{}\"", source.name, target.name),
                    format!("- Deleted client \"{}\"", source.name),
                    String::new(),
                    format!(
                        "Future meetings mentioning \"{}\" will be assigned to \"{}\".",
                        source.name, target.name
                    ),
                ];
                lines.join("\n")
            }
            Err(e) => format!("Error merging clients: {e}"),
        }
    }

    #[tool(description = "Rename a client and keep the old name as an alias, so future auto-detection recognizes both names.")]
    fn rename_client(&self, #[tool(aggr)] params: RenameClientParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let client = match db.get_client_by_name(&params.old_name) {
            Ok(Some(client)) => client,
            Ok(None) => return format!("Client '{}' not found.", params.old_name),
            Err(e) => return format!("Error: {e}"),
        };
        match db.get_client_by_name(&params.new_name) {
            Ok(Some(existing)) if existing.id != client.id => {
                return format!(
                    "Client '{}' already exists. Use merge_clients instead.",
                    params.new_name
                );
            }
            Ok(_) => {}
            Err(e) => return format!("Error: {e}"),
        }

        match db.rename_client(&client.name, &params.new_name) {
            Ok(renamed) => format!(
                "Renamed \"{}\" to \"{}\".\nCreated alias: \"{}\" → \"{}\"",
                client.name, renamed.name, client.name, renamed.name
            ),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Register an alternate name for a client. Future meetings mentioning the alias are assigned to the canonical client. The client is created when it doesn't exist yet.")]
    fn add_client_alias(&self, #[tool(aggr)] params: AddClientAliasParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let client = match db.get_or_create_client(&params.client_name) {
            Ok(client) => client,
            Err(e) => return format!("Error: {e}"),
        };
        match db.add_client_alias(&params.alias, client.id) {
            Ok(stored) => format!(
                "Created alias: \"{}\" → \"{}\"\nFuture meetings mentioning \"{}\" will be assigned to \"{}\".",
                stored, client.name, stored, client.name
            ),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "List configured client aliases, for one client or all of them.")]
    fn list_client_aliases(&self, #[tool(aggr)] params: ListClientAliasesParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        match params.client_name {
            Some(ref name) => {
                let client = match db.get_client_by_name(name) {
                    Ok(Some(client)) => client,
                    Ok(None) => return format!("Client '{}' not found.", name),
                    Err(e) => return format!("Error: {e}"),
                };
                let aliases = match db.get_aliases(Some(client.id)) {
                    Ok(aliases) => aliases,
                    Err(e) => return format!("Error: {e}"),
                };
                if aliases.is_empty() {
                    return format!("No aliases configured for '{}'.", client.name);
                }
                let mut lines = vec![format!("# Aliases for {}\n", client.name)];
                for alias in &aliases {
                    lines.push(format!("- \"{}\" → \"{}\"", alias.alias, alias.client_name));
                }
                lines.join("\n")
            }
            None => {
                let aliases = match db.get_aliases(None) {
                    Ok(aliases) => aliases,
                    Err(e) => return format!("Error: {e}"),
                };
                if aliases.is_empty() {
                    return "No aliases configured.".to_string();
                }
                let mut lines = vec!["# All Client Aliases\n".to_string()];
                for alias in &aliases {
                    lines.push(format!("- \"{}\" → \"{}\"", alias.alias, alias.client_name));
                }
                lines.join("\n")
            }
        }
    }

    #[tool(description = "Delete a client alias.")]
    fn delete_client_alias(&self, #[tool(aggr)] params: DeleteClientAliasParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        match db.delete_client_alias(&params.alias) {
            Ok(true) => format!("Deleted alias \"{}\".", params.alias),
            Ok(false) => format!("Alias \"{}\" not found.", params.alias),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Manually assign a meeting to a client. Use this when auto-detection missed or picked the wrong client. The client is created when it doesn't exist yet.")]
    fn assign_meeting_to_client(&self, #[tool(aggr)] params: AssignMeetingParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let meeting = match db.get_meeting_by_id(params.meeting_id) {
            Ok(Some(meeting)) => meeting,
            Ok(None) => return format!("Meeting with ID {} not found.", params.meeting_id),
            Err(e) => return format!("Error: {e}"),
        };
        let client = match db.get_or_create_client(&params.client_name) {
            Ok(client) => client,
            Err(e) => return format!("Error: {e}"),
        };
        match db.assign_meeting_to_client(meeting.id, client.id) {
            Ok(()) => format!(
                "Assigned meeting [{}] \"{}\" to {}.",
                meeting.id, meeting.title, client.name
            ),
            Err(e) => format!("Error: {e}"),
        }
    }

    // --- Client context ---

    #[tool(description = "Save a context document (note, email, document, meeting prep) for a client, so it can be found later alongside their meetings. The client is created when it doesn't exist yet.")]
    fn add_client_context(&self, #[tool(aggr)] params: AddClientContextParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let client = match db.get_or_create_client(&params.client_name) {
            Ok(client) => client,
            Err(e) => return format!("Error: {e}"),
        };
        let context_type = params.context_type.as_deref().unwrap_or("note");
        match db.add_client_context(
            client.id,
            &params.title,
            &params.content,
            context_type,
            params.source_url.as_deref(),
        ) {
            Ok(id) => format!(
                "Saved '{}' ({}) for {}. Context ID: {}",
                params.title, context_type, client.name, id
            ),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "List context documents saved for a client, optionally filtered by type.")]
    fn list_client_context(&self, #[tool(aggr)] params: ListClientContextParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let client = match db.get_client_by_name(&params.client_name) {
            Ok(Some(client)) => client,
            Ok(None) => return format!("No client found with name '{}'.", params.client_name),
            Err(e) => return format!("Error: {e}"),
        };
        match db.list_client_context(client.id, params.context_type.as_deref()) {
            Ok(docs) => format::context_list(&client.name, &docs),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Get the full content of a context document by its ID.")]
    fn get_client_context(&self, #[tool(aggr)] params: ContextIdParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        match db.get_client_context(params.context_id) {
            Ok(Some(doc)) => format::context_details(&doc),
            Ok(None) => format!("Context document with ID {} not found.", params.context_id),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Search saved context documents by keyword, optionally scoped to one client. Returns ranked matches with content previews.")]
    fn search_client_context(&self, #[tool(aggr)] params: SearchClientContextParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        // An unknown client name widens the search to all clients rather
        // than failing.
        let client_id = match params.client_name {
            Some(ref name) => match db.get_client_by_name(name) {
                Ok(client) => client.map(|c| c.id),
                Err(e) => return format!("Error: {e}"),
            },
            None => None,
        };
        match db.search_client_context(&params.query, client_id) {
            Ok(hits) if hits.is_empty() => {
                let scope = params
                    .client_name
                    .as_deref()
                    .map(|name| format!(" for {name}"))
                    .unwrap_or_default();
                format!(
                    "No context documents found matching '{}'{}.",
                    params.query, scope
                )
            }
            Ok(hits) => format::context_search_results(&params.query, &hits),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Update an existing context document. Only the provided fields change.")]
    fn update_client_context(&self, #[tool(aggr)] params: UpdateClientContextParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let doc = match db.get_client_context(params.context_id) {
            Ok(Some(doc)) => doc,
            Ok(None) => return format!("Context document with ID {} not found.", params.context_id),
            Err(e) => return format!("Error: {e}"),
        };
        if params.title.is_none()
            && params.content.is_none()
            && params.context_type.is_none()
            && params.source_url.is_none()
        {
            return "No changes made (no update fields provided).".to_string();
        }
        match db.update_client_context(
            params.context_id,
            params.title.as_deref(),
            params.content.as_deref(),
            params.context_type.as_deref(),
            params.source_url.as_deref(),
        ) {
            Ok(true) => format!(
                "Updated context document [{}] '{}' for {}.",
                doc.id, doc.title, doc.client_name
            ),
            Ok(false) => format!("Context document with ID {} not found.", params.context_id),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Delete a context document by its ID.")]
    fn delete_client_context(&self, #[tool(aggr)] params: ContextIdParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let doc = match db.get_client_context(params.context_id) {
            Ok(Some(doc)) => doc,
            Ok(None) => return format!("Context document with ID {} not found.", params.context_id),
            Err(e) => return format!("Error: {e}"),
        };
        match db.delete_client_context(doc.id) {
            Ok(true) => format!(
                "Deleted '{}' ({}) from {}.",
                doc.title, doc.context_type, doc.client_name
            ),
            Ok(false) => format!("Failed to delete context document {}.", params.context_id),
            Err(e) => format!("Error: {e}"),
        }
    }

    // --- Integrations ---

    #[tool(description = "Link a client to a Linear team for cross-system correlation. Once linked, Claude can match meetings to Linear issues via the team ID and key. The client is created when it doesn't exist yet.")]
    fn link_client_to_linear_team(&self, #[tool(aggr)] params: LinkLinearParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let client = match db.get_or_create_client(&params.client_name) {
            Ok(client) => client,
            Err(e) => return format!("Error: {e}"),
        };
        match db.get_client_by_integration("linear_team", &params.linear_team_id) {
            Ok(Some(existing)) if existing.id != client.id => {
                return format!(
                    "Linear team '{}' is already linked to client '{}'. Unlink it first.",
                    params.linear_team_id, existing.name
                );
            }
            Ok(_) => {}
            Err(e) => return format!("Error: {e}"),
        }

        let metadata = params
            .linear_team_key
            .as_deref()
            .map(|key| serde_json::json!({ "team_key": key }).to_string());
        if let Err(e) = db.set_client_integration(
            client.id,
            "linear_team",
            &params.linear_team_id,
            params.linear_team_name.as_deref(),
            metadata.as_deref(),
        ) {
            return format!("Error: {e}");
        }

        let name_note = params
            .linear_team_name
            .as_deref()
            .map(|name| format!(" ({name})"))
            .unwrap_or_default();
        let key_note = params
            .linear_team_key
            .as_deref()
            .map(|key| format!(" [key: {key}]"))
            .unwrap_or_default();
        format!(
            "Linked client \"{}\" to Linear team {}{}{}.\nClaude can now correlate meetings and issues across both systems.",
            client.name, params.linear_team_id, name_note, key_note
        )
    }

    #[tool(description = "Get the Linear team linked to a client.")]
    fn get_client_linear_team(&self, #[tool(aggr)] params: ClientNameParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let client = match db.get_client_by_name(&params.client_name) {
            Ok(Some(client)) => client,
            Ok(None) => return format!("Client '{}' not found.", params.client_name),
            Err(e) => return format!("Error: {e}"),
        };
        match db.get_client_integration(client.id, "linear_team") {
            Ok(Some(link)) => {
                let name_note = link
                    .external_name
                    .as_deref()
                    .map(|name| format!(" ({name})"))
                    .unwrap_or_default();
                let mut lines = vec![
                    format!("# Linear Team for {}\n", client.name),
                    format!("**Team ID:** {}{}", link.external_id, name_note),
                ];
                if let Some(key) = format::metadata_value(link.metadata.as_deref(), "team_key") {
                    lines.push(format!("**Team Key:** {}", key));
                }
                lines.push(format!("**Linked:** {}", format_date(&link.created_at)));
                lines.join("\n")
            }
            Ok(None) => format!("Client '{}' is not linked to a Linear team.", client.name),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Link a client to its Slack channels: an internal team channel, and optionally an external/shared channel for client-facing communication. The client is created when it doesn't exist yet.")]
    fn link_client_to_slack(&self, #[tool(aggr)] params: LinkSlackParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let client = match db.get_or_create_client(&params.client_name) {
            Ok(client) => client,
            Err(e) => return format!("Error: {e}"),
        };
        let metadata = params
            .external_channel_id
            .as_deref()
            .map(|id| serde_json::json!({ "external_channel_id": id }).to_string());
        if let Err(e) = db.set_client_integration(
            client.id,
            "slack",
            &params.internal_channel_id,
            None,
            metadata.as_deref(),
        ) {
            return format!("Error: {e}");
        }

        let mut lines = vec![format!("Linked client \"{}\" to Slack:", client.name)];
        lines.push(format!("  Internal: {}", params.internal_channel_id));
        if let Some(ref external) = params.external_channel_id {
            lines.push(format!("  External: {}", external));
        }
        lines.join("\n")
    }

    #[tool(description = "Get the Slack channels linked to a client.")]
    fn get_client_slack(&self, #[tool(aggr)] params: ClientNameParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let client = match db.get_client_by_name(&params.client_name) {
            Ok(Some(client)) => client,
            Ok(None) => return format!("Client '{}' not found.", params.client_name),
            Err(e) => return format!("Error: {e}"),
        };
        match db.get_client_integration(client.id, "slack") {
            Ok(Some(link)) => {
                let mut lines = vec![
                    format!("# Slack Channels for {}\n", client.name),
                    format!("**Internal:** {}", link.external_id),
                ];
                if let Some(external) =
                    format::metadata_value(link.metadata.as_deref(), "external_channel_id")
                {
                    lines.push(format!("**External:** {}", external));
                }
                lines.push(format!("**Linked:** {}", format_date(&link.created_at)));
                lines.join("\n")
            }
            Ok(None) => format!("Client '{}' is not linked to Slack channels.", client.name),
            Err(e) => format!("Error: {e}"),
        }
    }

    #[tool(description = "Get everything configured for a client in one call: notes plus Linear, Slack, and any other integrations. Use this instead of calling get_client_linear_team and get_client_slack separately.")]
    fn get_client_config(&self, #[tool(aggr)] params: ClientNameParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let client = match db.get_client_by_name(&params.client_name) {
            Ok(Some(client)) => client,
            Ok(None) => return format!("Client '{}' not found.", params.client_name),
            Err(e) => return format!("Error: {e}"),
        };
        let links = match db.get_client_integrations(client.id) {
            Ok(links) => links,
            Err(e) => return format!("Error: {e}"),
        };
        if links.is_empty() && client.notes.is_none() {
            return format!("Client '{}' has no integrations configured.", client.name);
        }
        format::client_config(&client, &links)
    }

    #[tool(description = "Show every client with its linked integrations, plus clients not yet linked. Useful for spotting unmapped clients.")]
    fn list_integration_status(&self) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let clients = match db.get_clients_with_meeting_counts() {
            Ok(clients) => clients,
            Err(e) => return format!("Error: {e}"),
        };
        let links = match db.get_integrations() {
            Ok(links) => links,
            Err(e) => return format!("Error: {e}"),
        };
        format::integration_status(&clients, &links)
    }

    #[tool(description = "Remove an integration link (default: the Linear team) from a client.")]
    fn unlink_client_integration(&self, #[tool(aggr)] params: UnlinkIntegrationParams) -> String {
        let db = match self.db.lock() {
            Ok(db) => db,
            Err(_) => return "Error: DB lock poisoned".to_string(),
        };
        let integration_type = params.integration_type.as_deref().unwrap_or("linear_team");
        let readable = integration_type.replace('_', " ");

        let client = match db.get_client_by_name(&params.client_name) {
            Ok(Some(client)) => client,
            Ok(None) => return format!("Client '{}' not found.", params.client_name),
            Err(e) => return format!("Error: {e}"),
        };
        let link = match db.get_client_integration(client.id, integration_type) {
            Ok(Some(link)) => link,
            Ok(None) => {
                return format!("Client '{}' is not linked to a {}.", client.name, readable);
            }
            Err(e) => return format!("Error: {e}"),
        };
        match db.delete_client_integration(client.id, integration_type) {
            Ok(true) => format!(
                "Unlinked '{}' from {} '{}'.",
                client.name, readable, link.external_id
            ),
            Ok(false) => format!("Failed to unlink client '{}'.", client.name),
            Err(e) => format!("Error: {e}"),
        }
    }
}

// =============================================================================
// ServerHandler — wires tool_box into the MCP protocol
// =============================================================================

#[tool(tool_box)]
impl ServerHandler for CerealMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "cereal".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
            instructions: Some(
                "Cereal MCP server. Archives Granola meeting transcripts into a local, \
                 searchable client knowledge base. Use archive_new_meetings to pull in the \
                 latest meetings, list_recent_meetings and search_meetings to explore history, \
                 get_meeting_details for one meeting's notes, merge_clients and \
                 add_client_alias to clean up the client list, add_client_context to save \
                 notes and documents for a client, and link_client_to_linear_team or \
                 link_client_to_slack to map clients onto other systems."
                    .to_string(),
            ),
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr so stdout stays clean for the MCP stdio transport.
    env_logger::init();

    let config =
        Config::load().map_err(|e| anyhow::anyhow!("Failed to load Cereal config: {e}"))?;

    let db = match config.database_path {
        Some(ref path) => ArchiveDb::open_at(Path::new(path)),
        None => ArchiveDb::open(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to open database: {e}"))?;

    let server = CerealMcp::new(db, &config);

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
