//! Shared type definitions for the database layer.

use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Collision(String),

    #[error("{0}")]
    Invalid(String),
}

/// A row from the `clients` table.
#[derive(Debug, Clone)]
pub struct DbClient {
    pub id: i64,
    pub name: String,
    pub slug: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A client plus its archived-meeting count, for listings.
#[derive(Debug, Clone)]
pub struct ClientWithCount {
    pub id: i64,
    pub name: String,
    pub meeting_count: i64,
}

/// An alias row joined with its canonical client's name.
#[derive(Debug, Clone)]
pub struct DbAlias {
    pub alias: String,
    pub canonical_client_id: i64,
    pub client_name: String,
}

/// A full row from the `meetings` table (content fields included), joined
/// with the client name when assigned.
#[derive(Debug, Clone)]
pub struct DbMeeting {
    pub id: i64,
    pub granola_document_id: String,
    pub title: String,
    pub meeting_date: String,
    pub transcript: Option<String>,
    pub enhanced_notes: Option<String>,
    pub manual_notes: Option<String>,
    pub combined_markdown: Option<String>,
    pub summary_overview: Option<String>,
    pub meeting_type: String,
    pub client_id: Option<i64>,
    pub client_name: Option<String>,
    pub meeting_series_id: Option<i64>,
    pub archived_at: String,
}

/// Payload for archiving one meeting, produced by the archival pipeline.
/// `granola_document_id` is the idempotency key; archiving the same id again
/// overwrites content fields instead of inserting a second row.
#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub granola_document_id: String,
    pub title: String,
    pub meeting_date: String,
    pub transcript: Option<String>,
    pub enhanced_notes: Option<String>,
    pub manual_notes: Option<String>,
    pub combined_markdown: Option<String>,
    pub summary_overview: Option<String>,
    pub meeting_type: String,
    pub client_id: Option<i64>,
}

/// The cheap projection of a meeting used by list views. Content columns
/// (transcript, notes) can run to hundreds of KB, so listings never load
/// them.
#[derive(Debug, Clone)]
pub struct MeetingOverview {
    pub id: i64,
    pub title: String,
    pub meeting_date: String,
    pub meeting_type: String,
    pub client_name: Option<String>,
}

/// A meeting search match with its relevance score and a text excerpt
/// around the first hit.
#[derive(Debug, Clone)]
pub struct MeetingSearchHit {
    pub id: i64,
    pub title: String,
    pub meeting_date: String,
    pub client_name: Option<String>,
    pub rank: usize,
    pub excerpt: String,
}

/// A row from the `client_context` table, joined with the client name.
#[derive(Debug, Clone)]
pub struct DbClientContext {
    pub id: i64,
    pub client_id: i64,
    pub client_name: String,
    pub title: String,
    pub content: String,
    pub context_type: String,
    pub source_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A context search match with relevance score and content preview.
#[derive(Debug, Clone)]
pub struct ContextSearchHit {
    pub id: i64,
    pub client_name: String,
    pub title: String,
    pub context_type: String,
    pub rank: usize,
    pub preview: String,
}

/// A row from the `client_integrations` table, joined with the client name.
#[derive(Debug, Clone)]
pub struct DbIntegration {
    pub client_id: i64,
    pub client_name: String,
    pub integration_type: String,
    pub external_id: String,
    pub external_name: Option<String>,
    pub metadata: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `meeting_series` table.
#[derive(Debug, Clone)]
pub struct DbMeetingSeries {
    pub id: i64,
    pub name: String,
    pub client_id: Option<i64>,
    pub meeting_type: Option<String>,
    pub recurrence_pattern: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

/// What a client merge moved before deleting the source row.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub meetings_moved: usize,
    pub context_moved: usize,
}

/// Aggregate archive statistics for the stats tool.
#[derive(Debug, Clone)]
pub struct ArchiveStats {
    pub total_meetings: i64,
    pub meetings_last_30_days: i64,
    pub by_client: Vec<ClientWithCount>,
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

pub(crate) fn client_from_row(row: &rusqlite::Row) -> rusqlite::Result<DbClient> {
    Ok(DbClient {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        notes: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub(crate) fn meeting_from_row(row: &rusqlite::Row) -> rusqlite::Result<DbMeeting> {
    Ok(DbMeeting {
        id: row.get(0)?,
        granola_document_id: row.get(1)?,
        title: row.get(2)?,
        meeting_date: row.get(3)?,
        transcript: row.get(4)?,
        enhanced_notes: row.get(5)?,
        manual_notes: row.get(6)?,
        combined_markdown: row.get(7)?,
        summary_overview: row.get(8)?,
        meeting_type: row.get(9)?,
        client_id: row.get(10)?,
        meeting_series_id: row.get(11)?,
        archived_at: row.get(12)?,
        client_name: row.get(13)?,
    })
}

pub(crate) fn overview_from_row(row: &rusqlite::Row) -> rusqlite::Result<MeetingOverview> {
    Ok(MeetingOverview {
        id: row.get(0)?,
        title: row.get(1)?,
        meeting_date: row.get(2)?,
        meeting_type: row.get(3)?,
        client_name: row.get(4)?,
    })
}

pub(crate) fn context_from_row(row: &rusqlite::Row) -> rusqlite::Result<DbClientContext> {
    Ok(DbClientContext {
        id: row.get(0)?,
        client_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        context_type: row.get(4)?,
        source_url: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        client_name: row.get(8)?,
    })
}

pub(crate) fn integration_from_row(row: &rusqlite::Row) -> rusqlite::Result<DbIntegration> {
    Ok(DbIntegration {
        client_id: row.get(0)?,
        integration_type: row.get(1)?,
        external_id: row.get(2)?,
        external_name: row.get(3)?,
        metadata: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        client_name: row.get(7)?,
    })
}

pub(crate) fn series_from_row(row: &rusqlite::Row) -> rusqlite::Result<DbMeetingSeries> {
    Ok(DbMeetingSeries {
        id: row.get(0)?,
        name: row.get(1)?,
        client_id: row.get(2)?,
        meeting_type: row.get(3)?,
        recurrence_pattern: row.get(4)?,
        notes: row.get(5)?,
        created_at: row.get(6)?,
    })
}
