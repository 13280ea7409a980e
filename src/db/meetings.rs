//! Archived meetings: idempotent upsert from the pipeline plus the query
//! surface the tools read from (recent, by-client, by-title, search, stats).

use std::collections::HashSet;

use rusqlite::params;

use crate::db::types::*;
use crate::db::ArchiveDb;
use crate::util::{count_occurrences, excerpt, now_iso};

const MEETING_COLUMNS: &str =
    "m.id, m.granola_document_id, m.title, m.meeting_date, m.transcript, m.enhanced_notes,
     m.manual_notes, m.combined_markdown, m.summary_overview, m.meeting_type, m.client_id,
     m.meeting_series_id, m.archived_at, c.name";

const OVERVIEW_COLUMNS: &str = "m.id, m.title, m.meeting_date, m.meeting_type, c.name";

impl ArchiveDb {
    /// Archive a meeting keyed by its Granola document id: insert when new,
    /// otherwise overwrite content fields and refresh `archived_at`. Never
    /// duplicates a row. Returns the row id and whether it was newly
    /// inserted.
    pub fn archive_meeting(&self, meeting: &NewMeeting) -> Result<(i64, bool), DbError> {
        let existing: Option<i64> = {
            let mut stmt = self
                .conn
                .prepare("SELECT id FROM meetings WHERE granola_document_id = ?1")?;
            let mut rows = stmt.query_map(params![meeting.granola_document_id], |row| row.get(0))?;
            match rows.next() {
                Some(row) => Some(row?),
                None => None,
            }
        };

        self.conn.execute(
            "INSERT INTO meetings (granola_document_id, title, meeting_date, transcript,
                                   enhanced_notes, manual_notes, combined_markdown,
                                   summary_overview, meeting_type, client_id, archived_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(granola_document_id) DO UPDATE SET
                title = excluded.title,
                meeting_date = excluded.meeting_date,
                transcript = excluded.transcript,
                enhanced_notes = excluded.enhanced_notes,
                manual_notes = excluded.manual_notes,
                combined_markdown = excluded.combined_markdown,
                summary_overview = excluded.summary_overview,
                meeting_type = excluded.meeting_type,
                client_id = excluded.client_id,
                archived_at = excluded.archived_at",
            params![
                meeting.granola_document_id,
                meeting.title,
                meeting.meeting_date,
                meeting.transcript,
                meeting.enhanced_notes,
                meeting.manual_notes,
                meeting.combined_markdown,
                meeting.summary_overview,
                meeting.meeting_type,
                meeting.client_id,
                now_iso(),
            ],
        )?;

        match existing {
            Some(id) => Ok((id, false)),
            None => Ok((self.conn.last_insert_rowid(), true)),
        }
    }

    /// Every archived Granola document id. The pipeline loads this once per
    /// batch to skip already-archived documents.
    pub fn get_archived_document_ids(&self) -> Result<HashSet<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT granola_document_id FROM meetings")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut ids = HashSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    pub fn get_archived_count(&self) -> Result<i64, DbError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM meetings", [], |row| row.get(0))?)
    }

    pub fn get_meeting_by_id(&self, id: i64) -> Result<Option<DbMeeting>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEETING_COLUMNS}
             FROM meetings m
             LEFT JOIN clients c ON m.client_id = c.id
             WHERE m.id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], meeting_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Meetings dated within the last `days` days, newest first.
    pub fn get_recent_meetings(&self, days: u32) -> Result<Vec<MeetingOverview>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OVERVIEW_COLUMNS}
             FROM meetings m
             LEFT JOIN clients c ON m.client_id = c.id
             WHERE m.meeting_date >= datetime('now', ?1 || ' days')
             ORDER BY m.meeting_date DESC"
        ))?;
        let days_param = format!("-{days}");
        let rows = stmt.query_map(params![days_param], overview_from_row)?;
        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?);
        }
        Ok(meetings)
    }

    pub fn get_meetings_for_client(
        &self,
        client_id: i64,
        limit: usize,
    ) -> Result<Vec<MeetingOverview>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OVERVIEW_COLUMNS}
             FROM meetings m
             LEFT JOIN clients c ON m.client_id = c.id
             WHERE m.client_id = ?1
             ORDER BY m.meeting_date DESC
             LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![client_id, limit as i64], overview_from_row)?;
        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?);
        }
        Ok(meetings)
    }

    /// Title substring match, newest first, capped at 10 (enough to pick an
    /// id from).
    pub fn find_meetings_by_title(&self, title_search: &str) -> Result<Vec<MeetingOverview>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {OVERVIEW_COLUMNS}
             FROM meetings m
             LEFT JOIN clients c ON m.client_id = c.id
             WHERE m.title LIKE ?1
             ORDER BY m.meeting_date DESC
             LIMIT 10"
        ))?;
        let pattern = format!("%{}%", title_search);
        let rows = stmt.query_map(params![pattern], overview_from_row)?;
        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?);
        }
        Ok(meetings)
    }

    /// LIKE search across title and content fields. Hits are scored by
    /// case-insensitive occurrence count and ordered score-then-recency,
    /// with an excerpt around the first content match.
    pub fn search_meetings(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MeetingSearchHit>, DbError> {
        // Newest-first candidate pool, capped well above any sane limit so
        // ranking has something to reorder.
        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.title, m.meeting_date, c.name,
                    COALESCE(m.combined_markdown, ''), COALESCE(m.enhanced_notes, ''),
                    COALESCE(m.manual_notes, ''), COALESCE(m.transcript, '')
             FROM meetings m
             LEFT JOIN clients c ON m.client_id = c.id
             WHERE m.title LIKE ?1 OR m.combined_markdown LIKE ?1
                OR m.enhanced_notes LIKE ?1 OR m.manual_notes LIKE ?1
                OR m.transcript LIKE ?1
             ORDER BY m.meeting_date DESC
             LIMIT 200",
        )?;
        let pattern = format!("%{}%", query);
        let rows = stmt.query_map(params![pattern], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (id, title, meeting_date, client_name, combined, enhanced, manual, transcript) =
                row?;
            let rank = count_occurrences(&title, query)
                + count_occurrences(&combined, query)
                + count_occurrences(&enhanced, query)
                + count_occurrences(&manual, query)
                + count_occurrences(&transcript, query);

            // Excerpt from the first content field that actually matched;
            // fall back to the title.
            let source = [&combined, &enhanced, &manual, &transcript]
                .into_iter()
                .find(|f| count_occurrences(f, query) > 0);
            let excerpt = match source {
                Some(text) => excerpt(text, query, 100),
                None => title.clone(),
            };

            hits.push(MeetingSearchHit {
                id,
                title,
                meeting_date,
                client_name,
                rank,
                excerpt,
            });
        }

        // Stable sort keeps newest-first order among equal scores.
        hits.sort_by(|a, b| b.rank.cmp(&a.rank));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Point a meeting at a client. Errors when the meeting doesn't exist.
    pub fn assign_meeting_to_client(&self, meeting_id: i64, client_id: i64) -> Result<(), DbError> {
        let updated = self.conn.execute(
            "UPDATE meetings SET client_id = ?2 WHERE id = ?1",
            params![meeting_id, client_id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound(format!("Meeting {} not found", meeting_id)));
        }
        Ok(())
    }

    pub fn get_archive_stats(&self) -> Result<ArchiveStats, DbError> {
        let total_meetings = self.get_archived_count()?;
        let meetings_last_30_days: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM meetings WHERE meeting_date >= datetime('now', '-30 days')",
            [],
            |row| row.get(0),
        )?;
        let by_client = self.get_clients_with_meeting_counts()?;
        Ok(ArchiveStats {
            total_meetings,
            meetings_last_30_days,
            by_client,
        })
    }

    // =========================================================================
    // Meeting series
    // =========================================================================

    pub fn create_meeting_series(
        &self,
        name: &str,
        client_id: Option<i64>,
        meeting_type: Option<&str>,
        recurrence_pattern: Option<&str>,
    ) -> Result<DbMeetingSeries, DbError> {
        let now = now_iso();
        self.conn.execute(
            "INSERT INTO meeting_series (name, client_id, meeting_type, recurrence_pattern, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, client_id, meeting_type, recurrence_pattern, now],
        )?;
        Ok(DbMeetingSeries {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            client_id,
            meeting_type: meeting_type.map(str::to_string),
            recurrence_pattern: recurrence_pattern.map(str::to_string),
            notes: None,
            created_at: now,
        })
    }

    pub fn get_all_meeting_series(&self) -> Result<Vec<DbMeetingSeries>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, client_id, meeting_type, recurrence_pattern, notes, created_at
             FROM meeting_series ORDER BY name ASC",
        )?;
        let rows = stmt.query_map([], series_from_row)?;
        let mut series = Vec::new();
        for row in rows {
            series.push(row?);
        }
        Ok(series)
    }

    pub fn set_meeting_series(&self, meeting_id: i64, series_id: Option<i64>) -> Result<(), DbError> {
        let updated = self.conn.execute(
            "UPDATE meetings SET meeting_series_id = ?2 WHERE id = ?1",
            params![meeting_id, series_id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound(format!("Meeting {} not found", meeting_id)));
        }
        Ok(())
    }
}
