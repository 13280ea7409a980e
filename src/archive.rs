//! Archival pipeline: pulls new meetings from the Granola cache into the
//! archive, detecting and assigning clients as it goes.

use std::path::Path;

use crate::db::{ArchiveDb, NewMeeting};
use crate::detect;
use crate::granola::cache;
use crate::util::now_iso;

/// Outcome of one archive run.
#[derive(Debug, Default)]
pub struct ArchiveReport {
    /// How many cache documents were considered (after the limit).
    pub checked: usize,
    /// How many of those were already in the archive.
    pub already_archived: usize,
    /// Newly archived meetings: title plus detected client, if any.
    pub archived: Vec<(String, Option<String>)>,
    /// Per-document failures. These never stop the batch.
    pub errors: Vec<String>,
}

/// Single archive cycle: read the cache, detect clients, upsert meetings.
///
/// The archived-id set, client list, and alias map are loaded once up
/// front; a failure there aborts the batch. After that, each document
/// fails on its own without stopping the rest.
pub fn archive_new_meetings(
    db: &ArchiveDb,
    cache_path: &Path,
    internal_domain: &str,
    limit: usize,
) -> Result<ArchiveReport, String> {
    let archived_ids = db
        .get_archived_document_ids()
        .map_err(|e| format!("Error querying archived documents: {}", e))?;
    let mut known_clients = db
        .get_client_names()
        .map_err(|e| format!("Error fetching client names: {}", e))?;
    let aliases = db
        .detection_alias_pairs()
        .map_err(|e| format!("Error fetching client aliases: {}", e))?;

    let documents = cache::read_cache(cache_path)?;
    log::info!(
        "Archive run: {} documents in cache, {} known clients, {} aliases",
        documents.len(),
        known_clients.len(),
        aliases.len()
    );

    let mut report = ArchiveReport::default();

    for doc in documents.iter().take(limit) {
        report.checked += 1;

        if archived_ids.contains(&doc.id) {
            report.already_archived += 1;
            continue;
        }

        let title = if doc.title.is_empty() {
            "Untitled".to_string()
        } else {
            doc.title.clone()
        };

        match archive_one(db, doc, &title, &mut known_clients, &aliases, internal_domain) {
            Ok(client) => {
                log::info!(
                    "Archived: {} (client: {})",
                    title,
                    client.as_deref().unwrap_or("none")
                );
                report.archived.push((title, client));
            }
            Err(e) => {
                log::warn!("Error archiving '{}': {}", title, e);
                let short: String = title.chars().take(30).collect();
                report.errors.push(format!("{}: {}", short, e));
            }
        }
    }

    Ok(report)
}

/// Archive a single document, returning the detected client name, if any.
fn archive_one(
    db: &ArchiveDb,
    doc: &cache::GranolaDocument,
    title: &str,
    known_clients: &mut Vec<String>,
    aliases: &[(String, String)],
    internal_domain: &str,
) -> Result<Option<String>, String> {
    let detected = detect::detect(
        &doc.title,
        &doc.attendees,
        known_clients,
        aliases,
        internal_domain,
    );

    let mut client_id = None;
    let mut client_name = None;
    if let Some(found) = detected {
        log::info!(
            "Detected client '{}' for '{}' ({:?})",
            found.name,
            title,
            found.method
        );
        let client = db
            .get_or_create_client(&found.name)
            .map_err(|e| e.to_string())?;
        // Batch-local learning: later documents in this run match the new
        // client by name even though the stored list was loaded up front.
        if !known_clients.contains(&client.name) {
            known_clients.push(client.name.clone());
        }
        client_id = Some(client.id);
        client_name = Some(client.name);
    }

    let record = NewMeeting {
        granola_document_id: doc.id.clone(),
        title: title.to_string(),
        meeting_date: doc.created_at.clone().unwrap_or_else(now_iso),
        transcript: doc.parts.transcript.clone(),
        enhanced_notes: doc.parts.enhanced_notes.clone(),
        manual_notes: doc.parts.manual_notes.clone(),
        combined_markdown: doc.parts.combined_markdown.clone(),
        summary_overview: None,
        meeting_type: "general".to_string(),
        client_id,
    };
    db.archive_meeting(&record).map_err(|e| e.to_string())?;

    Ok(client_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    fn write_cache(dir: &tempfile::TempDir, documents: serde_json::Value) -> std::path::PathBuf {
        let inner = serde_json::json!({
            "state": { "documents": documents, "transcripts": {} }
        });
        let cache_path = dir.path().join("cache-v3.json");
        let cache_file = serde_json::json!({
            "cache": serde_json::to_string(&inner).unwrap()
        });
        std::fs::write(&cache_path, serde_json::to_string(&cache_file).unwrap()).unwrap();
        cache_path
    }

    #[test]
    fn test_archives_new_documents_with_detection() {
        let db = test_db();
        let dir = tempfile::tempdir().unwrap();
        let cache_path = write_cache(
            &dir,
            serde_json::json!({
                "doc-1": {
                    "id": "doc-1",
                    "title": "NGynS x Goji Weekly",
                    "created_at": "2026-03-02T10:00:00Z",
                    "notes_markdown": "notes"
                },
                "doc-2": {
                    "id": "doc-2",
                    "title": "Random chat",
                    "created_at": "2026-03-01T10:00:00Z"
                }
            }),
        );

        let report = archive_new_meetings(&db, &cache_path, "gojilabs.com", 50).unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.already_archived, 0);
        assert_eq!(report.archived.len(), 2);
        assert!(report.errors.is_empty());
        assert_eq!(
            report.archived[0],
            ("NGynS x Goji Weekly".to_string(), Some("NGynS".to_string()))
        );
        assert_eq!(report.archived[1], ("Random chat".to_string(), None));

        let client = db.get_client_by_name("NGynS").unwrap().expect("created");
        let meetings = db.get_meetings_for_client(client.id, 10).unwrap();
        assert_eq!(meetings.len(), 1);
        assert_eq!(db.get_archived_count().unwrap(), 2);
    }

    #[test]
    fn test_second_run_skips_everything() {
        let db = test_db();
        let dir = tempfile::tempdir().unwrap();
        let cache_path = write_cache(
            &dir,
            serde_json::json!({
                "doc-1": {
                    "id": "doc-1",
                    "title": "Acme: planning",
                    "created_at": "2026-03-02T10:00:00Z"
                }
            }),
        );

        archive_new_meetings(&db, &cache_path, "gojilabs.com", 50).unwrap();
        let report = archive_new_meetings(&db, &cache_path, "gojilabs.com", 50).unwrap();
        assert_eq!(report.checked, 1);
        assert_eq!(report.already_archived, 1);
        assert!(report.archived.is_empty());
        assert_eq!(db.get_archived_count().unwrap(), 1);
    }

    #[test]
    fn test_batch_local_learning() {
        let db = test_db();
        let dir = tempfile::tempdir().unwrap();
        // Newest first: the pattern match runs before the plain-title doc,
        // which can then only match via the batch-local client list.
        let cache_path = write_cache(
            &dir,
            serde_json::json!({
                "doc-1": {
                    "id": "doc-1",
                    "title": "NB44 x Goji Kickoff",
                    "created_at": "2026-03-02T10:00:00Z"
                },
                "doc-2": {
                    "id": "doc-2",
                    "title": "nb44 retro",
                    "created_at": "2026-03-01T10:00:00Z"
                }
            }),
        );

        let report = archive_new_meetings(&db, &cache_path, "gojilabs.com", 50).unwrap();
        assert_eq!(report.archived.len(), 2);
        assert_eq!(report.archived[1].1.as_deref(), Some("NB44"));

        let client = db.get_client_by_name("NB44").unwrap().unwrap();
        assert_eq!(db.get_meetings_for_client(client.id, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_stored_alias_wins() {
        let db = test_db();
        let ngyns = db.get_or_create_client("NGynS").unwrap();
        db.add_client_alias("mothership", ngyns.id).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let cache_path = write_cache(
            &dir,
            serde_json::json!({
                "doc-1": {
                    "id": "doc-1",
                    "title": "Mothership design review",
                    "created_at": "2026-03-02T10:00:00Z"
                }
            }),
        );

        let report = archive_new_meetings(&db, &cache_path, "gojilabs.com", 50).unwrap();
        assert_eq!(report.archived[0].1.as_deref(), Some("NGynS"));
    }

    #[test]
    fn test_untitled_document() {
        let db = test_db();
        let dir = tempfile::tempdir().unwrap();
        let cache_path = write_cache(
            &dir,
            serde_json::json!({
                "doc-1": { "id": "doc-1", "created_at": "2026-03-02T10:00:00Z" }
            }),
        );

        let report = archive_new_meetings(&db, &cache_path, "gojilabs.com", 50).unwrap();
        assert_eq!(report.archived[0], ("Untitled".to_string(), None));
    }

    #[test]
    fn test_limit_caps_batch() {
        let db = test_db();
        let dir = tempfile::tempdir().unwrap();
        let cache_path = write_cache(
            &dir,
            serde_json::json!({
                "doc-1": { "id": "doc-1", "title": "A", "created_at": "2026-03-03T10:00:00Z" },
                "doc-2": { "id": "doc-2", "title": "B", "created_at": "2026-03-02T10:00:00Z" },
                "doc-3": { "id": "doc-3", "title": "C", "created_at": "2026-03-01T10:00:00Z" }
            }),
        );

        let report = archive_new_meetings(&db, &cache_path, "gojilabs.com", 2).unwrap();
        assert_eq!(report.checked, 2);
        // Newest two only.
        assert_eq!(report.archived[0].0, "A");
        assert_eq!(report.archived[1].0, "B");
    }

    #[test]
    fn test_missing_cache_aborts() {
        let db = test_db();
        let err = archive_new_meetings(
            &db,
            Path::new("/nonexistent/cache-v3.json"),
            "gojilabs.com",
            50,
        )
        .unwrap_err();
        assert!(err.contains("Failed to read Granola cache"));
    }
}
