//! Free-form client context documents: notes, requirements, links. Attached
//! to a client, searched alongside meetings, removed with the client on
//! merge.

use rusqlite::params;

use crate::db::types::*;
use crate::db::ArchiveDb;
use crate::util::{count_occurrences, excerpt, now_iso};

const CONTEXT_COLUMNS: &str =
    "x.id, x.client_id, x.title, x.content, x.context_type, x.source_url,
     x.created_at, x.updated_at, c.name";

impl ArchiveDb {
    pub fn add_client_context(
        &self,
        client_id: i64,
        title: &str,
        content: &str,
        context_type: &str,
        source_url: Option<&str>,
    ) -> Result<i64, DbError> {
        let now = now_iso();
        self.conn.execute(
            "INSERT INTO client_context (client_id, title, content, context_type, source_url,
                                         created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![client_id, title, content, context_type, source_url, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_client_context(&self, context_id: i64) -> Result<Option<DbClientContext>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONTEXT_COLUMNS}
             FROM client_context x
             JOIN clients c ON c.id = x.client_id
             WHERE x.id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![context_id], context_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Context documents for a client, most recently updated first,
    /// optionally filtered by type.
    pub fn list_client_context(
        &self,
        client_id: i64,
        context_type: Option<&str>,
    ) -> Result<Vec<DbClientContext>, DbError> {
        let sql = format!(
            "SELECT {CONTEXT_COLUMNS}
             FROM client_context x
             JOIN clients c ON c.id = x.client_id
             WHERE x.client_id = ?1 {type_filter}
             ORDER BY x.updated_at DESC",
            type_filter = if context_type.is_some() {
                "AND x.context_type = ?2"
            } else {
                ""
            }
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut docs = Vec::new();
        match context_type {
            Some(ct) => {
                let rows = stmt.query_map(params![client_id, ct], context_from_row)?;
                for row in rows {
                    docs.push(row?);
                }
            }
            None => {
                let rows = stmt.query_map(params![client_id], context_from_row)?;
                for row in rows {
                    docs.push(row?);
                }
            }
        }
        Ok(docs)
    }

    /// LIKE search over context titles and content, optionally scoped to one
    /// client. Scored by occurrence count, 300-char preview.
    pub fn search_client_context(
        &self,
        query: &str,
        client_id: Option<i64>,
    ) -> Result<Vec<ContextSearchHit>, DbError> {
        let sql = format!(
            "SELECT x.id, c.name, x.title, x.content, x.context_type
             FROM client_context x
             JOIN clients c ON c.id = x.client_id
             WHERE (x.title LIKE ?1 OR x.content LIKE ?1) {client_filter}
             ORDER BY x.updated_at DESC
             LIMIT 50",
            client_filter = if client_id.is_some() {
                "AND x.client_id = ?2"
            } else {
                ""
            }
        );
        let pattern = format!("%{}%", query);
        let mut stmt = self.conn.prepare(&sql)?;

        let map_row = |row: &rusqlite::Row| -> rusqlite::Result<(i64, String, String, String, String)> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
            ))
        };
        let mut raw = Vec::new();
        match client_id {
            Some(id) => {
                let rows = stmt.query_map(params![pattern, id], map_row)?;
                for row in rows {
                    raw.push(row?);
                }
            }
            None => {
                let rows = stmt.query_map(params![pattern], map_row)?;
                for row in rows {
                    raw.push(row?);
                }
            }
        }

        let mut hits: Vec<ContextSearchHit> = raw
            .into_iter()
            .map(|(id, client_name, title, content, context_type)| {
                let rank = count_occurrences(&title, query) + count_occurrences(&content, query);
                let preview = if count_occurrences(&content, query) > 0 {
                    excerpt(&content, query, 150)
                } else {
                    content.chars().take(300).collect()
                };
                ContextSearchHit {
                    id,
                    client_name,
                    title,
                    context_type,
                    rank,
                    preview,
                }
            })
            .collect();
        hits.sort_by(|a, b| b.rank.cmp(&a.rank));
        Ok(hits)
    }

    /// Partial update: only the provided fields change, `updated_at` always
    /// refreshes. Returns false when the row doesn't exist.
    pub fn update_client_context(
        &self,
        context_id: i64,
        title: Option<&str>,
        content: Option<&str>,
        context_type: Option<&str>,
        source_url: Option<&str>,
    ) -> Result<bool, DbError> {
        let mut sql = "UPDATE client_context SET updated_at = ?1".to_string();
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(now_iso())];
        let mut idx = 2;

        if let Some(t) = title {
            sql.push_str(&format!(", title = ?{idx}"));
            params.push(Box::new(t.to_string()));
            idx += 1;
        }
        if let Some(c) = content {
            sql.push_str(&format!(", content = ?{idx}"));
            params.push(Box::new(c.to_string()));
            idx += 1;
        }
        if let Some(ct) = context_type {
            sql.push_str(&format!(", context_type = ?{idx}"));
            params.push(Box::new(ct.to_string()));
            idx += 1;
        }
        if let Some(u) = source_url {
            sql.push_str(&format!(", source_url = ?{idx}"));
            params.push(Box::new(u.to_string()));
            idx += 1;
        }

        sql.push_str(&format!(" WHERE id = ?{idx}"));
        params.push(Box::new(context_id));

        let updated = self.conn.execute(
            &sql,
            rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
        )?;
        Ok(updated > 0)
    }

    /// Returns false when no such row existed.
    pub fn delete_client_context(&self, context_id: i64) -> Result<bool, DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM client_context WHERE id = ?1", params![context_id])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    #[test]
    fn test_add_and_get_context() {
        let db = test_db();
        let client = db.get_or_create_client("Acme").unwrap();
        let id = db
            .add_client_context(
                client.id,
                "Q2 Budget",
                "Budget approved at 50k",
                "requirement",
                Some("https://example.com/doc"),
            )
            .unwrap();

        let doc = db.get_client_context(id).unwrap().expect("stored");
        assert_eq!(doc.client_name, "Acme");
        assert_eq!(doc.title, "Q2 Budget");
        assert_eq!(doc.context_type, "requirement");
        assert_eq!(doc.source_url.as_deref(), Some("https://example.com/doc"));
    }

    #[test]
    fn test_list_filters_by_type() {
        let db = test_db();
        let client = db.get_or_create_client("Acme").unwrap();
        db.add_client_context(client.id, "Note A", "a", "note", None)
            .unwrap();
        db.add_client_context(client.id, "Req B", "b", "requirement", None)
            .unwrap();

        let all = db.list_client_context(client.id, None).unwrap();
        assert_eq!(all.len(), 2);

        let reqs = db.list_client_context(client.id, Some("requirement")).unwrap();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].title, "Req B");
    }

    #[test]
    fn test_search_scoped_to_client() {
        let db = test_db();
        let acme = db.get_or_create_client("Acme").unwrap();
        let beta = db.get_or_create_client("Beta").unwrap();
        db.add_client_context(acme.id, "Launch plan", "launch in June", "note", None)
            .unwrap();
        db.add_client_context(beta.id, "Launch risks", "launch blockers", "note", None)
            .unwrap();

        let all = db.search_client_context("launch", None).unwrap();
        assert_eq!(all.len(), 2);

        let scoped = db.search_client_context("launch", Some(acme.id)).unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].client_name, "Acme");
        assert!(scoped[0].preview.contains("June"));
    }

    #[test]
    fn test_partial_update() {
        let db = test_db();
        let client = db.get_or_create_client("Acme").unwrap();
        let id = db
            .add_client_context(client.id, "Title", "old content", "note", None)
            .unwrap();

        let changed = db
            .update_client_context(id, None, Some("new content"), None, None)
            .unwrap();
        assert!(changed);

        let doc = db.get_client_context(id).unwrap().unwrap();
        assert_eq!(doc.content, "new content");
        assert_eq!(doc.title, "Title", "untouched field survives");

        let missing = db
            .update_client_context(9999, Some("x"), None, None, None)
            .unwrap();
        assert!(!missing);
    }

    #[test]
    fn test_delete_context() {
        let db = test_db();
        let client = db.get_or_create_client("Acme").unwrap();
        let id = db
            .add_client_context(client.id, "Title", "content", "note", None)
            .unwrap();

        assert!(db.delete_client_context(id).unwrap());
        assert!(!db.delete_client_context(id).unwrap());
        assert!(db.get_client_context(id).unwrap().is_none());
    }
}
