//! Client registry: canonical clients, their aliases, rename and merge.
//!
//! This module owns the naming invariant: client names are unique
//! case-insensitively, alias strings are stored lowercase and unique, and no
//! alias may equal a current client name. The detector assumes the invariant
//! holds, so every write path that could break it is guarded here.

use rusqlite::{params, Connection};

use crate::db::types::*;
use crate::db::ArchiveDb;
use crate::util::{now_iso, slugify};

/// Insert or repoint an alias row. Expects an already-lowercased alias;
/// callers guard the name-collision invariant before reaching this.
fn upsert_alias(conn: &Connection, alias: &str, client_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO client_aliases (alias, canonical_client_id, created_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(alias) DO UPDATE SET canonical_client_id = excluded.canonical_client_id",
        params![alias, client_id, now_iso()],
    )?;
    Ok(())
}

impl ArchiveDb {
    pub fn get_client_by_id(&self, id: i64) -> Result<Option<DbClient>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, slug, notes, created_at, updated_at
             FROM clients WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], client_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Look up a client by name. The `name` column is `COLLATE NOCASE`, so
    /// the match is case-insensitive.
    pub fn get_client_by_name(&self, name: &str) -> Result<Option<DbClient>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, slug, notes, created_at, updated_at
             FROM clients WHERE name = ?1",
        )?;
        let mut rows = stmt.query_map(params![name], client_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Resolve a client by name, creating it (with a derived slug) when no
    /// case-insensitive match exists.
    pub fn get_or_create_client(&self, name: &str) -> Result<DbClient, DbError> {
        if let Some(existing) = self.get_client_by_name(name)? {
            return Ok(existing);
        }

        let now = now_iso();
        self.conn.execute(
            "INSERT INTO clients (name, slug, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![name, slugify(name), now],
        )?;
        let id = self.conn.last_insert_rowid();
        log::info!("Created client '{}' (id {})", name, id);

        Ok(DbClient {
            id,
            name: name.to_string(),
            slug: Some(slugify(name)),
            notes: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// All canonical client names, alphabetical. This is the detector's
    /// known-clients working set at batch start.
    pub fn get_client_names(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM clients ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// Clients with their archived-meeting counts, busiest first.
    pub fn get_clients_with_meeting_counts(&self) -> Result<Vec<ClientWithCount>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, COUNT(m.id) AS meeting_count
             FROM clients c
             LEFT JOIN meetings m ON m.client_id = c.id
             GROUP BY c.id, c.name
             ORDER BY meeting_count DESC, c.name ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ClientWithCount {
                id: row.get(0)?,
                name: row.get(1)?,
                meeting_count: row.get(2)?,
            })
        })?;
        let mut clients = Vec::new();
        for row in rows {
            clients.push(row?);
        }
        Ok(clients)
    }

    /// Client names containing `query` (case-insensitive), for
    /// "Did you mean" suggestions after a failed name lookup.
    pub fn suggest_client_names(&self, query: &str) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM clients WHERE name LIKE ?1 ORDER BY name ASC LIMIT 5",
        )?;
        let pattern = format!("%{}%", query);
        let rows = stmt.query_map(params![pattern], |row| row.get(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    // =========================================================================
    // Aliases
    // =========================================================================

    /// Register an alias for a client. The alias is trimmed and lowercased;
    /// re-registering an existing alias repoints it (last write wins).
    ///
    /// Refused when the alias would equal a current client name: aliases
    /// shadow names in detection, so such a row would hijack lookups.
    /// Returns the normalized alias string.
    pub fn add_client_alias(&self, alias: &str, client_id: i64) -> Result<String, DbError> {
        let normalized = alias.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(DbError::Invalid("Alias cannot be empty".to_string()));
        }

        if let Some(existing) = self.get_client_by_name(&normalized)? {
            if existing.id == client_id {
                return Err(DbError::Collision(format!(
                    "'{}' is already the client's canonical name; no alias needed",
                    existing.name
                )));
            }
            return Err(DbError::Collision(format!(
                "'{}' is the canonical name of client '{}'; use merge_clients instead of an alias",
                normalized, existing.name
            )));
        }

        upsert_alias(&self.conn, &normalized, client_id)?;
        Ok(normalized)
    }

    pub fn get_alias(&self, alias: &str) -> Result<Option<DbAlias>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.alias, a.canonical_client_id, c.name
             FROM client_aliases a
             JOIN clients c ON c.id = a.canonical_client_id
             WHERE a.alias = ?1",
        )?;
        let mut rows = stmt.query_map(params![alias.trim().to_lowercase()], alias_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// List aliases, optionally restricted to one client.
    pub fn get_aliases(&self, client_id: Option<i64>) -> Result<Vec<DbAlias>, DbError> {
        let sql = "SELECT a.alias, a.canonical_client_id, c.name
                   FROM client_aliases a
                   JOIN clients c ON c.id = a.canonical_client_id
                   {filter}
                   ORDER BY c.name ASC, a.alias ASC";
        let mut aliases = Vec::new();
        match client_id {
            Some(id) => {
                let mut stmt = self
                    .conn
                    .prepare(&sql.replace("{filter}", "WHERE c.id = ?1"))?;
                let rows = stmt.query_map(params![id], alias_from_row)?;
                for row in rows {
                    aliases.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(&sql.replace("{filter}", ""))?;
                let rows = stmt.query_map([], alias_from_row)?;
                for row in rows {
                    aliases.push(row?);
                }
            }
        }
        Ok(aliases)
    }

    /// Remove an alias. Returns false when no such alias existed.
    pub fn delete_client_alias(&self, alias: &str) -> Result<bool, DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM client_aliases WHERE alias = ?1",
            params![alias.trim().to_lowercase()],
        )?;
        Ok(deleted > 0)
    }

    /// (alias, canonical name) pairs in detection order: longest alias
    /// first, alphabetical among equal lengths. Longest-first means the most
    /// specific curated alias wins when one alias contains another.
    pub fn detection_alias_pairs(&self) -> Result<Vec<(String, String)>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.alias, c.name
             FROM client_aliases a
             JOIN clients c ON c.id = a.canonical_client_id
             ORDER BY LENGTH(a.alias) DESC, a.alias ASC",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row?);
        }
        Ok(pairs)
    }

    // =========================================================================
    // Rename
    // =========================================================================

    /// Rename a client in place, demoting the old name to an alias so
    /// detection keeps resolving it.
    ///
    /// Fails when the client doesn't exist, when another client already
    /// holds the new name (merge is the tool for that), or when the new name
    /// is registered as an alias of a different client.
    pub fn rename_client(&self, old_name: &str, new_name: &str) -> Result<DbClient, DbError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(DbError::Invalid("New name cannot be empty".to_string()));
        }

        let client = self.get_client_by_name(old_name)?.ok_or_else(|| {
            DbError::NotFound(format!("Client '{}' not found", old_name))
        })?;

        if let Some(existing) = self.get_client_by_name(new_name)? {
            if existing.id != client.id {
                return Err(DbError::Collision(format!(
                    "A client named '{}' already exists. Use merge_clients to combine them.",
                    existing.name
                )));
            }
        }

        let new_lower = new_name.to_lowercase();
        if let Some(alias) = self.get_alias(&new_lower)? {
            if alias.canonical_client_id != client.id {
                return Err(DbError::Collision(format!(
                    "'{}' is already an alias for client '{}'. Delete that alias first.",
                    new_lower, alias.client_name
                )));
            }
        }

        let old_canonical = client.name.clone();
        let case_only = old_canonical.to_lowercase() == new_lower;

        self.with_transaction(|tx| {
            let conn = tx.conn_ref();
            conn.execute(
                "UPDATE clients SET name = ?1, slug = ?2, updated_at = ?3 WHERE id = ?4",
                params![new_name, slugify(new_name), now_iso(), client.id],
            )
            .map_err(|e| e.to_string())?;

            // An alias of this client equal to the new name would now shadow
            // the canonical name; the rename promotes it.
            conn.execute(
                "DELETE FROM client_aliases WHERE alias = ?1",
                params![new_lower],
            )
            .map_err(|e| e.to_string())?;

            if !case_only {
                upsert_alias(conn, &old_canonical.to_lowercase(), client.id)
                    .map_err(|e| e.to_string())?;
            }
            Ok(())
        })
        .map_err(DbError::Transaction)?;

        log::info!("Renamed client '{}' -> '{}'", old_canonical, new_name);
        self.get_client_by_id(client.id)?.ok_or_else(|| {
            DbError::NotFound(format!("Client '{}' vanished during rename", new_name))
        })
    }

    // =========================================================================
    // Merge
    // =========================================================================

    /// Merge one client into another: repoint meetings and context, demote
    /// the source name to an alias of the target, delete the source.
    ///
    /// The source must exist; the target is created on demand. Everything
    /// runs in one transaction so a failure can't leave meetings repointed
    /// while the source row survives. Returns the target and what moved.
    pub fn merge_clients(
        &self,
        source_name: &str,
        target_name: &str,
    ) -> Result<(DbClient, MergeOutcome), DbError> {
        let source = self.get_client_by_name(source_name)?.ok_or_else(|| {
            DbError::NotFound(format!("Source client '{}' not found", source_name))
        })?;
        let target = self.get_or_create_client(target_name)?;

        if source.id == target.id {
            return Err(DbError::Collision(format!(
                "Cannot merge client '{}' into itself",
                source.name
            )));
        }

        let source_alias = source.name.to_lowercase();
        let outcome = self
            .with_transaction(|tx| {
                let conn = tx.conn_ref();

                let meetings_moved = conn
                    .execute(
                        "UPDATE meetings SET client_id = ?2 WHERE client_id = ?1",
                        params![source.id, target.id],
                    )
                    .map_err(|e| e.to_string())?;

                let context_moved = conn
                    .execute(
                        "UPDATE client_context SET client_id = ?2 WHERE client_id = ?1",
                        params![source.id, target.id],
                    )
                    .map_err(|e| e.to_string())?;

                // The source's name keeps resolving, now to the target.
                upsert_alias(conn, &source_alias, target.id).map_err(|e| e.to_string())?;

                // Remaining aliases of the source would dangle after the
                // delete; remove them explicitly (schema cascade backstops).
                conn.execute(
                    "DELETE FROM client_aliases WHERE canonical_client_id = ?1",
                    params![source.id],
                )
                .map_err(|e| e.to_string())?;

                conn.execute("DELETE FROM clients WHERE id = ?1", params![source.id])
                    .map_err(|e| e.to_string())?;

                Ok(MergeOutcome {
                    meetings_moved,
                    context_moved,
                })
            })
            .map_err(DbError::Transaction)?;

        log::info!(
            "Merged client '{}' into '{}' ({} meetings, {} context docs)",
            source.name,
            target.name,
            outcome.meetings_moved,
            outcome.context_moved
        );
        Ok((target, outcome))
    }
}

fn alias_from_row(row: &rusqlite::Row) -> rusqlite::Result<DbAlias> {
    Ok(DbAlias {
        alias: row.get(0)?,
        canonical_client_id: row.get(1)?,
        client_name: row.get(2)?,
    })
}
