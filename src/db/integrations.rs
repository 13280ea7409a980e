//! External tool links per client (Linear teams, Slack channels). One row
//! per (client, integration type), upserted on re-link.

use rusqlite::params;

use crate::db::types::*;
use crate::db::ArchiveDb;
use crate::util::now_iso;

const INTEGRATION_COLUMNS: &str =
    "i.client_id, i.integration_type, i.external_id, i.external_name, i.metadata,
     i.created_at, i.updated_at, c.name";

impl ArchiveDb {
    /// Link a client to an external resource, replacing any previous link of
    /// the same type.
    pub fn set_client_integration(
        &self,
        client_id: i64,
        integration_type: &str,
        external_id: &str,
        external_name: Option<&str>,
        metadata: Option<&str>,
    ) -> Result<(), DbError> {
        let now = now_iso();
        self.conn.execute(
            "INSERT INTO client_integrations
                 (client_id, integration_type, external_id, external_name, metadata,
                  created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(client_id, integration_type) DO UPDATE SET
                 external_id = excluded.external_id,
                 external_name = excluded.external_name,
                 metadata = excluded.metadata,
                 updated_at = excluded.updated_at",
            params![client_id, integration_type, external_id, external_name, metadata, now],
        )?;
        Ok(())
    }

    pub fn get_client_integration(
        &self,
        client_id: i64,
        integration_type: &str,
    ) -> Result<Option<DbIntegration>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INTEGRATION_COLUMNS}
             FROM client_integrations i
             JOIN clients c ON c.id = i.client_id
             WHERE i.client_id = ?1 AND i.integration_type = ?2"
        ))?;
        let mut rows = stmt.query_map(params![client_id, integration_type], integration_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All integration links for one client, ordered by type.
    pub fn get_client_integrations(&self, client_id: i64) -> Result<Vec<DbIntegration>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INTEGRATION_COLUMNS}
             FROM client_integrations i
             JOIN clients c ON c.id = i.client_id
             WHERE i.client_id = ?1
             ORDER BY i.integration_type ASC"
        ))?;
        let rows = stmt.query_map(params![client_id], integration_from_row)?;
        let mut links = Vec::new();
        for row in rows {
            links.push(row?);
        }
        Ok(links)
    }

    /// Every integration link in the archive, grouped by client name.
    pub fn get_integrations(&self) -> Result<Vec<DbIntegration>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {INTEGRATION_COLUMNS}
             FROM client_integrations i
             JOIN clients c ON c.id = i.client_id
             ORDER BY c.name ASC, i.integration_type ASC"
        ))?;
        let rows = stmt.query_map([], integration_from_row)?;
        let mut links = Vec::new();
        for row in rows {
            links.push(row?);
        }
        Ok(links)
    }

    /// Which client, if any, already holds this external resource. Used to
    /// refuse linking one Linear team to two clients.
    pub fn get_client_by_integration(
        &self,
        integration_type: &str,
        external_id: &str,
    ) -> Result<Option<DbClient>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, c.slug, c.notes, c.created_at, c.updated_at
             FROM clients c
             JOIN client_integrations i ON i.client_id = c.id
             WHERE i.integration_type = ?1 AND i.external_id = ?2",
        )?;
        let mut rows = stmt.query_map(params![integration_type, external_id], client_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Returns false when no such link existed.
    pub fn delete_client_integration(
        &self,
        client_id: i64,
        integration_type: &str,
    ) -> Result<bool, DbError> {
        let deleted = self.conn.execute(
            "DELETE FROM client_integrations WHERE client_id = ?1 AND integration_type = ?2",
            params![client_id, integration_type],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;

    #[test]
    fn test_set_and_get_integration() {
        let db = test_db();
        let client = db.get_or_create_client("Acme").unwrap();
        db.set_client_integration(client.id, "linear_team", "team-123", Some("Acme Eng"), None)
            .unwrap();

        let link = db
            .get_client_integration(client.id, "linear_team")
            .unwrap()
            .expect("stored");
        assert_eq!(link.external_id, "team-123");
        assert_eq!(link.external_name.as_deref(), Some("Acme Eng"));
        assert_eq!(link.client_name, "Acme");
    }

    #[test]
    fn test_relink_replaces_existing() {
        let db = test_db();
        let client = db.get_or_create_client("Acme").unwrap();
        db.set_client_integration(client.id, "linear_team", "team-123", Some("Old"), None)
            .unwrap();
        db.set_client_integration(client.id, "linear_team", "team-456", Some("New"), None)
            .unwrap();

        let links = db.get_integrations().unwrap();
        assert_eq!(links.len(), 1, "upsert keeps one row per type");
        assert_eq!(links[0].external_id, "team-456");
    }

    #[test]
    fn test_lookup_by_external_id() {
        let db = test_db();
        let acme = db.get_or_create_client("Acme").unwrap();
        db.set_client_integration(acme.id, "linear_team", "team-123", None, None)
            .unwrap();

        let owner = db
            .get_client_by_integration("linear_team", "team-123")
            .unwrap()
            .expect("linked");
        assert_eq!(owner.id, acme.id);

        assert!(db
            .get_client_by_integration("linear_team", "team-999")
            .unwrap()
            .is_none());
        assert!(db
            .get_client_by_integration("slack", "team-123")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_types_are_independent() {
        let db = test_db();
        let client = db.get_or_create_client("Acme").unwrap();
        db.set_client_integration(client.id, "linear_team", "team-123", None, None)
            .unwrap();
        db.set_client_integration(client.id, "slack", "C024BE91L", Some("#acme"), None)
            .unwrap();

        assert_eq!(db.get_integrations().unwrap().len(), 2);
        let slack = db
            .get_client_integration(client.id, "slack")
            .unwrap()
            .unwrap();
        assert_eq!(slack.external_name.as_deref(), Some("#acme"));

        let mine = db.get_client_integrations(client.id).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].integration_type, "linear_team", "ordered by type");
    }

    #[test]
    fn test_delete_integration() {
        let db = test_db();
        let client = db.get_or_create_client("Acme").unwrap();
        db.set_client_integration(client.id, "linear_team", "team-123", None, None)
            .unwrap();

        assert!(db.delete_client_integration(client.id, "linear_team").unwrap());
        assert!(!db.delete_client_integration(client.id, "linear_team").unwrap());
        assert!(db
            .get_client_integration(client.id, "linear_team")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_integration_removed_with_client() {
        let db = test_db();
        let acme = db.get_or_create_client("Acme").unwrap();
        db.get_or_create_client("Target").unwrap();
        db.set_client_integration(acme.id, "linear_team", "team-123", None, None)
            .unwrap();

        db.merge_clients("Acme", "Target").unwrap();
        assert!(db
            .get_client_by_integration("linear_team", "team-123")
            .unwrap()
            .is_none());
    }
}
