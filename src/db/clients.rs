use log::info;
use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, DatabaseService, DbError, Page, Result};
use crate::models::{Client, ConnectionEvent, EventType};

pub(super) const CLIENT_COLUMNS: &str =
    "id, client_id, last_connected, last_ip, last_port, connection_count, active";

pub(super) fn client_from_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        client_id: row.get(1)?,
        last_connected: row.get(2)?,
        last_ip: row.get(3)?,
        last_port: row.get(4)?,
        connection_count: row.get(5)?,
        active: row.get(6)?,
    })
}

impl DatabaseService {
    pub fn list_clients(&self, page: Page) -> Result<Vec<Client>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM clients ORDER BY id LIMIT ?1 OFFSET ?2",
            CLIENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![page.limit, page.skip], client_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_client(&self, client_id: &str) -> Result<Option<Client>> {
        let conn = self.conn()?;
        let client = conn
            .query_row(
                &format!("SELECT {} FROM clients WHERE client_id = ?1", CLIENT_COLUMNS),
                params![client_id],
                client_from_row,
            )
            .optional()?;
        Ok(client)
    }

    /// Like `get_client`, but a missing client is an error.
    pub fn require_client(&self, client_id: &str) -> Result<Client> {
        self.get_client(client_id)?.ok_or(DbError::NotFound("Client"))
    }

    pub fn set_client_active(&self, client_id: &str, active: bool) -> Result<Client> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE clients SET active = ?1 WHERE client_id = ?2",
            params![active, client_id],
        )?;
        drop(conn);

        if changed == 0 {
            return Err(DbError::NotFound("Client"));
        }
        self.require_client(client_id)
    }

    /// Deletes a client; topics, subscriptions, messages and events go with it.
    pub fn delete_client(&self, client_id: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM clients WHERE client_id = ?1", params![client_id])?;
        if changed == 0 {
            return Err(DbError::NotFound("Client"));
        }
        info!("Deleted client '{}'.", client_id);
        Ok(())
    }

    /// Records a CONNECT/DISCONNECT and brings the client row up to date,
    /// creating it on first contact.
    pub fn record_connection_event(
        &self,
        client_id: &str,
        event_type: EventType,
        ip_address: Option<&str>,
        port: Option<i64>,
    ) -> Result<ConnectionEvent> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = now_timestamp();

        match event_type {
            EventType::Connect => {
                tx.execute(
                    r#"
                    INSERT INTO clients (client_id, last_connected, last_ip, last_port, connection_count, active)
                    VALUES (?1, ?2, ?3, ?4, 1, 1)
                    ON CONFLICT(client_id) DO UPDATE SET
                        last_connected = excluded.last_connected,
                        last_ip = excluded.last_ip,
                        last_port = excluded.last_port,
                        connection_count = clients.connection_count + 1,
                        active = 1
                    "#,
                    params![client_id, now, ip_address, port],
                )?;
            }
            EventType::Disconnect => {
                tx.execute(
                    r#"
                    INSERT INTO clients (client_id, connection_count, active)
                    VALUES (?1, 0, 0)
                    ON CONFLICT(client_id) DO UPDATE SET active = 0
                    "#,
                    params![client_id],
                )?;
            }
        }

        tx.execute(
            "INSERT INTO connection_events (client_id, event_type, ip_address, port, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![client_id, event_type.as_str(), ip_address, port, now],
        )?;
        let event_id = tx.last_insert_rowid();
        tx.commit()?;
        drop(conn);

        self.get_event(event_id)?.ok_or(DbError::NotFound("Connection event"))
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::temp_db;
    use crate::db::{DbError, Page};
    use crate::models::EventType;

    #[test]
    fn connect_creates_then_updates_client() {
        let (_dir, db) = temp_db();

        db.record_connection_event("sensor-1", EventType::Connect, Some("10.0.0.5"), Some(50123))
            .unwrap();
        let client = db.require_client("sensor-1").unwrap();
        assert!(client.active);
        assert_eq!(client.connection_count, 1);
        assert_eq!(client.last_ip.as_deref(), Some("10.0.0.5"));
        assert_eq!(client.last_port, Some(50123));

        db.record_connection_event("sensor-1", EventType::Disconnect, Some("10.0.0.5"), Some(50123))
            .unwrap();
        let client = db.require_client("sensor-1").unwrap();
        assert!(!client.active);
        assert_eq!(client.connection_count, 1);

        db.record_connection_event("sensor-1", EventType::Connect, Some("10.0.0.9"), Some(40000))
            .unwrap();
        let client = db.require_client("sensor-1").unwrap();
        assert!(client.active);
        assert_eq!(client.connection_count, 2);
        assert_eq!(client.last_ip.as_deref(), Some("10.0.0.9"));
    }

    #[test]
    fn disconnect_on_first_contact_creates_inactive_client() {
        let (_dir, db) = temp_db();
        let event = db
            .record_connection_event("ghost", EventType::Disconnect, None, None)
            .unwrap();
        assert_eq!(event.event_type, EventType::Disconnect);

        let client = db.require_client("ghost").unwrap();
        assert!(!client.active);
        assert_eq!(client.connection_count, 0);
    }

    #[test]
    fn list_clients_paginates_in_id_order() {
        let (_dir, db) = temp_db();
        for i in 0..5 {
            db.record_connection_event(&format!("c{}", i), EventType::Connect, None, None)
                .unwrap();
        }
        let first = db.list_clients(Page::new(0, 2)).unwrap();
        let ids: Vec<_> = first.iter().map(|c| c.client_id.as_str()).collect();
        assert_eq!(ids, ["c0", "c1"]);

        let last = db.list_clients(Page::new(4, 2)).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].client_id, "c4");
    }

    #[test]
    fn set_active_and_delete_report_missing_clients() {
        let (_dir, db) = temp_db();
        db.record_connection_event("c", EventType::Connect, None, None).unwrap();

        let client = db.set_client_active("c", false).unwrap();
        assert!(!client.active);

        assert!(matches!(db.set_client_active("nope", true), Err(DbError::NotFound(_))));
        db.delete_client("c").unwrap();
        assert!(matches!(db.delete_client("c"), Err(DbError::NotFound(_))));
    }
}
