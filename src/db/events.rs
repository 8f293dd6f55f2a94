use rusqlite::{params, OptionalExtension, Row};

use super::{parse_column, DatabaseService, DbError, Page, Result};
use crate::models::{ConnectionEvent, EventType};

const EVENT_COLUMNS: &str = "id, client_id, event_type, ip_address, port, timestamp";

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<ConnectionEvent> {
    Ok(ConnectionEvent {
        id: row.get(0)?,
        client_id: row.get(1)?,
        event_type: parse_column(row, 2)?,
        ip_address: row.get(3)?,
        port: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

impl DatabaseService {
    pub fn list_events(&self, page: Page, event_type: Option<EventType>) -> Result<Vec<ConnectionEvent>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM connection_events
             WHERE (?1 IS NULL OR event_type = ?1)
             ORDER BY timestamp DESC, id DESC LIMIT ?2 OFFSET ?3",
            EVENT_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![event_type.map(|t| t.as_str()), page.limit, page.skip],
            event_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_event(&self, event_id: i64) -> Result<Option<ConnectionEvent>> {
        let conn = self.conn()?;
        let event = conn
            .query_row(
                &format!("SELECT {} FROM connection_events WHERE id = ?1", EVENT_COLUMNS),
                params![event_id],
                event_from_row,
            )
            .optional()?;
        Ok(event)
    }

    pub fn require_event(&self, event_id: i64) -> Result<ConnectionEvent> {
        self.get_event(event_id)?.ok_or(DbError::NotFound("Connection event"))
    }

    pub fn list_events_by_client(
        &self,
        client_id: &str,
        page: Page,
        event_type: Option<EventType>,
    ) -> Result<Vec<ConnectionEvent>> {
        self.require_client(client_id)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM connection_events
             WHERE client_id = ?1 AND (?2 IS NULL OR event_type = ?2)
             ORDER BY timestamp DESC, id DESC LIMIT ?3 OFFSET ?4",
            EVENT_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![client_id, event_type.map(|t| t.as_str()), page.limit, page.skip],
            event_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Every event of a client, newest first, without paging.
    pub fn list_all_events_by_client(&self, client_id: &str) -> Result<Vec<ConnectionEvent>> {
        self.require_client(client_id)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM connection_events WHERE client_id = ?1 ORDER BY timestamp DESC, id DESC",
            EVENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![client_id], event_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn delete_event(&self, event_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM connection_events WHERE id = ?1", params![event_id])?;
        if changed == 0 {
            return Err(DbError::NotFound("Connection event"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::temp_db;
    use crate::db::{DbError, Page};
    use crate::models::EventType;

    #[test]
    fn events_filter_by_type_and_come_newest_first() {
        let (_dir, db) = temp_db();
        let c1 = db.record_connection_event("a", EventType::Connect, Some("1.1.1.1"), Some(1)).unwrap();
        let d1 = db.record_connection_event("a", EventType::Disconnect, None, None).unwrap();
        let c2 = db.record_connection_event("b", EventType::Connect, None, None).unwrap();

        let all = db.list_events(Page::default(), None).unwrap();
        let ids: Vec<_> = all.iter().map(|e| e.id).collect();
        assert_eq!(ids, [c2.id, d1.id, c1.id]);

        let connects = db.list_events(Page::default(), Some(EventType::Connect)).unwrap();
        assert_eq!(connects.len(), 2);
        assert!(connects.iter().all(|e| e.event_type == EventType::Connect));

        let a_disconnects = db
            .list_events_by_client("a", Page::default(), Some(EventType::Disconnect))
            .unwrap();
        assert_eq!(a_disconnects.len(), 1);
        assert_eq!(db.list_all_events_by_client("a").unwrap().len(), 2);
    }

    #[test]
    fn event_lookups_and_deletes() {
        let (_dir, db) = temp_db();
        let event = db.record_connection_event("a", EventType::Connect, Some("10.1.1.1"), Some(1883)).unwrap();

        let fetched = db.require_event(event.id).unwrap();
        assert_eq!(fetched.ip_address.as_deref(), Some("10.1.1.1"));
        assert_eq!(fetched.port, Some(1883));

        db.delete_event(event.id).unwrap();
        assert!(matches!(db.require_event(event.id), Err(DbError::NotFound(_))));
        assert!(matches!(db.list_all_events_by_client("zzz"), Err(DbError::NotFound("Client"))));
    }

    #[test]
    fn deleting_a_client_removes_its_events() {
        let (_dir, db) = temp_db();
        let event = db.record_connection_event("a", EventType::Connect, None, None).unwrap();
        db.delete_client("a").unwrap();
        assert!(db.get_event(event.id).unwrap().is_none());
    }
}
