use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, DatabaseService, DbError, Page, Result};
use crate::models::MessageLog;

const MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.publisher_client_id, m.topic_id, t.name, m.payload_size, m.payload_preview, m.published_at
    FROM message_logs m
    LEFT JOIN topics t ON t.id = m.topic_id
"#;

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageLog> {
    Ok(MessageLog {
        id: row.get(0)?,
        publisher_client_id: row.get(1)?,
        topic_id: row.get(2)?,
        topic_name: row.get(3)?,
        payload_size: row.get(4)?,
        payload_preview: row.get(5)?,
        published_at: row.get(6)?,
    })
}

/// First `max_chars` characters of a payload; `None` for an empty payload.
pub fn payload_preview(payload: &str, max_chars: usize) -> Option<String> {
    if payload.is_empty() || max_chars == 0 {
        return None;
    }
    Some(payload.chars().take(max_chars).collect())
}

impl DatabaseService {
    pub fn list_messages(&self, page: Page) -> Result<Vec<MessageLog>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY m.published_at DESC, m.id DESC LIMIT ?1 OFFSET ?2",
            MESSAGE_SELECT
        ))?;
        let rows = stmt.query_map(params![page.limit, page.skip], message_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_message(&self, message_id: i64) -> Result<Option<MessageLog>> {
        let conn = self.conn()?;
        let message = conn
            .query_row(
                &format!("{} WHERE m.id = ?1", MESSAGE_SELECT),
                params![message_id],
                message_from_row,
            )
            .optional()?;
        Ok(message)
    }

    pub fn list_messages_by_client(&self, client_id: &str, page: Page) -> Result<Vec<MessageLog>> {
        self.require_client(client_id)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE m.publisher_client_id = ?1 ORDER BY m.published_at DESC, m.id DESC LIMIT ?2 OFFSET ?3",
            MESSAGE_SELECT
        ))?;
        let rows = stmt.query_map(params![client_id, page.limit, page.skip], message_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list_messages_by_topic(&self, topic_id: i64, page: Page) -> Result<Vec<MessageLog>> {
        self.require_topic(topic_id)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE m.topic_id = ?1 ORDER BY m.published_at DESC, m.id DESC LIMIT ?2 OFFSET ?3",
            MESSAGE_SELECT
        ))?;
        let rows = stmt.query_map(params![topic_id, page.limit, page.skip], message_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Stores the metadata of a published message: byte size and a short preview.
    pub fn log_message(
        &self,
        publisher_client_id: &str,
        topic_id: i64,
        payload: &str,
        preview_chars: usize,
    ) -> Result<MessageLog> {
        self.require_client(publisher_client_id)?;
        self.require_topic(topic_id)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO message_logs (publisher_client_id, topic_id, payload_size, payload_preview, published_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                publisher_client_id,
                topic_id,
                payload.len() as i64,
                payload_preview(payload, preview_chars),
                now_timestamp()
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        self.get_message(id)?.ok_or(DbError::NotFound("Message"))
    }

    pub fn delete_message(&self, message_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM message_logs WHERE id = ?1", params![message_id])?;
        if changed == 0 {
            return Err(DbError::NotFound("Message"));
        }
        Ok(())
    }
}
