use log::info;
use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, DatabaseService, DbError, Page, Result};
use crate::models::Topic;

const TOPIC_COLUMNS: &str = "id, name, owner_client_id, created_at";

fn topic_from_row(row: &Row<'_>) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_client_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

impl DatabaseService {
    pub fn list_topics(&self, page: Page) -> Result<Vec<Topic>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM topics ORDER BY id LIMIT ?1 OFFSET ?2",
            TOPIC_COLUMNS
        ))?;
        let rows = stmt.query_map(params![page.limit, page.skip], topic_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_topic(&self, topic_id: i64) -> Result<Option<Topic>> {
        let conn = self.conn()?;
        let topic = conn
            .query_row(
                &format!("SELECT {} FROM topics WHERE id = ?1", TOPIC_COLUMNS),
                params![topic_id],
                topic_from_row,
            )
            .optional()?;
        Ok(topic)
    }

    pub fn require_topic(&self, topic_id: i64) -> Result<Topic> {
        self.get_topic(topic_id)?.ok_or(DbError::NotFound("Topic"))
    }

    pub fn get_topic_by_name(&self, name: &str) -> Result<Option<Topic>> {
        let conn = self.conn()?;
        let topic = conn
            .query_row(
                &format!("SELECT {} FROM topics WHERE name = ?1", TOPIC_COLUMNS),
                params![name],
                topic_from_row,
            )
            .optional()?;
        Ok(topic)
    }

    /// Topics owned by a client. Fails with `NotFound` if the client is unknown.
    pub fn list_topics_by_owner(&self, client_id: &str) -> Result<Vec<Topic>> {
        self.require_client(client_id)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM topics WHERE owner_client_id = ?1 ORDER BY id",
            TOPIC_COLUMNS
        ))?;
        let rows = stmt.query_map(params![client_id], topic_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn create_topic(&self, name: &str, owner_client_id: &str) -> Result<Topic> {
        self.require_client(owner_client_id)?;

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO topics (name, owner_client_id, created_at) VALUES (?1, ?2, ?3)",
            params![name, owner_client_id, now_timestamp()],
        )
        .map_err(|e| DbError::conflict_on_constraint(e, format!("Topic '{}' already exists", name)))?;
        let id = conn.last_insert_rowid();
        drop(conn);

        info!("Registered topic '{}' owned by '{}'.", name, owner_client_id);
        self.require_topic(id)
    }

    /// Deletes a topic together with its subscriptions, messages and admin records.
    pub fn delete_topic(&self, topic_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM topics WHERE id = ?1", params![topic_id])?;
        if changed == 0 {
            return Err(DbError::NotFound("Topic"));
        }
        info!("Deleted topic {}.", topic_id);
        Ok(())
    }
}
