use log::info;
use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, DatabaseService, DbError, Page, Result};
use crate::models::Subscription;

const SUBSCRIPTION_SELECT: &str = r#"
    SELECT s.id, s.client_id, s.topic_id, t.name, s.subscribed_at, s.active
    FROM subscriptions s
    LEFT JOIN topics t ON t.id = s.topic_id
"#;

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        id: row.get(0)?,
        client_id: row.get(1)?,
        topic_id: row.get(2)?,
        topic_name: row.get(3)?,
        subscribed_at: row.get(4)?,
        active: row.get(5)?,
    })
}

impl DatabaseService {
    pub fn list_subscriptions(&self, page: Page, active_only: bool) -> Result<Vec<Subscription>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE (?1 = 0 OR s.active = 1) ORDER BY s.id LIMIT ?2 OFFSET ?3",
            SUBSCRIPTION_SELECT
        ))?;
        let rows = stmt.query_map(params![active_only, page.limit, page.skip], subscription_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_subscription(&self, subscription_id: i64) -> Result<Option<Subscription>> {
        let conn = self.conn()?;
        let subscription = conn
            .query_row(
                &format!("{} WHERE s.id = ?1", SUBSCRIPTION_SELECT),
                params![subscription_id],
                subscription_from_row,
            )
            .optional()?;
        Ok(subscription)
    }

    pub fn require_subscription(&self, subscription_id: i64) -> Result<Subscription> {
        self.get_subscription(subscription_id)?
            .ok_or(DbError::NotFound("Subscription"))
    }

    pub fn list_subscriptions_by_client(&self, client_id: &str, active_only: bool) -> Result<Vec<Subscription>> {
        self.require_client(client_id)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE s.client_id = ?1 AND (?2 = 0 OR s.active = 1) ORDER BY s.id",
            SUBSCRIPTION_SELECT
        ))?;
        let rows = stmt.query_map(params![client_id, active_only], subscription_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list_subscriptions_by_topic(&self, topic_id: i64, active_only: bool) -> Result<Vec<Subscription>> {
        self.require_topic(topic_id)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE s.topic_id = ?1 AND (?2 = 0 OR s.active = 1) ORDER BY s.id",
            SUBSCRIPTION_SELECT
        ))?;
        let rows = stmt.query_map(params![topic_id, active_only], subscription_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Subscribes a client to a topic. Subscribing again reactivates the existing row.
    pub fn create_subscription(&self, client_id: &str, topic_id: i64) -> Result<Subscription> {
        self.require_client(client_id)?;
        self.require_topic(topic_id)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO subscriptions (client_id, topic_id, subscribed_at, active)
            VALUES (?1, ?2, ?3, 1)
            ON CONFLICT(client_id, topic_id) DO UPDATE SET
                subscribed_at = excluded.subscribed_at,
                active = 1
            "#,
            params![client_id, topic_id, now_timestamp()],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM subscriptions WHERE client_id = ?1 AND topic_id = ?2",
            params![client_id, topic_id],
            |row| row.get(0),
        )?;
        drop(conn);

        info!("Client '{}' subscribed to topic {}.", client_id, topic_id);
        self.require_subscription(id)
    }

    pub fn set_subscription_active(&self, subscription_id: i64, active: bool) -> Result<Subscription> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE subscriptions SET active = ?1 WHERE id = ?2",
            params![active, subscription_id],
        )?;
        drop(conn);

        if changed == 0 {
            return Err(DbError::NotFound("Subscription"));
        }
        self.require_subscription(subscription_id)
    }

    pub fn delete_subscription(&self, subscription_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM subscriptions WHERE id = ?1", params![subscription_id])?;
        if changed == 0 {
            return Err(DbError::NotFound("Subscription"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::temp_db;
    use crate::db::{DatabaseService, DbError, Page};
    use crate::models::EventType;

    fn seed(db: &DatabaseService) -> (i64, i64) {
        db.record_connection_event("pub", EventType::Connect, None, None).unwrap();
        db.record_connection_event("sub", EventType::Connect, None, None).unwrap();
        let a = db.create_topic("a", "pub").unwrap().id;
        let b = db.create_topic("b", "pub").unwrap().id;
        (a, b)
    }

    #[test]
    fn subscriptions_carry_topic_names_and_filter_on_active() {
        let (_dir, db) = temp_db();
        let (a, b) = seed(&db);

        let sa = db.create_subscription("sub", a).unwrap();
        db.create_subscription("sub", b).unwrap();
        assert_eq!(sa.topic_name.as_deref(), Some("a"));
        assert!(sa.active);

        db.set_subscription_active(sa.id, false).unwrap();

        assert_eq!(db.list_subscriptions(Page::default(), false).unwrap().len(), 2);
        let active = db.list_subscriptions(Page::default(), true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].topic_name.as_deref(), Some("b"));

        assert_eq!(db.list_subscriptions_by_client("sub", true).unwrap().len(), 1);
        assert_eq!(db.list_subscriptions_by_topic(a, false).unwrap().len(), 1);
        assert!(db.list_subscriptions_by_topic(a, true).unwrap().is_empty());
    }

    #[test]
    fn resubscribing_reactivates_the_same_row() {
        let (_dir, db) = temp_db();
        let (a, _) = seed(&db);

        let first = db.create_subscription("sub", a).unwrap();
        db.set_subscription_active(first.id, false).unwrap();
        let again = db.create_subscription("sub", a).unwrap();

        assert_eq!(first.id, again.id);
        assert!(again.active);
    }

    #[test]
    fn lookups_on_missing_parents_fail() {
        let (_dir, db) = temp_db();
        assert!(matches!(db.list_subscriptions_by_client("x", false), Err(DbError::NotFound("Client"))));
        assert!(matches!(db.list_subscriptions_by_topic(42, false), Err(DbError::NotFound("Topic"))));
        assert!(matches!(db.delete_subscription(42), Err(DbError::NotFound(_))));
    }

    #[test]
    fn deleting_a_topic_removes_its_subscriptions() {
        let (_dir, db) = temp_db();
        let (a, _) = seed(&db);
        let sub = db.create_subscription("sub", a).unwrap();

        db.delete_topic(a).unwrap();
        assert!(db.get_subscription(sub.id).unwrap().is_none());
    }
}
