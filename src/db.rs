use log::{error, info};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::ErrorCode;
use thiserror::Error;
use time::macros::format_description;
use time::OffsetDateTime;

mod admin;
mod clients;
mod events;
mod messages;
mod subscriptions;
mod topics;
mod users;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;
type DbConn = PooledConnection<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
}

impl DbError {
    /// Turns a UNIQUE/FK violation into a `Conflict`, leaving other errors as they are.
    fn conflict_on_constraint(err: rusqlite::Error, message: impl Into<String>) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
                DbError::Conflict(message.into())
            }
            other => DbError::Sqlite(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Offset/limit window applied to list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 1000;

    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_LIMIT)
    }
}

/// Current UTC time as fixed-width text, so lexical order is chronological order.
pub fn now_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
    ))
    .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

pub struct DatabaseService {
    pool: DbPool,
}

impl DatabaseService {
    /// Creates a new `DatabaseService` backed by a pool of SQLite connections.
    pub fn new(db_path: &str, pool_size: u32) -> Result<Self> {
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            // cascades rely on this, and it is per-connection in SQLite
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
        });
        let pool = r2d2::Pool::builder().max_size(pool_size).build(manager)?;
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Initializes the database schema.
    pub fn initialize_db(&self) -> Result<()> {
        let conn = self.conn()?;

        info!("Initializing database schema...");

        match conn.execute_batch(
            r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            hashed_password TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT,
            last_login TEXT
        );

        CREATE TABLE IF NOT EXISTS clients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id TEXT NOT NULL UNIQUE,
            last_connected TEXT,
            last_ip TEXT,
            last_port INTEGER,
            connection_count INTEGER NOT NULL DEFAULT 0,
            active BOOLEAN NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS topics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            owner_client_id TEXT NOT NULL,
            created_at TEXT,
            FOREIGN KEY (owner_client_id) REFERENCES clients(client_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS subscriptions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id TEXT NOT NULL,
            topic_id INTEGER NOT NULL,
            subscribed_at TEXT,
            active BOOLEAN NOT NULL DEFAULT 1,
            FOREIGN KEY (client_id) REFERENCES clients(client_id) ON DELETE CASCADE,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE,
            UNIQUE (client_id, topic_id)
        );

        CREATE TABLE IF NOT EXISTS message_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            publisher_client_id TEXT NOT NULL,
            topic_id INTEGER NOT NULL,
            payload_size INTEGER NOT NULL,
            payload_preview TEXT,
            published_at TEXT,
            FOREIGN KEY (publisher_client_id) REFERENCES clients(client_id) ON DELETE CASCADE,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS connection_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_id TEXT NOT NULL,
            event_type TEXT NOT NULL CHECK (event_type IN ('CONNECT', 'DISCONNECT')),
            ip_address TEXT,
            port INTEGER,
            timestamp TEXT,
            FOREIGN KEY (client_id) REFERENCES clients(client_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS admin_requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            topic_id INTEGER NOT NULL,
            requester_client_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            request_timestamp TEXT,
            response_timestamp TEXT,
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE,
            FOREIGN KEY (requester_client_id) REFERENCES clients(client_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS topic_admins (
            topic_id INTEGER NOT NULL,
            admin_client_id TEXT NOT NULL,
            granted_at TEXT,
            PRIMARY KEY (topic_id, admin_client_id),
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE,
            FOREIGN KEY (admin_client_id) REFERENCES clients(client_id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS admin_sensor_config (
            topic_id INTEGER NOT NULL,
            sensor_name TEXT NOT NULL,
            active BOOLEAN NOT NULL DEFAULT 1,
            set_by TEXT,
            updated_at TEXT,
            activable BOOLEAN NOT NULL DEFAULT 0,
            PRIMARY KEY (topic_id, sensor_name),
            FOREIGN KEY (topic_id) REFERENCES topics(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_topics_owner ON topics(owner_client_id);
        CREATE INDEX IF NOT EXISTS idx_subscriptions_topic ON subscriptions(topic_id);
        CREATE INDEX IF NOT EXISTS idx_message_logs_published ON message_logs(published_at);
        CREATE INDEX IF NOT EXISTS idx_message_logs_publisher ON message_logs(publisher_client_id);
        CREATE INDEX IF NOT EXISTS idx_message_logs_topic ON message_logs(topic_id);
        CREATE INDEX IF NOT EXISTS idx_connection_events_client ON connection_events(client_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_admin_requests_status ON admin_requests(status);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_admin_requests_one_pending
            ON admin_requests(topic_id, requester_client_id) WHERE status = 'pending';
        "#,
        ) {
            Ok(_) => {
                info!("Database schema initialized successfully.");
                Ok(())
            }
            Err(e) => {
                error!("Failed to initialize database schema: {:?}", e);
                Err(e.into())
            }
        }
    }
}

/// Maps a text column that must parse into a domain enum.
fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::DatabaseService;
    use tempfile::TempDir;

    /// A fresh on-disk database; the directory lives as long as the returned guard.
    pub fn temp_db() -> (TempDir, DatabaseService) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        let db = DatabaseService::new(path.to_str().expect("utf-8 path"), 4).expect("pool");
        db.initialize_db().expect("schema");
        (dir, db)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::temp_db;
    use super::*;

    #[test]
    fn timestamps_are_fixed_width_and_ordered() {
        let a = now_timestamp();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = now_timestamp();
        assert_eq!(a.len(), 27);
        assert!(a.ends_with('Z'));
        assert!(a < b);
    }

    #[test]
    fn schema_initialization_is_idempotent() {
        let (_dir, db) = temp_db();
        db.initialize_db().unwrap();
        db.initialize_db().unwrap();
    }

    #[test]
    fn foreign_keys_are_enabled_on_pooled_connections() {
        let (_dir, db) = temp_db();
        let conn = db.conn().unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
