use log::{info, warn};
use rusqlite::{params, OptionalExtension, Row};

use super::{now_timestamp, DatabaseService, DbError, Result};
use crate::models::User;

const USER_COLUMNS: &str = "id, username, hashed_password, is_active, created_at, last_login";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        hashed_password: row.get(2)?,
        is_active: row.get(3)?,
        created_at: row.get(4)?,
        last_login: row.get(5)?,
    })
}

impl DatabaseService {
    pub fn get_user(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Inserts a user with an already hashed password.
    pub fn create_user(&self, username: &str, hashed_password: &str) -> Result<User> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (username, hashed_password, is_active, created_at) VALUES (?1, ?2, 1, ?3)",
            params![username, hashed_password, now_timestamp()],
        )
        .map_err(|e| DbError::conflict_on_constraint(e, format!("User '{}' already exists", username)))?;
        drop(conn);

        self.get_user(username)?.ok_or(DbError::NotFound("User"))
    }

    pub fn update_user_password(&self, username: &str, hashed_password: &str) -> Result<User> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET hashed_password = ?1 WHERE username = ?2",
            params![hashed_password, username],
        )?;
        drop(conn);

        if changed == 0 {
            return Err(DbError::NotFound("User"));
        }
        info!("Password updated for user '{}'.", username);
        self.get_user(username)?.ok_or(DbError::NotFound("User"))
    }

    pub fn update_last_login(&self, username: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE username = ?2",
            params![now_timestamp(), username],
        )?;
        Ok(())
    }

    pub fn set_user_active(&self, username: &str, active: bool) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET is_active = ?1 WHERE username = ?2",
            params![active, username],
        )?;
        if changed == 0 {
            return Err(DbError::NotFound("User"));
        }
        Ok(())
    }

    /// Creates the bootstrap admin account if it does not exist yet.
    ///
    /// `hash` is only invoked when the account is actually created. Returns
    /// `true` when a new account was written.
    pub fn ensure_default_admin<F, E>(&self, username: &str, password: &str, hash: F) -> std::result::Result<bool, E>
    where
        F: FnOnce(&str) -> std::result::Result<String, E>,
        E: From<DbError>,
    {
        if self.get_user(username)?.is_some() {
            return Ok(false);
        }

        let hashed = hash(password)?;
        self.create_user(username, &hashed)?;
        warn!("Created default admin user '{}'. Please change the default password immediately.", username);
        Ok(true)
    }
}
