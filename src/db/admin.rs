//! Authorization records: admin requests, per-topic admin lists and sensor switches.

use log::info;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use super::{now_timestamp, parse_column, DatabaseService, DbError, Page, Result};
use crate::models::{AdminRequest, AdminRequestStatus, AdminSensorConfig, TopicAdmin};

const REQUEST_COLUMNS: &str =
    "id, topic_id, requester_client_id, status, request_timestamp, response_timestamp";
const SENSOR_COLUMNS: &str = "topic_id, sensor_name, active, set_by, updated_at, activable";

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<AdminRequest> {
    Ok(AdminRequest {
        id: row.get(0)?,
        topic_id: row.get(1)?,
        requester_client_id: row.get(2)?,
        status: parse_column(row, 3)?,
        request_timestamp: row.get(4)?,
        response_timestamp: row.get(5)?,
    })
}

fn sensor_from_row(row: &Row<'_>) -> rusqlite::Result<AdminSensorConfig> {
    Ok(AdminSensorConfig {
        topic_id: row.get(0)?,
        sensor_name: row.get(1)?,
        active: row.get(2)?,
        set_by: row.get(3)?,
        updated_at: row.get(4)?,
        activable: row.get(5)?,
    })
}

impl DatabaseService {
    pub fn list_admin_requests(
        &self,
        page: Page,
        status: Option<AdminRequestStatus>,
    ) -> Result<Vec<AdminRequest>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM admin_requests
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY request_timestamp DESC, id DESC LIMIT ?2 OFFSET ?3",
            REQUEST_COLUMNS
        ))?;
        let rows = stmt.query_map(
            params![status.map(|s| s.as_str()), page.limit, page.skip],
            request_from_row,
        )?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_admin_request(&self, request_id: i64) -> Result<Option<AdminRequest>> {
        let conn = self.conn()?;
        let request = conn
            .query_row(
                &format!("SELECT {} FROM admin_requests WHERE id = ?1", REQUEST_COLUMNS),
                params![request_id],
                request_from_row,
            )
            .optional()?;
        Ok(request)
    }

    pub fn require_admin_request(&self, request_id: i64) -> Result<AdminRequest> {
        self.get_admin_request(request_id)?
            .ok_or(DbError::NotFound("Admin request"))
    }

    /// Files a pending request for `requester` to administer `topic_id`.
    pub fn create_admin_request(&self, topic_id: i64, requester_client_id: &str) -> Result<AdminRequest> {
        self.require_topic(topic_id)?;
        self.require_client(requester_client_id)?;

        let mut conn = self.conn()?;
        // takes the write lock up front so the checks below hold until commit
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let already_admin: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM topic_admins WHERE topic_id = ?1 AND admin_client_id = ?2)",
            params![topic_id, requester_client_id],
            |row| row.get(0),
        )?;
        if already_admin {
            return Err(DbError::Conflict(format!(
                "Client '{}' is already an admin of topic {}",
                requester_client_id, topic_id
            )));
        }

        tx.execute(
            "INSERT INTO admin_requests (topic_id, requester_client_id, status, request_timestamp)
             VALUES (?1, ?2, 'pending', ?3)",
            params![topic_id, requester_client_id, now_timestamp()],
        )
        .map_err(|e| {
            DbError::conflict_on_constraint(
                e,
                format!(
                    "Client '{}' already has a pending request for topic {}",
                    requester_client_id, topic_id
                ),
            )
        })?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        drop(conn);

        self.require_admin_request(id)
    }

    /// Moves a request to `next`, keeping the topic admin list in step.
    ///
    /// Approving grants admin rights and revoking an approved request takes
    /// them away again; every other transition is a conflict. The current
    /// status is read under the write lock.
    pub fn respond_to_admin_request(&self, request_id: i64, next: AdminRequestStatus) -> Result<AdminRequest> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = tx
            .query_row(
                &format!("SELECT {} FROM admin_requests WHERE id = ?1", REQUEST_COLUMNS),
                params![request_id],
                request_from_row,
            )
            .optional()?
            .ok_or(DbError::NotFound("Admin request"))?;
        if !current.status.can_transition_to(next) {
            return Err(DbError::Conflict(format!(
                "Cannot change admin request {} from '{}' to '{}'",
                request_id, current.status, next
            )));
        }

        let now = now_timestamp();
        let changed = tx.execute(
            "UPDATE admin_requests SET status = ?1, response_timestamp = ?2 WHERE id = ?3 AND status = ?4",
            params![next.as_str(), now, request_id, current.status.as_str()],
        )?;
        if changed != 1 {
            return Err(DbError::Conflict(format!(
                "Admin request {} changed while it was being answered",
                request_id
            )));
        }

        match next {
            AdminRequestStatus::Approved => {
                tx.execute(
                    "INSERT OR IGNORE INTO topic_admins (topic_id, admin_client_id, granted_at) VALUES (?1, ?2, ?3)",
                    params![current.topic_id, current.requester_client_id, now],
                )?;
            }
            AdminRequestStatus::Revoked => {
                tx.execute(
                    "DELETE FROM topic_admins WHERE topic_id = ?1 AND admin_client_id = ?2",
                    params![current.topic_id, current.requester_client_id],
                )?;
            }
            AdminRequestStatus::Pending | AdminRequestStatus::Rejected => {}
        }
        tx.commit()?;
        drop(conn);

        info!(
            "Admin request {} for topic {} is now '{}'.",
            request_id, current.topic_id, next
        );
        self.require_admin_request(request_id)
    }

    pub fn list_topic_admins(&self, topic_id: i64) -> Result<Vec<TopicAdmin>> {
        self.require_topic(topic_id)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT topic_id, admin_client_id, granted_at FROM topic_admins
             WHERE topic_id = ?1 ORDER BY granted_at",
        )?;
        let rows = stmt.query_map(params![topic_id], |row| {
            Ok(TopicAdmin {
                topic_id: row.get(0)?,
                admin_client_id: row.get(1)?,
                granted_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn list_sensor_configs(&self, topic_id: i64) -> Result<Vec<AdminSensorConfig>> {
        self.require_topic(topic_id)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM admin_sensor_config WHERE topic_id = ?1 ORDER BY sensor_name",
            SENSOR_COLUMNS
        ))?;
        let rows = stmt.query_map(params![topic_id], sensor_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn get_sensor_config(&self, topic_id: i64, sensor_name: &str) -> Result<Option<AdminSensorConfig>> {
        let conn = self.conn()?;
        let sensor = conn
            .query_row(
                &format!(
                    "SELECT {} FROM admin_sensor_config WHERE topic_id = ?1 AND sensor_name = ?2",
                    SENSOR_COLUMNS
                ),
                params![topic_id, sensor_name],
                sensor_from_row,
            )
            .optional()?;
        Ok(sensor)
    }

    /// Creates or replaces a sensor switch. `activable` keeps its stored value when `None`.
    pub fn upsert_sensor_config(
        &self,
        topic_id: i64,
        sensor_name: &str,
        active: bool,
        activable: Option<bool>,
        set_by: &str,
    ) -> Result<AdminSensorConfig> {
        self.require_topic(topic_id)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO admin_sensor_config (topic_id, sensor_name, active, set_by, updated_at, activable)
            VALUES (?1, ?2, ?3, ?4, ?5, COALESCE(?6, 0))
            ON CONFLICT(topic_id, sensor_name) DO UPDATE SET
                active = excluded.active,
                set_by = excluded.set_by,
                updated_at = excluded.updated_at,
                activable = COALESCE(?6, admin_sensor_config.activable)
            "#,
            params![topic_id, sensor_name, active, set_by, now_timestamp(), activable],
        )?;
        drop(conn);

        self.get_sensor_config(topic_id, sensor_name)?
            .ok_or(DbError::NotFound("Sensor config"))
    }

    /// Flips a sensor on or off; only sensors marked activable may be toggled.
    pub fn set_sensor_active(
        &self,
        topic_id: i64,
        sensor_name: &str,
        active: bool,
        set_by: &str,
    ) -> Result<AdminSensorConfig> {
        let sensor = self
            .get_sensor_config(topic_id, sensor_name)?
            .ok_or(DbError::NotFound("Sensor config"))?;
        if !sensor.activable {
            return Err(DbError::Conflict(format!(
                "Sensor '{}' on topic {} cannot be toggled",
                sensor_name, topic_id
            )));
        }

        let conn = self.conn()?;
        conn.execute(
            "UPDATE admin_sensor_config SET active = ?1, set_by = ?2, updated_at = ?3
             WHERE topic_id = ?4 AND sensor_name = ?5",
            params![active, set_by, now_timestamp(), topic_id, sensor_name],
        )?;
        drop(conn);

        self.get_sensor_config(topic_id, sensor_name)?
            .ok_or(DbError::NotFound("Sensor config"))
    }
}
