use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{delete, get, post, State};
use tracing::info;

use super::{page, parse_filter, Query};
use crate::auth::AuthenticatedUser;
use crate::db::DatabaseService;
use crate::error::ApiError;
use crate::models::{Client, ConnectionEvent, EventType, NewConnectionEvent};

#[get("/?<skip>&<limit>&<event_type>")]
pub fn list_events(
    skip: Query<'_, i64>,
    limit: Query<'_, i64>,
    event_type: Option<&str>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<ConnectionEvent>>, ApiError> {
    let page = page(skip, limit)?;
    let event_type = parse_filter::<EventType>(event_type)?;
    Ok(Json(db.list_events(page, event_type)?))
}

/// Record a CONNECT/DISCONNECT reported by the broker.
#[post("/", data = "<event>")]
pub fn record_event(
    event: Json<NewConnectionEvent>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Custom<Json<ConnectionEvent>>, ApiError> {
    if event.client_id.trim().is_empty() {
        return Err(ApiError::Validation("client_id must not be empty".to_string()));
    }
    let event_type: EventType = event.event_type.parse().map_err(ApiError::Validation)?;
    let recorded = db.record_connection_event(
        &event.client_id,
        event_type,
        event.ip_address.as_deref(),
        event.port,
    )?;
    info!(client_id = %recorded.client_id, event_type = %recorded.event_type, "Recorded connection event");
    Ok(Custom(Status::Created, Json(recorded)))
}

#[get("/<event_id>")]
pub fn get_event(
    event_id: i64,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<ConnectionEvent>, ApiError> {
    Ok(Json(db.require_event(event_id)?))
}

#[delete("/<event_id>")]
pub fn delete_event(
    event_id: i64,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Status, ApiError> {
    db.delete_event(event_id)?;
    Ok(Status::NoContent)
}

#[get("/by-client/<client_id>?<skip>&<limit>&<event_type>")]
pub fn get_events_by_client(
    client_id: &str,
    skip: Query<'_, i64>,
    limit: Query<'_, i64>,
    event_type: Option<&str>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<ConnectionEvent>>, ApiError> {
    let page = page(skip, limit)?;
    let event_type = parse_filter::<EventType>(event_type)?;
    Ok(Json(db.list_events_by_client(client_id, page, event_type)?))
}

#[get("/<event_id>/client", rank = 2)]
pub fn get_event_client(
    event_id: i64,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Client>, ApiError> {
    let event = db.require_event(event_id)?;
    Ok(Json(db.require_client(&event.client_id)?))
}

#[get("/<client_id>/all-events", rank = 3)]
pub fn get_all_client_events(
    client_id: &str,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<ConnectionEvent>>, ApiError> {
    Ok(Json(db.list_all_events_by_client(client_id)?))
}
