use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{delete, get, post, State};
use tracing::debug;

use super::{page, Query};
use crate::auth::AuthenticatedUser;
use crate::config::Config;
use crate::db::DatabaseService;
use crate::error::ApiError;
use crate::models::{MessageLog, NewMessage};

#[get("/?<skip>&<limit>")]
pub fn list_messages(
    skip: Query<'_, i64>,
    limit: Query<'_, i64>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<MessageLog>>, ApiError> {
    Ok(Json(db.list_messages(page(skip, limit)?)?))
}

/// Log a published message. Only the size and a preview are kept.
#[post("/", data = "<message>")]
pub fn log_message(
    message: Json<NewMessage>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
    config: &State<Config>,
) -> Result<Custom<Json<MessageLog>>, ApiError> {
    let stored = db.log_message(
        &message.publisher_client_id,
        message.topic_id,
        &message.payload,
        config.payload_preview_chars,
    )?;
    debug!(id = stored.id, size = stored.payload_size, "Logged message");
    Ok(Custom(Status::Created, Json(stored)))
}

#[get("/<message_id>")]
pub fn get_message(
    message_id: i64,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<MessageLog>, ApiError> {
    db.get_message(message_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Message not found".to_string()))
}

#[delete("/<message_id>")]
pub fn delete_message(
    message_id: i64,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Status, ApiError> {
    db.delete_message(message_id)?;
    Ok(Status::NoContent)
}

#[get("/by-client/<client_id>?<skip>&<limit>")]
pub fn get_messages_by_client(
    client_id: &str,
    skip: Query<'_, i64>,
    limit: Query<'_, i64>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<MessageLog>>, ApiError> {
    let page = page(skip, limit)?;
    Ok(Json(db.list_messages_by_client(client_id, page)?))
}

#[get("/by-topic/<topic_id>?<skip>&<limit>")]
pub fn get_messages_by_topic(
    topic_id: i64,
    skip: Query<'_, i64>,
    limit: Query<'_, i64>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<MessageLog>>, ApiError> {
    let page = page(skip, limit)?;
    Ok(Json(db.list_messages_by_topic(topic_id, page)?))
}
