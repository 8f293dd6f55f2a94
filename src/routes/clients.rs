use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{delete, get, patch, State};

use super::{page, Query};
use crate::auth::AuthenticatedUser;
use crate::db::DatabaseService;
use crate::error::ApiError;
use crate::models::{ActiveUpdate, Client};

#[get("/?<skip>&<limit>")]
pub fn list_clients(
    skip: Query<'_, i64>,
    limit: Query<'_, i64>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<Client>>, ApiError> {
    Ok(Json(db.list_clients(page(skip, limit)?)?))
}

#[get("/<client_id>")]
pub fn get_client(
    client_id: &str,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Client>, ApiError> {
    Ok(Json(db.require_client(client_id)?))
}

/// Flip the `active` flag, e.g. to mark a client disconnected
#[patch("/<client_id>", data = "<update>")]
pub fn update_client(
    client_id: &str,
    update: Json<ActiveUpdate>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Client>, ApiError> {
    Ok(Json(db.set_client_active(client_id, update.active)?))
}

#[delete("/<client_id>")]
pub fn delete_client(
    client_id: &str,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Status, ApiError> {
    db.delete_client(client_id)?;
    Ok(Status::NoContent)
}
