use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{get, patch, post, State};
use tracing::info;

use super::{page, parse_filter, Query};
use crate::auth::AuthenticatedUser;
use crate::db::DatabaseService;
use crate::error::ApiError;
use crate::models::{AdminRequest, AdminRequestStatus, AdminRequestUpdate, NewAdminRequest};

#[get("/?<skip>&<limit>&<status>")]
pub fn list_admin_requests(
    skip: Query<'_, i64>,
    limit: Query<'_, i64>,
    status: Option<&str>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<AdminRequest>>, ApiError> {
    let page = page(skip, limit)?;
    let status = parse_filter::<AdminRequestStatus>(status)?;
    Ok(Json(db.list_admin_requests(page, status)?))
}

#[post("/", data = "<request>")]
pub fn create_admin_request(
    request: Json<NewAdminRequest>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Custom<Json<AdminRequest>>, ApiError> {
    let created = db.create_admin_request(request.topic_id, &request.requester_client_id)?;
    Ok(Custom(Status::Created, Json(created)))
}

#[get("/<request_id>")]
pub fn get_admin_request(
    request_id: i64,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<AdminRequest>, ApiError> {
    Ok(Json(db.require_admin_request(request_id)?))
}

/// Approve, reject or revoke a request.
#[patch("/<request_id>", data = "<update>")]
pub fn respond_to_admin_request(
    request_id: i64,
    update: Json<AdminRequestUpdate>,
    user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<AdminRequest>, ApiError> {
    let next: AdminRequestStatus = update.status.parse().map_err(ApiError::Validation)?;
    let request = db.respond_to_admin_request(request_id, next)?;
    info!(
        request_id,
        status = %request.status,
        operator = %user.0.username,
        "Admin request updated"
    );
    Ok(Json(request))
}
