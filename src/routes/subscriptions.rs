use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{delete, get, patch, post, State};

use super::{flag, page, Query};
use crate::auth::AuthenticatedUser;
use crate::db::DatabaseService;
use crate::error::ApiError;
use crate::models::{ActiveUpdate, NewSubscription, Subscription};

#[get("/?<skip>&<limit>&<active_only>")]
pub fn list_subscriptions(
    skip: Query<'_, i64>,
    limit: Query<'_, i64>,
    active_only: Query<'_, bool>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    let page = page(skip, limit)?;
    Ok(Json(db.list_subscriptions(page, flag("active_only", active_only)?)?))
}

/// Subscribing again to the same topic reactivates the existing row.
#[post("/", data = "<subscription>")]
pub fn create_subscription(
    subscription: Json<NewSubscription>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Custom<Json<Subscription>>, ApiError> {
    let created = db.create_subscription(&subscription.client_id, subscription.topic_id)?;
    Ok(Custom(Status::Created, Json(created)))
}

#[get("/<subscription_id>")]
pub fn get_subscription(
    subscription_id: i64,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Subscription>, ApiError> {
    Ok(Json(db.require_subscription(subscription_id)?))
}

#[patch("/<subscription_id>", data = "<update>")]
pub fn update_subscription(
    subscription_id: i64,
    update: Json<ActiveUpdate>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Subscription>, ApiError> {
    Ok(Json(db.set_subscription_active(subscription_id, update.active)?))
}

#[delete("/<subscription_id>")]
pub fn delete_subscription(
    subscription_id: i64,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Status, ApiError> {
    db.delete_subscription(subscription_id)?;
    Ok(Status::NoContent)
}

#[get("/by-client/<client_id>?<active_only>")]
pub fn get_subscriptions_by_client(
    client_id: &str,
    active_only: Query<'_, bool>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    Ok(Json(db.list_subscriptions_by_client(client_id, flag("active_only", active_only)?)?))
}

#[get("/by-topic/<topic_id>?<active_only>")]
pub fn get_subscriptions_by_topic(
    topic_id: i64,
    active_only: Query<'_, bool>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<Subscription>>, ApiError> {
    Ok(Json(db.list_subscriptions_by_topic(topic_id, flag("active_only", active_only)?)?))
}
