use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{delete, get, patch, post, put, State};

use super::{page, Query};
use crate::auth::AuthenticatedUser;
use crate::db::DatabaseService;
use crate::error::ApiError;
use crate::models::{AdminSensorConfig, NewTopic, SensorConfigUpdate, Topic, TopicAdmin};

#[get("/?<skip>&<limit>")]
pub fn list_topics(
    skip: Query<'_, i64>,
    limit: Query<'_, i64>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<Topic>>, ApiError> {
    Ok(Json(db.list_topics(page(skip, limit)?)?))
}

#[post("/", data = "<topic>")]
pub fn create_topic(
    topic: Json<NewTopic>,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Custom<Json<Topic>>, ApiError> {
    if topic.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".to_string()));
    }
    let created = db.create_topic(&topic.name, &topic.owner_client_id)?;
    Ok(Custom(Status::Created, Json(created)))
}

#[get("/<topic_id>")]
pub fn get_topic(
    topic_id: i64,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Topic>, ApiError> {
    Ok(Json(db.require_topic(topic_id)?))
}

#[delete("/<topic_id>")]
pub fn delete_topic(
    topic_id: i64,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Status, ApiError> {
    db.delete_topic(topic_id)?;
    Ok(Status::NoContent)
}

#[get("/by-name/<name>")]
pub fn get_topic_by_name(
    name: &str,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Topic>, ApiError> {
    db.get_topic_by_name(name)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Topic not found".to_string()))
}

#[get("/by-client/<client_id>")]
pub fn get_topics_by_client(
    client_id: &str,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<Topic>>, ApiError> {
    Ok(Json(db.list_topics_by_owner(client_id)?))
}

#[get("/<topic_id>/admins", rank = 2)]
pub fn get_topic_admins(
    topic_id: i64,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<TopicAdmin>>, ApiError> {
    Ok(Json(db.list_topic_admins(topic_id)?))
}

#[get("/<topic_id>/sensors", rank = 2)]
pub fn get_topic_sensors(
    topic_id: i64,
    _user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<Vec<AdminSensorConfig>>, ApiError> {
    Ok(Json(db.list_sensor_configs(topic_id)?))
}

#[put("/<topic_id>/sensors/<sensor_name>", data = "<update>")]
pub fn put_topic_sensor(
    topic_id: i64,
    sensor_name: &str,
    update: Json<SensorConfigUpdate>,
    user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<AdminSensorConfig>, ApiError> {
    let sensor = db.upsert_sensor_config(
        topic_id,
        sensor_name,
        update.active,
        update.activable,
        &user.0.username,
    )?;
    Ok(Json(sensor))
}

#[patch("/<topic_id>/sensors/<sensor_name>", data = "<update>")]
pub fn patch_topic_sensor(
    topic_id: i64,
    sensor_name: &str,
    update: Json<SensorConfigUpdate>,
    user: AuthenticatedUser,
    db: &State<DatabaseService>,
) -> Result<Json<AdminSensorConfig>, ApiError> {
    let sensor = db.set_sensor_active(topic_id, sensor_name, update.active, &user.0.username)?;
    Ok(Json(sensor))
}
