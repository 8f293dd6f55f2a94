use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{catch, catchers, get, options, routes, Build, Request, Rocket};
use serde::Serialize;
use tracing::error;

use crate::config::{Config, API_DESCRIPTION, API_TITLE};
use crate::db::DatabaseService;
use crate::error::ApiError;
use crate::routes;

const ENDPOINTS: &[&str] = &[
    "/token",
    "/auth/me",
    "/clients",
    "/topics",
    "/subscriptions",
    "/messages",
    "/events",
    "/admin-requests",
    "/health",
];

#[derive(Serialize)]
struct ApiInfo {
    name: &'static str,
    version: &'static str,
    description: &'static str,
    endpoints: &'static [&'static str],
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// CORS Fairing for Rocket
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _req: &'r rocket::Request<'_>, res: &mut rocket::Response<'r>) {
        res.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        res.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "GET, POST, PUT, PATCH, DELETE, OPTIONS",
        ));
        res.set_header(Header::new(
            "Access-Control-Allow-Headers",
            "Content-Type, Authorization",
        ));
    }
}

/// Preflight requests; the fairing adds the headers.
#[options("/<_..>")]
fn preflight() -> Status {
    Status::NoContent
}

/// Root handler
#[get("/")]
fn root_handler() -> Json<ApiInfo> {
    Json(ApiInfo {
        name: API_TITLE,
        version: env!("CARGO_PKG_VERSION"),
        description: API_DESCRIPTION,
        endpoints: ENDPOINTS,
    })
}

#[get("/health")]
fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// The error a request guard stashed before failing, if any.
fn cached_error(req: &Request<'_>) -> Option<ApiError> {
    req.local_cache(|| None::<ApiError>).clone()
}

#[catch(400)]
fn bad_request(req: &Request<'_>) -> ApiError {
    cached_error(req).unwrap_or_else(|| ApiError::BadRequest("Bad request".to_string()))
}

#[catch(401)]
fn unauthorized(req: &Request<'_>) -> ApiError {
    cached_error(req).unwrap_or_else(ApiError::credentials)
}

#[catch(404)]
fn not_found(req: &Request<'_>) -> ApiError {
    ApiError::NotFound(format!("No route for {} {}", req.method(), req.uri().path()))
}

#[catch(422)]
fn unprocessable(_req: &Request<'_>) -> ApiError {
    ApiError::Validation("Request body or parameters could not be parsed".to_string())
}

#[catch(500)]
fn internal_error(req: &Request<'_>) -> ApiError {
    cached_error(req).unwrap_or_else(|| ApiError::Internal("Internal server error".to_string()))
}

/// Assembles the application: managed state, routes, catchers and CORS.
pub fn build_rocket(db_service: DatabaseService, config: Config) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("address", config.api_host.clone()))
        .merge(("port", config.api_port));

    rocket::custom(figment)
        .manage(db_service)
        .manage(config)
        .mount("/", routes![root_handler, health, preflight, routes::auth::login])
        .mount(
            "/auth",
            routes![
                routes::auth::login,
                routes::auth::read_me,
                routes::auth::update_password
            ],
        )
        .mount(
            "/clients",
            routes![
                routes::clients::list_clients,
                routes::clients::get_client,
                routes::clients::update_client,
                routes::clients::delete_client
            ],
        )
        .mount(
            "/topics",
            routes![
                routes::topics::list_topics,
                routes::topics::create_topic,
                routes::topics::get_topic,
                routes::topics::delete_topic,
                routes::topics::get_topic_by_name,
                routes::topics::get_topics_by_client,
                routes::topics::get_topic_admins,
                routes::topics::get_topic_sensors,
                routes::topics::put_topic_sensor,
                routes::topics::patch_topic_sensor
            ],
        )
        .mount(
            "/subscriptions",
            routes![
                routes::subscriptions::list_subscriptions,
                routes::subscriptions::create_subscription,
                routes::subscriptions::get_subscription,
                routes::subscriptions::update_subscription,
                routes::subscriptions::delete_subscription,
                routes::subscriptions::get_subscriptions_by_client,
                routes::subscriptions::get_subscriptions_by_topic
            ],
        )
        .mount(
            "/messages",
            routes![
                routes::messages::list_messages,
                routes::messages::log_message,
                routes::messages::get_message,
                routes::messages::delete_message,
                routes::messages::get_messages_by_client,
                routes::messages::get_messages_by_topic
            ],
        )
        .mount(
            "/events",
            routes![
                routes::events::list_events,
                routes::events::record_event,
                routes::events::get_event,
                routes::events::delete_event,
                routes::events::get_events_by_client,
                routes::events::get_event_client,
                routes::events::get_all_client_events
            ],
        )
        .mount(
            "/admin-requests",
            routes![
                routes::admin::list_admin_requests,
                routes::admin::create_admin_request,
                routes::admin::get_admin_request,
                routes::admin::respond_to_admin_request
            ],
        )
        .register(
            "/",
            catchers![bad_request, unauthorized, not_found, unprocessable, internal_error],
        )
        .attach(Cors)
}

/// Run the Rocket server until it is shut down.
pub async fn run_rest_server(db_service: DatabaseService, config: Config) -> Result<(), rocket::Error> {
    match build_rocket(db_service, config).launch().await {
        Ok(_) => Ok(()),
        Err(e) => {
            // formatting the error marks it as handled
            error!("REST server failed: {}", e);
            Err(e)
        }
    }
}
