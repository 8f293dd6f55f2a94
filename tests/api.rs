use std::collections::HashMap;

use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::{Client, LocalResponse};
use serde_json::{json, Value};
use tempfile::TempDir;

use tinymq_admin::auth::{create_access_token, initialize_admin_user};
use tinymq_admin::config::Config;
use tinymq_admin::db::DatabaseService;
use tinymq_admin::models::{
    AdminRequest, AdminSensorConfig, Client as BrokerClient, ConnectionEvent, MessageLog, Subscription, Token,
    Topic, TopicAdmin, UserInfo,
};
use tinymq_admin::rest_server::build_rocket;

struct TestApp {
    client: Client,
    token: String,
    _dir: TempDir,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("api.db").to_string_lossy().into_owned();

        let mut env = HashMap::new();
        env.insert("DATABASE_PATH", db_path);
        env.insert("PASSWORD_HASH_COST", "4".to_string());
        env.insert("JWT_SECRET_KEY", "integration-secret".to_string());
        env.insert("DB_POOL_SIZE", "2".to_string());
        let config = Config::from_lookup(|key| env.get(key).cloned()).expect("config");

        let db = DatabaseService::new(&config.database_path, config.db_pool_size).expect("db");
        db.initialize_db().expect("schema");
        assert!(initialize_admin_user(&db, &config).expect("admin"));

        let client = Client::tracked(build_rocket(db, config)).expect("rocket");
        let token = login(&client, "admin", "admin")
            .into_json::<Token>()
            .expect("token")
            .access_token;
        TestApp {
            client,
            token,
            _dir: dir,
        }
    }

    fn db(&self) -> &DatabaseService {
        self.client.rocket().state::<DatabaseService>().expect("managed database")
    }

    fn auth(&self) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", self.token))
    }

    fn get(&self, uri: &str) -> LocalResponse<'_> {
        self.client.get(uri.to_string()).header(self.auth()).dispatch()
    }

    fn post(&self, uri: &str, body: Value) -> LocalResponse<'_> {
        self.client.post(uri.to_string()).header(self.auth()).json(&body).dispatch()
    }

    fn put(&self, uri: &str, body: Value) -> LocalResponse<'_> {
        self.client.put(uri.to_string()).header(self.auth()).json(&body).dispatch()
    }

    fn patch(&self, uri: &str, body: Value) -> LocalResponse<'_> {
        self.client.patch(uri.to_string()).header(self.auth()).json(&body).dispatch()
    }

    fn delete(&self, uri: &str) -> LocalResponse<'_> {
        self.client.delete(uri.to_string()).header(self.auth()).dispatch()
    }

    fn connect(&self, client_id: &str) -> ConnectionEvent {
        let response = self.post(
            "/events",
            json!({"client_id": client_id, "event_type": "CONNECT", "ip_address": "10.0.0.5", "port": 51000}),
        );
        assert_eq!(response.status(), Status::Created);
        response.into_json().expect("event")
    }

    fn topic(&self, name: &str, owner: &str) -> Topic {
        let response = self.post("/topics", json!({"name": name, "owner_client_id": owner}));
        assert_eq!(response.status(), Status::Created);
        response.into_json().expect("topic")
    }
}

fn login<'c>(client: &'c Client, username: &str, password: &str) -> LocalResponse<'c> {
    client
        .post("/token")
        .header(ContentType::Form)
        .body(format!("username={}&password={}", username, password))
        .dispatch()
}

fn detail(response: LocalResponse<'_>) -> String {
    let body: Value = response.into_json().expect("json error body");
    body["detail"].as_str().unwrap_or_default().to_string()
}

#[test]
fn root_and_health_are_public() {
    let app = TestApp::new();

    let response = app.client.get("/").dispatch();
    assert_eq!(response.status(), Status::Ok);
    let info: Value = response.into_json().unwrap();
    assert_eq!(info["name"], "TinyMQ API");
    assert!(info["endpoints"].as_array().unwrap().len() > 3);

    let response = app.client.get("/health").dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(response.into_json::<Value>().unwrap(), json!({"status": "healthy"}));
}

#[test]
fn login_rejects_bad_credentials() {
    let app = TestApp::new();

    let response = login(&app.client, "admin", "wrong");
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(response.headers().get_one("WWW-Authenticate"), Some("Bearer"));
    assert_eq!(detail(response), "Incorrect username or password");

    let response = login(&app.client, "nobody", "admin");
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn token_is_also_served_under_auth() {
    let app = TestApp::new();
    let response = app
        .client
        .post("/auth/token")
        .header(ContentType::Form)
        .body("username=admin&password=admin")
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let token: Token = response.into_json().unwrap();
    assert_eq!(token.token_type, "bearer");
}

#[test]
fn protected_routes_require_a_valid_token() {
    let app = TestApp::new();

    let response = app.client.get("/clients").dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
    assert_eq!(response.headers().get_one("WWW-Authenticate"), Some("Bearer"));
    assert_eq!(detail(response), "Could not validate credentials");

    let response = app
        .client
        .get("/clients")
        .header(Header::new("Authorization", "Bearer not-a-jwt"))
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);

    assert_eq!(app.get("/clients").status(), Status::Ok);
}

#[test]
fn expired_and_foreign_tokens_are_unauthorized() {
    let app = TestApp::new();

    let expired = create_access_token("admin", "integration-secret", -10).unwrap();
    let foreign = create_access_token("admin", "some-other-secret", 30).unwrap();
    for token in [expired, foreign] {
        let response = app
            .client
            .get("/auth/me")
            .header(Header::new("Authorization", format!("Bearer {}", token)))
            .dispatch();
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(response.headers().get_one("WWW-Authenticate"), Some("Bearer"));
        assert_eq!(detail(response), "Could not validate credentials");
    }
}

#[test]
fn inactive_users_are_turned_away() {
    let app = TestApp::new();
    app.db().set_user_active("admin", false).unwrap();

    let response = app.get("/auth/me");
    assert_eq!(response.status(), Status::BadRequest);
    assert_eq!(response.into_json::<Value>().unwrap(), json!({"detail": "Inactive user"}));
    assert_eq!(app.get("/clients").status(), Status::BadRequest);

    app.db().set_user_active("admin", true).unwrap();
    assert_eq!(app.get("/auth/me").status(), Status::Ok);
}

#[test]
fn current_user_and_password_change() {
    let app = TestApp::new();

    let me: UserInfo = app.get("/auth/me").into_json().unwrap();
    assert_eq!(me.username, "admin");
    assert!(me.is_active);
    assert!(me.last_login.is_some());

    let response = app.put("/auth/me", json!({"password": "s3cret-pass"}));
    assert_eq!(response.status(), Status::Ok);

    assert_eq!(login(&app.client, "admin", "admin").status(), Status::Unauthorized);
    assert_eq!(login(&app.client, "admin", "s3cret-pass").status(), Status::Ok);

    let response = app.put("/auth/me", json!({"password": ""}));
    assert_eq!(response.status(), Status::UnprocessableEntity);
}

#[test]
fn connection_events_track_client_state() {
    let app = TestApp::new();

    let event = app.connect("sensor-1");
    assert_eq!(event.client_id, "sensor-1");

    let client: BrokerClient = app.get("/clients/sensor-1").into_json().unwrap();
    assert!(client.active);
    assert_eq!(client.connection_count, 1);
    assert_eq!(client.last_ip.as_deref(), Some("10.0.0.5"));

    let response = app.post("/events", json!({"client_id": "sensor-1", "event_type": "DISCONNECT"}));
    assert_eq!(response.status(), Status::Created);
    let client: BrokerClient = app.get("/clients/sensor-1").into_json().unwrap();
    assert!(!client.active);
    assert_eq!(client.connection_count, 1);

    let response = app.post("/events", json!({"client_id": "sensor-1", "event_type": "RECONNECT"}));
    assert_eq!(response.status(), Status::UnprocessableEntity);

    let connects: Vec<ConnectionEvent> = app.get("/events?event_type=CONNECT").into_json().unwrap();
    assert_eq!(connects.len(), 1);
    let all: Vec<ConnectionEvent> = app.get("/events/by-client/sensor-1").into_json().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].event_type.as_str(), "DISCONNECT");

    let everything: Vec<ConnectionEvent> = app.get("/events/sensor-1/all-events").into_json().unwrap();
    assert_eq!(everything.len(), 2);

    let owner: BrokerClient = app
        .get(&format!("/events/{}/client", event.id))
        .into_json()
        .unwrap();
    assert_eq!(owner.client_id, "sensor-1");

    assert_eq!(app.get("/events?event_type=bogus").status(), Status::UnprocessableEntity);
    assert_eq!(app.get("/events/by-client/ghost").status(), Status::NotFound);
}

#[test]
fn client_updates_and_missing_clients() {
    let app = TestApp::new();
    app.connect("sensor-2");

    let updated: BrokerClient = app
        .patch("/clients/sensor-2", json!({"active": false}))
        .into_json()
        .unwrap();
    assert!(!updated.active);

    let response = app.get("/clients/ghost");
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(detail(response), "Client not found");
    assert_eq!(app.delete("/clients/ghost").status(), Status::NotFound);
}

#[test]
fn pagination_bounds_are_validated() {
    let app = TestApp::new();
    assert_eq!(app.get("/clients?limit=0").status(), Status::UnprocessableEntity);
    assert_eq!(app.get("/clients?limit=1001").status(), Status::UnprocessableEntity);
    assert_eq!(app.get("/topics?skip=-1").status(), Status::UnprocessableEntity);
    assert_eq!(app.get("/messages?limit=1000").status(), Status::Ok);
    assert_eq!(app.get("/clients?limit=abc").status(), Status::UnprocessableEntity);
    assert_eq!(app.get("/events?skip=1.5").status(), Status::UnprocessableEntity);
    assert_eq!(app.get("/subscriptions?active_only=maybe").status(), Status::UnprocessableEntity);
    assert_eq!(app.get("/subscriptions?active_only=false").status(), Status::Ok);

    for i in 0..3 {
        app.connect(&format!("c{}", i));
    }
    let page: Vec<BrokerClient> = app.get("/clients?skip=1&limit=1").into_json().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].client_id, "c1");
}

#[test]
fn topics_crud() {
    let app = TestApp::new();
    app.connect("owner");

    let response = app.post("/topics", json!({"name": "greenhouse-temperature", "owner_client_id": "owner"}));
    assert_eq!(response.status(), Status::Created);
    let raw: Value = response.into_json().unwrap();
    let mut fields: Vec<&str> = raw.as_object().unwrap().keys().map(String::as_str).collect();
    fields.sort_unstable();
    assert_eq!(fields, ["created_at", "id", "name", "owner_client_id"]);
    let topic: Topic = serde_json::from_value(raw).unwrap();
    assert_eq!(topic.owner_client_id, "owner");

    let response = app.post("/topics", json!({"name": "greenhouse-temperature", "owner_client_id": "owner"}));
    assert_eq!(response.status(), Status::Conflict);
    let response = app.post("/topics", json!({"name": "x", "owner_client_id": "ghost"}));
    assert_eq!(response.status(), Status::NotFound);

    let by_name: Topic = app.get("/topics/by-name/greenhouse-temperature").into_json().unwrap();
    assert_eq!(by_name.id, topic.id);
    let owned: Vec<Topic> = app.get("/topics/by-client/owner").into_json().unwrap();
    assert_eq!(owned.len(), 1);

    assert_eq!(app.delete(&format!("/topics/{}", topic.id)).status(), Status::NoContent);
    let response = app.get(&format!("/topics/{}", topic.id));
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(detail(response), "Topic not found");
}

#[test]
fn subscriptions_and_messages() {
    let app = TestApp::new();
    app.connect("pub");
    app.connect("sub");
    let topic = app.topic("plant/pressure", "pub");

    let response = app.post("/subscriptions", json!({"client_id": "sub", "topic_id": topic.id}));
    assert_eq!(response.status(), Status::Created);
    let subscription: Subscription = response.into_json().unwrap();
    assert_eq!(subscription.topic_name.as_deref(), Some("plant/pressure"));
    assert!(subscription.active);

    let toggled: Subscription = app
        .patch(&format!("/subscriptions/{}", subscription.id), json!({"active": false}))
        .into_json()
        .unwrap();
    assert!(!toggled.active);
    let active: Vec<Subscription> = app.get("/subscriptions?active_only=true").into_json().unwrap();
    assert!(active.is_empty());
    let by_client: Vec<Subscription> = app.get("/subscriptions/by-client/sub").into_json().unwrap();
    assert_eq!(by_client.len(), 1);
    let by_topic: Vec<Subscription> = app
        .get(&format!("/subscriptions/by-topic/{}?active_only=true", topic.id))
        .into_json()
        .unwrap();
    assert!(by_topic.is_empty());

    let payload = "x".repeat(250);
    let response = app.post(
        "/messages",
        json!({"publisher_client_id": "pub", "topic_id": topic.id, "payload": payload}),
    );
    assert_eq!(response.status(), Status::Created);
    let message: MessageLog = response.into_json().unwrap();
    assert_eq!(message.payload_size, 250);
    assert_eq!(message.payload_preview.as_deref().map(str::len), Some(100));

    let on_topic: Vec<MessageLog> = app
        .get(&format!("/messages/by-topic/{}", topic.id))
        .into_json()
        .unwrap();
    assert_eq!(on_topic.len(), 1);
    let from_pub: Vec<MessageLog> = app.get("/messages/by-client/pub?limit=5").into_json().unwrap();
    assert_eq!(from_pub[0].topic_name.as_deref(), Some("plant/pressure"));

    assert_eq!(app.delete(&format!("/messages/{}", message.id)).status(), Status::NoContent);
    assert_eq!(app.get(&format!("/messages/{}", message.id)).status(), Status::NotFound);
}

#[test]
fn deleting_a_client_cascades() {
    let app = TestApp::new();
    app.connect("owner");
    app.connect("listener");
    let topic = app.topic("cascade/t", "owner");
    app.post("/subscriptions", json!({"client_id": "listener", "topic_id": topic.id}));
    app.post(
        "/messages",
        json!({"publisher_client_id": "owner", "topic_id": topic.id, "payload": "hello"}),
    );

    assert_eq!(app.delete("/clients/owner").status(), Status::NoContent);

    assert_eq!(app.get(&format!("/topics/{}", topic.id)).status(), Status::NotFound);
    let subs: Vec<Subscription> = app.get("/subscriptions/by-client/listener").into_json().unwrap();
    assert!(subs.is_empty());
    let messages: Vec<MessageLog> = app.get("/messages").into_json().unwrap();
    assert!(messages.is_empty());
    let events: Vec<ConnectionEvent> = app.get("/events").into_json().unwrap();
    assert!(events.iter().all(|e| e.client_id != "owner"));
}

#[test]
fn admin_request_lifecycle() {
    let app = TestApp::new();
    app.connect("owner");
    app.connect("helper");
    let topic = app.topic("factory/line1", "owner");

    let response = app.post("/admin-requests", json!({"topic_id": topic.id, "requester_client_id": "helper"}));
    assert_eq!(response.status(), Status::Created);
    let request: AdminRequest = response.into_json().unwrap();
    assert_eq!(request.status.as_str(), "pending");

    let duplicate = app.post("/admin-requests", json!({"topic_id": topic.id, "requester_client_id": "helper"}));
    assert_eq!(duplicate.status(), Status::Conflict);

    let uri = format!("/admin-requests/{}", request.id);
    assert_eq!(app.patch(&uri, json!({"status": "maybe"})).status(), Status::UnprocessableEntity);

    let approved: AdminRequest = app.patch(&uri, json!({"status": "approved"})).into_json().unwrap();
    assert!(approved.response_timestamp.is_some());
    let admins: Vec<TopicAdmin> = app
        .get(&format!("/topics/{}/admins", topic.id))
        .into_json()
        .unwrap();
    assert_eq!(admins.len(), 1);
    assert_eq!(admins[0].admin_client_id, "helper");

    assert_eq!(app.patch(&uri, json!({"status": "rejected"})).status(), Status::Conflict);

    let pending: Vec<AdminRequest> = app.get("/admin-requests?status=pending").into_json().unwrap();
    assert!(pending.is_empty());

    app.patch(&uri, json!({"status": "revoked"}));
    let admins: Vec<TopicAdmin> = app
        .get(&format!("/topics/{}/admins", topic.id))
        .into_json()
        .unwrap();
    assert!(admins.is_empty());
}

#[test]
fn conflicting_admin_transitions_leave_admins_untouched() {
    let app = TestApp::new();
    app.connect("owner");
    app.connect("helper");
    app.connect("intern");
    let topic = app.topic("factory/line2", "owner");
    let admins_uri = format!("/topics/{}/admins", topic.id);
    let admins = |app: &TestApp| -> Vec<String> {
        let rows: Vec<TopicAdmin> = app.get(&admins_uri).into_json().unwrap();
        rows.into_iter().map(|a| a.admin_client_id).collect()
    };
    let file = |requester: &str| -> String {
        let response = app.post("/admin-requests", json!({"topic_id": topic.id, "requester_client_id": requester}));
        assert_eq!(response.status(), Status::Created);
        let request: AdminRequest = response.into_json().unwrap();
        format!("/admin-requests/{}", request.id)
    };

    let approved = file("helper");
    assert_eq!(app.patch(&approved, json!({"status": "approved"})).status(), Status::Ok);
    assert_eq!(admins(&app), ["helper"]);

    let response = app.patch(&approved, json!({"status": "approved"}));
    assert_eq!(response.status(), Status::Conflict);
    assert!(detail(response).contains("approved"));
    assert_eq!(app.patch(&approved, json!({"status": "rejected"})).status(), Status::Conflict);
    assert_eq!(app.patch(&approved, json!({"status": "pending"})).status(), Status::Conflict);
    assert_eq!(admins(&app), ["helper"]);

    let rejected = file("intern");
    assert_eq!(app.patch(&rejected, json!({"status": "rejected"})).status(), Status::Ok);
    assert_eq!(app.patch(&rejected, json!({"status": "revoked"})).status(), Status::Conflict);
    assert_eq!(app.patch(&rejected, json!({"status": "approved"})).status(), Status::Conflict);
    assert_eq!(admins(&app), ["helper"]);

    assert_eq!(app.patch(&approved, json!({"status": "revoked"})).status(), Status::Ok);
    assert_eq!(app.patch(&approved, json!({"status": "revoked"})).status(), Status::Conflict);
    assert!(admins(&app).is_empty());

    let stored: AdminRequest = app.get(&rejected).into_json().unwrap();
    assert_eq!(stored.status.as_str(), "rejected");
}

#[test]
fn sensor_switches() {
    let app = TestApp::new();
    app.connect("owner");
    let topic = app.topic("greenhouse", "owner");
    let uri = format!("/topics/{}/sensors/humidity", topic.id);

    let sensor: AdminSensorConfig = app.put(&uri, json!({"active": true})).into_json().unwrap();
    assert!(!sensor.activable);
    assert_eq!(sensor.set_by.as_deref(), Some("admin"));
    assert_eq!(app.patch(&uri, json!({"active": false})).status(), Status::Conflict);

    app.put(&uri, json!({"active": true, "activable": true}));
    let toggled: AdminSensorConfig = app.patch(&uri, json!({"active": false})).into_json().unwrap();
    assert!(!toggled.active);
    assert!(toggled.activable);

    let sensors: Vec<AdminSensorConfig> = app
        .get(&format!("/topics/{}/sensors", topic.id))
        .into_json()
        .unwrap();
    assert_eq!(sensors.len(), 1);
}

#[test]
fn unknown_routes_and_cors() {
    let app = TestApp::new();

    let response = app.get("/no/such/route");
    assert_eq!(response.status(), Status::NotFound);
    assert_eq!(response.headers().get_one("Access-Control-Allow-Origin"), Some("*"));
    assert!(detail(response).contains("/no/such/route"));

    let response = app.client.options("/clients").dispatch();
    assert_eq!(response.status(), Status::NoContent);
    assert!(response
        .headers()
        .get_one("Access-Control-Allow-Headers")
        .unwrap()
        .contains("Authorization"));
}
