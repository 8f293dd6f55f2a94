//! Async client for the TinyMQ admin API, used by the desktop monitor.
//!
//! The client logs in lazily with the password flow and keeps the bearer
//! token until shortly before the server would expire it.

use std::time::{Duration, Instant};

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::models::{
    ActiveUpdate, Client, ConnectionEvent, EventType, MessageLog, PasswordUpdate, Subscription, Token, Topic,
    UserInfo,
};

/// Tokens are refreshed a little before the server's 60 minute expiry.
const TOKEN_LIFETIME: Duration = Duration::from_secs(55 * 60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Invalid API address: {0}")]
    InvalidUrl(String),
    #[error("Authentication failed: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Server returned {code}: {detail}")]
    Status { code: u16, detail: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Where the API lives and whom to log in as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl ApiSettings {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Default)]
struct Session {
    token: Option<String>,
    expires_at: Option<Instant>,
}

impl Session {
    fn valid_token(&self, now: Instant) -> Option<&str> {
        match (&self.token, self.expires_at) {
            (Some(token), Some(expires_at)) if now < expires_at => Some(token),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ErrorDetail {
    detail: String,
}

pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    username: String,
    password: Mutex<String>,
    session: Mutex<Session>,
}

impl ApiClient {
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let base = Url::parse(&settings.base_url()).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(settings.base_url()));
        }
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            base,
            username: settings.username.clone(),
            password: Mutex::new(settings.password.clone()),
            session: Mutex::new(Session::default()),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Builds an endpoint URL; each segment is percent-encoded on its own,
    /// so ids containing `/` stay a single path segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Exchanges the stored credentials for a fresh bearer token.
    pub async fn login(&self) -> Result<String> {
        let password = self.password.lock().await.clone();
        let response = self
            .http
            .post(self.url(&["token"])?)
            .form(&[("username", self.username.as_str()), ("password", password.as_str())])
            .send()
            .await?;

        let token: Token = read_json(response).await?;
        let mut session = self.session.lock().await;
        session.token = Some(token.access_token.clone());
        session.expires_at = Some(Instant::now() + TOKEN_LIFETIME);
        debug!(username = %self.username, "Logged in to API");
        Ok(token.access_token)
    }

    /// Returns a usable token, logging in again when it is missing or stale.
    pub async fn ensure_authenticated(&self) -> Result<String> {
        {
            let session = self.session.lock().await;
            if let Some(token) = session.valid_token(Instant::now()) {
                return Ok(token.to_string());
            }
        }
        self.login().await
    }

    /// Forgets the token; the next call logs in again.
    pub async fn logout(&self) {
        *self.session.lock().await = Session::default();
    }

    async fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let token = self.ensure_authenticated().await?;
        Ok(self.http.request(method, self.url(segments)?).bearer_auth(token))
    }

    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            // token was rejected; drop it so the next call logs in again
            self.logout().await;
        }
        read_json(response).await
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, String)]) -> Result<T> {
        let builder = self.request(Method::GET, segments).await?.query(query);
        self.execute(builder).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        let builder = self.request(method, segments).await?.json(body);
        self.execute(builder).await
    }

    async fn delete(&self, segments: &[&str]) -> Result<()> {
        let response = self.request(Method::DELETE, segments).await?.send().await?;
        if response.status().is_success() {
            return Ok(());
        }
        if response.status() == StatusCode::UNAUTHORIZED {
            self.logout().await;
        }
        Err(error_from(response).await)
    }

    // Current user

    pub async fn current_user(&self) -> Result<UserInfo> {
        self.get(&["auth", "me"], &[]).await
    }

    /// Changes the operator password and keeps using it for later logins.
    pub async fn change_password(&self, new_password: &str) -> Result<UserInfo> {
        let body = PasswordUpdate {
            password: new_password.to_string(),
        };
        let user = self.send_json(Method::PUT, &["auth", "me"], &body).await?;
        *self.password.lock().await = new_password.to_string();
        Ok(user)
    }

    // Clients

    pub async fn get_clients(&self, skip: i64, limit: i64) -> Result<Vec<Client>> {
        self.get(&["clients"], &paging(skip, limit)).await
    }

    pub async fn get_client(&self, client_id: &str) -> Result<Client> {
        self.get(&["clients", client_id], &[]).await
    }

    pub async fn update_client_status(&self, client_id: &str, active: bool) -> Result<Client> {
        self.send_json(Method::PATCH, &["clients", client_id], &ActiveUpdate { active })
            .await
    }

    pub async fn delete_client(&self, client_id: &str) -> Result<()> {
        self.delete(&["clients", client_id]).await
    }

    // Topics

    pub async fn get_topics(&self, skip: i64, limit: i64) -> Result<Vec<Topic>> {
        self.get(&["topics"], &paging(skip, limit)).await
    }

    pub async fn get_topic(&self, topic_id: i64) -> Result<Topic> {
        self.get(&["topics", &topic_id.to_string()], &[]).await
    }

    pub async fn get_client_topics(&self, client_id: &str) -> Result<Vec<Topic>> {
        self.get(&["topics", "by-client", client_id], &[]).await
    }

    pub async fn delete_topic(&self, topic_id: i64) -> Result<()> {
        self.delete(&["topics", &topic_id.to_string()]).await
    }

    // Subscriptions

    pub async fn get_subscriptions(&self, skip: i64, limit: i64, active_only: bool) -> Result<Vec<Subscription>> {
        let mut query = paging(skip, limit);
        query.push(("active_only", active_only.to_string()));
        self.get(&["subscriptions"], &query).await
    }

    pub async fn get_client_subscriptions(&self, client_id: &str, active_only: bool) -> Result<Vec<Subscription>> {
        self.get(
            &["subscriptions", "by-client", client_id],
            &[("active_only", active_only.to_string())],
        )
        .await
    }

    pub async fn get_topic_subscriptions(&self, topic_id: i64, active_only: bool) -> Result<Vec<Subscription>> {
        self.get(
            &["subscriptions", "by-topic", &topic_id.to_string()],
            &[("active_only", active_only.to_string())],
        )
        .await
    }

    pub async fn update_subscription_status(&self, subscription_id: i64, active: bool) -> Result<Subscription> {
        self.send_json(
            Method::PATCH,
            &["subscriptions", &subscription_id.to_string()],
            &ActiveUpdate { active },
        )
        .await
    }

    pub async fn delete_subscription(&self, subscription_id: i64) -> Result<()> {
        self.delete(&["subscriptions", &subscription_id.to_string()]).await
    }

    // Messages

    pub async fn get_messages(&self, skip: i64, limit: i64) -> Result<Vec<MessageLog>> {
        self.get(&["messages"], &paging(skip, limit)).await
    }

    pub async fn get_client_messages(&self, client_id: &str, skip: i64, limit: i64) -> Result<Vec<MessageLog>> {
        self.get(&["messages", "by-client", client_id], &paging(skip, limit))
            .await
    }

    pub async fn get_topic_messages(&self, topic_id: i64, skip: i64, limit: i64) -> Result<Vec<MessageLog>> {
        self.get(
            &["messages", "by-topic", &topic_id.to_string()],
            &paging(skip, limit),
        )
        .await
    }

    pub async fn delete_message(&self, message_id: i64) -> Result<()> {
        self.delete(&["messages", &message_id.to_string()]).await
    }

    // Connection events

    pub async fn get_events(
        &self,
        skip: i64,
        limit: i64,
        event_type: Option<EventType>,
    ) -> Result<Vec<ConnectionEvent>> {
        let mut query = paging(skip, limit);
        if let Some(event_type) = event_type {
            query.push(("event_type", event_type.to_string()));
        }
        self.get(&["events"], &query).await
    }

    pub async fn get_client_events(
        &self,
        client_id: &str,
        skip: i64,
        limit: i64,
        event_type: Option<EventType>,
    ) -> Result<Vec<ConnectionEvent>> {
        let mut query = paging(skip, limit);
        if let Some(event_type) = event_type {
            query.push(("event_type", event_type.to_string()));
        }
        self.get(&["events", "by-client", client_id], &query).await
    }

    pub async fn get_event_client(&self, event_id: i64) -> Result<Client> {
        self.get(&["events", &event_id.to_string(), "client"], &[]).await
    }

    pub async fn get_all_client_events(&self, client_id: &str) -> Result<Vec<ConnectionEvent>> {
        self.get(&["events", client_id, "all-events"], &[]).await
    }

    pub async fn delete_event(&self, event_id: i64) -> Result<()> {
        self.delete(&["events", &event_id.to_string()]).await
    }
}

fn paging(skip: i64, limit: i64) -> Vec<(&'static str, String)> {
    vec![("skip", skip.to_string()), ("limit", limit.to_string())]
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    if response.status().is_success() {
        return Ok(response.json::<T>().await?);
    }
    Err(error_from(response).await)
}

/// Maps a failed response to a `ClientError`, keeping the server's `detail`.
async fn error_from(response: Response) -> ClientError {
    let status = response.status();
    let text = match response.text().await {
        Ok(text) => text,
        Err(e) => return ClientError::Http(e),
    };
    let detail = serde_json::from_str::<ErrorDetail>(&text)
        .map(|body| body.detail)
        .unwrap_or(text);
    warn!(status = status.as_u16(), %detail, "API request failed");

    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized(detail),
        StatusCode::NOT_FOUND => ClientError::NotFound(detail),
        other => ClientError::Status {
            code: other.as_u16(),
            detail,
        },
    }
}

/// Formats a stored timestamp as `YYYY-MM-DD HH:MM:SS`, or `N/A` when absent.
pub fn display_timestamp(timestamp: Option<&str>) -> String {
    let Some(raw) = timestamp.filter(|t| !t.is_empty()) else {
        return "N/A".to_string();
    };
    match (raw.get(..10), raw.get(10..11), raw.get(11..19)) {
        (Some(date), Some("T" | " "), Some(time)) => format!("{} {}", date, time),
        _ => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ApiSettings {
        ApiSettings {
            host: "localhost".to_string(),
            port: 8000,
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }

    #[test]
    fn base_url_from_host_and_port() {
        assert_eq!(settings().base_url(), "http://localhost:8000");
    }

    #[test]
    fn url_segments_are_encoded_individually() {
        let client = ApiClient::new(&settings()).unwrap();
        assert_eq!(
            client.url(&["clients", "sensor/1"]).unwrap().as_str(),
            "http://localhost:8000/clients/sensor%2F1"
        );
        assert_eq!(
            client.url(&["events", "c1", "all-events"]).unwrap().as_str(),
            "http://localhost:8000/events/c1/all-events"
        );
    }

    #[test]
    fn invalid_host_is_rejected() {
        let mut bad = settings();
        bad.host = "not a host".to_string();
        assert!(matches!(ApiClient::new(&bad), Err(ClientError::InvalidUrl(_))));
    }

    #[test]
    fn session_token_expires() {
        let now = Instant::now();
        let session = Session {
            token: Some("abc".to_string()),
            expires_at: Some(now + Duration::from_secs(60)),
        };
        assert_eq!(session.valid_token(now), Some("abc"));
        assert_eq!(session.valid_token(now + Duration::from_secs(61)), None);
        assert_eq!(Session::default().valid_token(now), None);
    }

    #[test]
    fn timestamps_display_to_the_second() {
        assert_eq!(
            display_timestamp(Some("2024-03-05T14:07:09.123456Z")),
            "2024-03-05 14:07:09"
        );
        assert_eq!(display_timestamp(Some("2024-03-05 14:07:09")), "2024-03-05 14:07:09");
        assert_eq!(display_timestamp(None), "N/A");
        assert_eq!(display_timestamp(Some("")), "N/A");
        assert_eq!(display_timestamp(Some("yesterday")), "yesterday");
    }
}
