use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// API operator account. The hash never leaves the db layer.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub created_at: Option<String>,
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub is_active: bool,
    pub created_at: Option<String>,
    pub last_login: Option<String>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_active: user.is_active,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub id: i64,
    pub client_id: String,
    pub last_connected: Option<String>,
    pub last_ip: Option<String>,
    pub last_port: Option<i64>,
    #[serde(default)]
    pub connection_count: i64,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    pub id: i64,
    pub name: String,
    pub owner_client_id: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: i64,
    pub client_id: String,
    pub topic_id: i64,
    pub topic_name: Option<String>,
    pub subscribed_at: Option<String>,
    pub active: bool,
}

/// Metadata of a published message; the payload itself is not kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageLog {
    pub id: i64,
    pub publisher_client_id: String,
    pub topic_id: i64,
    pub topic_name: Option<String>,
    pub payload_size: i64,
    pub payload_preview: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionEvent {
    pub id: i64,
    pub client_id: String,
    pub event_type: EventType,
    pub ip_address: Option<String>,
    pub port: Option<i64>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Connect,
    Disconnect,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Connect => "CONNECT",
            EventType::Disconnect => "DISCONNECT",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(EventType::Connect),
            "DISCONNECT" => Ok(EventType::Disconnect),
            other => Err(format!("Unknown event type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminRequest {
    pub id: i64,
    pub topic_id: i64,
    pub requester_client_id: String,
    pub status: AdminRequestStatus,
    pub request_timestamp: Option<String>,
    pub response_timestamp: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AdminRequestStatus {
    Pending,
    Approved,
    Rejected,
    Revoked,
}

impl AdminRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminRequestStatus::Pending => "pending",
            AdminRequestStatus::Approved => "approved",
            AdminRequestStatus::Rejected => "rejected",
            AdminRequestStatus::Revoked => "revoked",
        }
    }

    /// Whether a request in this state may move to `next`.
    pub fn can_transition_to(&self, next: AdminRequestStatus) -> bool {
        matches!(
            (self, next),
            (AdminRequestStatus::Pending, AdminRequestStatus::Approved)
                | (AdminRequestStatus::Pending, AdminRequestStatus::Rejected)
                | (AdminRequestStatus::Approved, AdminRequestStatus::Revoked)
        )
    }
}

impl fmt::Display for AdminRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdminRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AdminRequestStatus::Pending),
            "approved" => Ok(AdminRequestStatus::Approved),
            "rejected" => Ok(AdminRequestStatus::Rejected),
            "revoked" => Ok(AdminRequestStatus::Revoked),
            other => Err(format!("Unknown admin request status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicAdmin {
    pub topic_id: i64,
    pub admin_client_id: String,
    pub granted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminSensorConfig {
    pub topic_id: i64,
    pub sensor_name: String,
    pub active: bool,
    pub set_by: Option<String>,
    pub updated_at: Option<String>,
    pub activable: bool,
}

// Request payloads

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordUpdate {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveUpdate {
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConnectionEvent {
    pub client_id: String,
    pub event_type: String,
    pub ip_address: Option<String>,
    pub port: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTopic {
    pub name: String,
    pub owner_client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubscription {
    pub client_id: String,
    pub topic_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub publisher_client_id: String,
    pub topic_id: i64,
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAdminRequest {
    pub topic_id: i64,
    pub requester_client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRequestUpdate {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfigUpdate {
    pub active: bool,
    #[serde(default)]
    pub activable: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_uses_uppercase_wire_names() {
        assert_eq!(serde_json::to_string(&EventType::Connect).unwrap(), "\"CONNECT\"");
        assert_eq!("DISCONNECT".parse::<EventType>(), Ok(EventType::Disconnect));
        assert!("connect".parse::<EventType>().is_err());
    }

    #[test]
    fn admin_request_transitions() {
        use AdminRequestStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Revoked));
        assert!(!Pending.can_transition_to(Revoked));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Revoked.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Approved));
    }
}
