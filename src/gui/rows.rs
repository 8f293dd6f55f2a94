use super::table::{optional, timestamp, yes_no, Row};
use crate::models::{Client, ConnectionEvent, MessageLog, Subscription, Topic};

impl Row for Client {
    type Key = String;

    fn key(&self) -> String {
        self.client_id.clone()
    }

    fn columns() -> &'static [&'static str] {
        &["Client ID", "Active", "Last IP", "Last Port", "Last Connected", "Connections"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.client_id.clone(),
            yes_no(self.active),
            optional(&self.last_ip),
            optional(&self.last_port),
            timestamp(&self.last_connected),
            self.connection_count.to_string(),
        ]
    }
}

impl Row for Topic {
    type Key = i64;

    fn key(&self) -> i64 {
        self.id
    }

    fn columns() -> &'static [&'static str] {
        &["ID", "Name", "Owner", "Created"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            self.owner_client_id.clone(),
            timestamp(&self.created_at),
        ]
    }
}

impl Row for Subscription {
    type Key = i64;

    fn key(&self) -> i64 {
        self.id
    }

    fn columns() -> &'static [&'static str] {
        &["ID", "Client", "Topic", "Subscribed", "Active"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.client_id.clone(),
            topic_label(self.topic_name.as_deref(), self.topic_id),
            timestamp(&self.subscribed_at),
            yes_no(self.active),
        ]
    }
}

impl Row for MessageLog {
    type Key = i64;

    fn key(&self) -> i64 {
        self.id
    }

    fn columns() -> &'static [&'static str] {
        &["ID", "Publisher", "Topic", "Size", "Preview", "Published"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.publisher_client_id.clone(),
            topic_label(self.topic_name.as_deref(), self.topic_id),
            format!("{} B", self.payload_size),
            optional(&self.payload_preview),
            timestamp(&self.published_at),
        ]
    }
}

impl Row for ConnectionEvent {
    type Key = i64;

    fn key(&self) -> i64 {
        self.id
    }

    fn columns() -> &'static [&'static str] {
        &["ID", "Client", "Type", "IP", "Port", "Time"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.client_id.clone(),
            self.event_type.to_string(),
            optional(&self.ip_address),
            optional(&self.port),
            timestamp(&self.timestamp),
        ]
    }
}

/// Topic name when the API joined it in, otherwise the numeric id.
pub fn topic_label(name: Option<&str>, id: i64) -> String {
    match name {
        Some(name) => name.to_string(),
        None => format!("#{}", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventType;

    #[test]
    fn event_cells_follow_columns() {
        let event = ConnectionEvent {
            id: 3,
            client_id: "sensor-1".to_string(),
            event_type: EventType::Disconnect,
            ip_address: None,
            port: Some(51000),
            timestamp: Some("2024-01-02T03:04:05.000000Z".to_string()),
        };
        let cells = event.cells();
        assert_eq!(cells.len(), ConnectionEvent::columns().len());
        assert_eq!(cells[2], "DISCONNECT");
        assert_eq!(cells[3], "N/A");
        assert_eq!(cells[5], "2024-01-02 03:04:05");
    }

    #[test]
    fn topic_label_falls_back_to_id() {
        assert_eq!(topic_label(Some("home/temp"), 4), "home/temp");
        assert_eq!(topic_label(None, 4), "#4");
    }
}
