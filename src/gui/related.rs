//! Drill-down views: records related to one client, topic or event.

use std::time::Instant;

use eframe::egui::{self, Ui};

use super::table::{Row, Table, POLL_INTERVAL};
use super::task::Backend;
use super::Route;
use crate::models::{Client, ConnectionEvent, MessageLog, Subscription, Topic};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Related {
    ClientTopics(String),
    ClientSubscriptions(String),
    ClientMessages(String),
    ClientEvents(String),
    AllClientEvents(String),
    TopicSubscriptions(i64),
    TopicMessages(i64),
    Client(String),
    EventClient(i64),
    Topic(i64),
}

impl Related {
    pub fn title(&self) -> String {
        match self {
            Related::ClientTopics(id) => format!("Topics owned by '{}'", id),
            Related::ClientSubscriptions(id) => format!("Subscriptions of '{}'", id),
            Related::ClientMessages(id) => format!("Messages published by '{}'", id),
            Related::ClientEvents(id) => format!("Connection events of '{}'", id),
            Related::AllClientEvents(id) => format!("All connection events of '{}'", id),
            Related::TopicSubscriptions(id) => format!("Subscriptions to topic {}", id),
            Related::TopicMessages(id) => format!("Messages on topic {}", id),
            Related::Client(id) => format!("Client '{}'", id),
            Related::EventClient(id) => format!("Client of event {}", id),
            Related::Topic(id) => format!("Topic {}", id),
        }
    }

    /// Whether the endpoint behind this view takes skip/limit.
    pub fn paged(&self) -> bool {
        matches!(self, Related::ClientMessages(_) | Related::ClientEvents(_) | Related::TopicMessages(_))
    }
}

enum Rows {
    Clients(Table<Client>),
    Topics(Table<Topic>),
    Subscriptions(Table<Subscription>),
    Messages(Table<MessageLog>),
    Events(Table<ConnectionEvent>),
}

pub struct RelatedView {
    query: Related,
    rows: Rows,
}

impl RelatedView {
    pub fn new(query: Related) -> Self {
        let rows = match &query {
            Related::ClientTopics(_) | Related::Topic(_) => Rows::Topics(polling()),
            Related::ClientSubscriptions(_) | Related::TopicSubscriptions(_) => Rows::Subscriptions(polling()),
            Related::ClientMessages(_) | Related::TopicMessages(_) => Rows::Messages(polling()),
            Related::ClientEvents(_) | Related::AllClientEvents(_) => Rows::Events(polling()),
            Related::Client(_) | Related::EventClient(_) => Rows::Clients(polling()),
        };
        Self { query, rows }
    }

    pub fn leave(&mut self) {
        match &mut self.rows {
            Rows::Clients(t) => t.stop_polling(),
            Rows::Topics(t) => t.stop_polling(),
            Rows::Subscriptions(t) => t.stop_polling(),
            Rows::Messages(t) => t.stop_polling(),
            Rows::Events(t) => t.stop_polling(),
        }
    }

    fn refresh(&mut self, ctx: &egui::Context, backend: &Backend) {
        match (&self.query, &mut self.rows) {
            (Related::ClientTopics(id), Rows::Topics(t)) => {
                let id = id.clone();
                t.load(backend.spawn(ctx, move |api| async move { api.get_client_topics(&id).await }));
            }
            (Related::Topic(id), Rows::Topics(t)) => {
                let id = *id;
                t.load(backend.spawn(ctx, move |api| async move { api.get_topic(id).await.map(|topic| vec![topic]) }));
            }
            (Related::ClientSubscriptions(id), Rows::Subscriptions(t)) => {
                let id = id.clone();
                t.load(backend.spawn(ctx, move |api| async move {
                    api.get_client_subscriptions(&id, false).await
                }));
            }
            (Related::TopicSubscriptions(id), Rows::Subscriptions(t)) => {
                let id = *id;
                t.load(backend.spawn(ctx, move |api| async move {
                    api.get_topic_subscriptions(id, false).await
                }));
            }
            (Related::ClientMessages(id), Rows::Messages(t)) => {
                let (id, skip, limit) = (id.clone(), t.pager.skip(), t.pager.limit());
                t.load(backend.spawn(ctx, move |api| async move {
                    api.get_client_messages(&id, skip, limit).await
                }));
            }
            (Related::TopicMessages(id), Rows::Messages(t)) => {
                let (id, skip, limit) = (*id, t.pager.skip(), t.pager.limit());
                t.load(backend.spawn(ctx, move |api| async move {
                    api.get_topic_messages(id, skip, limit).await
                }));
            }
            (Related::ClientEvents(id), Rows::Events(t)) => {
                let (id, skip, limit) = (id.clone(), t.pager.skip(), t.pager.limit());
                t.load(backend.spawn(ctx, move |api| async move {
                    api.get_client_events(&id, skip, limit, None).await
                }));
            }
            (Related::AllClientEvents(id), Rows::Events(t)) => {
                let id = id.clone();
                t.load(backend.spawn(ctx, move |api| async move { api.get_all_client_events(&id).await }));
            }
            (Related::Client(id), Rows::Clients(t)) => {
                let id = id.clone();
                t.load(backend.spawn(ctx, move |api| async move { api.get_client(&id).await.map(|c| vec![c]) }));
            }
            (Related::EventClient(id), Rows::Clients(t)) => {
                let id = *id;
                t.load(backend.spawn(ctx, move |api| async move {
                    api.get_event_client(id).await.map(|c| vec![c])
                }));
            }
            _ => {}
        }
    }

    pub fn show(&mut self, ui: &mut Ui, backend: &Backend) -> Option<Route> {
        let ctx = ui.ctx().clone();
        let due = match &mut self.rows {
            Rows::Clients(t) => tick(t),
            Rows::Topics(t) => tick(t),
            Rows::Subscriptions(t) => tick(t),
            Rows::Messages(t) => tick(t),
            Rows::Events(t) => tick(t),
        };
        if due {
            self.refresh(&ctx, backend);
        }

        ui.heading(self.query.title());
        let paged = self.query.paged();
        match &mut self.rows {
            Rows::Clients(t) => show_rows(ui, t, paged),
            Rows::Topics(t) => show_rows(ui, t, paged),
            Rows::Subscriptions(t) => show_rows(ui, t, paged),
            Rows::Messages(t) => show_rows(ui, t, paged),
            Rows::Events(t) => show_rows(ui, t, paged),
        }

        let route = self.follow_up(ui);
        ctx.request_repaint_after(POLL_INTERVAL);
        route
    }

    /// Further drill-downs from the selected row.
    fn follow_up(&self, ui: &mut Ui) -> Option<Route> {
        let mut route = None;
        match &self.rows {
            Rows::Clients(t) => {
                if let Some(client) = t.selected() {
                    ui.horizontal(|ui| {
                        if ui.button("View Topics").clicked() {
                            route = Some(Related::ClientTopics(client.client_id.clone()));
                        }
                        if ui.button("View Events").clicked() {
                            route = Some(Related::ClientEvents(client.client_id.clone()));
                        }
                    });
                }
            }
            Rows::Topics(t) => {
                if let Some(topic) = t.selected() {
                    ui.horizontal(|ui| {
                        if ui.button("View Subscriptions").clicked() {
                            route = Some(Related::TopicSubscriptions(topic.id));
                        }
                        if ui.button("View Messages").clicked() {
                            route = Some(Related::TopicMessages(topic.id));
                        }
                    });
                }
            }
            Rows::Subscriptions(t) => {
                if let Some(sub) = t.selected() {
                    ui.horizontal(|ui| {
                        if ui.button("View Client").clicked() {
                            route = Some(Related::Client(sub.client_id.clone()));
                        }
                        if ui.button("View Topic").clicked() {
                            route = Some(Related::Topic(sub.topic_id));
                        }
                    });
                }
            }
            Rows::Messages(t) => {
                if let Some(message) = t.selected() {
                    ui.horizontal(|ui| {
                        if ui.button("View Publisher").clicked() {
                            route = Some(Related::Client(message.publisher_client_id.clone()));
                        }
                        if ui.button("View Topic").clicked() {
                            route = Some(Related::Topic(message.topic_id));
                        }
                    });
                }
            }
            Rows::Events(t) => {
                if let Some(event) = t.selected() {
                    if ui.button("View Client").clicked() {
                        route = Some(Related::EventClient(event.id));
                    }
                }
            }
        }
        route.map(Route::Related)
    }
}

fn polling<R: Row>() -> Table<R> {
    let mut table = Table::default();
    table.start_polling();
    table
}

fn tick<R: Row>(table: &mut Table<R>) -> bool {
    table.poll();
    table.due(Instant::now())
}

fn show_rows<R: Row>(ui: &mut Ui, table: &mut Table<R>, paged: bool) {
    table.show(ui, "related-table");
    if paged {
        table.show_pager(ui);
    } else if table.is_loading() {
        ui.spinner();
    }
    ui.separator();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_server_paged_queries_show_a_pager() {
        assert!(Related::ClientMessages("c".into()).paged());
        assert!(Related::TopicMessages(1).paged());
        assert!(!Related::AllClientEvents("c".into()).paged());
        assert!(!Related::ClientTopics("c".into()).paged());
    }

    #[test]
    fn titles_name_the_subject() {
        assert_eq!(Related::Topic(7).title(), "Topic 7");
        assert_eq!(Related::ClientEvents("s1".into()).title(), "Connection events of 's1'");
    }
}
