use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, Ui};
use time::macros::format_description;
use time::OffsetDateTime;

use super::related::Related;
use super::table::{timestamp, Row};
use super::task::{Backend, Pending};
use super::Route;
use crate::api_client::ClientError;
use crate::db::Page;
use crate::models::ConnectionEvent;

const REFRESH_INTERVAL: Duration = Duration::from_secs(30);
const RECENT_EVENTS: i64 = 10;

/// Counts are taken from one maximal page.
#[derive(Debug, Clone, Default)]
pub struct Summary {
    pub clients: usize,
    pub topics: usize,
    pub messages: usize,
    pub active_subscriptions: usize,
    pub recent_events: Vec<ConnectionEvent>,
}

/// Renders a count, marking it as a lower bound when the page was full.
pub fn count_label(count: usize) -> String {
    if count as i64 >= Page::MAX_LIMIT {
        format!("{}+", count)
    } else {
        count.to_string()
    }
}

#[derive(Default)]
pub struct DashboardView {
    summary: Option<Summary>,
    pending: Option<Pending<Result<Summary, ClientError>>>,
    last_request: Option<Instant>,
    updated_at: Option<String>,
    error: Option<String>,
    active: bool,
}

impl DashboardView {
    pub fn enter(&mut self) {
        self.active = true;
        self.last_request = None;
    }

    pub fn leave(&mut self) {
        self.active = false;
    }

    fn due(&self, now: Instant) -> bool {
        self.active
            && self.pending.is_none()
            && self
                .last_request
                .map_or(true, |at| now.duration_since(at) >= REFRESH_INTERVAL)
    }

    fn refresh(&mut self, ctx: &egui::Context, backend: &Backend) {
        self.last_request = Some(Instant::now());
        self.pending = Some(backend.spawn(ctx, |api| async move {
            let max = Page::MAX_LIMIT;
            Ok::<_, ClientError>(Summary {
                clients: api.get_clients(0, max).await?.len(),
                topics: api.get_topics(0, max).await?.len(),
                messages: api.get_messages(0, max).await?.len(),
                active_subscriptions: api.get_subscriptions(0, max, true).await?.len(),
                recent_events: api.get_events(0, RECENT_EVENTS, None).await?,
            })
        }));
    }

    fn poll(&mut self) {
        let Some(outcome) = self.pending.as_mut().and_then(|p| p.poll()) else {
            return;
        };
        self.pending = None;
        match outcome {
            Ok(Ok(summary)) => {
                self.summary = Some(summary);
                self.error = None;
                let now = OffsetDateTime::now_utc();
                self.updated_at = now
                    .format(format_description!("[hour]:[minute]:[second] UTC"))
                    .ok();
            }
            Ok(Err(e)) => self.error = Some(format!("Error loading dashboard data: {}", e)),
            Err(lost) => self.error = Some(lost.to_string()),
        }
    }

    pub fn show(&mut self, ui: &mut Ui, backend: &Backend) -> Option<Route> {
        let ctx = ui.ctx().clone();
        self.poll();
        if self.due(Instant::now()) {
            self.refresh(&ctx, backend);
        }

        let mut route = None;
        ui.horizontal(|ui| {
            ui.heading("TinyMQ Monitor Dashboard");
            if ui.add_enabled(self.pending.is_none(), egui::Button::new("Refresh")).clicked() {
                self.last_request = None;
            }
            if self.pending.is_some() {
                ui.spinner();
            }
        });
        ui.label(format!(
            "Last updated: {}",
            self.updated_at.as_deref().unwrap_or("never")
        ));
        if let Some(error) = &self.error {
            ui.colored_label(Color32::LIGHT_RED, error);
        }
        ui.separator();

        let Some(summary) = &self.summary else {
            ui.label("Loading...");
            ctx.request_repaint_after(REFRESH_INTERVAL);
            return None;
        };

        ui.horizontal(|ui| {
            stat(ui, "Clients", summary.clients, &mut route, Route::Clients);
            stat(ui, "Topics", summary.topics, &mut route, Route::Topics);
            stat(ui, "Messages", summary.messages, &mut route, Route::Messages);
            stat(
                ui,
                "Active Subscriptions",
                summary.active_subscriptions,
                &mut route,
                Route::Subscriptions,
            );
        });
        ui.separator();

        ui.horizontal(|ui| {
            ui.strong("Recent Connection Events");
            if ui.button("View All").clicked() {
                route = Some(Route::Events);
            }
        });
        egui::Grid::new("recent-events").striped(true).show(ui, |ui| {
            for column in ConnectionEvent::columns() {
                ui.strong(*column);
            }
            ui.end_row();
            for event in &summary.recent_events {
                if ui.link(event.id.to_string()).clicked() {
                    route = Some(Route::Related(Related::Client(event.client_id.clone())));
                }
                ui.label(event.client_id.as_str());
                ui.label(event.event_type.as_str());
                ui.label(event.ip_address.as_deref().unwrap_or("N/A"));
                ui.label(event.port.map_or_else(|| "N/A".to_string(), |p| p.to_string()));
                ui.label(timestamp(&event.timestamp));
                ui.end_row();
            }
        });

        ctx.request_repaint_after(REFRESH_INTERVAL);
        route
    }
}

fn stat(ui: &mut Ui, label: &str, count: usize, route: &mut Option<Route>, target: Route) {
    ui.group(|ui| {
        ui.vertical(|ui| {
            ui.label(label);
            ui.heading(count_label(count));
            if ui.small_button("Open").clicked() {
                *route = Some(target);
            }
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_pages_are_shown_as_lower_bounds() {
        assert_eq!(count_label(0), "0");
        assert_eq!(count_label(999), "999");
        assert_eq!(count_label(1000), "1000+");
    }

    #[test]
    fn refresh_waits_for_interval() {
        let mut view = DashboardView::default();
        let now = Instant::now();
        assert!(!view.due(now));
        view.enter();
        assert!(view.due(now));
        view.last_request = Some(now);
        assert!(!view.due(now + Duration::from_secs(5)));
        assert!(view.due(now + REFRESH_INTERVAL));
    }
}
