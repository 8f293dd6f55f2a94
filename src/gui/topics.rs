use std::time::Instant;

use eframe::egui::{self, Ui};

use super::related::Related;
use super::table::{detail_grid, timestamp, Table, POLL_INTERVAL};
use super::task::Backend;
use super::widgets::{ActionSlot, Confirm};
use super::Route;
use crate::models::Topic;

pub struct TopicsView {
    table: Table<Topic>,
    action: ActionSlot,
    confirm: Confirm<i64>,
}

impl Default for TopicsView {
    fn default() -> Self {
        Self {
            table: Table::default(),
            action: ActionSlot::default(),
            confirm: Confirm::new("confirm-delete-topic"),
        }
    }
}

impl TopicsView {
    pub fn enter(&mut self) {
        self.table.start_polling();
    }

    pub fn leave(&mut self) {
        self.table.stop_polling();
    }

    fn refresh(&mut self, ctx: &egui::Context, backend: &Backend) {
        let (skip, limit) = (self.table.pager.skip(), self.table.pager.limit());
        self.table
            .load(backend.spawn(ctx, move |api| async move { api.get_topics(skip, limit).await }));
    }

    pub fn show(&mut self, ui: &mut Ui, backend: &Backend) -> Option<Route> {
        let ctx = ui.ctx().clone();
        self.table.poll();
        if self.action.poll() {
            self.table.invalidate();
        }
        if self.table.due(Instant::now()) {
            self.refresh(&ctx, backend);
        }

        ui.horizontal(|ui| {
            ui.heading("Topics");
            if ui.button("Refresh").clicked() {
                self.table.invalidate();
            }
        });
        self.table.show(ui, "topics-table");
        self.table.show_pager(ui);
        ui.separator();

        let mut route = None;
        match self.table.selected().cloned() {
            Some(topic) => {
                ui.strong("Topic Details");
                detail_grid(
                    ui,
                    "topic-details",
                    &[
                        ("ID", topic.id.to_string()),
                        ("Name", topic.name.clone()),
                        ("Owner", topic.owner_client_id.clone()),
                        ("Created", timestamp(&topic.created_at)),
                    ],
                );

                ui.horizontal(|ui| {
                    if ui.button("View Subscriptions").clicked() {
                        route = Some(Route::Related(Related::TopicSubscriptions(topic.id)));
                    }
                    if ui.button("View Messages").clicked() {
                        route = Some(Route::Related(Related::TopicMessages(topic.id)));
                    }
                    if ui.button("View Owner").clicked() {
                        route = Some(Route::Related(Related::Client(topic.owner_client_id.clone())));
                    }
                    if ui
                        .add_enabled(!self.action.busy(), egui::Button::new("Delete Topic"))
                        .clicked()
                    {
                        self.confirm.ask(
                            format!("Delete topic '{}' with its subscriptions and messages?", topic.name),
                            topic.id,
                        );
                    }
                });
            }
            None => {
                ui.label("Select a topic to see its details.");
            }
        }
        self.action.show(ui);

        if let Some(topic_id) = self.confirm.show(&ctx) {
            self.table.clear_selection();
            self.action.start(backend.spawn(&ctx, move |api| async move {
                api.delete_topic(topic_id)
                    .await
                    .map(|_| format!("Topic {} deleted", topic_id))
            }));
        }

        ctx.request_repaint_after(POLL_INTERVAL);
        route
    }
}
