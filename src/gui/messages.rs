use std::time::Instant;

use eframe::egui::{self, Ui};

use super::related::Related;
use super::rows::topic_label;
use super::table::{detail_grid, optional, timestamp, Table, POLL_INTERVAL};
use super::task::Backend;
use super::widgets::{ActionSlot, Confirm};
use super::Route;
use crate::models::MessageLog;

pub struct MessagesView {
    table: Table<MessageLog>,
    action: ActionSlot,
    confirm: Confirm<i64>,
}

impl Default for MessagesView {
    fn default() -> Self {
        Self {
            table: Table::default(),
            action: ActionSlot::default(),
            confirm: Confirm::new("confirm-delete-message"),
        }
    }
}

impl MessagesView {
    pub fn enter(&mut self) {
        self.table.start_polling();
    }

    pub fn leave(&mut self) {
        self.table.stop_polling();
    }

    fn refresh(&mut self, ctx: &egui::Context, backend: &Backend) {
        let (skip, limit) = (self.table.pager.skip(), self.table.pager.limit());
        self.table
            .load(backend.spawn(ctx, move |api| async move { api.get_messages(skip, limit).await }));
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
            ui.heading("Message History");
            if ui.button("Refresh").clicked() {
                self.table.invalidate();
            }
        });
        self.table.show(ui, "messages-table");
        self.table.show_pager(ui);
        ui.separator();

        let mut route = None;
        match self.table.selected().cloned() {
            Some(message) => {
                ui.strong("Message Details");
                detail_grid(
                    ui,
                    "message-details",
                    &[
                        ("ID", message.id.to_string()),
                        ("Publisher", message.publisher_client_id.clone()),
                        ("Topic", topic_label(message.topic_name.as_deref(), message.topic_id)),
                        ("Size", format!("{} bytes", message.payload_size)),
                        ("Published", timestamp(&message.published_at)),
                    ],
                );
                ui.label("Preview:");
                let mut preview = optional(&message.payload_preview);
                ui.add(egui::TextEdit::multiline(&mut preview).interactive(false).desired_rows(3));

                ui.horizontal(|ui| {
                    if ui.button("View Publisher").clicked() {
                        route = Some(Route::Related(Related::Client(message.publisher_client_id.clone())));
                    }
                    if ui.button("View Topic").clicked() {
                        route = Some(Route::Related(Related::Topic(message.topic_id)));
                    }
                    if ui
                        .add_enabled(!self.action.busy(), egui::Button::new("Delete"))
                        .clicked()
                    {
                        self.confirm
                            .ask(format!("Delete message {}?", message.id), message.id);
                    }
                });
            }
            None => {
                ui.label("Select a message to see its details.");
            }
        }
        self.action.show(ui);

        if let Some(id) = self.confirm.show(&ctx) {
            self.table.clear_selection();
            self.action.start(backend.spawn(&ctx, move |api| async move {
                api.delete_message(id)
                    .await
                    .map(|_| format!("Message {} deleted", id))
            }));
        }

        ctx.request_repaint_after(POLL_INTERVAL);
        route
    }
}
