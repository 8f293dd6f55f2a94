use std::time::Instant;

use eframe::egui::{self, Ui};

use super::related::Related;
use super::table::{detail_grid, optional, timestamp, yes_no, Table, POLL_INTERVAL};
use super::task::Backend;
use super::widgets::{ActionSlot, Confirm};
use super::Route;
use crate::models::Client;

pub struct ClientsView {
    table: Table<Client>,
    action: ActionSlot,
    confirm: Confirm<String>,
}

impl Default for ClientsView {
    fn default() -> Self {
        Self {
            table: Table::default(),
            action: ActionSlot::default(),
            confirm: Confirm::new("confirm-delete-client"),
        }
    }
}

impl ClientsView {
    pub fn enter(&mut self) {
        self.table.start_polling();
    }

    pub fn leave(&mut self) {
        self.table.stop_polling();
    }

    fn refresh(&mut self, ctx: &egui::Context, backend: &Backend) {
        let (skip, limit) = (self.table.pager.skip(), self.table.pager.limit());
        self.table
            .load(backend.spawn(ctx, move |api| async move { api.get_clients(skip, limit).await }));
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
            ui.heading("Connected Clients");
            if ui.button("Refresh").clicked() {
                self.table.invalidate();
            }
        });
        self.table.show(ui, "clients-table");
        self.table.show_pager(ui);
        ui.separator();

        let mut route = None;
        match self.table.selected().cloned() {
            Some(client) => {
                ui.strong("Client Details");
                detail_grid(
                    ui,
                    "client-details",
                    &[
                        ("Client ID", client.client_id.clone()),
                        ("Last IP", optional(&client.last_ip)),
                        ("Last Port", optional(&client.last_port)),
                        ("Last Connected", timestamp(&client.last_connected)),
                        ("Connection Count", client.connection_count.to_string()),
                        ("Active", yes_no(client.active)),
                    ],
                );

                ui.horizontal(|ui| {
                    let id = &client.client_id;
                    if ui.button("View Topics").clicked() {
                        route = Some(Route::Related(Related::ClientTopics(id.clone())));
                    }
                    if ui.button("View Subscriptions").clicked() {
                        route = Some(Route::Related(Related::ClientSubscriptions(id.clone())));
                    }
                    if ui.button("View Messages").clicked() {
                        route = Some(Route::Related(Related::ClientMessages(id.clone())));
                    }
                    if ui.button("View Events").clicked() {
                        route = Some(Route::Related(Related::ClientEvents(id.clone())));
                    }

                    let idle = !self.action.busy();
                    if ui
                        .add_enabled(idle && client.active, egui::Button::new("Disconnect"))
                        .clicked()
                    {
                        let client_id = id.clone();
                        self.action.start(backend.spawn(&ctx, move |api| async move {
                            api.update_client_status(&client_id, false)
                                .await
                                .map(|_| format!("Client '{}' marked as disconnected", client_id))
                        }));
                    }
                    if ui.add_enabled(idle, egui::Button::new("Remove Client")).clicked() {
                        self.confirm.ask(
                            format!(
                                "Delete client '{}'? Its topics, subscriptions, messages and events go with it.",
                                id
                            ),
                            id.clone(),
                        );
                    }
                });
            }
            None => {
                ui.label("Select a client to see its details.");
            }
        }
        self.action.show(ui);

        if let Some(client_id) = self.confirm.show(&ctx) {
            self.table.clear_selection();
            self.action.start(backend.spawn(&ctx, move |api| async move {
                api.delete_client(&client_id)
                    .await
                    .map(|_| format!("Client '{}' deleted", client_id))
            }));
        }

        ctx.request_repaint_after(POLL_INTERVAL);
        route
    }
}
