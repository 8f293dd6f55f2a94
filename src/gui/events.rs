use std::time::Instant;

use eframe::egui::{self, Ui};

use super::related::Related;
use super::table::{detail_grid, optional, timestamp, Table, POLL_INTERVAL};
use super::task::Backend;
use super::widgets::{ActionSlot, Confirm};
use super::Route;
use crate::models::{ConnectionEvent, EventType};

pub struct EventsView {
    table: Table<ConnectionEvent>,
    filter: Option<EventType>,
    action: ActionSlot,
    confirm: Confirm<i64>,
}

impl Default for EventsView {
    fn default() -> Self {
        Self {
            table: Table::default(),
            filter: None,
            action: ActionSlot::default(),
            confirm: Confirm::new("confirm-delete-event"),
        }
    }
}

fn filter_label(filter: Option<EventType>) -> &'static str {
    filter.map_or("ALL", |t| t.as_str())
}

impl EventsView {
    pub fn enter(&mut self) {
        self.table.start_polling();
    }

    pub fn leave(&mut self) {
        self.table.stop_polling();
    }

    fn refresh(&mut self, ctx: &egui::Context, backend: &Backend) {
        let (skip, limit) = (self.table.pager.skip(), self.table.pager.limit());
        let filter = self.filter;
        self.table.load(backend.spawn(ctx, move |api| async move {
            api.get_events(skip, limit, filter).await
        }));
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
            ui.heading("Connection Events");
            let before = self.filter;
            egui::ComboBox::from_label("Type")
                .selected_text(filter_label(self.filter))
                .show_ui(ui, |ui| {
                    ui.selectable_value(&mut self.filter, None, "ALL");
                    ui.selectable_value(&mut self.filter, Some(EventType::Connect), "CONNECT");
                    ui.selectable_value(&mut self.filter, Some(EventType::Disconnect), "DISCONNECT");
                });
            if self.filter != before {
                self.table.pager.reset();
                self.table.clear_selection();
                self.table.invalidate();
            }
            if ui.button("Refresh").clicked() {
                self.table.invalidate();
            }
        });
        self.table.show(ui, "events-table");
        self.table.show_pager(ui);
        ui.separator();

        let mut route = None;
        match self.table.selected().cloned() {
            Some(event) => {
                ui.strong("Event Details");
                detail_grid(
                    ui,
                    "event-details",
                    &[
                        ("ID", event.id.to_string()),
                        ("Client", event.client_id.clone()),
                        ("Type", event.event_type.to_string()),
                        ("IP Address", optional(&event.ip_address)),
                        ("Port", optional(&event.port)),
                        ("Time", timestamp(&event.timestamp)),
                    ],
                );

                ui.horizontal(|ui| {
                    if ui.button("View Client").clicked() {
                        route = Some(Route::Related(Related::EventClient(event.id)));
                    }
                    if ui.button("All Events of Client").clicked() {
                        route = Some(Route::Related(Related::AllClientEvents(event.client_id.clone())));
                    }
                    if ui
                        .add_enabled(!self.action.busy(), egui::Button::new("Delete"))
                        .clicked()
                    {
                        self.confirm.ask(format!("Delete event {}?", event.id), event.id);
                    }
                });
            }
            None => {
                ui.label("Select an event to see its details.");
            }
        }
        self.action.show(ui);

        if let Some(id) = self.confirm.show(&ctx) {
            self.table.clear_selection();
            self.action.start(backend.spawn(&ctx, move |api| async move {
                api.delete_event(id).await.map(|_| format!("Event {} deleted", id))
            }));
        }

        ctx.request_repaint_after(POLL_INTERVAL);
        route
    }
}
