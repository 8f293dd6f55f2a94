use std::time::Instant;

use eframe::egui::{self, Ui};

use super::related::Related;
use super::rows::topic_label;
use super::table::{detail_grid, timestamp, yes_no, Table, POLL_INTERVAL};
use super::task::Backend;
use super::widgets::{ActionSlot, Confirm};
use super::Route;
use crate::models::Subscription;

pub struct SubscriptionsView {
    table: Table<Subscription>,
    active_only: bool,
    action: ActionSlot,
    confirm: Confirm<i64>,
}

impl Default for SubscriptionsView {
    fn default() -> Self {
        Self {
            table: Table::default(),
            active_only: false,
            action: ActionSlot::default(),
            confirm: Confirm::new("confirm-delete-subscription"),
        }
    }
}

impl SubscriptionsView {
    pub fn enter(&mut self) {
        self.table.start_polling();
    }

    pub fn leave(&mut self) {
        self.table.stop_polling();
    }

    fn refresh(&mut self, ctx: &egui::Context, backend: &Backend) {
        let (skip, limit) = (self.table.pager.skip(), self.table.pager.limit());
        let active_only = self.active_only;
        self.table.load(backend.spawn(ctx, move |api| async move {
            api.get_subscriptions(skip, limit, active_only).await
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
            ui.heading("Subscriptions");
            if ui.checkbox(&mut self.active_only, "Active only").changed() {
                self.table.pager.reset();
                self.table.clear_selection();
                self.table.invalidate();
            }
            if ui.button("Refresh").clicked() {
                self.table.invalidate();
            }
        });
        self.table.show(ui, "subscriptions-table");
        self.table.show_pager(ui);
        ui.separator();

        let mut route = None;
        match self.table.selected().cloned() {
            Some(sub) => {
                ui.strong("Subscription Details");
                detail_grid(
                    ui,
                    "subscription-details",
                    &[
                        ("ID", sub.id.to_string()),
                        ("Client", sub.client_id.clone()),
                        ("Topic", topic_label(sub.topic_name.as_deref(), sub.topic_id)),
                        ("Subscribed", timestamp(&sub.subscribed_at)),
                        ("Active", yes_no(sub.active)),
                    ],
                );

                ui.horizontal(|ui| {
                    if ui.button("View Client").clicked() {
                        route = Some(Route::Related(Related::Client(sub.client_id.clone())));
                    }
                    if ui.button("View Topic").clicked() {
                        route = Some(Route::Related(Related::Topic(sub.topic_id)));
                    }

                    let idle = !self.action.busy();
                    let toggle = if sub.active { "Deactivate" } else { "Activate" };
                    if ui.add_enabled(idle, egui::Button::new(toggle)).clicked() {
                        let (id, active) = (sub.id, !sub.active);
                        self.action.start(backend.spawn(&ctx, move |api| async move {
                            api.update_subscription_status(id, active).await.map(|s| {
                                format!(
                                    "Subscription {} is now {}",
                                    s.id,
                                    if s.active { "active" } else { "inactive" }
                                )
                            })
                        }));
                    }
                    if ui.add_enabled(idle, egui::Button::new("Delete")).clicked() {
                        self.confirm
                            .ask(format!("Delete subscription {}?", sub.id), sub.id);
                    }
                });
            }
            None => {
                ui.label("Select a subscription to see its details.");
            }
        }
        self.action.show(ui);

        if let Some(id) = self.confirm.show(&ctx) {
            self.table.clear_selection();
            self.action.start(backend.spawn(&ctx, move |api| async move {
                api.delete_subscription(id)
                    .await
                    .map(|_| format!("Subscription {} deleted", id))
            }));
        }

        ctx.request_repaint_after(POLL_INTERVAL);
        route
    }
}
