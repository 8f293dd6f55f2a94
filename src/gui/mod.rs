//! Desktop monitor for the TinyMQ admin API.
//!
//! Rendering happens on the eframe thread only. Requests run as one-shot
//! tasks on a tokio runtime (see [`task`]) and views collect their results
//! at the start of each frame.

mod clients;
mod dashboard;
mod events;
mod login;
mod messages;
mod pager;
mod related;
mod rows;
mod settings;
mod subscriptions;
mod table;
mod task;
mod topics;
mod widgets;

use std::sync::Arc;

use eframe::egui;
use tokio::runtime::Handle;
use tracing::info;

use crate::api_client::ApiClient;
use clients::ClientsView;
use dashboard::DashboardView;
use events::EventsView;
use login::LoginView;
use messages::MessagesView;
use related::{Related, RelatedView};
use settings::SettingsView;
use subscriptions::SubscriptionsView;
use task::Backend;
use topics::TopicsView;
use widgets::Confirm;

const MAX_HISTORY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Dashboard,
    Clients,
    Topics,
    Subscriptions,
    Messages,
    Events,
    Settings,
    Related(Related),
}

const MAIN_ROUTES: [(&str, Route); 7] = [
    ("Dashboard", Route::Dashboard),
    ("Clients", Route::Clients),
    ("Topics", Route::Topics),
    ("Subscriptions", Route::Subscriptions),
    ("Messages", Route::Messages),
    ("Events", Route::Events),
    ("Settings", Route::Settings),
];

/// Everything that lives between login and logout.
struct Session {
    backend: Backend,
    route: Route,
    history: Vec<Route>,
    dashboard: DashboardView,
    clients: ClientsView,
    topics: TopicsView,
    subscriptions: SubscriptionsView,
    messages: MessagesView,
    events: EventsView,
    settings: SettingsView,
    related: Option<RelatedView>,
    confirm_logout: Confirm<()>,
}

impl Session {
    fn new(backend: Backend) -> Self {
        let mut session = Self {
            backend,
            route: Route::Dashboard,
            history: Vec::new(),
            dashboard: DashboardView::default(),
            clients: ClientsView::default(),
            topics: TopicsView::default(),
            subscriptions: SubscriptionsView::default(),
            messages: MessagesView::default(),
            events: EventsView::default(),
            settings: SettingsView::default(),
            related: None,
            confirm_logout: Confirm::new("confirm-logout"),
        };
        session.enter_current();
        session
    }

    fn enter_current(&mut self) {
        match &self.route {
            Route::Dashboard => self.dashboard.enter(),
            Route::Clients => self.clients.enter(),
            Route::Topics => self.topics.enter(),
            Route::Subscriptions => self.subscriptions.enter(),
            Route::Messages => self.messages.enter(),
            Route::Events => self.events.enter(),
            Route::Settings => self.settings.enter(),
            Route::Related(query) => self.related = Some(RelatedView::new(query.clone())),
        }
    }

    /// Stops polling of the view being left.
    fn leave_current(&mut self) {
        match &self.route {
            Route::Dashboard => self.dashboard.leave(),
            Route::Clients => self.clients.leave(),
            Route::Topics => self.topics.leave(),
            Route::Subscriptions => self.subscriptions.leave(),
            Route::Messages => self.messages.leave(),
            Route::Events => self.events.leave(),
            Route::Settings => {}
            Route::Related(_) => {
                if let Some(view) = self.related.as_mut() {
                    view.leave();
                }
                self.related = None;
            }
        }
    }

    fn navigate(&mut self, to: Route) {
        if to == self.route {
            return;
        }
        self.leave_current();
        let from = std::mem::replace(&mut self.route, to);
        self.history.push(from);
        if self.history.len() > MAX_HISTORY {
            self.history.remove(0);
        }
        self.enter_current();
    }

    fn back(&mut self) {
        if let Some(previous) = self.history.pop() {
            self.leave_current();
            self.route = previous;
            self.enter_current();
        }
    }

    /// Draws one frame. Returns true once the operator confirmed logout.
    fn show(&mut self, ctx: &egui::Context) -> bool {
        let mut target = None;
        let mut back = false;

        egui::TopBottomPanel::top("navigation").show(ctx, |ui| {
            ui.horizontal(|ui| {
                for (label, route) in MAIN_ROUTES {
                    let current = self.route == route;
                    if ui.selectable_label(current, label).clicked() {
                        target = Some(route);
                    }
                }
                ui.separator();
                if ui
                    .add_enabled(!self.history.is_empty(), egui::Button::new("Back"))
                    .clicked()
                {
                    back = true;
                }
                if ui.button("Logout").clicked() {
                    self.confirm_logout.ask("Are you sure you want to logout?", ());
                }
                ui.separator();
                let api = self.backend.api();
                ui.label(format!("{} @ {}", api.username(), api.base_url()));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            let backend = &self.backend;
            let requested = match &self.route {
                Route::Dashboard => self.dashboard.show(ui, backend),
                Route::Clients => self.clients.show(ui, backend),
                Route::Topics => self.topics.show(ui, backend),
                Route::Subscriptions => self.subscriptions.show(ui, backend),
                Route::Messages => self.messages.show(ui, backend),
                Route::Events => self.events.show(ui, backend),
                Route::Settings => {
                    self.settings.show(ui, backend);
                    None
                }
                Route::Related(_) => match self.related.as_mut() {
                    Some(view) => view.show(ui, backend),
                    None => None,
                },
            };
            if requested.is_some() {
                target = requested;
            }
        });

        if self.confirm_logout.show(ctx).is_some() {
            self.leave_current();
            return true;
        }
        if back {
            self.back();
        } else if let Some(route) = target {
            self.navigate(route);
        }
        false
    }
}

pub struct MonitorApp {
    runtime: Handle,
    login: LoginView,
    session: Option<Box<Session>>,
}

impl MonitorApp {
    pub fn new(runtime: Handle, host: String, port: u16, username: String) -> Self {
        Self {
            runtime,
            login: LoginView::new(host, port, username),
            session: None,
        }
    }

    fn start_session(&mut self, api: Arc<ApiClient>) {
        info!(username = %api.username(), url = %api.base_url(), "Logged in");
        let backend = Backend::new(api, self.runtime.clone());
        self.session = Some(Box::new(Session::new(backend)));
    }
}

impl eframe::App for MonitorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(session) = self.session.as_mut() {
            if session.show(ctx) {
                info!("Logged out");
                self.session = None;
            }
            return;
        }

        let mut logged_in = None;
        egui::CentralPanel::default().show(ctx, |ui| {
            logged_in = self.login.show(ui, &self.runtime);
        });
        if let Some(api) = logged_in {
            self.start_session(api);
        }
    }
}

/// Opens the monitor window and blocks until it is closed.
pub fn run(runtime: Handle, host: String, port: u16, username: String) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("TinyMQ Monitor")
            .with_inner_size([1100.0, 720.0]),
        ..Default::default()
    };
    eframe::run_native(
        "TinyMQ Monitor",
        options,
        Box::new(move |_cc| Ok(Box::new(MonitorApp::new(runtime, host, port, username)))),
    )
}
