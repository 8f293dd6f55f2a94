use std::sync::Arc;

use eframe::egui::{self, Color32, Ui};
use tokio::runtime::Handle;

use super::task::{spawn, Pending};
use crate::api_client::{ApiClient, ApiSettings, ClientError};

pub struct LoginView {
    pub host: String,
    pub port: String,
    pub username: String,
    pub password: String,
    error: Option<String>,
    pending: Option<Pending<Result<ApiClient, ClientError>>>,
}

impl LoginView {
    pub fn new(host: String, port: u16, username: String) -> Self {
        Self {
            host,
            port: port.to_string(),
            username,
            password: String::new(),
            error: None,
            pending: None,
        }
    }

    /// Checks the form and turns it into connection settings.
    pub fn settings(&self) -> Result<ApiSettings, String> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err("Host is required".to_string());
        }
        let port = match self.port.trim().parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => return Err("Port must be a number between 1 and 65535".to_string()),
        };
        if self.username.trim().is_empty() {
            return Err("Username is required".to_string());
        }
        if self.password.is_empty() {
            return Err("Password is required".to_string());
        }
        Ok(ApiSettings {
            host: host.to_string(),
            port,
            username: self.username.trim().to_string(),
            password: self.password.clone(),
        })
    }

    fn submit(&mut self, ctx: &egui::Context, runtime: &Handle) {
        let settings = match self.settings() {
            Ok(settings) => settings,
            Err(message) => {
                self.error = Some(message);
                return;
            }
        };
        let client = match ApiClient::new(&settings) {
            Ok(client) => client,
            Err(e) => {
                self.error = Some(e.to_string());
                return;
            }
        };
        self.error = None;
        self.pending = Some(spawn(runtime, ctx, async move {
            client.login().await?;
            Ok::<_, ClientError>(client)
        }));
    }

    /// Returns the logged-in client once the background login succeeds.
    pub fn show(&mut self, ui: &mut Ui, runtime: &Handle) -> Option<Arc<ApiClient>> {
        let mut logged_in = None;
        if let Some(outcome) = self.pending.as_mut().and_then(|p| p.poll()) {
            self.pending = None;
            match outcome {
                Ok(Ok(client)) => {
                    self.password.clear();
                    logged_in = Some(Arc::new(client));
                }
                Ok(Err(ClientError::Unauthorized(_))) => {
                    self.error = Some("Login failed. Please check your credentials.".to_string());
                }
                Ok(Err(e)) => self.error = Some(format!("Could not reach the API: {}", e)),
                Err(lost) => self.error = Some(lost.to_string()),
            }
        }

        let busy = self.pending.is_some();
        ui.vertical_centered(|ui| {
            ui.add_space(40.0);
            ui.heading("TinyMQ Monitor");
            ui.label("Connect to your TinyMQ Broker API");
            ui.add_space(20.0);
        });

        let mut submit = false;
        ui.group(|ui| {
            egui::Grid::new("login-form").num_columns(2).show(ui, |ui| {
                ui.label("Host:");
                ui.text_edit_singleline(&mut self.host);
                ui.end_row();
                ui.label("Port:");
                ui.text_edit_singleline(&mut self.port);
                ui.end_row();
                ui.label("Username:");
                ui.text_edit_singleline(&mut self.username);
                ui.end_row();
                ui.label("Password:");
                let password = ui.add(egui::TextEdit::singleline(&mut self.password).password(true));
                if password.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    submit = true;
                }
                ui.end_row();
            });
        });

        ui.horizontal(|ui| {
            if ui.add_enabled(!busy, egui::Button::new("Login")).clicked() {
                submit = true;
            }
            if busy {
                ui.spinner();
                ui.label("Logging in...");
            }
        });
        if let Some(error) = &self.error {
            ui.colored_label(Color32::LIGHT_RED, error);
        }

        if submit && !busy {
            let ctx = ui.ctx().clone();
            self.submit(&ctx, runtime);
        }
        logged_in
    }
}
