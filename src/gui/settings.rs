use eframe::egui::{self, Ui};

use super::table::{detail_grid, timestamp, yes_no};
use super::task::{Backend, Pending};
use super::widgets::ActionSlot;
use crate::api_client;
use crate::models::UserInfo;

pub const MIN_PASSWORD_LEN: usize = 4;

pub fn validate_new_password(password: &str, confirm: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password cannot be empty".to_string());
    }
    if password != confirm {
        return Err("Passwords do not match".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

fn account_fields(user: &UserInfo) -> Vec<(&'static str, String)> {
    vec![
        ("User ID", user.id.to_string()),
        ("Username", user.username.clone()),
        ("Active", yes_no(user.is_active)),
        ("Created", timestamp(&user.created_at)),
        ("Last Login", timestamp(&user.last_login)),
    ]
}

/// The signed-in operator as reported by `/auth/me`.
#[derive(Default)]
enum Account {
    #[default]
    Unknown,
    Loading(Pending<api_client::Result<UserInfo>>),
    Loaded(UserInfo),
    Failed(String),
}

#[derive(Default)]
pub struct SettingsView {
    account: Account,
    new_password: String,
    confirm_password: String,
    error: Option<String>,
    action: ActionSlot,
}

impl SettingsView {
    /// Refetches the account details on the next frame.
    pub fn enter(&mut self) {
        self.account = Account::Unknown;
    }

    fn poll_account(&mut self, ui: &Ui, backend: &Backend) {
        if let Account::Loading(pending) = &mut self.account {
            match pending.poll() {
                Some(Ok(Ok(user))) => self.account = Account::Loaded(user),
                Some(Ok(Err(e))) => self.account = Account::Failed(e.to_string()),
                Some(Err(lost)) => self.account = Account::Failed(lost.to_string()),
                None => {}
            }
        }
        if matches!(self.account, Account::Unknown) {
            self.account = Account::Loading(
                backend.spawn(ui.ctx(), |api| async move { api.current_user().await }),
            );
        }
    }

    pub fn show(&mut self, ui: &mut Ui, backend: &Backend) {
        if self.action.poll() {
            self.new_password.clear();
            self.confirm_password.clear();
            self.account = Account::Unknown;
        }
        self.poll_account(ui, backend);

        ui.heading("Admin Settings");
        match &self.account {
            Account::Loaded(user) => detail_grid(ui, "account-details", &account_fields(user)),
            Account::Failed(error) => {
                ui.colored_label(egui::Color32::LIGHT_RED, error);
            }
            Account::Unknown | Account::Loading(_) => {
                ui.horizontal(|ui| {
                    ui.label(format!("Signed in as '{}'", backend.api().username()));
                    ui.spinner();
                });
            }
        }
        ui.separator();

        ui.strong("Change Admin Password");
        egui::Grid::new("password-form").num_columns(2).show(ui, |ui| {
            ui.label("New Password:");
            ui.add(egui::TextEdit::singleline(&mut self.new_password).password(true));
            ui.end_row();
            ui.label("Confirm Password:");
            ui.add(egui::TextEdit::singleline(&mut self.confirm_password).password(true));
            ui.end_row();
        });
        ui.small(format!(
            "Password should be at least {} characters long",
            MIN_PASSWORD_LEN
        ));

        ui.horizontal(|ui| {
            if ui
                .add_enabled(!self.action.busy(), egui::Button::new("Change Password"))
                .clicked()
            {
                match validate_new_password(&self.new_password, &self.confirm_password) {
                    Ok(()) => {
                        self.error = None;
                        let password = self.new_password.clone();
                        self.action.start(backend.spawn(ui.ctx(), move |api| async move {
                            api.change_password(&password)
                                .await
                                .map(|_| "Password changed successfully".to_string())
                        }));
                    }
                    Err(message) => self.error = Some(message),
                }
            }
            if ui.button("Clear").clicked() {
                self.new_password.clear();
                self.confirm_password.clear();
                self.error = None;
            }
            if self.action.busy() {
                ui.spinner();
            }
        });

        if let Some(error) = &self.error {
            ui.colored_label(egui::Color32::LIGHT_RED, error);
        }
        self.action.show(ui);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_details_are_listed() {
        let user = UserInfo {
            id: 1,
            username: "admin".to_string(),
            is_active: true,
            created_at: Some("2024-05-01T08:30:00.000000Z".to_string()),
            last_login: None,
        };
        let fields = account_fields(&user);
        assert_eq!(fields[1], ("Username", "admin".to_string()));
        assert_eq!(fields[2].1, "Yes");
        assert_eq!(fields[3].1, "2024-05-01 08:30:00");
        assert_eq!(fields[4].1, "N/A");
    }

    #[test]
    fn new_password_rules() {
        assert!(validate_new_password("", "").is_err());
        assert_eq!(
            validate_new_password("abcd", "abce").unwrap_err(),
            "Passwords do not match"
        );
        assert!(validate_new_password("abc", "abc").is_err());
        assert!(validate_new_password("abcd", "abcd").is_ok());
    }
}
