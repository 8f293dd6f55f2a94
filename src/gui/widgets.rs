//! Confirmation dialog and status line for mutating actions.

use eframe::egui::{self, Color32, Id, Modal, Ui};

use super::task::Pending;
use crate::api_client::ClientError;

/// A mutating request; resolves to the message shown on success.
pub type Action = Pending<Result<String, ClientError>>;

/// Yes/no modal guarding a destructive action.
pub struct Confirm<A> {
    id: &'static str,
    asking: Option<(String, A)>,
}

impl<A> Confirm<A> {
    pub fn new(id: &'static str) -> Self {
        Self { id, asking: None }
    }

    pub fn ask(&mut self, question: impl Into<String>, action: A) {
        self.asking = Some((question.into(), action));
    }

    /// Draws the dialog while open; yields the action once confirmed.
    pub fn show(&mut self, ctx: &egui::Context) -> Option<A> {
        let question = self.asking.as_ref()?.0.clone();
        let mut answer = None;

        let response = Modal::new(Id::new(self.id)).show(ctx, |ui| {
            ui.set_width(280.0);
            ui.heading("Confirm");
            ui.label(question);
            ui.separator();
            ui.horizontal(|ui| {
                if ui.button("Yes").clicked() {
                    answer = Some(true);
                }
                if ui.button("No").clicked() {
                    answer = Some(false);
                }
            });
        });
        if response.should_close() && answer.is_none() {
            answer = Some(false);
        }

        match answer {
            Some(true) => self.asking.take().map(|(_, action)| action),
            Some(false) => {
                self.asking = None;
                None
            }
            None => None,
        }
    }
}

/// Tracks at most one running action and the outcome of the last one.
#[derive(Default)]
pub struct ActionSlot {
    pending: Option<Action>,
    status: Option<(bool, String)>,
}

impl ActionSlot {
    pub fn busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn start(&mut self, action: Action) {
        self.pending = Some(action);
        self.status = None;
    }

    /// Returns true when an action just completed successfully.
    pub fn poll(&mut self) -> bool {
        let Some(outcome) = self.pending.as_mut().and_then(|pending| pending.poll()) else {
            return false;
        };
        self.pending = None;
        match outcome {
            Ok(Ok(message)) => {
                self.status = Some((true, message));
                true
            }
            Ok(Err(e)) => {
                self.status = Some((false, e.to_string()));
                false
            }
            Err(lost) => {
                self.status = Some((false, lost.to_string()));
                false
            }
        }
    }

    pub fn show(&self, ui: &mut Ui) {
        match &self.status {
            Some((true, message)) => {
                ui.colored_label(Color32::LIGHT_GREEN, message);
            }
            Some((false, message)) => {
                ui.colored_label(Color32::LIGHT_RED, message);
            }
            None => {}
        }
    }
}
