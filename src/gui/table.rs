//! Paged, polled table shared by the list views.

use std::time::{Duration, Instant};

use eframe::egui::{self, Color32, Ui};

use super::pager::Pager;
use super::task::Pending;
use crate::api_client::{self, ClientError};

/// How often a visible list view reloads its page.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub type Fetch<R> = Pending<Result<Vec<R>, ClientError>>;

/// A record that can be shown as one table row.
pub trait Row: Clone + Send + 'static {
    type Key: PartialEq + Clone;

    fn key(&self) -> Self::Key;
    fn columns() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

pub struct Table<R: Row> {
    rows: Vec<R>,
    pub pager: Pager,
    selected: Option<R::Key>,
    pending: Option<Fetch<R>>,
    error: Option<String>,
    last_refresh: Option<Instant>,
    polling: bool,
}

impl<R: Row> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            pager: Pager::default(),
            selected: None,
            pending: None,
            error: None,
            last_refresh: None,
            polling: false,
        }
    }
}

impl<R: Row> Table<R> {
    pub fn start_polling(&mut self) {
        self.polling = true;
        self.last_refresh = None;
    }

    pub fn stop_polling(&mut self) {
        self.polling = false;
    }

    /// True when a reload should be issued now.
    pub fn due(&self, now: Instant) -> bool {
        self.polling
            && self.pending.is_none()
            && self
                .last_refresh
                .map_or(true, |at| now.duration_since(at) >= POLL_INTERVAL)
    }

    /// Forces the next frame to reload, e.g. after a page change or a delete.
    /// A fetch still in flight belongs to the old query and is dropped.
    pub fn invalidate(&mut self) {
        self.pending = None;
        self.last_refresh = None;
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn load(&mut self, fetch: Fetch<R>) {
        self.pending = Some(fetch);
        self.last_refresh = Some(Instant::now());
    }

    /// Collects a finished fetch. The selection survives when its row is still present.
    pub fn poll(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let Some(outcome) = pending.poll() else {
            return;
        };
        self.pending = None;

        match outcome {
            Ok(Ok(rows)) => self.apply(rows),
            Ok(Err(e)) => self.error = Some(e.to_string()),
            Err(lost) => self.error = Some(lost.to_string()),
        }
    }

    fn apply(&mut self, rows: Vec<R>) {
        self.pager.record(rows.len());
        if let Some(key) = &self.selected {
            if !rows.iter().any(|row| &row.key() == key) {
                self.selected = None;
            }
        }
        self.rows = rows;
        self.error = None;
    }

    pub fn selected(&self) -> Option<&R> {
        let key = self.selected.as_ref()?;
        self.rows.iter().find(|row| &row.key() == key)
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn show(&mut self, ui: &mut Ui, id: &str) {
        if let Some(error) = &self.error {
            ui.colored_label(Color32::LIGHT_RED, error);
        }

        egui::ScrollArea::vertical()
            .id_salt(id)
            .max_height(ui.available_height() * 0.6)
            .show(ui, |ui| {
                egui::Grid::new(id).striped(true).num_columns(R::columns().len()).show(ui, |ui| {
                    for column in R::columns() {
                        ui.strong(*column);
                    }
                    ui.end_row();

                    for row in &self.rows {
                        let key = row.key();
                        let is_selected = self.selected.as_ref() == Some(&key);
                        let mut clicked = false;
                        for (i, cell) in row.cells().into_iter().enumerate() {
                            if i == 0 {
                                clicked |= ui.selectable_label(is_selected, cell).clicked();
                            } else {
                                ui.label(cell);
                            }
                        }
                        if clicked {
                            self.selected = Some(key);
                        }
                        ui.end_row();
                    }
                });
            });
    }

    /// Previous/next controls. Returns true when the page changed.
    pub fn show_pager(&mut self, ui: &mut Ui) -> bool {
        let mut changed = false;
        ui.horizontal(|ui| {
            if ui.add_enabled(self.pager.has_prev(), egui::Button::new("Previous")).clicked() {
                self.pager.prev();
                changed = true;
            }
            ui.label(format!("Page {}", self.pager.page() + 1));
            if ui.add_enabled(self.pager.has_next(), egui::Button::new("Next")).clicked() {
                self.pager.next();
                changed = true;
            }
            if self.is_loading() {
                ui.spinner();
            }
        });
        if changed {
            self.selected = None;
            self.invalidate();
        }
        changed
    }
}

/// Label/value pairs for a detail panel.
pub fn detail_grid(ui: &mut Ui, id: &str, fields: &[(&str, String)]) {
    egui::Grid::new(id).num_columns(2).show(ui, |ui| {
        for (label, value) in fields {
            ui.label(format!("{}:", label));
            ui.label(value);
            ui.end_row();
        }
    });
}

pub fn timestamp(value: &Option<String>) -> String {
    api_client::display_timestamp(value.as_deref())
}

pub fn optional<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map_or_else(|| "N/A".to_string(), ToString::to_string)
}

pub fn yes_no(value: bool) -> String {
    if value { "Yes" } else { "No" }.to_string()
}

#[cfg(test)]
mod tests {
    use super::super::task::spawn;
    use super::*;

    #[derive(Clone)]
    struct Item(i64);

    impl Row for Item {
        type Key = i64;

        fn key(&self) -> i64 {
            self.0
        }

        fn columns() -> &'static [&'static str] {
            &["ID"]
        }

        fn cells(&self) -> Vec<String> {
            vec![self.0.to_string()]
        }
    }

    #[test]
    fn polling_flag_gates_reloads() {
        let mut table = Table::<Item>::default();
        let now = Instant::now();
        assert!(!table.due(now));

        table.start_polling();
        assert!(table.due(now));

        table.last_refresh = Some(now);
        assert!(!table.due(now));
        assert!(table.due(now + POLL_INTERVAL));

        table.stop_polling();
        assert!(!table.due(now + POLL_INTERVAL));
    }

    #[test]
    fn selection_survives_refresh_when_row_remains() {
        let mut table = Table::<Item>::default();
        table.apply(vec![Item(1), Item(2)]);
        table.selected = Some(2);

        table.apply(vec![Item(2), Item(3)]);
        assert_eq!(table.selected().map(|i| i.0), Some(2));

        table.apply(vec![Item(3)]);
        assert!(table.selected().is_none());
    }

    #[test]
    fn invalidate_discards_an_in_flight_fetch() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let ctx = egui::Context::default();
        let (release, gate) = tokio::sync::oneshot::channel::<()>();

        let mut table = Table::<Item>::default();
        table.start_polling();
        table.load(spawn(runtime.handle(), &ctx, async move {
            let _ = gate.await;
            Ok::<_, ClientError>(vec![Item(7), Item(8)])
        }));
        assert!(table.is_loading());

        table.invalidate();
        assert!(!table.is_loading());
        assert!(table.due(Instant::now()));

        let _ = release.send(());
        std::thread::sleep(Duration::from_millis(20));
        table.poll();
        assert!(table.rows.is_empty());
        assert!(!table.pager.has_next());
    }

    #[test]
    fn optional_values_render_na() {
        assert_eq!(optional::<i64>(&None), "N/A");
        assert_eq!(optional(&Some(1883)), "1883");
        assert_eq!(yes_no(true), "Yes");
    }
}
