// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Date and time picker bar.
//!
//! The panel only edits a local copy of the selection. Changes are pushed into
//! the [`DateSelector`], which broadcasts them to the rest of the app.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use egui::{Color32, RichText};
use egui_extras::DatePickerButton;
use flight_track::DateSelector;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePanel {
    day: NaiveDate,
    hour: u32,
    minute: u32,
}

impl DatePanel {
    pub fn new(value: Option<DateTime<Utc>>) -> Self {
        let mut panel = Self {
            day: Utc::now().date_naive(),
            hour: 0,
            minute: 0,
        };
        panel.sync_from(value);
        panel
    }

    /// Mirror the selector's current value into the widgets.
    pub fn sync_from(&mut self, value: Option<DateTime<Utc>>) {
        if let Some(value) = value {
            self.day = value.date_naive();
            self.hour = value.hour();
            self.minute = value.minute();
        }
    }

    /// Instant represented by the widgets.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0)?;
        Some(Utc.from_utc_datetime(&self.day.and_time(time)))
    }

    pub fn show(&mut self, ui: &mut egui::Ui, selector: &mut DateSelector) {
        if selector.is_live() {
            self.sync_from(Some(Utc::now()));
        }

        ui.horizontal(|ui| {
            ui.label(RichText::new("Flight date").strong());

            let mut changed = ui
                .add(DatePickerButton::new(&mut self.day).id_salt("flight_date"))
                .changed();
            changed |= ui
                .add(egui::DragValue::new(&mut self.hour).range(0..=23).suffix(" h"))
                .changed();
            changed |= ui
                .add(egui::DragValue::new(&mut self.minute).range(0..=59).suffix(" min"))
                .changed();
            ui.label("UTC");

            if changed {
                selector.select(self.instant());
            }

            ui.separator();

            if ui.button("Go live").clicked() {
                selector.go_live();
                self.sync_from(selector.value());
            }

            if selector.is_live() {
                ui.label(RichText::new("● LIVE").color(Color32::from_rgb(220, 40, 40)));
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instant_from_widgets() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 14, 45, 30).unwrap();
        let panel = DatePanel::new(Some(at));
        // Seconds are dropped by the picker
        assert_eq!(
            panel.instant(),
            Some(Utc.with_ymd_and_hms(2025, 3, 1, 14, 45, 0).unwrap())
        );
    }

    #[test]
    fn test_sync_from_none_keeps_widgets() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 14, 45, 0).unwrap();
        let mut panel = DatePanel::new(Some(at));
        let before = panel.clone();
        panel.sync_from(None);
        assert_eq!(panel, before);
    }
}
