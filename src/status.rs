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

use chrono::{DateTime, Utc};
use egui::{Color32, RichText};
use std::collections::VecDeque;

const MAX_DIAGNOSTICS: usize = 20;

/// Severity of a diagnostic message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// Diagnostic message with timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticMessage {
    pub timestamp: DateTime<Utc>,
    pub level: DiagnosticLevel,
    pub message: String,
}

/// Backend fetch health, shown in the status bar
#[derive(Debug, Default)]
pub struct FetchStatus {
    /// Completion time of the last successful snapshot poll
    pub last_success: Option<DateTime<Utc>>,
    /// Instant the last successful poll queried
    pub last_query: Option<DateTime<Utc>>,
    /// Flights on the map after the last poll
    pub flight_count: usize,
    /// Whether the most recent poll failed
    pub failing: bool,
    diagnostics: VecDeque<DiagnosticMessage>,
}

impl FetchStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_snapshot(&mut self, query: DateTime<Utc>, flight_count: usize) {
        self.last_success = Some(Utc::now());
        self.last_query = Some(query);
        self.flight_count = flight_count;
        if self.failing {
            self.push(DiagnosticLevel::Info, "Flight backend reachable again".to_string());
        }
        self.failing = false;
    }

    pub fn record_error(&mut self, message: String) {
        self.failing = true;
        self.push(DiagnosticLevel::Error, message);
    }

    pub fn record_warning(&mut self, message: String) {
        self.push(DiagnosticLevel::Warning, message);
    }

    pub fn latest(&self) -> Option<&DiagnosticMessage> {
        self.diagnostics.back()
    }

    pub fn diagnostics(&self) -> impl DoubleEndedIterator<Item = &DiagnosticMessage> {
        self.diagnostics.iter()
    }

    fn push(&mut self, level: DiagnosticLevel, message: String) {
        if self.diagnostics.len() == MAX_DIAGNOSTICS {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(DiagnosticMessage {
            timestamp: Utc::now(),
            level,
            message,
        });
    }

    /// Single-line summary with the most recent problem, if any
    pub fn show(&self, ui: &mut egui::Ui, tile_status: Option<&str>) {
        ui.horizontal(|ui| {
            let (color, symbol) = if self.failing {
                (Color32::from_rgb(220, 50, 50), "●")
            } else if self.last_success.is_some() {
                (Color32::from_rgb(100, 200, 100), "●")
            } else {
                (Color32::from_rgb(150, 150, 150), "○")
            };
            ui.label(RichText::new(symbol).color(color));
            ui.label(format!("{} flights", self.flight_count));

            if let Some(query) = self.last_query {
                ui.label(
                    RichText::new(format!("at {}", query.format("%Y-%m-%d %H:%M UTC")))
                        .color(Color32::GRAY),
                );
            }
            if let Some(tiles) = tile_status {
                ui.separator();
                ui.label(RichText::new(tiles).color(Color32::from_rgb(255, 200, 100)));
            }
            if let Some(latest) = self.latest().filter(|d| d.level != DiagnosticLevel::Info) {
                ui.separator();
                // Full history on hover, newest first
                ui.label(diagnostic_text(latest)).on_hover_ui(|ui| {
                    for diagnostic in self.diagnostics().rev() {
                        ui.label(diagnostic_text(diagnostic));
                    }
                });
            }
        });
    }
}

fn diagnostic_text(diagnostic: &DiagnosticMessage) -> RichText {
    let color = match diagnostic.level {
        DiagnosticLevel::Error => Color32::from_rgb(220, 50, 50),
        DiagnosticLevel::Warning => Color32::from_rgb(255, 200, 100),
        DiagnosticLevel::Info => Color32::GRAY,
    };
    RichText::new(format!(
        "{} {}",
        diagnostic.timestamp.format("%H:%M:%S"),
        diagnostic.message
    ))
    .color(color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_then_recovery() {
        let mut status = FetchStatus::new();
        status.record_error("HTTP 503".to_string());
        assert!(status.failing);
        assert_eq!(status.latest().unwrap().level, DiagnosticLevel::Error);

        status.record_snapshot(Utc::now(), 4);
        assert!(!status.failing);
        assert_eq!(status.flight_count, 4);
        assert_eq!(status.latest().unwrap().level, DiagnosticLevel::Info);
    }

    #[test]
    fn test_diagnostics_are_bounded() {
        let mut status = FetchStatus::new();
        for i in 0..(MAX_DIAGNOSTICS + 5) {
            status.record_warning(format!("warning {i}"));
        }
        assert_eq!(status.diagnostics().count(), MAX_DIAGNOSTICS);
        assert_eq!(status.diagnostics().next().unwrap().message, "warning 5");
    }

    #[test]
    fn test_diagnostic_history_newest_last() {
        let mut status = FetchStatus::new();
        status.record_warning("stale markers".to_string());
        status.record_error("backend down".to_string());

        let newest_first: Vec<_> = status.diagnostics().rev().map(|d| d.level).collect();
        assert_eq!(newest_first, vec![DiagnosticLevel::Error, DiagnosticLevel::Warning]);
        let text = diagnostic_text(status.latest().unwrap());
        assert!(text.text().ends_with(" backend down"));
    }
}
