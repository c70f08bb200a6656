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

mod config;
mod map;
mod poller;
mod status;
mod ui;

use std::time::{Duration, Instant};

use clap::Parser;
use eframe::egui;
use flight_track::{Coordinate, DateChange, DateSelector, FlightController};
use log::{info, warn};
use tokio::sync::broadcast;

use config::AppConfig;
use map::{MapView, MarkerLayer};
use poller::{Poller, PollerEvent};
use status::FetchStatus;
use ui::DatePanel;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const REPAINT_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Flight backend base URL (overrides the config file)
    #[arg(long, env = "FLIGHTMAP_API_URL")]
    api_base_url: Option<String>,

    /// Seconds between snapshot polls (overrides the config file)
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Print the configuration file path and exit
    #[arg(long)]
    print_config_path: bool,
}

fn main() -> Result<(), eframe::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.print_config_path {
        match AppConfig::get_config_path() {
            Ok(path) => println!("{}", path.display()),
            Err(e) => eprintln!("Could not determine config path: {e}"),
        }
        return Ok(());
    }

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!("Failed to load configuration, using defaults: {}", e);
        AppConfig::default()
    });
    if let Some(url) = cli.api_base_url {
        config.api_base_url = url;
    }
    if let Some(secs) = cli.poll_interval {
        config.poll_interval_secs = secs;
    }

    info!("Starting FlightMap Desktop...");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_title("FlightMap Desktop"),
        ..Default::default()
    };

    eframe::run_native(
        "FlightMap Desktop",
        options,
        Box::new(|cc| Ok(Box::new(FlightMapApp::new(config, cc.egui_ctx.clone())?))),
    )
}

/// A poll is due on the first frame and once `interval` has passed since the last one.
fn poll_due(last_poll: Option<Instant>, interval: Duration) -> bool {
    last_poll.is_none_or(|t| t.elapsed() >= interval)
}

struct FlightMapApp {
    config: AppConfig,
    controller: FlightController,
    layer: MarkerLayer,
    map: MapView,
    date_selector: DateSelector,
    date_rx: broadcast::Receiver<DateChange>,
    date_panel: DatePanel,
    poller: Poller,
    status: FetchStatus,
    last_poll: Option<Instant>,
}

impl FlightMapApp {
    fn new(
        config: AppConfig,
        ctx: egui::Context,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let poller = Poller::new(config.service_config(), ctx)?;
        poller.fetch_airports();

        let date_selector = DateSelector::new();
        let date_rx = date_selector.subscribe();
        let date_panel = DatePanel::new(date_selector.value());

        Ok(Self {
            controller: FlightController::new(config.controller_config()),
            layer: MarkerLayer::new(),
            map: MapView::new(
                Coordinate::new(config.default_center_lat, config.default_center_lng),
                config.default_zoom,
            ),
            date_selector,
            date_rx,
            date_panel,
            poller,
            status: FetchStatus::new(),
            last_poll: None,
            config,
        })
    }

    /// Forward picker changes into the controller.
    fn drain_date_changes(&mut self) {
        loop {
            match self.date_rx.try_recv() {
                Ok(change) => {
                    self.controller.on_date_change(&change);
                    // Poll right away for the new instant
                    self.last_poll = None;
                    if let Some(ticket) = self.controller.refresh_history(chrono::Utc::now()) {
                        self.poller.fetch_history(ticket);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Skipped {} date changes", skipped);
                }
                Err(_) => break,
            }
        }
    }

    fn drain_poller_events(&mut self) {
        while let Some(event) = self.poller.try_next() {
            match event {
                PollerEvent::Flights { ticket, result } => match result {
                    Ok(records) => {
                        if let Some(summary) =
                            self.controller
                                .apply_snapshot(&mut self.layer, ticket, records)
                        {
                            if !summary.reconcile.inconsistent.is_empty() {
                                self.status.record_warning(format!(
                                    "{} markers were out of sync",
                                    summary.reconcile.inconsistent.len()
                                ));
                            }
                            self.status
                                .record_snapshot(ticket.at, self.controller.cache().len());
                        }
                    }
                    // Keep showing the previous snapshot until a poll succeeds
                    Err(message) => self.status.record_error(message),
                },
                PollerEvent::History { ticket, samples } => {
                    self.controller.apply_history(ticket, samples);
                }
                PollerEvent::Airports(airports) => self.controller.set_airports(airports),
            }
        }
    }

    fn poll_if_due(&mut self) {
        if !poll_due(self.last_poll, self.config.poll_interval()) {
            return;
        }
        self.last_poll = Some(Instant::now());
        if let Some(ticket) = self.controller.begin_poll(chrono::Utc::now()) {
            self.poller.fetch_flights(ticket);
        }
    }
}

impl eframe::App for FlightMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint_after(REPAINT_INTERVAL);

        self.drain_date_changes();
        self.drain_poller_events();
        self.poll_if_due();

        egui::TopBottomPanel::top("date_panel").show(ctx, |ui| {
            self.date_panel.show(ui, &mut self.date_selector);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.status.show(ui, self.map.tile_status());
        });

        let response = egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                self.map
                    .show(ui, &self.controller, &self.layer, self.config.show_airports)
            })
            .inner;

        if let Some(marker) = response.clicked_marker {
            let flight_id = self.controller.cache().find_by_marker(marker).map(|r| r.id);
            if let Some(ticket) =
                flight_id.and_then(|id| self.controller.select_flight(id, chrono::Utc::now()))
            {
                self.poller.fetch_history(ticket);
            }
        } else if response.clicked_empty {
            self.controller.clear_selection();
        }
    }
}

impl Drop for FlightMapApp {
    fn drop(&mut self) {
        self.poller.shutdown();
        self.controller.reset(&mut self.layer);

        // Remember where the user left the map
        let center = self.map.center();
        self.config.default_center_lat = center.lat;
        self.config.default_center_lng = center.lng;
        self.config.default_zoom = self.map.zoom();
        if let Err(e) = self.config.save() {
            warn!("Failed to save configuration: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_due_on_first_frame_and_after_interval() {
        let interval = Duration::from_secs(5);
        assert!(poll_due(None, interval));
        assert!(!poll_due(Some(Instant::now()), interval));

        let earlier = Instant::now().checked_sub(Duration::from_secs(6)).unwrap();
        assert!(poll_due(Some(earlier), interval));
    }
}
