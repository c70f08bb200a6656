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

//! Background fetches against the flight backend.
//!
//! Requests run on a tokio runtime owned by the poller. Results come back as
//! [`PollerEvent`]s which the UI thread drains once per frame, so every cache
//! mutation still happens on the UI thread.

use log::{error, info};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use flight_track::{
    Airport, FlightPositionSample, FlightRecord, FlightTrackService, HistoryTicket, PollTicket,
    ServiceConfig,
};

/// A finished request.
#[derive(Debug)]
pub enum PollerEvent {
    /// Snapshot poll result. `Err` carries the logged failure.
    Flights {
        ticket: PollTicket,
        result: Result<Vec<FlightRecord>, String>,
    },
    /// Track history for the selected flight; empty on failure.
    History {
        ticket: HistoryTicket,
        samples: Vec<FlightPositionSample>,
    },
    Airports(Vec<Airport>),
}

pub struct Poller {
    runtime: Runtime,
    service: FlightTrackService,
    events_tx: mpsc::UnboundedSender<PollerEvent>,
    events_rx: mpsc::UnboundedReceiver<PollerEvent>,
    cancel_token: CancellationToken,
    repaint: egui::Context,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("base_url", &self.service.base_url())
            .finish_non_exhaustive()
    }
}

impl Poller {
    pub fn new(
        config: ServiceConfig,
        repaint: egui::Context,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("flight-poller")
            .enable_all()
            .build()?;
        let service = FlightTrackService::new(config)?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!("Polling flight backend at {}", service.base_url());

        Ok(Self {
            runtime,
            service,
            events_tx,
            events_rx,
            cancel_token: CancellationToken::new(),
            repaint,
        })
    }

    fn spawn<F, Fut>(&self, request: F)
    where
        F: FnOnce(FlightTrackService) -> Fut,
        Fut: std::future::Future<Output = PollerEvent> + Send + 'static,
    {
        let fut = request(self.service.clone());
        let tx = self.events_tx.clone();
        let cancel_token = self.cancel_token.clone();
        let repaint = self.repaint.clone();

        self.runtime.spawn(async move {
            tokio::select! {
                event = fut => {
                    if tx.send(event).is_ok() {
                        repaint.request_repaint();
                    }
                }
                () = cancel_token.cancelled() => {}
            }
        });
    }

    pub fn fetch_flights(&self, ticket: PollTicket) {
        self.spawn(move |service| async move {
            let result = service.fetch_flights_at(ticket.at).await.map_err(|e| {
                error!("Failed to load flights: {}", e);
                e.to_string()
            });
            PollerEvent::Flights { ticket, result }
        });
    }

    pub fn fetch_history(&self, ticket: HistoryTicket) {
        self.spawn(move |service| async move {
            let samples = service
                .history_or_empty(ticket.flight_id, ticket.as_of, ticket.max_points)
                .await;
            PollerEvent::History { ticket, samples }
        });
    }

    pub fn fetch_airports(&self) {
        self.spawn(|service| async move {
            PollerEvent::Airports(service.airports_or_empty().await)
        });
    }

    /// Next finished request, without blocking.
    pub fn try_next(&mut self) -> Option<PollerEvent> {
        self.events_rx.try_recv().ok()
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
