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

//! Client-side core of a live flight tracking map.
//!
//! The crate is split into layers that can be used on their own:
//!
//! - **Geo layer**: marker bearings, great-circle arcs and distances
//! - **Cache layer**: one rendered marker per flight, reconciled against each
//!   polled snapshot through the [`MarkerSurface`] trait
//! - **Service layer**: async HTTP client for the flight backend
//! - **Controller layer**: poll sequencing, date selection and the selected
//!   flight overlay
//!
//! # Quick Start
//!
//! ```no_run
//! use flight_track::{FlightController, ControllerConfig, FlightTrackService, ServiceConfig};
//! # use flight_track::{MarkerSurface, MarkerHandle, MarkerId, CacheError, FlightRecord};
//! # struct Layer(u64);
//! # impl MarkerSurface for Layer {
//! #     fn create_marker(&mut self, _: &FlightRecord, _: f64) -> MarkerHandle {
//! #         self.0 += 1;
//! #         MarkerHandle::new(MarkerId(self.0))
//! #     }
//! #     fn update_marker(
//! #         &mut self,
//! #         _: &MarkerHandle,
//! #         _: &FlightRecord,
//! #         _: f64,
//! #     ) -> Result<(), CacheError> {
//! #         Ok(())
//! #     }
//! #     fn release_marker(&mut self, _: MarkerHandle) -> Result<(), CacheError> { Ok(()) }
//! # }
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = FlightTrackService::new(ServiceConfig::default()).unwrap();
//!     let mut controller = FlightController::new(ControllerConfig::default());
//!     let mut layer = Layer(0);
//!
//!     if let Some(ticket) = controller.begin_poll(chrono::Utc::now()) {
//!         let flights = service.flights_or_empty(ticket.at).await;
//!         controller.apply_snapshot(&mut layer, ticket, flights);
//!     }
//!     println!("{} flights on the map", controller.cache().len());
//! }
//! ```
//!
//! # Geo Layer Only
//!
//! ```
//! use flight_track::geo::{bearing, Coordinate, DEGENERATE_BEARING_DEG};
//!
//! let here = Coordinate::new(43.0, 27.1278);
//! assert_eq!(bearing(here, here), DEGENERATE_BEARING_DEG);
//! ```

pub mod cache;
pub mod controller;
pub mod date;
pub mod geo;
pub mod model;
pub mod service;

pub use cache::{
    CacheError, FlightCache, MarkerHandle, MarkerId, MarkerSurface, ReconcileReport, UpsertOutcome,
};
pub use controller::{
    ApplySummary, ControllerConfig, FlightController, HistoryTicket, PollTicket, TrackOverlay,
};
pub use date::{DateChange, DateSelector};
pub use geo::{bearing, great_circle_points, Coordinate};
pub use model::{Airport, FlightId, FlightPositionSample, FlightRecord, Location, Snapshot};
pub use service::{FlightTrackService, ServiceConfig, TrackError};
