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

//! Poll sequencing and view state for a live flight map.
//!
//! [`FlightController`] owns everything the map needs between frames: the
//! marker cache, the selected instant, the selected flight with its loaded
//! track, and the airport list. Fetches happen elsewhere; the controller hands
//! out tickets before a request starts and checks them when the response
//! comes back, so a slow response can never reconcile over a newer one.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};

use crate::cache::{FlightCache, MarkerSurface, ReconcileReport, UpsertOutcome};
use crate::date::DateChange;
use crate::geo::{great_circle_points, Coordinate};
use crate::model::{snapshot_of, Airport, FlightId, FlightPositionSample, FlightRecord};

/// Tuning for the controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// `maxSize` passed to the position history endpoint.
    pub history_max_points: usize,
    /// Segments used for the projected great-circle arc.
    pub great_circle_segments: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            history_max_points: 200,
            great_circle_segments: 64,
        }
    }
}

/// Issued when a snapshot poll starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTicket {
    pub seq: u64,
    /// Instant to query.
    pub at: DateTime<Utc>,
}

/// Issued when a position history fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryTicket {
    pub seq: u64,
    pub flight_id: FlightId,
    pub as_of: DateTime<Utc>,
    pub max_points: usize,
}

/// Counts from an applied snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub updated: usize,
    pub recreated: usize,
    pub reconcile: ReconcileReport,
}

/// Geometry for the selected flight overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackOverlay {
    pub flight_id: FlightId,
    /// Historical fixes, oldest first.
    pub history: Vec<Coordinate>,
    /// Great-circle arc from the current position to the destination.
    pub projected: Vec<Coordinate>,
}

#[derive(Debug)]
pub struct FlightController {
    config: ControllerConfig,
    cache: FlightCache,

    selection: Option<DateTime<Utc>>,
    live: bool,

    next_seq: u64,
    last_applied: u64,
    // Tickets below this were issued for an earlier date selection
    min_accepted: u64,

    selected: Option<FlightId>,
    history: Vec<FlightPositionSample>,
    history_seq: u64,

    airports: Vec<Airport>,
}

impl FlightController {
    /// Start in live mode with an empty cache.
    #[must_use]
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            cache: FlightCache::new(),
            selection: None,
            live: true,
            next_seq: 0,
            last_applied: 0,
            min_accepted: 0,
            selected: None,
            history: Vec::new(),
            history_seq: 0,
            airports: Vec::new(),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &FlightCache {
        &self.cache
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Instant that a poll started at `now` would query, if any.
    #[must_use]
    pub fn query_instant(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.live {
            Some(now)
        } else {
            self.selection
        }
    }

    /// React to a new date selection.
    ///
    /// Any poll already in flight is for the old instant and will be dropped
    /// when it returns. The selected flight's track is invalidated too.
    pub fn on_date_change(&mut self, change: &DateChange) {
        info!(
            "Date changed to {} (live: {})",
            change.iso_date.as_deref().unwrap_or("none"),
            change.live
        );
        self.selection = change.raw;
        self.live = change.live;
        self.min_accepted = self.next_seq + 1;
        self.history.clear();
        self.history_seq += 1;
    }

    /// Start a snapshot poll. `None` when no instant is selected.
    pub fn begin_poll(&mut self, now: DateTime<Utc>) -> Option<PollTicket> {
        let at = self.query_instant(now)?;
        self.next_seq += 1;
        Some(PollTicket {
            seq: self.next_seq,
            at,
        })
    }

    /// Whether a response for `ticket` may still be applied.
    #[must_use]
    pub fn is_current(&self, ticket: &PollTicket) -> bool {
        ticket.seq >= self.min_accepted && ticket.seq > self.last_applied
    }

    /// Reconcile the cache against the snapshot a poll returned.
    ///
    /// All records are upserted before the single reconcile pass. Returns
    /// `None` when the ticket was superseded and the response was dropped.
    pub fn apply_snapshot<S>(
        &mut self,
        surface: &mut S,
        ticket: PollTicket,
        records: Vec<FlightRecord>,
    ) -> Option<ApplySummary>
    where
        S: MarkerSurface + ?Sized,
    {
        if !self.is_current(&ticket) {
            debug!(
                "Dropping superseded poll {} (last applied {}, accepting from {})",
                ticket.seq, self.last_applied, self.min_accepted
            );
            return None;
        }
        self.last_applied = ticket.seq;

        let snapshot = snapshot_of(&records);
        let mut summary = ApplySummary::default();
        for record in records {
            match self.cache.upsert(surface, record) {
                UpsertOutcome::Created => summary.created += 1,
                UpsertOutcome::Updated => summary.updated += 1,
                UpsertOutcome::Recreated => summary.recreated += 1,
            }
        }
        summary.reconcile = self.cache.reconcile(surface, &snapshot);

        if let Some(id) = self.selected {
            if !self.cache.contains(id) {
                info!("Selected flight {} left the map", id);
                self.clear_selection();
            }
        }

        debug!(
            "Poll {}: {} new, {} moved, {} evicted",
            ticket.seq,
            summary.created,
            summary.updated,
            summary.reconcile.evicted.len()
        );
        Some(summary)
    }

    /// Select a flight on the map and start loading its track.
    pub fn select_flight(&mut self, id: FlightId, now: DateTime<Utc>) -> Option<HistoryTicket> {
        if !self.cache.contains(id) {
            warn!("Ignoring selection of unknown flight {}", id);
            return None;
        }
        self.selected = Some(id);
        self.refresh_history(now)
    }

    /// Re-request the selected flight's track, e.g. after a date change.
    pub fn refresh_history(&mut self, now: DateTime<Utc>) -> Option<HistoryTicket> {
        let flight_id = self.selected?;
        let as_of = self.query_instant(now).unwrap_or(now);
        self.history.clear();
        self.history_seq += 1;
        Some(HistoryTicket {
            seq: self.history_seq,
            flight_id,
            as_of,
            max_points: self.config.history_max_points,
        })
    }

    /// Store a loaded track if it still belongs to the current selection.
    pub fn apply_history(
        &mut self,
        ticket: HistoryTicket,
        samples: Vec<FlightPositionSample>,
    ) -> bool {
        if self.selected != Some(ticket.flight_id) || ticket.seq != self.history_seq {
            debug!("Dropping stale track for flight {}", ticket.flight_id);
            return false;
        }
        self.history = samples;
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
        self.history.clear();
        self.history_seq += 1;
    }

    #[must_use]
    pub fn selected(&self) -> Option<&FlightRecord> {
        self.selected.and_then(|id| self.cache.get(id))
    }

    #[must_use]
    pub fn history(&self) -> &[FlightPositionSample] {
        &self.history
    }

    /// Track overlay for the selected flight.
    #[must_use]
    pub fn selected_track(&self) -> Option<TrackOverlay> {
        let record = self.selected()?;
        let projected = great_circle_points(
            record.position,
            record.end.coordinate,
            self.config.great_circle_segments,
        );
        Some(TrackOverlay {
            flight_id: record.id,
            history: self.history.iter().map(|s| s.coordinate).collect(),
            projected,
        })
    }

    pub fn set_airports(&mut self, airports: Vec<Airport>) {
        info!("Loaded {} airports", airports.len());
        self.airports = airports;
    }

    #[must_use]
    pub fn airports(&self) -> &[Airport] {
        &self.airports
    }

    /// Drop every marker and the selection; pending polls are discarded.
    pub fn reset<S>(&mut self, surface: &mut S)
    where
        S: MarkerSurface + ?Sized,
    {
        self.cache.clear(surface);
        self.clear_selection();
        self.min_accepted = self.next_seq + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::testing::{flight, FakeSurface};
    use crate::model::{FlightPositionSample, Snapshot};
    use chrono::{Duration, TimeZone};

    fn fixed(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }

    fn fixed_change(hour: u32) -> DateChange {
        DateChange {
            iso_date: Some("2025-03-01".to_string()),
            raw: Some(fixed(hour)),
            live: false,
        }
    }

    #[test]
    fn test_live_poll_uses_now() {
        let mut controller = FlightController::new(ControllerConfig::default());
        let now = fixed(9);
        let ticket = controller.begin_poll(now).unwrap();
        assert_eq!(ticket.at, now);
        assert_eq!(ticket.seq, 1);
    }

    #[test]
    fn test_fixed_selection_poll_uses_selection() {
        let mut controller = FlightController::new(ControllerConfig::default());
        controller.on_date_change(&fixed_change(6));
        let ticket = controller.begin_poll(fixed(12)).unwrap();
        assert_eq!(ticket.at, fixed(6));
        assert!(!controller.is_live());
    }

    #[test]
    fn test_cleared_selection_does_not_poll() {
        let mut controller = FlightController::new(ControllerConfig::default());
        controller.on_date_change(&DateChange {
            iso_date: None,
            raw: None,
            live: false,
        });
        assert!(controller.begin_poll(fixed(12)).is_none());
    }

    #[test]
    fn test_apply_snapshot_upserts_then_reconciles() {
        let mut surface = FakeSurface::default();
        let mut controller = FlightController::new(ControllerConfig::default());

        let ticket = controller.begin_poll(fixed(1)).unwrap();
        let summary = controller
            .apply_snapshot(
                &mut surface,
                ticket,
                vec![flight(1, (0.0, 0.0), (1.0, 1.0)), flight(2, (0.0, 0.0), (1.0, 1.0))],
            )
            .unwrap();
        assert_eq!(summary.created, 2);

        let ticket = controller.begin_poll(fixed(1)).unwrap();
        let summary = controller
            .apply_snapshot(&mut surface, ticket, vec![flight(2, (1.0, 1.0), (2.0, 2.0))])
            .unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.reconcile.evicted, vec![1]);
        assert_eq!(controller.cache().len(), 1);
        assert_eq!(surface.markers.len(), 1);
    }

    #[test]
    fn test_out_of_order_response_is_dropped() {
        let mut surface = FakeSurface::default();
        let mut controller = FlightController::new(ControllerConfig::default());

        let older = controller.begin_poll(fixed(1)).unwrap();
        let newer = controller.begin_poll(fixed(1)).unwrap();

        assert!(controller
            .apply_snapshot(&mut surface, newer, vec![flight(5, (0.0, 0.0), (1.0, 1.0))])
            .is_some());
        // The older response would otherwise evict flight 5
        assert!(controller.apply_snapshot(&mut surface, older, Vec::new()).is_none());
        assert!(controller.cache().contains(5));
    }

    #[test]
    fn test_date_change_discards_in_flight_poll() {
        let mut surface = FakeSurface::default();
        let mut controller = FlightController::new(ControllerConfig::default());

        let before_change = controller.begin_poll(fixed(1)).unwrap();
        controller.on_date_change(&fixed_change(3));

        assert!(!controller.is_current(&before_change));
        assert!(controller
            .apply_snapshot(&mut surface, before_change, vec![flight(1, (0.0, 0.0), (1.0, 1.0))])
            .is_none());
        assert!(controller.cache().is_empty());

        let after_change = controller.begin_poll(fixed(4)).unwrap();
        assert!(controller.is_current(&after_change));
    }

    #[test]
    fn test_selection_track_overlay() {
        let mut surface = FakeSurface::default();
        let mut controller = FlightController::new(ControllerConfig {
            great_circle_segments: 8,
            ..Default::default()
        });

        let ticket = controller.begin_poll(fixed(1)).unwrap();
        controller.apply_snapshot(
            &mut surface,
            ticket,
            vec![flight(4, (41.5, 27.0), (41.8, 26.0))],
        );

        let history_ticket = controller.select_flight(4, fixed(1)).unwrap();
        assert_eq!(history_ticket.flight_id, 4);
        assert_eq!(history_ticket.max_points, 200);

        let samples = vec![
            FlightPositionSample {
                coordinate: Coordinate::new(41.0, 28.0),
                time: fixed(1) - Duration::minutes(20),
            },
            FlightPositionSample {
                coordinate: Coordinate::new(41.5, 27.0),
                time: fixed(1) - Duration::minutes(10),
            },
        ];
        assert!(controller.apply_history(history_ticket, samples));

        let overlay = controller.selected_track().unwrap();
        assert_eq!(overlay.history.len(), 2);
        assert_eq!(overlay.projected.len(), 9);
        assert_eq!(overlay.projected[0], Coordinate::new(41.8, 26.0));
        assert_eq!(overlay.projected[8], Coordinate::new(42.0, 23.0));
    }

    #[test]
    fn test_history_for_previous_selection_is_dropped() {
        let mut surface = FakeSurface::default();
        let mut controller = FlightController::new(ControllerConfig::default());
        let ticket = controller.begin_poll(fixed(1)).unwrap();
        controller.apply_snapshot(
            &mut surface,
            ticket,
            vec![flight(1, (0.0, 0.0), (1.0, 1.0)), flight(2, (0.0, 0.0), (1.0, 1.0))],
        );

        let first = controller.select_flight(1, fixed(1)).unwrap();
        let _second = controller.select_flight(2, fixed(1)).unwrap();
        assert!(!controller.apply_history(first, Vec::new()));

        controller.clear_selection();
        assert!(controller.selected().is_none());
        assert!(controller.selected_track().is_none());
    }

    #[test]
    fn test_date_change_discards_in_flight_history() {
        let mut surface = FakeSurface::default();
        let mut controller = FlightController::new(ControllerConfig::default());
        controller.on_date_change(&fixed_change(10));
        let ticket = controller.begin_poll(fixed(1)).unwrap();
        controller.apply_snapshot(&mut surface, ticket, vec![flight(1, (0.0, 0.0), (1.0, 1.0))]);

        let before = controller.select_flight(1, fixed(1)).unwrap();
        assert_eq!(before.as_of, fixed(10));

        controller.on_date_change(&fixed_change(14));
        let after = controller.refresh_history(fixed(1)).unwrap();
        assert_eq!(after.flight_id, 1);
        assert_eq!(after.as_of, fixed(14));

        let sample = FlightPositionSample {
            coordinate: Coordinate::new(0.5, 0.5),
            time: fixed(9),
        };
        assert!(!controller.apply_history(before, vec![sample]));
        assert!(controller.history().is_empty());

        let sample = FlightPositionSample {
            coordinate: Coordinate::new(0.7, 0.7),
            time: fixed(13),
        };
        assert!(controller.apply_history(after, vec![sample]));
        assert_eq!(controller.history(), &[sample]);
    }

    #[test]
    fn test_unknown_flight_cannot_be_selected() {
        let mut controller = FlightController::new(ControllerConfig::default());
        assert!(controller.select_flight(42, fixed(1)).is_none());
    }

    #[test]
    fn test_selected_flight_evicted_clears_selection() {
        let mut surface = FakeSurface::default();
        let mut controller = FlightController::new(ControllerConfig::default());
        let ticket = controller.begin_poll(fixed(1)).unwrap();
        controller.apply_snapshot(&mut surface, ticket, vec![flight(8, (0.0, 0.0), (1.0, 1.0))]);
        controller.select_flight(8, fixed(1));

        let ticket = controller.begin_poll(fixed(1)).unwrap();
        controller.apply_snapshot(&mut surface, ticket, Vec::new());
        assert!(controller.selected().is_none());
    }

    #[test]
    fn test_reset_clears_markers() {
        let mut surface = FakeSurface::default();
        let mut controller = FlightController::new(ControllerConfig::default());
        let ticket = controller.begin_poll(fixed(1)).unwrap();
        let pending = controller.begin_poll(fixed(1)).unwrap();
        controller.apply_snapshot(&mut surface, ticket, vec![flight(1, (0.0, 0.0), (1.0, 1.0))]);

        controller.reset(&mut surface);
        assert!(controller.cache().is_empty());
        assert!(surface.markers.is_empty());
        assert!(!controller.is_current(&pending));
        assert_eq!(controller.cache().ids().collect::<Snapshot>().len(), 0);
    }
}
