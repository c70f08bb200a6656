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

//! Reconciliation cache of rendered flight markers.
//!
//! The cache maps each flight id to its latest [`FlightRecord`] and to the
//! single marker drawn for it. Polling feeds every snapshot through
//! [`FlightCache::upsert`] followed by one [`FlightCache::reconcile`], so a
//! flight that stays in view keeps its marker and only moves it.
//!
//! Markers live on a [`MarkerSurface`], the rendering seam. The surface mints
//! a [`MarkerHandle`] per marker and the cache entry is its only owner:
//! evicting an entry hands the handle back to the surface for release before
//! the entry is dropped.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use log::{debug, error};
use thiserror::Error;

use crate::geo::bearing;
use crate::model::{FlightId, FlightRecord, Snapshot};

/// Read-only identity of a rendered marker, for hit-testing and lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(pub u64);

/// Owning token for one rendered marker.
///
/// Deliberately neither `Clone` nor `Copy`: whoever holds the handle owns the
/// marker, and giving it back to [`MarkerSurface::release_marker`] is the only
/// way to remove the marker from the surface.
#[derive(Debug, PartialEq, Eq)]
pub struct MarkerHandle(MarkerId);

impl MarkerHandle {
    /// Mint a handle. Only surfaces should call this.
    #[must_use]
    pub fn new(id: MarkerId) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn id(&self) -> MarkerId {
        self.0
    }
}

/// Errors reported by a marker surface.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The surface has no marker for a handle the cache still holds.
    #[error("marker {0:?} is not present on the surface")]
    UnknownMarker(MarkerId),
}

/// Where flight markers are drawn.
pub trait MarkerSurface {
    /// Draw a new marker for `record` at its current position.
    fn create_marker(&mut self, record: &FlightRecord, rotation: f64) -> MarkerHandle;

    /// Move and rotate an existing marker and refresh its backing data.
    fn update_marker(
        &mut self,
        handle: &MarkerHandle,
        record: &FlightRecord,
        rotation: f64,
    ) -> Result<(), CacheError>;

    /// Remove a marker from the surface.
    fn release_marker(&mut self, handle: MarkerHandle) -> Result<(), CacheError>;
}

/// Result of a single [`FlightCache::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First sighting; a marker was created.
    Created,
    /// Existing marker moved in place.
    Updated,
    /// The cached handle was unknown to the surface and had to be replaced.
    Recreated,
}

/// What a [`FlightCache::reconcile`] pass removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Every flight removed from the cache, in no particular order.
    pub evicted: Vec<FlightId>,
    /// Evicted flights whose marker release failed.
    pub inconsistent: Vec<FlightId>,
}

#[derive(Debug)]
struct CacheEntry {
    record: FlightRecord,
    rotation: f64,
    handle: MarkerHandle,
}

/// Flight id → (latest record, owned marker).
#[derive(Debug, Default)]
pub struct FlightCache {
    entries: HashMap<FlightId, CacheEntry>,
}

impl FlightCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a newly seen flight or move the marker of a known one.
    ///
    /// Never leaves more than one live marker per flight id.
    pub fn upsert<S>(&mut self, surface: &mut S, record: FlightRecord) -> UpsertOutcome
    where
        S: MarkerSurface + ?Sized,
    {
        let rotation = bearing(record.previous, record.position);

        match self.entries.entry(record.id) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let outcome = match surface.update_marker(&entry.handle, &record, rotation) {
                    Ok(()) => UpsertOutcome::Updated,
                    Err(e) => {
                        error!(
                            "Cache inconsistency: flight {} lost marker ({}), recreating it",
                            record.id, e
                        );
                        entry.handle = surface.create_marker(&record, rotation);
                        UpsertOutcome::Recreated
                    }
                };
                entry.record = record;
                entry.rotation = rotation;
                outcome
            }
            Entry::Vacant(vacant) => {
                let handle = surface.create_marker(&record, rotation);
                vacant.insert(CacheEntry {
                    record,
                    rotation,
                    handle,
                });
                UpsertOutcome::Created
            }
        }
    }

    /// Evict every cached flight that is absent from `snapshot`.
    ///
    /// Call once per poll, after all upserts for that poll. A marker that the
    /// surface no longer knows is logged and the pass carries on with the
    /// remaining stale entries.
    pub fn reconcile<S>(&mut self, surface: &mut S, snapshot: &Snapshot) -> ReconcileReport
    where
        S: MarkerSurface + ?Sized,
    {
        let stale: Vec<FlightId> = self
            .entries
            .keys()
            .filter(|id| !snapshot.contains(id))
            .copied()
            .collect();

        let mut report = ReconcileReport::default();
        for id in stale {
            let Some(entry) = self.entries.remove(&id) else {
                continue;
            };
            if let Err(e) = surface.release_marker(entry.handle) {
                error!("Cache inconsistency while evicting flight {}: {}", id, e);
                report.inconsistent.push(id);
            }
            report.evicted.push(id);
        }

        if !report.evicted.is_empty() {
            debug!(
                "Evicted {} stale flights ({} remain)",
                report.evicted.len(),
                self.entries.len()
            );
        }
        report
    }

    /// Release every marker and empty the cache.
    pub fn clear<S>(&mut self, surface: &mut S)
    where
        S: MarkerSurface + ?Sized,
    {
        for (id, entry) in self.entries.drain() {
            if let Err(e) = surface.release_marker(entry.handle) {
                error!("Cache inconsistency while clearing flight {}: {}", id, e);
            }
        }
    }

    /// Latest known record for a flight.
    #[must_use]
    pub fn get(&self, id: FlightId) -> Option<&FlightRecord> {
        self.entries.get(&id).map(|e| &e.record)
    }

    /// Current marker rotation for a flight.
    #[must_use]
    pub fn rotation(&self, id: FlightId) -> Option<f64> {
        self.entries.get(&id).map(|e| e.rotation)
    }

    #[must_use]
    pub fn marker_id(&self, id: FlightId) -> Option<MarkerId> {
        self.entries.get(&id).map(|e| e.handle.id())
    }

    /// Reverse lookup from a clicked marker to its flight.
    #[must_use]
    pub fn find_by_marker(&self, marker: MarkerId) -> Option<&FlightRecord> {
        self.entries
            .values()
            .find(|e| e.handle.id() == marker)
            .map(|e| &e.record)
    }

    #[must_use]
    pub fn contains(&self, id: FlightId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = FlightId> + '_ {
        self.entries.keys().copied()
    }

    pub fn records(&self) -> impl Iterator<Item = &FlightRecord> {
        self.entries.values().map(|e| &e.record)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
    use super::testing::{flight, FakeSurface};
    use super::*;
    use crate::geo::{Coordinate, DEGENERATE_BEARING_DEG};
    use crate::model::snapshot_of;

    #[test]
    fn test_single_flight_then_empty_snapshot() {
        let mut surface = FakeSurface::default();
        let mut cache = FlightCache::new();

        let outcome = cache.upsert(&mut surface, flight(1, (10.0, 20.0), (11.0, 21.0)));
        assert_eq!(outcome, UpsertOutcome::Created);
        assert_eq!(cache.len(), 1);

        let marker = cache.marker_id(1).unwrap();
        assert_eq!(surface.markers[&marker].0, Coordinate::new(11.0, 21.0));

        let report = cache.reconcile(&mut surface, &Snapshot::new());
        assert_eq!(report.evicted, vec![1]);
        assert!(report.inconsistent.is_empty());
        assert!(cache.is_empty());
        assert!(surface.markers.is_empty());
        assert_eq!(surface.released, 1);
    }

    #[test]
    fn test_repeated_sighting_moves_existing_marker() {
        let mut surface = FakeSurface::default();
        let mut cache = FlightCache::new();

        cache.upsert(&mut surface, flight(7, (40.0, 25.0), (40.5, 25.5)));
        let first_marker = cache.marker_id(7).unwrap();

        let second = flight(7, (40.5, 25.5), (40.5, 26.5));
        let expected_rotation = bearing(second.previous, second.position);
        let outcome = cache.upsert(&mut surface, second);

        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(cache.len(), 1);
        assert_eq!(surface.created, 1);
        assert_eq!(surface.markers.len(), 1);
        assert_eq!(cache.marker_id(7), Some(first_marker));

        let (pos, rotation) = surface.markers[&first_marker];
        assert_eq!(pos, Coordinate::new(40.5, 26.5));
        assert!((rotation - expected_rotation).abs() < 1e-9);
        assert_eq!(cache.rotation(7), Some(rotation));
        assert_eq!(cache.get(7).unwrap().position, Coordinate::new(40.5, 26.5));
    }

    #[test]
    fn test_poll_cycle_keeps_exactly_snapshot_ids() {
        let mut surface = FakeSurface::default();
        let mut cache = FlightCache::new();

        let first: Vec<_> = (1..=5).map(|id| flight(id, (0.0, 0.0), (1.0, 1.0))).collect();
        for record in first.clone() {
            cache.upsert(&mut surface, record);
        }
        cache.reconcile(&mut surface, &snapshot_of(&first));
        assert_eq!(cache.len(), 5);

        let second: Vec<_> = [2, 4, 6]
            .into_iter()
            .map(|id| flight(id, (1.0, 1.0), (2.0, 2.0)))
            .collect();
        for record in second.clone() {
            cache.upsert(&mut surface, record);
        }
        let mut report = cache.reconcile(&mut surface, &snapshot_of(&second));
        report.evicted.sort_unstable();

        assert_eq!(report.evicted, vec![1, 3, 5]);
        let mut ids: Vec<_> = cache.ids().collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 4, 6]);
        assert_eq!(surface.markers.len(), 3);
    }

    #[test]
    fn test_stationary_flight_gets_degenerate_rotation() {
        let mut surface = FakeSurface::default();
        let mut cache = FlightCache::new();
        cache.upsert(&mut surface, flight(3, (5.0, 5.0), (5.0, 5.0)));
        assert_eq!(cache.rotation(3), Some(DEGENERATE_BEARING_DEG));
    }

    #[test]
    fn test_lost_marker_is_replaced_not_duplicated() {
        let mut surface = FakeSurface::default();
        let mut cache = FlightCache::new();

        cache.upsert(&mut surface, flight(9, (0.0, 0.0), (1.0, 1.0)));
        let lost = cache.marker_id(9).unwrap();
        surface.forget(lost);

        let outcome = cache.upsert(&mut surface, flight(9, (1.0, 1.0), (2.0, 2.0)));
        assert_eq!(outcome, UpsertOutcome::Recreated);
        assert_eq!(surface.markers.len(), 1);
        assert_ne!(cache.marker_id(9), Some(lost));
    }

    #[test]
    fn test_reconcile_continues_after_inconsistent_entry() {
        let mut surface = FakeSurface::default();
        let mut cache = FlightCache::new();

        for id in 1..=4 {
            cache.upsert(&mut surface, flight(id, (0.0, 0.0), (1.0, 1.0)));
        }
        surface.forget(cache.marker_id(2).unwrap());

        let report = cache.reconcile(&mut surface, &Snapshot::new());
        assert_eq!(report.evicted.len(), 4);
        assert_eq!(report.inconsistent, vec![2]);
        assert!(cache.is_empty());
        assert!(surface.markers.is_empty());
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut surface = FakeSurface::default();
        let mut cache = FlightCache::new();
        for id in 1..=3 {
            cache.upsert(&mut surface, flight(id, (0.0, 0.0), (1.0, 1.0)));
        }

        cache.clear(&mut surface);
        assert!(cache.is_empty());
        assert!(surface.markers.is_empty());
        assert_eq!(surface.released, 3);
    }

    #[test]
    fn test_find_by_marker() {
        let mut surface = FakeSurface::default();
        let mut cache = FlightCache::new();
        cache.upsert(&mut surface, flight(11, (0.0, 0.0), (1.0, 1.0)));
        cache.upsert(&mut surface, flight(12, (0.0, 0.0), (2.0, 2.0)));

        let marker = cache.marker_id(12).unwrap();
        assert_eq!(cache.find_by_marker(marker).map(|r| r.id), Some(12));
        assert!(cache.find_by_marker(MarkerId(999)).is_none());
        assert!(cache.get(13).is_none());
    }
}
