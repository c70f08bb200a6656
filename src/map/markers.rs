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

//! Rendered flight markers.
//!
//! [`MarkerLayer`] is the arena behind the flight cache: each marker the cache
//! creates lives here until the cache hands its handle back.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use flight_track::geo::haversine_distance_nm;
use flight_track::{CacheError, Coordinate, FlightRecord, MarkerHandle, MarkerId, MarkerSurface};

/// Everything the painter needs to draw one flight.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMarker {
    pub position: Coordinate,
    pub rotation: f64,
    pub start: Coordinate,
    pub end: Coordinate,
    pub route_label: String,
    pub last_updated_at: DateTime<Utc>,
}

impl RenderedMarker {
    fn from_record(record: &FlightRecord, rotation: f64) -> Self {
        Self {
            position: record.position,
            rotation,
            start: record.start.coordinate,
            end: record.end.coordinate,
            route_label: record.route_label(),
            last_updated_at: record.last_updated_at,
        }
    }

    /// Hover text: route, last fix and distance left to the destination.
    pub fn popup_text(&self) -> String {
        format!(
            "{}\nLast update: {}\nRemaining: {:.0} nm",
            self.route_label,
            self.last_updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            haversine_distance_nm(self.position, self.end)
        )
    }
}

#[derive(Debug, Default)]
pub struct MarkerLayer {
    next_id: u64,
    markers: HashMap<MarkerId, RenderedMarker>,
}

impl MarkerLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: MarkerId) -> Option<&RenderedMarker> {
        self.markers.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MarkerId, &RenderedMarker)> {
        self.markers.iter().map(|(id, m)| (*id, m))
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    /// Marker nearest to `pointer` within `radius` pixels.
    pub fn hit_test<F>(&self, project: F, pointer: egui::Pos2, radius: f32) -> Option<MarkerId>
    where
        F: Fn(Coordinate) -> egui::Pos2,
    {
        self.markers
            .iter()
            .map(|(id, m)| (*id, project(m.position).distance(pointer)))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}

impl MarkerSurface for MarkerLayer {
    fn create_marker(&mut self, record: &FlightRecord, rotation: f64) -> MarkerHandle {
        self.next_id += 1;
        let id = MarkerId(self.next_id);
        self.markers
            .insert(id, RenderedMarker::from_record(record, rotation));
        MarkerHandle::new(id)
    }

    fn update_marker(
        &mut self,
        handle: &MarkerHandle,
        record: &FlightRecord,
        rotation: f64,
    ) -> Result<(), CacheError> {
        let marker = self
            .markers
            .get_mut(&handle.id())
            .ok_or(CacheError::UnknownMarker(handle.id()))?;
        *marker = RenderedMarker::from_record(record, rotation);
        Ok(())
    }

    fn release_marker(&mut self, handle: MarkerHandle) -> Result<(), CacheError> {
        self.markers
            .remove(&handle.id())
            .map(|_| ())
            .ok_or(CacheError::UnknownMarker(handle.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flight_track::{FlightCache, Location, Snapshot};

    fn record(id: u64, lat: f64, lng: f64) -> FlightRecord {
        FlightRecord {
            id,
            start: Location {
                coordinate: Coordinate::new(41.2753, 28.7519),
                name: "Istanbul".to_string(),
            },
            end: Location {
                coordinate: Coordinate::new(42.6952, 23.4062),
                name: "Sofia".to_string(),
            },
            departure_time: None,
            last_updated_at: Utc::now(),
            position: Coordinate::new(lat, lng),
            previous: Coordinate::new(lat - 0.1, lng + 0.1),
        }
    }

    #[test]
    fn test_popup_shows_remaining_distance() {
        use chrono::TimeZone;

        let mut flight = record(1, 42.6952, 23.4062);
        flight.last_updated_at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 5).unwrap();
        let at_destination = RenderedMarker::from_record(&flight, 0.0);
        assert_eq!(
            at_destination.popup_text(),
            "Istanbul → Sofia\nLast update: 2025-03-01 12:00:05 UTC\nRemaining: 0 nm"
        );

        // One degree of latitude south of Sofia is 60 nm out
        flight.position = Coordinate::new(41.6952, 23.4062);
        let en_route = RenderedMarker::from_record(&flight, 0.0);
        assert!(en_route.popup_text().ends_with("Remaining: 60 nm"));
    }

    #[test]
    fn test_layer_follows_cache_lifecycle() {
        let mut layer = MarkerLayer::new();
        let mut cache = FlightCache::new();

        cache.upsert(&mut layer, record(1, 42.0, 26.0));
        cache.upsert(&mut layer, record(1, 42.1, 25.9));
        assert_eq!(layer.len(), 1);

        let marker = layer.get(cache.marker_id(1).unwrap()).unwrap();
        assert_eq!(marker.position, Coordinate::new(42.1, 25.9));
        assert_eq!(marker.route_label, "Istanbul → Sofia");

        cache.reconcile(&mut layer, &Snapshot::new());
        assert_eq!(layer.len(), 0);
    }

    #[test]
    fn test_release_unknown_marker_fails() {
        let mut layer = MarkerLayer::new();
        let result = layer.release_marker(MarkerHandle::new(MarkerId(3)));
        assert_eq!(result, Err(CacheError::UnknownMarker(MarkerId(3))));
    }

    #[test]
    fn test_hit_test_picks_nearest() {
        let mut layer = MarkerLayer::new();
        let mut cache = FlightCache::new();
        cache.upsert(&mut layer, record(1, 10.0, 10.0));
        cache.upsert(&mut layer, record(2, 12.0, 12.0));

        // Identity-ish projection: one degree per pixel
        #[allow(clippy::cast_possible_truncation, reason = "test coordinates are small")]
        let project = |c: Coordinate| egui::pos2(c.lng as f32, c.lat as f32);

        let hit = layer.hit_test(project, egui::pos2(11.8, 11.7), 2.0);
        assert_eq!(hit, cache.marker_id(2));
        assert!(layer.hit_test(project, egui::pos2(50.0, 50.0), 2.0).is_none());
    }
}
