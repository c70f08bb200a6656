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

//! In-memory marker surface and record builders for unit tests.

use std::collections::HashMap;

use chrono::Utc;

use super::{CacheError, MarkerHandle, MarkerId, MarkerSurface};
use crate::geo::Coordinate;
use crate::model::{FlightId, FlightRecord, Location};

#[derive(Debug, Default)]
pub(crate) struct FakeSurface {
    pub(crate) next_id: u64,
    pub(crate) markers: HashMap<MarkerId, (Coordinate, f64)>,
    pub(crate) created: usize,
    pub(crate) released: usize,
}

impl FakeSurface {
    /// Drop a marker behind the cache's back.
    pub(crate) fn forget(&mut self, id: MarkerId) {
        self.markers.remove(&id);
    }
}

impl MarkerSurface for FakeSurface {
    fn create_marker(&mut self, record: &FlightRecord, rotation: f64) -> MarkerHandle {
        self.next_id += 1;
        let id = MarkerId(self.next_id);
        self.markers.insert(id, (record.position, rotation));
        self.created += 1;
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
        *marker = (record.position, rotation);
        Ok(())
    }

    fn release_marker(&mut self, handle: MarkerHandle) -> Result<(), CacheError> {
        self.markers
            .remove(&handle.id())
            .map(|_| self.released += 1)
            .ok_or(CacheError::UnknownMarker(handle.id()))
    }
}

pub(crate) fn flight(id: FlightId, prev: (f64, f64), pos: (f64, f64)) -> FlightRecord {
    FlightRecord {
        id,
        start: Location {
            coordinate: Coordinate::new(41.0, 28.0),
            name: "Start".to_string(),
        },
        end: Location {
            coordinate: Coordinate::new(42.0, 23.0),
            name: "End".to_string(),
        },
        departure_time: None,
        last_updated_at: Utc::now(),
        position: pos.into(),
        previous: prev.into(),
    }
}
