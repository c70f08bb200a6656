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

//! Flight, position and airport records, plus their backend wire shapes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// Backend flight identifier. Stable across snapshots for the same flight.
pub type FlightId = u64;

/// Identifiers returned by one poll.
pub type Snapshot = HashSet<FlightId>;

/// A named point on the map (departure or arrival airport).
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub coordinate: Coordinate,
    pub name: String,
}

/// Latest known state of a single flight.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightRecord {
    pub id: FlightId,
    pub start: Location,
    pub end: Location,
    /// Scheduled departure, when the backend provides it.
    pub departure_time: Option<DateTime<Utc>>,
    pub last_updated_at: DateTime<Utc>,
    /// Current position.
    pub position: Coordinate,
    /// Position at the previous sample, used to orient the marker.
    pub previous: Coordinate,
}

impl FlightRecord {
    /// Popup title in the form `"Start → End"`.
    #[must_use]
    pub fn route_label(&self) -> String {
        format!("{} → {}", self.start.name, self.end.name)
    }
}

/// Build the snapshot id set for a batch of records.
#[must_use]
pub fn snapshot_of(records: &[FlightRecord]) -> Snapshot {
    records.iter().map(|r| r.id).collect()
}

/// Flight snapshot as served by `GET /api/flights`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightDto {
    pub id: FlightId,

    pub start_lat: f64,
    pub start_lng: f64,
    pub start_location_name: String,

    pub end_lat: f64,
    pub end_lng: f64,
    pub end_location_name: String,

    #[serde(with = "iso_time")]
    pub last_updated_at: DateTime<Utc>,

    #[serde(default, with = "iso_time::option")]
    pub departure_time: Option<DateTime<Utc>>,

    pub pos_lat: f64,
    pub pos_lng: f64,

    pub prev_lat: f64,
    pub prev_lng: f64,
}

impl From<FlightDto> for FlightRecord {
    fn from(dto: FlightDto) -> Self {
        Self {
            id: dto.id,
            start: Location {
                coordinate: Coordinate::new(dto.start_lat, dto.start_lng),
                name: dto.start_location_name,
            },
            end: Location {
                coordinate: Coordinate::new(dto.end_lat, dto.end_lng),
                name: dto.end_location_name,
            },
            departure_time: dto.departure_time,
            last_updated_at: dto.last_updated_at,
            position: Coordinate::new(dto.pos_lat, dto.pos_lng),
            previous: Coordinate::new(dto.prev_lat, dto.prev_lng),
        }
    }
}

/// One historical fix of a flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightPositionSample {
    pub coordinate: Coordinate,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PositionDto {
    pub lat: f64,
    pub lng: f64,
    #[serde(with = "iso_time")]
    pub time: DateTime<Utc>,
}

impl From<PositionDto> for FlightPositionSample {
    fn from(dto: PositionDto) -> Self {
        Self {
            coordinate: Coordinate::new(dto.lat, dto.lng),
            time: dto.time,
        }
    }
}

/// Airport marker data from `GET /api/airports`.
#[derive(Debug, Clone, PartialEq)]
pub struct Airport {
    pub coordinate: Coordinate,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AirportDto {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
}

impl From<AirportDto> for Airport {
    fn from(dto: AirportDto) -> Self {
        Self {
            coordinate: Coordinate::new(dto.lat, dto.lng),
            name: dto.name,
        }
    }
}

/// ISO 8601 timestamps as the backend sends them. Values without an offset
/// are read as UTC.
pub(crate) mod iso_time {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub(crate) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(at.with_timezone(&Utc));
        }
        if let Ok(naive) = raw.parse::<NaiveDateTime>() {
            return Some(Utc.from_utc_datetime(&naive));
        }
        raw.parse::<NaiveDate>()
            .ok()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp {raw:?}")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        #[allow(clippy::ref_option, reason = "signature required by serde(with)")]
        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(at) => super::serialize(at, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| {
                    super::parse(&raw)
                        .ok_or_else(|| de::Error::custom(format!("invalid timestamp {raw:?}")))
                })
                .transpose()
        }
    }
}
