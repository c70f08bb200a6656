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

//! HTTP client for the flight tracking backend.
//!
//! Three endpoints are used:
//!
//! - `GET /api/flights?dateTime=<RFC3339>`: flights airborne at an instant
//! - `GET /api/flights/{id}/positions?dateTime=<RFC3339>&maxSize=<n>`: track
//!   history of one flight
//! - `GET /api/airports`: airport markers
//!
//! Responses are decoded item by item. A single malformed entry is logged and
//! skipped; only a body that is not a JSON array at all fails the request.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{error, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::model::{
    Airport, AirportDto, FlightDto, FlightId, FlightPositionSample, FlightRecord, PositionDto,
};

/// Default backend address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Errors returned by [`FlightTrackService`].
#[derive(Debug, Error)]
pub enum TrackError {
    /// The request never produced a response.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The backend answered with a non-success status.
    #[error("{url} returned HTTP {status}: {body}")]
    BadStatus {
        url: String,
        status: u16,
        body: String,
    },

    /// The body did not have the expected overall shape.
    #[error("malformed payload from {url}: {reason}")]
    MalformedPayload { url: String, reason: String },
}

/// Connection settings for the backend.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL without trailing slash, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Format an instant the way the backend expects in `dateTime`.
#[must_use]
pub fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a JSON array, skipping entries that don't match `T`.
///
/// Returns the decoded items and the number skipped.
pub(crate) fn decode_items<T: DeserializeOwned>(
    url: &str,
    body: Value,
) -> Result<(Vec<T>, usize), TrackError> {
    let Value::Array(items) = body else {
        return Err(TrackError::MalformedPayload {
            url: url.to_string(),
            reason: "expected a JSON array".to_string(),
        });
    };

    let mut decoded = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<T>(item) {
            Ok(value) => decoded.push(value),
            Err(e) => {
                warn!("Skipping malformed entry {} from {}: {}", index, url, e);
                skipped += 1;
            }
        }
    }
    Ok((decoded, skipped))
}

/// Client for flight snapshots, track history and airports.
#[derive(Debug, Clone)]
pub struct FlightTrackService {
    client: reqwest::Client,
    base_url: String,
}

impl FlightTrackService {
    pub fn new(config: ServiceConfig) -> Result<Self, TrackError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| TrackError::Network {
                url: config.base_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_array<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, TrackError> {
        let network = |source| TrackError::Network {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrackError::BadStatus {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(network)?;
        let body: Value =
            serde_json::from_str(&text).map_err(|e| TrackError::MalformedPayload {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        decode_items(url, body).map(|(items, _)| items)
    }

    /// Flights airborne at `at`.
    pub async fn fetch_flights_at(
        &self,
        at: DateTime<Utc>,
    ) -> Result<Vec<FlightRecord>, TrackError> {
        let url = self.endpoint("/api/flights");
        let flights: Vec<FlightDto> = self
            .get_array(&url, &[("dateTime", format_instant(at))])
            .await?;
        Ok(flights.into_iter().map(FlightRecord::from).collect())
    }

    /// Up to `max_points` historical fixes for a flight, oldest first.
    pub async fn fetch_position_history(
        &self,
        flight_id: FlightId,
        as_of: DateTime<Utc>,
        max_points: usize,
    ) -> Result<Vec<FlightPositionSample>, TrackError> {
        let url = self.endpoint(&format!("/api/flights/{flight_id}/positions"));
        let positions: Vec<PositionDto> = self
            .get_array(
                &url,
                &[
                    ("dateTime", format_instant(as_of)),
                    ("maxSize", max_points.to_string()),
                ],
            )
            .await?;

        let mut samples: Vec<FlightPositionSample> =
            positions.into_iter().map(FlightPositionSample::from).collect();
        samples.sort_by_key(|s| s.time);
        Ok(samples)
    }

    /// All airports known to the backend.
    pub async fn fetch_airports(&self) -> Result<Vec<Airport>, TrackError> {
        let url = self.endpoint("/api/airports");
        let airports: Vec<AirportDto> = self.get_array(&url, &[]).await?;
        Ok(airports.into_iter().map(Airport::from).collect())
    }

    /// [`Self::fetch_flights_at`], logging failures as "no data this cycle".
    pub async fn flights_or_empty(&self, at: DateTime<Utc>) -> Vec<FlightRecord> {
        self.fetch_flights_at(at).await.unwrap_or_else(|e| {
            error!("Failed to load flights: {}", e);
            Vec::new()
        })
    }

    /// [`Self::fetch_position_history`], logging failures.
    pub async fn history_or_empty(
        &self,
        flight_id: FlightId,
        as_of: DateTime<Utc>,
        max_points: usize,
    ) -> Vec<FlightPositionSample> {
        self.fetch_position_history(flight_id, as_of, max_points)
            .await
            .unwrap_or_else(|e| {
                error!("Failed to load positions for flight {}: {}", flight_id, e);
                Vec::new()
            })
    }

    /// [`Self::fetch_airports`], logging failures.
    pub async fn airports_or_empty(&self) -> Vec<Airport> {
        self.fetch_airports().await.unwrap_or_else(|e| {
            error!("Failed to load airports: {}", e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_format_instant() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(format_instant(at), "2025-03-01T12:30:00.000Z");
    }

    #[test]
    fn test_decode_skips_malformed_airport() {
        let body = json!([
            {"lat": 51.4706, "lng": -0.461941, "name": "London Heathrow Airport"},
            {"lat": "51.4", "lng": -0.1, "name": "X"},
            {"lat": 41.2753, "lng": 28.7519, "name": "Istanbul Airport"}
        ]);

        let (airports, skipped) = decode_items::<AirportDto>("test", body).unwrap();
        assert_eq!(skipped, 1);
        let names: Vec<_> = airports.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["London Heathrow Airport", "Istanbul Airport"]);
    }

    #[test]
    fn test_decode_rejects_non_array() {
        let result = decode_items::<AirportDto>("test", json!({"error": "nope"}));
        assert!(matches!(result, Err(TrackError::MalformedPayload { .. })));
    }

    #[test]
    fn test_decode_positions_missing_lng() {
        let body = json!([
            {"lat": 1.0, "lng": 2.0, "time": "2025-03-01T12:00:00Z"},
            {"lat": 1.5, "time": "2025-03-01T12:01:00Z"}
        ]);
        let (positions, skipped) = decode_items::<PositionDto>("test", body).unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let service = FlightTrackService::new(ServiceConfig {
            base_url: "http://example.test:8080/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(service.base_url(), "http://example.test:8080");
        assert_eq!(
            service.endpoint("/api/airports"),
            "http://example.test:8080/api/airports"
        );
    }
}
