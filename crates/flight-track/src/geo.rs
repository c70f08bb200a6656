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

//! Geographic helpers for orienting and routing flight markers.
//!
//! Headings here are planar approximations computed directly on lat/lng
//! deltas. They are good enough to point an icon in the direction of travel
//! between two closely spaced fixes, not for navigation.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in nautical miles.
const EARTH_RADIUS_NM: f64 = 3440.065;

/// Offset between the airplane glyph's native nose direction and north-up.
///
/// The glyph is drawn with its nose pointing 86° east of north, so a marker
/// rotation of `heading - 86` makes it face the direction of travel.
pub const ICON_HEADING_OFFSET_DEG: f64 = -86.0;

/// Rotation reported when a flight has not moved between samples.
///
/// `atan2(0, 0)` is `0`, shifted by [`ICON_HEADING_OFFSET_DEG`] and wrapped
/// into `[0, 360)`.
pub const DEGENERATE_BEARING_DEG: f64 = 274.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// Wrap an angle in degrees into `[0, 360)`.
fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 || wrapped == 0.0 {
        0.0
    } else {
        wrapped
    }
}

/// Planar heading from `prev` to `next` in degrees, north = 0, clockwise.
#[must_use]
pub fn heading(prev: Coordinate, next: Coordinate) -> f64 {
    let delta_lat = next.lat - prev.lat;
    let delta_lng = next.lng - prev.lng;
    normalize_degrees(delta_lng.atan2(delta_lat).to_degrees())
}

/// Marker rotation for a flight that moved from `prev` to `next`.
///
/// Always in `[0, 360)`. Returns [`DEGENERATE_BEARING_DEG`] when the two
/// positions are identical.
#[must_use]
pub fn bearing(prev: Coordinate, next: Coordinate) -> f64 {
    let delta_lat = next.lat - prev.lat;
    let delta_lng = next.lng - prev.lng;
    normalize_degrees(delta_lng.atan2(delta_lat).to_degrees() + ICON_HEADING_OFFSET_DEG)
}

/// Great-circle distance between two points in nautical miles.
#[must_use]
pub fn haversine_distance_nm(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_NM * c
}

fn to_unit_vector(c: Coordinate) -> [f64; 3] {
    let lat = c.lat.to_radians();
    let lng = c.lng.to_radians();
    [lat.cos() * lng.cos(), lat.cos() * lng.sin(), lat.sin()]
}

fn from_unit_vector(v: [f64; 3]) -> Coordinate {
    let lat = v[2].atan2((v[0] * v[0] + v[1] * v[1]).sqrt());
    let lng = v[1].atan2(v[0]);
    Coordinate::new(lat.to_degrees(), lng.to_degrees())
}

/// Points along the great circle from `from` to `to`, endpoints included.
///
/// Produces `segments + 1` points (a `segments` of zero is treated as one).
/// Coincident endpoints yield repeated copies of the same point; antipodal
/// endpoints, where the great circle is undefined, fall back to linear
/// interpolation in lat/lng.
#[must_use]
pub fn great_circle_points(from: Coordinate, to: Coordinate, segments: usize) -> Vec<Coordinate> {
    let segments = segments.max(1);
    let a = to_unit_vector(from);
    let b = to_unit_vector(to);

    let dot = (a[0] * b[0] + a[1] * b[1] + a[2] * b[2]).clamp(-1.0, 1.0);
    let omega = dot.acos();
    let sin_omega = omega.sin();

    #[allow(clippy::cast_precision_loss, reason = "segment counts are small")]
    let steps = segments as f64;

    (0..=segments)
        .map(|i| {
            #[allow(clippy::cast_precision_loss, reason = "segment counts are small")]
            let t = i as f64 / steps;

            if i == 0 {
                return from;
            }
            if i == segments {
                return to;
            }
            if omega.abs() < 1e-12 {
                return from;
            }
            if sin_omega.abs() < 1e-12 {
                return Coordinate::new(
                    from.lat + (to.lat - from.lat) * t,
                    from.lng + (to.lng - from.lng) * t,
                );
            }

            let wa = ((1.0 - t) * omega).sin() / sin_omega;
            let wb = (t * omega).sin() / sin_omega;
            from_unit_vector([
                wa * a[0] + wb * b[0],
                wa * a[1] + wb * b[1],
                wa * a[2] + wb * b[2],
            ])
        })
        .collect()
}
