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

//! OpenStreetMap raster tiles with a disk cache.
//!
//! Tiles are fetched on background threads and cached on disk under a
//! SHA256 of their URL. Cached files older than a week are removed at
//! startup.

use egui::{ColorImage, TextureHandle};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

pub const TILE_SIZE: f32 = 256.0;
pub const MIN_ZOOM: u8 = 2;
pub const MAX_ZOOM: u8 = 19;
const CACHE_DURATION_DAYS: u64 = 7;
const USER_AGENT: &str = concat!("flightmap-desktop/", env!("CARGO_PKG_VERSION"));

/// Web Mercator projection utilities
#[derive(Debug)]
pub struct WebMercator;

impl WebMercator {
    /// Latitude to fractional tile Y at `zoom`
    pub fn lat_to_y(lat: f64, zoom: u8) -> f64 {
        let lat_rad = lat.to_radians();
        let n = 2_f64.powi(i32::from(zoom));
        (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0 * n
    }

    /// Longitude to fractional tile X at `zoom`
    pub fn lon_to_x(lon: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        (lon + 180.0) / 360.0 * n
    }

    /// Fractional tile Y back to latitude
    pub fn y_to_lat(y: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        (std::f64::consts::PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees()
    }

    /// Fractional tile X back to longitude
    pub fn x_to_lon(x: f64, zoom: u8) -> f64 {
        let n = 2_f64.powi(i32::from(zoom));
        x / n * 360.0 - 180.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, zoom: u8) -> Self {
        Self { x, y, zoom }
    }

    pub fn url(&self) -> String {
        format!(
            "https://tile.openstreetmap.org/{}/{}/{}.png",
            self.zoom, self.x, self.y
        )
    }

    fn cache_filename(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.url().as_bytes());
        format!("{:x}.png", hasher.finalize())
    }
}

enum TileState {
    Loading,
    Loaded(TextureHandle),
    Failed,
}

/// A tile placed relative to the viewport center, in pixels.
#[derive(Debug, Clone, Copy)]
pub struct PlacedTile {
    pub coord: TileCoord,
    pub offset_x: f32,
    pub offset_y: f32,
}

pub struct TileManager {
    cache_dir: PathBuf,
    client: reqwest::blocking::Client,
    tiles: Arc<Mutex<HashMap<TileCoord, TileState>>>,
    in_flight: Arc<Mutex<HashSet<TileCoord>>>,
}

impl std::fmt::Debug for TileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileManager")
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl TileManager {
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("flightmap-desktop")
            .join("tiles");

        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!("Failed to create tile cache directory {:?}: {}", cache_dir, e);
        }
        Self::cleanup_old_tiles(&cache_dir);

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default tile client: {}", e);
                reqwest::blocking::Client::new()
            });

        Self {
            cache_dir,
            client,
            tiles: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn cleanup_old_tiles(cache_dir: &Path) {
        let now = SystemTime::now();
        let max_age = Duration::from_secs(CACHE_DURATION_DAYS * 24 * 60 * 60);

        let Ok(entries) = fs::read_dir(cache_dir) else {
            return;
        };
        for entry in entries.flatten() {
            let expired = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .is_some_and(|age| age > max_age);
            if expired {
                match fs::remove_file(entry.path()) {
                    Ok(()) => debug!("Removed old tile cache: {:?}", entry.path()),
                    Err(e) => warn!("Failed to remove old tile cache {:?}: {}", entry.path(), e),
                }
            }
        }
    }

    /// Texture for `coord`, or `None` while it is loading or after it failed.
    pub fn get_tile(&self, coord: TileCoord, ctx: &egui::Context) -> Option<TextureHandle> {
        let Ok(mut tiles) = self.tiles.lock() else {
            return None;
        };

        match tiles.get(&coord) {
            Some(TileState::Loaded(texture)) => return Some(texture.clone()),
            Some(TileState::Loading | TileState::Failed) => return None,
            None => {}
        }

        let cache_path = self.cache_dir.join(coord.cache_filename());
        if let Ok(bytes) = fs::read(&cache_path) {
            match decode_tile(&bytes, coord, ctx) {
                Ok(texture) => {
                    tiles.insert(coord, TileState::Loaded(texture.clone()));
                    return Some(texture);
                }
                Err(e) => warn!("Discarding unreadable cached tile {:?}: {}", cache_path, e),
            }
        }

        tiles.insert(coord, TileState::Loading);
        drop(tiles);
        self.queue_download(coord, ctx.clone());
        None
    }

    fn queue_download(&self, coord: TileCoord, ctx: egui::Context) {
        let Ok(mut in_flight) = self.in_flight.lock() else {
            return;
        };
        if !in_flight.insert(coord) {
            return;
        }

        let tiles = Arc::clone(&self.tiles);
        let in_flight_set = Arc::clone(&self.in_flight);
        let cache_path = self.cache_dir.join(coord.cache_filename());
        let client = self.client.clone();

        std::thread::spawn(move || {
            let state = match download_tile(&client, coord, &cache_path, &ctx) {
                Ok(texture) => TileState::Loaded(texture),
                Err(e) => {
                    warn!("Failed to load tile {}: {}", coord.url(), e);
                    TileState::Failed
                }
            };
            if let Ok(mut tiles) = tiles.lock() {
                tiles.insert(coord, state);
            }
            if let Ok(mut in_flight) = in_flight_set.lock() {
                in_flight.remove(&coord);
            }
            ctx.request_repaint();
        });
    }

    /// Tiles covering a viewport centered on (`center_lat`, `center_lon`)
    pub fn get_visible_tiles(
        center_lat: f64,
        center_lon: f64,
        zoom: u8,
        viewport_width: f32,
        viewport_height: f32,
    ) -> Vec<PlacedTile> {
        let center_x = WebMercator::lon_to_x(center_lon, zoom);
        let center_y = WebMercator::lat_to_y(center_lat, zoom);

        #[allow(clippy::cast_possible_truncation, reason = "viewport sizes are small")]
        let tiles_wide = (viewport_width / TILE_SIZE).ceil() as i64 + 2;
        #[allow(clippy::cast_possible_truncation, reason = "viewport sizes are small")]
        let tiles_high = (viewport_height / TILE_SIZE).ceil() as i64 + 2;

        #[allow(clippy::cast_possible_truncation, reason = "tile indices fit in i64")]
        let start_x = center_x.floor() as i64 - tiles_wide / 2;
        #[allow(clippy::cast_possible_truncation, reason = "tile indices fit in i64")]
        let start_y = center_y.floor() as i64 - tiles_high / 2;

        let max_tile = 1_i64 << zoom;
        let mut placed = Vec::new();

        for dy in 0..tiles_high {
            for dx in 0..tiles_wide {
                let tile_x = start_x + dx;
                let tile_y = start_y + dy;

                // Latitude doesn't wrap
                if tile_y < 0 || tile_y >= max_tile {
                    continue;
                }
                let wrapped_x = tile_x.rem_euclid(max_tile);

                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    reason = "bounded by max_tile, at most 2^19"
                )]
                let coord = TileCoord::new(wrapped_x as u32, tile_y as u32, zoom);
                #[allow(clippy::cast_precision_loss, reason = "tile indices are small")]
                let (offset_x, offset_y) = (
                    (tile_x as f64 - center_x) * f64::from(TILE_SIZE),
                    (tile_y as f64 - center_y) * f64::from(TILE_SIZE),
                );

                placed.push(PlacedTile {
                    coord,
                    offset_x: offset_x as f32,
                    offset_y: offset_y as f32,
                });
            }
        }

        placed
    }

    pub fn has_loading_tiles(&self) -> bool {
        self.tiles
            .lock()
            .map(|tiles| tiles.values().any(|s| matches!(s, TileState::Loading)))
            .unwrap_or(false)
    }

    pub fn get_error_count(&self) -> usize {
        self.tiles
            .lock()
            .map(|tiles| tiles.values().filter(|s| matches!(s, TileState::Failed)).count())
            .unwrap_or(0)
    }
}

impl Default for TileManager {
    fn default() -> Self {
        Self::new()
    }
}

fn download_tile(
    client: &reqwest::blocking::Client,
    coord: TileCoord,
    cache_path: &Path,
    ctx: &egui::Context,
) -> Result<TextureHandle, Box<dyn std::error::Error + Send + Sync>> {
    let response = client.get(coord.url()).send()?;
    if !response.status().is_success() {
        return Err(format!("HTTP error: {}", response.status()).into());
    }
    let bytes = response.bytes()?;

    if let Err(e) = fs::write(cache_path, &bytes) {
        warn!("Failed to save tile to cache: {}", e);
    }
    decode_tile(&bytes, coord, ctx)
}

fn decode_tile(
    bytes: &[u8],
    coord: TileCoord,
    ctx: &egui::Context,
) -> Result<TextureHandle, Box<dyn std::error::Error + Send + Sync>> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let color_image = ColorImage::from_rgba_unmultiplied(size, &rgba.into_raw());

    Ok(ctx.load_texture(
        format!("tile_{}_{}_{}", coord.zoom, coord.x, coord.y),
        color_image,
        egui::TextureOptions::default(),
    ))
}
