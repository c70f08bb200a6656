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

//! Application configuration management.
//!
//! Configuration is stored as TOML through `confy`. Every field has a serde
//! default so older or hand-edited files keep loading as new settings are
//! added.

use std::time::Duration;

use flight_track::{ControllerConfig, ServiceConfig};
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "flightmap-desktop";
const CONFIG_NAME: &str = "config";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Flight backend base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Seconds between snapshot polls
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// `maxSize` for position history requests
    #[serde(default = "default_history_max_points")]
    pub history_max_points: usize,

    /// Segments in the projected great-circle arc
    #[serde(default = "default_great_circle_segments")]
    pub great_circle_segments: usize,

    /// Initial map center latitude
    #[serde(default = "default_center_lat")]
    pub default_center_lat: f64,

    /// Initial map center longitude
    #[serde(default = "default_center_lng")]
    pub default_center_lng: f64,

    /// Initial map zoom level (2.0 - 18.0)
    #[serde(default = "default_zoom")]
    pub default_zoom: f32,

    /// Show airport markers
    #[serde(default = "default_true")]
    pub show_airports: bool,
}

// Default value functions for serde
fn default_api_base_url() -> String {
    flight_track::service::DEFAULT_BASE_URL.to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_history_max_points() -> usize {
    200
}

fn default_great_circle_segments() -> usize {
    64
}

fn default_center_lat() -> f64 {
    43.0 // Marmara
}

fn default_center_lng() -> f64 {
    27.1278
}

fn default_zoom() -> f32 {
    6.0
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            history_max_points: default_history_max_points(),
            great_circle_segments: default_great_circle_segments(),
            default_center_lat: default_center_lat(),
            default_center_lng: default_center_lng(),
            default_zoom: default_zoom(),
            show_airports: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from disk
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, CONFIG_NAME)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, CONFIG_NAME, self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            base_url: self.api_base_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            history_max_points: self.history_max_points,
            great_circle_segments: self.great_circle_segments,
        }
    }
}
