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

//! Date selection shared between the picker UI and the map controller.
//!
//! Every change is broadcast as a [`DateChange`]. The desktop app subscribes
//! once and forwards changes into the controller; there is no global event
//! bus.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use log::debug;
use tokio::sync::broadcast;

const DATE_CHANNEL_CAPACITY: usize = 16;

/// Emitted whenever the selected instant changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateChange {
    /// Selected day as `YYYY-MM-DD`, `None` when the selection was cleared.
    pub iso_date: Option<String>,
    /// Full selected instant.
    pub raw: Option<DateTime<Utc>>,
    /// Whether the selection follows the wall clock.
    pub live: bool,
}

impl DateChange {
    fn new(raw: Option<DateTime<Utc>>, live: bool) -> Self {
        Self {
            iso_date: raw.map(|d| d.format("%Y-%m-%d").to_string()),
            raw,
            live,
        }
    }
}

/// Holds the selected instant and broadcasts changes.
#[derive(Debug)]
pub struct DateSelector {
    value: Option<DateTime<Utc>>,
    live: bool,
    tx: broadcast::Sender<DateChange>,
}

impl Default for DateSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl DateSelector {
    /// Start in live mode at the current instant.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(DATE_CHANNEL_CAPACITY);
        Self {
            value: Some(Utc::now()),
            live: true,
            tx,
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DateChange> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn value(&self) -> Option<DateTime<Utc>> {
        self.value
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Pick a fixed instant (or clear the selection) and emit it.
    pub fn select(&mut self, value: Option<DateTime<Utc>>) {
        self.value = value;
        self.live = false;
        self.emit();
    }

    /// Pick a different day, keeping the current time of day.
    pub fn select_day(&mut self, day: NaiveDate) {
        let time = self.value.map_or_else(NaiveTime::default, |v| v.time());
        self.select(Some(Utc.from_utc_datetime(&day.and_time(time))));
    }

    /// Jump back to the current instant and follow the clock.
    pub fn go_live(&mut self) {
        self.value = Some(Utc::now());
        self.live = true;
        self.emit();
    }

    fn emit(&self) {
        let change = DateChange::new(self.value, self.live);
        // No receivers is fine; the UI may not have subscribed yet
        if self.tx.send(change).is_err() {
            debug!("Date change emitted with no subscribers");
        }
    }
}
