//! Map rendering and tile management.
//!
//! This module provides map tile fetching and caching, the marker arena the
//! flight cache draws into, and the map canvas itself.

pub mod markers;
pub mod tiles;
pub mod view;

pub use markers::MarkerLayer;
pub use view::{MapResponse, MapView};
