use crate::core::constants::MAX_TILE_ZOOM;
use crate::core::geo::{LatLng, LatLngBounds, TileCoord};
use serde::{Deserialize, Serialize};

/// The visible map region handed to the loader on every move or zoom event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// The geographic extent of the view
    pub bounds: LatLngBounds,
    /// The current (fractional) zoom level
    pub zoom: f64,
}

impl Viewport {
    pub fn new(bounds: LatLngBounds, zoom: f64) -> Self {
        Self { bounds, zoom }
    }

    /// Creates a viewport from west, south, east, north in degrees
    pub fn from_wsen(west: f64, south: f64, east: f64, north: f64, zoom: f64) -> Self {
        Self::new(LatLngBounds::from_coords(south, west, north, east), zoom)
    }

    /// Center of the view in geographical coordinates
    pub fn center(&self) -> LatLng {
        self.bounds.center()
    }

    /// Integer zoom the view's tile is computed at
    pub fn tile_zoom(&self) -> u8 {
        if !self.zoom.is_finite() {
            return 0;
        }
        self.zoom.floor().clamp(0.0, MAX_TILE_ZOOM as f64) as u8
    }

    /// Slippy-map tile containing the view center
    pub fn center_tile(&self) -> TileCoord {
        TileCoord::from_lat_lng(&self.center(), self.tile_zoom())
    }
}
