use crate::core::constants::{MAX_TILE_ZOOM, TILE_KEY_SCHEME};
use crate::core::geo::TileCoord;
use crate::core::viewport::Viewport;
use crate::data::category::Category;
use crate::MapError;
use std::fmt;
use std::str::FromStr;

/// Cache and coalescing key: the tile under the view center, per category.
///
/// Views whose centers fall into the same tile at the same integer zoom share
/// a key even when their bounds differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub z: u8,
    pub x: u32,
    pub y: u32,
    pub category: Category,
}

impl TileKey {
    pub fn new(viewport: &Viewport, category: Category) -> Self {
        Self::from_tile(viewport.center_tile(), category)
    }

    pub fn from_tile(tile: TileCoord, category: Category) -> Self {
        Self {
            z: tile.z,
            x: tile.x,
            y: tile.y,
            category,
        }
    }

    pub fn tile(&self) -> TileCoord {
        TileCoord::new(self.x, self.y, self.z)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            TILE_KEY_SCHEME, self.z, self.x, self.y, self.category
        )
    }
}

impl FromStr for TileKey {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MapError::InvalidTileKey(s.to_string());

        let parts: Vec<&str> = s.split(':').collect();
        let [scheme, z, x, y, category] = parts.as_slice() else {
            return Err(invalid());
        };
        if *scheme != TILE_KEY_SCHEME {
            return Err(invalid());
        }

        let key = TileKey {
            z: z.parse().map_err(|_| invalid())?,
            x: x.parse().map_err(|_| invalid())?,
            y: y.parse().map_err(|_| invalid())?,
            category: category.parse().map_err(|_| invalid())?,
        };

        if key.z > MAX_TILE_ZOOM || !key.tile().is_valid() {
            return Err(invalid());
        }
        Ok(key)
    }
}
