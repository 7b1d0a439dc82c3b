//! Per-zoom loading policy
//!
//! One table drives geometry detail, paging budget and property detail so the
//! three stay in step as the user zooms in.

use crate::data::category::Category;

/// Which record fields end up in feature properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PropertyTier {
    /// Identity, category, code and active flag
    Basic,
    /// Basic plus a localized title
    Titled,
    /// Titled plus short name and a readable active label
    Full,
}

impl PropertyTier {
    pub fn for_zoom(zoom: f64) -> Self {
        if zoom < 12.0 {
            Self::Basic
        } else if zoom < 15.0 {
            Self::Titled
        } else {
            Self::Full
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomPolicy {
    /// Keep lines and full polygons; otherwise polygons become centroids
    pub include_full_geometry: bool,
    /// Douglas-Peucker tolerance in degrees
    pub simplification_tolerance: f64,
    pub page_size: u32,
    /// 999 stands for "as many pages as the API has"
    pub max_pages: u32,
    pub property_tier: PropertyTier,
}

impl ZoomPolicy {
    pub fn for_zoom(zoom: f64) -> Self {
        let (include_full_geometry, simplification_tolerance, page_size, max_pages) =
            if zoom <= 11.0 {
                (false, 0.001, 100, 1)
            } else if zoom <= 13.0 {
                (true, 0.0005, 150, 2)
            } else if zoom <= 15.0 {
                (true, 0.0001, 250, 3)
            } else {
                (true, 0.00005, 400, 999)
            };

        Self {
            include_full_geometry,
            simplification_tolerance,
            page_size,
            max_pages,
            property_tier: PropertyTier::for_zoom(zoom),
        }
    }
}

/// Categories queried when the user has not picked one.
///
/// Low zoom only shows zones; vegetation joins at 11+, furniture at 13+.
pub fn categories_for_zoom(zoom: f64) -> Vec<Category> {
    if zoom <= 10.0 {
        vec![Category::Zones]
    } else if zoom <= 12.0 {
        vec![Category::Zones, Category::Vegetation]
    } else {
        vec![Category::Vegetation, Category::Furniture, Category::Zones]
    }
}
