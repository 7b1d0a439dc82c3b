//! Spatial query selection
//!
//! The remote API has no tiling, so every request carries either a center
//! plus radius or an explicit polygon. Wide views use a capped radius, sparse
//! point-like categories a small fixed radius, and everything else a polygon
//! slightly smaller than the view.

use crate::core::constants::{
    COORDINATE_PRECISION, MAX_QUERY_RADIUS_M, POINT_CATEGORY_RADIUS_FAR_M,
    POINT_CATEGORY_RADIUS_NEAR_M, POLYGON_SHRINK_FAR, POLYGON_SHRINK_NEAR, RADIUS_QUERY_MAX_ZOOM,
};
use crate::core::geo::{LatLng, LatLngBounds};
use crate::data::category::Category;
use crate::data::simplify::round_to;

/// Zoom from which point-like categories and polygons use their "near" settings
const NEAR_ZOOM: f64 = 13.0;

#[derive(Debug, Clone, PartialEq)]
pub enum QueryStrategy {
    Radius { center: LatLng, radius_m: u32 },
    Polygon { wkt: String },
}

impl QueryStrategy {
    /// Query parameters identifying the spatial filter
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            QueryStrategy::Radius { center, radius_m } => vec![
                ("latitude", format_degrees(center.lat)),
                ("longitude", format_degrees(center.lng)),
                ("radius", radius_m.to_string()),
            ],
            QueryStrategy::Polygon { wkt } => vec![("polygon", wkt.clone())],
        }
    }
}

/// Pick the spatial query for one category of a view.
pub fn choose_strategy(
    category: Category,
    zoom: f64,
    bounds: &LatLngBounds,
    srid: Option<u32>,
) -> QueryStrategy {
    let center = bounds.center();

    if zoom <= RADIUS_QUERY_MAX_ZOOM {
        let radius = bounds.geodesic_radius().round();
        let radius_m = if radius.is_finite() {
            radius.clamp(0.0, MAX_QUERY_RADIUS_M as f64) as u32
        } else {
            MAX_QUERY_RADIUS_M
        };
        return QueryStrategy::Radius { center, radius_m };
    }

    if category.is_point_like() {
        let radius_m = if zoom >= NEAR_ZOOM {
            POINT_CATEGORY_RADIUS_NEAR_M
        } else {
            POINT_CATEGORY_RADIUS_FAR_M
        };
        return QueryStrategy::Radius { center, radius_m };
    }

    let factor = if zoom < NEAR_ZOOM {
        POLYGON_SHRINK_FAR
    } else {
        POLYGON_SHRINK_NEAR
    };

    QueryStrategy::Polygon {
        wkt: polygon_wkt(&bounds.scaled(factor), srid),
    }
}

/// Closed WKT ring of a bounding box, optionally tagged with an SRID
pub fn polygon_wkt(bounds: &LatLngBounds, srid: Option<u32>) -> String {
    let (w, s, e, n) = (
        format_degrees(bounds.west()),
        format_degrees(bounds.south()),
        format_degrees(bounds.east()),
        format_degrees(bounds.north()),
    );

    let ring = format!("POLYGON(({w} {s},{e} {s},{e} {n},{w} {n},{w} {s}))");
    match srid {
        Some(srid) => format!("{ring};SRID={srid}"),
        None => ring,
    }
}

fn format_degrees(value: f64) -> String {
    round_to(value, COORDINATE_PRECISION).to_string()
}
