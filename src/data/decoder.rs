//! Zoom-aware geometry decoding
//!
//! Turns the raw WKT carried by API records into render-ready [`Geometry`]
//! values. What comes out depends on the [`ZoomPolicy`]: at low zoom lines
//! are dropped and polygons collapse to their centroid, at higher zoom both
//! are simplified with a zoom-dependent tolerance. Decoding never fails
//! loudly; anything unreadable is `None` and the record is skipped.

use crate::core::constants::COORDINATE_PRECISION;
use crate::data::feature::Geometry;
use crate::data::simplify::{douglas_peucker, round_coord};
use crate::data::wkt::{parse_wkt, WktGeometry};
use crate::query::policy::ZoomPolicy;
use geo_types::{Coord, LineString};

/// Smallest vertex count of a closed ring
const MIN_RING_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryDecoder {
    precision: u32,
}

impl GeometryDecoder {
    pub fn new(precision: u32) -> Self {
        Self { precision }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn decode(&self, raw: &str, policy: &ZoomPolicy) -> Option<Geometry> {
        match parse_wkt(raw)? {
            WktGeometry::Point(point) => Some(Geometry::Point {
                coordinates: round_coord(point.0, self.precision),
            }),
            WktGeometry::LineString(line) => {
                if !policy.include_full_geometry {
                    return None;
                }
                let simplified = douglas_peucker(&line.0, policy.simplification_tolerance);
                Some(Geometry::LineString {
                    coordinates: self.round_all(&simplified),
                })
            }
            WktGeometry::Polygon(polygon) => {
                if !policy.include_full_geometry {
                    let centroid = mean_centroid(polygon.exterior())?;
                    return Some(Geometry::Point {
                        coordinates: round_coord(centroid, self.precision),
                    });
                }

                let tolerance = policy.simplification_tolerance;
                let (exterior, interiors) = polygon.into_inner();

                let mut outer = douglas_peucker(&exterior.0, tolerance);
                if outer.len() < MIN_RING_LEN {
                    outer = exterior.0;
                }

                let mut rings = vec![self.round_all(&outer)];
                rings.extend(
                    interiors
                        .iter()
                        .map(|hole| douglas_peucker(&hole.0, tolerance))
                        .filter(|hole| hole.len() >= MIN_RING_LEN)
                        .map(|hole| self.round_all(&hole)),
                );

                Some(Geometry::Polygon { coordinates: rings })
            }
        }
    }

    fn round_all(&self, coords: &[Coord<f64>]) -> Vec<[f64; 2]> {
        coords
            .iter()
            .map(|coord| round_coord(*coord, self.precision))
            .collect()
    }
}

impl Default for GeometryDecoder {
    fn default() -> Self {
        Self::new(COORDINATE_PRECISION)
    }
}

/// Arithmetic mean of a ring's vertices, not counting the closing vertex twice
fn mean_centroid(ring: &LineString<f64>) -> Option<Coord<f64>> {
    let mut vertices = ring.0.as_slice();
    if vertices.len() > 1 && vertices.first() == vertices.last() {
        vertices = &vertices[..vertices.len() - 1];
    }
    if vertices.is_empty() {
        return None;
    }

    let n = vertices.len() as f64;
    let (sum_x, sum_y) = vertices
        .iter()
        .fold((0.0, 0.0), |(x, y), coord| (x + coord.x, y + coord.y));

    Some(Coord {
        x: sum_x / n,
        y: sum_y / n,
    })
}
