//! Minimal well-known-text reader for the geometry kinds the API emits.
//!
//! Only `POINT`, `LINESTRING` and `POLYGON` are recognized. Anything else,
//! including `EMPTY` geometries and non-finite ordinates, reads as `None`.

use geo_types::{Coord, LineString, Point, Polygon};

/// Geometry as read from WKT, before any zoom-dependent processing
#[derive(Debug, Clone, PartialEq)]
pub enum WktGeometry {
    Point(Point<f64>),
    LineString(LineString<f64>),
    Polygon(Polygon<f64>),
}

/// Parse a WKT (or EWKT) string.
pub fn parse_wkt(raw: &str) -> Option<WktGeometry> {
    let text = strip_srid(raw.trim());
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    if close <= open {
        return None;
    }

    let keyword = text[..open].trim().to_ascii_uppercase();
    let body = &text[open + 1..close];
    if !text[close + 1..].trim().is_empty() {
        return None;
    }

    match keyword.as_str() {
        "POINT" | "POINT Z" | "POINTZ" => {
            let coords = parse_coord_list(body)?;
            match coords.as_slice() {
                [coord] => Some(WktGeometry::Point(Point::from(*coord))),
                _ => None,
            }
        }
        "LINESTRING" | "LINESTRING Z" | "LINESTRINGZ" => {
            let coords = parse_coord_list(body)?;
            if coords.len() < 2 {
                return None;
            }
            Some(WktGeometry::LineString(LineString::new(coords)))
        }
        "POLYGON" | "POLYGON Z" | "POLYGONZ" => {
            let mut rings = split_rings(body)?.into_iter();
            let exterior = rings.next()?;
            if exterior.len() < 3 {
                return None;
            }
            let interiors = rings.map(LineString::new).collect();
            // Polygon::new closes open rings
            Some(WktGeometry::Polygon(Polygon::new(
                LineString::new(exterior),
                interiors,
            )))
        }
        _ => None,
    }
}

/// Removes `SRID=n;` prefixes and `;SRID=n` suffixes
fn strip_srid(text: &str) -> &str {
    let mut text = text;
    if text.get(..5).is_some_and(|head| head.eq_ignore_ascii_case("SRID=")) {
        text = match text.find(';') {
            Some(idx) => &text[idx + 1..],
            None => return "",
        };
    }
    if let Some(idx) = text.rfind(';') {
        if text[idx + 1..].trim_start().to_ascii_uppercase().starts_with("SRID") {
            text = &text[..idx];
        }
    }
    text.trim()
}

/// `"x y, x y, ..."` into coordinates
fn parse_coord_list(body: &str) -> Option<Vec<Coord<f64>>> {
    body.split(',').map(parse_coord).collect()
}

fn parse_coord(pair: &str) -> Option<Coord<f64>> {
    let mut parts = pair.split_whitespace();
    let x: f64 = parts.next()?.parse().ok()?;
    let y: f64 = parts.next()?.parse().ok()?;
    // Z and M ordinates are accepted but not kept
    for extra in parts {
        extra.parse::<f64>().ok()?;
    }
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    Some(Coord { x, y })
}

/// `"(x y, ...), (x y, ...)"` into one coordinate list per ring
fn split_rings(body: &str) -> Option<Vec<Vec<Coord<f64>>>> {
    let mut rings = Vec::new();
    let mut rest = body.trim();

    while !rest.is_empty() {
        let inner = rest.strip_prefix('(')?;
        let end = inner.find(')')?;
        rings.push(parse_coord_list(&inner[..end])?);

        rest = inner[end + 1..].trim_start();
        if let Some(next) = rest.strip_prefix(',') {
            rest = next.trim_start();
            if rest.is_empty() {
                return None;
            }
        } else if !rest.is_empty() {
            return None;
        }
    }

    if rings.is_empty() {
        None
    } else {
        Some(rings)
    }
}
