use anyhow::anyhow;
use geo::BoundingRect;
use serde::Deserialize;

use super::download::WgsBoundingBox;

#[derive(Debug, Deserialize)]
struct NominatimResult {
    display_name: String,
    #[serde(default)]
    geojson: Option<geojson::Geometry>,
}

/// A place name resolved to its boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceBoundary {
    pub display_name: String,
    pub geometry: geo::MultiPolygon,
}

impl PlaceBoundary {
    pub fn bounding_box(&self) -> anyhow::Result<WgsBoundingBox> {
        let rect = self
            .geometry
            .bounding_rect()
            .ok_or_else(|| anyhow!("Boundary of {} is empty", self.display_name))?;
        Ok(WgsBoundingBox {
            left_lon: rect.min().x,
            right_lon: rect.max().x,
            bottom_lat: rect.min().y,
            top_lat: rect.max().y,
        })
    }
}

/// Pick the first polygonal result of a Nominatim search response (JSON, `polygon_geojson=1`).
pub fn parse_nominatim_response(place: &str, response: &str) -> anyhow::Result<PlaceBoundary> {
    let results: Vec<NominatimResult> = serde_json::from_str(response)?;
    for result in results {
        let geometry = match result.geojson {
            Some(geometry) => geo::Geometry::<f64>::try_from(geometry)?,
            None => continue,
        };
        let multipolygon = match geometry {
            geo::Geometry::Polygon(polygon) => geo::MultiPolygon::new(vec![polygon]),
            geo::Geometry::MultiPolygon(multipolygon) => multipolygon,
            _ => continue,
        };
        return Ok(PlaceBoundary {
            display_name: result.display_name,
            geometry: multipolygon,
        });
    }
    Err(anyhow!(
        "Nominatim could not geocode '{}' to a (Multi)Polygon boundary",
        place
    ))
}
