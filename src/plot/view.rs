use std::collections::BTreeSet;

use geo::BoundingRect;
use plotters::style::{Color, Palette, Palette99, RGBAColor};

use crate::geofile::feature::FeatureCollection;

/// Fraction of the data span added around the data on every side.
const PADDING_FRACTION: f64 = 0.05;
/// Half span of the view around a single point, in CRS units.
const MIN_HALF_SPAN: f64 = 0.001;

/// Square map view in CRS coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapExtent {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

/// The smallest square view containing all geometries of `collection`, padded on every side.
/// `None` for an empty collection.
pub fn map_extent(collection: &FeatureCollection) -> Option<MapExtent> {
    let rect = collection
        .iter()
        .filter_map(|feature| feature.geometry.bounding_rect())
        .reduce(|a, b| {
            geo::Rect::new(
                geo::Coord {
                    x: a.min().x.min(b.min().x),
                    y: a.min().y.min(b.min().y),
                },
                geo::Coord {
                    x: a.max().x.max(b.max().x),
                    y: a.max().y.max(b.max().y),
                },
            )
        })?;
    let center = rect.center();
    let half_span = (rect.width().max(rect.height()) / 2.0 * (1.0 + 2.0 * PADDING_FRACTION))
        .max(MIN_HALF_SPAN);
    Some(MapExtent {
        min_x: center.x - half_span,
        max_x: center.x + half_span,
        min_y: center.y - half_span,
        max_y: center.y + half_span,
    })
}

/// Distinct values of `attribute` in sorted order, each with its legend color.
pub fn category_colors(collection: &FeatureCollection, attribute: &str) -> Vec<(String, RGBAColor)> {
    let categories: BTreeSet<&str> = collection
        .iter()
        .filter_map(|feature| feature.attribute(attribute))
        .collect();
    categories
        .into_iter()
        .enumerate()
        .map(|(index, category)| (category.to_string(), Palette99::pick(index).mix(1.0)))
        .collect()
}
