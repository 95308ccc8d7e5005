extern crate osm_xml as osm;
use geo::{Contains, Intersects};
use std::io::Read;

use crate::crs::crs_utils::WGS84_EPSG_CODE;
use crate::geofile::feature::{ElementId, ElementType, Feature, FeatureCollection, FeatureMap};

use super::tags::TagSpec;

/// Keys whose closed ways describe an area unless tagged `area=no`.
const AREA_KEYS: &[&str] = &[
    "aeroway",
    "amenity",
    "boundary",
    "building",
    "building:part",
    "craft",
    "golf",
    "historic",
    "landuse",
    "leisure",
    "man_made",
    "military",
    "natural",
    "office",
    "place",
    "public_transport",
    "ruins",
    "shop",
    "tourism",
];

/// Key/value pairs which stay lines even though their key is an area key.
const LINEAR_TAGS: &[(&str, &str)] = &[
    ("natural", "coastline"),
    ("natural", "cliff"),
    ("natural", "ridge"),
    ("natural", "arete"),
    ("natural", "tree_row"),
    ("man_made", "embankment"),
    ("man_made", "pipeline"),
    ("man_made", "breakwater"),
    ("leisure", "track"),
    ("leisure", "slipway"),
];

/// Parse an OSM XML document, e.g. an Overpass response, into the features selected by `tags`.
///
/// Only features intersecting `boundary` are kept. Features are ordered by element type
/// (nodes, ways, relations) and then by OSM id.
pub fn read_osm_features<R: Read>(
    source: R,
    tags: &TagSpec,
    boundary: &geo::MultiPolygon,
) -> anyhow::Result<FeatureCollection> {
    let data = osm::OSM::parse(source)?;
    let mut features = osm_features(&data, tags);
    let num_features = features.len();
    features.retain(|feature| boundary.intersects(&feature.geometry));
    log::debug!(
        "{} of {} features intersect the place boundary",
        features.len(),
        num_features
    );
    features.sort_by_key(|feature| feature.id);
    Ok(FeatureCollection::new(features, WGS84_EPSG_CODE))
}

fn osm_features(data: &osm::OSM, tags: &TagSpec) -> Vec<Feature> {
    let mut features = Vec::new();
    for node in data.nodes.values() {
        let attributes = tags_to_map(&node.tags);
        if !tags.matches(&attributes) {
            continue;
        }
        features.push(Feature {
            id: Some(ElementId {
                element_type: ElementType::Node,
                osm_id: node.id,
            }),
            geometry: geo::Geometry::Point(geo::Point::new(node.lon, node.lat)),
            attributes,
        });
    }
    for way in data.ways.values() {
        let attributes = tags_to_map(&way.tags);
        if !tags.matches(&attributes) {
            continue;
        }
        match osm_way_to_geometry(data, way, &attributes) {
            Some(geometry) => features.push(Feature {
                id: Some(ElementId {
                    element_type: ElementType::Way,
                    osm_id: way.id,
                }),
                geometry,
                attributes,
            }),
            None => log::warn!("Skipping way {}, it has less than two resolvable nodes", way.id),
        }
    }
    for relation in data.relations.values() {
        let attributes = tags_to_map(&relation.tags);
        if !tags.matches(&attributes) {
            continue;
        }
        match osm_relation_to_multipolygon(data, relation, &attributes) {
            Some(multipolygon) => features.push(Feature {
                id: Some(ElementId {
                    element_type: ElementType::Relation,
                    osm_id: relation.id,
                }),
                geometry: geo::Geometry::MultiPolygon(multipolygon),
                attributes,
            }),
            None => log::debug!("Skipping relation {}, it has no closed outer ring", relation.id),
        }
    }
    features
}

fn tags_to_map(tags: &[osm::Tag]) -> FeatureMap {
    tags.iter()
        .map(|tag| (tag.key.clone(), tag.val.clone()))
        .collect()
}

fn resolve_way_coords(osm_data: &osm::OSM, way: &osm::Way) -> Vec<geo::Coord> {
    way.nodes
        .iter()
        .filter_map(|node| match osm_data.resolve_reference(node) {
            osm::Reference::Node(node) => Some(geo::Coord {
                x: node.lon,
                y: node.lat,
            }),
            _ => None,
        })
        .collect()
}

fn is_closed(coords: &[geo::Coord]) -> bool {
    coords.len() >= 4 && coords.first() == coords.last()
}

/// Whether a closed way with these tags describes an area rather than a closed line.
pub fn is_area(attributes: &FeatureMap) -> bool {
    match attributes.get("area").map(|value| value as &str) {
        Some("no") => return false,
        Some("yes") => return true,
        _ => {}
    }
    attributes.iter().any(|(key, value)| {
        AREA_KEYS.contains(&key.as_str())
            && !LINEAR_TAGS.contains(&(key.as_str(), value.as_str()))
    })
}

fn osm_way_to_geometry(
    osm_data: &osm::OSM,
    way: &osm::Way,
    attributes: &FeatureMap,
) -> Option<geo::Geometry> {
    let coords = resolve_way_coords(osm_data, way);
    if coords.len() < 2 {
        return None;
    }
    if is_closed(&coords) && is_area(attributes) {
        Some(geo::Geometry::Polygon(geo::Polygon::new(
            geo::LineString::from(coords),
            vec![],
        )))
    } else {
        Some(geo::Geometry::LineString(geo::LineString::from(coords)))
    }
}

fn osm_relation_to_multipolygon(
    osm_data: &osm::OSM,
    relation: &osm::Relation,
    attributes: &FeatureMap,
) -> Option<geo::MultiPolygon> {
    match attributes.get("type").map(|value| value as &str) {
        Some("multipolygon") | Some("boundary") => {}
        _ => return None,
    }
    let mut outer_parts = Vec::new();
    let mut inner_parts = Vec::new();
    for member in &relation.members {
        if let osm::Member::Way(reference, role) = member {
            if let osm::Reference::Way(way) = osm_data.resolve_reference(reference) {
                let coords = resolve_way_coords(osm_data, way);
                if coords.len() < 2 {
                    continue;
                }
                match role.as_str() {
                    "inner" => inner_parts.push(coords),
                    _ => outer_parts.push(coords),
                }
            }
        }
    }
    let outer_rings = merge_rings(outer_parts);
    if outer_rings.is_empty() {
        return None;
    }
    Some(assemble_multipolygon(outer_rings, merge_rings(inner_parts)))
}

/// Join way segments end to end into closed rings. Segments which cannot be closed are dropped.
pub fn merge_rings(mut parts: Vec<Vec<geo::Coord>>) -> Vec<geo::LineString> {
    let mut rings = Vec::new();
    while let Some(mut ring) = parts.pop() {
        while !is_closed(&ring) {
            let end = match ring.last() {
                Some(end) => *end,
                None => break,
            };
            let next = parts.iter().position(|part| {
                part.first() == Some(&end) || part.last() == Some(&end)
            });
            match next {
                Some(index) => {
                    let mut part = parts.swap_remove(index);
                    if part.first() != Some(&end) {
                        part.reverse();
                    }
                    ring.extend(part.into_iter().skip(1));
                }
                None => break,
            }
        }
        if is_closed(&ring) {
            rings.push(geo::LineString::from(ring));
        } else {
            log::debug!("Dropping unclosed ring with {} coordinates", ring.len());
        }
    }
    rings
}

/// Build polygons from outer rings, assigning each inner ring to the first outer ring that
/// contains it.
pub fn assemble_multipolygon(
    outer_rings: Vec<geo::LineString>,
    inner_rings: Vec<geo::LineString>,
) -> geo::MultiPolygon {
    let mut polygons: Vec<(geo::Polygon, Vec<geo::LineString>)> = outer_rings
        .into_iter()
        .map(|ring| (geo::Polygon::new(ring, vec![]), Vec::new()))
        .collect();
    for inner in inner_rings {
        let first_coord = match inner.0.first() {
            Some(coord) => geo::Point::from(*coord),
            None => continue,
        };
        if let Some((_, holes)) = polygons
            .iter_mut()
            .find(|(outer, _)| outer.contains(&first_coord))
        {
            holes.push(inner);
        }
    }
    polygons
        .into_iter()
        .map(|(outer, holes)| {
            let (exterior, _) = outer.into_inner();
            geo::Polygon::new(exterior, holes)
        })
        .collect::<Vec<geo::Polygon>>()
        .into()
}
