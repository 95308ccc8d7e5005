use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;

use crate::crs::crs_utils::{EpsgCode, WGS84_EPSG_CODE};

/// Attribute values of a feature, keyed by column name. A column that is absent from the map is
/// null for that feature.
// TODO support different value types besides String. See gdal::vector::OGRFieldType for types
// supported by GDAL.
pub type FeatureMap = HashMap<String, String>;

/// Kind of OSM element a feature was built from. The ordering is the order features appear in a
/// fetched collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    Node,
    Way,
    Relation,
}

impl ElementType {
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Node => "node",
            ElementType::Way => "way",
            ElementType::Relation => "relation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ElementId {
    pub element_type: ElementType,
    pub osm_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// Source OSM element, if the feature came from OSM rather than from a geofile.
    pub id: Option<ElementId>,
    pub geometry: geo::Geometry,
    pub attributes: FeatureMap,
}

impl From<geo::Geometry> for Feature {
    fn from(value: geo::Geometry) -> Self {
        Self {
            id: None,
            geometry: value,
            attributes: FeatureMap::new(),
        }
    }
}

impl Feature {
    pub fn attribute(&self, column: &str) -> Option<&str> {
        self.attributes.get(column).map(|value| value as &str)
    }
}

/// An ordered set of features sharing a set of attribute columns and a CRS.
///
/// The geometry column is implicit: every feature has a geometry. `columns` holds the attribute
/// columns only, sorted by name.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    columns: Vec<String>,
    features: Vec<Feature>,
    pub crs: EpsgCode,
}

impl FeatureCollection {
    /// Build a collection whose columns are the union of the attribute keys of all features.
    pub fn new(features: Vec<Feature>, crs: EpsgCode) -> Self {
        let columns = get_field_names(&features);
        Self {
            columns,
            features,
            crs,
        }
    }

    /// Build a collection with an explicit column set. Attributes of features which are not in
    /// `columns` are dropped.
    pub fn with_columns(columns: Vec<String>, mut features: Vec<Feature>, crs: EpsgCode) -> Self {
        let mut columns = columns;
        columns.sort();
        columns.dedup();
        for feature in features.iter_mut() {
            feature
                .attributes
                .retain(|key, _| columns.binary_search(key).is_ok());
        }
        Self {
            columns,
            features,
            crs,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), WGS84_EPSG_CODE)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|name| name == column)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn into_features(self) -> Vec<Feature> {
        self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }
}

fn get_field_names(features: &[Feature]) -> Vec<String> {
    let fields: BTreeSet<String> = features
        .par_iter()
        .flat_map_iter(|feature| feature.attributes.keys().cloned())
        .collect();
    fields.into_iter().collect()
}
