use thiserror::Error;

use crate::geofile::feature::{Feature, FeatureCollection, FeatureMap};

/// Validation errors raised against the schema of a fetched collection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("'{0}' column is missing in the data.")]
    MissingAttribute(String),
}

/// Narrow `collection` to the geometry and `attribute` columns, dropping features where
/// `attribute` is null.
///
/// The result is a new collection; `collection` is left untouched.
pub fn filter_by_attribute(
    collection: &FeatureCollection,
    attribute: &str,
) -> Result<FeatureCollection, FilterError> {
    if !collection.has_column(attribute) {
        return Err(FilterError::MissingAttribute(attribute.to_string()));
    }
    let features: Vec<Feature> = collection
        .iter()
        .filter_map(|feature| {
            let value = feature.attributes.get(attribute)?;
            Some(Feature {
                id: feature.id,
                geometry: feature.geometry.clone(),
                attributes: FeatureMap::from([(attribute.to_string(), value.clone())]),
            })
        })
        .collect();
    log::debug!(
        "Kept {} of {} features with a value for '{}'",
        features.len(),
        collection.len(),
        attribute
    );
    Ok(FeatureCollection::with_columns(
        vec![attribute.to_string()],
        features,
        collection.crs,
    ))
}

/// Apply `filter_by_attribute` when an attribute is given, pass the collection through otherwise.
pub fn filter_optional(
    collection: FeatureCollection,
    attribute: Option<&str>,
) -> Result<FeatureCollection, FilterError> {
    match attribute {
        Some(attribute) => filter_by_attribute(&collection, attribute),
        None => Ok(collection),
    }
}
