use anyhow::{anyhow, Context};
use gdal::vector::LayerAccess;
use indicatif::ProgressBar;
use std::collections::{hash_map::Entry, HashMap};
use std::path::Path;

use super::feature::{Feature, FeatureCollection, FeatureMap};
use crate::crs::crs_utils::{
    epsg_code_of, epsg_code_to_authority_string, spatial_ref_from_epsg, WGS84_EPSG_CODE,
};

pub enum GdalDriverType {
    GeoPackage,
}

impl GdalDriverType {
    pub fn name(&self) -> &'static str {
        match self {
            GdalDriverType::GeoPackage => "GPKG",
        }
    }
}

fn ogr_geometry_type(
    geometry: &geo::Geometry,
) -> anyhow::Result<gdal::vector::OGRwkbGeometryType::Type> {
    use gdal::vector::OGRwkbGeometryType::*;
    match geometry {
        geo::Geometry::Point(_) => Ok(wkbPoint),
        geo::Geometry::LineString(_) => Ok(wkbLineString),
        geo::Geometry::Polygon(_) => Ok(wkbPolygon),
        geo::Geometry::MultiPoint(_) => Ok(wkbMultiPoint),
        geo::Geometry::MultiLineString(_) => Ok(wkbMultiLineString),
        geo::Geometry::MultiPolygon(_) => Ok(wkbMultiPolygon),
        geo::Geometry::GeometryCollection(_) => Ok(wkbGeometryCollection),
        _ => Err(anyhow!("Cannot write geometry type {:?} to file.", geometry)),
    }
}

/// The geometry type of a layer holding all `features`: their common type, or the generic
/// geometry type if they are mixed.
pub fn layer_geometry_type(
    features: &[Feature],
) -> anyhow::Result<gdal::vector::OGRwkbGeometryType::Type> {
    let mut layer_type = None;
    for feature in features {
        let geometry_type = ogr_geometry_type(&feature.geometry)?;
        layer_type = match layer_type {
            None => Some(geometry_type),
            Some(layer_type) if layer_type == geometry_type => Some(layer_type),
            Some(_) => Some(gdal::vector::OGRwkbGeometryType::wkbUnknown),
        };
    }
    layer_type.ok_or_else(|| anyhow!("Cannot determine the geometry type of an empty layer"))
}

/// Pairs of columns whose names differ only in case. GeoPackage field names are compared
/// case-insensitively, so such columns cannot be created side by side.
pub fn case_insensitive_clashes(columns: &[String]) -> Vec<(String, String)> {
    let mut first_by_folded: HashMap<String, &String> = HashMap::new();
    let mut clashes = Vec::new();
    for column in columns {
        match first_by_folded.entry(column.to_lowercase()) {
            Entry::Occupied(first) => clashes.push(((*first.get()).clone(), column.clone())),
            Entry::Vacant(slot) => {
                slot.insert(column);
            }
        }
    }
    clashes
}

/// Write all features of `collection` to a single layer of a new geofile at `output_filepath`.
///
/// Every attribute column becomes a string field; attributes absent from a feature are left null.
pub fn write_features_to_geofile(
    collection: &FeatureCollection,
    output_filepath: &Path,
    driver: &str,
) -> anyhow::Result<()> {
    let driver = gdal::DriverManager::get_driver_by_name(driver).context("Getting GDAL driver")?;

    if collection.is_empty() {
        return Ok(());
    }
    let layer_type = layer_geometry_type(collection.features())?;
    let clashes = case_insensitive_clashes(collection.columns());
    if !clashes.is_empty() {
        for (first, second) in &clashes {
            log::error!("Columns '{}' and '{}' differ only in case", first, second);
        }
        return Err(anyhow!(
            "Cannot write columns differing only in case to {:?}: {:?}",
            output_filepath,
            clashes
        ));
    }

    let crs = spatial_ref_from_epsg(collection.crs)?;
    log::debug!(
        "Using spatial ref {} for writing geofile",
        epsg_code_to_authority_string(collection.crs)
    );

    let layer_name = output_filepath
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("features");
    let mut dataset = driver.create_vector_only(output_filepath)?;
    let layer_options = gdal::LayerOptions {
        name: layer_name,
        srs: Some(&crs),
        ty: layer_type,
        options: None,
    };

    let mut layer = dataset.create_layer(layer_options)?;

    log::info!("Setting up {} fields", collection.columns().len());
    let field_definitions: Vec<(&str, gdal::vector::OGRFieldType::Type)> = collection
        .columns()
        .iter()
        .map(|field_name| (field_name as &str, gdal::vector::OGRFieldType::OFTString))
        .collect();
    layer.create_defn_fields(&field_definitions)?;

    log::info!(
        "Writing {} features to {:?}",
        collection.len(),
        output_filepath
    );
    unsafe {
        // Start a transaction in case the driver supports transactions, e.g. GeoPackage.
        // Committing all features once as opposed to per-feature is a massive speedup for these drivers.
        gdal_sys::OGR_L_StartTransaction(layer.c_layer());
    };
    let bar = ProgressBar::new(collection.len() as u64);
    for feature in collection.iter() {
        let wkb = wkb::geom_to_wkb(&feature.geometry)
            .map_err(|err| anyhow!("Could not write geometry to WKB, {:?}", err))?;
        let geometry = gdal::vector::Geometry::from_wkb(&wkb)?;

        if feature.attributes.is_empty() {
            layer.create_feature(geometry)?;
        } else {
            let mut field_names = Vec::new();
            let mut values = Vec::new();
            for (key, value) in &feature.attributes {
                field_names.push(key as &str);
                values.push(gdal::vector::FieldValue::StringValue(value.to_owned()))
            }
            layer.create_feature_fields(geometry, &field_names, &values)?;
        }

        bar.inc(1);
    }
    unsafe {
        gdal_sys::OGR_L_CommitTransaction(layer.c_layer());
    };
    bar.finish_and_clear();
    Ok(())
}

/// Read the single layer of a geofile. Null fields are left out of the feature attributes.
pub fn read_features_from_geofile(filepath: &Path) -> anyhow::Result<FeatureCollection> {
    gdal::DriverManager::register_all();
    let mut open_options = gdal::DatasetOptions::default();
    open_options.open_flags = gdal::GdalOpenFlags::GDAL_OF_VECTOR;
    let dataset = gdal::Dataset::open_ex(filepath, open_options)?;

    let layer_count = dataset.layer_count();
    if 0 == layer_count || 1 < layer_count {
        return Err(anyhow!(
            "Found {} layers, only one layer is supported.",
            layer_count
        ));
    }
    let mut layer = dataset.layer(0)?;
    let crs = match layer.spatial_ref().ok() {
        Some(spatial_ref) => epsg_code_of(&spatial_ref)?,
        None => {
            log::warn!("Layer has no spatial ref, assuming WGS 84");
            WGS84_EPSG_CODE
        }
    };
    let columns: Vec<String> = layer
        .defn()
        .fields()
        .map(|field| field.name())
        .collect();

    let mut features = Vec::new();
    for gdal_feature in layer.features() {
        let wkb = gdal_feature.geometry_by_index(0)?.wkb()?;
        let geometry = wkb::wkb_to_geom(&mut wkb.as_slice())
            .map_err(|err| anyhow!("Could not read geometry from WKB, {:?}", err))?;
        let attributes: FeatureMap = gdal_feature
            .fields()
            .filter_map(|(name, value)| Some((name, value?.into_string()?)))
            .collect();
        features.push(Feature {
            id: None,
            geometry,
            attributes,
        });
    }
    Ok(FeatureCollection::with_columns(columns, features, crs))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;
    use testdir::testdir;

    use crate::geofile::{
        feature::{Feature, FeatureCollection},
        gdal_geofile::{
            case_insensitive_clashes, layer_geometry_type, read_features_from_geofile,
            write_features_to_geofile, GdalDriverType,
        },
    };

    fn sample_collection() -> FeatureCollection {
        FeatureCollection::new(
            vec![
                Feature {
                    id: None,
                    geometry: geo::Geometry::Polygon(geo::Polygon::new(
                        vec![(9.93, 49.79), (9.94, 49.79), (9.94, 49.80), (9.93, 49.79)].into(),
                        vec![],
                    )),
                    attributes: HashMap::from([
                        ("landuse".to_string(), "residential".to_string()),
                        ("name".to_string(), "Sanderau".to_string()),
                    ]),
                },
                Feature {
                    id: None,
                    geometry: geo::Geometry::Polygon(geo::Polygon::new(
                        vec![(9.95, 49.79), (9.96, 49.79), (9.96, 49.80), (9.95, 49.79)].into(),
                        vec![],
                    )),
                    attributes: HashMap::from([("landuse".to_string(), "forest".to_string())]),
                },
            ],
            4326,
        )
    }

    #[rstest]
    fn test_geofile_write_read_round_trip() {
        let collection = sample_collection();

        let test_dir = testdir!();
        let geofile_filepath = test_dir.join("output.gpkg");

        write_features_to_geofile(
            &collection,
            &geofile_filepath,
            GdalDriverType::GeoPackage.name(),
        )
        .unwrap();
        let read_back = read_features_from_geofile(&geofile_filepath).unwrap();

        assert_eq!(collection.columns(), read_back.columns());
        assert_eq!(4326, read_back.crs);
        assert_eq!(collection.len(), read_back.len());
        for (expected, actual) in collection.iter().zip(read_back.iter()) {
            assert_eq!(expected.geometry, actual.geometry);
            // Null fields are not read back as attributes.
            assert_eq!(expected.attributes, actual.attributes);
        }
    }

    #[rstest]
    #[case(vec![geo::Point::new(1.0, 2.0).into(), geo::Point::new(3.0, 4.0).into()], gdal::vector::OGRwkbGeometryType::wkbPoint)]
    #[case(vec![geo::Point::new(1.0, 2.0).into(), geo::LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]).into()], gdal::vector::OGRwkbGeometryType::wkbUnknown)]
    fn test_layer_geometry_type(
        #[case] geometries: Vec<geo::Geometry>,
        #[case] expected: gdal::vector::OGRwkbGeometryType::Type,
    ) {
        let features: Vec<Feature> = geometries.into_iter().map(Feature::from).collect();
        assert_eq!(expected, layer_geometry_type(&features).unwrap());
    }

    #[test]
    fn test_layer_geometry_type_rejects_unsupported_geometry() {
        let features = vec![Feature::from(geo::Geometry::Rect(geo::Rect::new(
            (0.0, 0.0),
            (1.0, 1.0),
        )))];
        assert!(layer_geometry_type(&features).is_err());
    }

    #[test]
    fn test_case_insensitive_clashes() {
        let columns: Vec<String> = ["FIXME", "fixme", "landuse", "name"]
            .iter()
            .map(|column| column.to_string())
            .collect();
        assert_eq!(
            vec![("FIXME".to_string(), "fixme".to_string())],
            case_insensitive_clashes(&columns)
        );
        assert!(case_insensitive_clashes(&columns[1..]).is_empty());
    }

    #[test]
    fn test_write_rejects_columns_differing_in_case() {
        let collection = FeatureCollection::new(
            vec![Feature {
                id: None,
                geometry: geo::Geometry::Point(geo::Point::new(9.93, 49.79)),
                attributes: HashMap::from([
                    ("fixme".to_string(), "check name".to_string()),
                    ("FIXME".to_string(), "check area".to_string()),
                ]),
            }],
            4326,
        );
        let geofile_filepath = testdir!().join("clash.gpkg");
        let err = write_features_to_geofile(
            &collection,
            &geofile_filepath,
            GdalDriverType::GeoPackage.name(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("fixme"));
        assert!(!geofile_filepath.exists());
    }
}
