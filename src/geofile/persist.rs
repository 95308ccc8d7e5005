use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use super::{
    feature::FeatureCollection,
    gdal_geofile::{write_features_to_geofile, GdalDriverType},
};

/// Resolve `file_path` against the current working directory and remove `.` and `..` components.
/// The path need not exist; symlinks are not followed.
pub fn absolute_path(file_path: &Path) -> anyhow::Result<PathBuf> {
    let joined = if file_path.is_absolute() {
        file_path.to_path_buf()
    } else {
        std::env::current_dir()?.join(file_path)
    };
    Ok(normalize_lexically(&joined))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // `..` at the root stays at the root.
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Save `collection` as a GeoPackage at `file_path`, creating missing parent directories and
/// replacing any existing file.
///
/// An empty collection is not written; a notice is printed instead. Returns the absolute path of
/// the written file, if any.
pub fn save(collection: &FeatureCollection, file_path: &Path) -> anyhow::Result<Option<PathBuf>> {
    if collection.is_empty() {
        println!("No data to save.");
        return Ok(None);
    }

    let file_path = absolute_path(file_path)?;
    if let Some(directory) = file_path.parent() {
        fs::create_dir_all(directory)?;
    }
    if file_path.exists() {
        log::info!("Replacing existing file {:?}", file_path);
        fs::remove_file(&file_path)?;
    }

    write_features_to_geofile(collection, &file_path, GdalDriverType::GeoPackage.name())?;
    println!(
        "Feature collection successfully saved to {}",
        file_path.display()
    );
    Ok(Some(file_path))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use std::path::{Path, PathBuf};

    use rstest::rstest;
    use testdir::testdir;

    use super::{absolute_path, normalize_lexically, save};
    use crate::geofile::{
        feature::{Feature, FeatureCollection},
        gdal_geofile::read_features_from_geofile,
    };

    #[test]
    fn test_save_empty_collection_writes_nothing() {
        let output_dir = testdir!().join("out");
        let result = save(&FeatureCollection::empty(), &output_dir.join("empty.gpkg")).unwrap();
        assert_eq!(None, result);
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_save_creates_parent_directories_and_round_trips() {
        let collection = FeatureCollection::new(
            vec![
                Feature {
                    id: None,
                    geometry: geo::Geometry::Point(geo::Point::new(9.93, 49.79)),
                    attributes: HashMap::from([("landuse".to_string(), "grass".to_string())]),
                },
                Feature {
                    id: None,
                    geometry: geo::Geometry::Point(geo::Point::new(9.94, 49.80)),
                    attributes: HashMap::from([("landuse".to_string(), "meadow".to_string())]),
                },
            ],
            4326,
        );
        let file_path = testdir!().join("nested").join("dir").join("landuse.gpkg");

        let written = save(&collection, &file_path).unwrap().unwrap();
        assert_eq!(file_path, written);
        assert!(file_path.exists());
        assert_eq!(collection, read_features_from_geofile(&file_path).unwrap());

        // Saving again replaces the file.
        save(&collection, &file_path).unwrap();
        assert_eq!(2, read_features_from_geofile(&file_path).unwrap().len());
    }

    #[test]
    fn test_absolute_path() {
        let relative = Path::new("out/landuse.gpkg");
        let absolute = absolute_path(relative).unwrap();
        assert!(absolute.is_absolute());
        assert!(absolute.ends_with(relative));
    }

    #[test]
    fn test_absolute_path_resolves_parent_components() {
        let absolute = absolute_path(Path::new("out/../maps/./landuse.gpkg")).unwrap();
        assert_eq!(
            std::env::current_dir().unwrap().join("maps").join("landuse.gpkg"),
            absolute
        );
    }

    #[rstest]
    #[case("/data/out/../landuse.gpkg", "/data/landuse.gpkg")]
    #[case("/data/./out/landuse.gpkg", "/data/out/landuse.gpkg")]
    #[case("/../landuse.gpkg", "/landuse.gpkg")]
    fn test_normalize_lexically(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(PathBuf::from(expected), normalize_lexically(Path::new(path)));
    }

    #[test]
    fn test_save_reports_normalized_path() {
        let collection = FeatureCollection::new(
            vec![Feature::from(geo::Geometry::Point(geo::Point::new(9.93, 49.79)))],
            4326,
        );
        let dir = testdir!();
        let written = save(&collection, &dir.join("out").join("..").join("points.gpkg"))
            .unwrap()
            .unwrap();
        assert_eq!(dir.join("points.gpkg"), written);
        assert!(written.exists());
    }
}
