use anyhow::anyhow;
use geohash::{encode, Coord};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::config::ProviderConfig;

use super::tags::{sanitize_for_filename, TagSpec};

/// Server side timeout of Overpass queries, in seconds.
const OVERPASS_TIMEOUT_SECS: u64 = 180;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct WgsBoundingBox {
    pub left_lon: f64,
    pub right_lon: f64,
    pub bottom_lat: f64,
    pub top_lat: f64,
}

pub fn build_client(config: &ProviderConfig) -> anyhow::Result<reqwest::blocking::Client> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(config.user_agent.as_str())
        // Slightly above the server side timeout so Overpass reports its own timeouts.
        .timeout(Duration::from_secs(OVERPASS_TIMEOUT_SECS + 20))
        .build()?;
    Ok(client)
}

pub fn get_filename_for_bbox(bbox: &WgsBoundingBox, tags: &TagSpec) -> anyhow::Result<String> {
    const GEOHASH_LENGTH: usize = 8;
    let top_left_coord = Coord {
        x: bbox.left_lon,
        y: bbox.top_lat,
    };
    let bottom_right_coord = Coord {
        x: bbox.right_lon,
        y: bbox.bottom_lat,
    };
    let top_left_geohash = encode(top_left_coord, GEOHASH_LENGTH)?;
    let bottom_right_geohash = encode(bottom_right_coord, GEOHASH_LENGTH)?;
    let tags_slug = tags.slug();
    Ok(format!(
        "{top_left_geohash}_{bottom_right_geohash}_{tags_slug}_osm.xml"
    ))
}

pub fn get_filename_for_place(place: &str) -> String {
    format!("nominatim_{}.json", sanitize_for_filename(&place.to_lowercase()))
}

/// Overpass QL query for all elements matching `tags` in `bbox`, recursing down to the member
/// ways and nodes needed to build their geometries.
pub fn build_overpass_query(bbox: &WgsBoundingBox, tags: &TagSpec) -> String {
    let bbox_filter = format!(
        "({},{},{},{})",
        bbox.bottom_lat, bbox.left_lon, bbox.top_lat, bbox.right_lon
    );
    let mut statements = String::new();
    for filter in tags.overpass_filters() {
        for element in ["node", "way", "relation"] {
            statements.push_str(&format!("{element}{filter}{bbox_filter};"));
        }
    }
    format!("[out:xml][timeout:{OVERPASS_TIMEOUT_SECS}];({statements});(._;>;);out;")
}

pub fn download_osm_data_by_bbox(
    client: &reqwest::blocking::Client,
    config: &ProviderConfig,
    bbox: &WgsBoundingBox,
    tags: &TagSpec,
) -> anyhow::Result<String> {
    let query = build_overpass_query(bbox, tags);
    log::debug!("Overpass query: {}", query);
    let response = client
        .post(&config.overpass_url)
        .form(&[("data", query.as_str())])
        .send()?
        .error_for_status()?;
    response.text().or(Err(anyhow!("No response text")))
}

pub fn download_nominatim_data(
    client: &reqwest::blocking::Client,
    config: &ProviderConfig,
    place: &str,
) -> anyhow::Result<String> {
    let response = client
        .get(&config.nominatim_url)
        .query(&[
            ("q", place),
            ("format", "json"),
            ("polygon_geojson", "1"),
            ("limit", "50"),
        ])
        .send()?
        .error_for_status()?;
    response.text().or(Err(anyhow!("No response text")))
}

/// A cache file after `sync_to_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedFile {
    pub path: PathBuf,
    /// Whether the contents were downloaded by this call rather than found on disk.
    pub downloaded: bool,
}

/// Return the file at `output_dir/filename`, downloading its contents first if the file does not
/// exist yet.
pub fn sync_to_file<F>(
    output_dir: &Path,
    filename: &str,
    download: F,
) -> anyhow::Result<SyncedFile>
where
    F: FnOnce() -> anyhow::Result<String>,
{
    let output_filepath = output_dir.join(filename);
    if output_filepath.exists() {
        log::debug!("Local file exists: {:?}", output_filepath);
        return Ok(SyncedFile {
            path: output_filepath,
            downloaded: false,
        });
    }

    log::debug!("Downloading to {:?}", output_filepath);
    let data = download()?;
    fs::create_dir_all(output_dir)?;
    fs::write(&output_filepath, data)
        .map_err(|err| anyhow!("Could not write {:?}: {}", output_filepath, err))?;
    Ok(SyncedFile {
        path: output_filepath,
        downloaded: true,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use testdir::testdir;

    use super::{
        build_overpass_query, get_filename_for_bbox, get_filename_for_place, sync_to_file,
        WgsBoundingBox,
    };
    use crate::osm::tags::TagSpec;

    fn wuerzburg_bbox() -> WgsBoundingBox {
        WgsBoundingBox {
            left_lon: 9.87,
            right_lon: 10.01,
            bottom_lat: 49.71,
            top_lat: 49.84,
        }
    }

    #[test]
    fn test_filename_for_bbox_is_stable_and_tag_specific() {
        let bbox = wuerzburg_bbox();
        let landuse = get_filename_for_bbox(&bbox, &TagSpec::new().with_any("landuse")).unwrap();
        let building = get_filename_for_bbox(&bbox, &TagSpec::new().with_any("building")).unwrap();
        assert_eq!(
            landuse,
            get_filename_for_bbox(&bbox, &TagSpec::new().with_any("landuse")).unwrap()
        );
        assert_ne!(landuse, building);
        assert!(landuse.ends_with("_landuse_osm.xml"));
    }

    #[test]
    fn test_filename_for_place() {
        assert_eq!(
            "nominatim_würzburg--germany.json",
            get_filename_for_place("Würzburg, Germany")
        );
    }

    #[test]
    fn test_overpass_query() {
        let query = build_overpass_query(&wuerzburg_bbox(), &TagSpec::new().with_any("landuse"));
        assert_eq!(
            "[out:xml][timeout:180];(node[\"landuse\"](49.71,9.87,49.84,10.01);\
             way[\"landuse\"](49.71,9.87,49.84,10.01);\
             relation[\"landuse\"](49.71,9.87,49.84,10.01););(._;>;);out;",
            query
        );
    }

    #[test]
    fn test_sync_to_file_downloads_once() {
        let dir = testdir!().join("cache");
        let first = sync_to_file(&dir, "data.xml", || Ok("<osm/>".to_string())).unwrap();
        assert!(first.downloaded);
        assert_eq!("<osm/>", fs::read_to_string(&first.path).unwrap());

        let second = sync_to_file(&dir, "data.xml", || panic!("must not download again")).unwrap();
        assert!(!second.downloaded);
        assert_eq!(first.path, second.path);
    }

    #[test]
    fn test_sync_to_file_propagates_download_errors() {
        let dir = testdir!();
        let result = sync_to_file(&dir, "data.xml", || Err(anyhow::anyhow!("offline")));
        assert!(result.is_err());
        assert!(!dir.join("data.xml").exists());
    }
}
