use std::{fs, io::Cursor, path::PathBuf};

use crate::config::ProviderConfig;
use crate::filter::filter_optional;
use crate::geofile::feature::FeatureCollection;
use crate::osm::{
    conversion::read_osm_features,
    download::{
        build_client, download_nominatim_data, download_osm_data_by_bbox, get_filename_for_bbox,
        get_filename_for_place, sync_to_file,
    },
    place::{parse_nominatim_response, PlaceBoundary},
    tags::TagSpec,
};

/// Fetches OSM features for named places.
///
/// Caching and logging of the provider are configured once per fetcher through its
/// `ProviderConfig`.
pub struct Fetcher {
    config: ProviderConfig,
    client: reqwest::blocking::Client,
}

impl Fetcher {
    pub fn new(config: ProviderConfig) -> anyhow::Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// All features matching `tags` within the boundary of `place`.
    pub fn load(&self, place: &str, tags: &TagSpec) -> anyhow::Result<FeatureCollection> {
        let boundary = self.resolve_place(place)?;
        self.diagnostic(format_args!(
            "Resolved '{}' to {}",
            place, boundary.display_name
        ));
        let bbox = boundary.bounding_box()?;
        let osm_xml = if self.config.use_cache {
            let filename = get_filename_for_bbox(&bbox, tags)?;
            let filepath = self.cached("OSM data", &filename, || {
                download_osm_data_by_bbox(&self.client, &self.config, &bbox, tags)
            })?;
            fs::read_to_string(filepath)?
        } else {
            self.diagnostic(format_args!("Querying Overpass for {}", tags.slug()));
            download_osm_data_by_bbox(&self.client, &self.config, &bbox, tags)?
        };
        let collection = read_osm_features(Cursor::new(osm_xml), tags, &boundary.geometry)?;
        self.diagnostic(format_args!(
            "Got {} features with {} columns for '{}'",
            collection.len(),
            collection.columns().len(),
            place
        ));
        Ok(collection)
    }

    /// Like `load`, then narrowed to the geometry and `attribute` columns if an attribute is
    /// given. Fails with `FilterError::MissingAttribute` if the fetched data has no such column.
    pub fn load_and_filter(
        &self,
        place: &str,
        tags: &TagSpec,
        attribute: Option<&str>,
    ) -> anyhow::Result<FeatureCollection> {
        let collection = self.load(place, tags)?;
        Ok(filter_optional(collection, attribute)?)
    }

    fn resolve_place(&self, place: &str) -> anyhow::Result<PlaceBoundary> {
        let response = if self.config.use_cache {
            let filepath = self.cached("Nominatim response", &get_filename_for_place(place), || {
                download_nominatim_data(&self.client, &self.config, place)
            })?;
            fs::read_to_string(filepath)?
        } else {
            self.diagnostic(format_args!("Geocoding '{}' with Nominatim", place));
            download_nominatim_data(&self.client, &self.config, place)?
        };
        parse_nominatim_response(place, &response)
    }

    /// Path of the cache file `filename`, downloaded with `download` unless it already exists.
    fn cached<F>(&self, what: &str, filename: &str, download: F) -> anyhow::Result<PathBuf>
    where
        F: FnOnce() -> anyhow::Result<String>,
    {
        let synced = sync_to_file(&self.config.cache_dir, filename, download)?;
        if synced.downloaded {
            self.diagnostic(format_args!("Downloaded {} to {:?}", what, synced.path));
        } else {
            self.diagnostic(format_args!("Using cached {} from {:?}", what, synced.path));
        }
        Ok(synced.path)
    }

    /// Level of provider diagnostics: `info` with `log_console`, `debug` otherwise.
    pub fn diagnostic_level(&self) -> log::Level {
        if self.config.log_console {
            log::Level::Info
        } else {
            log::Level::Debug
        }
    }

    fn diagnostic(&self, message: std::fmt::Arguments) {
        log::log!(self.diagnostic_level(), "{}", message);
    }
}
