//! Fetch OpenStreetMap features for a named place, narrow them to one tag column, plot them and
//! save them to GeoPackage files.
extern crate log;
pub mod config;
pub mod crs;
pub mod fetch;
pub mod filter;
pub mod geofile;
pub mod osm;
pub mod plot;

pub use config::ProviderConfig;
pub use fetch::Fetcher;
pub use filter::{filter_by_attribute, FilterError};
pub use geofile::feature::{Feature, FeatureCollection};
pub use geofile::persist::save;
pub use osm::tags::{TagSpec, TagValue};
pub use plot::{plot, plot_by_attribute};
