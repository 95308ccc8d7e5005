pub mod conversion;
pub mod download;
pub mod place;
pub mod tags;
