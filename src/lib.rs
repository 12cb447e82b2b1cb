pub mod distance;
pub mod error;
pub mod kml;
pub mod loader;
pub mod splitter;
pub mod tree;

use std::path::{Path, PathBuf};

pub use crate::distance::YearlyDistance;
pub use crate::error::TripToolsError;
pub use crate::kml::Placemark;
pub use crate::loader::{GPX_NAMESPACE, GpxDocument};

type Result<T> = std::result::Result<T, TripToolsError>;

/// Split every track in the GPX file at `path` into its own standalone
/// file next to the source. Returns the paths written.
pub fn split_gpx_file(path: &Path) -> Result<Vec<PathBuf>> {
    let document = loader::load_document(path)?;
    splitter::split_document(document)
}

/// Per-year travelled distance over the placemarks of the KML trip log at
/// `path`, in first-seen year order.
pub fn distances_by_year(path: &Path) -> Result<Vec<YearlyDistance>> {
    let placemarks = kml::read_placemarks(path)?;
    Ok(distance::travelled_by_year(&placemarks))
}
