//! Common test fixtures for agri-monitor tests.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;

use agri_common::{Band, SceneDescriptor};

/// Area of interest definitions for testing.
pub mod aoi {
    /// Al Ain farm plot used by the deployed pipeline, `(lon, lat)` ring.
    pub const AL_AIN: [(f64, f64); 4] = [
        (55.742, 24.205),
        (55.747, 24.205),
        (55.747, 24.21),
        (55.742, 24.21),
    ];

    /// UTM zone covering Al Ain.
    pub const AL_AIN_EPSG: u16 = 32640;

    /// A point well inside the Al Ain AOI in EPSG:32640.
    pub const AL_AIN_INTERIOR_UTM: (f64, f64) = (372_300.0, 2_677_600.0);

    /// Somewhere in the Empty Quarter, far from the AOI, in EPSG:32640.
    pub const FAR_AWAY_UTM: (f64, f64) = (600_000.0, 2_500_000.0);
}

/// Scene descriptor builder for tests.
pub fn scene(id: &str, cloud_cover: f64, date: NaiveDate) -> SceneDescriptor {
    SceneDescriptor {
        id: id.to_string(),
        date,
        cloud_cover,
        assets: BTreeMap::new(),
    }
}

/// Scene whose four band assets point at `{dir}/{band}.tif`.
pub fn scene_with_local_assets(
    id: &str,
    cloud_cover: f64,
    date: NaiveDate,
    dir: &Path,
) -> SceneDescriptor {
    let mut descriptor = scene(id, cloud_cover, date);
    for band in Band::ALL {
        descriptor.assets.insert(
            band.asset_key().to_string(),
            dir.join(format!("{}.tif", band)).display().to_string(),
        );
    }
    descriptor
}

/// 2024-07-14, the acquisition date used throughout the tests.
pub fn july_14() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 14).unwrap_or_default()
}
