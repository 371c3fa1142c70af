//! Scene descriptors returned by the catalog.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Spectral bands the pipeline acquires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Red,
    Green,
    Blue,
    Nir,
}

impl Band {
    /// Acquisition order: red, green, blue, near-infrared.
    pub const ALL: [Band; 4] = [Band::Red, Band::Green, Band::Blue, Band::Nir];

    /// Asset key used by Earth Search for Sentinel-2 L2A items.
    pub fn asset_key(&self) -> &'static str {
        match self {
            Band::Red => "red",
            Band::Green => "green",
            Band::Blue => "blue",
            Band::Nir => "nir",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.asset_key())
    }
}

impl FromStr for Band {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "red" | "b04" => Ok(Band::Red),
            "green" | "b03" => Ok(Band::Green),
            "blue" | "b02" => Ok(Band::Blue),
            "nir" | "b08" => Ok(Band::Nir),
            other => Err(format!("unknown band: {}", other)),
        }
    }
}

/// A candidate scene as returned by the catalog. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescriptor {
    /// Catalog item identifier, e.g. "S2B_40RCN_20240714_0_L2A"
    pub id: String,
    /// Acquisition date (UTC)
    pub date: NaiveDate,
    /// Scene cloud cover in percent
    pub cloud_cover: f64,
    /// Asset key -> remote locator (URL)
    pub assets: BTreeMap<String, String>,
}

impl SceneDescriptor {
    /// Remote locator for a band, if the scene carries that asset.
    pub fn locator(&self, band: Band) -> Option<&str> {
        self.assets.get(band.asset_key()).map(String::as_str)
    }
}
