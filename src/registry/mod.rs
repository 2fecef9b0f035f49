//! Store spot registry.
//!
//! Store spots are the unit of catalog partitioning and authorization
//! scope. The set is provisioned externally: either the built-in
//! defaults or a TOML file passed on the command line. There are no
//! mutation operations, every other component only validates against
//! the registry.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSpot {
    /// Short slug used as partition key, e.g. "sch".
    pub slug: String,
    /// Human readable name shown by the store picker.
    pub display_name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown store spot '{0}'")]
pub struct UnknownStoreSpot(pub String);

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(rename = "spot")]
    spots: Vec<StoreSpot>,
}

pub struct StoreRegistry {
    spots: Vec<StoreSpot>,
}

impl StoreRegistry {
    /// The store spots provisioned when no registry file is given.
    pub fn with_defaults() -> Self {
        let spots = [
            ("sch", "Soonchunhyang"),
            ("sunmoon", "Sunmoon"),
            ("nasaret", "Nasaret"),
            ("kongju", "Kongju"),
            ("mokwon", "Mokwon"),
        ]
        .into_iter()
        .map(|(slug, display_name)| StoreSpot {
            slug: slug.to_owned(),
            display_name: display_name.to_owned(),
        })
        .collect();
        Self { spots }
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry file {:?}", path))?;
        let file: RegistryFile = toml::from_str(&text)
            .with_context(|| format!("Failed to parse registry file {:?}", path))?;
        if file.spots.is_empty() {
            anyhow::bail!("Registry file {:?} contains no store spots", path);
        }
        Ok(Self { spots: file.spots })
    }

    /// All registered spots, in stable registration order.
    pub fn spots(&self) -> &[StoreSpot] {
        &self.spots
    }

    pub fn is_valid(&self, slug: &str) -> bool {
        self.spots.iter().any(|s| s.slug == slug)
    }

    pub fn get(&self, slug: &str) -> Option<&StoreSpot> {
        self.spots.iter().find(|s| s.slug == slug)
    }

    /// Like [`get`](Self::get) but turns a miss into the error callers
    /// are expected to surface instead of silently defaulting.
    pub fn require(&self, slug: &str) -> Result<&StoreSpot, UnknownStoreSpot> {
        self.get(slug).ok_or_else(|| UnknownStoreSpot(slug.to_owned()))
    }
}
