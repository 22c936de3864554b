//! Region table
//!
//! Maps symbolic region names to fixed byte ranges of the image. Regions are
//! declared independently of any image; bounds are checked per use against
//! the actual buffer.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult, PatchError, PatchResult};

/// Well-known region names used by the patch steps
pub mod names {
    /// Turbo boost pressure map (big-endian u16)
    pub const BOOST_MAP: &str = "boost_map";
    /// Fuel injection map (big-endian u16)
    pub const FUEL_MAP: &str = "fuel_map";
    /// Ignition timing map (i8)
    pub const TIMING_MAP: &str = "timing_map";
    /// RPM limit (first 2 bytes) and speed limit (third byte)
    pub const LIMITER_MAP: &str = "limiter_map";
    /// Torque limiter map (big-endian u16)
    pub const TORQUE_LIMITER: &str = "torque_limiter";
    /// DPF control data
    pub const DPF_DATA: &str = "dpf_data";
    /// EGR control data
    pub const EGR_DATA: &str = "egr_data";
    /// DTC storage area
    pub const DTC_STORAGE: &str = "dtc_storage";
}

/// A named byte range within a firmware image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub start: usize,
    pub length: usize,
    pub description: String,
}

impl Region {
    pub fn new(
        name: impl Into<String>,
        start: usize,
        length: usize,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            start,
            length,
            description: description.into(),
        }
    }

    /// Exclusive end offset (saturating, so absurd offsets never wrap)
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.length)
    }

    /// Check whether the whole region lies inside an image of `image_len` bytes
    pub fn fits(&self, image_len: usize) -> bool {
        self.end() <= image_len
    }

    /// Byte range covered by the region
    pub fn range(&self) -> Range<usize> {
        self.start..self.end()
    }
}

/// Read-only table of regions, kept in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionTable {
    regions: Vec<Region>,
}

impl RegionTable {
    /// Create an empty table
    pub fn empty() -> Self {
        Self {
            regions: Vec::new(),
        }
    }

    /// Build a table from a list of regions
    pub fn from_regions(regions: impl IntoIterator<Item = Region>) -> ConfigResult<Self> {
        let mut table = Self::empty();
        for region in regions {
            table.insert(region)?;
        }
        Ok(table)
    }

    /// Add a region
    ///
    /// Zero-length and duplicate regions are rejected.
    pub fn insert(&mut self, region: Region) -> ConfigResult<()> {
        if region.length == 0 {
            return Err(ConfigError::EmptyRegion(region.name));
        }
        if self.get(&region.name).is_some() {
            return Err(ConfigError::DuplicateRegion(region.name));
        }
        self.regions.push(region);
        Ok(())
    }

    /// Get a region by name
    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// Look up a region, failing with [`PatchError::UnknownRegion`]
    pub fn lookup(&self, name: &str) -> PatchResult<&Region> {
        self.get(name)
            .ok_or_else(|| PatchError::UnknownRegion(name.to_string()))
    }

    /// Iterate regions in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl Default for RegionTable {
    /// Placeholder layout loosely modelled on a Bosch EDC17 image
    fn default() -> Self {
        Self {
            regions: vec![
                Region::new(names::BOOST_MAP, 0x20000, 512, "Turbo boost pressure map"),
                Region::new(names::FUEL_MAP, 0x30000, 1024, "Fuel injection map"),
                Region::new(names::TIMING_MAP, 0x40000, 512, "Ignition timing map"),
                Region::new(names::LIMITER_MAP, 0x50000, 256, "RPM and speed limiters"),
                Region::new(names::TORQUE_LIMITER, 0x51000, 128, "Torque limiter map"),
                Region::new(names::DPF_DATA, 0x60000, 256, "DPF control data"),
                Region::new(names::EGR_DATA, 0x61000, 128, "EGR control data"),
                Region::new(names::DTC_STORAGE, 0x70000, 2048, "DTC error code storage"),
            ],
        }
    }
}
