//! Engine configuration
//!
//! An [`EngineConfig`] bundles the region table, the stage table and the
//! feature marker patterns. It is built once, never mutated, and handed to
//! a [`PatchEngine`](crate::patch::PatchEngine).
//!
//! # YAML format
//!
//! ```yaml
//! regions:
//!   boost_map:
//!     start: "0x20000"
//!     length: 512
//!     description: Turbo boost pressure map
//!
//! stages:
//!   stage1:
//!     boost: 1.15
//!     fuel: 1.08
//!     timing: 1.05
//!     torque_limit: 1.18
//!     description: Conservative tune
//!     risk: low
//!
//! markers:
//!   dpf: ["12 34 56 78"]
//!   egr: ["AB CD EF"]
//!   adblue: ["11 22 33 44"]
//! ```
//!
//! Every top-level section is optional; a missing section keeps the
//! built-in table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{parse_offset, ConfigResult};
use crate::region::{Region, RegionTable};
use crate::scan::Substitution;
use crate::stage::{RiskLevel, StageId, StageProfile, StageTable};

/// Zero-fill marker patterns scanned when a feature is removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMarkers {
    #[serde(default)]
    pub dpf: Vec<Substitution>,
    #[serde(default)]
    pub egr: Vec<Substitution>,
    #[serde(default)]
    pub adblue: Vec<Substitution>,
}

impl Default for FeatureMarkers {
    fn default() -> Self {
        Self {
            // DPF soot mass calculation
            dpf: vec![Substitution::from_static(&[0x12, 0x34, 0x56, 0x78])],
            // EGR valve position
            egr: vec![Substitution::from_static(&[0xAB, 0xCD, 0xEF])],
            // AdBlue NOx sensor
            adblue: vec![Substitution::from_static(&[0x11, 0x22, 0x33, 0x44])],
        }
    }
}

/// Complete, immutable configuration of the patch engine
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineConfig {
    pub regions: RegionTable,
    pub stages: StageTable,
    pub markers: FeatureMarkers,
}

impl EngineConfig {
    /// Load configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> ConfigResult<Self> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        let mut config = Self::default();

        if let Some(regions) = file.regions {
            let mut parsed = Vec::with_capacity(regions.len());
            for (name, entry) in regions {
                parsed.push(Region::new(
                    name,
                    entry.start.resolve()?,
                    entry.length.resolve()?,
                    entry.description.unwrap_or_default(),
                ));
            }
            // Declaration order follows the image layout
            parsed.sort_by_key(|r| r.start);
            config.regions = RegionTable::from_regions(parsed)?;
        }

        if let Some(stages) = file.stages {
            config.stages = StageTable::from_profiles(stages.into_iter().map(|(id, entry)| {
                StageProfile {
                    id,
                    boost_multiplier: entry.boost,
                    fuel_multiplier: entry.fuel,
                    timing_multiplier: entry.timing,
                    torque_limit_multiplier: entry.torque_limit,
                    description: entry.description.unwrap_or_default(),
                    risk: entry.risk.unwrap_or(RiskLevel::Medium),
                }
            }))?;
        }

        if let Some(markers) = file.markers {
            config.markers = markers;
        }

        Ok(config)
    }
}

/// On-disk shape of the configuration file
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    regions: Option<BTreeMap<String, RegionEntry>>,
    #[serde(default)]
    stages: Option<BTreeMap<StageId, StageEntry>>,
    #[serde(default)]
    markers: Option<FeatureMarkers>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegionEntry {
    start: OffsetValue,
    length: OffsetValue,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StageEntry {
    boost: f64,
    fuel: f64,
    timing: f64,
    torque_limit: f64,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    risk: Option<RiskLevel>,
}

/// Offset written either as a number or as a (hex) string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OffsetValue {
    Number(usize),
    Text(String),
}

impl OffsetValue {
    fn resolve(&self) -> ConfigResult<usize> {
        match self {
            OffsetValue::Number(n) => Ok(*n),
            OffsetValue::Text(s) => parse_offset(s),
        }
    }
}
