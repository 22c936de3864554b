//! Patch report types
//!
//! Plain data meant to be serialized as-is by the surrounding service.
//! Addresses are byte offsets; hex formatting is left to the presentation
//! layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::checksum::TrailerChecksums;
use crate::stage::StageId;

/// What a modification did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationKind {
    BoostPressure,
    FuelInjection,
    IgnitionTiming,
    TorqueLimiter,
    RpmLimiter,
    SpeedLimiter,
    DpfRemoval,
    EgrRemoval,
    AdblueRemoval,
    DtcRemoval,
}

impl ModificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModificationKind::BoostPressure => "boost_pressure",
            ModificationKind::FuelInjection => "fuel_injection",
            ModificationKind::IgnitionTiming => "ignition_timing",
            ModificationKind::TorqueLimiter => "torque_limiter",
            ModificationKind::RpmLimiter => "rpm_limiter",
            ModificationKind::SpeedLimiter => "speed_limiter",
            ModificationKind::DpfRemoval => "dpf_removal",
            ModificationKind::EgrRemoval => "egr_removal",
            ModificationKind::AdblueRemoval => "adblue_removal",
            ModificationKind::DtcRemoval => "dtc_removal",
        }
    }
}

impl std::fmt::Display for ModificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value before or after a modification
///
/// Numeric fields serialize as numbers, byte runs as hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModValue {
    Number(i64),
    Bytes(#[serde(with = "hex::serde")] Vec<u8>),
}

impl std::fmt::Display for ModValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModValue::Number(n) => write!(f, "{}", n),
            ModValue::Bytes(b) if b.len() > 8 => {
                write!(f, "{}.. ({} bytes)", hex::encode_upper(&b[..8]), b.len())
            }
            ModValue::Bytes(b) => f.write_str(&hex::encode_upper(b)),
        }
    }
}

/// One field or byte run touched by a patch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    /// Byte offset of the first touched byte
    pub address: usize,
    pub kind: ModificationKind,
    pub original_value: ModValue,
    pub new_value: ModValue,
    /// Relative change, omitted when the original value was zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    pub description: String,
}

impl Modification {
    /// Record a numeric field change
    pub fn numeric(
        address: usize,
        kind: ModificationKind,
        original: i64,
        new: i64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            address,
            kind,
            original_value: ModValue::Number(original),
            new_value: ModValue::Number(new),
            change_percent: change_percent(original, new),
            description: description.into(),
        }
    }

    /// Record a byte run change
    pub fn bytes(
        address: usize,
        kind: ModificationKind,
        original: Vec<u8>,
        new: Vec<u8>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            address,
            kind,
            original_value: ModValue::Bytes(original),
            new_value: ModValue::Bytes(new),
            change_percent: None,
            description: description.into(),
        }
    }
}

/// Percentage change rounded to two decimals, `None` for a zero original
pub fn change_percent(original: i64, new: i64) -> Option<f64> {
    if original == 0 {
        return None;
    }
    let pct = (new - original) as f64 / original as f64 * 100.0;
    Some((pct * 100.0).round() / 100.0)
}

/// Recoverable condition recorded instead of failing the patch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatchNote {
    /// Region extends past the end of the image and was skipped
    RegionOutOfBounds {
        region: String,
        start: usize,
        length: usize,
        image_len: usize,
    },
}

impl std::fmt::Display for PatchNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchNote::RegionOutOfBounds {
                region,
                start,
                length,
                image_len,
            } => write!(
                f,
                "{} skipped: 0x{:X}+{} exceeds image length {}",
                region, start, length, image_len
            ),
        }
    }
}

/// Aggregate result of one patch call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchReport {
    pub stage: Option<StageId>,
    pub modifications: Vec<Modification>,
    pub original_size: usize,
    pub modified_size: usize,
    pub checksum_updated: bool,
    /// Trailer values written by the checksum step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer: Option<TrailerChecksums>,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<PatchNote>,
}

impl PatchReport {
    /// Number of modifications of one kind
    pub fn count(&self, kind: ModificationKind) -> usize {
        self.modifications.iter().filter(|m| m.kind == kind).count()
    }

    /// Modification counts grouped by kind
    pub fn summary(&self) -> BTreeMap<ModificationKind, usize> {
        let mut summary = BTreeMap::new();
        for m in &self.modifications {
            *summary.entry(m.kind).or_insert(0) += 1;
        }
        summary
    }

    /// Modifications touching the byte range `[start, end)`
    pub fn in_range(&self, start: usize, end: usize) -> impl Iterator<Item = &Modification> {
        self.modifications
            .iter()
            .filter(move |m| m.address >= start && m.address < end)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
