//! ecupatch-core - Patch Engine for ECU Calibration Images
//!
//! A library for applying performance calibrations and feature removals to
//! raw ECU firmware images, with full modification reports.
//!
//! # Features
//!
//! - **Typed requests** - every option is a field of [`OperationRequest`],
//!   typos are rejected
//! - **Saturating map scaling** - fields never wrap, whatever the multiplier
//! - **Pattern scanning** - feature markers and DTC codes zero-filled in place
//! - **Trailer checksums** - CRC-32 and 16-bit byte sum recomputed after every patch
//! - **YAML tables** - region layout, stage multipliers and markers are
//!   configuration, not code
//! - **Diff reports** - byte-level audit of original and patched images
//!
//! # Quick Start
//!
//! ```rust
//! use ecupatch_core::prelude::*;
//!
//! let engine = PatchEngine::default();
//!
//! // Boost map lives at 0x20000 in the built-in table
//! let mut image = vec![0x10u8; 0x71004];
//! image[0x20000..0x20002].copy_from_slice(&[0x10, 0x00]);
//!
//! let request = OperationRequest::full_stage(StageId::Stage1).with_dpf_removed();
//! let outcome = engine.patch(image.clone(), &request).unwrap();
//!
//! // 4096 * 1.15 = 4710 (0x1266)
//! assert_eq!(&outcome.image[0x20000..0x20002], &[0x12, 0x66]);
//! assert!(outcome.image[0x60000..0x60100].iter().all(|&b| b == 0));
//! assert!(verify_trailer(&outcome.image).unwrap().is_valid());
//!
//! let diff = compare(&image, &outcome.image).unwrap();
//! assert!(diff.differences_count > 0);
//! ```
//!
//! # Operation Order
//!
//! | Step | Region / pattern | Encoding |
//! |------|------------------|----------|
//! | Boost | `boost_map` | u16 BE |
//! | Fuel | `fuel_map` | u16 BE |
//! | Timing | `timing_map` | i8 |
//! | Torque limiter | `torque_limiter` | u16 BE |
//! | RPM limit | `limiter_map[0..2]` | u16 BE |
//! | Speed limiter | `limiter_map[2]` | u8 |
//! | DPF | `dpf_data` + markers | zero fill |
//! | EGR | `egr_data` + markers | zero fill |
//! | AdBlue | markers | zero fill |
//! | DTC codes | 2-byte code patterns | zero fill |
//! | Checksums | last 4 bytes | CRC-32 BE, then u16 sum BE |

pub mod analyze;
pub mod checksum;
pub mod config;
pub mod diff;
pub mod dtc;
pub mod error;
pub mod patch;
pub mod region;
pub mod report;
pub mod request;
pub mod scan;
pub mod stage;
pub mod transform;
pub mod types;

// Re-export main types
pub use analyze::{analyze, Analysis, CurrentStage, EcuInfo, Removal, TuningOption};
pub use checksum::{update_trailer, verify_trailer, TrailerChecksums, TrailerStatus};
pub use config::{EngineConfig, FeatureMarkers};
pub use diff::{compare, ByteDiff, DiffReport, MAX_REPORTED_DIFFERENCES};
pub use dtc::{DtcCategory, DtcCode};
pub use error::{
    format_offset, parse_offset, ConfigError, ConfigResult, DiffError, DiffResult, PatchError,
    PatchResult,
};
pub use patch::{PatchEngine, PatchOutcome, PatchPlan, PatchStep};
pub use region::{Region, RegionTable};
pub use report::{ModValue, Modification, ModificationKind, PatchNote, PatchReport};
pub use request::OperationRequest;
pub use scan::Substitution;
pub use stage::{RiskLevel, StageId, StageProfile, StageTable};
pub use types::{ByteOrder, DataType, FieldEncoding};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::checksum::verify_trailer;
    pub use crate::config::EngineConfig;
    pub use crate::diff::compare;
    pub use crate::error::{PatchError, PatchResult};
    pub use crate::patch::PatchEngine;
    pub use crate::request::OperationRequest;
    pub use crate::stage::StageId;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_workflow() {
        let yaml = r#"
regions:
  boost_map:
    start: "0x00"
    length: 4
    description: Boost
  timing_map:
    start: "0x04"
    length: 2
    description: Timing
  dpf_data:
    start: "0x08"
    length: 4
    description: DPF data

stages:
  stage2:
    boost: 1.5
    fuel: 1.0
    timing: 2.0
    torque_limit: 1.0
    description: Test stage
    risk: high

markers:
  dpf: ["CA FE"]
"#;
        let engine = PatchEngine::new(EngineConfig::from_yaml(yaml).unwrap());

        let mut image = vec![0u8; 32];
        image[0..4].copy_from_slice(&[0x00, 0x64, 0xC0, 0x00]); // 100, 49152
        image[4..6].copy_from_slice(&[0x05, 0xF0]); // 5, -16
        image[8..12].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        image[16..18].copy_from_slice(&[0xCA, 0xFE]);
        image[20..22].copy_from_slice(&[0x04, 0x20]);

        let request = OperationRequest::new()
            .with_stage(StageId::Stage2)
            .with_boost()
            .with_timing()
            .with_dpf_removed()
            .with_dtc("P0420");
        let original = image.clone();
        let outcome = engine.patch(image, &request).unwrap();
        let image = outcome.image;
        let report = outcome.report;

        // 100 * 1.5 = 150; 49152 * 1.5 saturates
        assert_eq!(&image[0..4], &[0x00, 0x96, 0xFF, 0xFF]);
        // 5 * 2 = 10; -16 * 2 = -32
        assert_eq!(&image[4..6], &[0x0A, 0xE0]);
        assert_eq!(&image[8..12], &[0, 0, 0, 0]);
        assert_eq!(&image[16..18], &[0, 0]);
        assert_eq!(&image[20..22], &[0, 0]);

        assert_eq!(report.stage, Some(StageId::Stage2));
        assert_eq!(report.description, "Test stage");
        assert_eq!(report.count(ModificationKind::BoostPressure), 2);
        assert_eq!(report.count(ModificationKind::IgnitionTiming), 2);
        assert_eq!(report.count(ModificationKind::DpfRemoval), 2);
        assert_eq!(report.count(ModificationKind::DtcRemoval), 1);
        assert_eq!(report.original_size, 32);
        assert_eq!(report.modified_size, 32);
        assert!(report.notes.is_empty());

        assert!(verify_trailer(&image).unwrap().is_valid());

        let diff = compare(&original, &image).unwrap();
        assert_eq!(diff.total_bytes_compared, 32);
        assert!(diff.differences.iter().any(|d| d.offset == 1));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["stage"], "stage2");
        assert_eq!(json["modifications"][0]["kind"], "boost_pressure");
        assert_eq!(json["modifications"][0]["change_percent"], 50.0);
    }
}
