//! Patch orchestrator
//!
//! Resolves an [`OperationRequest`] into an ordered [`PatchPlan`], then runs
//! the plan over a single mutable image. Every step sees the bytes left by
//! the steps before it. Step order is fixed:
//!
//! ```text
//! boost -> fuel -> timing -> torque limiter -> rpm limit -> speed limiter
//!       -> DPF -> EGR -> AdBlue -> DTC codes -> trailer checksums
//! ```
//!
//! All fatal conditions (unknown stage or region, malformed DTC, image too
//! small for the trailer) are detected while building the plan, before any
//! byte is written.

use serde::Serialize;
use tracing::{debug, info};

use crate::checksum::{self, TRAILER_LEN};
use crate::config::EngineConfig;
use crate::dtc::DtcCode;
use crate::error::{PatchError, PatchResult};
use crate::region::{names, Region};
use crate::report::{Modification, ModificationKind, PatchNote, PatchReport};
use crate::request::OperationRequest;
use crate::scan::Substitution;
use crate::stage::StageId;
use crate::transform::{self, RegionSkipped};
use crate::types::FieldEncoding;

/// Byte offset of the speed limit inside the limiter map
const SPEED_LIMIT_OFFSET: usize = 2;

/// Value written to disable the speed limiter
const SPEED_LIMIT_MAX: u8 = 0xFF;

/// One resolved step of a patch
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PatchStep<'c> {
    /// Multiply every field of a map
    Scale {
        region: &'c Region,
        encoding: FieldEncoding,
        multiplier: f64,
        kind: ModificationKind,
    },
    /// Write a new RPM limit (big-endian u16) at the start of the limiter map
    SetRpmLimit { region: &'c Region, rpm: u16 },
    /// Max out the speed limit byte of the limiter map
    RemoveSpeedLimiter { region: &'c Region },
    /// Zero a whole region
    ZeroRegion {
        region: &'c Region,
        kind: ModificationKind,
    },
    /// Zero-fill feature marker patterns across the image
    ScanMarkers {
        markers: &'c [Substitution],
        kind: ModificationKind,
        feature: &'static str,
    },
    /// Zero-fill a DTC pattern across the image
    RemoveDtc { code: DtcCode },
}

impl PatchStep<'_> {
    /// Short human-readable label
    pub fn label(&self) -> String {
        match self {
            PatchStep::Scale {
                region, multiplier, ..
            } => format!("scale {} x{}", region.name, multiplier),
            PatchStep::SetRpmLimit { rpm, .. } => format!("set rpm limit {}", rpm),
            PatchStep::RemoveSpeedLimiter { .. } => "remove speed limiter".to_string(),
            PatchStep::ZeroRegion { region, .. } => format!("zero {}", region.name),
            PatchStep::ScanMarkers {
                markers, feature, ..
            } => format!("scan {} {} marker(s)", markers.len(), feature),
            PatchStep::RemoveDtc { code } => format!("remove DTC {}", code),
        }
    }
}

/// Ordered list of steps resolved from a request
#[derive(Debug, Clone, Serialize)]
pub struct PatchPlan<'c> {
    pub stage: Option<StageId>,
    pub description: String,
    pub steps: Vec<PatchStep<'c>>,
}

impl<'c> PatchPlan<'c> {
    /// Resolve a request against a configuration
    pub fn resolve(config: &'c EngineConfig, request: &OperationRequest) -> PatchResult<Self> {
        let dtc_codes = request.validate()?;

        let profile = request
            .stage
            .map(|id| config.stages.lookup(id))
            .transpose()?;

        let mut steps = Vec::new();

        if let Some(profile) = profile {
            let scaled = [
                (
                    request.apply_boost,
                    names::BOOST_MAP,
                    FieldEncoding::U16_BE,
                    profile.boost_multiplier,
                    ModificationKind::BoostPressure,
                ),
                (
                    request.apply_fuel,
                    names::FUEL_MAP,
                    FieldEncoding::U16_BE,
                    profile.fuel_multiplier,
                    ModificationKind::FuelInjection,
                ),
                (
                    request.apply_timing,
                    names::TIMING_MAP,
                    FieldEncoding::I8,
                    profile.timing_multiplier,
                    ModificationKind::IgnitionTiming,
                ),
                (
                    request.remove_torque_limiter,
                    names::TORQUE_LIMITER,
                    FieldEncoding::U16_BE,
                    profile.torque_limit_multiplier,
                    ModificationKind::TorqueLimiter,
                ),
            ];
            for (enabled, name, encoding, multiplier, kind) in scaled {
                if enabled {
                    steps.push(PatchStep::Scale {
                        region: config.regions.lookup(name)?,
                        encoding,
                        multiplier,
                        kind,
                    });
                }
            }
        }

        if let Some(rpm) = request.new_rpm_limit {
            steps.push(PatchStep::SetRpmLimit {
                region: config.regions.lookup(names::LIMITER_MAP)?,
                rpm,
            });
        }

        if request.remove_speed_limiter {
            steps.push(PatchStep::RemoveSpeedLimiter {
                region: config.regions.lookup(names::LIMITER_MAP)?,
            });
        }

        if request.remove_dpf {
            steps.push(PatchStep::ZeroRegion {
                region: config.regions.lookup(names::DPF_DATA)?,
                kind: ModificationKind::DpfRemoval,
            });
            push_markers(&mut steps, &config.markers.dpf, ModificationKind::DpfRemoval, "DPF");
        }

        if request.remove_egr {
            steps.push(PatchStep::ZeroRegion {
                region: config.regions.lookup(names::EGR_DATA)?,
                kind: ModificationKind::EgrRemoval,
            });
            push_markers(&mut steps, &config.markers.egr, ModificationKind::EgrRemoval, "EGR");
        }

        if request.remove_adblue {
            push_markers(
                &mut steps,
                &config.markers.adblue,
                ModificationKind::AdblueRemoval,
                "AdBlue",
            );
        }

        steps.extend(dtc_codes.into_iter().map(|code| PatchStep::RemoveDtc { code }));

        Ok(Self {
            stage: request.stage,
            description: profile
                .map(|p| p.description.clone())
                .unwrap_or_else(|| "Feature changes without stage tuning".to_string()),
            steps,
        })
    }

    /// Run every step over `image`, then rewrite the trailer checksums
    pub fn execute(&self, image: &mut [u8]) -> PatchResult<PatchReport> {
        if image.len() < TRAILER_LEN {
            return Err(PatchError::ImageTooSmall {
                len: image.len(),
                min: TRAILER_LEN,
            });
        }

        let original_size = image.len();
        let mut modifications = Vec::new();
        let mut notes: Vec<PatchNote> = Vec::new();

        for step in &self.steps {
            debug!(step = %step.label(), "Running patch step");
            match run_step(step, image) {
                Ok(mods) => modifications.extend(mods),
                Err(skipped) => notes.push(skipped.into()),
            }
        }

        let trailer = checksum::update_trailer(image)?;

        info!(
            stage = ?self.stage,
            modifications = modifications.len(),
            skipped = notes.len(),
            "Patch applied"
        );

        Ok(PatchReport {
            stage: self.stage,
            modifications,
            original_size,
            modified_size: image.len(),
            checksum_updated: true,
            trailer: Some(trailer),
            description: self.description.clone(),
            notes,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn push_markers<'c>(
    steps: &mut Vec<PatchStep<'c>>,
    markers: &'c [Substitution],
    kind: ModificationKind,
    feature: &'static str,
) {
    if !markers.is_empty() {
        steps.push(PatchStep::ScanMarkers {
            markers,
            kind,
            feature,
        });
    }
}

fn run_step(step: &PatchStep<'_>, image: &mut [u8]) -> Result<Vec<Modification>, RegionSkipped> {
    match step {
        PatchStep::Scale {
            region,
            encoding,
            multiplier,
            kind,
        } => transform::scale_region(image, region, *encoding, *multiplier, *kind),

        PatchStep::SetRpmLimit { region, rpm } => {
            let field = Region::new(region.name.clone(), region.start, 2, "RPM limit");
            transform::check_bounds(&field, image.len())?;
            let bytes = &mut image[field.range()];
            let original = FieldEncoding::U16_BE.read(bytes);
            FieldEncoding::U16_BE.write(*rpm as i64, bytes);
            info!(original, rpm, "RPM limit set");
            Ok(vec![Modification::numeric(
                field.start,
                ModificationKind::RpmLimiter,
                original,
                *rpm as i64,
                format!("RPM limit set to {}", rpm),
            )])
        }

        PatchStep::RemoveSpeedLimiter { region } => {
            let field = Region::new(
                region.name.clone(),
                region.start.saturating_add(SPEED_LIMIT_OFFSET),
                1,
                "Speed limit",
            );
            transform::check_bounds(&field, image.len())?;
            let original = image[field.start];
            image[field.start] = SPEED_LIMIT_MAX;
            info!(original, "Speed limiter removed");
            Ok(vec![Modification::numeric(
                field.start,
                ModificationKind::SpeedLimiter,
                original as i64,
                SPEED_LIMIT_MAX as i64,
                "Speed limiter removed",
            )])
        }

        PatchStep::ZeroRegion { region, kind } => {
            transform::check_bounds(region, image.len())?;
            let bytes = &mut image[region.range()];
            let original = bytes.to_vec();
            bytes.fill(0);
            info!(region = %region.name, bytes = region.length, "Region zeroed");
            Ok(vec![Modification::bytes(
                region.start,
                *kind,
                original,
                vec![0u8; region.length],
                format!("{} zeroed", region.description),
            )])
        }

        PatchStep::ScanMarkers {
            markers,
            kind,
            feature,
        } => {
            let mut mods = Vec::new();
            for marker in markers.iter() {
                for hit in marker.apply(image) {
                    debug!(feature, offset = hit.offset, "Marker cleared");
                    mods.push(Modification::bytes(
                        hit.offset,
                        *kind,
                        hit.original,
                        marker.replacement().to_vec(),
                        format!("{} marker disabled", feature),
                    ));
                }
            }
            info!(feature, hits = mods.len(), "Marker scan finished");
            Ok(mods)
        }

        PatchStep::RemoveDtc { code } => {
            let pattern = Substitution::from_static(&code.pattern());
            let mods: Vec<Modification> = pattern
                .apply(image)
                .into_iter()
                .map(|hit| {
                    Modification::bytes(
                        hit.offset,
                        ModificationKind::DtcRemoval,
                        hit.original,
                        pattern.replacement().to_vec(),
                        format!("DTC {} disabled", code),
                    )
                })
                .collect();
            info!(dtc = %code, hits = mods.len(), "DTC removal finished");
            Ok(mods)
        }
    }
}

/// Output of a successful [`PatchEngine::patch`] call
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub image: Vec<u8>,
    pub report: PatchReport,
}

/// Entry point of the patch engine
///
/// Holds an immutable [`EngineConfig`]; safe to share between threads and to
/// call concurrently on independent images.
#[derive(Debug, Clone, Default)]
pub struct PatchEngine {
    config: EngineConfig,
}

impl PatchEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolve a request without touching any image
    pub fn plan(&self, request: &OperationRequest) -> PatchResult<PatchPlan<'_>> {
        PatchPlan::resolve(&self.config, request)
    }

    /// Patch an owned image
    ///
    /// On error the image is dropped; no partially patched buffer escapes.
    pub fn patch(&self, mut image: Vec<u8>, request: &OperationRequest) -> PatchResult<PatchOutcome> {
        let report = self.patch_in_place(&mut image, request)?;
        Ok(PatchOutcome { image, report })
    }

    /// Patch a caller-owned buffer in place
    ///
    /// The buffer is only written once the whole request has been resolved;
    /// a fatal error leaves it untouched.
    pub fn patch_in_place(
        &self,
        image: &mut [u8],
        request: &OperationRequest,
    ) -> PatchResult<PatchReport> {
        let plan = self.plan(request)?;
        info!(
            stage = ?plan.stage,
            steps = plan.steps.len(),
            image_len = image.len(),
            "Patching image"
        );
        plan.execute(image)
    }
}
