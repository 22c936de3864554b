//! Operation request
//!
//! A fully typed description of one patch call. Unknown fields are rejected
//! when deserializing, so a misspelled option fails loudly instead of being
//! ignored.

use serde::{Deserialize, Serialize};

use crate::dtc::DtcCode;
use crate::error::{PatchError, PatchResult};
use crate::stage::StageId;

/// What a patch call should do
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OperationRequest {
    /// Stage whose multipliers drive the scaled maps
    pub stage: Option<StageId>,
    pub apply_boost: bool,
    pub apply_fuel: bool,
    pub apply_timing: bool,
    pub remove_torque_limiter: bool,
    /// New RPM limit, written big-endian as a u16 into every field of the
    /// limiter map
    ///
    /// JSON values above 65535 are rejected with `InvalidRequest`.
    pub new_rpm_limit: Option<u16>,
    pub remove_speed_limiter: bool,
    pub remove_dpf: bool,
    pub remove_egr: bool,
    pub remove_adblue: bool,
    /// DTC codes to disable, processed in order
    pub dtc_codes_to_remove: Vec<String>,
}

impl OperationRequest {
    /// Empty request (only the trailer checksums are recomputed)
    pub fn new() -> Self {
        Self::default()
    }

    /// Request scaling boost, fuel, timing and torque limiter for a stage
    pub fn full_stage(stage: StageId) -> Self {
        Self {
            stage: Some(stage),
            apply_boost: true,
            apply_fuel: true,
            apply_timing: true,
            remove_torque_limiter: true,
            ..Self::default()
        }
    }

    /// Parse a request from JSON
    pub fn from_json(json: &str) -> PatchResult<Self> {
        serde_json::from_str(json).map_err(|e| PatchError::InvalidRequest(e.to_string()))
    }

    pub fn with_stage(mut self, stage: StageId) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn with_boost(mut self) -> Self {
        self.apply_boost = true;
        self
    }

    pub fn with_fuel(mut self) -> Self {
        self.apply_fuel = true;
        self
    }

    pub fn with_timing(mut self) -> Self {
        self.apply_timing = true;
        self
    }

    pub fn with_torque_limiter_removed(mut self) -> Self {
        self.remove_torque_limiter = true;
        self
    }

    pub fn with_rpm_limit(mut self, rpm: u16) -> Self {
        self.new_rpm_limit = Some(rpm);
        self
    }

    pub fn with_speed_limiter_removed(mut self) -> Self {
        self.remove_speed_limiter = true;
        self
    }

    pub fn with_dpf_removed(mut self) -> Self {
        self.remove_dpf = true;
        self
    }

    pub fn with_egr_removed(mut self) -> Self {
        self.remove_egr = true;
        self
    }

    pub fn with_adblue_removed(mut self) -> Self {
        self.remove_adblue = true;
        self
    }

    pub fn with_dtc(mut self, code: impl Into<String>) -> Self {
        self.dtc_codes_to_remove.push(code.into());
        self
    }

    /// Whether any step needs stage multipliers
    pub fn needs_stage(&self) -> bool {
        self.apply_boost || self.apply_fuel || self.apply_timing || self.remove_torque_limiter
    }

    /// Check the request and parse its DTC codes
    ///
    /// Fails when a multiplier step is requested without a stage or when a
    /// DTC code is malformed.
    pub fn validate(&self) -> PatchResult<Vec<DtcCode>> {
        if self.needs_stage() && self.stage.is_none() {
            return Err(PatchError::InvalidRequest(
                "boost, fuel, timing and torque limiter changes require a stage".to_string(),
            ));
        }
        self.dtc_codes_to_remove
            .iter()
            .map(|code| code.parse::<DtcCode>())
            .collect()
    }
}
