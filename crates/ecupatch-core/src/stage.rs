//! Stage profiles
//!
//! A stage is a tuning preset: one multiplier per scaled map plus a
//! description and a risk tier.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult, PatchError, PatchResult};

/// Stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Stage1,
    Stage2,
    Stage3,
}

impl StageId {
    pub const ALL: [StageId; 3] = [StageId::Stage1, StageId::Stage2, StageId::Stage3];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Stage1 => "stage1",
            StageId::Stage2 => "stage2",
            StageId::Stage3 => "stage3",
        }
    }

    /// Stage number (1-3)
    pub fn number(&self) -> u8 {
        match self {
            StageId::Stage1 => 1,
            StageId::Stage2 => 2,
            StageId::Stage3 => 3,
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = PatchError;

    /// Accepts "stage1", "Stage 1", "STAGE1" and "1"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let digits = normalized.strip_prefix("stage").unwrap_or(normalized.as_str());
        match digits {
            "1" => Ok(StageId::Stage1),
            "2" => Ok(StageId::Stage2),
            "3" => Ok(StageId::Stage3),
            _ => Err(PatchError::UnknownStage(s.to_string())),
        }
    }
}

/// Risk tier of a tuning option
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// Multipliers and metadata for one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProfile {
    pub id: StageId,
    pub boost_multiplier: f64,
    pub fuel_multiplier: f64,
    pub timing_multiplier: f64,
    pub torque_limit_multiplier: f64,
    pub description: String,
    pub risk: RiskLevel,
}

impl StageProfile {
    /// Check that every multiplier is finite and positive
    pub fn validate(&self) -> ConfigResult<()> {
        let fields = [
            ("boost", self.boost_multiplier),
            ("fuel", self.fuel_multiplier),
            ("timing", self.timing_multiplier),
            ("torque_limit", self.torque_limit_multiplier),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidMultiplier {
                    stage: self.id.to_string(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Advertised power gain in percent, derived from the boost multiplier
    pub fn power_gain_percent(&self) -> f64 {
        ((self.boost_multiplier - 1.0) * 100.0).round()
    }
}

/// Read-only table of stage profiles
#[derive(Debug, Clone, PartialEq)]
pub struct StageTable {
    profiles: Vec<StageProfile>,
}

impl StageTable {
    /// Build a table, validating each profile
    ///
    /// A later profile with the same id replaces an earlier one.
    pub fn from_profiles(profiles: impl IntoIterator<Item = StageProfile>) -> ConfigResult<Self> {
        let mut table = Self {
            profiles: Vec::new(),
        };
        for profile in profiles {
            profile.validate()?;
            match table.profiles.iter().position(|p| p.id == profile.id) {
                Some(pos) => table.profiles[pos] = profile,
                None => table.profiles.push(profile),
            }
        }
        table.profiles.sort_by_key(|p| p.id);
        Ok(table)
    }

    /// Get a profile by id
    pub fn get(&self, id: StageId) -> Option<&StageProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Look up a profile, failing with [`PatchError::UnknownStage`]
    pub fn lookup(&self, id: StageId) -> PatchResult<&StageProfile> {
        self.get(id)
            .ok_or_else(|| PatchError::UnknownStage(id.to_string()))
    }

    /// Iterate profiles ordered by stage
    pub fn iter(&self) -> impl Iterator<Item = &StageProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for StageTable {
    fn default() -> Self {
        Self {
            profiles: vec![
                StageProfile {
                    id: StageId::Stage1,
                    boost_multiplier: 1.15,
                    fuel_multiplier: 1.08,
                    timing_multiplier: 1.05,
                    torque_limit_multiplier: 1.18,
                    description: "Conservative tune, safe for stock hardware".to_string(),
                    risk: RiskLevel::Low,
                },
                StageProfile {
                    id: StageId::Stage2,
                    boost_multiplier: 1.30,
                    fuel_multiplier: 1.15,
                    timing_multiplier: 1.10,
                    torque_limit_multiplier: 1.35,
                    description: "Aggressive tune, requires upgraded intercooler".to_string(),
                    risk: RiskLevel::Medium,
                },
                StageProfile {
                    id: StageId::Stage3,
                    boost_multiplier: 1.50,
                    fuel_multiplier: 1.25,
                    timing_multiplier: 1.15,
                    torque_limit_multiplier: 1.55,
                    description: "Race tune, requires turbo upgrade".to_string(),
                    risk: RiskLevel::High,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("stage1", StageId::Stage1)]
    #[case("Stage 2", StageId::Stage2)]
    #[case("STAGE_3", StageId::Stage3)]
    #[case("1", StageId::Stage1)]
    fn test_parse_stage(#[case] input: &str, #[case] expected: StageId) {
        assert_eq!(input.parse::<StageId>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_stage() {
        assert!(matches!(
            "stage4".parse::<StageId>(),
            Err(PatchError::UnknownStage(s)) if s == "stage4"
        ));
        assert!("".parse::<StageId>().is_err());
    }

    #[rstest]
    #[case(StageId::Stage1, 1.15, RiskLevel::Low)]
    #[case(StageId::Stage2, 1.30, RiskLevel::Medium)]
    #[case(StageId::Stage3, 1.50, RiskLevel::High)]
    fn test_default_profiles(#[case] id: StageId, #[case] boost: f64, #[case] risk: RiskLevel) {
        let table = StageTable::default();
        let profile = table.lookup(id).unwrap();
        assert_eq!(profile.boost_multiplier, boost);
        assert_eq!(profile.risk, risk);
    }

    #[test]
    fn test_lookup_missing_stage() {
        let table = StageTable::from_profiles(
            StageTable::default()
                .iter()
                .filter(|p| p.id != StageId::Stage3)
                .cloned(),
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert!(matches!(
            table.lookup(StageId::Stage3),
            Err(PatchError::UnknownStage(s)) if s == "stage3"
        ));
    }

    #[test]
    fn test_rejects_non_positive_multiplier() {
        let mut profile = StageTable::default().lookup(StageId::Stage1).unwrap().clone();
        profile.fuel_multiplier = 0.0;
        assert!(matches!(
            StageTable::from_profiles([profile.clone()]),
            Err(ConfigError::InvalidMultiplier { field: "fuel", .. })
        ));
        profile.fuel_multiplier = f64::NAN;
        assert!(profile.validate().is_err());
    }

    #[test]
    fn test_power_gain() {
        let table = StageTable::default();
        assert_eq!(table.lookup(StageId::Stage1).unwrap().power_gain_percent(), 15.0);
        assert_eq!(table.lookup(StageId::Stage3).unwrap().power_gain_percent(), 50.0);
    }
}
