//! Image analysis
//!
//! Best-effort identification of an image from its file name and contents,
//! plus the tuning options that apply to it. Nothing here touches the image.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::scan::find;
use crate::stage::{RiskLevel, StageId};

const BRANDS: &[&str] = &["BMW", "MERCEDES", "AUDI", "VW", "FORD", "OPEL", "RENAULT"];

const ENGINE_CODES: &[&str] = &[
    // BMW
    "N20B20", "N55B30", "B58B30",
    // Mercedes
    "M271", "M276", "M278",
    // Audi / VW
    "EA888", "TFSI", "TDI",
    // Ford
    "ECOBOOST", "DURATEC",
];

/// Stock output per (brand, engine code)
const POWER_TABLE: &[(&str, &str, StockPower)] = &[
    ("BMW", "N20B20", StockPower { hp: 184, nm: 270 }),
    ("BMW", "N55B30", StockPower { hp: 306, nm: 400 }),
    ("BMW", "B58B30", StockPower { hp: 340, nm: 450 }),
    ("VW", "EA888", StockPower { hp: 200, nm: 280 }),
    ("VW", "TFSI", StockPower { hp: 150, nm: 250 }),
];

/// Kind of control unit the image belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UnitType {
    Ecu,
    Dsg,
    Tcu,
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitType::Ecu => "ECU",
            UnitType::Dsg => "DSG",
            UnitType::Tcu => "TCU",
        };
        f.write_str(s)
    }
}

/// Factory power and torque estimate; zero when unknown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPower {
    pub hp: u32,
    pub nm: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcuInfo {
    pub brand: Option<String>,
    pub engine_code: Option<String>,
    pub unit_type: UnitType,
    pub file_size: usize,
    pub estimated_power: StockPower,
}

impl EcuInfo {
    /// Identify an image from its file name
    pub fn detect(filename: &str, image: &[u8]) -> Self {
        let upper = filename.to_uppercase();
        let brand = first_contained(&upper, BRANDS);
        let engine_code = first_contained(&upper, ENGINE_CODES);

        let unit_type = if upper.contains("DSG") {
            UnitType::Dsg
        } else if upper.contains("TCU") {
            UnitType::Tcu
        } else {
            UnitType::Ecu
        };

        let estimated_power = match (brand, engine_code) {
            (Some(brand), Some(code)) => POWER_TABLE
                .iter()
                .find(|(b, c, _)| *b == brand && *c == code)
                .map(|(_, _, power)| *power)
                .unwrap_or_default(),
            _ => StockPower::default(),
        };

        Self {
            brand: brand.map(str::to_string),
            engine_code: engine_code.map(str::to_string),
            unit_type,
            file_size: image.len(),
            estimated_power,
        }
    }

    fn engine_contains(&self, needle: &str) -> bool {
        self.engine_code
            .as_deref()
            .map_or(false, |code| code.contains(needle))
    }

    pub fn is_diesel(&self) -> bool {
        self.engine_contains("TDI")
    }
}

fn first_contained(haystack: &str, candidates: &[&'static str]) -> Option<&'static str> {
    candidates.iter().copied().find(|c| haystack.contains(c))
}

/// Tuning level found in an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrentStage {
    Stock,
    Tuned(StageId),
}

impl CurrentStage {
    /// Look for ASCII stage markers, highest stage first
    pub fn detect(image: &[u8]) -> Self {
        [StageId::Stage3, StageId::Stage2, StageId::Stage1]
            .into_iter()
            .find(|id| {
                let marker = format!("STAGE{}", id.number());
                find(image, marker.as_bytes(), 0).is_some()
            })
            .map_or(CurrentStage::Stock, CurrentStage::Tuned)
    }
}

impl fmt::Display for CurrentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentStage::Stock => f.write_str("stock"),
            CurrentStage::Tuned(id) => write!(f, "{}", id),
        }
    }
}

/// Feature that can be switched off in an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Removal {
    DtcCodes,
    Dpf,
    Egr,
    Adblue,
}

impl Removal {
    pub fn name(&self) -> &'static str {
        match self {
            Removal::DtcCodes => "DTC removal",
            Removal::Dpf => "DPF removal",
            Removal::Egr => "EGR removal",
            Removal::Adblue => "AdBlue removal",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Removal::DtcCodes => "Clears stored fault codes and the check engine light",
            Removal::Dpf => "Disables the diesel particulate filter",
            Removal::Egr => "Disables exhaust gas recirculation",
            Removal::Adblue => "Disables the AdBlue urea injection system",
        }
    }

    pub fn risk(&self) -> RiskLevel {
        match self {
            Removal::DtcCodes => RiskLevel::Low,
            Removal::Dpf | Removal::Egr => RiskLevel::Medium,
            Removal::Adblue => RiskLevel::High,
        }
    }
}

/// One selectable tuning option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TuningOption {
    Stage {
        stage: StageId,
        description: String,
        power_gain_percent: f64,
        torque_gain_percent: f64,
        risk: RiskLevel,
    },
    Removal {
        removal: Removal,
        description: String,
        risk: RiskLevel,
    },
}

impl TuningOption {
    pub fn name(&self) -> String {
        match self {
            TuningOption::Stage { stage, .. } => format!("Stage {}", stage.number()),
            TuningOption::Removal { removal, .. } => removal.name().to_string(),
        }
    }

    pub fn risk(&self) -> RiskLevel {
        match self {
            TuningOption::Stage { risk, .. } | TuningOption::Removal { risk, .. } => *risk,
        }
    }
}

/// Full analysis of one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub ecu_info: EcuInfo,
    pub current_stage: CurrentStage,
    pub options: Vec<TuningOption>,
    pub applicable_removals: Vec<Removal>,
    pub recommendations: Vec<String>,
}

/// Analyze an image without modifying it
pub fn analyze(filename: &str, image: &[u8], config: &EngineConfig) -> Analysis {
    let ecu_info = EcuInfo::detect(filename, image);
    let current_stage = CurrentStage::detect(image);

    let mut options: Vec<TuningOption> = config
        .stages
        .iter()
        .map(|profile| TuningOption::Stage {
            stage: profile.id,
            description: profile.description.clone(),
            power_gain_percent: profile.power_gain_percent(),
            torque_gain_percent: ((profile.torque_limit_multiplier - 1.0) * 100.0).round(),
            risk: profile.risk,
        })
        .collect();
    options.extend(
        [Removal::DtcCodes, Removal::Dpf, Removal::Egr, Removal::Adblue]
            .into_iter()
            .map(|removal| TuningOption::Removal {
                removal,
                description: removal.description().to_string(),
                risk: removal.risk(),
            }),
    );

    let mut applicable_removals = vec![Removal::DtcCodes];
    if ecu_info.is_diesel() {
        applicable_removals.extend([Removal::Dpf, Removal::Adblue]);
    }
    if ecu_info.engine_contains("TFSI") {
        applicable_removals.push(Removal::Egr);
    }

    let recommendations = recommendations(&ecu_info, current_stage);

    Analysis {
        ecu_info,
        current_stage,
        options,
        applicable_removals,
        recommendations,
    }
}

fn recommendations(info: &EcuInfo, stage: CurrentStage) -> Vec<String> {
    let mut out = Vec::new();
    match stage {
        CurrentStage::Stock => {
            out.push("Stage 1 gives a safe power increase on stock hardware");
            out.push("Check stored DTC codes before tuning");
        }
        CurrentStage::Tuned(StageId::Stage1) => {
            out.push("Stage 2 may require hardware modifications");
            out.push("Intercooler and exhaust upgrades are recommended");
        }
        CurrentStage::Tuned(_) => {}
    }
    if info.is_diesel() {
        out.push("DPF and EGR removal are available for this diesel engine");
    }
    out.push("Always keep a backup of the original file");
    out.push("Modifications may void the vehicle warranty");
    out.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("bmw_n55b30_ecu.bin", Some("BMW"), Some("N55B30"), UnitType::Ecu, 306)]
    #[case("VW_Golf_EA888_DSG.bin", Some("VW"), Some("EA888"), UnitType::Dsg, 200)]
    #[case("audi_a4_tdi_tcu.ori", Some("AUDI"), Some("TDI"), UnitType::Tcu, 0)]
    #[case("unknown.bin", None, None, UnitType::Ecu, 0)]
    fn test_detect_ecu(
        #[case] filename: &str,
        #[case] brand: Option<&str>,
        #[case] engine: Option<&str>,
        #[case] unit: UnitType,
        #[case] hp: u32,
    ) {
        let info = EcuInfo::detect(filename, &[0u8; 16]);
        assert_eq!(info.brand.as_deref(), brand);
        assert_eq!(info.engine_code.as_deref(), engine);
        assert_eq!(info.unit_type, unit);
        assert_eq!(info.estimated_power.hp, hp);
        assert_eq!(info.file_size, 16);
    }

    #[test]
    fn test_detect_stage() {
        assert_eq!(CurrentStage::detect(b"\x00\x01stock"), CurrentStage::Stock);
        assert_eq!(
            CurrentStage::detect(b"..STAGE1..STAGE2.."),
            CurrentStage::Tuned(StageId::Stage2)
        );
        assert_eq!(
            CurrentStage::detect(b"STAGE3"),
            CurrentStage::Tuned(StageId::Stage3)
        );
        // Size alone never implies a tune
        assert_eq!(CurrentStage::detect(&vec![0u8; 2 << 20]), CurrentStage::Stock);
    }

    #[test]
    fn test_analyze_diesel() {
        let analysis = analyze("AUDI_A6_TDI.bin", b"STAGE1", &EngineConfig::default());

        assert_eq!(analysis.current_stage, CurrentStage::Tuned(StageId::Stage1));
        assert_eq!(
            analysis.applicable_removals,
            vec![Removal::DtcCodes, Removal::Dpf, Removal::Adblue]
        );
        assert_eq!(analysis.options.len(), 7);
        assert_eq!(analysis.options[0].name(), "Stage 1");
        assert_eq!(analysis.options[6].risk(), RiskLevel::High);
        assert_eq!(
            analysis.recommendations,
            vec![
                "Stage 2 may require hardware modifications",
                "Intercooler and exhaust upgrades are recommended",
                "DPF and EGR removal are available for this diesel engine",
                "Always keep a backup of the original file",
                "Modifications may void the vehicle warranty",
            ]
        );
    }

    #[test]
    fn test_analyze_petrol_stock() {
        let analysis = analyze("vw_tfsi.bin", &[0xFF; 8], &EngineConfig::default());
        assert_eq!(analysis.current_stage, CurrentStage::Stock);
        assert_eq!(
            analysis.applicable_removals,
            vec![Removal::DtcCodes, Removal::Egr]
        );
        assert_eq!(analysis.ecu_info.estimated_power, StockPower { hp: 150, nm: 250 });
        assert_eq!(analysis.recommendations.len(), 4);
    }
}
