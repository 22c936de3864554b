//! Analyze command - identify an image and list tuning options

use anyhow::Result;
use ecupatch_core::{EngineConfig, TuningOption};
use std::path::Path;

use crate::io;
use crate::output::{OptionRow, OutputContext, OutputFormat};

fn option_row(option: &TuningOption) -> OptionRow {
    let (gain, description) = match option {
        TuningOption::Stage {
            power_gain_percent,
            torque_gain_percent,
            description,
            ..
        } => (
            format!("+{}% hp, +{}% Nm", power_gain_percent, torque_gain_percent),
            description.clone(),
        ),
        TuningOption::Removal { description, .. } => ("-".to_string(), description.clone()),
    };
    OptionRow {
        name: option.name(),
        gain,
        risk: option.risk().to_string(),
        description,
    }
}

/// Analyze an image file
pub fn analyze(file: &Path, config: &EngineConfig, ctx: &OutputContext) -> Result<()> {
    let image = io::read_image(file)?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let analysis = ecupatch_core::analyze(&filename, &image, config);

    if ctx.format == OutputFormat::Json {
        ctx.print_json(&analysis);
        return Ok(());
    }

    let info = &analysis.ecu_info;
    let power = if info.estimated_power.hp > 0 {
        format!(
            "{} hp / {} Nm",
            info.estimated_power.hp, info.estimated_power.nm
        )
    } else {
        "unknown".to_string()
    };
    let removals: Vec<&str> = analysis
        .applicable_removals
        .iter()
        .map(|r| r.name())
        .collect();

    ctx.print_kv(&[
        ("File", filename.clone()),
        ("Brand", info.brand.clone().unwrap_or_else(|| "unknown".to_string())),
        (
            "Engine",
            info.engine_code
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        ),
        ("Unit", info.unit_type.to_string()),
        ("Size", format!("{} bytes", info.file_size)),
        ("Stock power", power),
        ("Current stage", analysis.current_stage.to_string()),
        ("Applicable removals", removals.join(", ")),
    ]);

    ctx.heading("Tuning options");
    let rows: Vec<OptionRow> = analysis.options.iter().map(option_row).collect();
    ctx.print(&rows);

    ctx.heading("Recommendations");
    for line in &analysis.recommendations {
        ctx.info(&format!("  - {}", line));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecupatch_core::{RiskLevel, StageId};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_option_row() {
        let row = option_row(&TuningOption::Stage {
            stage: StageId::Stage2,
            description: "Aggressive".to_string(),
            power_gain_percent: 30.0,
            torque_gain_percent: 35.0,
            risk: RiskLevel::Medium,
        });
        assert_eq!(row.name, "Stage 2");
        assert_eq!(row.gain, "+30% hp, +35% Nm");
        assert_eq!(row.risk, "medium");
    }
}
