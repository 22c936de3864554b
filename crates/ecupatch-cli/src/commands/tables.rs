//! Regions and stages commands - list the configured tables

use anyhow::Result;
use ecupatch_core::EngineConfig;

use crate::output::{OutputContext, OutputFormat, RegionRow, StageRow};

/// List the region table
pub fn regions(config: &EngineConfig, ctx: &OutputContext) -> Result<()> {
    if ctx.format == OutputFormat::Json {
        let regions: Vec<_> = config.regions.iter().collect();
        ctx.print_json(&regions);
        return Ok(());
    }
    let rows: Vec<RegionRow> = config.regions.iter().map(RegionRow::from).collect();
    ctx.print(&rows);
    Ok(())
}

/// List the stage table
pub fn stages(config: &EngineConfig, ctx: &OutputContext) -> Result<()> {
    if ctx.format == OutputFormat::Json {
        let stages: Vec<_> = config.stages.iter().collect();
        ctx.print_json(&stages);
        return Ok(());
    }
    let rows: Vec<StageRow> = config.stages.iter().map(StageRow::from).collect();
    ctx.print(&rows);
    Ok(())
}
