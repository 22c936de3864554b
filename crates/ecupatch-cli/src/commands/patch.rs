//! Patch command - apply a tune to an image file

use anyhow::{Context, Result};
use clap::Args;
use ecupatch_core::{OperationRequest, PatchEngine, PatchReport, StageId};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::io;
use crate::output::{KindCountRow, ModificationRow, OutputContext, OutputFormat, StepRow};

#[derive(Debug, Clone, Default, Args)]
pub struct PatchArgs {
    /// Source image
    pub file: PathBuf,

    /// Stage profile (stage1, stage2, stage3)
    #[arg(short, long)]
    pub stage: Option<StageId>,

    /// Scale the boost map
    #[arg(long)]
    pub boost: bool,

    /// Scale the fuel map
    #[arg(long)]
    pub fuel: bool,

    /// Scale the ignition timing map
    #[arg(long)]
    pub timing: bool,

    /// Raise the torque limiter
    #[arg(long)]
    pub torque_limiter: bool,

    /// New RPM limit
    #[arg(long, value_name = "RPM")]
    pub rpm_limit: Option<u16>,

    /// Remove the speed limiter
    #[arg(long)]
    pub speed_limiter: bool,

    /// Remove the DPF
    #[arg(long)]
    pub dpf: bool,

    /// Remove the EGR
    #[arg(long)]
    pub egr: bool,

    /// Remove AdBlue
    #[arg(long)]
    pub adblue: bool,

    /// DTC code(s) to disable, e.g. P0420
    #[arg(long, value_name = "CODE", value_delimiter = ',')]
    pub dtc: Vec<String>,

    /// JSON request file; flags are applied on top of it
    #[arg(long, value_name = "JSON_FILE")]
    pub request: Option<PathBuf>,

    /// Output path (default: <stem>_TUNED_<stage>.bin next to the source)
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Do not back up the source image
    #[arg(long)]
    pub no_backup: bool,

    /// Print the resolved steps without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// List every modification
    #[arg(long)]
    pub details: bool,
}

impl PatchArgs {
    /// Build the request from the optional JSON file and the flags
    ///
    /// A stage given without any of `--boost`, `--fuel`, `--timing` or
    /// `--torque-limiter` scales all four maps.
    pub fn build_request(&self) -> Result<OperationRequest> {
        let mut request = match &self.request {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read request file: {}", path.display()))?;
                OperationRequest::from_json(&json)
                    .with_context(|| format!("Invalid request file: {}", path.display()))?
            }
            None => OperationRequest::new(),
        };

        if let Some(stage) = self.stage {
            request.stage = Some(stage);
            let explicit = self.boost || self.fuel || self.timing || self.torque_limiter;
            if !explicit && !request.needs_stage() {
                request.apply_boost = true;
                request.apply_fuel = true;
                request.apply_timing = true;
                request.remove_torque_limiter = true;
            }
        }

        request.apply_boost |= self.boost;
        request.apply_fuel |= self.fuel;
        request.apply_timing |= self.timing;
        request.remove_torque_limiter |= self.torque_limiter;
        if let Some(rpm) = self.rpm_limit {
            request.new_rpm_limit = Some(rpm);
        }
        request.remove_speed_limiter |= self.speed_limiter;
        request.remove_dpf |= self.dpf;
        request.remove_egr |= self.egr;
        request.remove_adblue |= self.adblue;
        request.dtc_codes_to_remove.extend(self.dtc.iter().cloned());

        Ok(request)
    }

    fn output_path(&self, request: &OperationRequest) -> PathBuf {
        self.out.clone().unwrap_or_else(|| {
            let label = request.stage.map_or("custom", |s| s.as_str());
            io::tuned_path(&self.file, label)
        })
    }
}

/// Everything the patch command produced
#[derive(Debug, Serialize)]
struct PatchSummary<'a> {
    source: &'a Path,
    output: &'a Path,
    backup: Option<&'a Path>,
    original_sha256: String,
    tuned_sha256: String,
    report: &'a PatchReport,
}

/// Patch an image file
pub fn patch(
    engine: &PatchEngine,
    args: &PatchArgs,
    backup_dir: Option<&Path>,
    ctx: &OutputContext,
) -> Result<()> {
    let request = args.build_request()?;

    if args.dry_run {
        let plan = engine.plan(&request)?;
        if ctx.format == OutputFormat::Json {
            ctx.print_json(&plan);
        } else {
            ctx.info(&format!("Plan: {}", plan.description));
            let rows: Vec<StepRow> = plan
                .steps
                .iter()
                .enumerate()
                .map(|(i, step)| StepRow {
                    index: i + 1,
                    step: step.label(),
                })
                .collect();
            ctx.print(&rows);
        }
        return Ok(());
    }

    let original = io::read_image(&args.file)?;
    let original_sha256 = io::sha256_hex(&original);

    let backup = if args.no_backup {
        None
    } else {
        Some(io::create_backup(&args.file, backup_dir)?)
    };

    let outcome = engine
        .patch(original, &request)
        .with_context(|| format!("Failed to patch {}", args.file.display()))?;

    let output = args.output_path(&request);
    io::write_image(&output, &outcome.image)?;

    let summary = PatchSummary {
        source: &args.file,
        output: &output,
        backup: backup.as_deref(),
        original_sha256,
        tuned_sha256: io::sha256_hex(&outcome.image),
        report: &outcome.report,
    };
    print_summary(&summary, args.details, ctx);
    Ok(())
}

fn print_summary(summary: &PatchSummary<'_>, details: bool, ctx: &OutputContext) {
    let report = summary.report;
    match ctx.format {
        OutputFormat::Json => ctx.print_json(summary),
        OutputFormat::Csv => {
            let rows: Vec<ModificationRow> =
                report.modifications.iter().map(ModificationRow::from).collect();
            ctx.print(&rows);
        }
        OutputFormat::Table => {
            let mut pairs = vec![
                ("Source", summary.source.display().to_string()),
                ("Output", summary.output.display().to_string()),
            ];
            if let Some(backup) = summary.backup {
                pairs.push(("Backup", backup.display().to_string()));
            }
            pairs.extend([
                (
                    "Stage",
                    report
                        .stage
                        .map_or_else(|| "-".to_string(), |s| s.to_string()),
                ),
                ("Description", report.description.clone()),
                ("Size", report.modified_size.to_string()),
                ("Modifications", report.modifications.len().to_string()),
                ("Original SHA-256", summary.original_sha256.clone()),
                ("Tuned SHA-256", summary.tuned_sha256.clone()),
            ]);
            if let Some(trailer) = report.trailer {
                pairs.push((
                    "Trailer",
                    format!("CRC32 {:08X}, sum {:04X}", trailer.crc32, trailer.byte_sum),
                ));
            }
            if !ctx.quiet {
                ctx.print_kv(&pairs);
            }

            ctx.heading("Modifications by kind");
            let counts: Vec<KindCountRow> = report
                .summary()
                .into_iter()
                .map(|(kind, count)| KindCountRow {
                    kind: kind.to_string(),
                    count,
                })
                .collect();
            if !ctx.quiet {
                ctx.print(&counts);
            }

            if details {
                ctx.heading("Modifications");
                let rows: Vec<ModificationRow> =
                    report.modifications.iter().map(ModificationRow::from).collect();
                ctx.print(&rows);
            }

            for note in &report.notes {
                ctx.warn(&format!("Warning: {}", note));
            }
            ctx.success("Patch written successfully");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args() -> PatchArgs {
        PatchArgs {
            file: PathBuf::from("/data/ecu.bin"),
            ..PatchArgs::default()
        }
    }

    #[test]
    fn test_stage_alone_scales_all_maps() {
        let request = PatchArgs {
            stage: Some(StageId::Stage2),
            dpf: true,
            dtc: vec!["P0420".to_string()],
            ..args()
        }
        .build_request()
        .unwrap();

        assert_eq!(
            request,
            OperationRequest::full_stage(StageId::Stage2)
                .with_dpf_removed()
                .with_dtc("P0420")
        );
    }

    #[test]
    fn test_explicit_maps_only() {
        let request = PatchArgs {
            stage: Some(StageId::Stage1),
            timing: true,
            ..args()
        }
        .build_request()
        .unwrap();

        assert_eq!(
            request,
            OperationRequest::new()
                .with_stage(StageId::Stage1)
                .with_timing()
        );
    }

    #[test]
    fn test_request_file_with_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("request.json");
        std::fs::write(
            &path,
            r#"{"remove_egr": true, "new_rpm_limit": 6800, "dtc_codes_to_remove": ["P0401"]}"#,
        )
        .unwrap();

        let request = PatchArgs {
            request: Some(path),
            stage: Some(StageId::Stage3),
            dtc: vec!["P0402".to_string()],
            ..args()
        }
        .build_request()
        .unwrap();

        assert_eq!(
            request,
            OperationRequest::full_stage(StageId::Stage3)
                .with_egr_removed()
                .with_rpm_limit(6800)
                .with_dtc("P0401")
                .with_dtc("P0402")
        );
    }

    #[test]
    fn test_output_path() {
        let a = args();
        let request = OperationRequest::full_stage(StageId::Stage1);
        assert_eq!(
            a.output_path(&request),
            PathBuf::from("/data/ecu_TUNED_STAGE1.bin")
        );
        assert_eq!(
            a.output_path(&OperationRequest::new().with_dpf_removed()),
            PathBuf::from("/data/ecu_TUNED_CUSTOM.bin")
        );

        let explicit = PatchArgs {
            out: Some(PathBuf::from("/tmp/out.bin")),
            ..args()
        };
        assert_eq!(explicit.output_path(&request), PathBuf::from("/tmp/out.bin"));
    }

    #[test]
    fn test_patch_writes_output_and_backup() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("golf.bin");
        std::fs::write(&source, vec![0x10u8; 0x71004]).unwrap();

        let args = PatchArgs {
            file: source.clone(),
            stage: Some(StageId::Stage1),
            dpf: true,
            ..PatchArgs::default()
        };
        let ctx = OutputContext::new(OutputFormat::Table, true, true);
        patch(&PatchEngine::default(), &args, None, &ctx).unwrap();

        let tuned = std::fs::read(dir.path().join("golf_TUNED_STAGE1.bin")).unwrap();
        assert_eq!(tuned.len(), 0x71004);
        assert!(tuned[0x60000..0x60100].iter().all(|&b| b == 0));
        assert!(ecupatch_core::verify_trailer(&tuned).unwrap().is_valid());

        let backups: Vec<_> = std::fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .collect();
        assert_eq!(backups.len(), 1);
        // Source untouched
        assert_eq!(std::fs::read(&source).unwrap(), vec![0x10u8; 0x71004]);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let args = PatchArgs {
            file: dir.path().join("missing.bin"),
            egr: true,
            dry_run: true,
            ..PatchArgs::default()
        };
        let ctx = OutputContext::new(OutputFormat::Json, true, true);
        patch(&PatchEngine::default(), &args, None, &ctx).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
