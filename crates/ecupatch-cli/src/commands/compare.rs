//! Compare command - byte-level diff of two images

use anyhow::Result;
use std::path::Path;

use crate::io;
use crate::output::{DiffRow, OutputContext, OutputFormat};

/// Compare an original image with a tuned one
pub fn compare(original: &Path, tuned: &Path, ctx: &OutputContext) -> Result<()> {
    let a = io::read_image(original)?;
    let b = io::read_image(tuned)?;
    let report = ecupatch_core::compare(&a, &b)?;

    if ctx.format == OutputFormat::Json {
        ctx.print_json(&report);
        return Ok(());
    }

    if report.size_mismatch() {
        ctx.warn(&format!(
            "Warning: sizes differ ({} vs {} bytes), compared the first {}",
            report.original_size, report.tuned_size, report.total_bytes_compared
        ));
    }

    ctx.print_kv(&[
        ("Bytes compared", report.total_bytes_compared.to_string()),
        ("Differences", report.differences_count.to_string()),
        ("Changed", format!("{:.2}%", report.difference_percentage)),
    ]);

    if report.differences.is_empty() {
        ctx.success("Images are identical");
        return Ok(());
    }

    ctx.heading("Differences");
    let rows: Vec<DiffRow> = report.differences.iter().map(DiffRow::from).collect();
    ctx.print(&rows);
    if report.is_truncated() {
        ctx.info(&format!(
            "... showing {} of {} differences",
            report.differences.len(),
            report.differences_count
        ));
    }
    Ok(())
}
