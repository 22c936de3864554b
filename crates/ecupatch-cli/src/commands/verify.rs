//! Verify command - trailer checksum status

use anyhow::{bail, Result};
use std::path::Path;

use crate::io;
use crate::output::{OutputContext, OutputFormat};

fn yes_no(ok: bool) -> String {
    if ok { "OK" } else { "MISMATCH" }.to_string()
}

/// Check the trailer checksums of an image; fails when they do not match
pub fn verify(file: &Path, ctx: &OutputContext) -> Result<()> {
    let image = io::read_image(file)?;
    let status = ecupatch_core::verify_trailer(&image)?;

    if ctx.format == OutputFormat::Json {
        ctx.print_json(&status);
    } else {
        ctx.print_kv(&[
            ("File", file.display().to_string()),
            ("Stored trailer", hex::encode_upper(status.stored)),
            ("Computed CRC32", format!("{:08X}", status.computed.crc32)),
            ("Computed sum", format!("{:04X}", status.computed.byte_sum)),
            ("CRC32 (high half)", yes_no(status.crc_valid)),
            ("Byte sum", yes_no(status.sum_valid)),
        ]);
    }

    if !status.is_valid() {
        bail!("Checksum trailer mismatch in {}", file.display());
    }
    ctx.success("Checksums valid");
    Ok(())
}
