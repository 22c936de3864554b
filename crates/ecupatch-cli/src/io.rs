//! File boundary: reading source images, backups and tuned output paths

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Name of the backup directory created next to the source image
const BACKUP_DIR_NAME: &str = "backups";

/// Read a whole image into memory
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read image: {}", path.display()))
}

/// Write an image, creating parent directories as needed
pub fn write_image(path: &Path, image: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(path, image)
        .with_context(|| format!("Failed to write image: {}", path.display()))
}

fn file_stem(path: &Path) -> &str {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image")
}

/// Copy the source image into the backup directory
///
/// The backup is named `<stem>_BACKUP_<YYYYmmdd_HHMMSS>.bin`. Without an
/// explicit directory, `backups/` next to the source is used.
pub fn create_backup(source: &Path, backup_dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match backup_dir {
        Some(dir) => dir.to_path_buf(),
        None => source
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(BACKUP_DIR_NAME),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create backup directory: {}", dir.display()))?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let backup = dir.join(format!("{}_BACKUP_{}.bin", file_stem(source), timestamp));
    std::fs::copy(source, &backup)
        .with_context(|| format!("Failed to create backup: {}", backup.display()))?;

    tracing::info!(source = %source.display(), backup = %backup.display(), "Backup created");
    Ok(backup)
}

/// Output path for a tuned image: `<stem>_TUNED_<label>.bin` next to the source
pub fn tuned_path(source: &Path, label: &str) -> PathBuf {
    let name = format!("{}_TUNED_{}.bin", file_stem(source), label.to_uppercase());
    source.with_file_name(name)
}

/// SHA-256 digest as lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
