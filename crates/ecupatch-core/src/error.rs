//! Error types for the patch engine

use thiserror::Error;

/// Errors that abort a whole patch call
///
/// Recoverable conditions (a region past the end of the image, a pattern
/// with no hits) are not errors; they show up in the
/// [`PatchReport`](crate::report::PatchReport) instead.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Stage not present in the stage table
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    /// Region not present in the region table
    #[error("unknown region: {0}")]
    UnknownRegion(String),

    /// DTC code that does not follow the `P0420` shape
    #[error("invalid DTC code: {0}")]
    InvalidDtcCode(String),

    /// Request combination that cannot be executed
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Image cannot hold the checksum trailer
    #[error("image too small: {len} bytes (minimum {min})")]
    ImageTooSmall { len: usize, min: usize },
}

impl PatchError {
    /// HTTP-equivalent status the surrounding service reports for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PatchError::UnknownStage(_) => 404,
            PatchError::UnknownRegion(_) => 500,
            PatchError::InvalidDtcCode(_) => 400,
            PatchError::InvalidRequest(_) => 400,
            PatchError::ImageTooSmall { .. } => 422,
        }
    }
}

/// Result type for patch operations
pub type PatchResult<T> = Result<T, PatchError>;

/// Errors from image comparison
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    /// The reference image has no bytes to compare against
    #[error("cannot compare an empty image")]
    EmptyImage,
}

impl DiffError {
    /// HTTP-equivalent status the surrounding service reports for this error
    pub fn status_code(&self) -> u16 {
        match self {
            DiffError::EmptyImage => 400,
        }
    }
}

/// Result type for diff operations
pub type DiffResult<T> = Result<T, DiffError>;

/// Errors while building an [`EngineConfig`](crate::config::EngineConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing error
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Offset string that is neither decimal nor `0x` hex
    #[error("invalid offset: {0}")]
    InvalidOffset(String),

    /// Region declared with zero length
    #[error("region {0} has zero length")]
    EmptyRegion(String),

    /// Region declared twice
    #[error("duplicate region: {0}")]
    DuplicateRegion(String),

    /// Multiplier that is not a finite positive number
    #[error("invalid {field} multiplier for {stage}: {value}")]
    InvalidMultiplier {
        stage: String,
        field: &'static str,
        value: f64,
    },

    /// Marker pattern that cannot be used for scanning
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Parse a byte offset
///
/// Accepts formats: "131072", "0x20000", "0X20000"
pub fn parse_offset(s: &str) -> ConfigResult<usize> {
    let trimmed = s.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex_digits) => usize::from_str_radix(hex_digits, 16),
        None => trimmed.parse::<usize>(),
    };
    parsed.map_err(|_| ConfigError::InvalidOffset(s.to_string()))
}

/// Format a byte offset as hex (uppercase, `0x` prefix)
pub fn format_offset(offset: usize) -> String {
    format!("0x{:05X}", offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("0x20000").unwrap(), 0x20000);
        assert_eq!(parse_offset("0X20000").unwrap(), 0x20000);
        assert_eq!(parse_offset("131072").unwrap(), 0x20000);
        assert_eq!(parse_offset("  0x51000 ").unwrap(), 0x51000);
        assert!(parse_offset("0x").is_err());
        assert!(parse_offset("boost").is_err());
        assert!(parse_offset("-4").is_err());
    }

    #[test]
    fn test_format_offset() {
        assert_eq!(format_offset(0x20000), "0x20000");
        assert_eq!(format_offset(0x4), "0x00004");
        assert_eq!(format_offset(0x123456), "0x123456");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(PatchError::UnknownStage("stage4".into()).status_code(), 404);
        assert_eq!(PatchError::InvalidDtcCode("X1".into()).status_code(), 400);
        assert_eq!(DiffError::EmptyImage.status_code(), 400);
    }
}
