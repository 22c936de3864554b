//! Byte-level comparison of two images

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DiffError, DiffResult};

/// Maximum number of differing bytes listed in a [`DiffReport`]
pub const MAX_REPORTED_DIFFERENCES: usize = 100;

/// One differing byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteDiff {
    pub offset: usize,
    pub original_byte: u8,
    pub tuned_byte: u8,
}

/// Result of [`compare`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffReport {
    /// Paired bytes examined (the shorter length)
    pub total_bytes_compared: usize,
    pub original_size: usize,
    pub tuned_size: usize,
    /// True number of differing bytes, not capped
    pub differences_count: usize,
    /// `differences_count / original_size * 100`, two decimals
    pub difference_percentage: f64,
    /// First [`MAX_REPORTED_DIFFERENCES`] differences in offset order
    pub differences: Vec<ByteDiff>,
}

impl DiffReport {
    /// Whether the two images differ in length
    pub fn size_mismatch(&self) -> bool {
        self.original_size != self.tuned_size
    }

    /// Whether the listed differences are a prefix of the full set
    pub fn is_truncated(&self) -> bool {
        self.differences_count > self.differences.len()
    }
}

/// Compare `original` and `tuned` byte by byte over their common length
pub fn compare(original: &[u8], tuned: &[u8]) -> DiffResult<DiffReport> {
    if original.is_empty() {
        return Err(DiffError::EmptyImage);
    }

    let mut differences = Vec::new();
    let mut differences_count = 0;

    for (offset, (&a, &b)) in original.iter().zip(tuned).enumerate() {
        if a == b {
            continue;
        }
        differences_count += 1;
        if differences.len() < MAX_REPORTED_DIFFERENCES {
            differences.push(ByteDiff {
                offset,
                original_byte: a,
                tuned_byte: b,
            });
        }
    }

    let percentage = differences_count as f64 / original.len() as f64 * 100.0;
    debug!(differences_count, percentage, "Images compared");

    Ok(DiffReport {
        total_bytes_compared: original.len().min(tuned.len()),
        original_size: original.len(),
        tuned_size: tuned.len(),
        differences_count,
        difference_percentage: (percentage * 100.0).round() / 100.0,
        differences,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_identical_images() {
        let image = vec![0x42u8; 32];
        let report = compare(&image, &image).unwrap();
        assert_eq!(report.differences_count, 0);
        assert_eq!(report.difference_percentage, 0.0);
        assert!(report.differences.is_empty());
        assert!(!report.size_mismatch());
    }

    #[test]
    fn test_differences_recorded_in_order() {
        let a = [0u8, 1, 2, 3, 4, 5];
        let b = [0u8, 9, 2, 3, 8, 5];
        let report = compare(&a, &b).unwrap();
        assert_eq!(
            report.differences,
            vec![
                ByteDiff {
                    offset: 1,
                    original_byte: 1,
                    tuned_byte: 9
                },
                ByteDiff {
                    offset: 4,
                    original_byte: 4,
                    tuned_byte: 8
                },
            ]
        );
        assert_eq!(report.difference_percentage, 33.33);
    }

    #[test]
    fn test_list_is_capped_but_count_is_not() {
        let a = vec![0u8; 1000];
        let b = vec![1u8; 1000];
        let report = compare(&a, &b).unwrap();
        assert_eq!(report.differences_count, 1000);
        assert_eq!(report.differences.len(), MAX_REPORTED_DIFFERENCES);
        assert_eq!(report.differences[99].offset, 99);
        assert_eq!(report.difference_percentage, 100.0);
        assert!(report.is_truncated());
    }

    #[test]
    fn test_unequal_lengths() {
        let a = [1u8, 2, 3, 4];
        let b = [1u8, 0];
        let report = compare(&a, &b).unwrap();
        assert_eq!(report.total_bytes_compared, 2);
        assert_eq!(report.differences_count, 1);
        // Percentage is relative to the first image
        assert_eq!(report.difference_percentage, 25.0);
        assert!(report.size_mismatch());
    }

    #[test]
    fn test_empty_original() {
        assert_eq!(compare(&[], &[1, 2]), Err(DiffError::EmptyImage));
        // An empty tuned image is fine: nothing is paired
        let report = compare(&[1], &[]).unwrap();
        assert_eq!(report.total_bytes_compared, 0);
    }
}
