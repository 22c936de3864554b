//! Pattern scanner
//!
//! Linear, non-overlapping search-and-replace of literal byte sequences over
//! a whole image.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ConfigError, ConfigResult};

/// A literal pattern together with its same-length replacement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    pattern: Vec<u8>,
    replacement: Vec<u8>,
}

/// One replaced occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    /// Offset of the first matched byte
    pub offset: usize,
    /// Bytes that were overwritten
    pub original: Vec<u8>,
}

impl Substitution {
    /// Create a substitution; the pattern must be non-empty and the
    /// replacement exactly as long
    pub(crate) fn new(pattern: Vec<u8>, replacement: Vec<u8>) -> ConfigResult<Self> {
        if pattern.is_empty() {
            return Err(ConfigError::InvalidPattern("empty pattern".to_string()));
        }
        if pattern.len() != replacement.len() {
            return Err(ConfigError::InvalidPattern(format!(
                "replacement is {} bytes, pattern is {}",
                replacement.len(),
                pattern.len()
            )));
        }
        Ok(Self {
            pattern,
            replacement,
        })
    }

    /// Replace every occurrence of `pattern` with zeros
    pub fn zero_fill(pattern: Vec<u8>) -> ConfigResult<Self> {
        let replacement = vec![0u8; pattern.len()];
        Self::new(pattern, replacement)
    }

    /// Zero-fill substitution for a built-in, non-empty pattern
    pub(crate) fn from_static(pattern: &[u8]) -> Self {
        debug_assert!(!pattern.is_empty());
        Self {
            pattern: pattern.to_vec(),
            replacement: vec![0u8; pattern.len()],
        }
    }

    /// Parse a hex pattern such as `"12 34 56 78"` into a zero-fill substitution
    pub fn zero_fill_hex(s: &str) -> ConfigResult<Self> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let pattern = hex::decode(&compact)
            .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", s, e)))?;
        Self::zero_fill(pattern)
    }

    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    pub fn replacement(&self) -> &[u8] {
        &self.replacement
    }

    /// Scan left to right and replace every non-overlapping match in place
    ///
    /// After a match the cursor moves past it, so replaced bytes are never
    /// re-scanned.
    pub fn apply(&self, image: &mut [u8]) -> Vec<Hit> {
        let mut hits = Vec::new();
        let mut cursor = 0;
        while let Some(offset) = find(image, &self.pattern, cursor) {
            let end = offset + self.pattern.len();
            hits.push(Hit {
                offset,
                original: image[offset..end].to_vec(),
            });
            image[offset..end].copy_from_slice(&self.replacement);
            cursor = end;
        }
        hits
    }
}

/// First occurrence of `needle` in `haystack` at or after `from`
pub fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| from + pos)
}

impl Serialize for Substitution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(&self.pattern))
    }
}

impl<'de> Deserialize<'de> for Substitution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::zero_fill_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_find() {
        let data = [1, 2, 3, 1, 2, 3];
        assert_eq!(find(&data, &[1, 2], 0), Some(0));
        assert_eq!(find(&data, &[1, 2], 1), Some(3));
        assert_eq!(find(&data, &[1, 2], 4), None);
        assert_eq!(find(&data, &[3, 1, 2, 3, 4], 0), None);
        assert_eq!(find(&data, &[], 0), None);
        assert_eq!(find(&data, &[1], 6), None);
    }

    #[test]
    fn test_apply_zero_fill() {
        let sub = Substitution::zero_fill(vec![0x04, 0x20]).unwrap();
        let mut image = vec![0x10, 0x04, 0x20, 0x10, 0x04, 0x20];
        let hits = sub.apply(&mut image);

        assert_eq!(
            hits,
            vec![
                Hit {
                    offset: 1,
                    original: vec![0x04, 0x20]
                },
                Hit {
                    offset: 4,
                    original: vec![0x04, 0x20]
                },
            ]
        );
        assert_eq!(image, vec![0x10, 0x00, 0x00, 0x10, 0x00, 0x00]);
    }

    #[test]
    fn test_matches_do_not_overlap() {
        let sub = Substitution::new(vec![0xAA, 0xAA], vec![0xBB, 0xBB]).unwrap();
        let mut image = vec![0xAA, 0xAA, 0xAA];
        let hits = sub.apply(&mut image);
        assert_eq!(hits.len(), 1);
        assert_eq!(image, vec![0xBB, 0xBB, 0xAA]);
    }

    #[test]
    fn test_replacement_is_not_rescanned() {
        // Replacement recreates the pattern one byte later; the cursor must skip it
        let sub = Substitution::new(vec![0x01, 0x02], vec![0x00, 0x01]).unwrap();
        let mut image = vec![0x01, 0x02, 0x02];
        let hits = sub.apply(&mut image);
        assert_eq!(hits.len(), 1);
        assert_eq!(image, vec![0x00, 0x01, 0x02]);
    }

    #[test]
    fn test_no_match_is_not_an_error() {
        let sub = Substitution::zero_fill_hex("11 22 33 44").unwrap();
        let mut image = vec![0x11, 0x22, 0x33];
        assert!(sub.apply(&mut image).is_empty());
        assert_eq!(image, vec![0x11, 0x22, 0x33]);
    }

    #[test]
    fn test_invalid_substitutions() {
        assert!(Substitution::zero_fill(vec![]).is_err());
        assert!(Substitution::new(vec![1, 2], vec![0]).is_err());
        assert!(Substitution::zero_fill_hex("ABC").is_err());
        assert!(Substitution::zero_fill_hex("ZZ").is_err());
    }
}
