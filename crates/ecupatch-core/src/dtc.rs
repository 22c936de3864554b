//! DTC (Diagnostic Trouble Code) codec
//!
//! Converts textual codes such as `P0420` to the two-byte form stored in
//! firmware images:
//!
//! ```text
//!  15 14 | 13 12 | 11 ........ 0
//!  cat   | digit | three hex digits
//! ```
//!
//! `cat` is 00 for P, 01 for C, 10 for B and 11 for U, so `P0420` is stored
//! as `04 20` and `U0100` as `C1 00`.

use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::PatchError;

/// DTC category based on the first character of the code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DtcCategory {
    /// P codes - Powertrain (engine, transmission)
    Powertrain,
    /// C codes - Chassis (ABS, suspension)
    Chassis,
    /// B codes - Body (airbags, climate control)
    Body,
    /// U codes - Network (communication)
    Network,
}

impl DtcCategory {
    /// Get category from DTC high byte
    pub fn from_dtc_high_byte(high_byte: u8) -> Self {
        match (high_byte >> 6) & 0x03 {
            0 => DtcCategory::Powertrain,
            1 => DtcCategory::Chassis,
            2 => DtcCategory::Body,
            _ => DtcCategory::Network,
        }
    }

    /// Get category from prefix character (case-insensitive)
    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix.to_ascii_uppercase() {
            'P' => Some(DtcCategory::Powertrain),
            'C' => Some(DtcCategory::Chassis),
            'B' => Some(DtcCategory::Body),
            'U' => Some(DtcCategory::Network),
            _ => None,
        }
    }

    /// Get category prefix character
    pub fn prefix(&self) -> char {
        match self {
            DtcCategory::Powertrain => 'P',
            DtcCategory::Chassis => 'C',
            DtcCategory::Body => 'B',
            DtcCategory::Network => 'U',
        }
    }

    fn bits(&self) -> u16 {
        match self {
            DtcCategory::Powertrain => 0,
            DtcCategory::Chassis => 1,
            DtcCategory::Body => 2,
            DtcCategory::Network => 3,
        }
    }
}

/// A parsed two-byte DTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DtcCode(u16);

impl DtcCode {
    pub fn category(&self) -> DtcCategory {
        DtcCategory::from_dtc_high_byte(self.0.to_be_bytes()[0])
    }

    /// Byte pattern as stored in the image (big-endian)
    pub fn pattern(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl FromStr for DtcCode {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PatchError::InvalidDtcCode(s.to_string());
        let code = s.trim();
        let mut chars = code.chars();

        let category = chars
            .next()
            .and_then(DtcCategory::from_prefix)
            .ok_or_else(invalid)?;
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(4))
            .ok_or_else(invalid)?;
        let rest = chars.as_str();
        if rest.len() != 3 || !rest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let low = u16::from_str_radix(rest, 16).map_err(|_| invalid())?;

        Ok(Self((category.bits() << 14) | ((digit as u16) << 12) | low))
    }
}

impl std::fmt::Display for DtcCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{:03X}",
            self.category().prefix(),
            (self.0 >> 12) & 0x03,
            self.0 & 0x0FFF
        )
    }
}

impl Serialize for DtcCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
