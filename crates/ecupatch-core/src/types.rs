//! Fixed-width field encodings
//!
//! Calibration maps are arrays of fixed-width integers. A [`FieldEncoding`]
//! says how wide each field is, whether it is signed and which byte order
//! it is stored in.

use serde::{Deserialize, Serialize};

/// Primitive integer type of a map field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Unsigned 8-bit integer (1 byte)
    Uint8,
    /// Unsigned 16-bit integer (2 bytes)
    Uint16,
    /// Signed 8-bit integer (1 byte)
    Int8,
    /// Signed 16-bit integer (2 bytes)
    Int16,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DataType::Uint8 => "uint8",
            DataType::Uint16 => "uint16",
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
        };
        f.write_str(s)
    }
}

impl DataType {
    /// Byte size of one field
    pub fn byte_size(&self) -> usize {
        match self {
            DataType::Uint8 | DataType::Int8 => 1,
            DataType::Uint16 | DataType::Int16 => 2,
        }
    }

    /// Inclusive value range `(min, max)`
    pub fn range(&self) -> (i64, i64) {
        match self {
            DataType::Uint8 => (u8::MIN as i64, u8::MAX as i64),
            DataType::Uint16 => (u16::MIN as i64, u16::MAX as i64),
            DataType::Int8 => (i8::MIN as i64, i8::MAX as i64),
            DataType::Int16 => (i16::MIN as i64, i16::MAX as i64),
        }
    }
}

/// Byte order for multi-byte fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Big-endian (most significant byte first)
    #[default]
    Big,
    /// Little-endian (least significant byte first)
    Little,
}

/// How a single map field is laid out in the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldEncoding {
    pub data_type: DataType,
    #[serde(default)]
    pub byte_order: ByteOrder,
}

impl FieldEncoding {
    /// Big-endian unsigned 16-bit (boost, fuel and torque maps)
    pub const U16_BE: Self = Self::new(DataType::Uint16, ByteOrder::Big);

    /// Signed 8-bit (timing maps)
    pub const I8: Self = Self::new(DataType::Int8, ByteOrder::Big);

    pub const fn new(data_type: DataType, byte_order: ByteOrder) -> Self {
        Self {
            data_type,
            byte_order,
        }
    }

    /// Field width in bytes
    pub fn width(&self) -> usize {
        self.data_type.byte_size()
    }

    /// Saturate `value` into the encoding's range
    pub fn clamp(&self, value: i64) -> i64 {
        let (min, max) = self.data_type.range();
        value.clamp(min, max)
    }

    /// Read one field
    ///
    /// `bytes` must be exactly [`width`](Self::width) bytes long.
    pub fn read(&self, bytes: &[u8]) -> i64 {
        debug_assert_eq!(bytes.len(), self.width());
        match self.data_type {
            DataType::Uint8 => bytes[0] as i64,
            DataType::Int8 => bytes[0] as i8 as i64,
            DataType::Uint16 => {
                let raw = [bytes[0], bytes[1]];
                match self.byte_order {
                    ByteOrder::Big => u16::from_be_bytes(raw) as i64,
                    ByteOrder::Little => u16::from_le_bytes(raw) as i64,
                }
            }
            DataType::Int16 => {
                let raw = [bytes[0], bytes[1]];
                match self.byte_order {
                    ByteOrder::Big => i16::from_be_bytes(raw) as i64,
                    ByteOrder::Little => i16::from_le_bytes(raw) as i64,
                }
            }
        }
    }

    /// Write one field, saturating `value` into range first
    ///
    /// `out` must be exactly [`width`](Self::width) bytes long.
    pub fn write(&self, value: i64, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.width());
        let value = self.clamp(value);
        match self.data_type {
            DataType::Uint8 => out[0] = value as u8,
            DataType::Int8 => out[0] = (value as i8) as u8,
            DataType::Uint16 => {
                let raw = match self.byte_order {
                    ByteOrder::Big => (value as u16).to_be_bytes(),
                    ByteOrder::Little => (value as u16).to_le_bytes(),
                };
                out.copy_from_slice(&raw);
            }
            DataType::Int16 => {
                let raw = match self.byte_order {
                    ByteOrder::Big => (value as i16).to_be_bytes(),
                    ByteOrder::Little => (value as i16).to_le_bytes(),
                };
                out.copy_from_slice(&raw);
            }
        }
    }
}

impl std::fmt::Display for FieldEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.width() == 1 {
            return write!(f, "{}", self.data_type);
        }
        let order = match self.byte_order {
            ByteOrder::Big => "be",
            ByteOrder::Little => "le",
        };
        write!(f, "{}_{}", self.data_type, order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_sizes() {
        assert_eq!(DataType::Uint8.byte_size(), 1);
        assert_eq!(DataType::Uint16.byte_size(), 2);
        assert_eq!(DataType::Int8.byte_size(), 1);
        assert_eq!(DataType::Int16.byte_size(), 2);
    }

    #[test]
    fn test_read_u16_big_endian() {
        assert_eq!(FieldEncoding::U16_BE.read(&[0x10, 0x00]), 4096);
        assert_eq!(FieldEncoding::U16_BE.read(&[0xFF, 0xFF]), 65535);
        let le = FieldEncoding::new(DataType::Uint16, ByteOrder::Little);
        assert_eq!(le.read(&[0x10, 0x00]), 16);
    }

    #[test]
    fn test_read_i8_sign_extends() {
        assert_eq!(FieldEncoding::I8.read(&[0x7F]), 127);
        assert_eq!(FieldEncoding::I8.read(&[0x80]), -128);
        assert_eq!(FieldEncoding::I8.read(&[0xF6]), -10);
    }

    #[test]
    fn test_write_saturates() {
        let mut out = [0u8; 2];
        FieldEncoding::U16_BE.write(70_000, &mut out);
        assert_eq!(out, [0xFF, 0xFF]);
        FieldEncoding::U16_BE.write(-5, &mut out);
        assert_eq!(out, [0x00, 0x00]);

        let mut byte = [0u8; 1];
        FieldEncoding::I8.write(200, &mut byte);
        assert_eq!(byte, [0x7F]);
        FieldEncoding::I8.write(-300, &mut byte);
        assert_eq!(byte, [0x80]);
    }

    #[test]
    fn test_write_i16_little_endian() {
        let enc = FieldEncoding::new(DataType::Int16, ByteOrder::Little);
        let mut out = [0u8; 2];
        enc.write(-2, &mut out);
        assert_eq!(out, [0xFE, 0xFF]);
        assert_eq!(enc.read(&out), -2);
    }

    #[test]
    fn test_display() {
        assert_eq!(FieldEncoding::U16_BE.to_string(), "uint16_be");
        assert_eq!(FieldEncoding::I8.to_string(), "int8");
    }
}
