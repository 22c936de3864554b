//! Trailer checksums
//!
//! Two values are stored at the end of the image, computed in this order:
//!
//! 1. CRC-32 (ISO-HDLC, the zlib polynomial) over `image[..len-4]`, written
//!    big-endian into `image[len-4..]`.
//! 2. 16-bit byte sum over `image[..len-2]` (which includes the first half of
//!    the CRC just written), written big-endian into `image[len-2..]`.
//!
//! The second write overwrites the low half of the CRC, so only its high
//! half survives in the trailer.

use crc::{Crc, CRC_32_ISO_HDLC};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PatchError, PatchResult};

/// Bytes at the end of the image reserved for checksums
pub const TRAILER_LEN: usize = 4;

const SUM_LEN: usize = 2;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Values computed by [`update_trailer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailerChecksums {
    pub crc32: u32,
    pub byte_sum: u16,
}

/// Result of [`verify_trailer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailerStatus {
    /// Checksums recomputed from the image contents
    pub computed: TrailerChecksums,
    /// Raw trailer bytes found in the image
    pub stored: [u8; TRAILER_LEN],
    /// High half of the CRC matches bytes `[len-4, len-2)`
    pub crc_valid: bool,
    /// Byte sum matches bytes `[len-2, len)`
    pub sum_valid: bool,
}

impl TrailerStatus {
    pub fn is_valid(&self) -> bool {
        self.crc_valid && self.sum_valid
    }
}

/// CRC-32 (ISO-HDLC) of `data`
pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Sum of all bytes modulo 65536
pub fn byte_sum16(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

fn check_len(image: &[u8]) -> PatchResult<()> {
    if image.len() < TRAILER_LEN {
        return Err(PatchError::ImageTooSmall {
            len: image.len(),
            min: TRAILER_LEN,
        });
    }
    Ok(())
}

/// Recompute and store both trailer checksums
pub fn update_trailer(image: &mut [u8]) -> PatchResult<TrailerChecksums> {
    check_len(image)?;
    let len = image.len();

    let crc = crc32(&image[..len - TRAILER_LEN]);
    image[len - TRAILER_LEN..].copy_from_slice(&crc.to_be_bytes());

    let sum = byte_sum16(&image[..len - SUM_LEN]);
    image[len - SUM_LEN..].copy_from_slice(&sum.to_be_bytes());

    debug!(
        crc32 = format!("0x{:08X}", crc),
        byte_sum = format!("0x{:04X}", sum),
        "Trailer checksums updated"
    );

    Ok(TrailerChecksums {
        crc32: crc,
        byte_sum: sum,
    })
}

/// Recompute both checksums and compare them with the stored trailer
pub fn verify_trailer(image: &[u8]) -> PatchResult<TrailerStatus> {
    check_len(image)?;
    let len = image.len();

    let crc = crc32(&image[..len - TRAILER_LEN]);
    let sum = byte_sum16(&image[..len - SUM_LEN]);

    let mut stored = [0u8; TRAILER_LEN];
    stored.copy_from_slice(&image[len - TRAILER_LEN..]);

    Ok(TrailerStatus {
        computed: TrailerChecksums {
            crc32: crc,
            byte_sum: sum,
        },
        stored,
        crc_valid: stored[..SUM_LEN] == crc.to_be_bytes()[..SUM_LEN],
        sum_valid: stored[SUM_LEN..] == sum.to_be_bytes(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_check_value() {
        // Standard check input for CRC-32/ISO-HDLC
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_byte_sum_wraps() {
        assert_eq!(byte_sum16(&[0xFF; 257]), (0xFFu32 * 257 % 65536) as u16);
        assert_eq!(byte_sum16(&[]), 0);
    }

    #[test]
    fn test_update_trailer_layout() {
        let mut image = vec![0x10u8; 16];
        let sums = update_trailer(&mut image).unwrap();

        let expected_crc = crc32(&[0x10; 12]);
        assert_eq!(sums.crc32, expected_crc);
        assert_eq!(&image[12..14], &expected_crc.to_be_bytes()[..2]);

        let expected_sum = byte_sum16(&image[..14]);
        assert_eq!(sums.byte_sum, expected_sum);
        assert_eq!(&image[14..], &expected_sum.to_be_bytes());
        assert_eq!(image.len(), 16);
    }

    #[test]
    fn test_verify_after_update() {
        let mut image: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        update_trailer(&mut image).unwrap();
        let status = verify_trailer(&image).unwrap();
        assert!(status.is_valid());

        image[10] ^= 0x01;
        let status = verify_trailer(&image).unwrap();
        assert!(!status.sum_valid);
        assert!(!status.is_valid());
    }

    #[test]
    fn test_trailer_only_image() {
        let mut image = vec![0xAA; TRAILER_LEN];
        let sums = update_trailer(&mut image).unwrap();
        assert_eq!(sums.crc32, crc32(&[]));
        assert!(verify_trailer(&image).unwrap().is_valid());
    }

    #[test]
    fn test_too_small() {
        let mut image = vec![0u8; 3];
        assert!(matches!(
            update_trailer(&mut image),
            Err(PatchError::ImageTooSmall { len: 3, min: 4 })
        ));
        assert_eq!(image, vec![0u8; 3]);
        assert!(verify_trailer(&[]).is_err());
    }
}
