//! Value transformer
//!
//! Scales every fixed-width field of a region by a multiplier, saturating at
//! the encoding's range.

use tracing::{info, warn};

use crate::region::Region;
use crate::report::{Modification, ModificationKind, PatchNote};
use crate::types::FieldEncoding;

/// Region that could not be processed because it extends past the image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSkipped {
    pub region: String,
    pub start: usize,
    pub length: usize,
    pub image_len: usize,
}

impl RegionSkipped {
    pub fn new(region: &Region, image_len: usize) -> Self {
        Self {
            region: region.name.clone(),
            start: region.start,
            length: region.length,
            image_len,
        }
    }
}

impl From<RegionSkipped> for PatchNote {
    fn from(skipped: RegionSkipped) -> Self {
        PatchNote::RegionOutOfBounds {
            region: skipped.region,
            start: skipped.start,
            length: skipped.length,
            image_len: skipped.image_len,
        }
    }
}

/// Check a region once against the image length, logging when it is skipped
pub fn check_bounds(region: &Region, image_len: usize) -> Result<(), RegionSkipped> {
    if region.fits(image_len) {
        return Ok(());
    }
    warn!(
        region = %region.name,
        start = region.start,
        length = region.length,
        image_len,
        "Region out of bounds, skipping"
    );
    Err(RegionSkipped::new(region, image_len))
}

/// Scale one value: truncate toward zero, then saturate
pub fn scale_value(original: i64, multiplier: f64, encoding: FieldEncoding) -> i64 {
    let scaled = (original as f64 * multiplier).trunc();
    let (min, max) = encoding.data_type.range();
    if scaled >= max as f64 {
        max
    } else if scaled <= min as f64 {
        min
    } else {
        scaled as i64
    }
}

/// Multiply every field of `region` in place
///
/// Bounds are checked once for the whole region; an out-of-bounds region is
/// left untouched. Only whole fields inside the region are processed.
pub fn scale_region(
    image: &mut [u8],
    region: &Region,
    encoding: FieldEncoding,
    multiplier: f64,
    kind: ModificationKind,
) -> Result<Vec<Modification>, RegionSkipped> {
    check_bounds(region, image.len())?;

    let width = encoding.width();
    let mut modifications = Vec::with_capacity(region.length / width);

    for (index, field) in image[region.range()].chunks_exact_mut(width).enumerate() {
        let original = encoding.read(field);
        let new = scale_value(original, multiplier, encoding);
        encoding.write(new, field);

        modifications.push(Modification::numeric(
            region.start + index * width,
            kind,
            original,
            new,
            format!("{} x{} ({})", region.description, multiplier, encoding),
        ));
    }

    info!(
        region = %region.name,
        multiplier,
        fields = modifications.len(),
        "Region scaled"
    );
    Ok(modifications)
}
