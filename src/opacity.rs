use std::sync::Arc;

use crate::{
    assets::RasterImage,
    error::{CardpressError, CardpressResult},
};

/// Scale every alpha sample by `factor`, saturating at fully opaque.
///
/// Color channels are untouched; sources without real transparency are
/// all-255 and come back unchanged. Returns a new image, the input is not
/// modified.
pub fn boost_alpha(img: &RasterImage, factor: f32) -> CardpressResult<RasterImage> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(CardpressError::validation(format!(
            "opacity boost factor must be finite and positive, got {factor}"
        )));
    }

    let mut rgba8 = img.rgba8.as_slice().to_vec();
    for px in rgba8.chunks_exact_mut(4) {
        px[3] = (f32::from(px[3]) * factor).round().clamp(0.0, 255.0) as u8;
    }

    Ok(RasterImage {
        width: img.width,
        height: img.height,
        rgba8: Arc::new(rgba8),
    })
}
