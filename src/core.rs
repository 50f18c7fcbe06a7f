use crate::error::{CardpressError, CardpressResult};

pub use kurbo::Rect;

/// PDF user-space points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Convert a length in inches to PDF points.
pub fn inches_to_points(inches: f64) -> f64 {
    inches * POINTS_PER_INCH
}

/// Output page dimensions in output units.
///
/// Units are PDF points for document output and pixels for raster output.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PageSize {
    /// Width in output units.
    pub width: f64,
    /// Height in output units.
    pub height: f64,
}

impl PageSize {
    /// Create a validated page size with finite, positive dimensions.
    pub fn new(width: f64, height: f64) -> CardpressResult<Self> {
        if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
            return Err(CardpressError::dimension(format!(
                "page size must be finite and positive, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Full-page rectangle with the origin at (0, 0).
    pub fn rect(self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Round to whole pixels for raster output, clamping to at least 1x1.
    pub fn round_px(self) -> (u32, u32) {
        let w = self.width.round().max(1.0) as u32;
        let h = self.height.round().max(1.0) as u32;
        (w, h)
    }
}
