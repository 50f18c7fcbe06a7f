use std::path::Path;

use anyhow::Context as _;

use crate::error::{CardpressError, CardpressResult};

pub type PremulRgba8 = [u8; 4];

// Pathological canvas guard; card artwork is orders of magnitude smaller.
const MAX_DIM: u32 = 16_384;

/// Source-over for premultiplied RGBA8.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }

    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = add_sat_u8(src[i], mul_div255(u16::from(dst[i]), inv));
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

pub fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

pub fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        for c in 0..3 {
            px[c] = ((px[c] as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Resize straight-alpha RGBA8 pixels with Lanczos3 filtering.
pub fn resize_rgba(
    rgba: &[u8],
    width: u32,
    height: u32,
    new_width: u32,
    new_height: u32,
) -> CardpressResult<Vec<u8>> {
    let img = image::RgbaImage::from_raw(width, height, rgba.to_vec()).ok_or_else(|| {
        CardpressError::composite(format!(
            "raster buffer is {} bytes, expected {} for {width}x{height}",
            rgba.len(),
            width as usize * height as usize * 4
        ))
    })?;
    let resized = image::imageops::resize(
        &img,
        new_width,
        new_height,
        image::imageops::FilterType::Lanczos3,
    );
    Ok(resized.into_raw())
}

/// A premultiplied RGBA8 output canvas, fully transparent at creation.
pub struct RasterCanvas {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> CardpressResult<Self> {
        if width == 0 || height == 0 {
            return Err(CardpressError::dimension(format!(
                "raster canvas must be non-empty, got {width}x{height}"
            )));
        }
        if width > MAX_DIM || height > MAX_DIM {
            return Err(CardpressError::dimension(format!(
                "raster canvas too large: {width}x{height} (max {MAX_DIM}x{MAX_DIM})"
            )));
        }
        Ok(Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Source-over blend a premultiplied RGBA8 buffer with its top-left
    /// corner at `(x0, y0)` in canvas coordinates. Pixels falling outside
    /// the canvas are clipped.
    pub fn blend_region(
        &mut self,
        src: &[u8],
        src_width: u32,
        src_height: u32,
        x0: u32,
        y0: u32,
    ) -> CardpressResult<()> {
        if src.len() != src_width as usize * src_height as usize * 4 {
            return Err(CardpressError::composite(format!(
                "blend source is {} bytes, expected {} for {src_width}x{src_height}",
                src.len(),
                src_width as usize * src_height as usize * 4
            )));
        }

        let copy_w = src_width.min(self.width.saturating_sub(x0)) as usize;
        let copy_h = src_height.min(self.height.saturating_sub(y0)) as usize;

        for row in 0..copy_h {
            let dst_off = ((y0 as usize + row) * self.width as usize + x0 as usize) * 4;
            let src_off = row * src_width as usize * 4;
            let dst_row = &mut self.data[dst_off..dst_off + copy_w * 4];
            let src_row = &src[src_off..src_off + copy_w * 4];
            for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
                d.copy_from_slice(&out);
            }
        }
        Ok(())
    }

    /// Un-premultiply and write as PNG.
    pub fn save_png(&self, path: &Path) -> CardpressResult<()> {
        let mut out = self.data.clone();
        unpremultiply_rgba8_in_place(&mut out);
        image::save_buffer_with_format(
            path,
            &out,
            self.width,
            self.height,
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("write png '{}'", path.display()))?;
        Ok(())
    }
}
