//! Drawing targets for the hourglass.

use image::{Rgba, RgbaImage};

use super::vec::Vec2;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
}

/// A fixed-size raster the hourglass paints into.
pub trait Surface {
    fn size(&self) -> Vec2<u32>;

    /// Resets every pixel to transparent.
    fn clear(&mut self) -> Result<(), RenderError>;

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) -> Result<(), RenderError>;

    /// Stretches `image` over the whole surface, blending it over what is
    /// already there with its own alpha scaled by `alpha`.
    fn draw_image(&mut self, image: &RgbaImage, alpha: f32) -> Result<(), RenderError>;
}

/// CPU surface backed by an RGBA buffer.
pub struct PixelSurface {
    buffer: RgbaImage,
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: RgbaImage::new(width, height),
        }
    }

    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }

    /// Raw RGBA bytes, row-major with `4 * width` bytes per row.
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_raw()
    }
}

fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>, alpha: f32) {
    let a = (src.0[3] as f32 / 255.0) * alpha.clamp(0.0, 1.0);
    if a <= 0.0 {
        return;
    }
    let dst_a = dst.0[3] as f32 / 255.0;
    let out_a = a + dst_a * (1.0 - a);
    for c in 0..3 {
        let s = src.0[c] as f32;
        let d = dst.0[c] as f32;
        let v = if out_a > 0.0 {
            (s * a + d * dst_a * (1.0 - a)) / out_a
        } else {
            0.0
        };
        dst.0[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst.0[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

impl Surface for PixelSurface {
    fn size(&self) -> Vec2<u32> {
        Vec2::new(self.buffer.width(), self.buffer.height())
    }

    fn clear(&mut self) -> Result<(), RenderError> {
        self.buffer.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) -> Result<(), RenderError> {
        let x_end = (rect.x + rect.w).min(self.buffer.width());
        let y_end = (rect.y + rect.h).min(self.buffer.height());
        for y in rect.y..y_end {
            for x in rect.x..x_end {
                self.buffer.put_pixel(x, y, color);
            }
        }
        Ok(())
    }

    fn draw_image(&mut self, image: &RgbaImage, alpha: f32) -> Result<(), RenderError> {
        let (w, h) = self.buffer.dimensions();
        let (iw, ih) = image.dimensions();
        if iw == 0 || ih == 0 {
            return Err(RenderError::Surface("cannot draw an empty image".into()));
        }
        for y in 0..h {
            let sy = (y as u64 * ih as u64 / h as u64) as u32;
            for x in 0..w {
                let sx = (x as u64 * iw as u64 / w as u64) as u32;
                let src = *image.get_pixel(sx, sy);
                blend(self.buffer.get_pixel_mut(x, y), src, alpha);
            }
        }
        Ok(())
    }
}
