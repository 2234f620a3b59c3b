//! Images the hourglass is drawn from.
//!
//! The frame and mask are required; the overlay is optional and a failure to
//! load it is not an error.

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};

use super::vec::Vec2;

pub const FRAME_FILE: &str = "frame.png";
pub const MASK_FILE: &str = "mask.png";
pub const OVERLAY_FILE: &str = "overlay.png";

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to load {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Clone, Debug)]
pub struct Assets {
    pub frame: RgbaImage,
    pub mask: RgbaImage,
    pub overlay: Option<RgbaImage>,
}

fn load_image(path: &Path) -> Result<RgbaImage, AssetError> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|source| AssetError::Load {
            path: path.to_path_buf(),
            source,
        })
}

impl Assets {
    /// Reads `frame.png`, `mask.png` and, if present, `overlay.png` from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, AssetError> {
        let frame = load_image(&dir.join(FRAME_FILE))?;
        let mask = load_image(&dir.join(MASK_FILE))?;
        let overlay = match load_image(&dir.join(OVERLAY_FILE)) {
            Ok(img) => Some(img),
            Err(e) => {
                log::debug!("no overlay, drawing without it: {}", e);
                None
            }
        };
        Ok(Self {
            frame,
            mask,
            overlay,
        })
    }

    /// A built-in glass so the visual can run without image files.
    pub fn procedural(size: Vec2<u32>) -> Self {
        let glass = Silhouette::new(size);
        let mask = RgbaImage::from_fn(size.x, size.y, |x, y| {
            if glass.inside(x, y, 0.0) {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let frame = RgbaImage::from_fn(size.x, size.y, |x, y| {
            if glass.in_cap(y) && glass.within_caps_width(x) {
                Rgba([120, 84, 52, 255])
            } else if glass.inside(x, y, 0.0) {
                Rgba([30, 30, 36, 255])
            } else if glass.inside(x, y, 2.0) {
                Rgba([170, 170, 180, 255])
            } else {
                Rgba([9, 9, 11, 255])
            }
        });
        let overlay = RgbaImage::from_fn(size.x, size.y, |x, y| {
            if glass.inside(x, y, 0.0) && glass.in_highlight(x, y) {
                Rgba([255, 255, 255, 48])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        Self {
            frame,
            mask,
            overlay: Some(overlay),
        }
    }
}

/// Two conical bulbs meeting at a neck on the middle row, symmetric about the
/// vertical center line. Walls widen by less than a pixel per row so sand can
/// always slide down them.
struct Silhouette {
    width: f32,
    height: f32,
    top: f32,
    bottom: f32,
}

impl Silhouette {
    const MARGIN: f32 = 0.06;
    const NECK: f32 = 0.03;
    const BULB: f32 = 0.40;
    const SLOPE: f32 = 0.85;

    fn new(size: Vec2<u32>) -> Self {
        let height = size.y as f32;
        Self {
            width: size.x as f32,
            height,
            top: height * Self::MARGIN,
            bottom: height * (1.0 - Self::MARGIN),
        }
    }

    fn half_width(&self, y: f32) -> f32 {
        let from_neck = (y - self.height / 2.0).abs();
        (self.width * Self::NECK + Self::SLOPE * from_neck).min(self.width * Self::BULB)
    }

    fn inside(&self, x: u32, y: u32, pad: f32) -> bool {
        let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
        if py < self.top - pad || py >= self.bottom + pad {
            return false;
        }
        (px - self.width / 2.0).abs() < self.half_width(py) + pad
    }

    fn in_cap(&self, y: u32) -> bool {
        let py = y as f32 + 0.5;
        let cap = self.height * 0.03;
        (py >= self.top - cap && py < self.top) || (py >= self.bottom && py < self.bottom + cap)
    }

    fn within_caps_width(&self, x: u32) -> bool {
        let px = x as f32 + 0.5;
        (px - self.width / 2.0).abs() < self.width * (Self::BULB + 0.04)
    }

    fn in_highlight(&self, x: u32, y: u32) -> bool {
        let py = y as f32 + 0.5;
        let edge = self.width / 2.0 - self.half_width(py);
        let px = x as f32 + 0.5;
        px > edge + 2.0 && px < edge + 5.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedural_mask_is_symmetric_and_narrow_at_the_neck() {
        let assets = Assets::procedural(Vec2::new(64, 64));
        let mask = &assets.mask;
        for y in 0..64 {
            for x in 0..32 {
                assert_eq!(mask.get_pixel(x, y), mask.get_pixel(63 - x, y), "row {y}");
            }
        }
        let row_width = |y: u32| (0..64).filter(|&x| mask.get_pixel(x, y).0[0] == 255).count();
        assert!(row_width(32) > 0);
        assert!(row_width(32) < row_width(10));
        assert!(row_width(32) < row_width(54));
        assert_eq!(row_width(0), 0);
        assert_eq!(row_width(63), 0);
    }

    #[test]
    fn missing_mandatory_file_is_an_error() {
        let dir = std::env::temp_dir().join("hourglass-assets-missing");
        let err = Assets::load_dir(&dir).unwrap_err();
        let AssetError::Load { path, .. } = err;
        assert!(path.ends_with(FRAME_FILE));
    }
}
