//! Turns a silhouette image into the per-cell `allowed` mask.

use image::{imageops, imageops::FilterType, RgbaImage};

use super::vec::Vec2;

/// Samples `mask` at grid resolution and marks cells whose mean channel value
/// is above `threshold`. Fully transparent pixels count as outside.
pub fn allowed_from_image(mask: &RgbaImage, grid: Vec2<usize>, threshold: u8) -> Vec<bool> {
    let sampled = imageops::resize(mask, grid.x as u32, grid.y as u32, FilterType::Nearest);
    sampled
        .pixels()
        .map(|p| {
            let [r, g, b, a] = p.0;
            let sum = r as u32 + g as u32 + b as u32;
            a > 0 && sum > threshold as u32 * 3
        })
        .collect()
}
