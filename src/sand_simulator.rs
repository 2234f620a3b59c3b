use image::Rgba;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{
    assets::Assets,
    config::{HourglassConfig, MAX_PHYSICS_SPEED},
    grid::{ChamberCounts, SandGrid},
    surface::{Rect, RenderError, Surface},
    vec::Vec2,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Gravity runs and grains fall through the neck.
    Draining,
    /// No physics; grains are carried from the bottom chamber back to the top.
    Refilling,
}

const PHYSICS_EPSILON: f64 = 1e-9;

enum GrainUpdate {
    Moved,
    Stable,
}

/// Cheap per-cell coin flip used to pick which diagonal a grain tries first.
#[inline]
fn prefer_left(x: usize, y: usize, tick: u64) -> bool {
    ((x as u32).wrapping_mul(73_856_093) ^ (y as u32).wrapping_mul(19_349_663) ^ tick as u32) & 1
        == 1
}

pub struct Simulator {
    grid: SandGrid,
    config: HourglassConfig,
    rng: StdRng,
    phase: Phase,
    target_top_count: usize,
    tick: u64,
    physics_acc: f64,
    seed_rows: usize,
}

impl Simulator {
    /// Builds a simulator over `allowed` (one entry per cell of `size`). The
    /// grid starts empty; call [`Simulator::seed_top`] before stepping.
    pub fn new(size: Vec2<usize>, allowed: Vec<bool>, config: HourglassConfig, rng: StdRng) -> Self {
        let top_limit = (size.y as f32 * config.chamber_split) as usize;
        let seed_rows = ((size.y as f32 * config.seed_limit) as usize).min(size.y);
        Self {
            grid: SandGrid::new(size, top_limit, allowed),
            config,
            rng,
            phase: Phase::Draining,
            target_top_count: 0,
            tick: 0,
            physics_acc: 0.0,
            seed_rows,
        }
    }

    pub fn with_seed(size: Vec2<usize>, allowed: Vec<bool>, config: HourglassConfig, seed: u64) -> Self {
        Self::new(size, allowed, config, StdRng::seed_from_u64(seed))
    }

    pub fn grid(&self) -> &SandGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut SandGrid {
        &mut self.grid
    }

    pub fn config(&self) -> &HourglassConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn target_top_count(&self) -> usize {
        self.target_top_count
    }

    /// Rows that seeding and refilling write into.
    pub fn seed_rows(&self) -> usize {
        self.seed_rows
    }

    /// Refills the top chamber from scratch, denser at the top and thinning
    /// toward the neck, and makes that the refill target.
    pub fn seed_top(&mut self) {
        self.grid.clear();
        let rows = self.seed_rows;
        let span = rows.max(1) as f64;
        for y in 0..rows {
            let r = y as f64 / span;
            let prob = self.config.seed_density_top * (1.0 - r) + self.config.seed_density_neck * r;
            for x in 0..self.grid.width() {
                if self.grid.is_allowed(x, y) && self.rng.gen::<f64>() < prob {
                    self.grid.place(x, y);
                }
            }
        }
        self.target_top_count = self.grid.count_top();
    }

    /// Settled pile in the bottom chamber, for the reduced-motion still frame.
    pub fn seed_static(&mut self) {
        self.grid.clear();
        let start = (self.grid.height() as f32 * self.config.static_fill_start) as usize;
        for y in start..self.grid.height() {
            for x in 0..self.grid.width() {
                if self.grid.is_allowed(x, y) && self.rng.gen::<f64>() < self.config.static_fill_density {
                    self.grid.place(x, y);
                }
            }
        }
    }

    /// Starts a fresh cycle: full top chamber, draining.
    pub fn restart(&mut self) {
        self.seed_top();
        self.phase = Phase::Draining;
        self.physics_acc = 0.0;
    }

    /// Advances one animation tick. Returns the chamber counts the phase
    /// decisions were made on.
    pub fn step(&mut self) -> ChamberCounts {
        self.tick += 1;
        let mut counts = self.grid.counts();

        if self.config.diagnostics_every > 0 && self.tick % self.config.diagnostics_every == 0 {
            log::debug!(
                "hourglass tick={} phase={:?} top={} bottom={} total={}",
                self.tick,
                self.phase,
                counts.top,
                counts.bottom,
                counts.total
            );
        }

        if self.phase == Phase::Draining && counts.total < self.config.stall_floor {
            log::info!("hourglass stalled with {} grains, reseeding", counts.total);
            self.seed_top();
            counts = self.grid.counts();
        }

        if self.phase == Phase::Draining {
            if self.top_exhausted(counts) {
                let cleared = self.grid.clear_row(self.grid.top_limit());
                log::info!(
                    "hourglass refilling at tick {} (top={} bottom={} total={}, cleared {} at the neck)",
                    self.tick,
                    counts.top,
                    counts.bottom,
                    counts.total,
                    cleared
                );
                self.phase = Phase::Refilling;
                self.physics_acc = 0.0;
            }
        } else if self.refill_done(counts) {
            log::info!("hourglass draining at tick {} (top={})", self.tick, counts.top);
            self.phase = Phase::Draining;
        }

        match self.phase {
            Phase::Draining => {
                self.physics_acc += self.config.physics_speed.min(MAX_PHYSICS_SPEED) as f64;
                while self.physics_acc + PHYSICS_EPSILON >= 1.0 {
                    self.settle(self.tick);
                    self.physics_acc -= 1.0;
                }
            }
            Phase::Refilling => {
                self.refill_batch();
            }
        }

        counts
    }

    /// The absolute floor is capped at half the seeded pile so small glasses
    /// still drain before refilling.
    fn top_exhausted(&self, counts: ChamberCounts) -> bool {
        let floor = self.config.refill_top_floor.min(self.target_top_count / 2);
        counts.top < floor
            || (counts.top as f32) < counts.total as f32 * self.config.refill_top_fraction
    }

    // grains lost at the neck can leave the target out of reach, so an empty
    // bottom chamber also ends the refill
    fn refill_done(&self, counts: ChamberCounts) -> bool {
        counts.top as f32 >= self.target_top_count as f32 * self.config.refill_exit_ratio
            || counts.bottom == 0
    }

    /// One settling pass over the whole grid, bottom row first. Returns how
    /// many grains moved.
    pub fn settle(&mut self, tick: u64) -> usize {
        let Vec2 { x: width, y: height } = self.grid.size();
        if height < 2 {
            return 0;
        }
        let left_to_right = tick & 1 == 0;
        let mut moved = 0;
        for y in (0..height - 1).rev() {
            for k in 0..width {
                let x = if left_to_right { k } else { width - 1 - k };
                if !self.grid.is_occupied(x, y) {
                    continue;
                }
                if let GrainUpdate::Moved = self.update_grain([x, y].into(), tick) {
                    moved += 1;
                }
            }
        }
        moved
    }

    fn update_grain(&mut self, pos: Vec2<usize>, tick: u64) -> GrainUpdate {
        let [x, y]: [usize; 2] = pos.into();
        let below = y + 1;
        if self.fall_to(pos, x, below) {
            return GrainUpdate::Moved;
        }
        let left = x.checked_sub(1);
        let right = Some(x + 1);
        let (first, second) = if prefer_left(x, y, tick) {
            (left, right)
        } else {
            (right, left)
        };
        for target in [first, second].into_iter().flatten() {
            if self.fall_to(pos, target, below) {
                return GrainUpdate::Moved;
            }
        }
        GrainUpdate::Stable
    }

    fn fall_to(&mut self, from: Vec2<usize>, x: usize, y: usize) -> bool {
        if !self.grid.is_free(x, y) {
            return false;
        }
        let from = self.grid.index(from.x, from.y);
        let to = self.grid.index(x, y);
        self.grid.move_grain(from, to);
        true
    }

    /// Carries up to `refill_batch` grains from the bottom chamber to the top.
    /// Stops at the first grain that cannot be taken or placed. Returns how
    /// many were carried.
    pub fn refill_batch(&mut self) -> usize {
        let mut carried = 0;
        for _ in 0..self.config.refill_batch {
            let Some((x, y)) = self.take_from_bottom() else {
                break;
            };
            if !self.place_in_top() {
                self.grain_back(x, y);
                break;
            }
            carried += 1;
        }
        carried
    }

    fn grain_back(&mut self, x: usize, y: usize) {
        self.grid.place(x, y);
    }

    /// Removes the lowest grain of the bottom chamber, searching each row from
    /// the center outward where the pile is deepest.
    fn take_from_bottom(&mut self) -> Option<(usize, usize)> {
        let width = self.grid.width() as isize;
        let cx = width / 2;
        for y in (self.grid.top_limit()..self.grid.height()).rev() {
            for dx in 0..width {
                let offset = if dx % 2 == 0 { dx / 2 } else { -(dx + 1) / 2 };
                let x = cx + offset;
                if x < 0 || x >= width {
                    continue;
                }
                if self.grid.remove(x as usize, y) {
                    return Some((x as usize, y));
                }
            }
        }
        None
    }

    fn place_in_top(&mut self) -> bool {
        if self.seed_rows == 0 || self.grid.width() == 0 {
            return false;
        }
        for _ in 0..self.config.place_retries {
            let x = self.rng.gen_range(0..self.grid.width());
            let y = self.rng.gen_range(0..self.seed_rows);
            if self.grid.place(x, y) {
                return true;
            }
        }
        false
    }

    /// Draws frame, sand and overlay in that order.
    pub fn render<S: Surface + ?Sized>(&self, assets: &Assets, surface: &mut S) -> Result<(), RenderError> {
        surface.clear()?;
        surface.draw_image(&assets.frame, 1.0)?;
        self.draw_sand(surface)?;
        if let Some(overlay) = &assets.overlay {
            surface.draw_image(overlay, self.config.overlay_alpha)?;
        }
        Ok(())
    }

    fn draw_sand<S: Surface + ?Sized>(&self, surface: &mut S) -> Result<(), RenderError> {
        let [lr, lg, lb] = self.config.sand_light;
        let [sr, sg, sb] = self.config.sand_shadow;
        let light = Rgba([lr, lg, lb, 255]);
        let shadow = Rgba([sr, sg, sb, 255]);
        let scale = self.config.pixel_scale;
        let shade = (self.tick >> 2) as usize;

        for y in 0..self.grid.height() {
            for x in 0..self.grid.width() {
                if !self.grid.is_occupied(x, y) {
                    continue;
                }
                let color = if (x + y + shade) & 1 == 0 { light } else { shadow };
                surface.fill_rect(
                    Rect::new(x as u32 * scale, y as u32 * scale, scale, scale),
                    color,
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::PixelSurface;
    use image::RgbaImage;

    fn open_sim(w: usize, h: usize, seed: u64) -> Simulator {
        let size = Vec2::new(w, h);
        Simulator::with_seed(size, vec![true; size.area()], HourglassConfig::default(), seed)
    }

    #[test]
    fn grain_falls_straight_down_first() {
        let mut sim = open_sim(3, 3, 1);
        sim.grid_mut().place(1, 0);
        assert_eq!(sim.settle(0), 1);
        assert!(sim.grid().is_occupied(1, 1));
        sim.settle(1);
        assert!(sim.grid().is_occupied(1, 2));
        assert_eq!(sim.settle(2), 0);
    }

    #[test]
    fn blocked_grain_slides_diagonally() {
        let mut sim = open_sim(3, 2, 1);
        sim.grid_mut().place(1, 1);
        sim.grid_mut().place(1, 0);
        assert_eq!(sim.settle(0), 1);
        assert!(!sim.grid().is_occupied(1, 0));
        assert!(sim.grid().is_occupied(0, 1) || sim.grid().is_occupied(2, 1));
    }

    #[test]
    fn grain_never_enters_disallowed_cells() {
        // glass is only the middle column
        let size = Vec2::new(3, 3);
        let allowed = (0..9).map(|i| i % 3 == 1).collect();
        let mut sim = Simulator::with_seed(size, allowed, HourglassConfig::default(), 3);
        sim.grid_mut().place(1, 2);
        sim.grid_mut().place(1, 1);
        assert_eq!(sim.settle(0), 0);
        assert!(sim.grid().is_contained());
    }

    #[test]
    fn diagonal_preference_varies_across_cells() {
        let lefts = (0..64).filter(|&x| prefer_left(x, 7, 0)).count();
        assert!(lefts > 0 && lefts < 64);
        assert_ne!(prefer_left(5, 5, 0), prefer_left(5, 5, 1));
    }

    /// Config that never leaves `Draining` and never reseeds.
    fn steady_config(physics_speed: f32) -> HourglassConfig {
        HourglassConfig {
            physics_speed,
            refill_top_floor: 0,
            refill_top_fraction: 0.0,
            stall_floor: 0,
            ..HourglassConfig::default()
        }
    }

    fn grain_row(sim: &Simulator, x: usize) -> usize {
        (0..sim.grid().height())
            .find(|&y| sim.grid().is_occupied(x, y))
            .unwrap()
    }

    #[test]
    fn default_speed_settles_once_every_ten_ticks() {
        let size = Vec2::new(16usize, 16usize);
        let speed = HourglassConfig::default().physics_speed;
        let mut sim = Simulator::with_seed(size, vec![true; size.area()], steady_config(speed), 1);
        sim.grid_mut().place(8, 0);

        let mut row = 0;
        for tick in 1..=100u64 {
            sim.step();
            let now = grain_row(&sim, 8);
            if tick % 10 == 0 {
                assert_eq!(now, row + 1, "tick {tick}");
            } else {
                assert_eq!(now, row, "tick {tick}");
            }
            row = now;
        }
        assert_eq!(sim.phase(), Phase::Draining);
        assert_eq!(row, 10);
    }

    #[test]
    fn settling_passes_per_tick_are_capped() {
        let size = Vec2::new(4usize, 64usize);
        let mut sim = Simulator::with_seed(size, vec![true; size.area()], steady_config(1e30), 1);
        sim.grid_mut().place(1, 0);
        sim.step();
        assert_eq!(grain_row(&sim, 1), MAX_PHYSICS_SPEED as usize);
    }

    #[test]
    fn seed_top_stays_above_seed_rows() {
        let mut sim = open_sim(32, 32, 11);
        sim.seed_top();
        let rows = sim.seed_rows();
        for y in rows..32 {
            for x in 0..32 {
                assert!(!sim.grid().is_occupied(x, y));
            }
        }
        assert_eq!(sim.target_top_count(), sim.grid().count_top());
        assert!(sim.target_top_count() > 0);
    }

    #[test]
    fn refill_batch_moves_grains_upward_without_loss() {
        let mut sim = open_sim(16, 16, 5);
        for x in 0..16 {
            sim.grid_mut().place(x, 15);
        }
        let carried = sim.refill_batch();
        assert_eq!(carried, 16.min(sim.config().refill_batch));
        assert_eq!(sim.grid().count_all(), 16);
        assert_eq!(sim.grid().count_top(), carried);
    }

    #[test]
    fn refill_takes_from_center_of_lowest_row() {
        let mut sim = open_sim(8, 8, 5);
        sim.grid_mut().place(0, 7);
        sim.grid_mut().place(4, 7);
        sim.grid_mut().place(4, 6);
        assert_eq!(sim.take_from_bottom(), Some((4, 7)));
        assert_eq!(sim.take_from_bottom(), Some((0, 7)));
        assert_eq!(sim.take_from_bottom(), Some((4, 6)));
        assert_eq!(sim.take_from_bottom(), None);
    }

    #[test]
    fn failed_placement_puts_the_grain_back() {
        let mut sim = open_sim(4, 4, 5);
        // top seed rows are full, nothing can be placed
        for y in 0..sim.seed_rows() {
            for x in 0..4 {
                sim.grid_mut().place(x, y);
            }
        }
        sim.grid_mut().place(2, 3);
        let before = sim.grid().count_all();
        assert_eq!(sim.refill_batch(), 0);
        assert_eq!(sim.grid().count_all(), before);
        assert!(sim.grid().is_occupied(2, 3));
    }

    #[test]
    fn sand_alternates_between_tones() {
        let mut sim = open_sim(2, 1, 5);
        sim.grid_mut().place(0, 0);
        sim.grid_mut().place(1, 0);
        let assets = Assets {
            frame: RgbaImage::from_pixel(4, 2, Rgba([0, 0, 0, 255])),
            mask: RgbaImage::new(1, 1),
            overlay: None,
        };
        let mut surface = PixelSurface::new(4, 2);
        sim.render(&assets, &mut surface).unwrap();
        let config = HourglassConfig::default();
        let [r, g, b] = config.sand_light;
        assert_eq!(*surface.buffer().get_pixel(0, 0), Rgba([r, g, b, 255]));
        assert_eq!(*surface.buffer().get_pixel(1, 1), Rgba([r, g, b, 255]));
        let [r, g, b] = config.sand_shadow;
        assert_eq!(*surface.buffer().get_pixel(2, 0), Rgba([r, g, b, 255]));
    }
}
