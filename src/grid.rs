use super::vec::Vec2;

/// Cell state for the hourglass: which cells hold a grain and which cells lie
/// inside the glass. A grain is only ever stored in an allowed cell.
#[derive(Clone, Debug)]
pub struct SandGrid {
    size: Vec2<usize>,
    top_limit: usize,
    occupied: Vec<bool>,
    allowed: Vec<bool>,
}

impl SandGrid {
    /// `allowed` must have `size.area()` entries. Rows `0..top_limit` form the
    /// top chamber.
    pub fn new(size: Vec2<usize>, top_limit: usize, allowed: Vec<bool>) -> Self {
        assert_eq!(allowed.len(), size.area(), "mask does not match grid size");
        Self {
            size,
            top_limit: top_limit.min(size.y),
            occupied: vec![false; size.area()],
            allowed,
        }
    }

    pub fn size(&self) -> Vec2<usize> {
        self.size
    }

    pub fn width(&self) -> usize {
        self.size.x
    }

    pub fn height(&self) -> usize {
        self.size.y
    }

    /// First row of the bottom chamber; also the neck row.
    pub fn top_limit(&self) -> usize {
        self.top_limit
    }

    pub fn occupied(&self) -> &[bool] {
        &self.occupied
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        self.size.index([x, y].into())
    }

    #[inline]
    pub fn is_occupied(&self, x: usize, y: usize) -> bool {
        self.occupied[self.index(x, y)]
    }

    #[inline]
    pub fn is_allowed(&self, x: usize, y: usize) -> bool {
        self.allowed[self.index(x, y)]
    }

    /// In bounds, inside the glass and empty.
    #[inline]
    pub fn is_free(&self, x: usize, y: usize) -> bool {
        if !self.size.contains([x, y].into()) {
            return false;
        }
        let i = self.index(x, y);
        self.allowed[i] && !self.occupied[i]
    }

    /// Puts a grain at `(x, y)` if that cell is free.
    pub fn place(&mut self, x: usize, y: usize) -> bool {
        if !self.is_free(x, y) {
            return false;
        }
        let i = self.index(x, y);
        self.occupied[i] = true;
        true
    }

    /// Takes the grain at `(x, y)`, if any.
    pub fn remove(&mut self, x: usize, y: usize) -> bool {
        let i = self.index(x, y);
        std::mem::replace(&mut self.occupied[i], false)
    }

    #[inline]
    pub(crate) fn move_grain(&mut self, from: usize, to: usize) {
        debug_assert!(self.occupied[from] && !self.occupied[to] && self.allowed[to]);
        self.occupied[from] = false;
        self.occupied[to] = true;
    }

    pub fn clear(&mut self) {
        self.occupied.fill(false);
    }

    /// Empties row `y`. Returns how many grains were removed.
    pub fn clear_row(&mut self, y: usize) -> usize {
        if y >= self.size.y {
            return 0;
        }
        let start = self.index(0, y);
        let row = &mut self.occupied[start..start + self.size.x];
        let removed = row.iter().filter(|&&c| c).count();
        row.fill(false);
        removed
    }

    fn count_rows(&self, rows: std::ops::Range<usize>) -> usize {
        let start = rows.start * self.size.x;
        let end = rows.end * self.size.x;
        self.occupied[start..end].iter().filter(|&&c| c).count()
    }

    pub fn count_all(&self) -> usize {
        self.count_rows(0..self.size.y)
    }

    pub fn count_top(&self) -> usize {
        self.count_rows(0..self.top_limit)
    }

    pub fn count_bottom(&self) -> usize {
        self.count_rows(self.top_limit..self.size.y)
    }

    pub fn counts(&self) -> ChamberCounts {
        let top = self.count_top();
        let bottom = self.count_bottom();
        ChamberCounts {
            top,
            bottom,
            total: top + bottom,
        }
    }

    /// True if no grain sits outside the glass.
    pub fn is_contained(&self) -> bool {
        self.occupied
            .iter()
            .zip(&self.allowed)
            .all(|(&occupied, &allowed)| !occupied || allowed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChamberCounts {
    pub top: usize,
    pub bottom: usize,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walled() -> SandGrid {
        // 4x4, column 0 is outside the glass
        let size = Vec2::new(4, 4);
        let allowed = (0..16).map(|i| i % 4 != 0).collect();
        SandGrid::new(size, 2, allowed)
    }

    #[test]
    fn place_refuses_disallowed_and_occupied_cells() {
        let mut grid = walled();
        assert!(!grid.place(0, 1));
        assert!(grid.place(1, 1));
        assert!(!grid.place(1, 1));
        assert!(!grid.place(4, 1));
        assert!(grid.is_contained());
    }

    #[test]
    fn counts_split_at_top_limit() {
        let mut grid = walled();
        grid.place(1, 0);
        grid.place(2, 1);
        grid.place(3, 2);
        assert_eq!(
            grid.counts(),
            ChamberCounts {
                top: 2,
                bottom: 1,
                total: 3
            }
        );
        assert_eq!(grid.count_all(), 3);
    }

    #[test]
    fn clear_row_reports_removed() {
        let mut grid = walled();
        grid.place(1, 2);
        grid.place(3, 2);
        grid.place(3, 3);
        assert_eq!(grid.clear_row(2), 2);
        assert_eq!(grid.count_all(), 1);
        assert_eq!(grid.clear_row(9), 0);
    }

    #[test]
    fn remove_reports_whether_a_grain_was_there() {
        let mut grid = walled();
        grid.place(2, 3);
        assert!(grid.remove(2, 3));
        assert!(!grid.remove(2, 3));
    }
}
