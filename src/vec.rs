#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Vec2<T> {
    pub x: T,
    pub y: T,
}

impl<T> Vec2<T> {
    pub const fn new(x: T, y: T) -> Self {
        Self { x, y }
    }
}

impl<T> From<[T; 2]> for Vec2<T>
where
    T: Copy,
{
    fn from(array: [T; 2]) -> Self {
        Self {
            x: array[0],
            y: array[1],
        }
    }
}

impl<T> From<Vec2<T>> for [T; 2] {
    fn from(v: Vec2<T>) -> Self {
        [v.x, v.y]
    }
}

impl Vec2<usize> {
    /// Number of cells in a `x * y` grid.
    pub fn area(&self) -> usize {
        self.x * self.y
    }

    /// Row-major index of `pos` in a grid of this size.
    #[inline]
    pub fn index(&self, pos: Vec2<usize>) -> usize {
        pos.x + self.x * pos.y
    }

    #[inline]
    pub fn contains(&self, pos: Vec2<usize>) -> bool {
        pos.x < self.x && pos.y < self.y
    }
}

impl Vec2<u32> {
    pub fn as_usize(self) -> Vec2<usize> {
        Vec2::new(self.x as usize, self.y as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_is_row_major() {
        let size = Vec2::new(4usize, 3usize);
        assert_eq!(size.area(), 12);
        assert_eq!(size.index([0, 0].into()), 0);
        assert_eq!(size.index([3, 0].into()), 3);
        assert_eq!(size.index([0, 1].into()), 4);
        assert_eq!(size.index([3, 2].into()), 11);
    }

    #[test]
    fn contains_excludes_far_edge() {
        let size = Vec2::new(4usize, 3usize);
        assert!(size.contains([3, 2].into()));
        assert!(!size.contains([4, 0].into()));
        assert!(!size.contains([0, 3].into()));
    }
}
