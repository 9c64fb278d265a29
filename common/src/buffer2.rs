use std::iter::StepBy;
use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::slice;

/// Row-major 2D buffer addressed as `(row, col)`.
///
/// The shape is always `(height, width)`; row index first, column index
/// second. Image planes, correlation patches and warp outputs all share it.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer2<T> {
    pixels: Vec<T>,
    height: usize,
    width: usize,
}

impl<T> Buffer2<T> {
    pub fn new(height: usize, width: usize, pixels: Vec<T>) -> Self {
        assert_eq!(
            pixels.len(),
            height * width,
            "pixels length must equal height * width"
        );
        Self {
            pixels,
            height,
            width,
        }
    }

    /// Build a buffer by evaluating `f(row, col)` for every sample.
    pub fn from_fn(height: usize, width: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut pixels = Vec::with_capacity(height * width);
        for row in 0..height {
            for col in 0..width {
                pixels.push(f(row, col));
            }
        }
        Self {
            pixels,
            height,
            width,
        }
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// `(height, width)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    pub fn index_of(&self, row: usize, col: usize) -> usize {
        row * self.width + col
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> &T {
        debug_assert!(row < self.height && col < self.width);
        &self.pixels[row * self.width + col]
    }

    #[inline]
    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut T {
        debug_assert!(row < self.height && col < self.width);
        &mut self.pixels[row * self.width + col]
    }

    /// Samples of one row, left to right.
    #[inline]
    pub fn row(&self, row: usize) -> &[T] {
        let start = row * self.width;
        &self.pixels[start..start + self.width]
    }

    /// Samples of one column, top to bottom.
    pub fn column(&self, col: usize) -> StepBy<slice::Iter<'_, T>> {
        assert!(col < self.width, "column {} out of range", col);
        self.pixels[col..].iter().step_by(self.width)
    }

    #[inline]
    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.pixels
    }

    #[inline]
    pub fn into_vec(self) -> Vec<T> {
        self.pixels
    }
}

impl<T: Clone> Buffer2<T> {
    pub fn new_filled(height: usize, width: usize, value: T) -> Self {
        Self {
            pixels: vec![value; height * width],
            height,
            width,
        }
    }

    /// Copy the `height x width` window whose top-left sample is `(top, left)`.
    ///
    /// Returns `None` when any part of the window falls outside the buffer.
    pub fn crop(&self, top: usize, left: usize, height: usize, width: usize) -> Option<Self> {
        if top + height > self.height || left + width > self.width {
            return None;
        }
        let mut pixels = Vec::with_capacity(height * width);
        for row in top..top + height {
            let start = row * self.width + left;
            pixels.extend_from_slice(&self.pixels[start..start + width]);
        }
        Some(Self {
            pixels,
            height,
            width,
        })
    }
}

impl<T: Default + Clone> Buffer2<T> {
    pub fn new_default(height: usize, width: usize) -> Self {
        Self::new_filled(height, width, T::default())
    }
}

impl<T> Index<(usize, usize)> for Buffer2<T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        &self.pixels[row * self.width + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Buffer2<T> {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        &mut self.pixels[row * self.width + col]
    }
}

impl<T> Deref for Buffer2<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.pixels
    }
}

impl<T> DerefMut for Buffer2<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.pixels
    }
}

impl<'a, T> IntoIterator for &'a Buffer2<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.pixels.iter()
    }
}

impl<T> From<Buffer2<T>> for Vec<T> {
    #[inline]
    fn from(buffer: Buffer2<T>) -> Self {
        buffer.pixels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2 rows x 3 cols: row 0 = [10, 20, 30], row 1 = [40, 50, 60]
    fn sample() -> Buffer2<i32> {
        Buffer2::new(2, 3, vec![10, 20, 30, 40, 50, 60])
    }

    #[test]
    fn test_new_stores_shape_height_first() {
        let buf = sample();
        assert_eq!(buf.height(), 2);
        assert_eq!(buf.width(), 3);
        assert_eq!(buf.shape(), (2, 3));
        assert_eq!(buf.len(), 6);
    }

    #[test]
    #[should_panic(expected = "pixels length must equal height * width")]
    fn test_new_panics_on_size_mismatch() {
        Buffer2::new(2, 3, vec![1, 2, 3]);
    }

    #[test]
    fn test_get_is_row_col() {
        let buf = sample();
        assert_eq!(*buf.get(0, 2), 30);
        assert_eq!(*buf.get(1, 0), 40);
        assert_eq!(buf[(1, 2)], 60);
        assert_eq!(buf.index_of(1, 1), 4);
    }

    #[test]
    fn test_from_fn_row_major() {
        let buf = Buffer2::from_fn(2, 3, |r, c| r * 10 + c);
        assert_eq!(buf.pixels(), &[0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn test_row_and_column() {
        let buf = sample();
        assert_eq!(buf.row(1), &[40, 50, 60]);
        let col: Vec<i32> = buf.column(2).copied().collect();
        assert_eq!(col, vec![30, 60]);
    }

    #[test]
    fn test_crop_inside() {
        let buf = Buffer2::from_fn(4, 4, |r, c| r * 4 + c);
        let win = buf.crop(1, 2, 2, 2).unwrap();
        assert_eq!(win.shape(), (2, 2));
        assert_eq!(win.pixels(), &[6, 7, 10, 11]);
    }

    #[test]
    fn test_crop_outside_returns_none() {
        let buf = Buffer2::from_fn(4, 4, |r, c| r * 4 + c);
        assert!(buf.crop(3, 0, 2, 2).is_none());
        assert!(buf.crop(0, 3, 1, 2).is_none());
        assert!(buf.crop(0, 0, 4, 4).is_some());
    }

    #[test]
    fn test_index_mut() {
        let mut buf = Buffer2::<f32>::new_default(2, 2);
        buf[(1, 0)] = 7.0;
        assert_eq!(buf.pixels(), &[0.0, 0.0, 7.0, 0.0]);
    }
}
