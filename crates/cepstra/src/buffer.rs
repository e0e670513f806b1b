//! Owned, contiguous 2D feature storage.
//!
//! Features are row-major (`rows = features`, `cols = frames`) so that the
//! delta convolutions run along contiguous memory. The buffer is allocated
//! once per pipeline configuration and mutated in place across windows.

/// A bounds-checked `rows x cols` matrix of `f32`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBuffer {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl FeatureBuffer {
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Reset every element to zero (reuse between windows, no reallocation).
    pub fn zero(&mut self) {
        self.data.fill(0.0);
    }

    #[must_use]
    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [f32] {
        &mut self.data[r * self.cols..(r + 1) * self.cols]
    }

    #[must_use]
    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.data[r * self.cols + c]
    }

    pub fn set(&mut self, r: usize, c: usize, v: f32) {
        self.data[r * self.cols + c] = v;
    }

    /// Write `values` into column `c`, one element per row.
    pub fn set_col(&mut self, c: usize, values: &[f32]) {
        debug_assert_eq!(values.len(), self.rows);
        for (r, &v) in values.iter().enumerate() {
            self.data[r * self.cols + c] = v;
        }
    }

    /// Copy column `src` into column `dst` (used for short-audio padding).
    pub fn copy_col(&mut self, src: usize, dst: usize) {
        for r in 0..self.rows {
            self.data[r * self.cols + dst] = self.data[r * self.cols + src];
        }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::FeatureBuffer;

    #[test]
    fn row_major_layout() {
        let mut b = FeatureBuffer::new(2, 3);
        b.set(0, 2, 1.0);
        b.set(1, 0, 2.0);
        assert_eq!(b.as_slice(), &[0.0, 0.0, 1.0, 2.0, 0.0, 0.0]);
        assert_eq!(b.row(1), &[2.0, 0.0, 0.0]);
    }

    #[test]
    fn column_write_and_replicate() {
        let mut b = FeatureBuffer::new(3, 4);
        b.set_col(1, &[1.0, 2.0, 3.0]);
        b.copy_col(1, 3);
        assert_eq!(b.get(0, 3), 1.0);
        assert_eq!(b.get(2, 3), 3.0);
        assert_eq!(b.get(2, 2), 0.0);

        b.zero();
        assert!(b.as_slice().iter().all(|&v| v == 0.0));
    }
}
