//! Bounded rolling window of live observations

use ndarray::Array2;
use std::collections::VecDeque;

/// Rows reserved up front; the deque grows on demand past this
const INITIAL_ROWS: usize = 1024;

/// FIFO of validated rows (laid out in schema order) with a fixed capacity.
///
/// Not synchronized on its own; the monitor keeps it behind its state lock.
#[derive(Debug, Clone)]
pub struct ObservationWindow {
    capacity: usize,
    n_features: usize,
    rows: VecDeque<Vec<f64>>,
}

impl ObservationWindow {
    pub fn new(capacity: usize, n_features: usize) -> Self {
        Self {
            capacity,
            n_features,
            rows: VecDeque::with_capacity(capacity.min(INITIAL_ROWS)),
        }
    }

    /// Append a row, evicting the oldest one when over capacity.
    /// Returns the evicted row, if any.
    pub fn push(&mut self, row: Vec<f64>) -> Option<Vec<f64>> {
        debug_assert_eq!(row.len(), self.n_features);
        self.rows.push_back(row);
        if self.rows.len() > self.capacity {
            self.rows.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently appended row
    pub fn latest(&self) -> Option<&[f64]> {
        self.rows.back().map(|r| r.as_slice())
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Copy the window into a matrix (oldest row first)
    pub fn snapshot(&self) -> Array2<f64> {
        let mut out = Array2::zeros((self.rows.len(), self.n_features));
        for (mut dst, row) in out.rows_mut().into_iter().zip(self.rows.iter()) {
            for (d, &v) in dst.iter_mut().zip(row.iter()) {
                *d = v;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_evicts_oldest() {
        let mut window = ObservationWindow::new(3, 1);
        for i in 0..3 {
            assert!(window.push(vec![i as f64]).is_none());
        }
        assert_eq!(window.push(vec![3.0]), Some(vec![0.0]));
        assert_eq!(window.len(), 3);
        assert_eq!(window.latest(), Some(&[3.0][..]));
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let mut window = ObservationWindow::new(10, 2);
        for i in 0..1000 {
            window.push(vec![i as f64, -(i as f64)]);
            assert!(window.len() <= 10);
        }
        assert_eq!(window.len(), 10);
    }

    #[test]
    fn test_huge_capacity_allocates_lazily() {
        let mut window = ObservationWindow::new(1 << 40, 3);
        assert_eq!(window.capacity(), 1 << 40);
        for i in 0..2000 {
            assert!(window.push(vec![i as f64; 3]).is_none());
        }
        assert_eq!(window.len(), 2000);
    }

    #[test]
    fn test_snapshot_preserves_order() {
        let mut window = ObservationWindow::new(2, 2);
        window.push(vec![1.0, 2.0]);
        window.push(vec![3.0, 4.0]);
        window.push(vec![5.0, 6.0]);

        let snap = window.snapshot();
        assert_eq!(snap.shape(), &[2, 2]);
        assert_eq!(snap[[0, 0]], 3.0);
        assert_eq!(snap[[1, 1]], 6.0);

        window.clear();
        assert!(window.is_empty());
        assert_eq!(snap.nrows(), 2);
    }
}
