/// Fixed-size scrolling history of spectra.
///
/// Stored as a ring of `depth` rows so a push costs one row copy. Rows are
/// always presented oldest first, newest last, and the row count never
/// changes after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct WaterfallHistory {
    data: Vec<f32>,
    width: usize,
    depth: usize,
    /// Physical index of the oldest row.
    head: usize,
}

impl WaterfallHistory {
    /// A history of `depth` rows of `width` bins, every bin set to `fill`.
    pub fn new(depth: usize, width: usize, fill: f32) -> Self {
        Self {
            data: vec![fill; depth * width],
            width,
            depth,
            head: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Discard the oldest row and append `row` as the newest.
    pub fn push(&mut self, row: &[f32]) {
        assert_eq!(
            row.len(),
            self.width,
            "row length {} != waterfall width {}",
            row.len(),
            self.width
        );
        if self.depth == 0 {
            return;
        }
        let start = self.head * self.width;
        self.data[start..start + self.width].copy_from_slice(row);
        self.head = (self.head + 1) % self.depth;
    }

    /// Logical row `index`: 0 is the oldest, `depth - 1` the newest.
    pub fn row(&self, index: usize) -> &[f32] {
        assert!(index < self.depth, "row {index} out of {}", self.depth);
        let physical = (self.head + index) % self.depth;
        &self.data[physical * self.width..(physical + 1) * self.width]
    }

    /// Rows from oldest to newest; `.rev()` walks newest first.
    pub fn rows(&self) -> impl DoubleEndedIterator<Item = &[f32]> + '_ {
        (0..self.depth).map(move |i| self.row(i))
    }

    /// Smallest and largest value currently held.
    pub fn range(&self) -> Option<(f32, f32)> {
        let mut values = self.data.iter().copied().filter(|v| v.is_finite());
        let first = values.next()?;
        Some(values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: f32, width: usize) -> Vec<f32> {
        vec![value; width]
    }

    /// `depth x width` copy, newest row last.
    fn to_matrix(wf: &WaterfallHistory) -> Vec<Vec<f32>> {
        wf.rows().map(<[f32]>::to_vec).collect()
    }

    #[test]
    fn test_starts_filled() {
        let wf = WaterfallHistory::new(3, 4, -100.0);
        assert_eq!(to_matrix(&wf), vec![row(-100.0, 4); 3]);
        assert_eq!(wf.range(), Some((-100.0, -100.0)));
    }

    #[test]
    fn test_row_count_never_changes() {
        let mut wf = WaterfallHistory::new(5, 2, 0.0);
        for i in 0..17 {
            wf.push(&row(i as f32, 2));
            assert_eq!(wf.rows().count(), 5);
            assert_eq!(to_matrix(&wf).len(), 5);
        }
    }

    #[test]
    fn test_fifo_order_before_wrapping() {
        let mut wf = WaterfallHistory::new(4, 1, -100.0);
        wf.push(&[1.0]);
        wf.push(&[2.0]);
        assert_eq!(to_matrix(&wf), vec![vec![-100.0], vec![-100.0], vec![1.0], vec![2.0]]);
        assert_eq!(wf.rows().next_back(), Some(&[2.0][..]));
    }

    #[test]
    fn test_fifo_order_after_wrapping() {
        let mut wf = WaterfallHistory::new(3, 2, 0.0);
        for i in 1..=7 {
            wf.push(&row(i as f32, 2));
        }
        assert_eq!(to_matrix(&wf), vec![row(5.0, 2), row(6.0, 2), row(7.0, 2)]);
        assert_eq!(wf.row(0), &[5.0, 5.0]);
    }

    #[test]
    #[should_panic(expected = "row length")]
    fn test_rejects_wrong_width() {
        let mut wf = WaterfallHistory::new(3, 2, 0.0);
        wf.push(&[1.0, 2.0, 3.0]);
    }
}
