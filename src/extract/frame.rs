//! View-space framing for extraction: transform, sample lattice and window.

use crate::geometry::bounds::Aabb;
use crate::mesh_error::MeshCompositeError;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Affine world → view map stored as the top three rows of a 4×4 matrix.
///
/// View `x`/`y` index image columns/rows; view `z` is depth along the ray.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewTransform {
    pub rows: [[f64; 4]; 3],
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl ViewTransform {
    pub const fn identity() -> Self {
        Self {
            rows: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
        }
    }

    pub fn new(rows: [[f64; 4]; 3]) -> Self {
        Self { rows }
    }

    #[inline]
    pub fn apply(&self, p: [f64; 3]) -> [f64; 3] {
        let r = &self.rows;
        [
            r[0][0] * p[0] + r[0][1] * p[1] + r[0][2] * p[2] + r[0][3],
            r[1][0] * p[0] + r[1][1] * p[1] + r[1][2] * p[2] + r[1][3],
            r[2][0] * p[0] + r[2][1] * p[1] + r[2][2] * p[2] + r[2][3],
        ]
    }
}

/// Regular `width × height × depth` lattice over a view-space box.
///
/// Sample `(col, row, k)` sits at the centre of its lattice cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleGrid {
    width: usize,
    height: usize,
    depth: usize,
    bounds: Aabb,
}

impl SampleGrid {
    pub fn try_new(
        width: usize,
        height: usize,
        depth: usize,
        bounds: Aabb,
    ) -> Result<Self, MeshCompositeError> {
        if width == 0 || height == 0 || depth == 0 {
            return Err(MeshCompositeError::ImproperUse(format!(
                "sample grid {width}x{height}x{depth} has no samples"
            )));
        }
        if bounds.is_empty() || bounds.extent().iter().any(|e| *e <= 0.0 || !e.is_finite()) {
            return Err(MeshCompositeError::ImproperUse(
                "sample grid bounds must have positive finite extent on every axis".into(),
            ));
        }
        Ok(Self {
            width,
            height,
            depth,
            bounds,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        [self.width, self.height, self.depth]
    }

    pub fn spacing(&self) -> [f64; 3] {
        let e = self.bounds.extent();
        [
            e[0] / self.width as f64,
            e[1] / self.height as f64,
            e[2] / self.depth as f64,
        ]
    }

    pub fn min_spacing(&self) -> f64 {
        let s = self.spacing();
        s[0].min(s[1]).min(s[2])
    }

    #[inline]
    pub fn sample_position(&self, col: usize, row: usize, k: usize) -> [f64; 3] {
        let s = self.spacing();
        let m = self.bounds.min;
        [
            m[0] + (col as f64 + 0.5) * s[0],
            m[1] + (row as f64 + 0.5) * s[1],
            m[2] + (k as f64 + 0.5) * s[2],
        ]
    }

    /// Indices of samples along `axis` whose centres lie in `[lo, hi]`.
    pub fn index_range(&self, axis: usize, lo: f64, hi: f64) -> Range<usize> {
        let n = self.dims()[axis];
        let h = self.spacing()[axis];
        let m = self.bounds.min[axis];
        let first = ((lo - m) / h - 0.5).ceil();
        let last = ((hi - m) / h - 0.5).floor();
        if !(first.is_finite() && last.is_finite()) || last < 0.0 || first > (n - 1) as f64 {
            return 0..0;
        }
        let first = first.max(0.0) as usize;
        let last = (last as usize).min(n - 1);
        if first > last { 0..0 } else { first..last + 1 }
    }

    /// Depth slab whose centre is nearest to `z`, or `None` outside the box.
    pub fn nearest_slab(&self, z: f64) -> Option<usize> {
        let m = self.bounds.min[2];
        if z < m || z > self.bounds.max[2] {
            return None;
        }
        let h = self.spacing()[2];
        let k = ((z - m) / h - 0.5).round();
        Some((k.max(0.0) as usize).min(self.depth - 1))
    }
}

/// Half-open pixel window `[col_min, col_max) × [row_min, row_max)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RestrictionWindow {
    pub col_min: usize,
    pub col_max: usize,
    pub row_min: usize,
    pub row_max: usize,
}

impl RestrictionWindow {
    #[inline]
    pub fn contains(&self, col: usize, row: usize) -> bool {
        (self.col_min..self.col_max).contains(&col) && (self.row_min..self.row_max).contains(&row)
    }

    /// Intersects sample ranges with the window.
    pub fn clip(&self, cols: Range<usize>, rows: Range<usize>) -> (Range<usize>, Range<usize>) {
        let c = cols.start.max(self.col_min)..cols.end.min(self.col_max);
        let r = rows.start.max(self.row_min)..rows.end.min(self.row_max);
        (c, r)
    }
}

/// Everything extraction needs to know about the current view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewParameters {
    pub transform: ViewTransform,
    pub grid: SampleGrid,
    pub window: Option<RestrictionWindow>,
}

impl ViewParameters {
    pub fn new(transform: ViewTransform, grid: SampleGrid) -> Self {
        Self {
            transform,
            grid,
            window: None,
        }
    }

    pub fn with_window(mut self, window: RestrictionWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// Column/row ranges clipped to the window, if any.
    pub(crate) fn clip(&self, cols: Range<usize>, rows: Range<usize>) -> (Range<usize>, Range<usize>) {
        match &self.window {
            Some(w) => w.clip(cols, rows),
            None => (cols, rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> SampleGrid {
        SampleGrid::try_new(4, 4, 2, Aabb::new([0.0; 3], [4.0, 4.0, 2.0])).unwrap()
    }

    #[test]
    fn sample_centres_and_ranges() {
        let g = grid();
        assert_eq!(g.sample_position(0, 1, 1), [0.5, 1.5, 1.5]);
        assert_eq!(g.index_range(0, 0.5, 2.5), 0..3);
        assert_eq!(g.index_range(0, 0.6, 1.4), 0..0);
        assert_eq!(g.index_range(0, -10.0, 10.0), 0..4);
        assert_eq!(g.index_range(0, 5.0, 6.0), 0..0);
    }

    #[test]
    fn nearest_slab_snaps() {
        let g = grid();
        assert_eq!(g.nearest_slab(0.0), Some(0));
        assert_eq!(g.nearest_slab(1.2), Some(1));
        assert_eq!(g.nearest_slab(2.5), None);
    }

    #[test]
    fn window_clip() {
        let w = RestrictionWindow {
            col_min: 1,
            col_max: 3,
            row_min: 0,
            row_max: 2,
        };
        assert_eq!(w.clip(0..4, 1..4), (1..3, 1..2));
        assert!(w.contains(2, 1) && !w.contains(3, 1));
    }

    #[test]
    fn degenerate_grid_rejected() {
        assert!(SampleGrid::try_new(1, 1, 1, Aabb::new([0.0; 3], [1.0, 1.0, 0.0])).is_err());
        assert!(SampleGrid::try_new(0, 1, 1, Aabb::new([0.0; 3], [1.0; 3])).is_err());
    }
}
