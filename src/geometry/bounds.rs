//! Axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};

/// Axis-aligned box; an empty box has `min > max` on every axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// A box that contains nothing; expanding it by a point yields that point.
    pub const fn empty() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
        }
    }

    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f64; 3]>) -> Self {
        let mut b = Self::empty();
        for p in points {
            b.expand(p);
        }
        b
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        (0..3).any(|a| self.min[a] > self.max[a])
    }

    #[inline]
    pub fn expand(&mut self, p: &[f64; 3]) {
        for a in 0..3 {
            self.min[a] = self.min[a].min(p[a]);
            self.max[a] = self.max[a].max(p[a]);
        }
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        if !other.is_empty() {
            out.expand(&other.min);
            out.expand(&other.max);
        }
        out
    }

    #[inline]
    pub fn extent(&self) -> [f64; 3] {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    #[inline]
    pub fn center(&self) -> [f64; 3] {
        [
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        ]
    }

    /// Length of the diagonal (0 for empty boxes).
    pub fn diagonal(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let e = self.extent();
        (e[0] * e[0] + e[1] * e[1] + e[2] * e[2]).sqrt()
    }

    /// Closed containment test with an absolute tolerance.
    #[inline]
    pub fn contains_with_tol(&self, p: &[f64; 3], tol: f64) -> bool {
        (0..3).all(|a| p[a] >= self.min[a] - tol && p[a] <= self.max[a] + tol)
    }

    #[inline]
    pub fn contains(&self, p: &[f64; 3]) -> bool {
        self.contains_with_tol(p, 0.0)
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        (0..3).all(|a| self.min[a] <= other.max[a] && other.min[a] <= self.max[a])
    }

    /// Number of axes with zero extent.
    pub fn flat_axes(&self) -> usize {
        self.extent().iter().filter(|e| **e <= 0.0).count()
    }

    /// Pads axes of zero extent so the box has positive volume.
    ///
    /// The pad is `fraction` of the longest extent, or `fraction` itself when
    /// every axis is flat (a single point).
    pub fn pad_degenerate(&self, fraction: f64) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let ext = self.extent();
        let longest = ext.iter().copied().fold(0.0_f64, f64::max);
        let pad = if longest > 0.0 { fraction * longest } else { fraction };
        let mut out = *self;
        for a in 0..3 {
            if ext[a] <= 0.0 {
                out.min[a] -= pad;
                out.max[a] += pad;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_and_pad() {
        let b = Aabb::from_points(&[[0.0, 0.0, 0.0], [2.0, 1.0, 0.0]]);
        assert_eq!(b.flat_axes(), 1);
        let p = b.pad_degenerate(0.01);
        assert_eq!(p.flat_axes(), 0);
        assert!((p.max[2] - 0.02).abs() < 1e-15);
        assert!(p.contains(&[1.0, 0.5, 0.0]));
    }

    #[test]
    fn empty_box() {
        let b = Aabb::empty();
        assert!(b.is_empty());
        assert_eq!(b.diagonal(), 0.0);
        let u = b.union(&Aabb::new([0.0; 3], [1.0; 3]));
        assert_eq!(u, Aabb::new([0.0; 3], [1.0; 3]));
    }
}
