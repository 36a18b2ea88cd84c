//! Interpolation weights returned by cell location.

/// Ordered `(point index, weight)` pairs.
///
/// For a resolved query inside a cell the weights sum to one; an empty set is
/// the "not found" result.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InterpolationWeights {
    entries: Vec<(usize, f64)>,
}

impl InterpolationWeights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[inline]
    pub fn push(&mut self, point: usize, weight: f64) {
        self.entries.push((point, weight));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[(usize, f64)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn point_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|(p, _)| *p)
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|(_, w)| w).sum()
    }

    /// Replace the contents with `points[i]` paired with `weights[i]`.
    pub(crate) fn assign(&mut self, points: &[usize], weights: &[f64]) {
        self.entries.clear();
        self.entries
            .extend(points.iter().copied().zip(weights.iter().copied()));
    }

    /// Blend a tuple-major value array (`components` values per point).
    pub fn interpolate(&self, values: &[f64], components: usize) -> Vec<f64> {
        let mut out = vec![0.0; components];
        for (p, w) in self.iter() {
            let tuple = &values[p * components..(p + 1) * components];
            for (o, v) in out.iter_mut().zip(tuple) {
                *o += w * v;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_two_component_field() {
        let mut w = InterpolationWeights::new();
        w.push(0, 0.25);
        w.push(2, 0.75);
        let values = [0.0, 10.0, 5.0, 5.0, 4.0, 2.0];
        let out = w.interpolate(&values, 2);
        assert!((out[0] - 3.0).abs() < 1e-12);
        assert!((out[1] - 4.0).abs() < 1e-12);
        assert!((w.sum() - 1.0).abs() < 1e-12);
    }
}
