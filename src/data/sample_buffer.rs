//! Per-pass sample buffer filled by extraction and consumed by compositing.
//!
//! The buffer covers `width × height` rays. Each ray maps a depth slab index
//! to a [`Sample`] accumulator, so only touched slabs cost memory.

use crate::mesh_error::MeshCompositeError;
use std::collections::BTreeMap;

/// Weighted accumulator for one sample position.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    sums: Vec<f64>,
    weight: f64,
}

impl Sample {
    /// An exact sample with unit weight.
    pub fn exact(values: &[f64]) -> Self {
        Self {
            sums: values.to_vec(),
            weight: 1.0,
        }
    }

    pub fn weighted(values: &[f64], weight: f64) -> Self {
        Self {
            sums: values.iter().map(|v| v * weight).collect(),
            weight,
        }
    }

    pub(crate) fn from_raw(sums: Vec<f64>, weight: f64) -> Self {
        Self { sums, weight }
    }

    pub fn add(&mut self, values: &[f64], weight: f64) {
        for (s, v) in self.sums.iter_mut().zip(values) {
            *s += weight * v;
        }
        self.weight += weight;
    }

    pub fn merge(&mut self, other: &Sample) {
        for (s, o) in self.sums.iter_mut().zip(&other.sums) {
            *s += o;
        }
        self.weight += other.weight;
    }

    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Raw weighted sums.
    #[inline]
    pub fn sums(&self) -> &[f64] {
        &self.sums
    }

    /// Normalised value of variable `var`.
    pub fn value(&self, var: usize) -> f64 {
        if self.weight == 0.0 {
            0.0
        } else {
            self.sums[var] / self.weight
        }
    }

    pub fn values(&self) -> Vec<f64> {
        (0..self.sums.len()).map(|v| self.value(v)).collect()
    }
}

/// One ray: depth slab → sample, in front-to-back order.
pub type Ray = BTreeMap<u32, Sample>;

/// `width × height × depth` sample lattice with `n_vars` values per sample.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    width: usize,
    height: usize,
    depth: usize,
    n_vars: usize,
    rays: Vec<Ray>,
}

impl SampleBuffer {
    pub fn new(width: usize, height: usize, depth: usize, n_vars: usize) -> Self {
        Self {
            width,
            height,
            depth,
            n_vars,
            rays: vec![Ray::new(); width * height],
        }
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
    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    #[inline]
    pub fn ray_index(&self, col: usize, row: usize) -> usize {
        row * self.width + col
    }

    pub fn ray(&self, col: usize, row: usize) -> &Ray {
        &self.rays[self.ray_index(col, row)]
    }

    pub(crate) fn ray_mut(&mut self, col: usize, row: usize) -> &mut Ray {
        let idx = self.ray_index(col, row);
        &mut self.rays[idx]
    }

    pub fn sample(&self, col: usize, row: usize, k: usize) -> Option<&Sample> {
        self.ray(col, row).get(&(k as u32))
    }

    /// Writes an exact sample. Returns `false` if the slot was already set,
    /// in which case the first value is kept.
    pub fn set_sample(
        &mut self,
        col: usize,
        row: usize,
        k: usize,
        values: &[f64],
    ) -> Result<bool, MeshCompositeError> {
        self.check_slot(col, row, k, values.len())?;
        let ray = self.ray_mut(col, row);
        match ray.entry(k as u32) {
            std::collections::btree_map::Entry::Occupied(_) => Ok(false),
            std::collections::btree_map::Entry::Vacant(v) => {
                v.insert(Sample::exact(values));
                Ok(true)
            }
        }
    }

    /// Adds a weighted contribution to a sample.
    pub fn accumulate_sample(
        &mut self,
        col: usize,
        row: usize,
        k: usize,
        values: &[f64],
        weight: f64,
    ) -> Result<(), MeshCompositeError> {
        self.check_slot(col, row, k, values.len())?;
        self.ray_mut(col, row)
            .entry(k as u32)
            .and_modify(|s| s.add(values, weight))
            .or_insert_with(|| Sample::weighted(values, weight));
        Ok(())
    }

    /// Adds every accumulator of `other` into `self`.
    pub fn merge_from(&mut self, other: &SampleBuffer) -> Result<(), MeshCompositeError> {
        if !self.same_shape(other) {
            return Err(MeshCompositeError::ImproperUse(format!(
                "cannot merge a {}x{}x{} buffer with {} vars into a {}x{}x{} buffer with {} vars",
                other.width,
                other.height,
                other.depth,
                other.n_vars,
                self.width,
                self.height,
                self.depth,
                self.n_vars
            )));
        }
        for (mine, theirs) in self.rays.iter_mut().zip(&other.rays) {
            merge_ray(mine, theirs);
        }
        Ok(())
    }

    pub fn same_shape(&self, other: &SampleBuffer) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.depth == other.depth
            && self.n_vars == other.n_vars
    }

    /// Number of non-empty samples.
    pub fn n_samples(&self) -> usize {
        self.rays.iter().map(|r| r.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.rays.iter().all(|r| r.is_empty())
    }

    /// `(col, row, ray)` for every ray, row-major.
    pub fn rays(&self) -> impl Iterator<Item = (usize, usize, &Ray)> + '_ {
        self.rays
            .iter()
            .enumerate()
            .map(|(i, r)| (i % self.width, i / self.width, r))
    }

    pub fn clear(&mut self) {
        for r in &mut self.rays {
            r.clear();
        }
    }

    fn check_slot(
        &self,
        col: usize,
        row: usize,
        k: usize,
        n_values: usize,
    ) -> Result<(), MeshCompositeError> {
        if col >= self.width || row >= self.height || k >= self.depth {
            return Err(MeshCompositeError::ImproperUse(format!(
                "sample ({col}, {row}, {k}) outside {}x{}x{} buffer",
                self.width, self.height, self.depth
            )));
        }
        if n_values != self.n_vars {
            return Err(MeshCompositeError::ImproperUse(format!(
                "sample has {n_values} values, buffer expects {}",
                self.n_vars
            )));
        }
        Ok(())
    }
}

pub(crate) fn merge_ray(into: &mut Ray, from: &Ray) {
    for (k, s) in from {
        into.entry(*k)
            .and_modify(|mine| mine.merge(s))
            .or_insert_with(|| s.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_writes_are_write_once() {
        let mut b = SampleBuffer::new(2, 2, 4, 1);
        assert!(b.set_sample(1, 0, 2, &[5.0]).unwrap());
        assert!(!b.set_sample(1, 0, 2, &[7.0]).unwrap());
        assert_eq!(b.sample(1, 0, 2).unwrap().value(0), 5.0);
        assert!(b.set_sample(2, 0, 0, &[1.0]).is_err());
        assert!(b.set_sample(0, 0, 0, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn accumulation_and_merge() {
        let mut a = SampleBuffer::new(1, 1, 2, 2);
        a.accumulate_sample(0, 0, 1, &[2.0, 4.0], 1.0).unwrap();
        let mut b = SampleBuffer::new(1, 1, 2, 2);
        b.accumulate_sample(0, 0, 1, &[4.0, 0.0], 3.0).unwrap();
        b.accumulate_sample(0, 0, 0, &[1.0, 1.0], 0.5).unwrap();
        a.merge_from(&b).unwrap();
        let s = a.sample(0, 0, 1).unwrap();
        assert_eq!(s.weight(), 4.0);
        assert!((s.value(0) - 3.5).abs() < 1e-12);
        assert!((s.value(1) - 1.0).abs() < 1e-12);
        assert_eq!(a.n_samples(), 2);
        assert!(a.merge_from(&SampleBuffer::new(2, 1, 2, 2)).is_err());
    }
}
