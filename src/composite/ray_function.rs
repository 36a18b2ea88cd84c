//! Per-ray reductions that turn a sample-buffer region into a partial image.

use crate::data::image::{Image, PartialImage};
use crate::data::sample_buffer::{Ray, SampleBuffer};
use crate::extract::frame::{RestrictionWindow, SampleGrid};
use crate::mesh_error::MeshCompositeError;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum RayFunction {
    #[default]
    MaximumIntensity,
    Average,
    FirstHit,
}

impl RayFunction {
    /// Reduces one ray's `variable` values; `None` for an empty ray.
    pub fn evaluate(self, ray: &Ray, variable: usize) -> Option<f64> {
        let mut values = ray.values().map(|s| s.value(variable));
        match self {
            RayFunction::MaximumIntensity => values.reduce(f64::max),
            RayFunction::FirstHit => values.next(),
            RayFunction::Average => {
                let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
                (n > 0).then(|| sum / n as f64)
            }
        }
    }

    /// Renders `region` of `buffer` as a grey RGBA image with depth.
    ///
    /// Values are mapped linearly from `range` to 0..=255. Empty rays are
    /// transparent at depth `+inf`; other rays take the depth of their first
    /// sample.
    pub fn render(
        self,
        buffer: &SampleBuffer,
        grid: &SampleGrid,
        region: &RestrictionWindow,
        variable: usize,
        range: (f64, f64),
    ) -> Result<PartialImage, MeshCompositeError> {
        if region.col_max > buffer.width()
            || region.row_max > buffer.height()
            || region.col_min > region.col_max
            || region.row_min > region.row_max
        {
            return Err(MeshCompositeError::ImproperUse(format!(
                "region {region:?} outside {}x{} buffer",
                buffer.width(),
                buffer.height()
            )));
        }
        if variable >= buffer.n_vars() {
            return Err(MeshCompositeError::ImproperUse(format!(
                "variable {variable} out of range for {} variables",
                buffer.n_vars()
            )));
        }
        let rows = region.row_max - region.row_min;
        let cols = region.col_max - region.col_min;
        let mut img = Image::filled(rows, cols, &[0, 0, 0, 0], true)?;
        let (lo, hi) = range;
        let span = if hi > lo { hi - lo } else { 1.0 };
        for r in 0..rows {
            for c in 0..cols {
                let (col, row) = (region.col_min + c, region.row_min + r);
                let ray = buffer.ray(col, row);
                let (Some(v), Some(first)) = (self.evaluate(ray, variable), ray.keys().next())
                else {
                    continue;
                };
                let g = (((v - lo) / span).clamp(0.0, 1.0) * 255.0).round() as u8;
                img.set_pixel(r, c, &[g, g, g, 255]);
                let z = grid.sample_position(col, row, *first as usize)[2];
                img.set_depth(r, c, z as f32);
            }
        }
        Ok(PartialImage::new(img, region.row_min, region.col_min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample_buffer::Sample;
    use crate::geometry::bounds::Aabb;

    #[test]
    fn reductions() {
        let mut ray = Ray::new();
        ray.insert(2, Sample::exact(&[3.0]));
        ray.insert(0, Sample::exact(&[1.0]));
        ray.insert(5, Sample::exact(&[2.0]));
        assert_eq!(RayFunction::MaximumIntensity.evaluate(&ray, 0), Some(3.0));
        assert_eq!(RayFunction::FirstHit.evaluate(&ray, 0), Some(1.0));
        assert_eq!(RayFunction::Average.evaluate(&ray, 0), Some(2.0));
        assert_eq!(RayFunction::Average.evaluate(&Ray::new(), 0), None);
    }

    #[test]
    fn render_region() {
        let grid = SampleGrid::try_new(2, 2, 4, Aabb::new([0.0; 3], [2.0, 2.0, 4.0])).unwrap();
        let mut buf = SampleBuffer::new(2, 2, 4, 1);
        buf.set_sample(1, 1, 2, &[10.0]).unwrap();
        let region = RestrictionWindow {
            col_min: 1,
            col_max: 2,
            row_min: 0,
            row_max: 2,
        };
        let part = RayFunction::MaximumIntensity
            .render(&buf, &grid, &region, 0, (0.0, 10.0))
            .unwrap();
        assert_eq!((part.row_offset, part.col_offset), (0, 1));
        assert_eq!(part.image.pixel(1, 0), &[255, 255, 255, 255]);
        assert_eq!(part.image.depth_at(1, 0), Some(2.5));
        assert_eq!(part.image.pixel(0, 0), &[0, 0, 0, 0]);
    }
}
