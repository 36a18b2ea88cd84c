//! Rectilinear grids: three monotone coordinate arrays.

use crate::data::field::{Centering, FieldArray};
use crate::data::mesh_chunk::MeshChunk;
use crate::geometry::bounds::Aabb;
use crate::mesh_error::MeshCompositeError;
use crate::topology::cell_type::CellType;
use crate::topology::ghost::GhostFlags;
use serde::{Deserialize, Serialize};

/// Direction of a coordinate axis.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AxisOrder {
    Ascending,
    Descending,
    /// A single coordinate: the grid has no extent along this axis.
    Flat,
}

/// Grid defined by per-axis coordinate arrays; nodes are ordered i-fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct RectilinearGrid {
    coords: [Vec<f64>; 3],
    order: [AxisOrder; 3],
    fields: Vec<FieldArray>,
    ghost_zones: Option<Vec<GhostFlags>>,
}

impl RectilinearGrid {
    /// Builds a grid, rejecting empty, non-finite or non-monotone axes.
    pub fn try_new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Result<Self, MeshCompositeError> {
        let coords = [x, y, z];
        let mut order = [AxisOrder::Flat; 3];
        for (axis, c) in coords.iter().enumerate() {
            order[axis] = classify_axis(axis, c)?;
        }
        Ok(Self {
            coords,
            order,
            fields: Vec::new(),
            ghost_zones: None,
        })
    }

    #[inline]
    pub fn coords(&self, axis: usize) -> &[f64] {
        &self.coords[axis]
    }

    #[inline]
    pub fn axis_order(&self, axis: usize) -> AxisOrder {
        self.order[axis]
    }

    pub fn node_dims(&self) -> [usize; 3] {
        [self.coords[0].len(), self.coords[1].len(), self.coords[2].len()]
    }

    /// Zones per axis; a flat axis still contributes one layer.
    pub fn zone_dims(&self) -> [usize; 3] {
        let n = self.node_dims();
        [
            n[0].saturating_sub(1).max(1),
            n[1].saturating_sub(1).max(1),
            n[2].saturating_sub(1).max(1),
        ]
    }

    pub fn n_points(&self) -> usize {
        self.node_dims().iter().product()
    }

    pub fn n_cells(&self) -> usize {
        self.zone_dims().iter().product()
    }

    #[inline]
    pub fn node_index(&self, i: usize, j: usize, k: usize) -> usize {
        let n = self.node_dims();
        i + n[0] * (j + n[1] * k)
    }

    #[inline]
    pub fn zone_index(&self, i: usize, j: usize, k: usize) -> usize {
        let z = self.zone_dims();
        i + z[0] * (j + z[1] * k)
    }

    #[inline]
    pub fn point(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        [self.coords[0][i], self.coords[1][j], self.coords[2][k]]
    }

    pub fn bounds(&self) -> Aabb {
        let mut b = Aabb::empty();
        for axis in 0..3 {
            for v in &self.coords[axis] {
                b.min[axis] = b.min[axis].min(*v);
                b.max[axis] = b.max[axis].max(*v);
            }
        }
        b
    }

    pub fn add_field(&mut self, field: FieldArray) -> Result<(), MeshCompositeError> {
        if self.field(field.name()).is_some() {
            return Err(MeshCompositeError::DuplicateField(field.name().to_string()));
        }
        let expected = match field.centering() {
            Centering::Node => self.n_points(),
            Centering::Zone => self.n_cells(),
        };
        field.validate_len(expected)?;
        self.fields.push(field);
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldArray> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn fields(&self) -> &[FieldArray] {
        &self.fields
    }

    pub fn set_ghost_zones(&mut self, flags: Vec<GhostFlags>) -> Result<(), MeshCompositeError> {
        if flags.len() != self.n_cells() {
            return Err(MeshCompositeError::FieldLengthMismatch {
                name: "ghost zones".into(),
                expected: self.n_cells(),
                found: flags.len(),
            });
        }
        self.ghost_zones = Some(flags);
        Ok(())
    }

    pub fn ghost_zones(&self) -> Option<&[GhostFlags]> {
        self.ghost_zones.as_deref()
    }

    #[inline]
    pub fn is_ghost_zone(&self, zone: usize) -> bool {
        self.ghost_zones
            .as_ref()
            .is_some_and(|g| g[zone].is_ghost())
    }

    /// Axes with more than one node.
    pub fn active_axes(&self) -> Vec<usize> {
        (0..3).filter(|a| self.coords[*a].len() > 1).collect()
    }

    /// Explicit unstructured copy: voxels, pixels, lines or a vertex depending
    /// on how many axes have extent. Zone ids match [`zone_index`](Self::zone_index).
    pub fn to_mesh_chunk(&self) -> Result<MeshChunk, MeshCompositeError> {
        let [nx, ny, nz] = self.node_dims();
        let mut points = Vec::with_capacity(self.n_points());
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    points.push(self.point(i, j, k));
                }
            }
        }
        let mut chunk = MeshChunk::new(points);
        let active = self.active_axes();
        let cell_type = match active.len() {
            3 => CellType::Voxel,
            2 => CellType::Pixel,
            1 => CellType::Line,
            _ => CellType::Vertex,
        };
        let zd = self.zone_dims();
        let mut ids = Vec::with_capacity(1 << active.len());
        for k in 0..zd[2] {
            for j in 0..zd[1] {
                for i in 0..zd[0] {
                    ids.clear();
                    for corner in 0..(1usize << active.len()) {
                        let mut ijk = [i, j, k];
                        for (bit, axis) in active.iter().enumerate() {
                            ijk[*axis] += (corner >> bit) & 1;
                        }
                        ids.push(self.node_index(ijk[0], ijk[1], ijk[2]));
                    }
                    chunk.try_add_cell(cell_type, &ids)?;
                }
            }
        }
        for f in &self.fields {
            chunk.add_field(f.clone())?;
        }
        if let Some(g) = &self.ghost_zones {
            chunk.set_ghost_zones(g.clone())?;
        }
        Ok(chunk)
    }
}

fn classify_axis(axis: usize, c: &[f64]) -> Result<AxisOrder, MeshCompositeError> {
    let invalid = |reason: &str| MeshCompositeError::InvalidAxis {
        axis,
        reason: reason.to_string(),
    };
    if c.is_empty() {
        return Err(invalid("no coordinates"));
    }
    if c.iter().any(|v| !v.is_finite()) {
        return Err(invalid("non-finite coordinate"));
    }
    if c.len() == 1 {
        return Ok(AxisOrder::Flat);
    }
    if c.windows(2).all(|w| w[0] < w[1]) {
        Ok(AxisOrder::Ascending)
    } else if c.windows(2).all(|w| w[0] > w[1]) {
        Ok(AxisOrder::Descending)
    } else {
        Err(invalid("coordinates are not strictly monotone"))
    }
}
