//! MeshChunk: one sub-domain's unstructured mesh with fields and ghost flags.
//!
//! Cells are stored CSR-style: cell `c` uses
//! `connectivity[offsets[c]..offsets[c + 1]]`. A chunk is built once and is
//! read-only while locators, extractors, and compositers use it.

use crate::data::field::{Centering, FieldArray};
use crate::geometry::bounds::Aabb;
use crate::mesh_error::MeshCompositeError;
use crate::topology::cell_type::CellType;
use crate::topology::ghost::GhostFlags;

/// Index of a cell within its chunk.
pub type CellId = usize;

/// Unstructured mesh chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshChunk {
    points: Vec<[f64; 3]>,
    cell_types: Vec<CellType>,
    offsets: Vec<usize>,
    connectivity: Vec<usize>,
    fields: Vec<FieldArray>,
    ghost_zones: Option<Vec<GhostFlags>>,
    ghost_nodes: Option<Vec<GhostFlags>>,
}

impl Default for MeshChunk {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MeshChunk {
    /// A chunk with the given points and no cells.
    pub fn new(points: Vec<[f64; 3]>) -> Self {
        Self {
            points,
            cell_types: Vec::new(),
            offsets: vec![0],
            connectivity: Vec::new(),
            fields: Vec::new(),
            ghost_zones: None,
            ghost_nodes: None,
        }
    }

    #[inline]
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    #[inline]
    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn n_cells(&self) -> usize {
        self.cell_types.len()
    }

    #[inline]
    pub fn cell_type(&self, cell: CellId) -> CellType {
        self.cell_types[cell]
    }

    /// Point indices of `cell`, in the topology's vertex order.
    #[inline]
    pub fn cell_points(&self, cell: CellId) -> &[usize] {
        &self.connectivity[self.offsets[cell]..self.offsets[cell + 1]]
    }

    /// Copies the coordinates of `cell`'s vertices into `out`.
    pub fn cell_vertices(&self, cell: CellId, out: &mut Vec<[f64; 3]>) {
        out.clear();
        out.extend(self.cell_points(cell).iter().map(|p| self.points[*p]));
    }

    pub fn cell_bounds(&self, cell: CellId) -> Aabb {
        Aabb::from_points(self.cell_points(cell).iter().map(|p| &self.points[*p]))
    }

    /// Bounds of every point in the chunk.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.points)
    }

    /// Appends a cell after validating its point count and index range.
    ///
    /// Cells cannot be added once zone-centred data (zone fields or ghost-zone
    /// flags) is attached, since that data would no longer line up.
    pub fn try_add_cell(
        &mut self,
        cell_type: CellType,
        points: &[usize],
    ) -> Result<CellId, MeshCompositeError> {
        let cell = self.n_cells();
        let count_ok = match cell_type.fixed_point_count() {
            Some(n) => points.len() == n,
            None => points.len() >= cell_type.min_point_count(),
        };
        if !count_ok {
            return Err(MeshCompositeError::CellPointCount {
                cell_type,
                expected: cell_type
                    .fixed_point_count()
                    .unwrap_or_else(|| cell_type.min_point_count()),
                found: points.len(),
            });
        }
        if let Some(&bad) = points.iter().find(|p| **p >= self.points.len()) {
            return Err(MeshCompositeError::CellPointOutOfRange {
                cell,
                point: bad,
                n_points: self.points.len(),
            });
        }
        if self.ghost_zones.is_some() || self.fields.iter().any(|f| f.centering() == Centering::Zone)
        {
            return Err(MeshCompositeError::ImproperUse(
                "cannot add cells after zone-centred data is attached".into(),
            ));
        }
        self.cell_types.push(cell_type);
        self.connectivity.extend_from_slice(points);
        self.offsets.push(self.connectivity.len());
        Ok(cell)
    }

    /// Attaches a field; the tuple count must match the centering.
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

    pub fn try_field(&self, name: &str) -> Result<&FieldArray, MeshCompositeError> {
        self.field(name)
            .ok_or_else(|| MeshCompositeError::MissingField(name.to_string()))
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

    pub fn set_ghost_nodes(&mut self, flags: Vec<GhostFlags>) -> Result<(), MeshCompositeError> {
        if flags.len() != self.n_points() {
            return Err(MeshCompositeError::FieldLengthMismatch {
                name: "ghost nodes".into(),
                expected: self.n_points(),
                found: flags.len(),
            });
        }
        self.ghost_nodes = Some(flags);
        Ok(())
    }

    pub fn ghost_zones(&self) -> Option<&[GhostFlags]> {
        self.ghost_zones.as_deref()
    }

    pub fn ghost_nodes(&self) -> Option<&[GhostFlags]> {
        self.ghost_nodes.as_deref()
    }

    /// `true` when the chunk carries ghost-zone flags and `cell` is flagged.
    #[inline]
    pub fn is_ghost_zone(&self, cell: CellId) -> bool {
        self.ghost_zones
            .as_ref()
            .is_some_and(|g| g[cell].is_ghost())
    }

    #[inline]
    pub fn is_ghost_node(&self, point: usize) -> bool {
        self.ghost_nodes
            .as_ref()
            .is_some_and(|g| g[point].is_ghost())
    }

    /// Iterates cell ids in ascending order.
    pub fn cells(&self) -> std::ops::Range<CellId> {
        0..self.n_cells()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> MeshChunk {
        let mut m = MeshChunk::new(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ]);
        m.try_add_cell(CellType::Quad, &[0, 1, 2, 3]).unwrap();
        m
    }

    #[test]
    fn add_cell_validates() {
        let mut m = unit_square();
        assert!(matches!(
            m.try_add_cell(CellType::Triangle, &[0, 1]),
            Err(MeshCompositeError::CellPointCount { expected: 3, found: 2, .. })
        ));
        assert!(matches!(
            m.try_add_cell(CellType::Triangle, &[0, 1, 9]),
            Err(MeshCompositeError::CellPointOutOfRange { point: 9, .. })
        ));
        assert_eq!(m.try_add_cell(CellType::Polygon, &[0, 1, 2]).unwrap(), 1);
        assert_eq!(m.cell_points(1), &[0, 1, 2]);
    }

    #[test]
    fn field_validation() {
        let mut m = unit_square();
        let bad = FieldArray::scalar("t", Centering::Node, vec![1.0; 3]).unwrap();
        assert!(matches!(
            m.add_field(bad),
            Err(MeshCompositeError::FieldLengthMismatch { expected: 4, found: 3, .. })
        ));
        m.add_field(FieldArray::scalar("t", Centering::Zone, vec![2.0]).unwrap())
            .unwrap();
        assert!(matches!(
            m.add_field(FieldArray::scalar("t", Centering::Zone, vec![2.0]).unwrap()),
            Err(MeshCompositeError::DuplicateField(_))
        ));
        assert!(m.try_add_cell(CellType::Vertex, &[0]).is_err());
        assert!(m.try_field("missing").is_err());
    }

    #[test]
    fn ghost_flags() {
        let mut m = unit_square();
        assert!(!m.is_ghost_zone(0));
        m.set_ghost_zones(vec![GhostFlags::DUPLICATED]).unwrap();
        assert!(m.is_ghost_zone(0));
        assert!(m.set_ghost_nodes(vec![GhostFlags::NONE; 2]).is_err());
    }
}
