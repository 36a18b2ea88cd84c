//! Curvilinear structured blocks: the sub-domains the ghost-zone builder works on.

use crate::data::field::{Centering, FieldArray};
use crate::data::mesh_chunk::MeshChunk;
use crate::geometry::bounds::Aabb;
use crate::mesh_error::MeshCompositeError;
use crate::topology::cell_type::CellType;
use crate::topology::ghost::GhostFlags;

/// One structured sub-domain. Points are stored i-fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuredBlock {
    domain: usize,
    dims: [usize; 3],
    points: Vec<[f64; 3]>,
    fields: Vec<FieldArray>,
    ghost_zones: Option<Vec<GhostFlags>>,
    ghost_nodes: Option<Vec<GhostFlags>>,
}

impl StructuredBlock {
    pub fn try_new(
        domain: usize,
        dims: [usize; 3],
        points: Vec<[f64; 3]>,
    ) -> Result<Self, MeshCompositeError> {
        if let Some(axis) = dims.iter().position(|d| *d == 0) {
            return Err(MeshCompositeError::InvalidAxis {
                axis,
                reason: "a structured block needs at least one node per axis".into(),
            });
        }
        let expected = dims.iter().product::<usize>();
        if points.len() != expected {
            return Err(MeshCompositeError::FieldLengthMismatch {
                name: "points".into(),
                expected,
                found: points.len(),
            });
        }
        Ok(Self {
            domain,
            dims,
            points,
            fields: Vec::new(),
            ghost_zones: None,
            ghost_nodes: None,
        })
    }

    #[inline]
    pub fn domain(&self) -> usize {
        self.domain
    }

    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn zone_dims(&self) -> [usize; 3] {
        self.dims.map(|n| n.saturating_sub(1).max(1))
    }

    pub fn n_points(&self) -> usize {
        self.points.len()
    }

    pub fn n_cells(&self) -> usize {
        self.zone_dims().iter().product()
    }

    #[inline]
    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    #[inline]
    pub fn node_index(&self, i: usize, j: usize, k: usize) -> usize {
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    #[inline]
    pub fn zone_index(&self, i: usize, j: usize, k: usize) -> usize {
        let z = self.zone_dims();
        i + z[0] * (j + z[1] * k)
    }

    #[inline]
    pub fn point(&self, i: usize, j: usize, k: usize) -> [f64; 3] {
        self.points[self.node_index(i, j, k)]
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&self.points)
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
        check_flags("ghost zones", self.n_cells(), flags.len())?;
        self.ghost_zones = Some(flags);
        Ok(())
    }

    pub fn set_ghost_nodes(&mut self, flags: Vec<GhostFlags>) -> Result<(), MeshCompositeError> {
        check_flags("ghost nodes", self.n_points(), flags.len())?;
        self.ghost_nodes = Some(flags);
        Ok(())
    }

    pub fn ghost_zones(&self) -> Option<&[GhostFlags]> {
        self.ghost_zones.as_deref()
    }

    pub fn ghost_nodes(&self) -> Option<&[GhostFlags]> {
        self.ghost_nodes.as_deref()
    }

    /// Unstructured copy with hexahedra, quads, lines or a vertex depending
    /// on how many axes have more than one node.
    pub fn to_mesh_chunk(&self) -> Result<MeshChunk, MeshCompositeError> {
        let mut chunk = MeshChunk::new(self.points.clone());
        let active: Vec<usize> = (0..3).filter(|a| self.dims[*a] > 1).collect();
        // corner walk in the counter-clockwise order hexahedra and quads expect
        const RING: [(usize, usize); 4] = [(0, 0), (1, 0), (1, 1), (0, 1)];
        let z = self.zone_dims();
        let mut ids = Vec::with_capacity(8);
        for k in 0..z[2] {
            for j in 0..z[1] {
                for i in 0..z[0] {
                    ids.clear();
                    let base = [i, j, k];
                    let at = |offs: &[(usize, usize)]| {
                        let mut ijk = base;
                        for (axis, d) in offs {
                            ijk[*axis] += d;
                        }
                        self.node_index(ijk[0], ijk[1], ijk[2])
                    };
                    let cell_type = match active.as_slice() {
                        [a, b, c] => {
                            for dc in 0..2 {
                                for (da, db) in RING {
                                    ids.push(at(&[(*a, da), (*b, db), (*c, dc)]));
                                }
                            }
                            CellType::Hexahedron
                        }
                        [a, b] => {
                            for (da, db) in RING {
                                ids.push(at(&[(*a, da), (*b, db)]));
                            }
                            CellType::Quad
                        }
                        [a] => {
                            ids.push(at(&[(*a, 0)]));
                            ids.push(at(&[(*a, 1)]));
                            CellType::Line
                        }
                        _ => {
                            ids.push(at(&[]));
                            CellType::Vertex
                        }
                    };
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
        if let Some(g) = &self.ghost_nodes {
            chunk.set_ghost_nodes(g.clone())?;
        }
        Ok(chunk)
    }
}

fn check_flags(name: &str, expected: usize, found: usize) -> Result<(), MeshCompositeError> {
    if expected != found {
        return Err(MeshCompositeError::FieldLengthMismatch {
            name: name.into(),
            expected,
            found,
        });
    }
    Ok(())
}
