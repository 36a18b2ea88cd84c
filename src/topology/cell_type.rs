//! Cell type metadata for mesh chunks.
//!
//! Vertex orderings follow the usual visualization conventions:
//!
//! - `Quad`: `[v0, v1, v2, v3]` counter-clockwise.
//! - `Pixel`: axis-aligned quad ordered `(0,0) (1,0) (0,1) (1,1)`.
//! - `Hexahedron`: bottom face `0..=3`, top face `4..=7`.
//! - `Voxel`: axis-aligned hexahedron ordered by `i + 2j + 4k`.
//! - `Wedge`: bottom triangle `0..=2`, top triangle `3..=5`.
//! - `Pyramid`: base quad `0..=3`, apex `4`.
//! - `QuadraticHexahedron`: the 8 hexahedron corners, then the mid-edge nodes of
//!   edges `0-1 1-2 2-3 3-0`, `4-5 5-6 6-7 7-4`, `0-4 1-5 2-6 3-7`.

use serde::{Deserialize, Serialize};

/// Cell topologies understood by the locators and extractors.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum CellType {
    /// 0D vertex.
    #[default]
    Vertex,
    /// Set of unconnected vertices.
    PolyVertex,
    /// 1D segment.
    Line,
    /// 2D simplex.
    Triangle,
    /// 2D bilinear quad.
    Quad,
    /// Axis-aligned quad.
    Pixel,
    /// Planar polygon with three or more vertices.
    Polygon,
    /// 3D simplex.
    Tetrahedron,
    /// 3D pyramid.
    Pyramid,
    /// 3D wedge (triangular prism).
    Wedge,
    /// 3D trilinear hexahedron.
    Hexahedron,
    /// Axis-aligned hexahedron.
    Voxel,
    /// 20-node serendipity hexahedron.
    QuadraticHexahedron,
}

impl CellType {
    /// Returns the topological dimension of the cell.
    pub fn dimension(self) -> u8 {
        match self {
            CellType::Vertex | CellType::PolyVertex => 0,
            CellType::Line => 1,
            CellType::Triangle | CellType::Quad | CellType::Pixel | CellType::Polygon => 2,
            CellType::Tetrahedron
            | CellType::Pyramid
            | CellType::Wedge
            | CellType::Hexahedron
            | CellType::Voxel
            | CellType::QuadraticHexahedron => 3,
        }
    }

    /// Number of points the topology requires, or `None` for variable-size cells.
    pub fn fixed_point_count(self) -> Option<usize> {
        match self {
            CellType::Vertex => Some(1),
            CellType::Line => Some(2),
            CellType::Triangle => Some(3),
            CellType::Quad | CellType::Pixel | CellType::Tetrahedron => Some(4),
            CellType::Pyramid => Some(5),
            CellType::Wedge => Some(6),
            CellType::Hexahedron | CellType::Voxel => Some(8),
            CellType::QuadraticHexahedron => Some(20),
            CellType::PolyVertex | CellType::Polygon => None,
        }
    }

    /// Smallest acceptable point count for variable-size cells.
    pub fn min_point_count(self) -> usize {
        match self {
            CellType::PolyVertex => 1,
            CellType::Polygon => 3,
            other => other.fixed_point_count().unwrap_or(1),
        }
    }

    /// Cells without extent; these are splatted, never rasterized.
    #[inline]
    pub fn is_point_like(self) -> bool {
        matches!(self, CellType::Vertex | CellType::PolyVertex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_and_counts() {
        assert_eq!(CellType::Voxel.dimension(), 3);
        assert_eq!(CellType::Pixel.dimension(), 2);
        assert_eq!(CellType::QuadraticHexahedron.fixed_point_count(), Some(20));
        assert_eq!(CellType::Polygon.fixed_point_count(), None);
        assert_eq!(CellType::Polygon.min_point_count(), 3);
        assert!(CellType::PolyVertex.is_point_like());
        assert!(!CellType::Line.is_point_like());
    }
}
