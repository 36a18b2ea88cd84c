//! Shape functions and reference/physical mappings for cell topologies.
//!
//! Reference domains:
//! - Line: `r ∈ [0, 1]`.
//! - Triangle: `(r, s)` in the unit right triangle.
//! - Quad, Pixel: `(r, s) ∈ [0, 1]^2`.
//! - Tetrahedron: `(r, s, t)` in the unit tetrahedron.
//! - Hexahedron, Voxel, QuadraticHexahedron: `(r, s, t) ∈ [0, 1]^3`.
//! - Wedge: `(r, s)` in the unit triangle and `t ∈ [0, 1]`.
//! - Pyramid: `(r, s) ∈ [0, 1]^2` and apex at `t = 1`.
//!
//! Reference points are always passed as `[f64; 3]`; components beyond the
//! cell dimension are ignored.

use crate::mesh_error::MeshCompositeError;
use crate::topology::cell_type::CellType;

const EPS: f64 = 1e-14;
const NEWTON_MAX_ITERS: usize = 30;
const NEWTON_STEP_TOL: f64 = 1e-13;

/// Result of inverting the reference mapping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParametricPoint {
    /// Reference coordinates.
    pub r: [f64; 3],
    /// Distance between the query and the mapped reference point.
    pub distance: f64,
}

/// Shape function values and reference gradients at `r`.
pub fn shape_functions(
    cell_type: CellType,
    r: [f64; 3],
) -> Result<(Vec<f64>, Vec<[f64; 3]>), MeshCompositeError> {
    let [r0, s, t] = r;
    match cell_type {
        CellType::Vertex => Ok((vec![1.0], vec![[0.0; 3]])),
        CellType::Line => Ok((vec![1.0 - r0, r0], vec![[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]])),
        CellType::Triangle => Ok((
            vec![1.0 - r0 - s, r0, s],
            vec![[-1.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        )),
        CellType::Quad => {
            let weights = vec![
                (1.0 - r0) * (1.0 - s),
                r0 * (1.0 - s),
                r0 * s,
                (1.0 - r0) * s,
            ];
            let grads = vec![
                [-(1.0 - s), -(1.0 - r0), 0.0],
                [1.0 - s, -r0, 0.0],
                [s, r0, 0.0],
                [-s, 1.0 - r0, 0.0],
            ];
            Ok((weights, grads))
        }
        CellType::Pixel => {
            let weights = vec![
                (1.0 - r0) * (1.0 - s),
                r0 * (1.0 - s),
                (1.0 - r0) * s,
                r0 * s,
            ];
            let grads = vec![
                [-(1.0 - s), -(1.0 - r0), 0.0],
                [1.0 - s, -r0, 0.0],
                [-s, 1.0 - r0, 0.0],
                [s, r0, 0.0],
            ];
            Ok((weights, grads))
        }
        CellType::Tetrahedron => Ok((
            vec![1.0 - r0 - s - t, r0, s, t],
            vec![
                [-1.0, -1.0, -1.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
        )),
        CellType::Hexahedron => {
            let (rm, sm, tm) = (1.0 - r0, 1.0 - s, 1.0 - t);
            let weights = vec![
                rm * sm * tm,
                r0 * sm * tm,
                r0 * s * tm,
                rm * s * tm,
                rm * sm * t,
                r0 * sm * t,
                r0 * s * t,
                rm * s * t,
            ];
            let grads = vec![
                [-sm * tm, -rm * tm, -rm * sm],
                [sm * tm, -r0 * tm, -r0 * sm],
                [s * tm, r0 * tm, -r0 * s],
                [-s * tm, rm * tm, -rm * s],
                [-sm * t, -rm * t, rm * sm],
                [sm * t, -r0 * t, r0 * sm],
                [s * t, r0 * t, r0 * s],
                [-s * t, rm * t, rm * s],
            ];
            Ok((weights, grads))
        }
        CellType::Voxel => {
            let mut weights = Vec::with_capacity(8);
            let mut grads = Vec::with_capacity(8);
            for n in 0..8 {
                let (bi, bj, bk) = (n & 1, (n >> 1) & 1, (n >> 2) & 1);
                let fx = if bi == 1 { r0 } else { 1.0 - r0 };
                let fy = if bj == 1 { s } else { 1.0 - s };
                let fz = if bk == 1 { t } else { 1.0 - t };
                let dx = if bi == 1 { 1.0 } else { -1.0 };
                let dy = if bj == 1 { 1.0 } else { -1.0 };
                let dz = if bk == 1 { 1.0 } else { -1.0 };
                weights.push(fx * fy * fz);
                grads.push([dx * fy * fz, fx * dy * fz, fx * fy * dz]);
            }
            Ok((weights, grads))
        }
        CellType::Wedge => {
            let rm = 1.0 - r0 - s;
            let tm = 1.0 - t;
            let weights = vec![rm * tm, r0 * tm, s * tm, rm * t, r0 * t, s * t];
            let grads = vec![
                [-tm, -tm, -rm],
                [tm, 0.0, -r0],
                [0.0, tm, -s],
                [-t, -t, rm],
                [t, 0.0, r0],
                [0.0, t, s],
            ];
            Ok((weights, grads))
        }
        CellType::Pyramid => {
            let (rm, sm, tm) = (1.0 - r0, 1.0 - s, 1.0 - t);
            let weights = vec![tm * rm * sm, tm * r0 * sm, tm * r0 * s, tm * rm * s, t];
            let grads = vec![
                [-tm * sm, -tm * rm, -rm * sm],
                [tm * sm, -tm * r0, -r0 * sm],
                [tm * s, tm * r0, -r0 * s],
                [-tm * s, tm * rm, -rm * s],
                [0.0, 0.0, 1.0],
            ];
            Ok((weights, grads))
        }
        CellType::QuadraticHexahedron => Ok(serendipity_hex(r)),
        CellType::PolyVertex | CellType::Polygon => {
            Err(MeshCompositeError::UnsupportedCellType {
                cell_type,
                context: "shape functions",
            })
        }
    }
}

/// Node signs of the 20-node hexahedron in `[-1, 1]^3`.
const SERENDIPITY_NODES: [[i8; 3]; 20] = [
    [-1, -1, -1],
    [1, -1, -1],
    [1, 1, -1],
    [-1, 1, -1],
    [-1, -1, 1],
    [1, -1, 1],
    [1, 1, 1],
    [-1, 1, 1],
    [0, -1, -1],
    [1, 0, -1],
    [0, 1, -1],
    [-1, 0, -1],
    [0, -1, 1],
    [1, 0, 1],
    [0, 1, 1],
    [-1, 0, 1],
    [-1, -1, 0],
    [1, -1, 0],
    [1, 1, 0],
    [-1, 1, 0],
];

fn serendipity_hex(r: [f64; 3]) -> (Vec<f64>, Vec<[f64; 3]>) {
    let x = [2.0 * r[0] - 1.0, 2.0 * r[1] - 1.0, 2.0 * r[2] - 1.0];
    let mut weights = Vec::with_capacity(20);
    let mut grads = Vec::with_capacity(20);
    for node in SERENDIPITY_NODES {
        let s = [node[0] as f64, node[1] as f64, node[2] as f64];
        let lin = [1.0 + x[0] * s[0], 1.0 + x[1] * s[1], 1.0 + x[2] * s[2]];
        let mut g = [0.0; 3];
        let w;
        if let Some(a) = node.iter().position(|c| *c == 0) {
            // mid-edge node; `a` is the edge direction
            let (b, c) = ((a + 1) % 3, (a + 2) % 3);
            let bubble = 1.0 - x[a] * x[a];
            w = 0.25 * bubble * lin[b] * lin[c];
            g[a] = -0.5 * x[a] * lin[b] * lin[c];
            g[b] = 0.25 * bubble * s[b] * lin[c];
            g[c] = 0.25 * bubble * lin[b] * s[c];
        } else {
            let sum = x[0] * s[0] + x[1] * s[1] + x[2] * s[2];
            w = 0.125 * lin[0] * lin[1] * lin[2] * (sum - 2.0);
            for a in 0..3 {
                let (b, c) = ((a + 1) % 3, (a + 2) % 3);
                g[a] = 0.125 * s[a] * lin[b] * lin[c] * (sum - 2.0 + lin[a]);
            }
        }
        weights.push(w);
        // d/dr = 2 d/dx
        grads.push([2.0 * g[0], 2.0 * g[1], 2.0 * g[2]]);
    }
    (weights, grads)
}

/// Centre of the reference domain, used as the Newton starting point.
pub fn parametric_center(cell_type: CellType) -> [f64; 3] {
    match cell_type {
        CellType::Triangle => [1.0 / 3.0, 1.0 / 3.0, 0.0],
        CellType::Tetrahedron => [0.25, 0.25, 0.25],
        CellType::Wedge => [1.0 / 3.0, 1.0 / 3.0, 0.5],
        CellType::Pyramid => [0.5, 0.5, 0.2],
        CellType::Line => [0.5, 0.0, 0.0],
        CellType::Quad | CellType::Pixel => [0.5, 0.5, 0.0],
        _ => [0.5, 0.5, 0.5],
    }
}

/// Reference-domain membership with tolerance `tol`.
pub fn is_inside_reference(cell_type: CellType, r: [f64; 3], tol: f64) -> bool {
    let unit = |v: f64| v >= -tol && v <= 1.0 + tol;
    match cell_type {
        CellType::Vertex => true,
        CellType::Line => unit(r[0]),
        CellType::Triangle => r[0] >= -tol && r[1] >= -tol && r[0] + r[1] <= 1.0 + tol,
        CellType::Quad | CellType::Pixel => unit(r[0]) && unit(r[1]),
        CellType::Tetrahedron => {
            r[0] >= -tol && r[1] >= -tol && r[2] >= -tol && r[0] + r[1] + r[2] <= 1.0 + tol
        }
        CellType::Wedge => {
            r[0] >= -tol && r[1] >= -tol && r[0] + r[1] <= 1.0 + tol && unit(r[2])
        }
        CellType::Hexahedron
        | CellType::Voxel
        | CellType::QuadraticHexahedron
        | CellType::Pyramid => unit(r[0]) && unit(r[1]) && unit(r[2]),
        CellType::PolyVertex | CellType::Polygon => false,
    }
}

/// Map a reference point to physical coordinates.
pub fn reference_to_physical(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    r: [f64; 3],
) -> Result<[f64; 3], MeshCompositeError> {
    let (weights, _) = shape_functions(cell_type, r)?;
    check_vertex_count(weights.len(), vertices.len())?;
    let mut out = [0.0; 3];
    for (w, v) in weights.iter().zip(vertices) {
        out[0] += w * v[0];
        out[1] += w * v[1];
        out[2] += w * v[2];
    }
    Ok(out)
}

/// Jacobian columns `∂x/∂r_i`, one per reference dimension.
pub fn jacobian_columns(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    r: [f64; 3],
) -> Result<Vec<[f64; 3]>, MeshCompositeError> {
    let (_, grads) = shape_functions(cell_type, r)?;
    check_vertex_count(grads.len(), vertices.len())?;
    let dim = cell_type.dimension() as usize;
    let mut cols = vec![[0.0; 3]; dim];
    for (v, g) in vertices.iter().zip(&grads) {
        for (d, col) in cols.iter_mut().enumerate() {
            col[0] += v[0] * g[d];
            col[1] += v[1] * g[d];
            col[2] += v[2] * g[d];
        }
    }
    Ok(cols)
}

/// Least-squares solve of `J x = v` via the normal equations.
fn pull_back(cols: &[[f64; 3]], v: [f64; 3]) -> Result<[f64; 3], MeshCompositeError> {
    match cols.len() {
        1 => {
            let denom = dot(cols[0], cols[0]);
            if denom.abs() <= EPS {
                return Err(degenerate());
            }
            Ok([dot(cols[0], v) / denom, 0.0, 0.0])
        }
        2 => {
            let a = dot(cols[0], cols[0]);
            let b = dot(cols[0], cols[1]);
            let c = dot(cols[1], cols[1]);
            let det = a * c - b * b;
            if det.abs() <= EPS * a.max(c).max(1.0) {
                return Err(degenerate());
            }
            let rhs0 = dot(cols[0], v);
            let rhs1 = dot(cols[1], v);
            Ok([(c * rhs0 - b * rhs1) / det, (a * rhs1 - b * rhs0) / det, 0.0])
        }
        3 => {
            // square system: solve J x = v directly
            let m = [
                cols[0][0], cols[1][0], cols[2][0], cols[0][1], cols[1][1], cols[2][1],
                cols[0][2], cols[1][2], cols[2][2],
            ];
            let inv = invert_3x3(m)?;
            Ok([
                inv[0] * v[0] + inv[1] * v[1] + inv[2] * v[2],
                inv[3] * v[0] + inv[4] * v[1] + inv[5] * v[2],
                inv[6] * v[0] + inv[7] * v[1] + inv[8] * v[2],
            ])
        }
        dim => Err(MeshCompositeError::InvalidGeometry(format!(
            "unsupported reference dimension: {dim}"
        ))),
    }
}

/// Map a physical point back to reference coordinates using Newton iteration.
///
/// For surface and line cells embedded in 3-D the solve is least-squares, so
/// the returned `distance` is the off-cell distance of the query.
pub fn physical_to_reference(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    p: [f64; 3],
) -> Result<ParametricPoint, MeshCompositeError> {
    let dim = cell_type.dimension() as usize;
    if dim == 0 {
        let v = vertices.first().ok_or_else(degenerate)?;
        return Ok(ParametricPoint {
            r: [0.0; 3],
            distance: norm(sub(*v, p)),
        });
    }
    let mut r = parametric_center(cell_type);
    for _ in 0..NEWTON_MAX_ITERS {
        let mapped = reference_to_physical(cell_type, vertices, r)?;
        let residual = sub(mapped, p);
        let cols = jacobian_columns(cell_type, vertices, r)?;
        let step = pull_back(&cols, residual)?;
        for d in 0..dim {
            r[d] -= step[d];
        }
        if step.iter().take(dim).all(|s| s.abs() <= NEWTON_STEP_TOL) {
            break;
        }
    }
    let mapped = reference_to_physical(cell_type, vertices, r)?;
    Ok(ParametricPoint {
        r,
        distance: norm(sub(mapped, p)),
    })
}

/// Length, area, or volume of a cell (unsigned). Used to detect degenerate cells.
pub fn cell_measure(cell_type: CellType, vertices: &[[f64; 3]]) -> Result<f64, MeshCompositeError> {
    if let Some(expected) = cell_type.fixed_point_count() {
        check_vertex_count(expected, vertices.len())?;
    }
    let v = vertices;
    Ok(match cell_type {
        CellType::Vertex | CellType::PolyVertex => 0.0,
        CellType::Line => norm(sub(v[1], v[0])),
        CellType::Triangle => 0.5 * norm(cross(sub(v[1], v[0]), sub(v[2], v[0]))),
        CellType::Quad => {
            0.5 * norm(cross(sub(v[1], v[0]), sub(v[2], v[0])))
                + 0.5 * norm(cross(sub(v[2], v[0]), sub(v[3], v[0])))
        }
        CellType::Pixel => {
            0.5 * norm(cross(sub(v[1], v[0]), sub(v[3], v[0])))
                + 0.5 * norm(cross(sub(v[3], v[0]), sub(v[2], v[0])))
        }
        CellType::Polygon => norm(newell_normal(v)) * 0.5,
        CellType::Tetrahedron => signed_volume(v[0], v[1], v[2], v[3]).abs(),
        CellType::Hexahedron | CellType::QuadraticHexahedron => hex_volume(&v[..8]).abs(),
        CellType::Voxel => {
            let e = sub(v[7], v[0]);
            (e[0] * e[1] * e[2]).abs()
        }
        CellType::Wedge => {
            (signed_volume(v[0], v[1], v[2], v[3])
                + signed_volume(v[1], v[4], v[2], v[3])
                + signed_volume(v[2], v[4], v[5], v[3]))
            .abs()
        }
        CellType::Pyramid => {
            (signed_volume(v[0], v[1], v[2], v[4]) + signed_volume(v[0], v[2], v[3], v[4])).abs()
        }
    })
}

fn hex_volume(v: &[[f64; 3]]) -> f64 {
    signed_volume(v[0], v[1], v[3], v[4])
        + signed_volume(v[1], v[2], v[3], v[6])
        + signed_volume(v[1], v[3], v[4], v[6])
        + signed_volume(v[1], v[4], v[5], v[6])
        + signed_volume(v[3], v[4], v[6], v[7])
}

pub(crate) fn signed_volume(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    dot(sub(b, a), cross(sub(c, a), sub(d, a))) / 6.0
}

/// Newell's polygon normal (twice the area vector).
pub(crate) fn newell_normal(v: &[[f64; 3]]) -> [f64; 3] {
    let mut n = [0.0; 3];
    for i in 0..v.len() {
        let a = v[i];
        let b = v[(i + 1) % v.len()];
        n[0] += (a[1] - b[1]) * (a[2] + b[2]);
        n[1] += (a[2] - b[2]) * (a[0] + b[0]);
        n[2] += (a[0] - b[0]) * (a[1] + b[1]);
    }
    n
}

fn check_vertex_count(expected: usize, found: usize) -> Result<(), MeshCompositeError> {
    if expected != found {
        return Err(MeshCompositeError::InvalidGeometry(format!(
            "vertex count mismatch: expected {expected}, got {found}"
        )));
    }
    Ok(())
}

fn degenerate() -> MeshCompositeError {
    MeshCompositeError::InvalidGeometry("degenerate jacobian".into())
}

pub(crate) fn invert_3x3(m: [f64; 9]) -> Result<[f64; 9], MeshCompositeError> {
    let det = m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
        + m[2] * (m[3] * m[7] - m[4] * m[6]);
    let scale = m.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if det.abs() <= EPS * scale.powi(3).max(EPS) {
        return Err(degenerate());
    }
    let inv_det = 1.0 / det;
    Ok([
        (m[4] * m[8] - m[5] * m[7]) * inv_det,
        (m[2] * m[7] - m[1] * m[8]) * inv_det,
        (m[1] * m[5] - m[2] * m[4]) * inv_det,
        (m[5] * m[6] - m[3] * m[8]) * inv_det,
        (m[0] * m[8] - m[2] * m[6]) * inv_det,
        (m[2] * m[3] - m[0] * m[5]) * inv_det,
        (m[3] * m[7] - m[4] * m[6]) * inv_det,
        (m[1] * m[6] - m[0] * m[7]) * inv_det,
        (m[0] * m[4] - m[1] * m[3]) * inv_det,
    ])
}

#[inline]
pub(crate) fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub(crate) fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub(crate) fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
pub(crate) fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    const UNIT_HEX: [[f64; 3]; 8] = [
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [1.0, 1.0, 1.0],
        [0.0, 1.0, 1.0],
    ];

    fn quadratic_unit_hex() -> Vec<[f64; 3]> {
        SERENDIPITY_NODES
            .iter()
            .map(|n| {
                [
                    0.5 * (n[0] as f64 + 1.0),
                    0.5 * (n[1] as f64 + 1.0),
                    0.5 * (n[2] as f64 + 1.0),
                ]
            })
            .collect()
    }

    #[test]
    fn partition_of_unity() {
        let r = [0.2, 0.3, 0.4];
        for ct in [
            CellType::Line,
            CellType::Triangle,
            CellType::Quad,
            CellType::Pixel,
            CellType::Tetrahedron,
            CellType::Hexahedron,
            CellType::Voxel,
            CellType::Wedge,
            CellType::Pyramid,
            CellType::QuadraticHexahedron,
        ] {
            let (w, g) = shape_functions(ct, r).unwrap();
            assert!(approx(w.iter().sum::<f64>(), 1.0), "{ct:?}");
            for d in 0..3 {
                assert!(approx(g.iter().map(|gi| gi[d]).sum::<f64>(), 0.0), "{ct:?}");
            }
        }
    }

    #[test]
    fn serendipity_interpolates_nodes() {
        let nodes = quadratic_unit_hex();
        for (i, n) in nodes.iter().enumerate() {
            let (w, _) = shape_functions(CellType::QuadraticHexahedron, *n).unwrap();
            for (j, wj) in w.iter().enumerate() {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert!(approx(*wj, expect), "node {i} weight {j} = {wj}");
            }
        }
    }

    #[test]
    fn hex_inverse_mapping() {
        let p = physical_to_reference(CellType::Hexahedron, &UNIT_HEX, [0.25, 0.5, 0.75]).unwrap();
        assert!(approx(p.r[0], 0.25) && approx(p.r[1], 0.5) && approx(p.r[2], 0.75));
        assert!(p.distance < 1e-10);
    }

    #[test]
    fn quadratic_hex_inverse_mapping() {
        let nodes = quadratic_unit_hex();
        let p =
            physical_to_reference(CellType::QuadraticHexahedron, &nodes, [0.1, 0.8, 0.3]).unwrap();
        assert!(approx(p.r[0], 0.1) && approx(p.r[1], 0.8) && approx(p.r[2], 0.3));
    }

    #[test]
    fn quad_off_plane_distance() {
        let quad = [
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 2.0, 0.0],
            [0.0, 2.0, 0.0],
        ];
        let p = physical_to_reference(CellType::Quad, &quad, [1.0, 0.5, 0.25]).unwrap();
        assert!(approx(p.r[0], 0.5) && approx(p.r[1], 0.25));
        assert!(approx(p.distance, 0.25));
    }

    #[test]
    fn measures() {
        assert!(approx(cell_measure(CellType::Hexahedron, &UNIT_HEX).unwrap(), 1.0));
        let tet = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        assert!(approx(cell_measure(CellType::Tetrahedron, &tet).unwrap(), 1.0 / 6.0));
        let flat = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ];
        assert!(approx(cell_measure(CellType::Tetrahedron, &flat).unwrap(), 0.0));
    }
}
