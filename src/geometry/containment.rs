//! Exact point-in-cell tests that also produce per-vertex interpolation weights.
//!
//! `tol` is relative: parametric coordinates may stray `tol` outside the
//! reference domain, and off-cell distances are accepted up to `tol` times
//! the cell's bounding-box diagonal.

use crate::geometry::bounds::Aabb;
use crate::geometry::shape::{
    cross, dot, invert_3x3, is_inside_reference, newell_normal, norm, physical_to_reference,
    shape_functions, sub,
};
use crate::mesh_error::MeshCompositeError;
use crate::topology::cell_type::CellType;

/// Tests whether `p` lies in the cell given by `vertices`.
///
/// On success `weights` holds one weight per cell vertex, in vertex order.
/// Degenerate cells are never reported as containing anything. Only a
/// vertex-count mismatch is an error.
pub fn evaluate_position(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    p: [f64; 3],
    tol: f64,
    weights: &mut Vec<f64>,
) -> Result<bool, MeshCompositeError> {
    weights.clear();
    check_count(cell_type, vertices.len())?;
    let diag = Aabb::from_points(vertices).diagonal();
    let dist_tol = tol * diag.max(f64::MIN_POSITIVE);
    let inside = match cell_type {
        CellType::Vertex => {
            weights.push(1.0);
            norm(sub(p, vertices[0])) <= dist_tol.max(tol)
        }
        CellType::PolyVertex => poly_vertex(vertices, p, tol, weights),
        CellType::Line => line(vertices, p, tol, dist_tol, weights),
        CellType::Triangle => triangle(vertices, p, tol, dist_tol, weights),
        CellType::Tetrahedron => tetrahedron(vertices, p, tol, weights),
        CellType::Voxel => {
            let (lo, hi) = (vertices[0], vertices[7]);
            axis_aligned(CellType::Voxel, lo, hi, p, tol, dist_tol, weights)?
        }
        CellType::Pixel => {
            let (lo, hi) = (vertices[0], vertices[3]);
            axis_aligned(CellType::Pixel, lo, hi, p, tol, dist_tol, weights)?
        }
        CellType::Polygon => polygon(vertices, p, tol, dist_tol, weights),
        CellType::Quad
        | CellType::Hexahedron
        | CellType::Wedge
        | CellType::Pyramid
        | CellType::QuadraticHexahedron => {
            return evaluate_parametric(cell_type, vertices, p, tol, weights);
        }
    };
    if !inside {
        weights.clear();
    }
    Ok(inside)
}

/// Newton-based test for any topology with shape functions.
///
/// Used directly for cells whose closed-form test assumes an orientation
/// the caller cannot guarantee (e.g. a rotated voxel).
pub fn evaluate_parametric(
    cell_type: CellType,
    vertices: &[[f64; 3]],
    p: [f64; 3],
    tol: f64,
    weights: &mut Vec<f64>,
) -> Result<bool, MeshCompositeError> {
    weights.clear();
    check_count(cell_type, vertices.len())?;
    let dist_tol = tol * Aabb::from_points(vertices).diagonal().max(f64::MIN_POSITIVE);
    let Ok(pp) = physical_to_reference(cell_type, vertices, p) else {
        return Ok(false);
    };
    if !is_inside_reference(cell_type, pp.r, tol) || pp.distance > dist_tol {
        return Ok(false);
    }
    let (w, _) = shape_functions(cell_type, pp.r)?;
    weights.extend(w);
    Ok(true)
}

fn check_count(cell_type: CellType, found: usize) -> Result<(), MeshCompositeError> {
    let ok = match cell_type.fixed_point_count() {
        Some(n) => n == found,
        None => found >= cell_type.min_point_count(),
    };
    if ok {
        Ok(())
    } else {
        Err(MeshCompositeError::CellPointCount {
            cell_type,
            expected: cell_type
                .fixed_point_count()
                .unwrap_or_else(|| cell_type.min_point_count()),
            found,
        })
    }
}

fn poly_vertex(vertices: &[[f64; 3]], p: [f64; 3], tol: f64, weights: &mut Vec<f64>) -> bool {
    let hit = vertices.iter().position(|v| norm(sub(p, *v)) <= tol);
    match hit {
        Some(i) => {
            weights.resize(vertices.len(), 0.0);
            weights[i] = 1.0;
            true
        }
        None => false,
    }
}

fn line(v: &[[f64; 3]], p: [f64; 3], tol: f64, dist_tol: f64, weights: &mut Vec<f64>) -> bool {
    let e = sub(v[1], v[0]);
    let len2 = dot(e, e);
    if len2 <= 0.0 {
        return false;
    }
    let t = dot(sub(p, v[0]), e) / len2;
    if t < -tol || t > 1.0 + tol {
        return false;
    }
    let t = t.clamp(0.0, 1.0);
    let closest = [v[0][0] + t * e[0], v[0][1] + t * e[1], v[0][2] + t * e[2]];
    if norm(sub(p, closest)) > dist_tol {
        return false;
    }
    weights.extend([1.0 - t, t]);
    true
}

fn triangle(v: &[[f64; 3]], p: [f64; 3], tol: f64, dist_tol: f64, weights: &mut Vec<f64>) -> bool {
    let e1 = sub(v[1], v[0]);
    let e2 = sub(v[2], v[0]);
    let n = cross(e1, e2);
    let n2 = dot(n, n);
    if n2 <= 0.0 {
        return false;
    }
    let w = sub(p, v[0]);
    if dot(w, n).abs() / n2.sqrt() > dist_tol {
        return false;
    }
    let s = dot(cross(w, e2), n) / n2;
    let t = dot(cross(e1, w), n) / n2;
    if !is_inside_reference(CellType::Triangle, [s, t, 0.0], tol) {
        return false;
    }
    weights.extend([1.0 - s - t, s, t]);
    true
}

fn tetrahedron(v: &[[f64; 3]], p: [f64; 3], tol: f64, weights: &mut Vec<f64>) -> bool {
    let e1 = sub(v[1], v[0]);
    let e2 = sub(v[2], v[0]);
    let e3 = sub(v[3], v[0]);
    let m = [
        e1[0], e2[0], e3[0], e1[1], e2[1], e3[1], e1[2], e2[2], e3[2],
    ];
    let Ok(inv) = invert_3x3(m) else {
        return false;
    };
    let w = sub(p, v[0]);
    let r = [
        inv[0] * w[0] + inv[1] * w[1] + inv[2] * w[2],
        inv[3] * w[0] + inv[4] * w[1] + inv[5] * w[2],
        inv[6] * w[0] + inv[7] * w[1] + inv[8] * w[2],
    ];
    if !is_inside_reference(CellType::Tetrahedron, r, tol) {
        return false;
    }
    weights.extend([1.0 - r[0] - r[1] - r[2], r[0], r[1], r[2]]);
    true
}

/// Voxel or pixel spanned by the corners `lo` and `hi`.
fn axis_aligned(
    cell_type: CellType,
    lo: [f64; 3],
    hi: [f64; 3],
    p: [f64; 3],
    tol: f64,
    dist_tol: f64,
    weights: &mut Vec<f64>,
) -> Result<bool, MeshCompositeError> {
    let mut r = [0.0; 3];
    let mut slot = 0;
    for a in 0..3 {
        let ext = hi[a] - lo[a];
        if ext == 0.0 {
            // the flat axis of a pixel
            if cell_type == CellType::Voxel || (p[a] - lo[a]).abs() > dist_tol {
                return Ok(false);
            }
            continue;
        }
        if slot == 3 {
            return Ok(false);
        }
        r[slot] = (p[a] - lo[a]) / ext;
        slot += 1;
    }
    if slot != cell_type.dimension() as usize || !is_inside_reference(cell_type, r, tol) {
        return Ok(false);
    }
    let (w, _) = shape_functions(cell_type, r)?;
    weights.extend(w);
    Ok(true)
}

fn polygon(v: &[[f64; 3]], p: [f64; 3], tol: f64, dist_tol: f64, weights: &mut Vec<f64>) -> bool {
    let n = newell_normal(v);
    let nn = norm(n);
    if nn <= 0.0 {
        return false;
    }
    if dot(sub(p, v[0]), n).abs() / nn > dist_tol {
        return false;
    }
    // drop the dominant normal axis and work in 2-D
    let drop = (0..3)
        .max_by(|a, b| n[*a].abs().total_cmp(&n[*b].abs()))
        .unwrap_or(2);
    let (ax, ay) = ((drop + 1) % 3, (drop + 2) % 3);
    let q: Vec<[f64; 2]> = v.iter().map(|x| [x[ax] - p[ax], x[ay] - p[ay]]).collect();
    let k = q.len();

    for i in 0..k {
        let a = q[i];
        let b = q[(i + 1) % k];
        let la = (a[0] * a[0] + a[1] * a[1]).sqrt();
        if la <= dist_tol {
            weights.resize(k, 0.0);
            weights[i] = 1.0;
            return true;
        }
        // on the edge a-b: linear weights along it
        let e = [b[0] - a[0], b[1] - a[1]];
        let le2 = e[0] * e[0] + e[1] * e[1];
        if le2 > 0.0 {
            let t = -(a[0] * e[0] + a[1] * e[1]) / le2;
            let cx = a[0] + t * e[0];
            let cy = a[1] + t * e[1];
            if (-tol..=1.0 + tol).contains(&t) && (cx * cx + cy * cy).sqrt() <= dist_tol {
                let t = t.clamp(0.0, 1.0);
                weights.resize(k, 0.0);
                weights[i] += 1.0 - t;
                weights[(i + 1) % k] += t;
                return true;
            }
        }
    }

    if winding_number(&q) == 0 {
        return false;
    }
    mean_value_weights(&q, weights);
    true
}

/// Winding number of the origin with respect to the closed 2-D loop `q`.
fn winding_number(q: &[[f64; 2]]) -> i32 {
    let mut wn = 0;
    for i in 0..q.len() {
        let a = q[i];
        let b = q[(i + 1) % q.len()];
        let side = a[0] * b[1] - a[1] * b[0];
        if a[1] <= 0.0 {
            if b[1] > 0.0 && side > 0.0 {
                wn += 1;
            }
        } else if b[1] <= 0.0 && side < 0.0 {
            wn -= 1;
        }
    }
    wn
}

/// Mean value coordinates of the origin inside the polygon `q`.
fn mean_value_weights(q: &[[f64; 2]], weights: &mut Vec<f64>) {
    let k = q.len();
    let len: Vec<f64> = q.iter().map(|a| (a[0] * a[0] + a[1] * a[1]).sqrt()).collect();
    // tan(alpha_i / 2) for the angle between q[i] and q[i+1]
    let half_tan: Vec<f64> = (0..k)
        .map(|i| {
            let a = q[i];
            let b = q[(i + 1) % k];
            let cr = a[0] * b[1] - a[1] * b[0];
            let dt = a[0] * b[0] + a[1] * b[1];
            let denom = len[i] * len[(i + 1) % k] + dt;
            if denom.abs() <= f64::EPSILON { 0.0 } else { cr / denom }
        })
        .collect();
    weights.clear();
    let mut total = 0.0;
    for i in 0..k {
        let prev = half_tan[(i + k - 1) % k];
        let w = (prev + half_tan[i]) / len[i];
        total += w;
        weights.push(w);
    }
    if total.abs() > 0.0 {
        for w in weights.iter_mut() {
            *w /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-9;

    fn sum(w: &[f64]) -> f64 {
        w.iter().sum()
    }

    #[test]
    fn tetrahedron_barycentric() {
        let tet = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let mut w = Vec::new();
        assert!(evaluate_position(CellType::Tetrahedron, &tet, [0.1, 0.2, 0.3], TOL, &mut w).unwrap());
        assert!((w[0] - 0.4).abs() < 1e-12 && (w[3] - 0.3).abs() < 1e-12);
        assert!(!evaluate_position(CellType::Tetrahedron, &tet, [0.5, 0.5, 0.5], TOL, &mut w).unwrap());
        assert!(w.is_empty());
    }

    #[test]
    fn pixel_in_xz_plane() {
        let pixel = [
            [0.0, 2.0, 0.0],
            [1.0, 2.0, 0.0],
            [0.0, 2.0, 1.0],
            [1.0, 2.0, 1.0],
        ];
        let mut w = Vec::new();
        assert!(evaluate_position(CellType::Pixel, &pixel, [0.25, 2.0, 0.5], TOL, &mut w).unwrap());
        assert_eq!(w.len(), 4);
        assert!((sum(&w) - 1.0).abs() < 1e-12);
        assert!((w[0] - 0.375).abs() < 1e-12);
        assert!(!evaluate_position(CellType::Pixel, &pixel, [0.25, 2.5, 0.5], TOL, &mut w).unwrap());
    }

    #[test]
    fn concave_polygon() {
        // L-shape
        let poly = [
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, 2.0, 0.0],
            [0.0, 2.0, 0.0],
        ];
        let mut w = Vec::new();
        assert!(evaluate_position(CellType::Polygon, &poly, [0.5, 1.5, 0.0], TOL, &mut w).unwrap());
        assert!((sum(&w) - 1.0).abs() < 1e-12);
        let mut x = [0.0; 3];
        for (wi, v) in w.iter().zip(&poly) {
            for a in 0..3 {
                x[a] += wi * v[a];
            }
        }
        assert!((x[0] - 0.5).abs() < 1e-9 && (x[1] - 1.5).abs() < 1e-9);
        assert!(!evaluate_position(CellType::Polygon, &poly, [1.5, 1.5, 0.0], TOL, &mut w).unwrap());
    }

    #[test]
    fn degenerate_hex_is_never_inside() {
        let flat = [[0.0; 3]; 8];
        let mut w = Vec::new();
        assert!(!evaluate_position(CellType::Hexahedron, &flat, [0.0; 3], TOL, &mut w).unwrap());
    }

    #[test]
    fn wrong_vertex_count_errors() {
        let mut w = Vec::new();
        let err = evaluate_position(CellType::Triangle, &[[0.0; 3]; 2], [0.0; 3], TOL, &mut w);
        assert!(matches!(err, Err(MeshCompositeError::CellPointCount { .. })));
    }
}
