#![allow(dead_code)]
use mesh_composite::{
    algs::{communicator::RayonComm, context::ParallelContext},
    data::{
        field::{Centering, FieldArray},
        mesh_chunk::MeshChunk,
        structured::StructuredBlock,
    },
    topology::cell_type::CellType,
};

/// Runs `f` on `n` in-process ranks (one thread each) and returns the
/// per-rank results in rank order.
pub fn run_ranks<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(&ParallelContext<'_, RayonComm>) -> T + Sync,
{
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..n)
            .map(|r| {
                let f = &f;
                s.spawn(move || {
                    let comm = RayonComm::new(r, n);
                    let ctx = ParallelContext::new(&comm);
                    f(&ctx)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
}

/// Structured blocks cut from one lattice of `nb` blocks per axis, each with
/// `dims` nodes. Node coordinates are global lattice index × `h`, so shared
/// faces are bit-identical. Block at lattice position `b` gets domain id
/// `ids[linear(b)]`. Every block carries a zone field `owner` = its id and
/// a node field `x` = its x coordinate.
pub fn lattice_blocks(
    nb: [usize; 3],
    dims: [usize; 3],
    h: f64,
    ids: &[usize],
) -> Vec<StructuredBlock> {
    let mut out = Vec::new();
    for bk in 0..nb[2] {
        for bj in 0..nb[1] {
            for bi in 0..nb[0] {
                let b = [bi, bj, bk];
                let id = ids[bi + nb[0] * (bj + nb[1] * bk)];
                let mut pts = Vec::new();
                for k in 0..dims[2] {
                    for j in 0..dims[1] {
                        for i in 0..dims[0] {
                            let g = [i, j, k];
                            let c: [f64; 3] = std::array::from_fn(|a| {
                                (b[a] * dims[a].saturating_sub(1) + g[a]) as f64 * h
                            });
                            pts.push(c);
                        }
                    }
                }
                let xs: Vec<f64> = pts.iter().map(|p| p[0]).collect();
                let mut blk = StructuredBlock::try_new(id, dims, pts).unwrap();
                let n_cells = blk.n_cells();
                blk.add_field(FieldArray::scalar("owner", Centering::Zone, vec![id as f64; n_cells]).unwrap())
                    .unwrap();
                blk.add_field(FieldArray::scalar("x", Centering::Node, xs).unwrap())
                    .unwrap();
                out.push(blk);
            }
        }
    }
    out
}

/// `n × n × n` unit-cube lattice split into hexahedra (or tetrahedra),
/// with a node field `f = x + 2y + 3z`.
pub fn cube_chunk(n: usize, tets: bool) -> MeshChunk {
    let np = n + 1;
    let mut pts = Vec::new();
    for k in 0..np {
        for j in 0..np {
            for i in 0..np {
                pts.push([i as f64 / n as f64, j as f64 / n as f64, k as f64 / n as f64]);
            }
        }
    }
    let id = |i: usize, j: usize, k: usize| i + np * (j + np * k);
    let f: Vec<f64> = pts.iter().map(|p| p[0] + 2.0 * p[1] + 3.0 * p[2]).collect();
    let mut chunk = MeshChunk::new(pts);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                let v = [
                    id(i, j, k),
                    id(i + 1, j, k),
                    id(i + 1, j + 1, k),
                    id(i, j + 1, k),
                    id(i, j, k + 1),
                    id(i + 1, j, k + 1),
                    id(i + 1, j + 1, k + 1),
                    id(i, j + 1, k + 1),
                ];
                if tets {
                    // six tetrahedra around the 0-6 diagonal
                    for t in [
                        [0, 1, 2, 6],
                        [0, 2, 3, 6],
                        [0, 3, 7, 6],
                        [0, 7, 4, 6],
                        [0, 4, 5, 6],
                        [0, 5, 1, 6],
                    ] {
                        chunk
                            .try_add_cell(CellType::Tetrahedron, &t.map(|c| v[c]))
                            .unwrap();
                    }
                } else {
                    chunk.try_add_cell(CellType::Hexahedron, &v).unwrap();
                }
            }
        }
    }
    chunk
        .add_field(FieldArray::scalar("f", Centering::Node, f).unwrap())
        .unwrap();
    chunk
}

/// Copy of `chunk` keeping only the cells with `cell % n == r`; points and
/// fields stay whole, so node fields keep their length.
pub fn round_robin_cells(chunk: &MeshChunk, n: usize, r: usize) -> MeshChunk {
    let mut out = MeshChunk::new(chunk.points().to_vec());
    for cell in chunk.cells().filter(|c| c % n == r) {
        out.try_add_cell(chunk.cell_type(cell), chunk.cell_points(cell))
            .unwrap();
    }
    for f in chunk.fields() {
        if f.centering() == Centering::Node {
            out.add_field(f.clone()).unwrap();
        }
    }
    out
}

/// Linear field sampled by most tests.
pub fn linear_f(p: &[f64; 3]) -> f64 {
    p[0] + 2.0 * p[1] + 3.0 * p[2]
}

/// One-cell chunk over `verts` carrying the node field `f = x + 2y + 3z`.
pub fn single_cell(cell_type: CellType, verts: &[[f64; 3]]) -> MeshChunk {
    let f: Vec<f64> = verts.iter().map(linear_f).collect();
    let mut chunk = MeshChunk::new(verts.to_vec());
    let ids: Vec<usize> = (0..verts.len()).collect();
    chunk.try_add_cell(cell_type, &ids).unwrap();
    chunk
        .add_field(FieldArray::scalar("f", Centering::Node, f).unwrap())
        .unwrap();
    chunk
}

/// 20 nodes of the quadratic hexahedron spanning `[lo, hi]`: corners, then
/// bottom, top and vertical edge midpoints.
pub fn quadratic_hex_nodes(lo: [f64; 3], hi: [f64; 3]) -> Vec<[f64; 3]> {
    const CORNERS: [[usize; 3]; 8] = [
        [0, 0, 0],
        [1, 0, 0],
        [1, 1, 0],
        [0, 1, 0],
        [0, 0, 1],
        [1, 0, 1],
        [1, 1, 1],
        [0, 1, 1],
    ];
    const EDGES: [(usize, usize); 12] = [
        (0, 1),
        (1, 2),
        (2, 3),
        (3, 0),
        (4, 5),
        (5, 6),
        (6, 7),
        (7, 4),
        (0, 4),
        (1, 5),
        (2, 6),
        (3, 7),
    ];
    let at = |c: [usize; 3]| -> [f64; 3] {
        std::array::from_fn(|d| if c[d] == 0 { lo[d] } else { hi[d] })
    };
    let mut nodes: Vec<[f64; 3]> = CORNERS.iter().map(|c| at(*c)).collect();
    for (a, b) in EDGES {
        let (pa, pb) = (nodes[a], nodes[b]);
        nodes.push(std::array::from_fn(|d| 0.5 * (pa[d] + pb[d])));
    }
    nodes
}
