mod util;
use util::*;

use mesh_composite::data::field::{Centering, FieldArray};
use mesh_composite::data::mesh_chunk::MeshChunk;
use mesh_composite::data::sample_buffer::SampleBuffer;
use mesh_composite::extract::kernel::splat_radius;
use mesh_composite::extract::{
    ExtractionMode, ExtractorConfig, RestrictionWindow, SampleExtractor, SampleGrid,
    ViewParameters, ViewTransform,
};
use mesh_composite::geometry::bounds::Aabb;
use mesh_composite::mesh_error::MeshCompositeError;
use mesh_composite::topology::cell_type::CellType;
use proptest::prelude::*;

fn unit_view(n: usize) -> ViewParameters {
    let grid = SampleGrid::try_new(n, n, n, Aabb::new([0.0; 3], [1.0; 3])).unwrap();
    ViewParameters::new(ViewTransform::identity(), grid)
}

proptest! {
    #[test]
    fn kernel_never_writes_beyond_radius(
        pts in prop::collection::vec((0.0f64..8.0, 0.0f64..8.0, 0.0f64..8.0), 1..6),
    ) {
        let verts: Vec<[f64; 3]> = pts.iter().map(|(x, y, z)| [*x, *y, *z]).collect();
        let mut chunk = MeshChunk::new(verts.clone());
        let ids: Vec<usize> = (0..verts.len()).collect();
        chunk.try_add_cell(CellType::PolyVertex, &ids).unwrap();
        chunk.add_field(FieldArray::scalar("v", Centering::Node, vec![1.0; verts.len()]).unwrap()).unwrap();

        let grid = SampleGrid::try_new(8, 8, 8, Aabb::new([0.0; 3], [8.0; 3])).unwrap();
        let view = ViewParameters::new(ViewTransform::identity(), grid);
        let cfg = ExtractorConfig { mode: ExtractionMode::Kernel, ..Default::default() };
        let ex = SampleExtractor::new(&chunk, &["v"], cfg.clone()).unwrap();
        let mut buf = SampleBuffer::new(8, 8, 8, 1);
        let report = ex.extract(&view, &mut buf).unwrap();
        prop_assert!(report.deferred.is_empty());

        let r = splat_radius(&Aabb::from_points(&verts), &view, &cfg.kernel_params());
        for (col, row, ray) in buf.rays() {
            for k in ray.keys() {
                let s = grid.sample_position(col, row, *k as usize);
                let near = verts.iter().any(|v| {
                    let d = ((s[0] - v[0]).powi(2) + (s[1] - v[1]).powi(2) + (s[2] - v[2]).powi(2)).sqrt();
                    d <= r + 1e-12
                });
                prop_assert!(near, "sample ({col}, {row}, {k}) is beyond the splat radius");
            }
        }
    }
}

#[test]
fn hex_raster_reproduces_linear_field() {
    let chunk = cube_chunk(2, false);
    let ex = SampleExtractor::new(&chunk, &["f"], ExtractorConfig::default()).unwrap();
    let view = unit_view(4);
    let mut buf = SampleBuffer::new(4, 4, 4, 1);
    let rep = ex.extract(&view, &mut buf).unwrap();
    assert_eq!(rep.cells_rasterized, 8);
    assert_eq!(buf.n_samples(), 64);
    for (col, row, ray) in buf.rays() {
        for (k, s) in ray {
            let p = view.grid.sample_position(col, row, *k as usize);
            assert!((s.value(0) - (p[0] + 2.0 * p[1] + 3.0 * p[2])).abs() < 1e-9);
        }
    }
}

#[test]
fn tets_fill_the_same_samples_as_hexes() {
    let hexes = cube_chunk(2, false);
    let tets = cube_chunk(2, true);
    let view = unit_view(5);
    let mut a = SampleBuffer::new(5, 5, 5, 1);
    let mut b = SampleBuffer::new(5, 5, 5, 1);
    SampleExtractor::new(&hexes, &["f"], ExtractorConfig::default())
        .unwrap()
        .extract(&view, &mut a)
        .unwrap();
    SampleExtractor::new(&tets, &["f"], ExtractorConfig::default())
        .unwrap()
        .extract(&view, &mut b)
        .unwrap();
    assert_eq!(a.n_samples(), 125);
    assert_eq!(b.n_samples(), 125);
}

#[test]
fn window_restricts_rasterization() {
    let chunk = cube_chunk(1, false);
    let view = unit_view(4).with_window(RestrictionWindow {
        col_min: 0,
        col_max: 2,
        row_min: 1,
        row_max: 2,
    });
    let mut buf = SampleBuffer::new(4, 4, 4, 1);
    SampleExtractor::new(&chunk, &["f"], ExtractorConfig::default())
        .unwrap()
        .extract(&view, &mut buf)
        .unwrap();
    assert_eq!(buf.n_samples(), 2 * 4);
    for (col, row, ray) in buf.rays() {
        if !ray.is_empty() {
            assert!(col < 2 && row == 1);
        }
    }
}

#[test]
fn transform_maps_world_to_view() {
    // world cube [10, 11]^3 shifted onto the unit view box
    let mut chunk = cube_chunk(1, false);
    let shifted: Vec<[f64; 3]> = chunk.points().iter().map(|p| (*p).map(|c| c + 10.0)).collect();
    let mut moved = MeshChunk::new(shifted);
    moved
        .try_add_cell(CellType::Hexahedron, chunk.cell_points(0))
        .unwrap();
    let f = chunk.field("f").unwrap().clone();
    moved.add_field(f).unwrap();
    chunk = moved;
    let t = ViewTransform::new([
        [1.0, 0.0, 0.0, -10.0],
        [0.0, 1.0, 0.0, -10.0],
        [0.0, 0.0, 1.0, -10.0],
    ]);
    let grid = SampleGrid::try_new(2, 2, 2, Aabb::new([0.0; 3], [1.0; 3])).unwrap();
    let view = ViewParameters::new(t, grid);
    let mut buf = SampleBuffer::new(2, 2, 2, 1);
    SampleExtractor::new(&chunk, &["f"], ExtractorConfig::default())
        .unwrap()
        .extract(&view, &mut buf)
        .unwrap();
    assert_eq!(buf.n_samples(), 8);
}

#[test]
fn raster_mode_rejects_lines() {
    let mut chunk = MeshChunk::new(vec![[0.1; 3], [0.9; 3]]);
    chunk.try_add_cell(CellType::Line, &[0, 1]).unwrap();
    chunk
        .add_field(FieldArray::scalar("v", Centering::Node, vec![0.0, 1.0]).unwrap())
        .unwrap();
    let cfg = ExtractorConfig {
        mode: ExtractionMode::Raster,
        ..Default::default()
    };
    let mut buf = SampleBuffer::new(4, 4, 4, 1);
    let err = SampleExtractor::new(&chunk, &["v"], cfg)
        .unwrap()
        .extract(&unit_view(4), &mut buf)
        .unwrap_err();
    assert!(matches!(err, MeshCompositeError::ImproperUse(_)));

    // Auto splats the same line instead
    let rep = SampleExtractor::new(&chunk, &["v"], ExtractorConfig::default())
        .unwrap()
        .extract(&unit_view(4), &mut buf)
        .unwrap();
    assert_eq!(rep.cells_splatted, 1);
    assert!(!buf.is_empty());
}

#[test]
fn concave_polygon_stays_inside_its_outline() {
    // notch cut down from the top edge to (2, 1)
    let chunk = single_cell(
        CellType::Polygon,
        &[
            [0.0, 0.0, 0.5],
            [4.0, 0.0, 0.5],
            [4.0, 4.0, 0.5],
            [2.0, 1.0, 0.5],
            [0.0, 4.0, 0.5],
        ],
    );
    let grid = SampleGrid::try_new(4, 4, 1, Aabb::new([0.0; 3], [4.0, 4.0, 1.0])).unwrap();
    let view = ViewParameters::new(ViewTransform::identity(), grid);
    let cfg = ExtractorConfig {
        mode: ExtractionMode::Raster,
        ..Default::default()
    };
    let mut buf = SampleBuffer::new(4, 4, 1, 1);
    let rep = SampleExtractor::new(&chunk, &["f"], cfg)
        .unwrap()
        .extract(&view, &mut buf)
        .unwrap();
    assert_eq!(rep.samples_written, 10);

    let mut hit: Vec<(usize, usize)> = Vec::new();
    for (col, row, ray) in buf.rays() {
        for (k, s) in ray {
            let p = grid.sample_position(col, row, *k as usize);
            assert!((s.value(0) - linear_f(&[p[0], p[1], 0.5])).abs() < 1e-9);
            hit.push((col, row));
        }
    }
    hit.sort_unstable();
    let mut expected: Vec<(usize, usize)> = (0..4).flat_map(|c| [(c, 0), (c, 1)]).collect();
    expected.extend([(0, 2), (3, 2)]);
    expected.sort_unstable();
    assert_eq!(hit, expected);
}

#[test]
fn flattened_hex_is_splatted_not_deferred() {
    let mut verts = Vec::new();
    for _ in 0..2 {
        verts.extend([[0.0, 0.0, 4.5], [8.0, 0.0, 4.5], [8.0, 8.0, 4.5], [0.0, 8.0, 4.5]]);
    }
    let chunk = single_cell(CellType::Hexahedron, &verts);
    let grid = SampleGrid::try_new(8, 8, 8, Aabb::new([0.0; 3], [8.0; 3])).unwrap();
    let view = ViewParameters::new(ViewTransform::identity(), grid);
    let mut buf = SampleBuffer::new(8, 8, 8, 1);
    let rep = SampleExtractor::new(&chunk, &["f"], ExtractorConfig::default())
        .unwrap()
        .extract(&view, &mut buf)
        .unwrap();
    assert!(rep.deferred.is_empty());
    assert_eq!((rep.cells_rasterized, rep.cells_splatted), (0, 1));
    assert!(rep.samples_written > 0);
    assert!(!buf.is_empty());
}

#[test]
fn every_rasterizable_topology_reproduces_linear_field() {
    let cases: Vec<(CellType, Vec<[f64; 3]>, Option<f64>)> = vec![
        (
            CellType::Wedge,
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [1.0, 0.0, 1.0],
                [0.0, 1.0, 1.0],
            ],
            None,
        ),
        (
            CellType::Pyramid,
            vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.5, 0.5, 1.0],
            ],
            None,
        ),
        (
            CellType::QuadraticHexahedron,
            quadratic_hex_nodes([0.0; 3], [1.0; 3]),
            None,
        ),
        (
            CellType::Quad,
            vec![[0.0, 0.0, 0.4], [1.0, 0.0, 0.4], [0.75, 1.0, 0.4], [0.25, 1.0, 0.4]],
            Some(0.4),
        ),
        (
            CellType::Pixel,
            vec![[0.0, 0.0, 0.4], [1.0, 0.0, 0.4], [0.0, 1.0, 0.4], [1.0, 1.0, 0.4]],
            Some(0.4),
        ),
    ];
    let view = unit_view(4);
    for (ct, verts, flat_z) in cases {
        let chunk = single_cell(ct, &verts);
        let mut buf = SampleBuffer::new(4, 4, 4, 1);
        let rep = SampleExtractor::new(&chunk, &["f"], ExtractorConfig::default())
            .unwrap()
            .extract(&view, &mut buf)
            .unwrap();
        assert_eq!(rep.cells_rasterized, 1, "{ct:?}");
        assert!(buf.n_samples() > 0, "{ct:?}");
        for (col, row, ray) in buf.rays() {
            for (k, s) in ray {
                let mut p = view.grid.sample_position(col, row, *k as usize);
                if let Some(z) = flat_z {
                    // surfaces carry the value at their own depth
                    p[2] = z;
                }
                assert!((s.value(0) - linear_f(&p)).abs() < 1e-8, "{ct:?} at {p:?}");
            }
        }
        if ct == CellType::Pixel {
            assert_eq!(buf.n_samples(), 16);
        }
    }
}
