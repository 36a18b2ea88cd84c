mod util;
use util::*;

use mesh_composite::algs::communicator::NoComm;
use mesh_composite::algs::context::ParallelContext;
use mesh_composite::composite::{CompositeRoot, ImageCompositer};
use mesh_composite::data::image::Image;
use mesh_composite::mesh_error::MeshCompositeError;
use proptest::prelude::*;
use serial_test::serial;

/// `(row_offset, col_offset, rows, cols, colour, depth per pixel)`
type Piece = (usize, usize, usize, usize, u8, Vec<f32>);

fn piece() -> impl Strategy<Value = Piece> {
    (0usize..4, 0usize..4, 1usize..4, 1usize..4, any::<u8>()).prop_flat_map(|(r, c, h, w, v)| {
        // few distinct depths so ties are common
        let depths = prop::collection::vec(prop::sample::select(vec![0.25f32, 0.5, 0.75]), h * w);
        (Just(r), Just(c), Just(h), Just(w), Just(v), depths)
    })
}

fn image_of(p: &Piece) -> Image {
    let (_, _, h, w, v, ref z) = *p;
    let color = [v, v / 2, 255 - v, 255].repeat(h * w);
    Image::from_parts(h, w, 4, color, Some(z.clone())).unwrap()
}

fn composite_serial(pieces: &[Piece], order: &[usize]) -> Image {
    let comm = NoComm;
    let ctx = ParallelContext::new(&comm);
    let mut c = ImageCompositer::new(6, 6, 4).unwrap().with_depth(true);
    for &i in order {
        let p = &pieces[i];
        c.add_image_input(image_of(p), p.0, p.1).unwrap();
    }
    c.execute(&ctx).unwrap().unwrap()
}

proptest! {
    #[test]
    fn depth_composite_ignores_input_order(
        (pieces, order) in prop::collection::vec(piece(), 1..6).prop_flat_map(|ps| {
            let idx: Vec<usize> = (0..ps.len()).collect();
            (Just(ps), Just(idx).prop_shuffle())
        })
    ) {
        let forward: Vec<usize> = (0..pieces.len()).collect();
        let a = composite_serial(&pieces, &forward);
        let b = composite_serial(&pieces, &order);
        prop_assert_eq!(a, b);
    }
}

#[test]
fn depth_picks_nearest() {
    let comm = NoComm;
    let ctx = ParallelContext::new(&comm);
    let mut c = ImageCompositer::new(1, 2, 4).unwrap().with_depth(true);
    let far = Image::from_parts(1, 2, 4, [9, 9, 9, 255].repeat(2), Some(vec![0.9, 0.1])).unwrap();
    let near = Image::from_parts(1, 2, 4, [1, 1, 1, 255].repeat(2), Some(vec![0.2, 0.8])).unwrap();
    c.add_image_input(far, 0, 0).unwrap();
    c.add_image_input(near, 0, 0).unwrap();
    let out = c.execute(&ctx).unwrap().unwrap();
    assert_eq!(out.pixel(0, 0), &[1, 1, 1, 255]);
    assert_eq!(out.pixel(0, 1), &[9, 9, 9, 255]);
    assert_eq!(out.depth_at(0, 1), Some(0.1));
    assert_eq!(c.n_inputs(), 0);
}

#[test]
fn overlap_without_depth_fails() {
    let comm = NoComm;
    let ctx = ParallelContext::new(&comm);
    let mut c = ImageCompositer::new(4, 4, 3).unwrap();
    c.add_image_input(Image::new(2, 2, 3).unwrap(), 0, 0).unwrap();
    c.add_image_input(Image::new(2, 2, 3).unwrap(), 1, 1).unwrap();
    assert!(matches!(
        c.execute(&ctx),
        Err(MeshCompositeError::OverlappingRegions { row: 1, col: 1 })
    ));
}

#[test]
#[serial]
fn row_stripes_from_three_ranks() {
    let results = run_ranks(3, |ctx| {
        let r = ctx.rank();
        let mut c = ImageCompositer::new(3, 4, 4).unwrap();
        c.set_background([7, 7, 7, 0]);
        let v = 10 * (r as u8 + 1);
        // rank 2 leaves its last pixel to the background
        let cols = if r == 2 { 3 } else { 4 };
        let img = Image::filled(1, cols, &[v, v, v, 255], false).unwrap();
        c.add_image_input(img, r, 0).unwrap();
        c.execute(ctx).unwrap()
    });
    assert!(results[1].is_none() && results[2].is_none());
    let out = results[0].as_ref().unwrap();
    for row in 0..3 {
        let v = 10 * (row as u8 + 1);
        assert_eq!(out.pixel(row, 0), &[v, v, v, 255]);
    }
    assert_eq!(out.pixel(2, 3), &[7, 7, 7, 0]);
}

#[test]
#[serial]
fn every_rank_receives_with_root_all() {
    let results = run_ranks(2, |ctx| {
        let mut c = ImageCompositer::new(2, 2, 4).unwrap().with_depth(true);
        c.set_root(CompositeRoot::from_i32(-1));
        // both ranks cover the whole image; rank 1 is nearer
        let z = if ctx.rank() == 1 { 0.25 } else { 0.5 };
        let v = ctx.rank() as u8 + 1;
        let img = Image::from_parts(2, 2, 4, [v, v, v, 255].repeat(4), Some(vec![z; 4])).unwrap();
        c.add_image_input(img, 0, 0).unwrap();
        c.execute(ctx).unwrap()
    });
    assert_eq!(results[0], results[1]);
    let out = results[0].as_ref().unwrap();
    assert_eq!(out.pixel(1, 1), &[2, 2, 2, 255]);
}
