mod util;
use util::*;

use mesh_composite::prelude::*;
use serial_test::serial;

const W: usize = 6;

/// Extract, redistribute by rows, render each region, composite on rank 0.
fn render_on<C: Communicator>(
    ctx: &ParallelContext<'_, C>,
    chunk: &MeshChunk,
    func: RayFunction,
) -> Option<Image> {
    let mine = round_robin_cells(chunk, ctx.size(), ctx.rank());
    let grid = SampleGrid::try_new(W, W, W, Aabb::new([0.0; 3], [1.0; 3])).unwrap();
    let view = ViewParameters::new(ViewTransform::identity(), grid);
    let mut local = SampleBuffer::new(W, W, W, 1);
    let report = SampleExtractor::new(&mine, &["f"], ExtractorConfig::default())
        .unwrap()
        .extract(&view, &mut local)
        .unwrap();
    assert!(report.deferred.is_empty());

    let part = ImagePartition::even_rows(W, W, ctx.size()).unwrap();
    let owned = redistribute_samples(ctx, &local, &part).unwrap();
    let region = part.region(ctx.rank()).unwrap();
    let partial = func.render(&owned, &grid, region, 0, (0.0, 6.0)).unwrap();

    let mut compositer = ImageCompositer::new(W, W, 4).unwrap().with_depth(true);
    compositer
        .add_image_input(partial.image, partial.row_offset, partial.col_offset)
        .unwrap();
    compositer.execute(ctx).unwrap()
}

#[test]
#[serial]
fn distributed_render_matches_single_rank() {
    let chunk = cube_chunk(3, false);
    for func in [RayFunction::MaximumIntensity, RayFunction::FirstHit] {
        let single = render_on(&ParallelContext::new(&NoComm), &chunk, func).unwrap();
        let split = run_ranks(3, |ctx| render_on(ctx, &chunk, func));
        assert!(split[1].is_none() && split[2].is_none());
        assert_eq!(split[0].as_ref(), Some(&single), "{func:?}");
        // every ray hit the cube
        for row in 0..W {
            for col in 0..W {
                assert_eq!(single.pixel(row, col)[3], 255);
            }
        }
    }
}

#[test]
#[serial]
fn brighter_toward_far_corner() {
    let chunk = cube_chunk(2, true);
    let img = run_ranks(2, |ctx| render_on(ctx, &chunk, RayFunction::MaximumIntensity))
        .remove(0)
        .unwrap();
    // f = x + 2y + 3z grows with column and row
    assert!(img.pixel(0, 0)[0] < img.pixel(W - 1, W - 1)[0]);
    assert!(img.pixel(0, 0)[0] < img.pixel(0, W - 1)[0]);
}
