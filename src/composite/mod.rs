//! Parallel compositing: image merging, sample redistribution and the
//! reductions that turn sample buffers into images or surfaces.

pub mod image_compositer;
pub mod partition;
pub mod ray_function;
pub mod sample_communicator;
pub mod surface;

pub use image_compositer::{CompositeConfig, CompositeRoot, ImageCompositer};
pub use partition::ImagePartition;
pub use ray_function::RayFunction;
pub use sample_communicator::redistribute_samples;
pub use surface::{
    INVALID_DEPTH, ReconstructedSurface, SamplePointToSurfaceFilter, SampleSelection,
};
