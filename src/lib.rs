#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-composite
//!
//! mesh-composite is the distributed core of a scientific visualization
//! pipeline. Each rank holds one or more chunks of a larger mesh; the crate
//! locates points in those chunks, resamples them onto a view-aligned sample
//! lattice, grows ghost zones between structured domains, and composites the
//! per-rank results into images or surfaces.
//!
//! ## Features
//! - Point-in-cell location with interpolation weights for unstructured
//!   chunks (bucket octree), rectilinear grids and 2-D rectilinear slices
//! - Exact per-topology rasterization and kernel splatting into sparse
//!   sample buffers
//! - Face-signature adjacency and ghost-zone growth for structured
//!   multi-block data
//! - Order-independent image compositing, sample redistribution, ray
//!   functions and surface reconstruction
//! - Pluggable communication backends (serial, in-process, MPI)
//!
//! ## Execution model
//!
//! Every rank runs the same program (SPMD). Local phases need no
//! synchronization. Functions taking a [`ParallelContext`](algs::ParallelContext)
//! are blocking collectives and must be called in the same order on every
//! rank; a mismatched sequence deadlocks.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-composite = "0.1"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```

pub mod algs;
pub mod boundary;
pub mod composite;
pub mod data;
pub mod extract;
pub mod geometry;
pub mod locate;
pub mod mesh_error;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, RayonComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::context::{ParallelContext, ReduceOp};
    pub use crate::boundary::{DomainBoundaries, Face, GhostConfig, GhostedBlock, Neighbor};
    pub use crate::composite::{
        CompositeConfig, CompositeRoot, ImageCompositer, ImagePartition, RayFunction,
        ReconstructedSurface, SamplePointToSurfaceFilter, SampleSelection, redistribute_samples,
    };
    pub use crate::data::{
        Centering, DomainCache, FieldArray, Image, MeshChunk, MeshProvider, PartialImage,
        RectilinearGrid, SampleBuffer, StructuredBlock,
    };
    pub use crate::extract::{
        ExtractionMode, ExtractorConfig, SampleExtractor, SampleGrid, ViewParameters,
        ViewTransform,
    };
    pub use crate::geometry::{Aabb, InterpolationWeights};
    pub use crate::locate::{
        AnyLocator, BucketLocator, CellLocator, EdgeDirection, EdgeLocator, LocatorConfig,
        RectilinearLocator,
    };
    pub use crate::mesh_error::MeshCompositeError;
    pub use crate::topology::{CellType, GhostFlags, InvalidateCache};
}
