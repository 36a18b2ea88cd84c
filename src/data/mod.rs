//! Data model: mesh chunks, grids, fields, sample buffers and images.

pub mod domain_cache;
pub mod field;
pub mod image;
pub mod mesh_chunk;
pub mod rectilinear;
pub mod sample_buffer;
pub mod structured;

pub use domain_cache::{CachedDomain, DomainCache, MeshProvider};
pub use field::{Centering, FieldArray};
pub use image::{Image, PartialImage};
pub use mesh_chunk::{CellId, MeshChunk};
pub use rectilinear::{AxisOrder, RectilinearGrid};
pub use sample_buffer::{Ray, Sample, SampleBuffer};
pub use structured::StructuredBlock;
