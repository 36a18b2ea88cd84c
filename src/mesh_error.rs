//! MeshCompositeError: unified error type for mesh-composite public APIs
//!
//! Every fallible operation in the crate reports through this enum. A query
//! point that lies outside all cells is *not* an error; locators return
//! `None` for that case because it is the common outcome while marching rays.

use crate::topology::cell_type::CellType;
use thiserror::Error;

/// Unified error type for mesh-composite operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshCompositeError {
    /// The caller asked for a mode or combination the code path does not support.
    #[error("improper use: {0}")]
    ImproperUse(String),
    /// A cell topology cannot be handled by the requested operation.
    #[error("cell type {cell_type:?} is not supported by {context}")]
    UnsupportedCellType {
        cell_type: CellType,
        context: &'static str,
    },
    /// Geometry that cannot be evaluated (wrong vertex count, singular Jacobian, …).
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// The chunk has no cells to index or sample.
    #[error("mesh chunk has no cells")]
    NoData,
    /// A cell references a point index past the end of the point array.
    #[error("cell {cell} references point {point}, but the chunk has {n_points} points")]
    CellPointOutOfRange {
        cell: usize,
        point: usize,
        n_points: usize,
    },
    /// A cell was given the wrong number of points for its topology.
    #[error("cell of type {cell_type:?} needs {expected} points, got {found}")]
    CellPointCount {
        cell_type: CellType,
        expected: usize,
        found: usize,
    },
    /// No field with the given name exists.
    #[error("field `{0}` not found")]
    MissingField(String),
    /// A field with the given name already exists.
    #[error("field `{0}` already exists")]
    DuplicateField(String),
    /// A field's tuple count does not match the mesh entity count.
    #[error("field `{name}` has {found} tuples, expected {expected}")]
    FieldLengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    /// A field was declared with zero components or a ragged value array.
    #[error("field `{name}` has {values} values, not a multiple of {components} components")]
    FieldComponents {
        name: String,
        components: usize,
        values: usize,
    },
    /// Coordinate array is empty or not strictly monotone.
    #[error("coordinate axis {axis} is invalid: {reason}")]
    InvalidAxis { axis: usize, reason: String },
    /// A partial image does not fit in the declared output image.
    #[error(
        "partial image at ({row}, {col}) with extent {rows}x{cols} exceeds output bounds {out_rows}x{out_cols}"
    )]
    ImageOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
        out_rows: usize,
        out_cols: usize,
    },
    /// Two partial images without depth wrote the same pixel.
    #[error("pixel ({row}, {col}) was written by more than one partial image")]
    OverlappingRegions { row: usize, col: usize },
    /// Pixel layout of an image does not match the compositer's layout.
    #[error("image layout mismatch: expected {expected}, got {found}")]
    ImageLayout { expected: String, found: String },
    /// A root rank outside the communicator.
    #[error("root rank {root} is out of range for a communicator of size {size}")]
    InvalidRoot { root: usize, size: usize },
    /// An image partition with overlapping or out-of-range regions.
    #[error("invalid image partition: {0}")]
    InvalidPartition(String),
    /// Transport failure while talking to `neighbor`.
    #[error("communication error with rank {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
    /// A received buffer could not be decoded.
    #[error("malformed wire message: {0}")]
    Wire(String),
    /// Requested a full-field exchange; only ghost exchange is implemented.
    #[error("unsupported domain exchange: {0}")]
    UnsupportedExchange(&'static str),
    /// Structured domains must share identical local dimensions.
    #[error("domain {domain} has dimensions {found:?}, expected {expected:?}")]
    DomainDimensionMismatch {
        domain: usize,
        expected: [usize; 3],
        found: [usize; 3],
    },
    /// The external mesh provider failed to produce a chunk.
    #[error("mesh provider failed for domain {domain} at timestep {timestep}: {reason}")]
    Provider {
        domain: usize,
        timestep: usize,
        reason: String,
    },
}
