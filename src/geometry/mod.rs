//! Geometry utilities: bounding boxes, shape functions, and point-in-cell tests.
//!
//! The locators and extractors only talk to cells through this module, so
//! adding a topology means teaching [`shape`] and [`containment`] about it.

pub mod bounds;
pub mod containment;
pub mod shape;
pub mod weights;

pub use bounds::Aabb;
pub use containment::evaluate_position;
pub use weights::InterpolationWeights;
