//! Named field arrays attached to mesh chunks.
//!
//! Values are stored tuple-major: tuple `i` occupies
//! `values[i * components..(i + 1) * components]`.

use crate::mesh_error::MeshCompositeError;
use serde::{Deserialize, Serialize};

/// Where a field's tuples live.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum Centering {
    /// One tuple per point.
    Node,
    /// One tuple per cell.
    Zone,
}

/// A named multi-component array.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldArray {
    name: String,
    centering: Centering,
    components: usize,
    values: Vec<f64>,
}

impl FieldArray {
    /// Construct a field, checking that `values` splits into whole tuples.
    pub fn try_new(
        name: impl Into<String>,
        centering: Centering,
        components: usize,
        values: Vec<f64>,
    ) -> Result<Self, MeshCompositeError> {
        let name = name.into();
        if components == 0 || values.len() % components != 0 {
            return Err(MeshCompositeError::FieldComponents {
                name,
                components,
                values: values.len(),
            });
        }
        Ok(Self {
            name,
            centering,
            components,
            values,
        })
    }

    /// Single-component field.
    pub fn scalar(
        name: impl Into<String>,
        centering: Centering,
        values: Vec<f64>,
    ) -> Result<Self, MeshCompositeError> {
        Self::try_new(name, centering, 1, values)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn centering(&self) -> Centering {
        self.centering
    }

    #[inline]
    pub fn components(&self) -> usize {
        self.components
    }

    /// Number of tuples.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len() / self.components
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Read-only view of tuple `i`.
    #[inline]
    pub fn tuple(&self, i: usize) -> &[f64] {
        &self.values[i * self.components..(i + 1) * self.components]
    }

    /// Checked variant of [`tuple`](Self::tuple).
    pub fn try_tuple(&self, i: usize) -> Result<&[f64], MeshCompositeError> {
        if i >= self.len() {
            return Err(MeshCompositeError::FieldLengthMismatch {
                name: self.name.clone(),
                expected: i + 1,
                found: self.len(),
            });
        }
        Ok(self.tuple(i))
    }

    /// Builds a new field of the same name/centering from selected tuples.
    pub fn gather(&self, indices: impl IntoIterator<Item = usize>) -> FieldArray {
        let mut values = Vec::new();
        for i in indices {
            values.extend_from_slice(self.tuple(i));
        }
        FieldArray {
            name: self.name.clone(),
            centering: self.centering,
            components: self.components,
            values,
        }
    }

    /// Checks the tuple count against the entity count for this centering.
    pub(crate) fn validate_len(&self, expected: usize) -> Result<(), MeshCompositeError> {
        if self.len() != expected {
            return Err(MeshCompositeError::FieldLengthMismatch {
                name: self.name.clone(),
                expected,
                found: self.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ragged_values_rejected() {
        let err = FieldArray::try_new("v", Centering::Node, 3, vec![0.0; 4]).unwrap_err();
        assert!(matches!(err, MeshCompositeError::FieldComponents { components: 3, values: 4, .. }));
        assert!(FieldArray::try_new("v", Centering::Node, 0, vec![]).is_err());
    }

    #[test]
    fn tuples_and_gather() {
        let f = FieldArray::try_new("v", Centering::Zone, 2, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap();
        assert_eq!(f.len(), 3);
        assert_eq!(f.tuple(1), &[3.0, 4.0]);
        let g = f.gather([2, 0]);
        assert_eq!(g.values(), &[5.0, 6.0, 1.0, 2.0]);
        assert!(f.try_tuple(3).is_err());
    }
}
