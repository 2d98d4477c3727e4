use crate::ModelError;
use ndarray::{Array3, ArrayView3};
use serde_json::Value;
use std::fmt::Debug;

/// A trainable mapping between coarse-grained and atomistic coordinates.
///
/// Arrays are `(frames, atoms, 3)` in nanometers. Implementations are opaque to
/// the pipeline; the serializer only sees `kind` and `state`.
pub trait CoordinateTransform: Debug + Send + Sync {
    /// Identifies the backend inside serialized models.
    fn kind(&self) -> &'static str;

    fn fit(&mut self, cg: ArrayView3<'_, f64>, atomistic: ArrayView3<'_, f64>)
    -> Result<(), ModelError>;

    fn transform(&self, cg: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError>;

    fn inverse_transform(&self, atomistic: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError>;

    /// Everything needed to rebuild this instance through a registered loader.
    fn state(&self) -> Result<Value, ModelError>;
}

/// Rejects arrays that cannot be coordinates: empty, not xyz, or non-finite.
pub fn check_coordinates(label: &str, coordinates: ArrayView3<'_, f64>) -> Result<(), ModelError> {
    let (frames, atoms, axes) = coordinates.dim();
    if axes != 3 {
        return Err(ModelError::ShapeMismatch(format!(
            "{label} coordinates must end in an axis of 3, got {axes}"
        )));
    }
    if frames == 0 || atoms == 0 {
        return Err(ModelError::ShapeMismatch(format!(
            "{label} coordinates are empty ({frames} frames, {atoms} atoms)"
        )));
    }
    if coordinates.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::ShapeMismatch(format!(
            "{label} coordinates contain non-finite values"
        )));
    }
    Ok(())
}
