use crate::{CoordinateTransform, ModelError, check_coordinates};
use nalgebra::DMatrix;
use ndarray::{Array3, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_RIDGE: f64 = 1e-6;

/// Ridge regression from centroid-relative input positions to output positions.
///
/// Every output atom is a weighted sum of the input atoms' offsets from their
/// centroid, shared across x, y and z. Predictions therefore follow the input
/// under translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearBackmapper {
    ridge: f64,
    forward: Option<LinearMap>,
    inverse: Option<LinearMap>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LinearMap {
    /// `(n_out, n_in)`
    weights: DMatrix<f64>,
}

impl LinearBackmapper {
    pub const KIND: &'static str = "linear";

    #[must_use]
    pub const fn new(ridge: f64) -> Self {
        Self {
            ridge,
            forward: None,
            inverse: None,
        }
    }

    pub fn from_state(state: Value) -> Result<Box<dyn CoordinateTransform>, ModelError> {
        let model: Self = serde_json::from_value(state)?;
        Ok(Box::new(model))
    }

    #[must_use]
    pub const fn ridge(&self) -> f64 {
        self.ridge
    }

    #[must_use]
    pub fn n_cg_atoms(&self) -> Option<usize> {
        self.forward.as_ref().map(|m| m.weights.ncols())
    }

    #[must_use]
    pub fn n_atomistic_atoms(&self) -> Option<usize> {
        self.forward.as_ref().map(|m| m.weights.nrows())
    }
}

impl Default for LinearBackmapper {
    fn default() -> Self {
        Self::new(DEFAULT_RIDGE)
    }
}

impl CoordinateTransform for LinearBackmapper {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn fit(
        &mut self,
        cg: ArrayView3<'_, f64>,
        atomistic: ArrayView3<'_, f64>,
    ) -> Result<(), ModelError> {
        let forward = LinearMap::fit(cg, atomistic, self.ridge)?;
        let inverse = LinearMap::fit(atomistic, cg, self.ridge)?;
        self.forward = Some(forward);
        self.inverse = Some(inverse);
        Ok(())
    }

    fn transform(&self, cg: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        self.forward.as_ref().ok_or(ModelError::NotTrained)?.apply(cg)
    }

    fn inverse_transform(&self, atomistic: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        self.inverse
            .as_ref()
            .ok_or(ModelError::NotTrained)?
            .apply(atomistic)
    }

    fn state(&self) -> Result<Value, ModelError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl LinearMap {
    fn fit(
        inputs: ArrayView3<'_, f64>,
        outputs: ArrayView3<'_, f64>,
        ridge: f64,
    ) -> Result<Self, ModelError> {
        check_coordinates("input", inputs)?;
        check_coordinates("output", outputs)?;
        let (frames, n_in, _) = inputs.dim();
        let (out_frames, n_out, _) = outputs.dim();
        if frames != out_frames {
            return Err(ModelError::ShapeMismatch(format!(
                "{frames} input frames but {out_frames} output frames"
            )));
        }

        let mut gram = DMatrix::<f64>::zeros(n_in, n_in);
        let mut cross = DMatrix::<f64>::zeros(n_out, n_in);
        for (input, output) in inputs.axis_iter(Axis(0)).zip(outputs.axis_iter(Axis(0))) {
            let centroid = centroid(input);
            let x = relative_to(input, centroid);
            let y = relative_to(output, centroid);
            gram += &x * x.transpose();
            cross += &y * x.transpose();
        }

        // Centered inputs always have a null direction, so the ridge term is required.
        let scale = (gram.trace() / n_in as f64).max(f64::EPSILON);
        for i in 0..n_in {
            gram[(i, i)] += ridge * scale;
        }
        let cholesky = gram.cholesky().ok_or(ModelError::Singular)?;
        let weights = cholesky.solve(&cross.transpose()).transpose();
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(ModelError::Singular);
        }
        Ok(Self { weights })
    }

    fn apply(&self, inputs: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        check_coordinates("input", inputs)?;
        let (frames, n_in, _) = inputs.dim();
        if n_in != self.weights.ncols() {
            return Err(ModelError::ShapeMismatch(format!(
                "model expects {} atoms per frame, got {n_in}",
                self.weights.ncols()
            )));
        }

        let n_out = self.weights.nrows();
        let mut result = Array3::<f64>::zeros((frames, n_out, 3));
        for (input, mut output) in inputs
            .axis_iter(Axis(0))
            .zip(result.axis_iter_mut(Axis(0)))
        {
            let centroid = centroid(input);
            let predicted = &self.weights * relative_to(input, centroid);
            for atom in 0..n_out {
                for axis in 0..3 {
                    output[[atom, axis]] = predicted[(atom, axis)] + centroid[axis];
                }
            }
        }
        Ok(result)
    }
}

fn centroid(frame: ArrayView2<'_, f64>) -> [f64; 3] {
    let n = frame.nrows().max(1) as f64;
    let mut sum = [0.0; 3];
    for row in frame.rows() {
        for (axis, value) in row.iter().enumerate() {
            sum[axis] += value;
        }
    }
    sum.map(|s| s / n)
}

fn relative_to(frame: ArrayView2<'_, f64>, origin: [f64; 3]) -> DMatrix<f64> {
    DMatrix::from_fn(frame.nrows(), 3, |i, j| frame[[i, j]] - origin[j])
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic, irregular coordinates.
    fn wobbly(frames: usize, atoms: usize) -> Array3<f64> {
        Array3::from_shape_fn((frames, atoms, 3), |(f, a, k)| {
            let t = (f * 31 + a * 7 + k * 3) as f64;
            (t * 0.37).sin() * 2.0 + (a as f64) * 0.15 + (f as f64) * 0.05
        })
    }

    /// Output atoms are copies of the inputs followed by midpoints of neighbours.
    fn expand(cg: &Array3<f64>) -> Array3<f64> {
        let (frames, atoms, _) = cg.dim();
        Array3::from_shape_fn((frames, atoms * 2 - 1, 3), |(f, a, k)| {
            if a < atoms {
                cg[[f, a, k]]
            } else {
                let i = a - atoms;
                (cg[[f, i, k]] + cg[[f, i + 1, k]]) / 2.0
            }
        })
    }

    #[test]
    fn recovers_linear_relationship() {
        let cg = wobbly(40, 6);
        let aa = expand(&cg);
        let mut model = LinearBackmapper::default();
        model.fit(cg.view(), aa.view()).unwrap();

        let unseen = wobbly(45, 6).slice_move(ndarray::s![40.., .., ..]);
        let predicted = model.transform(unseen.view()).unwrap();
        let expected = expand(&unseen);
        assert_eq!(predicted.dim(), expected.dim());
        for (p, e) in predicted.iter().zip(expected.iter()) {
            assert!((p - e).abs() < 1e-3, "{p} vs {e}");
        }
        assert_eq!(model.n_cg_atoms(), Some(6));
        assert_eq!(model.n_atomistic_atoms(), Some(11));
    }

    #[test]
    fn inverse_maps_back_to_cg_shape() {
        let cg = wobbly(20, 5);
        let aa = expand(&cg);
        let mut model = LinearBackmapper::default();
        model.fit(cg.view(), aa.view()).unwrap();

        let back = model.inverse_transform(aa.view()).unwrap();
        assert_eq!(back.dim(), (20, 5, 3));
        for (p, e) in back.iter().zip(cg.iter()) {
            assert!((p - e).abs() < 1e-3);
        }
    }

    #[test]
    fn predictions_follow_translation() {
        let cg = wobbly(10, 4);
        let aa = expand(&cg);
        let mut model = LinearBackmapper::default();
        model.fit(cg.view(), aa.view()).unwrap();

        let base = model.transform(cg.view()).unwrap();
        let shifted = model.transform((&cg + 5.0).view()).unwrap();
        for (a, b) in base.iter().zip(shifted.iter()) {
            assert!((b - a - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn mismatched_frame_counts_are_rejected() {
        let mut model = LinearBackmapper::default();
        let err = model
            .fit(wobbly(3, 4).view(), wobbly(4, 8).view())
            .unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch(_)));
    }

    #[test]
    fn wrong_atom_count_at_inference_is_rejected() {
        let cg = wobbly(10, 4);
        let mut model = LinearBackmapper::default();
        model.fit(cg.view(), expand(&cg).view()).unwrap();

        let err = model.transform(wobbly(2, 5).view()).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch(_)));
    }

    #[test]
    fn untrained_model_refuses_to_transform() {
        let model = LinearBackmapper::default();
        assert!(matches!(
            model.transform(wobbly(1, 3).view()),
            Err(ModelError::NotTrained)
        ));
    }

    #[test]
    fn constant_input_still_fits() {
        let cg = Array3::<f64>::zeros((3, 4, 3));
        let aa = Array3::<f64>::zeros((3, 9, 3));
        let mut model = LinearBackmapper::default();
        model.fit(cg.view(), aa.view()).unwrap();
        let out = model.transform(cg.view()).unwrap();
        assert!(out.iter().all(|v| *v == 0.0));
    }
}
