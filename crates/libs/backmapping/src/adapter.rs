use crate::{CoordinateTransform, LinearBackmapper, ModelError, check_coordinates};
use common_types::BackmapOptions;
use ndarray::{Array3, ArrayView3};
use tracing::{debug, info};

/// Receives `(percent, message)` while a model trains.
pub type ProgressCallback<'a> = &'a mut dyn FnMut(f64, &str);

/// Wraps a transform model behind a stable fit / transform surface and tracks
/// whether it has been trained.
#[derive(Debug)]
pub struct BackmapAdapter {
    model: Option<Box<dyn CoordinateTransform>>,
    is_fitted: bool,
    options: BackmapOptions,
}

impl BackmapAdapter {
    #[must_use]
    pub fn new(model: Box<dyn CoordinateTransform>, options: BackmapOptions) -> Self {
        Self {
            model: Some(model),
            is_fitted: false,
            options,
        }
    }

    /// An adapter with nothing to train. `fit` fails until a model is set.
    #[must_use]
    pub fn empty(options: BackmapOptions) -> Self {
        Self {
            model: None,
            is_fitted: false,
            options,
        }
    }

    /// A fresh adapter around the built-in [`LinearBackmapper`].
    ///
    /// `options` are recorded on the adapter and saved with it, but the linear
    /// backend has no tunable stages and fits the same map for any options.
    /// Backends that honor them are installed with [`Self::new`] or
    /// [`Self::set_model`].
    #[must_use]
    pub fn with_options(options: BackmapOptions) -> Self {
        Self::new(Box::new(LinearBackmapper::default()), options)
    }

    /// Restores an adapter from serialized parts.
    pub(crate) fn restore(
        model: Option<Box<dyn CoordinateTransform>>,
        is_fitted: bool,
        options: BackmapOptions,
    ) -> Self {
        Self {
            is_fitted: is_fitted && model.is_some(),
            model,
            options,
        }
    }

    pub fn set_model(&mut self, model: Box<dyn CoordinateTransform>) {
        self.model = Some(model);
        self.is_fitted = false;
    }

    #[must_use]
    pub fn model(&self) -> Option<&dyn CoordinateTransform> {
        self.model.as_deref()
    }

    #[must_use]
    pub const fn options(&self) -> BackmapOptions {
        self.options
    }

    #[must_use]
    pub const fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn fit(
        &mut self,
        cg: ArrayView3<'_, f64>,
        atomistic: ArrayView3<'_, f64>,
        mut progress: Option<ProgressCallback<'_>>,
    ) -> Result<(), ModelError> {
        let model = self.model.as_mut().ok_or(ModelError::NoModel)?;
        check_coordinates("coarse-grained", cg)?;
        check_coordinates("atomistic", atomistic)?;
        if cg.dim().0 != atomistic.dim().0 {
            return Err(ModelError::ShapeMismatch(format!(
                "{} coarse-grained frames but {} atomistic frames",
                cg.dim().0,
                atomistic.dim().0
            )));
        }

        let mut report = |percent: f64, message: &str| {
            debug!("{percent:.0}% {message}");
            if let Some(callback) = progress.as_mut() {
                callback(percent, message);
            }
        };

        report(0.0, "Starting training...");
        info!(
            "Fitting {} model on {:?} -> {:?}",
            model.kind(),
            cg.dim(),
            atomistic.dim()
        );
        self.is_fitted = false;
        model.fit(cg, atomistic)?;
        self.is_fitted = true;
        report(100.0, "Training complete");
        Ok(())
    }

    pub fn transform(&self, cg: ArrayView3<'_, f64>) -> Result<Array3<f64>, ModelError> {
        self.fitted_model()?.transform(cg)
    }

    pub fn inverse_transform(
        &self,
        atomistic: ArrayView3<'_, f64>,
    ) -> Result<Array3<f64>, ModelError> {
        self.fitted_model()?.inverse_transform(atomistic)
    }

    fn fitted_model(&self) -> Result<&dyn CoordinateTransform, ModelError> {
        match (&self.model, self.is_fitted) {
            (Some(model), true) => Ok(model.as_ref()),
            _ => Err(ModelError::NotTrained),
        }
    }
}
