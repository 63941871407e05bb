//! Python bindings, enabled with the `python` feature.
//!
//! Arrays must be contiguous one-dimensional numpy arrays; the probability
//! vector passed to `calculate_values` is updated in place.

use numpy::{PyReadonlyArray1, PyReadwriteArray1};
use pyo3::exceptions::{PyArithmeticError, PyValueError};
use pyo3::prelude::*;

use crate::{Float, error::{Error, ErrorKind}, integrator::Integrator, settings::Settings};

fn to_py_err(e: Error) -> PyErr {
    match e.kind() {
        ErrorKind::Numerical => PyArithmeticError::new_err(e.to_string()),
        ErrorKind::Configuration => PyValueError::new_err(e.to_string()),
    }
}

#[pyclass(name = "Integrator", module = "lineage_ode")]
struct PyIntegrator {
    inner: Integrator,
}

#[pymethods]
impl PyIntegrator {
    #[new]
    #[pyo3(signature = (max_lineages, states, epsilon = 1e-6, max_step = 1.0))]
    fn new(max_lineages: usize, states: usize, epsilon: Float, max_step: Float) -> PyResult<Self> {
        let inner = Integrator::setup(max_lineages, states, Settings::new(epsilon, max_step)).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn states(&self) -> usize {
        self.inner.states()
    }

    #[getter]
    fn lineages(&self) -> usize {
        self.inner.lineages()
    }

    fn init(
        &mut self,
        migration: PyReadonlyArray1<'_, Float>,
        coalescent: PyReadonlyArray1<'_, Float>,
        lineages: usize,
    ) -> PyResult<()> {
        self.inner
            .init(migration.as_slice()?, coalescent.as_slice()?, lineages)
            .map_err(to_py_err)
    }

    fn init_with_indicators(
        &mut self,
        migration: PyReadonlyArray1<'_, Float>,
        indicators: PyReadonlyArray1<'_, bool>,
        coalescent: PyReadonlyArray1<'_, Float>,
        lineages: usize,
    ) -> PyResult<()> {
        self.inner
            .init_with_indicators(
                migration.as_slice()?,
                indicators.as_slice()?,
                coalescent.as_slice()?,
                lineages,
            )
            .map_err(to_py_err)
    }

    fn set_up_dynamics(
        &mut self,
        migration: PyReadonlyArray1<'_, Float>,
        coalescent: PyReadonlyArray1<'_, Float>,
        end_times: PyReadonlyArray1<'_, Float>,
    ) -> PyResult<()> {
        self.inner
            .set_up_dynamics(migration.as_slice()?, coalescent.as_slice()?, end_times.as_slice()?)
            .map_err(to_py_err)
    }

    fn calculate_values(&mut self, duration: Float, mut p: PyReadwriteArray1<'_, Float>) -> PyResult<()> {
        self.inner
            .calculate_values(duration, p.as_slice_mut()?)
            .map(|_| ())
            .map_err(to_py_err)
    }

    fn init_and_calculate_values(
        &mut self,
        migration: PyReadonlyArray1<'_, Float>,
        coalescent: PyReadonlyArray1<'_, Float>,
        lineages: usize,
        duration: Float,
        mut p: PyReadwriteArray1<'_, Float>,
    ) -> PyResult<()> {
        self.inner
            .init_and_calculate_values(
                migration.as_slice()?,
                coalescent.as_slice()?,
                lineages,
                duration,
                p.as_slice_mut()?,
            )
            .map(|_| ())
            .map_err(to_py_err)
    }

    fn init_epoch_and_calculate_values(
        &mut self,
        epoch: usize,
        lineages: usize,
        duration: Float,
        mut p: PyReadwriteArray1<'_, Float>,
    ) -> PyResult<()> {
        self.inner
            .init_epoch_and_calculate_values(epoch, lineages, duration, p.as_slice_mut()?)
            .map(|_| ())
            .map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!(
            "<Integrator: states={}, max_lineages={}, variant={:?}>",
            self.inner.states(),
            self.inner.max_lineages(),
            self.inner.variant()
        )
    }
}

#[pymodule]
fn lineage_ode(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyIntegrator>()?;
    Ok(())
}
