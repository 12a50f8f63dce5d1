//! Jeffreys prior for the parameters of a composite hypothesis.

use crate::error::{LikelihoodError, LikelihoodResult};
use crate::hypothesis::{fixed_translation, Limit, Translation};
use binning::Matrix;
use std::fmt;
use std::sync::Arc;

const DEFAULT_DX: f64 = 1e-3;

/// Non-informative prior proportional to the square root of the determinant
/// of the Fisher information of the expected reco counts.
///
/// The prior is zero when the reco expectation does not depend on one of the
/// parameters. Such parameters cannot be constrained by the detector and
/// should be removed from the hypothesis.
#[derive(Clone)]
pub struct JeffreysPrior {
    matrices: Vec<Matrix>,
    translate: Translation,
    lower: Vec<f64>,
    upper: Vec<f64>,
    defaults: Vec<f64>,
    dx: Vec<f64>,
    total_truth_limit: f64,
}

impl JeffreysPrior {
    pub fn new(
        matrices: Vec<Matrix>,
        translate: impl Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
        limits: Vec<Limit>,
        defaults: Vec<f64>,
    ) -> LikelihoodResult<Self> {
        Self::from_translation(matrices, Arc::new(translate), limits, defaults)
    }

    pub fn from_translation(
        matrices: Vec<Matrix>,
        translate: Translation,
        limits: Vec<Limit>,
        defaults: Vec<f64>,
    ) -> LikelihoodResult<Self> {
        if matrices.is_empty() {
            return Err(LikelihoodError::InvalidArgument {
                message: "at least one response matrix is required".to_string(),
            });
        }
        if defaults.len() != limits.len() {
            return Err(LikelihoodError::LengthMismatch {
                expected: limits.len(),
                actual: defaults.len(),
            });
        }
        Ok(Self {
            matrices,
            translate,
            lower: limits
                .iter()
                .map(|l| l.0.unwrap_or(f64::NEG_INFINITY))
                .collect(),
            upper: limits.iter().map(|l| l.1.unwrap_or(f64::INFINITY)).collect(),
            dx: vec![DEFAULT_DX; defaults.len()],
            defaults,
            total_truth_limit: f64::INFINITY,
        })
    }

    /// Step sizes of the numerical differentiation.
    pub fn with_dx(mut self, dx: Vec<f64>) -> LikelihoodResult<Self> {
        if dx.len() != self.defaults.len() {
            return Err(LikelihoodError::LengthMismatch {
                expected: self.defaults.len(),
                actual: dx.len(),
            });
        }
        self.dx = dx;
        Ok(self)
    }

    /// Parameter sets whose total truth exceeds `limit` get zero prior
    /// probability.
    pub fn with_total_truth_limit(mut self, limit: f64) -> Self {
        self.total_truth_limit = limit;
        self
    }

    pub fn n_parameters(&self) -> usize {
        self.defaults.len()
    }

    pub fn n_toys(&self) -> usize {
        self.matrices.len()
    }

    pub fn default_values(&self) -> &[f64] {
        &self.defaults
    }

    fn reco_expectation(&self, parameters: &[f64], matrix: &Matrix) -> LikelihoodResult<Vec<f64>> {
        Ok(matrix.dot(&(self.translate)(parameters))?)
    }

    fn matrix(&self, toy_index: usize) -> LikelihoodResult<&Matrix> {
        self.matrices
            .get(toy_index)
            .ok_or(LikelihoodError::ToyIndexOutOfRange {
                index: toy_index,
                ntoys: self.matrices.len(),
            })
    }

    /// Fisher information matrix of the reco expectation at `parameters`.
    ///
    /// Reco bins with zero expectation and zero derivative do not contribute.
    pub fn fisher_matrix(&self, parameters: &[f64], toy_index: usize) -> LikelihoodResult<Matrix> {
        let n = self.n_parameters();
        if parameters.len() != n {
            return Err(LikelihoodError::LengthMismatch {
                expected: n,
                actual: parameters.len(),
            });
        }
        let matrix = self.matrix(toy_index)?;
        let expect = self.reco_expectation(parameters, matrix)?;

        let mut derivatives = Vec::with_capacity(n);
        for i in 0..n {
            let mut up = parameters.to_vec();
            let mut down = parameters.to_vec();
            up[i] += self.dx[i];
            down[i] -= self.dx[i];
            let r_up = self.reco_expectation(&up, matrix)?;
            let r_down = self.reco_expectation(&down, matrix)?;
            derivatives.push(
                r_up.iter()
                    .zip(&r_down)
                    .map(|(u, d)| (u - d) / (2.0 * self.dx[i]))
                    .collect::<Vec<f64>>(),
            );
        }

        let mut fisher = Matrix::zeros(n, n);
        for i in 0..n {
            for j in i..n {
                let value: f64 = derivatives[i]
                    .iter()
                    .zip(&derivatives[j])
                    .zip(&expect)
                    .map(|((a, b), e)| a * b / e)
                    .filter(|v| !v.is_nan())
                    .sum();
                fisher.set(i, j, value);
                fisher.set(j, i, value);
            }
        }
        Ok(fisher)
    }

    /// Logarithm of the (unnormalised) prior density.
    pub fn log_prior(&self, parameters: &[f64], toy_index: usize) -> LikelihoodResult<f64> {
        let out_of_bounds = parameters
            .iter()
            .zip(self.lower.iter().zip(&self.upper))
            .any(|(&p, (&lo, &hi))| p < lo || p > hi);
        if out_of_bounds {
            return Ok(f64::NEG_INFINITY);
        }
        let total: f64 = (self.translate)(parameters).iter().sum();
        if total > self.total_truth_limit {
            return Ok(f64::NEG_INFINITY);
        }
        let fisher = self.fisher_matrix(parameters, toy_index)?;
        Ok(0.5 * fisher.log_abs_determinant()?)
    }

    /// The prior of the free parameters when the `Some` entries of `fixed`
    /// are held constant.
    pub fn fix_parameters(&self, fixed: &[Option<f64>]) -> LikelihoodResult<JeffreysPrior> {
        if fixed.len() != self.n_parameters() {
            return Err(LikelihoodError::LengthMismatch {
                expected: self.n_parameters(),
                actual: fixed.len(),
            });
        }
        let free = |values: &[f64]| -> Vec<f64> {
            values
                .iter()
                .zip(fixed)
                .filter(|(_, f)| f.is_none())
                .map(|(v, _)| *v)
                .collect()
        };
        Ok(JeffreysPrior {
            matrices: self.matrices.clone(),
            translate: fixed_translation(self.translate.clone(), fixed.to_vec()),
            lower: free(&self.lower),
            upper: free(&self.upper),
            defaults: free(&self.defaults),
            dx: free(&self.dx),
            total_truth_limit: self.total_truth_limit,
        })
    }
}

impl fmt::Debug for JeffreysPrior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JeffreysPrior")
            .field("n_toys", &self.matrices.len())
            .field("lower", &self.lower)
            .field("upper", &self.upper)
            .field("defaults", &self.defaults)
            .field("total_truth_limit", &self.total_truth_limit)
            .finish_non_exhaustive()
    }
}
