//! Random-walk Metropolis sampling of hypothesis parameters and toy indices.

use crate::error::{LikelihoodError, LikelihoodResult};
use crate::hypothesis::{CompositeHypothesis, Priors};
use crate::machine::LikelihoodMachine;
use crate::maximizer::standard_normal;
use crate::systematics::Systematics;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Samples drawn by a [`MetropolisSampler`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub parameters: Vec<Vec<f64>>,
    pub toy_indices: Vec<usize>,
    pub log_posteriors: Vec<f64>,
    /// Fraction of accepted parameter proposals.
    pub acceptance_rate: f64,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Mean of every parameter.
    pub fn mean(&self) -> Vec<f64> {
        let Some(first) = self.parameters.first() else {
            return Vec::new();
        };
        let mut mean = vec![0.0; first.len()];
        for sample in &self.parameters {
            for (m, v) in mean.iter_mut().zip(sample) {
                *m += v / self.len() as f64;
            }
        }
        mean
    }

    /// Truth vectors of all samples.
    pub fn truth_vectors(&self, hypothesis: &CompositeHypothesis) -> Vec<Vec<f64>> {
        self.parameters
            .iter()
            .map(|p| hypothesis.translate(p))
            .collect()
    }
}

/// Metropolis sampler of the posterior distribution of a hypothesis'
/// parameters.
///
/// The toy index is sampled alongside the parameters with a uniform
/// proposal, which marginalises over the detector systematics.
pub struct MetropolisSampler<'a> {
    machine: &'a LikelihoodMachine,
    hypothesis: &'a CompositeHypothesis,
    priors: &'a Priors,
    prior_only: bool,
    step_sizes: Vec<f64>,
}

impl<'a> MetropolisSampler<'a> {
    pub fn new(
        machine: &'a LikelihoodMachine,
        hypothesis: &'a CompositeHypothesis,
    ) -> LikelihoodResult<Self> {
        let priors = hypothesis.priors().ok_or(LikelihoodError::MissingPriors)?;
        let defaults = priors.default_values();
        let step_sizes = hypothesis
            .limits_or_unbounded()
            .iter()
            .zip(&defaults)
            .map(|(limit, default)| match *limit {
                (Some(lo), Some(hi)) => (hi - lo) / 20.0,
                _ => (0.1 * default.abs()).max(0.1),
            })
            .collect();
        Ok(Self {
            machine,
            hypothesis,
            priors,
            prior_only: false,
            step_sizes,
        })
    }

    /// Ignore the data and sample from the prior.
    pub fn with_prior_only(mut self, prior_only: bool) -> Self {
        self.prior_only = prior_only;
        self
    }

    /// Standard deviations of the Gaussian parameter proposals.
    pub fn with_step_sizes(mut self, step_sizes: Vec<f64>) -> LikelihoodResult<Self> {
        if step_sizes.len() != self.step_sizes.len() {
            return Err(LikelihoodError::LengthMismatch {
                expected: self.step_sizes.len(),
                actual: step_sizes.len(),
            });
        }
        self.step_sizes = step_sizes;
        Ok(self)
    }

    pub fn log_posterior(&self, parameters: &[f64], toy_index: usize) -> LikelihoodResult<f64> {
        let prior = self.priors.log_prior(parameters, toy_index)?;
        if prior == f64::NEG_INFINITY || self.prior_only {
            return Ok(prior);
        }
        let truth = self.hypothesis.translate(parameters);
        match self
            .machine
            .log_likelihood(&truth, Systematics::Toy(toy_index))
        {
            Ok(ll) => Ok(prior + ll),
            Err(LikelihoodError::AboveTruthLimit { .. }) => Ok(f64::NEG_INFINITY),
            Err(e) => Err(e),
        }
    }

    fn accept<R: Rng + ?Sized>(delta: f64, rng: &mut R) -> bool {
        delta >= 0.0 || rng.gen::<f64>().ln() < delta
    }

    /// Draw `n_samples` samples, keeping every `thin`-th step after
    /// discarding `burn_in` steps.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n_samples: usize,
        burn_in: usize,
        thin: usize,
        rng: &mut R,
    ) -> LikelihoodResult<Trace> {
        let thin = thin.max(1);
        let n_toys = self.machine.n_toys();
        let mut parameters = self.priors.default_values();
        let mut toy = 0;
        let mut log_posterior = self.log_posterior(&parameters, toy)?;
        if !log_posterior.is_finite() {
            return Err(LikelihoodError::ZeroProbability);
        }

        let mut trace = Trace::default();
        let mut accepted = 0;
        let steps = burn_in + n_samples * thin;
        for step in 0..steps {
            let proposal: Vec<f64> = parameters
                .iter()
                .zip(&self.step_sizes)
                .map(|(p, s)| p + s * standard_normal(rng))
                .collect();
            let proposed = self.log_posterior(&proposal, toy)?;
            if Self::accept(proposed - log_posterior, rng) {
                parameters = proposal;
                log_posterior = proposed;
                accepted += 1;
            }

            if n_toys > 1 {
                let proposed_toy = rng.gen_range(0..n_toys);
                let proposed = self.log_posterior(&parameters, proposed_toy)?;
                if Self::accept(proposed - log_posterior, rng) {
                    toy = proposed_toy;
                    log_posterior = proposed;
                }
            }

            if step >= burn_in && (step - burn_in) % thin == 0 {
                trace.parameters.push(parameters.clone());
                trace.toy_indices.push(toy);
                trace.log_posteriors.push(log_posterior);
            }
        }
        trace.acceptance_rate = if steps > 0 {
            accepted as f64 / steps as f64
        } else {
            0.0
        };
        debug!(
            "Metropolis sampler drew {} samples, acceptance rate {:.3}",
            trace.len(),
            trace.acceptance_rate
        );
        Ok(trace)
    }
}
