//! The likelihood machine: Poisson likelihoods of measured data given truth
//! vectors and one or several response matrices.

use crate::error::{LikelihoodError, LikelihoodResult};
use crate::hypothesis::{CompositeHypothesis, Limit};
use crate::maximizer::Maximizer;
use crate::poisson::{chi2_sf, log_pmf, sample};
use crate::systematics::Systematics;
use binning::Matrix;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// What happens when a truth vector exceeds the truth limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitMethod {
    /// Return an error.
    #[default]
    Raise,
    /// The likelihood is zero.
    Prohibit,
}

impl FromStr for LimitMethod {
    type Err = LikelihoodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raise" => Ok(LimitMethod::Raise),
            "prohibit" => Ok(LimitMethod::Prohibit),
            _ => Err(LikelihoodError::UnknownLimitMethod {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LimitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitMethod::Raise => write!(f, "raise"),
            LimitMethod::Prohibit => write!(f, "prohibit"),
        }
    }
}

/// Result of a likelihood maximisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxLikelihood {
    pub parameters: Vec<f64>,
    pub log_likelihood: f64,
    /// The toy with the highest likelihood at the maximum, for profiled
    /// systematics.
    pub toy_index: Option<usize>,
}

/// Posterior distribution of the log likelihood ratio of two hypotheses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorRatio {
    pub plr: Vec<f64>,
    /// Fraction of ratios that prefer the alternative hypothesis.
    pub preference: f64,
}

/// Settings of Monte Carlo p-value estimates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToyOptions {
    /// Number of generated data sets (per generating matrix).
    pub n: usize,
    /// Response matrix used to generate data. Every matrix generates `n`
    /// data sets if unset.
    pub generator_toy: Option<usize>,
    pub systematics: Systematics,
}

impl Default for ToyOptions {
    fn default() -> Self {
        Self {
            n: 2500,
            generator_toy: None,
            systematics: Systematics::Profile,
        }
    }
}

impl ToyOptions {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            ..Self::default()
        }
    }

    pub fn with_generator_toy(mut self, toy: usize) -> Self {
        self.generator_toy = Some(toy);
        self
    }

    pub fn with_systematics(mut self, systematics: Systematics) -> Self {
        self.systematics = systematics;
        self
    }
}

/// Calculates likelihoods of truth vectors given measured reco data.
///
/// Several response matrices of equal shape describe systematic
/// uncertainties of the detector response. Truth bins that are not
/// reconstructed by any of them are dropped from all calculations.
#[derive(Debug, Clone)]
pub struct LikelihoodMachine {
    data: Vec<f64>,
    matrices: Vec<Matrix>,
    reduced: Vec<Matrix>,
    efficient: Vec<bool>,
    truth_limits: Vec<f64>,
    limit_method: LimitMethod,
    efficiency_threshold: f64,
    maximizer: Maximizer,
}

fn reduce_matrices(
    matrices: &[Matrix],
    threshold: f64,
) -> LikelihoodResult<(Vec<Matrix>, Vec<bool>)> {
    let ncols = matrices.first().map_or(0, |m| m.ncols());
    let mut max_efficiency = vec![f64::NEG_INFINITY; ncols];
    for matrix in matrices {
        for (m, e) in max_efficiency.iter_mut().zip(matrix.column_sums()) {
            *m = m.max(e);
        }
    }
    let efficient: Vec<bool> = max_efficiency.iter().map(|&e| e > threshold).collect();
    let reduced = matrices
        .iter()
        .map(|m| m.select_columns(&efficient))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((reduced, efficient))
}

impl LikelihoodMachine {
    pub fn new(data: Vec<f64>, matrices: Vec<Matrix>) -> LikelihoodResult<Self> {
        let first = matrices.first().ok_or_else(|| LikelihoodError::InvalidArgument {
            message: "at least one response matrix is required".to_string(),
        })?;
        let (nrows, ncols) = (first.nrows(), first.ncols());
        if data.len() != nrows {
            return Err(LikelihoodError::LengthMismatch {
                expected: nrows,
                actual: data.len(),
            });
        }
        if matrices.iter().any(|m| m.nrows() != nrows || m.ncols() != ncols) {
            return Err(LikelihoodError::InvalidArgument {
                message: "response matrices must have equal shapes".to_string(),
            });
        }
        let (reduced, efficient) = reduce_matrices(&matrices, 0.0)?;
        debug!(
            "Likelihood machine with {} toys, {} of {} truth bins efficient",
            matrices.len(),
            efficient.iter().filter(|&&e| e).count(),
            ncols
        );
        Ok(Self {
            data,
            matrices,
            reduced,
            efficient,
            truth_limits: vec![f64::INFINITY; ncols],
            limit_method: LimitMethod::default(),
            efficiency_threshold: 0.0,
            maximizer: Maximizer::default(),
        })
    }

    /// Truth values up to which the response matrices are valid.
    pub fn with_truth_limits(mut self, limits: Vec<f64>) -> LikelihoodResult<Self> {
        if limits.len() != self.n_truth() {
            return Err(LikelihoodError::LengthMismatch {
                expected: self.n_truth(),
                actual: limits.len(),
            });
        }
        self.truth_limits = limits;
        Ok(self)
    }

    pub fn with_limit_method(mut self, method: LimitMethod) -> Self {
        self.limit_method = method;
        self
    }

    /// Drop truth bins whose efficiency does not exceed `threshold` in any
    /// of the response matrices.
    pub fn with_efficiency_threshold(mut self, threshold: f64) -> LikelihoodResult<Self> {
        let (reduced, efficient) = reduce_matrices(&self.matrices, threshold)?;
        self.reduced = reduced;
        self.efficient = efficient;
        self.efficiency_threshold = threshold;
        Ok(self)
    }

    pub fn with_maximizer(mut self, maximizer: Maximizer) -> Self {
        self.maximizer = maximizer;
        self
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn response_matrices(&self) -> &[Matrix] {
        &self.matrices
    }

    pub fn n_toys(&self) -> usize {
        self.matrices.len()
    }

    pub fn n_truth(&self) -> usize {
        self.efficient.len()
    }

    pub fn n_reco(&self) -> usize {
        self.data.len()
    }

    pub fn efficient_bins(&self) -> &[bool] {
        &self.efficient
    }

    pub fn n_efficient(&self) -> usize {
        self.efficient.iter().filter(|&&e| e).count()
    }

    pub fn truth_limits(&self) -> &[f64] {
        &self.truth_limits
    }

    pub fn limit_method(&self) -> LimitMethod {
        self.limit_method
    }

    pub fn efficiency_threshold(&self) -> f64 {
        self.efficiency_threshold
    }

    pub fn maximizer(&self) -> &Maximizer {
        &self.maximizer
    }

    /// Efficiency of every truth bin, one vector per response matrix.
    pub fn bin_efficiencies(&self) -> Vec<Vec<f64>> {
        self.matrices.iter().map(|m| m.column_sums()).collect()
    }

    fn reduce_truth(&self, truth: &[f64]) -> Vec<f64> {
        truth
            .iter()
            .zip(&self.efficient)
            .filter(|(_, &e)| e)
            .map(|(t, _)| *t)
            .collect()
    }

    fn expand_truth(&self, reduced: &[f64]) -> Vec<f64> {
        let mut values = reduced.iter();
        self.efficient
            .iter()
            .map(|&e| if e { values.next().copied().unwrap_or(0.0) } else { 0.0 })
            .collect()
    }

    fn check_length(&self, truth: &[f64]) -> LikelihoodResult<()> {
        if truth.len() != self.n_truth() {
            return Err(LikelihoodError::LengthMismatch {
                expected: self.n_truth(),
                actual: truth.len(),
            });
        }
        Ok(())
    }

    /// Whether the truth vector is within the truth limits.
    fn within_limits(&self, truth: &[f64]) -> LikelihoodResult<bool> {
        self.check_length(truth)?;
        match truth
            .iter()
            .zip(&self.truth_limits)
            .position(|(t, limit)| t > limit)
        {
            None => Ok(true),
            Some(index) => match self.limit_method {
                LimitMethod::Raise => Err(LikelihoodError::AboveTruthLimit { index }),
                LimitMethod::Prohibit => Ok(false),
            },
        }
    }

    fn check_toy(&self, toy: usize) -> LikelihoodResult<()> {
        if toy >= self.n_toys() {
            return Err(LikelihoodError::ToyIndexOutOfRange {
                index: toy,
                ntoys: self.n_toys(),
            });
        }
        Ok(())
    }

    /// Summed Poisson log probability of `data` given the reco expectation
    /// `matrix * truth`. Non-finite results are negative infinity.
    pub fn log_probability(data: &[f64], matrix: &Matrix, truth: &[f64]) -> LikelihoodResult<f64> {
        if data.len() != matrix.nrows() {
            return Err(LikelihoodError::LengthMismatch {
                expected: matrix.nrows(),
                actual: data.len(),
            });
        }
        let reco = matrix.dot(truth)?;
        let lp: f64 = data.iter().zip(&reco).map(|(&k, &mu)| log_pmf(k, mu)).sum();
        Ok(if lp.is_finite() { lp } else { f64::NEG_INFINITY })
    }

    fn reduced_log_likelihoods(
        &self,
        data: &[f64],
        reduced_truth: &[f64],
    ) -> LikelihoodResult<Vec<f64>> {
        self.reduced
            .iter()
            .map(|m| Self::log_probability(data, m, reduced_truth))
            .collect()
    }

    /// Log likelihood of the truth vector for every response matrix.
    pub fn toy_log_likelihoods(&self, truth: &[f64]) -> LikelihoodResult<Vec<f64>> {
        if !self.within_limits(truth)? {
            return Ok(vec![f64::NEG_INFINITY; self.n_toys()]);
        }
        self.reduced_log_likelihoods(&self.data, &self.reduce_truth(truth))
    }

    /// Log likelihood of a truth vector, combining the response matrices as
    /// selected by `systematics`.
    pub fn log_likelihood(&self, truth: &[f64], systematics: Systematics) -> LikelihoodResult<f64> {
        let lls = self.toy_log_likelihoods(truth)?;
        systematics.collapse(&lls)
    }

    fn max_log_probability<T, R>(
        &self,
        data: &[f64],
        reduced_translate: T,
        limits: &[Limit],
        systematics: Systematics,
        rng: &mut R,
    ) -> LikelihoodResult<MaxLikelihood>
    where
        T: Fn(&[f64]) -> Vec<f64>,
        R: Rng + ?Sized,
    {
        if let Systematics::Toy(toy) = systematics {
            self.check_toy(toy)?;
        }
        let objective = |x: &[f64]| {
            self.reduced_log_likelihoods(data, &reduced_translate(x))
                .and_then(|lls| systematics.collapse(&lls))
                .unwrap_or(f64::NEG_INFINITY)
        };
        let optimum = self.maximizer.maximize(objective, limits, rng)?;
        let toy_index = match systematics {
            Systematics::Profile => {
                let lls = self.reduced_log_likelihoods(data, &reduced_translate(&optimum.x))?;
                lls.iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                    .map(|(i, _)| i)
            }
            _ => None,
        };
        Ok(MaxLikelihood {
            parameters: optimum.x,
            log_likelihood: optimum.value,
            toy_index,
        })
    }

    fn check_hypothesis(&self, hypothesis: &CompositeHypothesis) -> LikelihoodResult<()> {
        let start: Vec<f64> = hypothesis
            .limits_or_unbounded()
            .iter()
            .map(|l| l.0.or(l.1).unwrap_or(0.0))
            .collect();
        let truth = hypothesis.translate(&start);
        if truth.len() != self.n_truth() {
            return Err(LikelihoodError::InvalidHypothesis {
                message: format!(
                    "hypothesis produces {} truth values, expected {}",
                    truth.len(),
                    self.n_truth()
                ),
            });
        }
        Ok(())
    }

    fn max_log_likelihood_of_data<R: Rng + ?Sized>(
        &self,
        data: &[f64],
        hypothesis: &CompositeHypothesis,
        systematics: Systematics,
        rng: &mut R,
    ) -> LikelihoodResult<MaxLikelihood> {
        self.max_log_probability(
            data,
            |x: &[f64]| self.reduce_truth(&hypothesis.translate(x)),
            &hypothesis.limits_or_unbounded(),
            systematics,
            rng,
        )
    }

    /// Maximum likelihood of the measured data within a composite
    /// hypothesis.
    pub fn max_log_likelihood<R: Rng + ?Sized>(
        &self,
        hypothesis: &CompositeHypothesis,
        systematics: Systematics,
        rng: &mut R,
    ) -> LikelihoodResult<MaxLikelihood> {
        self.check_hypothesis(hypothesis)?;
        let result = self.max_log_likelihood_of_data(&self.data, hypothesis, systematics, rng)?;
        debug!(
            "Maximum log likelihood {} at {:?}",
            result.log_likelihood, result.parameters
        );
        Ok(result)
    }

    /// Maximum likelihood over all non-negative truth vectors. Truth bins
    /// without efficiency are 0 in the result.
    pub fn absolute_max_log_likelihood<R: Rng + ?Sized>(
        &self,
        systematics: Systematics,
        rng: &mut R,
    ) -> LikelihoodResult<MaxLikelihood> {
        let limits = vec![(Some(0.0), None); self.n_efficient()];
        let mut result =
            self.max_log_probability(&self.data, |x: &[f64]| x.to_vec(), &limits, systematics, rng)?;
        result.parameters = self.expand_truth(&result.parameters);
        info!("Absolute maximum log likelihood {}", result.log_likelihood);
        Ok(result)
    }

    /// Draw `n` Poisson distributed data sets around `matrix * truth`.
    pub fn generate_random_data_sample<R: Rng + ?Sized>(
        matrix: &Matrix,
        truth: &[f64],
        n: usize,
        rng: &mut R,
    ) -> LikelihoodResult<Vec<Vec<f64>>> {
        let mu = matrix.dot(truth)?;
        Ok((0..n)
            .map(|_| mu.iter().map(|&m| sample(m, rng)).collect())
            .collect())
    }

    fn fake_data<R: Rng + ?Sized>(
        &self,
        reduced_truth: &[f64],
        options: &ToyOptions,
        rng: &mut R,
    ) -> LikelihoodResult<Vec<Vec<f64>>> {
        let generators: Vec<&Matrix> = match options.generator_toy {
            Some(toy) => {
                self.check_toy(toy)?;
                vec![&self.reduced[toy]]
            }
            None => self.reduced.iter().collect(),
        };
        let mut fake = Vec::with_capacity(generators.len() * options.n);
        for matrix in generators {
            fake.extend(Self::generate_random_data_sample(
                matrix,
                reduced_truth,
                options.n,
                rng,
            )?);
        }
        if fake.is_empty() {
            return Err(LikelihoodError::InvalidArgument {
                message: "no toy data sets requested".to_string(),
            });
        }
        Ok(fake)
    }

    fn fraction_at_most(values: &[f64], threshold: f64) -> f64 {
        let n = values.iter().filter(|&&v| v <= threshold).count();
        n as f64 / values.len() as f64
    }

    /// Probability to measure data as unlikely as or more unlikely than the
    /// actual data, if the truth vector is true.
    pub fn likelihood_p_value<R: Rng + ?Sized>(
        &self,
        truth: &[f64],
        options: &ToyOptions,
        rng: &mut R,
    ) -> LikelihoodResult<f64> {
        self.check_length(truth)?;
        let reduced_truth = self.reduce_truth(truth);
        let systematics = options.systematics;
        let p0 = systematics.collapse(&self.reduced_log_likelihoods(&self.data, &reduced_truth)?)?;

        let fake = self.fake_data(&reduced_truth, options, rng)?;
        let probabilities = fake
            .par_iter()
            .map(|data| {
                let lls = self.reduced_log_likelihoods(data, &reduced_truth)?;
                systematics.collapse(&lls)
            })
            .collect::<LikelihoodResult<Vec<f64>>>()?;

        let p = Self::fraction_at_most(&probabilities, p0);
        info!("Likelihood p-value {} from {} toy data sets", p, fake.len());
        Ok(p)
    }

    /// Probability to measure data with a maximum likelihood as low as or
    /// lower than the likelihood of the actual data.
    ///
    /// Data is generated at `parameters`, or at the maximum likelihood
    /// parameters if none are given.
    pub fn max_likelihood_p_value<R: Rng + ?Sized>(
        &self,
        hypothesis: &CompositeHypothesis,
        parameters: Option<&[f64]>,
        options: &ToyOptions,
        rng: &mut R,
    ) -> LikelihoodResult<f64> {
        self.check_hypothesis(hypothesis)?;
        let systematics = options.systematics;
        let parameters = match parameters {
            Some(p) => p.to_vec(),
            None => self.max_log_likelihood(hypothesis, systematics, rng)?.parameters,
        };
        let truth = self.reduce_truth(&hypothesis.translate(&parameters));
        let fake = self.fake_data(&truth, options, rng)?;
        let seeds: Vec<u64> = fake.iter().map(|_| rng.gen()).collect();

        let maxima = fake
            .par_iter()
            .zip(&seeds)
            .map(|(data, &seed)| {
                let mut toy_rng = StdRng::seed_from_u64(seed);
                self.max_log_likelihood_of_data(data, hypothesis, systematics, &mut toy_rng)
                    .map(|r| r.log_likelihood)
            })
            .collect::<LikelihoodResult<Vec<f64>>>()?;

        let p0 = systematics.collapse(&self.reduced_log_likelihoods(&self.data, &truth)?)?;
        let p = Self::fraction_at_most(&maxima, p0);
        info!(
            "Maximum likelihood p-value {} from {} toy data sets",
            p,
            fake.len()
        );
        Ok(p)
    }

    /// Probability to measure data with a maximum likelihood ratio of `h0`
    /// over `h1` as low as or lower than that of the actual data, if `h0` is
    /// true.
    pub fn max_likelihood_ratio_p_value<R: Rng + ?Sized>(
        &self,
        h0: &CompositeHypothesis,
        h1: &CompositeHypothesis,
        par0: Option<&[f64]>,
        par1: Option<&[f64]>,
        options: &ToyOptions,
        rng: &mut R,
    ) -> LikelihoodResult<f64> {
        self.check_hypothesis(h0)?;
        self.check_hypothesis(h1)?;
        let systematics = options.systematics;
        let par0 = match par0 {
            Some(p) => p.to_vec(),
            None => self.max_log_likelihood(h0, systematics, rng)?.parameters,
        };
        let par1 = match par1 {
            Some(p) => p.to_vec(),
            None => self.max_log_likelihood(h1, systematics, rng)?.parameters,
        };
        let truth0 = self.reduce_truth(&h0.translate(&par0));
        let truth1 = self.reduce_truth(&h1.translate(&par1));

        let fake = self.fake_data(&truth0, options, rng)?;
        let seeds: Vec<u64> = fake.iter().map(|_| rng.gen()).collect();
        let ratios = fake
            .par_iter()
            .zip(&seeds)
            .map(|(data, &seed)| -> LikelihoodResult<f64> {
                let mut toy_rng = StdRng::seed_from_u64(seed);
                let l0 = self.max_log_likelihood_of_data(data, h0, systematics, &mut toy_rng)?;
                let l1 = self.max_log_likelihood_of_data(data, h1, systematics, &mut toy_rng)?;
                Ok(l0.log_likelihood - l1.log_likelihood)
            })
            .collect::<LikelihoodResult<Vec<f64>>>()?;

        let l0 = systematics.collapse(&self.reduced_log_likelihoods(&self.data, &truth0)?)?;
        let l1 = systematics.collapse(&self.reduced_log_likelihoods(&self.data, &truth1)?)?;
        let p = Self::fraction_at_most(&ratios, l0 - l1);
        info!(
            "Maximum likelihood ratio p-value {} from {} toy data sets",
            p,
            fake.len()
        );
        Ok(p)
    }

    /// Asymptotic p-value of the maximum likelihood ratio of nested
    /// hypotheses: `2 (L1 - L0)` follows a chi-squared distribution with the
    /// difference of the numbers of free parameters as degrees of freedom.
    pub fn wilks_max_likelihood_ratio_p_value<R: Rng + ?Sized>(
        &self,
        h0: &CompositeHypothesis,
        h1: &CompositeHypothesis,
        systematics: Systematics,
        rng: &mut R,
    ) -> LikelihoodResult<f64> {
        let dof = h1
            .n_parameters()
            .checked_sub(h0.n_parameters())
            .ok_or_else(|| LikelihoodError::InvalidArgument {
                message: "the alternative hypothesis must have at least as many parameters"
                    .to_string(),
            })?;
        let l0 = self.max_log_likelihood(h0, systematics, rng)?.log_likelihood;
        let l1 = self.max_log_likelihood(h1, systematics, rng)?.log_likelihood;
        let statistic = 2.0 * (l1 - l0);
        let p = chi2_sf(statistic, dof);
        info!("Wilks p-value {} (statistic {}, {} dof)", p, statistic, dof);
        Ok(p)
    }

    /// Posterior distribution of the log likelihood ratio `L1 - L0` from
    /// posterior samples of both hypotheses and their toy indices.
    ///
    /// Every sample of `h1` is paired with every sample of `h0`.
    pub fn plr(
        &self,
        h0: &CompositeHypothesis,
        parameters0: &[Vec<f64>],
        toy_indices0: &[usize],
        h1: &CompositeHypothesis,
        parameters1: &[Vec<f64>],
        toy_indices1: &[usize],
    ) -> LikelihoodResult<PosteriorRatio> {
        let l0 = self.sample_log_likelihoods(h0, parameters0, toy_indices0)?;
        let l1 = self.sample_log_likelihoods(h1, parameters1, toy_indices1)?;
        if l0.is_empty() || l1.is_empty() {
            return Err(LikelihoodError::InvalidArgument {
                message: "posterior samples must not be empty".to_string(),
            });
        }
        let plr: Vec<f64> = l1
            .iter()
            .flat_map(|a| l0.iter().map(move |b| a - b))
            .collect();
        let preference = plr.iter().filter(|&&r| r > 0.0).count() as f64 / plr.len() as f64;
        Ok(PosteriorRatio { plr, preference })
    }

    fn sample_log_likelihoods(
        &self,
        hypothesis: &CompositeHypothesis,
        parameters: &[Vec<f64>],
        toy_indices: &[usize],
    ) -> LikelihoodResult<Vec<f64>> {
        if parameters.len() != toy_indices.len() {
            return Err(LikelihoodError::LengthMismatch {
                expected: parameters.len(),
                actual: toy_indices.len(),
            });
        }
        parameters
            .iter()
            .zip(toy_indices)
            .map(|(p, &toy)| self.log_likelihood(&hypothesis.translate(p), Systematics::Toy(toy)))
            .collect()
    }
}
