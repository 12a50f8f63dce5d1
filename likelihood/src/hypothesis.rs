//! Composite hypotheses: parametrised families of truth vectors.

use crate::error::{LikelihoodError, LikelihoodResult};
use crate::prior::JeffreysPrior;
use std::fmt;
use std::sync::Arc;

/// Maps a parameter vector to a vector of truth expectation values.
pub type Translation = Arc<dyn Fn(&[f64]) -> Vec<f64> + Send + Sync>;

/// Lower and upper limit of a parameter. `None` means unbounded.
pub type Limit = (Option<f64>, Option<f64>);

/// A univariate prior: log probability density and the value a sampler
/// starts from.
#[derive(Clone)]
pub struct UnivariatePrior {
    log_density: Arc<dyn Fn(f64) -> f64 + Send + Sync>,
    default: f64,
}

impl UnivariatePrior {
    pub fn new(log_density: impl Fn(f64) -> f64 + Send + Sync + 'static, default: f64) -> Self {
        Self {
            log_density: Arc::new(log_density),
            default,
        }
    }

    /// Flat prior on `[lower, upper]`.
    pub fn uniform(lower: f64, upper: f64) -> Self {
        let log_width = -(upper - lower).ln();
        Self::new(
            move |x| {
                if (lower..=upper).contains(&x) {
                    log_width
                } else {
                    f64::NEG_INFINITY
                }
            },
            (lower + upper) / 2.0,
        )
    }

    pub fn log_density(&self, value: f64) -> f64 {
        (self.log_density)(value)
    }

    pub fn default_value(&self) -> f64 {
        self.default
    }
}

impl fmt::Debug for UnivariatePrior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnivariatePrior")
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

/// Prior knowledge about the parameters of a hypothesis.
#[derive(Debug, Clone)]
pub enum Priors {
    /// One independent prior per parameter.
    Univariate(Vec<UnivariatePrior>),
    /// A joint prior over all parameters that may depend on the toy.
    Jeffreys(Box<JeffreysPrior>),
}

impl Priors {
    pub fn n_parameters(&self) -> usize {
        match self {
            Priors::Univariate(priors) => priors.len(),
            Priors::Jeffreys(prior) => prior.n_parameters(),
        }
    }

    pub fn default_values(&self) -> Vec<f64> {
        match self {
            Priors::Univariate(priors) => priors.iter().map(|p| p.default_value()).collect(),
            Priors::Jeffreys(prior) => prior.default_values().to_vec(),
        }
    }

    pub fn log_prior(&self, parameters: &[f64], toy_index: usize) -> LikelihoodResult<f64> {
        match self {
            Priors::Univariate(priors) => {
                if parameters.len() != priors.len() {
                    return Err(LikelihoodError::LengthMismatch {
                        expected: priors.len(),
                        actual: parameters.len(),
                    });
                }
                Ok(priors
                    .iter()
                    .zip(parameters)
                    .map(|(p, &x)| p.log_density(x))
                    .sum())
            }
            Priors::Jeffreys(prior) => prior.log_prior(parameters, toy_index),
        }
    }

    fn fix_parameters(&self, fixed: &[Option<f64>]) -> LikelihoodResult<Priors> {
        match self {
            Priors::Univariate(priors) => Ok(Priors::Univariate(
                priors
                    .iter()
                    .zip(fixed)
                    .filter(|(_, f)| f.is_none())
                    .map(|(p, _)| p.clone())
                    .collect(),
            )),
            Priors::Jeffreys(prior) => Ok(Priors::Jeffreys(Box::new(
                prior.fix_parameters(fixed)?,
            ))),
        }
    }
}

/// Translates parameter vectors into truth vectors.
///
/// At least one of parameter limits and priors must be given; their number
/// determines the number of parameters. Limits are used by maximizers,
/// priors by samplers.
#[derive(Clone)]
pub struct CompositeHypothesis {
    translate: Translation,
    limits: Option<Vec<Limit>>,
    priors: Option<Priors>,
    names: Option<Vec<String>>,
}

impl CompositeHypothesis {
    pub fn new(
        translate: impl Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
        limits: Option<Vec<Limit>>,
        priors: Option<Priors>,
    ) -> LikelihoodResult<Self> {
        Self::from_translation(Arc::new(translate), limits, priors)
    }

    pub fn from_translation(
        translate: Translation,
        limits: Option<Vec<Limit>>,
        priors: Option<Priors>,
    ) -> LikelihoodResult<Self> {
        if limits.is_none() && priors.is_none() {
            return Err(LikelihoodError::InvalidHypothesis {
                message: "must provide parameter limits and/or priors".to_string(),
            });
        }
        Ok(Self {
            translate,
            limits,
            priors,
            names: None,
        })
    }

    /// Hypothesis with parameter limits only.
    pub fn with_limits(
        translate: impl Fn(&[f64]) -> Vec<f64> + Send + Sync + 'static,
        limits: Vec<Limit>,
    ) -> Self {
        Self {
            translate: Arc::new(translate),
            limits: Some(limits),
            priors: None,
            names: None,
        }
    }

    /// The truth vector is a linear combination of templates, one per
    /// parameter.
    pub fn templates(templates: Vec<Vec<f64>>, limits: Vec<Limit>) -> LikelihoodResult<Self> {
        if templates.len() != limits.len() {
            return Err(LikelihoodError::LengthMismatch {
                expected: templates.len(),
                actual: limits.len(),
            });
        }
        let n_truth = templates.first().map_or(0, |t| t.len());
        if let Some(bad) = templates.iter().find(|t| t.len() != n_truth) {
            return Err(LikelihoodError::LengthMismatch {
                expected: n_truth,
                actual: bad.len(),
            });
        }
        Ok(Self::with_limits(
            move |params: &[f64]| {
                let mut truth = vec![0.0; n_truth];
                for (template, &p) in templates.iter().zip(params) {
                    for (t, v) in truth.iter_mut().zip(template) {
                        *t += p * v;
                    }
                }
                truth
            },
            limits,
        ))
    }

    pub fn with_names<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_priors(mut self, priors: Priors) -> Self {
        self.priors = Some(priors);
        self
    }

    pub fn translate(&self, parameters: &[f64]) -> Vec<f64> {
        (self.translate)(parameters)
    }

    pub fn translation(&self) -> &Translation {
        &self.translate
    }

    pub fn limits(&self) -> Option<&[Limit]> {
        self.limits.as_deref()
    }

    /// Parameter limits, unbounded for every parameter if none were given.
    pub fn limits_or_unbounded(&self) -> Vec<Limit> {
        self.limits
            .clone()
            .unwrap_or_else(|| vec![(None, None); self.n_parameters()])
    }

    pub fn priors(&self) -> Option<&Priors> {
        self.priors.as_ref()
    }

    pub fn n_parameters(&self) -> usize {
        match (&self.limits, &self.priors) {
            (Some(limits), _) => limits.len(),
            (None, Some(priors)) => priors.n_parameters(),
            (None, None) => 0,
        }
    }

    /// Parameter names, `par_<i>` where none were given.
    pub fn names(&self) -> Vec<String> {
        match &self.names {
            Some(names) => names.clone(),
            None => (0..self.n_parameters())
                .map(|i| format!("par_{}", i))
                .collect(),
        }
    }

    /// A hypothesis where the `Some` entries of `fixed` are fixed to the
    /// given values. Only the `None` entries remain free parameters.
    pub fn fix_parameters(&self, fixed: &[Option<f64>]) -> LikelihoodResult<CompositeHypothesis> {
        let n = self.n_parameters();
        if fixed.len() != n {
            return Err(LikelihoodError::LengthMismatch {
                expected: n,
                actual: fixed.len(),
            });
        }
        let limits = self.limits.as_ref().map(|l| {
            l.iter()
                .zip(fixed)
                .filter(|(_, f)| f.is_none())
                .map(|(limit, _)| *limit)
                .collect()
        });
        let priors = match &self.priors {
            Some(p) => Some(p.fix_parameters(fixed)?),
            None => None,
        };
        let names = self.names.as_ref().map(|names| {
            names
                .iter()
                .zip(fixed)
                .filter(|(_, f)| f.is_none())
                .map(|(n, _)| n.clone())
                .collect()
        });

        Ok(CompositeHypothesis {
            translate: fixed_translation(self.translate.clone(), fixed.to_vec()),
            limits,
            priors,
            names,
        })
    }
}

/// Wraps a translation so that it takes only the free parameters.
pub(crate) fn fixed_translation(translate: Translation, fixed: Vec<Option<f64>>) -> Translation {
    Arc::new(move |free: &[f64]| {
        let mut free = free.iter();
        let full: Vec<f64> = fixed
            .iter()
            .map(|f| match f {
                Some(v) => *v,
                None => free.next().copied().unwrap_or(f64::NAN),
            })
            .collect();
        translate(&full)
    })
}

impl fmt::Debug for CompositeHypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeHypothesis")
            .field("limits", &self.limits)
            .field("priors", &self.priors)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}
