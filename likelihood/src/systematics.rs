//! Treatment of the systematic variations given by several response matrices.

use crate::error::{LikelihoodError, LikelihoodResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the likelihoods obtained with several response matrices (toys) are
/// combined into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Systematics {
    /// The maximum over all toys.
    #[default]
    Profile,
    /// The logarithm of the average probability.
    Marginal,
    /// The likelihood of one specific toy.
    Toy(usize),
}

impl Systematics {
    /// Combine the log likelihoods of all toys.
    pub fn collapse(&self, log_likelihoods: &[f64]) -> LikelihoodResult<f64> {
        if log_likelihoods.is_empty() {
            return Err(LikelihoodError::InvalidArgument {
                message: "no log likelihoods to combine".to_string(),
            });
        }
        match *self {
            Systematics::Profile => Ok(log_likelihoods
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max)),
            Systematics::Marginal => Ok(log_mean_exp(log_likelihoods)),
            Systematics::Toy(i) => {
                log_likelihoods
                    .get(i)
                    .copied()
                    .ok_or(LikelihoodError::ToyIndexOutOfRange {
                        index: i,
                        ntoys: log_likelihoods.len(),
                    })
            }
        }
    }
}

/// `ln(mean(exp(values)))` without overflow.
pub(crate) fn log_mean_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + (sum / values.len() as f64).ln()
}

impl fmt::Display for Systematics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Systematics::Profile => write!(f, "profile"),
            Systematics::Marginal => write!(f, "marginal"),
            Systematics::Toy(i) => write!(f, "{}", i),
        }
    }
}

impl FromStr for Systematics {
    type Err = LikelihoodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "profile" | "maximum" => Ok(Systematics::Profile),
            "marginal" | "average" => Ok(Systematics::Marginal),
            other => other
                .parse::<usize>()
                .map(Systematics::Toy)
                .map_err(|_| LikelihoodError::UnknownSystematics {
                    name: s.to_string(),
                }),
        }
    }
}

impl TryFrom<String> for Systematics {
    type Error = LikelihoodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Systematics> for String {
    fn from(value: Systematics) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> Vec<f64> {
        (1..=5).map(|i| (i as f64).ln()).collect()
    }

    #[test]
    fn test_marginal_systematics() {
        let ll = Systematics::Marginal.collapse(&data()).unwrap();
        assert!((ll.exp() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_profile_systematics() {
        let ll = Systematics::Profile.collapse(&data()).unwrap();
        assert!((ll.exp() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_toy_systematics() {
        assert_eq!(Systematics::Toy(1).collapse(&data()).unwrap(), 2.0f64.ln());
        assert!(matches!(
            Systematics::Toy(5).collapse(&data()),
            Err(LikelihoodError::ToyIndexOutOfRange { index: 5, ntoys: 5 })
        ));
    }

    #[test]
    fn test_marginal_of_tiny_probabilities() {
        let ll = Systematics::Marginal.collapse(&[-1000.0, -1000.0]).unwrap();
        assert!((ll + 1000.0).abs() < 1e-9);
        let ll = Systematics::Marginal
            .collapse(&[f64::NEG_INFINITY, 0.0])
            .unwrap();
        assert!((ll - 0.5f64.ln()).abs() < 1e-12);
        assert_eq!(
            Systematics::Marginal
                .collapse(&[f64::NEG_INFINITY; 3])
                .unwrap(),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn test_parse() {
        assert_eq!("maximum".parse::<Systematics>().unwrap(), Systematics::Profile);
        assert_eq!("Average".parse::<Systematics>().unwrap(), Systematics::Marginal);
        assert_eq!("3".parse::<Systematics>().unwrap(), Systematics::Toy(3));
        assert!("median".parse::<Systematics>().is_err());
        let json = serde_json::to_string(&Systematics::Marginal).unwrap();
        assert_eq!(json, "\"marginal\"");
        let parsed: Systematics = serde_json::from_str("\"2\"").unwrap();
        assert_eq!(parsed, Systematics::Toy(2));
    }
}
