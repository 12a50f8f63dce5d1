//! Phase spaces: the set of variables that characterise an event.

use crate::error::{BinningError, BinningResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Div, Mul};
use std::str::FromStr;
use std::sync::OnceLock;

/// The cartesian product of a set of named variables.
///
/// Phase spaces compare like sets: `a < b` means `a` is a proper
/// sub-space of `b`. Disjoint phase spaces are not comparable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseSpace {
    variables: BTreeSet<String>,
}

impl PhaseSpace {
    pub fn new<I, S>(variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variables: variables.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.variables.contains(variable)
    }

    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn is_subspace_of(&self, other: &PhaseSpace) -> bool {
        self.variables.is_subset(&other.variables)
    }
}

impl PartialOrd for PhaseSpace {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.variables == other.variables {
            Some(Ordering::Equal)
        } else if self.variables.is_subset(&other.variables) {
            Some(Ordering::Less)
        } else if self.variables.is_superset(&other.variables) {
            Some(Ordering::Greater)
        } else {
            None
        }
    }
}

impl Mul for &PhaseSpace {
    type Output = PhaseSpace;

    fn mul(self, rhs: &PhaseSpace) -> PhaseSpace {
        PhaseSpace {
            variables: self.variables.union(&rhs.variables).cloned().collect(),
        }
    }
}

impl Mul for PhaseSpace {
    type Output = PhaseSpace;

    fn mul(self, rhs: PhaseSpace) -> PhaseSpace {
        &self * &rhs
    }
}

impl Div for &PhaseSpace {
    type Output = PhaseSpace;

    fn div(self, rhs: &PhaseSpace) -> PhaseSpace {
        PhaseSpace {
            variables: self.variables.difference(&rhs.variables).cloned().collect(),
        }
    }
}

impl Div for PhaseSpace {
    type Output = PhaseSpace;

    fn div(self, rhs: PhaseSpace) -> PhaseSpace {
        &self / &rhs
    }
}

impl fmt::Display for PhaseSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.variables.is_empty() {
            return write!(f, "()");
        }
        let joined = self
            .variables
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join("' X '");
        write!(f, "('{}')", joined)
    }
}

fn display_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\('(.+)'\)$").expect("static regex"))
}

impl FromStr for PhaseSpace {
    type Err = BinningError;

    fn from_str(s: &str) -> BinningResult<Self> {
        let s = s.trim();
        if s == "()" {
            return Ok(PhaseSpace::default());
        }
        let captures = display_pattern()
            .captures(s)
            .ok_or_else(|| BinningError::MalformedPhaseSpace {
                input: s.to_string(),
            })?;
        Ok(PhaseSpace::new(captures[1].split("' X '")))
    }
}
