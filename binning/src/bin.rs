use crate::error::{BinningError, BinningResult};
use crate::event::Event;
use crate::phasespace::PhaseSpace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{Add, Div, Mul, Sub};

/// A value container defined on a subset of a phase space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bin {
    pub phasespace: PhaseSpace,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub entries: u64,
    #[serde(default)]
    pub sumw2: f64,
}

impl Bin {
    pub fn new(phasespace: PhaseSpace) -> Self {
        Self {
            phasespace,
            value: 0.0,
            entries: 0,
            sumw2: 0.0,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn fill(&mut self, weight: f64) {
        self.value += weight;
        self.entries += 1;
        self.sumw2 += weight * weight;
    }

    pub fn fill_many(&mut self, weights: &[f64]) {
        for &w in weights {
            self.fill(w);
        }
    }
}

/// Bins are identified by their phase space; accumulated values do not count.
impl PartialEq for Bin {
    fn eq(&self, other: &Self) -> bool {
        self.phasespace == other.phasespace
    }
}

impl Add for &Bin {
    type Output = Bin;

    fn add(self, rhs: &Bin) -> Bin {
        Bin {
            phasespace: self.phasespace.clone(),
            value: self.value + rhs.value,
            entries: self.entries + rhs.entries,
            sumw2: self.sumw2 + rhs.sumw2,
        }
    }
}

impl Sub for &Bin {
    type Output = Bin;

    fn sub(self, rhs: &Bin) -> Bin {
        Bin {
            value: self.value - rhs.value,
            ..self.clone()
        }
    }
}

impl Mul for &Bin {
    type Output = Bin;

    fn mul(self, rhs: &Bin) -> Bin {
        Bin {
            value: self.value * rhs.value,
            ..self.clone()
        }
    }
}

impl Div for &Bin {
    type Output = Bin;

    fn div(self, rhs: &Bin) -> Bin {
        Bin {
            value: self.value / rhs.value,
            ..self.clone()
        }
    }
}

fn default_true() -> bool {
    true
}

/// A bin bounded by lower and upper edges in every one of its variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RectangularBinLayout", into = "RectangularBinLayout")]
pub struct RectangularBin {
    pub phasespace: PhaseSpace,
    pub edges: BTreeMap<String, (f64, f64)>,
    pub include_lower: bool,
    pub include_upper: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RectangularBinLayout {
    phasespace: PhaseSpace,
    edges: BTreeMap<String, (f64, f64)>,
    #[serde(default = "default_true")]
    include_lower: bool,
    #[serde(default)]
    include_upper: bool,
}

impl TryFrom<RectangularBinLayout> for RectangularBin {
    type Error = BinningError;

    fn try_from(layout: RectangularBinLayout) -> BinningResult<Self> {
        Ok(Self::with_phasespace(layout.phasespace, layout.edges)?
            .with_include_lower(layout.include_lower)
            .with_include_upper(layout.include_upper))
    }
}

impl From<RectangularBin> for RectangularBinLayout {
    fn from(bin: RectangularBin) -> Self {
        Self {
            phasespace: bin.phasespace,
            edges: bin.edges,
            include_lower: bin.include_lower,
            include_upper: bin.include_upper,
        }
    }
}

impl RectangularBin {
    /// Create a bin from `(variable, (lower, upper))` pairs on the phase
    /// space spanned by those variables.
    pub fn new<I, S>(edges: I) -> BinningResult<Self>
    where
        I: IntoIterator<Item = (S, (f64, f64))>,
        S: Into<String>,
    {
        let edges: BTreeMap<String, (f64, f64)> =
            edges.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let phasespace = PhaseSpace::new(edges.keys().cloned());
        Self::with_phasespace(phasespace, edges)
    }

    pub fn with_phasespace(
        phasespace: PhaseSpace,
        edges: BTreeMap<String, (f64, f64)>,
    ) -> BinningResult<Self> {
        for (var, &(lower, upper)) in &edges {
            if !phasespace.contains(var) {
                return Err(BinningError::UnknownVariable {
                    variable: var.clone(),
                });
            }
            if upper < lower {
                return Err(BinningError::InvalidEdges {
                    variable: var.clone(),
                    message: "upper edge is smaller than lower edge".to_string(),
                });
            }
        }
        Ok(Self {
            phasespace,
            edges,
            include_lower: true,
            include_upper: false,
        })
    }

    pub fn with_include_lower(mut self, include: bool) -> Self {
        self.include_lower = include;
        self
    }

    pub fn with_include_upper(mut self, include: bool) -> Self {
        self.include_upper = include;
        self
    }

    pub fn contains(&self, event: &Event) -> BinningResult<bool> {
        for (var, &(lower, upper)) in &self.edges {
            let val = event.value(var)?;
            let above_lower = if self.include_lower {
                val >= lower
            } else {
                val > lower
            };
            let below_upper = if self.include_upper {
                val <= upper
            } else {
                val < upper
            };
            if !(above_lower && below_upper) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn center(&self) -> BTreeMap<String, f64> {
        self.edges
            .iter()
            .map(|(var, &(lower, upper))| (var.clone(), (lower + upper) / 2.0))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect() -> RectangularBin {
        RectangularBin::new([("x", (0.0, 1.0)), ("y", (5.0, f64::INFINITY))]).unwrap()
    }

    #[test]
    fn test_init_values() {
        let ps = PhaseSpace::new(["x"]);
        assert_eq!(Bin::new(ps.clone()).value, 0.0);
        assert_eq!(Bin::new(ps).with_value(2.0).value, 2.0);
    }

    #[test]
    fn test_bin_arithmetic() {
        let ps = PhaseSpace::new(["x"]);
        let b1 = Bin::new(ps.clone()).with_value(1.0);
        let b2 = Bin::new(ps).with_value(2.0);
        assert_eq!((&b1 + &b2).value, 3.0);
        assert_eq!((&b1 - &b2).value, -1.0);
        assert_eq!((&b2 * &b2).value, 4.0);
        assert_eq!((&b1 / &b2).value, 0.5);
    }

    #[test]
    fn test_bin_filling() {
        let mut b = Bin::new(PhaseSpace::new(["x"]));
        b.fill(1.0);
        assert_eq!((b.value, b.entries, b.sumw2), (1.0, 1, 1.0));
        b.fill(0.5);
        assert_eq!((b.value, b.entries, b.sumw2), (1.5, 2, 1.25));
        b.fill_many(&[0.5, 0.5, 0.5]);
        assert_eq!((b.value, b.entries, b.sumw2), (3.0, 5, 2.0));
    }

    #[test]
    fn test_bin_equality_ignores_values() {
        let ps = PhaseSpace::new(["x"]);
        let b0 = Bin::new(ps.clone());
        let mut b1 = Bin::new(ps).with_value(1.0);
        assert_eq!(b0, b1);
        b1.phasespace = &b1.phasespace * &PhaseSpace::new(["abc"]);
        assert_ne!(b0, b1);
    }

    #[test]
    fn test_inclusion() {
        let b = rect();
        assert!(b.contains(&Event::from([("x", 0.5), ("y", 10.0)])).unwrap());
        assert!(!b.contains(&Event::from([("x", -0.5), ("y", 10.0)])).unwrap());
        assert!(!b.contains(&Event::from([("x", 0.5), ("y", -10.0)])).unwrap());
        assert!(b.contains(&Event::from([("x", 0.5)])).is_err());
    }

    #[test]
    fn test_include_lower_and_upper() {
        let b = rect().with_include_lower(false);
        assert!(!b.contains(&Event::from([("x", 0.0), ("y", 10.0)])).unwrap());
        let b = rect();
        assert!(b.contains(&Event::from([("x", 0.0), ("y", 10.0)])).unwrap());
        assert!(!b.contains(&Event::from([("x", 1.0), ("y", 10.0)])).unwrap());
        let b = rect().with_include_upper(true);
        assert!(b.contains(&Event::from([("x", 1.0), ("y", 10.0)])).unwrap());
        assert!(!b.contains(&Event::from([("x", 1.5), ("y", 10.0)])).unwrap());
    }

    #[test]
    fn test_invalid_edges() {
        assert!(RectangularBin::new([("x", (1.0, 0.0))]).is_err());
        let ps = PhaseSpace::new(["x"]);
        let mut edges = BTreeMap::new();
        edges.insert("y".to_string(), (0.0, 1.0));
        assert!(RectangularBin::with_phasespace(ps, edges).is_err());
    }

    #[test]
    fn test_bin_centers() {
        let c = rect().center();
        assert_eq!(c["x"], 0.5);
        assert_eq!(c["y"], f64::INFINITY);
    }

    #[test]
    fn test_yaml_representation() {
        let b = rect();
        let yaml = serde_yaml::to_string(&b).unwrap();
        let parsed: RectangularBin = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, b);
        assert_ne!(
            b,
            RectangularBin::new([("x", (1.0, 2.0)), ("y", (5.0, f64::INFINITY))]).unwrap()
        );
    }

    #[test]
    fn test_yaml_rejects_inverted_edges() {
        let bin: RectangularBin =
            serde_yaml::from_str("phasespace: [x]\nedges: {x: [0.0, 1.0]}\n").unwrap();
        assert!(bin.include_lower);
        assert!(!bin.include_upper);

        let inverted =
            serde_yaml::from_str::<RectangularBin>("phasespace: [x]\nedges: {x: [1.0, 0.0]}\n");
        assert!(inverted.is_err());

        let unknown =
            serde_yaml::from_str::<RectangularBin>("phasespace: [x]\nedges: {y: [0.0, 1.0]}\n");
        assert!(unknown.is_err());
    }
}
