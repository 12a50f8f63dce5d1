use crate::bin::RectangularBin;
use crate::binning::{BinContents, Binning};
use crate::error::{BinningError, BinningResult};
use crate::event::Event;
use crate::phasespace::PhaseSpace;
use serde::{Deserialize, Serialize};

/// An ordered list of rectangular bins. Events go to the first bin that
/// contains them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RectangularBinningLayout", into = "RectangularBinningLayout")]
pub struct RectangularBinning {
    phasespace: PhaseSpace,
    bins: Vec<RectangularBin>,
    contents: BinContents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RectangularBinningLayout {
    phasespace: PhaseSpace,
    bins: Vec<RectangularBin>,
}

impl TryFrom<RectangularBinningLayout> for RectangularBinning {
    type Error = BinningError;

    fn try_from(layout: RectangularBinningLayout) -> BinningResult<Self> {
        Self::with_phasespace(layout.phasespace, layout.bins)
    }
}

impl From<RectangularBinning> for RectangularBinningLayout {
    fn from(binning: RectangularBinning) -> Self {
        Self {
            phasespace: binning.phasespace,
            bins: binning.bins,
        }
    }
}

impl RectangularBinning {
    /// Create a binning on the phase space of its bins.
    pub fn new(bins: Vec<RectangularBin>) -> BinningResult<Self> {
        let phasespace = bins
            .first()
            .map(|b| b.phasespace.clone())
            .unwrap_or_default();
        Self::with_phasespace(phasespace, bins)
    }

    pub fn with_phasespace(phasespace: PhaseSpace, bins: Vec<RectangularBin>) -> BinningResult<Self> {
        if let Some(bad) = bins.iter().find(|b| b.phasespace != phasespace) {
            return Err(BinningError::Incompatible {
                message: format!(
                    "phase space of bin {} does not match phase space of binning {}",
                    bad.phasespace, phasespace
                ),
            });
        }
        let contents = BinContents::new(bins.len());
        Ok(Self {
            phasespace,
            bins,
            contents,
        })
    }

    /// Create a binning from per-bin edge lists, one `(lower, upper)` pair
    /// per variable in the order of `variables`.
    pub fn from_edges(variables: &[&str], edges: &[Vec<(f64, f64)>]) -> BinningResult<Self> {
        let bins = edges
            .iter()
            .map(|bin_edges| {
                if bin_edges.len() != variables.len() {
                    return Err(BinningError::LengthMismatch {
                        expected: variables.len(),
                        actual: bin_edges.len(),
                    });
                }
                RectangularBin::new(variables.iter().copied().zip(bin_edges.iter().copied()))
            })
            .collect::<BinningResult<Vec<_>>>()?;
        Self::with_phasespace(PhaseSpace::new(variables.iter().copied()), bins)
    }

    pub fn bins(&self) -> &[RectangularBin] {
        &self.bins
    }
}

impl PartialEq for RectangularBinning {
    fn eq(&self, other: &Self) -> bool {
        self.phasespace == other.phasespace && self.bins == other.bins
    }
}

impl Binning for RectangularBinning {
    fn phasespace(&self) -> &PhaseSpace {
        &self.phasespace
    }

    fn nbins(&self) -> usize {
        self.bins.len()
    }

    fn event_bin_index(&self, event: &Event) -> BinningResult<Option<usize>> {
        for (i, bin) in self.bins.iter().enumerate() {
            if bin.contains(event)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    fn contents(&self) -> &BinContents {
        &self.contents
    }

    fn contents_mut(&mut self) -> &mut BinContents {
        &mut self.contents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::Weights;
    use std::collections::HashMap;

    fn two_bins() -> RectangularBinning {
        let b0 = RectangularBin::new([("x", (0.0, 1.0)), ("y", (5.0, f64::INFINITY))]).unwrap();
        let b1 = RectangularBin::new([("x", (1.0, 2.0)), ("y", (5.0, f64::INFINITY))]).unwrap();
        RectangularBinning::new(vec![b0, b1]).unwrap()
    }

    fn ev(x: f64, y: f64) -> Event {
        Event::from([("x", x), ("y", y)])
    }

    #[test]
    fn test_get_bin_indices() {
        let binning = two_bins();
        assert_eq!(binning.event_bin_index(&ev(0.0, 10.0)).unwrap(), Some(0));
        assert_eq!(binning.event_bin_index(&ev(1.0, 10.0)).unwrap(), Some(1));
        assert_eq!(binning.event_bin_index(&ev(2.0, 10.0)).unwrap(), None);
        assert!(binning.contains(&ev(0.5, 10.0)).unwrap());
        assert!(!binning.contains(&ev(2.5, 10.0)).unwrap());
    }

    #[test]
    fn test_fill() {
        let mut binning = two_bins();
        binning.fill(&ev(0.5, 10.0), 1.0).unwrap();
        binning.fill(&ev(1.5, 10.0), 2.0).unwrap();
        assert_eq!(binning.values(), &[1.0, 2.0]);
        assert_eq!(binning.entries(), &[1, 1]);

        binning
            .fill_events(&[ev(0.5, 10.0), ev(0.5, 20.0)], Weights::Uniform(2.0))
            .unwrap();
        assert_eq!(binning.values(), &[5.0, 2.0]);
        assert_eq!(binning.entries(), &[3, 1]);

        binning
            .fill_events(&[ev(0.5, 10.0), ev(1.5, 10.0)], Weights::PerEvent(&[1.0, 2.0]))
            .unwrap();
        assert_eq!(binning.values(), &[6.0, 4.0]);

        let mut rename = HashMap::new();
        rename.insert("z".to_string(), "y".to_string());
        let renamed: Vec<Event> = [(-0.5, 10.0), (1.5, 10.0)]
            .iter()
            .map(|&(x, z)| Event::from([("x", x), ("z", z)]).renamed(&rename))
            .collect();
        let binned = binning
            .fill_events(&renamed, Weights::PerEvent(&[1.0, 2.0]))
            .unwrap();
        assert_eq!(binned, 1);
        assert_eq!(binning.values(), &[6.0, 6.0]);
        assert_eq!(binning.entries(), &[4, 3]);

        assert!(matches!(
            binning.fill_strict(&ev(-0.5, 10.0), 1.0),
            Err(BinningError::NotInBinning)
        ));
        assert_eq!(binning.values(), &[6.0, 6.0]);

        binning
            .fill(&Event::from([("x", 0.5), ("y", 10.0), ("z", 123.0)]), 1.0)
            .unwrap();
        assert_eq!(binning.values(), &[7.0, 6.0]);

        assert!(matches!(
            binning.fill(&Event::from([("x", 0.5)]), 1.0),
            Err(BinningError::MissingVariable { .. })
        ));

        binning.fill_events(&[], Weights::Uniform(1.0)).unwrap();
        binning.reset(0.0);
        assert_eq!(binning.values(), &[0.0, 0.0]);
        assert_eq!(binning.entries(), &[0, 0]);
        binning.reset(123.0);
        assert_eq!(binning.values(), &[123.0, 123.0]);
    }

    #[test]
    fn test_fill_events_is_atomic() {
        let mut binning = two_bins();
        let events = [ev(0.5, 10.0), Event::from([("x", 0.5)])];
        assert!(binning.fill_events(&events, Weights::Uniform(1.0)).is_err());
        assert_eq!(binning.entries(), &[0, 0]);
        assert!(binning
            .fill_events(&[ev(0.5, 10.0)], Weights::PerEvent(&[1.0, 2.0]))
            .is_err());
    }

    #[test]
    fn test_arrays() {
        let mut binning = two_bins();
        binning
            .fill_events(&[ev(1.5, 10.0), ev(1.5, 10.0)], Weights::Uniform(0.5))
            .unwrap();
        assert_eq!(binning.values(), &[0.0, 1.0]);
        assert_eq!(binning.entries(), &[0, 2]);
        assert_eq!(binning.sumw2(), &[0.0, 0.5]);

        binning.set_values(&[5.0, 10.0]).unwrap();
        binning.set_entries(&[50, 100]).unwrap();
        binning.set_sumw2(&[500.0, 1000.0]).unwrap();
        let bin = binning.bin(1).unwrap();
        assert_eq!((bin.value, bin.entries, bin.sumw2), (10.0, 100, 1000.0));
        assert_eq!(binning.values_at(&[0]).unwrap(), vec![5.0]);
        assert_eq!(binning.entries_at(&[0]).unwrap(), vec![50]);
        assert_eq!(binning.sumw2_at(&[0]).unwrap(), vec![500.0]);
        assert!(binning.set_values(&[1.0]).is_err());
        assert!(binning.bin(2).is_err());
    }

    #[test]
    fn test_equality_and_adding() {
        let binning = two_bins();
        let single = RectangularBinning::new(vec![binning.bins()[0].clone()]).unwrap();
        assert_eq!(binning, binning.clone());
        assert_ne!(binning, single);

        let mut filled = two_bins();
        filled.fill(&ev(0.5, 10.0), 2.0).unwrap();
        let sum = filled.added(&filled).unwrap();
        assert_eq!(sum.values(), &[4.0, 0.0]);
        assert!(filled.added(&single).is_err());
    }

    #[test]
    fn test_mismatched_phasespace() {
        let b0 = RectangularBin::new([("x", (0.0, 1.0))]).unwrap();
        let b1 = RectangularBin::new([("y", (0.0, 1.0))]).unwrap();
        assert!(RectangularBinning::new(vec![b0, b1]).is_err());
    }

    #[test]
    fn test_from_edges() {
        let binning = RectangularBinning::from_edges(
            &["x", "y"],
            &[
                vec![(0.0, 2.0), (0.0, 2.0)],
                vec![(0.0, 1.0), (2.0, 3.0)],
                vec![(1.0, 2.0), (2.0, 3.0)],
            ],
        )
        .unwrap();
        assert_eq!(binning.event_bin_index(&ev(0.0, 0.0)).unwrap(), Some(0));
        assert_eq!(binning.event_bin_index(&ev(1.0, 1.0)).unwrap(), Some(0));
        assert_eq!(binning.event_bin_index(&ev(0.0, 2.0)).unwrap(), Some(1));
        assert_eq!(binning.event_bin_index(&ev(1.0, 2.0)).unwrap(), Some(2));
    }

    #[test]
    fn test_yaml_representation() {
        let mut binning = two_bins();
        binning.fill(&ev(0.5, 10.0), 1.0).unwrap();
        let yaml = serde_yaml::to_string(&binning).unwrap();
        let parsed: RectangularBinning = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, binning);
        assert_eq!(parsed.values(), &[0.0, 0.0]);
    }

    #[test]
    fn test_yaml_rejects_foreign_bins() {
        let ok: RectangularBinning = serde_yaml::from_str(
            "phasespace: [x]\nbins:\n  - phasespace: [x]\n    edges: {x: [0.0, 1.0]}\n",
        )
        .unwrap();
        assert_eq!(ok.nbins(), 1);

        let foreign = serde_yaml::from_str::<RectangularBinning>(
            "phasespace: [x]\nbins:\n  - phasespace: [x, y]\n    edges: {x: [0.0, 1.0], y: [0.0, 1.0]}\n",
        );
        assert!(foreign.is_err());
    }
}
