use crate::any::AnyBinning;
use crate::binning::{BinContents, Binning};
use crate::error::{BinningError, BinningResult};
use crate::event::Event;
use crate::grid::{ravel, regrid, unravel};
use crate::phasespace::PhaseSpace;
use serde::{Deserialize, Serialize};

/// The cartesian product of several binnings.
///
/// A bin of the product is a combination of one bin of each component. Bins
/// are numbered in C order of the component bin indices: the first component
/// changes slowest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CartesianProductLayout", into = "CartesianProductLayout")]
pub struct CartesianProductBinning {
    binnings: Vec<AnyBinning>,
    phasespace: PhaseSpace,
    contents: BinContents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CartesianProductLayout {
    binnings: Vec<AnyBinning>,
}

impl TryFrom<CartesianProductLayout> for CartesianProductBinning {
    type Error = BinningError;

    fn try_from(layout: CartesianProductLayout) -> BinningResult<Self> {
        Self::new(layout.binnings)
    }
}

impl From<CartesianProductBinning> for CartesianProductLayout {
    fn from(binning: CartesianProductBinning) -> Self {
        Self {
            binnings: binning.binnings,
        }
    }
}

impl CartesianProductBinning {
    pub fn new(binnings: Vec<AnyBinning>) -> BinningResult<Self> {
        if binnings.is_empty() {
            return Err(BinningError::Incompatible {
                message: "a cartesian product needs at least one binning".to_string(),
            });
        }
        Ok(Self::assemble(binnings))
    }

    fn assemble(mut binnings: Vec<AnyBinning>) -> Self {
        // Components only describe the structure; counts live in the product.
        for b in &mut binnings {
            b.reset(0.0);
        }
        let phasespace = binnings
            .iter()
            .fold(PhaseSpace::default(), |ps, b| &ps * b.phasespace());
        let nbins = binnings.iter().map(|b| b.nbins()).product();
        Self {
            binnings,
            phasespace,
            contents: BinContents::new(nbins),
        }
    }

    pub fn binnings(&self) -> &[AnyBinning] {
        &self.binnings
    }

    /// Number of bins of each component.
    pub fn shape(&self) -> Vec<usize> {
        self.binnings.iter().map(|b| b.nbins()).collect()
    }

    /// Component bin indices of a flat bin index.
    pub fn component_indices(&self, index: usize) -> Option<Vec<usize>> {
        unravel(index, &self.shape())
    }

    /// Flat bin index of a combination of component bin indices.
    pub fn flat_index(&self, component_indices: &[usize]) -> Option<usize> {
        ravel(component_indices, &self.shape())
    }

    fn check_components(&self, components: &[usize]) -> BinningResult<()> {
        if let Some(&bad) = components.iter().find(|&&c| c >= self.binnings.len()) {
            return Err(BinningError::IndexOutOfRange {
                index: bad,
                size: self.binnings.len(),
            });
        }
        Ok(())
    }

    fn keep_components(&self, kept: &[usize]) -> BinningResult<CartesianProductBinning> {
        if kept.is_empty() {
            return Err(BinningError::Incompatible {
                message: "cannot remove every component of a cartesian product".to_string(),
            });
        }
        let shape = self.shape();
        let mut binning =
            Self::assemble(kept.iter().map(|&c| self.binnings[c].clone()).collect());
        let maps: Vec<Vec<Option<usize>>> = kept
            .iter()
            .map(|&c| (0..shape[c]).map(Some).collect())
            .collect();
        binning.contents = regrid(&self.contents, &shape, kept, &maps, &binning.shape());
        Ok(binning)
    }

    /// Sum over the given components, keeping the others.
    pub fn marginalize(&self, components: &[usize]) -> BinningResult<CartesianProductBinning> {
        self.check_components(components)?;
        let kept: Vec<usize> = (0..self.binnings.len())
            .filter(|c| !components.contains(c))
            .collect();
        self.keep_components(&kept)
    }

    /// Sum over all components except the given ones.
    pub fn project(&self, components: &[usize]) -> BinningResult<CartesianProductBinning> {
        self.check_components(components)?;
        let mut kept = components.to_vec();
        kept.sort_unstable();
        kept.dedup();
        self.keep_components(&kept)
    }

    /// The component binning `component` carrying the summed counts of all
    /// other components.
    pub fn project_component(&self, component: usize) -> BinningResult<AnyBinning> {
        let projected = self.project(&[component])?;
        let mut binning = self.binnings[component].clone();
        *binning.contents_mut() = projected.contents;
        Ok(binning)
    }
}

impl PartialEq for CartesianProductBinning {
    fn eq(&self, other: &Self) -> bool {
        self.binnings == other.binnings
    }
}

impl Binning for CartesianProductBinning {
    fn phasespace(&self) -> &PhaseSpace {
        &self.phasespace
    }

    fn nbins(&self) -> usize {
        self.contents.len()
    }

    fn event_bin_index(&self, event: &Event) -> BinningResult<Option<usize>> {
        let mut tuple = Vec::with_capacity(self.binnings.len());
        for binning in &self.binnings {
            match binning.event_bin_index(event)? {
                Some(i) => tuple.push(i),
                None => return Ok(None),
            }
        }
        Ok(self.flat_index(&tuple))
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
    use crate::rectilinear::RectilinearBinning;

    fn lin(var: &str) -> AnyBinning {
        RectilinearBinning::linear(var, vec![0.0, 1.0, 2.0])
            .unwrap()
            .into()
    }

    fn xyz() -> CartesianProductBinning {
        CartesianProductBinning::new(vec![lin("x"), lin("y"), lin("z")]).unwrap()
    }

    fn ev(x: f64, y: f64, z: f64) -> Event {
        Event::from([("x", x), ("y", y), ("z", z)])
    }

    #[test]
    fn test_event_bin_index() {
        let b = xyz();
        assert_eq!(b.nbins(), 8);
        assert_eq!(b.event_bin_index(&ev(0.0, 0.0, 0.0)).unwrap(), Some(0));
        assert_eq!(b.event_bin_index(&ev(0.0, 0.0, 1.0)).unwrap(), Some(1));
        assert_eq!(b.event_bin_index(&ev(0.0, 1.0, 0.0)).unwrap(), Some(2));
        assert_eq!(b.event_bin_index(&ev(1.0, 0.0, 0.0)).unwrap(), Some(4));
        assert_eq!(b.event_bin_index(&ev(1.0, 1.0, 1.0)).unwrap(), Some(7));
        assert_eq!(b.event_bin_index(&ev(2.0, 1.0, 1.0)).unwrap(), None);
        assert_eq!(b.component_indices(6), Some(vec![1, 1, 0]));
        assert!(b.phasespace().contains("z"));
    }

    #[test]
    fn test_marginalization_and_projection() {
        let mut b = xyz();
        b.fill(&ev(0.0, 1.0, 0.0), 1.0).unwrap();
        b.fill(&ev(0.0, 1.0, 1.0), 1.0).unwrap();
        assert_eq!(b.entries()[2], 1);
        assert_eq!(b.entries()[3], 1);

        let m = b.marginalize(&[2]).unwrap();
        assert_eq!(m.binnings(), &[lin("x"), lin("y")]);
        assert_eq!(m.entries()[1], 2);

        let p = b.project(&[1]).unwrap();
        assert_eq!(p.binnings(), &[lin("y")]);
        assert_eq!(p.entries(), &[0, 2]);

        let y = b.project_component(1).unwrap();
        assert_eq!(y, lin("y"));
        assert_eq!(y.entries(), &[0, 2]);
        assert_eq!(b.project_component(0).unwrap().entries(), &[2, 0]);

        assert!(b.marginalize(&[3]).is_err());
        assert!(b.marginalize(&[0, 1, 2]).is_err());
    }

    #[test]
    fn test_components_do_not_carry_counts() {
        let mut x = RectilinearBinning::linear("x", vec![0.0, 1.0]).unwrap();
        x.set_values(&[5.0]).unwrap();
        let b = CartesianProductBinning::new(vec![x.into()]).unwrap();
        assert_eq!(b.binnings()[0].values(), &[0.0]);
        assert!(CartesianProductBinning::new(vec![]).is_err());
    }

    #[test]
    fn test_yaml_representation() {
        let b = xyz();
        let yaml = serde_yaml::to_string(&b).unwrap();
        let parsed: CartesianProductBinning = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, b);
        assert_eq!(parsed.nbins(), 8);
    }
}
