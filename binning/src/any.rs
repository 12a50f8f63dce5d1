use crate::binning::{BinContents, Binning};
use crate::cartesian::CartesianProductBinning;
use crate::error::BinningResult;
use crate::event::Event;
use crate::phasespace::PhaseSpace;
use crate::rectangular::RectangularBinning;
use crate::rectilinear::RectilinearBinning;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Any of the concrete binnings. This is the unit binning files are read
/// from and written to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnyBinning {
    Rectangular(RectangularBinning),
    Rectilinear(RectilinearBinning),
    CartesianProduct(CartesianProductBinning),
}

macro_rules! delegate {
    ($self:expr, $b:ident => $body:expr) => {
        match $self {
            AnyBinning::Rectangular($b) => $body,
            AnyBinning::Rectilinear($b) => $body,
            AnyBinning::CartesianProduct($b) => $body,
        }
    };
}

impl AnyBinning {
    pub fn from_yaml_str(yaml: &str) -> BinningResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_yaml_file(path: &Path) -> BinningResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml_string(&self) -> BinningResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnyBinning::Rectangular(_) => "rectangular",
            AnyBinning::Rectilinear(_) => "rectilinear",
            AnyBinning::CartesianProduct(_) => "cartesian_product",
        }
    }
}

impl Binning for AnyBinning {
    fn phasespace(&self) -> &PhaseSpace {
        delegate!(self, b => b.phasespace())
    }

    fn nbins(&self) -> usize {
        delegate!(self, b => b.nbins())
    }

    fn event_bin_index(&self, event: &Event) -> BinningResult<Option<usize>> {
        delegate!(self, b => b.event_bin_index(event))
    }

    fn contents(&self) -> &BinContents {
        delegate!(self, b => b.contents())
    }

    fn contents_mut(&mut self) -> &mut BinContents {
        delegate!(self, b => b.contents_mut())
    }
}

impl From<RectangularBinning> for AnyBinning {
    fn from(binning: RectangularBinning) -> Self {
        AnyBinning::Rectangular(binning)
    }
}

impl From<RectilinearBinning> for AnyBinning {
    fn from(binning: RectilinearBinning) -> Self {
        AnyBinning::Rectilinear(binning)
    }
}

impl From<CartesianProductBinning> for AnyBinning {
    fn from(binning: CartesianProductBinning) -> Self {
        AnyBinning::CartesianProduct(binning)
    }
}
