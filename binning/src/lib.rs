pub mod any;
pub mod bin;
pub mod binning;
pub mod cartesian;
pub mod csv;
pub mod error;
pub mod event;
mod grid;
pub mod matrix;
pub mod phasespace;
pub mod rectangular;
pub mod rectilinear;
pub mod response;

pub use any::AnyBinning;
pub use bin::{Bin, RectangularBin};
pub use binning::{BinContents, Binning, Weights};
pub use cartesian::CartesianProductBinning;
pub use csv::{read_events, CsvOptions};
pub use error::{BinningError, BinningResult};
pub use event::Event;
pub use matrix::Matrix;
pub use phasespace::PhaseSpace;
pub use rectangular::RectangularBinning;
pub use rectilinear::RectilinearBinning;
pub use response::{ResponseMatrix, ResponseMatrixExport};

pub mod prelude {
    pub use crate::any::*;
    pub use crate::binning::*;
    pub use crate::cartesian::*;
    pub use crate::event::*;
    pub use crate::phasespace::*;
    pub use crate::rectangular::*;
    pub use crate::rectilinear::*;
    pub use crate::response::*;
}
