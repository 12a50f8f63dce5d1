use binning::BinningError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LikelihoodError {
    #[error("Binning error: {0}")]
    Binning(#[from] BinningError),

    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Truth value {index} is above allowed limits")]
    AboveTruthLimit { index: usize },

    #[error("Toy index {index} out of range ({ntoys} response matrices)")]
    ToyIndexOutOfRange { index: usize, ntoys: usize },

    #[error("Unknown systematics method: {name}")]
    UnknownSystematics { name: String },

    #[error("Unknown limit method: {name}")]
    UnknownLimitMethod { name: String },

    #[error("Invalid hypothesis: {message}")]
    InvalidHypothesis { message: String },

    #[error("Hypothesis does not define priors")]
    MissingPriors,

    #[error("Maximizer failed: {message}")]
    Maximizer { message: String },

    #[error("Starting point has zero probability")]
    ZeroProbability,

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

pub type LikelihoodResult<T> = Result<T, LikelihoodError>;
