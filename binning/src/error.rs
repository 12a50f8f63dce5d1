use thiserror::Error;

#[derive(Error, Debug)]
pub enum BinningError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Event is missing variable: {variable}")]
    MissingVariable { variable: String },

    #[error("Variable not part of phase space: {variable}")]
    UnknownVariable { variable: String },

    #[error("Invalid edges for variable {variable}: {message}")]
    InvalidEdges { variable: String, message: String },

    #[error("Event does not fall into any bin")]
    NotInBinning,

    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Index out of range: {index} (size {size})")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Binnings are not compatible: {message}")]
    Incompatible { message: String },

    #[error("Malformed phase space: {input}")]
    MalformedPhaseSpace { input: String },

    #[error("CSV error in {file} line {line}: {message}")]
    Csv {
        file: String,
        line: usize,
        message: String,
    },
}

pub type BinningResult<T> = Result<T, BinningError>;
