pub mod commands;
pub mod config;

pub use commands::{CommandResult, EfficiencyReport, LikelihoodReport, PValueReport};
pub use config::{AnalysisConfig, ConfigError, ConfigResult};
