use binning::CsvOptions;
use clap::{Parser, Subcommand};
use likelihood::Systematics;
use remu::commands;
use remu::config::AnalysisConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "remu")]
#[command(about = "Response matrices and Poisson likelihoods for binned data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a response matrix from simulated events
    Response {
        /// Reco binning (YAML)
        #[arg(long)]
        reco: PathBuf,
        /// Truth binning (YAML)
        #[arg(long)]
        truth: PathBuf,
        /// CSV files of simulated events
        #[arg(short, long, required = true)]
        events: Vec<PathBuf>,
        /// Column holding the event weights
        #[arg(short, long)]
        weight_field: Option<String>,
        /// Output file (stdout if not given)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Log likelihood of a truth vector
    Likelihood {
        /// Analysis configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,
        /// Comma separated truth values
        #[arg(short, long, value_delimiter = ',', required = true)]
        truth: Vec<f64>,
        /// Override the configured systematics treatment
        #[arg(short, long)]
        systematics: Option<Systematics>,
    },
    /// Absolute maximum likelihood truth vector
    Fit {
        /// Analysis configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,
        /// Override the configured random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Likelihood p-value of a truth vector
    PValue {
        /// Analysis configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,
        /// Comma separated truth values
        #[arg(short, long, value_delimiter = ',', required = true)]
        truth: Vec<f64>,
        /// Override the configured number of toy data sets
        #[arg(long)]
        toys: Option<usize>,
        /// Override the configured random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Efficiencies of the truth bins
    Efficiencies {
        /// Analysis configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Response {
            reco,
            truth,
            events,
            weight_field,
            output,
        } => {
            let options = match weight_field {
                Some(field) => CsvOptions::new().with_weight_field(field),
                None => CsvOptions::new(),
            };
            let response = commands::build_response(&reco, &truth, &events, &options)?;
            let json = response.export().to_json_string()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    info!("Wrote response matrix to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Commands::Likelihood {
            config,
            truth,
            systematics,
        } => {
            let mut config = load_config(&config)?;
            if let Some(systematics) = systematics {
                config = config.with_systematics(systematics);
            }
            print_json(&commands::evaluate_likelihood(&config, &truth)?)?;
        }
        Commands::Fit { config, seed } => {
            let mut config = load_config(&config)?;
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            print_json(&commands::fit(&config)?)?;
        }
        Commands::PValue {
            config,
            truth,
            toys,
            seed,
        } => {
            let mut config = load_config(&config)?;
            if let Some(toys) = toys {
                config = config.with_toys(toys);
            }
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }
            print_json(&commands::p_value(&config, &truth)?)?;
        }
        Commands::Efficiencies { config } => {
            let config = load_config(&config)?;
            print_json(&commands::efficiencies(&config)?)?;
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    let config = AnalysisConfig::from_file(path)?;
    info!("Loaded analysis configuration from {}", path.display());
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
