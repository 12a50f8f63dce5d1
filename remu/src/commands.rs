//! Operations behind the `remu` subcommands.

use crate::config::AnalysisConfig;
use binning::{AnyBinning, Binning, CsvOptions, Matrix, ResponseMatrix, ResponseMatrixExport};
use likelihood::{LikelihoodMachine, MaxLikelihood, Systematics, ToyOptions};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Fill a response matrix with the simulated events of all `events` files.
pub fn build_response(
    reco: &Path,
    truth: &Path,
    events: &[PathBuf],
    options: &CsvOptions,
) -> CommandResult<ResponseMatrix> {
    let reco = AnyBinning::from_yaml_file(reco)?;
    let truth = AnyBinning::from_yaml_file(truth)?;
    let mut response = ResponseMatrix::new(reco, truth)?;
    for file in events {
        response.fill_from_csv_file(file, options)?;
        debug!("Filled events from {}", file.display());
    }
    info!(
        "Built response matrix with {} truth and {} reco bins",
        response.truth_values().len(),
        response.reco_values().len()
    );
    Ok(response)
}

fn csv_options(config: &AnalysisConfig) -> CsvOptions {
    match &config.weight_field {
        Some(field) => CsvOptions::new().with_weight_field(field.clone()),
        None => CsvOptions::new(),
    }
}

pub fn load_matrices(config: &AnalysisConfig) -> CommandResult<Vec<Matrix>> {
    config
        .response_matrices
        .iter()
        .map(|path| -> CommandResult<Matrix> {
            Ok(ResponseMatrixExport::from_json_file(path)?.matrix)
        })
        .collect()
}

/// Measured reco counts, either given directly or filled from events.
pub fn load_data(config: &AnalysisConfig) -> CommandResult<Vec<f64>> {
    if let Some(data) = &config.data {
        return Ok(data.clone());
    }
    match (&config.data_events, &config.reco_binning) {
        (Some(events), Some(reco)) => {
            let mut binning = AnyBinning::from_yaml_file(reco)?;
            let n = binning.fill_from_csv_file(events, &csv_options(config))?;
            info!("Filled {} data events into the reco binning", n);
            Ok(binning.values().to_vec())
        }
        _ => Err("no data configured".into()),
    }
}

pub fn likelihood_machine(config: &AnalysisConfig) -> CommandResult<LikelihoodMachine> {
    let mut machine = LikelihoodMachine::new(load_data(config)?, load_matrices(config)?)?
        .with_limit_method(config.limit_method)
        .with_efficiency_threshold(config.efficiency_threshold)?
        .with_maximizer(config.maximizer.clone());
    if let Some(limits) = &config.truth_limits {
        machine = machine.with_truth_limits(limits.clone())?;
    }
    Ok(machine)
}

#[derive(Debug, Clone, Serialize)]
pub struct LikelihoodReport {
    pub systematics: Systematics,
    pub log_likelihood: f64,
    pub toy_log_likelihoods: Vec<f64>,
}

pub fn evaluate_likelihood(
    config: &AnalysisConfig,
    truth: &[f64],
) -> CommandResult<LikelihoodReport> {
    let machine = likelihood_machine(config)?;
    Ok(LikelihoodReport {
        systematics: config.systematics,
        log_likelihood: machine.log_likelihood(truth, config.systematics)?,
        toy_log_likelihoods: machine.toy_log_likelihoods(truth)?,
    })
}

pub fn fit(config: &AnalysisConfig) -> CommandResult<MaxLikelihood> {
    let machine = likelihood_machine(config)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    Ok(machine.absolute_max_log_likelihood(config.systematics, &mut rng)?)
}

#[derive(Debug, Clone, Serialize)]
pub struct PValueReport {
    pub p_value: f64,
    pub toys: usize,
    pub systematics: Systematics,
}

pub fn p_value(config: &AnalysisConfig, truth: &[f64]) -> CommandResult<PValueReport> {
    let machine = likelihood_machine(config)?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let options = ToyOptions::new(config.toys).with_systematics(config.systematics);
    Ok(PValueReport {
        p_value: machine.likelihood_p_value(truth, &options, &mut rng)?,
        toys: config.toys * machine.n_toys(),
        systematics: config.systematics,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct EfficiencyReport {
    /// Efficiency of every truth bin, per response matrix.
    pub efficiencies: Vec<Vec<f64>>,
    /// Whether a truth bin takes part in the likelihood.
    pub efficient_bins: Vec<bool>,
}

pub fn efficiencies(config: &AnalysisConfig) -> CommandResult<EfficiencyReport> {
    let machine = likelihood_machine(config)?;
    Ok(EfficiencyReport {
        efficiencies: machine.bin_efficiencies(),
        efficient_bins: machine.efficient_bins().to_vec(),
    })
}
