use binning::{CsvOptions, ResponseMatrixExport};
use likelihood::Systematics;
use remu::commands;
use remu::config::AnalysisConfig;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn binning_data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("binning")
        .join("tests")
        .join("data")
        .join(name)
}

/// Writes the response matrix of the shared test simulation and an analysis
/// configuration using it.
fn analysis(extra: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let response = commands::build_response(
        &binning_data("reco-binning.yml"),
        &binning_data("truth-binning.yml"),
        &[binning_data("simulation.csv")],
        &CsvOptions::new().with_weight_field("w"),
    )
    .unwrap();
    let json = response.export().to_json_string().unwrap();
    std::fs::write(dir.path().join("response.json"), json).unwrap();

    let config = dir.path().join("analysis.toml");
    std::fs::write(
        &config,
        format!(
            "response_matrices = [\"response.json\"]\ntoys = 200\nseed = 3\n{}",
            extra
        ),
    )
    .unwrap();
    (dir, config)
}

#[test]
fn test_build_response() {
    let response = commands::build_response(
        &binning_data("reco-binning.yml"),
        &binning_data("truth-binning.yml"),
        &[binning_data("simulation.csv"), binning_data("simulation.csv")],
        &CsvOptions::new().with_weight_field("w"),
    )
    .unwrap();
    assert_eq!(response.truth_values(), &[8.0, 2.0, 2.0, 8.0]);

    let export = response.export();
    let parsed: ResponseMatrixExport =
        serde_json::from_str(&export.to_json_string().unwrap()).unwrap();
    assert_eq!(parsed, export);
    assert_eq!(parsed.matrix.nrows(), 3);
    assert_eq!(parsed.matrix.ncols(), 4);
}

#[test]
fn test_likelihood_from_config() {
    let (_dir, path) = analysis("data = [2, 4, 2]\n");
    let config = AnalysisConfig::from_file(&path).unwrap();
    let report = commands::evaluate_likelihood(&config, &[4.0, 1.0, 1.0, 4.0]).unwrap();
    assert!(report.log_likelihood.is_finite());
    assert_eq!(report.toy_log_likelihoods, vec![report.log_likelihood]);
    assert!(commands::evaluate_likelihood(&config, &[1.0]).is_err());
}

#[test]
fn test_data_from_events() {
    let extra = format!(
        "data_events = \"{}\"\nreco_binning = \"{}\"\nweight_field = \"w\"\n",
        binning_data("simulation.csv").display(),
        binning_data("reco-binning.yml").display()
    );
    let (_dir, path) = analysis(&extra);
    let config = AnalysisConfig::from_file(&path).unwrap();
    assert_eq!(commands::load_data(&config).unwrap(), vec![2.0, 4.5, 1.5]);
}

#[test]
fn test_fit_and_p_value() {
    let (_dir, path) = analysis("data = [2, 4, 2]\n");
    let config = AnalysisConfig::from_file(&path).unwrap();

    let best = commands::fit(&config).unwrap();
    assert_eq!(best.parameters.len(), 4);
    assert_eq!(best.toy_index, Some(0));
    let at_best = commands::evaluate_likelihood(&config, &best.parameters).unwrap();
    assert!((at_best.log_likelihood - best.log_likelihood).abs() < 1e-9);

    let report = commands::p_value(&config, &best.parameters).unwrap();
    assert!(report.p_value > 0.5);
    assert_eq!(report.toys, 200);
    assert_eq!(report.systematics, Systematics::Profile);

    let again = commands::p_value(&config, &best.parameters).unwrap();
    assert_eq!(again.p_value, report.p_value);
}

#[test]
fn test_efficiencies() {
    let (_dir, path) = analysis("data = [2, 4, 2]\nefficiency_threshold = 0.6\n");
    let config = AnalysisConfig::from_file(&path).unwrap();
    let report = commands::efficiencies(&config).unwrap();
    assert_eq!(report.efficiencies, vec![vec![0.5, 1.0, 1.0, 1.0]]);
    assert_eq!(report.efficient_bins, vec![false, true, true, true]);
}

#[test]
fn test_missing_response_matrix() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("analysis.toml");
    std::fs::write(&path, "response_matrices = [\"missing.json\"]\ndata = [1]\n").unwrap();
    let config = AnalysisConfig::from_file(&path).unwrap();
    assert!(commands::fit(&config).is_err());
}
