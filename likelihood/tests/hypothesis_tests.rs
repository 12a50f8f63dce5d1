use binning::{AnyBinning, CsvOptions, Matrix, ResponseMatrix};
use likelihood::poisson::log_pmf;
use likelihood::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

fn data() -> Vec<f64> {
    vec![0.0, 1.0, 2.0, 3.0]
}

fn machine() -> LikelihoodMachine {
    LikelihoodMachine::new(data(), vec![Matrix::identity(4)]).unwrap()
}

fn free_hypothesis() -> CompositeHypothesis {
    CompositeHypothesis::with_limits(|x: &[f64]| x.to_vec(), vec![(Some(0.0), None); 4])
}

fn rng() -> StdRng {
    StdRng::seed_from_u64(1337)
}

fn binning_data(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("binning")
        .join("tests")
        .join("data")
        .join(name)
}

#[test]
fn test_absolute_max_log_likelihood() {
    let m = machine();
    let result = m
        .absolute_max_log_likelihood(Systematics::Profile, &mut rng())
        .unwrap();
    assert_eq!(result.parameters.len(), 4);
    for (p, d) in result.parameters.iter().zip(data()) {
        assert!((p - d).abs() < 1e-2, "{:?}", result.parameters);
    }
    assert!((result.log_likelihood + 3.802_775_422_663_78).abs() < 1e-6);
    assert_eq!(result.toy_index, Some(0));
}

#[test]
fn test_max_log_likelihood_of_composite_hypothesis() {
    let m = machine();
    // One common normalisation of a flat truth distribution.
    let h = CompositeHypothesis::templates(vec![vec![1.0; 4]], vec![(Some(0.0), None)]).unwrap();
    let result = m
        .max_log_likelihood(&h, Systematics::Profile, &mut rng())
        .unwrap();
    assert!((result.parameters[0] - 1.5).abs() < 1e-3);

    let wrong = CompositeHypothesis::with_limits(|x: &[f64]| x.to_vec(), vec![(None, None); 3]);
    assert!(m
        .max_log_likelihood(&wrong, Systematics::Profile, &mut rng())
        .is_err());
}

#[test]
fn test_likelihood_p_value() {
    let m = machine();
    let options = ToyOptions::new(500);
    let p = m.likelihood_p_value(&data(), &options, &mut rng()).unwrap();
    assert!(p > 0.75, "p = {}", p);
    let p = m
        .likelihood_p_value(&[1.0, 1.0, 1.0, 0.0], &options, &mut rng())
        .unwrap();
    assert_eq!(p, 0.0);
    assert!(m.likelihood_p_value(&[1.0; 3], &options, &mut rng()).is_err());
}

#[test]
fn test_p_value_is_reproducible() {
    let m = machine();
    let options = ToyOptions::new(200);
    let a = m.likelihood_p_value(&[1.0; 4], &options, &mut rng()).unwrap();
    let b = m.likelihood_p_value(&[1.0; 4], &options, &mut rng()).unwrap();
    assert_eq!(a, b);
    assert!((0.0..=1.0).contains(&a));
}

#[test]
fn test_p_value_with_several_generators() {
    let mut half = Matrix::identity(4);
    for i in 0..4 {
        half.set(i, i, 0.5);
    }
    let m = LikelihoodMachine::new(data(), vec![Matrix::identity(4), half]).unwrap();
    let all = ToyOptions::new(100).with_systematics(Systematics::Marginal);
    let p = m.likelihood_p_value(&[0.0, 2.0, 4.0, 6.0], &all, &mut rng()).unwrap();
    assert!((0.0..=1.0).contains(&p));
    let one = all.with_generator_toy(1);
    assert!(m.likelihood_p_value(&[0.0, 2.0, 4.0, 6.0], &one, &mut rng()).is_ok());
    let bad = all.with_generator_toy(2);
    assert!(matches!(
        m.likelihood_p_value(&[0.0, 2.0, 4.0, 6.0], &bad, &mut rng()),
        Err(LikelihoodError::ToyIndexOutOfRange { index: 2, ntoys: 2 })
    ));
}

#[test]
fn test_max_likelihood_p_value_of_fixed_hypothesis() {
    let m = machine();
    let h = free_hypothesis()
        .fix_parameters(&[Some(1.0), Some(1.0), Some(1.0), Some(0.0)])
        .unwrap();
    assert_eq!(h.n_parameters(), 0);
    let p = m
        .max_likelihood_p_value(&h, None, &ToyOptions::new(100), &mut rng())
        .unwrap();
    assert_eq!(p, 0.0);
}

#[test]
fn test_max_likelihood_p_value() {
    let m = machine();
    let h = CompositeHypothesis::templates(vec![vec![1.0; 4]], vec![(Some(0.0), Some(20.0))])
        .unwrap()
        .with_names(["norm"]);
    let options = ToyOptions::new(50);
    let p = m.max_likelihood_p_value(&h, None, &options, &mut rng()).unwrap();
    assert!((0.0..=1.0).contains(&p));
    let p_fixed = m
        .max_likelihood_p_value(&h, Some(&[1.5]), &options, &mut rng())
        .unwrap();
    assert!((0.0..=1.0).contains(&p_fixed));
}

#[test]
fn test_max_likelihood_ratio_p_value() {
    let m = machine();
    let h1 = free_hypothesis();
    let h0 = h1.fix_parameters(&[None, None, None, Some(3.0)]).unwrap();
    let options = ToyOptions::new(40);
    let p = m
        .max_likelihood_ratio_p_value(&h0, &h1, None, None, &options, &mut rng())
        .unwrap();
    assert!(p > 0.7, "p = {}", p);
}

#[test]
fn test_wilks_max_likelihood_ratio_p_value() {
    let m = machine();
    let h1 = free_hypothesis();

    let h0 = h1.fix_parameters(&[None, None, None, Some(3.0)]).unwrap();
    let p = m
        .wilks_max_likelihood_ratio_p_value(&h0, &h1, Systematics::Profile, &mut rng())
        .unwrap();
    assert!(p > 0.99, "p = {}", p);

    let h0 = h1.fix_parameters(&[None, None, None, Some(10.0)]).unwrap();
    let p = m
        .wilks_max_likelihood_ratio_p_value(&h0, &h1, Systematics::Profile, &mut rng())
        .unwrap();
    assert!(p < 0.05, "p = {}", p);

    assert!(m
        .wilks_max_likelihood_ratio_p_value(&h1, &h0, Systematics::Profile, &mut rng())
        .is_err());
}

#[test]
fn test_posterior_likelihood_ratio() {
    let m = machine();
    let priors = |n: usize| Priors::Univariate(vec![UnivariatePrior::uniform(0.0, 10.0); n]);
    let h1 = CompositeHypothesis::new(|x: &[f64]| x.to_vec(), None, Some(priors(4))).unwrap();
    let h0 = h1.fix_parameters(&[None, None, None, Some(9.0)]).unwrap();

    let mut rng = rng();
    let t1 = MetropolisSampler::new(&m, &h1)
        .unwrap()
        .with_step_sizes(vec![0.5; 4])
        .unwrap()
        .sample(200, 200, 2, &mut rng)
        .unwrap();
    let t0 = MetropolisSampler::new(&m, &h0)
        .unwrap()
        .sample(200, 200, 2, &mut rng)
        .unwrap();
    let ratio = m
        .plr(
            &h0,
            &t0.parameters,
            &t0.toy_indices,
            &h1,
            &t1.parameters,
            &t1.toy_indices,
        )
        .unwrap();
    assert_eq!(ratio.plr.len(), 200 * 200);
    assert!(ratio.preference > 0.5, "{}", ratio.preference);
}

#[test]
fn test_response_matrix_end_to_end() {
    let reco = AnyBinning::from_yaml_file(&binning_data("reco-binning.yml")).unwrap();
    let truth = AnyBinning::from_yaml_file(&binning_data("truth-binning.yml")).unwrap();
    let mut rm = ResponseMatrix::new(reco, truth).unwrap();
    rm.fill_from_csv_file(
        &binning_data("simulation.csv"),
        &CsvOptions::new().with_weight_field("w"),
    )
    .unwrap();

    let observed = vec![2.0, 4.0, 2.0];
    let m = LikelihoodMachine::new(observed.clone(), vec![rm.response_matrix()]).unwrap();
    assert_eq!(m.n_truth(), 4);
    assert_eq!(m.n_reco(), 3);

    let at_truth = m
        .log_likelihood(rm.truth_values(), Systematics::Profile)
        .unwrap();
    assert!(at_truth.is_finite());

    let best = m
        .absolute_max_log_likelihood(Systematics::Profile, &mut rng())
        .unwrap();
    let saturated: f64 = observed.iter().map(|&k| log_pmf(k, k)).sum();
    assert!(best.log_likelihood >= at_truth);
    assert!((best.log_likelihood - saturated).abs() < 1e-3);
    assert!(best.parameters.iter().all(|&p| p >= 0.0));
}
