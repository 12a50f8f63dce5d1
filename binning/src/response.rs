//! Detector response: how true event counts migrate into reconstructed bins.

use crate::any::AnyBinning;
use crate::binning::{Binning, Weights};
use crate::cartesian::CartesianProductBinning;
use crate::csv::{read_events, CsvOptions};
use crate::error::{BinningError, BinningResult};
use crate::event::Event;
use crate::matrix::Matrix;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Counts simulated events in a truth binning, a reco binning and their
/// cartesian product.
///
/// Events must carry both truth and reco variables. The expected reco counts
/// of a truth vector are `response_matrix().dot(truth)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMatrix {
    reco: AnyBinning,
    truth: AnyBinning,
    response: CartesianProductBinning,
}

/// A response matrix with the vectors it was built from, as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMatrixExport {
    pub matrix: Matrix,
    pub truth_values: Vec<f64>,
    pub truth_entries: Vec<u64>,
    pub reco_values: Vec<f64>,
}

impl ResponseMatrixExport {
    pub fn from_json_file(path: &Path) -> BinningResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn to_json_string(&self) -> BinningResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl ResponseMatrix {
    pub fn new(reco: AnyBinning, truth: AnyBinning) -> BinningResult<Self> {
        let response = CartesianProductBinning::new(vec![reco.clone(), truth.clone()])?;
        let mut matrix = Self {
            reco,
            truth,
            response,
        };
        matrix.reset();
        Ok(matrix)
    }

    pub fn reco_binning(&self) -> &AnyBinning {
        &self.reco
    }

    pub fn truth_binning(&self) -> &AnyBinning {
        &self.truth
    }

    pub fn response_binning(&self) -> &CartesianProductBinning {
        &self.response
    }

    pub fn fill(&mut self, event: &Event, weight: f64) -> BinningResult<()> {
        // Resolve all three indices first so a missing variable fills nothing.
        let t = self.truth.event_bin_index(event)?;
        let r = self.reco.event_bin_index(event)?;
        let rt = self.response.event_bin_index(event)?;
        if let Some(i) = t {
            self.truth.contents_mut().fill(i, weight);
        }
        if let Some(i) = r {
            self.reco.contents_mut().fill(i, weight);
        }
        if let Some(i) = rt {
            self.response.contents_mut().fill(i, weight);
        }
        Ok(())
    }

    pub fn fill_events(&mut self, events: &[Event], weights: Weights<'_>) -> BinningResult<()> {
        let mut truth = self.truth.clone();
        let mut reco = self.reco.clone();
        let mut response = self.response.clone();
        truth.fill_events(events, weights)?;
        reco.fill_events(events, weights)?;
        response.fill_events(events, weights)?;
        self.truth = truth;
        self.reco = reco;
        self.response = response;
        Ok(())
    }

    pub fn fill_from_csv_file(&mut self, path: &Path, options: &CsvOptions) -> BinningResult<()> {
        let (events, weights) = read_events(path, options)?;
        self.fill_events(&events, Weights::PerEvent(&weights))?;
        info!("Filled {} events from {}", events.len(), path.display());
        Ok(())
    }

    pub fn reset(&mut self) {
        self.truth.reset(0.0);
        self.reco.reset(0.0);
        self.response.reset(0.0);
    }

    pub fn truth_values(&self) -> &[f64] {
        self.truth.values()
    }

    pub fn truth_entries(&self) -> &[u64] {
        self.truth.entries()
    }

    pub fn reco_values(&self) -> &[f64] {
        self.reco.values()
    }

    pub fn reco_entries(&self) -> &[u64] {
        self.reco.entries()
    }

    pub fn response_values(&self) -> &[f64] {
        self.response.values()
    }

    pub fn response_entries(&self) -> &[u64] {
        self.response.entries()
    }

    /// Truth bins that received at least one simulated event.
    pub fn filled_truth_indices(&self) -> Vec<usize> {
        self.truth
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, &n)| n > 0)
            .map(|(i, _)| i)
            .collect()
    }

    /// The `N_reco x N_truth` matrix of response values normalised to the
    /// number of simulated events per truth bin.
    pub fn response_matrix(&self) -> Matrix {
        let n_reco = self.reco.nbins();
        let n_truth = self.truth.nbins();
        let truth = self.truth.values();
        let mut matrix = Matrix::zeros(n_reco, n_truth);
        for r in 0..n_reco {
            for (t, &n_t) in truth.iter().enumerate() {
                let norm = if n_t > 0.0 { n_t } else { 1.0 };
                matrix.set(r, t, self.response.values()[r * n_truth + t] / norm);
            }
        }
        matrix
    }

    /// Reconstruction efficiency of every truth bin.
    pub fn efficiencies(&self) -> Vec<f64> {
        self.response_matrix().column_sums()
    }

    pub fn export(&self) -> ResponseMatrixExport {
        ResponseMatrixExport {
            matrix: self.response_matrix(),
            truth_values: self.truth.values().to_vec(),
            truth_entries: self.truth.entries().to_vec(),
            reco_values: self.reco.values().to_vec(),
        }
    }

    /// A response matrix holding the counts of both.
    pub fn added(&self, other: &ResponseMatrix) -> BinningResult<ResponseMatrix> {
        if self != other {
            return Err(BinningError::Incompatible {
                message: "response matrices have different binnings".to_string(),
            });
        }
        debug!("Adding response matrices with {} bins", self.response.nbins());
        Ok(ResponseMatrix {
            reco: self.reco.added(&other.reco)?,
            truth: self.truth.added(&other.truth)?,
            response: self.response.added(&other.response)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rectilinear::RectilinearBinning;

    fn matrix() -> ResponseMatrix {
        let reco = RectilinearBinning::linear("x_reco", vec![0.0, 1.0, 2.0]).unwrap();
        let truth = RectilinearBinning::linear("x_truth", vec![0.0, 1.0, 2.0]).unwrap();
        ResponseMatrix::new(reco.into(), truth.into()).unwrap()
    }

    fn ev(reco: f64, truth: f64) -> Event {
        Event::from([("x_reco", reco), ("x_truth", truth)])
    }

    #[test]
    fn test_fill_and_normalise() {
        let mut rm = matrix();
        rm.fill(&ev(0.5, 0.5), 1.0).unwrap();
        rm.fill(&ev(1.5, 0.5), 1.0).unwrap();
        rm.fill(&ev(-1.0, 0.5), 2.0).unwrap();
        rm.fill(&ev(1.5, 1.5), 1.0).unwrap();

        assert_eq!(rm.truth_values(), &[4.0, 1.0]);
        assert_eq!(rm.reco_values(), &[1.0, 2.0]);
        assert_eq!(rm.response_values(), &[1.0, 0.0, 1.0, 1.0]);

        let m = rm.response_matrix();
        assert_eq!(m.row(0), &[0.25, 0.0]);
        assert_eq!(m.row(1), &[0.25, 1.0]);
        assert_eq!(rm.efficiencies(), vec![0.5, 1.0]);
        assert_eq!(rm.filled_truth_indices(), vec![0, 1]);
    }

    #[test]
    fn test_empty_truth_bins_are_not_divided() {
        let mut rm = matrix();
        rm.fill(&ev(0.5, 0.5), 1.0).unwrap();
        assert_eq!(rm.response_matrix().row(0), &[1.0, 0.0]);
        assert_eq!(rm.filled_truth_indices(), vec![0]);
    }

    #[test]
    fn test_fill_with_missing_variable_fills_nothing() {
        let mut rm = matrix();
        assert!(rm.fill(&Event::from([("x_truth", 0.5)]), 1.0).is_err());
        assert_eq!(rm.truth_values(), &[0.0, 0.0]);
    }

    #[test]
    fn test_add_and_reset() {
        let mut rm = matrix();
        rm.fill(&ev(0.5, 0.5), 1.0).unwrap();
        let sum = rm.added(&rm).unwrap();
        assert_eq!(sum.truth_values(), &[2.0, 0.0]);
        assert_eq!(sum.reco_values(), &[2.0, 0.0]);
        assert_eq!(sum.response_values(), &[2.0, 0.0, 0.0, 0.0]);
        rm.reset();
        assert_eq!(rm.truth_values(), &[0.0, 0.0]);
        assert_eq!(rm.response_entries(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_export_roundtrip() {
        let mut rm = matrix();
        rm.fill(&ev(0.5, 0.5), 1.0).unwrap();
        let export = rm.export();
        let json = export.to_json_string().unwrap();
        let parsed: ResponseMatrixExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, export);
        assert_eq!(parsed.truth_entries, vec![1, 0]);
    }
}
