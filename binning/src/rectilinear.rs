use crate::bin::RectangularBin;
use crate::binning::{BinContents, Binning};
use crate::error::{BinningError, BinningResult};
use crate::event::Event;
use crate::grid::{ravel, regrid, unravel};
use crate::phasespace::PhaseSpace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A regular grid of bins defined by a sorted list of edges per variable.
///
/// Bins are numbered in C order: the last variable changes fastest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RectilinearBinningLayout", into = "RectilinearBinningLayout")]
pub struct RectilinearBinning {
    variables: Vec<String>,
    bin_edges: Vec<Vec<f64>>,
    include_upper: bool,
    phasespace: PhaseSpace,
    contents: BinContents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RectilinearBinningLayout {
    variables: Vec<String>,
    bin_edges: Vec<Vec<f64>>,
    #[serde(default)]
    include_upper: bool,
}

impl TryFrom<RectilinearBinningLayout> for RectilinearBinning {
    type Error = BinningError;

    fn try_from(layout: RectilinearBinningLayout) -> BinningResult<Self> {
        Ok(Self::new(layout.variables, layout.bin_edges)?.with_include_upper(layout.include_upper))
    }
}

impl From<RectilinearBinning> for RectilinearBinningLayout {
    fn from(binning: RectilinearBinning) -> Self {
        Self {
            variables: binning.variables,
            bin_edges: binning.bin_edges,
            include_upper: binning.include_upper,
        }
    }
}

fn validate_edges(variable: &str, edges: &[f64]) -> BinningResult<()> {
    let invalid = |message: &str| BinningError::InvalidEdges {
        variable: variable.to_string(),
        message: message.to_string(),
    };
    if edges.len() < 2 {
        return Err(invalid("at least two edges are required"));
    }
    if edges.iter().any(|e| e.is_nan()) {
        return Err(invalid("edges must not be NaN"));
    }
    if edges.windows(2).any(|w| w[1] <= w[0]) {
        return Err(invalid("edges must be strictly increasing"));
    }
    Ok(())
}

impl RectilinearBinning {
    pub fn new<S: Into<String>>(
        variables: impl IntoIterator<Item = S>,
        bin_edges: Vec<Vec<f64>>,
    ) -> BinningResult<Self> {
        let variables: Vec<String> = variables.into_iter().map(Into::into).collect();
        if variables.len() != bin_edges.len() {
            return Err(BinningError::LengthMismatch {
                expected: variables.len(),
                actual: bin_edges.len(),
            });
        }
        for (var, edges) in variables.iter().zip(&bin_edges) {
            validate_edges(var, edges)?;
        }
        Ok(Self::assemble(variables, bin_edges, false))
    }

    /// One-dimensional binning of a single variable.
    pub fn linear(variable: impl Into<String>, edges: Vec<f64>) -> BinningResult<Self> {
        Self::new([variable.into()], vec![edges])
    }

    fn assemble(variables: Vec<String>, bin_edges: Vec<Vec<f64>>, include_upper: bool) -> Self {
        let nbins = bin_edges
            .iter()
            .map(|e| e.len().saturating_sub(1))
            .product();
        Self {
            phasespace: PhaseSpace::new(variables.iter().cloned()),
            variables,
            bin_edges,
            include_upper,
            contents: BinContents::new(nbins),
        }
    }

    /// Make bins include their upper instead of their lower edges.
    pub fn with_include_upper(mut self, include_upper: bool) -> Self {
        self.include_upper = include_upper;
        self
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn bin_edges(&self) -> &[Vec<f64>] {
        &self.bin_edges
    }

    pub fn include_upper(&self) -> bool {
        self.include_upper
    }

    /// Number of bins along each variable.
    pub fn shape(&self) -> Vec<usize> {
        self.bin_edges.iter().map(|e| e.len() - 1).collect()
    }

    fn axis(&self, variable: &str) -> BinningResult<usize> {
        self.variables
            .iter()
            .position(|v| v == variable)
            .ok_or_else(|| BinningError::UnknownVariable {
                variable: variable.to_string(),
            })
    }

    fn axis_index(&self, axis: usize, value: f64) -> Option<usize> {
        let edges = &self.bin_edges[axis];
        let p = if self.include_upper {
            edges.partition_point(|&e| e < value)
        } else {
            edges.partition_point(|&e| e <= value)
        };
        (p >= 1 && p < edges.len()).then(|| p - 1)
    }

    /// Per-variable bin indices of a flat bin index.
    pub fn bin_index_tuple(&self, index: usize) -> Option<Vec<usize>> {
        unravel(index, &self.shape())
    }

    /// Flat bin index of per-variable bin indices.
    pub fn tuple_bin_index(&self, tuple: &[usize]) -> Option<usize> {
        ravel(tuple, &self.shape())
    }

    /// The geometric bin with flat index `index`.
    pub fn rectangular_bin(&self, index: usize) -> BinningResult<RectangularBin> {
        let tuple = self
            .bin_index_tuple(index)
            .ok_or(BinningError::IndexOutOfRange {
                index,
                size: self.nbins(),
            })?;
        let edges = self
            .variables
            .iter()
            .zip(&tuple)
            .enumerate()
            .map(|(axis, (var, &i))| {
                (
                    var.clone(),
                    (self.bin_edges[axis][i], self.bin_edges[axis][i + 1]),
                )
            });
        Ok(RectangularBin::new(edges)?
            .with_include_lower(!self.include_upper)
            .with_include_upper(self.include_upper))
    }

    fn regridded(
        &self,
        kept_axes: &[usize],
        new_edges: Vec<Vec<f64>>,
        axis_maps: &[Vec<Option<usize>>],
    ) -> RectilinearBinning {
        let variables = kept_axes
            .iter()
            .map(|&a| self.variables[a].clone())
            .collect();
        let mut binning = Self::assemble(variables, new_edges, self.include_upper);
        let new_shape = binning.shape();
        binning.contents = regrid(
            &self.contents,
            &self.shape(),
            kept_axes,
            axis_maps,
            &new_shape,
        );
        binning
    }

    /// Sum over the given variables, keeping the others.
    pub fn marginalize(&self, variables: &[&str]) -> BinningResult<RectilinearBinning> {
        let removed = variables
            .iter()
            .map(|v| self.axis(v))
            .collect::<BinningResult<Vec<_>>>()?;
        let kept: Vec<usize> = (0..self.variables.len())
            .filter(|a| !removed.contains(a))
            .collect();
        self.keep_axes(&kept)
    }

    /// Sum over all variables except the given ones.
    pub fn project(&self, variables: &[&str]) -> BinningResult<RectilinearBinning> {
        let mut kept = variables
            .iter()
            .map(|v| self.axis(v))
            .collect::<BinningResult<Vec<_>>>()?;
        kept.sort_unstable();
        kept.dedup();
        self.keep_axes(&kept)
    }

    fn keep_axes(&self, kept: &[usize]) -> BinningResult<RectilinearBinning> {
        if kept.is_empty() {
            return Err(BinningError::Incompatible {
                message: "cannot remove every variable of a binning".to_string(),
            });
        }
        let edges = kept.iter().map(|&a| self.bin_edges[a].clone()).collect();
        let maps: Vec<Vec<Option<usize>>> = kept
            .iter()
            .map(|&a| (0..self.bin_edges[a].len() - 1).map(Some).collect())
            .collect();
        Ok(self.regridded(kept, edges, &maps))
    }

    /// Keep only the bin index ranges `start..stop` of the given variables.
    ///
    /// Negative indices count from the end, so `(2, -1)` drops the first two
    /// and the last bin.
    pub fn slice(&self, ranges: &HashMap<String, (isize, isize)>) -> BinningResult<RectilinearBinning> {
        let shape = self.shape();
        let mut edges = self.bin_edges.clone();
        let mut maps: Vec<Vec<Option<usize>>> =
            shape.iter().map(|&n| (0..n).map(Some).collect()).collect();
        for (var, &(start, stop)) in ranges {
            let axis = self.axis(var)?;
            let n = shape[axis] as isize;
            let resolve = |i: isize| if i < 0 { i + n } else { i };
            let (start, stop) = (resolve(start), resolve(stop));
            if start < 0 || stop > n || start >= stop {
                return Err(BinningError::InvalidEdges {
                    variable: var.clone(),
                    message: format!("invalid slice {}..{} of {} bins", start, stop, n),
                });
            }
            let (start, stop) = (start as usize, stop as usize);
            edges[axis] = self.bin_edges[axis][start..=stop].to_vec();
            maps[axis] = (0..shape[axis])
                .map(|i| (start..stop).contains(&i).then(|| i - start))
                .collect();
        }
        let axes: Vec<usize> = (0..self.variables.len()).collect();
        Ok(self.regridded(&axes, edges, &maps))
    }

    /// Merge bins by removing the edges with the given indices.
    ///
    /// Removing an interior edge merges the two adjacent bins. Removing the
    /// first or last edge drops the outermost bin.
    pub fn remove_bin_edges(
        &self,
        removed: &HashMap<String, Vec<usize>>,
    ) -> BinningResult<RectilinearBinning> {
        let shape = self.shape();
        let mut edges = self.bin_edges.clone();
        let mut maps: Vec<Vec<Option<usize>>> =
            shape.iter().map(|&n| (0..n).map(Some).collect()).collect();
        for (var, indices) in removed {
            let axis = self.axis(var)?;
            let old = &self.bin_edges[axis];
            let kept: Vec<usize> = (0..old.len()).filter(|i| !indices.contains(i)).collect();
            if kept.len() < 2 {
                return Err(BinningError::InvalidEdges {
                    variable: var.clone(),
                    message: "at least two edges must remain".to_string(),
                });
            }
            edges[axis] = kept.iter().map(|&i| old[i]).collect();
            let last = kept[kept.len() - 1];
            maps[axis] = (0..shape[axis])
                .map(|bin| {
                    if bin < kept[0] || bin + 1 > last {
                        None
                    } else {
                        Some(kept.iter().filter(|&&k| k <= bin).count() - 1)
                    }
                })
                .collect();
        }
        let axes: Vec<usize> = (0..self.variables.len()).collect();
        Ok(self.regridded(&axes, edges, &maps))
    }
}

impl PartialEq for RectilinearBinning {
    fn eq(&self, other: &Self) -> bool {
        self.variables == other.variables
            && self.bin_edges == other.bin_edges
            && self.include_upper == other.include_upper
    }
}

impl Binning for RectilinearBinning {
    fn phasespace(&self) -> &PhaseSpace {
        &self.phasespace
    }

    fn nbins(&self) -> usize {
        self.contents.len()
    }

    fn event_bin_index(&self, event: &Event) -> BinningResult<Option<usize>> {
        let mut tuple = Vec::with_capacity(self.variables.len());
        for (axis, var) in self.variables.iter().enumerate() {
            match self.axis_index(axis, event.value(var)?) {
                Some(i) => tuple.push(i),
                None => return Ok(None),
            }
        }
        Ok(self.tuple_bin_index(&tuple))
    }

    fn contents(&self) -> &BinContents {
        &self.contents
    }

    fn contents_mut(&mut self) -> &mut BinContents {
        &mut self.contents
    }
}
