//! The `Binning` trait and the count storage shared by all binnings.

use crate::bin::Bin;
use crate::csv::{read_events, CsvOptions};
use crate::error::{BinningError, BinningResult};
use crate::event::Event;
use crate::phasespace::PhaseSpace;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Accumulated values, entries and squared weights of every bin in a binning.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BinContents {
    pub values: Vec<f64>,
    pub entries: Vec<u64>,
    pub sumw2: Vec<f64>,
}

impl BinContents {
    pub fn new(nbins: usize) -> Self {
        Self {
            values: vec![0.0; nbins],
            entries: vec![0; nbins],
            sumw2: vec![0.0; nbins],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fill(&mut self, index: usize, weight: f64) {
        self.values[index] += weight;
        self.entries[index] += 1;
        self.sumw2[index] += weight * weight;
    }

    /// Adds the counts of bin `from` in `other` to bin `to` in `self`.
    pub fn accumulate(&mut self, to: usize, other: &BinContents, from: usize) {
        self.values[to] += other.values[from];
        self.entries[to] += other.entries[from];
        self.sumw2[to] += other.sumw2[from];
    }

    pub fn reset(&mut self, value: f64) {
        self.values.iter_mut().for_each(|v| *v = value);
        self.entries.iter_mut().for_each(|e| *e = 0);
        self.sumw2.iter_mut().for_each(|s| *s = 0.0);
    }

    pub fn add(&mut self, other: &BinContents) -> BinningResult<()> {
        check_len(self.len(), other.len())?;
        for i in 0..self.len() {
            self.accumulate(i, other, i);
        }
        Ok(())
    }
}

pub(crate) fn check_len(expected: usize, actual: usize) -> BinningResult<()> {
    if expected != actual {
        return Err(BinningError::LengthMismatch { expected, actual });
    }
    Ok(())
}

fn pick<T: Copy>(array: &[T], indices: &[usize]) -> BinningResult<Vec<T>> {
    indices
        .iter()
        .map(|&i| {
            array.get(i).copied().ok_or(BinningError::IndexOutOfRange {
                index: i,
                size: array.len(),
            })
        })
        .collect()
}

/// How events passed to [`Binning::fill_events`] are weighted.
#[derive(Debug, Clone, Copy)]
pub enum Weights<'a> {
    Uniform(f64),
    PerEvent(&'a [f64]),
}

impl Weights<'_> {
    fn get(&self, i: usize) -> f64 {
        match self {
            Weights::Uniform(w) => *w,
            Weights::PerEvent(ws) => ws[i],
        }
    }
}

/// A set of disjoint bins on a phase space.
///
/// Implementors translate events to bin indices; filling and access to the
/// accumulated counts are provided on top of that.
pub trait Binning {
    fn phasespace(&self) -> &PhaseSpace;

    fn nbins(&self) -> usize;

    /// Index of the bin the event falls into, `None` if it is not binned.
    fn event_bin_index(&self, event: &Event) -> BinningResult<Option<usize>>;

    fn contents(&self) -> &BinContents;

    fn contents_mut(&mut self) -> &mut BinContents;

    fn contains(&self, event: &Event) -> BinningResult<bool> {
        Ok(self.event_bin_index(event)?.is_some())
    }

    /// Fill a single event. Events outside the binning are ignored.
    fn fill(&mut self, event: &Event, weight: f64) -> BinningResult<Option<usize>> {
        let index = self.event_bin_index(event)?;
        if let Some(i) = index {
            self.contents_mut().fill(i, weight);
        }
        Ok(index)
    }

    /// Fill a single event, failing with `NotInBinning` if it is not binned.
    fn fill_strict(&mut self, event: &Event, weight: f64) -> BinningResult<usize> {
        let index = self
            .event_bin_index(event)?
            .ok_or(BinningError::NotInBinning)?;
        self.contents_mut().fill(index, weight);
        Ok(index)
    }

    /// Fill several events. Either all events are filled or, on error, none.
    /// Returns the number of events that fell into a bin.
    fn fill_events(&mut self, events: &[Event], weights: Weights<'_>) -> BinningResult<usize> {
        if let Weights::PerEvent(ws) = weights {
            check_len(events.len(), ws.len())?;
        }
        let indices = events
            .iter()
            .map(|e| self.event_bin_index(e))
            .collect::<BinningResult<Vec<_>>>()?;
        let contents = self.contents_mut();
        let mut binned = 0;
        for (i, index) in indices.into_iter().enumerate() {
            if let Some(bin) = index {
                contents.fill(bin, weights.get(i));
                binned += 1;
            }
        }
        Ok(binned)
    }

    /// Fill the events of a CSV file. See [`CsvOptions`] for weighting and
    /// renaming of columns.
    fn fill_from_csv_file(&mut self, path: &Path, options: &CsvOptions) -> BinningResult<usize> {
        let (events, weights) = read_events(path, options)?;
        let binned = self.fill_events(&events, Weights::PerEvent(&weights))?;
        debug!(
            "Filled {} of {} events from {}",
            binned,
            events.len(),
            path.display()
        );
        Ok(binned)
    }

    /// Set all values to `value` and clear entries and squared weights.
    fn reset(&mut self, value: f64) {
        self.contents_mut().reset(value);
    }

    fn values(&self) -> &[f64] {
        &self.contents().values
    }

    fn entries(&self) -> &[u64] {
        &self.contents().entries
    }

    fn sumw2(&self) -> &[f64] {
        &self.contents().sumw2
    }

    fn values_at(&self, indices: &[usize]) -> BinningResult<Vec<f64>> {
        pick(self.values(), indices)
    }

    fn entries_at(&self, indices: &[usize]) -> BinningResult<Vec<u64>> {
        pick(self.entries(), indices)
    }

    fn sumw2_at(&self, indices: &[usize]) -> BinningResult<Vec<f64>> {
        pick(self.sumw2(), indices)
    }

    fn set_values(&mut self, values: &[f64]) -> BinningResult<()> {
        check_len(self.nbins(), values.len())?;
        self.contents_mut().values.copy_from_slice(values);
        Ok(())
    }

    fn set_entries(&mut self, entries: &[u64]) -> BinningResult<()> {
        check_len(self.nbins(), entries.len())?;
        self.contents_mut().entries.copy_from_slice(entries);
        Ok(())
    }

    fn set_sumw2(&mut self, sumw2: &[f64]) -> BinningResult<()> {
        check_len(self.nbins(), sumw2.len())?;
        self.contents_mut().sumw2.copy_from_slice(sumw2);
        Ok(())
    }

    /// A detached copy of bin `index` with its current counts.
    fn bin(&self, index: usize) -> BinningResult<Bin> {
        let contents = self.contents();
        if index >= contents.len() {
            return Err(BinningError::IndexOutOfRange {
                index,
                size: contents.len(),
            });
        }
        Ok(Bin {
            phasespace: self.phasespace().clone(),
            value: contents.values[index],
            entries: contents.entries[index],
            sumw2: contents.sumw2[index],
        })
    }

    /// A copy of this binning with the counts of `other` added.
    fn added(&self, other: &Self) -> BinningResult<Self>
    where
        Self: Sized + Clone + PartialEq,
    {
        if self != other {
            return Err(BinningError::Incompatible {
                message: "cannot add binnings with different bins".to_string(),
            });
        }
        let mut sum = self.clone();
        sum.contents_mut().add(other.contents())?;
        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contents_fill_and_reset() {
        let mut c = BinContents::new(2);
        c.fill(1, 0.5);
        c.fill(1, 0.5);
        assert_eq!(c.values, vec![0.0, 1.0]);
        assert_eq!(c.entries, vec![0, 2]);
        assert_eq!(c.sumw2, vec![0.0, 0.5]);
        c.reset(123.0);
        assert_eq!(c.values, vec![123.0, 123.0]);
        assert_eq!(c.entries, vec![0, 0]);
    }

    #[test]
    fn test_contents_add_length_mismatch() {
        let mut a = BinContents::new(2);
        let b = BinContents::new(3);
        assert!(matches!(
            a.add(&b),
            Err(BinningError::LengthMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_pick_out_of_range() {
        assert_eq!(pick(&[1.0, 2.0], &[1]).unwrap(), vec![2.0]);
        assert!(pick(&[1.0, 2.0], &[2]).is_err());
    }
}
