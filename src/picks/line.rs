//! A single pick line and its state transitions
use crate::error::ValidationError;
use crate::model::{PickSample, Source};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// One pick sample per trace of a survey line, for one pick type
///
/// The length is fixed at construction. Every transition validates its
/// input before touching any sample, so a failed transition leaves the
/// line as it was.
#[derive(Debug, Clone, PartialEq, Default)]
#[derive(Deserialize, Serialize)]
pub struct PickLine {
    samples: Vec<PickSample>,
    locked: bool,
}

impl PickLine {
    /// A line of `len` unset samples
    pub fn new(len: usize) -> Self {
        PickLine {
            samples: vec![PickSample::unset(); len],
            locked: false,
        }
    }

    /// A line holding the given samples
    pub fn from_samples(samples: Vec<PickSample>, locked: bool) -> Self {
        PickLine { samples, locked }
    }

    /// The samples, in trace order
    pub fn samples(&self) -> &[PickSample] {
        &self.samples
    }

    /// Sample at trace `i`
    pub fn get(&self, i: usize) -> Option<&PickSample> {
        self.samples.get(i)
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the line has no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Picked depths, `None` where there is no pick
    pub fn depths(&self) -> Vec<Option<f64>> {
        self.samples.iter().map(|s| s.depth).collect()
    }

    /// Whether edits are refused
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub(crate) fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    fn check_range(&self, range: &Range<usize>) -> Result<(), ValidationError> {
        if range.start > range.end || range.end > self.samples.len() {
            return Err(ValidationError::RangeOutOfBounds {
                key: String::new(),
                start: range.start,
                end: range.end,
                len: self.samples.len(),
            });
        }
        Ok(())
    }

    /// Overwrite `range` with `depths`, all tagged with `source`
    ///
    /// Depths must be finite; "no pick" is `None`.
    pub fn set_range(
        &mut self,
        range: Range<usize>,
        depths: &[Option<f64>],
        source: Source,
    ) -> Result<(), ValidationError> {
        self.check_range(&range)?;
        if depths.len() != range.len() {
            return Err(ValidationError::SampleCount {
                expected: range.len(),
                found: depths.len(),
            });
        }
        if let Some(i) = depths.iter().position(|d| d.map_or(false, |d| !d.is_finite())) {
            return Err(ValidationError::NonFiniteDepth {
                index: range.start + i,
            });
        }
        for (sample, depth) in self.samples[range].iter_mut().zip(depths) {
            *sample = match source {
                Source::Unset => PickSample::unset(),
                source => PickSample {
                    depth: *depth,
                    source,
                    confidence: None,
                },
            };
        }
        Ok(())
    }

    /// Merge auto-picked samples starting at trace `start`
    ///
    /// Only unset and auto samples are replaced. Returns the number of
    /// samples whose value changed.
    pub fn merge_auto(&mut self, start: usize, samples: &[PickSample]) -> Result<usize, ValidationError> {
        let range = start..start.saturating_add(samples.len());
        self.check_range(&range)?;
        let mut changed = 0;
        for (current, new) in self.samples[range].iter_mut().zip(samples) {
            if matches!(current.source, Source::Unset | Source::Auto) {
                let new = PickSample::auto(new.depth, new.confidence);
                if *current != new {
                    changed += 1;
                }
                *current = new;
            }
        }
        Ok(changed)
    }

    /// Linearly interpolate runs of missing picks up to `max_gap` traces
    ///
    /// A run must be bounded by picks on both sides. Operator-entered
    /// "no pick" samples are never filled and break a run. Returns the
    /// number of samples filled.
    pub fn interpolate_gaps(&mut self, max_gap: usize) -> usize {
        let fillable = |s: &PickSample| s.depth.is_none() && s.source != Source::Manual;
        let mut filled = 0;
        let mut i = 0;
        while i < self.samples.len() {
            if !fillable(&self.samples[i]) {
                i += 1;
                continue;
            }
            let start = i;
            while i < self.samples.len() && fillable(&self.samples[i]) {
                i += 1;
            }
            let len = i - start;
            let before = start.checked_sub(1).and_then(|j| self.samples[j].depth);
            let after = self.samples.get(i).and_then(|s| s.depth);
            if let (Some(a), Some(b), true) = (before, after, len <= max_gap) {
                let step = (b - a) / (len + 1) as f64;
                for (k, sample) in self.samples[start..i].iter_mut().enumerate() {
                    *sample = PickSample::interpolated(a + step * (k + 1) as f64);
                }
                filled += len;
            }
        }
        filled
    }
}
