//! Interval-based keep masks over the Q axis.
//!
//! A sample is kept iff its `q` lies inside at least one of the supplied closed
//! intervals. Intervals may arrive unsorted and overlapping; [`MaskSelector`]
//! compiles them into a sorted, disjoint list once so membership is a binary
//! search, then reuses that for every dataset it is built against.

use crate::data::Dataset;
use crate::domain::Interval;
use crate::error::{Result, SasError};

/// Per-sample keep flags, index-aligned with a dataset's `q`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    keep: Vec<bool>,
}

impl Mask {
    pub fn from_keep(keep: Vec<bool>) -> Self {
        Self { keep }
    }

    pub fn keep(&self) -> &[bool] {
        &self.keep
    }

    pub fn len(&self) -> usize {
        self.keep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keep.is_empty()
    }

    /// Number of samples the mask keeps.
    pub fn kept(&self) -> usize {
        self.keep.iter().filter(|k| **k).count()
    }
}

/// Anything with a Q axis that can be filtered sample-by-sample.
pub trait Maskable: Sized {
    fn q_axis(&self) -> &[f64];

    /// Keep the samples flagged in `keep`. Only called with a length-checked mask.
    fn select_samples(&self, keep: &[bool]) -> Self;

    fn build_mask(&self, intervals: &[Interval]) -> Result<Mask> {
        build_mask(self, intervals)
    }

    fn apply_mask(&self, mask: &Mask) -> Result<Self> {
        apply_mask(self, mask)
    }

    /// Build and apply in one step.
    fn mask_ranges(&self, intervals: &[Interval]) -> Result<Self> {
        let mask = self.build_mask(intervals)?;
        self.apply_mask(&mask)
    }
}

impl Maskable for Dataset {
    fn q_axis(&self) -> &[f64] {
        self.q()
    }

    fn select_samples(&self, keep: &[bool]) -> Self {
        self.select(keep)
    }
}

/// `keep[k] = true` iff `q[k]` lies in at least one interval.
pub fn build_mask<D: Maskable>(data: &D, intervals: &[Interval]) -> Result<Mask> {
    let compiled = compile(intervals)?;
    Ok(mask_with(&compiled, data.q_axis()))
}

/// New data containing exactly the kept samples, order preserved.
pub fn apply_mask<D: Maskable>(data: &D, mask: &Mask) -> Result<D> {
    let n = data.q_axis().len();
    if mask.len() != n {
        return Err(SasError::Shape {
            what: "mask and dataset",
            left: mask.len(),
            right: n,
        });
    }
    Ok(data.select_samples(mask.keep()))
}

/// Reusable, compiled set of keep intervals.
///
/// `build` must be called before `apply`; the selector remembers the last mask
/// it built.
#[derive(Debug, Clone)]
pub struct MaskSelector {
    intervals: Vec<Interval>,
    compiled: Vec<Interval>,
    mask: Option<Mask>,
}

impl MaskSelector {
    pub fn new(intervals: &[Interval]) -> Result<Self> {
        let compiled = compile(intervals)?;
        Ok(Self {
            intervals: intervals.to_vec(),
            compiled,
            mask: None,
        })
    }

    /// Intervals as supplied by the caller.
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Sorted, merged intervals actually used for membership tests.
    pub fn compiled(&self) -> &[Interval] {
        &self.compiled
    }

    pub fn contains(&self, q: f64) -> bool {
        contains_sorted(&self.compiled, q)
    }

    pub fn build<D: Maskable>(&mut self, data: &D) -> &Mask {
        self.mask.insert(mask_with(&self.compiled, data.q_axis()))
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.mask.as_ref()
    }

    pub fn apply<D: Maskable>(&self, data: &D) -> Result<D> {
        let mask = self.mask.as_ref().ok_or(SasError::EmptyMask)?;
        apply_mask(data, mask)
    }
}

/// Validate, sort by lower bound and merge overlapping intervals.
fn compile(intervals: &[Interval]) -> Result<Vec<Interval>> {
    if intervals.is_empty() {
        return Err(SasError::EmptyIntervalSet);
    }
    for iv in intervals {
        iv.validate()?;
    }

    let mut sorted = intervals.to_vec();
    sorted.sort_by(|a, b| a.low.total_cmp(&b.low));

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for iv in sorted {
        match merged.last_mut() {
            Some(last) if iv.low <= last.high => last.high = last.high.max(iv.high),
            _ => merged.push(iv),
        }
    }
    Ok(merged)
}

fn mask_with(compiled: &[Interval], q: &[f64]) -> Mask {
    Mask {
        keep: q.iter().map(|&qk| contains_sorted(compiled, qk)).collect(),
    }
}

/// Membership in a sorted, disjoint interval list.
fn contains_sorted(compiled: &[Interval], q: f64) -> bool {
    // First interval whose lower bound exceeds q; the candidate is the one before it.
    let idx = compiled.partition_point(|iv| iv.low <= q);
    idx > 0 && q <= compiled[idx - 1].high
}
