//! Collects scored candidate batches coming out of a parallel iterator.
//!
//! Each batch either carries its hits and the time spent scoring it, or is
//! `None` when the batch was skipped because the search got cancelled.

use super::ranking::ScoredCandidate;
use rayon::iter::{
    FromParallelIterator,
    IntoParallelIterator,
    ParallelIterator,
};
use std::time::Duration;

pub(crate) type ScoredBatch = Option<(Vec<ScoredCandidate>, Duration)>;

#[derive(Default)]
pub(crate) struct HitAccumulator {
    pub(crate) hits: Vec<ScoredCandidate>,
    pub(crate) scoring_time: Duration,
    pub(crate) cancelled: bool,
}

impl HitAccumulator {
    fn reduce(mut self, other: Self) -> Self {
        self.hits.extend(other.hits);
        self.scoring_time += other.scoring_time;
        self.cancelled |= other.cancelled;
        self
    }

    fn fold(mut self, item: ScoredBatch) -> Self {
        match item {
            Some((hits, elapsed)) => {
                self.hits.extend(hits);
                self.scoring_time += elapsed;
            }
            None => self.cancelled = true,
        }
        self
    }
}

impl FromIterator<ScoredBatch> for HitAccumulator {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = ScoredBatch>,
    {
        iter.into_iter()
            .fold(HitAccumulator::default(), HitAccumulator::fold)
    }
}

impl FromParallelIterator<ScoredBatch> for HitAccumulator {
    fn from_par_iter<I>(par_iter: I) -> Self
    where
        I: IntoParallelIterator<Item = ScoredBatch>,
    {
        par_iter
            .into_par_iter()
            .fold(HitAccumulator::default, HitAccumulator::fold)
            .reduce(HitAccumulator::default, HitAccumulator::reduce)
    }
}
