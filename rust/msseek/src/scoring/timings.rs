//! Timing instrumentation for a single search call.
//!
//! Scoring runs in parallel, so the `scoring` field is the summed time of all
//! batches rather than wall time.

use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
pub struct SearchTimings {
    /// Preparing the query and collecting candidates from every library.
    pub candidate_selection: Duration,

    /// Summed across all candidate batches.
    pub scoring: Duration,

    /// Sorting, truncation and hit probability.
    pub ranking: Duration,

    pub num_candidates: usize,
}

impl Serialize for SearchTimings {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("SearchTimings", 4)?;
        state.serialize_field(
            "candidate_selection_ms",
            &self.candidate_selection.as_millis(),
        )?;
        state.serialize_field("scoring_ms", &self.scoring.as_millis())?;
        state.serialize_field("ranking_ms", &self.ranking.as_millis())?;
        state.serialize_field("num_candidates", &self.num_candidates)?;
        state.end()
    }
}

impl std::ops::AddAssign for SearchTimings {
    fn add_assign(&mut self, rhs: Self) {
        self.candidate_selection += rhs.candidate_selection;
        self.scoring += rhs.scoring;
        self.ranking += rhs.ranking;
        self.num_candidates += rhs.num_candidates;
    }
}
