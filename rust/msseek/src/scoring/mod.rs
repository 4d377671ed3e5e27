pub(crate) mod accumulator;
pub mod ranking;
pub mod scorer;
pub mod timings;

pub use ranking::{
    ScoredCandidate,
    rank_candidates,
};
pub use scorer::{
    MAX_MATCH_FACTOR,
    MatchScores,
    SimilarityScorer,
    WeightedSpectrum,
};
pub use timings::SearchTimings;
