//! Ordering policy for scored candidates.

use super::scorer::MatchScores;
use std::cmp::Ordering;

/// A candidate after scoring, before it is turned into a [`crate::SearchResult`].
///
/// `position` is the record index inside its library, which is also its load
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredCandidate {
    pub lib_idx: usize,
    pub position: usize,
    pub scores: MatchScores,
}

/// Forward score desc, reverse score desc, then library and record load order.
pub fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.scores
        .forward
        .cmp(&a.scores.forward)
        .then_with(|| b.scores.reverse.cmp(&a.scores.reverse))
        .then_with(|| a.lib_idx.cmp(&b.lib_idx))
        .then_with(|| a.position.cmp(&b.position))
}

/// Sorts the complete candidate set and keeps the best `n_hits`.
///
/// Must be called with every scored candidate of the search, truncation
/// happens only after sorting.
pub fn rank_candidates(mut hits: Vec<ScoredCandidate>, n_hits: usize) -> Vec<ScoredCandidate> {
    // The load order keys make the comparison total, so the result does not
    // depend on the order parallel batches finished in.
    hits.sort_by(compare_candidates);
    hits.truncate(n_hits);
    hits
}

/// Forward score of each hit divided by the sum over all returned hits.
pub fn hit_probabilities(hits: &[ScoredCandidate]) -> Vec<f64> {
    let total: u64 = hits.iter().map(|h| h.scores.forward as u64).sum();
    if total == 0 {
        return vec![0.0; hits.len()];
    }
    hits.iter()
        .map(|h| h.scores.forward as f64 / total as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(lib_idx: usize, position: usize, forward: u16, reverse: u16) -> ScoredCandidate {
        ScoredCandidate {
            lib_idx,
            position,
            scores: MatchScores {
                forward,
                reverse,
                matched_peaks: 1,
            },
        }
    }

    #[test]
    fn test_ordering_and_truncation() {
        let hits = vec![
            cand(0, 3, 500, 900),
            cand(1, 0, 800, 800),
            cand(0, 1, 800, 950),
            cand(0, 0, 120, 120),
        ];
        let ranked = rank_candidates(hits, 3);
        let keys: Vec<(usize, usize)> = ranked.iter().map(|h| (h.lib_idx, h.position)).collect();
        assert_eq!(keys, vec![(0, 1), (1, 0), (0, 3)]);
    }

    #[test]
    fn test_exact_ties_follow_load_order() {
        let hits = vec![cand(1, 0, 700, 700), cand(0, 5, 700, 700), cand(0, 2, 700, 700)];
        let ranked = rank_candidates(hits, 10);
        let keys: Vec<(usize, usize)> = ranked.iter().map(|h| (h.lib_idx, h.position)).collect();
        assert_eq!(keys, vec![(0, 2), (0, 5), (1, 0)]);
    }

    #[test]
    fn test_hit_probabilities() {
        let hits = vec![cand(0, 0, 600, 0), cand(0, 1, 300, 0), cand(0, 2, 100, 0)];
        let probs = hit_probabilities(&hits);
        assert_eq!(probs, vec![0.6, 0.3, 0.1]);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);

        let zeros = vec![cand(0, 0, 0, 0)];
        assert_eq!(hit_probabilities(&zeros), vec![0.0]);
        assert!(hit_probabilities(&[]).is_empty());
    }
}
