use serde::{
    Deserialize,
    Serialize,
};

/// Parameters of the weighted cosine similarity.
///
/// Every peak contributes `mass^mz_power * intensity^intensity_power` to its
/// spectrum vector. Both spectra are normalized to `normalize_to` and capped
/// to their `max_peaks` most intense peaks before weighting.
///
/// Example:
/// ```
/// use msseek::ScoringConfig;
///
/// let config: ScoringConfig = serde_json::from_str(r#"{"max_peaks": null}"#).unwrap();
/// assert_eq!(config.mz_power, 3.0);
/// assert!(config.max_peaks.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub mz_power: f64,
    pub intensity_power: f64,
    pub max_peaks: Option<usize>,
    pub normalize_to: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            mz_power: 3.0,
            intensity_power: 0.6,
            max_peaks: Some(50),
            normalize_to: 999.0,
        }
    }
}

/// Coarse index used by quick searches to prune candidates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// How many of the most intense (nominal) masses of each spectrum are indexed.
    pub index_peaks: usize,
    /// Below this many candidates the store hands out the full library instead.
    pub candidate_floor: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_peaks: 6,
            candidate_floor: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub scoring: ScoringConfig,
    pub index: IndexConfig,
    /// Candidates scored per parallel task; cancellation is checked between batches.
    pub batch_size: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringConfig::default(),
            index: IndexConfig::default(),
            batch_size: 512,
        }
    }
}
