//! Weighted cosine similarity between mass spectra.
//!
//! Peaks are aligned on nominal (integer dalton) mass. Each aligned bin
//! contributes `mass^a * intensity^b` to the spectrum vector and the score is
//! the cosine between the two vectors, scaled to 0..=1000.
//!
//! The reverse score uses the same dot product but only the reference bins
//! that are also present in the query enter the reference norm, so peaks the
//! query never saw do not count against the match.

use crate::config::ScoringConfig;
use crate::errors::Result;
use crate::models::Spectrum;

/// Upper bound of the match factors.
pub const MAX_MATCH_FACTOR: u16 = 1000;

/// A spectrum that has been normalized, capped and binned, ready to compare.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedSpectrum {
    /// (nominal mass, weight), sorted by mass.
    bins: Vec<(u32, f64)>,
    norm_sq: f64,
}

impl WeightedSpectrum {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Nominal masses of the `n` heaviest-weighted bins.
    pub fn top_masses(&self, n: usize) -> Vec<u32> {
        let mut order: Vec<&(u32, f64)> = self.bins.iter().collect();
        order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        order.into_iter().take(n).map(|(m, _)| *m).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchScores {
    pub forward: u16,
    pub reverse: u16,
    pub matched_peaks: usize,
}

fn to_match_factor(cosine: f64) -> u16 {
    if !cosine.is_finite() {
        return 0;
    }
    (cosine.clamp(0.0, 1.0) * MAX_MATCH_FACTOR as f64).round() as u16
}

/// Stateless scorer; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer {
    config: ScoringConfig,
}

impl SimilarityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Normalizes, caps and bins a spectrum.
    ///
    /// Fails with [`crate::errors::MsSeekError::EmptySpectrum`] when there is
    /// nothing to compare (no peaks or only zero intensities).
    pub fn prepare(&self, spectrum: &Spectrum) -> Result<WeightedSpectrum> {
        let normalized = spectrum.normalize(self.config.normalize_to)?;
        let capped = match self.config.max_peaks {
            Some(n) => normalized.top_n_peaks(n),
            None => normalized,
        };

        // Peaks are sorted by mass so equal nominal masses are adjacent.
        // Keep the strongest peak of each bucket.
        let mut bins: Vec<(u32, f64)> = Vec::with_capacity(capped.len());
        for peak in capped.iter() {
            let nominal = peak.mass.round() as u32;
            match bins.last_mut() {
                Some((last_mass, last_inten)) if *last_mass == nominal => {
                    *last_inten = last_inten.max(peak.intensity);
                }
                _ => bins.push((nominal, peak.intensity)),
            }
        }

        let bins: Vec<(u32, f64)> = bins
            .into_iter()
            .map(|(mass, intensity)| (mass, self.weight(mass, intensity)))
            .filter(|(_, w)| *w > 0.0)
            .collect();
        let norm_sq = bins.iter().map(|(_, w)| w * w).sum();

        Ok(WeightedSpectrum { bins, norm_sq })
    }

    #[inline]
    fn weight(&self, nominal_mass: u32, intensity: f64) -> f64 {
        (nominal_mass as f64).powf(self.config.mz_power)
            * intensity.powf(self.config.intensity_power)
    }

    /// Compares two prepared spectra in a single pass over their bins.
    pub fn score(&self, query: &WeightedSpectrum, reference: &WeightedSpectrum) -> MatchScores {
        if query.is_empty() || reference.is_empty() {
            return MatchScores::default();
        }

        let mut dot = 0.0;
        let mut reference_in_query_sq = 0.0;
        let mut matched_peaks = 0;

        let mut qi = 0;
        let mut ri = 0;
        while qi < query.bins.len() && ri < reference.bins.len() {
            let (q_mass, q_w) = query.bins[qi];
            let (r_mass, r_w) = reference.bins[ri];
            match q_mass.cmp(&r_mass) {
                std::cmp::Ordering::Less => qi += 1,
                std::cmp::Ordering::Greater => ri += 1,
                std::cmp::Ordering::Equal => {
                    dot += q_w * r_w;
                    reference_in_query_sq += r_w * r_w;
                    matched_peaks += 1;
                    qi += 1;
                    ri += 1;
                }
            }
        }

        if matched_peaks == 0 {
            return MatchScores::default();
        }

        let forward = dot / (query.norm_sq.sqrt() * reference.norm_sq.sqrt());
        let reverse = dot / (query.norm_sq.sqrt() * reference_in_query_sq.sqrt());

        MatchScores {
            forward: to_match_factor(forward),
            reverse: to_match_factor(reverse),
            matched_peaks,
        }
    }

    /// Convenience wrapper that prepares both spectra first.
    pub fn score_spectra(&self, query: &Spectrum, reference: &Spectrum) -> Result<MatchScores> {
        let query = self.prepare(query)?;
        let reference = self.prepare(reference)?;
        Ok(self.score(&query, &reference))
    }
}
