//! In-memory reference library with a coarse peak index.
//!
//! A library is frozen once [`Library::load`] returns. Every record has its
//! spectrum prepared for scoring up front and the nominal masses of its
//! strongest peaks are indexed, so quick searches only score records that
//! share at least one major peak with the query.

use crate::config::IndexConfig;
use crate::errors::{
    MsSeekError,
    Result,
};
use crate::models::{
    ReferenceRecord,
    Spectrum,
};
use crate::scoring::{
    SimilarityScorer,
    WeightedSpectrum,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Position of the entry in the input sequence.
    pub position: usize,
    pub reason: String,
}

/// Outcome of loading a library.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub accepted: usize,
    pub rejected: Vec<RejectedRecord>,
}

impl LoadReport {
    pub fn num_rejected(&self) -> usize {
        self.rejected.len()
    }
}

#[derive(Debug)]
pub struct Library {
    name: String,
    lib_idx: usize,
    records: Vec<ReferenceRecord>,
    prepared: Vec<WeightedSpectrum>,
    by_spec_loc: HashMap<u32, usize>,
    /// Nominal mass -> positions of the records having it among their top peaks.
    peak_index: HashMap<u32, Vec<usize>>,
    index_config: IndexConfig,
    scorer: SimilarityScorer,
}

impl Library {
    /// Builds a library from a sequence of parsed entries.
    ///
    /// Entries that failed to parse, or whose spectrum has no usable peaks,
    /// are skipped and listed in the returned [`LoadReport`]. Each accepted
    /// record gets `lib_idx` and its `spec_loc`, which is the entry's position
    /// in the input so it stays meaningful when earlier entries are rejected.
    pub fn load<I>(
        name: impl Into<String>,
        lib_idx: usize,
        entries: I,
        scorer: SimilarityScorer,
        index_config: IndexConfig,
    ) -> (Self, LoadReport)
    where
        I: IntoIterator<Item = Result<ReferenceRecord>>,
    {
        let name = name.into();
        let mut report = LoadReport::default();
        let mut records = Vec::new();
        let mut prepared = Vec::new();

        for (position, entry) in entries.into_iter().enumerate() {
            let mut record = match entry {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping entry {} of library '{}': {}", position, name, e);
                    report.rejected.push(RejectedRecord {
                        position,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let weighted = match scorer.prepare(&record.mass_spec) {
                Ok(w) if !w.is_empty() => w,
                Ok(_) => {
                    report.rejected.push(RejectedRecord {
                        position,
                        reason: "spectrum has no scorable peaks".into(),
                    });
                    warn!(
                        "Skipping record '{}' ({}) of library '{}': no scorable peaks",
                        record.name, position, name
                    );
                    continue;
                }
                Err(e) => {
                    warn!(
                        "Skipping record '{}' ({}) of library '{}': {}",
                        record.name, position, name, e
                    );
                    report.rejected.push(RejectedRecord {
                        position,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            record.lib_idx = lib_idx;
            record.spec_loc = position as u32;
            records.push(record);
            prepared.push(weighted);
        }

        let by_spec_loc = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.spec_loc, i))
            .collect();

        let mut peak_index: HashMap<u32, Vec<usize>> = HashMap::new();
        for (i, weighted) in prepared.iter().enumerate() {
            for mass in weighted.top_masses(index_config.index_peaks) {
                peak_index.entry(mass).or_default().push(i);
            }
        }

        report.accepted = records.len();
        info!(
            "Loaded library '{}' as {}: {} records accepted, {} rejected, {} index keys",
            name,
            lib_idx,
            report.accepted,
            report.num_rejected(),
            peak_index.len()
        );

        let library = Self {
            name,
            lib_idx,
            records,
            prepared,
            by_spec_loc,
            peak_index,
            index_config,
            scorer,
        };
        (library, report)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lib_idx(&self) -> usize {
        self.lib_idx
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ReferenceRecord] {
        &self.records
    }

    /// Looks a record up by its location key.
    pub fn get(&self, spec_loc: u32) -> Result<&ReferenceRecord> {
        self.by_spec_loc
            .get(&spec_loc)
            .map(|&i| &self.records[i])
            .ok_or(MsSeekError::NotFound {
                lib_idx: self.lib_idx,
                spec_loc: Some(spec_loc),
            })
    }

    pub(crate) fn record_at(&self, position: usize) -> &ReferenceRecord {
        &self.records[position]
    }

    pub(crate) fn prepared_at(&self, position: usize) -> &WeightedSpectrum {
        &self.prepared[position]
    }

    /// Positions of the records sharing an indexed peak with the query.
    ///
    /// Falls back to every position when the index yields fewer than
    /// `candidate_floor` records.
    pub(crate) fn candidate_positions(&self, query: &WeightedSpectrum) -> Vec<usize> {
        let mut positions: Vec<usize> = query
            .top_masses(self.index_config.index_peaks)
            .into_iter()
            .filter_map(|mass| self.peak_index.get(&mass))
            .flatten()
            .copied()
            .collect();
        positions.sort_unstable();
        positions.dedup();

        if positions.len() < self.index_config.candidate_floor {
            debug!(
                "Index gave {} candidates in '{}', below the floor of {}; using all {} records",
                positions.len(),
                self.name,
                self.index_config.candidate_floor,
                self.records.len()
            );
            return (0..self.records.len()).collect();
        }
        positions
    }

    /// Records that might plausibly match the query.
    ///
    /// The returned iterator is cheap to clone, which restarts it.
    pub fn candidates_for(&self, query: &Spectrum) -> Result<Candidates<'_>> {
        let prepared = self.scorer.prepare(query)?;
        Ok(Candidates {
            records: &self.records,
            positions: self.candidate_positions(&prepared).into_iter(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Candidates<'a> {
    records: &'a [ReferenceRecord],
    positions: std::vec::IntoIter<usize>,
}

impl<'a> Iterator for Candidates<'a> {
    type Item = &'a ReferenceRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.positions.next().map(|i| &self.records[i])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl ExactSizeIterator for Candidates<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::models::CasNumber;

    fn record(name: &str, peaks: &[(f64, f64)]) -> ReferenceRecord {
        ReferenceRecord::new(
            name,
            CasNumber::Unknown,
            0,
            Spectrum::from_peaks(peaks.iter().copied()).unwrap(),
        )
    }

    fn load(records: Vec<Result<ReferenceRecord>>, index: IndexConfig) -> (Library, LoadReport) {
        Library::load(
            "test.msp",
            2,
            records,
            SimilarityScorer::new(ScoringConfig::default()),
            index,
        )
    }

    #[test]
    fn test_load_assigns_locations() {
        let (lib, report) = load(
            vec![
                Ok(record("A", &[(50.0, 10.0)])),
                Ok(record("B", &[(60.0, 10.0)])),
            ],
            IndexConfig::default(),
        );
        assert_eq!(report.accepted, 2);
        assert!(report.rejected.is_empty());
        assert_eq!(lib.get(1).unwrap().name, "B");
        assert_eq!(lib.get(1).unwrap().lib_idx, 2);
        assert!(matches!(
            lib.get(7),
            Err(MsSeekError::NotFound {
                lib_idx: 2,
                spec_loc: Some(7)
            })
        ));
    }

    #[test]
    fn test_bad_records_are_rejected_not_fatal() {
        let silent = record("SILENT", &[(50.0, 0.0)]);
        let empty = ReferenceRecord::new("EMPTY", CasNumber::Unknown, 0, Spectrum::default());
        let (lib, report) = load(
            vec![
                Ok(silent),
                Err(MsSeekError::ParseError {
                    msg: "broken line".into(),
                }),
                Ok(empty),
                Ok(record("GOOD", &[(77.0, 100.0)])),
            ],
            IndexConfig::default(),
        );
        assert_eq!(report.accepted, 1);
        let rejected: Vec<usize> = report.rejected.iter().map(|r| r.position).collect();
        assert_eq!(rejected, vec![0, 1, 2]);
        assert!(report.rejected[1].reason.contains("broken line"));

        // Location keys keep pointing at the input position
        assert_eq!(lib.get(3).unwrap().name, "GOOD");
        assert!(lib.get(0).is_err());
    }

    #[test]
    fn test_candidates_use_index_above_floor() {
        let mut records = Vec::new();
        for i in 0..20 {
            let peaks = [(91.0, 100.0), (30.0 + i as f64, 5.0)];
            records.push(Ok(record(&format!("HAS_91_{}", i), &peaks)));
        }
        for i in 0..20 {
            records.push(Ok(record(&format!("NO_91_{}", i), &[(200.0 + i as f64, 100.0)])));
        }
        let (lib, _) = load(
            records,
            IndexConfig {
                index_peaks: 6,
                candidate_floor: 5,
            },
        );

        let query = Spectrum::from_peaks(vec![(91.0, 50.0)]).unwrap();
        let candidates = lib.candidates_for(&query).unwrap();
        assert_eq!(candidates.len(), 20);
        assert!(candidates.clone().all(|r| r.name.starts_with("HAS_91")));
        // Restartable
        assert_eq!(candidates.clone().count(), candidates.count());
    }

    #[test]
    fn test_candidates_fall_back_below_floor() {
        let (lib, _) = load(
            vec![
                Ok(record("A", &[(91.0, 100.0)])),
                Ok(record("B", &[(92.0, 100.0)])),
                Ok(record("C", &[(93.0, 100.0)])),
            ],
            IndexConfig {
                index_peaks: 6,
                candidate_floor: 2,
            },
        );
        let query = Spectrum::from_peaks(vec![(91.0, 50.0)]).unwrap();
        assert_eq!(lib.candidates_for(&query).unwrap().count(), 3);
    }
}
