use super::cas::CasNumber;
use super::spectrum::{
    NORMALIZED_MAX_INTENSITY,
    Spectrum,
};
use crate::errors::Result;
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt::Write;

/// Number of `mass intensity` pairs per line in MSP peak blocks.
const MSP_PEAKS_PER_LINE: usize = 5;

/// A single entry of a reference library.
///
/// `spec_loc` is unique within the owning library and stays valid for as
/// long as that library is loaded; it is the key used to fetch the record
/// again after a search. `lib_idx` is assigned by the coordinator when the
/// library is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    pub name: String,
    pub cas: CasNumber,
    pub nist_no: u32,
    pub id: String,
    pub formula: String,
    pub mw: u32,
    pub exact_mass: f64,
    pub contributor: String,
    pub synonyms: Vec<String>,
    pub mass_spec: Spectrum,
    pub spec_loc: u32,
    pub lib_idx: usize,
}

impl ReferenceRecord {
    /// Minimal record, mostly useful to build libraries in memory.
    ///
    /// `exact_mass` falls back to `mw`, the same way library exports do when
    /// no exact mass is available.
    pub fn new(name: impl Into<String>, cas: CasNumber, mw: u32, mass_spec: Spectrum) -> Self {
        Self {
            name: name.into(),
            cas,
            nist_no: 0,
            id: String::new(),
            formula: String::new(),
            mw,
            exact_mass: mw as f64,
            contributor: String::new(),
            synonyms: Vec::new(),
            mass_spec,
            spec_loc: 0,
            lib_idx: 0,
        }
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = formula.into();
        self
    }

    pub fn with_synonyms(mut self, synonyms: Vec<String>) -> Self {
        self.synonyms = synonyms;
        self
    }

    pub fn with_contributor(mut self, contributor: impl Into<String>) -> Self {
        self.contributor = contributor.into();
        self
    }

    /// Renders the record as an MSP entry similar to NIST MS Search exports.
    ///
    /// Intensities are rescaled so the base peak is 999.
    pub fn to_msp(&self) -> Result<String> {
        let normalized = self
            .mass_spec
            .normalize(NORMALIZED_MAX_INTENSITY)
            .map_err(|e| e.append_to_context(&format!(" (record '{}')", self.name)))?;

        // Writing into a String cannot fail, so the fmt results are dropped.
        let mut out = String::new();
        let _ = writeln!(out, "Name: {}", self.name);
        for synonym in self.synonyms.iter() {
            let _ = writeln!(out, "Synon: {}", synonym);
        }
        if !self.formula.is_empty() {
            let _ = writeln!(out, "Formula: {}", self.formula);
        }
        let _ = writeln!(out, "MW: {}", self.mw);
        let _ = writeln!(out, "ExactMass: {}", self.exact_mass);
        let _ = writeln!(out, "CAS#: {}; NIST#: {}", self.cas, self.nist_no);
        if !self.id.is_empty() {
            let _ = writeln!(out, "DB#: {}", self.id);
        }
        if !self.contributor.is_empty() {
            let _ = writeln!(out, "Contributor: {}", self.contributor);
        }
        let _ = writeln!(out, "Num Peaks: {}", normalized.len());

        let pairs: Vec<String> = normalized
            .iter()
            .map(|p| format!("{} {}", p.mass, p.intensity.round()))
            .collect();
        for row in pairs.chunks(MSP_PEAKS_PER_LINE) {
            let _ = writeln!(out, "{}", row.join("; "));
        }
        Ok(out)
    }

    pub fn sample() -> Self {
        ReferenceRecord::new(
            "DIPHENYLAMINE",
            CasNumber::Registry("122-39-4".into()),
            169,
            Spectrum::sample(),
        )
        .with_formula("C12H11N")
        .with_synonyms(vec!["Benzenamine, N-phenyl-".into()])
    }
}

impl std::fmt::Display for ReferenceRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Reference Data: {} \t({})", self.name, self.cas)
    }
}
