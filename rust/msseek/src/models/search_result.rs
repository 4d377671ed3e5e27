use super::cas::CasNumber;
use super::reference::ReferenceRecord;
use serde::{
    Deserialize,
    Serialize,
};

/// One ranked library hit.
///
/// `spec_loc` together with `lib_idx` identifies the reference record the
/// hit came from, see [`crate::SearchCoordinator::get_reference`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub name: String,
    pub cas: CasNumber,
    /// Similarity to the reference out of 1000.
    pub match_factor: u16,
    /// Similarity out of 1000 ignoring peaks only present in the reference.
    pub reverse_match_factor: u16,
    /// Share of this hit's match factor among all returned hits, in [0, 1].
    pub hit_prob: f64,
    pub spec_loc: u32,
    pub lib_idx: usize,
}

impl SearchResult {
    pub fn from_reference(
        record: &ReferenceRecord,
        match_factor: u16,
        reverse_match_factor: u16,
    ) -> Self {
        Self {
            name: record.name.clone(),
            cas: record.cas.clone(),
            match_factor,
            reverse_match_factor,
            hit_prob: 0.0,
            spec_loc: record.spec_loc,
            lib_idx: record.lib_idx,
        }
    }
}

impl std::fmt::Display for SearchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Search Result: {} \t({})", self.name, self.match_factor)
    }
}
