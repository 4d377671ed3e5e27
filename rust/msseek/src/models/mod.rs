mod cas;
mod reference;
mod search_result;
mod spectrum;

pub use cas::CasNumber;
pub use reference::ReferenceRecord;
pub use search_result::SearchResult;
pub(crate) use spectrum::SerSpectrum;
pub use spectrum::{
    NORMALIZED_MAX_INTENSITY,
    Peak,
    Spectrum,
};
