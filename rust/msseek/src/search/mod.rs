mod cancel;
mod coordinator;
mod library;

pub use cancel::CancellationToken;
pub use coordinator::{
    LibraryHandle,
    LibraryInfo,
    SearchCoordinator,
    SearchMode,
};
pub use library::{
    Candidates,
    Library,
    LoadReport,
    RejectedRecord,
};
