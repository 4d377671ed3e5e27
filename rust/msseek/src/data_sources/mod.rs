mod msp;
pub mod speclib;

pub use speclib::{
    LibraryFormat,
    LibraryReader,
    SerReferenceEntry,
    read_library_file,
    write_library,
    write_library_file,
};
