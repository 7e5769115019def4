//! Service layer for image I/O and export encoding

pub mod format;
pub mod io;

pub use format::ExportFormatHandler;
pub use io::ImageIoService;
