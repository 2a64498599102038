pub mod config;
pub mod error;
pub mod models;
pub mod report;
pub mod snapshot;
pub mod summary;
pub mod util;

pub use error::ScanError;
