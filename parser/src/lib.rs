pub mod analyzer;
pub mod demofile;
mod error;
pub mod intstring;
pub mod snapshot;
pub mod types;

pub use demofile::*;
pub use error::*;
