pub mod analyzer;
pub mod dump;

pub use analyzer::Analyzer;
pub use dump::SnapshotDumpBuilder;
