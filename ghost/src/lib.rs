pub mod error;
pub mod extractor;
pub mod filename;
pub mod recorder;
pub mod writer;

/// On-disk ghost format version.
pub const GHOST_VERSION: u8 = 1;

pub use error::GhostError;
pub use extractor::GhostExtractor;
pub use filename::ghost_filename;
pub use recorder::{GhostCharacter, GhostMeta, GhostRecorder, GhostSkin};
