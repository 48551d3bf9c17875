use thiserror::Error;

use crate::types::SlotId;

pub type IResult<I, T> = nom::IResult<I, T>;

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a demo file (bad magic)")]
    BadMagic,
    #[error("unsupported demo version {0}")]
    UnsupportedVersion(u8),
    #[error("demo header truncated")]
    TruncatedHeader,
    #[error("chunk truncated at end of stream")]
    TruncatedChunk,
    #[error("unknown chunk tag {0:#04x}")]
    UnknownChunkTag(u8),
    #[error("snapshot payload exceeds the maximum supported size ({0} bytes)")]
    OversizedSnapshot(usize),
    #[error("malformed snapshot payload: {0}")]
    MalformedSnapshot(&'static str),
    #[error("item payload too short for type {type_id} ({len} words)")]
    ShortItemPayload { type_id: u16, len: usize },
    #[error("delta item size mismatch for {type_id}:{id}")]
    DeltaMismatch { type_id: u16, id: SlotId },
}
