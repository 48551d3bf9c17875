use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of the per-demo player slot table. Snapshot item ids at or above
/// this bound do not correspond to a player slot.
pub const MAX_PLAYERS: usize = 128;

/// Per-demo network object identifier. For client-info and character
/// items this doubles as the player slot index.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u16);

impl SlotId {
    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether the id falls inside the player slot table.
    pub fn is_valid(self) -> bool {
        (self.0 as usize) < MAX_PLAYERS
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for SlotId {
    fn from(v: u16) -> Self {
        SlotId(v)
    }
}

/// A game tick. Ticks increase monotonically over the course of a demo.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Tick(pub i32);

impl Tick {
    pub fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Tick {
    fn from(v: i32) -> Self {
        Tick(v)
    }
}

/// Map integrity checksum from the demo header. Newer demos carry the
/// full SHA-256 of the map, older ones only a CRC32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MapChecksum {
    Sha256([u8; 32]),
    Crc32(u32),
}

impl fmt::Display for MapChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapChecksum::Sha256(sha) => {
                for b in sha {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            MapChecksum::Crc32(crc) => write!(f, "{crc:08x}"),
        }
    }
}
