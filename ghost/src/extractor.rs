//! The ghost extraction pipeline: player slot reconstruction and
//! trajectory accumulation over a demo's snapshot stream.
//!
//! Slots are keyed by snapshot item id. A slot activates on the first
//! client-info item observed for its id and stays active for the rest of
//! the run; the demo format never tears a slot down mid-stream.

use std::path::Path;

use tracing::{debug, error, info, warn};
use tw_demos::DemoHeader;
use tw_demos::analyzer::Analyzer;
use tw_demos::intstring::ints_to_string;
use tw_demos::snapshot::{Character, ClientInfo, SnapObj, Snapshot};
use tw_demos::types::{MAX_PLAYERS, MapChecksum, SlotId};

use crate::filename::ghost_filename;
use crate::recorder::GhostRecorder;
use crate::writer;

#[derive(Debug, Default)]
struct PlayerSlot {
    name: String,
    ghost: Option<GhostRecorder>,
    /// Milliseconds; None until finalization.
    finish_time: Option<i32>,
}

impl PlayerSlot {
    fn is_active(&self) -> bool {
        self.ghost.is_some()
    }
}

/// Reconstructs per-player ghosts from a demo's snapshot stream.
pub struct GhostExtractor {
    map_name: String,
    timestamp: String,
    /// Demo length in seconds.
    length: i32,
    checksum: MapChecksum,
    slots: Vec<PlayerSlot>,
}

impl GhostExtractor {
    pub fn new(header: &DemoHeader) -> Self {
        Self {
            map_name: header.map_name.clone(),
            timestamp: header.timestamp.clone(),
            length: header.length,
            checksum: header.checksum(),
            slots: (0..MAX_PLAYERS).map(|_| PlayerSlot::default()).collect(),
        }
    }

    /// First client-info wins; later ones for the same id are ignored.
    fn activate(&mut self, id: SlotId, info: &ClientInfo) {
        let slot = &mut self.slots[id.index()];
        if slot.is_active() {
            return;
        }
        slot.name = ints_to_string(&info.name).unwrap_or_default();
        let skin_name = ints_to_string(&info.skin).unwrap_or_default();
        let mut ghost = GhostRecorder::new();
        ghost.set_skin(
            &skin_name,
            info.use_custom_color != 0,
            info.color_body,
            info.color_feet,
        );
        slot.ghost = Some(ghost);
        info!(id = id.raw(), name = %slot.name, "found player");
    }

    fn append_sample(&mut self, id: SlotId, character: &Character) {
        if let Some(ghost) = self.slots[id.index()].ghost.as_mut() {
            ghost.push(character.into());
        }
    }

    pub fn num_active(&self) -> usize {
        self.slots.iter().filter(|s| s.is_active()).count()
    }

    pub fn player_name(&self, id: SlotId) -> Option<&str> {
        self.slots
            .get(id.index())
            .filter(|s| s.is_active())
            .map(|s| s.name.as_str())
    }

    pub fn sample_count(&self, id: SlotId) -> usize {
        self.slots
            .get(id.index())
            .and_then(|s| s.ghost.as_ref())
            .map_or(0, GhostRecorder::len)
    }

    pub fn finish_time(&self, id: SlotId) -> Option<i32> {
        self.slots.get(id.index()).and_then(|s| s.finish_time)
    }

    /// Persists every active slot with at least one sample into
    /// `out_dir`, returning `(saved, failed)`. One slot's failure never
    /// aborts the rest; slots without samples emit nothing.
    pub fn save_all(&mut self, out_dir: &Path) -> (usize, usize) {
        let map_name = self.map_name.clone();
        let timestamp = self.timestamp.clone();
        let checksum = self.checksum;
        let fallback_ms = self.length.saturating_mul(1000);

        let (mut saved, mut failed) = (0, 0);
        for slot in &mut self.slots {
            let Some(ghost) = slot.ghost.as_mut() else {
                continue;
            };
            if ghost.is_empty() {
                continue;
            }
            let finish_ms = slot.finish_time.unwrap_or(fallback_ms);
            ghost.set_meta(&slot.name, &map_name, finish_ms);
            let filename = ghost_filename(&map_name, &slot.name, finish_ms, &timestamp, &checksum);
            match writer::save(ghost, &out_dir.join(&filename)) {
                Ok(()) => {
                    info!(player = %slot.name, file = %filename, "saved ghost");
                    saved += 1;
                }
                Err(e) => {
                    error!(player = %slot.name, "could not save ghost: {e}");
                    failed += 1;
                }
            }
        }
        (saved, failed)
    }
}

impl Analyzer for GhostExtractor {
    fn process(&mut self, snapshot: &Snapshot) {
        for item in snapshot.items() {
            if !item.id.is_valid() {
                warn!(id = item.id.raw(), type_id = item.type_id, "snapshot item id out of range");
                continue;
            }
            match item.decode() {
                Ok(SnapObj::ClientInfo(info)) => self.activate(item.id, &info),
                Ok(SnapObj::Character(character)) => self.append_sample(item.id, &character),
                Ok(SnapObj::DdraceTime(_)) => {
                    // Finish events are not wired up; finish() uses the
                    // demo length instead.
                }
                Ok(obj) => debug!(kind = ?obj.kind(), "ignoring snapshot item"),
                Err(e) => debug!(id = item.id.raw(), "undecodable snapshot item: {e}"),
            }
        }
    }

    fn finish(&mut self) {
        // Placeholder policy: every recorded player finishes at the
        // demo's total length.
        let finish_ms = self.length.saturating_mul(1000);
        for slot in &mut self.slots {
            if slot.ghost.as_ref().is_some_and(|g| !g.is_empty()) {
                slot.finish_time = Some(finish_ms);
            }
        }
    }
}
