use crate::analyzer::Analyzer;
use crate::snapshot::Snapshot;

pub struct SnapshotDumpBuilder {}

impl Default for SnapshotDumpBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotDumpBuilder {
    pub fn new() -> Self {
        Self {}
    }

    pub fn build(self) -> Box<dyn Analyzer> {
        Box::new(SnapshotDump {})
    }
}

struct SnapshotDump {}

impl Analyzer for SnapshotDump {
    fn finish(&mut self) {}

    fn process(&mut self, snapshot: &Snapshot) {
        println!("{}", serde_json::to_string(snapshot).unwrap());
    }
}
