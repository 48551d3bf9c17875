pub trait Analyzer {
    fn process(&mut self, snapshot: &crate::snapshot::Snapshot);
    fn finish(&mut self);
}
