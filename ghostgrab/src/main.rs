use std::path::Path;

use anyhow::Context;
use clap::{App, Arg};
use tracing::warn;

use tw_demos::analyzer::{Analyzer, SnapshotDumpBuilder};
use tw_demos::demofile::{ChunkKind, DemoFile};
use tw_demos::snapshot::Snapshot;
use tw_ghost::GhostExtractor;

/// Streams every snapshot-bearing chunk through `analyzer`. A chunk that
/// fails to decode is skipped; a torn stream is fatal.
fn process_demo(demo: &mut DemoFile, analyzer: &mut dyn Analyzer) -> anyhow::Result<()> {
    let mut scratch = Snapshot::default();
    while let Some(chunk) = demo.next_chunk()? {
        let decoded = match chunk.kind {
            ChunkKind::Snapshot => demo.read_snapshot(&chunk, &mut scratch),
            ChunkKind::SnapshotDelta => demo.unpack_delta(&chunk, &mut scratch),
            _ => continue,
        };
        if let Err(e) = decoded {
            warn!("skipping undecodable snapshot chunk: {}", e);
            continue;
        }
        analyzer.process(&scratch);
    }
    analyzer.finish();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let matches = App::new("ghostgrab")
        .about("Extracts per-player ghost files from a Teeworlds/DDNet demo")
        .arg(
            Arg::with_name("DUMP")
                .help("Dump decoded snapshots as JSON instead of writing ghost files")
                .long("dump"),
        )
        .arg(
            Arg::with_name("DEMO")
                .help("The demo file to process")
                .required(true)
                .index(1),
        )
        .get_matches();

    let demo_path = matches.value_of("DEMO").unwrap();
    let mut demo = DemoFile::from_file(Path::new(demo_path))
        .with_context(|| format!("could not read demo file {}", demo_path))?;

    if matches.is_present("DUMP") {
        println!("{}", serde_json::to_string(&demo.header)?);
        let mut dump = SnapshotDumpBuilder::new().build();
        return process_demo(&mut demo, dump.as_mut());
    }

    println!("Opened demo: {}", demo_path);
    println!("  Map: {}", demo.header.map_name);
    println!("  Length: {}s", demo.header.length);
    println!("  Timestamp: {}", demo.header.timestamp);

    let mut extractor = GhostExtractor::new(&demo.header);

    println!("Processing demo...");
    process_demo(&mut demo, &mut extractor)?;

    println!("Finished processing. Saving ghost files...");
    let (saved, failed) = extractor.save_all(Path::new("."));
    if failed > 0 {
        eprintln!("{} ghost(s) failed to save", failed);
    }
    println!("Saved {} ghost(s)", saved);
    Ok(())
}
