use tw_demos::types::MapChecksum;

/// Builds the artifact filename:
/// `{map}_{player}_{finish_seconds:.3}_{timestamp}_{checksum_hex}.gho`,
/// with every space replaced by a dash. Nothing else is escaped; map and
/// player names are trusted demo content.
pub fn ghost_filename(
    map_name: &str,
    player_name: &str,
    finish_time_ms: i32,
    timestamp: &str,
    checksum: &MapChecksum,
) -> String {
    let name = format!(
        "{}_{}_{:.3}_{}_{}.gho",
        map_name,
        player_name,
        f64::from(finish_time_ms) / 1000.0,
        timestamp,
        checksum
    );
    name.replace(' ', "-")
}
