//! Binary serialization of ghost artifacts.
//!
//! Layout: magic `"TWGH"`, version byte, length-prefixed meta strings
//! (player, map), finish time, skin block, then the sample count and the
//! fixed twelve-word samples. Everything little-endian.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::GHOST_VERSION;
use crate::error::GhostError;
use crate::recorder::{GhostCharacter, GhostRecorder, GhostSkin};

pub const GHOST_MAGIC: &[u8; 4] = b"TWGH";

pub fn save(recorder: &GhostRecorder, path: &Path) -> Result<(), GhostError> {
    let meta = recorder.meta().ok_or(GhostError::MissingMeta)?;
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(GHOST_MAGIC)?;
    w.write_all(&[GHOST_VERSION])?;
    write_str(&mut w, &meta.player_name)?;
    write_str(&mut w, &meta.map_name)?;
    w.write_all(&meta.finish_time_ms.to_le_bytes())?;

    let skin = recorder.skin();
    write_str(&mut w, &skin.name)?;
    w.write_all(&[skin.use_custom_color as u8])?;
    w.write_all(&skin.color_body.to_le_bytes())?;
    w.write_all(&skin.color_feet.to_le_bytes())?;

    w.write_all(&(recorder.len() as u32).to_le_bytes())?;
    for s in recorder.samples() {
        for v in sample_words(s) {
            w.write_all(&v.to_le_bytes())?;
        }
    }
    w.flush()?;
    Ok(())
}

pub fn load(path: &Path) -> Result<GhostRecorder, GhostError> {
    let mut r = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != GHOST_MAGIC {
        return Err(GhostError::BadFormat("bad magic".to_owned()));
    }
    let version = read_u8(&mut r)?;
    if version != GHOST_VERSION {
        return Err(GhostError::BadFormat(format!("unknown version {version}")));
    }

    let player_name = read_str(&mut r)?;
    let map_name = read_str(&mut r)?;
    let finish_time_ms = read_i32(&mut r)?;

    let skin = GhostSkin {
        name: read_str(&mut r)?,
        use_custom_color: read_u8(&mut r)? != 0,
        color_body: read_i32(&mut r)?,
        color_feet: read_i32(&mut r)?,
    };

    let num_samples = read_u32(&mut r)? as usize;
    let mut recorder = GhostRecorder {
        skin,
        meta: None,
        samples: Vec::with_capacity(num_samples.min(1 << 16)),
    };
    recorder.set_meta(&player_name, &map_name, finish_time_ms);
    for _ in 0..num_samples {
        let mut words = [0i32; 12];
        for w in &mut words {
            *w = read_i32(&mut r)?;
        }
        recorder.push(sample_from_words(words));
    }
    Ok(recorder)
}

fn sample_words(s: &GhostCharacter) -> [i32; 12] {
    [
        s.tick,
        s.x,
        s.y,
        s.vel_x,
        s.vel_y,
        s.angle,
        s.direction,
        s.weapon,
        s.hook_state,
        s.hook_x,
        s.hook_y,
        s.attack_tick,
    ]
}

fn sample_from_words(w: [i32; 12]) -> GhostCharacter {
    GhostCharacter {
        tick: w[0],
        x: w[1],
        y: w[2],
        vel_x: w[3],
        vel_y: w[4],
        angle: w[5],
        direction: w[6],
        weapon: w[7],
        hook_state: w[8],
        hook_x: w[9],
        hook_y: w[10],
        attack_tick: w[11],
    }
}

fn write_str<W: Write>(w: &mut W, s: &str) -> Result<(), GhostError> {
    let bytes = s.as_bytes();
    w.write_all(&(bytes.len() as u16).to_le_bytes())?;
    w.write_all(bytes)?;
    Ok(())
}

fn read_str<R: Read>(r: &mut R) -> Result<String, GhostError> {
    let mut len = [0u8; 2];
    r.read_exact(&mut len)?;
    let mut bytes = vec![0u8; u16::from_le_bytes(len) as usize];
    r.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| GhostError::BadFormat("non-UTF-8 string".to_owned()))
}

fn read_u8<R: Read>(r: &mut R) -> Result<u8, GhostError> {
    let mut b = [0u8; 1];
    r.read_exact(&mut b)?;
    Ok(b[0])
}

fn read_i32<R: Read>(r: &mut R) -> Result<i32, GhostError> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(i32::from_le_bytes(b))
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, GhostError> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tw-ghost-writer-{}-{name}", std::process::id()))
    }

    #[test]
    fn save_then_load_roundtrip() {
        let mut recorder = GhostRecorder::new();
        recorder.set_skin("cammo", true, 0x112233, 0x445566);
        recorder.set_meta("Tee", "Multeasymap", 62500);
        for tick in 1..=5 {
            recorder.push(GhostCharacter {
                tick,
                x: tick * 32,
                ..Default::default()
            });
        }

        let path = temp_path("roundtrip.gho");
        save(&recorder, &path).unwrap();
        let loaded = load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.meta(), recorder.meta());
        assert_eq!(loaded.skin(), recorder.skin());
        assert_eq!(loaded.samples(), recorder.samples());
    }

    #[test]
    fn save_without_meta_fails() {
        let mut recorder = GhostRecorder::new();
        recorder.push(GhostCharacter::default());
        let path = temp_path("no-meta.gho");
        assert!(matches!(
            save(&recorder, &path),
            Err(GhostError::MissingMeta)
        ));
        assert!(!path.exists());
    }
}
