//! The legacy integer-packed string encoding.
//!
//! Network strings travel as fixed runs of 32-bit integers, four bytes per
//! integer packed most-significant first, every byte biased by +128 so the
//! wire never carries a plain NUL. Decoding reverses the bias, forces a
//! terminator into the last byte and validates the result as well-formed
//! UTF-8 before handing it to the caller.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StringError {
    #[error("no integers to decode")]
    Empty,
    #[error("output buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },
    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}

fn cont(bytes: &[u8], i: usize) -> bool {
    bytes.get(i).is_some_and(|&b| (0x80..=0xBF).contains(&b))
}

fn in_range(bytes: &[u8], i: usize, lo: u8, hi: u8) -> bool {
    bytes.get(i).is_some_and(|&b| (lo..=hi).contains(&b))
}

/// Strict UTF-8 well-formedness check over `bytes`, which must already be
/// truncated at the terminator. Overlong encodings and surrogate halves
/// are rejected along with stray continuation or out-of-range lead bytes.
pub fn utf8_check(bytes: &[u8]) -> bool {
    let mut i = 0;
    while i < bytes.len() {
        let tail = match bytes[i] {
            0x00..=0x7F => 0,
            0xC2..=0xDF if cont(bytes, i + 1) => 1,
            0xE0 if in_range(bytes, i + 1, 0xA0, 0xBF) && cont(bytes, i + 2) => 2,
            0xE1..=0xEC | 0xEE | 0xEF if cont(bytes, i + 1) && cont(bytes, i + 2) => 2,
            0xED if in_range(bytes, i + 1, 0x80, 0x9F) && cont(bytes, i + 2) => 2,
            0xF0 if in_range(bytes, i + 1, 0x90, 0xBF)
                && cont(bytes, i + 2)
                && cont(bytes, i + 3) =>
            {
                3
            }
            0xF1..=0xF3 if cont(bytes, i + 1) && cont(bytes, i + 2) && cont(bytes, i + 3) => 3,
            0xF4 if in_range(bytes, i + 1, 0x80, 0x8F)
                && cont(bytes, i + 2)
                && cont(bytes, i + 3) =>
            {
                3
            }
            _ => return false,
        };
        i += tail + 1;
    }
    true
}

/// Decodes `ints` into `buf` and returns the validated string slice.
///
/// The last decoded byte is always overwritten with a terminator, so at
/// most `4 * ints.len() - 1` bytes of payload survive. Fails when there is
/// nothing to decode, when `buf` cannot hold `4 * ints.len()` bytes, or
/// when the decoded bytes are not well-formed UTF-8.
pub fn ints_to_str<'a>(ints: &[i32], buf: &'a mut [u8]) -> Result<&'a str, StringError> {
    if ints.is_empty() {
        return Err(StringError::Empty);
    }
    let need = ints.len() * 4;
    if buf.len() < need {
        return Err(StringError::BufferTooSmall {
            need,
            have: buf.len(),
        });
    }

    let mut at = 0;
    for &v in ints {
        for shift in [24, 16, 8, 0] {
            buf[at] = (((v >> shift) & 0xff) as u8).wrapping_sub(128);
            at += 1;
        }
    }
    buf[at - 1] = 0;

    let end = buf[..at].iter().position(|&b| b == 0).unwrap_or(at - 1);
    if !utf8_check(&buf[..end]) {
        return Err(StringError::InvalidUtf8);
    }
    std::str::from_utf8(&buf[..end]).map_err(|_| StringError::InvalidUtf8)
}

/// Allocating convenience form of [`ints_to_str`].
pub fn ints_to_string(ints: &[i32]) -> Result<String, StringError> {
    let mut buf = vec![0u8; ints.len() * 4];
    ints_to_str(ints, &mut buf).map(str::to_owned)
}

/// The encoding direction: packs `s` into `num_ints` integers, truncating
/// to `4 * num_ints - 1` bytes so the terminator always fits.
pub fn str_to_ints(s: &str, num_ints: usize) -> Vec<i32> {
    if num_ints == 0 {
        return Vec::new();
    }
    let mut bytes = vec![0u8; num_ints * 4];
    let take = s.len().min(num_ints * 4 - 1);
    bytes[..take].copy_from_slice(&s.as_bytes()[..take]);

    bytes
        .chunks_exact(4)
        .map(|c| {
            let e = |b: u8| u32::from(b.wrapping_add(128));
            ((e(c[0]) << 24) | (e(c[1]) << 16) | (e(c[2]) << 8) | e(c[3])) as i32
        })
        .collect()
}
