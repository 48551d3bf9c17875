//! Decoded snapshots and their typed items.
//!
//! A snapshot is an ordered run of identified items. Items are raw runs of
//! 32-bit words on the wire; [`SnapItem::decode`] lifts them into the one
//! concrete structure their type tag implies.

use kinded::Kinded;
use nom::multi::count;
use nom::number::complete::{le_i32, le_u16, le_u32};
use serde::Serialize;

use crate::error::ErrorKind;
use crate::types::{SlotId, Tick};

/// Upper bound on a decompressed snapshot payload.
pub const MAX_SNAPSHOT_SIZE: usize = 65536;

/// Net object type ids (0.6 numbering).
pub const CHARACTER: u16 = 8;
pub const PLAYER_INFO: u16 = 9;
pub const CLIENT_INFO: u16 = 10;
/// Race finish event. Decoded, but finish times are still taken from the
/// demo length (see the ghost extractor).
pub const DDRACE_TIME: u16 = 25;

/// One typed, identified record inside a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapItem {
    pub type_id: u16,
    pub id: SlotId,
    pub data: Vec<i32>,
}

impl SnapItem {
    /// Lifts the raw words into the typed object the tag implies. Types
    /// this parser does not know stay [`SnapObj::Unknown`].
    pub fn decode(&self) -> Result<SnapObj, ErrorKind> {
        let short = || ErrorKind::ShortItemPayload {
            type_id: self.type_id,
            len: self.data.len(),
        };
        match self.type_id {
            CLIENT_INFO => ClientInfo::from_words(&self.data)
                .map(SnapObj::ClientInfo)
                .ok_or_else(short),
            CHARACTER => Character::from_words(&self.data)
                .map(SnapObj::Character)
                .ok_or_else(short),
            DDRACE_TIME => DdraceTime::from_words(&self.data)
                .map(SnapObj::DdraceTime)
                .ok_or_else(short),
            other => Ok(SnapObj::Unknown { type_id: other }),
        }
    }
}

/// An ordered, reusable sequence of snapshot items.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub tick: Tick,
    items: Vec<SnapItem>,
}

impl Snapshot {
    pub fn new(tick: Tick) -> Self {
        Snapshot {
            tick,
            items: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.tick = Tick::default();
        self.items.clear();
    }

    pub fn push(&mut self, item: SnapItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[SnapItem] {
        &self.items
    }

    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn find(&self, type_id: u16, id: SlotId) -> Option<&SnapItem> {
        self.items
            .iter()
            .find(|it| it.type_id == type_id && it.id == id)
    }

    /// Parses a decompressed full-snapshot payload into `self`, reusing
    /// its allocations. `self` is cleared first.
    pub fn parse_into(&mut self, payload: &[u8]) -> Result<(), ErrorKind> {
        self.clear();
        let (rest, tick) = le_i32::<_, nom::error::Error<&[u8]>>(payload)
            .map_err(|_| ErrorKind::MalformedSnapshot("missing tick"))?;
        let (mut rest, num_items) = le_u32::<_, nom::error::Error<&[u8]>>(rest)
            .map_err(|_| ErrorKind::MalformedSnapshot("missing item count"))?;
        self.tick = Tick(tick);
        for _ in 0..num_items {
            let (r, item) =
                parse_item(rest).map_err(|_| ErrorKind::MalformedSnapshot("truncated item"))?;
            rest = r;
            self.items.push(item);
        }
        if !rest.is_empty() {
            return Err(ErrorKind::MalformedSnapshot("trailing bytes"));
        }
        Ok(())
    }
}

pub(crate) fn parse_item(input: &[u8]) -> crate::IResult<&[u8], SnapItem> {
    let (input, type_id) = le_u16(input)?;
    let (input, id) = le_u16(input)?;
    let (input, num_words) = le_u32(input)?;
    if num_words as usize > MAX_SNAPSHOT_SIZE / 4 {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::TooLarge,
        )));
    }
    let (input, data) = count(le_i32, num_words as usize)(input)?;
    Ok((
        input,
        SnapItem {
            type_id,
            id: SlotId(id),
            data,
        },
    ))
}

/// A decoded, typed snapshot item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Kinded)]
pub enum SnapObj {
    ClientInfo(ClientInfo),
    Character(Character),
    DdraceTime(DdraceTime),
    Unknown { type_id: u16 },
}

/// Player identity: name, clan and skin, sent once per player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub name: [i32; 4],
    pub clan: [i32; 3],
    pub country: i32,
    pub skin: [i32; 6],
    pub use_custom_color: i32,
    pub color_body: i32,
    pub color_feet: i32,
}

impl ClientInfo {
    pub const WORDS: usize = 17;

    pub fn from_words(w: &[i32]) -> Option<Self> {
        if w.len() < Self::WORDS {
            return None;
        }
        Some(ClientInfo {
            name: w[0..4].try_into().ok()?,
            clan: w[4..7].try_into().ok()?,
            country: w[7],
            skin: w[8..14].try_into().ok()?,
            use_custom_color: w[14],
            color_body: w[15],
            color_feet: w[16],
        })
    }

    pub fn to_words(&self) -> Vec<i32> {
        let mut w = Vec::with_capacity(Self::WORDS);
        w.extend_from_slice(&self.name);
        w.extend_from_slice(&self.clan);
        w.push(self.country);
        w.extend_from_slice(&self.skin);
        w.extend_from_slice(&[self.use_custom_color, self.color_body, self.color_feet]);
        w
    }
}

/// Shared physics state of a character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CharacterCore {
    pub tick: i32,
    pub x: i32,
    pub y: i32,
    pub vel_x: i32,
    pub vel_y: i32,
    pub angle: i32,
    pub direction: i32,
    pub jumped: i32,
    pub hooked_player: i32,
    pub hook_state: i32,
    pub hook_tick: i32,
    pub hook_x: i32,
    pub hook_y: i32,
    pub hook_dx: i32,
    pub hook_dy: i32,
}

impl CharacterCore {
    pub const WORDS: usize = 15;

    fn from_words(w: &[i32]) -> Option<Self> {
        if w.len() < Self::WORDS {
            return None;
        }
        Some(CharacterCore {
            tick: w[0],
            x: w[1],
            y: w[2],
            vel_x: w[3],
            vel_y: w[4],
            angle: w[5],
            direction: w[6],
            jumped: w[7],
            hooked_player: w[8],
            hook_state: w[9],
            hook_tick: w[10],
            hook_x: w[11],
            hook_y: w[12],
            hook_dx: w[13],
            hook_dy: w[14],
        })
    }

    fn push_words(&self, w: &mut Vec<i32>) {
        w.extend_from_slice(&[
            self.tick,
            self.x,
            self.y,
            self.vel_x,
            self.vel_y,
            self.angle,
            self.direction,
            self.jumped,
            self.hooked_player,
            self.hook_state,
            self.hook_tick,
            self.hook_x,
            self.hook_y,
            self.hook_dx,
            self.hook_dy,
        ]);
    }
}

/// One tick of a player's full in-game state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Character {
    pub core: CharacterCore,
    pub player_state: i32,
    pub health: i32,
    pub armor: i32,
    pub ammo_count: i32,
    pub weapon: i32,
    pub emote: i32,
    pub attack_tick: i32,
}

impl Character {
    pub const WORDS: usize = CharacterCore::WORDS + 7;

    pub fn from_words(w: &[i32]) -> Option<Self> {
        if w.len() < Self::WORDS {
            return None;
        }
        let core = CharacterCore::from_words(w)?;
        let w = &w[CharacterCore::WORDS..];
        Some(Character {
            core,
            player_state: w[0],
            health: w[1],
            armor: w[2],
            ammo_count: w[3],
            weapon: w[4],
            emote: w[5],
            attack_tick: w[6],
        })
    }

    pub fn to_words(&self) -> Vec<i32> {
        let mut w = Vec::with_capacity(Self::WORDS);
        self.core.push_words(&mut w);
        w.extend_from_slice(&[
            self.player_state,
            self.health,
            self.armor,
            self.ammo_count,
            self.weapon,
            self.emote,
            self.attack_tick,
        ]);
        w
    }
}

/// Race finish broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DdraceTime {
    pub time: i32,
    pub check: i32,
    pub finish: i32,
}

impl DdraceTime {
    pub const WORDS: usize = 3;

    pub fn from_words(w: &[i32]) -> Option<Self> {
        if w.len() < Self::WORDS {
            return None;
        }
        Some(DdraceTime {
            time: w[0],
            check: w[1],
            finish: w[2],
        })
    }

    pub fn to_words(&self) -> Vec<i32> {
        vec![self.time, self.check, self.finish]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intstring::str_to_ints;

    fn client_info(name: &str) -> ClientInfo {
        ClientInfo {
            name: str_to_ints(name, 4).try_into().unwrap(),
            clan: str_to_ints("", 3).try_into().unwrap(),
            country: -1,
            skin: str_to_ints("default", 6).try_into().unwrap(),
            use_custom_color: 0,
            color_body: 0,
            color_feet: 0,
        }
    }

    #[test]
    fn client_info_word_roundtrip() {
        let info = client_info("Tee");
        let item = SnapItem {
            type_id: CLIENT_INFO,
            id: SlotId(3),
            data: info.to_words(),
        };
        assert_eq!(item.data.len(), ClientInfo::WORDS);
        match item.decode().unwrap() {
            SnapObj::ClientInfo(decoded) => assert_eq!(decoded, info),
            other => panic!("expected client info, got {other:?}"),
        }
    }

    #[test]
    fn character_word_roundtrip() {
        let character = Character {
            core: CharacterCore {
                tick: 42,
                x: 100,
                y: -200,
                vel_x: 7,
                vel_y: -7,
                angle: 128,
                direction: 1,
                hook_state: 2,
                hook_x: 90,
                hook_y: 80,
                ..Default::default()
            },
            weapon: 1,
            attack_tick: 40,
            ..Default::default()
        };
        let item = SnapItem {
            type_id: CHARACTER,
            id: SlotId(3),
            data: character.to_words(),
        };
        assert_eq!(item.data.len(), Character::WORDS);
        match item.decode().unwrap() {
            SnapObj::Character(decoded) => assert_eq!(decoded, character),
            other => panic!("expected character, got {other:?}"),
        }
    }

    #[test]
    fn short_payload_is_an_error() {
        let item = SnapItem {
            type_id: CHARACTER,
            id: SlotId(0),
            data: vec![0; Character::WORDS - 1],
        };
        assert!(matches!(
            item.decode(),
            Err(ErrorKind::ShortItemPayload {
                type_id: CHARACTER,
                len
            }) if len == Character::WORDS - 1
        ));
    }

    #[test]
    fn unknown_type_decodes_as_unknown() {
        let item = SnapItem {
            type_id: 999,
            id: SlotId(0),
            data: Vec::new(),
        };
        assert_eq!(
            item.decode().unwrap(),
            SnapObj::Unknown { type_id: 999 }
        );
    }
}
