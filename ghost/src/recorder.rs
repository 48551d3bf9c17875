use tw_demos::snapshot::Character;

/// Skin descriptor carried in the ghost header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GhostSkin {
    pub name: String,
    pub use_custom_color: bool,
    pub color_body: i32,
    pub color_feet: i32,
}

/// Replay metadata attached to a finished trajectory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GhostMeta {
    pub player_name: String,
    pub map_name: String,
    pub finish_time_ms: i32,
}

/// One recorded character state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GhostCharacter {
    pub tick: i32,
    pub x: i32,
    pub y: i32,
    pub vel_x: i32,
    pub vel_y: i32,
    pub angle: i32,
    pub direction: i32,
    pub weapon: i32,
    pub hook_state: i32,
    pub hook_x: i32,
    pub hook_y: i32,
    pub attack_tick: i32,
}

impl From<&Character> for GhostCharacter {
    fn from(c: &Character) -> Self {
        GhostCharacter {
            tick: c.core.tick,
            x: c.core.x,
            y: c.core.y,
            vel_x: c.core.vel_x,
            vel_y: c.core.vel_y,
            angle: c.core.angle,
            direction: c.core.direction,
            weapon: c.weapon,
            hook_state: c.core.hook_state,
            hook_x: c.core.hook_x,
            hook_y: c.core.hook_y,
            attack_tick: c.attack_tick,
        }
    }
}

/// Accumulates one player's trajectory in stream order.
#[derive(Debug, Clone, Default)]
pub struct GhostRecorder {
    pub(crate) skin: GhostSkin,
    pub(crate) meta: Option<GhostMeta>,
    pub(crate) samples: Vec<GhostCharacter>,
}

impl GhostRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_skin(&mut self, name: &str, use_custom_color: bool, color_body: i32, color_feet: i32) {
        self.skin = GhostSkin {
            name: name.to_owned(),
            use_custom_color,
            color_body,
            color_feet,
        };
    }

    pub fn set_meta(&mut self, player_name: &str, map_name: &str, finish_time_ms: i32) {
        self.meta = Some(GhostMeta {
            player_name: player_name.to_owned(),
            map_name: map_name.to_owned(),
            finish_time_ms,
        });
    }

    pub fn push(&mut self, sample: GhostCharacter) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[GhostCharacter] {
        &self.samples
    }

    pub fn skin(&self) -> &GhostSkin {
        &self.skin
    }

    pub fn meta(&self) -> Option<&GhostMeta> {
        self.meta.as_ref()
    }
}
