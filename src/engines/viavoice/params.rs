/// Engine speed bounds (words per minute scale).
pub const ENGINE_RATE_MAX: i32 = 250;
/// Engine pitch baseline and volume bounds.
pub const ENGINE_PERCENT_MAX: i32 = 100;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    #[error("value '{value}' for {name} is not an integer")]
    InvalidValue { name: String, value: String },
}

/// Host rate in [-100, 100] to engine speed in [0, 250].
pub fn map_rate(host: i32) -> i32 {
    let engine = ((i64::from(host) + 100) * 250) / 200;
    engine.clamp(0, i64::from(ENGINE_RATE_MAX)) as i32
}

/// Host pitch in [-100, 100] to engine pitch baseline in [0, 100].
pub fn map_pitch(host: i32) -> i32 {
    let engine = (i64::from(host) + 100) / 2;
    engine.clamp(0, i64::from(ENGINE_PERCENT_MAX)) as i32
}

/// Host volume in [-100, 100] to engine volume in [0, 100].
pub fn map_volume(host: i32) -> i32 {
    map_pitch(host)
}

/// Engine-native values for the three settings that can change per utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProsodyValues {
    pub speed: i32,
    pub pitch: i32,
    pub volume: i32,
}

/// Host overrides layered on top of the voice the session resolved at init.
///
/// `None` means the host has not touched the setting, so the active voice's
/// own value stays in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeParams {
    pub rate: Option<i32>,
    pub pitch: Option<i32>,
    pub volume: Option<i32>,
}

impl RuntimeParams {
    /// Apply one host `SET`. Voice and language changes are accepted but
    /// ignored, the voice is fixed for the session. Unknown names are ignored.
    pub fn apply(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        let slot = match name {
            "rate" => (&mut self.rate, map_rate as fn(i32) -> i32),
            "pitch" => (&mut self.pitch, map_pitch as fn(i32) -> i32),
            "volume" => (&mut self.volume, map_volume as fn(i32) -> i32),
            "voice" | "synthesis_voice" | "language" => {
                log::debug!("ignoring {name}={value}: voice is fixed by config");
                return Ok(());
            }
            _ => {
                log::debug!("ignoring unsupported parameter {name}={value}");
                return Ok(());
            }
        };

        let host: i32 = value.trim().parse().map_err(|_| ParamError::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        })?;
        let (target, map) = slot;
        *target = Some(map(host));
        Ok(())
    }

    /// Resolve against the active voice's own values.
    pub fn resolve(&self, base: ProsodyValues) -> ProsodyValues {
        ProsodyValues {
            speed: self.rate.unwrap_or(base.speed),
            pitch: self.pitch.unwrap_or(base.pitch),
            volume: self.volume.unwrap_or(base.volume),
        }
    }
}
