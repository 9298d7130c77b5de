use std::fmt;
use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::Serialize;

/// Names of the eight preset voices, by index.
pub const PRESET_VOICE_NAMES: [&str; 8] = [
    "Wade", "Flo", "Bobbie", "Male2", "Male3", "Female2", "Grandma", "Grandpa",
];

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: unknown key '{key}'")]
    UnknownKey { line: usize, key: String },
    #[error("line {line}: invalid value '{value}' for {key}")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
    },
    #[error("invalid voice configuration: {0}")]
    Voice(#[from] VoiceConfigBuilderError),
}

/// How forgiving config loading and dictionary setup are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Strictness {
    /// Bad lines and failed dictionaries are logged and skipped.
    #[default]
    Lenient,
    /// Bad lines and failed dictionaries abort init.
    Strict,
}

/// Output sample rate, stored as the engine's parameter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SampleRate {
    Hz8000,
    Hz11025,
    #[default]
    Hz22050,
}

impl SampleRate {
    pub fn code(self) -> i32 {
        match self {
            Self::Hz8000 => 0,
            Self::Hz11025 => 1,
            Self::Hz22050 => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Hz8000),
            1 => Some(Self::Hz11025),
            2 => Some(Self::Hz22050),
            _ => None,
        }
    }

    pub fn hz(self) -> u32 {
        match self {
            Self::Hz8000 => 8000,
            Self::Hz11025 => 11025,
            Self::Hz22050 => 22050,
        }
    }

    /// Accepts a rate in Hz or a raw engine code.
    pub fn parse(value: i64) -> Option<Self> {
        match value {
            8000 => Some(Self::Hz8000),
            11025 => Some(Self::Hz11025),
            22050 => Some(Self::Hz22050),
            code => i32::try_from(code).ok().and_then(Self::from_code),
        }
    }
}

/// One of the engine's eight built-in speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PresetVoice(u8);

impl PresetVoice {
    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < PRESET_VOICE_NAMES.len()).then_some(Self(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        PRESET_VOICE_NAMES[usize::from(self.0)]
    }
}

impl fmt::Display for PresetVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.0, self.name())
    }
}

/// Static voice settings, fixed for the session's lifetime.
///
/// Every override is `None` for "engine default". Ranges are checked by the
/// builder: speed is 0–250, everything else 0–100.
#[derive(Debug, Clone, PartialEq, Eq, Default, Builder, Serialize)]
#[builder(default, build_fn(validate = "Self::validate"))]
pub struct VoiceConfig {
    pub sample_rate: SampleRate,
    pub voice: PresetVoice,
    #[builder(setter(strip_option))]
    pub pitch_baseline: Option<u8>,
    #[builder(setter(strip_option))]
    pub pitch_fluctuation: Option<u8>,
    #[builder(setter(strip_option))]
    pub speed: Option<u8>,
    #[builder(setter(strip_option))]
    pub volume: Option<u8>,
    #[builder(setter(strip_option))]
    pub head_size: Option<u8>,
    #[builder(setter(strip_option))]
    pub roughness: Option<u8>,
    #[builder(setter(strip_option))]
    pub breathiness: Option<u8>,
}

impl VoiceConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        let percent = [
            ("pitch baseline", self.pitch_baseline),
            ("pitch fluctuation", self.pitch_fluctuation),
            ("volume", self.volume),
            ("head size", self.head_size),
            ("roughness", self.roughness),
            ("breathiness", self.breathiness),
        ];
        for (name, value) in percent {
            if let Some(Some(v)) = value {
                if v > 100 {
                    return Err(format!("{name} {v} is outside 0-100"));
                }
            }
        }
        if let Some(Some(v)) = self.speed {
            if v > 250 {
                return Err(format!("speed {v} is outside 0-250"));
            }
        }
        Ok(())
    }
}

/// Engine-wide switches applied once at init.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineFlags {
    pub phrase_prediction: Option<bool>,
    pub number_mode: Option<u32>,
    pub text_mode: Option<u32>,
    pub real_world_units: Option<bool>,
}

impl Default for EngineFlags {
    fn default() -> Self {
        Self {
            // off unless configured; the engine's own default is on
            phrase_prediction: Some(false),
            number_mode: None,
            text_mode: None,
            real_world_units: None,
        }
    }
}

/// User dictionary files, one per dictionary volume.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DictionarySet {
    pub main: Option<PathBuf>,
    pub root: Option<PathBuf>,
    pub abbreviation: Option<PathBuf>,
}

impl DictionarySet {
    pub fn is_empty(&self) -> bool {
        self.main.is_none() && self.root.is_none() && self.abbreviation.is_none()
    }
}

/// Everything the module reads from its config file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BridgeConfig {
    pub voice: VoiceConfig,
    pub flags: EngineFlags,
    pub dictionaries: DictionarySet,
    pub strictness: Strictness,
}

impl BridgeConfig {
    /// Load from a config file. A missing path or unreadable file gives the
    /// defaults.
    pub fn load(path: Option<&Path>, strictness: Strictness) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            log::info!("no config file given, using defaults");
            return Ok(Self {
                strictness,
                ..Self::default()
            });
        };

        log::info!("loading config: {}", path.display());
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content, strictness),
            Err(e) if strictness == Strictness::Strict => Err(e.into()),
            Err(e) => {
                log::warn!("could not read config {}: {e}, using defaults", path.display());
                Ok(Self {
                    strictness,
                    ..Self::default()
                })
            }
        }
    }

    /// Parse config text: one `Key Value` pair per line, `#` comments, keys
    /// case-insensitive.
    pub fn parse(content: &str, strictness: Strictness) -> Result<Self, ConfigError> {
        let mut voice = VoiceConfigBuilder::default();
        let mut flags = EngineFlags::default();
        let mut dictionaries = DictionarySet::default();

        for (idx, raw) in content.lines().enumerate() {
            let line = idx + 1;
            let trimmed = raw.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut tokens = trimmed.split_whitespace();
            let (Some(key), Some(value)) = (tokens.next(), tokens.next()) else {
                log::debug!("config line {line}: no value, skipped");
                continue;
            };

            let applied: Option<()> = match key.to_ascii_lowercase().as_str() {
                "viavoicesamplerate" => int(value).and_then(SampleRate::parse).map(|r| {
                    voice.sample_rate(r);
                }),
                "viavoicedefaultvoice" => {
                    ranged(value, 7).and_then(PresetVoice::new).map(|v| {
                        voice.voice(v);
                    })
                }
                "viavoicepitchbaseline" => ranged(value, 100).map(|v| {
                    voice.pitch_baseline(v);
                }),
                "viavoicepitchfluctuation" => ranged(value, 100).map(|v| {
                    voice.pitch_fluctuation(v);
                }),
                "viavoicespeed" => ranged(value, 250).map(|v| {
                    voice.speed(v);
                }),
                "viavoicevolume" => ranged(value, 100).map(|v| {
                    voice.volume(v);
                }),
                "viavoiceheadsize" => ranged(value, 100).map(|v| {
                    voice.head_size(v);
                }),
                "viavoiceroughness" => ranged(value, 100).map(|v| {
                    voice.roughness(v);
                }),
                "viavoicebreathiness" => ranged(value, 100).map(|v| {
                    voice.breathiness(v);
                }),
                "viavoicemaindict" => {
                    dictionaries.main = Some(PathBuf::from(value));
                    Some(())
                }
                "viavoicerootdict" => {
                    dictionaries.root = Some(PathBuf::from(value));
                    Some(())
                }
                "viavoiceabbrevdict" => {
                    dictionaries.abbreviation = Some(PathBuf::from(value));
                    Some(())
                }
                "viavoicephraseprediction" => {
                    flag(value).map(|v| flags.phrase_prediction = Some(v))
                }
                "viavoicenumbermode" => non_negative(value).map(|v| flags.number_mode = Some(v)),
                "viavoicetextmode" => non_negative(value).map(|v| flags.text_mode = Some(v)),
                "viavoicerealworldunits" => {
                    flag(value).map(|v| flags.real_world_units = Some(v))
                }
                _ => {
                    if strictness == Strictness::Strict {
                        return Err(ConfigError::UnknownKey {
                            line,
                            key: key.to_string(),
                        });
                    }
                    log::debug!("config line {line}: unknown key '{key}' ignored");
                    continue;
                }
            };

            match applied {
                Some(()) => log::debug!("config: {key} = {value}"),
                None if strictness == Strictness::Strict => {
                    return Err(ConfigError::InvalidValue {
                        line,
                        key: key.to_string(),
                        value: value.to_string(),
                    });
                }
                None => log::warn!("config line {line}: invalid value '{value}' for {key}, ignored"),
            }
        }

        Ok(Self {
            voice: voice.build()?,
            flags,
            dictionaries,
            strictness,
        })
    }
}

fn int(value: &str) -> Option<i64> {
    value.parse().ok()
}

fn ranged(value: &str, max: u8) -> Option<u8> {
    int(value)
        .and_then(|v| u8::try_from(v).ok())
        .filter(|&v| v <= max)
}

fn non_negative(value: &str) -> Option<u32> {
    int(value).and_then(|v| u32::try_from(v).ok())
}

fn flag(value: &str) -> Option<bool> {
    match int(value)? {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}
