use std::path::Path;
use std::sync::Arc;

use super::accumulator::AudioAccumulator;

/// Global engine parameters, numbered as the ECI header numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum EciParam {
    SynthMode = 0,
    InputType = 1,
    TextMode = 2,
    Dictionary = 3,
    SampleRate = 5,
    WantPhonemeIndices = 7,
    RealWorldUnits = 8,
    LanguageDialect = 9,
    NumberMode = 10,
    PhrasePrediction = 11,
}

/// Per-voice parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum VoiceParam {
    Gender = 0,
    HeadSize = 1,
    PitchBaseline = 2,
    PitchFluctuation = 3,
    Roughness = 4,
    Breathiness = 5,
    Speed = 6,
    Volume = 7,
}

/// The three dictionary volumes a dictionary handle can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum DictVolume {
    Main = 0,
    Root = 1,
    Abbreviation = 2,
}

impl DictVolume {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Root => "root",
            Self::Abbreviation => "abbreviation",
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DictError {
    #[error("dictionary file not found")]
    FileNotFound,
    #[error("out of memory while building dictionary")]
    OutOfMemory,
    #[error("internal dictionary error")]
    Internal,
    #[error("no more entries in dictionary")]
    NoEntry,
    #[error("error looking up dictionary key")]
    LookUpKey,
    #[error("error accessing dictionary")]
    Access,
    #[error("unknown dictionary error code {0}")]
    Unknown(i32),
}

impl DictError {
    /// Map an `ECIDictError` code. `0` (no error) maps to `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => None,
            1 => Some(Self::FileNotFound),
            2 => Some(Self::OutOfMemory),
            3 => Some(Self::Internal),
            4 => Some(Self::NoEntry),
            5 => Some(Self::LookUpKey),
            6 => Some(Self::Access),
            other => Some(Self::Unknown(other)),
        }
    }
}

/// Message kinds the engine delivers through the registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EciMessage {
    WaveformBuffer,
    PhonemeBuffer,
    IndexReply,
    PhonemeIndexReply,
}

impl EciMessage {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::WaveformBuffer),
            1 => Some(Self::PhonemeBuffer),
            2 => Some(Self::IndexReply),
            3 => Some(Self::PhonemeIndexReply),
            _ => None,
        }
    }
}

/// What the callback tells the engine about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CallbackReturn {
    NotProcessed = 0,
    Processed = 1,
}

/// Cross-thread stop primitive of an engine instance.
///
/// Handed out before synthesis starts so a stop request can reach the engine
/// while the control thread is blocked in [`Eci::synchronize`]. Must become a
/// no-op once the engine instance is deleted.
pub trait Abort: Clone + Send + Sync + 'static {
    fn abort(&self) -> bool;
}

/// One live ECI engine instance.
///
/// Mirrors the subset of the C API the bridge uses. Creating an instance is
/// the constructor passed to `EngineSession::init`; dropping it deletes the
/// engine handle and releases the output buffer it was given.
pub trait Eci {
    /// Opaque dictionary handle.
    type Dict;
    type Abort: Abort;

    /// Register the callback context. The engine invokes
    /// [`AudioAccumulator::deliver`] on it for every message during
    /// synthesis, possibly from an engine-internal thread.
    fn register_callback(&mut self, context: Arc<AudioAccumulator>);

    /// Give the engine the scratch buffer it writes waveform chunks into.
    /// Returns `false` if the engine refuses it.
    fn set_output_buffer(&mut self, buffer: Box<[i16]>) -> bool;

    fn set_param(&mut self, param: EciParam, value: i32) -> i32;
    fn get_param(&self, param: EciParam) -> i32;

    fn set_voice_param(&mut self, voice: u8, param: VoiceParam, value: i32) -> i32;
    fn get_voice_param(&self, voice: u8, param: VoiceParam) -> i32;
    fn copy_voice(&mut self, from: u8, to: u8) -> bool;

    fn new_dict(&mut self) -> Option<Self::Dict>;
    fn load_dict(
        &mut self,
        dict: &Self::Dict,
        volume: DictVolume,
        path: &Path,
    ) -> Result<(), DictError>;
    fn set_dict(&mut self, dict: &Self::Dict) -> Result<(), DictError>;
    /// Dictionaries must be deleted before the engine instance is.
    fn delete_dict(&mut self, dict: Self::Dict);

    /// Queue text for synthesis.
    fn add_text(&mut self, text: &str) -> bool;
    /// Start synthesizing the queued text.
    fn synthesize(&mut self) -> bool;
    /// Block until synthesis has finished or been stopped.
    fn synchronize(&mut self) -> bool;

    fn abort_handle(&self) -> Self::Abort;
}
