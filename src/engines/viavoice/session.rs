use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::{AudioTrack, Host, MessageKind, SpeechEvent, VoiceDescriptor};

use super::accumulator::{AudioAccumulator, Ticket};
use super::config::{
    BridgeConfig, ConfigError, DictionarySet, EngineFlags, SampleRate, Strictness, VoiceConfig,
};
use super::eci::{Abort, DictError, DictVolume, Eci, EciParam, VoiceParam};
use super::params::{ParamError, ProsodyValues, RuntimeParams};
use super::sanitize::{sanitize, SanitizeError};

/// Size of the scratch buffer the engine writes each waveform chunk into.
pub const SCRATCH_SAMPLES: usize = 20_000;

/// Voice slot the engine synthesizes with.
const ACTIVE_VOICE: u8 = 0;

/// The engine only ships American English here.
pub const LANGUAGE: &str = "en-US";

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("Failed to create ECI instance - check ViaVoice installation")]
    EngineCreateFailed,
    #[error("Failed to allocate audio buffer ({0} samples)")]
    BufferAllocFailed(usize),
    #[error("Failed to set ECI output buffer")]
    OutputBufferRejected,
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to create dictionary handle")]
    DictionaryHandle,
    #[error("Failed to load {volume} dictionary {path}: {source}")]
    Dictionary {
        volume: &'static str,
        path: PathBuf,
        source: DictError,
    },
    #[error("Failed to activate dictionary: {0}")]
    DictionaryActivate(DictError),
}

/// Message returned to the host once the session is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyMessage(String);

impl fmt::Display for ReadyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    Speaking,
}

/// Why an utterance produced nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceFailure {
    /// Nothing left to say after sanitizing.
    EmptyText,
    Sanitize(SanitizeError),
    /// The engine refused the text.
    SubmitFailed,
    /// The engine refused to start synthesizing.
    SynthesizeFailed,
}

/// How one `speak` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Utterance {
    Completed { samples: usize },
    Stopped,
    Failed(UtteranceFailure),
}

/// Stops the utterance in flight from any thread.
///
/// Holds only the callback context and the engine's abort primitive, never
/// the session itself, so it can be used while the control thread is blocked
/// in synthesis.
#[derive(Clone)]
pub struct CancelHandle<A: Abort> {
    accumulator: Arc<AudioAccumulator>,
    abort: A,
    speaking: Arc<AtomicBool>,
}

impl<A: Abort> CancelHandle<A> {
    /// Cancel the utterance in flight and every utterance already holding a
    /// ticket, then ask the engine to stop. Chunks the engine still delivers
    /// afterwards are declined.
    pub fn cancel(&self) {
        log::debug!("stop requested");
        self.accumulator.request_cancel();
        if !self.abort.abort() {
            log::debug!("engine stop had nothing to abort");
        }
    }

    /// Reserve a place for an utterance that will be passed to
    /// [`EngineSession::speak_ticket`] later. A `cancel` in between applies
    /// to it.
    pub fn ticket(&self) -> Ticket {
        self.accumulator.issue_ticket()
    }

    pub fn state(&self) -> SessionState {
        session_state(&self.speaking)
    }
}

fn session_state(speaking: &AtomicBool) -> SessionState {
    if speaking.load(Ordering::SeqCst) {
        SessionState::Speaking
    } else {
        SessionState::Ready
    }
}

/// A live ViaVoice engine session.
///
/// Owns the engine instance, its dictionary and the audio accumulator. There
/// is no uninitialized session: [`EngineSession::init`] either returns a
/// ready session or an error, and [`EngineSession::close`] consumes it.
pub struct EngineSession<E: Eci> {
    engine: E,
    dict: Option<E::Dict>,
    accumulator: Arc<AudioAccumulator>,
    abort: E::Abort,
    voice: VoiceConfig,
    sample_rate: SampleRate,
    base: ProsodyValues,
    runtime: RuntimeParams,
    speaking: Arc<AtomicBool>,
}

impl<E: Eci> EngineSession<E> {
    /// Create and configure the engine.
    ///
    /// Dictionary failures are logged and skipped unless the config is
    /// strict.
    pub fn init<F>(create: F, config: &BridgeConfig) -> Result<(Self, ReadyMessage), InitError>
    where
        F: FnOnce() -> Option<E>,
    {
        log::info!("initializing ViaVoice TTS");
        match serde_json::to_string(config) {
            Ok(json) => log::debug!("resolved config: {json}"),
            Err(e) => log::debug!("could not render config: {e}"),
        }

        let mut engine = create().ok_or(InitError::EngineCreateFailed)?;
        let scratch = alloc_scratch(SCRATCH_SAMPLES)?;

        let accumulator = Arc::new(AudioAccumulator::new(SCRATCH_SAMPLES));
        engine.register_callback(Arc::clone(&accumulator));
        if !engine.set_output_buffer(scratch) {
            return Err(InitError::OutputBufferRejected);
        }

        let voice = &config.voice;
        engine.set_param(EciParam::SampleRate, voice.sample_rate.code());
        let rate_code = engine.get_param(EciParam::SampleRate);
        let sample_rate = SampleRate::from_code(rate_code).unwrap_or_else(|| {
            log::warn!("engine reports unknown sample rate code {rate_code}, assuming 22050 Hz");
            SampleRate::Hz22050
        });
        log::info!("initialized, sample rate {} Hz", sample_rate.hz());

        apply_voice_overrides(&mut engine, voice);
        if voice.voice.index() != ACTIVE_VOICE {
            engine.copy_voice(voice.voice.index(), ACTIVE_VOICE);
        }
        apply_flags(&mut engine, &config.flags);

        let dict = load_dictionaries(&mut engine, &config.dictionaries, config.strictness)?;

        // what the active voice sounds like before any host override
        let base = ProsodyValues {
            speed: engine.get_voice_param(ACTIVE_VOICE, VoiceParam::Speed),
            pitch: engine.get_voice_param(ACTIVE_VOICE, VoiceParam::PitchBaseline),
            volume: engine.get_voice_param(ACTIVE_VOICE, VoiceParam::Volume),
        };
        log::debug!("active voice {}: {base:?}", voice.voice);

        let abort = engine.abort_handle();
        let ready = ReadyMessage(format!(
            "ViaVoice TTS initialized successfully ({} Hz, voice {})",
            sample_rate.hz(),
            voice.voice
        ));

        let session = Self {
            engine,
            dict,
            accumulator,
            abort,
            voice: voice.clone(),
            sample_rate,
            base,
            runtime: RuntimeParams::default(),
            speaking: Arc::new(AtomicBool::new(false)),
        };
        Ok((session, ready))
    }

    /// Apply a host parameter. Takes effect at the next `speak`.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), ParamError> {
        log::debug!("set {name} = {value}");
        self.runtime.apply(name, value)
    }

    /// Speak one utterance, blocking until the engine has finished or been
    /// stopped. Status and audio go to `host`; only a failure to write to the
    /// host is an error.
    pub fn speak(
        &mut self,
        text: &str,
        kind: MessageKind,
        host: &mut dyn Host,
    ) -> io::Result<Utterance> {
        let ticket = self.accumulator.issue_ticket();
        self.speak_ticket(ticket, text, kind, host)
    }

    /// Like [`speak`](Self::speak), for an utterance whose ticket was taken
    /// with [`CancelHandle::ticket`] when it was queued. If a stop came in
    /// since then, nothing reaches the engine and the host sees a stop.
    pub fn speak_ticket(
        &mut self,
        ticket: Ticket,
        text: &str,
        kind: MessageKind,
        host: &mut dyn Host,
    ) -> io::Result<Utterance> {
        self.accumulator.reset();
        self.accumulator.begin(ticket);
        if self.accumulator.is_cancelled() {
            log::debug!("utterance stopped before it started");
            host.speak_ok()?;
            host.report(SpeechEvent::Stop)?;
            return Ok(Utterance::Stopped);
        }

        let prosody = self.runtime.resolve(self.base);
        self.engine
            .set_voice_param(ACTIVE_VOICE, VoiceParam::Speed, prosody.speed);
        self.engine
            .set_voice_param(ACTIVE_VOICE, VoiceParam::PitchBaseline, prosody.pitch);
        self.engine
            .set_voice_param(ACTIVE_VOICE, VoiceParam::Volume, prosody.volume);

        let text = match sanitize(text, kind.wants_full_sanitize()) {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                log::debug!("nothing to speak after sanitizing");
                host.speak_error()?;
                return Ok(Utterance::Failed(UtteranceFailure::EmptyText));
            }
            Err(e) => {
                log::warn!("{e}");
                host.speak_error()?;
                return Ok(Utterance::Failed(UtteranceFailure::Sanitize(e)));
            }
        };
        log::debug!("speaking: {text}");

        self.speaking.store(true, Ordering::SeqCst);
        let outcome = self.synthesize(&text, host);
        self.speaking.store(false, Ordering::SeqCst);
        outcome
    }

    fn synthesize(&mut self, text: &str, host: &mut dyn Host) -> io::Result<Utterance> {
        host.speak_ok()?;

        if !self.engine.add_text(text) {
            log::warn!("eciAddText failed");
            host.report(SpeechEvent::End)?;
            return Ok(Utterance::Failed(UtteranceFailure::SubmitFailed));
        }

        host.report(SpeechEvent::Begin)?;

        if !self.engine.synthesize() {
            log::warn!("eciSynthesize failed");
            host.report(SpeechEvent::End)?;
            return Ok(Utterance::Failed(UtteranceFailure::SynthesizeFailed));
        }
        if !self.engine.synchronize() {
            log::debug!("eciSynchronize returned false");
        }

        if self.accumulator.is_cancelled() {
            host.report(SpeechEvent::Stop)?;
            return Ok(Utterance::Stopped);
        }

        let rate = self.sample_rate.hz();
        let samples = self.accumulator.with_samples(|samples| {
            if samples.is_empty() {
                return Ok(0);
            }
            host.audio(&AudioTrack::mono16(samples, rate))?;
            Ok::<_, io::Error>(samples.len())
        })?;

        host.report(SpeechEvent::End)?;
        Ok(Utterance::Completed { samples })
    }

    /// Handle for stopping from another thread.
    pub fn cancel_handle(&self) -> CancelHandle<E::Abort> {
        CancelHandle {
            accumulator: Arc::clone(&self.accumulator),
            abort: self.abort.clone(),
            speaking: Arc::clone(&self.speaking),
        }
    }

    pub fn stop(&self) {
        self.cancel_handle().cancel();
    }

    /// The engine cannot resume, so pausing is stopping.
    pub fn pause(&self) {
        log::debug!("pause requested");
        self.cancel_handle().cancel();
    }

    /// The one voice this session speaks with.
    pub fn list_voices(&self) -> Vec<VoiceDescriptor> {
        vec![VoiceDescriptor {
            name: self.voice.voice.name().to_string(),
            language: LANGUAGE.to_string(),
            variant: "none".to_string(),
        }]
    }

    pub fn sample_rate(&self) -> SampleRate {
        self.sample_rate
    }

    /// `Speaking` only while a `speak` call is inside the engine; other
    /// threads observe it through [`CancelHandle::state`].
    pub fn state(&self) -> SessionState {
        session_state(&self.speaking)
    }

    /// Tear the engine down. The dictionary goes first, then the engine
    /// instance with its output buffer, then the collected audio.
    pub fn close(self) {
        log::info!("closing");
    }
}

impl<E: Eci> Drop for EngineSession<E> {
    fn drop(&mut self) {
        if let Some(dict) = self.dict.take() {
            self.engine.delete_dict(dict);
        }
        self.accumulator.release();
        // `engine` is dropped after this, deleting the instance
    }
}

fn alloc_scratch(len: usize) -> Result<Box<[i16]>, InitError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| InitError::BufferAllocFailed(len))?;
    buf.resize(len, 0i16);
    Ok(buf.into_boxed_slice())
}

fn apply_voice_overrides<E: Eci>(engine: &mut E, voice: &VoiceConfig) {
    let slot = voice.voice.index();
    let overrides = [
        (VoiceParam::PitchBaseline, voice.pitch_baseline),
        (VoiceParam::PitchFluctuation, voice.pitch_fluctuation),
        (VoiceParam::Speed, voice.speed),
        (VoiceParam::Volume, voice.volume),
        (VoiceParam::HeadSize, voice.head_size),
        (VoiceParam::Roughness, voice.roughness),
        (VoiceParam::Breathiness, voice.breathiness),
    ];
    for (param, value) in overrides {
        if let Some(value) = value {
            engine.set_voice_param(slot, param, i32::from(value));
            log::debug!("voice {slot}: {param:?} = {value}");
        }
    }
}

fn apply_flags<E: Eci>(engine: &mut E, flags: &EngineFlags) {
    let settings = [
        (EciParam::PhrasePrediction, flags.phrase_prediction.map(i32::from)),
        (EciParam::NumberMode, flags.number_mode.map(saturating_i32)),
        (EciParam::TextMode, flags.text_mode.map(saturating_i32)),
        (EciParam::RealWorldUnits, flags.real_world_units.map(i32::from)),
    ];
    for (param, value) in settings {
        if let Some(value) = value {
            engine.set_param(param, value);
            log::info!("set {param:?}: {value}");
        }
    }
}

fn saturating_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

fn load_dictionaries<E: Eci>(
    engine: &mut E,
    dictionaries: &DictionarySet,
    strictness: Strictness,
) -> Result<Option<E::Dict>, InitError> {
    if dictionaries.is_empty() {
        return Ok(None);
    }
    let strict = strictness == Strictness::Strict;

    let Some(dict) = engine.new_dict() else {
        if strict {
            return Err(InitError::DictionaryHandle);
        }
        log::warn!("Failed to create dictionary handle");
        return Ok(None);
    };

    let volumes = [
        (DictVolume::Main, &dictionaries.main),
        (DictVolume::Root, &dictionaries.root),
        (DictVolume::Abbreviation, &dictionaries.abbreviation),
    ];
    for (volume, path) in volumes {
        let Some(path) = path else { continue };
        match engine.load_dict(&dict, volume, path) {
            Ok(()) => log::info!("Loaded {} dictionary: {}", volume.as_str(), path.display()),
            Err(source) if strict => {
                engine.delete_dict(dict);
                return Err(InitError::Dictionary {
                    volume: volume.as_str(),
                    path: path.clone(),
                    source,
                });
            }
            Err(e) => log::warn!(
                "Failed to load {} dictionary: {} ({e})",
                volume.as_str(),
                path.display()
            ),
        }
    }

    match engine.set_dict(&dict) {
        Ok(()) => log::info!("Dictionary activated"),
        Err(e) if strict => {
            engine.delete_dict(dict);
            return Err(InitError::DictionaryActivate(e));
        }
        Err(e) => log::warn!("Failed to activate dictionary ({e})"),
    }
    Ok(Some(dict))
}
