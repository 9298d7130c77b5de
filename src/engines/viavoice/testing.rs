//! Scripted engine and host doubles for the session and protocol tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{AudioTrack, Host, SpeechEvent};

use super::accumulator::AudioAccumulator;
use super::eci::{Abort, DictError, DictVolume, Eci, EciMessage, EciParam, VoiceParam};

/// Every mutating call the engine double receives, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RegisterCallback,
    SetOutputBuffer(usize),
    SetParam(EciParam, i32),
    SetVoiceParam(u8, VoiceParam, i32),
    CopyVoice(u8, u8),
    NewDict,
    LoadDict(DictVolume, PathBuf),
    SetDict,
    DeleteDict,
    AddText(String),
    Synthesize,
    Synchronize,
    Abort,
    Delete,
}

/// How the engine double behaves.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Waveform chunks delivered during every synchronize.
    pub chunks: Vec<Vec<i16>>,
    pub reject_output_buffer: bool,
    pub fail_add_text: bool,
    pub fail_synthesize: bool,
    pub fail_new_dict: bool,
    pub failing_dicts: Vec<DictVolume>,
    pub fail_set_dict: bool,
    /// Sample-rate code to report regardless of what was set.
    pub sample_rate_readback: Option<i32>,
    /// Run the stop-point hook after this many chunks.
    pub stop_after: Option<usize>,
    /// Deliver one more chunk after an abort, like a callback already in flight.
    pub late_chunk: bool,
}

type Hook = Box<dyn FnMut() + Send>;

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<Call>>,
    context: Mutex<Option<Arc<AudioAccumulator>>>,
    stop_point: Mutex<Option<Hook>>,
    aborted: AtomicBool,
}

impl Shared {
    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

// gender, head size, pitch baseline, pitch fluctuation, roughness, breathiness, speed, volume
const PRESET_DEFAULTS: [i32; 8] = [0, 50, 65, 30, 0, 0, 50, 90];

pub struct ScriptedEci {
    script: Script,
    shared: Arc<Shared>,
    scratch: Box<[i16]>,
    params: HashMap<EciParam, i32>,
    voices: [[i32; 8]; 8],
}

/// Observes a [`ScriptedEci`] after it has been moved into a session.
pub struct Recorder {
    shared: Arc<Shared>,
}

impl ScriptedEci {
    pub fn new(script: Script) -> (Self, Recorder) {
        let shared = Arc::new(Shared::default());
        let engine = Self {
            script,
            shared: Arc::clone(&shared),
            scratch: Box::new([]),
            params: HashMap::new(),
            voices: [PRESET_DEFAULTS; 8],
        };
        (engine, Recorder { shared })
    }

    fn deliver(&mut self, context: &AudioAccumulator, chunk: &[i16]) {
        let n = chunk.len().min(self.scratch.len());
        self.scratch[..n].copy_from_slice(&chunk[..n]);
        context.deliver(EciMessage::WaveformBuffer, &self.scratch[..n]);
    }
}

impl Recorder {
    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.lock().clone()
    }

    /// Samples currently held by the registered callback context.
    pub fn accumulated(&self) -> usize {
        self.shared
            .context
            .lock()
            .as_ref()
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn on_stop_point(&self, hook: impl FnMut() + Send + 'static) {
        *self.shared.stop_point.lock() = Some(Box::new(hook));
    }

    pub fn clear_stop_point(&self) {
        *self.shared.stop_point.lock() = None;
    }
}

#[derive(Clone)]
pub struct ScriptedAbort {
    shared: Arc<Shared>,
}

impl Abort for ScriptedAbort {
    fn abort(&self) -> bool {
        self.shared.record(Call::Abort);
        self.shared.aborted.store(true, Ordering::SeqCst);
        true
    }
}

impl Eci for ScriptedEci {
    type Dict = u32;
    type Abort = ScriptedAbort;

    fn register_callback(&mut self, context: Arc<AudioAccumulator>) {
        self.shared.record(Call::RegisterCallback);
        *self.shared.context.lock() = Some(context);
    }

    fn set_output_buffer(&mut self, buffer: Box<[i16]>) -> bool {
        self.shared.record(Call::SetOutputBuffer(buffer.len()));
        if self.script.reject_output_buffer {
            return false;
        }
        self.scratch = buffer;
        true
    }

    fn set_param(&mut self, param: EciParam, value: i32) -> i32 {
        self.shared.record(Call::SetParam(param, value));
        self.params.insert(param, value).unwrap_or(-1)
    }

    fn get_param(&self, param: EciParam) -> i32 {
        match (param, self.script.sample_rate_readback) {
            (EciParam::SampleRate, Some(code)) => code,
            (EciParam::SampleRate, None) => self.params.get(&param).copied().unwrap_or(2),
            _ => self.params.get(&param).copied().unwrap_or(0),
        }
    }

    fn set_voice_param(&mut self, voice: u8, param: VoiceParam, value: i32) -> i32 {
        self.shared.record(Call::SetVoiceParam(voice, param, value));
        let slot = &mut self.voices[usize::from(voice)][param as usize];
        std::mem::replace(slot, value)
    }

    fn get_voice_param(&self, voice: u8, param: VoiceParam) -> i32 {
        self.voices[usize::from(voice)][param as usize]
    }

    fn copy_voice(&mut self, from: u8, to: u8) -> bool {
        self.shared.record(Call::CopyVoice(from, to));
        self.voices[usize::from(to)] = self.voices[usize::from(from)];
        true
    }

    fn new_dict(&mut self) -> Option<u32> {
        self.shared.record(Call::NewDict);
        (!self.script.fail_new_dict).then_some(1)
    }

    fn load_dict(&mut self, _dict: &u32, volume: DictVolume, path: &Path) -> Result<(), DictError> {
        self.shared
            .record(Call::LoadDict(volume, path.to_path_buf()));
        if self.script.failing_dicts.contains(&volume) {
            Err(DictError::FileNotFound)
        } else {
            Ok(())
        }
    }

    fn set_dict(&mut self, _dict: &u32) -> Result<(), DictError> {
        self.shared.record(Call::SetDict);
        if self.script.fail_set_dict {
            Err(DictError::Internal)
        } else {
            Ok(())
        }
    }

    fn delete_dict(&mut self, _dict: u32) {
        self.shared.record(Call::DeleteDict);
    }

    fn add_text(&mut self, text: &str) -> bool {
        self.shared.record(Call::AddText(text.to_string()));
        !self.script.fail_add_text
    }

    fn synthesize(&mut self) -> bool {
        self.shared.record(Call::Synthesize);
        self.shared.aborted.store(false, Ordering::SeqCst);
        !self.script.fail_synthesize
    }

    fn synchronize(&mut self) -> bool {
        self.shared.record(Call::Synchronize);
        let Some(context) = self.shared.context.lock().clone() else {
            return true;
        };

        let chunks = self.script.chunks.clone();
        let mut late = self.script.late_chunk;
        for (i, chunk) in chunks.iter().enumerate() {
            if self.shared.aborted.load(Ordering::SeqCst) {
                if !late {
                    break;
                }
                late = false;
            }
            self.deliver(&context, chunk);
            if self.script.stop_after == Some(i + 1) {
                if let Some(hook) = self.shared.stop_point.lock().as_mut() {
                    hook();
                }
            }
        }
        true
    }

    fn abort_handle(&self) -> ScriptedAbort {
        ScriptedAbort {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for ScriptedEci {
    fn drop(&mut self) {
        self.shared.record(Call::Delete);
    }
}

/// What a [`RecordingHost`] saw, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    SpeakOk,
    SpeakError,
    Event(SpeechEvent),
    Audio {
        samples: Vec<i16>,
        sample_rate: u32,
        channels: u16,
    },
}

#[derive(Debug, Default)]
pub struct RecordingHost {
    pub events: Vec<HostEvent>,
}

impl Host for RecordingHost {
    fn speak_ok(&mut self) -> io::Result<()> {
        self.events.push(HostEvent::SpeakOk);
        Ok(())
    }

    fn speak_error(&mut self) -> io::Result<()> {
        self.events.push(HostEvent::SpeakError);
        Ok(())
    }

    fn report(&mut self, event: SpeechEvent) -> io::Result<()> {
        self.events.push(HostEvent::Event(event));
        Ok(())
    }

    fn audio(&mut self, track: &AudioTrack<'_>) -> io::Result<()> {
        self.events.push(HostEvent::Audio {
            samples: track.samples.to_vec(),
            sample_rate: track.sample_rate,
            channels: track.channels,
        });
        Ok(())
    }
}
