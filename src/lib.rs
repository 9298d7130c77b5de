//! # viavoice-bridge
//!
//! A speech-dispatcher output module for the legacy IBM ViaVoice TTS 5.1
//! engine, which is only reachable through its ECI handle/callback C API.
//!
//! ## Features
//!
//! - **Engine session**: owns the ECI handle, voice and dictionary setup
//! - **Text sanitization**: turns host markup into plain text the engine reads naturally
//! - **Audio capture**: collects callback PCM and hands it back to the host, with stop support
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! viavoice-bridge = { version = "0.1", features = ["eci"] }
//! ```
//!
//! ```ignore
//! use viavoice_bridge::engines::viavoice::{BridgeConfig, EngineSession, LinkedEci, Strictness};
//! use viavoice_bridge::MessageKind;
//!
//! let config = BridgeConfig::load(Some("viavoice.conf".as_ref()), Strictness::Lenient)?;
//! let (mut session, ready) = EngineSession::init(LinkedEci::new, &config)?;
//! println!("{ready}");
//! session.speak("Hello, world.", MessageKind::Text, &mut host)?;
//! session.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod engines;
pub mod protocol;

use std::io;
use std::path::Path;

use serde::Serialize;

/// Byte order of the PCM handed to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// One audio delivery to the host's audio sink.
///
/// Borrows the samples straight out of the accumulator, so a track only lives
/// for the duration of the delivery call.
#[derive(Debug, Clone, Copy)]
pub struct AudioTrack<'a> {
    /// Signed 16-bit PCM samples
    pub samples: &'a [i16],
    /// Sample rate in Hz
    pub sample_rate: u32,
    pub channels: u16,
    pub bits: u16,
    pub byte_order: ByteOrder,
}

impl<'a> AudioTrack<'a> {
    /// A mono 16-bit little-endian track, which is all the engine produces.
    pub fn mono16(samples: &'a [i16], sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
            bits: 16,
            byte_order: ByteOrder::LittleEndian,
        }
    }

    /// Write the audio to a 16-bit PCM WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for &sample in self.samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
        Ok(())
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    /// Raw sample bytes in the track's byte order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.samples.len() * 2);
        for &s in self.samples {
            match self.byte_order {
                ByteOrder::LittleEndian => out.extend_from_slice(&s.to_le_bytes()),
                ByteOrder::BigEndian => out.extend_from_slice(&s.to_be_bytes()),
            }
        }
        out
    }
}

/// What kind of message the host asked to be spoken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    #[default]
    Text,
    SoundIcon,
    Char,
    Key,
    Spell,
}

impl MessageKind {
    /// Parse the host's message-type token. Unknown tokens read as plain text.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "sound_icon" | "icon" => Self::SoundIcon,
            "char" | "character" => Self::Char,
            "key" => Self::Key,
            "spell" => Self::Spell,
            _ => Self::Text,
        }
    }

    /// Only ordinary reading gets punctuation rewritten. Character and key
    /// echo must keep the literal symbol so the engine announces it.
    pub fn wants_full_sanitize(self) -> bool {
        matches!(self, Self::Text | Self::SoundIcon)
    }
}

/// Synthesis lifecycle events reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechEvent {
    Begin,
    End,
    Stop,
}

/// A voice as advertised to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceDescriptor {
    pub name: String,
    pub language: String,
    pub variant: String,
}

/// Outbound channel to the host: status lines and audio.
///
/// The engine session drives this during `speak`; the protocol module writes
/// it to the control stream.
pub trait Host {
    /// The utterance was accepted and synthesis is about to start.
    fn speak_ok(&mut self) -> io::Result<()>;

    /// The utterance could not be spoken at all.
    fn speak_error(&mut self) -> io::Result<()>;

    fn report(&mut self, event: SpeechEvent) -> io::Result<()>;

    /// Hand a finished utterance's audio to the host's audio sink.
    fn audio(&mut self, track: &AudioTrack<'_>) -> io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_tokens() {
        assert_eq!(MessageKind::from_token("TEXT"), MessageKind::Text);
        assert_eq!(MessageKind::from_token("sound_icon"), MessageKind::SoundIcon);
        assert_eq!(MessageKind::from_token("char"), MessageKind::Char);
        assert_eq!(MessageKind::from_token("key"), MessageKind::Key);
        assert_eq!(MessageKind::from_token("bogus"), MessageKind::Text);
        assert!(MessageKind::SoundIcon.wants_full_sanitize());
        assert!(!MessageKind::Char.wants_full_sanitize());
        assert!(!MessageKind::Key.wants_full_sanitize());
    }

    #[test]
    fn track_bytes_are_little_endian() {
        let samples = [1i16, -2, 0x1234];
        let track = AudioTrack::mono16(&samples, 22050);
        assert_eq!(track.to_bytes(), vec![0x01, 0x00, 0xfe, 0xff, 0x34, 0x12]);
    }

    #[test]
    fn writes_16_bit_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let samples: Vec<i16> = (0..11025).map(|i| (i % 200) as i16).collect();
        let track = AudioTrack::mono16(&samples, 11025);
        track.write_wav(&path).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 11025);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len() as usize, samples.len());
        assert!((track.duration_secs() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn voice_descriptor_serializes() {
        let v = VoiceDescriptor {
            name: "Wade".into(),
            language: "en-US".into(),
            variant: "none".into(),
        };
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"name":"Wade","language":"en-US","variant":"none"}"#);
    }
}
