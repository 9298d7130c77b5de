//! IBM ViaVoice TTS 5.1 engine bridge.
//!
//! ViaVoice (1999-2000) is only reachable through ECI, a C handle/callback
//! API: text is queued on an engine instance, a blocking call synthesizes it
//! and the engine hands back PCM by invoking a registered callback with chunks
//! written into a caller-supplied scratch buffer. This module wraps that in an
//! [`EngineSession`] that speech-dispatcher can drive.
//!
//! # System Requirements
//!
//! The `eci` feature links against `libibmeci.so`, which must be on the
//! loader path together with the engine's data files. Without the feature the
//! session logic still builds against any [`Eci`] implementation.
//!
//! # Configuration
//!
//! ```text
//! # viavoice.conf
//! ViaVoiceSampleRate      22050     # 8000, 11025 or 22050
//! ViaVoiceDefaultVoice    1         # 0-7, see below
//! ViaVoiceSpeed           80        # 0-250
//! ViaVoicePitchBaseline   60        # 0-100
//! ViaVoiceMainDict        /usr/share/viavoice/main.dct
//! ```
//!
//! # Preset Voices
//!
//! | Index | Name |
//! |---|---|
//! | 0 | Wade |
//! | 1 | Flo |
//! | 2 | Bobbie |
//! | 3 | Male2 |
//! | 4 | Male3 |
//! | 5 | Female2 |
//! | 6 | Grandma |
//! | 7 | Grandpa |
//!
//! The voice is fixed for the lifetime of a session; the host can only vary
//! rate, pitch and volume per utterance.
//!
//! # Examples
//!
//! ```rust,ignore
//! use viavoice_bridge::engines::viavoice::{BridgeConfig, EngineSession, LinkedEci, Strictness};
//! use viavoice_bridge::MessageKind;
//!
//! let config = BridgeConfig::load(Some("viavoice.conf".as_ref()), Strictness::Lenient)?;
//! let (mut session, ready) = EngineSession::init(LinkedEci::new, &config)?;
//! log::info!("{ready}");
//!
//! // stop from another thread while speak() blocks
//! let cancel = session.cancel_handle();
//! std::thread::spawn(move || cancel.cancel());
//!
//! session.speak("Hello (quietly) world", MessageKind::Text, &mut host)?;
//! session.close();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod accumulator;
pub mod config;
pub mod eci;
#[cfg(feature = "eci")]
pub mod ffi;
pub mod params;
pub mod sanitize;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use accumulator::{AppendError, AudioAccumulator, Ticket};
pub use config::{
    BridgeConfig, ConfigError, DictionarySet, EngineFlags, PresetVoice, SampleRate, Strictness,
    VoiceConfig, VoiceConfigBuilder,
};
pub use eci::{Abort, Eci};
#[cfg(feature = "eci")]
pub use ffi::LinkedEci;
pub use session::{
    CancelHandle, EngineSession, InitError, ReadyMessage, SessionState, Utterance,
    UtteranceFailure,
};
