//! Speech synthesis engines.
//!
//! This module contains the bridges to concrete text-to-speech engines.
//!
//! # Available Engines
//!
//! - `viavoice` - IBM ViaVoice TTS 5.1 through the ECI interface. The session
//!   logic is always built; linking against `libibmeci` needs the `eci` feature.

pub mod viavoice;
