//! speech-dispatcher output-module control channel.
//!
//! Requests arrive as lines on the input stream. `SET`, `AUDIO`, `LOGLEVEL`
//! and the speak requests carry a block of lines terminated by a lone `.`; a
//! payload line starting with a dot is sent with the dot doubled. The server
//! only sends a block after the module has answered the request line with a
//! `202`/`203`/`207` receiving reply. Replies are numbered status lines, and
//! audio is a `705` header followed by raw little-endian samples.
//!
//! A reader thread parses requests so that `STOP` and `PAUSE` reach the
//! engine while the control thread is blocked speaking. Everything else runs
//! in order on the control thread, which owns the session and is the only
//! writer. Each speak request takes a cancellation ticket when the reader
//! queues it, so a stop that arrives while it waits still applies.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;

use log::LevelFilter;
use parking_lot::Mutex;

use crate::engines::viavoice::{
    Abort, BridgeConfig, CancelHandle, Eci, EngineSession, InitError, Strictness, Ticket,
};
use crate::{AudioTrack, ByteOrder, Host, MessageKind, SpeechEvent, VoiceDescriptor};

#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("input ended inside a {0} block")]
    UnterminatedBlock(&'static str),
}

/// One parsed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Init(Option<PathBuf>),
    Set(Vec<(String, String)>),
    Speak { kind: MessageKind, text: String },
    /// Audio output settings. The server plays the audio, so they are only
    /// acknowledged.
    Audio(Vec<(String, String)>),
    Loglevel(Vec<(String, String)>),
    Debug { enable: bool, file: Option<PathBuf> },
    Stop,
    Pause,
    ListVoices,
    Quit,
    Unknown(String),
}

/// Intermediate reply the server waits for before sending a request's block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiving {
    Message,
    Settings,
    AudioSettings,
    LoglevelSettings,
}

impl Receiving {
    pub fn reply(self) -> &'static str {
        match self {
            Self::Message => "202 OK RECEIVING MESSAGE",
            Self::Settings => "203 OK RECEIVING SETTINGS",
            Self::AudioSettings => "207 OK RECEIVING AUDIO SETTINGS",
            Self::LoglevelSettings => "207 OK RECEIVING LOGLEVEL SETTINGS",
        }
    }
}

/// Read the next request. `Ok(None)` at end of input.
///
/// `receiving` is called after a request line that carries a block and
/// before the block is read; its reply must reach the server first.
pub fn read_command<R: BufRead>(
    reader: &mut R,
    receiving: &mut dyn FnMut(Receiving),
) -> Result<Option<Command>, ProtocolError> {
    loop {
        let Some(line) = read_line(reader)? else {
            return Ok(None);
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let command = match word.to_ascii_uppercase().as_str() {
            "INIT" => Command::Init((!rest.is_empty()).then(|| PathBuf::from(rest))),
            "SET" => {
                receiving(Receiving::Settings);
                Command::Set(read_settings(reader, "SET")?)
            }
            "AUDIO" => {
                receiving(Receiving::AudioSettings);
                Command::Audio(read_settings(reader, "AUDIO")?)
            }
            "LOGLEVEL" => {
                receiving(Receiving::LoglevelSettings);
                Command::Loglevel(read_settings(reader, "LOGLEVEL")?)
            }
            "SPEAK" => speak(reader, receiving, MessageKind::from_token(rest))?,
            "CHAR" => speak(reader, receiving, MessageKind::Char)?,
            "KEY" => speak(reader, receiving, MessageKind::Key)?,
            "SOUND_ICON" => speak(reader, receiving, MessageKind::SoundIcon)?,
            "DEBUG" => match rest.split_once(char::is_whitespace) {
                Some((on, file)) if on.eq_ignore_ascii_case("ON") => Command::Debug {
                    enable: true,
                    file: Some(PathBuf::from(file.trim())),
                },
                None if rest.eq_ignore_ascii_case("ON") => Command::Debug {
                    enable: true,
                    file: None,
                },
                None if rest.eq_ignore_ascii_case("OFF") => Command::Debug {
                    enable: false,
                    file: None,
                },
                _ => Command::Unknown(line.to_string()),
            },
            "STOP" => Command::Stop,
            "PAUSE" => Command::Pause,
            "LIST_VOICES" => Command::ListVoices,
            "LIST" if rest.eq_ignore_ascii_case("VOICES") => Command::ListVoices,
            "QUIT" | "CLOSE" => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        };
        return Ok(Some(command));
    }
}

/// Read payload lines up to the terminating `.`, undoubling leading dots.
pub fn read_block<R: BufRead>(
    reader: &mut R,
    what: &'static str,
) -> Result<Vec<String>, ProtocolError> {
    let mut lines = Vec::new();
    loop {
        let Some(line) = read_line(reader)? else {
            return Err(ProtocolError::UnterminatedBlock(what));
        };
        if line == "." {
            return Ok(lines);
        }
        match line.strip_prefix("..") {
            Some(rest) => lines.push(format!(".{rest}")),
            None => lines.push(line),
        }
    }
}

fn speak<R: BufRead>(
    reader: &mut R,
    receiving: &mut dyn FnMut(Receiving),
    kind: MessageKind,
) -> Result<Command, ProtocolError> {
    receiving(Receiving::Message);
    let text = read_block(reader, "SPEAK")?.join("\n");
    Ok(Command::Speak { kind, text })
}

fn read_settings<R: BufRead>(
    reader: &mut R,
    what: &'static str,
) -> Result<Vec<(String, String)>, ProtocolError> {
    let mut settings = Vec::new();
    for line in read_block(reader, what)? {
        match line.split_once('=') {
            Some((name, value)) => {
                settings.push((name.trim().to_string(), value.trim().to_string()))
            }
            None => log::warn!("ignoring malformed setting: {line}"),
        }
    }
    Ok(settings)
}

/// One line without its terminator, decoded lossily.
fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

/// Writes replies, events and audio to the host.
pub struct ProtocolWriter<W: Write> {
    out: W,
}

impl<W: Write> ProtocolWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    pub fn init_ok(&mut self, message: &impl fmt::Display) -> io::Result<()> {
        writeln!(self.out, "299-{message}")?;
        self.line("299 OK LOADED SUCCESSFULLY")
    }

    pub fn init_failed(&mut self, error: &impl fmt::Display) -> io::Result<()> {
        writeln!(self.out, "399-{error}")?;
        self.line("399 ERR CANT INIT MODULE")
    }

    pub fn receiving(&mut self, what: Receiving) -> io::Result<()> {
        self.line(what.reply())
    }

    pub fn settings_received(&mut self) -> io::Result<()> {
        self.line("203 OK SETTINGS RECEIVED")
    }

    pub fn audio_initialized(&mut self) -> io::Result<()> {
        self.line("203 OK AUDIO INITIALIZED")
    }

    pub fn loglevel_set(&mut self) -> io::Result<()> {
        self.line("203 OK LOGLEVEL SET")
    }

    pub fn debugging(&mut self, enable: bool) -> io::Result<()> {
        if enable {
            self.line("200 OK DEBUGGING ON")
        } else {
            self.line("200 OK DEBUGGING OFF")
        }
    }

    pub fn voices(&mut self, voices: &[VoiceDescriptor]) -> io::Result<()> {
        for v in voices {
            writeln!(self.out, "200-{}\t{}\t{}", v.name, v.language, v.variant)?;
        }
        self.line("200 OK VOICE LIST SENT")
    }

    pub fn quit(&mut self) -> io::Result<()> {
        self.line("210 OK QUIT")
    }

    pub fn unknown(&mut self) -> io::Result<()> {
        self.line("300 ERR UNKNOWN COMMAND")
    }
}

impl<W: Write> Host for ProtocolWriter<W> {
    fn speak_ok(&mut self) -> io::Result<()> {
        self.line("200 OK SPEAKING")
    }

    fn speak_error(&mut self) -> io::Result<()> {
        self.line("301 ERROR CANT SPEAK")
    }

    fn report(&mut self, event: SpeechEvent) -> io::Result<()> {
        match event {
            SpeechEvent::Begin => self.line("701 BEGIN"),
            SpeechEvent::End => self.line("702 END"),
            SpeechEvent::Stop => self.line("703 STOP"),
        }
    }

    fn audio(&mut self, track: &AudioTrack<'_>) -> io::Result<()> {
        let big_endian = u8::from(track.byte_order == ByteOrder::BigEndian);
        writeln!(self.out, "705-bits={}", track.bits)?;
        writeln!(self.out, "705-num_channels={}", track.channels)?;
        writeln!(self.out, "705-sample_rate={}", track.sample_rate)?;
        writeln!(self.out, "705-num_samples={}", track.samples.len())?;
        writeln!(self.out, "705-big_endian={big_endian}")?;
        writeln!(self.out, "705 AUDIO")?;
        self.out.write_all(&track.to_bytes())?;
        self.out.flush()
    }
}

/// How the module executable was started.
#[derive(Debug, Clone, Default)]
pub struct ModuleOptions {
    /// Config file used when `INIT` names none.
    pub config_path: Option<PathBuf>,
    pub strictness: Strictness,
}

/// What the reader thread hands to the control thread.
enum Inbound {
    Receiving(Receiving),
    /// `ticket` is set for speak requests queued while a session existed.
    Request {
        command: Command,
        ticket: Option<Ticket>,
    },
}

/// Run the control channel until `QUIT` or end of input.
///
/// `create` is called for every `INIT`, so a failed init can be retried.
pub fn serve<E, F, R, W>(
    mut create: F,
    options: &ModuleOptions,
    input: R,
    output: W,
) -> Result<(), ProtocolError>
where
    E: Eci,
    F: FnMut() -> Option<E>,
    R: BufRead + Send + 'static,
    W: Write,
{
    let cancel: Arc<Mutex<Option<CancelHandle<E::Abort>>>> = Arc::new(Mutex::new(None));
    let (tx, rx) = mpsc::channel();
    let reader = {
        let cancel = Arc::clone(&cancel);
        thread::spawn(move || read_loop(input, tx, cancel))
    };

    let mut writer = ProtocolWriter::new(output);
    let mut session: Option<EngineSession<E>> = None;
    let outcome = control_loop(&mut create, options, &rx, &mut writer, &mut session, &cancel);

    *cancel.lock() = None;
    if let Some(session) = session.take() {
        session.close();
    }

    // the reader has already stopped unless we bailed out on a write error
    if outcome.is_ok() && reader.join().is_err() {
        log::error!("reader thread panicked");
    }
    outcome
}

fn read_loop<R, A>(
    mut input: R,
    tx: mpsc::Sender<Inbound>,
    cancel: Arc<Mutex<Option<CancelHandle<A>>>>,
) where
    R: BufRead,
    A: Abort,
{
    loop {
        let mut receiving = |what: Receiving| {
            let _ = tx.send(Inbound::Receiving(what));
        };
        let command = match read_command(&mut input, &mut receiving) {
            Ok(Some(command)) => command,
            Ok(None) => {
                log::debug!("input closed");
                return;
            }
            Err(e) => {
                log::warn!("{e}");
                return;
            }
        };
        match command {
            Command::Stop | Command::Pause => {
                log::debug!("{command:?}");
                if let Some(handle) = cancel.lock().as_ref() {
                    handle.cancel();
                }
            }
            Command::Quit => {
                let _ = tx.send(Inbound::Request {
                    command: Command::Quit,
                    ticket: None,
                });
                return;
            }
            command => {
                let ticket = match command {
                    Command::Speak { .. } => cancel.lock().as_ref().map(CancelHandle::ticket),
                    _ => None,
                };
                if tx.send(Inbound::Request { command, ticket }).is_err() {
                    return;
                }
            }
        }
    }
}

fn control_loop<E, F, W>(
    create: &mut F,
    options: &ModuleOptions,
    rx: &mpsc::Receiver<Inbound>,
    writer: &mut ProtocolWriter<W>,
    session: &mut Option<EngineSession<E>>,
    cancel: &Mutex<Option<CancelHandle<E::Abort>>>,
) -> Result<(), ProtocolError>
where
    E: Eci,
    F: FnMut() -> Option<E>,
    W: Write,
{
    for inbound in rx {
        let (command, ticket) = match inbound {
            Inbound::Receiving(what) => {
                writer.receiving(what)?;
                continue;
            }
            Inbound::Request { command, ticket } => (command, ticket),
        };
        match command {
            Command::Init(path) => {
                if session.is_some() {
                    log::warn!("INIT on an initialized module");
                    writer.init_failed(&"module already initialized")?;
                    continue;
                }
                let path = path.or_else(|| options.config_path.clone());
                let started = BridgeConfig::load(path.as_deref(), options.strictness)
                    .map_err(InitError::from)
                    .and_then(|config| EngineSession::init(&mut *create, &config));
                match started {
                    Ok((started, ready)) => {
                        log::info!("{ready}");
                        *cancel.lock() = Some(started.cancel_handle());
                        *session = Some(started);
                        writer.init_ok(&ready)?;
                    }
                    Err(e) => {
                        log::error!("{e}");
                        writer.init_failed(&e)?;
                    }
                }
            }
            Command::Set(settings) => {
                match session.as_mut() {
                    Some(session) => {
                        for (name, value) in settings {
                            if let Err(e) = session.set(&name, &value) {
                                log::warn!("{e}");
                            }
                        }
                    }
                    None => log::debug!("SET before INIT ignored"),
                }
                writer.settings_received()?;
            }
            Command::Speak { kind, text } => match session.as_mut() {
                Some(session) => {
                    let outcome = match ticket {
                        Some(ticket) => session.speak_ticket(ticket, &text, kind, writer)?,
                        None => session.speak(&text, kind, writer)?,
                    };
                    log::debug!("utterance: {outcome:?}");
                }
                None => writer.speak_error()?,
            },
            Command::Audio(settings) => {
                for (name, value) in &settings {
                    log::debug!("audio setting {name}={value} ignored");
                }
                log::info!("Using server audio");
                writer.audio_initialized()?;
            }
            Command::Loglevel(settings) => {
                for (name, value) in &settings {
                    match (name.as_str(), value.parse::<u8>()) {
                        ("log_level", Ok(level)) => log::set_max_level(level_filter(level)),
                        _ => log::warn!("ignoring log setting {name}={value}"),
                    }
                }
                writer.loglevel_set()?;
            }
            Command::Debug { enable, file } => {
                match (enable, file) {
                    (true, Some(file)) => {
                        log::info!("debugging requested into {}", file.display())
                    }
                    (true, None) => log::info!("debugging requested"),
                    (false, _) => log::info!("debugging off"),
                }
                writer.debugging(enable)?;
            }
            // handled on the reader thread
            Command::Stop | Command::Pause => {}
            Command::ListVoices => {
                let voices = session
                    .as_ref()
                    .map(|s| s.list_voices())
                    .unwrap_or_default();
                writer.voices(&voices)?;
            }
            Command::Quit => {
                writer.quit()?;
                break;
            }
            Command::Unknown(line) => {
                log::warn!("unknown command: {line}");
                writer.unknown()?;
            }
        }
    }
    Ok(())
}

/// Server log levels run from 0 (nothing) to 5 (everything).
fn level_filter(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::viavoice::testing::{Call, Script, ScriptedEci};
    use std::io::Cursor;

    fn parse_all(input: &str) -> (Vec<Command>, Vec<Receiving>) {
        let mut reader = Cursor::new(input.as_bytes().to_vec());
        let mut commands = Vec::new();
        let mut acks = Vec::new();
        let mut ack = |what: Receiving| acks.push(what);
        while let Some(command) = read_command(&mut reader, &mut ack).unwrap() {
            commands.push(command);
        }
        (commands, acks)
    }

    fn ignore(_: Receiving) {}

    fn run(script: Script, input: &str) -> (String, Vec<Call>) {
        let (engine, recorder) = ScriptedEci::new(script);
        let mut engine = Some(engine);
        let mut output = Vec::new();
        serve(
            move || engine.take(),
            &ModuleOptions::default(),
            Cursor::new(input.as_bytes().to_vec()),
            &mut output,
        )
        .unwrap();
        (String::from_utf8_lossy(&output).into_owned(), recorder.calls())
    }

    #[test]
    fn parses_requests_and_blocks() {
        let (commands, acks) = parse_all(
            "INIT\r\nSET\nrate=20\nbogus\n.\nSPEAK char\n..x\nline two\n.\n\nlist voices\nSTOP\nwhat\nQUIT\n",
        );
        assert_eq!(acks, vec![Receiving::Settings, Receiving::Message]);
        assert_eq!(
            commands,
            vec![
                Command::Init(None),
                Command::Set(vec![("rate".to_string(), "20".to_string())]),
                Command::Speak {
                    kind: MessageKind::Char,
                    text: ".x\nline two".to_string(),
                },
                Command::ListVoices,
                Command::Stop,
                Command::Unknown("what".to_string()),
                Command::Quit,
            ]
        );
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let mut reader = Cursor::new(b"SPEAK\nhello\n".to_vec());
        let err = read_command(&mut reader, &mut ignore).unwrap_err();
        assert!(matches!(err, ProtocolError::UnterminatedBlock("SPEAK")));
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let mut reader = Cursor::new(b"SPEAK\ncaf\xe9\n.\n".to_vec());
        let command = read_command(&mut reader, &mut ignore).unwrap().unwrap();
        assert_eq!(
            command,
            Command::Speak {
                kind: MessageKind::Text,
                text: "caf\u{fffd}".to_string(),
            }
        );
    }

    #[test]
    fn parses_audio_loglevel_and_debug() {
        let (commands, acks) = parse_all(
            "AUDIO\naudio_output_method=server\n.\nLOGLEVEL\nlog_level=3\n.\nDEBUG ON /tmp/sd\ndebug off\nDEBUG maybe\n",
        );
        assert_eq!(
            acks,
            vec![Receiving::AudioSettings, Receiving::LoglevelSettings]
        );
        assert_eq!(
            commands,
            vec![
                Command::Audio(vec![(
                    "audio_output_method".to_string(),
                    "server".to_string()
                )]),
                Command::Loglevel(vec![("log_level".to_string(), "3".to_string())]),
                Command::Debug {
                    enable: true,
                    file: Some(PathBuf::from("/tmp/sd")),
                },
                Command::Debug {
                    enable: false,
                    file: None,
                },
                Command::Unknown("DEBUG maybe".to_string()),
            ]
        );
    }

    #[test]
    fn writes_audio_header_and_raw_samples() {
        let mut writer = ProtocolWriter::new(Vec::new());
        let samples = [1i16, -1];
        writer.audio(&AudioTrack::mono16(&samples, 11025)).unwrap();
        let out = writer.into_inner();
        let header = "705-bits=16\n705-num_channels=1\n705-sample_rate=11025\n\
                      705-num_samples=2\n705-big_endian=0\n705 AUDIO\n";
        assert_eq!(&out[..header.len()], header.as_bytes());
        assert_eq!(&out[header.len()..], &[0x01, 0x00, 0xff, 0xff]);
    }

    #[test]
    fn full_session() {
        let script = Script {
            chunks: vec![vec![1, 2]],
            ..Script::default()
        };
        let input = "INIT\nSET\nrate=100\nvolume=loud\n.\nSPEAK\nHello, world.\n.\nLIST VOICES\nBOGUS\nQUIT\n";
        let (out, calls) = run(script, input);

        assert!(out.starts_with("299-ViaVoice TTS initialized successfully (22050 Hz, voice 0 (Wade))\n299 OK LOADED SUCCESSFULLY\n"));
        assert!(out.contains("203 OK RECEIVING SETTINGS\n203 OK SETTINGS RECEIVED\n"));
        assert!(out.contains("202 OK RECEIVING MESSAGE\n200 OK SPEAKING\n701 BEGIN\n705-bits=16\n"));
        assert!(out.contains("705-num_samples=2\n705-big_endian=0\n705 AUDIO\n\u{1}\u{0}\u{2}\u{0}702 END\n"));
        assert!(out.contains("200-Wade\ten-US\tnone\n200 OK VOICE LIST SENT\n"));
        assert!(out.contains("300 ERR UNKNOWN COMMAND\n"));
        assert!(out.ends_with("210 OK QUIT\n"));

        assert!(calls.contains(&Call::AddText("Hello, world.".to_string())));
        assert_eq!(calls.last(), Some(&Call::Delete));
    }

    #[test]
    fn speak_before_init_cannot_speak() {
        let (out, calls) = run(Script::default(), "SPEAK\nhi\n.\nSET\nrate=5\n.\n");
        assert_eq!(
            out,
            "202 OK RECEIVING MESSAGE\n301 ERROR CANT SPEAK\n\
             203 OK RECEIVING SETTINGS\n203 OK SETTINGS RECEIVED\n"
        );
        assert!(!calls.contains(&Call::RegisterCallback));
    }

    #[test]
    fn second_init_is_refused() {
        let (out, _) = run(Script::default(), "INIT\nINIT\n");
        assert!(out.contains("299 OK LOADED SUCCESSFULLY\n"));
        assert!(out.ends_with("399-module already initialized\n399 ERR CANT INIT MODULE\n"));
    }

    #[test]
    fn failed_init_reports_error() {
        let mut output = Vec::new();
        serve::<ScriptedEci, _, _, _>(
            || None,
            &ModuleOptions::default(),
            Cursor::new(b"INIT\nSPEAK\nhi\n.\n".to_vec()),
            &mut output,
        )
        .unwrap();
        let out = String::from_utf8_lossy(&output);
        assert_eq!(
            out,
            "399-Failed to create ECI instance - check ViaVoice installation\n\
             399 ERR CANT INIT MODULE\n202 OK RECEIVING MESSAGE\n301 ERROR CANT SPEAK\n"
        );
    }

    #[test]
    fn audio_and_loglevel_are_acknowledged() {
        let input = "INIT\nAUDIO\naudio_output_method=server\n.\nLOGLEVEL\nlog_level=3\n.\nSPEAK\nhi\n.\nQUIT\n";
        let (out, calls) = run(Script::default(), input);

        assert!(out.contains(
            "299 OK LOADED SUCCESSFULLY\n\
             207 OK RECEIVING AUDIO SETTINGS\n203 OK AUDIO INITIALIZED\n\
             207 OK RECEIVING LOGLEVEL SETTINGS\n203 OK LOGLEVEL SET\n\
             202 OK RECEIVING MESSAGE\n200 OK SPEAKING\n"
        ));
        assert!(!out.contains("300 ERR UNKNOWN COMMAND"));
        assert!(out.ends_with("210 OK QUIT\n"));
        assert!(calls.contains(&Call::AddText("hi".to_string())));
    }

    #[test]
    fn debug_toggles_are_acknowledged() {
        let (out, _) = run(Script::default(), "DEBUG ON /tmp/sd_viavoice\nDEBUG OFF\nDEBUG\n");
        assert_eq!(
            out,
            "200 OK DEBUGGING ON\n200 OK DEBUGGING OFF\n300 ERR UNKNOWN COMMAND\n"
        );
    }

    #[test]
    fn server_log_levels_map_to_filters() {
        assert_eq!(level_filter(0), LevelFilter::Off);
        assert_eq!(level_filter(1), LevelFilter::Error);
        assert_eq!(level_filter(3), LevelFilter::Info);
        assert_eq!(level_filter(4), LevelFilter::Debug);
        assert_eq!(level_filter(5), LevelFilter::Trace);
        assert_eq!(level_filter(9), LevelFilter::Trace);
    }

    #[test]
    fn end_of_input_closes_the_session() {
        let (out, calls) = run(Script::default(), "INIT\n");
        assert!(out.ends_with("299 OK LOADED SUCCESSFULLY\n"));
        assert_eq!(calls.last(), Some(&Call::Delete));
    }
}
