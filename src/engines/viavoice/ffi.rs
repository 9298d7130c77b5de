//! Linked ECI binding over `libibmeci`.

use std::ffi::{c_char, c_int, c_long, c_void, CString};
use std::os::unix::ffi::OsStrExt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use parking_lot::Mutex;

use super::accumulator::AudioAccumulator;
use super::eci::{
    Abort, CallbackReturn, DictError, DictVolume, Eci, EciMessage, EciParam, VoiceParam,
};

type EciHand = *mut c_void;
type EciDictHand = *mut c_void;
type EciBoolean = c_int;
type EciCallback = unsafe extern "C" fn(EciHand, c_int, c_long, *mut c_void) -> c_int;

#[link(name = "ibmeci")]
extern "C" {
    fn eciNew() -> EciHand;
    fn eciDelete(handle: EciHand) -> EciHand;
    fn eciRegisterCallback(handle: EciHand, callback: Option<EciCallback>, data: *mut c_void);
    fn eciSetOutputBuffer(handle: EciHand, size: c_int, buffer: *mut i16) -> EciBoolean;
    fn eciSetParam(handle: EciHand, param: c_int, value: c_int) -> c_int;
    fn eciGetParam(handle: EciHand, param: c_int) -> c_int;
    fn eciSetVoiceParam(handle: EciHand, voice: c_int, param: c_int, value: c_int) -> c_int;
    fn eciGetVoiceParam(handle: EciHand, voice: c_int, param: c_int) -> c_int;
    fn eciCopyVoice(handle: EciHand, from: c_int, to: c_int) -> EciBoolean;
    fn eciNewDict(handle: EciHand) -> EciDictHand;
    fn eciSetDict(handle: EciHand, dict: EciDictHand) -> c_int;
    fn eciDeleteDict(handle: EciHand, dict: EciDictHand) -> EciDictHand;
    fn eciLoadDict(
        handle: EciHand,
        dict: EciDictHand,
        volume: c_int,
        filename: *const c_char,
    ) -> c_int;
    fn eciAddText(handle: EciHand, text: *const c_char) -> EciBoolean;
    fn eciSynthesize(handle: EciHand) -> EciBoolean;
    fn eciSynchronize(handle: EciHand) -> EciBoolean;
    fn eciStop(handle: EciHand) -> EciBoolean;
}

#[derive(Debug, Clone, Copy)]
struct RawHand(NonNull<c_void>);

// ECI allows eciStop from a thread other than the one blocked in eciSynchronize.
unsafe impl Send for RawHand {}
unsafe impl Sync for RawHand {}

impl RawHand {
    fn ptr(self) -> EciHand {
        self.0.as_ptr()
    }
}

/// What the C callback receives as its `data` pointer.
struct CallbackContext {
    accumulator: Arc<AudioAccumulator>,
    scratch: *const i16,
    scratch_len: usize,
}

unsafe extern "C" fn on_message(
    _handle: EciHand,
    message: c_int,
    param: c_long,
    data: *mut c_void,
) -> c_int {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        // SAFETY: `data` is the boxed context registered by `LinkedEci`, which
        // outlives the engine instance.
        let Some(ctx) = (unsafe { (data as *const CallbackContext).as_ref() }) else {
            return CallbackReturn::NotProcessed;
        };
        let Some(message) = EciMessage::from_code(message) else {
            return CallbackReturn::Processed;
        };
        let chunk: &[i16] = if message == EciMessage::WaveformBuffer && !ctx.scratch.is_null() {
            let n = usize::try_from(param).unwrap_or(0).min(ctx.scratch_len);
            // SAFETY: the engine wrote `n` samples into the scratch buffer it
            // was given, which `LinkedEci` keeps alive.
            unsafe { std::slice::from_raw_parts(ctx.scratch, n) }
        } else {
            &[]
        };
        ctx.accumulator.deliver(message, chunk)
    }));
    outcome.unwrap_or(CallbackReturn::NotProcessed) as c_int
}

/// Opaque ECI dictionary handle.
#[derive(Debug)]
pub struct EciDict(NonNull<c_void>);

/// Stops a [`LinkedEci`] from any thread; inert once the engine is deleted.
#[derive(Debug, Clone)]
pub struct EciAbort {
    live: Arc<Mutex<Option<RawHand>>>,
}

impl Abort for EciAbort {
    fn abort(&self) -> bool {
        match *self.live.lock() {
            // SAFETY: the handle stays valid while it is in `live`.
            Some(hand) => unsafe { eciStop(hand.ptr()) != 0 },
            None => false,
        }
    }
}

/// An engine instance created with `eciNew`.
pub struct LinkedEci {
    hand: RawHand,
    live: Arc<Mutex<Option<RawHand>>>,
    context: Option<Box<CallbackContext>>,
    scratch: Option<Box<[i16]>>,
}

impl LinkedEci {
    /// Create an engine instance. `None` if the runtime cannot provide one.
    pub fn new() -> Option<Self> {
        // SAFETY: no preconditions.
        let hand = NonNull::new(unsafe { eciNew() }).map(RawHand)?;
        Some(Self {
            hand,
            live: Arc::new(Mutex::new(Some(hand))),
            context: None,
            scratch: None,
        })
    }
}

impl Eci for LinkedEci {
    type Dict = EciDict;
    type Abort = EciAbort;

    fn register_callback(&mut self, context: Arc<AudioAccumulator>) {
        let (scratch, scratch_len) = match self.scratch.as_mut() {
            Some(buf) => (buf.as_ptr(), buf.len()),
            None => (ptr::null(), 0),
        };
        let mut ctx = Box::new(CallbackContext {
            accumulator: context,
            scratch,
            scratch_len,
        });
        let data = &mut *ctx as *mut CallbackContext as *mut c_void;
        // SAFETY: `ctx` is kept in `self.context` until after eciDelete.
        unsafe { eciRegisterCallback(self.hand.ptr(), Some(on_message), data) };
        self.context = Some(ctx);
    }

    fn set_output_buffer(&mut self, mut buffer: Box<[i16]>) -> bool {
        let Ok(size) = c_int::try_from(buffer.len()) else {
            return false;
        };
        // SAFETY: the buffer is moved into `self.scratch` and outlives the engine.
        let accepted =
            unsafe { eciSetOutputBuffer(self.hand.ptr(), size, buffer.as_mut_ptr()) } != 0;
        if !accepted {
            return false;
        }
        if let Some(ctx) = self.context.as_mut() {
            ctx.scratch = buffer.as_ptr();
            ctx.scratch_len = buffer.len();
        }
        self.scratch = Some(buffer);
        true
    }

    fn set_param(&mut self, param: EciParam, value: i32) -> i32 {
        unsafe { eciSetParam(self.hand.ptr(), param as c_int, value) }
    }

    fn get_param(&self, param: EciParam) -> i32 {
        unsafe { eciGetParam(self.hand.ptr(), param as c_int) }
    }

    fn set_voice_param(&mut self, voice: u8, param: VoiceParam, value: i32) -> i32 {
        unsafe { eciSetVoiceParam(self.hand.ptr(), c_int::from(voice), param as c_int, value) }
    }

    fn get_voice_param(&self, voice: u8, param: VoiceParam) -> i32 {
        unsafe { eciGetVoiceParam(self.hand.ptr(), c_int::from(voice), param as c_int) }
    }

    fn copy_voice(&mut self, from: u8, to: u8) -> bool {
        unsafe { eciCopyVoice(self.hand.ptr(), c_int::from(from), c_int::from(to)) != 0 }
    }

    fn new_dict(&mut self) -> Option<EciDict> {
        NonNull::new(unsafe { eciNewDict(self.hand.ptr()) }).map(EciDict)
    }

    fn load_dict(&mut self, dict: &EciDict, volume: DictVolume, path: &Path) -> Result<(), DictError> {
        let filename =
            CString::new(path.as_os_str().as_bytes()).map_err(|_| DictError::FileNotFound)?;
        let code = unsafe {
            eciLoadDict(
                self.hand.ptr(),
                dict.0.as_ptr(),
                volume as c_int,
                filename.as_ptr(),
            )
        };
        DictError::from_code(code).map_or(Ok(()), Err)
    }

    fn set_dict(&mut self, dict: &EciDict) -> Result<(), DictError> {
        let code = unsafe { eciSetDict(self.hand.ptr(), dict.0.as_ptr()) };
        DictError::from_code(code).map_or(Ok(()), Err)
    }

    fn delete_dict(&mut self, dict: EciDict) {
        unsafe { eciDeleteDict(self.hand.ptr(), dict.0.as_ptr()) };
    }

    fn add_text(&mut self, text: &str) -> bool {
        let Ok(text) = CString::new(text) else {
            log::warn!("text contains a NUL byte");
            return false;
        };
        unsafe { eciAddText(self.hand.ptr(), text.as_ptr()) != 0 }
    }

    fn synthesize(&mut self) -> bool {
        unsafe { eciSynthesize(self.hand.ptr()) != 0 }
    }

    fn synchronize(&mut self) -> bool {
        unsafe { eciSynchronize(self.hand.ptr()) != 0 }
    }

    fn abort_handle(&self) -> EciAbort {
        EciAbort {
            live: Arc::clone(&self.live),
        }
    }
}

impl Drop for LinkedEci {
    fn drop(&mut self) {
        let mut live = self.live.lock();
        *live = None;
        // SAFETY: last use of the handle; abort handles now see `None`.
        unsafe { eciDelete(self.hand.ptr()) };
        // context and scratch are freed after this, once no callback can run
    }
}
