//! Native calls forwarded to a C handler.
//!
//! The engine registers one handler. For every call the handler receives the
//! native hash and a copy of the call buffer in which each string or buffer
//! slot holds a pointer into the argument arena. A string result is returned
//! as a `const char*` in result slot 0 (null for "no string"); it is copied
//! before the call returns.

use std::ffi::{c_char, c_int, CStr};
use std::sync::OnceLock;

use crate::codec::{CallFrame, NativeContext, PayloadRef, Shape, MAX_RESULTS};
use crate::error::{BridgeError, DecodeError, InvocationError};
use crate::invoker::{HostNotification, NativeHost};
use crate::natives::NativeDef;

/// `int handler(uint32_t hash, NativeContext *ctx)`; zero means success.
pub type NativeHandlerFn = unsafe extern "C" fn(hash: u32, ctx: *mut NativeContext) -> c_int;

static NATIVE_HANDLER: OnceLock<NativeHandlerFn> = OnceLock::new();

/// Register the engine's native handler. Only the first registration wins.
///
/// Returns 0 on success, 1 if a handler was already registered, -1 for null.
#[no_mangle]
pub extern "C" fn hashcall_register_native_handler(handler: Option<NativeHandlerFn>) -> c_int {
    ffi_catch!(-1, {
        let Some(handler) = handler else {
            tracing::warn!("[ffi] null native handler ignored");
            return -1;
        };
        if NATIVE_HANDLER.set(handler).is_ok() {
            tracing::info!("[ffi] native handler registered");
            0
        } else {
            tracing::warn!("[ffi] native handler already registered");
            1
        }
    })
}

/// [`NativeHost`] backed by the registered C handler and the inbound queue.
#[derive(Debug, Default)]
pub struct FfiHost;

impl FfiHost {
    pub fn new() -> Self {
        Self
    }

    pub fn is_ready() -> bool {
        NATIVE_HANDLER.get().is_some()
    }
}

impl NativeHost for FfiHost {
    fn call(&mut self, def: &NativeDef, frame: &mut CallFrame) -> Result<(), BridgeError> {
        let handler = *NATIVE_HANDLER.get().ok_or(InvocationError::NoHandler)?;

        let mut ctx = *frame.context();
        let base = frame.payload().as_ptr();
        for &slot in frame.payload_slots() {
            if let Some(r) = PayloadRef::unpack(ctx.args[slot]) {
                // SAFETY: the invoker only records refs it wrote into this arena.
                ctx.args[slot] = unsafe { base.add(r.offset as usize) } as usize as u64;
            }
        }

        // SAFETY: `ctx` is a valid, exclusively borrowed call buffer, and the
        // pointers in it stay valid until `frame` is next mutated.
        let status = unsafe { handler(def.id.0, &mut ctx) };
        if status != 0 {
            return Err(InvocationError::Engine {
                native: def.name,
                status,
            }
            .into());
        }

        copy_results(def, &ctx, frame)
    }

    fn poll_notification(&mut self) -> Option<HostNotification> {
        super::inbound::pop()
    }
}

fn copy_results(def: &NativeDef, ctx: &NativeContext, frame: &mut CallFrame) -> Result<(), BridgeError> {
    let n = ctx.num_results as usize;
    if n > MAX_RESULTS {
        return Err(InvocationError::TooManySlots { max: MAX_RESULTS }.into());
    }

    if def.ret == Shape::String {
        if n != 1 {
            return Err(DecodeError::mismatch(def.ret, format!("{n} result slot(s)")).into());
        }
        let ptr = ctx.results[0] as usize as *const c_char;
        if ptr.is_null() {
            frame.push_result_null_str()?;
        } else {
            // SAFETY: the handler contract requires a NUL-terminated string
            // that outlives the call.
            let s = unsafe { CStr::from_ptr(ptr) }
                .to_str()
                .map_err(|_| DecodeError::InvalidUtf8)?;
            frame.push_result_str(s)?;
        }
        return Ok(());
    }

    for &word in &ctx.results[..n] {
        frame.push_result_word(word)?;
    }
    Ok(())
}
