//! FFI (Foreign Function Interface) layer
//!
//! C entry points for an engine that links this crate statically: it
//! registers its native handler and pushes inbound notifications here.

/// Catch any Rust panic at the FFI boundary and return `$default` instead.
/// Panics must not unwind across `extern "C"`; doing so is undefined behavior.
macro_rules! ffi_catch {
    ($default:expr, $body:expr) => {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| $body)) {
            Ok(v) => v,
            Err(_) => {
                tracing::error!("[ffi] panic caught at the C boundary");
                $default
            }
        }
    };
}

pub mod host;
pub mod inbound;

pub use host::{hashcall_register_native_handler, FfiHost, NativeHandlerFn};
pub use inbound::{
    hashcall_init_logging, hashcall_push_convar_change, hashcall_push_net_event,
    hashcall_push_state_bag_change,
};

use std::ffi::{c_char, CStr};

/// Borrow a C string as UTF-8. `None` for null or invalid UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn c_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

/// Copy a C byte buffer. A null pointer is an empty buffer.
///
/// # Safety
/// `ptr` must be null or valid for `len` bytes.
unsafe fn c_bytes(ptr: *const u8, len: usize) -> Vec<u8> {
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    std::slice::from_raw_parts(ptr, len).to_vec()
}
