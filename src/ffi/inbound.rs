//! Inbound notifications pushed by the engine.
//!
//! The engine may push from any thread; the resource drains the queue from
//! its own thread through [`super::FfiHost`].

use std::collections::VecDeque;
use std::ffi::{c_char, c_int};
use std::sync::{Mutex, PoisonError};

use tracing_subscriber::EnvFilter;

use super::{c_bytes, c_str};
use crate::handle::Handle;
use crate::invoker::HostNotification;

static INBOUND: Mutex<VecDeque<HostNotification>> = Mutex::new(VecDeque::new());

fn push(notification: HostNotification) {
    INBOUND
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push_back(notification);
}

pub(crate) fn pop() -> Option<HostNotification> {
    INBOUND
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
}

/// Queue a client event. `payload` is the MessagePack argument array.
///
/// # Safety
/// `name` must be a NUL-terminated string; `payload` must be null or valid
/// for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn hashcall_push_net_event(
    name: *const c_char,
    source: c_int,
    payload: *const u8,
    len: usize,
) -> c_int {
    ffi_catch!(-1, {
        let Some(name) = c_str(name) else {
            return -1;
        };
        tracing::trace!("[ffi] net event '{name}' from {source}");
        push(HostNotification::NetEvent {
            name: name.to_string(),
            source: Handle(source),
            payload: c_bytes(payload, len),
        });
        0
    })
}

/// Queue a state-bag change. `payload` is the MessagePack value; empty
/// clears the key.
///
/// # Safety
/// `bag` and `key` must be NUL-terminated strings; `payload` must be null or
/// valid for `len` bytes.
#[no_mangle]
pub unsafe extern "C" fn hashcall_push_state_bag_change(
    bag: *const c_char,
    key: *const c_char,
    payload: *const u8,
    len: usize,
    replicated: bool,
) -> c_int {
    ffi_catch!(-1, {
        let (Some(bag), Some(key)) = (c_str(bag), c_str(key)) else {
            return -1;
        };
        push(HostNotification::StateBagChanged {
            bag: bag.to_string(),
            key: key.to_string(),
            payload: c_bytes(payload, len),
            replicated,
        });
        0
    })
}

/// # Safety
/// `name` must be a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hashcall_push_convar_change(name: *const c_char) -> c_int {
    ffi_catch!(-1, {
        let Some(name) = c_str(name) else {
            return -1;
        };
        push(HostNotification::ConvarChanged {
            name: name.to_string(),
        });
        0
    })
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `filter`;
/// a null `filter` means `info`.
///
/// Returns 0 on success, 1 if a subscriber was already installed, -1 for an
/// invalid filter.
///
/// # Safety
/// `filter` must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hashcall_init_logging(filter: *const c_char) -> c_int {
    ffi_catch!(-1, {
        let directive = c_str(filter).unwrap_or("info");
        let filter = match EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directive)) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("[ffi] invalid log filter {directive:?}: {e}");
                return -1;
            }
        };
        match tracing_subscriber::fmt().with_env_filter(filter).try_init() {
            Ok(()) => 0,
            Err(_) => 1,
        }
    })
}
