//! Error taxonomy for the bridge.
//!
//! Every error is surfaced synchronously to the caller of the operation that
//! produced it. Nothing here is retried: natives are side-effecting and event
//! dispatch order is significant.

use thiserror::Error;

use crate::codec::{ArgKind, Shape};
use crate::events::DispatchOutcome;
use crate::invoker::NativeId;

/// The engine returned something other than what the declaration promised.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("expected {expected}, observed {observed}")]
    ShapeMismatch { expected: String, observed: String },

    #[error("result slot {slot} holds {raw:#x}, which is not a boolean")]
    NotABoolean { slot: usize, raw: u64 },

    #[error("payload reference {offset}+{len} is outside the {available}-byte payload")]
    PayloadOutOfRange { offset: usize, len: usize, available: usize },

    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("malformed MessagePack payload: {0}")]
    MessagePack(String),

    #[error("unsupported MessagePack extension type {0}")]
    UnsupportedExtension(i8),
}

impl DecodeError {
    pub(crate) fn mismatch(expected: impl ToString, observed: impl ToString) -> Self {
        DecodeError::ShapeMismatch {
            expected: expected.to_string(),
            observed: observed.to_string(),
        }
    }
}

/// A handle-or-wrapper argument did not carry a usable handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid handle: {reason}")]
pub struct InvalidHandleError {
    pub reason: String,
}

impl InvalidHandleError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// A native call could not be made, or the engine rejected it.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("unknown native {0}")]
    UnknownNative(NativeId),

    #[error("unknown native '{0}'")]
    UnknownName(String),

    #[error("{native}: declared to return {declared}, caller expected {requested}")]
    ReturnShape {
        native: &'static str,
        declared: Shape,
        requested: Shape,
    },

    #[error("{native}: expected {expected} arguments, got {got}")]
    Arity {
        native: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{native}: argument {index} must be {expected}, got {got}")]
    ArgumentType {
        native: &'static str,
        index: usize,
        expected: ArgKind,
        got: &'static str,
    },

    #[error("call buffer holds at most {max} slots")]
    TooManySlots { max: usize },

    #[error("{native}: argument payload of {size} bytes exceeds the {limit}-byte limit")]
    PayloadTooLarge {
        native: &'static str,
        size: usize,
        limit: usize,
    },

    #[error("{native} is not implemented by this engine host")]
    Unsupported { native: &'static str },

    #[error("{native} failed in the engine (status {status})")]
    Engine { native: &'static str, status: i32 },

    #[error("no native handler registered with the engine")]
    NoHandler,

    #[error("native invoked re-entrantly from inside another native call")]
    Reentrant,
}

/// An operation was used outside the context it requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("{op} called outside of an event dispatch")]
    NoActiveDispatch { op: &'static str },
}

/// One or more handlers failed during a dispatch. Every handler was still
/// attempted; `outcome` describes the dispatch as it completed.
#[derive(Debug, Error)]
#[error("{} handler(s) failed while dispatching '{channel}'", failures.len())]
pub struct DispatchError {
    pub channel: String,
    pub outcome: DispatchOutcome,
    pub failures: Vec<anyhow::Error>,
}

/// Misuse of the HTTP ingress contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("writeHead called twice")]
    HeadAlreadyWritten,

    #[error("response already sent")]
    AlreadySent,

    #[error("request body is not valid UTF-8 but the data handler asked for text")]
    BodyNotText,

    #[error("no HTTP handler registered for this resource")]
    NoHandler,
}

/// Umbrella error returned by the public API.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    InvalidHandle(#[from] InvalidHandleError),

    #[error(transparent)]
    Invocation(#[from] InvocationError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Http(#[from] HttpError),
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
