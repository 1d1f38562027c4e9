//! hashcall - native call bridge
//!
//! Lets a scripting resource call hash-addressed engine natives, exchange
//! events with other resources and clients, and follow state-bag changes.

// ============================================
// Core Modules
// ============================================

/// Resource configuration (YAML)
pub mod config;
/// Error taxonomy
pub mod error;
/// Value codec: call buffer, payload values, MessagePack
pub mod codec;
/// Handles and handle-bearing wrappers
pub mod handle;
/// Native invoker and the engine seam
pub mod invoker;
/// Native declarations and generated wrappers
pub mod natives;

// ============================================
// Subscriptions
// ============================================

pub mod subscription;
pub mod events;
pub mod state_bag;
pub mod convar;
pub mod http;

/// One resource's view of the bridge
pub mod resource;
/// Lua scripting host
pub mod scripting;

// ============================================
// FFI Layer
// ============================================

/// C entry points for the linking engine
pub mod ffi;

pub use codec::{Value, Vector3};
pub use error::{BridgeError, Result};
pub use handle::{Handle, HandleBearing};
pub use invoker::{Invoker, NativeHost, NativeId};
pub use resource::Resource;
