//! Native invoker: validate, encode, call, decode.
//!
//! The engine itself sits behind [`NativeHost`]. [`memory::MemoryHost`] is an
//! in-process engine for tests and the resource runner;
//! [`crate::ffi::host::FfiHost`] forwards to a handler registered over the C ABI.

pub mod memory;

use std::collections::HashMap;
use std::fmt;

use crate::codec::{ArgKind, Argument, CallFrame, ReturnValue, Shape};
use crate::config::{ResourceConfig, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::error::{BridgeError, InvocationError};
use crate::handle::Handle;
use crate::natives::{self, NativeDef};

/// 32-bit native hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeId(pub u32);

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

/// Something the engine reports back between native calls.
#[derive(Debug, Clone, PartialEq)]
pub enum HostNotification {
    /// A remote peer triggered a client-scoped event.
    NetEvent {
        name: String,
        source: Handle,
        payload: Vec<u8>,
    },
    StateBagChanged {
        bag: String,
        key: String,
        payload: Vec<u8>,
        replicated: bool,
    },
    ConvarChanged { name: String },
}

/// The engine seam.
pub trait NativeHost {
    /// Execute `def` with the arguments already encoded in `frame`, writing
    /// any results back into it.
    fn call(&mut self, def: &NativeDef, frame: &mut CallFrame) -> Result<(), BridgeError>;

    fn poll_notification(&mut self) -> Option<HostNotification> {
        None
    }
}

impl<H: NativeHost + ?Sized> NativeHost for Box<H> {
    fn call(&mut self, def: &NativeDef, frame: &mut CallFrame) -> Result<(), BridgeError> {
        (**self).call(def, frame)
    }

    fn poll_notification(&mut self) -> Option<HostNotification> {
        (**self).poll_notification()
    }
}

/// Declarations indexed by hash and by canonical name.
#[derive(Debug, Clone, Default)]
pub struct NativeTable {
    by_id: HashMap<NativeId, NativeDef>,
    by_name: HashMap<&'static str, NativeId>,
}

impl NativeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every declaration in [`natives::ALL`].
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for def in natives::ALL.iter().flat_map(|ns| ns.iter()) {
            table.insert(*def);
        }
        table
    }

    /// Returns the declaration previously registered under the same hash.
    pub fn insert(&mut self, def: NativeDef) -> Option<NativeDef> {
        self.by_name.insert(def.name, def.id);
        self.by_id.insert(def.id, def)
    }

    pub fn get(&self, id: NativeId) -> Option<&NativeDef> {
        self.by_id.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&NativeDef> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NativeDef> {
        self.by_id.values()
    }
}

fn kind_accepts(declared: ArgKind, arg: &Argument<'_>) -> bool {
    match (declared, arg) {
        (ArgKind::Handle, Argument::Int(_)) => true,
        (declared, arg) => declared == arg.kind(),
    }
}

/// Check `args` against the declaration without touching the call buffer.
pub fn validate(def: &NativeDef, args: &[Argument<'_>]) -> Result<(), InvocationError> {
    if args.len() != def.args.len() {
        return Err(InvocationError::Arity {
            native: def.name,
            expected: def.args.len(),
            got: args.len(),
        });
    }
    for (index, (declared, arg)) in def.args.iter().zip(args).enumerate() {
        if !kind_accepts(*declared, arg) {
            return Err(InvocationError::ArgumentType {
                native: def.name,
                index,
                expected: *declared,
                got: arg.type_name(),
            });
        }
    }
    Ok(())
}

/// Performs native calls against one engine host. Calls run strictly in the
/// order they are made; the call frame is reused between them.
pub struct Invoker<H> {
    host: H,
    table: NativeTable,
    frame: CallFrame,
    max_payload: usize,
    trace_calls: bool,
}

impl<H: NativeHost> Invoker<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            table: NativeTable::builtin(),
            frame: CallFrame::new(),
            max_payload: DEFAULT_MAX_PAYLOAD_BYTES,
            trace_calls: false,
        }
    }

    pub fn with_config(host: H, config: &ResourceConfig) -> Self {
        let mut invoker = Self::new(host);
        invoker.max_payload = config.max_payload_bytes;
        invoker.trace_calls = config.trace_native_calls;
        invoker
    }

    pub fn with_table(mut self, table: NativeTable) -> Self {
        self.table = table;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn table(&self) -> &NativeTable {
        &self.table
    }

    /// Invoke `id` with `args`, decoding the result as `expected`.
    ///
    /// `expected` must equal the declared shape. Natives declared `Void` are
    /// run for effect and return [`ReturnValue::Void`] without decoding.
    pub fn invoke(
        &mut self,
        id: NativeId,
        args: &[Argument<'_>],
        expected: Shape,
    ) -> Result<ReturnValue, BridgeError> {
        let def = *self
            .table
            .get(id)
            .ok_or(InvocationError::UnknownNative(id))?;
        if def.ret != expected {
            return Err(InvocationError::ReturnShape {
                native: def.name,
                declared: def.ret,
                requested: expected,
            }
            .into());
        }
        self.call_def(&def, args)
    }

    /// Invoke by canonical name with the declared result shape.
    pub fn invoke_named(
        &mut self,
        name: &str,
        args: &[Argument<'_>],
    ) -> Result<(NativeDef, ReturnValue), BridgeError> {
        let def = *self
            .table
            .by_name(name)
            .ok_or_else(|| InvocationError::UnknownName(name.to_string()))?;
        let value = self.call_def(&def, args)?;
        Ok((def, value))
    }

    fn call_def(&mut self, def: &NativeDef, args: &[Argument<'_>]) -> Result<ReturnValue, BridgeError> {
        validate(def, args)?;

        let size: usize = args.iter().map(Argument::payload_len).sum();
        if size > self.max_payload {
            return Err(InvocationError::PayloadTooLarge {
                native: def.name,
                size,
                limit: self.max_payload,
            }
            .into());
        }

        self.frame.reset();
        for arg in args {
            self.frame.push(arg.encode())?;
        }

        if self.trace_calls {
            let ctx = self.frame.context();
            let slots = &ctx.args[..ctx.num_args as usize];
            tracing::trace!(
                "[invoker] {} ({}) slots={} payload={}",
                def.name,
                def.id,
                hex::encode(bytemuck::cast_slice::<u64, u8>(slots)),
                hex::encode(self.frame.payload()),
            );
        }

        self.host.call(def, &mut self.frame)?;

        if def.ret == Shape::Void {
            return Ok(ReturnValue::Void);
        }
        let value = self.frame.decode(def.ret).map_err(|e| {
            tracing::warn!("[invoker] {} returned an unexpected shape: {e}", def.name);
            e
        })?;
        Ok(value)
    }

    pub fn poll_notification(&mut self) -> Option<HostNotification> {
        self.host.poll_notification()
    }
}
