//! Call buffer layout and the argument/result encodings.
//!
//! Every argument occupies one or more 64-bit slots in [`NativeContext`]:
//!
//! | kind      | slots | encoding                                          |
//! |-----------|-------|---------------------------------------------------|
//! | int       | 1     | sign-extended `i32`                               |
//! | float     | 1     | `f32` bits in the low word                        |
//! | bool      | 1     | `0` or `1`                                        |
//! | handle    | 1     | sign-extended `i32`                               |
//! | vector3   | 3     | three float slots, x then y then z                |
//! | string    | 1     | [`PayloadRef`] into the argument payload          |
//! | buffer    | 2     | [`PayloadRef`], then the payload length           |
//!
//! Strings and buffers live in a payload arena owned by the [`CallFrame`], so
//! their length is always explicit. Text additionally gets a trailing NUL in
//! the arena for hosts that hand it to C as a `const char*`.

use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};
use bytes::{BufMut, BytesMut};

use super::{ArgKind, Scalar, Shape, Vector3};
use crate::error::{DecodeError, InvocationError};
use crate::handle::Handle;

/// Argument slots available per call.
pub const MAX_ARGS: usize = 32;
/// Result slots available per call.
pub const MAX_RESULTS: usize = 8;

/// The raw call buffer handed to the engine.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct NativeContext {
    pub args: [u64; MAX_ARGS],
    pub results: [u64; MAX_RESULTS],
    pub num_args: u32,
    pub num_results: u32,
}

/// (offset, length) into a payload arena, packed into one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadRef {
    pub offset: u32,
    pub len: u32,
}

impl PayloadRef {
    /// Slot value of a null string result.
    pub const NULL_WORD: u64 = u64::MAX;

    pub fn pack(self) -> u64 {
        ((self.offset as u64) << 32) | self.len as u64
    }

    /// `None` for [`PayloadRef::NULL_WORD`].
    pub fn unpack(word: u64) -> Option<Self> {
        if word == Self::NULL_WORD {
            return None;
        }
        Some(Self {
            offset: (word >> 32) as u32,
            len: word as u32,
        })
    }

    fn slice(self, arena: &[u8]) -> Result<&[u8], DecodeError> {
        let start = self.offset as usize;
        let end = start + self.len as usize;
        arena.get(start..end).ok_or(DecodeError::PayloadOutOfRange {
            offset: start,
            len: self.len as usize,
            available: arena.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Scalar words
// ---------------------------------------------------------------------------

pub(crate) fn encode_i32(v: i32) -> u64 {
    v as i64 as u64
}

pub(crate) fn decode_i32(word: u64) -> i32 {
    word as u32 as i32
}

pub(crate) fn encode_f32(v: f32) -> u64 {
    v.to_bits() as u64
}

pub(crate) fn decode_f32(word: u64) -> f32 {
    f32::from_bits(word as u32)
}

fn decode_bool(slot: usize, word: u64) -> Result<bool, DecodeError> {
    match word {
        0 => Ok(false),
        1 => Ok(true),
        raw => Err(DecodeError::NotABoolean { slot, raw }),
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// One native argument. Borrowed data is copied into the call frame, so no
/// argument outlives the call it was passed to.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument<'a> {
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(Cow<'a, str>),
    Bytes(Cow<'a, [u8]>),
    Vector3(Vector3),
    Handle(Handle),
}

/// Slot-level form of an argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireValue<'a> {
    Word(u64),
    Vector([u64; 3]),
    Text(&'a [u8]),
    /// Emits a length companion slot after the payload reference.
    Buffer(&'a [u8]),
}

impl<'a> Argument<'a> {
    pub fn kind(&self) -> ArgKind {
        match self {
            Argument::Int(_) => ArgKind::Int,
            Argument::Float(_) => ArgKind::Float,
            Argument::Bool(_) => ArgKind::Bool,
            Argument::Str(_) => ArgKind::Str,
            Argument::Bytes(_) => ArgKind::Bytes,
            Argument::Vector3(_) => ArgKind::Vector3,
            Argument::Handle(_) => ArgKind::Handle,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Argument::Int(_) => "int",
            Argument::Float(_) => "float",
            Argument::Bool(_) => "bool",
            Argument::Str(_) => "string",
            Argument::Bytes(_) => "buffer",
            Argument::Vector3(_) => "vector3",
            Argument::Handle(_) => "handle",
        }
    }

    /// Bytes this argument adds to the payload arena.
    pub fn payload_len(&self) -> usize {
        match self {
            Argument::Str(s) => s.len() + 1,
            Argument::Bytes(b) => b.len(),
            _ => 0,
        }
    }

    pub fn encode(&self) -> WireValue<'_> {
        match self {
            Argument::Int(v) => WireValue::Word(encode_i32(*v)),
            Argument::Float(v) => WireValue::Word(encode_f32(*v)),
            Argument::Bool(v) => WireValue::Word(*v as u64),
            Argument::Handle(h) => WireValue::Word(encode_i32(h.raw())),
            Argument::Vector3(v) => {
                WireValue::Vector([encode_f32(v.x), encode_f32(v.y), encode_f32(v.z)])
            }
            Argument::Str(s) => WireValue::Text(s.as_bytes()),
            Argument::Bytes(b) => WireValue::Buffer(b),
        }
    }

    pub fn into_owned(self) -> Argument<'static> {
        match self {
            Argument::Int(v) => Argument::Int(v),
            Argument::Float(v) => Argument::Float(v),
            Argument::Bool(v) => Argument::Bool(v),
            Argument::Str(s) => Argument::Str(Cow::Owned(s.into_owned())),
            Argument::Bytes(b) => Argument::Bytes(Cow::Owned(b.into_owned())),
            Argument::Vector3(v) => Argument::Vector3(v),
            Argument::Handle(h) => Argument::Handle(h),
        }
    }
}

impl From<i32> for Argument<'_> {
    fn from(v: i32) -> Self {
        Argument::Int(v)
    }
}

impl From<f32> for Argument<'_> {
    fn from(v: f32) -> Self {
        Argument::Float(v)
    }
}

impl From<bool> for Argument<'_> {
    fn from(v: bool) -> Self {
        Argument::Bool(v)
    }
}

impl<'a> From<&'a str> for Argument<'a> {
    fn from(v: &'a str) -> Self {
        Argument::Str(Cow::Borrowed(v))
    }
}

impl From<String> for Argument<'_> {
    fn from(v: String) -> Self {
        Argument::Str(Cow::Owned(v))
    }
}

impl<'a> From<&'a [u8]> for Argument<'a> {
    fn from(v: &'a [u8]) -> Self {
        Argument::Bytes(Cow::Borrowed(v))
    }
}

impl From<Vector3> for Argument<'_> {
    fn from(v: Vector3) -> Self {
        Argument::Vector3(v)
    }
}

impl From<Handle> for Argument<'_> {
    fn from(v: Handle) -> Self {
        Argument::Handle(v)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Tuple element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalarValue {
    Int(i32),
    Float(f32),
    Bool(bool),
}

/// Decoded result of a native call.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnValue {
    Void,
    /// Null string result.
    Nil,
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
    Vector3(Vector3),
    Tuple(Vec<ScalarValue>),
}

impl ReturnValue {
    pub fn describe(&self) -> String {
        match self {
            ReturnValue::Void => "void".to_string(),
            ReturnValue::Nil => "nil".to_string(),
            ReturnValue::Int(_) => "int".to_string(),
            ReturnValue::Float(_) => "float".to_string(),
            ReturnValue::Bool(_) => "bool".to_string(),
            ReturnValue::Str(_) => "string".to_string(),
            ReturnValue::Vector3(_) => "vector3".to_string(),
            ReturnValue::Tuple(items) => format!("tuple of {}", items.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// CallFrame
// ---------------------------------------------------------------------------

/// A [`NativeContext`] together with the payload arenas its slots refer to.
///
/// The invoker fills the argument side; the engine host reads arguments with
/// the `arg_*` accessors and writes results with the `push_result_*` ones.
#[derive(Debug)]
pub struct CallFrame {
    ctx: NativeContext,
    payload: BytesMut,
    result_payload: BytesMut,
    payload_slots: Vec<usize>,
}

impl Default for CallFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl CallFrame {
    pub fn new() -> Self {
        Self {
            ctx: NativeContext::zeroed(),
            payload: BytesMut::with_capacity(256),
            result_payload: BytesMut::new(),
            payload_slots: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.ctx = NativeContext::zeroed();
        self.payload.clear();
        self.result_payload.clear();
        self.payload_slots.clear();
    }

    pub fn context(&self) -> &NativeContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut NativeContext {
        &mut self.ctx
    }

    pub fn num_args(&self) -> usize {
        self.ctx.num_args as usize
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn result_payload(&self) -> &[u8] {
        &self.result_payload
    }

    /// Argument slots holding a [`PayloadRef`] (strings and buffers).
    pub fn payload_slots(&self) -> &[usize] {
        &self.payload_slots
    }

    fn free_arg_slots(&self) -> usize {
        MAX_ARGS - self.num_args()
    }

    fn push_word(&mut self, word: u64) -> Result<(), InvocationError> {
        let n = self.num_args();
        if n >= MAX_ARGS {
            return Err(InvocationError::TooManySlots { max: MAX_ARGS });
        }
        self.ctx.args[n] = word;
        self.ctx.num_args += 1;
        Ok(())
    }

    fn stash(&mut self, bytes: &[u8], nul: bool) -> PayloadRef {
        let offset = self.payload.len() as u32;
        self.payload.put_slice(bytes);
        if nul {
            self.payload.put_u8(0);
        }
        PayloadRef {
            offset,
            len: bytes.len() as u32,
        }
    }

    /// Append one encoded argument.
    pub fn push(&mut self, wire: WireValue<'_>) -> Result<(), InvocationError> {
        match wire {
            WireValue::Word(word) => self.push_word(word),
            WireValue::Vector(words) => {
                if self.free_arg_slots() < 3 {
                    return Err(InvocationError::TooManySlots { max: MAX_ARGS });
                }
                words.into_iter().try_for_each(|w| self.push_word(w))
            }
            WireValue::Text(bytes) => {
                if self.free_arg_slots() < 1 {
                    return Err(InvocationError::TooManySlots { max: MAX_ARGS });
                }
                let r = self.stash(bytes, true);
                self.payload_slots.push(self.num_args());
                self.push_word(r.pack())
            }
            WireValue::Buffer(bytes) => {
                if self.free_arg_slots() < 2 {
                    return Err(InvocationError::TooManySlots { max: MAX_ARGS });
                }
                let r = self.stash(bytes, false);
                self.payload_slots.push(self.num_args());
                self.push_word(r.pack())?;
                self.push_word(bytes.len() as u64)
            }
        }
    }

    // -- host side: reading arguments ------------------------------------

    pub fn arg_word(&self, index: usize) -> Result<u64, DecodeError> {
        if index >= self.num_args() {
            return Err(DecodeError::mismatch(
                format!("argument slot {index}"),
                format!("{} slot(s)", self.num_args()),
            ));
        }
        Ok(self.ctx.args[index])
    }

    pub fn arg_int(&self, index: usize) -> Result<i32, DecodeError> {
        self.arg_word(index).map(decode_i32)
    }

    pub fn arg_handle(&self, index: usize) -> Result<Handle, DecodeError> {
        self.arg_int(index).map(Handle)
    }

    pub fn arg_float(&self, index: usize) -> Result<f32, DecodeError> {
        self.arg_word(index).map(decode_f32)
    }

    pub fn arg_bool(&self, index: usize) -> Result<bool, DecodeError> {
        decode_bool(index, self.arg_word(index)?)
    }

    pub fn arg_vector3(&self, index: usize) -> Result<Vector3, DecodeError> {
        Ok(Vector3::new(
            self.arg_float(index)?,
            self.arg_float(index + 1)?,
            self.arg_float(index + 2)?,
        ))
    }

    pub fn arg_bytes(&self, index: usize) -> Result<&[u8], DecodeError> {
        let word = self.arg_word(index)?;
        let r = PayloadRef::unpack(word)
            .ok_or_else(|| DecodeError::mismatch("payload reference", "null"))?;
        r.slice(&self.payload)
    }

    pub fn arg_str(&self, index: usize) -> Result<&str, DecodeError> {
        std::str::from_utf8(self.arg_bytes(index)?).map_err(|_| DecodeError::InvalidUtf8)
    }

    // -- host side: writing results --------------------------------------

    pub fn push_result_word(&mut self, word: u64) -> Result<(), InvocationError> {
        let n = self.ctx.num_results as usize;
        if n >= MAX_RESULTS {
            return Err(InvocationError::TooManySlots { max: MAX_RESULTS });
        }
        self.ctx.results[n] = word;
        self.ctx.num_results += 1;
        Ok(())
    }

    pub fn push_result_int(&mut self, v: i32) -> Result<(), InvocationError> {
        self.push_result_word(encode_i32(v))
    }

    pub fn push_result_float(&mut self, v: f32) -> Result<(), InvocationError> {
        self.push_result_word(encode_f32(v))
    }

    pub fn push_result_bool(&mut self, v: bool) -> Result<(), InvocationError> {
        self.push_result_word(v as u64)
    }

    pub fn push_result_vector3(&mut self, v: Vector3) -> Result<(), InvocationError> {
        self.push_result_float(v.x)?;
        self.push_result_float(v.y)?;
        self.push_result_float(v.z)
    }

    pub fn push_result_str(&mut self, s: &str) -> Result<(), InvocationError> {
        let r = PayloadRef {
            offset: self.result_payload.len() as u32,
            len: s.len() as u32,
        };
        self.result_payload.put_slice(s.as_bytes());
        self.push_result_word(r.pack())
    }

    pub fn push_result_null_str(&mut self) -> Result<(), InvocationError> {
        self.push_result_word(PayloadRef::NULL_WORD)
    }

    // -- decoding --------------------------------------------------------

    /// Decode the result slots as `shape`. The slot count must match exactly.
    pub fn decode(&self, shape: Shape) -> Result<ReturnValue, DecodeError> {
        let observed = self.ctx.num_results as usize;
        if observed != shape.slot_count() || observed > MAX_RESULTS {
            return Err(DecodeError::mismatch(
                shape,
                format!("{observed} result slot(s)"),
            ));
        }
        let r = &self.ctx.results;
        Ok(match shape {
            Shape::Void => ReturnValue::Void,
            Shape::Int => ReturnValue::Int(decode_i32(r[0])),
            Shape::Float => ReturnValue::Float(decode_f32(r[0])),
            Shape::Bool => ReturnValue::Bool(decode_bool(0, r[0])?),
            Shape::String => match PayloadRef::unpack(r[0]) {
                None => ReturnValue::Nil,
                Some(payload) => {
                    let bytes = payload.slice(&self.result_payload)?;
                    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
                    ReturnValue::Str(text.to_owned())
                }
            },
            Shape::Vector3 => ReturnValue::Vector3(Vector3::new(
                decode_f32(r[0]),
                decode_f32(r[1]),
                decode_f32(r[2]),
            )),
            Shape::Tuple(items) => ReturnValue::Tuple(
                items
                    .iter()
                    .enumerate()
                    .map(|(slot, scalar)| match scalar {
                        Scalar::Int => Ok(ScalarValue::Int(decode_i32(r[slot]))),
                        Scalar::Float => Ok(ScalarValue::Float(decode_f32(r[slot]))),
                        Scalar::Bool => decode_bool(slot, r[slot]).map(ScalarValue::Bool),
                    })
                    .collect::<Result<_, _>>()?,
            ),
        })
    }
}

// ---------------------------------------------------------------------------
// Typed results
// ---------------------------------------------------------------------------

/// Conversion from a decoded [`ReturnValue`] into a wrapper's Rust type.
pub trait FromReturn: Sized {
    fn from_return(value: ReturnValue) -> Result<Self, DecodeError>;
}

impl FromReturn for ReturnValue {
    fn from_return(value: ReturnValue) -> Result<Self, DecodeError> {
        Ok(value)
    }
}

impl FromReturn for () {
    fn from_return(value: ReturnValue) -> Result<Self, DecodeError> {
        match value {
            ReturnValue::Void => Ok(()),
            other => Err(DecodeError::mismatch("void", other.describe())),
        }
    }
}

macro_rules! from_return_scalar {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl FromReturn for $ty {
            fn from_return(value: ReturnValue) -> Result<Self, DecodeError> {
                match value {
                    ReturnValue::$variant(v) => Ok(v),
                    other => Err(DecodeError::mismatch($name, other.describe())),
                }
            }
        }
    };
}

from_return_scalar!(i32, Int, "int");
from_return_scalar!(f32, Float, "float");
from_return_scalar!(bool, Bool, "bool");
from_return_scalar!(String, Str, "string");
from_return_scalar!(Vector3, Vector3, "vector3");

impl FromReturn for Option<String> {
    fn from_return(value: ReturnValue) -> Result<Self, DecodeError> {
        match value {
            ReturnValue::Str(s) => Ok(Some(s)),
            ReturnValue::Nil => Ok(None),
            other => Err(DecodeError::mismatch("string or nil", other.describe())),
        }
    }
}

/// Tuple element conversion.
pub trait FromScalar: Sized {
    fn from_scalar(value: ScalarValue) -> Option<Self>;
}

impl FromScalar for i32 {
    fn from_scalar(value: ScalarValue) -> Option<Self> {
        match value {
            ScalarValue::Int(v) => Some(v),
            _ => None,
        }
    }
}

impl FromScalar for f32 {
    fn from_scalar(value: ScalarValue) -> Option<Self> {
        match value {
            ScalarValue::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl FromScalar for bool {
    fn from_scalar(value: ScalarValue) -> Option<Self> {
        match value {
            ScalarValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

fn tuple_items<const N: usize>(value: ReturnValue) -> Result<[ScalarValue; N], DecodeError> {
    let expected = || format!("tuple of {N}");
    match value {
        ReturnValue::Tuple(items) => <[ScalarValue; N]>::try_from(items)
            .map_err(|items| DecodeError::mismatch(expected(), format!("tuple of {}", items.len()))),
        other => Err(DecodeError::mismatch(expected(), other.describe())),
    }
}

fn scalar<T: FromScalar>(index: usize, value: ScalarValue) -> Result<T, DecodeError> {
    T::from_scalar(value)
        .ok_or_else(|| DecodeError::mismatch(format!("tuple element {index}"), format!("{value:?}")))
}

impl<A: FromScalar, B: FromScalar> FromReturn for (A, B) {
    fn from_return(value: ReturnValue) -> Result<Self, DecodeError> {
        let [a, b] = tuple_items::<2>(value)?;
        Ok((scalar(0, a)?, scalar(1, b)?))
    }
}

impl<A: FromScalar, B: FromScalar, C: FromScalar> FromReturn for (A, B, C) {
    fn from_return(value: ReturnValue) -> Result<Self, DecodeError> {
        let [a, b, c] = tuple_items::<3>(value)?;
        Ok((scalar(0, a)?, scalar(1, b)?, scalar(2, c)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(args: &[Argument<'_>]) -> CallFrame {
        let mut frame = CallFrame::new();
        for arg in args {
            frame.push(arg.encode()).unwrap();
        }
        frame
    }

    #[test]
    fn test_scalars_survive_the_buffer() {
        let frame = frame_with(&[
            Argument::Int(-7),
            Argument::Float(1.5),
            Argument::Bool(true),
            Argument::Handle(Handle(42)),
        ]);
        assert_eq!(frame.num_args(), 4);
        assert_eq!(frame.arg_int(0).unwrap(), -7);
        assert_eq!(frame.arg_float(1).unwrap(), 1.5);
        assert!(frame.arg_bool(2).unwrap());
        assert_eq!(frame.arg_handle(3).unwrap(), Handle(42));
    }

    #[test]
    fn test_vector3_takes_three_float_slots() {
        let frame = frame_with(&[Argument::Vector3(Vector3::new(1.0, -2.0, 3.25)), Argument::Int(9)]);
        assert_eq!(frame.num_args(), 4);
        assert_eq!(frame.arg_float(1).unwrap(), -2.0);
        assert_eq!(frame.arg_vector3(0).unwrap(), Vector3::new(1.0, -2.0, 3.25));
        assert_eq!(frame.arg_int(3).unwrap(), 9);
    }

    #[test]
    fn test_buffer_gets_length_companion() {
        let body: &[u8] = &[0x00, 0xFF, 0x10];
        let frame = frame_with(&[Argument::from("name"), Argument::from(body), Argument::Bool(false)]);
        // string: 1 slot, buffer: 2 slots, bool: 1 slot
        assert_eq!(frame.num_args(), 4);
        assert_eq!(frame.arg_str(0).unwrap(), "name");
        assert_eq!(frame.arg_bytes(1).unwrap(), body);
        assert_eq!(frame.arg_int(2).unwrap(), 3);
        assert_eq!(frame.payload_slots(), &[0, 1]);
        // text is NUL-terminated in the arena, the reference length excludes it
        assert_eq!(&frame.payload()[..5], b"name\0");
    }

    #[test]
    fn test_slot_overflow_is_an_error() {
        let mut frame = CallFrame::new();
        for _ in 0..MAX_ARGS - 2 {
            frame.push(Argument::Int(0).encode()).unwrap();
        }
        let err = frame
            .push(Argument::Vector3(Vector3::default()).encode())
            .unwrap_err();
        assert!(matches!(err, InvocationError::TooManySlots { max: MAX_ARGS }));
        // a two-slot buffer still fits
        frame.push(Argument::from(&b"ab"[..]).encode()).unwrap();
        assert_eq!(frame.num_args(), MAX_ARGS);
    }

    #[test]
    fn test_rejected_payload_leaves_frame_untouched() {
        let mut frame = CallFrame::new();
        for _ in 0..MAX_ARGS - 1 {
            frame.push(Argument::Int(0).encode()).unwrap();
        }
        let err = frame.push(Argument::from(&b"xy"[..]).encode()).unwrap_err();
        assert!(matches!(err, InvocationError::TooManySlots { .. }));
        assert!(frame.payload().is_empty());
        assert!(frame.payload_slots().is_empty());

        frame.push(Argument::Int(0).encode()).unwrap();
        let err = frame.push(Argument::from("late").encode()).unwrap_err();
        assert!(matches!(err, InvocationError::TooManySlots { .. }));
        assert!(frame.payload().is_empty());
        assert!(frame.payload_slots().is_empty());
        assert_eq!(frame.num_args(), MAX_ARGS);
    }

    #[test]
    fn test_decode_each_shape() {
        let mut frame = CallFrame::new();
        frame.push_result_str("héllo").unwrap();
        assert_eq!(frame.decode(Shape::String).unwrap(), ReturnValue::Str("héllo".into()));

        frame.reset();
        frame.push_result_null_str().unwrap();
        assert_eq!(frame.decode(Shape::String).unwrap(), ReturnValue::Nil);

        frame.reset();
        frame.push_result_vector3(Vector3::new(4.0, 5.0, 6.0)).unwrap();
        assert_eq!(
            frame.decode(Shape::Vector3).unwrap(),
            ReturnValue::Vector3(Vector3::new(4.0, 5.0, 6.0))
        );

        frame.reset();
        frame.push_result_int(12).unwrap();
        frame.push_result_int(-1).unwrap();
        let colours: (i32, i32) =
            FromReturn::from_return(frame.decode(Shape::Tuple(&[Scalar::Int, Scalar::Int])).unwrap())
                .unwrap();
        assert_eq!(colours, (12, -1));
    }

    #[test]
    fn test_tuple_arity_mismatch_is_fatal() {
        let mut frame = CallFrame::new();
        frame.push_result_bool(true).unwrap();
        frame.push_result_bool(false).unwrap();
        let err = frame
            .decode(Shape::Tuple(&[Scalar::Bool, Scalar::Bool, Scalar::Bool]))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("(bool, bool, bool)"), "{msg}");
        assert!(msg.contains("2 result slot(s)"), "{msg}");
    }

    #[test]
    fn test_boolean_words_are_strict() {
        let mut frame = CallFrame::new();
        frame.push_result_word(7).unwrap();
        assert!(matches!(
            frame.decode(Shape::Bool),
            Err(DecodeError::NotABoolean { slot: 0, raw: 7 })
        ));
    }

    #[test]
    fn test_typed_conversion_rejects_wrong_variant() {
        assert!(i32::from_return(ReturnValue::Float(1.0)).is_err());
        assert!(String::from_return(ReturnValue::Nil).is_err());
        assert_eq!(Option::<String>::from_return(ReturnValue::Nil).unwrap(), None);
        assert!(<(bool, bool)>::from_return(ReturnValue::Tuple(vec![ScalarValue::Bool(true)])).is_err());
    }

    #[test]
    fn test_out_of_range_payload_reference() {
        let mut frame = CallFrame::new();
        frame
            .push_result_word(PayloadRef { offset: 10, len: 4 }.pack())
            .unwrap();
        assert!(matches!(
            frame.decode(Shape::String),
            Err(DecodeError::PayloadOutOfRange { .. })
        ));
    }
}
