//! Engine object handles and the wrapper types that carry them.

use std::fmt;

use crate::codec::{FromReturn, ReturnValue, Value};
use crate::error::{DecodeError, InvalidHandleError};

/// Canonical engine handle. Zero and negative values usually mean "none";
/// the native being called has the final say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Handle(pub i32);

impl Handle {
    pub const NONE: Handle = Handle(0);

    pub const fn raw(self) -> i32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for Handle {
    fn from(v: i32) -> Self {
        Handle(v)
    }
}

impl FromReturn for Handle {
    fn from_return(value: ReturnValue) -> Result<Self, DecodeError> {
        match value {
            ReturnValue::Int(v) => Ok(Handle(v)),
            other => Err(DecodeError::mismatch("handle", other.describe())),
        }
    }
}

/// Event target meaning "every connected client".
pub const ALL_CLIENTS: Handle = Handle(-1);

/// Anything that can stand where a native declares a handle.
pub trait HandleBearing {
    fn handle(&self) -> Result<Handle, InvalidHandleError>;
}

impl HandleBearing for Handle {
    fn handle(&self) -> Result<Handle, InvalidHandleError> {
        Ok(*self)
    }
}

impl HandleBearing for i32 {
    fn handle(&self) -> Result<Handle, InvalidHandleError> {
        Ok(Handle(*self))
    }
}

/// Player sources arrive as decimal strings.
impl HandleBearing for str {
    fn handle(&self) -> Result<Handle, InvalidHandleError> {
        self.trim()
            .parse::<i32>()
            .map(Handle)
            .map_err(|_| InvalidHandleError::new(format!("'{self}' is not a numeric handle")))
    }
}

impl HandleBearing for String {
    fn handle(&self) -> Result<Handle, InvalidHandleError> {
        self.as_str().handle()
    }
}

impl HandleBearing for Value {
    fn handle(&self) -> Result<Handle, InvalidHandleError> {
        match self {
            Value::Int(i) => i32::try_from(*i)
                .map(Handle)
                .map_err(|_| InvalidHandleError::new(format!("{i} is out of handle range"))),
            Value::Float(f) if f.fract() == 0.0 && *f >= i32::MIN as f64 && *f <= i32::MAX as f64 => {
                Ok(Handle(*f as i32))
            }
            Value::Str(s) => s.handle(),
            Value::Map(_) => match self.get("handle") {
                Some(inner @ (Value::Int(_) | Value::Float(_) | Value::Str(_))) => inner.handle(),
                Some(other) => Err(InvalidHandleError::new(format!(
                    "wrapper 'handle' field is a {}",
                    other.type_name()
                ))),
                None => Err(InvalidHandleError::new("wrapper has no 'handle' field")),
            },
            other => Err(InvalidHandleError::new(format!(
                "a {} cannot be used as a handle",
                other.type_name()
            ))),
        }
    }
}

impl<T: HandleBearing + ?Sized> HandleBearing for &T {
    fn handle(&self) -> Result<Handle, InvalidHandleError> {
        (**self).handle()
    }
}

/// The single resolution point used by every wrapper.
pub fn resolve<T: HandleBearing + ?Sized>(value: &T) -> Result<Handle, InvalidHandleError> {
    value.handle()
}

macro_rules! handle_wrapper {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Handle);

        impl $name {
            pub const fn new(handle: Handle) -> Self {
                Self(handle)
            }

            pub const fn raw(self) -> i32 {
                self.0 .0
            }
        }

        impl From<Handle> for $name {
            fn from(h: Handle) -> Self {
                Self(h)
            }
        }

        impl From<i32> for $name {
            fn from(v: i32) -> Self {
                Self(Handle(v))
            }
        }

        impl HandleBearing for $name {
            fn handle(&self) -> Result<Handle, InvalidHandleError> {
                Ok(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    )+};
}

handle_wrapper!(
    /// Any world entity.
    Entity,
    Ped,
    Vehicle,
    Object,
    /// A connected player (server id), not their ped.
    Player,
    /// Map marker.
    Blip,
);

macro_rules! is_entity {
    ($($name:ident),+) => {$(
        impl From<$name> for Entity {
            fn from(v: $name) -> Self {
                Entity(v.0)
            }
        }
    )+};
}

is_entity!(Ped, Vehicle, Object);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_integer_is_identity() {
        for raw in [-1, 0, 1, 42, i32::MAX] {
            assert_eq!(resolve(&raw).unwrap(), Handle(raw));
        }
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let v = Vehicle::from(77);
        let once = resolve(&v).unwrap();
        assert_eq!(resolve(&once).unwrap(), once);
        assert_eq!(resolve(&Entity::from(v)).unwrap(), once);
    }

    #[test]
    fn test_string_sources() {
        assert_eq!(resolve("12").unwrap(), Handle(12));
        assert_eq!(resolve(&String::from(" 3 ")).unwrap(), Handle(3));
        assert!(resolve("net:12").is_err());
    }

    #[test]
    fn test_value_wrappers() {
        let wrapper = Value::Map(vec![(Value::from("handle"), Value::Int(9))]);
        assert_eq!(resolve(&wrapper).unwrap(), Handle(9));

        let empty = Value::Map(vec![(Value::from("id"), Value::Int(9))]);
        let err = resolve(&empty).unwrap_err();
        assert!(err.reason.contains("no 'handle' field"), "{err}");

        assert!(resolve(&Value::Int(i64::MAX)).is_err());
        assert!(resolve(&Value::Bool(true)).is_err());
    }

    #[test]
    fn test_wrapper_display() {
        assert_eq!(Ped::from(5).to_string(), "Ped(5)");
        assert_eq!(Player::from(1).raw(), 1);
    }
}
