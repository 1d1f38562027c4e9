//! Conversions between Lua values and bridge values.

use std::borrow::Cow;

use mlua::{FromLua, IntoLua, Lua, MetaMethod, UserData, UserDataFields, UserDataMethods, Variadic};

use crate::codec::{ArgKind, Argument, ReturnValue, ScalarValue, Value, Vector3};
use crate::error::InvocationError;
use crate::handle::resolve;
use crate::natives::NativeDef;

type LuaValue = mlua::Value;

// ---------------------------------------------------------------------------
// vector3 userdata
// ---------------------------------------------------------------------------

impl UserData for Vector3 {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_field_method_get("x", |_, v| Ok(v.x));
        fields.add_field_method_get("y", |_, v| Ok(v.y));
        fields.add_field_method_get("z", |_, v| Ok(v.z));
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::ToString, |_, v, ()| Ok(v.to_string()));
        methods.add_meta_method(MetaMethod::Eq, |_, v, other: Vector3| Ok(*v == other));
        methods.add_meta_method(MetaMethod::Add, |_, v, o: Vector3| {
            Ok(Vector3::new(v.x + o.x, v.y + o.y, v.z + o.z))
        });
        methods.add_meta_method(MetaMethod::Sub, |_, v, o: Vector3| {
            Ok(Vector3::new(v.x - o.x, v.y - o.y, v.z - o.z))
        });
        methods.add_method("length", |_, v, ()| {
            Ok((v.x * v.x + v.y * v.y + v.z * v.z).sqrt())
        });
    }
}

impl FromLua for Vector3 {
    fn from_lua(value: LuaValue, _: &Lua) -> mlua::Result<Self> {
        match value {
            LuaValue::UserData(ud) => Ok(*ud.borrow::<Vector3>()?),
            LuaValue::Table(t) => Ok(Vector3::new(t.get("x")?, t.get("y")?, t.get("z")?)),
            other => Err(mlua::Error::runtime(format!(
                "expected vector3, got {}",
                other.type_name()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Value <-> Lua
// ---------------------------------------------------------------------------

impl IntoLua for Value {
    fn into_lua(self, lua: &Lua) -> mlua::Result<LuaValue> {
        Ok(match self {
            Value::Nil => LuaValue::Nil,
            Value::Bool(b) => LuaValue::Boolean(b),
            Value::Int(i) => LuaValue::Integer(i as mlua::Integer),
            Value::Float(f) => LuaValue::Number(f),
            Value::Str(s) => LuaValue::String(lua.create_string(&s)?),
            Value::Bytes(b) => LuaValue::String(lua.create_string(&b)?),
            Value::Vector3(v) => LuaValue::UserData(lua.create_userdata(v)?),
            Value::List(items) => LuaValue::Table(lua.create_sequence_from(items)?),
            Value::Map(entries) => {
                let table = lua.create_table_with_capacity(0, entries.len())?;
                for (k, v) in entries {
                    // Lua tables cannot hold a nil key
                    if !k.is_nil() {
                        table.raw_set(k, v)?;
                    }
                }
                LuaValue::Table(table)
            }
        })
    }
}

impl FromLua for Value {
    fn from_lua(value: LuaValue, lua: &Lua) -> mlua::Result<Self> {
        match value {
            LuaValue::Nil => Ok(Value::Nil),
            LuaValue::Boolean(b) => Ok(Value::Bool(b)),
            LuaValue::Integer(i) => Ok(Value::Int(i as i64)),
            LuaValue::Number(n) => Ok(Value::Float(n)),
            LuaValue::String(s) => Ok(match s.to_str() {
                Ok(text) => Value::Str(text.to_string()),
                Err(_) => Value::Bytes(s.as_bytes().to_vec()),
            }),
            LuaValue::UserData(ud) if ud.is::<Vector3>() => Ok(Value::Vector3(*ud.borrow::<Vector3>()?)),
            LuaValue::Table(t) => {
                let len = t.raw_len();
                let mut entries = Vec::new();
                for pair in t.pairs::<LuaValue, LuaValue>() {
                    let (k, v) = pair?;
                    entries.push((Value::from_lua(k, lua)?, Value::from_lua(v, lua)?));
                }
                let is_sequence = entries.len() == len
                    && entries
                        .iter()
                        .all(|(k, _)| matches!(k, Value::Int(i) if *i >= 1 && *i as usize <= len));
                if is_sequence {
                    entries.sort_by_key(|(k, _)| k.as_i64());
                    Ok(Value::List(entries.into_iter().map(|(_, v)| v).collect()))
                } else {
                    Ok(Value::Map(entries))
                }
            }
            other => Err(mlua::Error::runtime(format!(
                "cannot send a {} across the bridge",
                other.type_name()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Native arguments and results
// ---------------------------------------------------------------------------

fn kind_error(def: &NativeDef, index: usize, expected: ArgKind, got: &LuaValue) -> mlua::Error {
    mlua::Error::external(InvocationError::ArgumentType {
        native: def.name,
        index,
        expected,
        got: got.type_name(),
    })
}

fn lua_int(value: &LuaValue) -> Option<i64> {
    match value {
        LuaValue::Integer(i) => Some(*i as i64),
        LuaValue::Number(n) if n.fract() == 0.0 => Some(*n as i64),
        _ => None,
    }
}

/// Convert one Lua argument to the kind `def` declares at `index`.
pub fn to_argument(
    lua: &Lua,
    def: &NativeDef,
    index: usize,
    value: LuaValue,
) -> mlua::Result<Argument<'static>> {
    let kind = def.args[index];
    let arg = match (kind, &value) {
        (ArgKind::Int, v) => {
            let n = lua_int(v).ok_or_else(|| kind_error(def, index, kind, v))?;
            Argument::Int(i32::try_from(n).map_err(|_| kind_error(def, index, kind, v))?)
        }
        (ArgKind::Float, LuaValue::Integer(i)) => Argument::Float(*i as f32),
        (ArgKind::Float, LuaValue::Number(n)) => Argument::Float(*n as f32),
        (ArgKind::Bool, LuaValue::Boolean(b)) => Argument::Bool(*b),
        (ArgKind::Str, LuaValue::String(s)) => Argument::Str(Cow::Owned(s.to_str()?.to_string())),
        (ArgKind::Bytes, LuaValue::String(s)) => Argument::Bytes(Cow::Owned(s.as_bytes().to_vec())),
        (ArgKind::Vector3, LuaValue::UserData(_) | LuaValue::Table(_)) => {
            Argument::Vector3(Vector3::from_lua(value.clone(), lua)?)
        }
        (ArgKind::Handle, _) => {
            let v = Value::from_lua(value.clone(), lua)?;
            Argument::Handle(resolve(&v).map_err(mlua::Error::external)?)
        }
        (kind, v) => return Err(kind_error(def, index, kind, v)),
    };
    Ok(arg)
}

/// Convert a full Lua argument list for `def`.
pub fn to_arguments(
    lua: &Lua,
    def: &NativeDef,
    args: Variadic<LuaValue>,
) -> mlua::Result<Vec<Argument<'static>>> {
    if args.len() != def.args.len() {
        return Err(mlua::Error::external(InvocationError::Arity {
            native: def.name,
            expected: def.args.len(),
            got: args.len(),
        }));
    }
    args.iter()
        .cloned()
        .enumerate()
        .map(|(i, v)| to_argument(lua, def, i, v))
        .collect()
}

fn scalar_to_lua(s: ScalarValue) -> LuaValue {
    match s {
        ScalarValue::Int(i) => LuaValue::Integer(i as mlua::Integer),
        ScalarValue::Float(f) => LuaValue::Number(f as f64),
        ScalarValue::Bool(b) => LuaValue::Boolean(b),
    }
}

/// Tuples become multiple return values; `Void` returns nothing.
pub fn return_to_lua(lua: &Lua, value: ReturnValue) -> mlua::Result<Variadic<LuaValue>> {
    let single = match value {
        ReturnValue::Void => return Ok(Variadic::new()),
        ReturnValue::Tuple(items) => return Ok(items.into_iter().map(scalar_to_lua).collect()),
        ReturnValue::Nil => LuaValue::Nil,
        ReturnValue::Int(i) => LuaValue::Integer(i as mlua::Integer),
        ReturnValue::Float(f) => LuaValue::Number(f as f64),
        ReturnValue::Bool(b) => LuaValue::Boolean(b),
        ReturnValue::Str(s) => LuaValue::String(lua.create_string(&s)?),
        ReturnValue::Vector3(v) => LuaValue::UserData(lua.create_userdata(v)?),
    };
    Ok(std::iter::once(single).collect())
}
