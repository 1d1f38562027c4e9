//! Native declarations and their typed wrappers.
//!
//! Each namespace module is a single [`natives!`] table. A row such as
//!
//! ```text
//! 0x1647F1CB => GET_ENTITY_COORDS: fn get_entity_coords(entity: handle) -> vec3;
//! ```
//!
//! produces the `GET_ENTITY_COORDS` [`NativeDef`] constant and a wrapper
//! `get_entity_coords(&mut Invoker<H>, impl HandleBearing) -> Result<Vector3>`.
//!
//! Argument kinds: `int`, `float`, `bool`, `str`, `bytes`, `vec3`, `handle`.
//! Result kinds: none, `int`, `float`, `bool`, `string`, `opt_string`, `vec3`,
//! `handle`, `int2`, `int3`, `bool2`, `bool3`.

use crate::codec::{ArgKind, Shape};
use crate::invoker::NativeId;

/// One native: hash, canonical name and fixed signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeDef {
    pub id: NativeId,
    /// Canonical `UPPER_SNAKE` name.
    pub name: &'static str,
    pub namespace: &'static str,
    /// Wrapper function name inside the namespace.
    pub method: &'static str,
    pub args: &'static [ArgKind],
    pub ret: Shape,
}

impl NativeDef {
    /// Argument slots a call to this native fills.
    pub fn slot_count(&self) -> usize {
        self.args.iter().map(|k| k.slot_count()).sum()
    }
}

macro_rules! arg_kind {
    (int) => { $crate::codec::ArgKind::Int };
    (float) => { $crate::codec::ArgKind::Float };
    (bool) => { $crate::codec::ArgKind::Bool };
    (str) => { $crate::codec::ArgKind::Str };
    (bytes) => { $crate::codec::ArgKind::Bytes };
    (vec3) => { $crate::codec::ArgKind::Vector3 };
    (handle) => { $crate::codec::ArgKind::Handle };
}

macro_rules! arg_type {
    (int) => { i32 };
    (float) => { f32 };
    (bool) => { bool };
    (str) => { &str };
    (bytes) => { &[u8] };
    (vec3) => { $crate::codec::Vector3 };
    (handle) => { impl $crate::handle::HandleBearing };
}

macro_rules! to_arg {
    (int, $v:expr) => { $crate::codec::Argument::Int($v) };
    (float, $v:expr) => { $crate::codec::Argument::Float($v) };
    (bool, $v:expr) => { $crate::codec::Argument::Bool($v) };
    (str, $v:expr) => { $crate::codec::Argument::from($v) };
    (bytes, $v:expr) => { $crate::codec::Argument::from($v) };
    (vec3, $v:expr) => { $crate::codec::Argument::Vector3($v) };
    (handle, $v:expr) => { $crate::codec::Argument::Handle($crate::handle::resolve(&$v)?) };
}

macro_rules! ret_shape {
    () => { $crate::codec::Shape::Void };
    (int) => { $crate::codec::Shape::Int };
    (float) => { $crate::codec::Shape::Float };
    (bool) => { $crate::codec::Shape::Bool };
    (string) => { $crate::codec::Shape::String };
    (opt_string) => { $crate::codec::Shape::String };
    (vec3) => { $crate::codec::Shape::Vector3 };
    (handle) => { $crate::codec::Shape::Int };
    (int2) => { $crate::codec::Shape::Tuple(&[$crate::codec::Scalar::Int; 2]) };
    (int3) => { $crate::codec::Shape::Tuple(&[$crate::codec::Scalar::Int; 3]) };
    (bool2) => { $crate::codec::Shape::Tuple(&[$crate::codec::Scalar::Bool; 2]) };
    (bool3) => { $crate::codec::Shape::Tuple(&[$crate::codec::Scalar::Bool; 3]) };
}

macro_rules! ret_type {
    () => { () };
    (int) => { i32 };
    (float) => { f32 };
    (bool) => { bool };
    (string) => { String };
    (opt_string) => { Option<String> };
    (vec3) => { $crate::codec::Vector3 };
    (handle) => { $crate::handle::Handle };
    (int2) => { (i32, i32) };
    (int3) => { (i32, i32, i32) };
    (bool2) => { (bool, bool) };
    (bool3) => { (bool, bool, bool) };
}

macro_rules! natives {
    (
        namespace $ns:literal;
        $(
            $(#[$meta:meta])*
            $hash:literal => $name:ident : fn $method:ident ( $($arg:ident : $kind:ident),* $(,)? ) $(-> $ret:ident)? ;
        )*
    ) => {
        $(
            $(#[$meta])*
            pub const $name: $crate::natives::NativeDef = $crate::natives::NativeDef {
                id: $crate::invoker::NativeId($hash),
                name: stringify!($name),
                namespace: $ns,
                method: stringify!($method),
                args: &[$(arg_kind!($kind)),*],
                ret: ret_shape!($($ret)?),
            };

            $(#[$meta])*
            pub fn $method<H: $crate::invoker::NativeHost>(
                invoker: &mut $crate::invoker::Invoker<H>,
                $($arg: arg_type!($kind),)*
            ) -> $crate::error::Result<ret_type!($($ret)?)> {
                let args: &[$crate::codec::Argument<'_>] = &[$(to_arg!($kind, $arg)),*];
                let value = invoker.invoke($name.id, args, $name.ret)?;
                Ok(<ret_type!($($ret)?) as $crate::codec::FromReturn>::from_return(value)?)
            }
        )*

        /// Every declaration in this namespace.
        pub const DEFS: &[$crate::natives::NativeDef] = &[$($name),*];
    };
}

pub mod compat;
pub mod convar;
pub mod entity;
pub mod event;
pub mod http;
pub mod kvp;
pub mod ped;
pub mod player;
pub mod resource;
pub mod state_bag;
pub mod task;
pub mod vehicle;

/// Every namespace, in the order scripts see them.
pub const ALL: &[&[NativeDef]] = &[
    kvp::DEFS,
    convar::DEFS,
    resource::DEFS,
    entity::DEFS,
    player::DEFS,
    ped::DEFS,
    vehicle::DEFS,
    task::DEFS,
    event::DEFS,
    state_bag::DEFS,
    http::DEFS,
];

/// Look a declaration up by canonical name across [`ALL`].
pub fn find(name: &str) -> Option<&'static NativeDef> {
    ALL.iter().flat_map(|ns| ns.iter()).find(|def| def.name == name)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::codec::MAX_ARGS;

    #[test]
    fn test_hashes_and_names_are_unique() {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for def in ALL.iter().flat_map(|ns| ns.iter()) {
            assert!(ids.insert(def.id), "duplicate hash {}", def.id);
            assert!(names.insert(def.name), "duplicate name {}", def.name);
        }
    }

    #[test]
    fn test_every_declaration_fits_the_call_buffer() {
        for def in ALL.iter().flat_map(|ns| ns.iter()) {
            assert!(def.slot_count() <= MAX_ARGS, "{} needs {} slots", def.name, def.slot_count());
            assert!(def.ret.slot_count() <= crate::codec::MAX_RESULTS);
        }
    }

    #[test]
    fn test_generated_declaration() {
        let def = entity::SET_ENTITY_COORDS;
        assert_eq!(def.namespace, "entity");
        assert_eq!(def.method, "set_entity_coords");
        assert_eq!(def.ret, Shape::Void);
        // handle + vec3 + four flags
        assert_eq!(def.slot_count(), 1 + 3 + 4);
        assert_eq!(find("GET_VEHICLE_COLOURS").map(|d| d.ret.slot_count()), Some(2));
    }
}
