//! Native tables for scripts.
//!
//! Every declaration is reachable as `<namespace>.<method>(...)` and under
//! its legacy flat name, e.g. `entity.get_entity_coords(ped)` and
//! `GetEntityCoords(ped)`.

use std::rc::Rc;

use mlua::{Function, Lua, Table, Variadic};

use crate::invoker::NativeHost;
use crate::natives::{self, compat, NativeDef};
use crate::resource::Resource;
use crate::scripting::convert;

type LuaValue = mlua::Value;

fn native_function<H: NativeHost + 'static>(
    lua: &Lua,
    resource: &Rc<Resource<H>>,
    def: &'static NativeDef,
) -> mlua::Result<Function> {
    let res = Rc::clone(resource);
    lua.create_function(move |lua, args: Variadic<LuaValue>| {
        let args = convert::to_arguments(lua, def, args)?;
        let value = res
            .call(|inv| inv.invoke(def.id, &args, def.ret))
            .map_err(mlua::Error::external)?;
        convert::return_to_lua(lua, value)
    })
}

pub fn register<H: NativeHost + 'static>(lua: &Lua, resource: &Rc<Resource<H>>) -> mlua::Result<()> {
    let g = lua.globals();

    for defs in natives::ALL {
        for def in defs.iter() {
            let ns: Table = match g.get::<Option<Table>>(def.namespace)? {
                Some(t) => t,
                None => {
                    let t = lua.create_table()?;
                    g.set(def.namespace, t.clone())?;
                    t
                }
            };
            let f = native_function(lua, resource, def)?;
            ns.set(def.method, f.clone())?;
            g.set(compat::legacy_name(def), f)?;
        }
    }

    tracing::debug!(
        "[scripting] registered {} natives",
        natives::ALL.iter().map(|d| d.len()).sum::<usize>()
    );
    Ok(())
}
