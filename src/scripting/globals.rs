//! Global Lua functions: events, state bags, convars, raw invocation.

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::rc::{Rc, Weak};

use mlua::{Function, Lua, Variadic};

use crate::codec::{Value, Vector3};
use crate::convar;
use crate::events::{self, EventHandler, Scope};
use crate::invoker::{NativeHost, NativeId};
use crate::state_bag;
use crate::subscription::Cookie;
use crate::resource::Resource;
use crate::scripting::convert;

type LuaValue = mlua::Value;

/// Lua function registered as an event handler, remembered so that
/// `off(name, fn)` can find the handler that wraps it.
struct Binding {
    id: u64,
    scope: Scope,
    key: String,
    function: *const c_void,
    handler: EventHandler,
}

/// Lua-side registrations owned by one script host.
#[derive(Default)]
pub struct Bindings {
    events: RefCell<Vec<Binding>>,
    next_id: Cell<u64>,
}

impl Bindings {
    fn allocate(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn remember(&self, id: u64, scope: Scope, key: &str, function: &Function, handler: &EventHandler) {
        self.events.borrow_mut().push(Binding {
            id,
            scope,
            key: key.to_string(),
            function: function.to_pointer(),
            handler: Rc::clone(handler),
        });
    }

    /// Most recent binding of `function` under (`scope`, `key`).
    fn take(&self, scope: Scope, key: &str, function: &Function) -> Option<EventHandler> {
        let ptr = function.to_pointer();
        let mut events = self.events.borrow_mut();
        let pos = events
            .iter()
            .rposition(|b| b.scope == scope && b.key == key && b.function == ptr)?;
        Some(events.remove(pos).handler)
    }

    /// Drop the binding of a one-shot handler that has been claimed.
    fn forget(&self, id: u64) {
        self.events.borrow_mut().retain(|b| b.id != id);
    }

    fn forget_key(&self, key: Option<&str>) {
        self.events
            .borrow_mut()
            .retain(|b| key.is_some_and(|k| b.key != k));
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

fn lua_event_handler(function: Function) -> EventHandler {
    events::handler(move |_, args| {
        function
            .call::<()>(args.iter().cloned().collect::<Variadic<Value>>())
            .map_err(|e| anyhow::anyhow!("{e}"))
    })
}

/// One-shot wrapper: releases its own binding before the Lua function runs,
/// so a later `off` can only find live registrations.
fn lua_once_handler(function: Function, bindings: Weak<Bindings>, id: u64) -> EventHandler {
    events::handler(move |_, args| {
        if let Some(bindings) = bindings.upgrade() {
            bindings.forget(id);
        }
        function
            .call::<()>(args.iter().cloned().collect::<Variadic<Value>>())
            .map_err(|e| anyhow::anyhow!("{e}"))
    })
}

fn external(e: impl Into<crate::error::BridgeError>) -> mlua::Error {
    mlua::Error::external(e.into())
}

/// Register every global on `lua`.
pub fn register<H: NativeHost + 'static>(
    lua: &Lua,
    resource: &Rc<Resource<H>>,
    bindings: &Rc<Bindings>,
) -> mlua::Result<()> {
    let g = lua.globals();

    // -----------------------------------------------------------------------
    // Logging
    // -----------------------------------------------------------------------
    let name = resource.name().to_string();
    g.set("print", lua.create_function(move |lua, args: Variadic<LuaValue>| {
        let tostring: Function = lua.globals().get("tostring")?;
        let mut parts = Vec::with_capacity(args.len());
        for v in args.iter() {
            parts.push(tostring.call::<String>(v.clone())?);
        }
        tracing::info!("[scripting] {name}: {}", parts.join("\t"));
        Ok(())
    })?)?;

    g.set("vector3", lua.create_function(|_, (x, y, z): (f32, f32, f32)| {
        Ok(Vector3::new(x, y, z))
    })?)?;

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------
    for (global, scope, one_shot) in [
        ("on", Scope::Local, false),
        ("once", Scope::Local, true),
        ("onClient", Scope::Client, false),
        ("onceClient", Scope::Client, true),
    ] {
        let res = Rc::clone(resource);
        let b = Rc::clone(bindings);
        g.set(global, lua.create_function(move |_, (key, f): (String, Function)| {
            let id = b.allocate();
            let handler = if one_shot {
                lua_once_handler(f.clone(), Rc::downgrade(&b), id)
            } else {
                lua_event_handler(f.clone())
            };
            b.remember(id, scope, &key, &f, &handler);
            let events = res.events();
            match (scope, one_shot) {
                (Scope::Local, false) => events.on(&key, handler),
                (Scope::Local, true) => events.once(&key, handler),
                (Scope::Client, false) => events.on_client(&key, handler),
                (Scope::Client, true) => events.once_client(&key, handler),
            }
            Ok(())
        })?)?;
    }

    for (global, scope) in [("off", Scope::Local), ("offClient", Scope::Client)] {
        let res = Rc::clone(resource);
        let b = Rc::clone(bindings);
        g.set(global, lua.create_function(move |_, (key, f): (String, Function)| {
            let Some(handler) = b.take(scope, &key, &f) else {
                return Ok(false);
            };
            Ok(match scope {
                Scope::Local => res.events().off(&key, &handler),
                Scope::Client => res.events().off_client(&key, &handler),
            })
        })?)?;
    }

    let res = Rc::clone(resource);
    let b = Rc::clone(bindings);
    g.set("removeAllListeners", lua.create_function(move |_, key: Option<String>| {
        res.events().remove_all_listeners(key.as_deref());
        b.forget_key(key.as_deref());
        Ok(())
    })?)?;

    let res = Rc::clone(resource);
    g.set("emit", lua.create_function(move |_, (key, args): (String, Variadic<Value>)| {
        let outcome = res.emit(&key, &args).map_err(external)?;
        Ok(outcome.canceled)
    })?)?;

    let res = Rc::clone(resource);
    g.set("emitClient", lua.create_function(move |_, (key, target, args): (String, Value, Variadic<Value>)| {
        res.emit_client(&key, target, &args).map_err(external)
    })?)?;

    let res = Rc::clone(resource);
    g.set("cancelEvent", lua.create_function(move |_, ()| {
        res.events().cancel_event().map_err(external)
    })?)?;

    let res = Rc::clone(resource);
    g.set("wasEventCanceled", lua.create_function(move |_, ()| {
        res.events().was_event_canceled().map_err(external)
    })?)?;

    let res = Rc::clone(resource);
    g.set("getEventSource", lua.create_function(move |_, ()| {
        let source = res.events().event_source().map_err(external)?;
        Ok(source.map(|h| h.raw()))
    })?)?;

    // -----------------------------------------------------------------------
    // State bags
    // -----------------------------------------------------------------------
    let res = Rc::clone(resource);
    g.set("addStateBagChangeHandler", lua.create_function(
        move |_, (key_filter, bag_filter, f): (Option<String>, Option<String>, Function)| {
            let cookie = res.state_bags().add_change_handler(
                key_filter.as_deref().unwrap_or(""),
                bag_filter.as_deref().unwrap_or(""),
                state_bag::handler(move |_, change| {
                    f.call::<()>((
                        change.bag_name.as_str(),
                        change.key.as_str(),
                        change.value.clone(),
                        0,
                        change.replicated,
                    ))
                    .map_err(|e| anyhow::anyhow!("{e}"))
                }),
            );
            Ok(cookie.0)
        },
    )?)?;

    let res = Rc::clone(resource);
    g.set("removeStateBagChangeHandler", lua.create_function(move |_, cookie: i32| {
        Ok(res.state_bags().remove_change_handler(Cookie(cookie)))
    })?)?;

    let res = Rc::clone(resource);
    g.set("setStateBagValue", lua.create_function(
        move |_, (bag, key, value, replicated): (String, String, Value, Option<bool>)| {
            res.set_state_bag_value(&bag, &key, &value, replicated.unwrap_or(true))
                .map_err(external)
        },
    )?)?;

    let res = Rc::clone(resource);
    g.set("getStateBagValue", lua.create_function(move |_, (bag, key): (String, String)| {
        Ok(res.state_bag_value(&bag, &key).unwrap_or(Value::Nil))
    })?)?;

    // -----------------------------------------------------------------------
    // Convars
    // -----------------------------------------------------------------------
    let res = Rc::clone(resource);
    g.set("addConvarChangeListener", lua.create_function(
        move |_, (filter, f): (Option<String>, Function)| {
            let cookie = res.add_convar_change_listener(
                filter.as_deref().unwrap_or(""),
                convar::listener(move |name| {
                    f.call::<()>((name, LuaValue::Nil))
                        .map_err(|e| anyhow::anyhow!("{e}"))
                }),
            );
            Ok(cookie.0)
        },
    )?)?;

    let res = Rc::clone(resource);
    g.set("removeConvarChangeListener", lua.create_function(move |_, cookie: i32| {
        Ok(res.remove_convar_change_listener(Cookie(cookie)))
    })?)?;

    // -----------------------------------------------------------------------
    // Raw invocation by hash
    // -----------------------------------------------------------------------
    let res = Rc::clone(resource);
    g.set("invokeNative", lua.create_function(
        move |lua, (hash, args): (u32, Variadic<LuaValue>)| {
            let def = res
                .call(|inv| {
                    inv.table()
                        .get(NativeId(hash))
                        .copied()
                        .ok_or_else(|| crate::error::InvocationError::UnknownNative(NativeId(hash)).into())
                })
                .map_err(mlua::Error::external)?;
            let args = convert::to_arguments(lua, &def, args)?;
            let value = res
                .call(|inv| inv.invoke(def.id, &args, def.ret))
                .map_err(mlua::Error::external)?;
            convert::return_to_lua(lua, value)
        },
    )?)?;

    Ok(())
}
