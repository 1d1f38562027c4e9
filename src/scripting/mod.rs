//! Lua scripting host for a resource.
//!
//! One [`ScriptHost`] owns one Lua state bound to one [`Resource`]. Scripts
//! see the natives (namespaced and under their legacy names) plus the event,
//! state-bag and convar globals.

pub mod convert;
pub mod globals;
pub mod natives;

use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use mlua::Lua;

use crate::invoker::NativeHost;
use crate::resource::Resource;
use globals::Bindings;

/// Loaded first from a script directory.
pub const ENTRY_SCRIPT: &str = "main.lua";

pub struct ScriptHost<H: NativeHost + 'static> {
    lua: Lua,
    resource: Rc<Resource<H>>,
    bindings: Rc<Bindings>,
}

impl<H: NativeHost + 'static> ScriptHost<H> {
    pub fn new(resource: Rc<Resource<H>>) -> Result<Self> {
        // LuaJIT on 64-bit needs luaL_newstate(), which Lua::new() uses.
        let lua = Lua::new();
        let bindings = Rc::new(Bindings::default());

        globals::register(&lua, &resource, &bindings)
            .map_err(|e| anyhow!("failed to register scripting globals: {e}"))?;
        natives::register(&lua, &resource)
            .map_err(|e| anyhow!("failed to register native tables: {e}"))?;

        tracing::debug!("[scripting] {} ready", resource.name());
        Ok(Self {
            lua,
            resource,
            bindings,
        })
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn resource(&self) -> &Rc<Resource<H>> {
        &self.resource
    }

    /// Event handlers currently backed by Lua functions.
    pub fn lua_handler_count(&self) -> usize {
        self.bindings.len()
    }

    /// Run a chunk of Lua source.
    pub fn exec(&self, source: &str, chunk_name: &str) -> Result<()> {
        self.lua
            .load(source)
            .set_name(chunk_name)
            .exec()
            .map_err(|e| anyhow!("{chunk_name}: {e}"))
    }

    pub fn load_file(&self, path: &Path) -> Result<()> {
        let src = std::fs::read(path)
            .with_context(|| format!("Failed to read script: {}", path.display()))?;
        let name = path.to_string_lossy();
        self.lua
            .load(src.as_slice())
            .set_name(name.as_ref())
            .exec()
            .map_err(|e| anyhow!("{e}"))
    }

    /// Load `main.lua`, then every other `.lua` file below `dir`.
    ///
    /// A script that fails is logged and skipped. Returns the number of
    /// scripts that loaded.
    pub fn load_dir<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        anyhow::ensure!(dir.is_dir(), "script directory not found: {}", dir.display());

        let mut loaded = 0;
        let entry = dir.join(ENTRY_SCRIPT);
        if entry.is_file() {
            loaded += self.load_logged(&entry);
        }
        loaded += self.load_dir_recursive(dir, true)?;
        tracing::info!("[scripting] {}: {loaded} script(s) loaded from {}", self.resource.name(), dir.display());
        Ok(loaded)
    }

    fn load_logged(&self, path: &Path) -> usize {
        match self.load_file(path) {
            Ok(()) => 1,
            Err(e) => {
                tracing::warn!("[scripting] error loading {}: {e:#}", path.display());
                0
            }
        }
    }

    fn load_dir_recursive(&self, dir: &Path, top: bool) -> Result<usize> {
        let rd = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list {}", dir.display()))?;
        let mut paths: Vec<_> = rd.flatten().map(|e| e.path()).collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.starts_with('.') || (top && name == ENTRY_SCRIPT) {
                continue;
            }
            if path.is_dir() {
                loaded += self.load_dir_recursive(&path, false)?;
            } else if path.extension().and_then(|e| e.to_str()) == Some("lua") {
                loaded += self.load_logged(&path);
            }
        }
        Ok(loaded)
    }

    /// Stop the resource and drop every Lua-backed registration.
    pub fn stop(&self) {
        self.resource.stop();
        self.bindings.clear();
    }
}
