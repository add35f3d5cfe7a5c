//! The bridge: one Lua interpreter with the host vocabulary installed.
//!
//! [`LuaBridge`] owns the interpreter.  Host code reaches into it through
//! the bridge (globals, function calls, chunks) and host objects reach
//! back through a [`ScriptContext`] handed to every host call.
//!
//! Bridge-wide settings (access mode, print and error handlers) live in the
//! interpreter's app data, so every metatable handler sees the settings of
//! the interpreter it runs in.
//!
//! | operation                         | method                              |
//! |-----------------------------------|-------------------------------------|
//! | open standard libraries           | [`LuaBridge::bind_libraries`]       |
//! | debug hook                        | [`LuaBridge::install_hook`]         |
//! | `Name(...)` builds a host object  | [`LuaBridge::expose_constructor`]   |
//! | globals                           | `push_global` / `pull_global`       |
//! | call a script function            | [`LuaBridge::call_function`]        |
//! | run code                          | `exec` / `eval` / `load_file`       |

use std::cell::{Cell, RefCell};
use std::path::Path;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use mlua::{Function, Lua, LuaOptions, MultiValue, StdLib, Value};
use tracing::{debug, info, trace};

use crate::codec::{from_lua_value, from_lua_value_strict, to_lua_value};
use crate::config::BridgeConfig;
use crate::error::ScriptError;
use crate::hook::{self, HookEvent, HookMask};
use crate::metatables::register_constructors;
use crate::object::{ObjectRef, ScriptFunction};
use crate::policy::AccessMode;
use crate::variant::Variant;

type PrintHandler = dyn Fn(&str);
type ErrorHandler = dyn Fn(&ScriptError);

// ── BridgeState ───────────────────────────────────────────────────────────────

/// Per-interpreter settings, stored as mlua app data.
struct BridgeState {
    mode: Cell<AccessMode>,
    print: RefCell<Option<Rc<PrintHandler>>>,
    on_error: RefCell<Option<Rc<ErrorHandler>>>,
}

impl BridgeState {
    fn new(mode: AccessMode) -> Self {
        Self { mode: Cell::new(mode), print: RefCell::new(None), on_error: RefCell::new(None) }
    }

    fn print_handler(&self) -> Option<Rc<PrintHandler>> {
        self.print.borrow().clone()
    }

    fn error_handler(&self) -> Option<Rc<ErrorHandler>> {
        self.on_error.borrow().clone()
    }
}

fn with_state<R>(lua: &Lua, f: impl FnOnce(&BridgeState) -> R) -> Option<R> {
    let state = lua.app_data_ref::<BridgeState>()?;
    Some(f(&state))
}

const INTERPRETER_KEY: &str = "luabridge.interpreter";

static NEXT_INTERPRETER: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of `lua`, assigned on first use and kept in
/// its registry.
pub(crate) fn interpreter_id(lua: &Lua) -> mlua::Result<u64> {
    if let Some(id) = lua.named_registry_value::<Option<i64>>(INTERPRETER_KEY)? {
        return Ok(id as u64);
    }
    let id = NEXT_INTERPRETER.fetch_add(1, Ordering::Relaxed);
    lua.set_named_registry_value(INTERPRETER_KEY, id as i64)?;
    Ok(id)
}

// ── ScriptContext ─────────────────────────────────────────────────────────────

/// Access to the calling interpreter from host code.
///
/// A context is detached when no interpreter is available: during
/// finalization, or when host code calls host code directly.  Operations
/// that need the interpreter then fail with a runtime error.
#[derive(Clone, Copy)]
pub struct ScriptContext<'a> {
    lua: Option<&'a Lua>,
}

impl<'a> ScriptContext<'a> {
    pub fn new(lua: &'a Lua) -> Self {
        Self { lua: Some(lua) }
    }

    pub fn detached() -> ScriptContext<'static> {
        ScriptContext { lua: None }
    }

    pub fn lua(&self) -> Option<&'a Lua> {
        self.lua
    }

    pub fn is_detached(&self) -> bool {
        self.lua.is_none()
    }

    fn require(&self) -> Result<&'a Lua, ScriptError> {
        self.lua
            .ok_or_else(|| ScriptError::runtime("no interpreter is available in this context"))
    }

    /// The interpreter's field access mode.  Detached contexts and plain
    /// interpreters without a bridge are restrictive.
    pub fn access_mode(&self) -> AccessMode {
        self.lua.and_then(|lua| with_state(lua, |s| s.mode.get())).unwrap_or_default()
    }

    pub fn is_permissive(&self) -> bool {
        self.access_mode().is_permissive()
    }

    pub fn push_global(&self, name: &str, value: &Variant) -> Result<(), ScriptError> {
        let lua = self.require()?;
        lua.globals().set(name, to_lua_value(lua, value)?)?;
        Ok(())
    }

    /// Read a global.  A value with no host counterpart is an error.
    pub fn pull_global(&self, name: &str) -> Result<Variant, ScriptError> {
        let lua = self.require()?;
        let value: Value = lua.globals().get(name)?;
        from_lua_value_strict(lua, &value)
    }

    pub fn function_exists(&self, name: &str) -> bool {
        match self.lua {
            Some(lua) => matches!(lua.globals().get::<Value>(name), Ok(Value::Function(_))),
            None => false,
        }
    }

    /// Call the global function `name`.  Only the first result is kept.
    pub fn call_function(&self, name: &str, args: &[Variant]) -> Result<Variant, ScriptError> {
        let lua = self.require()?;
        match lua.globals().get::<Value>(name)? {
            Value::Function(f) => call_in(lua, &f, args),
            _ => Err(ScriptError::runtime(format!("function '{name}' does not exist"))),
        }
    }

    /// Call a function captured from script space.  It must belong to this
    /// context's interpreter.
    pub fn call_script_function(&self, f: &ScriptFunction, args: &[Variant]) -> Result<Variant, ScriptError> {
        let lua = self.require()?;
        if f.owner() != interpreter_id(lua)? {
            return Err(ScriptError::conversion(
                "cannot call a script function from another interpreter",
            ));
        }
        call_in(lua, f.function(), args)
    }
}

fn call_in(lua: &Lua, f: &Function, args: &[Variant]) -> Result<Variant, ScriptError> {
    let args = args
        .iter()
        .map(|arg| to_lua_value(lua, arg))
        .collect::<mlua::Result<Vec<_>>>()?;
    let result: Value = f.call(MultiValue::from_vec(args))?;
    Ok(from_lua_value(lua, &result))
}

// ── LuaBridge ─────────────────────────────────────────────────────────────────

/// A Lua 5.4 interpreter bridged to the host variant system.
///
/// Dropping the bridge closes the interpreter, which finalizes every box
/// still alive and releases the host references they hold.
pub struct LuaBridge {
    lua: Lua,
}

impl LuaBridge {
    /// Create an interpreter configured by `config`.
    pub fn new(config: &BridgeConfig) -> Result<Self, ScriptError> {
        let lua = if config.bind_std {
            Lua::new()
        } else {
            Lua::new_with(StdLib::NONE, LuaOptions::default())?
        };
        Self::with_lua(lua, config)
    }

    /// Attach the bridge to an existing interpreter.
    pub fn with_lua(lua: Lua, config: &BridgeConfig) -> Result<Self, ScriptError> {
        lua.set_app_data(BridgeState::new(config.mode));
        let bridge = Self { lua };

        bridge.register_print()?;
        if config.bind_api {
            register_constructors(&bridge.lua)?;
        }
        if !config.libraries.is_empty() {
            bridge.bind_libraries(&config.libraries)?;
        }
        if !config.hook.is_empty() {
            bridge.install_hook(config.hook, config.hook_count, |event| {
                trace!(target: "lua::hook", "{event}");
                Ok(())
            })?;
        }
        debug!(mode = %config.mode, std = config.bind_std, api = config.bind_api, "lua bridge ready");
        Ok(bridge)
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    pub fn context(&self) -> ScriptContext<'_> {
        ScriptContext::new(&self.lua)
    }

    // ── Libraries and hooks ───────────────────────────────────────────────

    /// Open standard libraries by name.  `base` is always open; `debug`
    /// is refused.
    pub fn bind_libraries<S: AsRef<str>>(&self, names: &[S]) -> Result<(), ScriptError> {
        let mut libs = StdLib::NONE;
        for name in names {
            libs = libs
                | match name.as_ref() {
                    "base" => StdLib::NONE,
                    "coroutine" => StdLib::COROUTINE,
                    "table" => StdLib::TABLE,
                    "io" => StdLib::IO,
                    "os" => StdLib::OS,
                    "string" => StdLib::STRING,
                    "utf8" => StdLib::UTF8,
                    "math" => StdLib::MATH,
                    "package" => StdLib::PACKAGE,
                    "debug" => {
                        return Err(ScriptError::runtime("the debug library cannot be bound"));
                    }
                    other => {
                        return Err(ScriptError::runtime(format!("unknown library '{other}'")));
                    }
                };
        }
        self.lua.load_std_libs(libs)?;
        Ok(())
    }

    /// Install a debug hook; replaces any previous one.
    pub fn install_hook<F>(&self, mask: HookMask, count: u32, callback: F) -> Result<(), ScriptError>
    where
        F: Fn(&HookEvent) -> Result<(), ScriptError> + 'static,
    {
        hook::install(&self.lua, mask, count, callback)
    }

    pub fn remove_hook(&self) {
        hook::remove(&self.lua);
    }

    // ── Host → script ─────────────────────────────────────────────────────

    /// Make `name(...)` in script call `factory.new(...)`.
    pub fn expose_constructor(&self, name: &str, factory: ObjectRef) -> Result<(), ScriptError> {
        if !factory.has_method("new") {
            return Err(ScriptError::runtime(format!(
                "cannot expose '{name}': {} has no method 'new'",
                factory.class_name()
            )));
        }
        let constructor = self.lua.create_function(move |lua, args: MultiValue| {
            let args: Vec<Variant> = args.iter().map(|v| from_lua_value(lua, v)).collect();
            let instance = factory
                .call(&ScriptContext::new(lua), "new", &args)
                .map_err(|e| ScriptError::from_call_error("new", e))?;
            to_lua_value(lua, &instance)
        })?;
        self.lua.globals().set(name, constructor)?;
        Ok(())
    }

    pub fn push_global(&self, name: &str, value: &Variant) -> Result<(), ScriptError> {
        self.context().push_global(name, value)
    }

    pub fn pull_global(&self, name: &str) -> Result<Variant, ScriptError> {
        self.context().pull_global(name)
    }

    pub fn function_exists(&self, name: &str) -> bool {
        self.context().function_exists(name)
    }

    pub fn call_function(&self, name: &str, args: &[Variant]) -> Result<Variant, ScriptError> {
        self.report(self.context().call_function(name, args))
    }

    // ── Chunks ────────────────────────────────────────────────────────────

    /// Execute a chunk.
    pub fn exec(&self, chunk: &str) -> Result<(), ScriptError> {
        self.report(self.lua.load(chunk).exec().map_err(ScriptError::from))
    }

    /// Execute a chunk under a chunk name used in messages and tracebacks.
    pub fn exec_named(&self, name: &str, chunk: &str) -> Result<(), ScriptError> {
        self.report(self.lua.load(chunk).set_name(name).exec().map_err(ScriptError::from))
    }

    /// Evaluate an expression (or a chunk ending in `return`).
    pub fn eval(&self, expr: &str) -> Result<Variant, ScriptError> {
        let result = self.lua.load(expr).eval::<Value>().map_err(ScriptError::from);
        self.report(result.map(|v| from_lua_value(&self.lua, &v)))
    }

    /// Load and execute a Lua source file.
    pub fn load_file(&self, path: &Path) -> Result<(), ScriptError> {
        self.report(self.lua.load(path).exec().map_err(ScriptError::from))
    }

    /// Run a full garbage collection cycle.
    pub fn collect_garbage(&self) -> Result<(), ScriptError> {
        self.lua.gc_collect()?;
        Ok(())
    }

    // ── Settings ──────────────────────────────────────────────────────────

    pub fn set_permissive(&self, permissive: bool) {
        with_state(&self.lua, |s| s.mode.set(AccessMode::from_permissive(permissive)));
    }

    pub fn is_permissive(&self) -> bool {
        self.context().is_permissive()
    }

    pub fn access_mode(&self) -> AccessMode {
        self.context().access_mode()
    }

    /// Route `print` output to `handler` instead of the log.
    pub fn set_print_handler<F: Fn(&str) + 'static>(&self, handler: F) {
        with_state(&self.lua, |s| *s.print.borrow_mut() = Some(Rc::new(handler)));
    }

    /// Observe every error that escapes to a host caller.
    pub fn set_error_handler<F: Fn(&ScriptError) + 'static>(&self, handler: F) {
        with_state(&self.lua, |s| *s.on_error.borrow_mut() = Some(Rc::new(handler)));
    }

    fn report<T>(&self, result: Result<T, ScriptError>) -> Result<T, ScriptError> {
        if let Err(err) = &result {
            debug!(error = %err, "script error");
            if let Some(handler) = with_state(&self.lua, BridgeState::error_handler).flatten() {
                handler(err);
            }
        }
        result
    }

    /// Replace `print` so output goes to the print handler, or to the log
    /// under the `lua::print` target.
    fn register_print(&self) -> mlua::Result<()> {
        let print = self.lua.create_function(|lua, args: MultiValue| {
            let tostring: Function = lua.globals().get("tostring")?;
            let mut line = String::new();
            for (i, value) in args.into_iter().enumerate() {
                if i > 0 {
                    line.push('\t');
                }
                let text: mlua::String = tostring.call(value)?;
                line.push_str(&text.to_string_lossy());
            }
            match with_state(lua, BridgeState::print_handler).flatten() {
                Some(handler) => handler(&line),
                None => info!(target: "lua::print", "{line}"),
            }
            Ok(())
        })?;
        self.lua.globals().set("print", print)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
