//! The common error value shared by both sides of the bridge.
//!
//! Script faults (syntax, runtime, memory), host call faults and value
//! conversion faults all normalise to [`ScriptError`].  A `ScriptError`
//! raised into Lua (see [`ScriptError::raise`]) is observable by `pcall`
//! and comes back out unchanged if it escapes to the host.

use std::fmt;

use crate::object::CallError;

/// Category of a [`ScriptError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Syntax error while compiling a chunk.
    Compile,
    /// Error raised while running script code or a host call made from it.
    Runtime,
    /// A value could not cross the boundary.
    ValueConversion,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Compile => "compile error",
            ErrorKind::Runtime => "runtime error",
            ErrorKind::ValueConversion => "value conversion error",
        })
    }
}

/// An error surfaced to host callers and raised into scripts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ScriptError {
    pub kind: ErrorKind,
    pub message: String,
    /// Lua stack traceback, when one was captured.
    pub traceback: Option<String>,
}

const TRACEBACK_MARKER: &str = "\nstack traceback:";

impl ScriptError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), traceback: None }
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Compile, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValueConversion, message)
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }

    /// Turn this error into an mlua error that Lua's own error propagation
    /// carries.  A `pcall` in script sees it; if it escapes to the host it
    /// converts back into the same `ScriptError`.
    pub fn raise(self) -> mlua::Error {
        mlua::Error::external(self)
    }

    /// Normalise a host call fault made while running `method`.
    pub fn from_call_error(method: &str, err: CallError) -> Self {
        match err {
            CallError::Script(inner) => inner,
            other => Self::runtime(format!("error calling '{method}': {other}")),
        }
    }

    /// Split a Lua message of the form `msg\nstack traceback:\n...`.
    fn from_lua_message(kind: ErrorKind, message: &str) -> Self {
        match message.split_once(TRACEBACK_MARKER) {
            Some((msg, tb)) => {
                Self::new(kind, msg).with_traceback(format!("stack traceback:{tb}"))
            }
            None => Self::new(kind, message),
        }
    }
}

impl From<mlua::Error> for ScriptError {
    fn from(err: mlua::Error) -> Self {
        use mlua::Error;

        match err {
            Error::SyntaxError { message, .. } => Self::from_lua_message(ErrorKind::Compile, &message),
            Error::RuntimeError(message) => Self::from_lua_message(ErrorKind::Runtime, &message),
            Error::MemoryError(message) => Self::runtime(format!("out of memory: {message}")),
            Error::CallbackError { traceback, cause } => {
                let inner = Self::from((*cause).clone());
                match inner.traceback {
                    Some(_) => inner,
                    None => inner.with_traceback(traceback),
                }
            }
            Error::WithContext { context, cause } => {
                let mut inner = Self::from((*cause).clone());
                inner.message = format!("{context}: {}", inner.message);
                inner
            }
            Error::ExternalError(ref source) => match source.downcast_ref::<ScriptError>() {
                Some(script_error) => script_error.clone(),
                None => Self::runtime(source.to_string()),
            },
            err @ (Error::FromLuaConversionError { .. } | Error::ToLuaConversionError { .. }) => {
                Self::conversion(err.to_string())
            }
            other => Self::runtime(other.to_string()),
        }
    }
}

impl From<ScriptError> for mlua::Error {
    fn from(err: ScriptError) -> Self {
        err.raise()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
