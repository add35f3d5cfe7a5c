//! Lua debug hooks.
//!
//! A host callback can observe interpreter events.  The set of events is a
//! [`HookMask`]; `COUNT` additionally needs an instruction interval.  Each
//! event reaches the callback as a [`HookEvent`].  A callback returning an
//! error aborts the running script with that error.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use mlua::{Debug, DebugEvent, HookTriggers, Lua, VmState};

use crate::error::ScriptError;

// ── HookMask ──────────────────────────────────────────────────────────────────

bitflags! {
    /// Interpreter events a hook subscribes to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HookMask: u8 {
        /// Function entry (including tail calls).
        const CALL   = 0b0001;
        /// Function return.
        const RETURN = 0b0010;
        /// Start of a new source line.
        const LINE   = 0b0100;
        /// Every `count` VM instructions.
        const COUNT  = 0b1000;
    }
}

impl FromStr for HookMask {
    type Err = String;

    /// Comma- or `|`-separated, case-insensitive event names
    /// (`"call,line"`).  An empty string is the empty mask.
    fn from_str(s: &str) -> Result<Self, String> {
        let mut mask = HookMask::empty();
        for word in s.split([',', '|']).map(str::trim).filter(|w| !w.is_empty()) {
            mask |= match word.to_ascii_lowercase().as_str() {
                "call" => HookMask::CALL,
                "return" | "ret" => HookMask::RETURN,
                "line" => HookMask::LINE,
                "count" => HookMask::COUNT,
                "all" => HookMask::all(),
                _ => return Err(format!("invalid hook event {word:?}")),
            };
        }
        Ok(mask)
    }
}

// ── HookEvent ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEventKind {
    Call,
    TailCall,
    Return,
    Line,
    Count,
}

impl fmt::Display for HookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookEventKind::Call => "call",
            HookEventKind::TailCall => "tail call",
            HookEventKind::Return => "return",
            HookEventKind::Line => "line",
            HookEventKind::Count => "count",
        })
    }
}

/// One observed interpreter event.
#[derive(Debug, Clone, PartialEq)]
pub struct HookEvent {
    pub kind: HookEventKind,
    /// Current line, when the running function has line information.
    pub line: Option<u32>,
    /// Short source name of the running chunk (e.g. `[string "main"]`).
    pub source: Option<String>,
    /// Name of the called function, for call events.
    pub name: Option<String>,
}

impl HookEvent {
    fn from_debug(debug: &Debug<'_>) -> Option<Self> {
        let kind = match debug.event() {
            DebugEvent::Call => HookEventKind::Call,
            DebugEvent::TailCall => HookEventKind::TailCall,
            DebugEvent::Ret => HookEventKind::Return,
            DebugEvent::Line => HookEventKind::Line,
            DebugEvent::Count => HookEventKind::Count,
            _ => return None,
        };
        let line = u32::try_from(debug.curr_line()).ok().filter(|&l| l > 0);
        let source = debug.source().short_src.map(|s| s.to_string());
        let name = match kind {
            HookEventKind::Call | HookEventKind::TailCall => {
                debug.names().name.map(|s| s.to_string())
            }
            _ => None,
        };
        Some(Self { kind, line, source, name })
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(source) = &self.source {
            write!(f, " {source}")?;
            if let Some(line) = self.line {
                write!(f, ":{line}")?;
            }
        }
        if let Some(name) = &self.name {
            write!(f, " in {name}")?;
        }
        Ok(())
    }
}

// ── Installation ──────────────────────────────────────────────────────────────

fn triggers(mask: HookMask, count: u32) -> Result<HookTriggers, ScriptError> {
    if mask.is_empty() {
        return Err(ScriptError::runtime("hook mask is empty"));
    }
    let mut triggers = HookTriggers::new();
    if mask.contains(HookMask::CALL) {
        triggers = triggers.on_calls();
    }
    if mask.contains(HookMask::RETURN) {
        triggers = triggers.on_returns();
    }
    if mask.contains(HookMask::LINE) {
        triggers = triggers.every_line();
    }
    if mask.contains(HookMask::COUNT) {
        if count == 0 {
            return Err(ScriptError::runtime("count hook needs a non-zero instruction count"));
        }
        triggers = triggers.every_nth_instruction(count);
    }
    Ok(triggers)
}

/// Replace any installed hook with `callback`.
pub fn install<F>(lua: &Lua, mask: HookMask, count: u32, callback: F) -> Result<(), ScriptError>
where
    F: Fn(&HookEvent) -> Result<(), ScriptError> + 'static,
{
    let triggers = triggers(mask, count)?;
    lua.set_hook(triggers, move |_lua, debug| {
        if let Some(event) = HookEvent::from_debug(&debug) {
            callback(&event).map_err(ScriptError::raise)?;
        }
        Ok(VmState::Continue)
    });
    Ok(())
}

/// Remove the installed hook, if any.
pub fn remove(lua: &Lua) {
    lua.remove_hook();
}

// ── Tests ─────────────────────────────────────────────────────────────────────
