//! Value marshalling between Lua values and host [`Variant`]s.
//!
//! | Lua                         | host                                 |
//! |-----------------------------|--------------------------------------|
//! | `nil`                       | `Nil`                                |
//! | boolean                     | `Bool`                               |
//! | integer / float             | `Int` / `Float`                      |
//! | string                      | `String` (lossy UTF-8)               |
//! | table tagged as an array    | `Array` of its declared length       |
//! | table tagged as a dictionary| `Dictionary`                         |
//! | untagged table, keys `1..n` | `Array` (also the empty table)       |
//! | any other table             | `Dictionary`                         |
//! | function                    | `Callable::Script`                   |
//! | bridge userdata             | the boxed variant                    |
//! | thread, foreign userdata    | `Nil` (an error in strict mode)      |
//!
//! Structured kinds, objects, signals and callables go out as userdata
//! boxes carrying the metatable for their kind.  A script function that
//! went in as `Callable::Script` comes back out as the same function, but
//! only into the interpreter it came from.
//!
//! Arrays and dictionaries go out as tables tagged with a shared marker
//! metatable, so an empty dictionary or one keyed `1..n` keeps its shape.
//! An array holding `nil` also records its length in the field `n`, the
//! way `table.pack` does.

use mlua::{AnyUserData, FromLua, FromLuaMulti, IntoLua, Lua, MultiValue, Table, Value};
use tracing::warn;

use crate::error::ScriptError;
use crate::metatables::{
    LuaCallable, LuaCallableExtra, LuaColor, LuaObject, LuaPlane, LuaRect2, LuaSignal,
    LuaVector2, LuaVector3,
};
use crate::object::{Callable, ScriptFunction};
use crate::state::interpreter_id;
use crate::variant::Variant;

/// Tables nested deeper than this convert to `Nil`; this also stops
/// self-referencing tables.
const MAX_DEPTH: usize = 128;

/// Field holding the length of an array that contains `nil`.
const LENGTH_KEY: &str = "n";

/// A tagged array may declare at most this many more slots than it has
/// elements; a larger `n` makes it read as a dictionary.
const MAX_HOLES: usize = 4096;

/// Container shape recorded in a table's metatable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Array,
    Dictionary,
}

impl Shape {
    fn registry_key(self) -> &'static str {
        match self {
            Shape::Array => "luabridge.array",
            Shape::Dictionary => "luabridge.dictionary",
        }
    }

    /// The shared marker metatable, created on first use.
    fn marker(self, lua: &Lua) -> mlua::Result<Table> {
        if let Some(marker) = lua.named_registry_value::<Option<Table>>(self.registry_key())? {
            return Ok(marker);
        }
        let marker = lua.create_table()?;
        lua.set_named_registry_value(self.registry_key(), &marker)?;
        Ok(marker)
    }

    fn of(lua: &Lua, table: &Table) -> Option<Shape> {
        let meta = table.metatable()?;
        [Shape::Array, Shape::Dictionary].into_iter().find(|shape| {
            matches!(
                lua.named_registry_value::<Option<Table>>(shape.registry_key()),
                Ok(Some(marker)) if marker.to_pointer() == meta.to_pointer()
            )
        })
    }
}

// ── Host → Lua ────────────────────────────────────────────────────────────────

/// Push a host value into Lua.
///
/// A script function captured from another interpreter is a
/// [`ErrorKind::ValueConversion`](crate::error::ErrorKind) error.
pub fn to_lua_value(lua: &Lua, variant: &Variant) -> mlua::Result<Value> {
    Ok(match variant {
        Variant::Nil => Value::Nil,
        Variant::Bool(b) => Value::Boolean(*b),
        Variant::Int(n) => Value::Integer(*n),
        Variant::Float(x) => Value::Number(*x),
        Variant::String(s) => Value::String(lua.create_string(s)?),
        Variant::Vector2(_) => Value::UserData(lua.create_userdata(LuaVector2::new(variant.clone()))?),
        Variant::Vector3(_) => Value::UserData(lua.create_userdata(LuaVector3::new(variant.clone()))?),
        Variant::Color(_) => Value::UserData(lua.create_userdata(LuaColor::new(variant.clone()))?),
        Variant::Rect2(_) => Value::UserData(lua.create_userdata(LuaRect2::new(variant.clone()))?),
        Variant::Plane(_) => Value::UserData(lua.create_userdata(LuaPlane::new(variant.clone()))?),
        Variant::Signal(_) => Value::UserData(lua.create_userdata(LuaSignal::new(variant.clone()))?),
        Variant::Object(object) => Value::UserData(lua.create_userdata(LuaObject::new(object.clone()))?),
        Variant::Callable(Callable::Script(f)) => {
            if f.owner() != interpreter_id(lua)? {
                return Err(ScriptError::conversion(
                    "cannot pass a script function to another interpreter",
                )
                .raise());
            }
            Value::Function(f.function().clone())
        }
        Variant::Callable(c @ Callable::Bound { .. }) => {
            Value::UserData(lua.create_userdata(LuaCallableExtra(c.clone()))?)
        }
        Variant::Callable(c) => Value::UserData(lua.create_userdata(LuaCallable(c.clone()))?),
        Variant::Array(items) => {
            let table = lua.create_table_with_capacity(items.len(), 0)?;
            for (i, item) in items.iter().enumerate() {
                table.raw_set(i + 1, to_lua_value(lua, item)?)?;
            }
            if items.iter().any(Variant::is_nil) {
                table.raw_set(LENGTH_KEY, items.len())?;
            }
            table.set_metatable(Some(Shape::Array.marker(lua)?));
            Value::Table(table)
        }
        Variant::Dictionary(pairs) => {
            let table = lua.create_table()?;
            for (key, value) in pairs {
                let key = to_lua_value(lua, key)?;
                if !is_table_key(&key) {
                    warn!(key = ?key, "dropping dictionary entry with a key Lua cannot store");
                    continue;
                }
                table.raw_set(key, to_lua_value(lua, value)?)?;
            }
            table.set_metatable(Some(Shape::Dictionary.marker(lua)?));
            Value::Table(table)
        }
    })
}

fn is_table_key(key: &Value) -> bool {
    match key {
        Value::Nil => false,
        Value::Number(x) => !x.is_nan(),
        _ => true,
    }
}

// ── Lua → host ────────────────────────────────────────────────────────────────

/// Read a Lua value as a host value.  Values with no host counterpart
/// become `Nil`.
pub fn from_lua_value(lua: &Lua, value: &Value) -> Variant {
    convert(lua, value, false, 0).unwrap_or_default()
}

/// Like [`from_lua_value`], but a value with no host counterpart is a
/// [`ErrorKind::ValueConversion`](crate::error::ErrorKind) error.
pub fn from_lua_value_strict(lua: &Lua, value: &Value) -> Result<Variant, ScriptError> {
    convert(lua, value, true, 0)
}

fn convert(lua: &Lua, value: &Value, strict: bool, depth: usize) -> Result<Variant, ScriptError> {
    Ok(match value {
        Value::Nil => Variant::Nil,
        Value::Boolean(b) => Variant::Bool(*b),
        Value::Integer(n) => Variant::Int(*n),
        Value::Number(x) => Variant::Float(*x),
        Value::String(s) => Variant::String(s.to_string_lossy()),
        Value::Table(table) => {
            if depth >= MAX_DEPTH {
                return unsupported(strict, "deeply nested table");
            }
            table_to_variant(lua, table, strict, depth + 1)?
        }
        Value::Function(f) => {
            Variant::Callable(Callable::Script(ScriptFunction::new(f.clone(), interpreter_id(lua)?)))
        }
        Value::UserData(ud) => match userdata_to_variant(ud) {
            Some(v) => v,
            None => return unsupported(strict, "userdata"),
        },
        other => return unsupported(strict, other.type_name()),
    })
}

fn unsupported(strict: bool, what: &str) -> Result<Variant, ScriptError> {
    if strict {
        Err(ScriptError::conversion(format!("cannot convert a Lua {what} to a host value")))
    } else {
        Ok(Variant::Nil)
    }
}

fn table_to_variant(lua: &Lua, table: &Table, strict: bool, depth: usize) -> Result<Variant, ScriptError> {
    let shape = Shape::of(lua, table);
    let mut pairs = Vec::new();
    for pair in table.clone().pairs::<Value, Value>() {
        pairs.push(pair?);
    }

    if shape != Some(Shape::Dictionary) {
        if let Some(slots) = array_slots(table, shape, &pairs) {
            let mut items = Vec::with_capacity(slots.len());
            for slot in slots {
                items.push(match slot {
                    Some(value) => convert(lua, value, strict, depth)?,
                    None => Variant::Nil,
                });
            }
            return Ok(Variant::Array(items));
        }
    }

    let mut entries = Vec::with_capacity(pairs.len());
    for (key, value) in &pairs {
        entries.push((convert(lua, key, strict, depth)?, convert(lua, value, strict, depth)?));
    }
    Ok(Variant::Dictionary(entries))
}

/// The element slots `1..=len` when `pairs` form an array, `None` when a
/// key falls outside them.  Untagged tables must be dense.  Tagged arrays
/// run to the larger of their declared length and their border, so
/// elements appended by a script are kept.
fn array_slots<'a>(
    table: &Table,
    shape: Option<Shape>,
    pairs: &'a [(Value, Value)],
) -> Option<Vec<Option<&'a Value>>> {
    let declared = match shape {
        Some(Shape::Array) => table.raw_get::<Option<i64>>(LENGTH_KEY).ok().flatten(),
        _ => None,
    };
    let len = match shape {
        Some(Shape::Array) => (declared.unwrap_or(0).max(0) as usize).max(table.raw_len()),
        _ => pairs.len(),
    };
    if len > pairs.len() + MAX_HOLES {
        return None;
    }

    let mut slots = vec![None; len];
    for (key, value) in pairs {
        match key {
            Value::Integer(i) if *i >= 1 && (*i as usize) <= len => slots[*i as usize - 1] = Some(value),
            Value::String(s) if declared.is_some() && s == LENGTH_KEY => {}
            _ => return None,
        }
    }
    Some(slots)
}

/// The variant behind one of the bridge's own userdata boxes.
pub(crate) fn userdata_to_variant(ud: &AnyUserData) -> Option<Variant> {
    if let Ok(b) = ud.borrow::<LuaVector2>() {
        return Some(b.value().clone());
    }
    if let Ok(b) = ud.borrow::<LuaVector3>() {
        return Some(b.value().clone());
    }
    if let Ok(b) = ud.borrow::<LuaColor>() {
        return Some(b.value().clone());
    }
    if let Ok(b) = ud.borrow::<LuaRect2>() {
        return Some(b.value().clone());
    }
    if let Ok(b) = ud.borrow::<LuaPlane>() {
        return Some(b.value().clone());
    }
    if let Ok(b) = ud.borrow::<LuaSignal>() {
        return Some(b.value().clone());
    }
    if let Ok(b) = ud.borrow::<LuaObject>() {
        return Some(Variant::Object(b.object().clone()));
    }
    if let Ok(b) = ud.borrow::<LuaCallable>() {
        return Some(Variant::Callable(b.0.clone()));
    }
    if let Ok(b) = ud.borrow::<LuaCallableExtra>() {
        return Some(Variant::Callable(b.0.clone()));
    }
    None
}

// ── mlua trait glue ───────────────────────────────────────────────────────────

impl IntoLua for Variant {
    fn into_lua(self, lua: &Lua) -> mlua::Result<Value> {
        to_lua_value(lua, &self)
    }
}

impl FromLua for Variant {
    fn from_lua(value: Value, lua: &Lua) -> mlua::Result<Self> {
        Ok(from_lua_value(lua, &value))
    }
}

/// Up to five converted arguments of a metamethod or constructor call.
/// Missing arguments are `Nil`; extra ones are ignored.
#[derive(Debug, Default)]
pub struct MetaArgs {
    slots: [Variant; 5],
    count: usize,
}

impl MetaArgs {
    /// Number of arguments actually passed (may exceed five).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, index: usize) -> &Variant {
        const NIL: &Variant = &Variant::Nil;
        self.slots.get(index).unwrap_or(NIL)
    }

    /// Numeric argument; anything non-numeric reads as zero.
    pub fn number(&self, index: usize) -> f64 {
        self.get(index).as_f64().unwrap_or(0.0)
    }
}

impl FromLuaMulti for MetaArgs {
    fn from_lua_multi(values: MultiValue, lua: &Lua) -> mlua::Result<Self> {
        let mut args = MetaArgs { count: values.len(), ..MetaArgs::default() };
        for (slot, value) in args.slots.iter_mut().zip(values.iter()) {
            *slot = from_lua_value(lua, value);
        }
        Ok(args)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
