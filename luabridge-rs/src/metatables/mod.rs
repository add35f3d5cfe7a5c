//! Userdata boxes and the metatables that give them behaviour in Lua.
//!
//! | box                  | carries                 | metatable       |
//! |----------------------|-------------------------|-----------------|
//! | [`LuaVector2`] etc.  | a structured variant    | [`typed`]       |
//! | [`LuaSignal`]        | a signal variant        | [`typed`]       |
//! | [`LuaObject`]        | a host object reference | [`object`]      |
//! | [`LuaCallable`]      | a plain callable        | [`callable`]    |
//! | [`LuaCallableExtra`] | a callable with bindings| [`callable`]    |
//!
//! mlua builds each metatable the first time a box of that type is pushed
//! into an interpreter, and reuses it afterwards.

pub mod callable;
pub mod object;
pub mod typed;

pub use callable::{LuaCallable, LuaCallableExtra};
pub use object::LuaObject;
pub use typed::{
    register_constructors, Kind, LuaColor, LuaPlane, LuaRect2, LuaSignal, LuaVector2, LuaVector3,
    TypedBox,
};

use mlua::{AnyUserData, Function, Lua, MultiValue, Value};

use crate::codec::{from_lua_value, to_lua_value, userdata_to_variant};
use crate::error::ScriptError;
use crate::object::MetaOp;
use crate::state::ScriptContext;
use crate::variant::Variant;

/// The error Lua itself raises when a value has no handler for `op`.
pub(crate) fn decline<T>(op: MetaOp, type_name: &str) -> mlua::Result<T> {
    let message = match op {
        MetaOp::Add
        | MetaOp::Sub
        | MetaOp::Mul
        | MetaOp::Div
        | MetaOp::IDiv
        | MetaOp::Mod
        | MetaOp::Pow
        | MetaOp::Unm => format!("attempt to perform arithmetic on a {type_name} value"),
        MetaOp::BAnd | MetaOp::BOr | MetaOp::BXor | MetaOp::BNot | MetaOp::Shl | MetaOp::Shr => {
            format!("attempt to perform bitwise operation on a {type_name} value")
        }
        MetaOp::Concat => format!("attempt to concatenate a {type_name} value"),
        MetaOp::Lt | MetaOp::Le => format!("attempt to compare two {type_name} values"),
        MetaOp::Len => format!("attempt to get length of a {type_name} value"),
        MetaOp::Call => format!("attempt to call a {type_name} value"),
        MetaOp::Index | MetaOp::NewIndex => format!("attempt to index a {type_name} value"),
        MetaOp::Eq | MetaOp::ToString | MetaOp::Gc | MetaOp::Metatable => {
            format!("{} is not supported by {type_name} values", op.metamethod())
        }
    };
    Err(mlua::Error::RuntimeError(message))
}

/// Call `method` on `target`, converting arguments already read from Lua
/// and pushing the result back.
pub(crate) fn invoke(
    lua: &Lua,
    target: &Variant,
    method: &str,
    args: &[Variant],
) -> mlua::Result<Value> {
    let ctx = ScriptContext::new(lua);
    let result = target
        .call(&ctx, method, args)
        .map_err(|e| ScriptError::from_call_error(method, e))?;
    to_lua_value(lua, &result)
}

/// A closure that calls `method` on the value boxed in `this`.
///
/// Both `v:method(a)` and `v.method(a)` work: a leading argument that is
/// the box itself is dropped.  The box is read at call time, so the call
/// sees any assignments made after the closure was fetched.
pub(crate) fn bound_call(lua: &Lua, this: AnyUserData, method: String) -> mlua::Result<Function> {
    let self_ptr = Value::UserData(this.clone()).to_pointer();
    lua.create_function(move |lua, args: MultiValue| {
        let skip = usize::from(args.front().is_some_and(|first| first.to_pointer() == self_ptr));
        let target = userdata_to_variant(&this)
            .ok_or_else(|| ScriptError::runtime(format!("'{method}' called on a released value")))?;
        let args: Vec<Variant> = args.iter().skip(skip).map(|v| from_lua_value(lua, v)).collect();
        invoke(lua, &target, &method, &args)
    })
}

/// Type name used in diagnostics for a Lua value.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::UserData(ud) => match userdata_to_variant(ud) {
            Some(Variant::Object(object)) => object.class_name().to_owned(),
            Some(v) => v.get_type().name().to_owned(),
            None => value.type_name().to_owned(),
        },
        other => other.type_name().to_owned(),
    }
}
