//! Metatable for boxed host objects.
//!
//! Each handler first asks the object for an override of the matching
//! operation ([`HostObject::try_override`](crate::object::HostObject::try_override)).
//! If the object declares one, its result is returned verbatim.  Otherwise:
//!
//! * `__index` applies the field policy, then returns a bound-call closure
//!   for methods or the property value (nil if rejected or unknown);
//! * `__newindex` applies the field policy and writes the property; a
//!   rejected write is dropped;
//! * `__eq` compares identity, `__tostring` prints `<name>: 0x<id>`;
//! * every other operator raises Lua's own "attempt to ..." error.
//!
//! Binary overrides are looked up on the left operand only.
//!
//! The box holds one strong reference.  Dropping the box (Lua collects the
//! userdata, or the interpreter closes) runs the object's finalize
//! override, then releases the reference.

use mlua::{AnyUserData, Lua, MetaMethod, MultiValue, UserData, UserDataFields, UserDataMethods, Value};
use tracing::{debug, warn};

use crate::codec::{from_lua_value, to_lua_value};
use crate::error::ScriptError;
use crate::object::{CallError, MetaOp, ObjectRef};
use crate::policy;
use crate::state::ScriptContext;
use crate::variant::Variant;

use super::{bound_call, decline, describe};

/// A host object reference owned by Lua.
pub struct LuaObject {
    object: ObjectRef,
}

impl LuaObject {
    pub fn new(object: ObjectRef) -> Self {
        Self { object }
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }
}

impl Drop for LuaObject {
    fn drop(&mut self) {
        let ctx = ScriptContext::detached();
        if let Some(Err(err)) = self.object.try_override(&ctx, MetaOp::Gc, &[]) {
            warn!(class = self.object.class_name(), error = %err, "finalize override failed");
        }
    }
}

const UNARY: &[MetaOp] = &[MetaOp::Unm, MetaOp::BNot, MetaOp::Len];

impl UserData for LuaObject {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_meta_field(MetaMethod::Type, "Object");
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_function(MetaMethod::Index, |lua, (ud, key): (AnyUserData, Value)| {
            index(lua, ud, from_lua_value(lua, &key))
        });

        methods.add_meta_function(
            MetaMethod::NewIndex,
            |lua, (ud, key, value): (AnyUserData, Value, Value)| {
                new_index(lua, &ud, from_lua_value(lua, &key), from_lua_value(lua, &value))
            },
        );

        methods.add_meta_function(MetaMethod::Call, |lua, (ud, args): (AnyUserData, MultiValue)| {
            let object = object_of(&ud)?;
            let args: Vec<Variant> = args.iter().map(|v| from_lua_value(lua, v)).collect();
            let ctx = ScriptContext::new(lua);
            match object.try_override(&ctx, MetaOp::Call, &[Variant::Array(args)]) {
                Some(result) => override_result(lua, MetaOp::Call, result),
                None => decline(MetaOp::Call, object.class_name()),
            }
        });

        methods.add_meta_function(MetaMethod::ToString, |lua, ud: AnyUserData| {
            let object = object_of(&ud)?;
            let ctx = ScriptContext::new(lua);
            let text = match object.try_override(&ctx, MetaOp::ToString, &[]) {
                Some(result) => result
                    .map_err(|e| ScriptError::from_call_error(MetaOp::ToString.metamethod(), e))?
                    .to_string(),
                None => format!("{}: 0x{:x}", display_name(&ctx, &object), object.instance_id()),
            };
            Ok(text)
        });

        methods.add_meta_function(MetaMethod::Eq, |lua, (lhs, rhs): (Value, Value)| {
            let (a, b) = (from_lua_value(lua, &lhs), from_lua_value(lua, &rhs));
            let (object, other) = match (&a, &b) {
                (Variant::Object(o), other) | (other, Variant::Object(o)) => (o.clone(), other.clone()),
                _ => return Ok(Value::Boolean(false)),
            };
            let ctx = ScriptContext::new(lua);
            match object.try_override(&ctx, MetaOp::Eq, std::slice::from_ref(&other)) {
                Some(result) => override_result(lua, MetaOp::Eq, result),
                None => Ok(Value::Boolean(other.as_object().is_some_and(|o| o.ptr_eq(&object)))),
            }
        });

        for &op in MetaOp::BINARY.iter().chain([MetaOp::Lt, MetaOp::Le].iter()) {
            methods.add_meta_function(op.metamethod(), move |lua, (lhs, rhs): (Value, Value)| {
                binary(lua, op, &lhs, &rhs)
            });
        }

        for &op in UNARY {
            methods.add_meta_function(op.metamethod(), move |lua, (ud, _): (AnyUserData, MultiValue)| {
                let object = object_of(&ud)?;
                let ctx = ScriptContext::new(lua);
                match object.try_override(&ctx, op, &[]) {
                    Some(result) => override_result(lua, op, result),
                    None => decline(op, object.class_name()),
                }
            });
        }
    }
}

/// Clone the reference out of the box so no borrow is held while host
/// code runs.
fn object_of(ud: &AnyUserData) -> mlua::Result<ObjectRef> {
    Ok(ud.borrow::<LuaObject>()?.object.clone())
}

fn override_result(
    lua: &Lua,
    op: MetaOp,
    result: Result<Variant, CallError>,
) -> mlua::Result<Value> {
    match result {
        Ok(value) => to_lua_value(lua, &value),
        Err(err) => Err(ScriptError::from_call_error(op.metamethod(), err).raise()),
    }
}

/// Name used by the default string conversion: the metatable-name
/// override when it yields a string, the class name otherwise.
fn display_name(ctx: &ScriptContext<'_>, object: &ObjectRef) -> String {
    match object.try_override(ctx, MetaOp::Metatable, &[]) {
        Some(Ok(Variant::String(name))) => name,
        _ => object.class_name().to_owned(),
    }
}

fn index(lua: &Lua, ud: AnyUserData, key: Variant) -> mlua::Result<Value> {
    let object = object_of(&ud)?;
    let ctx = ScriptContext::new(lua);
    if let Some(result) = object.try_override(&ctx, MetaOp::Index, std::slice::from_ref(&key)) {
        return override_result(lua, MetaOp::Index, result);
    }

    let Variant::String(name) = key else {
        return Ok(Value::Nil);
    };
    let fields = object.script_fields().unwrap_or_default();
    if !policy::can_read(ctx.access_mode(), &fields, &name) {
        debug!(class = object.class_name(), field = %name, "read rejected by field policy");
        return Ok(Value::Nil);
    }
    if object.has_method(&name) {
        return bound_call(lua, ud, name).map(Value::Function);
    }
    to_lua_value(lua, &object.get(&name).unwrap_or_default())
}

fn new_index(lua: &Lua, ud: &AnyUserData, key: Variant, value: Variant) -> mlua::Result<()> {
    let object = object_of(ud)?;
    let ctx = ScriptContext::new(lua);
    if let Some(result) = object.try_override(&ctx, MetaOp::NewIndex, &[key.clone(), value.clone()]) {
        result.map_err(|e| ScriptError::from_call_error(MetaOp::NewIndex.metamethod(), e))?;
        return Ok(());
    }

    let name = match key {
        Variant::String(name) => name,
        other => {
            debug!(class = object.class_name(), key = %other, "ignoring write with a non-string key");
            return Ok(());
        }
    };
    let fields = object.script_fields().unwrap_or_default();
    if !policy::can_write(ctx.access_mode(), &fields, &name) {
        debug!(class = object.class_name(), field = %name, "write rejected by field policy");
    } else if !object.set(&name, value) {
        debug!(class = object.class_name(), field = %name, "write refused by object");
    }
    Ok(())
}

fn binary(lua: &Lua, op: MetaOp, lhs: &Value, rhs: &Value) -> mlua::Result<Value> {
    let object = match lhs {
        Value::UserData(ud) => ud.borrow::<LuaObject>().ok().map(|b| b.object.clone()),
        _ => None,
    };
    // Reached through the right operand: no override lookup there.
    let Some(object) = object else {
        return decline(op, &describe(rhs));
    };
    let ctx = ScriptContext::new(lua);
    let other = from_lua_value(lua, rhs);
    match object.try_override(&ctx, op, std::slice::from_ref(&other)) {
        Some(result) => override_result(lua, op, result),
        None => decline(op, object.class_name()),
    }
}
