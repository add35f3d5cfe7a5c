//! Metatables for boxed host callables.
//!
//! Two boxes exist so that scripts (and `__name`) can tell a plain callable
//! from one carrying bound arguments.  Both are invoked with `f(...)`; the
//! bound one adds its captured arguments in its configured placement.

use mlua::{AnyUserData, Lua, MetaMethod, MultiValue, UserData, UserDataFields, UserDataMethods, Value};

use crate::codec::{from_lua_value, to_lua_value};
use crate::error::ScriptError;
use crate::object::Callable;
use crate::state::ScriptContext;
use crate::variant::Variant;

/// A callable without bound arguments.
pub struct LuaCallable(pub Callable);

/// A callable carrying extra arguments.
pub struct LuaCallableExtra(pub Callable);

fn call(lua: &Lua, callable: &Callable, args: &MultiValue) -> mlua::Result<Value> {
    let args: Vec<Variant> = args.iter().map(|v| from_lua_value(lua, v)).collect();
    let ctx = ScriptContext::new(lua);
    let result = callable.call(&ctx, &args).map_err(|e| {
        ScriptError::from_call_error(callable.method_name().unwrap_or("<callable>"), e)
    })?;
    to_lua_value(lua, &result)
}

fn add_callable_methods<T, M>(methods: &mut M, callable: fn(&T) -> &Callable)
where
    T: UserData + 'static,
    M: UserDataMethods<T>,
{
    methods.add_meta_function(MetaMethod::Call, move |lua, (ud, args): (AnyUserData, MultiValue)| {
        let target = callable(&*ud.borrow::<T>()?).clone();
        call(lua, &target, &args)
    });
    methods.add_meta_method(MetaMethod::ToString, move |_, this, ()| Ok(callable(this).to_string()));
    methods.add_meta_function(MetaMethod::Eq, |lua, (a, b): (Value, Value)| {
        Ok(from_lua_value(lua, &a) == from_lua_value(lua, &b))
    });
}

impl UserData for LuaCallable {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_meta_field(MetaMethod::Type, "Callable");
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        add_callable_methods(methods, |this: &LuaCallable| &this.0);
    }
}

impl UserData for LuaCallableExtra {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_meta_field(MetaMethod::Type, "CallableExtra");
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        add_callable_methods(methods, |this: &LuaCallableExtra| &this.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::BindPlacement;

    fn sum() -> Callable {
        Callable::native("sum", |_, args| {
            Ok(Variant::Int(args.iter().filter_map(|a| match a {
                Variant::Int(n) => Some(*n),
                _ => None,
            }).sum()))
        })
    }

    #[test]
    fn call_from_script() {
        let lua = Lua::new();
        lua.globals().set("sum", Variant::Callable(sum())).unwrap();
        let n: i64 = lua.load("sum(1, 2, 3)").eval().unwrap();
        assert_eq!(n, 6);
    }

    #[test]
    fn bound_arguments_are_added() {
        let lua = Lua::new();
        let echo = Callable::native("echo", |_, args| Ok(Variant::Array(args.to_vec())));
        let bound = echo.bind(vec![Variant::Int(0)], BindPlacement::Prepend);
        lua.globals().set("f", Variant::Callable(bound)).unwrap();
        let first: i64 = lua.load("f(7, 8)[1]").eval().unwrap();
        assert_eq!(first, 0);
        let kind: String = lua.load("tostring(f)").eval().unwrap();
        assert_eq!(kind, "echo (bound)");
    }

    #[test]
    fn native_error_becomes_lua_error() {
        let lua = Lua::new();
        let failing = Callable::native("explode", |_, _| Err(crate::object::CallError::Failed("kaboom".into())));
        lua.globals().set("explode", Variant::Callable(failing)).unwrap();
        let msg: String = lua
            .load("local ok, err = pcall(explode) return tostring(err)")
            .eval()
            .unwrap();
        assert!(msg.contains("kaboom"), "{msg}");
    }
}
