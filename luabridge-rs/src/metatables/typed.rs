//! Metatables for boxed structured values and signals.
//!
//! One generic box, [`TypedBox`], is instantiated per kind.  The kind tag
//! decides the `__name`, which operators are registered and whether the
//! box accepts assignment.
//!
//! | kind    | `+ - * /` | `==` | `< <=` | assignment |
//! |---------|-----------|------|--------|------------|
//! | Vector2 | yes       | yes  | yes    | yes        |
//! | Vector3 | yes       | yes  |        | yes        |
//! | Color   | yes       | yes  | yes    | yes        |
//! | Rect2   |           | yes  |        | yes        |
//! | Plane   |           | yes  |        | yes        |
//! | Signal  |           | yes  |        |            |
//!
//! Every kind gets `__index` and `__tostring`.

use std::marker::PhantomData;

use mlua::{AnyUserData, Lua, MetaMethod, UserData, UserDataFields, UserDataMethods, Value};
use tracing::debug;

use crate::codec::{from_lua_value, to_lua_value, MetaArgs};
use crate::object::MetaOp;
use crate::variant::{ops, Color, Plane, Rect2, Variant, Vector2, Vector3};

use super::{bound_call, decline};

/// Tag selecting a [`TypedBox`] behaviour set.
pub trait Kind: 'static {
    /// Lua-visible type name (`__name`).
    const NAME: &'static str;
    /// Operators with a metamethod.  `Eq` compares with host equality.
    const OPERATORS: &'static [MetaOp];
    /// Whether `__newindex` is registered.
    const ASSIGNABLE: bool = true;
}

const ARITH_ORDERED: &[MetaOp] = &[
    MetaOp::Add,
    MetaOp::Sub,
    MetaOp::Mul,
    MetaOp::Div,
    MetaOp::Eq,
    MetaOp::Lt,
    MetaOp::Le,
];

const ARITH: &[MetaOp] = &[MetaOp::Add, MetaOp::Sub, MetaOp::Mul, MetaOp::Div, MetaOp::Eq];

pub struct Vector2Kind;
pub struct Vector3Kind;
pub struct ColorKind;
pub struct Rect2Kind;
pub struct PlaneKind;
pub struct SignalKind;

impl Kind for Vector2Kind {
    const NAME: &'static str = "Vector2";
    const OPERATORS: &'static [MetaOp] = ARITH_ORDERED;
}

impl Kind for Vector3Kind {
    const NAME: &'static str = "Vector3";
    const OPERATORS: &'static [MetaOp] = ARITH;
}

impl Kind for ColorKind {
    const NAME: &'static str = "Color";
    const OPERATORS: &'static [MetaOp] = ARITH_ORDERED;
}

impl Kind for Rect2Kind {
    const NAME: &'static str = "Rect2";
    const OPERATORS: &'static [MetaOp] = &[MetaOp::Eq];
}

impl Kind for PlaneKind {
    const NAME: &'static str = "Plane";
    const OPERATORS: &'static [MetaOp] = &[MetaOp::Eq];
}

impl Kind for SignalKind {
    const NAME: &'static str = "Signal";
    const OPERATORS: &'static [MetaOp] = &[MetaOp::Eq];
    const ASSIGNABLE: bool = false;
}

pub type LuaVector2 = TypedBox<Vector2Kind>;
pub type LuaVector3 = TypedBox<Vector3Kind>;
pub type LuaColor = TypedBox<ColorKind>;
pub type LuaRect2 = TypedBox<Rect2Kind>;
pub type LuaPlane = TypedBox<PlaneKind>;
pub type LuaSignal = TypedBox<SignalKind>;

/// A host variant owned by Lua.  Dropped with the userdata.
pub struct TypedBox<K> {
    value: Variant,
    kind: PhantomData<K>,
}

impl<K: Kind> TypedBox<K> {
    pub fn new(value: Variant) -> Self {
        Self { value, kind: PhantomData }
    }

    pub fn value(&self) -> &Variant {
        &self.value
    }
}

impl<K: Kind> UserData for TypedBox<K> {
    fn add_fields<F: UserDataFields<Self>>(fields: &mut F) {
        fields.add_meta_field(MetaMethod::Type, K::NAME);
    }

    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_function(MetaMethod::Index, |lua, (ud, key): (AnyUserData, Value)| {
            index::<K>(lua, ud, &key)
        });

        if K::ASSIGNABLE {
            methods.add_meta_function(
                MetaMethod::NewIndex,
                |lua, (ud, key, value): (AnyUserData, Value, Value)| {
                    let (key, value) = (from_lua_value(lua, &key), from_lua_value(lua, &value));
                    let mut this = ud.borrow_mut::<Self>()?;
                    if !this.value.set(&key, value) {
                        debug!(kind = K::NAME, key = %key, "ignoring assignment to unknown or mistyped member");
                    }
                    Ok(())
                },
            );
        }

        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.value.to_string()));

        for &op in K::OPERATORS {
            methods.add_meta_function(op.metamethod(), move |lua, (lhs, rhs): (Value, Value)| {
                binary::<K>(lua, op, &lhs, &rhs)
            });
        }
    }
}

/// Methods come back as bound-call closures, properties as values.
/// Unknown keys read as nil.
fn index<K: Kind>(lua: &Lua, ud: AnyUserData, key: &Value) -> mlua::Result<Value> {
    let key = from_lua_value(lua, key);
    let value = {
        let this = ud.borrow::<TypedBox<K>>()?;
        match key.as_str() {
            Some(name) if this.value.has_method(name) => None,
            _ => Some(this.value.get(&key)),
        }
    };
    match (value, key) {
        (Some(value), _) => to_lua_value(lua, &value),
        (None, Variant::String(name)) => bound_call(lua, ud, name).map(Value::Function),
        (None, _) => Ok(Value::Nil),
    }
}

fn binary<K: Kind>(lua: &Lua, op: MetaOp, lhs: &Value, rhs: &Value) -> mlua::Result<Value> {
    let (a, b) = (from_lua_value(lua, lhs), from_lua_value(lua, rhs));
    if op == MetaOp::Eq {
        return Ok(Value::Boolean(a == b));
    }
    match ops::evaluate(op, &a, &b) {
        Some(result) => to_lua_value(lua, &result),
        None => decline(op, K::NAME),
    }
}

// ── Global constructors ───────────────────────────────────────────────────────

/// `Vector2(x, y)`; missing components are zero.
pub fn construct_vector2(args: &MetaArgs) -> Vector2 {
    Vector2::new(args.number(0), args.number(1))
}

/// `Vector3(x, y, z)`; missing components are zero.
pub fn construct_vector3(args: &MetaArgs) -> Vector3 {
    Vector3::new(args.number(0), args.number(1), args.number(2))
}

/// `Color(r, g, b)` or `Color(r, g, b, a)`; anything else is opaque black.
pub fn construct_color(args: &MetaArgs) -> Color {
    match args.len() {
        3 => Color::rgb(args.number(0), args.number(1), args.number(2)),
        n if n >= 4 => Color::rgba(args.number(0), args.number(1), args.number(2), args.number(3)),
        _ => Color::default(),
    }
}

/// `Rect2(position, size)` or `Rect2(x, y, width, height)`.
pub fn construct_rect2(args: &MetaArgs) -> Rect2 {
    match (args.len(), args.get(0), args.get(1)) {
        (2, Variant::Vector2(position), Variant::Vector2(size)) => Rect2::new(*position, *size),
        (n, _, _) if n >= 4 => {
            Rect2::from_components(args.number(0), args.number(1), args.number(2), args.number(3))
        }
        _ => Rect2::default(),
    }
}

/// `Plane(a, b, c, d)`, `Plane(p1, p2, p3)` or `Plane(normal, d)`.
pub fn construct_plane(args: &MetaArgs) -> Plane {
    match (args.len(), args.get(0), args.get(1), args.get(2)) {
        (3, Variant::Vector3(p1), Variant::Vector3(p2), Variant::Vector3(p3)) => {
            Plane::from_points(*p1, *p2, *p3)
        }
        (2, Variant::Vector3(normal), d, _) => Plane::new(*normal, d.as_f64().unwrap_or(0.0)),
        (n, ..) if n >= 4 => {
            Plane::from_components(args.number(0), args.number(1), args.number(2), args.number(3))
        }
        _ => Plane::default(),
    }
}

/// Install the `Vector2`, `Vector3`, `Color`, `Rect2` and `Plane` globals.
pub fn register_constructors(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();
    globals.set(
        "Vector2",
        lua.create_function(|_, args: MetaArgs| Ok(Variant::from(construct_vector2(&args))))?,
    )?;
    globals.set(
        "Vector3",
        lua.create_function(|_, args: MetaArgs| Ok(Variant::from(construct_vector3(&args))))?,
    )?;
    globals.set(
        "Color",
        lua.create_function(|_, args: MetaArgs| Ok(Variant::from(construct_color(&args))))?,
    )?;
    globals.set(
        "Rect2",
        lua.create_function(|_, args: MetaArgs| Ok(Variant::from(construct_rect2(&args))))?,
    )?;
    globals.set(
        "Plane",
        lua.create_function(|_, args: MetaArgs| Ok(Variant::from(construct_plane(&args))))?,
    )?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
