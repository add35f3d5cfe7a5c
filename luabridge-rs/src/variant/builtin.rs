//! Builtin properties and methods of each variant kind.
//!
//! These are the host's own member tables: what a script reaches with
//! `v.x`, `v.x = 1` or `v:length()`.  Objects forward to their
//! [`HostObject`](crate::object::HostObject) implementation.

use crate::object::{CallError, Callable, Signal};
use crate::state::ScriptContext;

use super::{Color, Plane, Rect2, Variant, VariantType, Vector2, Vector3};

const VECTOR2_METHODS: &[&str] = &[
    "length",
    "length_squared",
    "normalized",
    "dot",
    "cross",
    "distance_to",
    "angle",
    "abs",
    "floor",
    "ceil",
    "round",
    "lerp",
    "is_equal_approx",
];

const VECTOR3_METHODS: &[&str] = &[
    "length",
    "length_squared",
    "normalized",
    "dot",
    "cross",
    "distance_to",
    "abs",
    "floor",
    "ceil",
    "round",
    "lerp",
    "is_equal_approx",
];

const COLOR_METHODS: &[&str] = &["inverted", "lerp", "get_luminance", "is_equal_approx"];

const RECT2_METHODS: &[&str] = &[
    "get_area",
    "get_center",
    "has_area",
    "has_point",
    "intersects",
    "encloses",
    "merge",
    "grow",
    "abs",
];

const PLANE_METHODS: &[&str] = &["distance_to", "is_point_over", "has_point", "project", "normalized"];

const SIGNAL_METHODS: &[&str] = &[
    "get_name",
    "get_object",
    "is_null",
    "emit",
    "connect",
    "disconnect",
    "is_connected",
];

const CALLABLE_METHODS: &[&str] = &["call", "get_method", "get_object", "is_valid", "bind"];

const CONTAINER_METHODS: &[&str] = &["size", "is_empty", "has"];

/// Default tolerance for `Plane.has_point`.
const PLANE_POINT_TOLERANCE: f64 = 0.00001;

pub fn has_method(value: &Variant, name: &str) -> bool {
    let table: &[&str] = match value {
        Variant::Vector2(_) => VECTOR2_METHODS,
        Variant::Vector3(_) => VECTOR3_METHODS,
        Variant::Color(_) => COLOR_METHODS,
        Variant::Rect2(_) => RECT2_METHODS,
        Variant::Plane(_) => PLANE_METHODS,
        Variant::Signal(_) => SIGNAL_METHODS,
        Variant::Callable(_) => CALLABLE_METHODS,
        Variant::Array(_) | Variant::Dictionary(_) => CONTAINER_METHODS,
        Variant::Object(o) => return o.has_method(name),
        _ => &[],
    };
    table.contains(&name)
}

// ── Properties ────────────────────────────────────────────────────────────────

pub fn get(value: &Variant, name: &str) -> Option<Variant> {
    let v: Variant = match (value, name) {
        (Variant::Vector2(v), "x") => v.x.into(),
        (Variant::Vector2(v), "y") => v.y.into(),
        (Variant::Vector3(v), "x") => v.x.into(),
        (Variant::Vector3(v), "y") => v.y.into(),
        (Variant::Vector3(v), "z") => v.z.into(),
        (Variant::Color(c), "r") => c.r.into(),
        (Variant::Color(c), "g") => c.g.into(),
        (Variant::Color(c), "b") => c.b.into(),
        (Variant::Color(c), "a") => c.a.into(),
        (Variant::Rect2(r), "position") => r.position.into(),
        (Variant::Rect2(r), "size") => r.size.into(),
        (Variant::Rect2(r), "end") => r.end().into(),
        (Variant::Plane(p), "normal") => p.normal.into(),
        (Variant::Plane(p), "d") => p.d.into(),
        (Variant::Plane(p), "x") => p.normal.x.into(),
        (Variant::Plane(p), "y") => p.normal.y.into(),
        (Variant::Plane(p), "z") => p.normal.z.into(),
        (Variant::Object(o), name) => return o.get(name),
        _ => return None,
    };
    Some(v)
}

pub fn set(target: &mut Variant, name: &str, value: Variant) -> bool {
    if let Variant::Object(o) = &*target {
        return o.set(name, value);
    }
    let number = value.as_f64();
    match (target, name, number) {
        (Variant::Vector2(v), "x", Some(n)) => v.x = n,
        (Variant::Vector2(v), "y", Some(n)) => v.y = n,
        (Variant::Vector3(v), "x", Some(n)) => v.x = n,
        (Variant::Vector3(v), "y", Some(n)) => v.y = n,
        (Variant::Vector3(v), "z", Some(n)) => v.z = n,
        (Variant::Color(c), "r", Some(n)) => c.r = n,
        (Variant::Color(c), "g", Some(n)) => c.g = n,
        (Variant::Color(c), "b", Some(n)) => c.b = n,
        (Variant::Color(c), "a", Some(n)) => c.a = n,
        (Variant::Plane(p), "d", Some(n)) => p.d = n,
        (Variant::Plane(p), "x", Some(n)) => p.normal.x = n,
        (Variant::Plane(p), "y", Some(n)) => p.normal.y = n,
        (Variant::Plane(p), "z", Some(n)) => p.normal.z = n,
        (Variant::Plane(p), "normal", None) => match value {
            Variant::Vector3(n) => p.normal = n,
            _ => return false,
        },
        (Variant::Rect2(r), "position" | "size" | "end", None) => {
            let Variant::Vector2(v) = value else { return false };
            match name {
                "position" => r.position = v,
                "size" => r.size = v,
                _ => r.set_end(v),
            }
        }
        _ => return false,
    }
    true
}

// ── Argument helpers ──────────────────────────────────────────────────────────

fn invalid(index: usize, expected: VariantType, got: &Variant) -> CallError {
    CallError::InvalidArgument { index: index + 1, expected, got: got.get_type() }
}

fn arg(args: &[Variant], index: usize) -> Result<&Variant, CallError> {
    args.get(index).ok_or(CallError::TooFewArguments { expected: index + 1, got: args.len() })
}

fn arg_f64(args: &[Variant], index: usize) -> Result<f64, CallError> {
    let v = arg(args, index)?;
    v.as_f64().ok_or_else(|| invalid(index, VariantType::Float, v))
}

fn arg_vector2(args: &[Variant], index: usize) -> Result<Vector2, CallError> {
    match arg(args, index)? {
        Variant::Vector2(v) => Ok(*v),
        other => Err(invalid(index, VariantType::Vector2, other)),
    }
}

fn arg_vector3(args: &[Variant], index: usize) -> Result<Vector3, CallError> {
    match arg(args, index)? {
        Variant::Vector3(v) => Ok(*v),
        other => Err(invalid(index, VariantType::Vector3, other)),
    }
}

fn arg_color(args: &[Variant], index: usize) -> Result<Color, CallError> {
    match arg(args, index)? {
        Variant::Color(c) => Ok(*c),
        other => Err(invalid(index, VariantType::Color, other)),
    }
}

fn arg_rect2(args: &[Variant], index: usize) -> Result<Rect2, CallError> {
    match arg(args, index)? {
        Variant::Rect2(r) => Ok(*r),
        other => Err(invalid(index, VariantType::Rect2, other)),
    }
}

fn arg_callable(args: &[Variant], index: usize) -> Result<Callable, CallError> {
    match arg(args, index)? {
        Variant::Callable(c) => Ok(c.clone()),
        other => Err(invalid(index, VariantType::Callable, other)),
    }
}

// ── Methods ───────────────────────────────────────────────────────────────────

pub fn call(
    value: &Variant,
    ctx: &ScriptContext<'_>,
    method: &str,
    args: &[Variant],
) -> Result<Variant, CallError> {
    match value {
        Variant::Object(o) => o.call(ctx, method, args),
        Variant::Vector2(v) => call_vector2(*v, method, args),
        Variant::Vector3(v) => call_vector3(*v, method, args),
        Variant::Color(c) => call_color(*c, method, args),
        Variant::Rect2(r) => call_rect2(*r, method, args),
        Variant::Plane(p) => call_plane(*p, method, args),
        Variant::Signal(s) => call_signal(s, ctx, method, args),
        Variant::Callable(c) => call_callable(c, ctx, method, args),
        Variant::Array(items) => call_container(items.len(), method, args, |key| items.contains(key)),
        Variant::Dictionary(pairs) => {
            call_container(pairs.len(), method, args, |key| pairs.iter().any(|(k, _)| k == key))
        }
        _ => Err(CallError::InvalidMethod(method.to_owned())),
    }
}

fn call_vector2(v: Vector2, method: &str, args: &[Variant]) -> Result<Variant, CallError> {
    Ok(match method {
        "length" => v.length().into(),
        "length_squared" => v.length_squared().into(),
        "normalized" => v.normalized().into(),
        "dot" => v.dot(arg_vector2(args, 0)?).into(),
        "cross" => v.cross(arg_vector2(args, 0)?).into(),
        "distance_to" => v.distance_to(arg_vector2(args, 0)?).into(),
        "angle" => v.angle().into(),
        "abs" => v.abs().into(),
        "floor" => v.floor().into(),
        "ceil" => v.ceil().into(),
        "round" => v.round().into(),
        "lerp" => v.lerp(arg_vector2(args, 0)?, arg_f64(args, 1)?).into(),
        "is_equal_approx" => v.is_equal_approx(arg_vector2(args, 0)?).into(),
        _ => return Err(CallError::InvalidMethod(method.to_owned())),
    })
}

fn call_vector3(v: Vector3, method: &str, args: &[Variant]) -> Result<Variant, CallError> {
    Ok(match method {
        "length" => v.length().into(),
        "length_squared" => v.length_squared().into(),
        "normalized" => v.normalized().into(),
        "dot" => v.dot(arg_vector3(args, 0)?).into(),
        "cross" => v.cross(arg_vector3(args, 0)?).into(),
        "distance_to" => v.distance_to(arg_vector3(args, 0)?).into(),
        "abs" => v.abs().into(),
        "floor" => v.floor().into(),
        "ceil" => v.ceil().into(),
        "round" => v.round().into(),
        "lerp" => v.lerp(arg_vector3(args, 0)?, arg_f64(args, 1)?).into(),
        "is_equal_approx" => v.is_equal_approx(arg_vector3(args, 0)?).into(),
        _ => return Err(CallError::InvalidMethod(method.to_owned())),
    })
}

fn call_color(c: Color, method: &str, args: &[Variant]) -> Result<Variant, CallError> {
    Ok(match method {
        "inverted" => c.inverted().into(),
        "lerp" => c.lerp(arg_color(args, 0)?, arg_f64(args, 1)?).into(),
        "get_luminance" => c.luminance().into(),
        "is_equal_approx" => c.is_equal_approx(arg_color(args, 0)?).into(),
        _ => return Err(CallError::InvalidMethod(method.to_owned())),
    })
}

fn call_rect2(r: Rect2, method: &str, args: &[Variant]) -> Result<Variant, CallError> {
    Ok(match method {
        "get_area" => r.area().into(),
        "get_center" => r.center().into(),
        "has_area" => r.has_area().into(),
        "has_point" => r.has_point(arg_vector2(args, 0)?).into(),
        "intersects" => r.intersects(arg_rect2(args, 0)?).into(),
        "encloses" => r.encloses(arg_rect2(args, 0)?).into(),
        "merge" => r.merge(arg_rect2(args, 0)?).into(),
        "grow" => r.grow(arg_f64(args, 0)?).into(),
        "abs" => r.abs().into(),
        _ => return Err(CallError::InvalidMethod(method.to_owned())),
    })
}

fn call_plane(p: Plane, method: &str, args: &[Variant]) -> Result<Variant, CallError> {
    Ok(match method {
        "distance_to" => p.distance_to(arg_vector3(args, 0)?).into(),
        "is_point_over" => p.is_point_over(arg_vector3(args, 0)?).into(),
        "has_point" => {
            let tolerance = if args.len() > 1 { arg_f64(args, 1)? } else { PLANE_POINT_TOLERANCE };
            p.has_point(arg_vector3(args, 0)?, tolerance).into()
        }
        "project" => p.project(arg_vector3(args, 0)?).into(),
        "normalized" => p.normalized().into(),
        _ => return Err(CallError::InvalidMethod(method.to_owned())),
    })
}

fn call_signal(
    s: &Signal,
    ctx: &ScriptContext<'_>,
    method: &str,
    args: &[Variant],
) -> Result<Variant, CallError> {
    match method {
        "get_name" => Ok(Variant::String(s.name.clone())),
        "get_object" => Ok(Variant::Object(s.object.clone())),
        "is_null" => Ok(Variant::Bool(s.is_null())),
        "emit" => s.emit(ctx, args),
        "connect" => s.connect(ctx, arg_callable(args, 0)?),
        "disconnect" => s.disconnect(ctx, arg_callable(args, 0)?),
        "is_connected" => s.is_connected(ctx, arg_callable(args, 0)?),
        _ => Err(CallError::InvalidMethod(method.to_owned())),
    }
}

fn call_callable(
    c: &Callable,
    ctx: &ScriptContext<'_>,
    method: &str,
    args: &[Variant],
) -> Result<Variant, CallError> {
    match method {
        "call" => c.call(ctx, args),
        "get_method" => Ok(c.method_name().map(str::to_owned).into()),
        "get_object" => Ok(c.object().cloned().into()),
        "is_valid" => Ok(c.is_valid().into()),
        "bind" => Ok(c.clone().bind(args.to_vec(), Default::default()).into()),
        _ => Err(CallError::InvalidMethod(method.to_owned())),
    }
}

fn call_container(
    len: usize,
    method: &str,
    args: &[Variant],
    has: impl Fn(&Variant) -> bool,
) -> Result<Variant, CallError> {
    match method {
        "size" => Ok(Variant::Int(len as i64)),
        "is_empty" => Ok(Variant::Bool(len == 0)),
        "has" => Ok(Variant::Bool(has(arg(args, 0)?))),
        _ => Err(CallError::InvalidMethod(method.to_owned())),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
