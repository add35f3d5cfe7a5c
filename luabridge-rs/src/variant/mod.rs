//! The host variant: the embedding application's dynamically-typed value.
//!
//! [`Variant`] is a closed sum type.  Each kind carries host-native
//! equality (no implicit cross-kind coercion, so `Int(1) != Float(1.0)`),
//! ordering where the host defines it (see [`math`]), and the builtin
//! properties and methods scripts can reach through indexing
//! (see [`builtin`]).

pub mod builtin;
pub mod math;
pub mod ops;

use std::fmt;

pub use math::{Color, Plane, Rect2, Vector2, Vector3};

use crate::object::{CallError, Callable, ObjectRef, Signal};
use crate::state::ScriptContext;

// ── VariantType ───────────────────────────────────────────────────────────────

/// Discriminant of a [`Variant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantType {
    Nil,
    Bool,
    Int,
    Float,
    String,
    Vector2,
    Vector3,
    Color,
    Rect2,
    Plane,
    Array,
    Dictionary,
    Object,
    Signal,
    Callable,
}

impl VariantType {
    pub fn name(self) -> &'static str {
        match self {
            VariantType::Nil => "nil",
            VariantType::Bool => "bool",
            VariantType::Int => "int",
            VariantType::Float => "float",
            VariantType::String => "String",
            VariantType::Vector2 => "Vector2",
            VariantType::Vector3 => "Vector3",
            VariantType::Color => "Color",
            VariantType::Rect2 => "Rect2",
            VariantType::Plane => "Plane",
            VariantType::Array => "Array",
            VariantType::Dictionary => "Dictionary",
            VariantType::Object => "Object",
            VariantType::Signal => "Signal",
            VariantType::Callable => "Callable",
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Variant ───────────────────────────────────────────────────────────────────

/// A host value.
#[derive(Debug, Clone, Default)]
pub enum Variant {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Vector2(Vector2),
    Vector3(Vector3),
    Color(Color),
    Rect2(Rect2),
    Plane(Plane),
    Array(Vec<Variant>),
    /// Insertion-ordered key/value pairs.  Equality ignores order.
    Dictionary(Vec<(Variant, Variant)>),
    Object(ObjectRef),
    Signal(Signal),
    Callable(Callable),
}

impl Variant {
    pub fn get_type(&self) -> VariantType {
        match self {
            Variant::Nil => VariantType::Nil,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int(_) => VariantType::Int,
            Variant::Float(_) => VariantType::Float,
            Variant::String(_) => VariantType::String,
            Variant::Vector2(_) => VariantType::Vector2,
            Variant::Vector3(_) => VariantType::Vector3,
            Variant::Color(_) => VariantType::Color,
            Variant::Rect2(_) => VariantType::Rect2,
            Variant::Plane(_) => VariantType::Plane,
            Variant::Array(_) => VariantType::Array,
            Variant::Dictionary(_) => VariantType::Dictionary,
            Variant::Object(_) => VariantType::Object,
            Variant::Signal(_) => VariantType::Signal,
            Variant::Callable(_) => VariantType::Callable,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Variant::Nil)
    }

    /// Host truthiness: nil, false, zero, empty strings, zero vectors and
    /// empty containers are false.
    pub fn booleanize(&self) -> bool {
        match self {
            Variant::Nil => false,
            Variant::Bool(b) => *b,
            Variant::Int(n) => *n != 0,
            Variant::Float(x) => *x != 0.0,
            Variant::String(s) => !s.is_empty(),
            Variant::Vector2(v) => *v != Vector2::ZERO,
            Variant::Vector3(v) => *v != Vector3::ZERO,
            Variant::Color(c) => *c != Color::default(),
            Variant::Rect2(r) => *r != Rect2::default(),
            Variant::Plane(p) => *p != Plane::default(),
            Variant::Array(a) => !a.is_empty(),
            Variant::Dictionary(d) => !d.is_empty(),
            Variant::Object(_) | Variant::Signal(_) | Variant::Callable(_) => true,
        }
    }

    /// Numeric value of an `Int` or `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Int(n) => Some(*n as f64),
            Variant::Float(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Variant::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Keyed read with host "get" semantics: a missing key yields `Nil`.
    ///
    /// Arrays take an integer index, dictionaries any key, every other
    /// kind a property name.
    pub fn get(&self, key: &Variant) -> Variant {
        match (self, key) {
            (Variant::Array(items), Variant::Int(i)) => usize::try_from(*i)
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or_default(),
            (Variant::Dictionary(pairs), key) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default(),
            (_, Variant::String(name)) => builtin::get(self, name).unwrap_or_default(),
            _ => Variant::Nil,
        }
    }

    /// Keyed write.  Returns `false` (leaving `self` unchanged) when the key
    /// does not name a writable slot of the right type.
    pub fn set(&mut self, key: &Variant, value: Variant) -> bool {
        match (self, key) {
            (Variant::Array(items), Variant::Int(i)) => {
                match usize::try_from(*i).ok().and_then(|i| items.get_mut(i)) {
                    Some(slot) => {
                        *slot = value;
                        true
                    }
                    None => false,
                }
            }
            (Variant::Dictionary(pairs), key) => {
                match pairs.iter_mut().find(|(k, _)| k == key) {
                    Some((_, slot)) => *slot = value,
                    None => pairs.push((key.clone(), value)),
                }
                true
            }
            (this, Variant::String(name)) => builtin::set(this, name, value),
            _ => false,
        }
    }

    /// Whether `name` is a callable member of this value.
    pub fn has_method(&self, name: &str) -> bool {
        builtin::has_method(self, name)
    }

    /// Invoke a member method.
    pub fn call(
        &self,
        ctx: &ScriptContext<'_>,
        method: &str,
        args: &[Variant],
    ) -> Result<Variant, CallError> {
        builtin::call(self, ctx, method, args)
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Variant::Nil, Variant::Nil) => true,
            (Variant::Bool(a), Variant::Bool(b)) => a == b,
            (Variant::Int(a), Variant::Int(b)) => a == b,
            (Variant::Float(a), Variant::Float(b)) => a == b,
            (Variant::String(a), Variant::String(b)) => a == b,
            (Variant::Vector2(a), Variant::Vector2(b)) => a == b,
            (Variant::Vector3(a), Variant::Vector3(b)) => a == b,
            (Variant::Color(a), Variant::Color(b)) => a == b,
            (Variant::Rect2(a), Variant::Rect2(b)) => a == b,
            (Variant::Plane(a), Variant::Plane(b)) => a == b,
            (Variant::Array(a), Variant::Array(b)) => a == b,
            (Variant::Dictionary(a), Variant::Dictionary(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.iter().any(|(bk, bv)| k == bk && v == bv))
            }
            (Variant::Object(a), Variant::Object(b)) => a == b,
            (Variant::Signal(a), Variant::Signal(b)) => a == b,
            (Variant::Callable(a), Variant::Callable(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Nil => f.write_str("<null>"),
            Variant::Bool(b) => write!(f, "{b}"),
            Variant::Int(n) => write!(f, "{n}"),
            Variant::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 1e15 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Variant::String(s) => f.write_str(s),
            Variant::Vector2(v) => write!(f, "{v}"),
            Variant::Vector3(v) => write!(f, "{v}"),
            Variant::Color(c) => write!(f, "{c}"),
            Variant::Rect2(r) => write!(f, "{r}"),
            Variant::Plane(p) => write!(f, "{p}"),
            Variant::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Variant::Dictionary(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Variant::Object(o) => write!(f, "<{o:?}>"),
            Variant::Signal(s) => write!(f, "{s}"),
            Variant::Callable(c) => write!(f, "{c}"),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl From<bool> for Variant {
    fn from(b: bool) -> Self {
        Variant::Bool(b)
    }
}

impl From<i64> for Variant {
    fn from(n: i64) -> Self {
        Variant::Int(n)
    }
}

impl From<i32> for Variant {
    fn from(n: i32) -> Self {
        Variant::Int(n.into())
    }
}

impl From<f64> for Variant {
    fn from(x: f64) -> Self {
        Variant::Float(x)
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Self {
        Variant::String(s.to_owned())
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Self {
        Variant::String(s)
    }
}

impl From<Vector2> for Variant {
    fn from(v: Vector2) -> Self {
        Variant::Vector2(v)
    }
}

impl From<Vector3> for Variant {
    fn from(v: Vector3) -> Self {
        Variant::Vector3(v)
    }
}

impl From<Color> for Variant {
    fn from(c: Color) -> Self {
        Variant::Color(c)
    }
}

impl From<Rect2> for Variant {
    fn from(r: Rect2) -> Self {
        Variant::Rect2(r)
    }
}

impl From<Plane> for Variant {
    fn from(p: Plane) -> Self {
        Variant::Plane(p)
    }
}

impl From<Vec<Variant>> for Variant {
    fn from(items: Vec<Variant>) -> Self {
        Variant::Array(items)
    }
}

impl From<ObjectRef> for Variant {
    fn from(o: ObjectRef) -> Self {
        Variant::Object(o)
    }
}

impl From<Signal> for Variant {
    fn from(s: Signal) -> Self {
        Variant::Signal(s)
    }
}

impl From<Callable> for Variant {
    fn from(c: Callable) -> Self {
        Variant::Callable(c)
    }
}

impl<T: Into<Variant>> From<Option<T>> for Variant {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_cross_kind_equality() {
        assert_ne!(Variant::Int(1), Variant::Float(1.0));
        assert_ne!(Variant::Nil, Variant::Bool(false));
        assert_ne!(
            Variant::Vector2(Vector2::ZERO),
            Variant::Vector3(Vector3::ZERO)
        );
    }

    #[test]
    fn booleanize() {
        assert!(!Variant::Nil.booleanize());
        assert!(!Variant::Int(0).booleanize());
        assert!(!Variant::String(String::new()).booleanize());
        assert!(!Variant::Vector2(Vector2::ZERO).booleanize());
        assert!(Variant::Vector2(Vector2::new(0.0, 1.0)).booleanize());
        assert!(!Variant::Array(vec![]).booleanize());
        assert!(Variant::Float(0.5).booleanize());
    }

    #[test]
    fn property_get_and_set() {
        let mut v = Variant::Vector2(Vector2::new(1.0, 2.0));
        assert_eq!(v.get(&"x".into()), Variant::Float(1.0));
        assert!(v.set(&"y".into(), Variant::Int(5)));
        assert_eq!(v, Variant::Vector2(Vector2::new(1.0, 5.0)));
    }

    #[test]
    fn unknown_property_is_nil_and_unwritable() {
        let mut v = Variant::Color(Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(v.get(&"nope".into()), Variant::Nil);
        assert!(!v.set(&"nope".into(), Variant::Int(1)));
        assert!(!v.set(&"r".into(), Variant::String("red".into())));
        assert_eq!(v, Variant::Color(Color::rgb(1.0, 0.0, 0.0)));
    }

    #[test]
    fn container_indexing() {
        let mut arr = Variant::Array(vec![Variant::Int(1), Variant::Int(2)]);
        assert_eq!(arr.get(&Variant::Int(1)), Variant::Int(2));
        assert_eq!(arr.get(&Variant::Int(5)), Variant::Nil);
        assert!(arr.set(&Variant::Int(0), Variant::Bool(true)));
        assert!(!arr.set(&Variant::Int(-1), Variant::Nil));

        let mut dict = Variant::Dictionary(vec![]);
        assert!(dict.set(&"k".into(), Variant::Int(3)));
        assert!(dict.set(&"k".into(), Variant::Int(4)));
        assert_eq!(dict.get(&"k".into()), Variant::Int(4));
        assert_eq!(dict, Variant::Dictionary(vec![("k".into(), Variant::Int(4))]));
    }

    #[test]
    fn dictionary_equality_ignores_order() {
        let a = Variant::Dictionary(vec![("a".into(), Variant::Int(1)), ("b".into(), Variant::Int(2))]);
        let b = Variant::Dictionary(vec![("b".into(), Variant::Int(2)), ("a".into(), Variant::Int(1))]);
        assert_eq!(a, b);
        let c = Variant::Dictionary(vec![("a".into(), Variant::Int(1))]);
        assert_ne!(a, c);
    }

    #[test]
    fn display() {
        assert_eq!(Variant::Nil.to_string(), "<null>");
        assert_eq!(Variant::Float(2.0).to_string(), "2.0");
        assert_eq!(
            Variant::Array(vec![Variant::Int(1), "a".into()]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Variant::from(None::<i64>), Variant::Nil);
        assert_eq!(Variant::from(Some(3i64)), Variant::Int(3));
    }
}
