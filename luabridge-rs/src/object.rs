//! Host object vocabulary: objects, override members, signals and callables.
//!
//! The host side exposes itself to the bridge through one trait,
//! [`HostObject`].  Every method has a default so that an object which
//! implements nothing but [`HostObject::class_name`] is still usable from
//! scripts (with reduced capability).
//!
//! Operator overloading and default-behaviour replacement go through the
//! single capability query [`HostObject::try_override`]: the bridge asks
//! "do you declare `__add`?" by calling it with [`MetaOp::Add`], and a
//! `None` answer means the member is not declared.

use std::fmt;
use std::rc::Rc;

use crate::error::ScriptError;
use crate::state::ScriptContext;
use crate::variant::{Variant, VariantType};

// ── CallError ─────────────────────────────────────────────────────────────────

/// Failure of a host-side call, following the host's call-error conventions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error("invalid method '{0}'")]
    InvalidMethod(String),
    #[error("too many arguments: expected {expected}, got {got}")]
    TooManyArguments { expected: usize, got: usize },
    #[error("too few arguments: expected {expected}, got {got}")]
    TooFewArguments { expected: usize, got: usize },
    /// `index` is one-based, as reported to script authors.
    #[error("invalid type in argument {index}: expected {expected}, got {got}")]
    InvalidArgument {
        index: usize,
        expected: VariantType,
        got: VariantType,
    },
    /// The call went through a null signal.
    #[error("instance is null")]
    InstanceIsNull,
    /// A script function called from the host failed.
    #[error(transparent)]
    Script(ScriptError),
    #[error("{0}")]
    Failed(String),
}

impl CallError {
    /// Checks `args.len()` against an inclusive range.
    pub fn check_arity(args: &[Variant], min: usize, max: usize) -> Result<(), CallError> {
        if args.len() < min {
            Err(CallError::TooFewArguments { expected: min, got: args.len() })
        } else if args.len() > max {
            Err(CallError::TooManyArguments { expected: max, got: args.len() })
        } else {
            Ok(())
        }
    }
}

// ── MetaOp ────────────────────────────────────────────────────────────────────

/// An override member a host object may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaOp {
    Index,
    NewIndex,
    Call,
    ToString,
    Len,
    Unm,
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    Concat,
    BAnd,
    BOr,
    BXor,
    BNot,
    Shl,
    Shr,
    Eq,
    Lt,
    Le,
    /// Finalize.
    Gc,
    /// Metatable name.
    Metatable,
}

impl MetaOp {
    /// Binary operators, in the order their metamethods are registered.
    pub const BINARY: &'static [MetaOp] = &[
        MetaOp::Add,
        MetaOp::Sub,
        MetaOp::Mul,
        MetaOp::Div,
        MetaOp::IDiv,
        MetaOp::Mod,
        MetaOp::Pow,
        MetaOp::Concat,
        MetaOp::BAnd,
        MetaOp::BOr,
        MetaOp::BXor,
        MetaOp::Shl,
        MetaOp::Shr,
    ];

    /// The Lua metamethod name, which is also the override member name.
    pub fn metamethod(self) -> &'static str {
        match self {
            MetaOp::Index => "__index",
            MetaOp::NewIndex => "__newindex",
            MetaOp::Call => "__call",
            MetaOp::ToString => "__tostring",
            MetaOp::Len => "__len",
            MetaOp::Unm => "__unm",
            MetaOp::Add => "__add",
            MetaOp::Sub => "__sub",
            MetaOp::Mul => "__mul",
            MetaOp::Div => "__div",
            MetaOp::IDiv => "__idiv",
            MetaOp::Mod => "__mod",
            MetaOp::Pow => "__pow",
            MetaOp::Concat => "__concat",
            MetaOp::BAnd => "__band",
            MetaOp::BOr => "__bor",
            MetaOp::BXor => "__bxor",
            MetaOp::BNot => "__bnot",
            MetaOp::Shl => "__shl",
            MetaOp::Shr => "__shr",
            MetaOp::Eq => "__eq",
            MetaOp::Lt => "__lt",
            MetaOp::Le => "__le",
            MetaOp::Gc => "__gc",
            MetaOp::Metatable => "__metatable",
        }
    }

    /// Look up an override by its member name (e.g. `"__add"`).
    pub fn from_metamethod(name: &str) -> Option<MetaOp> {
        const ALL: &[MetaOp] = &[
            MetaOp::Index,
            MetaOp::NewIndex,
            MetaOp::Call,
            MetaOp::ToString,
            MetaOp::Len,
            MetaOp::Unm,
            MetaOp::Add,
            MetaOp::Sub,
            MetaOp::Mul,
            MetaOp::Div,
            MetaOp::IDiv,
            MetaOp::Mod,
            MetaOp::Pow,
            MetaOp::Concat,
            MetaOp::BAnd,
            MetaOp::BOr,
            MetaOp::BXor,
            MetaOp::BNot,
            MetaOp::Shl,
            MetaOp::Shr,
            MetaOp::Eq,
            MetaOp::Lt,
            MetaOp::Le,
            MetaOp::Gc,
            MetaOp::Metatable,
        ];
        ALL.iter().copied().find(|op| op.metamethod() == name)
    }
}

// ── HostObject ────────────────────────────────────────────────────────────────

/// An opaque host object that scripts can index, mutate, call and apply
/// operators to.
///
/// Interior mutability is the implementor's business: every method takes
/// `&self` because the same object may be reachable from several boxes.
pub trait HostObject: 'static {
    /// Host class name, used for diagnostics and default string conversion.
    fn class_name(&self) -> &str;

    /// Property read.  `None` when the property does not exist.
    fn get(&self, _property: &str) -> Option<Variant> {
        None
    }

    /// Property write.  Returns `false` when the property does not exist
    /// or refuses the value.
    fn set(&self, _property: &str, _value: Variant) -> bool {
        false
    }

    fn has_method(&self, _method: &str) -> bool {
        false
    }

    fn call(
        &self,
        _ctx: &ScriptContext<'_>,
        method: &str,
        _args: &[Variant],
    ) -> Result<Variant, CallError> {
        Err(CallError::InvalidMethod(method.to_owned()))
    }

    /// The declared script-visible field list.  Queried on every access.
    fn script_fields(&self) -> Option<Vec<String>> {
        None
    }

    /// Invoke the override member for `op` if the object declares one.
    ///
    /// Arguments per operation: `Index` gets `[key]`, `NewIndex` gets
    /// `[key, value]`, `Call` gets `[Array(args)]`, binary operators get
    /// `[other]`, everything else gets `[]`.
    ///
    /// `Gc` runs when a box is finalized, outside any script call, so its
    /// context is always [detached](ScriptContext::is_detached) and cannot
    /// reach the interpreter.  Its result is ignored.
    fn try_override(
        &self,
        _ctx: &ScriptContext<'_>,
        _op: MetaOp,
        _args: &[Variant],
    ) -> Option<Result<Variant, CallError>> {
        None
    }
}

// ── ObjectRef ─────────────────────────────────────────────────────────────────

/// Shared strong reference to a host object.  Its strong count is the
/// object's reference count; every box in script space holds one.
#[derive(Clone)]
pub struct ObjectRef(Rc<dyn HostObject>);

impl ObjectRef {
    pub fn new<T: HostObject>(object: T) -> Self {
        Self(Rc::new(object))
    }

    /// Number of live strong references (host side and script boxes).
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Identity comparison, ignoring vtable metadata.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }

    /// Stable address-based identifier for as long as the object lives.
    pub fn instance_id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T: HostObject> From<Rc<T>> for ObjectRef {
    fn from(rc: Rc<T>) -> Self {
        Self(rc)
    }
}

impl From<Rc<dyn HostObject>> for ObjectRef {
    fn from(rc: Rc<dyn HostObject>) -> Self {
        Self(rc)
    }
}

impl std::ops::Deref for ObjectRef {
    type Target = dyn HostObject;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{:x}", self.class_name(), self.instance_id())
    }
}

// ── Signal ────────────────────────────────────────────────────────────────────

/// A named signal on a host object.  Signal operations are forwarded to
/// the owner's `emit_signal`, `connect`, `disconnect` and `is_connected`
/// methods.
///
/// A signal is null when it has no name or its owner cannot emit signals;
/// every operation on a null signal fails with [`CallError::InstanceIsNull`].
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub object: ObjectRef,
    pub name: String,
}

impl Signal {
    pub fn new(object: ObjectRef, name: impl Into<String>) -> Self {
        Self { object, name: name.into() }
    }

    pub fn is_null(&self) -> bool {
        self.name.is_empty() || !self.object.has_method("emit_signal")
    }

    pub fn emit(&self, ctx: &ScriptContext<'_>, args: &[Variant]) -> Result<Variant, CallError> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(Variant::String(self.name.clone()));
        full.extend_from_slice(args);
        self.forward(ctx, "emit_signal", &full)
    }

    pub fn connect(&self, ctx: &ScriptContext<'_>, target: Callable) -> Result<Variant, CallError> {
        let args = [Variant::String(self.name.clone()), Variant::Callable(target)];
        self.forward(ctx, "connect", &args)
    }

    pub fn disconnect(&self, ctx: &ScriptContext<'_>, target: Callable) -> Result<Variant, CallError> {
        let args = [Variant::String(self.name.clone()), Variant::Callable(target)];
        self.forward(ctx, "disconnect", &args)
    }

    pub fn is_connected(&self, ctx: &ScriptContext<'_>, target: Callable) -> Result<Variant, CallError> {
        let args = [Variant::String(self.name.clone()), Variant::Callable(target)];
        self.forward(ctx, "is_connected", &args)
    }

    fn forward(&self, ctx: &ScriptContext<'_>, method: &str, args: &[Variant]) -> Result<Variant, CallError> {
        if self.is_null() {
            return Err(CallError::InstanceIsNull);
        }
        self.object.call(ctx, method, args)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}::[signal]{}", self.object, self.name)
    }
}

// ── Callable ──────────────────────────────────────────────────────────────────

type NativeCall = dyn Fn(&ScriptContext<'_>, &[Variant]) -> Result<Variant, CallError>;

/// A host closure callable from scripts.
#[derive(Clone)]
pub struct NativeFn {
    name: String,
    func: Rc<NativeCall>,
}

impl NativeFn {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ScriptContext<'_>, &[Variant]) -> Result<Variant, CallError> + 'static,
    {
        Self { name: name.into(), func: Rc::new(func) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

/// A Lua function that crossed into host space, tagged with the
/// interpreter that owns it.  It can only be pushed back into, or called
/// through, that interpreter.
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    function: mlua::Function,
    owner: u64,
}

impl ScriptFunction {
    pub(crate) fn new(function: mlua::Function, owner: u64) -> Self {
        Self { function, owner }
    }

    pub fn function(&self) -> &mlua::Function {
        &self.function
    }

    /// Identifier of the owning interpreter.
    pub fn owner(&self) -> u64 {
        self.owner
    }
}

impl PartialEq for ScriptFunction {
    fn eq(&self, other: &Self) -> bool {
        // Functions of different interpreters must not be compared by mlua.
        self.owner == other.owner && self.function == other.function
    }
}

/// Where captured arguments go relative to the caller's arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindPlacement {
    Prepend,
    #[default]
    Append,
}

/// A host-side function reference.
#[derive(Debug, Clone)]
pub enum Callable {
    /// `object.method(...)`.
    Method { object: ObjectRef, method: String },
    Native(NativeFn),
    Script(ScriptFunction),
    /// Another callable with extra arguments captured at wrap time.
    Bound {
        target: Box<Callable>,
        extra: Vec<Variant>,
        placement: BindPlacement,
    },
}

impl Callable {
    pub fn method(object: ObjectRef, method: impl Into<String>) -> Self {
        Callable::Method { object, method: method.into() }
    }

    pub fn native<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ScriptContext<'_>, &[Variant]) -> Result<Variant, CallError> + 'static,
    {
        Callable::Native(NativeFn::new(name, func))
    }

    /// Wrap `self` so that `extra` is added to every call's arguments.
    pub fn bind(self, extra: Vec<Variant>, placement: BindPlacement) -> Self {
        Callable::Bound { target: Box::new(self), extra, placement }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Callable::Method { object, method } => object.has_method(method),
            Callable::Native(_) | Callable::Script(_) => true,
            Callable::Bound { target, .. } => target.is_valid(),
        }
    }

    /// Name of the target method, if it has one.
    pub fn method_name(&self) -> Option<&str> {
        match self {
            Callable::Method { method, .. } => Some(method),
            Callable::Native(f) => Some(f.name()),
            Callable::Script(_) => None,
            Callable::Bound { target, .. } => target.method_name(),
        }
    }

    /// The object a method callable targets, looking through bindings.
    pub fn object(&self) -> Option<&ObjectRef> {
        match self {
            Callable::Method { object, .. } => Some(object),
            Callable::Bound { target, .. } => target.object(),
            Callable::Native(_) | Callable::Script(_) => None,
        }
    }

    pub fn call(&self, ctx: &ScriptContext<'_>, args: &[Variant]) -> Result<Variant, CallError> {
        match self {
            Callable::Method { object, method } => object.call(ctx, method, args),
            Callable::Native(f) => (f.func)(ctx, args),
            Callable::Script(f) => ctx.call_script_function(f, args).map_err(CallError::Script),
            Callable::Bound { target, extra, placement } => {
                let mut full = Vec::with_capacity(args.len() + extra.len());
                match placement {
                    BindPlacement::Prepend => {
                        full.extend_from_slice(extra);
                        full.extend_from_slice(args);
                    }
                    BindPlacement::Append => {
                        full.extend_from_slice(args);
                        full.extend_from_slice(extra);
                    }
                }
                target.call(ctx, &full)
            }
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Callable::Method { object: a, method: m },
                Callable::Method { object: b, method: n },
            ) => a.ptr_eq(b) && m == n,
            (Callable::Native(a), Callable::Native(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(&a.func), Rc::as_ptr(&b.func))
            }
            (Callable::Script(a), Callable::Script(b)) => a == b,
            (
                Callable::Bound { target: a, extra: x, placement: p },
                Callable::Bound { target: b, extra: y, placement: q },
            ) => a == b && x == y && p == q,
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Method { object, method } => write!(f, "{object:?}::{method}"),
            Callable::Native(n) => write!(f, "{}", n.name()),
            Callable::Script(_) => f.write_str("<lua function>"),
            Callable::Bound { target, .. } => write!(f, "{target} (bound)"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
