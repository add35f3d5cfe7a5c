//! End-to-end tests: host objects, values and hooks driven from Lua source
//! through a [`LuaBridge`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use luabridge::{
    AccessMode, BindPlacement, BridgeConfig, CallError, Callable, ErrorKind, HookEventKind,
    HookMask, HostObject, LuaBridge, MetaOp, ObjectRef, ScriptContext, Signal, Variant, Vector2,
};

// ── Test object ───────────────────────────────────────────────────────────────

/// A scriptable object with two properties (`x`, `y`), a handful of
/// methods and an optional set of override members.
struct Widget {
    props: RefCell<HashMap<String, Variant>>,
    fields: Vec<String>,
    overrides: Vec<MetaOp>,
    finalized: Rc<Cell<usize>>,
    /// Finalizations that saw a detached context.
    finalized_detached: Rc<Cell<usize>>,
    created: Rc<Cell<usize>>,
    connections: RefCell<Vec<(String, Callable)>>,
}

impl Widget {
    fn new() -> Self {
        let mut props = HashMap::new();
        props.insert("x".to_owned(), Variant::Int(1));
        props.insert("y".to_owned(), Variant::Int(2));
        Self {
            props: RefCell::new(props),
            fields: vec!["x".to_owned()],
            overrides: Vec::new(),
            finalized: Rc::new(Cell::new(0)),
            finalized_detached: Rc::new(Cell::new(0)),
            created: Rc::new(Cell::new(0)),
            connections: RefCell::new(Vec::new()),
        }
    }

    fn with_overrides(ops: &[MetaOp]) -> Self {
        Self { overrides: ops.to_vec(), ..Self::new() }
    }
}

impl HostObject for Widget {
    fn class_name(&self) -> &str {
        "Widget"
    }

    fn get(&self, property: &str) -> Option<Variant> {
        self.props.borrow().get(property).cloned()
    }

    fn set(&self, property: &str, value: Variant) -> bool {
        match self.props.borrow_mut().get_mut(property) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn has_method(&self, method: &str) -> bool {
        matches!(method, "sum" | "fail" | "new" | "emit_signal" | "connect")
    }

    fn call(&self, ctx: &ScriptContext<'_>, method: &str, args: &[Variant]) -> Result<Variant, CallError> {
        match method {
            "sum" => Ok(Variant::Float(args.iter().filter_map(Variant::as_f64).sum())),
            "fail" => Err(CallError::Failed("boom".to_owned())),
            "new" => {
                self.created.set(self.created.get() + 1);
                Ok(Variant::Object(ObjectRef::new(Widget::new())))
            }
            "connect" => {
                CallError::check_arity(args, 2, 2)?;
                let (Some(name), Variant::Callable(target)) = (args[0].as_str(), &args[1]) else {
                    return Err(CallError::Failed("bad connect".to_owned()));
                };
                self.connections.borrow_mut().push((name.to_owned(), target.clone()));
                Ok(Variant::Nil)
            }
            "emit_signal" => {
                let name = args.first().and_then(Variant::as_str).unwrap_or_default().to_owned();
                let targets: Vec<Callable> = self
                    .connections
                    .borrow()
                    .iter()
                    .filter(|(n, _)| *n == name)
                    .map(|(_, c)| c.clone())
                    .collect();
                for target in targets {
                    target.call(ctx, &args[1..])?;
                }
                Ok(Variant::Nil)
            }
            _ => Err(CallError::InvalidMethod(method.to_owned())),
        }
    }

    fn script_fields(&self) -> Option<Vec<String>> {
        Some(self.fields.clone())
    }

    fn try_override(
        &self,
        ctx: &ScriptContext<'_>,
        op: MetaOp,
        args: &[Variant],
    ) -> Option<Result<Variant, CallError>> {
        if op == MetaOp::Gc {
            self.finalized.set(self.finalized.get() + 1);
            if ctx.is_detached() {
                self.finalized_detached.set(self.finalized_detached.get() + 1);
            }
            return None;
        }
        if !self.overrides.contains(&op) {
            return None;
        }
        Some(match op {
            MetaOp::Index => Ok(Variant::String(format!("index:{}", args[0]))),
            MetaOp::NewIndex => {
                self.props.borrow_mut().insert("last_write".to_owned(), args[1].clone());
                Ok(Variant::Nil)
            }
            MetaOp::Call => Ok(args[0].clone()),
            MetaOp::ToString => Ok(Variant::Int(42)),
            MetaOp::Metatable => Ok(Variant::String("Custom".to_owned())),
            MetaOp::Add => Ok(Variant::String(format!("add:{}", args[0]))),
            MetaOp::Len => Ok(Variant::Int(7)),
            MetaOp::Eq => Ok(Variant::Bool(true)),
            _ => Err(CallError::Failed("unexpected override".to_owned())),
        })
    }
}

fn bridge() -> LuaBridge {
    LuaBridge::new(&BridgeConfig::default()).unwrap()
}

fn eval(bridge: &LuaBridge, code: &str) -> Variant {
    bridge.eval(code).unwrap_or_else(|e| panic!("{code}: {e}"))
}

fn error_of(bridge: &LuaBridge, code: &str) -> String {
    match bridge.exec(code) {
        Ok(()) => panic!("{code}: expected an error"),
        Err(e) => e.message,
    }
}

// ── Field policy ──────────────────────────────────────────────────────────────

#[test]
fn restrictive_mode_is_a_whitelist() {
    let b = bridge();
    assert_eq!(b.access_mode(), AccessMode::Restrictive);
    let widget = ObjectRef::new(Widget::new());
    b.push_global("p", &widget.clone().into()).unwrap();

    assert_eq!(eval(&b, "p.x"), Variant::Int(1));
    assert_eq!(eval(&b, "p.y"), Variant::Nil);

    b.exec("p.x = 10; p.y = 20").unwrap();
    assert_eq!(widget.get("x"), Some(Variant::Int(10)));
    assert_eq!(widget.get("y"), Some(Variant::Int(2)));
}

#[test]
fn permissive_mode_is_a_blacklist() {
    let b = bridge();
    b.set_permissive(true);
    let widget = ObjectRef::new(Widget::new());
    b.push_global("p", &widget.clone().into()).unwrap();

    assert_eq!(eval(&b, "p.x"), Variant::Nil);
    assert_eq!(eval(&b, "p.y"), Variant::Int(2));

    b.exec("p.x = 10; p.y = 20").unwrap();
    assert_eq!(widget.get("x"), Some(Variant::Int(1)));
    assert_eq!(widget.get("y"), Some(Variant::Int(20)));
}

#[test]
fn mode_switch_applies_to_live_boxes() {
    let b = bridge();
    b.push_global("p", &ObjectRef::new(Widget::new()).into()).unwrap();
    assert_eq!(eval(&b, "p.y"), Variant::Nil);
    b.set_permissive(true);
    assert_eq!(eval(&b, "p.y"), Variant::Int(2));
}

#[test]
fn unknown_fields_read_as_nil() {
    let b = bridge();
    b.set_permissive(true);
    b.push_global("p", &ObjectRef::new(Widget::new()).into()).unwrap();
    assert_eq!(eval(&b, "p.missing"), Variant::Nil);
    assert_eq!(eval(&b, "p[1]"), Variant::Nil);
    b.exec("p.missing = 1; p[1] = 2").unwrap();
}

// ── Reference counting ────────────────────────────────────────────────────────

#[test]
fn boxes_release_their_references() {
    let b = bridge();
    let widget = Widget::new();
    let finalized = widget.finalized.clone();
    let finalized_detached = widget.finalized_detached.clone();
    let object = ObjectRef::new(widget);
    let baseline = object.ref_count();

    for i in 0..5 {
        b.push_global(&format!("p{i}"), &object.clone().into()).unwrap();
    }
    assert_eq!(object.ref_count(), baseline + 5);

    b.exec("p0 = nil").unwrap();
    b.collect_garbage().unwrap();
    assert_eq!(object.ref_count(), baseline + 4);
    assert_eq!(finalized.get(), 1);
    assert_eq!(eval(&b, "p1.x"), Variant::Int(1));

    b.exec("p1, p2, p3, p4 = nil").unwrap();
    b.collect_garbage().unwrap();
    b.collect_garbage().unwrap();
    assert_eq!(object.ref_count(), baseline);
    assert_eq!(finalized.get(), 5);
    assert_eq!(finalized_detached.get(), 5);
}

#[test]
fn closing_the_interpreter_releases_references() {
    let object = ObjectRef::new(Widget::new());
    {
        let b = bridge();
        b.push_global("p", &object.clone().into()).unwrap();
        b.exec("q = p").unwrap();
        assert_eq!(object.ref_count(), 2);
    }
    assert_eq!(object.ref_count(), 1);
}

#[test]
fn round_trip_keeps_identity() {
    let b = bridge();
    let object = ObjectRef::new(Widget::new());
    b.push_global("p", &object.clone().into()).unwrap();
    let back = b.pull_global("p").unwrap();
    assert!(back.as_object().is_some_and(|o| o.ptr_eq(&object)));
}

// ── Operators without overrides ───────────────────────────────────────────────

#[test]
fn undeclared_operators_decline() {
    let b = bridge();
    b.push_global("p", &ObjectRef::new(Widget::new()).into()).unwrap();

    assert!(error_of(&b, "return p + 1").contains("attempt to perform arithmetic"));
    assert!(error_of(&b, "return 1 + p").contains("attempt to perform arithmetic"));
    assert!(error_of(&b, "return p()").contains("attempt to call"));
    assert!(error_of(&b, "return p .. 'x'").contains("attempt to concatenate"));
    assert!(error_of(&b, "return #p").contains("attempt to get length"));
    assert!(error_of(&b, "return -p").contains("attempt to perform arithmetic"));
    assert!(error_of(&b, "return p < p").contains("attempt to compare"));
}

#[test]
fn equality_is_identity_by_default() {
    let b = bridge();
    let object = ObjectRef::new(Widget::new());
    b.push_global("a", &object.clone().into()).unwrap();
    b.push_global("b", &object.into()).unwrap();
    b.push_global("c", &ObjectRef::new(Widget::new()).into()).unwrap();
    assert_eq!(eval(&b, "a == b"), Variant::Bool(true));
    assert_eq!(eval(&b, "a == c"), Variant::Bool(false));
    assert_eq!(eval(&b, "a ~= c"), Variant::Bool(true));
}

#[test]
fn default_tostring_names_the_class() {
    let b = bridge();
    b.push_global("p", &ObjectRef::new(Widget::new()).into()).unwrap();
    let Variant::String(text) = eval(&b, "tostring(p)") else { panic!("not a string") };
    assert!(text.starts_with("Widget: 0x"), "{text}");
    assert_eq!(eval(&b, "type(p)"), Variant::String("userdata".into()));
}

// ── Overrides ─────────────────────────────────────────────────────────────────

#[test]
fn index_and_newindex_overrides_replace_policy() {
    let b = bridge();
    let object = ObjectRef::new(Widget::with_overrides(&[MetaOp::Index, MetaOp::NewIndex]));
    b.push_global("p", &object.clone().into()).unwrap();

    assert_eq!(eval(&b, "p.y"), Variant::String("index:y".into()));
    assert_eq!(eval(&b, "p[3]"), Variant::String("index:3".into()));
    b.exec("p.anything = 'v'").unwrap();
    assert_eq!(object.get("last_write"), Some(Variant::String("v".into())));
}

#[test]
fn call_override_receives_argument_array() {
    let b = bridge();
    b.push_global("p", &ObjectRef::new(Widget::with_overrides(&[MetaOp::Call])).into()).unwrap();
    assert_eq!(
        eval(&b, "p(1, 'two')"),
        Variant::Array(vec![Variant::Int(1), Variant::String("two".into())])
    );
    assert_eq!(eval(&b, "p()"), Variant::Array(Vec::new()));
}

#[test]
fn tostring_and_metatable_overrides() {
    let b = bridge();
    b.push_global("p", &ObjectRef::new(Widget::with_overrides(&[MetaOp::ToString])).into()).unwrap();
    assert_eq!(eval(&b, "tostring(p)"), Variant::String("42".into()));

    b.push_global("q", &ObjectRef::new(Widget::with_overrides(&[MetaOp::Metatable])).into())
        .unwrap();
    let Variant::String(text) = eval(&b, "tostring(q)") else { panic!("not a string") };
    assert!(text.starts_with("Custom: 0x"), "{text}");
}

#[test]
fn binary_override_on_left_operand() {
    let b = bridge();
    b.push_global("p", &ObjectRef::new(Widget::with_overrides(&[MetaOp::Add])).into()).unwrap();
    assert_eq!(eval(&b, "p + 5"), Variant::String("add:5".into()));
    assert!(error_of(&b, "return 5 + p").contains("attempt to perform arithmetic"));
}

#[test]
fn unary_and_equality_overrides() {
    let b = bridge();
    let object = ObjectRef::new(Widget::with_overrides(&[MetaOp::Len, MetaOp::Eq]));
    b.push_global("p", &object.into()).unwrap();
    b.push_global("q", &ObjectRef::new(Widget::new()).into()).unwrap();
    assert_eq!(eval(&b, "#p"), Variant::Int(7));
    assert_eq!(eval(&b, "p == q"), Variant::Bool(true));
}

// ── Methods ───────────────────────────────────────────────────────────────────

#[test]
fn bound_calls_accept_both_forms() {
    let b = bridge();
    b.set_permissive(true);
    b.push_global("p", &ObjectRef::new(Widget::new()).into()).unwrap();
    assert_eq!(eval(&b, "p:sum(1, 2, 3)"), Variant::Float(6.0));
    assert_eq!(eval(&b, "p.sum(1, 2, 3)"), Variant::Float(6.0));
    assert_eq!(eval(&b, "local f = p.sum return f(4)"), Variant::Float(4.0));
}

#[test]
fn methods_obey_the_field_policy() {
    let b = bridge();
    b.push_global("p", &ObjectRef::new(Widget::new()).into()).unwrap();
    assert_eq!(eval(&b, "p.sum"), Variant::Nil);
}

#[test]
fn host_errors_are_catchable_with_pcall() {
    let b = bridge();
    b.set_permissive(true);
    b.push_global("p", &ObjectRef::new(Widget::new()).into()).unwrap();
    let caught = eval(
        &b,
        "local ok, err = pcall(p.fail) return not ok and tostring(err):find('boom', 1, true) ~= nil",
    );
    assert_eq!(caught, Variant::Bool(true));
}

#[test]
fn host_errors_reach_the_host() {
    let b = bridge();
    b.set_permissive(true);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    b.set_error_handler(move |e| sink.borrow_mut().push(e.message.clone()));
    b.push_global("p", &ObjectRef::new(Widget::new()).into()).unwrap();

    let err = b.exec("p:fail()").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert!(err.message.contains("error calling 'fail': boom"), "{}", err.message);
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn exposed_constructor_builds_objects() {
    let b = bridge();
    b.set_permissive(true);
    let factory = Widget::new();
    let created = factory.created.clone();
    b.expose_constructor("Widget", ObjectRef::new(factory)).unwrap();

    assert_eq!(eval(&b, "Widget().y"), Variant::Int(2));
    assert_eq!(created.get(), 1);
    assert_eq!(eval(&b, "Widget() == Widget()"), Variant::Bool(false));
    assert_eq!(created.get(), 3);
    assert_eq!(eval(&b, "tostring(Widget()):sub(1, 7)"), Variant::String("Widget:".into()));
    assert!(matches!(eval(&b, "Widget()"), Variant::Object(_)));
    assert_eq!(created.get(), 5);
}

#[test]
fn constructor_requires_new() {
    struct Plain;
    impl HostObject for Plain {
        fn class_name(&self) -> &str {
            "Plain"
        }
    }
    let b = bridge();
    assert!(b.expose_constructor("Plain", ObjectRef::new(Plain)).is_err());
}

// ── Signals and callables ─────────────────────────────────────────────────────

#[test]
fn signal_connect_and_emit_from_script() {
    let b = bridge();
    let object = ObjectRef::new(Widget::new());
    b.push_global("changed", &Signal::new(object, "changed").into()).unwrap();
    b.exec("hits = 0 changed:connect(function(n) hits = hits + n end)").unwrap();
    b.exec("changed:emit(2) changed.emit(3)").unwrap();
    assert_eq!(b.pull_global("hits").unwrap(), Variant::Int(5));
    assert_eq!(eval(&b, "changed:get_name()"), Variant::String("changed".into()));
    assert_eq!(eval(&b, "changed:is_null()"), Variant::Bool(false));
}

#[test]
fn unnamed_signal_is_null() {
    let b = bridge();
    b.push_global("blank", &Signal::new(ObjectRef::new(Widget::new()), "").into()).unwrap();
    assert_eq!(eval(&b, "blank:is_null()"), Variant::Bool(true));
    assert!(error_of(&b, "blank:emit(1)").contains("instance is null"));
}

#[test]
fn callables_cross_both_ways() {
    let b = bridge();
    let doubler = Callable::native("double", |_, args| {
        Ok(Variant::Float(args.first().and_then(Variant::as_f64).unwrap_or_default() * 2.0))
    });
    b.push_global("double", &doubler.clone().into()).unwrap();
    assert_eq!(eval(&b, "double(21)"), Variant::Float(42.0));

    let bound = doubler.bind(vec![Variant::Int(5)], BindPlacement::Append);
    b.push_global("five", &bound.into()).unwrap();
    assert_eq!(eval(&b, "five()"), Variant::Float(10.0));
    assert_eq!(eval(&b, "tostring(five)"), Variant::String("double (bound)".into()));

    b.exec("function add(a, b) return a + b end").unwrap();
    let Variant::Callable(add) = b.pull_global("add").unwrap() else { panic!("not a callable") };
    let sum = add.call(&b.context(), &[Variant::Int(2), Variant::Int(3)]).unwrap();
    assert_eq!(sum, Variant::Int(5));
}

#[test]
fn script_functions_stay_with_their_interpreter() {
    let (home, away) = (bridge(), bridge());
    home.exec("function f() return 1 end").unwrap();
    let f = home.pull_global("f").unwrap();

    let err = away.push_global("g", &f).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ValueConversion);
    assert!(!away.function_exists("g"));

    let Variant::Callable(callable) = &f else { panic!("not a callable") };
    let err = callable.call(&away.context(), &[]).unwrap_err();
    assert!(matches!(err, CallError::Script(ref e) if e.kind == ErrorKind::ValueConversion), "{err}");

    home.push_global("g", &f).unwrap();
    assert_eq!(eval(&home, "g()"), Variant::Int(1));
}

// ── Values ────────────────────────────────────────────────────────────────────

#[test]
fn structured_values_mutate_in_place() {
    let b = bridge();
    b.push_global("v", &Vector2::new(1.0, 2.0).into()).unwrap();
    b.exec("v.x = 5").unwrap();
    assert_eq!(b.pull_global("v").unwrap(), Vector2::new(5.0, 2.0).into());
    assert_eq!(eval(&b, "v * Vector2(2, 3)"), Vector2::new(10.0, 6.0).into());
    assert_eq!(eval(&b, "v / Vector2(5, 2)"), Vector2::new(1.0, 1.0).into());
    assert!(error_of(&b, "return v * Vector3(1, 1, 1)").contains("attempt to perform arithmetic"));
}

#[test]
fn call_function_round_trips_values() {
    let b = bridge();
    b.exec("function wrap(...) return { ... } end").unwrap();
    let out = b
        .call_function("wrap", &[Variant::Int(1), Variant::String("s".into()), Vector2::ZERO.into()])
        .unwrap();
    assert_eq!(
        out,
        Variant::Array(vec![Variant::Int(1), Variant::String("s".into()), Vector2::ZERO.into()])
    );
    assert!(b.function_exists("wrap"));
    assert!(!b.function_exists("nope"));
}

// ── Hooks ─────────────────────────────────────────────────────────────────────

#[test]
fn line_hook_sees_every_line() {
    let b = bridge();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    b.install_hook(HookMask::LINE, 0, move |event| {
        sink.borrow_mut().push((event.kind, event.line));
        Ok(())
    })
    .unwrap();

    let chunk: Vec<String> = (1..=10).map(|i| format!("local v{i} = {i}")).collect();
    b.exec(&chunk.join("\n")).unwrap();
    b.remove_hook();

    let events = events.borrow();
    assert!(events.iter().all(|(kind, _)| *kind == HookEventKind::Line));
    let lines: Vec<u32> = events.iter().filter_map(|(_, line)| *line).collect();
    assert_eq!(lines, (1..=10).collect::<Vec<u32>>());
}

#[test]
fn hook_removal_stops_events() {
    let b = bridge();
    let count = Rc::new(Cell::new(0));
    let sink = count.clone();
    b.install_hook(HookMask::LINE, 0, move |_| {
        sink.set(sink.get() + 1);
        Ok(())
    })
    .unwrap();
    b.remove_hook();
    b.exec("local a = 1\nlocal b = 2").unwrap();
    assert_eq!(count.get(), 0);
}
