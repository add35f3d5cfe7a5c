use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mlua::Lua;

use luabridge::codec::{from_lua_value, to_lua_value};
use luabridge::{BridgeConfig, LuaBridge, Variant, Vector2};

fn make_array(len: usize) -> Variant {
    Variant::Array((0..len as i64).map(Variant::Int).collect())
}

fn make_dictionary(len: usize) -> Variant {
    Variant::Dictionary(
        (0..len)
            .map(|i| (Variant::String(format!("key{i}")), Vector2::new(i as f64, 1.0).into()))
            .collect(),
    )
}

fn bench_codec(c: &mut Criterion) {
    let lua = Lua::new();
    let small = make_array(16);
    let large = make_array(4096);
    let dict = make_dictionary(256);

    let mut g = c.benchmark_group("codec");

    g.bench_function("scalar_round_trip", |b| {
        let v = Variant::Float(1.5);
        b.iter(|| from_lua_value(&lua, &to_lua_value(&lua, black_box(&v)).unwrap()))
    });
    g.bench_function("vector2_round_trip", |b| {
        let v = Variant::from(Vector2::new(1.0, 2.0));
        b.iter(|| from_lua_value(&lua, &to_lua_value(&lua, black_box(&v)).unwrap()))
    });
    g.bench_function("array_16", |b| {
        b.iter(|| from_lua_value(&lua, &to_lua_value(&lua, black_box(&small)).unwrap()))
    });
    g.bench_function("array_4096", |b| {
        b.iter(|| from_lua_value(&lua, &to_lua_value(&lua, black_box(&large)).unwrap()))
    });
    g.bench_function("dictionary_256", |b| {
        b.iter(|| from_lua_value(&lua, &to_lua_value(&lua, black_box(&dict)).unwrap()))
    });

    g.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let bridge = LuaBridge::new(&BridgeConfig::default()).unwrap();
    bridge.push_global("v", &Vector2::new(3.0, 4.0).into()).unwrap();

    let mut g = c.benchmark_group("dispatch");
    g.bench_function("property_read", |b| b.iter(|| bridge.eval(black_box("v.x")).unwrap()));
    g.bench_function("method_call", |b| b.iter(|| bridge.eval(black_box("v:length()")).unwrap()));
    g.bench_function("operator", |b| b.iter(|| bridge.eval(black_box("v + v")).unwrap()));
    g.finish();
}

criterion_group!(benches, bench_codec, bench_dispatch);
criterion_main!(benches);
