use std::io::Read;

use tracing_subscriber::EnvFilter;

use luabridge::cli::{self, ConfigFile};
use luabridge::{BridgeConfig, LuaBridge, Variant};

const USAGE: &str =
    "Usage: luabridge [-prdn] [-f[<file>]] [-l<libs>] [-t<events>] [-c<chunk>] [<script.lua> [args...]]";

fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("luabridge: {e}");
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    // ── Logging: RUST_LOG wins over -d ───────────────────────────────────────
    let default_level = if args.debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    // ── Load config, then apply command-line overrides ───────────────────────
    let config_path = match args.config {
        ConfigFile::Skip => None,
        ConfigFile::Explicit(path) => Some(path),
        ConfigFile::Search => cli::find_user_config(),
    };
    let mut config = BridgeConfig::default();
    if let Some(path) = config_path {
        match BridgeConfig::load_file(&path) {
            Ok((loaded, errors)) => {
                for e in errors {
                    eprintln!("luabridge: warning: {}: {e}", path.display());
                }
                config = loaded;
            }
            Err(e) => eprintln!("luabridge: warning: {}: {e}", path.display()),
        }
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if args.no_std {
        config.bind_std = false;
    }
    config.libraries.extend(args.libraries);
    if let Some(mask) = args.trace {
        config.hook = mask;
        if config.hook_count == 0 {
            config.hook_count = 1000;
        }
    }

    let bridge = match LuaBridge::new(&config) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("luabridge: {e}");
            std::process::exit(1);
        }
    };

    // ── Script arguments ─────────────────────────────────────────────────────
    let script_args: Vec<Variant> = args.script_args.into_iter().map(Variant::String).collect();
    if let Err(e) = bridge.push_global("arg", &Variant::Array(script_args)) {
        eprintln!("luabridge: {e}");
        std::process::exit(1);
    }

    let mut failed = false;

    // ── Startup chunk (-c<chunk>) ────────────────────────────────────────────
    if let Some(chunk) = &args.command {
        if let Err(e) = bridge.exec_named("=(command line)", chunk) {
            eprintln!("luabridge: {e}");
            failed = true;
        }
    }

    // ── Script, or stdin when nothing else was given ─────────────────────────
    let result = match (&args.script, &args.command) {
        (Some(path), _) => Some(bridge.load_file(path)),
        (None, None) => {
            let mut source = String::new();
            match std::io::stdin().read_to_string(&mut source) {
                Ok(_) => Some(bridge.exec_named("=stdin", &source)),
                Err(e) => {
                    eprintln!("luabridge: stdin: {e}");
                    std::process::exit(1);
                }
            }
        }
        (None, Some(_)) => None,
    };
    if let Some(Err(e)) = result {
        eprintln!("luabridge: {e}");
        if let Some(tb) = &e.traceback {
            eprintln!("{tb}");
        }
        failed = true;
    }

    if failed {
        std::process::exit(1);
    }
}
