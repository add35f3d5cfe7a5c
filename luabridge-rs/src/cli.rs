//! Command-line argument parsing.
//!
//! Usage:
//!   luabridge [-prdn] [-f[<file>]] [-l<libs>] [-t<events>] [-c<chunk>] [<script.lua> [args…]]
//!
//! Everything after the script path is passed to the script in `arg`.

use std::path::PathBuf;

use crate::config::split_list;
use crate::hook::HookMask;
use crate::policy::AccessMode;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Access mode override (`-p` permissive, `-r` restrictive).
    pub mode: Option<AccessMode>,
    /// Which config file to load.
    pub config: ConfigFile,
    /// Libraries to open (`-l<a,b>`).
    pub libraries: Vec<String>,
    /// Start without the standard libraries (`-n`).
    pub no_std: bool,
    /// Hook events to trace (`-t<events>`).
    pub trace: Option<HookMask>,
    /// Chunk to execute before the script (`-c<chunk>`).
    pub command: Option<String>,
    /// Debug logging (`-d`).
    pub debug: bool,
    /// Script to run.
    pub script: Option<PathBuf>,
    /// Arguments for the script.
    pub script_args: Vec<String>,
}

/// How to choose the config file.
#[derive(Debug, Default)]
pub enum ConfigFile {
    /// Search the standard locations (default); see [`find_user_config`].
    #[default]
    Search,
    /// `-f` with no file argument: skip the config file.
    Skip,
    /// `-f<file>`: load this specific file.
    Explicit(PathBuf),
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or_default())
}

/// Value of a flag that takes one: the rest of this argument, or the next
/// argument.  Advances `i`/`j` past what was consumed.
fn flag_value(
    flag: char,
    chars: &[char],
    j: &mut usize,
    argv: &[String],
    i: &mut usize,
) -> Result<String, String> {
    if *j + 1 < chars.len() {
        let s: String = chars[*j + 1..].iter().collect();
        *j = chars.len();
        Ok(s)
    } else if *i + 1 < argv.len() {
        *i += 1;
        Ok(argv[*i].clone())
    } else {
        Err(format!("-{flag} requires an argument"))
    }
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing; the next argument is the script.
        if arg == "--" {
            i += 1;
            break;
        }

        if !arg.starts_with('-') || arg == "-" {
            break;
        }

        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,
                'p' => args.mode = Some(AccessMode::Permissive),
                'r' => args.mode = Some(AccessMode::Restrictive),
                'n' => args.no_std = true,

                // -f[<file>]
                'f' => {
                    if j + 1 < chars.len() {
                        let file: String = chars[j + 1..].iter().collect();
                        args.config = ConfigFile::Explicit(PathBuf::from(file));
                        j = chars.len();
                    } else if i + 1 < argv.len() && !argv[i + 1].starts_with('-') && argv[i + 1].ends_with(".conf") {
                        i += 1;
                        args.config = ConfigFile::Explicit(PathBuf::from(&argv[i]));
                    } else {
                        args.config = ConfigFile::Skip;
                    }
                }

                'c' => args.command = Some(flag_value('c', &chars, &mut j, argv, &mut i)?),
                'l' => {
                    let libs = flag_value('l', &chars, &mut j, argv, &mut i)?;
                    args.libraries.extend(split_list(&libs));
                }
                't' => {
                    let events = flag_value('t', &chars, &mut j, argv, &mut i)?;
                    args.trace = Some(events.parse()?);
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    if let Some(script) = argv.get(i) {
        args.script = Some(PathBuf::from(script));
        args.script_args = argv[i + 1..].to_vec();
    }

    Ok(args)
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Search for the config file.
///
/// Priority: `LUABRIDGE_CONFIG` env var → the platform config directory
/// (e.g. `~/.config/luabridge/luabridge.conf`) → `./luabridge.conf`.
/// Returns the first path that exists, or `None`.
pub fn find_user_config() -> Option<PathBuf> {
    let env = std::env::var_os("LUABRIDGE_CONFIG").map(PathBuf::from);
    let platform = directories::ProjectDirs::from("", "", "luabridge")
        .map(|dirs| dirs.config_dir().join("luabridge.conf"));
    [env, platform, Some(PathBuf::from("./luabridge.conf"))]
        .into_iter()
        .flatten()
        .find(|p| p.exists())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn empty_args() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert!(a.mode.is_none());
        assert!(a.script.is_none());
        assert!(matches!(a.config, ConfigFile::Search));
    }

    #[test]
    fn script_and_args() {
        let a = parse_argv(&argv(&["-p", "main.lua", "-x", "two"])).unwrap();
        assert_eq!(a.mode, Some(AccessMode::Permissive));
        assert_eq!(a.script, Some(PathBuf::from("main.lua")));
        assert_eq!(a.script_args, vec!["-x", "two"]);
    }

    #[test]
    fn combined_bool_flags() {
        let a = parse_argv(&argv(&["-rdn"])).unwrap();
        assert_eq!(a.mode, Some(AccessMode::Restrictive));
        assert!(a.debug && a.no_std);
    }

    #[test]
    fn libraries_embedded_and_separate() {
        let a = parse_argv(&argv(&["-lstring,math", "-l", "table"])).unwrap();
        assert_eq!(a.libraries, vec!["string", "math", "table"]);
    }

    #[test]
    fn trace_events() {
        let a = parse_argv(&argv(&["-tcall,line"])).unwrap();
        assert_eq!(a.trace, Some(HookMask::CALL | HookMask::LINE));
        assert!(parse_argv(&argv(&["-tbogus"])).is_err());
    }

    #[test]
    fn config_skip() {
        let a = parse_argv(&argv(&["-f", "main.lua"])).unwrap();
        assert!(matches!(a.config, ConfigFile::Skip));
        assert_eq!(a.script, Some(PathBuf::from("main.lua")));
    }

    #[test]
    fn config_explicit() {
        let a = parse_argv(&argv(&["-fmy.conf"])).unwrap();
        assert!(matches!(&a.config, ConfigFile::Explicit(p) if p == &PathBuf::from("my.conf")));
        let a = parse_argv(&argv(&["-f", "my.conf"])).unwrap();
        assert!(matches!(&a.config, ConfigFile::Explicit(p) if p == &PathBuf::from("my.conf")));
    }

    #[test]
    fn command_embedded() {
        let a = parse_argv(&argv(&["-cprint(1)"])).unwrap();
        assert_eq!(a.command.as_deref(), Some("print(1)"));
    }

    #[test]
    fn double_dash_ends_flags() {
        let a = parse_argv(&argv(&["--", "-weird.lua"])).unwrap();
        assert_eq!(a.script, Some(PathBuf::from("-weird.lua")));
    }

    #[test]
    fn missing_value() {
        assert!(parse_argv(&argv(&["-c"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["-z"])).is_err());
    }
}
