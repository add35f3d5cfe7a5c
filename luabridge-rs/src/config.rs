//! `luabridge.conf` configuration file parser.
//!
//! One `key = value` setting per line:
//!
//! | Key          | Value                                   | Default       |
//! |--------------|-----------------------------------------|---------------|
//! | `mode`       | `permissive` or `restrictive`           | `restrictive` |
//! | `permissive` | boolean, shorthand for `mode`           |               |
//! | `bind_std`   | boolean: open all safe standard libs    | `true`        |
//! | `bind_api`   | boolean: install the value constructors | `true`        |
//! | `libraries`  | comma-separated library names           | none          |
//! | `hook`       | comma-separated hook events             | none          |
//! | `hook_count` | instruction interval for `count`        | `0`           |
//!
//! Blank lines and lines starting with `#` or `;` are ignored.  Values may
//! be double-quoted.  Unknown keys are reported but do not stop loading.

use std::path::Path;

use crate::hook::HookMask;
use crate::policy::AccessMode;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading a config file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Settings for a new [`LuaBridge`](crate::LuaBridge).
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub mode: AccessMode,
    /// Open every safe standard library at creation.
    pub bind_std: bool,
    /// Install the `Vector2`, `Vector3`, `Color`, `Rect2` and `Plane`
    /// constructors.
    pub bind_api: bool,
    /// Libraries opened by name after creation.
    pub libraries: Vec<String>,
    /// Events logged by a trace hook at `trace` level.  Empty disables it.
    pub hook: HookMask,
    pub hook_count: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            mode: AccessMode::Restrictive,
            bind_std: true,
            bind_api: true,
            libraries: Vec::new(),
            hook: HookMask::empty(),
            hook_count: 0,
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config string.
    ///
    /// Returns the config and a list of any errors; a line in error leaves
    /// its setting at the previous value.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = BridgeConfig::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                errors.push(ConfigError { line: lineno, message: format!("expected key = value, got {line:?}") });
                continue;
            };
            if let Err(message) = config.apply(key.trim(), unquote(value.trim())) {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (config, errors)
    }

    /// Read and parse a config file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "mode" => self.mode = value.parse()?,
            "permissive" => self.mode = AccessMode::from_permissive(parse_bool(value)?),
            "bind_std" => self.bind_std = parse_bool(value)?,
            "bind_api" => self.bind_api = parse_bool(value)?,
            "libraries" => self.libraries = split_list(value),
            "hook" => self.hook = value.parse()?,
            "hook_count" => {
                self.hook_count = value
                    .parse()
                    .map_err(|_| format!("invalid hook_count {value:?}"))?;
            }
            _ => return Err(format!("unknown setting {key:?}")),
        }
        Ok(())
    }
}

// ── Value helpers ─────────────────────────────────────────────────────────────

fn unquote(s: &str) -> &str {
    s.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(s)
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "on" | "yes" | "true" => Ok(true),
        "0" | "off" | "no" | "false" => Ok(false),
        _ => Err(format!("invalid boolean {s:?}")),
    }
}

/// Comma-separated list; empty items are dropped.
pub(crate) fn split_list(s: &str) -> Vec<String> {
    s.split(',').map(str::trim).filter(|w| !w.is_empty()).map(str::to_owned).collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let (cfg, errors) = BridgeConfig::load_str("");
        assert!(errors.is_empty());
        assert_eq!(cfg, BridgeConfig::default());
        assert_eq!(cfg.mode, AccessMode::Restrictive);
    }

    #[test]
    fn full_file() {
        let src = "\
# bridge settings
mode = permissive
bind_std = off
libraries = \"string, math\"
; trace
hook = call,line
hook_count = 100
";
        let (cfg, errors) = BridgeConfig::load_str(src);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(cfg.mode, AccessMode::Permissive);
        assert!(!cfg.bind_std);
        assert!(cfg.bind_api);
        assert_eq!(cfg.libraries, vec!["string", "math"]);
        assert_eq!(cfg.hook, HookMask::CALL | HookMask::LINE);
        assert_eq!(cfg.hook_count, 100);
    }

    #[test]
    fn permissive_shorthand() {
        let (cfg, _) = BridgeConfig::load_str("permissive = yes");
        assert_eq!(cfg.mode, AccessMode::Permissive);
    }

    #[test]
    fn errors_carry_line_numbers() {
        let (cfg, errors) = BridgeConfig::load_str("bind_api = maybe\n\nfrobnicate = 1\nno equals sign");
        assert!(cfg.bind_api);
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![1, 3, 4]);
        assert_eq!(errors[0].to_string(), "line 1: invalid boolean \"maybe\"");
        let boxed: Box<dyn std::error::Error> = Box::new(errors[1].clone());
        assert!(boxed.to_string().starts_with("line 3: "), "{boxed}");
    }

    #[test]
    fn load_file_reads_disk() {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "mode = restrictive").unwrap();
        writeln!(f, "hook = count").unwrap();
        let (cfg, errors) = BridgeConfig::load_file(f.path()).unwrap();
        assert!(errors.is_empty());
        assert_eq!(cfg.hook, HookMask::COUNT);
    }

    #[test]
    fn split_list_trims() {
        assert_eq!(split_list(" a, ,b ,"), vec!["a", "b"]);
    }
}
