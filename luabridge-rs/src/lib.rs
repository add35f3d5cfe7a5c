//! Lua 5.4 scripting bridge for a host variant/object system.
//!
//! Host values ([`Variant`]) cross into Lua and back through [`codec`].
//! Structured values, objects, signals and callables travel as userdata
//! whose metatables ([`metatables`]) forward indexing, assignment, calls
//! and operators to the host.  Object field access is governed by the
//! interpreter-wide [`policy::AccessMode`].
//!
//! ```no_run
//! use luabridge::{BridgeConfig, LuaBridge, Variant, Vector2};
//!
//! let bridge = LuaBridge::new(&BridgeConfig::default())?;
//! bridge.push_global("origin", &Variant::from(Vector2::new(1.0, 2.0)))?;
//! let moved = bridge.eval("origin + Vector2(3, 4)")?;
//! assert_eq!(moved, Variant::from(Vector2::new(4.0, 6.0)));
//! # Ok::<(), luabridge::ScriptError>(())
//! ```

pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod hook;
pub mod metatables;
pub mod object;
pub mod policy;
pub mod state;
pub mod variant;

pub use config::BridgeConfig;
pub use error::{ErrorKind, ScriptError};
pub use hook::{HookEvent, HookEventKind, HookMask};
pub use object::{BindPlacement, CallError, Callable, HostObject, MetaOp, ObjectRef, Signal};
pub use policy::AccessMode;
pub use state::{LuaBridge, ScriptContext};
pub use variant::{Color, Plane, Rect2, Variant, VariantType, Vector2, Vector3};
