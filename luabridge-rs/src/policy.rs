//! Field access policy for host objects.
//!
//! An object may declare a script-visible field list.  How the list is read
//! depends on the interpreter-wide [`AccessMode`]:
//!
//! | mode          | listed field | unlisted field |
//! |---------------|--------------|----------------|
//! | `Permissive`  | denied       | allowed        |
//! | `Restrictive` | allowed      | denied         |
//!
//! An object with no list behaves as an empty list.  The same decision
//! covers reads (`__index`) and writes (`__newindex`).

use std::fmt;
use std::str::FromStr;

/// How an object's field list is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessMode {
    /// The list is a blacklist.
    Permissive,
    /// The list is a whitelist.
    #[default]
    Restrictive,
}

impl AccessMode {
    pub fn from_permissive(permissive: bool) -> Self {
        if permissive {
            AccessMode::Permissive
        } else {
            AccessMode::Restrictive
        }
    }

    pub fn is_permissive(self) -> bool {
        self == AccessMode::Permissive
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AccessMode::Permissive => "permissive",
            AccessMode::Restrictive => "restrictive",
        })
    }
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(AccessMode::Permissive),
            "restrictive" => Ok(AccessMode::Restrictive),
            other => Err(format!("unknown access mode '{other}'")),
        }
    }
}

/// Whether a script may read `field` of an object declaring `fields`.
pub fn can_read(mode: AccessMode, fields: &[String], field: &str) -> bool {
    let listed = fields.iter().any(|f| f == field);
    match mode {
        AccessMode::Permissive => !listed,
        AccessMode::Restrictive => listed,
    }
}

/// Whether a script may write `field`.  Writes follow the read rule.
pub fn can_write(mode: AccessMode, fields: &[String], field: &str) -> bool {
    can_read(mode, fields, field)
}
