//! Exported configuration schema
//!
//! The SLC CLI writes `<project>.project.mak` into the export destination.
//! Despite the extension the content is JSON:
//!
//! ```json
//! {
//!   "flags": { "ASFLAGS": [], "CFLAGS": [], "CXXFLAGS": [], "LINKFLAGS": [] },
//!   "defines": { "CPPDEFINES": ["-DFOO", "-DBAR=1"] },
//!   "includes": { "CPPPATH": ["autogen", "config"] },
//!   "libraries": { "system": ["-lm"], "user": ["/sdk/lib/libfoo.a"] },
//!   "sources": ["autogen/sl_event_handler.c"]
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One of the four flag categories in the exported configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagScope {
    #[serde(rename = "ASFLAGS")]
    Assembler,
    #[serde(rename = "CFLAGS")]
    C,
    #[serde(rename = "CXXFLAGS")]
    Cxx,
    #[serde(rename = "LINKFLAGS")]
    Linker,
}

impl FlagScope {
    /// All scopes in application order
    pub const ALL: [FlagScope; 4] = [
        FlagScope::Assembler,
        FlagScope::C,
        FlagScope::Cxx,
        FlagScope::Linker,
    ];

    /// Key of this scope in the `flags` section
    pub fn key(self) -> &'static str {
        match self {
            FlagScope::Assembler => "ASFLAGS",
            FlagScope::C => "CFLAGS",
            FlagScope::Cxx => "CXXFLAGS",
            FlagScope::Linker => "LINKFLAGS",
        }
    }
}

impl fmt::Display for FlagScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// `defines` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defines {
    #[serde(rename = "CPPDEFINES", default)]
    pub cppdefines: Vec<String>,
}

/// `includes` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Includes {
    #[serde(rename = "CPPPATH", default)]
    pub cpppath: Vec<String>,
}

/// `libraries` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Libraries {
    /// Toolchain libraries, usually in `-lname` form
    #[serde(default)]
    pub system: Vec<String>,

    /// Precompiled library files shipped with the SDK
    #[serde(default)]
    pub user: Vec<String>,
}

/// The SLC CLI export, as persisted in the artifact file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedConfiguration {
    /// Scope key -> ordered flag strings
    #[serde(default)]
    pub flags: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub defines: Defines,

    #[serde(default)]
    pub includes: Includes,

    #[serde(default)]
    pub libraries: Libraries,

    #[serde(default)]
    pub sources: Vec<String>,
}

impl ExportedConfiguration {
    /// Flags of a scope, `None` if the export omitted the scope entirely
    pub fn scope(&self, scope: FlagScope) -> Option<&[String]> {
        self.flags.get(scope.key()).map(Vec::as_slice)
    }
}

/// Errors loading the exported configuration
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Couldn't load exported SDK configuration: {0} does not exist")]
    Missing(PathBuf),

    #[error("Failed to read project configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read project configuration! {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parse an exported configuration from its JSON text
pub fn parse_configuration(content: &str) -> Result<ExportedConfiguration, LoadError> {
    Ok(serde_json::from_str(content)?)
}
