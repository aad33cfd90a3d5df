//! gsdk-export - SLC CLI exported configuration
//!
//! Schema of the JSON document written by the SLC CLI `generate` command and
//! the translation of that document into build environment directives:
//! flags per scope, preprocessor macros, include paths, libraries and
//! per-directory source build rules.
//!
//! This crate does no process, clock or filesystem access; callers read the
//! artifact and hand its text to `parse_configuration`.

pub mod environment;
pub mod filter;
pub mod schema;
pub mod shell;
pub mod translate;

pub use environment::{BuildEnvironment, Define, SourceBuildRule};
pub use filter::{FilterError, SourceFilter};
pub use schema::{parse_configuration, ExportedConfiguration, FlagScope, LoadError};
pub use translate::{
    apply_all, apply_flags, apply_includes, apply_libraries, build_sources, collect_sources,
    extract_linker_script, extract_macros, staging_dir_name, SourceGroups, TranslateError,
    BUILD_DIR_PLACEHOLDER, LINKER_SCRIPT_PREFIX,
};
