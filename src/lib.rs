//! gsdk-build - Gecko SDK configuration bridge
//!
//! Integrates the Silicon Labs Gecko SDK and its SLC CLI project
//! configuration tool into an embedded build: regenerates the exported
//! project configuration when it is stale and translates it into compiler,
//! linker and source directives.

pub mod config;
pub mod descriptor;
pub mod fs;
pub mod gate;
pub mod pipeline;
pub mod sdk;
pub mod targets;
pub mod tool;

pub use config::{BuildSettings, EffectiveSettings, SettingsError};
pub use fs::{FileSystem, MemoryFileSystem, OsFileSystem};
pub use gate::{CacheGate, ReloadReason, StalenessWitness};
pub use pipeline::{CheckReport, ConfigureReport, Configurator, PipelineError};
pub use tool::{ProcessInvoker, RecordingInvoker, SlcCli, ToolCommand, ToolError, ToolInvoker};
