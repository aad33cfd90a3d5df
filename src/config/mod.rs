//! Build settings
//!
//! Settings are merged from four layers, last wins:
//! 1. Built-in defaults
//! 2. Host config (~/.config/gsdk/config.toml)
//! 3. Project config (gsdk.toml)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    BoardSettings, BuildOptions, BuildSettings, EffectiveSettings, GeckoSdkBoard, PackageSettings,
    ProjectSettings, SettingsError, SettingsOrigin, SettingsSource, UploadSettings,
    PROJECT_CONFIG_FILE,
};
pub use merge::{deep_merge, merge_layers};
