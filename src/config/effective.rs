//! Effective settings with provenance
//!
//! Merges the layers, records where each file layer came from, and
//! deserializes the result into typed [`BuildSettings`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::gate::StalenessWitness;
use crate::tool::SlcCli;

/// Default project settings file name
pub const PROJECT_CONFIG_FILE: &str = "gsdk.toml";

/// Directory under the build dir receiving the SLC CLI export
const EXPORT_DIR_NAME: &str = "gsdk-export";

/// Origin of a settings layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SettingsOrigin {
    Builtin,
    Host,
    Project,
    Cli,
}

/// A contributing settings layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsSource {
    pub origin: SettingsOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Project layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub dir: PathBuf,
    pub src_dir: PathBuf,
    pub build_dir: PathBuf,

    /// Defaults to the project directory name
    #[serde(default)]
    pub name: Option<String>,
}

/// Installed package locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSettings {
    /// Gecko SDK root
    pub sdk: PathBuf,
    pub sdk_version: String,
    /// SLC CLI root (holds the `slc` entry point)
    pub slc_cli: PathBuf,
    /// GCC ARM toolchain root
    pub toolchain: PathBuf,
    /// Exporter templates passed to `--export-templates`
    pub templates: PathBuf,
    /// Portable JDK root, put first on PATH for the SLC CLI
    #[serde(default)]
    pub jdk: Option<PathBuf>,
    pub python: PathBuf,
}

/// SDK-specific board options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeckoSdkBoard {
    /// Explicit `.slcp` descriptor
    #[serde(default)]
    pub project_file: Option<PathBuf>,
    #[serde(default)]
    pub variant: Option<String>,
    /// Linker script taking precedence over the exported one
    #[serde(default)]
    pub ldscript: Option<PathBuf>,
}

/// Board description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSettings {
    pub id: String,
    pub mcu: String,
    /// Board-level linker script; when set the SDK script is not used at all
    #[serde(default)]
    pub ldscript: Option<PathBuf>,
    #[serde(default)]
    pub gecko_sdk: GeckoSdkBoard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Linker flags the export does not carry
    pub extra_link_flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSettings {
    pub command: String,
    /// Application image offset
    #[serde(default)]
    pub offset_address: Option<String>,
    /// Bootloader image used by the bootloader targets
    #[serde(default)]
    pub bootloader: Option<PathBuf>,
    /// Bootloader image offset, independent of the application offset
    #[serde(default)]
    pub bootloader_offset: Option<String>,
}

/// Typed, merged settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    pub project: ProjectSettings,
    pub packages: PackageSettings,
    pub board: BoardSettings,
    pub build: BuildOptions,
    pub upload: UploadSettings,
    pub verbose: bool,
}

impl BuildSettings {
    /// Deserialize from a merged value and validate
    pub fn from_value(value: Value) -> Result<Self, SettingsError> {
        let settings: BuildSettings = serde_json::from_value(value)
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        let required = [
            ("packages.sdk", self.packages.sdk.as_os_str().is_empty()),
            ("packages.slc_cli", self.packages.slc_cli.as_os_str().is_empty()),
            ("packages.toolchain", self.packages.toolchain.as_os_str().is_empty()),
            ("packages.templates", self.packages.templates.as_os_str().is_empty()),
            ("board.mcu", self.board.mcu.is_empty()),
        ];
        match required.iter().find(|(_, missing)| *missing) {
            Some((key, _)) => Err(SettingsError::Missing(key.to_string())),
            None => Ok(()),
        }
    }

    /// Make every relative path absolute
    ///
    /// The project dir is resolved against `base`; everything else against
    /// the project dir.
    pub fn resolve_paths(&mut self, base: &Path) {
        self.project.dir = join(base, &self.project.dir);
        let root = self.project.dir.clone();

        for path in [
            &mut self.project.src_dir,
            &mut self.project.build_dir,
            &mut self.packages.sdk,
            &mut self.packages.slc_cli,
            &mut self.packages.toolchain,
            &mut self.packages.templates,
        ] {
            *path = join(&root, path);
        }

        for path in [
            &mut self.packages.jdk,
            &mut self.board.ldscript,
            &mut self.board.gecko_sdk.project_file,
            &mut self.board.gecko_sdk.ldscript,
            &mut self.upload.bootloader,
        ]
        .into_iter()
        .flatten()
        {
            *path = join(&root, path);
        }
    }

    pub fn project_name(&self) -> String {
        self.project.name.clone().unwrap_or_else(|| {
            self.project
                .dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string())
        })
    }

    /// Device identifier passed to `slc generate --with`
    pub fn device_id(&self) -> String {
        self.board.mcu.to_uppercase()
    }

    /// Build target name: the SDK variant, or the board id
    pub fn variant(&self) -> &str {
        self.board
            .gecko_sdk
            .variant
            .as_deref()
            .unwrap_or(&self.board.id)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.project.build_dir.join(EXPORT_DIR_NAME)
    }

    /// The exported configuration artifact (JSON despite the extension)
    pub fn artifact_path(&self) -> PathBuf {
        self.export_dir()
            .join(format!("{}.project.mak", self.project_name()))
    }

    pub fn witness(&self) -> StalenessWitness {
        StalenessWitness::new(
            &self.export_dir(),
            self.artifact_path(),
            vec![
                self.packages.sdk.clone(),
                self.packages.slc_cli.clone(),
                self.packages.toolchain.clone(),
            ],
        )
    }

    pub fn slc_cli(&self) -> SlcCli {
        let slc = SlcCli::new(&self.packages.python, &self.packages.slc_cli);
        match self.packages.jdk {
            Some(ref jdk) => slc.with_jdk(jdk),
            None => slc,
        }
    }
}

fn join(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Merged settings with full provenance
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveSettings {
    pub settings: BuildSettings,

    /// Contributing sources in precedence order
    pub sources: Vec<SettingsSource>,
}

impl EffectiveSettings {
    /// Build effective settings from layers
    ///
    /// Relative paths are resolved against the project config's directory,
    /// or `cwd` when there is no project config.
    pub fn build(
        host_config_path: Option<&Path>,
        project_config_path: Option<&Path>,
        cli_overrides: Option<Value>,
        cwd: &Path,
    ) -> Result<Self, SettingsError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![SettingsSource {
            origin: SettingsOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = host_config_path.filter(|p| p.exists()) {
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(SettingsSource {
                origin: SettingsOrigin::Host,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
        }

        let mut base = cwd.to_path_buf();
        if let Some(path) = project_config_path {
            if !path.exists() {
                return Err(SettingsError::NotFound(path.to_path_buf()));
            }
            let (value, digest) = load_toml_file(path)?;
            layers.push(value);
            sources.push(SettingsSource {
                origin: SettingsOrigin::Project,
                path: Some(path.to_string_lossy().to_string()),
                digest: Some(digest),
            });
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                base = join(cwd, parent);
            }
        }

        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(SettingsSource {
                origin: SettingsOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        let mut settings = BuildSettings::from_value(merge_layers(layers))?;
        settings.resolve_paths(&base);

        Ok(Self { settings, sources })
    }

    /// Host config location (~/.config/gsdk/config.toml)
    pub fn default_host_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/gsdk/config.toml"))
    }
}

/// Load and parse a TOML file, returning the value and digest
fn load_toml_file(path: &Path) -> Result<(Value, String), SettingsError> {
    let bytes = fs::read(path).map_err(|e| SettingsError::Io(format!("{}: {}", path.display(), e)))?;

    let digest = hex::encode(Sha256::digest(&bytes));

    let contents = String::from_utf8(bytes)
        .map_err(|e| SettingsError::Parse(format!("Invalid UTF-8: {}", e)))?;
    let toml_value: toml::Value = toml::from_str(&contents)
        .map_err(|e| SettingsError::Parse(format!("{}: {}", path.display(), e)))?;

    Ok((toml_to_json(toml_value), digest))
}

fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Settings file not found: {0}")]
    NotFound(PathBuf),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid settings: {0}")]
    Invalid(String),

    #[error("Missing required setting '{0}'")]
    Missing(String),
}
