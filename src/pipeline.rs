//! Configure pipeline
//!
//! Runs one build's SDK configuration step:
//! 1. Locate the descriptor, generating a default project if there is none
//! 2. Ask the cache gate whether the export is stale
//! 3. If stale: trust the SDK, then regenerate the export
//! 4. Load the export and translate it into a fresh BuildEnvironment
//! 5. Register source build rules and resolve the linker script

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use gsdk_export::{
    apply_all, build_sources, collect_sources, extract_linker_script, parse_configuration,
    BuildEnvironment, ExportedConfiguration, LoadError, TranslateError,
};

use crate::config::{BuildSettings, EffectiveSettings, SettingsSource};
use crate::descriptor::{
    discover_descriptor, generate_default_project, is_project_empty, DescriptorError,
    ProjectDescriptor,
};
use crate::fs::FileSystem;
use crate::gate::{CacheGate, ReloadReason};
use crate::sdk::{ensure_trusted, regenerate, GenerateRequest, SdkError};
use crate::tool::ToolInvoker;

/// Schema identifier of the configure report
pub const REPORT_SCHEMA_ID: &str = "gsdk-build/configure@1";

/// Pipeline errors
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Sdk(#[from] SdkError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Translate(#[from] TranslateError),
}

/// Result of a configure run
#[derive(Debug, Clone, Serialize)]
pub struct ConfigureReport {
    pub schema_id: String,
    pub created_at: DateTime<Utc>,
    pub project_name: String,
    /// SDK variant or board id
    pub target: String,
    pub descriptor: ProjectDescriptor,
    pub generated_default: bool,
    /// Why the export was regenerated, `None` if the cached export was used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reload_reason: Option<ReloadReason>,
    /// Settings layers the run was configured from
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub settings_sources: Vec<SettingsSource>,
    pub environment: BuildEnvironment,
}

impl ConfigureReport {
    pub fn reloaded(&self) -> bool {
        self.reload_reason.is_some()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Result of a staleness check
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<ProjectDescriptor>,
    pub reload_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ReloadReason>,
}

/// Drives the configure steps over injected filesystem and tool capabilities
pub struct Configurator<'a, F: FileSystem + ?Sized, T: ToolInvoker + ?Sized> {
    settings: &'a BuildSettings,
    sources: &'a [SettingsSource],
    fs: &'a F,
    invoker: &'a T,
}

impl<'a, F, T> Configurator<'a, F, T>
where
    F: FileSystem + ?Sized,
    T: ToolInvoker + ?Sized,
{
    pub fn new(settings: &'a BuildSettings, fs: &'a F, invoker: &'a T) -> Self {
        Self {
            settings,
            sources: &[],
            fs,
            invoker,
        }
    }

    /// Configurator whose reports carry the settings provenance
    pub fn from_effective(effective: &'a EffectiveSettings, fs: &'a F, invoker: &'a T) -> Self {
        Self {
            settings: &effective.settings,
            sources: &effective.sources,
            fs,
            invoker,
        }
    }

    /// Locate the descriptor, generating the default project when missing
    pub fn prepare_descriptor(&self) -> Result<(ProjectDescriptor, bool), PipelineError> {
        match discover_descriptor(self.fs, self.settings)? {
            Some(descriptor) if !is_project_empty(self.fs, Some(&descriptor)) => {
                Ok((descriptor, false))
            }
            _ => Ok((generate_default_project(self.fs, self.settings)?, true)),
        }
    }

    /// Report staleness without touching anything
    pub fn check(&self) -> Result<CheckReport, PipelineError> {
        let witness = self.settings.witness();
        let gate = CacheGate::new(self.fs, &witness);

        let descriptor = discover_descriptor(self.fs, self.settings)?;
        let reason = match descriptor {
            Some(ref d) => gate.reload_reason(&d.path),
            None => Some(ReloadReason::DescriptorMissing(
                self.settings.project.dir.clone(),
            )),
        };

        Ok(CheckReport {
            descriptor,
            reload_required: reason.is_some(),
            reason,
        })
    }

    /// Run the whole configure step
    pub fn configure(&self) -> Result<ConfigureReport, PipelineError> {
        let (descriptor, generated_default) = self.prepare_descriptor()?;

        let witness = self.settings.witness();
        let reload_reason = CacheGate::new(self.fs, &witness).reload_reason(&descriptor.path);
        if let Some(ref reason) = reload_reason {
            log::info!("Reloading SDK configuration...");
            log::debug!("Reload reason: {}", reason);
            self.reload(&descriptor)?;
        }

        let config = self.load()?;
        let environment = self.translate(&config)?;

        Ok(ConfigureReport {
            schema_id: REPORT_SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            project_name: self.settings.project_name(),
            target: self.settings.variant().to_string(),
            descriptor,
            generated_default,
            reload_reason,
            settings_sources: self.sources.to_vec(),
            environment,
        })
    }

    fn reload(&self, descriptor: &ProjectDescriptor) -> Result<(), PipelineError> {
        let slc = self.settings.slc_cli();
        ensure_trusted(self.fs, self.invoker, &slc, &self.settings.packages.sdk)?;
        let request = GenerateRequest::from_settings(self.settings, &descriptor.path);
        regenerate(self.fs, self.invoker, &slc, &request)?;
        Ok(())
    }

    /// Load the exported configuration artifact
    pub fn load(&self) -> Result<ExportedConfiguration, PipelineError> {
        let artifact = self.settings.artifact_path();
        if !self.fs.is_file(&artifact) {
            return Err(LoadError::Missing(artifact).into());
        }
        let content = self
            .fs
            .read_to_string(&artifact)
            .map_err(|source| LoadError::Io {
                path: artifact.clone(),
                source,
            })?;
        Ok(parse_configuration(&content)?)
    }

    /// Translate an export into a new build environment
    pub fn translate(
        &self,
        config: &ExportedConfiguration,
    ) -> Result<BuildEnvironment, PipelineError> {
        let export_dir = self.settings.export_dir();
        let mut env = BuildEnvironment::new();

        apply_all(config, &export_dir, &mut env)?;
        env.linkflags
            .extend(self.settings.build.extra_link_flags.iter().cloned());

        let groups = collect_sources(config, &export_dir);
        build_sources(
            &groups,
            &self.settings.project.src_dir,
            &self.settings.project.build_dir,
            &mut env,
        )?;

        env.ldscript = self.resolve_ldscript(config);
        Ok(env)
    }

    /// Board script, then SDK-specific override, then the exported one
    ///
    /// A board-level script means the host build already handles it, so the
    /// environment carries none.
    fn resolve_ldscript(&self, config: &ExportedConfiguration) -> Option<PathBuf> {
        if self.settings.board.ldscript.is_some() {
            return None;
        }

        let ldscript = self
            .settings
            .board
            .gecko_sdk
            .ldscript
            .clone()
            .or_else(|| extract_linker_script(config, &self.settings.export_dir()));
        if ldscript.is_none() {
            log::warn!("Failed to extract ldscript from the SDK configuration!");
        }
        ldscript
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        BoardSettings, BuildOptions, GeckoSdkBoard, PackageSettings, ProjectSettings,
        UploadSettings,
    };
    use crate::fs::MemoryFileSystem;
    use crate::tool::{RecordingInvoker, ToolError};
    use gsdk_export::Define;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    const ARTIFACT: &str = "/work/blink/build/gsdk-export/blink.project.mak";

    const EXPORT: &str = r#"{
        "flags": {
            "ASFLAGS": ["-mcpu=cortex-m33 -mthumb"],
            "CFLAGS": ["-Os", "-std=c99"],
            "CXXFLAGS": ["-fno-rtti"],
            "LINKFLAGS": ["-T\"autogen/linkerfile.ld\"", "-Wl,-Map=$BUILD_DIR/blink.map"]
        },
        "defines": {"CPPDEFINES": ["-DEFR32BG22C224F512IM40=1", "-DSL_COMPONENT_CATALOG_PRESENT"]},
        "includes": {"CPPPATH": ["autogen", "config"]},
        "libraries": {"system": ["-lgcc", "-lm"], "user": ["/pkgs/sdk/lib/librail.a"]},
        "sources": ["autogen/sl_event_handler.c", "/pkgs/sdk/platform/common/src/sl_assert.c", "/work/blink/src/main.c"]
    }"#;

    fn settings() -> BuildSettings {
        BuildSettings {
            project: ProjectSettings {
                dir: PathBuf::from("/work/blink"),
                src_dir: PathBuf::from("/work/blink/src"),
                build_dir: PathBuf::from("/work/blink/build"),
                name: None,
            },
            packages: PackageSettings {
                sdk: PathBuf::from("/pkgs/sdk"),
                sdk_version: "4.4.0".to_string(),
                slc_cli: PathBuf::from("/pkgs/slc"),
                toolchain: PathBuf::from("/pkgs/gcc"),
                templates: PathBuf::from("/pkgs/templates"),
                jdk: None,
                python: PathBuf::from("python3"),
            },
            board: BoardSettings {
                id: "brd4184a".to_string(),
                mcu: "efr32bg22c224f512im40".to_string(),
                ldscript: None,
                gecko_sdk: GeckoSdkBoard::default(),
            },
            build: BuildOptions {
                extra_link_flags: vec!["--specs=nosys.specs".to_string()],
            },
            upload: UploadSettings {
                command: "$UPLOADER $UPLOADERFLAGS".to_string(),
                offset_address: None,
                bootloader: None,
                bootloader_offset: None,
            },
            verbose: false,
        }
    }

    fn installed() -> Arc<MemoryFileSystem> {
        let fs = Arc::new(MemoryFileSystem::new());
        for dir in ["/pkgs/sdk", "/pkgs/slc", "/pkgs/gcc", "/pkgs/templates"] {
            fs.add_dir(dir);
        }
        fs.add_file("/work/blink/src/main.c", "int main(void) { return 0; }");
        fs
    }

    /// Invoker that writes a complete export on `generate`
    fn exporting(fs: &Arc<MemoryFileSystem>) -> RecordingInvoker {
        let fs = Arc::clone(fs);
        RecordingInvoker::with_hook(move |cmd| {
            if cmd.args.get(1).map(String::as_str) == Some("generate") {
                fs.add_file("/work/blink/build/gsdk-export/autogen/sl_event_handler.c", "");
                fs.add_file("/work/blink/build/gsdk-export/config/sl_device_init_hfxo_config.h", "");
                fs.add_file(ARTIFACT, EXPORT);
            }
            Ok(())
        })
    }

    #[test]
    fn test_configure_reloads_fresh_project() {
        let fs = installed();
        fs.add_file("/work/blink/blink.slcp", "project_name: blink\n");
        let invoker = exporting(&fs);
        let settings = settings();

        let report = Configurator::new(&settings, &*fs, &invoker)
            .configure()
            .unwrap();

        assert!(report.reloaded());
        assert!(!report.generated_default);
        assert_eq!(report.target, "brd4184a");
        assert_eq!(report.schema_id, REPORT_SCHEMA_ID);
        assert_eq!(invoker.calls_to("signature"), 1);
        assert_eq!(invoker.calls_to("generate"), 1);
    }

    #[test]
    fn test_configure_up_to_date_skips_tool() {
        let fs = installed();
        fs.add_file("/work/blink/blink.slcp", "project_name: blink\n");
        let invoker = exporting(&fs);
        let settings = settings();
        let configurator = Configurator::new(&settings, &*fs, &invoker);

        let first = configurator.configure().unwrap();
        fs.advance(Duration::from_secs(1));
        let second = configurator.configure().unwrap();

        assert!(first.reloaded());
        assert!(!second.reloaded());
        assert_eq!(invoker.calls().len(), 2);
        assert_eq!(first.environment, second.environment);
    }

    #[test]
    fn test_descriptor_edit_triggers_reload() {
        let fs = installed();
        fs.add_file("/work/blink/blink.slcp", "project_name: blink\n");
        let invoker = exporting(&fs);
        let settings = settings();
        let configurator = Configurator::new(&settings, &*fs, &invoker);

        configurator.configure().unwrap();
        fs.advance(Duration::from_secs(1));
        fs.touch("/work/blink/blink.slcp");
        let report = configurator.configure().unwrap();

        assert_eq!(
            report.reload_reason,
            Some(ReloadReason::DescriptorNewer(PathBuf::from("/work/blink/blink.slcp")))
        );
        // Trust marker survives; only generate runs again
        assert_eq!(invoker.calls_to("signature"), 1);
        assert_eq!(invoker.calls_to("generate"), 2);
    }

    #[test]
    fn test_translate_environment() {
        let fs = installed();
        fs.add_file("/work/blink/blink.slcp", "project_name: blink\n");
        let invoker = exporting(&fs);
        let settings = settings();

        let env = Configurator::new(&settings, &*fs, &invoker)
            .configure()
            .unwrap()
            .environment;

        assert_eq!(env.asflags, vec!["-mcpu=cortex-m33", "-mthumb"]);
        assert_eq!(env.cflags, vec!["-Os", "-std=c99"]);
        assert_eq!(
            env.linkflags,
            vec!["\"-Wl,-Map=$BUILD_DIR/blink.map\"", "--specs=nosys.specs"]
        );
        assert_eq!(
            env.cppdefines,
            vec![
                Define::Pair("EFR32BG22C224F512IM40".to_string(), "1".to_string()),
                Define::Name("SL_COMPONENT_CATALOG_PRESENT".to_string()),
            ]
        );
        assert_eq!(
            env.cpppath,
            vec![
                PathBuf::from("/work/blink/build/gsdk-export/autogen"),
                PathBuf::from("/work/blink/build/gsdk-export/config"),
            ]
        );
        assert_eq!(env.libs, vec!["gcc", "m"]);
        assert_eq!(env.raw_lib_flags, vec!["\"/pkgs/sdk/lib/librail.a\""]);
        assert_eq!(
            env.ldscript,
            Some(PathBuf::from("/work/blink/build/gsdk-export/autogen/linkerfile.ld"))
        );

        // main.c lives under the project sources and gets no rule
        let dirs: Vec<&Path> = env.build_rules.iter().map(|r| r.src_dir.as_path()).collect();
        assert_eq!(
            dirs,
            vec![
                Path::new("/work/blink/build/gsdk-export/autogen"),
                Path::new("/pkgs/sdk/platform/common/src"),
            ]
        );
        assert!(env.build_rules[1]
            .variant_dir
            .starts_with("/work/blink/build/gsdk-build"));
    }

    #[test]
    fn test_board_ldscript_suppresses_export_script() {
        let fs = installed();
        let mut settings = settings();
        settings.board.ldscript = Some(PathBuf::from("/work/blink/board.ld"));
        let invoker = RecordingInvoker::new();
        let config = parse_configuration(EXPORT).unwrap();

        let env = Configurator::new(&settings, &*fs, &invoker)
            .translate(&config)
            .unwrap();
        assert_eq!(env.ldscript, None);
    }

    #[test]
    fn test_sdk_ldscript_override() {
        let fs = installed();
        let mut settings = settings();
        settings.board.gecko_sdk.ldscript = Some(PathBuf::from("/work/blink/custom.ld"));
        let invoker = RecordingInvoker::new();
        let config = parse_configuration(EXPORT).unwrap();

        let env = Configurator::new(&settings, &*fs, &invoker)
            .translate(&config)
            .unwrap();
        assert_eq!(env.ldscript, Some(PathBuf::from("/work/blink/custom.ld")));
    }

    #[test]
    fn test_empty_project_generates_default_before_tools() {
        let fs = installed();
        let seen = Arc::clone(&fs);
        let invoker = RecordingInvoker::with_hook(move |_| {
            assert!(seen.is_file(Path::new("/work/blink/blink.slcp")));
            Err(ToolError::Failed {
                status: "exit status: 1".to_string(),
                output: String::new(),
            })
        });
        let settings = settings();

        let err = Configurator::new(&settings, &*fs, &invoker)
            .configure()
            .unwrap_err();

        assert!(matches!(err, PipelineError::Sdk(_)));
        assert_eq!(invoker.calls().len(), 1);
    }

    #[test]
    fn test_generate_failure_leaves_gate_stale() {
        let fs = installed();
        fs.add_file("/work/blink/blink.slcp", "project_name: blink\n");
        fs.add_file("/pkgs/sdk/primary_trusted.trust", "/pkgs/sdk");
        let invoker = RecordingInvoker::failing("Unable to resolve component 'foo'");
        let settings = settings();
        let configurator = Configurator::new(&settings, &*fs, &invoker);

        match configurator.configure() {
            Err(PipelineError::Sdk(SdkError::Tool(ToolError::Failed { output, .. }))) => {
                assert_eq!(output, "Unable to resolve component 'foo'");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(!fs.is_file(Path::new(ARTIFACT)));
        assert!(configurator.check().unwrap().reload_required);
    }

    #[test]
    fn test_malformed_artifact() {
        let fs = installed();
        fs.add_file(ARTIFACT, "not json");
        let invoker = RecordingInvoker::new();
        let settings = settings();

        let err = Configurator::new(&settings, &*fs, &invoker)
            .load()
            .unwrap_err();
        assert!(matches!(err, PipelineError::Load(LoadError::Malformed(_))));
    }

    #[test]
    fn test_missing_artifact() {
        let fs = installed();
        let invoker = RecordingInvoker::new();
        let settings = settings();

        let err = Configurator::new(&settings, &*fs, &invoker)
            .load()
            .unwrap_err();
        assert!(matches!(err, PipelineError::Load(LoadError::Missing(_))));
    }

    #[test]
    fn test_check_without_descriptor() {
        let fs = installed();
        let invoker = RecordingInvoker::new();
        let settings = settings();

        let report = Configurator::new(&settings, &*fs, &invoker).check().unwrap();

        assert!(report.reload_required);
        assert_eq!(report.descriptor, None);
        assert!(matches!(report.reason, Some(ReloadReason::DescriptorMissing(_))));
        assert!(!fs.is_file(Path::new("/work/blink/blink.slcp")));
        assert!(invoker.calls().is_empty());
    }
}
