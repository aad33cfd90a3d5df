//! Project configuration export (`slc generate`)

use std::path::{Path, PathBuf};

use super::SdkError;
use crate::config::BuildSettings;
use crate::fs::FileSystem;
use crate::tool::{path_arg, SlcCli, ToolInvoker};

/// Inputs of one `slc generate` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateRequest {
    pub sdk_root: PathBuf,
    pub descriptor: PathBuf,
    pub export_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub project_name: String,
    pub device_id: String,
}

impl GenerateRequest {
    pub fn from_settings(settings: &BuildSettings, descriptor: &Path) -> Self {
        Self {
            sdk_root: settings.packages.sdk.clone(),
            descriptor: descriptor.to_path_buf(),
            export_dir: settings.export_dir(),
            templates_dir: settings.packages.templates.clone(),
            project_name: settings.project_name(),
            device_id: settings.device_id(),
        }
    }

    /// SLC CLI arguments, without the `slc` entry point
    pub fn args(&self) -> Vec<String> {
        vec![
            "generate".to_string(),
            "--sdk".to_string(),
            path_arg(&self.sdk_root),
            "--project-file".to_string(),
            path_arg(&self.descriptor),
            "--export-destination".to_string(),
            path_arg(&self.export_dir),
            "--export-templates".to_string(),
            path_arg(&self.templates_dir),
            "--project-name".to_string(),
            self.project_name.clone(),
            "--with".to_string(),
            self.device_id.clone(),
            "--require-clean-project".to_string(),
            "--no-copy".to_string(),
            "--output-type=makefile".to_string(),
        ]
    }
}

/// Regenerate the export for a descriptor
///
/// Call only after [`super::ensure_trusted`]. The artifact is written by the
/// tool itself; a failing run leaves the gate reporting reload-required.
pub fn regenerate<F, T>(
    fs: &F,
    invoker: &T,
    slc: &SlcCli,
    request: &GenerateRequest,
) -> Result<(), SdkError>
where
    F: FileSystem + ?Sized,
    T: ToolInvoker + ?Sized,
{
    if let Some(build_dir) = request.export_dir.parent() {
        if !fs.is_dir(build_dir) {
            fs.create_dir_all(build_dir)
                .map_err(|source| SdkError::Write {
                    path: build_dir.to_path_buf(),
                    source,
                })?;
        }
    }

    invoker.invoke(&slc.command(request.args()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::tool::RecordingInvoker;

    fn request() -> GenerateRequest {
        GenerateRequest {
            sdk_root: PathBuf::from("/pkgs/sdk"),
            descriptor: PathBuf::from("/proj/app.slcp"),
            export_dir: PathBuf::from("/proj/build/gsdk-export"),
            templates_dir: PathBuf::from("/pkgs/templates"),
            project_name: "app".to_string(),
            device_id: "EFR32BG22C224F512IM40".to_string(),
        }
    }

    #[test]
    fn test_generate_arguments() {
        let args = request().args();
        assert_eq!(
            args,
            vec![
                "generate",
                "--sdk",
                "/pkgs/sdk",
                "--project-file",
                "/proj/app.slcp",
                "--export-destination",
                "/proj/build/gsdk-export",
                "--export-templates",
                "/pkgs/templates",
                "--project-name",
                "app",
                "--with",
                "EFR32BG22C224F512IM40",
                "--require-clean-project",
                "--no-copy",
                "--output-type=makefile",
            ]
        );
    }

    #[test]
    fn test_regenerate_creates_build_dir_and_invokes() {
        let fs = MemoryFileSystem::new();
        let invoker = RecordingInvoker::new();
        let slc = SlcCli::new("python3", "/pkgs/slc");

        regenerate(&fs, &invoker, &slc, &request()).unwrap();

        assert!(fs.is_dir(Path::new("/proj/build")));
        assert_eq!(invoker.calls_to("generate"), 1);
        assert_eq!(invoker.calls()[0].args[0], "/pkgs/slc/slc");
    }

    #[test]
    fn test_regenerate_failure_is_propagated() {
        let fs = MemoryFileSystem::new();
        let invoker = RecordingInvoker::failing("Unable to resolve component");
        let slc = SlcCli::new("python3", "/pkgs/slc");

        let err = regenerate(&fs, &invoker, &slc, &request()).unwrap_err();
        assert!(err.to_string().contains("exited"));
        assert!(!fs.is_file(Path::new("/proj/build/gsdk-export/app.project.mak")));
    }
}
