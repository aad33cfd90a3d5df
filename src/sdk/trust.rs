//! SDK trust establishment

use std::path::Path;

use super::SdkError;
use crate::fs::FileSystem;
use crate::tool::{path_arg, SlcCli, ToolInvoker};

/// Marker file in the SDK root recording that the SDK is trusted
pub const TRUST_MARKER: &str = "primary_trusted.trust";

/// Trust the SDK signature once per installation
///
/// Returns `true` if the trust command ran, `false` if the marker was
/// already present. A failing trust command leaves no marker behind.
pub fn ensure_trusted<F, T>(
    fs: &F,
    invoker: &T,
    slc: &SlcCli,
    sdk_root: &Path,
) -> Result<bool, SdkError>
where
    F: FileSystem + ?Sized,
    T: ToolInvoker + ?Sized,
{
    let marker = sdk_root.join(TRUST_MARKER);
    if fs.is_file(&marker) {
        return Ok(false);
    }

    log::info!("Trusting SDK at {}", sdk_root.display());
    invoker.invoke(&slc.command(["signature", "trust", "--sdk"]).arg(path_arg(sdk_root)))?;

    fs.write(&marker, &path_arg(sdk_root))
        .map_err(|source| SdkError::Write {
            path: marker.clone(),
            source,
        })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::tool::{RecordingInvoker, ToolError};

    fn slc() -> SlcCli {
        SlcCli::new("python3", "/pkgs/slc")
    }

    #[test]
    fn test_trust_runs_once() {
        let fs = MemoryFileSystem::new();
        fs.add_dir("/pkgs/sdk");
        let invoker = RecordingInvoker::new();
        let sdk = Path::new("/pkgs/sdk");

        assert!(ensure_trusted(&fs, &invoker, &slc(), sdk).unwrap());
        assert!(!ensure_trusted(&fs, &invoker, &slc(), sdk).unwrap());

        assert_eq!(invoker.calls().len(), 1);
        assert_eq!(
            invoker.calls()[0].args,
            vec!["/pkgs/slc/slc", "signature", "trust", "--sdk", "/pkgs/sdk"]
        );
        assert_eq!(
            fs.read_to_string(Path::new("/pkgs/sdk/primary_trusted.trust")).unwrap(),
            "/pkgs/sdk"
        );
    }

    #[test]
    fn test_existing_marker_skips_tool() {
        let fs = MemoryFileSystem::new();
        fs.add_file("/pkgs/sdk/primary_trusted.trust", "anything");
        let invoker = RecordingInvoker::new();

        assert!(!ensure_trusted(&fs, &invoker, &slc(), Path::new("/pkgs/sdk")).unwrap());
        assert!(invoker.calls().is_empty());
    }

    #[test]
    fn test_failure_writes_no_marker() {
        let fs = MemoryFileSystem::new();
        fs.add_dir("/pkgs/sdk");
        let invoker = RecordingInvoker::failing("signature verification failed");

        let err = ensure_trusted(&fs, &invoker, &slc(), Path::new("/pkgs/sdk")).unwrap_err();
        assert!(matches!(err, SdkError::Tool(ToolError::Failed { .. })));
        assert!(!fs.is_file(Path::new("/pkgs/sdk/primary_trusted.trust")));
    }
}
