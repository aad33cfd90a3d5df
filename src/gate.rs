//! Configuration cache gate
//!
//! Decides whether the SLC CLI export must be regenerated. The export is
//! valid only if:
//! - the `autogen` and `config` export subdirectories exist and are non-empty
//! - the artifact file exists
//! - the descriptor exists and is not newer than the artifact
//! - no dependency directory (SDK, SLC CLI, toolchain) is newer than the artifact
//!
//! Nothing is memoized; every build re-reads the timestamps.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;

use crate::fs::FileSystem;

/// Export subdirectories that must be populated for a usable export
pub const REQUIRED_EXPORT_SUBDIRS: [&str; 2] = ["autogen", "config"];

/// Paths whose timestamps decide cache validity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StalenessWitness {
    /// The exported configuration artifact
    pub artifact: PathBuf,

    /// Export subdirectories that must exist and be non-empty
    pub required_dirs: Vec<PathBuf>,

    /// SDK, SLC CLI and toolchain roots
    pub dependencies: Vec<PathBuf>,
}

impl StalenessWitness {
    /// Witness for an export dir, artifact and dependency roots
    pub fn new(export_dir: &Path, artifact: PathBuf, dependencies: Vec<PathBuf>) -> Self {
        Self {
            artifact,
            required_dirs: REQUIRED_EXPORT_SUBDIRS
                .iter()
                .map(|d| export_dir.join(d))
                .collect(),
            dependencies,
        }
    }
}

/// Why a reload is required
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "path", rename_all = "snake_case")]
pub enum ReloadReason {
    ExportDirMissing(PathBuf),
    ArtifactMissing(PathBuf),
    DescriptorMissing(PathBuf),
    DescriptorNewer(PathBuf),
    DependencyNewer(PathBuf),
}

impl std::fmt::Display for ReloadReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReloadReason::ExportDirMissing(p) => write!(f, "{} is missing or empty", p.display()),
            ReloadReason::ArtifactMissing(p) => write!(f, "{} does not exist", p.display()),
            ReloadReason::DescriptorMissing(p) => write!(f, "{} does not exist", p.display()),
            ReloadReason::DescriptorNewer(p) => {
                write!(f, "{} changed since the last export", p.display())
            }
            ReloadReason::DependencyNewer(p) => {
                write!(f, "{} changed since the last export", p.display())
            }
        }
    }
}

/// Staleness check over an injected filesystem
pub struct CacheGate<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    witness: &'a StalenessWitness,
}

impl<'a, F: FileSystem + ?Sized> CacheGate<'a, F> {
    pub fn new(fs: &'a F, witness: &'a StalenessWitness) -> Self {
        Self { fs, witness }
    }

    /// Whether the export must be regenerated for `descriptor`
    pub fn is_reload_required(&self, descriptor: &Path) -> bool {
        self.reload_reason(descriptor).is_some()
    }

    /// First failing check, `None` when the export is up to date
    pub fn reload_reason(&self, descriptor: &Path) -> Option<ReloadReason> {
        for dir in &self.witness.required_dirs {
            let populated = self.fs.is_dir(dir)
                && self
                    .fs
                    .list_dir(dir)
                    .map(|entries| !entries.is_empty())
                    .unwrap_or(false);
            if !populated {
                return Some(ReloadReason::ExportDirMissing(dir.clone()));
            }
        }

        let artifact = &self.witness.artifact;
        if !self.fs.is_file(artifact) {
            return Some(ReloadReason::ArtifactMissing(artifact.clone()));
        }
        let artifact_mtime = match self.fs.modified(artifact) {
            Ok(mtime) => mtime,
            Err(_) => return Some(ReloadReason::ArtifactMissing(artifact.clone())),
        };

        if !self.fs.is_file(descriptor) {
            return Some(ReloadReason::DescriptorMissing(descriptor.to_path_buf()));
        }
        if self.newer_than(descriptor, artifact_mtime) {
            return Some(ReloadReason::DescriptorNewer(descriptor.to_path_buf()));
        }

        self.witness
            .dependencies
            .iter()
            .find(|dep| self.newer_than(dep, artifact_mtime))
            .map(|dep| ReloadReason::DependencyNewer(dep.clone()))
    }

    /// Unreadable timestamps count as newer
    fn newer_than(&self, path: &Path, reference: SystemTime) -> bool {
        self.fs
            .modified(path)
            .map(|mtime| mtime > reference)
            .unwrap_or(true)
    }
}
