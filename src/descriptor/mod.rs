//! Project descriptor (`.slcp`) discovery and default project generation

mod template;

pub use template::{render_descriptor, MAIN_TEMPLATE};

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::BuildSettings;
use crate::fs::FileSystem;

/// Descriptor file extension
pub const DESCRIPTOR_EXTENSION: &str = ".slcp";

/// How the descriptor was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorSource {
    /// `board.gecko_sdk.project_file`
    Configured,
    /// Scan of the project directory
    Discovered,
    /// Written by [`generate_default_project`]
    Generated,
}

/// The project's descriptor file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDescriptor {
    pub path: PathBuf,
    pub source: DescriptorSource,
}

/// Descriptor errors
#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("Failed to list project directory {path}: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Locate the descriptor: configured path first, then a project dir scan
///
/// With several candidates the first by name is used and a warning is
/// logged. Returns `None` when nothing is configured or found.
pub fn discover_descriptor<F: FileSystem + ?Sized>(
    fs: &F,
    settings: &BuildSettings,
) -> Result<Option<ProjectDescriptor>, DescriptorError> {
    if let Some(ref path) = settings.board.gecko_sdk.project_file {
        return Ok(Some(ProjectDescriptor {
            path: path.clone(),
            source: DescriptorSource::Configured,
        }));
    }

    let project_dir = &settings.project.dir;
    let candidates: Vec<String> = fs
        .list_dir(project_dir)
        .map_err(|source| DescriptorError::List {
            path: project_dir.clone(),
            source,
        })?
        .into_iter()
        .filter(|name| name.ends_with(DESCRIPTOR_EXTENSION))
        .filter(|name| fs.is_file(&project_dir.join(name)))
        .collect();

    let Some(first) = candidates.first() else {
        return Ok(None);
    };

    if candidates.len() > 1 {
        log::warn!(
            "Detected multiple SLCP configuration files! {} will be used.",
            first
        );
        log::warn!(
            "You can specify a custom SLCP file using the `board.gecko_sdk.project_file` setting."
        );
    }

    Ok(Some(ProjectDescriptor {
        path: project_dir.join(first),
        source: DescriptorSource::Discovered,
    }))
}

/// Whether the project has no usable descriptor
pub fn is_project_empty<F: FileSystem + ?Sized>(
    fs: &F,
    descriptor: Option<&ProjectDescriptor>,
) -> bool {
    descriptor.map_or(true, |d| !fs.is_file(&d.path))
}

/// Write a minimal descriptor and, for an empty source dir, a `main.c`
pub fn generate_default_project<F: FileSystem + ?Sized>(
    fs: &F,
    settings: &BuildSettings,
) -> Result<ProjectDescriptor, DescriptorError> {
    let name = settings.project_name();
    let descriptor = settings.project.dir.join(format!("{}{}", name, DESCRIPTOR_EXTENSION));

    write(
        fs,
        &descriptor,
        &render_descriptor(&name, &settings.packages.sdk_version, &settings.device_id()),
    )?;
    log::info!("Generated default project descriptor {}", descriptor.display());

    let src_dir = &settings.project.src_dir;
    let src_empty = !fs.is_dir(src_dir)
        || fs
            .list_dir(src_dir)
            .map(|entries| entries.is_empty())
            .unwrap_or(true);
    if src_empty {
        let main = src_dir.join("main.c");
        write(fs, &main, MAIN_TEMPLATE)?;
        log::info!("Generated default entry point {}", main.display());
    }

    Ok(ProjectDescriptor {
        path: descriptor,
        source: DescriptorSource::Generated,
    })
}

fn write<F: FileSystem + ?Sized>(fs: &F, path: &Path, contents: &str) -> Result<(), DescriptorError> {
    let to_err = |source| DescriptorError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs.create_dir_all(parent).map_err(to_err)?;
    }
    fs.write(path, contents).map_err(to_err)
}
