//! Translation of an export into a build environment
//!
//! Each `apply_*` step reads one section of the export and appends to the
//! matching channel of the [`BuildEnvironment`]. Order is preserved and
//! nothing is deduplicated.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::environment::{BuildEnvironment, Define, SourceBuildRule};
use crate::filter::{FilterError, SourceFilter};
use crate::schema::{ExportedConfiguration, FlagScope};
use crate::shell::split_arg_string;

/// Placeholder the host build system substitutes with its build directory
pub const BUILD_DIR_PLACEHOLDER: &str = "$BUILD_DIR";

/// Linker flag carrying the linker script
pub const LINKER_SCRIPT_PREFIX: &str = "-T";

/// Subdirectory of the build dir holding per-directory staging dirs
const STAGING_ROOT: &str = "gsdk-build";

/// Translation errors
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    /// The exporter output no longer matches the expected schema
    #[error("Exported configuration is missing the {0} flag scope")]
    MissingScope(FlagScope),

    #[error("Failed to build source filter for {dir}: {source}")]
    Filter {
        dir: PathBuf,
        #[source]
        source: FilterError,
    },
}

/// Apply flags of all four scopes plus the macro definitions
pub fn apply_flags(
    config: &ExportedConfiguration,
    env: &mut BuildEnvironment,
) -> Result<(), TranslateError> {
    let mut scopes = Vec::with_capacity(FlagScope::ALL.len());
    for scope in FlagScope::ALL {
        let flags = config
            .scope(scope)
            .ok_or(TranslateError::MissingScope(scope))?;
        scopes.push((scope, flags));
    }

    for (scope, flags) in scopes {
        for flag in flags {
            // Linker script is resolved by extract_linker_script
            if scope == FlagScope::Linker && flag.starts_with(LINKER_SCRIPT_PREFIX) {
                continue;
            }
            let target = env.flags_mut(scope);
            for arg in split_arg_string(flag) {
                if arg.contains(BUILD_DIR_PLACEHOLDER) {
                    target.push(format!("\"{}\"", arg));
                } else {
                    target.push(arg);
                }
            }
        }
    }

    env.cppdefines
        .extend(extract_macros(&config.defines.cppdefines));

    Ok(())
}

/// Convert `-D` tokens into macro definitions
pub fn extract_macros<S: AsRef<str>>(raw: &[S]) -> Vec<Define> {
    raw.iter()
        .map(|token| {
            let token = token.as_ref();
            let token = token.strip_prefix("-D").unwrap_or(token);
            match token.split_once('=') {
                Some((name, value)) if value.starts_with('<') => {
                    Define::Pair(name.to_string(), format!("\"{}\"", value))
                }
                Some((name, value)) => Define::Pair(name.to_string(), value.to_string()),
                None => Define::Name(token.to_string()),
            }
        })
        .collect()
}

/// Append include paths, resolving relative ones against the export root
pub fn apply_includes(
    config: &ExportedConfiguration,
    export_root: &Path,
    env: &mut BuildEnvironment,
) {
    env.cpppath.extend(
        config
            .includes
            .cpppath
            .iter()
            .map(|include| resolve(export_root, include)),
    );
}

/// Append system libraries and precompiled library files
pub fn apply_libraries(config: &ExportedConfiguration, env: &mut BuildEnvironment) {
    env.libs.extend(
        config
            .libraries
            .system
            .iter()
            .map(|lib| lib.replacen("-l", "", 1)),
    );

    env.raw_lib_flags.extend(
        config
            .libraries
            .user
            .iter()
            .map(|lib| format!("\"{}\"", lib)),
    );
}

/// Source files grouped by containing directory, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceGroups {
    groups: Vec<(PathBuf, Vec<PathBuf>)>,
    index: HashMap<PathBuf, usize>,
}

impl SourceGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the group of its parent directory
    pub fn push(&mut self, file: PathBuf) {
        let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
        match self.index.get(&dir) {
            Some(&i) => self.groups[i].1.push(file),
            None => {
                self.index.insert(dir.clone(), self.groups.len());
                self.groups.push((dir, vec![file]));
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &[PathBuf])> {
        self.groups
            .iter()
            .map(|(dir, files)| (dir.as_path(), files.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Make every source path absolute and group by directory
pub fn collect_sources(config: &ExportedConfiguration, export_root: &Path) -> SourceGroups {
    let mut groups = SourceGroups::new();
    for source in &config.sources {
        groups.push(normalize(&resolve(export_root, source)));
    }
    groups
}

/// Register one build rule per source directory outside the project sources
///
/// Directories under `project_src` are compiled by the host build directly.
pub fn build_sources(
    groups: &SourceGroups,
    project_src: &Path,
    build_dir: &Path,
    env: &mut BuildEnvironment,
) -> Result<(), TranslateError> {
    for (dir, files) in groups.iter() {
        if dir.starts_with(project_src) {
            continue;
        }

        let names: Vec<String> = files
            .iter()
            .filter_map(|f| f.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        let filter = SourceFilter::only_files(&names).map_err(|source| TranslateError::Filter {
            dir: dir.to_path_buf(),
            source,
        })?;

        env.build_rules.push(SourceBuildRule {
            src_dir: dir.to_path_buf(),
            variant_dir: build_dir.join(STAGING_ROOT).join(staging_dir_name(dir)),
            filter,
            files: files.to_vec(),
        });
    }
    Ok(())
}

/// Staging directory name: directory basename plus a short hash of its path
///
/// Same-named directories at different locations must not collide.
pub fn staging_dir_name(dir: &Path) -> String {
    let base = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let digest = hex::encode(Sha256::digest(dir.to_string_lossy().as_bytes()));
    format!("{}{}", base, &digest[..5])
}

/// Linker script named by the first `-T` linker flag
pub fn extract_linker_script(
    config: &ExportedConfiguration,
    export_root: &Path,
) -> Option<PathBuf> {
    config
        .scope(FlagScope::Linker)?
        .iter()
        .filter_map(|flag| flag.strip_prefix(LINKER_SCRIPT_PREFIX))
        .map(|script| script.replace('"', ""))
        .find(|script| !script.is_empty())
        .map(|script| resolve(export_root, &script))
}

/// Run flags, includes and libraries in one pass
pub fn apply_all(
    config: &ExportedConfiguration,
    export_root: &Path,
    env: &mut BuildEnvironment,
) -> Result<(), TranslateError> {
    apply_flags(config, env)?;
    apply_includes(config, export_root, env);
    apply_libraries(config, env);
    Ok(())
}

fn resolve(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Fold `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
