//! Build environment accumulator
//!
//! Holds everything the translator derives from an export. One instance is
//! owned per build and threaded through each `apply_*` step by `&mut`.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::filter::SourceFilter;
use crate::schema::FlagScope;

/// A preprocessor macro definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Define {
    /// `-DNAME`
    Name(String),
    /// `-DNAME=VALUE`
    Pair(String, String),
}

/// Build rule restricted to the listed files of one directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceBuildRule {
    /// Directory holding the sources
    pub src_dir: PathBuf,

    /// Staging directory for object files
    pub variant_dir: PathBuf,

    /// Inclusion filter, relative to `src_dir`
    pub filter: SourceFilter,

    /// Files the rule was created for, in export order
    pub files: Vec<PathBuf>,
}

impl SourceBuildRule {
    /// Whether a file inside `src_dir` is compiled by this rule
    pub fn selects(&self, file: &Path) -> bool {
        file.strip_prefix(&self.src_dir)
            .map(|relative| self.filter.matches(relative))
            .unwrap_or(false)
    }
}

/// Flags, paths and rules accumulated for a build
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildEnvironment {
    pub asflags: Vec<String>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub linkflags: Vec<String>,

    /// Include search paths
    pub cpppath: Vec<PathBuf>,

    pub cppdefines: Vec<Define>,

    /// Library names passed as `-l<name>`
    pub libs: Vec<String>,

    /// Quoted precompiled library paths, placed verbatim on the link line
    pub raw_lib_flags: Vec<String>,

    pub build_rules: Vec<SourceBuildRule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldscript: Option<PathBuf>,
}

impl BuildEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self, scope: FlagScope) -> &[String] {
        match scope {
            FlagScope::Assembler => &self.asflags,
            FlagScope::C => &self.cflags,
            FlagScope::Cxx => &self.cxxflags,
            FlagScope::Linker => &self.linkflags,
        }
    }

    pub fn flags_mut(&mut self, scope: FlagScope) -> &mut Vec<String> {
        match scope {
            FlagScope::Assembler => &mut self.asflags,
            FlagScope::C => &mut self.cflags,
            FlagScope::Cxx => &mut self.cxxflags,
            FlagScope::Linker => &mut self.linkflags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_mut_targets_scope() {
        let mut env = BuildEnvironment::new();
        env.flags_mut(FlagScope::Linker).push("-lm".to_string());
        env.flags_mut(FlagScope::Assembler).push("-x".to_string());

        assert_eq!(env.flags(FlagScope::Linker), ["-lm"]);
        assert_eq!(env.flags(FlagScope::Assembler), ["-x"]);
        assert!(env.flags(FlagScope::C).is_empty());
        assert!(env.flags(FlagScope::Cxx).is_empty());
    }

    #[test]
    fn test_define_serialization() {
        let defines = vec![
            Define::Name("FOO".to_string()),
            Define::Pair("BAR".to_string(), "1".to_string()),
        ];
        let json = serde_json::to_value(&defines).unwrap();
        assert_eq!(json, serde_json::json!(["FOO", ["BAR", "1"]]));
    }

    #[test]
    fn test_rule_selects_only_files_in_its_directory() {
        let rule = SourceBuildRule {
            src_dir: PathBuf::from("/sdk/platform/service"),
            variant_dir: PathBuf::from("/build/gsdk-build/service1a2b3"),
            filter: SourceFilter::only_files(&["a.c"]).unwrap(),
            files: vec![PathBuf::from("/sdk/platform/service/a.c")],
        };

        assert!(rule.selects(Path::new("/sdk/platform/service/a.c")));
        assert!(!rule.selects(Path::new("/sdk/platform/service/b.c")));
        assert!(!rule.selects(Path::new("/elsewhere/a.c")));
    }
}
