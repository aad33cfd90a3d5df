//! External tool invocation
//!
//! Abstracts subprocess execution for testability. Provides:
//! - ToolCommand: program, arguments and environment of one invocation
//! - SlcCli: builds SLC CLI commands (`<python> <slc_cli>/slc <args>`)
//! - ToolInvoker trait: runs a command to completion
//! - ProcessInvoker: real subprocess execution
//! - RecordingInvoker: records commands in-process for unit tests

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

/// A fully specified tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,

    /// Directories prepended to `PATH`
    pub path_prepend: Vec<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            path_prepend: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn prepend_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.path_prepend.push(dir.into());
        self
    }

    /// Value of `PATH` for the child, given the current one
    pub fn child_path(&self, current: Option<OsString>) -> Option<OsString> {
        if self.path_prepend.is_empty() {
            return current;
        }
        let mut dirs: Vec<PathBuf> = self.path_prepend.clone();
        if let Some(current) = current {
            dirs.extend(std::env::split_paths(&current));
        }
        std::env::join_paths(dirs).ok()
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Tool invocation errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran and exited non-zero; `output` holds captured stdout/stderr
    #[error("External tool exited with {status}")]
    Failed { status: String, output: String },
}

/// Runs external tools to completion
pub trait ToolInvoker {
    fn invoke(&self, command: &ToolCommand) -> Result<(), ToolError>;
}

/// Spawns real processes
///
/// Non-verbose runs capture stdout/stderr and only surface them on failure.
/// Verbose runs stream directly to the terminal.
#[derive(Debug, Clone, Default)]
pub struct ProcessInvoker {
    pub verbose: bool,
}

impl ProcessInvoker {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ToolInvoker for ProcessInvoker {
    fn invoke(&self, command: &ToolCommand) -> Result<(), ToolError> {
        log::debug!("Running {}", command);

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(path) = command.child_path(std::env::var_os("PATH")) {
            cmd.env("PATH", path);
        }

        let spawn_err = |source| ToolError::Spawn {
            program: command.program.display().to_string(),
            source,
        };

        if self.verbose {
            let status = cmd
                .stdin(Stdio::null())
                .status()
                .map_err(spawn_err)?;
            if !status.success() {
                return Err(ToolError::Failed {
                    status: status.to_string(),
                    output: String::new(),
                });
            }
            return Ok(());
        }

        let output = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(spawn_err)?;

        if !output.status.success() {
            let combined = format!(
                "{} {}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
            return Err(ToolError::Failed {
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }

        Ok(())
    }
}

type Hook = Box<dyn Fn(&ToolCommand) -> Result<(), ToolError> + Send>;

/// Records invocations instead of spawning processes
///
/// An optional hook runs for every command, letting tests emulate the
/// tool's side effects (writing the export) or its failure.
#[derive(Default)]
pub struct RecordingInvoker {
    calls: Mutex<Vec<ToolCommand>>,
    hook: Option<Hook>,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook<F>(hook: F) -> Self
    where
        F: Fn(&ToolCommand) -> Result<(), ToolError> + Send + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            hook: Some(Box::new(hook)),
        }
    }

    /// Invoker whose every call fails with the given output
    pub fn failing(output: &str) -> Self {
        let output = output.to_string();
        Self::with_hook(move |_| {
            Err(ToolError::Failed {
                status: "exit status: 1".to_string(),
                output: output.clone(),
            })
        })
    }

    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Recorded calls whose first SLC argument is `subcommand`
    pub fn calls_to(&self, subcommand: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.args.get(1).map(String::as_str) == Some(subcommand))
            .count()
    }
}

impl ToolInvoker for RecordingInvoker {
    fn invoke(&self, command: &ToolCommand) -> Result<(), ToolError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command.clone());
        match &self.hook {
            Some(hook) => hook(command),
            None => Ok(()),
        }
    }
}

/// SLC CLI command builder
///
/// The CLI is a Python entry point that needs a Java runtime; a portable JDK
/// is put first on `PATH` when configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlcCli {
    pub python: PathBuf,
    pub slc_cli_dir: PathBuf,
    pub jdk_dir: Option<PathBuf>,
}

impl SlcCli {
    pub fn new(python: impl Into<PathBuf>, slc_cli_dir: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            slc_cli_dir: slc_cli_dir.into(),
            jdk_dir: None,
        }
    }

    pub fn with_jdk(mut self, jdk_dir: impl Into<PathBuf>) -> Self {
        self.jdk_dir = Some(jdk_dir.into());
        self
    }

    pub fn script(&self) -> PathBuf {
        self.slc_cli_dir.join("slc")
    }

    /// Command running `slc <args...>`
    pub fn command<I, S>(&self, args: I) -> ToolCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut command = ToolCommand::new(&self.python)
            .arg(path_arg(&self.script()))
            .args(args);
        if let Some(ref jdk) = self.jdk_dir {
            command = command.prepend_path(jdk.join("bin"));
        }
        command
    }
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
