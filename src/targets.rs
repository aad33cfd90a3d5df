//! Bootloader upload targets
//!
//! Two always-rebuilt custom targets reprogram the bootloader image instead
//! of the application: the upload command is pointed at a J-Link commander
//! script for the bootloader binary and the offset is moved to the
//! bootloader's address. The standard upload action then runs unchanged.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::BuildSettings;
use crate::fs::FileSystem;

/// Names of the bootloader targets
pub const BOOTLOADER_TARGETS: [&str; 2] = ["program_bootloader", "upload_bootloader"];

/// Target used by IDE integrations to dump build metadata; never uploads
pub const IDEDATA_TARGET: &str = "idedata";

/// Bootloader offset used when `upload.bootloader_offset` is not set
pub const DEFAULT_BOOTLOADER_OFFSET: &str = "0x0";

/// Upload command and offset the standard upload action runs with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadPlan {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_address: Option<String>,
}

impl UploadPlan {
    pub fn from_settings(settings: &BuildSettings) -> Self {
        Self {
            command: settings.upload.command.clone(),
            offset_address: settings.upload.offset_address.clone(),
        }
    }
}

/// A custom target reconfiguring the upload for a bootloader image
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomTarget {
    pub name: String,
    pub title: String,
    pub always_build: bool,
    pub bootloader: PathBuf,
    pub offset_address: String,
}

impl CustomTarget {
    /// Point `plan` at the bootloader image
    pub fn apply(&self, plan: &mut UploadPlan) {
        plan.command = format!(
            "$UPLOADER $UPLOADERFLAGS -CommanderScript \"${{__jlink_cmd_script(__env__, \"{}\")}}\"",
            self.bootloader.display()
        );
        plan.offset_address = Some(self.offset_address.clone());
    }
}

/// Target errors
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("Missing bootloader binary! Set `upload.bootloader`")]
    NotConfigured,

    #[error("Missing bootloader binary! {0} does not exist")]
    MissingBootloader(PathBuf),

    #[error("Unknown target '{0}'")]
    Unknown(String),
}

/// Bootloader targets for the configured bootloader image
///
/// Empty when the invoked targets include `idedata`.
pub fn bootloader_targets<F: FileSystem + ?Sized>(
    fs: &F,
    settings: &BuildSettings,
    invoked: &[String],
) -> Result<Vec<CustomTarget>, TargetError> {
    if invoked.iter().any(|t| t == IDEDATA_TARGET) {
        return Ok(Vec::new());
    }

    let bootloader = settings
        .upload
        .bootloader
        .as_deref()
        .ok_or(TargetError::NotConfigured)?;
    check_exists(fs, bootloader)?;

    let offset = settings
        .upload
        .bootloader_offset
        .clone()
        .unwrap_or_else(|| DEFAULT_BOOTLOADER_OFFSET.to_string());

    Ok(BOOTLOADER_TARGETS
        .iter()
        .map(|name| CustomTarget {
            name: name.to_string(),
            title: "Programming bootloader...".to_string(),
            always_build: true,
            bootloader: bootloader.to_path_buf(),
            offset_address: offset.clone(),
        })
        .collect())
}

/// Upload plan for an invoked target
pub fn plan_for<F: FileSystem + ?Sized>(
    fs: &F,
    settings: &BuildSettings,
    target: &str,
) -> Result<UploadPlan, TargetError> {
    let mut plan = UploadPlan::from_settings(settings);
    if target == "upload" {
        return Ok(plan);
    }

    let targets = bootloader_targets(fs, settings, &[target.to_string()])?;
    let custom = targets
        .iter()
        .find(|t| t.name == target)
        .ok_or_else(|| TargetError::Unknown(target.to_string()))?;
    custom.apply(&mut plan);
    Ok(plan)
}

fn check_exists<F: FileSystem + ?Sized>(fs: &F, path: &Path) -> Result<(), TargetError> {
    if fs.is_file(path) {
        Ok(())
    } else {
        Err(TargetError::MissingBootloader(path.to_path_buf()))
    }
}
