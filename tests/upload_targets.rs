//! Upload Target Tests
//!
//! Bootloader targets resolved from layered settings on disk.

use std::fs;

use gsdk_build::config::{SettingsOrigin, PROJECT_CONFIG_FILE};
use gsdk_build::targets::{bootloader_targets, plan_for, TargetError, BOOTLOADER_TARGETS};
use gsdk_build::{EffectiveSettings, OsFileSystem};
use serde_json::json;
use tempfile::TempDir;

const PROJECT: &str = r#"
[packages]
sdk = "/opt/gecko_sdk"
slc_cli = "/opt/slc_cli"
toolchain = "/opt/gcc-arm-none-eabi"
templates = "/opt/templates"

[board]
id = "brd4186c"
mcu = "efr32mg24b210f1536im48"

[upload]
bootloader = "bootloader-storage-internal-single.s37"
offset_address = "0x08006000"
"#;

fn setup(host: Option<&str>) -> (TempDir, EffectiveSettings) {
    let dir = TempDir::new().unwrap();
    let project = dir.path().join(PROJECT_CONFIG_FILE);
    fs::write(&project, PROJECT).unwrap();
    fs::write(dir.path().join("bootloader-storage-internal-single.s37"), "S0030000FC\n").unwrap();

    let host_path = dir.path().join("host.toml");
    if let Some(host) = host {
        fs::write(&host_path, host).unwrap();
    }

    let effective = EffectiveSettings::build(
        Some(host_path.as_path()),
        Some(project.as_path()),
        Some(json!({"verbose": true})),
        dir.path(),
    )
    .unwrap();
    (dir, effective)
}

#[test]
fn test_bootloader_targets_from_project_settings() {
    let (dir, effective) = setup(None);

    let targets = bootloader_targets(&OsFileSystem, &effective.settings, &[]).unwrap();

    assert_eq!(targets.len(), BOOTLOADER_TARGETS.len());
    for target in &targets {
        assert!(target.always_build);
        assert_eq!(target.offset_address, "0x0");
        assert_eq!(
            target.bootloader,
            dir.path().join("bootloader-storage-internal-single.s37")
        );
    }
}

#[test]
fn test_upload_bootloader_plan() {
    let (_dir, effective) = setup(None);

    let plan = plan_for(&OsFileSystem, &effective.settings, "upload_bootloader").unwrap();

    assert!(plan.command.starts_with("$UPLOADER $UPLOADERFLAGS -CommanderScript"));
    assert!(plan.command.contains("bootloader-storage-internal-single.s37"));
    assert_eq!(plan.offset_address.as_deref(), Some("0x0"));

    let app = plan_for(&OsFileSystem, &effective.settings, "upload").unwrap();
    assert_eq!(app.command, "$UPLOADER $UPLOADERFLAGS");
    assert_eq!(app.offset_address.as_deref(), Some("0x08006000"));
}

#[test]
fn test_bootloader_offset_from_host_layer() {
    let (_dir, effective) = setup(Some("[upload]\nbootloader_offset = \"0x08000000\"\n"));

    let plan = plan_for(&OsFileSystem, &effective.settings, "program_bootloader").unwrap();
    assert_eq!(plan.offset_address.as_deref(), Some("0x08000000"));
    assert_eq!(
        effective.settings.upload.offset_address.as_deref(),
        Some("0x08006000")
    );
}

#[test]
fn test_layers_and_provenance() {
    let (_dir, effective) = setup(Some("[packages]\npython = \"/usr/local/bin/python3.11\"\n"));

    let origins: Vec<&SettingsOrigin> = effective.sources.iter().map(|s| &s.origin).collect();
    assert_eq!(
        origins,
        vec![
            &SettingsOrigin::Builtin,
            &SettingsOrigin::Host,
            &SettingsOrigin::Project,
            &SettingsOrigin::Cli,
        ]
    );
    assert!(effective.settings.verbose);
    // Project layer does not mention python; the host value survives
    assert_eq!(
        effective.settings.packages.python.to_str(),
        Some("/usr/local/bin/python3.11")
    );
    assert_eq!(effective.settings.packages.sdk_version, "4.4.0");
}

#[test]
fn test_missing_bootloader_image() {
    let (dir, effective) = setup(None);
    fs::remove_file(dir.path().join("bootloader-storage-internal-single.s37")).unwrap();

    assert!(matches!(
        plan_for(&OsFileSystem, &effective.settings, "program_bootloader"),
        Err(TargetError::MissingBootloader(_))
    ));
}
