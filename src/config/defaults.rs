//! Built-in defaults (layer 1)

use serde_json::{json, Value};

/// Default values for every setting that has one
///
/// Package locations have no sensible default and are left empty; the
/// merged settings are rejected if they are still empty.
#[derive(Debug, Clone)]
pub struct BuiltinDefaults {
    pub src_dir: String,
    pub build_dir: String,
    pub python: String,
    pub sdk_version: String,
    pub extra_link_flags: Vec<String>,
    pub upload_command: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            src_dir: "src".to_string(),
            build_dir: "build".to_string(),
            python: "python3".to_string(),
            sdk_version: "4.4.0".to_string(),
            // The SLC CLI export omits the newlib syscall stubs
            extra_link_flags: vec!["--specs=nosys.specs".to_string()],
            upload_command: "$UPLOADER $UPLOADERFLAGS".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> Value {
        json!({
            "project": {
                "dir": ".",
                "src_dir": self.src_dir,
                "build_dir": self.build_dir
            },
            "packages": {
                "sdk": "",
                "sdk_version": self.sdk_version,
                "slc_cli": "",
                "toolchain": "",
                "templates": "",
                "python": self.python
            },
            "board": {
                "id": "",
                "mcu": "",
                "gecko_sdk": {}
            },
            "build": {
                "extra_link_flags": self.extra_link_flags
            },
            "upload": {
                "command": self.upload_command
            },
            "verbose": false
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.src_dir, "src");
        assert_eq!(defaults.extra_link_flags, vec!["--specs=nosys.specs"]);
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["project"]["build_dir"], "build");
        assert_eq!(value["packages"]["python"], "python3");
        assert_eq!(value["packages"]["sdk"], "");
        assert_eq!(value["build"]["extra_link_flags"][0], "--specs=nosys.specs");
        assert_eq!(value["verbose"], false);
    }
}
