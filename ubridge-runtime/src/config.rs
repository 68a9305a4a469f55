// Bridge configuration, deserialized from ubridge.config.toml.

use std::path::Path;

use serde::Deserialize;

use crate::error::{BridgeError, BridgeResult};

/// Top-level config file. Every section and key is optional.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub bridge: BridgeSection,
    #[serde(default)]
    pub gc: GcSection,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct BridgeSection {
    /// Package that receives generated classes, structs and enums.
    #[serde(default = "default_type_container")]
    pub type_container: String,
    /// Log category used by `blog!` and the module-level log functions.
    #[serde(default = "default_log_category")]
    pub log_category: String,
    /// Echo log records to stderr on flush.
    #[serde(default)]
    pub echo_log: bool,
}

impl Default for BridgeSection {
    fn default() -> Self {
        BridgeSection {
            type_container: default_type_container(),
            log_category: default_log_category(),
            echo_log: false,
        }
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct GcSection {
    /// Default for `purge_object_references(obj, include_inners)`.
    #[serde(default = "default_true")]
    pub purge_include_inners_default: bool,
}

impl Default for GcSection {
    fn default() -> Self {
        GcSection { purge_include_inners_default: true }
    }
}

fn default_type_container() -> String {
    "/Engine/ScriptTypes".to_string()
}

fn default_log_category() -> String {
    "LogScript".to_string()
}

fn default_true() -> bool {
    true
}

impl BridgeConfig {
    pub fn from_toml_str(text: &str) -> BridgeResult<Self> {
        toml::from_str(text).map_err(|e| BridgeError::Exception(format!("invalid bridge config: {e}")))
    }

    pub fn load(path: &Path) -> BridgeResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Exception(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.bridge.type_container, "/Engine/ScriptTypes");
        assert_eq!(config.bridge.log_category, "LogScript");
        assert!(config.gc.purge_include_inners_default);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [bridge]
            log_category = "LogBridge"

            [gc]
            purge_include_inners_default = false
            "#,
        )
        .unwrap();
        assert_eq!(config.bridge.log_category, "LogBridge");
        assert_eq!(config.bridge.type_container, "/Engine/ScriptTypes");
        assert!(!config.bridge.echo_log);
        assert!(!config.gc.purge_include_inners_default);
    }

    #[test]
    fn malformed_config_is_an_exception() {
        let err = BridgeConfig::from_toml_str("[bridge\n").unwrap_err();
        assert!(matches!(err, BridgeError::Exception(_)));
    }
}
