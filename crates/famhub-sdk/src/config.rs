use std::path::Path;

use famhub_fabric::FabricConfig;
use serde::{Deserialize, Serialize};

use crate::error::{HubError, HubResult};

/// Configuration for a [`FamilyHub`](crate::FamilyHub).
///
/// Every field has a default, so an empty TOML document is valid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub delivery: FabricConfig,
    pub roles: RoleConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    /// Seed the default role templates when a family is opened.
    pub bootstrap_defaults: bool,
    /// Title of the role added when a family's last role is deleted.
    pub fallback_title: String,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            bootstrap_defaults: true,
            fallback_title: famhub_repo::engine::FALLBACK_TITLE.to_string(),
        }
    }
}

impl HubConfig {
    pub fn from_toml_str(source: &str) -> HubResult<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> HubResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| HubError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> HubResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = HubConfig::default();
        assert_eq!(c.delivery.thread_name, "famhub-delivery");
        assert!(c.roles.bootstrap_defaults);
        assert_eq!(c.roles.fallback_title, "Member");
    }

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(HubConfig::from_toml_str("").unwrap(), HubConfig::default());
    }

    #[test]
    fn partial_document_overrides_only_named_fields() {
        let c = HubConfig::from_toml_str("[roles]\nbootstrap_defaults = false\n").unwrap();
        assert!(!c.roles.bootstrap_defaults);
        assert_eq!(c.roles.fallback_title, "Member");
        assert_eq!(c.delivery, FabricConfig::default());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[delivery]\nthread_name = \"hub-events\"\n\n[roles]\nfallback_title = \"Household\"").unwrap();

        let c = HubConfig::load(file.path()).unwrap();
        assert_eq!(c.delivery.thread_name, "hub-events");
        assert_eq!(c.roles.fallback_title, "Household");
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = HubConfig::load(&path).unwrap_err();
        assert!(matches!(err, HubError::ConfigIo { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = HubConfig::from_toml_str("[roles\n").unwrap_err();
        assert!(matches!(err, HubError::ConfigParse(_)));
    }

    #[test]
    fn rendered_config_parses_back() {
        let rendered = HubConfig::default().to_toml_string().unwrap();
        assert!(rendered.contains("fallback_title"));
        assert_eq!(HubConfig::from_toml_str(&rendered).unwrap(), HubConfig::default());
    }
}
