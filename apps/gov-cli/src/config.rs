// config.rs — CLI configuration and the `.gov/` layout.
//
// CoreConfig determines where governed state lives: approval records,
// baselines, suspensions, the receipt log, and export bundles. The
// `for_project()` constructor generates the standard layout under a
// `.gov/` directory in the project root.
//
// CoreSettings are the tunables: policy caps, governor thresholds,
// regression tolerance, probation length, registered capabilities, and
// export redaction. An optional `gov.toml` next to `.gov/` overrides the
// defaults section by section.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use gov_governor::GovernorConfig;
use gov_policy::{InMemoryRegistry, PolicyConfig};
use gov_trust::RequalificationConfig;

/// Where governed state is stored for a project.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Root directory of the project.
    pub workspace_root: PathBuf,

    /// Directory for approval records (one JSON file per execution id).
    pub approvals_dir: PathBuf,

    /// Directory for baseline history (one JSONL file per fingerprint).
    pub baselines_dir: PathBuf,

    /// Directory for suspension records (one JSON file per fingerprint).
    pub suspensions_dir: PathBuf,

    /// Path to the append-only receipt log.
    pub receipts_log: PathBuf,

    /// Path to the alert event log.
    pub alerts_log: PathBuf,

    /// Base directory for audit export bundles.
    pub exports_dir: PathBuf,

    /// Path to the optional settings file.
    pub settings_file: PathBuf,
}

impl CoreConfig {
    /// Create a config with the standard `.gov/` layout for a project.
    pub fn for_project(project_root: impl AsRef<Path>) -> Self {
        let root = project_root.as_ref().to_path_buf();
        let gov_dir = root.join(".gov");
        Self {
            settings_file: root.join("gov.toml"),
            approvals_dir: gov_dir.join("approvals"),
            baselines_dir: gov_dir.join("baselines"),
            suspensions_dir: gov_dir.join("suspensions"),
            receipts_log: gov_dir.join("receipts.jsonl"),
            alerts_log: gov_dir.join("alerts.jsonl"),
            exports_dir: gov_dir.join("exports"),
            workspace_root: root,
        }
    }
}

/// Regression comparison tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegressionSettings {
    /// Score points the baseline may drop before flagging a regression.
    pub tolerance: u32,
}

impl Default for RegressionSettings {
    fn default() -> Self {
        Self { tolerance: 5 }
    }
}

/// Export redaction tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportSettings {
    /// JSON fields blanked out in exported exhibit copies.
    pub redact_fields: Vec<String>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            redact_fields: vec![
                "api_token".to_string(),
                "secret".to_string(),
                "credentials".to_string(),
            ],
        }
    }
}

/// All tunables, with a `gov.toml` section per concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoreSettings {
    pub policy: PolicyConfig,
    pub governor: GovernorConfig,
    pub regression: RegressionSettings,
    pub requalification: RequalificationConfig,
    /// Registered capability providers, capability → provider id.
    pub capabilities: BTreeMap<String, String>,
    pub export: ExportSettings,
}

impl CoreSettings {
    /// Load settings, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::with_default_capabilities());
        }
        let text = std::fs::read_to_string(path)?;
        let mut settings: CoreSettings = toml::from_str(&text)?;
        if settings.capabilities.is_empty() {
            settings.capabilities = default_capabilities();
        }
        Ok(settings)
    }

    pub fn with_default_capabilities() -> Self {
        Self {
            capabilities: default_capabilities(),
            ..Self::default()
        }
    }

    /// Build the capability registry from the configured providers.
    pub fn registry(&self) -> InMemoryRegistry {
        let mut registry = InMemoryRegistry::new();
        for (capability, provider) in &self.capabilities {
            registry.register(capability, provider);
        }
        registry
    }
}

fn default_capabilities() -> BTreeMap<String, String> {
    ["fs", "web", "mail"]
        .into_iter()
        .map(|cap| (cap.to_string(), format!("{}-provider", cap)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn for_project_lays_out_gov_dir() {
        let config = CoreConfig::for_project("/tmp/project");
        assert_eq!(config.receipts_log, PathBuf::from("/tmp/project/.gov/receipts.jsonl"));
        assert_eq!(config.approvals_dir, PathBuf::from("/tmp/project/.gov/approvals"));
        assert_eq!(config.settings_file, PathBuf::from("/tmp/project/gov.toml"));
    }

    #[test]
    fn missing_settings_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = CoreSettings::load(&dir.path().join("gov.toml")).unwrap();
        assert_eq!(settings.policy.max_steps, 20);
        assert_eq!(settings.regression.tolerance, 5);
        assert!(settings.capabilities.contains_key("fs"));
    }

    #[test]
    fn toml_overrides_single_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gov.toml");
        std::fs::write(
            &path,
            "[policy]\nmax_steps = 8\n\n[regression]\ntolerance = 10\n",
        )
        .unwrap();

        let settings = CoreSettings::load(&path).unwrap();
        assert_eq!(settings.policy.max_steps, 8);
        assert_eq!(settings.regression.tolerance, 10);
        // Untouched sections keep their defaults.
        assert!(settings.governor.enabled);
        assert_eq!(settings.requalification.required_successes, 3);
    }

    #[test]
    fn registry_reflects_configured_capabilities() {
        let settings = CoreSettings::with_default_capabilities();
        let registry = settings.registry();
        use gov_policy::CapabilityRegistry;
        assert!(registry.resolve("fs").is_some());
        assert!(registry.resolve("launch-missiles").is_none());
    }
}
