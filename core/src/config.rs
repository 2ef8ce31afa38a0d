//! Module configuration and harness settings

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::platform::Environment;
use crate::provider::ProviderSelector;

/// Default number of retries for known transient engine errors
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default pause between retries (5 seconds)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5000;

/// Module address the rendered plan is nested under
pub const DEFAULT_MODULE_PATH: &str = "module.main";

/// Engine error substrings that are safe to retry, with a description
pub const DEFAULT_RETRYABLE_ERRORS: [(&str, &str); 1] =
    [("Module not installed", "Module initialization error")];

/// Input variables of the trust module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    /// When false nothing is planned
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prefix for every resource name; keeps parallel environments apart
    pub name_prefix: String,

    #[serde(default)]
    pub environment_type: EnvironmentType,

    #[serde(default)]
    pub cicd_provider: ProviderSelector,

    /// Organization, workspace or Terraform Cloud org the tokens come from
    #[serde(default)]
    pub git_provider_org: Option<String>,

    /// Repositories allowed to assume the role (GitHub Actions only)
    #[serde(default = "default_repositories")]
    pub git_repositories: Vec<String>,

    /// Existing SAML identity provider (Jenkins only)
    #[serde(default)]
    pub saml_provider_arn: Option<String>,

    /// Create the OIDC identity provider, or reference one that already exists
    #[serde(default = "default_true")]
    pub create_oidc_provider: bool,

    /// Custom trust policy JSON that replaces the generated one
    #[serde(default)]
    pub assume_role_policy: Option<String>,

    #[serde(default)]
    pub s3_backend_config: S3BackendConfig,

    /// Narrows Terraform Cloud trust to a single workspace
    #[serde(default)]
    pub deployment_environment: Option<String>,

    /// Extra tags applied to every created resource
    #[serde(default)]
    pub tags: BTreeMap<String, String>,

    #[serde(default = "default_partition")]
    pub aws_partition: String,
}

impl ModuleConfig {
    pub fn new(name_prefix: impl Into<String>, cicd_provider: ProviderSelector) -> Self {
        Self {
            enabled: true,
            name_prefix: name_prefix.into(),
            environment_type: EnvironmentType::default(),
            cicd_provider,
            git_provider_org: None,
            git_repositories: default_repositories(),
            saml_provider_arn: None,
            create_oidc_provider: true,
            assume_role_policy: None,
            s3_backend_config: S3BackendConfig::default(),
            deployment_environment: None,
            tags: BTreeMap::new(),
            aws_partition: default_partition(),
        }
    }

    /// Parse a configuration file. YAML is a superset of JSON so both work.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::invalid_config(format!("invalid module configuration: {}", e)))
    }

    pub fn role_name(&self) -> String {
        format!("{}-cicd-role", self.name_prefix)
    }

    pub fn backend_policy_name(&self) -> String {
        format!("{}-terraform-backend", self.name_prefix)
    }

    /// The override document, ignoring blank strings
    pub fn assume_role_policy_override(&self) -> Option<&str> {
        self.assume_role_policy
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }

    /// Tags for created resources: caller tags plus the fixed module tags
    pub fn resource_tags(&self) -> BTreeMap<String, String> {
        let mut tags = self.tags.clone();
        tags.insert("NamePrefix".to_string(), self.name_prefix.clone());
        tags.insert(
            "EnvironmentType".to_string(),
            self.environment_type.as_str().to_string(),
        );
        tags.insert(
            "CicdProvider".to_string(),
            self.cicd_provider.as_str().to_string(),
        );
        tags
    }
}

/// Environment classification carried as a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnvironmentType {
    #[default]
    #[serde(rename = "None")]
    Unspecified,
    Ephemeral,
    Development,
    Testing,
    #[serde(rename = "UAT")]
    Uat,
    Production,
    MissionCritical,
}

impl EnvironmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "None",
            Self::Ephemeral => "Ephemeral",
            Self::Development => "Development",
            Self::Testing => "Testing",
            Self::Uat => "UAT",
            Self::Production => "Production",
            Self::MissionCritical => "MissionCritical",
        }
    }
}

/// Access to the Terraform S3 state backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3BackendConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// State bucket; defaults to `<name_prefix>-terraform-state`
    #[serde(default)]
    pub bucket: Option<String>,

    /// Only state objects under this prefix are accessible
    #[serde(default)]
    pub key_prefix: String,

    /// Lock table; defaults to `<name_prefix>-terraform-locks`
    #[serde(default)]
    pub dynamodb_table: Option<String>,
}

impl Default for S3BackendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bucket: None,
            key_prefix: String::new(),
            dynamodb_table: None,
        }
    }
}

impl S3BackendConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn bucket_name(&self, name_prefix: &str) -> String {
        self.bucket
            .clone()
            .unwrap_or_else(|| format!("{}-terraform-state", name_prefix))
    }

    pub fn lock_table_name(&self, name_prefix: &str) -> String {
        self.dynamodb_table
            .clone()
            .unwrap_or_else(|| format!("{}-terraform-locks", name_prefix))
    }
}

/// Settings for the plan/apply harness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// (message substring, description) pairs treated as transient
    pub retryable_errors: Vec<(String, String)>,
    pub module_path: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            retryable_errors: DEFAULT_RETRYABLE_ERRORS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            module_path: DEFAULT_MODULE_PATH.to_string(),
        }
    }
}

impl HarnessConfig {
    /// Load harness settings from the platform environment, falling back to
    /// defaults for anything unset
    pub fn from_env(env: &dyn Environment) -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = env.get_var("CICD_TRUST_MAX_RETRIES") {
            config.max_retries = value.parse().map_err(|_| {
                Error::invalid_config(format!("CICD_TRUST_MAX_RETRIES must be a number, got '{}'", value))
            })?;
        }

        if let Ok(value) = env.get_var("CICD_TRUST_RETRY_DELAY_MS") {
            let millis: u64 = value.parse().map_err(|_| {
                Error::invalid_config(format!(
                    "CICD_TRUST_RETRY_DELAY_MS must be a number, got '{}'",
                    value
                ))
            })?;
            config.retry_delay = Duration::from_millis(millis);
        }

        if let Ok(value) = env.get_var("CICD_TRUST_MODULE_PATH") {
            config.module_path = value;
        }

        Ok(config)
    }

    /// Description of the retryable error matching `message`, if any
    pub fn retryable_match(&self, message: &str) -> Option<&str> {
        self.retryable_errors
            .iter()
            .find(|(pattern, _)| message.contains(pattern.as_str()))
            .map(|(_, description)| description.as_str())
    }
}

fn default_true() -> bool {
    true
}

fn default_repositories() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_partition() -> String {
    "aws".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockEnv;
    use std::collections::HashMap;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = ModuleConfig::from_yaml("name_prefix: gha-abc\n").unwrap();
        assert!(config.enabled);
        assert!(config.create_oidc_provider);
        assert!(config.s3_backend_config.enabled);
        assert_eq!(config.cicd_provider, ProviderSelector::GithubActions);
        assert_eq!(config.environment_type, EnvironmentType::Unspecified);
        assert_eq!(config.git_repositories, vec!["*".to_string()]);
        assert_eq!(config.aws_partition, "aws");
    }

    #[test]
    fn test_from_yaml_full() {
        let yaml = r#"
enabled: true
name_prefix: tfc-abc
environment_type: Production
cicd_provider: terraform-cloud
git_provider_org: acme
deployment_environment: production
s3_backend_config:
  enabled: false
tags:
  Team: platform
"#;
        let config = ModuleConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.cicd_provider, ProviderSelector::TerraformCloud);
        assert_eq!(config.environment_type, EnvironmentType::Production);
        assert_eq!(config.deployment_environment.as_deref(), Some("production"));
        assert!(!config.s3_backend_config.enabled);
        assert_eq!(config.tags.get("Team").map(String::as_str), Some("platform"));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{"name_prefix": "jnks-1", "cicd_provider": "jenkins", "environment_type": "None"}"#;
        let config = ModuleConfig::from_yaml(json).unwrap();
        assert_eq!(config.cicd_provider, ProviderSelector::Jenkins);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_fields_and_providers() {
        let result = ModuleConfig::from_yaml("name_prefix: x\nunknown_field: 1\n");
        assert!(result.is_err());

        let result = ModuleConfig::from_yaml("name_prefix: x\ncicd_provider: circleci\n");
        assert!(result.unwrap_err().is_config());
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let mut config = ModuleConfig::new("x", ProviderSelector::Codebuild);
        config.assume_role_policy = Some("   ".to_string());
        assert!(config.assume_role_policy_override().is_none());

        config.assume_role_policy = Some(" {} ".to_string());
        assert_eq!(config.assume_role_policy_override(), Some("{}"));
    }

    #[test]
    fn test_resource_tags() {
        let mut config = ModuleConfig::new("gha-1", ProviderSelector::GithubActions);
        config.tags.insert("Team".to_string(), "platform".to_string());
        let tags = config.resource_tags();
        assert_eq!(tags.get("EnvironmentType").map(String::as_str), Some("None"));
        assert_eq!(tags.get("CicdProvider").map(String::as_str), Some("github-actions"));
        assert_eq!(tags.get("Team").map(String::as_str), Some("platform"));
    }

    #[test]
    fn test_backend_defaults_derive_from_prefix() {
        let backend = S3BackendConfig::default();
        assert_eq!(backend.bucket_name("p"), "p-terraform-state");
        assert_eq!(backend.lock_table_name("p"), "p-terraform-locks");

        let custom = S3BackendConfig {
            bucket: Some("state".to_string()),
            dynamodb_table: Some("locks".to_string()),
            ..S3BackendConfig::default()
        };
        assert_eq!(custom.bucket_name("p"), "state");
        assert_eq!(custom.lock_table_name("p"), "locks");
    }

    #[test]
    fn test_harness_config_defaults() {
        let env = MockEnv::new(HashMap::new());
        let config = HarnessConfig::from_env(&env).unwrap();
        assert_eq!(config, HarnessConfig::default());
        assert_eq!(config.max_retries, 3);
        assert_eq!(
            config.retryable_match("Error: Module not installed"),
            Some("Module initialization error")
        );
        assert!(config.retryable_match("AccessDenied").is_none());
    }

    #[test]
    fn test_harness_config_from_env() {
        let vars = [
            ("CICD_TRUST_MAX_RETRIES".to_string(), "5".to_string()),
            ("CICD_TRUST_RETRY_DELAY_MS".to_string(), "10".to_string()),
            ("CICD_TRUST_MODULE_PATH".to_string(), "module.cicd".to_string()),
        ]
        .into_iter()
        .collect();
        let env = MockEnv::new(vars);
        let config = HarnessConfig::from_env(&env).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_delay, Duration::from_millis(10));
        assert_eq!(config.module_path, "module.cicd");
    }

    #[test]
    fn test_harness_config_rejects_bad_number() {
        let vars = [("CICD_TRUST_MAX_RETRIES".to_string(), "three".to_string())]
            .into_iter()
            .collect();
        let env = MockEnv::new(vars);
        let result = HarnessConfig::from_env(&env);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("CICD_TRUST_MAX_RETRIES"));
    }
}
