//! Configuration types for rivven-search
//!
//! ```yaml
//! datasources: [shop]
//! groups:
//!   - db_id: shop
//!     target_db_id: search
//!     sync_tables: "orders_\\d+,customers"
//!     rules:
//!       - table: "orders_\\d+"
//!         index: orders
//!         map: '{"NAME": "customer_name,keyword", "CREATED": ",date"}'
//! targets:
//!   search:
//!     type: elasticsearch
//!     uri: http://localhost:9200
//!     username: elastic
//!     password: ${ES_PASSWORD}
//! ```
//!
//! Column maps may be written as a JSON string (the older form) or as a
//! mapping. Each value is either a bare target name or `name,type` where
//! either side may be left empty to keep the default.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use validator::Validate;

use crate::error::{Result, SyncError};
use crate::rules::CompiledRules;

/// Pre-compiled regex for environment variable expansion
/// Pattern: ${VAR} or ${VAR:-default}
static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct SyncConfig {
    /// Source database ids processed by the startup pass
    #[serde(default)]
    pub datasources: Vec<String>,

    /// Sync groups, consulted in order
    #[serde(default)]
    #[validate(nested)]
    pub groups: Vec<SyncGroupConfig>,

    /// Target stores keyed by target database id
    #[serde(default)]
    pub targets: HashMap<String, TargetConfig>,

    /// Settings for newly created indices
    #[serde(default)]
    #[validate(nested)]
    pub index: IndexSettings,

    /// Schema generation options
    #[serde(default)]
    #[validate(nested)]
    pub mapping: MappingOptions,
}

/// A group of tables of one source database synced to one target
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SyncGroupConfig {
    /// Source database id
    #[validate(length(min = 1, max = 255))]
    pub db_id: String,

    /// Target database id
    #[validate(length(min = 1, max = 255))]
    pub target_db_id: String,

    /// Comma-separated list of table name regexes
    #[validate(length(min = 1))]
    pub sync_tables: String,

    /// Ordered rules; the first rule whose pattern matches a table applies
    #[serde(default)]
    #[validate(nested)]
    pub rules: Vec<SyncRuleConfig>,
}

/// A per-table override rule
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SyncRuleConfig {
    /// Table name regex (full-string match)
    #[validate(length(min = 1))]
    pub table: String,

    /// Target index name override
    #[serde(default)]
    pub index: Option<String>,

    /// Column map keyed by source column name
    #[serde(default)]
    pub map: Option<ColumnMapSpec>,
}

impl SyncRuleConfig {
    /// Create a rule for a table pattern
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            index: None,
            map: None,
        }
    }

    /// Set the index name override
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Set the column map from a JSON string
    pub fn with_map_json(mut self, json: impl Into<String>) -> Self {
        self.map = Some(ColumnMapSpec::Json(json.into()));
        self
    }

    /// Add a single column directive
    pub fn with_column(mut self, column: impl Into<String>, directive: impl Into<String>) -> Self {
        let mut entries = match self.map.take() {
            Some(ColumnMapSpec::Entries(entries)) => entries,
            _ => HashMap::new(),
        };
        entries.insert(column.into(), directive.into());
        self.map = Some(ColumnMapSpec::Entries(entries));
        self
    }
}

/// Column map as configured
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ColumnMapSpec {
    /// JSON object encoded as a string
    Json(String),
    /// Inline mapping
    Entries(HashMap<String, String>),
}

impl ColumnMapSpec {
    /// Decode into source column → raw directive entries.
    ///
    /// A blank JSON string means "no map".
    pub fn entries(&self, rule: &str) -> Result<HashMap<String, String>> {
        match self {
            Self::Entries(entries) => Ok(entries.clone()),
            Self::Json(json) if json.trim().is_empty() => Ok(HashMap::new()),
            Self::Json(json) => {
                let parsed: Option<HashMap<String, String>> = serde_json::from_str(json)
                    .map_err(|e| SyncError::InvalidColumnMapping {
                        rule: rule.to_string(),
                        message: format!("map must be a JSON object of strings: {}", e),
                    })?;
                parsed.ok_or_else(|| SyncError::InvalidColumnMapping {
                    rule: rule.to_string(),
                    message: "map parsed to null".to_string(),
                })
            }
        }
    }
}

/// Target store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TargetConfig {
    /// Elasticsearch / OpenSearch REST endpoint
    Elasticsearch(ElasticsearchConfig),
    /// In-process store (development/testing)
    Memory,
}

/// Elasticsearch connection settings
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ElasticsearchConfig {
    /// Base URI, e.g. `http://localhost:9200`
    #[validate(length(min = 1, max = 2048))]
    pub uri: String,

    /// Basic auth user
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default)]
    pub password: Option<SensitiveString>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,
}

impl ElasticsearchConfig {
    /// Create settings for a URI
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Set basic auth credentials
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<SensitiveString>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Capacity settings applied to every created index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct IndexSettings {
    /// Primary shard count
    #[serde(default = "default_shards")]
    #[validate(range(min = 1, max = 1024))]
    pub number_of_shards: u32,

    /// Replica count
    #[serde(default = "default_replicas")]
    #[validate(range(max = 32))]
    pub number_of_replicas: u32,
}

fn default_shards() -> u32 {
    8
}

fn default_replicas() -> u32 {
    2
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            number_of_shards: default_shards(),
            number_of_replicas: default_replicas(),
        }
    }
}

/// Options for generated index schemas
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Validate)]
pub struct MappingOptions {
    /// Name of the analyzed sub-field under text/keyword fields
    #[serde(default = "default_text_sub_field")]
    #[validate(length(min = 1))]
    pub text_sub_field: String,

    /// Index-time analyzer of the sub-field
    #[serde(default = "default_index_analyzer")]
    #[validate(length(min = 1))]
    pub index_analyzer: String,

    /// Search-time analyzer of the sub-field
    #[serde(default = "default_search_analyzer")]
    #[validate(length(min = 1))]
    pub search_analyzer: String,

    /// Accepted input formats of date fields
    #[serde(default = "default_date_formats")]
    #[validate(length(min = 1))]
    pub date_formats: Vec<String>,
}

fn default_text_sub_field() -> String {
    "ser".to_string()
}

fn default_index_analyzer() -> String {
    "ik_max_word".to_string()
}

fn default_search_analyzer() -> String {
    "ik_smart".to_string()
}

fn default_date_formats() -> Vec<String> {
    vec![
        "yyyy-MM-dd HH:mm:ss".to_string(),
        "yyyy-MM-dd".to_string(),
        "yyyy:MM:dd".to_string(),
        "epoch_millis".to_string(),
    ]
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            text_sub_field: default_text_sub_field(),
            index_analyzer: default_index_analyzer(),
            search_analyzer: default_search_analyzer(),
            date_formats: default_date_formats(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a YAML (or JSON) file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyncError::config(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML (JSON is valid YAML)
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let config: Self = serde_yaml::from_str(&expanded)?;
        config.validate_config()?;
        Ok(config)
    }

    /// Expand environment variables in the format ${VAR} or ${VAR:-default}
    fn expand_env_vars(content: &str) -> String {
        ENV_VAR_REGEX
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default = caps.get(2).map(|m| m.as_str());

                std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
            })
            .to_string()
    }

    /// Validate field constraints and cross references
    pub fn validate_config(&self) -> Result<()> {
        self.validate()
            .map_err(|e| SyncError::config(e.to_string()))?;

        for (id, target) in &self.targets {
            if let TargetConfig::Elasticsearch(es) = target {
                es.validate()
                    .map_err(|e| SyncError::config(format!("target '{}': {}", id, e)))?;
            }
        }

        if !self.targets.is_empty() {
            for group in &self.groups {
                if !self.targets.contains_key(&group.target_db_id) {
                    return Err(SyncError::UnknownTarget {
                        target_db_id: group.target_db_id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Compile patterns and column maps.
    ///
    /// Every regex and every column directive is checked here, so an invalid
    /// rule fails configuration load instead of the first event for a table.
    pub fn compile(&self) -> Result<CompiledRules> {
        CompiledRules::compile(&self.groups)
    }
}

/// A string that never appears in logs or config dumps
#[derive(Clone)]
pub struct SensitiveString(SecretString);

impl SensitiveString {
    /// Create a new sensitive string
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::new(value.into().into_boxed_str()))
    }

    /// Expose the secret value
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for SensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl From<String> for SensitiveString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for SensitiveString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for SensitiveString {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str("***REDACTED***")
    }
}

impl<'de> Deserialize<'de> for SensitiveString {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
datasources: [shop]
groups:
  - db_id: shop
    target_db_id: search
    sync_tables: "orders_\\d+,customers"
    rules:
      - table: "orders_\\d+"
        index: orders
        map: '{"NAME": "customer_name,keyword"}'
      - table: customers
        map:
          EMAIL: "mail"
targets:
  search:
    type: elasticsearch
    uri: http://localhost:9200
    username: elastic
    password: secret
"#;

    #[test]
    fn test_parse_yaml() {
        let config = SyncConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.datasources, vec!["shop".to_string()]);
        assert_eq!(config.groups.len(), 1);
        assert_eq!(config.groups[0].rules.len(), 2);
        assert_eq!(config.groups[0].rules[0].index.as_deref(), Some("orders"));
        assert!(matches!(
            config.groups[0].rules[0].map,
            Some(ColumnMapSpec::Json(_))
        ));
        assert!(matches!(
            config.groups[0].rules[1].map,
            Some(ColumnMapSpec::Entries(_))
        ));
        assert_eq!(config.index, IndexSettings::default());
        assert_eq!(config.mapping.text_sub_field, "ser");

        match &config.targets["search"] {
            TargetConfig::Elasticsearch(es) => {
                assert_eq!(es.uri, "http://localhost:9200");
                assert_eq!(es.password.as_ref().unwrap().expose_secret(), "secret");
                assert_eq!(es.timeout_secs, 30);
            }
            other => panic!("unexpected target {:?}", other),
        }
    }

    #[test]
    fn test_env_expansion() {
        std::env::set_var("RIVVEN_SEARCH_TEST_URI", "http://es:9200");
        let expanded = SyncConfig::expand_env_vars(
            "uri: ${RIVVEN_SEARCH_TEST_URI}\nuser: ${RIVVEN_SEARCH_TEST_UNSET:-elastic}",
        );
        assert_eq!(expanded, "uri: http://es:9200\nuser: elastic");
    }

    #[test]
    fn test_unknown_target_rejected() {
        let yaml = r#"
groups:
  - db_id: shop
    target_db_id: nowhere
    sync_tables: orders
targets:
  search:
    type: memory
"#;
        let err = SyncConfig::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, SyncError::UnknownTarget { .. }));
    }

    #[test]
    fn test_invalid_index_settings_rejected() {
        let yaml = r#"
index:
  number_of_shards: 0
"#;
        let err = SyncConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_column_map_entries() {
        let spec = ColumnMapSpec::Json(r#"{"NAME": "custom,keyword"}"#.into());
        let entries = spec.entries("orders").unwrap();
        assert_eq!(entries["NAME"], "custom,keyword");

        assert!(ColumnMapSpec::Json("  ".into())
            .entries("orders")
            .unwrap()
            .is_empty());

        let err = ColumnMapSpec::Json("not json".into())
            .entries("orders")
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidColumnMapping { .. }));

        let err = ColumnMapSpec::Json("null".into()).entries("orders").unwrap_err();
        assert!(matches!(err, SyncError::InvalidColumnMapping { .. }));
    }

    #[test]
    fn test_sensitive_string_redacted() {
        let secret = SensitiveString::new("hunter2");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(
            serde_json::to_string(&secret).unwrap(),
            "\"***REDACTED***\""
        );
    }

    #[test]
    fn test_rule_builder() {
        let rule = SyncRuleConfig::new("orders_\\d+")
            .with_index("orders")
            .with_column("NAME", "custom,keyword")
            .with_column("CREATED", ",date");

        match rule.map {
            Some(ColumnMapSpec::Entries(entries)) => assert_eq!(entries.len(), 2),
            other => panic!("unexpected map {:?}", other),
        }
    }
}
