//! Configuration for the lint/fix engine
//!
//! Reads configuration from:
//! - `.thawrc.yaml` / `.thawrc.yml` / `.thawrc.json` (project-level)
//! - the same names in the home directory (user-level)

use crate::diagnostic::Severity;
use crate::visitor_keys::KeyTable;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File names searched by [`Config::load_default`], in order
pub const CONFIG_NAMES: [&str; 3] = [".thawrc.yaml", ".thawrc.yml", ".thawrc.json"];

/// Default pass limit for the fix loop
pub const DEFAULT_MAX_PASSES: usize = 10;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum fix passes (0 = lint only)
    pub max_passes: usize,

    /// Fix independent sources in parallel
    pub parallel: bool,

    /// Number of parallel jobs (0 = auto-detect)
    pub jobs: usize,

    /// Collect per-rule timing
    pub timing: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_passes: DEFAULT_MAX_PASSES,
            parallel: true,
            jobs: 0,
            timing: false,
        }
    }
}

/// Engine settings as written in one file. Unset keys fall through to the
/// files it extends, then to [`EngineConfig::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct EngineLayer {
    max_passes: Option<usize>,
    parallel: Option<bool>,
    jobs: Option<usize>,
    timing: Option<bool>,
}

impl EngineLayer {
    fn merge(&mut self, other: Self) {
        self.max_passes = other.max_passes.or(self.max_passes);
        self.parallel = other.parallel.or(self.parallel);
        self.jobs = other.jobs.or(self.jobs);
        self.timing = other.timing.or(self.timing);
    }

    fn resolve(self) -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            max_passes: self.max_passes.unwrap_or(defaults.max_passes),
            parallel: self.parallel.unwrap_or(defaults.parallel),
            jobs: self.jobs.unwrap_or(defaults.jobs),
            timing: self.timing.unwrap_or(defaults.timing),
        }
    }
}

impl EngineConfig {
    /// Worker threads to use for batch fixing
    pub fn worker_count(&self) -> usize {
        if self.jobs > 0 {
            self.jobs
        } else {
            num_cpus::get()
        }
    }
}

/// Rule configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Disabled rules
    pub disabled: Vec<String>,

    /// Enabled rules (empty = all)
    pub enabled: Vec<String>,

    /// Ignore rules by prefix (e.g., "ts-" ignores all ts-* rules)
    pub ignore: Vec<String>,

    /// Severity overrides (rule_id -> severity)
    pub severity: HashMap<String, Severity>,
}

impl RulesConfig {
    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        if self.disabled.iter().any(|r| r == rule_id) {
            return false;
        }

        if self.matches_ignore_prefix(rule_id) {
            return false;
        }

        // If enabled list is not empty, rule must be in it
        if !self.enabled.is_empty() {
            return self.enabled.iter().any(|r| r == rule_id);
        }

        true
    }

    /// Check if a rule matches any prefix in the ignore list (case-insensitive)
    pub fn matches_ignore_prefix(&self, rule_id: &str) -> bool {
        let rule_upper = rule_id.to_uppercase();
        self.ignore
            .iter()
            .any(|prefix| rule_upper.starts_with(&prefix.to_uppercase()))
    }

    /// Get severity override for a rule
    pub fn get_severity_override(&self, rule_id: &str) -> Option<Severity> {
        self.severity.get(rule_id).copied()
    }

    fn merge(&mut self, other: Self) {
        self.disabled.extend(other.disabled);
        if !other.enabled.is_empty() {
            self.enabled = other.enabled;
        }
        self.ignore.extend(other.ignore);
        self.severity.extend(other.severity);
    }
}

/// One configuration file before `extends` is resolved
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigLayer {
    extends: Vec<String>,
    engine: EngineLayer,
    rules: RulesConfig,
    visitor_keys: KeyTable,
}

impl ConfigLayer {
    /// Merge a later layer into this one (other takes precedence).
    /// Extends are not inherited.
    fn merge(&mut self, other: Self) {
        self.engine.merge(other.engine);
        self.rules.merge(other.rules);
        // Entries replace per type, same as visitor key extensions
        self.visitor_keys.extend(other.visitor_keys);
    }

    fn resolve(self) -> Config {
        Config {
            extends: self.extends,
            engine: self.engine.resolve(),
            rules: self.rules,
            visitor_keys: self.visitor_keys,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Other configuration files this one builds on
    pub extends: Vec<String>,

    /// Engine settings
    pub engine: EngineConfig,

    /// Rule configuration
    pub rules: RulesConfig,

    /// Visitor key extensions (node type -> child fields)
    pub visitor_keys: KeyTable,
}

impl Config {
    /// Create default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::load_with_depth(path, 0)?.resolve())
    }

    /// Load with recursion depth limit (to prevent infinite loops)
    fn load_with_depth(path: &Path, depth: usize) -> Result<ConfigLayer, ConfigError> {
        const MAX_DEPTH: usize = 10;
        if depth >= MAX_DEPTH {
            return Err(ConfigError::Invalid(
                "Maximum config inheritance depth exceeded".to_string(),
            ));
        }

        let content = std::fs::read_to_string(path)?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let mut layer = parse_layer(&content, ext)?;
        log::debug!("loaded config {}", path.display());

        if !layer.extends.is_empty() {
            let base_dir = path.parent().unwrap_or(Path::new("."));
            let mut base = ConfigLayer::default();

            for extend in &layer.extends {
                let extend_path = if Path::new(extend).is_absolute() {
                    PathBuf::from(extend)
                } else {
                    base_dir.join(extend)
                };
                base.merge(Self::load_with_depth(&extend_path, depth + 1)?);
            }

            // Current file wins over everything it extends
            base.merge(layer);
            layer = base;
        }

        Ok(layer)
    }

    /// Parse configuration text; `format` is a file extension
    pub fn parse(content: &str, format: &str) -> Result<Self, ConfigError> {
        Ok(parse_layer(content, format)?.resolve())
    }

    /// Merge another config into this one (other takes precedence).
    ///
    /// Every engine setting of a resolved `Config` is explicit, so `other`'s
    /// engine settings replace these. Rule lists accumulate.
    pub fn merge(&mut self, other: Self) {
        self.engine = other.engine;
        self.rules.merge(other.rules);
        self.visitor_keys.extend(other.visitor_keys);
    }

    /// Load configuration from `dir`, then the home directory, else defaults
    pub fn load_default(dir: &Path) -> Result<Self, ConfigError> {
        for name in &CONFIG_NAMES {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in &CONFIG_NAMES {
                let path = home.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Check if a rule is enabled
    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        self.rules.is_rule_enabled(rule_id)
    }

    /// Get severity override for a rule
    pub fn get_severity_override(&self, rule_id: &str) -> Option<Severity> {
        self.rules.get_severity_override(rule_id)
    }
}

fn parse_layer(content: &str, format: &str) -> Result<ConfigLayer, ConfigError> {
    let layer = match format {
        "yaml" | "yml" => serde_yaml::from_str(content)?,
        "json" => serde_json::from_str(content)?,
        _ => {
            return Err(ConfigError::Invalid(format!(
                "Unknown config file format: {}",
                format
            )))
        }
    };
    Ok(layer)
}
