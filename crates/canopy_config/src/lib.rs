//! Raw, wire-shaped configuration and its validated counterpart.
//!
//! The core never reads configuration off disk itself — something upstream
//! (a CLI, an editor integration) deserializes JSON into [`CanopyJsonConfig`]
//! and hands it to [`CanopyConfig::try_from`]. Validation happens exactly
//! once, at construction, so every later stage can trust the numbers it's
//! given rather than re-checking them.

use schemars::JsonSchema;
use serde::Deserialize;
use std::collections::HashSet;

fn default_low_threshold() -> u32 {
    5
}
fn default_medium_threshold() -> u32 {
    10
}
fn default_max_complexity() -> u32 {
    20
}
fn default_true() -> bool {
    true
}
fn default_alias_patterns() -> Vec<String> {
    vec!["@/".to_string(), "~/".to_string()]
}
fn default_max_tree_size() -> usize {
    10_000
}
fn default_num_hashes() -> usize {
    128
}
fn default_bands() -> usize {
    32
}
fn default_rows() -> usize {
    4
}
fn default_max_subtree_height() -> usize {
    3
}
fn default_k_gram_size() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplexityJsonConfig {
    #[serde(default = "default_low_threshold")]
    pub low_threshold: u32,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: u32,
    #[serde(default = "default_max_complexity")]
    pub max_complexity: u32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub report_unchanged: bool,
}

impl Default for ComplexityJsonConfig {
    fn default() -> Self {
        Self {
            low_threshold: default_low_threshold(),
            medium_threshold: default_medium_threshold(),
            max_complexity: default_max_complexity(),
            enabled: true,
            report_unchanged: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleJsonConfig {
    #[serde(default = "default_true")]
    pub include_builtins: bool,
    #[serde(default)]
    pub resolve_relative: bool,
    #[serde(default = "default_true")]
    pub include_type_imports: bool,
    #[serde(default = "default_alias_patterns")]
    pub alias_patterns: Vec<String>,
}

impl Default for ModuleJsonConfig {
    fn default() -> Self {
        Self {
            include_builtins: true,
            resolve_relative: false,
            include_type_imports: true,
            alias_patterns: default_alias_patterns(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct AptedJsonConfig {
    #[serde(default = "default_max_tree_size")]
    pub max_tree_size: usize,
    pub early_termination_bound: Option<f64>,
}

impl Default for AptedJsonConfig {
    fn default() -> Self {
        Self {
            max_tree_size: default_max_tree_size(),
            early_termination_bound: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LshJsonConfig {
    #[serde(default = "default_num_hashes")]
    pub num_hashes: usize,
    #[serde(default = "default_bands")]
    pub bands: usize,
    #[serde(default = "default_rows")]
    pub rows: usize,
}

impl Default for LshJsonConfig {
    fn default() -> Self {
        Self {
            num_hashes: default_num_hashes(),
            bands: default_bands(),
            rows: default_rows(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct FeaturesJsonConfig {
    #[serde(default = "default_max_subtree_height")]
    pub max_subtree_height: usize,
    #[serde(default = "default_k_gram_size")]
    pub k_gram_size: usize,
    #[serde(default = "default_true")]
    pub include_types: bool,
    #[serde(default)]
    pub include_literals: bool,
}

impl Default for FeaturesJsonConfig {
    fn default() -> Self {
        Self {
            max_subtree_height: default_max_subtree_height(),
            k_gram_size: default_k_gram_size(),
            include_types: true,
            include_literals: false,
        }
    }
}

/// The configuration shape as deserialized straight from JSON: every field
/// is optional and falls back to the core's documented default.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CanopyJsonConfig {
    pub complexity: ComplexityJsonConfig,
    pub module: ModuleJsonConfig,
    pub apted: AptedJsonConfig,
    pub lsh: LshJsonConfig,
    pub features: FeaturesJsonConfig,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "complexity thresholds must satisfy lowThreshold <= mediumThreshold <= maxComplexity, got {low} <= {medium} <= {max}"
    )]
    InvalidComplexityThresholds { low: u32, medium: u32, max: u32 },

    #[error("lsh.bands ({bands}) * lsh.rows ({rows}) must equal lsh.numHashes ({num_hashes})")]
    InvalidLshShape {
        bands: usize,
        rows: usize,
        num_hashes: usize,
    },

    #[error("lsh.bands, lsh.rows and lsh.numHashes must all be positive")]
    ZeroLshDimension,

    #[error("apted.maxTreeSize must be positive")]
    ZeroMaxTreeSize,

    #[error("alias pattern must be non-empty")]
    EmptyAliasPattern,
}

/// Validated complexity thresholds. `low <= medium <= max` is enforced at
/// construction so the risk-level lookup never has to handle an inverted
/// range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexityThresholds {
    pub low: u32,
    pub medium: u32,
    pub max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexityConfig {
    pub thresholds: ComplexityThresholds,
    pub enabled: bool,
    pub report_unchanged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleConfig {
    pub include_builtins: bool,
    pub resolve_relative: bool,
    pub include_type_imports: bool,
    pub alias_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AptedConfig {
    pub max_tree_size: usize,
    pub early_termination_bound: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LshConfig {
    pub num_hashes: usize,
    pub bands: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeaturesConfig {
    pub max_subtree_height: usize,
    pub k_gram_size: usize,
    pub include_types: bool,
    pub include_literals: bool,
}

/// The validated configuration every analysis stage actually reads.
#[derive(Debug, Clone, PartialEq)]
pub struct CanopyConfig {
    pub complexity: ComplexityConfig,
    pub module: ModuleConfig,
    pub apted: AptedConfig,
    pub lsh: LshConfig,
    pub features: FeaturesConfig,
}

impl Default for CanopyConfig {
    fn default() -> Self {
        CanopyConfig::try_from(CanopyJsonConfig::default())
            .expect("default configuration is always valid")
    }
}

impl TryFrom<CanopyJsonConfig> for CanopyConfig {
    type Error = ConfigError;

    fn try_from(raw: CanopyJsonConfig) -> Result<Self, Self::Error> {
        let c = &raw.complexity;
        if !(c.low_threshold <= c.medium_threshold && c.medium_threshold <= c.max_complexity) {
            return Err(ConfigError::InvalidComplexityThresholds {
                low: c.low_threshold,
                medium: c.medium_threshold,
                max: c.max_complexity,
            });
        }

        let l = &raw.lsh;
        if l.bands == 0 || l.rows == 0 || l.num_hashes == 0 {
            return Err(ConfigError::ZeroLshDimension);
        }
        if l.bands * l.rows != l.num_hashes {
            return Err(ConfigError::InvalidLshShape {
                bands: l.bands,
                rows: l.rows,
                num_hashes: l.num_hashes,
            });
        }

        if raw.apted.max_tree_size == 0 {
            return Err(ConfigError::ZeroMaxTreeSize);
        }

        if raw.module.alias_patterns.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::EmptyAliasPattern);
        }

        Ok(CanopyConfig {
            complexity: ComplexityConfig {
                thresholds: ComplexityThresholds {
                    low: c.low_threshold,
                    medium: c.medium_threshold,
                    max: c.max_complexity,
                },
                enabled: c.enabled,
                report_unchanged: c.report_unchanged,
            },
            module: ModuleConfig {
                include_builtins: raw.module.include_builtins,
                resolve_relative: raw.module.resolve_relative,
                include_type_imports: raw.module.include_type_imports,
                alias_patterns: dedup_preserve_order(raw.module.alias_patterns),
            },
            apted: AptedConfig {
                max_tree_size: raw.apted.max_tree_size,
                early_termination_bound: raw.apted.early_termination_bound,
            },
            lsh: LshConfig {
                num_hashes: l.num_hashes,
                bands: l.bands,
                rows: l.rows,
            },
            features: FeaturesConfig {
                max_subtree_height: raw.features.max_subtree_height,
                k_gram_size: raw.features.k_gram_size,
                include_types: raw.features.include_types,
                include_literals: raw.features.include_literals,
            },
        })
    }
}

fn dedup_preserve_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

impl CanopyConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigLoadError> {
        let raw: CanopyJsonConfig = serde_json::from_str(text)?;
        Ok(CanopyConfig::try_from(raw)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}
