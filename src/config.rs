//! Engine-wide and per-index configuration.
//!
//! `EngineConfig` governs the storage layer (base directory, growth step,
//! open-retry bound, fuzzy tolerance, AST nesting limit). `IndexParams`
//! governs how one index tokenizes and ranks documents, persisted to
//! `params.db` alongside the index's data files. `SearchParams` governs a
//! single search call and may override the index's default ranking
//! algorithm.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::storage::idxmap::GROWTH_STEP;

/// Environment variable used to locate the engine's base directory when no
/// explicit override is given to `EngineConfig::resolve`.
pub const BASEDIR_ENV: &str = "NXS_BASEDIR";

/// Engine-level knobs that are not persisted with any index: where indexes
/// live on disk, how files grow, how many times a zero-length-file race is
/// retried on open, the default fuzzy-match tolerance, and the recursion
/// bound on query ASTs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub basedir: PathBuf,
    pub growth_step: u64,
    pub open_retries: u32,
    pub fuzzy_tolerance: u32,
    pub max_ast_depth: u32,
}

impl EngineConfig {
    /// Resolve the base directory from, in order: an explicit override, the
    /// `NXS_BASEDIR` environment variable, or `./nxsdata` under the current
    /// directory. Every other field takes its default.
    pub fn resolve(basedir_override: Option<PathBuf>) -> Self {
        let basedir = basedir_override
            .or_else(|| env::var_os(BASEDIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("nxsdata"));
        Self {
            basedir,
            ..Self::defaults()
        }
    }

    fn defaults() -> Self {
        Self {
            basedir: PathBuf::from("nxsdata"),
            growth_step: GROWTH_STEP,
            open_retries: 10,
            fuzzy_tolerance: 2,
            max_ast_depth: 100,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::resolve(None)
    }
}

/// Persisted per-index configuration: language (drives the stopword and
/// stemmer built-ins), the ordered filter pipeline, and the default ranking
/// algorithm. Serialized to `<index>/params.db` via `bincode` and readable
/// as JSON for inspection tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParams {
    pub lang: String,
    pub filters: Vec<String>,
    pub algo: String,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            lang: "en".to_string(),
            filters: vec![
                "normalizer".to_string(),
                "stopwords".to_string(),
                "stemmer".to_string(),
            ],
            algo: "BM25".to_string(),
        }
    }
}

impl IndexParams {
    /// Overlay `overrides` onto the defaults: any field present in the
    /// supplied JSON object replaces the default; absent fields keep their
    /// default value. Used when a caller supplies a partial `params.db`
    /// document on index creation.
    pub fn merged_with_defaults(overrides: serde_json::Value) -> crate::error::Result<Self> {
        let mut params = Self::default();
        if let serde_json::Value::Object(map) = overrides {
            if let Some(lang) = map.get("lang").and_then(|v| v.as_str()) {
                params.lang = lang.to_string();
            }
            if let Some(filters) = map.get("filters").and_then(|v| v.as_array()) {
                params.filters = filters
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
            }
            if let Some(algo) = map.get("algo").and_then(|v| v.as_str()) {
                params.algo = algo.to_string();
            }
        }
        Ok(params)
    }
}

/// Per-search overrides: ranking algorithm (falls back to the index's
/// default when absent), result cap, and whether unmatched terms should be
/// resolved through the fuzzy index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub algo: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub fuzzymatch: bool,
}

fn default_limit() -> u32 {
    1000
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            algo: None,
            limit: default_limit(),
            fuzzymatch: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_params_defaults_match_the_documented_pipeline() {
        let p = IndexParams::default();
        assert_eq!(p.lang, "en");
        assert_eq!(p.filters, vec!["normalizer", "stopwords", "stemmer"]);
        assert_eq!(p.algo, "BM25");
    }

    #[test]
    fn merged_with_defaults_overlays_only_present_fields() {
        let overrides = serde_json::json!({ "algo": "TF-IDF" });
        let p = IndexParams::merged_with_defaults(overrides).unwrap();
        assert_eq!(p.algo, "TF-IDF");
        assert_eq!(p.lang, "en");
        assert_eq!(p.filters, vec!["normalizer", "stopwords", "stemmer"]);
    }

    #[test]
    fn search_params_default_limit_is_1000() {
        let p = SearchParams::default();
        assert_eq!(p.limit, 1000);
        assert!(!p.fuzzymatch);
        assert!(p.algo.is_none());
    }

    #[test]
    fn engine_config_resolves_basedir_override_first() {
        let cfg = EngineConfig::resolve(Some(PathBuf::from("/tmp/explicit")));
        assert_eq!(cfg.basedir, PathBuf::from("/tmp/explicit"));
        assert_eq!(cfg.growth_step, GROWTH_STEP);
        assert_eq!(cfg.fuzzy_tolerance, 2);
        assert_eq!(cfg.max_ast_depth, 100);
    }
}
