//! The filter plugin ABI and the built-in filters the engine ships with.
//!
//! A filter is identified by a name and supplies the five collaborator
//! capabilities from the plugin contract: `sysinit`/`sysfini` run once when
//! the filter is registered with the engine, `create`/`destroy` bracket the
//! lifetime of the per-index pipeline stage built from it, and `filter`
//! transforms one token's buffer in place. The scripting-language filter
//! loader, the external stemmer and the Unicode normalization library are
//! out of scope; only the lightweight built-ins are implemented here.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::IndexParams;
use crate::error::{NxsError, Result};

pub enum FilterOutcome {
    Mutated,
    Dropped,
}

/// The per-pipeline stage instantiated from a `FilterPlugin` for one index.
/// Stages that need mutable state (a counter, a cache) provide their own
/// interior mutability; none of the built-ins below need any.
pub trait PipelineFilter: Send + Sync {
    fn filter(&self, buf: &mut String) -> Result<FilterOutcome>;
}

/// A registrable filter plugin.
pub trait FilterPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Called once when the filter is registered with the engine; may load
    /// dictionaries or other shared state.
    fn sysinit(&self) -> Result<()> {
        Ok(())
    }

    fn sysfini(&self) {}

    /// Called when a pipeline is built for an index; receives that index's
    /// parameters so, e.g., a stopword filter can pick its language list.
    fn create(&self, params: &IndexParams) -> Result<Box<dyn PipelineFilter>>;
}

/// Ordered registry of filter plugins, keyed by name.
#[derive(Default, Clone)]
pub struct FilterRegistry {
    plugins: BTreeMap<String, Arc<dyn FilterPlugin>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register(Arc::new(Normalizer));
        reg.register(Arc::new(Stopwords));
        reg.register(Arc::new(Stemmer));
        reg
    }

    pub fn register(&mut self, plugin: Arc<dyn FilterPlugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn FilterPlugin>> {
        self.plugins.get(name).cloned()
    }

    /// Build an ordered pipeline from `params.filters`, failing with
    /// *missing* if a named filter was never registered.
    pub fn build_pipeline(&self, params: &IndexParams) -> Result<FilterPipeline> {
        let mut stages = Vec::with_capacity(params.filters.len());
        for name in &params.filters {
            let plugin = self
                .get(name)
                .ok_or_else(|| NxsError::Missing(format!("unknown filter plugin \"{name}\"")))?;
            stages.push(plugin.create(params)?);
        }
        Ok(FilterPipeline { stages })
    }
}

/// An ordered chain of filter stages run over each candidate token.
pub struct FilterPipeline {
    stages: Vec<Box<dyn PipelineFilter>>,
}

impl FilterPipeline {
    pub fn empty() -> Self {
        Self { stages: Vec::new() }
    }

    /// Run `buf` through every stage in order. Returns `Mutated` if the text
    /// survives the whole pipeline (possibly rewritten in place), or
    /// `Dropped` if any stage dropped it.
    pub fn apply(&self, buf: &mut String) -> Result<FilterOutcome> {
        for stage in &self.stages {
            match stage.filter(buf)? {
                FilterOutcome::Mutated => continue,
                FilterOutcome::Dropped => return Ok(FilterOutcome::Dropped),
            }
        }
        Ok(FilterOutcome::Mutated)
    }
}

// ---------------------------------------------------------------------
// Built-in filters
// ---------------------------------------------------------------------

/// Lowercases and trims surrounding whitespace.
struct Normalizer;

struct NormalizerStage;

impl PipelineFilter for NormalizerStage {
    fn filter(&self, buf: &mut String) -> Result<FilterOutcome> {
        let normalized = buf.trim().to_lowercase();
        buf.clear();
        buf.push_str(&normalized);
        if buf.is_empty() {
            Ok(FilterOutcome::Dropped)
        } else {
            Ok(FilterOutcome::Mutated)
        }
    }
}

impl FilterPlugin for Normalizer {
    fn name(&self) -> &str {
        "normalizer"
    }

    fn create(&self, _params: &IndexParams) -> Result<Box<dyn PipelineFilter>> {
        Ok(Box::new(NormalizerStage))
    }
}

/// Drops tokens found in a small built-in English stopword list. Other
/// languages pass every token through unchanged; a richer stopword
/// dictionary is an external collaborator (`BASEDIR/filters/stopwords/<lang>`).
struct Stopwords;

struct StopwordsStage {
    list: &'static [&'static str],
}

const EN_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
    "it", "its", "of", "on", "that", "the", "to", "was", "were", "will", "with",
];

impl PipelineFilter for StopwordsStage {
    fn filter(&self, buf: &mut String) -> Result<FilterOutcome> {
        if self.list.contains(&buf.as_str()) {
            Ok(FilterOutcome::Dropped)
        } else {
            Ok(FilterOutcome::Mutated)
        }
    }
}

impl FilterPlugin for Stopwords {
    fn name(&self) -> &str {
        "stopwords"
    }

    fn create(&self, params: &IndexParams) -> Result<Box<dyn PipelineFilter>> {
        let list = match params.lang.as_str() {
            "en" => EN_STOPWORDS,
            _ => &[],
        };
        Ok(Box::new(StopwordsStage { list }))
    }
}

/// A minimal suffix-stripping stemmer. Real stemming is an external
/// collaborator; this built-in only trims the handful of common English
/// inflectional suffixes so the default pipeline has something to do.
struct Stemmer;

struct StemmerStage {
    enabled: bool,
}

impl PipelineFilter for StemmerStage {
    fn filter(&self, buf: &mut String) -> Result<FilterOutcome> {
        if !self.enabled {
            return Ok(FilterOutcome::Mutated);
        }
        for suffix in ["ing", "edly", "ed", "es", "s"] {
            if buf.len() > suffix.len() + 2 && buf.ends_with(suffix) {
                let new_len = buf.len() - suffix.len();
                buf.truncate(new_len);
                break;
            }
        }
        Ok(FilterOutcome::Mutated)
    }
}

impl FilterPlugin for Stemmer {
    fn name(&self) -> &str {
        "stemmer"
    }

    fn create(&self, params: &IndexParams) -> Result<Box<dyn PipelineFilter>> {
        Ok(Box::new(StemmerStage {
            enabled: params.lang == "en",
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> IndexParams {
        IndexParams::default()
    }

    #[test]
    fn normalizer_lowercases_and_trims() {
        let registry = FilterRegistry::with_builtins();
        let filter = registry.get("normalizer").unwrap().create(&params()).unwrap();
        let mut buf = "  FoX  ".to_string();
        let mut filter = filter;
        matches!(filter.filter(&mut buf).unwrap(), FilterOutcome::Mutated);
        assert_eq!(buf, "fox");
    }

    #[test]
    fn stopwords_drops_common_words_for_english() {
        let registry = FilterRegistry::with_builtins();
        let filter = registry.get("stopwords").unwrap().create(&params()).unwrap();
        let mut filter = filter;
        let mut buf = "the".to_string();
        assert!(matches!(filter.filter(&mut buf).unwrap(), FilterOutcome::Dropped));
        let mut buf = "fox".to_string();
        assert!(matches!(filter.filter(&mut buf).unwrap(), FilterOutcome::Mutated));
    }

    #[test]
    fn pipeline_runs_stages_in_order_and_drops_short_circuit() {
        let registry = FilterRegistry::with_builtins();
        let mut p = params();
        p.filters = vec!["normalizer".into(), "stopwords".into()];
        let pipeline = registry.build_pipeline(&p).unwrap();

        let mut buf = "THE".to_string();
        assert!(matches!(pipeline.apply(&mut buf).unwrap(), FilterOutcome::Dropped));

        let mut buf = "FOX".to_string();
        assert!(matches!(pipeline.apply(&mut buf).unwrap(), FilterOutcome::Mutated));
        assert_eq!(buf, "fox");
    }

    #[test]
    fn unknown_filter_name_is_a_missing_error() {
        let registry = FilterRegistry::with_builtins();
        let mut p = params();
        p.filters = vec!["nonexistent".into()];
        assert!(registry.build_pipeline(&p).is_err());
    }
}
