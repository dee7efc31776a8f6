//! Index lifecycle and the per-index handle that wires tokenizer, filter
//! pipeline, term/doc tables, and the two on-disk files together.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::{EngineConfig, IndexParams, SearchParams};
use crate::error::{NxsError, Result};
use crate::index::fts::doc_table::DocTable;
use crate::index::fts::dtmap_file::DtmapFile;
use crate::index::fts::filters::{FilterPipeline, FilterRegistry};
use crate::index::fts::query::ast::Expr;
use crate::index::fts::query::evaluator::{evaluate, EvalContext};
use crate::index::fts::query::parser;
use crate::index::fts::ranking::RankingAlgo;
use crate::index::fts::response::SearchResponse;
use crate::index::fts::term_table::TermTable;
use crate::index::fts::terms_file::TermsFile;
use crate::index::fts::tokenizer;

const TERMS_FILENAME: &str = "nxsterms.db";
const DTMAP_FILENAME: &str = "nxsdtmap.db";
const PARAMS_FILENAME: &str = "params.db";

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(NxsError::Invalid(format!("invalid index name \"{name}\"")));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(NxsError::Invalid(format!(
            "index name \"{name}\" must match [A-Za-z0-9_-]+"
        )));
    }
    Ok(())
}

fn read_params(dir: &Path) -> Result<IndexParams> {
    let bytes = fs::read(dir.join(PARAMS_FILENAME))?;
    Ok(bincode::deserialize(&bytes)?)
}

fn write_params(dir: &Path, params: &IndexParams) -> Result<()> {
    let bytes = bincode::serialize(params)?;
    fs::write(dir.join(PARAMS_FILENAME), bytes)?;
    Ok(())
}

/// Top-level handle bound to one base directory and filter registry.
pub struct Engine {
    basedir: PathBuf,
    config: EngineConfig,
    filters: FilterRegistry,
}

impl Engine {
    pub fn open(config: EngineConfig) -> Result<Self> {
        fs::create_dir_all(config.basedir.join("data"))?;
        Ok(Self {
            basedir: config.basedir.clone(),
            config,
            filters: FilterRegistry::with_builtins(),
        })
    }

    fn index_dir(&self, name: &str) -> PathBuf {
        self.basedir.join("data").join(name)
    }

    /// Validate `name`, create its directory, merge `overrides` with the
    /// documented defaults, persist `params.db`, and open it.
    pub fn index_create(&self, name: &str, overrides: serde_json::Value) -> Result<Index> {
        validate_name(name)?;
        let dir = self.index_dir(name);
        if dir.exists() {
            return Err(NxsError::Exists(format!("index \"{name}\" already exists")));
        }
        fs::create_dir_all(&dir)?;
        let params = IndexParams::merged_with_defaults(overrides)?;
        write_params(&dir, &params)?;
        info!(index = name, "created index");
        self.index_open(name)
    }

    /// Load params, build the filter pipeline, open terms then dtmap,
    /// replaying each into a fresh in-memory table.
    pub fn index_open(&self, name: &str) -> Result<Index> {
        validate_name(name)?;
        let dir = self.index_dir(name);
        if !dir.exists() {
            return Err(NxsError::Missing(format!("index \"{name}\" not found")));
        }
        let params = read_params(&dir)?;
        let pipeline = self.filters.build_pipeline(&params)?;

        let mut table = TermTable::new();
        let terms = TermsFile::open(&dir.join(TERMS_FILENAME), &mut table)?;
        let mut docs = DocTable::new();
        let dtmap = DtmapFile::open(&dir.join(DTMAP_FILENAME), &mut table, &mut docs)?;

        Ok(Index {
            name: name.to_string(),
            params,
            pipeline,
            terms,
            dtmap,
            table,
            docs,
            fuzzy_tolerance: self.config.fuzzy_tolerance,
            max_ast_depth: self.config.max_ast_depth,
        })
    }

    /// Remove the data directory and everything in it.
    pub fn index_destroy(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let dir = self.index_dir(name);
        if !dir.exists() {
            return Err(NxsError::Missing(format!("index \"{name}\" not found")));
        }
        fs::remove_dir_all(&dir)?;
        info!(index = name, "destroyed index");
        Ok(())
    }
}

/// A single open index: its persisted params, filter pipeline, in-memory
/// tables, and the two backing files.
pub struct Index {
    name: String,
    params: IndexParams,
    pipeline: FilterPipeline,
    terms: TermsFile,
    dtmap: DtmapFile,
    table: TermTable,
    docs: DocTable,
    fuzzy_tolerance: u32,
    max_ast_depth: u32,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Index {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    fn catch_up(&mut self) -> Result<()> {
        self.terms.sync(&mut self.table)?;
        self.dtmap.sync(&mut self.table, &mut self.docs, true)?;
        Ok(())
    }

    /// Number of live documents, after catching up with any peer writes.
    pub fn doc_count(&mut self) -> Result<u64> {
        self.catch_up()?;
        Ok(self.dtmap.doc_count() as u64)
    }

    /// Sum of document lengths over live documents, after catching up with
    /// any peer writes.
    pub fn token_count(&mut self) -> Result<u64> {
        self.catch_up()?;
        Ok(self.dtmap.token_count())
    }

    /// Whether `doc_id` is currently indexed, after catching up with any
    /// peer writes.
    pub fn contains(&mut self, doc_id: u64) -> Result<bool> {
        self.catch_up()?;
        Ok(self.docs.lookup(doc_id).is_some())
    }

    /// Tokenize `text`, stage and resolve any new terms, and append a dtmap
    /// record for `doc_id`. Fails with `Exists` if `doc_id` is already
    /// indexed.
    pub fn add(&mut self, doc_id: u64, text: &str) -> Result<()> {
        if doc_id == 0 {
            return Err(NxsError::Invalid("document id must be nonzero".to_string()));
        }
        if text.is_empty() {
            return Err(NxsError::Invalid("document text must not be empty".to_string()));
        }
        self.catch_up()?;

        let set = tokenizer::tokenize(&self.pipeline, text)?;
        let staged: Vec<(&str, u32)> = set
            .staged()
            .map(|t| (t.text.as_str(), t.count))
            .collect();
        if !staged.is_empty() {
            self.terms.add(&staged, &mut self.table)?;
        }

        let mut pairs = Vec::with_capacity(set.unique_count());
        for token in set.tokens() {
            let term_id = self
                .table
                .lookup(&token.text)
                .ok_or_else(|| NxsError::Fatal(format!("term \"{}\" missing after staging", token.text)))?;
            pairs.push((term_id, token.count));
        }

        self.dtmap.add(
            doc_id,
            pairs,
            set.seen_count() as u32,
            &mut self.terms,
            &mut self.table,
            &mut self.docs,
        )
    }

    pub fn remove(&mut self, doc_id: u64) -> Result<()> {
        if doc_id == 0 {
            return Err(NxsError::Invalid("document id must be nonzero".to_string()));
        }
        self.catch_up()?;
        self.dtmap
            .remove(doc_id, &mut self.terms, &mut self.table, &mut self.docs)
    }

    /// Resolve every leaf in a parsed query against the term table, applying
    /// the index's filter pipeline to each raw token first so that queries
    /// are normalized the same way indexed text is. Unresolved leaves fall
    /// back to fuzzy search when `fuzzymatch` is set.
    fn prepare(&mut self, expr: &mut Expr, fuzzymatch: bool) -> Result<()> {
        let pipeline = &self.pipeline;
        let table = &mut self.table;
        let tolerance = self.fuzzy_tolerance;
        let mut err = None;
        expr.visit_tokens_mut(&mut |leaf| {
            if err.is_some() {
                return;
            }
            let mut buf = leaf.raw.clone();
            match pipeline.apply(&mut buf) {
                Ok(crate::index::fts::filters::FilterOutcome::Dropped) => {
                    leaf.resolved = None;
                }
                Ok(crate::index::fts::filters::FilterOutcome::Mutated) => {
                    leaf.resolved = table.lookup(&buf).or_else(|| {
                        if fuzzymatch {
                            table.fuzzy_search(&buf, tolerance)
                        } else {
                            None
                        }
                    });
                }
                Err(e) => err = Some(e),
            }
        });
        match err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Parse, prepare, evaluate, and rank `query_text`, returning the top-N
    /// hits per `params`.
    pub fn search(&mut self, query_text: &str, params: &SearchParams) -> Result<SearchResponse> {
        self.catch_up()?;

        let Some(mut expr) = parser::parse(query_text)? else {
            return Ok(SearchResponse::build(ahash::AHashMap::new(), params.limit));
        };
        self.prepare(&mut expr, params.fuzzymatch)?;

        let algo_name = params.algo.as_deref().unwrap_or(&self.params.algo);
        let algo = RankingAlgo::parse(algo_name)
            .ok_or_else(|| NxsError::Missing(format!("unknown ranking algorithm \"{algo_name}\"")))?;

        let ctx = EvalContext {
            table: &self.table,
            docs: &self.docs,
            region: self.dtmap.region(),
            doc_count: self.dtmap.doc_count() as u64,
            total_tokens: self.dtmap.token_count(),
            algo,
            max_depth: self.max_ast_depth,
        };
        let scores = evaluate(&expr, &ctx)?;
        Ok(SearchResponse::build(scores, params.limit))
    }
}
