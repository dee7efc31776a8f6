//! Walks a prepared query AST: combines posting bitmaps per operator, then
//! scores every doc id in the result against the query's resolved terms.

use ahash::AHashMap;
use roaring::RoaringTreemap;

use crate::error::{NxsError, Result};
use crate::index::fts::doc_table::DocTable;
use crate::index::fts::query::ast::Expr;
use crate::index::fts::ranking::{score, RankingAlgo};
use crate::index::fts::term_table::TermTable;

pub struct EvalContext<'a> {
    pub table: &'a TermTable,
    pub docs: &'a DocTable,
    pub region: &'a [u8],
    pub doc_count: u64,
    pub total_tokens: u64,
    pub algo: RankingAlgo,
    pub max_depth: u32,
}

/// Evaluate `expr` (already prepared: leaves hold their resolved term id, if
/// any) into a `doc_id -> cumulative score` map. A query with no resolved
/// tokens anywhere in the tree yields an empty map, not an error.
pub fn evaluate(expr: &Expr, ctx: &EvalContext) -> Result<AHashMap<u64, f64>> {
    let bitmap = bitmap_of(expr, ctx, 0)?;

    let mut term_ids = Vec::new();
    collect_resolved(expr, &mut term_ids);
    term_ids.sort_unstable();
    term_ids.dedup();

    let mut scores = AHashMap::new();
    for doc_id in bitmap.iter() {
        let mut total = 0.0f64;
        let mut scored_any = false;
        for &term_id in &term_ids {
            let Some(term) = ctx.table.lookup_by_id(term_id) else {
                continue;
            };
            if !term.postings.contains(doc_id) {
                continue;
            }
            let count = ctx.docs.get_termcount(doc_id, term_id, ctx.region)?;
            if count <= 0 {
                continue;
            }
            let doc_len = ctx.docs.get_doclen(doc_id, ctx.region)?;
            let s = score(
                ctx.algo,
                count as u32,
                term.postings.len(),
                ctx.doc_count,
                doc_len,
                ctx.total_tokens,
            );
            if s.is_nan() || s < 0.0 {
                continue;
            }
            total += s;
            scored_any = true;
        }
        if scored_any {
            scores.insert(doc_id, total);
        }
    }
    Ok(scores)
}

fn bitmap_of(expr: &Expr, ctx: &EvalContext, depth: u32) -> Result<RoaringTreemap> {
    if depth > ctx.max_depth {
        return Err(NxsError::Limit(format!(
            "query nesting exceeds the limit of {}",
            ctx.max_depth
        )));
    }
    match expr {
        Expr::Token(leaf) => Ok(match leaf.resolved {
            Some(id) => ctx
                .table
                .lookup_by_id(id)
                .map(|t| t.postings.clone())
                .unwrap_or_default(),
            None => RoaringTreemap::new(),
        }),
        Expr::And(items) => {
            let mut iter = items.iter();
            let Some(first) = iter.next() else {
                return Ok(RoaringTreemap::new());
            };
            let mut acc = bitmap_of(first, ctx, depth + 1)?;
            for item in iter {
                acc &= bitmap_of(item, ctx, depth + 1)?;
            }
            Ok(acc)
        }
        Expr::Or(items) => {
            let mut acc = RoaringTreemap::new();
            for item in items {
                acc |= bitmap_of(item, ctx, depth + 1)?;
            }
            Ok(acc)
        }
        Expr::Not { left, right } => {
            let mut acc = bitmap_of(left, ctx, depth + 1)?;
            acc -= bitmap_of(right, ctx, depth + 1)?;
            Ok(acc)
        }
    }
}

fn collect_resolved(expr: &Expr, out: &mut Vec<u32>) {
    match expr {
        Expr::Token(leaf) => {
            if let Some(id) = leaf.resolved {
                out.push(id);
            }
        }
        Expr::And(items) | Expr::Or(items) => {
            for item in items {
                collect_resolved(item, out);
            }
        }
        Expr::Not { left, right } => {
            collect_resolved(left, out);
            collect_resolved(right, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fts::query::ast::TokenLeaf;

    fn leaf(id: u32) -> Expr {
        Expr::Token(TokenLeaf {
            raw: String::new(),
            resolved: Some(id),
        })
    }

    fn unresolved() -> Expr {
        Expr::Token(TokenLeaf {
            raw: "nope".to_string(),
            resolved: None,
        })
    }

    #[test]
    fn unresolved_leaf_contributes_the_empty_bitmap() {
        let table = TermTable::new();
        let docs = DocTable::new();
        let region: Vec<u8> = Vec::new();
        let ctx = EvalContext {
            table: &table,
            docs: &docs,
            region: &region,
            doc_count: 0,
            total_tokens: 0,
            algo: RankingAlgo::Bm25,
            max_depth: 100,
        };
        let scores = evaluate(&unresolved(), &ctx).unwrap();
        assert!(scores.is_empty());
    }

    #[test]
    fn nesting_beyond_the_limit_is_rejected() {
        let table = TermTable::new();
        let docs = DocTable::new();
        let region: Vec<u8> = Vec::new();
        let mut expr = leaf(1);
        for _ in 0..5 {
            expr = Expr::And(vec![expr, leaf(1)]);
        }
        let ctx = EvalContext {
            table: &table,
            docs: &docs,
            region: &region,
            doc_count: 1,
            total_tokens: 1,
            algo: RankingAlgo::Bm25,
            max_depth: 2,
        };
        let err = evaluate(&expr, &ctx).unwrap_err();
        assert_eq!(err.code(), "LIMIT");
    }
}
