//! Recursive-descent parser over the token stream from `lexer`, implementing
//! the boolean query grammar with precedence NOT (inside `AND NOT`) > AND >
//! OR, OR also arising from bare juxtaposition of terms.

use crate::error::{NxsError, Result};
use crate::index::fts::query::ast::Expr;
use crate::index::fts::query::lexer::{tokenize, Tok, TokKind};

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek_kind(&self) -> Option<&TokKind> {
        self.toks.get(self.pos).map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn error_here(&self, message: impl Into<String>) -> NxsError {
        match self.toks.get(self.pos) {
            Some(t) => NxsError::Syntax {
                line: t.line,
                column: t.column,
                message: message.into(),
                snippet: t.text.clone(),
            },
            None => {
                let (line, column) = self
                    .toks
                    .last()
                    .map(|t| (t.line, t.column + t.text.len()))
                    .unwrap_or((1, 1));
                NxsError::Syntax {
                    line,
                    column,
                    message: message.into(),
                    snippet: "<end of query>".to_string(),
                }
            }
        }
    }

    fn starts_term(&self) -> bool {
        matches!(
            self.peek_kind(),
            Some(TokKind::LParen) | Some(TokKind::Word(_))
        )
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        loop {
            match self.peek_kind() {
                Some(TokKind::Or) => {
                    self.advance();
                    let right = self.parse_and()?;
                    left = Expr::or(left, right);
                }
                _ if self.starts_term() => {
                    let right = self.parse_and()?;
                    left = Expr::or(left, right);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_value()?;
        loop {
            match self.peek_kind() {
                Some(TokKind::And) => {
                    self.advance();
                    if matches!(self.peek_kind(), Some(TokKind::Not)) {
                        self.advance();
                        let right = self.parse_value()?;
                        left = Expr::not(left, right);
                    } else {
                        let right = self.parse_value()?;
                        left = Expr::and(left, right);
                    }
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_value(&mut self) -> Result<Expr> {
        match self.peek_kind() {
            Some(TokKind::LParen) => {
                self.advance();
                let inner = self.parse_or()?;
                match self.peek_kind() {
                    Some(TokKind::RParen) => {
                        self.advance();
                        Ok(inner)
                    }
                    _ => Err(self.error_here("expected closing ')'")),
                }
            }
            Some(TokKind::Word(w)) => {
                let w = w.clone();
                self.advance();
                Ok(Expr::token(w))
            }
            Some(TokKind::And) | Some(TokKind::Or) | Some(TokKind::Not) => {
                Err(self.error_here("expected a term, found a keyword"))
            }
            Some(TokKind::RParen) => Err(self.error_here("unexpected ')'")),
            None => Err(self.error_here("expected a term")),
        }
    }
}

/// Parse `src` into a boolean query AST. Fails with `Syntax` on malformed
/// input (unbalanced parens, a dangling operator, an empty query is *not*
/// an error — it yields no tokens and the evaluator returns an empty
/// result).
pub fn parse(src: &str) -> Result<Option<Expr>> {
    let toks = tokenize(src)?;
    if toks.is_empty() {
        return Ok(None);
    }
    let mut parser = Parser { toks, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.toks.len() {
        return Err(parser.error_here("unexpected trailing input"));
    }
    Ok(Some(expr))
}
