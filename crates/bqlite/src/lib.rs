//! Public API facade for the BQL parser core.
//!
//! BQL extends a SQL-like surface syntax with probabilistic-model
//! operations: generator definition, model analysis commands, and queries
//! mixing relational operators with statistical functions. This crate ties
//! the lexer, parser, and flavor resolver together behind a small entry
//! point and re-exports the underlying crates for callers that need the
//! pieces individually.
//!
//! ```
//! let list = bqlite::parse_bql("ESTIMATE DEPENDENCE PROBABILITY OF a WITH b FROM g;")
//!     .expect("well-formed BQL");
//! assert_eq!(list.phrases().count(), 1);
//! ```

pub use bqlite_ast as ast;
pub use bqlite_ast::{Phrase, StatementList};
pub use bqlite_parser::{
    bql_flavor, parse_expr, BqlContext, BqlFlavor, Lexer, ParseError, Parser, SemanticError,
    TokenKind,
};

use thiserror::Error;

/// Any error produced while turning BQL text into a validated statement
/// list. Errors are fatal to the whole input: no partial result is
/// produced and no recovery is attempted.
#[derive(Debug, Error)]
pub enum BqlError {
    /// The token stream does not match any valid derivation.
    #[error("syntax error: {0}")]
    Syntax(#[from] ParseError),
    /// A BQL function application is incompatible with its query context.
    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),
}

/// A parsed phrase together with the parameter bookkeeping of the input it
/// came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Parametrized {
    pub phrase: Phrase,
    /// Number of positional parameters in the input.
    pub n_numpar: u32,
    /// Named parameters (case-folded, first-occurrence order) with their
    /// numbers.
    pub nampar_map: Vec<(String, u32)>,
}

/// Parse BQL text into a validated statement list: lex, parse (fail-fast),
/// then resolve BQL-function flavors.
pub fn parse_bql(input: &str) -> Result<StatementList, BqlError> {
    let mut parser = Parser::from_bql(input);
    let list = parser.parse_statement_list()?;
    let list = bqlite_parser::resolve(list)?;
    tracing::debug!(
        target: "bqlite",
        slots = list.slots.len(),
        n_numpar = list.n_numpar,
        "parsed statement list"
    );
    Ok(list)
}

/// Parse BQL text and return the non-empty phrases, each wrapped with the
/// input's parameter bookkeeping.
pub fn parse_bql_phrases(input: &str) -> Result<Vec<Parametrized>, BqlError> {
    let list = parse_bql(input)?;
    Ok(list
        .phrases()
        .map(|phrase| Parametrized {
            phrase: phrase.clone(),
            n_numpar: list.n_numpar,
            nampar_map: list.nampar_map.clone(),
        })
        .collect())
}

/// Whether the input ends at a statement boundary.
///
/// Interactive shells use this to decide between executing the buffer and
/// prompting for a continuation line. Lexically broken or syntactically
/// erroneous input counts as complete so the caller surfaces the error;
/// input whose parse fails only at end of input is incomplete.
#[must_use]
pub fn bql_string_complete_p(input: &str) -> bool {
    let stream = Lexer::tokenize(input);
    if stream
        .tokens
        .iter()
        .any(|t| matches!(t.kind, TokenKind::Error(_)))
    {
        return true;
    }
    let ends_with_terminator = stream
        .tokens
        .iter()
        .rev()
        .find(|t| t.kind != TokenKind::Eof)
        .is_none_or(|t| t.kind == TokenKind::Semicolon);

    let mut parser = Parser::new(stream);
    match parser.parse_statement_list() {
        Ok(_) => ends_with_terminator,
        Err(e) => (e.span.start as usize) < input.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bqlite_ast::{Command, Query, Slot};

    #[test]
    fn parse_bql_end_to_end() {
        let list = parse_bql("BEGIN; ESTIMATE TYPICALITY FROM g; COMMIT;").expect("valid BQL");
        let phrases: Vec<_> = list.phrases().collect();
        assert_eq!(phrases.len(), 3);
        assert!(matches!(phrases[0], Phrase::Command(Command::Begin)));
        assert!(matches!(phrases[1], Phrase::Query(Query::Estimate(_))));
    }

    #[test]
    fn parse_bql_reports_syntax_errors() {
        match parse_bql("SELECT FROM WHERE") {
            Err(BqlError::Syntax(_)) => {}
            other => unreachable!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn parse_bql_reports_semantic_errors() {
        match parse_bql("ESTIMATE COLUMNS SIMILARITY TO 1 FROM g") {
            Err(BqlError::Semantic(e)) => assert!(e.message.contains("SIMILARITY")),
            other => unreachable!("expected semantic error, got {other:?}"),
        }
    }

    #[test]
    fn empty_slots_survive_the_pipeline() {
        let list = parse_bql("SELECT * FROM t;;").expect("valid BQL");
        assert_eq!(list.slots.len(), 2);
        assert_eq!(list.slots[1], Slot::Empty);
    }

    #[test]
    fn parametrized_phrases_carry_parameter_info() {
        let phrases =
            parse_bql_phrases("SELECT a FROM t WHERE a = ? AND b = :name").expect("valid BQL");
        assert_eq!(phrases.len(), 1);
        assert_eq!(phrases[0].n_numpar, 2);
        assert_eq!(phrases[0].nampar_map, vec![("name".to_owned(), 2)]);
    }

    #[test]
    fn complete_p_requires_a_terminator() {
        assert!(bql_string_complete_p(""));
        assert!(bql_string_complete_p(";"));
        assert!(bql_string_complete_p("SELECT 1;"));
        assert!(!bql_string_complete_p("SELECT 1"));
        assert!(!bql_string_complete_p("SELECT 1; SELECT"));
    }

    #[test]
    fn complete_p_surfaces_errors_as_complete() {
        // Mid-stream garbage: complete, so the caller hits the error.
        assert!(bql_string_complete_p("SELECT 1; SELECT ) 2;"));
        // Lexical damage: also complete.
        assert!(bql_string_complete_p("SELECT 'unterminated"));
    }
}
