//! BQL statement parser.
//!
//! Hand-written recursive descent parser. Expression parsing lives in
//! expr.rs. Parsing is fail-fast: the first token that cannot extend a valid
//! derivation aborts the whole statement list with a [`ParseError`]; there
//! is no resynchronization and no partial result.

use std::error::Error;
use std::fmt;

use bqlite_ast::{
    AlterGeneratorCmd, AlterTableCmd, AnalysisLimit, ColumnStatType, Command, Estimate,
    EstimateColumns, EstimatePairwise, EstimatePairwiseRow, Expr, ExprColumn, Grouping, Limit,
    ModelRange, OrderKey, OrderSense, Phrase, Quantifier, Query, Select, SelectColumn, SelectTable,
    Simulate, Slot, Span, StatementList, TableSource,
};

use crate::lexer::{Lexer, TokenStream};
use crate::token::{Token, TokenKind};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// A syntax error: the token stream does not match any valid derivation at
/// the reported position.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
    pub line: u32,
    pub col: u32,
}

impl ParseError {
    #[must_use]
    pub(crate) fn at(message: impl Into<String>, token: Option<&Token>) -> Self {
        if let Some(t) = token {
            Self {
                message: message.into(),
                span: t.span,
                line: t.line,
                col: t.col,
            }
        } else {
            Self {
                message: message.into(),
                span: Span::ZERO,
                line: 0,
                col: 0,
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

impl Error for ParseError {}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    n_numpar: u32,
    nampar_map: Vec<(String, u32)>,
}

impl Parser {
    /// Create a parser over an already-scanned token stream.
    #[must_use]
    pub fn new(stream: TokenStream) -> Self {
        Self {
            tokens: stream.tokens,
            pos: 0,
            n_numpar: stream.n_numpar,
            nampar_map: stream.nampar_map,
        }
    }

    /// Lex and wrap the given source text.
    #[must_use]
    pub fn from_bql(source: &str) -> Self {
        Self::new(Lexer::tokenize(source))
    }

    /// Parse the whole input into a statement list.
    ///
    /// A slot may be empty: leading, trailing, and doubled `;` terminators
    /// each record an empty slot. A final phrase not followed by `;`
    /// receives an implicit terminator at end of input.
    pub fn parse_statement_list(&mut self) -> Result<StatementList, ParseError> {
        let mut slots = Vec::new();
        loop {
            if self.at_eof() {
                break;
            }
            if self.eat(&TokenKind::Semicolon) {
                slots.push(Slot::Empty);
                continue;
            }
            let phrase = self.parse_phrase()?;
            if !self.eat(&TokenKind::Semicolon) && !self.at_eof() {
                return Err(self.err_expected("';'"));
            }
            slots.push(Slot::Phrase(phrase));
        }
        Ok(StatementList {
            slots,
            n_numpar: self.n_numpar,
            nampar_map: self.nampar_map.clone(),
        })
    }

    /// Parse a single command or query.
    pub fn parse_phrase(&mut self) -> Result<Phrase, ParseError> {
        match self.peek().clone() {
            TokenKind::KwBegin => {
                self.advance();
                Ok(Phrase::Command(Command::Begin))
            }
            TokenKind::KwRollback => {
                self.advance();
                Ok(Phrase::Command(Command::Rollback))
            }
            TokenKind::KwCommit => {
                self.advance();
                Ok(Phrase::Command(Command::Commit))
            }
            TokenKind::KwCreate => self.parse_create().map(Phrase::Command),
            TokenKind::KwDrop => self.parse_drop().map(Phrase::Command),
            TokenKind::KwAlter => self.parse_alter().map(Phrase::Command),
            TokenKind::KwInitialize => self.parse_initialize().map(Phrase::Command),
            TokenKind::KwAnalyze => self.parse_analyze().map(Phrase::Command),
            TokenKind::KwSelect | TokenKind::KwEstimate | TokenKind::KwSimulate => {
                self.parse_query().map(Phrase::Query)
            }
            TokenKind::Error(msg) => Err(self.err_msg(msg)),
            _ => Err(self.err_msg("unexpected token at start of statement")),
        }
    }

    // -----------------------------------------------------------------------
    // Token navigation
    // -----------------------------------------------------------------------

    pub(crate) fn peek(&self) -> &TokenKind {
        self.current().map_or(&TokenKind::Eof, |t| &t.kind)
    }

    pub(crate) fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub(crate) fn peek_nth(&self, n: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + n)
            .map_or(&TokenKind::Eof, |t| &t.kind)
    }

    pub(crate) fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    pub(crate) fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if self.pos < self.tokens.len().saturating_sub(1) {
            self.pos += 1;
        }
        t
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check_kw(&self, kw: &TokenKind) -> bool {
        self.peek() == kw
    }

    pub(crate) fn eat_kw(&mut self, kw: &TokenKind) -> bool {
        if self.peek() == kw {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_kw(&mut self, kw: &TokenKind) -> Result<Span, ParseError> {
        if self.peek() == kw {
            let sp = self.current_span();
            self.advance();
            Ok(sp)
        } else {
            Err(self.err_expected(&format!("{kw:?}")))
        }
    }

    pub(crate) fn expect_token(&mut self, kind: &TokenKind) -> Result<Span, ParseError> {
        if self.check(kind) {
            let sp = self.current_span();
            self.advance();
            Ok(sp)
        } else {
            Err(self.err_expected(&format!("{kind:?}")))
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.current().map_or(Span::ZERO, |t| t.span)
    }

    pub(crate) fn prev_span(&self) -> Span {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map_or(Span::ZERO, |t| t.span)
    }

    pub(crate) fn err_expected(&self, what: &str) -> ParseError {
        ParseError::at(format!("expected {what}"), self.current())
    }

    pub(crate) fn err_msg(&self, msg: impl Into<String>) -> ParseError {
        ParseError::at(msg, self.current())
    }

    // -----------------------------------------------------------------------
    // Identifiers and small common pieces
    // -----------------------------------------------------------------------

    /// Parse an identifier: a plain or quoted name, or any fallback-set
    /// keyword (the identifier-or-keyword match used at every grammar
    /// position that expects an identifier).
    pub(crate) fn parse_name(&mut self) -> Result<String, ParseError> {
        match self.peek().clone() {
            TokenKind::Name(s) | TokenKind::QuotedName(s) => {
                self.advance();
                Ok(s)
            }
            ref k => {
                if let Some(text) = k.fallback_identifier() {
                    self.advance();
                    Ok(text.to_owned())
                } else {
                    Err(self.err_expected("identifier"))
                }
            }
        }
    }

    /// True if the current token could begin a plain identifier without
    /// committing to an expression production. Used for the lookahead that
    /// distinguishes `t.*` and `t.(query)` result columns from expressions.
    fn at_plain_name(&self) -> bool {
        let k = self.peek();
        k.is_identifierish() && !k.starts_expression()
    }

    pub(crate) fn parse_comma_sep<T>(
        &mut self,
        f: fn(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut v = vec![f(self)?];
        while self.eat(&TokenKind::Comma) {
            v.push(f(self)?);
        }
        Ok(v)
    }

    fn parse_u64(&mut self) -> Result<u64, ParseError> {
        let n = match self.peek() {
            TokenKind::Integer(n) => *n,
            _ => return Err(self.err_expected("integer")),
        };
        let v = u64::try_from(n).map_err(|_| self.err_msg("integer out of range"))?;
        self.advance();
        Ok(v)
    }

    fn eat_if_not_exists(&mut self) -> Result<bool, ParseError> {
        if self.eat_kw(&TokenKind::KwIf) {
            self.expect_kw(&TokenKind::KwNot)?;
            self.expect_kw(&TokenKind::KwExists)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn eat_if_exists(&mut self) -> Result<bool, ParseError> {
        if self.eat_kw(&TokenKind::KwIf) {
            self.expect_kw(&TokenKind::KwExists)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// `[AS <name>]`. A bare alias without AS is not part of the grammar.
    fn parse_alias_opt(&mut self) -> Result<Option<String>, ParseError> {
        if self.eat_kw(&TokenKind::KwAs) {
            Ok(Some(self.parse_name()?))
        } else {
            Ok(None)
        }
    }

    // -----------------------------------------------------------------------
    // CREATE
    // -----------------------------------------------------------------------

    fn parse_create(&mut self) -> Result<Command, ParseError> {
        self.expect_kw(&TokenKind::KwCreate)?;

        let temp = self.eat_kw(&TokenKind::KwTemp) || self.eat_kw(&TokenKind::KwTemporary);
        if temp {
            self.expect_kw(&TokenKind::KwTable)?;
            return self.parse_create_table_tail(true);
        }
        if self.eat_kw(&TokenKind::KwTable) {
            return self.parse_create_table_tail(false);
        }
        if self.eat_kw(&TokenKind::KwGenerator) {
            return self.parse_create_generator_tail();
        }
        Err(self.err_expected("TABLE or GENERATOR"))
    }

    fn parse_create_table_tail(&mut self, temp: bool) -> Result<Command, ParseError> {
        let if_not_exists = self.eat_if_not_exists()?;
        let name = self.parse_name()?;
        self.expect_kw(&TokenKind::KwAs)?;
        let query = self.parse_query()?;
        Ok(Command::CreateTableAs {
            temp,
            if_not_exists,
            name,
            query: Box::new(query),
        })
    }

    fn parse_create_generator_tail(&mut self) -> Result<Command, ParseError> {
        let name = self.parse_name()?;
        let if_not_exists = self.eat_if_not_exists()?;
        self.expect_kw(&TokenKind::KwFor)?;
        let table = self.parse_name()?;
        self.expect_kw(&TokenKind::KwUsing)?;
        let metamodel = self.parse_name()?;
        self.expect_token(&TokenKind::LeftParen)?;
        let schema = self.parse_comma_sep(Self::parse_column_stattype)?;
        self.expect_token(&TokenKind::RightParen)?;
        Ok(Command::CreateGenerator {
            name,
            if_not_exists,
            table,
            metamodel,
            schema,
        })
    }

    fn parse_column_stattype(&mut self) -> Result<ColumnStatType, ParseError> {
        let column = self.parse_name()?;
        let stattype = self.parse_name()?;
        Ok(ColumnStatType { column, stattype })
    }

    // -----------------------------------------------------------------------
    // DROP
    // -----------------------------------------------------------------------

    fn parse_drop(&mut self) -> Result<Command, ParseError> {
        self.expect_kw(&TokenKind::KwDrop)?;

        if self.eat_kw(&TokenKind::KwTable) {
            let if_exists = self.eat_if_exists()?;
            let name = self.parse_name()?;
            return Ok(Command::DropTable { if_exists, name });
        }
        if self.eat_kw(&TokenKind::KwGenerator) {
            let if_exists = self.eat_if_exists()?;
            let name = self.parse_name()?;
            return Ok(Command::DropGenerator { if_exists, name });
        }
        if self.eat_kw(&TokenKind::KwModel) || self.eat_kw(&TokenKind::KwModels) {
            let models = if matches!(self.peek(), TokenKind::Integer(_)) {
                Some(self.parse_comma_sep(Self::parse_model_range)?)
            } else {
                None
            };
            self.expect_kw(&TokenKind::KwFrom)?;
            let generator = self.parse_name()?;
            return Ok(Command::DropModels { models, generator });
        }
        Err(self.err_expected("TABLE, GENERATOR, or MODELS"))
    }

    fn parse_model_range(&mut self) -> Result<ModelRange, ParseError> {
        let lo = self.parse_u64()?;
        if self.eat(&TokenKind::Minus) {
            let hi = self.parse_u64()?;
            Ok(ModelRange::Range(lo, hi))
        } else {
            Ok(ModelRange::Single(lo))
        }
    }

    // -----------------------------------------------------------------------
    // ALTER
    // -----------------------------------------------------------------------

    fn parse_alter(&mut self) -> Result<Command, ParseError> {
        self.expect_kw(&TokenKind::KwAlter)?;

        if self.eat_kw(&TokenKind::KwTable) {
            let table = self.parse_name()?;
            let commands = self.parse_comma_sep(Self::parse_alter_table_cmd)?;
            return Ok(Command::AlterTable { table, commands });
        }
        if self.eat_kw(&TokenKind::KwGenerator) {
            let generator = self.parse_name()?;
            let commands = self.parse_comma_sep(Self::parse_alter_generator_cmd)?;
            return Ok(Command::AlterGenerator {
                generator,
                commands,
            });
        }
        Err(self.err_expected("TABLE or GENERATOR"))
    }

    fn parse_alter_table_cmd(&mut self) -> Result<AlterTableCmd, ParseError> {
        self.expect_kw(&TokenKind::KwRename)?;
        if self.eat_kw(&TokenKind::KwTo) {
            Ok(AlterTableCmd::RenameTable(self.parse_name()?))
        } else {
            let old = self.parse_name()?;
            self.expect_kw(&TokenKind::KwTo)?;
            let new = self.parse_name()?;
            Ok(AlterTableCmd::RenameColumn { old, new })
        }
    }

    fn parse_alter_generator_cmd(&mut self) -> Result<AlterGeneratorCmd, ParseError> {
        self.expect_kw(&TokenKind::KwRename)?;
        self.expect_kw(&TokenKind::KwTo)?;
        Ok(AlterGeneratorCmd::RenameGenerator(self.parse_name()?))
    }

    // -----------------------------------------------------------------------
    // INITIALIZE / ANALYZE
    // -----------------------------------------------------------------------

    fn parse_initialize(&mut self) -> Result<Command, ParseError> {
        self.expect_kw(&TokenKind::KwInitialize)?;
        let count = self.parse_u64()?;
        if !self.eat_kw(&TokenKind::KwModel) && !self.eat_kw(&TokenKind::KwModels) {
            return Err(self.err_expected("MODELS"));
        }
        let if_not_exists = self.eat_if_not_exists()?;
        self.expect_kw(&TokenKind::KwFor)?;
        let generator = self.parse_name()?;
        Ok(Command::InitializeModels {
            count,
            if_not_exists,
            generator,
        })
    }

    fn parse_analyze(&mut self) -> Result<Command, ParseError> {
        self.expect_kw(&TokenKind::KwAnalyze)?;
        let generator = self.parse_name()?;
        let models = if self.eat_kw(&TokenKind::KwModel) || self.eat_kw(&TokenKind::KwModels) {
            Some(self.parse_comma_sep(Self::parse_model_range)?)
        } else {
            None
        };
        let limit = self.parse_analysis_limit()?;
        let wait = self.eat_kw(&TokenKind::KwWait);
        Ok(Command::AnalyzeModels {
            generator,
            models,
            limit,
            wait,
        })
    }

    fn parse_analysis_limit(&mut self) -> Result<AnalysisLimit, ParseError> {
        self.expect_kw(&TokenKind::KwFor)?;
        let n = self.parse_u64()?;
        let limit = match self.peek() {
            TokenKind::KwIteration | TokenKind::KwIterations => AnalysisLimit::Iterations(n),
            TokenKind::KwMinute | TokenKind::KwMinutes => AnalysisLimit::Minutes(n),
            TokenKind::KwSecond | TokenKind::KwSeconds => AnalysisLimit::Seconds(n),
            _ => return Err(self.err_expected("ITERATIONS, MINUTES, or SECONDS")),
        };
        self.advance();
        Ok(limit)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub(crate) fn parse_query(&mut self) -> Result<Query, ParseError> {
        match self.peek() {
            TokenKind::KwSelect => self.parse_select().map(Query::Select),
            TokenKind::KwEstimate => self.parse_estimate(),
            TokenKind::KwSimulate => self.parse_simulate().map(Query::Simulate),
            _ => Err(self.err_expected("SELECT, ESTIMATE, or SIMULATE")),
        }
    }

    fn parse_quantifier(&mut self) -> Quantifier {
        if self.eat_kw(&TokenKind::KwDistinct) {
            Quantifier::Distinct
        } else {
            let _ = self.eat_kw(&TokenKind::KwAll);
            Quantifier::All
        }
    }

    fn parse_select(&mut self) -> Result<Select, ParseError> {
        self.expect_kw(&TokenKind::KwSelect)?;
        let quantifier = self.parse_quantifier();
        let columns = self.parse_comma_sep(Self::parse_select_column)?;
        let tables = if self.eat_kw(&TokenKind::KwFrom) {
            Some(self.parse_comma_sep(Self::parse_select_table)?)
        } else {
            None
        };
        let condition = self.parse_where_opt()?;
        let grouping = self.parse_grouping_opt()?;
        let order = self.parse_order_opt()?;
        let limit = self.parse_limit_opt()?;
        Ok(Select {
            quantifier,
            columns,
            tables,
            condition,
            grouping,
            order,
            limit,
        })
    }

    /// `ESTIMATE` statements: the keyword after `ESTIMATE` decides between
    /// the row query, `ESTIMATE COLUMNS`, `ESTIMATE PAIRWISE`, and
    /// `ESTIMATE PAIRWISE ROW`.
    fn parse_estimate(&mut self) -> Result<Query, ParseError> {
        self.expect_kw(&TokenKind::KwEstimate)?;

        if self.eat_kw(&TokenKind::KwColumns) {
            let columns = if self.check_kw(&TokenKind::KwFrom) {
                Vec::new()
            } else {
                self.parse_comma_sep(Self::parse_expr_column)?
            };
            self.expect_kw(&TokenKind::KwFrom)?;
            let generator = self.parse_name()?;
            let condition = self.parse_where_opt()?;
            let order = self.parse_order_opt()?;
            let limit = self.parse_limit_opt()?;
            return Ok(Query::EstimateColumns(EstimateColumns {
                columns,
                generator,
                condition,
                order,
                limit,
            }));
        }

        if self.eat_kw(&TokenKind::KwPairwise) {
            if self.eat_kw(&TokenKind::KwRow) {
                let expression = Box::new(self.parse_expr()?);
                self.expect_kw(&TokenKind::KwFrom)?;
                let generator = self.parse_name()?;
                let condition = self.parse_where_opt()?;
                let order = self.parse_order_opt()?;
                let limit = self.parse_limit_opt()?;
                return Ok(Query::EstimatePairwiseRow(EstimatePairwiseRow {
                    expression,
                    generator,
                    condition,
                    order,
                    limit,
                }));
            }
            let columns = self.parse_comma_sep(Self::parse_expr_column)?;
            self.expect_kw(&TokenKind::KwFrom)?;
            let generator = self.parse_name()?;
            let subcolumns = if self.eat_kw(&TokenKind::KwFor) {
                Some(self.parse_comma_sep(Self::parse_column_list)?)
            } else {
                None
            };
            let condition = self.parse_where_opt()?;
            let order = self.parse_order_opt()?;
            let limit = self.parse_limit_opt()?;
            return Ok(Query::EstimatePairwise(EstimatePairwise {
                columns,
                generator,
                subcolumns,
                condition,
                order,
                limit,
            }));
        }

        let quantifier = self.parse_quantifier();
        let columns = self.parse_comma_sep(Self::parse_select_column)?;
        self.expect_kw(&TokenKind::KwFrom)?;
        let generator = self.parse_name()?;
        let condition = self.parse_where_opt()?;
        let grouping = self.parse_grouping_opt()?;
        let order = self.parse_order_opt()?;
        let limit = self.parse_limit_opt()?;
        Ok(Query::Estimate(Estimate {
            quantifier,
            columns,
            generator,
            condition,
            grouping,
            order,
            limit,
        }))
    }

    fn parse_simulate(&mut self) -> Result<Simulate, ParseError> {
        self.expect_kw(&TokenKind::KwSimulate)?;
        let columns = self.parse_comma_sep(Self::parse_name)?;
        self.expect_kw(&TokenKind::KwFrom)?;
        let generator = self.parse_name()?;
        let constraints = if self.eat_kw(&TokenKind::KwGiven) {
            let mut pairs = vec![self.parse_simulate_constraint()?];
            while self.eat(&TokenKind::Comma) {
                pairs.push(self.parse_simulate_constraint()?);
            }
            pairs
        } else {
            Vec::new()
        };
        let limit = self.parse_limit_opt()?;
        Ok(Simulate {
            columns,
            generator,
            constraints,
            limit,
        })
    }

    fn parse_simulate_constraint(&mut self) -> Result<(String, Expr), ParseError> {
        let column = self.parse_name()?;
        self.expect_token(&TokenKind::Eq)?;
        let value = self.parse_expr()?;
        Ok((column, value))
    }

    // -----------------------------------------------------------------------
    // Result columns, tables, and trailing clauses
    // -----------------------------------------------------------------------

    fn parse_select_column(&mut self) -> Result<SelectColumn, ParseError> {
        if self.eat(&TokenKind::Star) {
            return Ok(SelectColumn::Star);
        }
        // `t.*` and `t.(query)` lookahead.
        if self.at_plain_name() && self.peek_nth(1) == &TokenKind::Dot {
            if self.peek_nth(2) == &TokenKind::Star {
                let table = self.parse_name()?;
                self.advance(); // dot
                self.advance(); // star
                return Ok(SelectColumn::TableStar(table));
            }
            if self.peek_nth(2) == &TokenKind::LeftParen {
                let table = self.parse_name()?;
                self.advance(); // dot
                self.advance(); // lparen
                let query = self.parse_query()?;
                self.expect_token(&TokenKind::RightParen)?;
                return Ok(SelectColumn::TableSub(table, Box::new(query)));
            }
        }
        let expr = self.parse_expr()?;
        let alias = self.parse_alias_opt()?;
        Ok(SelectColumn::Expr { expr, alias })
    }

    fn parse_expr_column(&mut self) -> Result<ExprColumn, ParseError> {
        let expr = self.parse_expr()?;
        let alias = self.parse_alias_opt()?;
        Ok(ExprColumn { expr, alias })
    }

    fn parse_select_table(&mut self) -> Result<SelectTable, ParseError> {
        if self.eat(&TokenKind::LeftParen) {
            let query = self.parse_query()?;
            self.expect_token(&TokenKind::RightParen)?;
            let alias = self.parse_alias_opt()?;
            return Ok(SelectTable {
                source: TableSource::Subquery(Box::new(query)),
                alias,
            });
        }
        let name = self.parse_name()?;
        let alias = self.parse_alias_opt()?;
        Ok(SelectTable {
            source: TableSource::Named(name),
            alias,
        })
    }

    fn parse_where_opt(&mut self) -> Result<Option<Box<Expr>>, ParseError> {
        if self.eat_kw(&TokenKind::KwWhere) {
            Ok(Some(Box::new(self.parse_expr()?)))
        } else {
            Ok(None)
        }
    }

    fn parse_grouping_opt(&mut self) -> Result<Option<Grouping>, ParseError> {
        if !self.eat_kw(&TokenKind::KwGroup) {
            return Ok(None);
        }
        self.expect_kw(&TokenKind::KwBy)?;
        let keys = self.parse_comma_sep(Self::parse_expr)?;
        let condition = if self.eat_kw(&TokenKind::KwHaving) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        Ok(Some(Grouping { keys, condition }))
    }

    fn parse_order_opt(&mut self) -> Result<Option<Vec<OrderKey>>, ParseError> {
        if !self.eat_kw(&TokenKind::KwOrder) {
            return Ok(None);
        }
        self.expect_kw(&TokenKind::KwBy)?;
        Ok(Some(self.parse_comma_sep(Self::parse_order_key)?))
    }

    fn parse_order_key(&mut self) -> Result<OrderKey, ParseError> {
        let expr = self.parse_expr()?;
        let sense = if self.eat_kw(&TokenKind::KwDesc) {
            OrderSense::Desc
        } else {
            let _ = self.eat_kw(&TokenKind::KwAsc);
            OrderSense::Asc
        };
        Ok(OrderKey { expr, sense })
    }

    fn parse_limit_opt(&mut self) -> Result<Option<Limit>, ParseError> {
        if !self.eat_kw(&TokenKind::KwLimit) {
            return Ok(None);
        }
        let first = self.parse_expr()?;
        if self.eat_kw(&TokenKind::KwOffset) {
            return Ok(Some(Limit {
                limit: first,
                offset: Some(self.parse_expr()?),
            }));
        }
        if self.eat(&TokenKind::Comma) {
            // Comma form: the value before the comma is the offset.
            let second = self.parse_expr()?;
            return Ok(Some(Limit {
                limit: second,
                offset: Some(first),
            }));
        }
        Ok(Some(Limit {
            limit: first,
            offset: None,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
