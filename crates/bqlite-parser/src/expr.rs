//! BQL expression parser.
//!
//! Pratt expression parser with the BQL operator precedence, loosest to
//! tightest binding:
//!
//!   OR
//!   AND
//!   NOT (prefix)
//!   = <> IS [NOT] LIKE GLOB REGEXP MATCH BETWEEN IN ISNULL NOTNULL
//!   < <= > >=
//!   & | << >>
//!   + - (binary)
//!   * / %
//!   || (concat)
//!   COLLATE (postfix)
//!   ~ - + (unary prefix)
//!   primary / BQL function
//!
//! BQL functions sit at the primary tier; their trailing value arguments
//! (`PROBABILITY OF c = v`, `SIMILARITY TO r`, `USING n SAMPLES`,
//! `INFER c CONF p`) also bind at that tier, so they compose with
//! surrounding operators without parentheses.

use bqlite_ast::{
    BinaryOp, BqlApp, ColumnList, ColumnPair, Expr, LikeOp, Literal, Span, TypeArg, TypeArgSign,
    TypeRef, UnaryOp,
};

use crate::parser::{ParseError, Parser};
use crate::token::{Token, TokenKind};

// Binding powers: higher = tighter binding.
// Left BP is checked against min_bp; right BP is passed to the recursive call.
mod bp {
    // Infix: (left, right)
    pub const OR: (u8, u8) = (1, 2);
    pub const AND: (u8, u8) = (3, 4);
    // Prefix NOT right BP:
    pub const NOT_PREFIX: u8 = 5;
    // Equality / pattern / membership:
    pub const EQUALITY: (u8, u8) = (7, 8);
    // Ordering comparison:
    pub const COMPARISON: (u8, u8) = (9, 10);
    // Bitwise operators (one shared level):
    pub const BITWISE: (u8, u8) = (11, 12);
    // Addition / subtraction:
    pub const ADD: (u8, u8) = (13, 14);
    // Multiplication / division / remainder:
    pub const MUL: (u8, u8) = (15, 16);
    // String concatenation:
    pub const CONCAT: (u8, u8) = (17, 18);
    // COLLATE (postfix left BP):
    pub const COLLATE: u8 = 19;
    // Unary prefix (~ - +) right BP:
    pub const UNARY: u8 = 21;
}

impl Parser {
    /// Parse a single BQL expression.
    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_expr_bp(0)
    }

    // ── Pratt core ──────────────────────────────────────────────────────

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            // Postfix: COLLATE, ISNULL, NOTNULL
            if let Some(l_bp) = self.postfix_bp() {
                if l_bp < min_bp {
                    break;
                }
                lhs = self.parse_postfix(lhs)?;
                continue;
            }

            // Infix: binary operators, IS, LIKE, BETWEEN, IN, etc.
            if let Some((l_bp, r_bp)) = self.infix_bp() {
                if l_bp < min_bp {
                    break;
                }
                lhs = self.parse_infix(lhs, r_bp)?;
                continue;
            }

            break;
        }

        Ok(lhs)
    }

    // ── Token helpers ───────────────────────────────────────────────────

    fn peek_kind(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance_token(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if tok.kind != TokenKind::Eof {
            self.pos += 1;
        }
        tok
    }

    fn err_here(&self, message: impl Into<String>) -> ParseError {
        ParseError::at(message, self.peek_token())
    }

    fn at_query_start(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::KwSelect | TokenKind::KwEstimate | TokenKind::KwSimulate
        )
    }

    // ── Prefix (nud) ────────────────────────────────────────────────────

    #[allow(clippy::too_many_lines)]
    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let tok = self.advance_token();
        match &tok.kind {
            // ── Literals ────────────────────────────────────────────────
            TokenKind::Integer(i) => Ok(Expr::Literal(Literal::Integer(*i), tok.span)),
            TokenKind::Float(v) => Ok(Expr::Literal(Literal::Float(*v), tok.span)),
            TokenKind::String(s) => Ok(Expr::Literal(Literal::String(s.clone()), tok.span)),
            TokenKind::KwNull => Ok(Expr::Literal(Literal::Null, tok.span)),

            // ── Parameters ──────────────────────────────────────────────
            TokenKind::Numpar(n) => Ok(Expr::Numpar(*n, tok.span)),
            TokenKind::Nampar(n, name) => Ok(Expr::Nampar(*n, name.clone(), tok.span)),

            // ── Unary prefix: - + ~ ─────────────────────────────────────
            TokenKind::Minus => self.parse_unary(UnaryOp::Negate, tok.span),
            TokenKind::Plus => self.parse_unary(UnaryOp::Plus, tok.span),
            TokenKind::Tilde => self.parse_unary(UnaryOp::BitNot, tok.span),

            // ── Prefix NOT ──────────────────────────────────────────────
            TokenKind::KwNot => {
                let inner = self.parse_expr_bp(bp::NOT_PREFIX)?;
                let span = tok.span.merge(inner.span());
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(inner),
                    span,
                })
            }

            // ── EXISTS ( query ) ────────────────────────────────────────
            TokenKind::KwExists => {
                self.expect_token(&TokenKind::LeftParen)?;
                let query = self.parse_query()?;
                let end = self.expect_token(&TokenKind::RightParen)?;
                Ok(Expr::Exists(Box::new(query), tok.span.merge(end)))
            }

            // ── CAST ( expr AS type ) ───────────────────────────────────
            TokenKind::KwCast => {
                self.expect_token(&TokenKind::LeftParen)?;
                let inner = self.parse_expr()?;
                self.expect_kw(&TokenKind::KwAs)?;
                let type_ref = self.parse_type_ref()?;
                let end = self.expect_token(&TokenKind::RightParen)?;
                Ok(Expr::Cast {
                    expr: Box::new(inner),
                    type_ref,
                    span: tok.span.merge(end),
                })
            }

            // ── CASE [key] WHEN … THEN … [ELSE …] END ──────────────────
            TokenKind::KwCase => self.parse_case_expr(tok.span),

            // ── Parenthesized expr or subquery ──────────────────────────
            TokenKind::LeftParen => {
                if self.at_query_start() {
                    let query = self.parse_query()?;
                    let end = self.expect_token(&TokenKind::RightParen)?;
                    return Ok(Expr::Subquery(Box::new(query), tok.span.merge(end)));
                }
                let inner = self.parse_expr()?;
                self.expect_token(&TokenKind::RightParen)?;
                Ok(inner)
            }

            // ── BQL functions ───────────────────────────────────────────
            TokenKind::KwPredictive => {
                self.expect_kw(&TokenKind::KwProbability)?;
                self.expect_kw(&TokenKind::KwOf)?;
                let column = self.parse_name()?;
                let span = tok.span.merge(self.prev_span());
                Ok(Expr::Bql(
                    Box::new(BqlApp::PredictiveProbability { column }),
                    span,
                ))
            }
            TokenKind::KwProbability => {
                self.expect_kw(&TokenKind::KwOf)?;
                let column = if self.eat_kw(&TokenKind::KwValue) {
                    None
                } else {
                    Some(self.parse_name()?)
                };
                if column.is_some() {
                    self.expect_token(&TokenKind::Eq)?;
                }
                let value = self.parse_expr_bp(bp::UNARY)?;
                let span = tok.span.merge(value.span());
                Ok(Expr::Bql(Box::new(BqlApp::Probability { column, value }), span))
            }
            TokenKind::KwTypicality => {
                let column = if self.eat_kw(&TokenKind::KwOf) {
                    Some(self.parse_name()?)
                } else {
                    None
                };
                let span = tok.span.merge(self.prev_span());
                Ok(Expr::Bql(Box::new(BqlApp::Typicality { column }), span))
            }
            TokenKind::KwSimilarity => {
                let row = if self.eat_kw(&TokenKind::KwTo) {
                    Some(self.parse_expr_bp(bp::UNARY)?)
                } else {
                    None
                };
                let columns = self.parse_wrt_opt()?;
                let span = tok.span.merge(self.prev_span());
                Ok(Expr::Bql(Box::new(BqlApp::Similarity { row, columns }), span))
            }
            TokenKind::KwDependence => {
                self.expect_kw(&TokenKind::KwProbability)?;
                let columns = self.parse_column_pair()?;
                let span = tok.span.merge(self.prev_span());
                Ok(Expr::Bql(
                    Box::new(BqlApp::DependenceProbability { columns }),
                    span,
                ))
            }
            TokenKind::KwMutual => {
                self.expect_kw(&TokenKind::KwInformation)?;
                let columns = self.parse_column_pair()?;
                let samples = if self.eat_kw(&TokenKind::KwUsing) {
                    let n = self.parse_expr_bp(bp::UNARY)?;
                    self.expect_kw(&TokenKind::KwSamples)?;
                    Some(n)
                } else {
                    None
                };
                let span = tok.span.merge(self.prev_span());
                Ok(Expr::Bql(
                    Box::new(BqlApp::MutualInformation { columns, samples }),
                    span,
                ))
            }
            TokenKind::KwCorrelation => {
                let columns = self.parse_column_pair()?;
                let span = tok.span.merge(self.prev_span());
                Ok(Expr::Bql(Box::new(BqlApp::Correlation { columns }), span))
            }
            TokenKind::KwInfer => {
                let column = self.parse_name()?;
                self.expect_kw(&TokenKind::KwConf)?;
                let confidence = self.parse_expr_bp(bp::UNARY)?;
                let span = tok.span.merge(confidence.span());
                Ok(Expr::Bql(
                    Box::new(BqlApp::Infer { column, confidence }),
                    span,
                ))
            }

            // ── Names: column ref or function call ──────────────────────
            TokenKind::Name(name) | TokenKind::QuotedName(name) => {
                let name = name.clone();
                self.parse_ident_expr(name, tok.span)
            }

            TokenKind::Error(msg) => Err(ParseError::at(msg.clone(), Some(&tok))),

            // Any other fallback-set keyword is an identifier here.
            k => {
                if let Some(text) = k.fallback_identifier() {
                    self.parse_ident_expr(text.to_owned(), tok.span)
                } else {
                    Err(ParseError::at(
                        format!("unexpected token in expression: {:?}", tok.kind),
                        Some(&tok),
                    ))
                }
            }
        }
    }

    fn parse_unary(&mut self, op: UnaryOp, start: Span) -> Result<Expr, ParseError> {
        let inner = self.parse_expr_bp(bp::UNARY)?;
        let span = start.merge(inner.span());
        Ok(Expr::Unary {
            op,
            expr: Box::new(inner),
            span,
        })
    }

    /// Parse `name`, `name.column`, or `name(args)`.
    fn parse_ident_expr(&mut self, name: String, start: Span) -> Result<Expr, ParseError> {
        if matches!(self.peek_kind(), TokenKind::LeftParen) {
            return self.parse_function_call(name, start);
        }
        if matches!(self.peek_kind(), TokenKind::Dot) {
            self.advance_token();
            let column = self.parse_name()?;
            let span = start.merge(self.prev_span());
            return Ok(Expr::Column {
                table: Some(name),
                column,
                span,
            });
        }
        Ok(Expr::Column {
            table: None,
            column: name,
            span: start,
        })
    }

    fn parse_function_call(&mut self, name: String, start: Span) -> Result<Expr, ParseError> {
        self.expect_token(&TokenKind::LeftParen)?;

        if self.eat(&TokenKind::Star) {
            let end = self.expect_token(&TokenKind::RightParen)?;
            return Ok(Expr::AppStar {
                function: name,
                span: start.merge(end),
            });
        }

        let distinct = self.eat_kw(&TokenKind::KwDistinct);
        let args = if matches!(self.peek_kind(), TokenKind::RightParen) {
            Vec::new()
        } else {
            self.parse_comma_sep(Self::parse_expr)?
        };
        let end = self.expect_token(&TokenKind::RightParen)?;
        Ok(Expr::App {
            distinct,
            function: name,
            args,
            span: start.merge(end),
        })
    }

    fn parse_case_expr(&mut self, start: Span) -> Result<Expr, ParseError> {
        let key = if matches!(
            self.peek_kind(),
            TokenKind::KwWhen | TokenKind::KwElse | TokenKind::KwEnd
        ) {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };

        // Zero WHEN arms are legal.
        let mut whens = Vec::new();
        while self.eat_kw(&TokenKind::KwWhen) {
            let condition = self.parse_expr()?;
            self.expect_kw(&TokenKind::KwThen)?;
            let result = self.parse_expr()?;
            whens.push((condition, result));
        }

        let otherwise = if self.eat_kw(&TokenKind::KwElse) {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };

        let end = self.expect_kw(&TokenKind::KwEnd)?;
        Ok(Expr::Case {
            key,
            whens,
            otherwise,
            span: start.merge(end),
        })
    }

    fn parse_type_ref(&mut self) -> Result<TypeRef, ParseError> {
        let mut names = Vec::new();
        while self.peek_kind().is_identifierish() {
            names.push(self.parse_name()?);
        }
        if names.is_empty() {
            return Err(self.err_here("expected type name"));
        }

        let args = if self.eat(&TokenKind::LeftParen) {
            let mut args = vec![self.parse_type_arg()?];
            if self.eat(&TokenKind::Comma) {
                args.push(self.parse_type_arg()?);
            }
            self.expect_token(&TokenKind::RightParen)?;
            args
        } else {
            Vec::new()
        };

        Ok(TypeRef { names, args })
    }

    fn parse_type_arg(&mut self) -> Result<TypeArg, ParseError> {
        let sign = if self.eat(&TokenKind::Plus) {
            TypeArgSign::Positive
        } else if self.eat(&TokenKind::Minus) {
            TypeArgSign::Negative
        } else {
            TypeArgSign::Unsigned
        };
        let n = match self.peek_kind() {
            TokenKind::Integer(n) => *n,
            _ => return Err(self.err_here("expected integer type argument")),
        };
        let value = u64::try_from(n).map_err(|_| self.err_here("type argument out of range"))?;
        self.advance_token();
        Ok(TypeArg { sign, value })
    }

    // ── BQL argument clauses ────────────────────────────────────────────

    /// `[OF c WITH d | WITH c]` for the two-column statistical functions.
    fn parse_column_pair(&mut self) -> Result<ColumnPair, ParseError> {
        if self.eat_kw(&TokenKind::KwOf) {
            let first = self.parse_name()?;
            self.expect_kw(&TokenKind::KwWith)?;
            let second = self.parse_name()?;
            Ok(ColumnPair::OfWith(first, second))
        } else if self.eat_kw(&TokenKind::KwWith) {
            Ok(ColumnPair::With(self.parse_name()?))
        } else {
            Ok(ColumnPair::Implicit)
        }
    }

    /// `[WITH RESPECT TO columnlist | WITH RESPECT TO (columnlist, …)]`.
    /// Absent means all modeled columns.
    fn parse_wrt_opt(&mut self) -> Result<Vec<ColumnList>, ParseError> {
        if !self.eat_kw(&TokenKind::KwWith) {
            return Ok(vec![ColumnList::All]);
        }
        self.expect_kw(&TokenKind::KwRespect)?;
        self.expect_kw(&TokenKind::KwTo)?;

        if self.eat(&TokenKind::LeftParen) {
            if self.at_query_start() {
                let query = self.parse_query()?;
                self.expect_token(&TokenKind::RightParen)?;
                return Ok(vec![ColumnList::Subquery(Box::new(query))]);
            }
            let lists = self.parse_comma_sep(Self::parse_column_list)?;
            self.expect_token(&TokenKind::RightParen)?;
            return Ok(lists);
        }
        Ok(vec![self.parse_column_list()?])
    }

    /// One column list: `*`, a column name, or a parenthesized subquery.
    pub(crate) fn parse_column_list(&mut self) -> Result<ColumnList, ParseError> {
        if self.eat(&TokenKind::Star) {
            return Ok(ColumnList::All);
        }
        if self.eat(&TokenKind::LeftParen) {
            let query = self.parse_query()?;
            self.expect_token(&TokenKind::RightParen)?;
            return Ok(ColumnList::Subquery(Box::new(query)));
        }
        Ok(ColumnList::Column(self.parse_name()?))
    }

    // ── Postfix ─────────────────────────────────────────────────────────

    fn postfix_bp(&self) -> Option<u8> {
        match self.peek_kind() {
            TokenKind::KwCollate => Some(bp::COLLATE),
            TokenKind::KwIsnull | TokenKind::KwNotnull => Some(bp::EQUALITY.0),
            _ => None,
        }
    }

    fn parse_postfix(&mut self, lhs: Expr) -> Result<Expr, ParseError> {
        let tok = self.advance_token();
        match &tok.kind {
            TokenKind::KwCollate => {
                let collation = self.parse_name()?;
                let span = lhs.span().merge(self.prev_span());
                Ok(Expr::Collate {
                    expr: Box::new(lhs),
                    collation,
                    span,
                })
            }
            TokenKind::KwIsnull => {
                let span = lhs.span().merge(tok.span);
                Ok(Expr::IsNull {
                    expr: Box::new(lhs),
                    not: false,
                    span,
                })
            }
            TokenKind::KwNotnull => {
                let span = lhs.span().merge(tok.span);
                Ok(Expr::IsNull {
                    expr: Box::new(lhs),
                    not: true,
                    span,
                })
            }
            other => Err(ParseError::at(
                format!("unexpected postfix token: {other:?}"),
                Some(&tok),
            )),
        }
    }

    // ── Infix ───────────────────────────────────────────────────────────

    fn infix_bp(&self) -> Option<(u8, u8)> {
        match self.peek_kind() {
            TokenKind::KwOr => Some(bp::OR),
            TokenKind::KwAnd => Some(bp::AND),

            TokenKind::Eq
            | TokenKind::Ne
            | TokenKind::KwIs
            | TokenKind::KwLike
            | TokenKind::KwGlob
            | TokenKind::KwRegexp
            | TokenKind::KwMatch
            | TokenKind::KwBetween
            | TokenKind::KwIn => Some(bp::EQUALITY),

            // NOT LIKE / NOT GLOB / NOT REGEXP / NOT MATCH / NOT BETWEEN / NOT IN
            TokenKind::KwNot => {
                let next = self.tokens.get(self.pos + 1).map(|t| &t.kind);
                match next {
                    Some(
                        TokenKind::KwLike
                        | TokenKind::KwGlob
                        | TokenKind::KwRegexp
                        | TokenKind::KwMatch
                        | TokenKind::KwBetween
                        | TokenKind::KwIn,
                    ) => Some(bp::EQUALITY),
                    _ => None,
                }
            }

            TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge => Some(bp::COMPARISON),

            TokenKind::Ampersand
            | TokenKind::Pipe
            | TokenKind::ShiftLeft
            | TokenKind::ShiftRight => Some(bp::BITWISE),

            TokenKind::Plus | TokenKind::Minus => Some(bp::ADD),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some(bp::MUL),
            TokenKind::Concat => Some(bp::CONCAT),

            _ => None,
        }
    }

    fn parse_infix(&mut self, lhs: Expr, r_bp: u8) -> Result<Expr, ParseError> {
        let tok = self.advance_token();
        match &tok.kind {
            TokenKind::Plus => self.make_binop(lhs, BinaryOp::Add, r_bp),
            TokenKind::Minus => self.make_binop(lhs, BinaryOp::Subtract, r_bp),
            TokenKind::Star => self.make_binop(lhs, BinaryOp::Multiply, r_bp),
            TokenKind::Slash => self.make_binop(lhs, BinaryOp::Divide, r_bp),
            TokenKind::Percent => self.make_binop(lhs, BinaryOp::Remainder, r_bp),
            TokenKind::Concat => self.make_binop(lhs, BinaryOp::Concat, r_bp),
            TokenKind::Eq => self.make_binop(lhs, BinaryOp::Eq, r_bp),
            TokenKind::Ne => self.make_binop(lhs, BinaryOp::Ne, r_bp),
            TokenKind::Lt => self.make_binop(lhs, BinaryOp::Lt, r_bp),
            TokenKind::Le => self.make_binop(lhs, BinaryOp::Le, r_bp),
            TokenKind::Gt => self.make_binop(lhs, BinaryOp::Gt, r_bp),
            TokenKind::Ge => self.make_binop(lhs, BinaryOp::Ge, r_bp),
            TokenKind::Ampersand => self.make_binop(lhs, BinaryOp::BitAnd, r_bp),
            TokenKind::Pipe => self.make_binop(lhs, BinaryOp::BitOr, r_bp),
            TokenKind::ShiftLeft => self.make_binop(lhs, BinaryOp::ShiftLeft, r_bp),
            TokenKind::ShiftRight => self.make_binop(lhs, BinaryOp::ShiftRight, r_bp),
            TokenKind::KwOr => self.make_binop(lhs, BinaryOp::Or, r_bp),
            TokenKind::KwAnd => self.make_binop(lhs, BinaryOp::And, r_bp),

            // IS [NOT]
            TokenKind::KwIs => {
                let not = self.eat_kw(&TokenKind::KwNot);
                let op = if not { BinaryOp::IsNot } else { BinaryOp::Is };
                self.make_binop(lhs, op, r_bp)
            }

            TokenKind::KwLike => self.parse_like(lhs, LikeOp::Like, false),
            TokenKind::KwGlob => self.parse_like(lhs, LikeOp::Glob, false),
            TokenKind::KwRegexp => self.parse_like(lhs, LikeOp::Regexp, false),
            TokenKind::KwMatch => self.parse_like(lhs, LikeOp::Match, false),
            TokenKind::KwBetween => self.parse_between(lhs, false),
            TokenKind::KwIn => self.parse_in(lhs, false),

            TokenKind::KwNot => {
                let next = self.advance_token();
                match &next.kind {
                    TokenKind::KwLike => self.parse_like(lhs, LikeOp::Like, true),
                    TokenKind::KwGlob => self.parse_like(lhs, LikeOp::Glob, true),
                    TokenKind::KwRegexp => self.parse_like(lhs, LikeOp::Regexp, true),
                    TokenKind::KwMatch => self.parse_like(lhs, LikeOp::Match, true),
                    TokenKind::KwBetween => self.parse_between(lhs, true),
                    TokenKind::KwIn => self.parse_in(lhs, true),
                    _ => Err(ParseError::at(
                        format!(
                            "expected LIKE/GLOB/REGEXP/MATCH/BETWEEN/IN after NOT, got {:?}",
                            next.kind
                        ),
                        Some(&next),
                    )),
                }
            }

            other => Err(ParseError::at(
                format!("unexpected infix token: {other:?}"),
                Some(&tok),
            )),
        }
    }

    fn make_binop(&mut self, lhs: Expr, op: BinaryOp, r_bp: u8) -> Result<Expr, ParseError> {
        let rhs = self.parse_expr_bp(r_bp)?;
        let span = lhs.span().merge(rhs.span());
        Ok(Expr::Binary {
            op,
            left: Box::new(lhs),
            right: Box::new(rhs),
            span,
        })
    }

    fn parse_like(&mut self, lhs: Expr, op: LikeOp, not: bool) -> Result<Expr, ParseError> {
        let pattern = self.parse_expr_bp(bp::EQUALITY.1)?;
        let escape = if self.eat_kw(&TokenKind::KwEscape) {
            Some(Box::new(self.parse_expr_bp(bp::EQUALITY.1)?))
        } else {
            None
        };
        let end = escape.as_ref().map_or_else(|| pattern.span(), |e| e.span());
        let span = lhs.span().merge(end);
        Ok(Expr::Like {
            op,
            not,
            expr: Box::new(lhs),
            pattern: Box::new(pattern),
            escape,
            span,
        })
    }

    fn parse_between(&mut self, lhs: Expr, not: bool) -> Result<Expr, ParseError> {
        // Bounds parse at the ordering tier so the AND separator is not
        // consumed by the low bound.
        let low = self.parse_expr_bp(bp::COMPARISON.0)?;
        if !self.eat_kw(&TokenKind::KwAnd) {
            return Err(self.err_here("expected AND in BETWEEN expression"));
        }
        let high = self.parse_expr_bp(bp::COMPARISON.0)?;
        let span = lhs.span().merge(high.span());
        Ok(Expr::Between {
            expr: Box::new(lhs),
            low: Box::new(low),
            high: Box::new(high),
            not,
            span,
        })
    }

    /// `expr [NOT] IN ( query )`: membership takes a subquery, not a
    /// value list.
    fn parse_in(&mut self, lhs: Expr, not: bool) -> Result<Expr, ParseError> {
        let start = lhs.span();
        self.expect_token(&TokenKind::LeftParen)?;
        if !self.at_query_start() {
            return Err(self.err_here("expected subquery in IN"));
        }
        let query = self.parse_query()?;
        let end = self.expect_token(&TokenKind::RightParen)?;
        Ok(Expr::In {
            expr: Box::new(lhs),
            query: Box::new(query),
            not,
            span: start.merge(end),
        })
    }
}

/// Parse a single expression from raw BQL text.
pub fn parse_expr(bql: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::from_bql(bql);
    let expr = parser.parse_expr()?;
    if !matches!(parser.peek(), TokenKind::Eof | TokenKind::Semicolon) {
        return Err(parser.err_msg(format!(
            "unexpected token after expression: {:?}",
            parser.peek()
        )));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bql: &str) -> Expr {
        match parse_expr(bql) {
            Ok(expr) => expr,
            Err(err) => unreachable!("parse error for `{bql}`: {err}"),
        }
    }

    fn parse_fails(bql: &str) {
        assert!(parse_expr(bql).is_err(), "expected parse failure for `{bql}`");
    }

    fn binop(e: &Expr) -> (BinaryOp, &Expr, &Expr) {
        match e {
            Expr::Binary {
                op, left, right, ..
            } => (*op, left.as_ref(), right.as_ref()),
            other => unreachable!("expected binary op, got {other:?}"),
        }
    }

    fn int(e: &Expr) -> i64 {
        match e {
            Expr::Literal(Literal::Integer(n), _) => *n,
            other => unreachable!("expected integer literal, got {other:?}"),
        }
    }

    // ── Precedence ──────────────────────────────────────────────────────

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let e = parse("1 + 2 * 3");
        let (op, l, r) = binop(&e);
        assert_eq!(op, BinaryOp::Add);
        assert_eq!(int(l), 1);
        let (op2, rl, rr) = binop(r);
        assert_eq!(op2, BinaryOp::Multiply);
        assert_eq!(int(rl), 2);
        assert_eq!(int(rr), 3);
    }

    #[test]
    fn subtraction_is_left_associative() {
        let e = parse("1 - 2 - 3");
        let (op, l, r) = binop(&e);
        assert_eq!(op, BinaryOp::Subtract);
        assert_eq!(int(r), 3);
        let (op2, ll, lr) = binop(l);
        assert_eq!(op2, BinaryOp::Subtract);
        assert_eq!(int(ll), 1);
        assert_eq!(int(lr), 2);
    }

    #[test]
    fn addition_binds_tighter_than_bitwise() {
        // a & b + c  →  a & (b + c)
        let e = parse("1 & 2 + 3");
        let (op, _, r) = binop(&e);
        assert_eq!(op, BinaryOp::BitAnd);
        assert_eq!(binop(r).0, BinaryOp::Add);
    }

    #[test]
    fn bitwise_binds_tighter_than_comparison() {
        // a < b << c  →  a < (b << c)
        let e = parse("1 < 2 << 3");
        let (op, _, r) = binop(&e);
        assert_eq!(op, BinaryOp::Lt);
        assert_eq!(binop(r).0, BinaryOp::ShiftLeft);
    }

    #[test]
    fn comparison_binds_tighter_than_equality() {
        // a = b < c  →  a = (b < c)
        let e = parse("1 = 2 < 3");
        let (op, _, r) = binop(&e);
        assert_eq!(op, BinaryOp::Eq);
        assert_eq!(binop(r).0, BinaryOp::Lt);
    }

    #[test]
    fn concat_binds_tighter_than_multiplication() {
        // a * b || c  →  a * (b || c)
        let e = parse("1 * 2 || 3");
        let (op, _, r) = binop(&e);
        assert_eq!(op, BinaryOp::Multiply);
        assert_eq!(binop(r).0, BinaryOp::Concat);
    }

    #[test]
    fn not_is_looser_than_equality() {
        // NOT x = y  →  NOT (x = y)
        let e = parse("NOT x = y");
        match e {
            Expr::Unary {
                op: UnaryOp::Not,
                expr,
                ..
            } => assert_eq!(binop(&expr).0, BinaryOp::Eq),
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let e = parse("a OR b AND c");
        let (op, _, r) = binop(&e);
        assert_eq!(op, BinaryOp::Or);
        assert_eq!(binop(r).0, BinaryOp::And);
    }

    #[test]
    fn unary_minus_binds_tighter_than_multiplication() {
        // -1 * 2  →  (-1) * 2
        let e = parse("-1 * 2");
        let (op, l, _) = binop(&e);
        assert_eq!(op, BinaryOp::Multiply);
        assert!(matches!(
            l,
            Expr::Unary {
                op: UnaryOp::Negate,
                ..
            }
        ));
    }

    #[test]
    fn collate_applies_before_concat() {
        // a || b COLLATE nocase  →  a || (b COLLATE nocase)
        let e = parse("a || b COLLATE nocase");
        let (op, _, r) = binop(&e);
        assert_eq!(op, BinaryOp::Concat);
        assert!(matches!(r, Expr::Collate { .. }));
    }

    // ── Equality-family forms ───────────────────────────────────────────

    #[test]
    fn is_and_is_not() {
        let e = parse("x IS NULL");
        let (op, _, r) = binop(&e);
        assert_eq!(op, BinaryOp::Is);
        assert!(matches!(r, Expr::Literal(Literal::Null, _)));

        let e = parse("x IS NOT y");
        assert_eq!(binop(&e).0, BinaryOp::IsNot);
    }

    #[test]
    fn isnull_and_notnull_postfix() {
        assert!(matches!(parse("x ISNULL"), Expr::IsNull { not: false, .. }));
        assert!(matches!(parse("x NOTNULL"), Expr::IsNull { not: true, .. }));
    }

    #[test]
    fn like_with_escape() {
        let e = parse("x LIKE 'a%' ESCAPE '\\'");
        match e {
            Expr::Like {
                op: LikeOp::Like,
                not: false,
                escape: Some(_),
                ..
            } => {}
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn not_like_and_not_between() {
        assert!(matches!(
            parse("x NOT LIKE 'a%'"),
            Expr::Like { not: true, .. }
        ));
        assert!(matches!(
            parse("x NOT BETWEEN 1 AND 2"),
            Expr::Between { not: true, .. }
        ));
    }

    #[test]
    fn between_does_not_eat_following_and() {
        // (x BETWEEN 1 AND 2) AND y
        let e = parse("x BETWEEN 1 AND 2 AND y");
        let (op, l, _) = binop(&e);
        assert_eq!(op, BinaryOp::And);
        assert!(matches!(l, Expr::Between { .. }));
    }

    #[test]
    fn in_requires_subquery() {
        let e = parse("x IN (SELECT a FROM t)");
        assert!(matches!(e, Expr::In { not: false, .. }));
        parse_fails("x IN (1, 2)");
    }

    #[test]
    fn glob_regexp_match_forms() {
        assert!(matches!(
            parse("x GLOB 'a*'"),
            Expr::Like {
                op: LikeOp::Glob,
                ..
            }
        ));
        assert!(matches!(
            parse("x REGEXP 'a.*'"),
            Expr::Like {
                op: LikeOp::Regexp,
                ..
            }
        ));
        assert!(matches!(
            parse("x MATCH 'a'"),
            Expr::Like {
                op: LikeOp::Match,
                ..
            }
        ));
    }

    // ── Primaries ───────────────────────────────────────────────────────

    #[test]
    fn function_calls() {
        assert!(matches!(
            parse("count(*)"),
            Expr::AppStar { ref function, .. } if function == "count"
        ));
        assert!(matches!(
            parse("max(DISTINCT a)"),
            Expr::App { distinct: true, .. }
        ));
        assert!(matches!(
            parse("now()"),
            Expr::App { ref args, .. } if args.is_empty()
        ));
    }

    #[test]
    fn qualified_column_reference() {
        let e = parse("t.c");
        match e {
            Expr::Column { table, column, .. } => {
                assert_eq!(table.as_deref(), Some("t"));
                assert_eq!(column, "c");
            }
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn cast_with_signed_type_args() {
        let e = parse("CAST(x AS NUMERIC(+4, -2))");
        match e {
            Expr::Cast { type_ref, .. } => {
                assert_eq!(type_ref.names, vec!["NUMERIC".to_owned()]);
                assert_eq!(
                    type_ref.args,
                    vec![
                        TypeArg {
                            sign: TypeArgSign::Positive,
                            value: 4
                        },
                        TypeArg {
                            sign: TypeArgSign::Negative,
                            value: 2
                        },
                    ]
                );
            }
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn cast_multiword_type_name() {
        let e = parse("CAST(x AS DOUBLE PRECISION)");
        match e {
            Expr::Cast { type_ref, .. } => {
                assert_eq!(
                    type_ref.names,
                    vec!["DOUBLE".to_owned(), "PRECISION".to_owned()]
                );
                assert!(type_ref.args.is_empty());
            }
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn case_with_key_and_arms() {
        let e = parse("CASE x WHEN 1 THEN 'one' WHEN 2 THEN 'two' ELSE 'many' END");
        match e {
            Expr::Case {
                key: Some(_),
                whens,
                otherwise: Some(_),
                ..
            } => assert_eq!(whens.len(), 2),
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn case_with_zero_arms() {
        let e = parse("CASE ELSE 1 END");
        match e {
            Expr::Case {
                key: None,
                whens,
                otherwise: Some(_),
                ..
            } => assert!(whens.is_empty()),
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn exists_and_scalar_subquery() {
        assert!(matches!(
            parse("EXISTS (SELECT a FROM t)"),
            Expr::Exists(_, _)
        ));
        assert!(matches!(parse("(SELECT a FROM t)"), Expr::Subquery(_, _)));
    }

    // ── BQL functions ───────────────────────────────────────────────────

    #[test]
    fn predictive_probability() {
        let e = parse("PREDICTIVE PROBABILITY OF age");
        match e {
            Expr::Bql(app, _) => assert_eq!(
                *app,
                BqlApp::PredictiveProbability {
                    column: "age".to_owned()
                }
            ),
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn probability_of_column_and_of_value() {
        let e = parse("PROBABILITY OF age = 30");
        match e {
            Expr::Bql(app, _) => match *app {
                BqlApp::Probability {
                    column: Some(ref c),
                    ..
                } => assert_eq!(c, "age"),
                ref other => unreachable!("{other:?}"),
            },
            other => unreachable!("{other:?}"),
        }

        let e = parse("PROBABILITY OF VALUE 30");
        match e {
            Expr::Bql(app, _) => {
                assert!(matches!(*app, BqlApp::Probability { column: None, .. }));
            }
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn probability_value_composes_without_parens() {
        // The value argument binds at the primary tier, so the comparison
        // applies to the probability, not to the value.
        let e = parse("PROBABILITY OF age = 30 > 0.1");
        let (op, l, _) = binop(&e);
        assert_eq!(op, BinaryOp::Gt);
        assert!(matches!(l, Expr::Bql(_, _)));
    }

    #[test]
    fn typicality_forms() {
        assert!(matches!(
            parse("TYPICALITY"),
            Expr::Bql(ref app, _) if matches!(**app, BqlApp::Typicality { column: None })
        ));
        assert!(matches!(
            parse("TYPICALITY OF age"),
            Expr::Bql(ref app, _)
                if matches!(**app, BqlApp::Typicality { column: Some(ref c) } if c == "age")
        ));
    }

    #[test]
    fn similarity_forms() {
        let e = parse("SIMILARITY TO 5 WITH RESPECT TO age");
        match e {
            Expr::Bql(app, _) => match *app {
                BqlApp::Similarity {
                    row: Some(_),
                    ref columns,
                } => assert_eq!(columns, &vec![ColumnList::Column("age".to_owned())]),
                ref other => unreachable!("{other:?}"),
            },
            other => unreachable!("{other:?}"),
        }

        // Bare similarity defaults to all columns.
        let e = parse("SIMILARITY");
        match e {
            Expr::Bql(app, _) => match *app {
                BqlApp::Similarity {
                    row: None,
                    ref columns,
                } => assert_eq!(columns, &vec![ColumnList::All]),
                ref other => unreachable!("{other:?}"),
            },
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn similarity_wrt_multiple_lists_and_subquery() {
        let e = parse("SIMILARITY WITH RESPECT TO (age, (SELECT c FROM cols), *)");
        match e {
            Expr::Bql(app, _) => match *app {
                BqlApp::Similarity { ref columns, .. } => {
                    assert_eq!(columns.len(), 3);
                    assert!(matches!(columns[0], ColumnList::Column(ref c) if c == "age"));
                    assert!(matches!(columns[1], ColumnList::Subquery(_)));
                    assert!(matches!(columns[2], ColumnList::All));
                }
                ref other => unreachable!("{other:?}"),
            },
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn mutual_information_with_samples() {
        let e = parse("MUTUAL INFORMATION OF age WITH height USING 100 SAMPLES");
        match e {
            Expr::Bql(app, _) => match *app {
                BqlApp::MutualInformation {
                    columns: ColumnPair::OfWith(ref a, ref b),
                    samples: Some(_),
                } => {
                    assert_eq!(a, "age");
                    assert_eq!(b, "height");
                }
                ref other => unreachable!("{other:?}"),
            },
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn correlation_forms() {
        assert!(matches!(
            parse("CORRELATION"),
            Expr::Bql(ref app, _)
                if matches!(**app, BqlApp::Correlation { columns: ColumnPair::Implicit })
        ));
        assert!(matches!(
            parse("CORRELATION WITH age"),
            Expr::Bql(ref app, _)
                if matches!(**app, BqlApp::Correlation { columns: ColumnPair::With(_) })
        ));
    }

    #[test]
    fn infer_with_confidence() {
        let e = parse("INFER age CONF 0.9");
        match e {
            Expr::Bql(app, _) => {
                assert!(matches!(*app, BqlApp::Infer { ref column, .. } if column == "age"));
            }
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn bql_functions_compose_with_operators() {
        // DEPENDENCE PROBABILITY WITH age > 0.5  →  (DEP PROB WITH age) > 0.5
        let e = parse("DEPENDENCE PROBABILITY WITH age > 0.5");
        let (op, l, _) = binop(&e);
        assert_eq!(op, BinaryOp::Gt);
        assert!(matches!(l, Expr::Bql(_, _)));
    }

    // ── Fallback keywords in expressions ────────────────────────────────

    #[test]
    fn fallback_keyword_is_a_column_here() {
        let e = parse("model + 1");
        let (op, l, _) = binop(&e);
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(l, Expr::Column { ref column, .. } if column == "MODEL"));
    }

    #[test]
    fn when_is_not_an_identifier() {
        parse_fails("when");
    }

    #[test]
    fn probability_commits_to_its_production() {
        // PROBABILITY at expression position starts the BQL function, so a
        // bare column named `probability` must be quoted.
        parse_fails("probability + 1");
        let e = parse("\"probability\" + 1");
        assert_eq!(binop(&e).0, BinaryOp::Add);
    }
}
