//! BQL-function flavor resolution.
//!
//! A statistical function application is written with some arguments
//! explicit and the rest implied by the enclosing query: a row query
//! supplies the current row, `ESTIMATE COLUMNS` the current column,
//! `ESTIMATE PAIRWISE` a column pair, `ESTIMATE PAIRWISE ROW` a row pair.
//! The grammar accepts every surface form everywhere (one expression
//! grammar instead of five near-copies); this pass walks a parsed
//! statement list once and checks each application against its context,
//! rejecting forms whose implicit arguments the context cannot supply.
//!
//! The pass is read-only: node shapes are never altered.

use std::fmt;

use bqlite_ast::{
    BqlApp, ColumnList, ColumnPair, Command, Expr, ExprColumn, Grouping, Limit, OrderKey, Phrase,
    Query, SelectColumn, StatementList,
};

// ---------------------------------------------------------------------------
// Contexts and flavors
// ---------------------------------------------------------------------------

/// The kind of position a BQL function application occurs in, determined by
/// the innermost enclosing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BqlContext {
    /// `SELECT` or row `ESTIMATE`: an implicit row is available.
    Row,
    /// `ESTIMATE COLUMNS`: an implicit column is available.
    Column,
    /// `ESTIMATE PAIRWISE`: an implicit column pair is available.
    PairwiseColumn,
    /// `ESTIMATE PAIRWISE ROW`: an implicit row pair is available.
    PairwiseRow,
    /// A position with no model context (e.g. `SIMULATE` constraint
    /// values); no BQL function is legal here.
    Unmodeled,
}

impl fmt::Display for BqlContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Row => "a row query",
            Self::Column => "ESTIMATE COLUMNS",
            Self::PairwiseColumn => "ESTIMATE PAIRWISE",
            Self::PairwiseRow => "ESTIMATE PAIRWISE ROW",
            Self::Unmodeled => "a position with no model context",
        })
    }
}

/// The resolved flavor of a BQL function application, named by the implicit
/// arguments the surface form draws from its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BqlFlavor {
    /// Every model argument explicit; legal in any model context.
    Constant,
    /// One implicit column; requires [`BqlContext::Column`].
    OneColumn,
    /// Two implicit columns; requires [`BqlContext::PairwiseColumn`].
    TwoColumn,
    /// One implicit row; requires [`BqlContext::Row`].
    OneRow,
    /// Two implicit rows; requires [`BqlContext::PairwiseRow`].
    TwoRow,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A flavor-resolution error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub message: String,
}

/// Kinds of flavor-resolution errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticErrorKind {
    /// A BQL function appears in a context that cannot supply its implicit
    /// arguments.
    IllegalFlavor {
        function: String,
        context: BqlContext,
    },
}

impl SemanticError {
    fn illegal(app: &BqlApp, context: BqlContext) -> Self {
        let function = app.name().to_owned();
        let message = match context {
            BqlContext::Unmodeled => {
                format!("{function} is not allowed in {context}")
            }
            _ => format!("{function} in this form is not allowed in {context}"),
        };
        Self {
            kind: SemanticErrorKind::IllegalFlavor { function, context },
            message,
        }
    }
}

impl fmt::Display for SemanticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SemanticError {}

// ---------------------------------------------------------------------------
// Flavor table
// ---------------------------------------------------------------------------

/// Resolve the flavor of one BQL application in the given context, or
/// reject it.
///
/// Bare `TYPICALITY` is the one context-dependent form: typicality of the
/// implicit row in a row query, of the implicit column in
/// `ESTIMATE COLUMNS`.
pub fn bql_flavor(app: &BqlApp, context: BqlContext) -> Result<BqlFlavor, SemanticError> {
    let flavor = match app {
        BqlApp::PredictiveProbability { .. } | BqlApp::Infer { .. } => BqlFlavor::OneRow,

        BqlApp::Probability { column: Some(_), .. } => BqlFlavor::Constant,
        BqlApp::Probability { column: None, .. } => BqlFlavor::OneColumn,

        BqlApp::Typicality { column: Some(_) } => BqlFlavor::Constant,
        BqlApp::Typicality { column: None } => match context {
            BqlContext::Row => BqlFlavor::OneRow,
            BqlContext::Column => BqlFlavor::OneColumn,
            _ => return Err(SemanticError::illegal(app, context)),
        },

        BqlApp::Similarity { row: Some(_), .. } => BqlFlavor::OneRow,
        BqlApp::Similarity { row: None, .. } => BqlFlavor::TwoRow,

        BqlApp::DependenceProbability { columns }
        | BqlApp::MutualInformation { columns, .. }
        | BqlApp::Correlation { columns } => match columns {
            ColumnPair::OfWith(_, _) => BqlFlavor::Constant,
            ColumnPair::With(_) => BqlFlavor::OneColumn,
            ColumnPair::Implicit => BqlFlavor::TwoColumn,
        },
    };

    let legal = match flavor {
        BqlFlavor::Constant => context != BqlContext::Unmodeled,
        BqlFlavor::OneColumn => context == BqlContext::Column,
        BqlFlavor::TwoColumn => context == BqlContext::PairwiseColumn,
        BqlFlavor::OneRow => context == BqlContext::Row,
        BqlFlavor::TwoRow => context == BqlContext::PairwiseRow,
    };
    if legal {
        Ok(flavor)
    } else {
        Err(SemanticError::illegal(app, context))
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Validate every BQL function application in a statement list.
///
/// Runs once after a full parse; returns the list unchanged on success and
/// the first error otherwise.
pub fn resolve(list: StatementList) -> Result<StatementList, SemanticError> {
    let span = tracing::debug_span!(
        target: "bqlite.parse",
        "resolve_flavors",
        phrases = list.phrases().count() as u64,
    );
    let _guard = span.enter();

    for phrase in list.phrases() {
        resolve_phrase(phrase)?;
    }
    Ok(list)
}

fn resolve_phrase(phrase: &Phrase) -> Result<(), SemanticError> {
    match phrase {
        Phrase::Command(Command::CreateTableAs { query, .. }) => resolve_query(query),
        Phrase::Command(_) => Ok(()),
        Phrase::Query(q) => resolve_query(q),
    }
}

fn resolve_query(query: &Query) -> Result<(), SemanticError> {
    match query {
        Query::Select(s) => {
            let ctx = BqlContext::Row;
            for col in &s.columns {
                resolve_select_column(col, ctx)?;
            }
            if let Some(tables) = &s.tables {
                for table in tables {
                    if let bqlite_ast::TableSource::Subquery(q) = &table.source {
                        resolve_query(q)?;
                    }
                }
            }
            resolve_tail(
                s.condition.as_deref(),
                s.grouping.as_ref(),
                s.order.as_deref(),
                s.limit.as_ref(),
                ctx,
            )
        }
        Query::Estimate(e) => {
            let ctx = BqlContext::Row;
            for col in &e.columns {
                resolve_select_column(col, ctx)?;
            }
            resolve_tail(
                e.condition.as_deref(),
                e.grouping.as_ref(),
                e.order.as_deref(),
                e.limit.as_ref(),
                ctx,
            )
        }
        Query::EstimateColumns(e) => {
            let ctx = BqlContext::Column;
            resolve_expr_columns(&e.columns, ctx)?;
            resolve_tail(
                e.condition.as_deref(),
                None,
                e.order.as_deref(),
                e.limit.as_ref(),
                ctx,
            )
        }
        Query::EstimatePairwise(e) => {
            let ctx = BqlContext::PairwiseColumn;
            resolve_expr_columns(&e.columns, ctx)?;
            if let Some(subcols) = &e.subcolumns {
                for list in subcols {
                    resolve_column_list(list)?;
                }
            }
            resolve_tail(
                e.condition.as_deref(),
                None,
                e.order.as_deref(),
                e.limit.as_ref(),
                ctx,
            )
        }
        Query::EstimatePairwiseRow(e) => {
            let ctx = BqlContext::PairwiseRow;
            resolve_expr(&e.expression, ctx)?;
            resolve_tail(
                e.condition.as_deref(),
                None,
                e.order.as_deref(),
                e.limit.as_ref(),
                ctx,
            )
        }
        Query::Simulate(s) => {
            let ctx = BqlContext::Unmodeled;
            for (_, value) in &s.constraints {
                resolve_expr(value, ctx)?;
            }
            resolve_limit(s.limit.as_ref(), ctx)
        }
    }
}

fn resolve_tail(
    condition: Option<&Expr>,
    grouping: Option<&Grouping>,
    order: Option<&[OrderKey]>,
    limit: Option<&Limit>,
    ctx: BqlContext,
) -> Result<(), SemanticError> {
    if let Some(c) = condition {
        resolve_expr(c, ctx)?;
    }
    if let Some(g) = grouping {
        for key in &g.keys {
            resolve_expr(key, ctx)?;
        }
        if let Some(h) = &g.condition {
            resolve_expr(h, ctx)?;
        }
    }
    if let Some(keys) = order {
        for key in keys {
            resolve_expr(&key.expr, ctx)?;
        }
    }
    resolve_limit(limit, ctx)
}

fn resolve_limit(limit: Option<&Limit>, ctx: BqlContext) -> Result<(), SemanticError> {
    if let Some(lim) = limit {
        resolve_expr(&lim.limit, ctx)?;
        if let Some(off) = &lim.offset {
            resolve_expr(off, ctx)?;
        }
    }
    Ok(())
}

fn resolve_select_column(col: &SelectColumn, ctx: BqlContext) -> Result<(), SemanticError> {
    match col {
        SelectColumn::Star | SelectColumn::TableStar(_) => Ok(()),
        SelectColumn::TableSub(_, q) => resolve_query(q),
        SelectColumn::Expr { expr, .. } => resolve_expr(expr, ctx),
    }
}

fn resolve_expr_columns(cols: &[ExprColumn], ctx: BqlContext) -> Result<(), SemanticError> {
    for col in cols {
        resolve_expr(&col.expr, ctx)?;
    }
    Ok(())
}

fn resolve_column_list(list: &ColumnList) -> Result<(), SemanticError> {
    match list {
        ColumnList::All | ColumnList::Column(_) => Ok(()),
        ColumnList::Subquery(q) => resolve_query(q),
    }
}

fn resolve_expr(expr: &Expr, ctx: BqlContext) -> Result<(), SemanticError> {
    match expr {
        Expr::Literal(_, _) | Expr::Numpar(_, _) | Expr::Nampar(_, _, _) | Expr::Column { .. } => {
            Ok(())
        }

        // Subqueries establish their own context from their own shape.
        Expr::Subquery(q, _) | Expr::Exists(q, _) => resolve_query(q),
        Expr::In { expr, query, .. } => {
            resolve_expr(expr, ctx)?;
            resolve_query(query)
        }

        Expr::Binary { left, right, .. } => {
            resolve_expr(left, ctx)?;
            resolve_expr(right, ctx)
        }
        Expr::Unary { expr, .. }
        | Expr::IsNull { expr, .. }
        | Expr::Collate { expr, .. }
        | Expr::Cast { expr, .. } => resolve_expr(expr, ctx),
        Expr::Like {
            expr,
            pattern,
            escape,
            ..
        } => {
            resolve_expr(expr, ctx)?;
            resolve_expr(pattern, ctx)?;
            if let Some(e) = escape {
                resolve_expr(e, ctx)?;
            }
            Ok(())
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            resolve_expr(expr, ctx)?;
            resolve_expr(low, ctx)?;
            resolve_expr(high, ctx)
        }
        Expr::App { args, .. } => {
            for arg in args {
                resolve_expr(arg, ctx)?;
            }
            Ok(())
        }
        Expr::AppStar { .. } => Ok(()),
        Expr::Case {
            key,
            whens,
            otherwise,
            ..
        } => {
            if let Some(k) = key {
                resolve_expr(k, ctx)?;
            }
            for (cond, result) in whens {
                resolve_expr(cond, ctx)?;
                resolve_expr(result, ctx)?;
            }
            if let Some(e) = otherwise {
                resolve_expr(e, ctx)?;
            }
            Ok(())
        }

        Expr::Bql(app, _) => {
            bql_flavor(app, ctx)?;
            resolve_bql_args(app, ctx)
        }
    }
}

fn resolve_bql_args(app: &BqlApp, ctx: BqlContext) -> Result<(), SemanticError> {
    match app {
        BqlApp::PredictiveProbability { .. }
        | BqlApp::Typicality { .. }
        | BqlApp::DependenceProbability { .. }
        | BqlApp::Correlation { .. } => Ok(()),
        BqlApp::Probability { value, .. } => resolve_expr(value, ctx),
        BqlApp::Similarity { row, columns } => {
            if let Some(r) = row {
                resolve_expr(r, ctx)?;
            }
            for list in columns {
                resolve_column_list(list)?;
            }
            Ok(())
        }
        BqlApp::MutualInformation { samples, .. } => {
            if let Some(n) = samples {
                resolve_expr(n, ctx)?;
            }
            Ok(())
        }
        BqlApp::Infer { confidence, .. } => resolve_expr(confidence, ctx),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
