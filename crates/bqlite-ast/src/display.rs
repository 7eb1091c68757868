//! Canonical BQL rendering via `fmt::Display` for AST nodes.
//!
//! Every major AST type implements `Display` to reconstruct valid BQL text.
//! This enables the round-trip property: rendering a parsed statement and
//! re-parsing it produces a structurally equal AST.

#[allow(clippy::wildcard_imports)]
use crate::*;
use std::fmt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn comma_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Reserved words of the BQL grammar, uppercase, sorted for binary search.
/// Identifiers colliding with any of these are rendered quoted so the output
/// re-parses unambiguously regardless of grammar position.
static KEYWORDS: &[&str] = &[
    "ALL", "ALTER", "ANALYZE", "AND", "AS", "ASC", "BEGIN", "BETWEEN", "BTABLE", "BY", "CASE",
    "CAST", "COLLATE", "COLUMNS", "COMMIT", "CONF", "CORRELATION", "CREATE", "DEPENDENCE", "DESC",
    "DISTINCT", "DROP", "ELSE", "END", "ESCAPE", "ESTIMATE", "EXISTS", "FOR", "FROM", "GENERATOR",
    "GIVEN", "GLOB", "GROUP", "HAVING", "IF", "IN", "INFER", "INFORMATION", "INITIALIZE", "IS",
    "ISNULL", "ITERATION", "ITERATIONS", "LIKE", "LIMIT", "MATCH", "MINUTE", "MINUTES", "MODEL",
    "MODELS", "MUTUAL", "NOT", "NOTNULL", "NULL", "OF", "OFFSET", "OR", "ORDER", "PAIRWISE",
    "PREDICTIVE", "PROBABILITY", "REGEXP", "RENAME", "RESPECT", "ROLLBACK", "ROW", "SAMPLES",
    "SECOND", "SECONDS", "SELECT", "SIMILARITY", "SIMULATE", "TABLE", "TEMP", "TEMPORARY", "THEN",
    "TO", "TYPICALITY", "USING", "VALUE", "WAIT", "WHEN", "WHERE", "WITH",
];

/// Returns true if the name needs quoting (empty, special chars, or a
/// reserved word).
fn needs_quoting(name: &str) -> bool {
    if name.is_empty() {
        return true;
    }
    let first = name.as_bytes()[0];
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return true;
    }
    if name
        .bytes()
        .any(|b| !(b.is_ascii_alphanumeric() || b == b'_'))
    {
        return true;
    }
    let upper = name.to_ascii_uppercase();
    KEYWORDS.binary_search(&upper.as_str()).is_ok()
}

fn write_ident(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if needs_quoting(name) {
        write!(f, "\"{}\"", name.replace('"', "\"\""))
    } else {
        f.write_str(name)
    }
}

struct Ident<'a>(&'a str);

impl fmt::Display for Ident<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_ident(f, self.0)
    }
}

/// Write an expression operand, wrapping in parentheses when it is itself an
/// operator application. This keeps precedence structural through
/// parse → display → re-parse and prevents token merging (`--x` would start
/// a line comment).
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if matches!(
        expr,
        Expr::Binary { .. }
            | Expr::Unary { .. }
            | Expr::Like { .. }
            | Expr::Between { .. }
            | Expr::In { .. }
            | Expr::IsNull { .. }
            | Expr::Collate { .. }
    ) {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

/// Write an argument that the grammar accepts only at the primary tier
/// (the value of `PROBABILITY OF c = v`, a `SIMILARITY TO` row, a sample
/// count, an `INFER` confidence).
fn write_primary(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    write_operand(f, expr)
}

// ---------------------------------------------------------------------------
// Literals, types, column lists
// ---------------------------------------------------------------------------

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(v) => {
                // Keep a decimal point so the value re-lexes as a float.
                if v.fract() == 0.0 && !v.is_infinite() && !v.is_nan() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
        }
        if !self.args.is_empty() {
            f.write_str("(")?;
            comma_list(f, &self.args)?;
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sign {
            TypeArgSign::Unsigned => write!(f, "{}", self.value),
            TypeArgSign::Positive => write!(f, "+{}", self.value),
            TypeArgSign::Negative => write!(f, "-{}", self.value),
        }
    }
}

impl fmt::Display for ColumnList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Column(c) => write_ident(f, c),
            Self::Subquery(q) => write!(f, "({q})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit, _) => write!(f, "{lit}"),
            Self::Numpar(n, _) => write!(f, "?{n}"),
            Self::Nampar(_, name, _) => write!(f, ":{name}"),
            Self::Column { table, column, .. } => {
                if let Some(t) = table {
                    write_ident(f, t)?;
                    f.write_str(".")?;
                }
                write_ident(f, column)
            }
            Self::Subquery(q, _) => write!(f, "({q})"),
            Self::Binary {
                op, left, right, ..
            } => {
                write_operand(f, left)?;
                write!(f, " {op} ")?;
                write_operand(f, right)
            }
            Self::Unary { op, expr, .. } => match op {
                UnaryOp::Not => {
                    f.write_str("NOT ")?;
                    write_operand(f, expr)
                }
                UnaryOp::BitNot | UnaryOp::Negate | UnaryOp::Plus => {
                    write!(f, "{op}")?;
                    write_operand(f, expr)
                }
            },
            Self::Like {
                op,
                not,
                expr,
                pattern,
                escape,
                ..
            } => {
                write_operand(f, expr)?;
                if *not {
                    f.write_str(" NOT")?;
                }
                write!(f, " {op} ")?;
                write_operand(f, pattern)?;
                if let Some(e) = escape {
                    f.write_str(" ESCAPE ")?;
                    write_operand(f, e)?;
                }
                Ok(())
            }
            Self::Between {
                expr,
                low,
                high,
                not,
                ..
            } => {
                write_operand(f, expr)?;
                if *not {
                    f.write_str(" NOT")?;
                }
                f.write_str(" BETWEEN ")?;
                write_operand(f, low)?;
                f.write_str(" AND ")?;
                write_operand(f, high)
            }
            Self::In {
                expr, query, not, ..
            } => {
                write_operand(f, expr)?;
                if *not {
                    f.write_str(" NOT")?;
                }
                write!(f, " IN ({query})")
            }
            Self::IsNull { expr, not, .. } => {
                write_operand(f, expr)?;
                f.write_str(if *not { " NOTNULL" } else { " ISNULL" })
            }
            Self::Collate {
                expr, collation, ..
            } => {
                write_operand(f, expr)?;
                f.write_str(" COLLATE ")?;
                write_ident(f, collation)
            }
            Self::Cast { expr, type_ref, .. } => write!(f, "CAST({expr} AS {type_ref})"),
            Self::Exists(q, _) => write!(f, "EXISTS ({q})"),
            Self::App {
                distinct,
                function,
                args,
                ..
            } => {
                write_ident(f, function)?;
                f.write_str("(")?;
                if *distinct {
                    f.write_str("DISTINCT ")?;
                }
                comma_list(f, args)?;
                f.write_str(")")
            }
            Self::AppStar { function, .. } => {
                write_ident(f, function)?;
                f.write_str("(*)")
            }
            Self::Case {
                key,
                whens,
                otherwise,
                ..
            } => {
                f.write_str("CASE")?;
                if let Some(k) = key {
                    write!(f, " {k}")?;
                }
                for (cond, result) in whens {
                    write!(f, " WHEN {cond} THEN {result}")?;
                }
                if let Some(e) = otherwise {
                    write!(f, " ELSE {e}")?;
                }
                f.write_str(" END")
            }
            Self::Bql(app, _) => write!(f, "{app}"),
        }
    }
}

impl fmt::Display for BqlApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PredictiveProbability { column } => {
                write!(f, "PREDICTIVE PROBABILITY OF {}", Ident(column))
            }
            Self::Probability { column, value } => {
                match column {
                    Some(c) => write!(f, "PROBABILITY OF {} = ", Ident(c))?,
                    None => f.write_str("PROBABILITY OF VALUE ")?,
                }
                write_primary(f, value)
            }
            Self::Typicality { column } => {
                f.write_str("TYPICALITY")?;
                if let Some(c) = column {
                    write!(f, " OF {}", Ident(c))?;
                }
                Ok(())
            }
            Self::Similarity { row, columns } => {
                f.write_str("SIMILARITY")?;
                if let Some(r) = row {
                    f.write_str(" TO ")?;
                    write_primary(f, r)?;
                }
                // The absent WITH RESPECT TO clause means "all columns";
                // render the clause only when it narrows the set.
                let wrt_is_all = columns.len() == 1 && matches!(columns[0], ColumnList::All);
                if !wrt_is_all {
                    f.write_str(" WITH RESPECT TO ")?;
                    if columns.len() == 1 {
                        write!(f, "{}", columns[0])?;
                    } else {
                        f.write_str("(")?;
                        comma_list(f, columns)?;
                        f.write_str(")")?;
                    }
                }
                Ok(())
            }
            Self::DependenceProbability { columns } => {
                write!(f, "DEPENDENCE PROBABILITY{columns}")
            }
            Self::MutualInformation { columns, samples } => {
                write!(f, "MUTUAL INFORMATION{columns}")?;
                if let Some(n) = samples {
                    f.write_str(" USING ")?;
                    write_primary(f, n)?;
                    f.write_str(" SAMPLES")?;
                }
                Ok(())
            }
            Self::Correlation { columns } => write!(f, "CORRELATION{columns}"),
            Self::Infer { column, confidence } => {
                write!(f, "INFER {} CONF ", Ident(column))?;
                write_primary(f, confidence)
            }
        }
    }
}

impl fmt::Display for ColumnPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Implicit => Ok(()),
            Self::With(c) => write!(f, " WITH {}", Ident(c)),
            Self::OfWith(a, b) => write!(f, " OF {} WITH {}", Ident(a), Ident(b)),
        }
    }
}

// ---------------------------------------------------------------------------
// Query clauses
// ---------------------------------------------------------------------------

impl fmt::Display for SelectColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Star => f.write_str("*"),
            Self::TableStar(t) => {
                write_ident(f, t)?;
                f.write_str(".*")
            }
            Self::TableSub(t, q) => {
                write_ident(f, t)?;
                write!(f, ".({q})")
            }
            Self::Expr { expr, alias } => {
                write!(f, "{expr}")?;
                if let Some(a) = alias {
                    write!(f, " AS {}", Ident(a))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for ExprColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(a) = &self.alias {
            write!(f, " AS {}", Ident(a))?;
        }
        Ok(())
    }
}

impl fmt::Display for SelectTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            TableSource::Named(n) => write_ident(f, n)?,
            TableSource::Subquery(q) => write!(f, "({q})")?,
        }
        if let Some(a) = &self.alias {
            write!(f, " AS {}", Ident(a))?;
        }
        Ok(())
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        match self.sense {
            OrderSense::Asc => Ok(()),
            OrderSense::Desc => f.write_str(" DESC"),
        }
    }
}

/// Render the trailing clauses shared by most query forms.
fn write_tail(
    f: &mut fmt::Formatter<'_>,
    condition: Option<&Expr>,
    grouping: Option<&Grouping>,
    order: Option<&[OrderKey]>,
    limit: Option<&Limit>,
) -> fmt::Result {
    if let Some(c) = condition {
        write!(f, " WHERE {c}")?;
    }
    if let Some(g) = grouping {
        f.write_str(" GROUP BY ")?;
        comma_list(f, &g.keys)?;
        if let Some(h) = &g.condition {
            write!(f, " HAVING {h}")?;
        }
    }
    if let Some(keys) = order {
        f.write_str(" ORDER BY ")?;
        comma_list(f, keys)?;
    }
    if let Some(lim) = limit {
        write!(f, " LIMIT {}", lim.limit)?;
        if let Some(off) = &lim.offset {
            write!(f, " OFFSET {off}")?;
        }
    }
    Ok(())
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select(s) => {
                f.write_str("SELECT ")?;
                if s.quantifier == Quantifier::Distinct {
                    f.write_str("DISTINCT ")?;
                }
                comma_list(f, &s.columns)?;
                if let Some(tables) = &s.tables {
                    f.write_str(" FROM ")?;
                    comma_list(f, tables)?;
                }
                write_tail(
                    f,
                    s.condition.as_deref(),
                    s.grouping.as_ref(),
                    s.order.as_deref(),
                    s.limit.as_ref(),
                )
            }
            Self::Estimate(e) => {
                f.write_str("ESTIMATE ")?;
                if e.quantifier == Quantifier::Distinct {
                    f.write_str("DISTINCT ")?;
                }
                comma_list(f, &e.columns)?;
                write!(f, " FROM {}", Ident(&e.generator))?;
                write_tail(
                    f,
                    e.condition.as_deref(),
                    e.grouping.as_ref(),
                    e.order.as_deref(),
                    e.limit.as_ref(),
                )
            }
            Self::EstimateColumns(e) => {
                f.write_str("ESTIMATE COLUMNS")?;
                if !e.columns.is_empty() {
                    f.write_str(" ")?;
                    comma_list(f, &e.columns)?;
                }
                write!(f, " FROM {}", Ident(&e.generator))?;
                write_tail(
                    f,
                    e.condition.as_deref(),
                    None,
                    e.order.as_deref(),
                    e.limit.as_ref(),
                )
            }
            Self::EstimatePairwise(e) => {
                f.write_str("ESTIMATE PAIRWISE ")?;
                comma_list(f, &e.columns)?;
                write!(f, " FROM {}", Ident(&e.generator))?;
                if let Some(subcols) = &e.subcolumns {
                    f.write_str(" FOR ")?;
                    comma_list(f, subcols)?;
                }
                write_tail(
                    f,
                    e.condition.as_deref(),
                    None,
                    e.order.as_deref(),
                    e.limit.as_ref(),
                )
            }
            Self::EstimatePairwiseRow(e) => {
                write!(
                    f,
                    "ESTIMATE PAIRWISE ROW {} FROM {}",
                    e.expression,
                    Ident(&e.generator)
                )?;
                write_tail(
                    f,
                    e.condition.as_deref(),
                    None,
                    e.order.as_deref(),
                    e.limit.as_ref(),
                )
            }
            Self::Simulate(s) => {
                f.write_str("SIMULATE ")?;
                for (i, c) in s.columns.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_ident(f, c)?;
                }
                write!(f, " FROM {}", Ident(&s.generator))?;
                if !s.constraints.is_empty() {
                    f.write_str(" GIVEN ")?;
                    for (i, (col, value)) in s.constraints.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{} = {value}", Ident(col))?;
                    }
                }
                if let Some(lim) = &s.limit {
                    write!(f, " LIMIT {}", lim.limit)?;
                    if let Some(off) = &lim.offset {
                        write!(f, " OFFSET {off}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

impl fmt::Display for ModelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(n) => write!(f, "{n}"),
            Self::Range(lo, hi) => write!(f, "{lo}-{hi}"),
        }
    }
}

impl fmt::Display for AnalysisLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iterations(n) => write!(f, "{n} ITERATIONS"),
            Self::Minutes(n) => write!(f, "{n} MINUTES"),
            Self::Seconds(n) => write!(f, "{n} SECONDS"),
        }
    }
}

impl fmt::Display for AlterTableCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RenameTable(n) => write!(f, "RENAME TO {}", Ident(n)),
            Self::RenameColumn { old, new } => {
                write!(f, "RENAME {} TO {}", Ident(old), Ident(new))
            }
        }
    }
}

impl fmt::Display for AlterGeneratorCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RenameGenerator(n) => write!(f, "RENAME TO {}", Ident(n)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => f.write_str("BEGIN"),
            Self::Rollback => f.write_str("ROLLBACK"),
            Self::Commit => f.write_str("COMMIT"),
            Self::CreateTableAs {
                temp,
                if_not_exists,
                name,
                query,
            } => {
                f.write_str("CREATE ")?;
                if *temp {
                    f.write_str("TEMP ")?;
                }
                f.write_str("TABLE ")?;
                if *if_not_exists {
                    f.write_str("IF NOT EXISTS ")?;
                }
                write!(f, "{} AS {query}", Ident(name))
            }
            Self::DropTable { if_exists, name } => {
                f.write_str("DROP TABLE ")?;
                if *if_exists {
                    f.write_str("IF EXISTS ")?;
                }
                write_ident(f, name)
            }
            Self::AlterTable { table, commands } => {
                write!(f, "ALTER TABLE {} ", Ident(table))?;
                comma_list(f, commands)
            }
            Self::CreateGenerator {
                name,
                if_not_exists,
                table,
                metamodel,
                schema,
            } => {
                write!(f, "CREATE GENERATOR {}", Ident(name))?;
                if *if_not_exists {
                    f.write_str(" IF NOT EXISTS")?;
                }
                write!(f, " FOR {} USING {} (", Ident(table), Ident(metamodel))?;
                for (i, pair) in schema.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", Ident(&pair.column), Ident(&pair.stattype))?;
                }
                f.write_str(")")
            }
            Self::DropGenerator { if_exists, name } => {
                f.write_str("DROP GENERATOR ")?;
                if *if_exists {
                    f.write_str("IF EXISTS ")?;
                }
                write_ident(f, name)
            }
            Self::AlterGenerator {
                generator,
                commands,
            } => {
                write!(f, "ALTER GENERATOR {} ", Ident(generator))?;
                comma_list(f, commands)
            }
            Self::InitializeModels {
                count,
                if_not_exists,
                generator,
            } => {
                write!(f, "INITIALIZE {count} MODELS")?;
                if *if_not_exists {
                    f.write_str(" IF NOT EXISTS")?;
                }
                write!(f, " FOR {}", Ident(generator))
            }
            Self::AnalyzeModels {
                generator,
                models,
                limit,
                wait,
            } => {
                write!(f, "ANALYZE {}", Ident(generator))?;
                if let Some(ranges) = models {
                    f.write_str(" MODELS ")?;
                    comma_list(f, ranges)?;
                }
                write!(f, " FOR {limit}")?;
                if *wait {
                    f.write_str(" WAIT")?;
                }
                Ok(())
            }
            Self::DropModels { models, generator } => {
                f.write_str("DROP MODELS")?;
                if let Some(ranges) = models {
                    f.write_str(" ")?;
                    comma_list(f, ranges)?;
                }
                write!(f, " FROM {}", Ident(generator))
            }
        }
    }
}

impl fmt::Display for Phrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command(c) => write!(f, "{c}"),
            Self::Query(q) => write!(f, "{q}"),
        }
    }
}

impl fmt::Display for StatementList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for slot in &self.slots {
            match slot {
                Slot::Empty => f.write_str(";")?,
                Slot::Phrase(p) => write!(f, "{p};")?,
            }
        }
        Ok(())
    }
}
