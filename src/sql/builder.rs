//! Builds parameterized SELECT, INSERT, UPDATE from a request context and a table's columns.
//! Identifiers come from discovered schema only; every request value is a bound `?` parameter.

use crate::error::AppError;
use crate::request::{EventKey, Filters, Operation, RequestContext};
use crate::sql::SqlValue;
use serde_json::Value;

/// How the executor shapes a successful response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultShape {
    /// Write statement: respond with `{id}`.
    Scalar,
    /// First row only.
    Row,
    /// All rows.
    Array,
}

#[derive(Clone, Debug)]
pub struct QuerySpec {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub shape: ResultShape,
    /// Id echoed back instead of the driver-assigned insert id.
    pub id_override: Option<Value>,
    pub event: EventKey,
}

impl QuerySpec {
    fn new(event: EventKey, shape: ResultShape) -> Self {
        QuerySpec {
            sql: String::new(),
            params: Vec::new(),
            shape,
            id_override: None,
            event,
        }
    }

    fn push_param(&mut self, v: SqlValue) -> &'static str {
        self.params.push(v);
        "?"
    }

    /// Statement with each placeholder replaced by its escaped literal. For logs and tests.
    pub fn interpolated(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut params = self.params.iter();
        for c in self.sql.chars() {
            if c == '?' {
                if let Some(p) = params.next() {
                    out.push_str(&p.to_literal());
                    continue;
                }
            }
            out.push(c);
        }
        out
    }
}

/// Identifier quoting style.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quoting {
    /// `"name"`, valid under `ANSI_QUOTES`.
    Ansi,
    /// `` `name` ``, MySQL default.
    Backtick,
}

impl Quoting {
    pub fn from_ansi(ansi_quotes: bool) -> Self {
        if ansi_quotes {
            Quoting::Ansi
        } else {
            Quoting::Backtick
        }
    }

    pub fn quote(&self, ident: &str) -> String {
        match self {
            Quoting::Ansi => format!("\"{}\"", ident.replace('"', "\"\"")),
            Quoting::Backtick => format!("`{}`", ident.replace('`', "``")),
        }
    }
}

const ID_COLUMN: &str = "id";

/// One term per known filter key; each comma-separated value becomes an equality in an OR-group.
/// `always_group` wraps single-value groups in parentheses too (GET style).
fn filter_terms(
    q: &mut QuerySpec,
    quoting: Quoting,
    columns: &[String],
    filters: &Filters,
    always_group: bool,
) -> Vec<String> {
    let mut terms = Vec::new();
    for (key, raw) in filters {
        if !columns.iter().any(|c| c == key) {
            continue;
        }
        let col = quoting.quote(key);
        let ors: Vec<String> = raw
            .split(',')
            .map(|v| format!("{} = {}", col, q.push_param(SqlValue::coerce(v))))
            .collect();
        if ors.len() == 1 && !always_group {
            terms.extend(ors);
        } else {
            terms.push(format!("({})", ors.join(" OR ")));
        }
    }
    terms
}

fn where_clause(terms: &[String]) -> String {
    if terms.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", terms.join(" AND "))
    }
}

/// SELECT by id (single row) or by query filters (array of rows).
pub fn select(ctx: &RequestContext, columns: &[String], quoting: Quoting) -> QuerySpec {
    let shape = if ctx.id.is_some() {
        ResultShape::Row
    } else {
        ResultShape::Array
    };
    let mut q = QuerySpec::new(EventKey::new(Operation::Get, &ctx.table), shape);
    let terms = match &ctx.id {
        Some(id) => {
            let ph = q.push_param(SqlValue::coerce(id));
            vec![format!("{} = {}", quoting.quote(ID_COLUMN), ph)]
        }
        None => filter_terms(&mut q, quoting, columns, &ctx.query, true),
    };
    q.sql = format!("SELECT * FROM {}{}", quoting.quote(&ctx.table), where_clause(&terms));
    q
}

/// INSERT of every known column present in the body, in column order.
pub fn insert(ctx: &RequestContext, columns: &[String], quoting: Quoting) -> QuerySpec {
    let mut q = QuerySpec::new(EventKey::new(Operation::Post, &ctx.table), ResultShape::Scalar);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for name in columns {
        let Some(v) = ctx.body.get(name) else { continue };
        cols.push(quoting.quote(name));
        placeholders.push(q.push_param(SqlValue::from_json(v, false)));
    }
    q.id_override = ctx.body.get(ID_COLUMN).filter(|v| !v.is_null()).cloned();
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoting.quote(&ctx.table),
        cols.join(", "),
        placeholders.join(", ")
    );
    q
}

/// UPDATE of known body columns, filtered by id and/or where-filters.
/// Fails before any SQL is produced when no filter or no settable column is present.
pub fn update(ctx: &RequestContext, columns: &[String], quoting: Quoting) -> Result<QuerySpec, AppError> {
    let mut q = QuerySpec::new(EventKey::new(Operation::Put, &ctx.table), ResultShape::Scalar);

    let mut sets = Vec::new();
    for name in columns {
        let Some(v) = ctx.body.get(name) else { continue };
        sets.push(format!("{} = {}", quoting.quote(name), q.push_param(SqlValue::from_json(v, true))));
    }

    let mut terms = Vec::new();
    let id = ctx.id.as_deref().filter(|id| !id.is_empty()).map(SqlValue::coerce);
    if let Some(id) = &id {
        terms.push(format!("{} = {}", quoting.quote(ID_COLUMN), q.push_param(id.clone())));
    }
    terms.extend(filter_terms(&mut q, quoting, columns, &ctx.filters, false));

    if terms.is_empty() {
        return Err(AppError::Validation("Put request needs a where condition".into()));
    }
    if sets.is_empty() {
        return Err(AppError::Validation(format!(
            "Put request has no known columns of {} to set",
            ctx.table
        )));
    }

    q.id_override = id.map(|v| v.to_json());
    q.sql = format!(
        "UPDATE {} SET {}{}",
        quoting.quote(&ctx.table),
        sets.join(", "),
        where_clause(&terms)
    );
    Ok(q)
}
