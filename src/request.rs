//! Per-request context handed from the HTTP layer to the query builder.

use axum::http::Method;
use serde_json::{Map, Value};
use std::fmt;

/// Table operation served by a generated route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Get,
    Post,
    Put,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Post => "post",
            Operation::Put => "put",
            Operation::Delete => "delete",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Operation::Get => Method::GET,
            Operation::Post => Method::POST,
            Operation::Put => Method::PUT,
            Operation::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name under which a completed operation is published, rendered as `{op}-{table}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventKey {
    pub op: Operation,
    pub table: String,
}

impl EventKey {
    pub fn new(op: Operation, table: &str) -> Self {
        EventKey {
            op,
            table: table.to_string(),
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.op, self.table)
    }
}

/// Filter terms keyed by column, in first-seen order. Values are raw comma lists.
pub type Filters = Vec<(String, String)>;

/// Fold query pairs into filters: repeated keys join with commas (`a=1&a=2` == `a=1,2`).
pub fn collect_filters<I>(pairs: I) -> Filters
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut out: Filters = Vec::new();
    for (k, v) in pairs {
        match out.iter_mut().find(|(key, _)| *key == k) {
            Some((_, existing)) => {
                existing.push(',');
                existing.push_str(&v);
            }
            None => out.push((k, v)),
        }
    }
    out
}

#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub table: String,
    pub id: Option<String>,
    pub body: Map<String, Value>,
    /// Query-string filters (GET).
    pub query: Filters,
    /// Extra where-filters (PUT only).
    pub filters: Filters,
}

impl RequestContext {
    pub fn new(table: impl Into<String>) -> Self {
        RequestContext {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_query(mut self, query: Filters) -> Self {
        self.query = query;
        self
    }

    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }
}
