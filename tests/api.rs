use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mysql_autorest::{
    AppError, Backend, BackendConfig, Connection, ConnectionPool, Row, SchemaCache, SqlValue, WriteOutcome,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

/// In-memory tables that understand the statements the builder emits (ANSI quoting).
#[derive(Default)]
struct MemoryDb {
    tables: Mutex<Vec<(String, Vec<String>, Vec<Row>)>>,
    statements: Mutex<Vec<String>>,
}

impl MemoryDb {
    fn with_tables(tables: &[(&str, &[&str])]) -> Arc<Self> {
        let db = MemoryDb::default();
        *db.tables.lock().unwrap() = tables
            .iter()
            .map(|(t, cols)| (t.to_string(), cols.iter().map(|c| c.to_string()).collect(), Vec::new()))
            .collect();
        Arc::new(db)
    }

    fn data_statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .filter(|s| !s.starts_with("SHOW") && !s.starts_with("DESCRIBE"))
            .cloned()
            .collect()
    }
}

fn quoted_idents(s: &str) -> Vec<String> {
    s.split('"').skip(1).step_by(2).map(String::from).collect()
}

fn same(v: Option<&Value>, p: &SqlValue) -> bool {
    let Some(v) = v else { return false };
    match p {
        SqlValue::Int(i) => v.as_i64() == Some(*i) || v.as_str() == Some(i.to_string().as_str()),
        SqlValue::Text(s) => v.as_str() == Some(s.as_str()) || v.to_string() == *s,
        SqlValue::Float(f) => v.as_f64() == Some(*f),
        SqlValue::Bool(b) => v.as_bool() == Some(*b),
        SqlValue::Null => v.is_null(),
    }
}

fn to_value(p: &SqlValue) -> Value {
    match p {
        SqlValue::Text(s) => Value::String(s.clone()),
        other => other.to_json(),
    }
}

/// `("a" = ? OR "a" = ?) AND "b" = ?` -> per term, the (column, value) alternatives.
fn where_terms(clause: &str, params: &mut std::slice::Iter<'_, SqlValue>) -> Vec<Vec<(String, SqlValue)>> {
    clause
        .split(" AND ")
        .map(|term| {
            term.trim_matches(|c| c == '(' || c == ')')
                .split(" OR ")
                .map(|eq| (quoted_idents(eq)[0].clone(), params.next().cloned().unwrap_or(SqlValue::Null)))
                .collect()
        })
        .collect()
}

fn row_matches(row: &Row, terms: &[Vec<(String, SqlValue)>]) -> bool {
    terms
        .iter()
        .all(|alts| alts.iter().any(|(col, p)| same(row.get(col), p)))
}

struct MemoryConn {
    db: Arc<MemoryDb>,
}

#[async_trait::async_trait]
impl Connection for MemoryConn {
    async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, AppError> {
        self.db.statements.lock().unwrap().push(sql.to_string());
        let tables = self.db.tables.lock().unwrap();
        if sql == "SHOW TABLES" {
            return Ok(tables
                .iter()
                .map(|(t, _, _)| json!({ "Tables_in_shop": t }).as_object().cloned().unwrap())
                .collect());
        }
        if let Some(rest) = sql.strip_prefix("DESCRIBE ") {
            let name = rest.trim_matches('`');
            let (_, cols, _) = tables
                .iter()
                .find(|(t, _, _)| t == name)
                .ok_or_else(|| AppError::Query(format!("Table 'shop.{}' doesn't exist", name)))?;
            return Ok(cols
                .iter()
                .map(|c| json!({ "Field": c, "Type": "varchar(255)" }).as_object().cloned().unwrap())
                .collect());
        }
        let (head, clause) = match sql.split_once(" WHERE ") {
            Some((h, w)) => (h, Some(w)),
            None => (sql, None),
        };
        let table = quoted_idents(head)[0].clone();
        let mut it = params.iter();
        let terms = clause.map(|c| where_terms(c, &mut it)).unwrap_or_default();
        let (_, _, rows) = tables
            .iter()
            .find(|(t, _, _)| *t == table)
            .ok_or_else(|| AppError::Query("no such table".into()))?;
        Ok(rows.iter().filter(|r| row_matches(r, &terms)).cloned().collect())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<WriteOutcome, AppError> {
        self.db.statements.lock().unwrap().push(sql.to_string());
        let mut tables = self.db.tables.lock().unwrap();
        if sql.starts_with("INSERT") {
            let idents = quoted_idents(sql);
            let (_, _, rows) = tables
                .iter_mut()
                .find(|(t, _, _)| *t == idents[0])
                .ok_or_else(|| AppError::Query("no such table".into()))?;
            let mut row = Row::new();
            for (col, p) in idents[1..].iter().zip(params) {
                row.insert(col.clone(), to_value(p));
            }
            let mut last_insert_id = 0;
            if !row.contains_key("id") {
                last_insert_id = rows.len() as u64 + 1000;
                row.insert("id".into(), json!(last_insert_id));
            }
            if rows.iter().any(|r| r.get("id") == row.get("id")) {
                return Err(AppError::Query(format!("Duplicate entry '{}' for key 'PRIMARY'", row["id"])));
            }
            rows.push(row);
            return Ok(WriteOutcome {
                rows_affected: 1,
                last_insert_id,
            });
        }
        // UPDATE "t" SET "a" = ?, "b" = ? WHERE ...
        let (head, clause) = sql.split_once(" WHERE ").ok_or_else(|| AppError::Query("no where".into()))?;
        let (table_part, set_part) = head.split_once(" SET ").unwrap();
        let table = quoted_idents(table_part)[0].clone();
        let set_cols = quoted_idents(set_part);
        let mut it = params.iter();
        let sets: Vec<(String, Value)> = set_cols
            .into_iter()
            .map(|c| (c, it.next().map(to_value).unwrap_or(Value::Null)))
            .collect();
        let terms = where_terms(clause, &mut it);
        let (_, _, rows) = tables
            .iter_mut()
            .find(|(t, _, _)| *t == table)
            .ok_or_else(|| AppError::Query("no such table".into()))?;
        let mut affected = 0;
        for row in rows.iter_mut().filter(|r| row_matches(r, &terms)) {
            for (c, v) in &sets {
                row.insert(c.clone(), v.clone());
            }
            affected += 1;
        }
        Ok(WriteOutcome {
            rows_affected: affected,
            last_insert_id: 0,
        })
    }
}

/// Pool handle sharing one MemoryDb.
struct SharedDb(Arc<MemoryDb>);

#[async_trait::async_trait]
impl ConnectionPool for SharedDb {
    async fn acquire(&self) -> Result<Box<dyn Connection>, AppError> {
        Ok(Box::new(MemoryConn { db: self.0.clone() }))
    }
}

fn config() -> BackendConfig {
    let mut map = HashMap::new();
    map.insert("mysql.database".to_string(), "shop".to_string());
    BackendConfig::from_flat_map(&map).unwrap()
}

async fn discovered_app(db: &Arc<MemoryDb>) -> (Backend, Router) {
    let backend = Backend::new(config(), Arc::new(SharedDb(db.clone())));
    let app = backend.start().await.unwrap();
    // Let the background pass finish describing.
    for _ in 0..100 {
        if backend.schema().status().ready {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    (backend, app)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("Content-Type", "application/json");
            Body::from(serde_json::to_string(&v).unwrap())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn call_raw(app: &Router, method: &str, uri: &str, body: &'static str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn post_then_get_returns_only_table_columns() {
    let db = MemoryDb::with_tables(&[("users", &["id", "name", "email"]), ("orders", &["id", "total"])]);
    let (_backend, app) = discovered_app(&db).await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/users",
        Some(json!({"id": 7, "name": "ann", "email": "a@x", "nickname": "dropped"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": 7}));

    let (status, body) = call(&app, "GET", "/api/users/7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": 7, "name": "ann", "email": "a@x"}));
}

#[tokio::test]
async fn post_without_id_reports_assigned_id() {
    let db = MemoryDb::with_tables(&[("users", &["id", "name"])]);
    let (_backend, app) = discovered_app(&db).await;
    let (status, body) = call(&app, "POST", "/api/users", Some(json!({"name": "bob"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": 1000}));
}

#[tokio::test]
async fn list_filters_with_or_groups_and_answers_204() {
    let db = MemoryDb::with_tables(&[("users", &["id", "name", "status"])]);
    let (_backend, app) = discovered_app(&db).await;
    for (id, status) in [(1, 1), (2, 2), (3, 3)] {
        call(&app, "POST", "/api/users", Some(json!({"id": id, "name": "n", "status": status}))).await;
    }

    let (status, body) = call(&app, "GET", "/api/users?status=1,2&unknown=9", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let ids: Vec<i64> = body.as_array().unwrap().iter().map(|r| r["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![1, 2]);

    let last = db.data_statements().last().cloned().unwrap();
    assert_eq!(last, r#"SELECT * FROM "users" WHERE ("status" = ? OR "status" = ?)"#);

    // No match: empty result shape, plain 200.
    let (status, body) = call(&app, "GET", "/api/users?status=9", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn injection_text_stays_a_parameter() {
    let db = MemoryDb::with_tables(&[("users", &["id", "name"])]);
    let (_backend, app) = discovered_app(&db).await;
    let (status, _) = call(&app, "GET", "/api/users?name=%27%3B%20DROP%20TABLE%20x%3B%20--", None).await;
    assert_eq!(status, StatusCode::OK);
    for stmt in db.data_statements() {
        assert!(!stmt.contains("DROP TABLE"), "{stmt}");
    }
}

#[tokio::test]
async fn put_updates_by_id_and_where_filters() {
    let db = MemoryDb::with_tables(&[("users", &["id", "name", "status"])]);
    let (_backend, app) = discovered_app(&db).await;
    call(&app, "POST", "/api/users", Some(json!({"id": 1, "name": "a", "status": 1}))).await;

    let (status, body) = call(&app, "PUT", "/api/users/1?status=1", Some(json!({"name": "b"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": 1}));
    let last = db.data_statements().last().cloned().unwrap();
    assert_eq!(last, r#"UPDATE "users" SET "name" = ? WHERE "id" = ? AND "status" = ?"#);

    let (_, body) = call(&app, "GET", "/api/users/1", None).await;
    assert_eq!(body["name"], json!("b"));
}

#[tokio::test]
async fn put_without_settable_columns_never_reaches_database() {
    let db = MemoryDb::with_tables(&[("users", &["id", "name"])]);
    let (_backend, app) = discovered_app(&db).await;
    let before = db.data_statements().len();
    let (status, body) = call(&app, "PUT", "/api/users/1", Some(json!({"bogus": 1}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
    assert_eq!(db.data_statements().len(), before);
}

#[tokio::test]
async fn errors_map_by_method() {
    let db = MemoryDb::with_tables(&[("users", &["id", "name"])]);
    let (_backend, app) = discovered_app(&db).await;
    call(&app, "POST", "/api/users", Some(json!({"id": 1, "name": "a"}))).await;

    let (status, body) = call(&app, "POST", "/api/users", Some(json!({"id": 1, "name": "again"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Duplicate entry '1' for key 'PRIMARY'"}));

    let (status, _) = call(&app, "POST", "/api/users", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn delete_is_not_implemented_even_before_schema_is_ready() {
    let db = MemoryDb::with_tables(&[]);
    let schema = Arc::new(SchemaCache::new());
    schema.record_tables(vec!["users".into()]);
    let backend = Backend::with_schema(config(), Arc::new(SharedDb(db.clone())), schema);
    let app = backend.start().await.unwrap();

    let (status, body) = call(&app, "DELETE", "/api/users/1", None).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body, json!({"err": "Method Not Implemented"}));
    assert!(db.data_statements().is_empty());
}

#[tokio::test]
async fn request_waits_for_late_table_schema() {
    let db = MemoryDb::with_tables(&[("orders", &["id", "total"])]);
    let schema = Arc::new(SchemaCache::new());
    schema.record_tables(vec!["orders".into()]);
    let backend = Backend::with_schema(config(), Arc::new(SharedDb(db.clone())), schema.clone());
    let app = backend.start().await.unwrap();

    let pending = {
        let app = app.clone();
        tokio::spawn(async move { call(&app, "GET", "/api/orders/5", None).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!pending.is_finished());
    assert!(db.data_statements().is_empty());

    schema.record_columns("orders", vec!["id".into(), "total".into()]);
    let (status, body) = pending.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
}

#[tokio::test]
async fn failed_describe_answers_by_method() {
    let db = MemoryDb::with_tables(&[]);
    let schema = Arc::new(SchemaCache::new());
    schema.record_tables(vec!["broken".into()]);
    schema.record_table_failure("broken", "permission denied".into());
    let backend = Backend::with_schema(config(), Arc::new(SharedDb(db)), schema);
    let app = backend.start().await.unwrap();

    let (status, body) = call(&app, "GET", "/api/broken", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("permission denied"));
    let (status, _) = call(&app, "POST", "/api/broken", Some(json!({}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn unknown_table_is_404() {
    let db = MemoryDb::with_tables(&[("users", &["id"])]);
    let (_backend, app) = discovered_app(&db).await;
    let (status, body) = call(&app, "PUT", "/api/ghosts/1", Some(json!({"id": 1}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "unknown table: ghosts"}));
}

#[tokio::test]
async fn mutations_are_published() {
    let db = MemoryDb::with_tables(&[("users", &["id", "name"])]);
    let (backend, app) = discovered_app(&db).await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        backend.on("post-users", move |v: &Value| seen.lock().unwrap().push(v.clone()));
    }
    call(&app, "POST", "/api/users", Some(json!({"id": 3, "name": "c"}))).await;
    call(&app, "POST", "/api/users", Some(json!({"id": 3, "name": "dup"}))).await;
    assert_eq!(*seen.lock().unwrap(), vec![json!({"id": 3})]);
}

#[tokio::test]
async fn concurrent_posts_keep_their_own_results() {
    let db = MemoryDb::with_tables(&[("users", &["id", "name"])]);
    let (_backend, app) = discovered_app(&db).await;
    let handles: Vec<_> = (1..=25)
        .map(|id| {
            let app = app.clone();
            tokio::spawn(async move {
                let (status, body) = call(&app, "POST", "/api/users", Some(json!({"id": id, "name": format!("u{id}")}))).await;
                (id, status, body)
            })
        })
        .collect();
    for h in handles {
        let (id, status, body) = h.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "id": id }));
    }
}

#[tokio::test]
async fn ready_route_reports_pending_tables() {
    let db = MemoryDb::with_tables(&[]);
    let schema = Arc::new(SchemaCache::new());
    schema.record_tables(vec!["a".into(), "b".into()]);
    schema.record_columns("a", vec!["id".into()]);
    let backend = Backend::with_schema(config(), Arc::new(SharedDb(db)), schema.clone());
    let app = backend.start().await.unwrap();

    let (status, body) = call(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["pending"], json!(["b"]));

    schema.record_columns("b", vec!["id".into()]);
    let (status, body) = call(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["described"], json!(2));

    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn malformed_json_body_is_rejected_before_the_database() {
    let db = MemoryDb::with_tables(&[("users", &["id", "name"])]);
    let (_backend, app) = discovered_app(&db).await;

    let (status, body) = call_raw(&app, "POST", "/api/users", r#"{"name": "ann",,,"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("malformed JSON"));

    let (status, _) = call_raw(&app, "PUT", "/api/users/1", r#"{"name": "#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert!(db.data_statements().is_empty(), "{:?}", db.data_statements());
}

#[tokio::test]
async fn empty_json_body_reads_as_empty_object() {
    let db = MemoryDb::with_tables(&[("users", &["id", "name"])]);
    let (_backend, app) = discovered_app(&db).await;
    let (status, body) = call_raw(&app, "PUT", "/api/users/1", "").await;
    // Nothing to set, so validation fails rather than parsing.
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("no known columns"));
}
