//! SQL generation for the `documents` table.
//!
//! Every builder is a pure function returning the statement and its bind
//! arguments in placeholder order, so the SQL can be checked without a
//! database. Filters must already be sanitized.

use serde_json::{Map, Value};
use uuid::Uuid;

use tenantry_core::error::AppError;
use tenantry_core::result::AppResult;
use tenantry_core::types::filter::{FilterValue, Filters};
use tenantry_core::types::pagination::SkipTake;
use tenantry_core::types::pipeline::PipelineStage;

use super::sanitize::is_valid_field_name;

/// A bind argument. Variants map one-to-one onto the Postgres types used.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArg {
    Text(String),
    Uuid(Uuid),
    NullableUuid(Option<Uuid>),
    Json(Value),
    TextArray(Vec<String>),
    BigInt(i64),
}

/// A statement ready for binding.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub args: Vec<QueryArg>,
}

/// Which documents a read sees with respect to soft-deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
    Exclude,
    Include,
    Only,
}

/// A document counts as live when neither soft-delete marker is set.
const LIVE: &str = "COALESCE(doc -> 'deleted', 'null'::jsonb) = 'null'::jsonb \
     AND COALESCE(doc -> 'deleted_at', 'null'::jsonb) = 'null'::jsonb";

const DEFAULT_ORDER: &str = "inserted_at, id";

/// Accumulates `WHERE` clauses and their arguments.
struct Conditions {
    clauses: Vec<String>,
    args: Vec<QueryArg>,
}

impl Conditions {
    fn new(collection: &str) -> Self {
        Self {
            clauses: vec!["collection = $1".to_string()],
            args: vec![QueryArg::Text(collection.to_string())],
        }
    }

    fn bind(&mut self, arg: QueryArg) -> usize {
        self.args.push(arg);
        self.args.len()
    }

    fn tenant(mut self, tenant: Option<Uuid>) -> Self {
        if let Some(tenant) = tenant {
            let n = self.bind(QueryArg::Uuid(tenant));
            self.clauses.push(format!("tenant_id = ${n}"));
        }
        self
    }

    fn id(mut self, id: &str) -> Self {
        let n = self.bind(QueryArg::Text(id.to_string()));
        self.clauses.push(format!("id = ${n}"));
        self
    }

    fn deleted(mut self, deleted: Deleted) -> Self {
        match deleted {
            Deleted::Exclude => self.clauses.push(LIVE.to_string()),
            Deleted::Only => self.clauses.push(format!("NOT ({LIVE})")),
            Deleted::Include => {}
        }
        self
    }

    fn filters(mut self, filters: &Filters) -> Self {
        let mut containment = Map::new();
        for (key, value) in filters.iter() {
            if key == "_id" {
                let n = self.bind(QueryArg::Text(id_text(value)));
                self.clauses.push(format!("id = ${n}"));
            } else if value.is_null() {
                let n = self.bind(QueryArg::TextArray(path(key)));
                self.clauses
                    .push(format!("COALESCE(doc #> ${n}::text[], 'null'::jsonb) = 'null'::jsonb"));
            } else {
                insert_path(&mut containment, key, value.to_json());
            }
        }
        if !containment.is_empty() {
            let n = self.bind(QueryArg::Json(Value::Object(containment)));
            self.clauses.push(format!("doc @> ${n}::jsonb"));
        }
        self
    }

    fn where_sql(&self) -> String {
        self.clauses.join(" AND ")
    }
}

fn id_text(value: &FilterValue) -> String {
    match value.to_json() {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn path(key: &str) -> Vec<String> {
    key.split('.').map(str::to_string).collect()
}

/// Places `value` under a dotted `key`, creating intermediate objects.
fn insert_path(target: &mut Map<String, Value>, key: &str, value: Value) {
    let mut segments = key.split('.').peekable();
    let mut current = target;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !next.is_object() {
            *next = Value::Object(Map::new());
        }
        let Value::Object(next) = next else {
            return;
        };
        current = next;
    }
}

pub fn insert(collection: &str, id: &str, tenant: Option<Uuid>, doc: Value) -> Query {
    Query {
        sql: "INSERT INTO documents (collection, id, tenant_id, doc) \
              VALUES ($1, $2, $3, $4) RETURNING doc"
            .to_string(),
        args: vec![
            QueryArg::Text(collection.to_string()),
            QueryArg::Text(id.to_string()),
            QueryArg::NullableUuid(tenant),
            QueryArg::Json(doc),
        ],
    }
}

pub fn select_by_id(collection: &str, tenant: Option<Uuid>, id: &str) -> Query {
    let conditions = Conditions::new(collection)
        .tenant(tenant)
        .id(id)
        .deleted(Deleted::Exclude);
    Query {
        sql: format!("SELECT doc FROM documents WHERE {}", conditions.where_sql()),
        args: conditions.args,
    }
}

/// Lists documents in insertion order, optionally windowed.
pub fn select(
    collection: &str,
    tenant: Option<Uuid>,
    deleted: Deleted,
    filters: &Filters,
    page: Option<SkipTake>,
) -> Query {
    let mut conditions = Conditions::new(collection)
        .tenant(tenant)
        .deleted(deleted)
        .filters(filters);
    let mut sql = format!(
        "SELECT doc FROM documents WHERE {} ORDER BY {DEFAULT_ORDER}",
        conditions.where_sql()
    );
    if let Some(page) = page {
        let limit = conditions.bind(QueryArg::BigInt(page.take as i64));
        let offset = conditions.bind(QueryArg::BigInt(page.skip as i64));
        sql.push_str(&format!(" LIMIT ${limit} OFFSET ${offset}"));
    }
    Query {
        sql,
        args: conditions.args,
    }
}

/// Full-document replace. Soft-deleted documents are still writable so the
/// audit layer can stamp them.
pub fn update(collection: &str, tenant: Option<Uuid>, id: &str, doc: Value) -> Query {
    let mut conditions = Conditions::new(collection).tenant(tenant).id(id);
    let n = conditions.bind(QueryArg::Json(doc));
    Query {
        sql: format!(
            "UPDATE documents SET doc = ${n} WHERE {} RETURNING doc",
            conditions.where_sql()
        ),
        args: conditions.args,
    }
}

pub fn delete(collection: &str, tenant: Option<Uuid>, id: &str) -> Query {
    let conditions = Conditions::new(collection).tenant(tenant).id(id);
    Query {
        sql: format!("DELETE FROM documents WHERE {}", conditions.where_sql()),
        args: conditions.args,
    }
}

/// Clears both soft-delete markers on a deleted document and re-activates it.
pub fn restore(collection: &str, tenant: Option<Uuid>, id: &str) -> Query {
    let conditions = Conditions::new(collection)
        .tenant(tenant)
        .id(id)
        .deleted(Deleted::Only);
    Query {
        sql: format!(
            "UPDATE documents SET doc = CASE \
             WHEN doc ? 'active' THEN jsonb_set(doc - 'deleted' - 'deleted_at' - 'deleted_by', '{{active}}', 'true'::jsonb) \
             ELSE doc - 'deleted' - 'deleted_at' - 'deleted_by' END \
             WHERE {}",
            conditions.where_sql()
        ),
        args: conditions.args,
    }
}

/// Compiles an aggregation pipeline.
///
/// Match stages are ANDed, sorts apply in order, skips add up and the
/// smallest limit wins. Live documents in the tenant scope only.
pub fn aggregate(
    collection: &str,
    tenant: Option<Uuid>,
    stages: &[PipelineStage],
) -> AppResult<Query> {
    let mut conditions = Conditions::new(collection)
        .tenant(tenant)
        .deleted(Deleted::Exclude);
    let mut order: Vec<String> = Vec::new();
    let mut skip: u64 = 0;
    let mut limit: Option<u64> = None;

    for stage in stages {
        match stage {
            PipelineStage::Match(filters) => conditions = conditions.filters(filters),
            PipelineStage::Sort { field, descending } => {
                if !is_valid_field_name(field) {
                    return Err(AppError::validation("Invalid sort field"));
                }
                let direction = if *descending { "DESC" } else { "ASC" };
                if field == "_id" {
                    order.push(format!("id {direction}"));
                } else {
                    let n = conditions.bind(QueryArg::TextArray(path(field)));
                    order.push(format!("doc #> ${n}::text[] {direction}"));
                }
            }
            PipelineStage::Skip(n) => skip = skip.saturating_add(*n),
            PipelineStage::Limit(n) => limit = Some(limit.map_or(*n, |current| current.min(*n))),
        }
    }

    order.push(DEFAULT_ORDER.to_string());
    let mut sql = format!(
        "SELECT doc FROM documents WHERE {} ORDER BY {}",
        conditions.where_sql(),
        order.join(", ")
    );
    if let Some(limit) = limit {
        let n = conditions.bind(QueryArg::BigInt(i64::try_from(limit).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" LIMIT ${n}"));
    }
    if skip > 0 {
        let n = conditions.bind(QueryArg::BigInt(i64::try_from(skip).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" OFFSET ${n}"));
    }

    Ok(Query {
        sql,
        args: conditions.args,
    })
}
