/// Backend access for the console
///
/// Everything durable lives behind the hosted backend. This module defines the
/// contract the console has with it: named remote procedure calls plus simple
/// table reads and writes.
///
/// # Architecture
///
/// ```text
/// models::* shims
///   └─> Backend (trait)
///         ├─> RestBackend: PostgREST-style HTTP (reqwest)
///         └─> MockBackend: in-process tables + scripted RPC handlers
/// ```
///
/// # Example
///
/// ```no_run
/// use tenantdesk_shared::backend::{self, Backend, TableQuery};
/// use tenantdesk_shared::models::tenant::Tenant;
///
/// # async fn example(backend: &dyn Backend) -> tenantdesk_shared::error::ConsoleResult<()> {
/// // Typed RPC
/// let tenants: Vec<Tenant> = backend::call_or_default(backend, "get_accessible_tenants", serde_json::json!({})).await?;
///
/// // Table read
/// let query = TableQuery::new("content_items").order("created_at", false).limit(10);
/// let rows = backend.select(&query).await?;
/// # Ok(())
/// # }
/// ```

pub mod mock;
pub mod rest;

use crate::error::{ConsoleError, ConsoleResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub use mock::MockBackend;
pub use rest::RestBackend;

/// Identity of the signed-in user as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// User ID
    pub id: Uuid,

    /// Sign-in email
    pub email: String,
}

/// Filter operators supported by table queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Column equals value
    Eq,

    /// Column is one of the values
    In,

    /// Column is greater than or equal to value
    Gte,
}

/// A single column filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    /// Column name
    pub column: String,

    /// Operator
    pub op: FilterOp,

    /// Operand(s), already rendered as strings
    pub values: Vec<String>,
}

impl Filter {
    /// Renders the filter as a query-string value (`eq.x`, `in.(a,b)`, `gte.x`)
    pub fn render(&self) -> String {
        match self.op {
            FilterOp::Eq => format!("eq.{}", self.values.first().map(String::as_str).unwrap_or("")),
            FilterOp::Gte => format!("gte.{}", self.values.first().map(String::as_str).unwrap_or("")),
            FilterOp::In => {
                let items: Vec<String> = self.values.iter().map(|v| quote_list_item(v)).collect();
                format!("in.({})", items.join(","))
            }
        }
    }

    /// Evaluates the filter against a JSON row
    ///
    /// Values are compared in their string form, which is how they travel on
    /// the wire. `Gte` compares lexicographically; RFC 3339 timestamps in the
    /// same offset order correctly that way.
    pub fn matches(&self, row: &JsonValue) -> bool {
        let Some(cell) = row.get(&self.column).and_then(cell_as_string) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => self.values.first().map_or(false, |v| *v == cell),
            FilterOp::In => self.values.iter().any(|v| *v == cell),
            FilterOp::Gte => self.values.first().map_or(false, |v| cell.as_str() >= v.as_str()),
        }
    }
}

fn quote_list_item(value: &str) -> String {
    if value.contains([',', '(', ')', '"']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

fn cell_as_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Ordering clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Column to order by
    pub column: String,

    /// Ascending when true
    pub ascending: bool,
}

/// Description of a table read/update/delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    /// Table name
    pub table: String,

    /// Column list (PostgREST `select`), `*` by default
    pub columns: String,

    /// Filters, AND-ed together
    pub filters: Vec<Filter>,

    /// Optional ordering
    pub order: Option<Order>,

    /// Optional row limit
    pub limit: Option<usize>,
}

impl TableQuery {
    /// Starts a query on `table` selecting all columns
    pub fn new(table: impl Into<String>) -> Self {
        TableQuery {
            table: table.into(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Sets the column list
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    /// Adds an equality filter
    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: FilterOp::Eq,
            values: vec![value.to_string()],
        });
        self
    }

    /// Adds a membership filter
    pub fn in_list<I, V>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.filters.push(Filter {
            column: column.into(),
            op: FilterOp::In,
            values: values.into_iter().map(|v| v.to_string()).collect(),
        });
        self
    }

    /// Adds a greater-than-or-equal filter
    pub fn gte(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: FilterOp::Gte,
            values: vec![value.to_string()],
        });
        self
    }

    /// Orders the result
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Limits the number of rows
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Renders the query-string pairs for a PostgREST request
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.columns.clone())];
        for filter in &self.filters {
            pairs.push((filter.column.clone(), filter.render()));
        }
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            pairs.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }

    /// Whether every filter matches the row
    pub fn matches(&self, row: &JsonValue) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}

/// Contract with the hosted backend
///
/// Implementations must be cheap to share across tasks; the console holds
/// one instance behind an `Arc` for the lifetime of a session.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Invokes a named remote procedure
    ///
    /// `params` is a JSON object of `p_*` arguments. The raw JSON result is
    /// returned; `null` means the procedure returned nothing.
    async fn rpc(&self, name: &str, params: JsonValue) -> ConsoleResult<JsonValue>;

    /// Reads rows from a table
    async fn select(&self, query: &TableQuery) -> ConsoleResult<Vec<JsonValue>>;

    /// Inserts a row and returns it as stored
    async fn insert(&self, table: &str, row: JsonValue) -> ConsoleResult<JsonValue>;

    /// Updates matching rows and returns them as stored
    async fn update(&self, query: &TableQuery, changes: JsonValue) -> ConsoleResult<Vec<JsonValue>>;

    /// Deletes matching rows
    async fn delete(&self, query: &TableQuery) -> ConsoleResult<()>;

    /// The signed-in user, if any
    fn current_user(&self) -> Option<AuthUser>;
}

/// Calls a remote procedure and decodes its result
pub async fn call<T: DeserializeOwned>(
    backend: &dyn Backend,
    name: &str,
    params: JsonValue,
) -> ConsoleResult<T> {
    let value = backend.rpc(name, params).await?;
    Ok(serde_json::from_value(value)?)
}

/// Calls a remote procedure, mapping a `null` result to `T::default()`
pub async fn call_or_default<T: DeserializeOwned + Default>(
    backend: &dyn Backend,
    name: &str,
    params: JsonValue,
) -> ConsoleResult<T> {
    let value = backend.rpc(name, params).await?;
    if value.is_null() {
        return Ok(T::default());
    }
    Ok(serde_json::from_value(value)?)
}

/// Reads and decodes all rows matching a query
pub async fn fetch_all<T: DeserializeOwned>(
    backend: &dyn Backend,
    query: &TableQuery,
) -> ConsoleResult<Vec<T>> {
    backend
        .select(query)
        .await?
        .into_iter()
        .map(|row| serde_json::from_value(row).map_err(ConsoleError::from))
        .collect()
}

/// Reads exactly one row, failing with `NotFound(what)` when there is none
pub async fn fetch_one<T: DeserializeOwned>(
    backend: &dyn Backend,
    query: &TableQuery,
    what: &str,
) -> ConsoleResult<T> {
    let row = backend
        .select(&query.clone().limit(1))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ConsoleError::NotFound(what.to_string()))?;
    Ok(serde_json::from_value(row)?)
}

/// Returns the signed-in user or `NotAuthenticated`
pub fn require_user(backend: &dyn Backend) -> ConsoleResult<AuthUser> {
    backend.current_user().ok_or(ConsoleError::NotAuthenticated)
}

#[derive(Deserialize)]
struct ProfileTenant {
    tenant_id: Option<Uuid>,
}

/// Looks up the tenant of the signed-in user via `user_profiles`
///
/// # Errors
///
/// - `NotAuthenticated` when nobody is signed in
/// - `MissingTenant` when the profile has no tenant
pub async fn current_tenant_id(backend: &dyn Backend) -> ConsoleResult<Uuid> {
    let user = require_user(backend)?;
    let query = TableQuery::new("user_profiles")
        .select("tenant_id")
        .eq("id", user.id);

    let profile: Option<ProfileTenant> = match fetch_one(backend, &query, "User profile").await {
        Ok(profile) => Some(profile),
        Err(err) if err.is_not_found() => None,
        Err(err) => return Err(err),
    };

    profile
        .and_then(|p| p.tenant_id)
        .ok_or(ConsoleError::MissingTenant)
}
