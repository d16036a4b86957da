/// In-process backend for tests and offline runs
///
/// `MockBackend` keeps tables as vectors of JSON rows and answers remote
/// procedure calls through handlers registered with [`MockBackend::on_rpc`].
/// Every call is recorded so tests can assert on exactly what the console
/// asked the backend to do.
///
/// Unregistered procedures fail the way PostgREST does for an unknown
/// function (`PGRST202`).
///
/// # Example
///
/// ```
/// use tenantdesk_shared::backend::{Backend, MockBackend};
/// use serde_json::json;
///
/// # async fn example() -> tenantdesk_shared::error::ConsoleResult<()> {
/// let backend = MockBackend::new();
/// backend.on_rpc("create_tenant", |params| Ok(json!({"name": params["p_name"]})));
///
/// let result = backend.rpc("create_tenant", json!({"p_name": "Acme"})).await?;
/// assert_eq!(result["name"], "Acme");
/// assert_eq!(backend.rpc_calls("create_tenant").len(), 1);
/// # Ok(())
/// # }
/// ```

use crate::auth::session::{AuthProvider, AuthSession};
use crate::backend::{AuthUser, Backend, TableQuery};
use crate::error::{ConsoleError, ConsoleResult};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Handler for a scripted remote procedure
pub type RpcHandler = Arc<dyn Fn(&JsonValue) -> ConsoleResult<JsonValue> + Send + Sync>;

/// A call observed by the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    /// `rpc(name, params)`
    Rpc { name: String, params: JsonValue },

    /// `select` on a table
    Select { table: String },

    /// `insert` into a table
    Insert { table: String, row: JsonValue },

    /// `update` on a table
    Update { table: String, changes: JsonValue },

    /// `delete` on a table
    Delete { table: String },

    /// Any auth provider call, by operation name
    Auth { operation: String },
}

#[derive(Default)]
struct MockState {
    tables: HashMap<String, Vec<JsonValue>>,
    handlers: HashMap<String, RpcHandler>,
    calls: Vec<RecordedCall>,
    user: Option<AuthUser>,
    accounts: HashMap<String, (String, AuthUser)>,
}

/// In-memory backend
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Creates an empty backend with nobody signed in
    pub fn new() -> Self {
        Self::default()
    }

    /// Signs `user` in
    pub fn with_user(self, user: AuthUser) -> Self {
        self.lock().user = Some(user);
        self
    }

    /// Registers an account that can sign in with `password`
    pub fn with_account(self, email: &str, password: &str) -> Self {
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        self.with_account_for(user, password)
    }

    /// Registers `user` as an account that can sign in with `password`
    pub fn with_account_for(self, user: AuthUser, password: &str) -> Self {
        self.lock()
            .accounts
            .insert(user.email.clone(), (password.to_string(), user));
        self
    }

    /// Appends rows to a table
    pub fn seed(&self, table: &str, rows: Vec<JsonValue>) {
        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Registers a handler for a remote procedure, replacing any previous one
    pub fn on_rpc<F>(&self, name: &str, handler: F)
    where
        F: Fn(&JsonValue) -> ConsoleResult<JsonValue> + Send + Sync + 'static,
    {
        self.lock().handlers.insert(name.to_string(), Arc::new(handler));
    }

    /// All recorded calls, oldest first
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Parameters of every call to the named procedure, oldest first
    pub fn rpc_calls(&self, name: &str) -> Vec<JsonValue> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RecordedCall::Rpc { name: n, params } if n == name => Some(params.clone()),
                _ => None,
            })
            .collect()
    }

    /// Current contents of a table
    pub fn rows(&self, table: &str) -> Vec<JsonValue> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Applies `edit` to every row matching `query`; returns how many matched
    ///
    /// Not recorded as a call. Meant for procedure handlers that change rows.
    pub fn edit_rows<F>(&self, query: &TableQuery, mut edit: F) -> usize
    where
        F: FnMut(&mut JsonValue),
    {
        let mut state = self.lock();
        let Some(rows) = state.tables.get_mut(&query.table) else {
            return 0;
        };
        let mut matched = 0;
        for row in rows.iter_mut().filter(|row| query.matches(row)) {
            edit(row);
            matched += 1;
        }
        matched
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panic while holding the lock only happens inside a failing test
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, call: RecordedCall) {
        self.lock().calls.push(call);
    }
}

fn sort_rows(rows: &mut [JsonValue], column: &str, ascending: bool) {
    rows.sort_by(|a, b| {
        let left = a.get(column).map(|v| v.to_string()).unwrap_or_default();
        let right = b.get(column).map(|v| v.to_string()).unwrap_or_default();
        if ascending {
            left.cmp(&right)
        } else {
            right.cmp(&left)
        }
    });
}

fn merge(target: &mut JsonValue, changes: &JsonValue) {
    if let (Some(target), Some(changes)) = (target.as_object_mut(), changes.as_object()) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn rpc(&self, name: &str, params: JsonValue) -> ConsoleResult<JsonValue> {
        self.record(RecordedCall::Rpc {
            name: name.to_string(),
            params: params.clone(),
        });

        let handler = self.lock().handlers.get(name).cloned();
        match handler {
            Some(handler) => handler(&params),
            None => Err(ConsoleError::Backend {
                code: Some("PGRST202".to_string()),
                message: format!("Could not find the function public.{}", name),
            }),
        }
    }

    async fn select(&self, query: &TableQuery) -> ConsoleResult<Vec<JsonValue>> {
        self.record(RecordedCall::Select {
            table: query.table.clone(),
        });

        let mut rows: Vec<JsonValue> = self
            .lock()
            .tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|row| query.matches(row)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            sort_rows(&mut rows, &order.column, order.ascending);
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, mut row: JsonValue) -> ConsoleResult<JsonValue> {
        self.record(RecordedCall::Insert {
            table: table.to_string(),
            row: row.clone(),
        });

        let object = row
            .as_object_mut()
            .ok_or_else(|| ConsoleError::Validation("row must be a JSON object".to_string()))?;
        object
            .entry("id")
            .or_insert_with(|| JsonValue::String(Uuid::new_v4().to_string()));
        let now = JsonValue::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true));
        object.entry("created_at").or_insert_with(|| now.clone());
        object.entry("updated_at").or_insert(now);

        self.lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(&self, query: &TableQuery, changes: JsonValue) -> ConsoleResult<Vec<JsonValue>> {
        self.record(RecordedCall::Update {
            table: query.table.clone(),
            changes: changes.clone(),
        });

        let mut state = self.lock();
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(&query.table) {
            for row in rows.iter_mut().filter(|row| query.matches(row)) {
                merge(row, &changes);
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, query: &TableQuery) -> ConsoleResult<()> {
        self.record(RecordedCall::Delete {
            table: query.table.clone(),
        });

        if let Some(rows) = self.lock().tables.get_mut(&query.table) {
            rows.retain(|row| !query.matches(row));
        }
        Ok(())
    }

    fn current_user(&self) -> Option<AuthUser> {
        self.lock().user.clone()
    }
}

#[async_trait]
impl AuthProvider for MockBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> ConsoleResult<AuthSession> {
        self.record(RecordedCall::Auth {
            operation: "sign_in".to_string(),
        });

        let account = self.lock().accounts.get(email).cloned();
        match account {
            Some((expected, user)) if expected == password => {
                self.lock().user = Some(user.clone());
                Ok(AuthSession {
                    access_token: format!("mock-token-{}", user.id),
                    refresh_token: None,
                    expires_in: Some(3600),
                    user,
                })
            }
            _ => Err(ConsoleError::Backend {
                code: Some("invalid_credentials".to_string()),
                message: "Invalid login credentials".to_string(),
            }),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> ConsoleResult<Option<AuthUser>> {
        self.record(RecordedCall::Auth {
            operation: "sign_up".to_string(),
        });

        let mut state = self.lock();
        if state.accounts.contains_key(email) {
            return Err(ConsoleError::Backend {
                code: Some("user_already_exists".to_string()),
                message: "User already registered".to_string(),
            });
        }
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        state
            .accounts
            .insert(email.to_string(), (password.to_string(), user.clone()));
        Ok(Some(user))
    }

    async fn sign_out(&self) -> ConsoleResult<()> {
        self.record(RecordedCall::Auth {
            operation: "sign_out".to_string(),
        });
        self.lock().user = None;
        Ok(())
    }

    async fn reset_password_for_email(
        &self,
        _email: &str,
        _redirect_to: Option<&str>,
    ) -> ConsoleResult<()> {
        self.record(RecordedCall::Auth {
            operation: "reset_password".to_string(),
        });
        Ok(())
    }
}
