//! An in-process backend.
//!
//! Holds every table as a list of JSON rows and answers the same query
//! subset the client sends to the hosted backend: equality filters, one
//! ordering column, a limit, and `alias:table(columns)` embeds resolved
//! through the row's `<alias>_id` column. Sign-up creates the `profiles`
//! row the hosted backend creates with a trigger. Used by the demo mode and
//! by tests.

use crate::backend::{AuthApi, DataApi, SignUpOutcome};
use crate::error::{Error, Result};
use crate::models::{Session, User, UserMetadata};
use crate::query::{literal, parse_columns, Column, Direction, Query};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

const TOKEN_TTL_SECS: i64 = 3600;

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<String, Vec<Value>>,
    accounts: Vec<Account>,
    /// access token -> user id
    access_tokens: HashMap<String, String>,
    /// refresh token -> user id
    refresh_tokens: HashMap<String, String>,
    failing_tables: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    require_confirmation: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign-up returns no session, as when the project requires email
    /// confirmation.
    pub fn with_email_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| Error::Transport("memory backend lock poisoned".into()))
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) -> Result<()> {
        let mut state = self.state()?;
        let stored = state.tables.entry(table.to_string()).or_default();
        for row in rows {
            stored.push(with_defaults(row)?);
        }
        Ok(())
    }

    /// A copy of every row currently in `table`.
    pub fn rows(&self, table: &str) -> Result<Vec<Value>> {
        Ok(self.state()?.tables.get(table).cloned().unwrap_or_default())
    }

    /// Makes every select on `table` fail with `message` until cleared.
    pub fn fail_reads(&self, table: &str, message: &str) -> Result<()> {
        self.state()?
            .failing_tables
            .insert(table.to_string(), message.to_string());
        Ok(())
    }

    pub fn clear_failures(&self) -> Result<()> {
        self.state()?.failing_tables.clear();
        Ok(())
    }

    pub fn set_role(&self, user_id: &str, role: &str) -> Result<()> {
        let mut state = self.state()?;
        let profiles = state.tables.entry("profiles".into()).or_default();
        match profiles
            .iter_mut()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(user_id))
        {
            Some(row) => {
                row["role"] = Value::String(role.to_string());
            }
            None => profiles.push(serde_json::json!({ "id": user_id, "role": role })),
        }
        Ok(())
    }

    fn issue_session(state: &mut MemoryState, user: &User) -> Session {
        let access_token = uuid::Uuid::new_v4().to_string();
        let refresh_token = uuid::Uuid::new_v4().to_string();
        state
            .access_tokens
            .insert(access_token.clone(), user.id.clone());
        state
            .refresh_tokens
            .insert(refresh_token.clone(), user.id.clone());

        Session {
            access_token,
            refresh_token,
            token_type: "bearer".into(),
            expires_in: Some(TOKEN_TTL_SECS),
            expires_at: Some(Utc::now().timestamp() + TOKEN_TTL_SECS),
            user: user.clone(),
        }
    }
}

impl DataApi for MemoryBackend {
    fn select(&self, query: &Query, _bearer: Option<&str>) -> Result<Vec<Value>> {
        let state = self.state()?;
        if let Some(message) = state.failing_tables.get(&query.table) {
            return Err(backend_error(500, message));
        }

        let mut rows: Vec<&Value> = state
            .tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|row| matches_filters(row, query)).collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        let columns = parse_columns(&query.columns);
        Ok(rows
            .into_iter()
            .map(|row| project(&state.tables, row, &columns))
            .collect())
    }

    fn insert(&self, table: &str, rows: Value, _bearer: Option<&str>) -> Result<Vec<Value>> {
        let rows = match rows {
            Value::Array(rows) => rows,
            Value::Object(_) => vec![rows],
            _ => return Err(backend_error(400, "insert body must be an object or array")),
        };

        let mut state = self.state()?;
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            inserted.push(with_defaults(row)?);
        }
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(inserted.iter().cloned());
        Ok(inserted)
    }

    fn update(&self, query: &Query, patch: Value, _bearer: Option<&str>) -> Result<Vec<Value>> {
        let Value::Object(patch) = patch else {
            return Err(backend_error(400, "update body must be an object"));
        };

        let mut state = self.state()?;
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(&query.table) {
            for row in rows.iter_mut().filter(|row| matches_filters(row, query)) {
                if let Value::Object(fields) = row {
                    for (key, value) in &patch {
                        fields.insert(key.clone(), value.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }
}

impl AuthApi for MemoryBackend {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &UserMetadata,
    ) -> Result<SignUpOutcome> {
        let mut state = self.state()?;
        if state
            .accounts
            .iter()
            .any(|a| a.user.email.as_deref() == Some(email))
        {
            return Err(backend_error(422, "User already registered"));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            user_metadata: metadata.clone(),
        };
        state.accounts.push(Account {
            user: user.clone(),
            password: password.to_string(),
        });
        state
            .tables
            .entry("profiles".into())
            .or_default()
            .push(serde_json::json!({ "id": user.id, "role": "client" }));

        if self.require_confirmation {
            return Ok(SignUpOutcome::ConfirmationRequired(user));
        }
        Ok(SignUpOutcome::SignedIn(Self::issue_session(&mut state, &user)))
    }

    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let mut state = self.state()?;
        let user = state
            .accounts
            .iter()
            .find(|a| a.user.email.as_deref() == Some(email) && a.password == password)
            .map(|a| a.user.clone())
            .ok_or_else(|| backend_error(400, "Invalid login credentials"))?;
        Ok(Self::issue_session(&mut state, &user))
    }

    fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let mut state = self.state()?;
        let user_id = state
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| backend_error(400, "Invalid Refresh Token: Refresh Token Not Found"))?;
        let user = state
            .accounts
            .iter()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone())
            .ok_or_else(|| backend_error(404, "User not found"))?;
        Ok(Self::issue_session(&mut state, &user))
    }

    fn sign_out(&self, access_token: &str) -> Result<()> {
        let mut state = self.state()?;
        if let Some(user_id) = state.access_tokens.remove(access_token) {
            state.refresh_tokens.retain(|_, owner| *owner != user_id);
        }
        Ok(())
    }
}

fn backend_error(status: u16, message: &str) -> Error {
    Error::Backend {
        status,
        code: None,
        message: message.to_string(),
    }
}

fn with_defaults(row: Value) -> Result<Value> {
    let Value::Object(mut fields) = row else {
        return Err(backend_error(400, "rows must be objects"));
    };
    fields
        .entry("id")
        .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
    fields.entry("created_at").or_insert_with(|| {
        Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false))
    });
    Ok(Value::Object(fields))
}

fn matches_filters(row: &Value, query: &Query) -> bool {
    query.filters.iter().all(|f| {
        let actual = row.get(&f.column).unwrap_or(&Value::Null);
        literal(actual) == literal(&f.value)
    })
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn project(tables: &BTreeMap<String, Vec<Value>>, row: &Value, columns: &[Column]) -> Value {
    let mut out = Map::new();
    for column in columns {
        match column {
            Column::All => {
                if let Value::Object(fields) = row {
                    out.extend(fields.clone());
                }
            }
            Column::Named(name) => {
                out.insert(
                    name.clone(),
                    row.get(name).cloned().unwrap_or(Value::Null),
                );
            }
            Column::Embed {
                alias,
                table,
                columns,
            } => {
                let fk = row.get(format!("{alias}_id")).unwrap_or(&Value::Null);
                let embedded = if fk.is_null() {
                    Value::Null
                } else {
                    tables
                        .get(table)
                        .and_then(|rows| {
                            rows.iter().find(|candidate| {
                                candidate.get("id").map(literal) == Some(literal(fk))
                            })
                        })
                        .map(|target| project(tables, target, &parse_columns(columns)))
                        .unwrap_or(Value::Null)
                };
                out.insert(alias.clone(), embedded);
            }
        }
    }
    Value::Object(out)
}
