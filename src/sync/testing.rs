//! In-memory stand-ins for the identity provider and the data store.
//! Both count calls so tests can prove that rejected input never left the client.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::database::models::{AccessToken, CostCategory, Identity, Session};
use crate::error::{ProviderError, StoreError};
use crate::sync::contract::{
    DataStore, Direction, IdentityProvider, Record, Select, VerificationKind,
};

fn rejected(status: u16, code: &str, message: &str) -> ProviderError {
    ProviderError::Rejected {
        status,
        code: code.into(),
        message: message.into(),
    }
}

struct FakeAccount {
    identity: Identity,
    password: String,
    confirmed: bool,
}

pub struct FakeIdentity {
    accounts: Mutex<HashMap<String, FakeAccount>>,
    tokens: Mutex<HashMap<String, String>>, // access or verification token -> email
    stored: Mutex<Option<Session>>,
    hang_recovery: bool,
    calls: AtomicUsize,
    sign_outs: AtomicUsize,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            tokens: Mutex::new(HashMap::new()),
            stored: Mutex::new(None),
            hang_recovery: false,
            calls: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
        }
    }

    /// Session recovery never completes.
    pub fn hanging() -> Self {
        Self {
            hang_recovery: true,
            ..Self::new()
        }
    }

    pub fn with_account(self, email: &str, password: &str, confirmed: bool) -> Self {
        self.accounts.lock().unwrap().insert(
            email.to_string(),
            FakeAccount {
                identity: Self::identity_for(email),
                password: password.to_string(),
                confirmed,
            },
        );
        self
    }

    pub fn with_stored_session(self, session: Session) -> Self {
        *self.stored.lock().unwrap() = Some(session);
        self
    }

    pub fn identity_for(email: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: None,
            role: "viewer".into(),
            email_confirmed_at: Some(Utc::now()),
        }
    }

    pub fn session_for(email: &str) -> Session {
        Session {
            access_token: AccessToken::new(Uuid::new_v4().simple().to_string()),
            expires_at: Utc::now() + Duration::hours(1),
            user: Self::identity_for(email),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    /// The pending confirmation token issued for `email`, as if read from the inbox.
    pub fn confirmation_token(&self, email: &str) -> Option<String> {
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .find(|(token, owner)| token.starts_with("confirm-") && owner.as_str() == email)
            .map(|(token, _)| token.clone())
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn issue(&self, identity: &Identity) -> Session {
        let token = format!("access-{}", Uuid::new_v4().simple());
        self.tokens
            .lock()
            .unwrap()
            .insert(token.clone(), identity.email.clone());
        Session {
            access_token: AccessToken::new(token),
            expires_at: Utc::now() + Duration::hours(1),
            user: identity.clone(),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, ProviderError> {
        self.hit();
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(email) {
            return Err(rejected(409, "user_already_exists", "User already registered"));
        }
        let mut identity = Self::identity_for(email);
        identity.display_name = display_name.map(str::to_string);
        identity.email_confirmed_at = None;
        accounts.insert(
            email.to_string(),
            FakeAccount {
                identity: identity.clone(),
                password: password.to_string(),
                confirmed: false,
            },
        );
        self.tokens
            .lock()
            .unwrap()
            .insert(format!("confirm-{}", Uuid::new_v4().simple()), email.to_string());
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ProviderError> {
        self.hit();
        let identity = {
            let accounts = self.accounts.lock().unwrap();
            match accounts.get(email) {
                Some(account) if account.password == password => {
                    if !account.confirmed {
                        return Err(rejected(400, "email_not_confirmed", "Email not confirmed"));
                    }
                    account.identity.clone()
                }
                _ => {
                    return Err(rejected(400, "invalid_credentials", "Invalid login credentials"))
                }
            }
        };
        Ok(self.issue(&identity))
    }

    async fn sign_out(&self, token: &AccessToken) -> Result<(), ProviderError> {
        self.hit();
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().unwrap().remove(token.as_str());
        Ok(())
    }

    async fn get_session(&self) -> Result<Option<Session>, ProviderError> {
        self.hit();
        if self.hang_recovery {
            return std::future::pending().await;
        }
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn verify(&self, token: &str, _kind: VerificationKind) -> Result<Session, ProviderError> {
        self.hit();
        let email = self
            .tokens
            .lock()
            .unwrap()
            .remove(token)
            .ok_or_else(|| rejected(400, "otp_expired", "Token has expired or is invalid"))?;
        let identity = {
            let mut accounts = self.accounts.lock().unwrap();
            let account = accounts
                .get_mut(&email)
                .ok_or_else(|| rejected(404, "user_not_found", "User not found"))?;
            account.confirmed = true;
            account.identity.email_confirmed_at = Some(Utc::now());
            account.identity.clone()
        };
        Ok(self.issue(&identity))
    }

    async fn reset_password(&self, _email: &str) -> Result<(), ProviderError> {
        self.hit();
        Ok(())
    }

    async fn update_password(
        &self,
        token: &AccessToken,
        password: &str,
    ) -> Result<Identity, ProviderError> {
        self.hit();
        let email = self
            .tokens
            .lock()
            .unwrap()
            .get(token.as_str())
            .cloned()
            .ok_or_else(|| rejected(401, "invalid_token", "Invalid token"))?;
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts
            .get_mut(&email)
            .ok_or_else(|| rejected(404, "user_not_found", "User not found"))?;
        account.password = password.to_string();
        Ok(account.identity.clone())
    }

    async fn resend_confirmation(&self, _email: &str) -> Result<(), ProviderError> {
        self.hit();
        Ok(())
    }
}

/// Table store over JSON rows. Deleting a project cascades to its cost entries,
/// like the hosted store does.
pub struct MemoryStore {
    tables: Mutex<HashMap<&'static str, Vec<Value>>>,
    cascades: Vec<(&'static str, &'static str, &'static str)>,
    clock: AtomicI64,
    calls: AtomicUsize,
    fail_next: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            cascades: vec![("projects", "cost_entries", "project_id")],
            clock: AtomicI64::new(0),
            calls: AtomicUsize::new(0),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn with_categories(self, categories: &[CostCategory]) -> Self {
        let rows = categories
            .iter()
            .map(|category| serde_json::to_value(category).unwrap())
            .collect();
        self.tables
            .lock()
            .unwrap()
            .insert(CostCategory::TABLE, rows);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes the next call fail with a transport error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Transport("connection reset by peer".into()));
        }
        Ok(())
    }

    // Strictly increasing timestamps keep newest-first ordering deterministic.
    fn tick(&self) -> String {
        let step = self.clock.fetch_add(1, Ordering::SeqCst);
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        (base + Duration::seconds(step)).to_rfc3339()
    }
}

fn matches(row: &Value, column: &str, expected: &str) -> bool {
    match row.get(column) {
        Some(Value::String(actual)) => actual == expected,
        Some(Value::Null) | None => false,
        Some(other) => other.to_string() == expected,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => {
            if let (Ok(a), Ok(b)) = (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                return a.cmp(&b);
            }
            if let (Ok(a), Ok(b)) = (Decimal::from_str(a), Decimal::from_str(b)) {
                return a.cmp(&b);
            }
            a.cmp(b)
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(CmpOrdering::Equal),
        (None, Some(_)) => CmpOrdering::Less,
        (Some(_), None) => CmpOrdering::Greater,
        _ => CmpOrdering::Equal,
    }
}

fn object(value: Value) -> Result<Map<String, Value>, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Decode(format!("expected an object, got {other}"))),
    }
}

fn not_found() -> StoreError {
    StoreError::Rejected {
        status: 404,
        code: "not_found".into(),
        message: "row not found".into(),
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select<R: Record>(
        &self,
        _token: &AccessToken,
        query: &Select,
    ) -> Result<Vec<R>, StoreError> {
        self.enter()?;
        let tables = self.tables.lock().unwrap();
        let mut rows: Vec<Value> = tables
            .get(R::TABLE)
            .into_iter()
            .flatten()
            .filter(|row| {
                query
                    .filters()
                    .iter()
                    .all(|(column, value)| matches(row, column, value))
            })
            .cloned()
            .collect();
        if let Some(order) = query.order() {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(order.column), b.get(order.column));
                match order.direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(|e| StoreError::Decode(e.to_string())))
            .collect()
    }

    async fn insert<R: Record, I: Serialize + Sync>(
        &self,
        _token: &AccessToken,
        row: &I,
    ) -> Result<R, StoreError> {
        self.enter()?;
        let mut fields =
            object(serde_json::to_value(row).map_err(|e| StoreError::Decode(e.to_string()))?)?;
        let now = self.tick();
        fields
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(now.clone()));
        fields.insert("updated_at".into(), Value::String(now));

        let record: R = serde_json::from_value(Value::Object(fields))
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let stored = serde_json::to_value(&record).map_err(|e| StoreError::Decode(e.to_string()))?;
        self.tables
            .lock()
            .unwrap()
            .entry(R::TABLE)
            .or_default()
            .push(stored);
        Ok(record)
    }

    async fn update<R: Record, P: Serialize + Sync>(
        &self,
        _token: &AccessToken,
        id: &str,
        patch: &P,
    ) -> Result<R, StoreError> {
        self.enter()?;
        let changes =
            object(serde_json::to_value(patch).map_err(|e| StoreError::Decode(e.to_string()))?)?;
        let now = self.tick();
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .get_mut(R::TABLE)
            .and_then(|rows| rows.iter_mut().find(|row| matches(row, "id", id)))
            .ok_or_else(not_found)?;
        if let Value::Object(fields) = row {
            for (key, value) in changes {
                fields.insert(key, value);
            }
            fields.insert("updated_at".into(), Value::String(now));
        }
        serde_json::from_value(row.clone()).map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn delete<R: Record>(&self, _token: &AccessToken, id: &str) -> Result<(), StoreError> {
        self.enter()?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.get_mut(R::TABLE).ok_or_else(not_found)?;
        let before = rows.len();
        rows.retain(|row| !matches(row, "id", id));
        if rows.len() == before {
            return Err(not_found());
        }
        for (parent, child, column) in &self.cascades {
            if *parent == R::TABLE {
                if let Some(children) = tables.get_mut(child) {
                    children.retain(|row| !matches(row, column, id));
                }
            }
        }
        Ok(())
    }
}

pub fn categories() -> Vec<CostCategory> {
    [
        ("equipment", "Equipment"),
        ("labor", "Labor"),
        ("materials", "Materials"),
    ]
    .into_iter()
    .map(|(id, name)| CostCategory {
        id: id.into(),
        name: name.into(),
        icon: id.into(),
        color: "blue".into(),
        created_at: None,
    })
    .collect()
}
