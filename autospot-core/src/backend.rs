use crate::error::Result;
use crate::models::{Session, User, UserMetadata};
use crate::query::Query;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Row access on the backend's tables. `bearer` is the signed-in user's
/// access token; `None` means the request goes out with the anonymous key.
pub trait DataApi: Send + Sync + 'static {
    fn select(&self, query: &Query, bearer: Option<&str>) -> Result<Vec<Value>>;

    /// Inserts `rows` (an object or an array of objects) and returns the
    /// inserted representation.
    fn insert(&self, table: &str, rows: Value, bearer: Option<&str>) -> Result<Vec<Value>>;

    /// Applies `patch` to every row matching the query's filters and returns
    /// the updated rows.
    fn update(&self, query: &Query, patch: Value, bearer: Option<&str>) -> Result<Vec<Value>>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum SignUpOutcome {
    /// The backend signed the new user in right away.
    SignedIn(Session),
    /// The account exists but must be confirmed before it can sign in.
    ConfirmationRequired(User),
}

pub trait AuthApi: Send + Sync + 'static {
    fn sign_up(&self, email: &str, password: &str, metadata: &UserMetadata)
        -> Result<SignUpOutcome>;

    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    fn refresh_session(&self, refresh_token: &str) -> Result<Session>;

    fn sign_out(&self, access_token: &str) -> Result<()>;
}

pub trait Backend: DataApi + AuthApi {}

impl<T: DataApi + AuthApi> Backend for T {}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(Into::into))
        .collect()
}

pub fn first_row<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Option<T>> {
    rows.into_iter()
        .next()
        .map(serde_json::from_value)
        .transpose()
        .map_err(Into::into)
}
