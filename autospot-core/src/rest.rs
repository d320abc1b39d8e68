use crate::backend::{AuthApi, DataApi, SignUpOutcome};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::models::{Session, User, UserMetadata};
use crate::query::{literal, Query};
use chrono::Utc;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use tracing::debug;

/// The hosted backend: a PostgREST data API under `/rest/v1` and an auth API
/// under `/auth/v1`, both keyed by the project's anonymous key.
pub struct RestBackend {
    config: BackendConfig,
    http: HttpClient,
}

impl RestBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        config.validate()?;
        let http = HttpClient::builder().timeout(config.timeout()).build()?;
        Ok(Self { config, http })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.config.base_url())
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.config.base_url())
    }

    fn headers(&self, bearer: Option<&str>) -> Result<HeaderMap> {
        let token = bearer.unwrap_or(&self.config.anon_key);
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&self.config.anon_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
        Ok(headers)
    }

    fn send(&self, request: RequestBuilder) -> Result<Value> {
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(backend_error(status.as_u16(), &body));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session> {
        let request = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .headers(self.headers(None)?)
            .json(&body);
        let session: Session = serde_json::from_value(self.send(request)?)?;
        Ok(session.with_expiry_from(Utc::now()))
    }
}

impl DataApi for RestBackend {
    fn select(&self, query: &Query, bearer: Option<&str>) -> Result<Vec<Value>> {
        debug!(table = %query.table, "select");
        let request = self
            .http
            .get(self.rest_url(&query.table))
            .headers(self.headers(bearer)?)
            .query(&query.to_params());
        Ok(into_rows(self.send(request)?))
    }

    fn insert(&self, table: &str, rows: Value, bearer: Option<&str>) -> Result<Vec<Value>> {
        debug!(table, "insert");
        let request = self
            .http
            .post(self.rest_url(table))
            .headers(self.headers(bearer)?)
            .header("Prefer", "return=representation")
            .json(&rows);
        Ok(into_rows(self.send(request)?))
    }

    fn update(&self, query: &Query, patch: Value, bearer: Option<&str>) -> Result<Vec<Value>> {
        debug!(table = %query.table, "update");
        let request = self
            .http
            .patch(self.rest_url(&query.table))
            .headers(self.headers(bearer)?)
            .header("Prefer", "return=representation")
            .query(&query.filter_params())
            .json(&patch);
        Ok(into_rows(self.send(request)?))
    }
}

impl AuthApi for RestBackend {
    fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &UserMetadata,
    ) -> Result<SignUpOutcome> {
        debug!("sign up");
        let request = self
            .http
            .post(self.auth_url("signup"))
            .headers(self.headers(None)?)
            .json(&json!({
                "email": email,
                "password": password,
                "data": metadata,
            }));
        parse_sign_up(self.send(request)?)
    }

    fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        debug!("sign in with password");
        self.token_grant("password", json!({ "email": email, "password": password }))
    }

    fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        debug!("refresh session");
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
    }

    fn sign_out(&self, access_token: &str) -> Result<()> {
        debug!("sign out");
        let request = self
            .http
            .post(self.auth_url("logout"))
            .headers(self.headers(Some(access_token))?);
        self.send(request).map(|_| ())
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::Config(format!("invalid header value: {e}")))
}

fn into_rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Sign-up answers with a full session when confirmations are off, and with
/// the bare user (sometimes wrapped in `user`) when they are on.
fn parse_sign_up(value: Value) -> Result<SignUpOutcome> {
    if value.get("access_token").is_some() {
        let session: Session = serde_json::from_value(value)?;
        return Ok(SignUpOutcome::SignedIn(session.with_expiry_from(Utc::now())));
    }
    let user_value = match value.get("user") {
        Some(user) if user.is_object() => user.clone(),
        _ => value,
    };
    let user: User = serde_json::from_value(user_value)?;
    Ok(SignUpOutcome::ConfirmationRequired(user))
}

fn backend_error(status: u16, body: &str) -> Error {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|v| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str))
        })
        .map(ToString::to_string)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("backend returned status {status}")
            } else {
                body.trim().to_string()
            }
        });
    let code = parsed
        .as_ref()
        .and_then(|v| v.get("code").or_else(|| v.get("error_code")))
        .map(literal);

    Error::Backend {
        status,
        code,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgrest_error_body() {
        let err = backend_error(
            406,
            r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#,
        );
        match err {
            Error::Backend { status, code, message } => {
                assert_eq!(status, 406);
                assert_eq!(code.as_deref(), Some("PGRST116"));
                assert_eq!(message, "JSON object requested, multiple (or no) rows returned");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn auth_error_body_with_numeric_code() {
        let err = backend_error(
            400,
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        );
        match err {
            Error::Backend { code, message, .. } => {
                assert_eq!(code.as_deref(), Some("400"));
                assert_eq!(message, "Invalid login credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn plain_text_error_body() {
        let err = backend_error(502, "Bad Gateway");
        assert_eq!(err.to_string(), "Bad Gateway");
    }

    #[test]
    fn sign_up_without_session_needs_confirmation() {
        let outcome = parse_sign_up(serde_json::json!({
            "id": "u-1",
            "email": "a@b.com",
            "user_metadata": {"full_name": "Ana Lopez"}
        }))
        .expect("parse");
        match outcome {
            SignUpOutcome::ConfirmationRequired(user) => {
                assert_eq!(user.id, "u-1");
                assert_eq!(user.user_metadata.full_name.as_deref(), Some("Ana Lopez"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn sign_up_with_session_signs_in() {
        let outcome = parse_sign_up(serde_json::json!({
            "access_token": "at",
            "refresh_token": "rt",
            "expires_in": 3600,
            "user": {"id": "u-1", "email": "a@b.com"}
        }))
        .expect("parse");
        match outcome {
            SignUpOutcome::SignedIn(session) => {
                assert_eq!(session.user.id, "u-1");
                assert!(session.expires_at.is_some());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_config() {
        let result = RestBackend::new(BackendConfig::new("not-a-url", "k"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
