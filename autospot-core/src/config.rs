use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    pub session_db: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            session_db: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the backend settings through `lookup`, so callers (and tests)
    /// can supply something other than the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let first_of = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };

        let url = first_of(&["SUPABASE_URL", "EXPO_PUBLIC_SUPABASE_URL"])
            .ok_or_else(|| Error::Config("SUPABASE_URL is not set".into()))?;
        let anon_key = first_of(&["SUPABASE_ANON_KEY", "EXPO_PUBLIC_SUPABASE_ANON_KEY"])
            .ok_or_else(|| Error::Config("SUPABASE_ANON_KEY is not set".into()))?;

        let timeout_secs = match lookup("AUTOSPOT_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("AUTOSPOT_HTTP_TIMEOUT_SECS is not a number: {raw}"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let config = Self {
            url,
            anon_key,
            session_db: first_of(&["AUTOSPOT_SESSION_DB"]).map(PathBuf::from),
            timeout_secs,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(Error::Config(format!(
                "backend url must be http(s): {}",
                self.url
            )));
        }
        if self.anon_key.is_empty() {
            return Err(Error::Config("anon key is empty".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base url without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn reads_primary_names() {
        let cfg = BackendConfig::from_lookup(lookup_from(&[
            ("SUPABASE_URL", "https://demo.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]))
        .expect("config");

        assert_eq!(cfg.base_url(), "https://demo.supabase.co");
        assert_eq!(cfg.anon_key, "anon");
        assert_eq!(cfg.timeout_secs, 15);
        assert!(cfg.session_db.is_none());
    }

    #[test]
    fn falls_back_to_expo_names() {
        let cfg = BackendConfig::from_lookup(lookup_from(&[
            ("EXPO_PUBLIC_SUPABASE_URL", "https://x.supabase.co"),
            ("EXPO_PUBLIC_SUPABASE_ANON_KEY", "k"),
            ("AUTOSPOT_SESSION_DB", "/tmp/autospot/session.db"),
            ("AUTOSPOT_HTTP_TIMEOUT_SECS", "5"),
        ]))
        .expect("config");

        assert_eq!(cfg.url, "https://x.supabase.co");
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        assert_eq!(
            cfg.session_db,
            Some(PathBuf::from("/tmp/autospot/session.db"))
        );
    }

    #[test]
    fn missing_url_is_a_config_error() {
        let err = BackendConfig::from_lookup(lookup_from(&[("SUPABASE_ANON_KEY", "k")]))
            .expect_err("missing url");
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_non_http_url() {
        let err = BackendConfig::from_lookup(lookup_from(&[
            ("SUPABASE_URL", "ftp://nope"),
            ("SUPABASE_ANON_KEY", "k"),
        ]))
        .expect_err("bad scheme");
        assert!(matches!(err, Error::Config(_)));
    }
}
