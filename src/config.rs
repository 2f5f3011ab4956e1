//! Session configuration and its backing key-value store.
//!
//! The store stands in for the browser-side local storage the credential is
//! issued into: a flat JSON object on disk. This core only ever writes the
//! environment preference back; the credential entry is read-only here.
use crate::error::{QueryError, QueryResult};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Storage key holding the bearer credential.
pub const TOKEN_KEY: &str = "euisToken";
/// Storage key holding the selected environment.
pub const ENV_KEY: &str = "kqt_environment";

pub const UAT_URL: &str = "https://euisv-uat.apps.tocp4.kgilife.com.tw/euisw/euisb/api/caseQuery/query";
pub const PROD_URL: &str = "https://euisv.apps.ocp4.kgilife.com.tw/euisw/euisb/api/caseQuery/query";

const STORE_ENV_VAR: &str = "CASE_QUERY_STORE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Uat,
    Prod,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Uat => "UAT",
            Environment::Prod => "PROD",
        }
    }

    fn url_override_var(self) -> &'static str {
        match self {
            Environment::Uat => "CASE_QUERY_UAT_URL",
            Environment::Prod => "CASE_QUERY_PROD_URL",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UAT" => Ok(Environment::Uat),
            "PROD" => Ok(Environment::Prod),
            _ => Err(QueryError::UnknownEnvironment(s.to_string())),
        }
    }
}

/// Base URLs for the two deployment targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub uat: String,
    pub prod: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            uat: UAT_URL.to_string(),
            prod: PROD_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Fixed endpoints, each replaceable through its environment variable.
    pub fn from_env() -> Self {
        let resolve = |env: Environment, fallback: &str| {
            std::env::var(env.url_override_var())
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        Self {
            uat: resolve(Environment::Uat, UAT_URL),
            prod: resolve(Environment::Prod, PROD_URL),
        }
    }

    pub fn url_for(&self, env: Environment) -> &str {
        match env {
            Environment::Uat => &self.uat,
            Environment::Prod => &self.prod,
        }
    }
}

/// External persistent key-value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> QueryResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> QueryResult<()>;
}

/// Key-value store persisted as a pretty-printed JSON object.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, reason: impl fmt::Display) -> QueryError {
        QueryError::Storage {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    fn read_map(&self) -> QueryResult<Map<String, Value>> {
        if !self.path.is_file() {
            return Ok(Map::new());
        }
        let bytes = fs::read(&self.path).map_err(|err| self.storage_error(err))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        match serde_json::from_slice::<Value>(&bytes).map_err(|err| self.storage_error(err))? {
            Value::Object(map) => Ok(map),
            _ => Err(self.storage_error("expected a JSON object")),
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> QueryResult<Option<String>> {
        let map = self.read_map()?;
        Ok(match map.get(key) {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
    }

    fn set(&mut self, key: &str, value: &str) -> QueryResult<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), Value::String(value.to_string()));
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.storage_error(err))?;
        }
        let text = serde_json::to_string_pretty(&Value::Object(map))
            .map_err(|err| self.storage_error(err))?;
        fs::write(&self.path, text.as_bytes()).map_err(|err| self.storage_error(err))
    }
}

/// Resolve the store location: explicit path > `CASE_QUERY_STORE` > config dir.
pub fn resolve_store_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(STORE_ENV_VAR).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let base = dirs::config_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow::anyhow!("cannot determine a configuration directory"))?;
    Ok(base.join("case-query").join("storage.json"))
}

/// Active environment plus the credential it is queried with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub environment: Environment,
    credential: String,
}

impl SessionConfig {
    /// Read the credential and environment preference from the store.
    ///
    /// A missing or blank credential refuses initialization outright.
    pub fn load(store: &dyn KeyValueStore) -> QueryResult<Self> {
        let credential = store
            .get(TOKEN_KEY)?
            .filter(|token| !token.trim().is_empty())
            .ok_or(QueryError::MissingCredential)?;
        let environment = match store.get(ENV_KEY)? {
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(%err, "ignoring stored environment");
                Environment::default()
            }),
            None => Environment::default(),
        };
        Ok(Self {
            environment,
            credential,
        })
    }

    /// Persist the environment preference. The credential is never written.
    pub fn save(
        &mut self,
        store: &mut dyn KeyValueStore,
        environment: Environment,
    ) -> QueryResult<()> {
        store.set(ENV_KEY, environment.as_str())?;
        self.environment = environment;
        tracing::info!(environment = environment.as_str(), "environment saved");
        Ok(())
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }
}
