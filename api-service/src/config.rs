use std::sync::Arc;

use schema::{
    PersistenceError,
    db::{DocumentStore, MongoStore},
};
use sentry::types::Dsn;
use tracing::{error, info, warn};

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct AppState {
    /// `None` when the database could not be reached at startup
    pub store: Option<Arc<dyn DocumentStore>>,
    pub env_vars: EnvVars,
}

impl AppState {
    pub fn store(&self) -> Result<&dyn DocumentStore, Error> {
        self.store
            .as_deref()
            .ok_or(Error::Persistence(PersistenceError::Unavailable))
    }
}

#[derive(Debug, Clone)]
pub struct EnvVars {
    pub database_name: Option<String>,
    pub database_url: Option<String>,
    pub environment: Environment,
    pub port: u16,
    pub request_body_size_limit: usize,
    pub request_timeout_in_ms: u64,
    pub sentry_dsn: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" => Environment::Development,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                warn!(
                    "ENVIRONMENT value '{}' is not valid. Defaulting to 'production'.",
                    other
                );
                Environment::Production
            }
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        };
        f.write_str(s)
    }
}

impl EnvVars {
    pub fn new() -> Self {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `var`. Empty values count as unset.
    pub fn from_source(var: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| var(key).filter(|v| !v.is_empty());

        let database_url = var("DATABASE_URL");
        if database_url.is_none() {
            warn!("DATABASE_URL not set. Database routes will be unavailable");
        }

        let database_name = var("DATABASE_NAME");
        if database_name.is_none() {
            warn!("DATABASE_NAME not set. Using the database named in DATABASE_URL");
        }

        let port = match var("PORT") {
            Some(port_string) => port_string.parse().expect("PORT to be parseable as u16"),
            None => {
                let default_port = 8000;
                warn!("PORT not set. Defaulting to {default_port}");
                default_port
            }
        };

        let request_timeout_in_ms = match var("REQUEST_TIMEOUT_IN_MS") {
            Some(s) => s
                .parse()
                .expect("REQUEST_TIMEOUT_IN_MS to be valid unsigned integer"),
            None => {
                let default_request_timeout = 30_000;
                warn!("REQUEST_TIMEOUT_IN_MS not set. Defaulting to {default_request_timeout}");
                default_request_timeout
            }
        };

        let request_body_size_limit = match var("REQUEST_BODY_SIZE_LIMIT") {
            Some(s) => s
                .parse()
                .expect("REQUEST_BODY_SIZE_LIMIT to be valid unsigned integer"),
            None => {
                let default_request_body_size_limit = 1024 * 1024;
                warn!(
                    "REQUEST_BODY_SIZE_LIMIT not set. Defaulting to {default_request_body_size_limit}"
                );
                default_request_body_size_limit
            }
        };

        let environment = match var("ENVIRONMENT") {
            Some(v) => v.into(),
            None => {
                warn!("ENVIRONMENT not set. Defaulting to 'production'.");
                Environment::Production
            }
        };

        let sentry_dsn = match var("SENTRY_DSN") {
            Some(dsn_string) if valid_sentry_dsn(&dsn_string) => Some(dsn_string),
            Some(_) => {
                error!("SENTRY_DSN is not a valid DSN. Error reporting disabled.");
                None
            }
            None => {
                warn!("SENTRY_DSN not set.");
                None
            }
        };

        EnvVars {
            database_name,
            database_url,
            environment,
            port,
            request_body_size_limit,
            request_timeout_in_ms,
            sentry_dsn,
        }
    }
}

fn valid_sentry_dsn(url: &str) -> bool {
    url.parse::<Dsn>().is_ok()
}

/// Connects to MongoDB when `DATABASE_URL` is set. Failure leaves the service
/// running without a store.
pub async fn connect_store(env_vars: &EnvVars) -> Option<Arc<dyn DocumentStore>> {
    let uri = env_vars.database_url.as_deref()?;

    match MongoStore::connect(uri, env_vars.database_name.as_deref()).await {
        Ok(store) => {
            info!(database = store.name(), "connected to database");
            Some(Arc::new(store))
        }
        Err(e) => {
            error!(error = ?e, "unable to connect to database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_vars(pairs: &[(&str, &str)]) -> EnvVars {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvVars::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let env_vars = env_vars(&[]);
        assert_eq!(env_vars.port, 8000);
        assert_eq!(env_vars.database_url, None);
        assert_eq!(env_vars.database_name, None);
        assert_eq!(env_vars.request_timeout_in_ms, 30_000);
        assert_eq!(env_vars.request_body_size_limit, 1024 * 1024);
        assert_eq!(env_vars.environment, Environment::Production);
        assert_eq!(env_vars.sentry_dsn, None);
    }

    #[test]
    fn reads_values() {
        let env_vars = env_vars(&[
            ("DATABASE_URL", "mongodb://localhost:27017"),
            ("DATABASE_NAME", "righttick"),
            ("PORT", "9000"),
            ("ENVIRONMENT", "Staging"),
        ]);
        assert_eq!(
            env_vars.database_url.as_deref(),
            Some("mongodb://localhost:27017")
        );
        assert_eq!(env_vars.database_name.as_deref(), Some("righttick"));
        assert_eq!(env_vars.port, 9000);
        assert_eq!(env_vars.environment, Environment::Staging);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let env_vars = env_vars(&[("DATABASE_URL", ""), ("PORT", "")]);
        assert_eq!(env_vars.database_url, None);
        assert_eq!(env_vars.port, 8000);
    }

    #[test]
    fn invalid_sentry_dsn_is_dropped() {
        let env_vars = env_vars(&[("SENTRY_DSN", "not a dsn")]);
        assert_eq!(env_vars.sentry_dsn, None);
    }

    #[test]
    #[should_panic(expected = "PORT to be parseable as u16")]
    fn invalid_port_panics() {
        env_vars(&[("PORT", "eighty")]);
    }

    #[test]
    fn unknown_environment_is_production() {
        assert_eq!(
            Environment::from("qa".to_string()),
            Environment::Production
        );
        assert_eq!(Environment::Development.to_string(), "development");
    }

    #[tokio::test]
    async fn no_database_url_means_no_store() {
        assert!(connect_store(&env_vars(&[])).await.is_none());
    }
}
