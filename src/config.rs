use std::env;

/// AppConfig
///
/// Immutable settings resolved once at startup and shared through `AppState`.
/// Handlers pull it with `State<AppConfig>` via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Runtime environment. Selects log format and whether a database is mandatory.
    pub env: Env,
    /// MongoDB connection string. `None` (local only) selects the in-memory store.
    pub mongodb_uri: Option<String>,
    pub database_name: String,
    /// HS256 signing secret for access tokens.
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    /// Mount point for the catalog routes, e.g. `/api/v1`. Empty mounts at the root.
    pub api_prefix: String,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    pub bind_addr: String,
    /// Optional account created at startup when no user has this email.
    pub super_admin: Option<SuperAdminSeed>,
}

/// Env
///
/// `Local` tolerates a missing database (falls back to memory) and logs in a
/// human-readable format; `Production` requires every backing service.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// Credentials of the bootstrap super-admin.
#[derive(Clone, Debug)]
pub struct SuperAdminSeed {
    pub email: String,
    pub password: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl Default for AppConfig {
    /// Safe values for tests; nothing here is read from the environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            mongodb_uri: None,
            database_name: "api_menu_db_test".to_string(),
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            access_token_ttl_minutes: 30,
            api_prefix: String::new(),
            cors_origins: Vec::new(),
            bind_addr: "127.0.0.1:3000".to_string(),
            super_admin: None,
        }
    }
}

impl AppConfig {
    /// Longest accepted access-token lifetime: one year.
    pub const MAX_TOKEN_TTL_MINUTES: i64 = 525_600;

    /// load
    ///
    /// Reads the process environment. Fails fast when a required value is absent,
    /// most importantly `JWT_SECRET`, which is mandatory in every environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// from_lookup
    ///
    /// The environment-independent core of `load`; `lookup` maps a variable name
    /// to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let env = match non_empty("APP_ENV").as_deref() {
            None | Some("local") => Env::Local,
            Some("production") => Env::Production,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "APP_ENV",
                    reason: format!("expected 'local' or 'production', got '{other}'"),
                });
            }
        };

        let jwt_secret = non_empty("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let mongodb_uri = non_empty("MONGODB_URI");
        if env == Env::Production && mongodb_uri.is_none() {
            return Err(ConfigError::Missing("MONGODB_URI"));
        }

        let access_token_ttl_minutes = match non_empty("ACCESS_TOKEN_EXPIRE_MINUTES") {
            None => 30,
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|minutes| (1..=Self::MAX_TOKEN_TTL_MINUTES).contains(minutes))
                .ok_or_else(|| ConfigError::Invalid {
                    var: "ACCESS_TOKEN_EXPIRE_MINUTES",
                    reason: format!(
                        "expected an integer from 1 to {}, got '{raw}'",
                        Self::MAX_TOKEN_TTL_MINUTES
                    ),
                })?,
        };

        let api_prefix = match non_empty("API_PREFIX") {
            None => String::new(),
            Some(prefix) if prefix == "/" => String::new(),
            Some(prefix) if prefix.starts_with('/') => prefix.trim_end_matches('/').to_string(),
            Some(prefix) => {
                return Err(ConfigError::Invalid {
                    var: "API_PREFIX",
                    reason: format!("must start with '/', got '{prefix}'"),
                });
            }
        };

        let cors_origins = non_empty("CORS_ORIGINS")
            .map(|raw| {
                let origins: Vec<String> = raw
                    .split(',')
                    .map(|origin| origin.trim().trim_end_matches('/').to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect();
                // A wildcard anywhere in the list opens CORS to every origin.
                if origins.iter().any(|origin| origin == "*") {
                    Vec::new()
                } else {
                    origins
                }
            })
            .unwrap_or_default();

        let super_admin = match (non_empty("SUPERADMIN_EMAIL"), non_empty("SUPERADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(SuperAdminSeed { email, password }),
            _ => None,
        };

        Ok(Self {
            env,
            mongodb_uri,
            database_name: non_empty("MONGODB_NAME").unwrap_or_else(|| "api_menu_db".to_string()),
            jwt_secret,
            access_token_ttl_minutes,
            api_prefix,
            cors_origins,
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            super_admin,
        })
    }
}
