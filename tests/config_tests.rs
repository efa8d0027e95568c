use menu_catalog::config::{AppConfig, ConfigError, Env};
use serial_test::serial;
use std::{collections::HashMap, env, panic};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

// --- Pure lookup ---

#[test]
fn test_local_defaults() {
    let config = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "local-secret")])).unwrap();

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.mongodb_uri, None);
    assert_eq!(config.database_name, "api_menu_db");
    assert_eq!(config.access_token_ttl_minutes, 30);
    assert_eq!(config.api_prefix, "");
    assert!(config.cors_origins.is_empty());
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert!(config.super_admin.is_none());
}

#[test]
fn test_jwt_secret_is_required_everywhere() {
    assert_eq!(
        AppConfig::from_lookup(lookup(&[])).unwrap_err(),
        ConfigError::Missing("JWT_SECRET")
    );
    assert_eq!(
        AppConfig::from_lookup(lookup(&[("JWT_SECRET", "   ")])).unwrap_err(),
        ConfigError::Missing("JWT_SECRET")
    );
}

#[test]
fn test_production_requires_database() {
    let result = AppConfig::from_lookup(lookup(&[
        ("APP_ENV", "production"),
        ("JWT_SECRET", "prod-secret"),
    ]));
    assert_eq!(result.unwrap_err(), ConfigError::Missing("MONGODB_URI"));

    let config = AppConfig::from_lookup(lookup(&[
        ("APP_ENV", "production"),
        ("JWT_SECRET", "prod-secret"),
        ("MONGODB_URI", "mongodb://db:27017"),
        ("MONGODB_NAME", "menu"),
    ]))
    .unwrap();
    assert_eq!(config.env, Env::Production);
    assert_eq!(config.mongodb_uri.as_deref(), Some("mongodb://db:27017"));
    assert_eq!(config.database_name, "menu");
}

#[test]
fn test_invalid_values_are_rejected() {
    for (var, value) in [
        ("APP_ENV", "staging"),
        ("ACCESS_TOKEN_EXPIRE_MINUTES", "0"),
        ("ACCESS_TOKEN_EXPIRE_MINUTES", "soon"),
        ("ACCESS_TOKEN_EXPIRE_MINUTES", "525601"),
        ("ACCESS_TOKEN_EXPIRE_MINUTES", "9223372036854775807"),
        ("API_PREFIX", "api/v1"),
    ] {
        let result = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "secret"), (var, value)]));
        assert!(
            matches!(result, Err(ConfigError::Invalid { var: found, .. }) if found == var),
            "{var}={value}"
        );
    }
}

#[test]
fn test_token_lifetime_upper_bound() {
    let year = AppConfig::from_lookup(lookup(&[
        ("JWT_SECRET", "secret"),
        ("ACCESS_TOKEN_EXPIRE_MINUTES", "525600"),
    ]))
    .unwrap();
    assert_eq!(year.access_token_ttl_minutes, AppConfig::MAX_TOKEN_TTL_MINUTES);

    let result = AppConfig::from_lookup(lookup(&[
        ("JWT_SECRET", "secret"),
        ("ACCESS_TOKEN_EXPIRE_MINUTES", "525601"),
    ]));
    assert_eq!(
        result.unwrap_err(),
        ConfigError::Invalid {
            var: "ACCESS_TOKEN_EXPIRE_MINUTES",
            reason: "expected an integer from 1 to 525600, got '525601'".to_string(),
        }
    );
}

#[test]
fn test_prefix_cors_and_seed_parsing() {
    let config = AppConfig::from_lookup(lookup(&[
        ("JWT_SECRET", "secret"),
        ("API_PREFIX", "/api/v1/"),
        ("CORS_ORIGINS", "https://menu.example.com/, http://localhost:5173"),
        ("ACCESS_TOKEN_EXPIRE_MINUTES", "45"),
        ("SUPERADMIN_EMAIL", "owner@example.com"),
        ("SUPERADMIN_PASSWORD", "Owner123!"),
    ]))
    .unwrap();

    assert_eq!(config.api_prefix, "/api/v1");
    assert_eq!(
        config.cors_origins,
        vec!["https://menu.example.com", "http://localhost:5173"]
    );
    assert_eq!(config.access_token_ttl_minutes, 45);
    let seed = config.super_admin.unwrap();
    assert_eq!(seed.email, "owner@example.com");

    let root_prefix =
        AppConfig::from_lookup(lookup(&[("JWT_SECRET", "secret"), ("API_PREFIX", "/")])).unwrap();
    assert_eq!(root_prefix.api_prefix, "");

    let wildcard = AppConfig::from_lookup(lookup(&[
        ("JWT_SECRET", "secret"),
        ("CORS_ORIGINS", "https://menu.example.com,*"),
    ]))
    .unwrap();
    assert!(wildcard.cors_origins.is_empty());

    // Half a seed is no seed.
    let partial = AppConfig::from_lookup(lookup(&[
        ("JWT_SECRET", "secret"),
        ("SUPERADMIN_EMAIL", "owner@example.com"),
    ]))
    .unwrap();
    assert!(partial.super_admin.is_none());
}

// --- Process environment ---

/// Runs `test` and restores `vars` afterwards, even if it panics.
fn run_with_env<T, R>(test: T, vars: &[&'static str]) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> =
        vars.iter().map(|&var| (var, env::var(var).ok())).collect();

    let result = panic::catch_unwind(test);

    for (key, original) in originals.into_iter().rev() {
        unsafe {
            match original {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(error) => panic::resume_unwind(error),
    }
}

#[test]
#[serial]
fn test_load_reads_process_environment() {
    let config = run_with_env(
        || {
            unsafe {
                env::set_var("APP_ENV", "local");
                env::set_var("JWT_SECRET", "from-env-secret");
                env::remove_var("MONGODB_URI");
            }
            AppConfig::load()
        },
        &["APP_ENV", "JWT_SECRET", "MONGODB_URI"],
    )
    .unwrap();

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.jwt_secret, "from-env-secret");
    assert!(config.mongodb_uri.is_none());
}

#[test]
#[serial]
fn test_load_fails_fast_in_production_without_database() {
    let result = run_with_env(
        || {
            unsafe {
                env::set_var("APP_ENV", "production");
                env::set_var("JWT_SECRET", "prod-secret");
                env::remove_var("MONGODB_URI");
            }
            AppConfig::load()
        },
        &["APP_ENV", "JWT_SECRET", "MONGODB_URI"],
    );

    assert_eq!(result.unwrap_err(), ConfigError::Missing("MONGODB_URI"));
}
