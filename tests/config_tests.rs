//! Configuration loading from the process environment.

use chat_loadtest::config::{Config, ConfigError, TokenSource, FALLBACK_API_TOKEN};
use chat_loadtest::payload::ModelName;
use serial_test::serial;
use std::env;
use std::time::Duration;

/// Clear all env vars that could affect config parsing.
/// Must be called at the start of every test since execution order is not guaranteed.
fn clean_env() {
    for var in [
        "TARGET_URL",
        "CHAT_API_TOKEN",
        "REQUIRE_API_TOKEN",
        "MODELS",
        "NUM_USERS",
        "TEST_DURATION",
        "MIN_WAIT",
        "MAX_WAIT",
        "REQUEST_TIMEOUT",
        "MAX_RESPONSE_TIME",
        "EXAMPLE_FILES_DIR",
        "TASK_WEIGHTS",
        "RNG_SEED",
        "SKIP_TLS_VERIFY",
        "METRICS_PORT",
        "LOG_FORMAT",
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_target_url_required() {
    clean_env();
    let err = Config::from_env().unwrap_err();
    assert_eq!(err, ConfigError::Missing("TARGET_URL"));
    assert_eq!(err.to_string(), "TARGET_URL environment variable must be set");
}

#[test]
#[serial]
fn test_env_values_are_used() {
    clean_env();
    env::set_var("TARGET_URL", "https://chat.internal.example");
    env::set_var("CHAT_API_TOKEN", "sk-from-env");
    env::set_var("MODELS", "qwen3-32b");
    env::set_var("NUM_USERS", "25");
    env::set_var("TEST_DURATION", "2h");
    env::set_var("REQUEST_TIMEOUT", "120s");

    let config = Config::from_env().unwrap();
    assert_eq!(config.target_url, "https://chat.internal.example");
    assert_eq!(config.api_token, "sk-from-env");
    assert_eq!(config.token_source, TokenSource::Environment);
    assert_eq!(config.models, vec![ModelName::new("qwen3-32b")]);
    assert_eq!(config.num_users, 25);
    assert_eq!(config.test_duration, Duration::from_secs(2 * 3600));
    assert_eq!(config.request_timeout, Duration::from_secs(120));
    assert_eq!(config.max_response_time, Duration::from_secs(120));

    clean_env();
}

#[test]
#[serial]
fn test_missing_token_falls_back_with_flag() {
    clean_env();
    env::set_var("TARGET_URL", "http://localhost:3000");

    let config = Config::from_env().unwrap();
    assert_eq!(config.token_source, TokenSource::Fallback);
    assert_eq!(config.api_token, FALLBACK_API_TOKEN);

    clean_env();
}

#[test]
#[serial]
fn test_empty_token_counts_as_missing() {
    clean_env();
    env::set_var("TARGET_URL", "http://localhost:3000");
    env::set_var("CHAT_API_TOKEN", "");
    env::set_var("REQUIRE_API_TOKEN", "true");

    assert_eq!(
        Config::from_env().unwrap_err(),
        ConfigError::Missing("CHAT_API_TOKEN")
    );

    clean_env();
}

#[test]
#[serial]
fn test_invalid_duration_names_the_variable() {
    clean_env();
    env::set_var("TARGET_URL", "http://localhost:3000");
    env::set_var("TEST_DURATION", "10 minutes");

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("TEST_DURATION"), "{}", err);

    clean_env();
}

#[test]
#[serial]
fn test_driver_config_follows_env() {
    clean_env();
    env::set_var("TARGET_URL", "http://localhost:3000");
    env::set_var("MODELS", "a,b,c");
    env::set_var("MAX_RESPONSE_TIME", "30s");
    env::set_var("EXAMPLE_FILES_DIR", "/tmp/chat-files");

    let config = Config::from_env().unwrap();
    let driver_config = config.driver_config();
    assert_eq!(driver_config.models.len(), 3);
    assert_eq!(driver_config.max_response_time, Duration::from_secs(30));
    assert_eq!(
        driver_config.example_files.dir(),
        std::path::Path::new("/tmp/chat-files")
    );

    clean_env();
}
