use std::env;
use std::path::PathBuf;
use thiserror::Error;
use tokio::time::Duration;
use tracing::warn;

use crate::actor::WaitTime;
use crate::client::ClientConfig;
use crate::driver::DriverConfig;
use crate::example_files::ExampleFiles;
use crate::logging::LogFormat;
use crate::payload::ModelName;
use crate::prompts::DEFAULT_MODELS;
use crate::task::{ChatTask, TaskWeights};
use crate::utils::{parse_duration_string, parse_list};

/// Placeholder used when `CHAT_API_TOKEN` is unset. It is not a real
/// credential; runs using it are flagged at startup.
pub const FALLBACK_API_TOKEN: &str = "sk-loadtest-placeholder";

/// Errors raised while loading configuration.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    #[error("Invalid {name}: '{value}'. {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Where the bearer token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Environment,
    /// `CHAT_API_TOKEN` was unset and the placeholder is in use.
    Fallback,
}

/// Immutable run configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub target_url: String,
    pub api_token: String,
    pub token_source: TokenSource,
    pub models: Vec<ModelName>,
    pub num_users: usize,
    pub test_duration: Duration,
    pub wait_time: WaitTime,
    pub request_timeout: Duration,
    pub max_response_time: Duration,
    pub example_files_dir: PathBuf,
    pub task_weights: TaskWeights,
    pub rng_seed: Option<u64>,
    pub skip_tls_verify: bool,
    pub metrics_port: u16,
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let target_url = get("TARGET_URL").ok_or(ConfigError::Missing("TARGET_URL"))?;
        if !target_url.starts_with("http://") && !target_url.starts_with("https://") {
            return Err(invalid(
                "TARGET_URL",
                &target_url,
                "Must start with http:// or https://",
            ));
        }
        let target_url = target_url.trim_end_matches('/').to_string();

        let require_token = parse_bool(&get, "REQUIRE_API_TOKEN")?;
        let (api_token, token_source) = match get("CHAT_API_TOKEN") {
            Some(token) => (token, TokenSource::Environment),
            None if require_token => return Err(ConfigError::Missing("CHAT_API_TOKEN")),
            None => (FALLBACK_API_TOKEN.to_string(), TokenSource::Fallback),
        };

        let models: Vec<ModelName> = match get("MODELS") {
            Some(raw) => {
                let names = parse_list(&raw);
                if names.is_empty() {
                    return Err(invalid("MODELS", &raw, "At least one model is required"));
                }
                names.into_iter().map(ModelName::new).collect()
            }
            None => DEFAULT_MODELS.iter().map(|name| ModelName::new(*name)).collect(),
        };

        let num_users = match get("NUM_USERS") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(invalid("NUM_USERS", &raw, "Must be a number greater than 0")),
            },
            None => 10,
        };

        let test_duration = parse_duration_var(&get, "TEST_DURATION", "10m")?;
        let min_wait = parse_duration_var(&get, "MIN_WAIT", "15s")?;
        let max_wait = parse_duration_var(&get, "MAX_WAIT", "60s")?;
        let wait_time = WaitTime::between(min_wait, max_wait).map_err(|_| {
            let raw_min = get("MIN_WAIT").unwrap_or_else(|| "15s".to_string());
            let raw_max = get("MAX_WAIT").unwrap_or_else(|| "60s".to_string());
            invalid(
                "MIN_WAIT/MAX_WAIT",
                &format!("{} > {}", raw_min.trim(), raw_max.trim()),
                "MIN_WAIT must not exceed MAX_WAIT",
            )
        })?;

        let request_timeout = parse_duration_var(&get, "REQUEST_TIMEOUT", "300s")?;
        if request_timeout.is_zero() {
            return Err(invalid("REQUEST_TIMEOUT", "0", "Must be greater than zero"));
        }
        let max_response_time = match get("MAX_RESPONSE_TIME") {
            Some(_) => parse_duration_var(&get, "MAX_RESPONSE_TIME", "300s")?,
            None => request_timeout,
        };

        let example_files_dir =
            PathBuf::from(get("EXAMPLE_FILES_DIR").unwrap_or_else(|| "example-files".to_string()));

        let task_weights = match get("TASK_WEIGHTS") {
            Some(raw) => {
                TaskWeights::parse(&raw).map_err(|reason| invalid("TASK_WEIGHTS", &raw, &reason))?
            }
            None => TaskWeights::default(),
        };

        let rng_seed = match get("RNG_SEED") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .map_err(|_| invalid("RNG_SEED", &raw, "Must be an unsigned integer"))?,
            ),
            None => None,
        };

        let skip_tls_verify = parse_bool(&get, "SKIP_TLS_VERIFY")?;

        let metrics_port = match get("METRICS_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| invalid("METRICS_PORT", &raw, "Must be a port number (0 disables)"))?,
            None => 9090,
        };

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => LogFormat::parse(&raw).map_err(|reason| invalid("LOG_FORMAT", &raw, &reason))?,
            None => LogFormat::Text,
        };

        Ok(Config {
            target_url,
            api_token,
            token_source,
            models,
            num_users,
            test_duration,
            wait_time,
            request_timeout,
            max_response_time,
            example_files_dir,
            task_weights,
            rng_seed,
            skip_tls_verify,
            metrics_port,
            log_format,
        })
    }

    /// Creates a ClientConfig from this Config.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            api_token: self.api_token.clone(),
            request_timeout: self.request_timeout,
            skip_tls_verify: self.skip_tls_verify,
        }
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            models: self.models.clone(),
            example_files: ExampleFiles::new(self.example_files_dir.clone()),
            max_response_time: self.max_response_time,
        }
    }

    /// Logs a warning when the run authenticates with the placeholder token.
    pub fn warn_on_weak_defaults(&self) {
        if self.token_source == TokenSource::Fallback {
            warn!(
                "CHAT_API_TOKEN is not set; using a placeholder token. Requests will likely be rejected. Set REQUIRE_API_TOKEN=true to make this an error."
            );
        }
    }

    /// Prints the configuration summary. The token itself is never printed.
    pub fn print_summary(&self) {
        println!("Starting load test:");
        println!("  Target URL: {}", self.target_url);
        println!(
            "  API token: {}",
            match self.token_source {
                TokenSource::Environment => "from CHAT_API_TOKEN",
                TokenSource::Fallback => "PLACEHOLDER (CHAT_API_TOKEN not set)",
            }
        );
        let models: Vec<&str> = self.models.iter().map(ModelName::as_str).collect();
        println!("  Models: {}", models.join(", "));
        println!("  Users: {}", self.num_users);
        println!("  Test Duration: {:?}", self.test_duration);
        println!(
            "  Wait Between Tasks: {:?} - {:?}",
            self.wait_time.min, self.wait_time.max
        );
        println!("  Request Timeout: {:?}", self.request_timeout);
        println!("  Max Response Time: {:?}", self.max_response_time);
        let weights: Vec<String> = ChatTask::ALL
            .iter()
            .map(|task| format!("{}={}", task, self.task_weights.weight(*task)))
            .collect();
        println!("  Task Weights: {}", weights.join(", "));
        println!("  Example Files: {}", self.example_files_dir.display());
        match self.rng_seed {
            Some(seed) => println!("  RNG Seed: {}", seed),
            None => println!("  RNG Seed: random"),
        }
        println!("  Skip TLS Verify: {}", self.skip_tls_verify);
        if self.metrics_port == 0 {
            println!("  Metrics Server: disabled");
        } else {
            println!("  Metrics Server: port {}", self.metrics_port);
        }
    }
}

fn invalid(name: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_duration_var<G>(get: &G, name: &'static str, default: &str) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let raw = get(name).unwrap_or_else(|| default.to_string());
    parse_duration_string(&raw).map_err(|reason| invalid(name, &raw, &reason))
}

fn parse_bool<G>(get: &G, name: &'static str) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(false),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(invalid(name, &raw, "Must be true or false")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("TARGET_URL", "https://chat.example.com/")]).unwrap();

        assert_eq!(config.target_url, "https://chat.example.com");
        assert_eq!(config.token_source, TokenSource::Fallback);
        assert_eq!(config.api_token, FALLBACK_API_TOKEN);
        assert_eq!(config.models.len(), 3);
        assert_eq!(config.models[0], ModelName::new("qwen3-32b"));
        assert_eq!(config.num_users, 10);
        assert_eq!(config.wait_time, WaitTime::default());
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert_eq!(config.max_response_time, Duration::from_secs(300));
        assert_eq!(config.task_weights, TaskWeights::default());
        assert_eq!(config.example_files_dir, PathBuf::from("example-files"));
        assert_eq!(config.rng_seed, None);
        assert_eq!(config.metrics_port, 9090);
        assert!(!config.skip_tls_verify);
    }

    #[test]
    fn test_missing_target_url() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("TARGET_URL"));
    }

    #[test]
    fn test_target_url_scheme_required() {
        let err = load(&[("TARGET_URL", "chat.example.com")]).unwrap_err();
        assert!(err.to_string().contains("TARGET_URL"), "{}", err);
    }

    #[test]
    fn test_token_from_env() {
        let config = load(&[
            ("TARGET_URL", "http://localhost:8080"),
            ("CHAT_API_TOKEN", "sk-real"),
        ])
        .unwrap();
        assert_eq!(config.api_token, "sk-real");
        assert_eq!(config.token_source, TokenSource::Environment);
    }

    #[test]
    fn test_required_token_missing() {
        let err = load(&[
            ("TARGET_URL", "http://localhost:8080"),
            ("REQUIRE_API_TOKEN", "true"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("CHAT_API_TOKEN"));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("TARGET_URL", "http://localhost:8080"),
            ("MODELS", "a, b"),
            ("NUM_USERS", "3"),
            ("TEST_DURATION", "90s"),
            ("MIN_WAIT", "100ms"),
            ("MAX_WAIT", "1s"),
            ("REQUEST_TIMEOUT", "30s"),
            ("MAX_RESPONSE_TIME", "10s"),
            ("TASK_WEIGHTS", "1,0,0,1"),
            ("RNG_SEED", "1234"),
            ("SKIP_TLS_VERIFY", "TRUE"),
            ("METRICS_PORT", "0"),
            ("LOG_FORMAT", "json"),
            ("EXAMPLE_FILES_DIR", "/data/files"),
        ])
        .unwrap();

        assert_eq!(config.models, vec![ModelName::new("a"), ModelName::new("b")]);
        assert_eq!(config.num_users, 3);
        assert_eq!(config.test_duration, Duration::from_secs(90));
        assert_eq!(config.wait_time.min, Duration::from_millis(100));
        assert_eq!(config.wait_time.max, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_response_time, Duration::from_secs(10));
        assert_eq!(config.task_weights, TaskWeights::new([1, 0, 0, 1]).unwrap());
        assert_eq!(config.rng_seed, Some(1234));
        assert!(config.skip_tls_verify);
        assert_eq!(config.metrics_port, 0);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.example_files_dir, PathBuf::from("/data/files"));
    }

    #[test]
    fn test_max_response_time_follows_request_timeout() {
        let config = load(&[
            ("TARGET_URL", "http://localhost:8080"),
            ("REQUEST_TIMEOUT", "45s"),
        ])
        .unwrap();
        assert_eq!(config.max_response_time, Duration::from_secs(45));
    }

    #[test]
    fn test_invalid_values() {
        for (name, value) in [
            ("NUM_USERS", "0"),
            ("NUM_USERS", "many"),
            ("TEST_DURATION", "forever"),
            ("REQUEST_TIMEOUT", "0s"),
            ("MODELS", " , "),
            ("TASK_WEIGHTS", "0,0,0,0"),
            ("TASK_WEIGHTS", "4294967295,1,0,0"),
            ("RNG_SEED", "-1"),
            ("SKIP_TLS_VERIFY", "maybe"),
            ("METRICS_PORT", "70000"),
            ("LOG_FORMAT", "xml"),
        ] {
            let result = load(&[("TARGET_URL", "http://localhost:8080"), (name, value)]);
            assert!(result.is_err(), "{}={} should be rejected", name, value);
        }
    }

    #[test]
    fn test_inverted_wait_range() {
        let err = load(&[
            ("TARGET_URL", "http://localhost:8080"),
            ("MIN_WAIT", "60s"),
            ("MAX_WAIT", "15s"),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid MIN_WAIT/MAX_WAIT: '60s > 15s'. MIN_WAIT must not exceed MAX_WAIT"
        );

        // A default on one side is reported as its default text
        let err = load(&[("TARGET_URL", "http://localhost:8080"), ("MIN_WAIT", "2m")])
            .unwrap_err();
        assert!(err.to_string().contains("'2m > 60s'"), "{}", err);
    }

    #[test]
    fn test_client_config_carries_token_and_timeout() {
        let config = load(&[
            ("TARGET_URL", "http://localhost:8080"),
            ("CHAT_API_TOKEN", "sk-real"),
            ("REQUEST_TIMEOUT", "20s"),
        ])
        .unwrap();
        let client_config = config.to_client_config();
        assert_eq!(client_config.api_token, "sk-real");
        assert_eq!(client_config.request_timeout, Duration::from_secs(20));
    }
}
