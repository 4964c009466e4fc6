use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::time::Duration;
use tracing::{info, warn};

/// Configuration for building the HTTP client.
pub struct ClientConfig {
    pub api_token: String,
    pub request_timeout: Duration,
    pub skip_tls_verify: bool,
}

/// Builds the reqwest client shared by every actor.
///
/// The bearer token is installed as a default header (marked sensitive so it
/// never shows up in debug output), and the request timeout applies to every
/// call made through the client.
pub fn build_client(
    config: &ClientConfig,
) -> Result<reqwest::Client, Box<dyn std::error::Error + Send + Sync>> {
    let mut client_builder = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .default_headers(auth_headers(&config.api_token)?);

    if config.skip_tls_verify {
        warn!("Skipping TLS certificate verification");
        client_builder = client_builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }

    let client = client_builder.build()?;
    info!(
        request_timeout_secs = config.request_timeout.as_secs_f64(),
        "HTTP client configured"
    );

    Ok(client)
}

fn auth_headers(token: &str) -> Result<HeaderMap, Box<dyn std::error::Error + Send + Sync>> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| format!("API token is not a valid header value: {}", e))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_header_is_bearer_and_sensitive() {
        let headers = auth_headers("sk-test").unwrap();
        let value = headers.get(AUTHORIZATION).unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer sk-test");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_token_with_newline_is_rejected() {
        let err = auth_headers("bad\ntoken").unwrap_err();
        assert!(err.to_string().contains("not a valid header value"));
    }

    #[test]
    fn test_build_client() {
        let config = ClientConfig {
            api_token: "sk-test".to_string(),
            request_timeout: Duration::from_secs(5),
            skip_tls_verify: true,
        };
        assert!(build_client(&config).is_ok());
    }
}
