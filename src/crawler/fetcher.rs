//! Autocomplete service client
//!
//! This module handles all HTTP requests for the sweep, including:
//! - The `AutocompleteService` seam the executor queries through
//! - Building the HTTP client with a user agent and request timeout
//! - Building query URLs with the prefix URL-encoded
//! - Classifying responses (results, rate limit, HTTP error, network error)

use crate::config::ServiceConfig;
use crate::SweepError;
use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Classified answer to a single autocomplete request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceResponse {
    /// The endpoint answered with its (possibly truncated) suggestion list
    Results(Vec<String>),

    /// The endpoint signalled a rate limit (HTTP 429)
    RateLimited {
        /// Server-provided wait, when a `Retry-After` header was present
        retry_after: Option<Duration>,
    },

    /// Any other non-success status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Transport failure, timeout, or an undecodable body
    NetworkError {
        /// Error description
        error: String,
    },
}

/// A remote suggestion endpoint: query text in, at most K matches out
#[async_trait]
pub trait AutocompleteService: Send + Sync {
    async fn query(&self, text: &str) -> ServiceResponse;
}

/// Response body of the autocomplete endpoint; extra fields are ignored
#[derive(Debug, Deserialize)]
struct AutocompleteBody {
    #[serde(default)]
    results: Vec<String>,
}

/// HTTP implementation of the autocomplete service
#[derive(Debug, Clone)]
pub struct HttpAutocompleteClient {
    client: Client,
    base_url: Url,
    query_param: String,
}

impl HttpAutocompleteClient {
    /// Creates a client for the configured endpoint
    ///
    /// # Returns
    ///
    /// * `Ok(HttpAutocompleteClient)` - Client ready to issue queries
    /// * `Err(SweepError)` - The base URL is invalid or the client could not be built
    pub fn new(config: &ServiceConfig) -> Result<Self, SweepError> {
        Ok(Self {
            client: build_http_client(config)?,
            base_url: Url::parse(&config.base_url)?,
            query_param: config.query_param.clone(),
        })
    }

    /// Builds the request URL for a query, URL-encoding the text
    pub fn query_url(&self, text: &str) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair(&self.query_param, text);
        url
    }
}

#[async_trait]
impl AutocompleteService for HttpAutocompleteClient {
    async fn query(&self, text: &str) -> ServiceResponse {
        let url = self.query_url(text);

        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return classify_transport_error(&e),
        };

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return ServiceResponse::RateLimited { retry_after };
        }

        if !status.is_success() {
            return ServiceResponse::HttpError {
                status_code: status.as_u16(),
            };
        }

        match response.json::<AutocompleteBody>().await {
            Ok(body) => ServiceResponse::Results(body.results),
            Err(e) if e.is_timeout() => ServiceResponse::NetworkError {
                error: "Request timeout".to_string(),
            },
            Err(e) => ServiceResponse::NetworkError {
                error: format!("Invalid response body: {}", e),
            },
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The service configuration (user agent and request timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ServiceConfig) -> Result<Client, reqwest::Error> {
    let timeout = config.request_timeout();

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Classifies a transport-level failure
fn classify_transport_error(e: &reqwest::Error) -> ServiceResponse {
    let error = if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        "Connection refused".to_string()
    } else {
        e.to_string()
    };
    ServiceResponse::NetworkError { error }
}

/// Parses a `Retry-After` header given in whole seconds
///
/// HTTP-date values are ignored; the governor's own backoff applies instead.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
