//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests of the harvester:
//! - Building the HTTP client with a browser identity
//! - Listing page requests (document header profile)
//! - Cover image requests (image header profile with conditional headers)
//! - Classifying responses into OK / Not Modified / other / transport failure

use crate::config::UserAgentConfig;
use crate::record::ImageValidator;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, ETAG,
    IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, PRAGMA, REFERER,
};
use reqwest::{Client, StatusCode};
use std::time::Duration;

const SEC_CH_UA: &str = r#""Not)A;Brand";v="8", "Chromium";v="138", "Google Chrome";v="138""#;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// 2xx response with its body
    Ok {
        /// HTTP status code
        status_code: u16,
        /// Response headers
        headers: HeaderMap,
        /// Raw body bytes
        body: Vec<u8>,
    },

    /// 304 response to a conditional request
    NotModified {
        /// Response headers
        headers: HeaderMap,
    },

    /// Any other HTTP status
    HttpError {
        /// The HTTP status code
        status_code: u16,
    },

    /// Transport failure (connection refused, timeout, truncated body, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// Short description used in retry logs
    pub fn describe(&self) -> String {
        match self {
            Self::Ok { status_code, .. } => format!("HTTP {}", status_code),
            Self::NotModified { .. } => "HTTP 304".to_string(),
            Self::HttpError { status_code } => format!("HTTP {}", status_code),
            Self::NetworkError { error } => error.clone(),
        }
    }
}

/// Builds an HTTP client presenting the configured browser identity
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Example
///
/// ```no_run
/// use kobo_harvest::config::UserAgentConfig;
/// use kobo_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(30)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Header profile shared by page and image requests
fn common_headers(config: &UserAgentConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));
    headers.insert(
        HeaderName::from_static("sec-ch-ua"),
        HeaderValue::from_static(SEC_CH_UA),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua-mobile"),
        HeaderValue::from_static("?0"),
    );
    headers.insert(
        HeaderName::from_static("sec-ch-ua-platform"),
        HeaderValue::from_static("\"Windows\""),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-storage-access"),
        HeaderValue::from_static("active"),
    );
    if let Ok(value) = HeaderValue::from_str(&config.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&config.referer) {
        if !config.referer.is_empty() {
            headers.insert(REFERER, value);
        }
    }
    headers
}

/// Headers for a listing page navigation
pub fn page_headers(config: &UserAgentConfig) -> HeaderMap {
    let mut headers = common_headers(config);
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("document"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("navigate"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}

/// Headers for a cover image request, conditional on the previous validator
pub fn image_headers(config: &UserAgentConfig, validator: &ImageValidator) -> HeaderMap {
    let mut headers = common_headers(config);
    headers.insert(ACCEPT, HeaderValue::from_static("image/jpeg,image/*,*/*;q=0.8"));
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("image"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("no-cors"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("cross-site"),
    );
    if let Some(etag) = validator.etag.as_deref().filter(|v| !v.is_empty()) {
        if let Ok(value) = HeaderValue::from_str(etag) {
            headers.insert(IF_NONE_MATCH, value);
        }
    }
    if let Some(modified) = validator.last_modified.as_deref().filter(|v| !v.is_empty()) {
        if let Ok(value) = HeaderValue::from_str(modified) {
            headers.insert(IF_MODIFIED_SINCE, value);
        }
    }
    headers
}

/// Extracts the cache validator of a response
pub fn validator_from_headers(headers: &HeaderMap) -> ImageValidator {
    let text = |name: HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    ImageValidator {
        etag: text(ETAG),
        last_modified: text(LAST_MODIFIED),
    }
}

/// HTTP client with the harvester's header profiles
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    user_agent: UserAgentConfig,
}

impl Fetcher {
    /// Creates a fetcher with a freshly built client
    pub fn new(config: &UserAgentConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config, timeout)?,
            user_agent: config.clone(),
        })
    }

    /// Fetches a listing page
    pub async fn fetch_page(&self, url: &str) -> FetchResult {
        self.fetch(url, page_headers(&self.user_agent)).await
    }

    /// Fetches a cover image, conditionally on `validator`
    pub async fn fetch_image(&self, url: &str, validator: &ImageValidator) -> FetchResult {
        self.fetch(url, image_headers(&self.user_agent, validator)).await
    }

    /// Issues a GET request with the given headers and classifies the response
    pub async fn fetch(&self, url: &str, headers: HeaderMap) -> FetchResult {
        let response = match self.client.get(url).headers(headers).send().await {
            Ok(response) => response,
            Err(e) => {
                let error = if e.is_timeout() {
                    "Request timeout".to_string()
                } else if e.is_connect() {
                    "Connection refused".to_string()
                } else {
                    e.to_string()
                };
                return FetchResult::NetworkError { error };
            }
        };

        let status = response.status();

        if status == StatusCode::NOT_MODIFIED {
            return FetchResult::NotModified {
                headers: response.headers().clone(),
            };
        }

        if !status.is_success() {
            return FetchResult::HttpError {
                status_code: status.as_u16(),
            };
        }

        let headers = response.headers().clone();
        match response.bytes().await {
            Ok(body) => FetchResult::Ok {
                status_code: status.as_u16(),
                headers,
                body: body.to_vec(),
            },
            Err(e) => FetchResult::NetworkError {
                error: e.to_string(),
            },
        }
    }
}
