use crate::{LinkPolicy, PreviewError};
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; chat-link-preview/0.1; link previews for chat messages)";

/// A successfully retrieved resource.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Final URL after redirects.
    pub url: Url,
    /// Declared `Content-Type`, verbatim.
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl FetchResult {
    /// The body as text, replacing invalid UTF-8 rather than failing.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
}

impl Fetcher {
    pub fn new() -> Result<Self, PreviewError> {
        debug!("Fetcher initialized with default configuration");
        Self::new_with_config(FetcherConfig::default())
    }

    /// Creates a Fetcher with custom limits. Redirects are only followed to
    /// http(s) targets.
    pub fn new_with_config(config: FetcherConfig) -> Result<Self, PreviewError> {
        Self::new_with_policy(config, LinkPolicy::default())
    }

    /// Like [`Fetcher::new_with_config`], but every redirect target must
    /// also pass `policy`; a rejected hop ends the request with the policy
    /// error.
    pub fn new_with_policy(config: FetcherConfig, policy: LinkPolicy) -> Result<Self, PreviewError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .redirect(redirect_policy(config.max_redirects, policy))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| {
                error!(error = %e, "Failed to create HTTP client");
                PreviewError::SetupError(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Uses a caller-built client; `config.max_response_size` is still
    /// enforced, the other limits are whatever the client was built with.
    pub fn with_client(client: Client, config: FetcherConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// GETs `url`, following redirects up to the configured bound.
    ///
    /// Non-2xx answers become [`PreviewError::FetchHttpError`]. The body is
    /// read chunk by chunk and the request is dropped as soon as it grows
    /// past `max_response_size`.
    #[instrument(level = "debug", skip_all, fields(url = %url), err)]
    pub async fn fetch(&self, url: &Url) -> Result<FetchResult, PreviewError> {
        debug!("Starting fetch request");

        let mut response = self.client.get(url.clone()).send().await.map_err(|e| {
            debug!(error = %e, "Failed to send request");
            PreviewError::from_reqwest_error(e)
        })?;

        let final_url = response.url().clone();
        let status = response.status();
        if !status.is_success() {
            return Err(PreviewError::FetchHttpError {
                status: status.as_u16(),
                url: final_url.to_string(),
            });
        }

        let limit = self.config.max_response_size as u64;
        if let Some(declared) = response.content_length() {
            if declared > limit {
                return Err(PreviewError::ResourceTooLarge {
                    size: declared,
                    limit,
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(PreviewError::from_reqwest_error)?
        {
            let size = (body.len() + chunk.len()) as u64;
            if size > limit {
                return Err(PreviewError::ResourceTooLarge { size, limit });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(
            final_url = %final_url,
            content_length = body.len(),
            "Successfully fetched resource"
        );

        Ok(FetchResult {
            url: final_url,
            content_type,
            body,
        })
    }
}

/// Per-call limits for outbound requests.
///
/// # Examples
/// ```ignore
/// let fetcher = Fetcher::new_with_config(FetcherConfig {
///     timeout: Duration::from_secs(2),
///     max_response_size: 512 * 1024,
///     ..Default::default()
/// })?;
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    pub user_agent: String,
    /// Applies to each request on its own, never to a whole pipeline.
    #[serde(rename = "timeout_ms", deserialize_with = "duration_from_millis")]
    pub timeout: Duration,
    pub max_redirects: usize,
    pub max_response_size: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(5),
            max_redirects: 5,
            max_response_size: 2 * 1024 * 1024,
        }
    }
}

fn redirect_policy(max_redirects: usize, policy: LinkPolicy) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            let err = PreviewError::FetchNetworkError(format!(
                "too many redirects (limit {max_redirects})"
            ));
            return attempt.error(err);
        }

        match policy.check(attempt.url()) {
            Ok(()) => attempt.follow(),
            Err(e) => {
                debug!(target_url = %attempt.url(), error = %e, "Refusing redirect");
                attempt.error(e)
            }
        }
    })
}

fn duration_from_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_reads_timeout_in_millis() {
        let config: FetcherConfig =
            serde_json::from_str(r#"{"timeout_ms": 1500, "max_redirects": 2}"#).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_redirects, 2);
        assert_eq!(config.max_response_size, 2 * 1024 * 1024);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn fetchers_build_without_panicking() {
        assert!(Fetcher::new().is_ok());
        let config = FetcherConfig {
            max_redirects: 0,
            ..Default::default()
        };
        assert_eq!(Fetcher::new_with_config(config).unwrap().config().max_redirects, 0);
    }

    #[test]
    fn lossy_text_never_fails() {
        let result = FetchResult {
            url: Url::parse("http://example.com/").unwrap(),
            content_type: None,
            body: vec![b'<', b't', 0xff, b'>'],
        };
        assert_eq!(result.text(), "<t\u{fffd}>");
    }
}
