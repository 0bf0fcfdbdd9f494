use std::fmt;
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use url::Url;

use crate::error::error_chain;
use crate::{AssetKey, Backoff, RemoteStore, StoreError, PARTIAL_PREFIX, PARTIAL_SUFFIX, USER_AGENT};

/// Access key pair sent as HTTP basic auth on every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Total attempts per request, including the first one.
    pub max_attempts: u32,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub backoff: Backoff,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            backoff: Backoff::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub endpoint: Url,
    pub bucket: String,
    pub credentials: Option<Credentials>,
    pub transport: TransportConfig,
}

/// Object store reached over HTTP with path-style addressing:
/// `HEAD {endpoint}/{bucket}` probes, `GET {endpoint}/{bucket}?list-type=2`
/// lists, `GET {endpoint}/{bucket}/{key}` downloads.
pub struct HttpObjectStore {
    client: Client,
    bucket_url: Url,
    credentials: Option<Credentials>,
    transport: TransportConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListObjectsPage {
    #[serde(default)]
    contents: Vec<ObjectSummary>,
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ObjectSummary {
    key: String,
}

impl HttpObjectStore {
    /// Build a client for the configured bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint or bucket cannot form a valid URL, or
    /// if the HTTP client cannot be constructed.
    pub fn new(config: RemoteConfig) -> Result<Self, StoreError> {
        let bucket_url = bucket_url(&config.endpoint, &config.bucket)?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.transport.connect_timeout)
            .timeout(config.transport.read_timeout)
            .no_proxy()
            .build()
            .map_err(StoreError::Client)?;
        Ok(Self {
            client,
            bucket_url,
            credentials: config.credentials,
            transport: config.transport,
        })
    }

    #[must_use]
    pub fn bucket_url(&self) -> &Url {
        &self.bucket_url
    }

    /// Single-attempt `HEAD` on the bucket, bounded by the connect timeout.
    ///
    /// # Errors
    ///
    /// Returns the transport or status failure.
    pub fn try_probe(&self) -> Result<(), StoreError> {
        let request = self
            .client
            .head(self.bucket_url.clone())
            .timeout(self.transport.connect_timeout);
        self.send(&self.bucket_url, request).map(|_| ())
    }

    /// List every key in the bucket, following continuation tokens.
    ///
    /// # Errors
    ///
    /// Returns the first page failure that survives the retry policy.
    pub fn try_list(&self) -> Result<Vec<AssetKey>, StoreError> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut url = self.bucket_url.clone();
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("list-type", "2");
                if let Some(token) = &token {
                    query.append_pair("continuation-token", token);
                }
            }

            let page = self.with_retries("list", || {
                let response = self.send(&url, self.client.get(url.clone()))?;
                response
                    .json::<ListObjectsPage>()
                    .map_err(|source| StoreError::Listing {
                        url: url.to_string(),
                        source,
                    })
            })?;

            for object in page.contents {
                let key = AssetKey::new(object.key);
                if key.is_directory_marker() {
                    tracing::trace!(key = %key, "skipping directory placeholder");
                    continue;
                }
                keys.push(key);
            }

            match page.next_continuation_token {
                Some(next) if page.is_truncated => {
                    if token.as_deref() == Some(next.as_str()) {
                        tracing::warn!(token = %next, "listing repeated its continuation token");
                        break;
                    }
                    token = Some(next);
                }
                _ => break,
            }
        }
        Ok(keys)
    }

    /// Download `key` into `destination` and return the number of bytes
    /// written.
    ///
    /// The body streams into a hidden temporary file next to `destination`
    /// which is renamed into place only once the transfer completes.
    ///
    /// # Errors
    ///
    /// Returns the failure that survives the retry policy.
    pub fn try_fetch(&self, key: &AssetKey, destination: &Path) -> Result<u64, StoreError> {
        let url = self.object_url(key)?;
        let directory = destination
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        self.with_retries("fetch", || {
            let mut response = self.send(&url, self.client.get(url.clone()))?;
            let mut partial = tempfile::Builder::new()
                .prefix(PARTIAL_PREFIX)
                .suffix(PARTIAL_SUFFIX)
                .tempfile_in(directory)
                .map_err(|source| StoreError::io(directory, source))?;
            let written = response
                .copy_to(&mut partial)
                .map_err(|source| StoreError::Transport {
                    url: url.to_string(),
                    source,
                })?;
            partial
                .persist(destination)
                .map_err(|err| StoreError::io(destination, err.error))?;
            Ok(written)
        })
    }

    fn object_url(&self, key: &AssetKey) -> Result<Url, StoreError> {
        let mut url = self.bucket_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::InvalidEndpoint {
                endpoint: self.bucket_url.to_string(),
                reason: "endpoint cannot carry a path".into(),
            })?
            .extend(key.segments());
        Ok(url)
    }

    fn send(&self, url: &Url, request: RequestBuilder) -> Result<Response, StoreError> {
        let request = match &self.credentials {
            Some(credentials) => request.basic_auth(
                &credentials.access_key_id,
                Some(&credentials.secret_access_key),
            ),
            None => request,
        };
        let response = request.send().map_err(|source| StoreError::Transport {
            url: url.to_string(),
            source,
        })?;
        check_status(url, response)
    }

    fn with_retries<T>(
        &self,
        operation: &str,
        mut attempt: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let max_attempts = self.transport.max_attempts.max(1);
        let mut tried = 1;
        loop {
            match attempt() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && tried < max_attempts => {
                    let delay = self.transport.backoff.delay(
                        tried,
                        err.retry_after(),
                        err.is_throttled(),
                    );
                    tracing::debug!(
                        operation,
                        attempt = tried,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error_chain(&err),
                        "retrying remote store request"
                    );
                    thread::sleep(delay);
                    tried += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl RemoteStore for HttpObjectStore {
    fn list(&self) -> Vec<AssetKey> {
        match self.try_list() {
            Ok(keys) => {
                tracing::debug!(count = keys.len(), bucket = %self.bucket_url, "listed remote assets");
                keys
            }
            Err(err) => {
                tracing::warn!(error = %error_chain(&err), "failed to list remote assets");
                Vec::new()
            }
        }
    }

    fn fetch(&self, key: &AssetKey, destination: &Path) -> bool {
        match self.try_fetch(key, destination) {
            Ok(bytes) => {
                tracing::debug!(key = %key, bytes, "downloaded asset");
                true
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %error_chain(&err), "failed to download asset");
                false
            }
        }
    }

    fn probe(&self) -> bool {
        match self.try_probe() {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(error = %error_chain(&err), "remote store probe failed");
                false
            }
        }
    }
}

fn bucket_url(endpoint: &Url, bucket: &str) -> Result<Url, StoreError> {
    let invalid = |reason: &str| StoreError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };
    if !matches!(endpoint.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if bucket.is_empty() || bucket.contains('/') {
        return Err(invalid("bucket name must be a single non-empty path segment"));
    }

    let mut url = endpoint.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|()| invalid("endpoint cannot carry a path"))?
        .pop_if_empty()
        .push(bucket);
    Ok(url)
}

fn check_status(url: &Url, response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    Err(StoreError::Status {
        url: url.to_string(),
        status,
        retry_after,
    })
}
