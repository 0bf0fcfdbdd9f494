use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use stash_store::{Credentials, RemoteConfig, TransportConfig};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:9000";
pub const DEFAULT_BUCKET: &str = "game-assets";
pub const DEFAULT_CACHE_ROOT: &str = "local_assets";
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const MAX_CONCURRENCY: usize = 64;

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    /// Value of `key`, treating blank values as unset.
    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.var(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .with_context(|| format!("{key} must be a number (got '{raw}')"))
            })
            .transpose()
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) remote: RemoteConfig,
    pub(crate) cache: CacheConfig,
    pub(crate) fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub root: PathBuf,
    /// Where the root came from, for diagnostics.
    pub source: &'static str,
    pub fallback: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    pub concurrency: usize,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending variable when a value is
    /// malformed.
    pub fn from_env() -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Result<Self> {
        let endpoint_raw = snapshot
            .var("REMOTE_STORE_ENDPOINT")
            .unwrap_or(DEFAULT_ENDPOINT);
        let endpoint = Url::parse(endpoint_raw.trim())
            .with_context(|| format!("REMOTE_STORE_ENDPOINT is not a valid URL ('{endpoint_raw}')"))?;

        let bucket = snapshot
            .var("REMOTE_BUCKET_NAME")
            .or_else(|| snapshot.var("S3_BUCKET_NAME"))
            .unwrap_or(DEFAULT_BUCKET)
            .trim()
            .to_string();

        let defaults = TransportConfig::default();
        let max_attempts = snapshot
            .parsed::<u32>("REMOTE_STORE_MAX_ATTEMPTS")?
            .unwrap_or(defaults.max_attempts)
            .max(1);
        let connect_timeout = snapshot
            .parsed::<u64>("REMOTE_STORE_CONNECT_TIMEOUT_SECS")?
            .map_or(defaults.connect_timeout, Duration::from_secs);
        let read_timeout = snapshot
            .parsed::<u64>("REMOTE_STORE_READ_TIMEOUT_SECS")?
            .map_or(defaults.read_timeout, Duration::from_secs);

        let (root, source) = match snapshot.var("CACHE_ROOT_DIR") {
            Some(dir) => (PathBuf::from(dir), "CACHE_ROOT_DIR"),
            None => (PathBuf::from(DEFAULT_CACHE_ROOT), "default"),
        };

        let concurrency = snapshot
            .parsed::<usize>("ASSET_FETCH_CONCURRENCY")?
            .unwrap_or(DEFAULT_CONCURRENCY)
            .clamp(1, MAX_CONCURRENCY);

        Ok(Self {
            remote: RemoteConfig {
                endpoint,
                bucket,
                credentials: credentials_from(snapshot)?,
                transport: TransportConfig {
                    max_attempts,
                    connect_timeout,
                    read_timeout,
                    ..defaults
                },
            },
            cache: CacheConfig {
                root,
                source,
                fallback: snapshot.var("BUNDLED_ASSETS_DIR").map(PathBuf::from),
            },
            fetch: FetchConfig { concurrency },
        })
    }

    #[must_use]
    pub fn remote(&self) -> &RemoteConfig {
        &self.remote
    }

    #[must_use]
    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }

    #[must_use]
    pub fn fetch(&self) -> FetchConfig {
        self.fetch
    }

    #[must_use]
    pub fn with_cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache.root = root.into();
        self.cache.source = "--cache-root";
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<PathBuf>) -> Self {
        self.cache.fallback = Some(fallback.into());
        self
    }

    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.remote.bucket = bucket.into();
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch.concurrency = concurrency.clamp(1, MAX_CONCURRENCY);
        self
    }
}

fn credentials_from(snapshot: &EnvSnapshot) -> Result<Option<Credentials>> {
    if let Some(raw) = snapshot.var("REMOTE_STORE_ENDPOINT_CREDENTIALS") {
        let (access, secret) = raw.split_once(':').ok_or_else(|| {
            anyhow!("REMOTE_STORE_ENDPOINT_CREDENTIALS must look like ACCESS_KEY:SECRET")
        })?;
        if access.is_empty() || secret.is_empty() {
            bail!("REMOTE_STORE_ENDPOINT_CREDENTIALS must name both an access key and a secret");
        }
        return Ok(Some(Credentials::new(access, secret)));
    }

    match (
        snapshot.var("AWS_ACCESS_KEY_ID"),
        snapshot.var("AWS_SECRET_ACCESS_KEY"),
    ) {
        (Some(access), Some(secret)) => Ok(Some(Credentials::new(access, secret))),
        (None, None) => Ok(None),
        _ => bail!("AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must be set together"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() -> Result<()> {
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[]))?;
        assert_eq!(config.remote.endpoint.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(config.remote.bucket, DEFAULT_BUCKET);
        assert!(config.remote.credentials.is_none());
        assert_eq!(config.remote.transport, TransportConfig::default());
        assert_eq!(config.cache.root, PathBuf::from("local_assets"));
        assert_eq!(config.cache.source, "default");
        assert!(config.cache.fallback.is_none());
        assert_eq!(config.fetch.concurrency, 4);
        Ok(())
    }

    #[test]
    fn environment_overrides_are_applied() -> Result<()> {
        let snapshot = EnvSnapshot::testing(&[
            ("REMOTE_STORE_ENDPOINT", "https://assets.example.com/store"),
            ("REMOTE_STORE_ENDPOINT_CREDENTIALS", "AKID:secret"),
            ("REMOTE_BUCKET_NAME", "level-pack"),
            ("CACHE_ROOT_DIR", "/tmp/game-cache"),
            ("BUNDLED_ASSETS_DIR", "assets"),
            ("ASSET_FETCH_CONCURRENCY", "8"),
            ("REMOTE_STORE_MAX_ATTEMPTS", "5"),
            ("REMOTE_STORE_CONNECT_TIMEOUT_SECS", "2"),
            ("REMOTE_STORE_READ_TIMEOUT_SECS", "30"),
        ]);
        let config = Config::from_snapshot(&snapshot)?;
        assert_eq!(config.remote.endpoint.host_str(), Some("assets.example.com"));
        assert_eq!(config.remote.bucket, "level-pack");
        assert_eq!(
            config.remote.credentials.as_ref().map(Credentials::access_key_id),
            Some("AKID")
        );
        assert_eq!(config.remote.transport.max_attempts, 5);
        assert_eq!(config.remote.transport.connect_timeout, Duration::from_secs(2));
        assert_eq!(config.remote.transport.read_timeout, Duration::from_secs(30));
        assert_eq!(config.cache.root, PathBuf::from("/tmp/game-cache"));
        assert_eq!(config.cache.source, "CACHE_ROOT_DIR");
        assert_eq!(config.cache.fallback, Some(PathBuf::from("assets")));
        assert_eq!(config.fetch.concurrency, 8);
        Ok(())
    }

    #[test]
    fn legacy_bucket_and_aws_credentials_are_honored() -> Result<()> {
        let snapshot = EnvSnapshot::testing(&[
            ("S3_BUCKET_NAME", "legacy-bucket"),
            ("AWS_ACCESS_KEY_ID", "AKIDLEGACY"),
            ("AWS_SECRET_ACCESS_KEY", "legacy-secret"),
        ]);
        let config = Config::from_snapshot(&snapshot)?;
        assert_eq!(config.remote.bucket, "legacy-bucket");
        assert_eq!(
            config.remote.credentials.as_ref().map(Credentials::access_key_id),
            Some("AKIDLEGACY")
        );
        Ok(())
    }

    #[test]
    fn concurrency_is_clamped() -> Result<()> {
        let zero = Config::from_snapshot(&EnvSnapshot::testing(&[("ASSET_FETCH_CONCURRENCY", "0")]))?;
        assert_eq!(zero.fetch.concurrency, 1);
        let huge = zero.with_concurrency(10_000);
        assert_eq!(huge.fetch.concurrency, 64);
        Ok(())
    }

    #[test]
    fn blank_values_fall_back_to_defaults() -> Result<()> {
        let snapshot = EnvSnapshot::testing(&[("CACHE_ROOT_DIR", "  "), ("REMOTE_BUCKET_NAME", "")]);
        let config = Config::from_snapshot(&snapshot)?;
        assert_eq!(config.cache.root, PathBuf::from(DEFAULT_CACHE_ROOT));
        assert_eq!(config.remote.bucket, DEFAULT_BUCKET);
        Ok(())
    }

    #[test]
    fn malformed_values_name_the_variable() {
        let cases: &[(&str, &str, &str)] = &[
            ("ASSET_FETCH_CONCURRENCY", "many", "ASSET_FETCH_CONCURRENCY"),
            ("REMOTE_STORE_ENDPOINT", "not a url", "REMOTE_STORE_ENDPOINT"),
            (
                "REMOTE_STORE_ENDPOINT_CREDENTIALS",
                "no-separator",
                "REMOTE_STORE_ENDPOINT_CREDENTIALS",
            ),
            ("AWS_ACCESS_KEY_ID", "AKID", "AWS_SECRET_ACCESS_KEY"),
        ];
        for (key, value, expected) in cases {
            let err = Config::from_snapshot(&EnvSnapshot::testing(&[(*key, *value)]))
                .expect_err("malformed value should be rejected");
            assert!(
                format!("{err:#}").contains(expected),
                "error for {key}={value} should mention {expected}: {err:#}"
            );
        }
    }

    #[test]
    fn cli_overrides_replace_environment_values() -> Result<()> {
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[]))?
            .with_cache_root("/srv/cache")
            .with_bucket("other")
            .with_fallback("bundled");
        assert_eq!(config.cache.root, PathBuf::from("/srv/cache"));
        assert_eq!(config.cache.source, "--cache-root");
        assert_eq!(config.remote.bucket, "other");
        assert_eq!(config.cache.fallback, Some(PathBuf::from("bundled")));
        Ok(())
    }
}
