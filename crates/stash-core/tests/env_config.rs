use std::env;
use std::path::PathBuf;

use serial_test::serial;
use stash_core::{Config, DEFAULT_BUCKET};

struct EnvGuard {
    key: &'static str,
    previous: Option<String>,
}

impl EnvGuard {
    fn set(key: &'static str, value: Option<&str>) -> Self {
        let previous = env::var(key).ok();
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
        Self { key, previous }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(value) => env::set_var(self.key, value),
            None => env::remove_var(self.key),
        }
    }
}

#[test]
#[serial]
fn process_environment_is_read() -> anyhow::Result<()> {
    let _endpoint = EnvGuard::set("REMOTE_STORE_ENDPOINT", Some("http://10.0.0.5:9000"));
    let _bucket = EnvGuard::set("REMOTE_BUCKET_NAME", None);
    let _legacy = EnvGuard::set("S3_BUCKET_NAME", Some("from-legacy"));
    let _root = EnvGuard::set("CACHE_ROOT_DIR", Some("assets-cache"));
    let _workers = EnvGuard::set("ASSET_FETCH_CONCURRENCY", Some("6"));

    let config = Config::from_env()?;

    assert_eq!(config.remote().endpoint.host_str(), Some("10.0.0.5"));
    assert_eq!(config.remote().bucket, "from-legacy");
    assert_eq!(config.cache().root, PathBuf::from("assets-cache"));
    assert_eq!(config.fetch().concurrency, 6);
    Ok(())
}

#[test]
#[serial]
fn unset_environment_uses_defaults() -> anyhow::Result<()> {
    let _bucket = EnvGuard::set("REMOTE_BUCKET_NAME", None);
    let _legacy = EnvGuard::set("S3_BUCKET_NAME", None);
    let _workers = EnvGuard::set("ASSET_FETCH_CONCURRENCY", None);

    let config = Config::from_env()?;

    assert_eq!(config.remote().bucket, DEFAULT_BUCKET);
    assert_eq!(config.fetch().concurrency, 4);
    Ok(())
}

#[test]
#[serial]
fn malformed_concurrency_is_rejected() {
    let _workers = EnvGuard::set("ASSET_FETCH_CONCURRENCY", Some("lots"));
    let err = Config::from_env().map(|_| ()).map_err(|err| format!("{err:#}"));
    assert!(matches!(err, Err(message) if message.contains("ASSET_FETCH_CONCURRENCY")));
}
