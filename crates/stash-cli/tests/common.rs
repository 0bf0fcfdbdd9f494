#![allow(dead_code)]

use std::net::TcpListener;

use assert_cmd::assert::Assert;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;

const CLEARED_ENV: &[&str] = &[
    "REMOTE_STORE_ENDPOINT",
    "REMOTE_STORE_ENDPOINT_CREDENTIALS",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "REMOTE_BUCKET_NAME",
    "S3_BUCKET_NAME",
    "CACHE_ROOT_DIR",
    "BUNDLED_ASSETS_DIR",
    "ASSET_FETCH_CONCURRENCY",
    "STASH_PROGRESS",
    "NO_COLOR",
];

/// `stash` pointed at `endpoint` with an isolated environment.
pub fn stash_cmd(endpoint: &str) -> Command {
    let mut cmd = cargo_bin_cmd!("stash");
    for key in CLEARED_ENV {
        cmd.env_remove(key);
    }
    cmd.env("REMOTE_STORE_ENDPOINT", endpoint)
        .env("REMOTE_STORE_MAX_ATTEMPTS", "1")
        .env("REMOTE_STORE_CONNECT_TIMEOUT_SECS", "2")
        .env("REMOTE_STORE_READ_TIMEOUT_SECS", "5")
        .env("STASH_PROGRESS", "0");
    cmd
}

/// An endpoint on a port nothing listens on.
pub fn closed_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}/")
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}
