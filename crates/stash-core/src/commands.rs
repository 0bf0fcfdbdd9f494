use anyhow::{Context, Result};
use serde_json::json;
use stash_store::AssetKey;

use crate::catalog::load_catalog;
use crate::context::AssetContext;
use crate::outcome::ExecutionOutcome;
use crate::populate::PopulateOutcome;
use crate::progress::ProgressObserver;

/// A `stash` operation, independent of how it was invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StashCommand {
    Probe,
    List,
    Fetch { keys: Vec<String>, refresh: bool },
    Populate { refresh: bool },
    Status,
    Catalog,
}

impl StashCommand {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::List => "list",
            Self::Fetch { .. } => "fetch",
            Self::Populate { .. } => "populate",
            Self::Status => "status",
            Self::Catalog => "catalog",
        }
    }
}

/// Run `command` against `ctx`.
///
/// Asset-level failures become failure outcomes; only unexpected local I/O
/// problems surface as errors.
///
/// # Errors
///
/// Returns an error when the cache root cannot be inspected.
pub fn execute(ctx: &AssetContext, command: &StashCommand) -> Result<ExecutionOutcome> {
    tracing::debug!(command = command.name(), "executing");
    match command {
        StashCommand::Probe => Ok(probe(ctx)),
        StashCommand::List => Ok(list(ctx)),
        StashCommand::Fetch { keys, refresh } => Ok(fetch(ctx, keys, *refresh)),
        StashCommand::Populate { refresh } => Ok(populate(ctx, *refresh)),
        StashCommand::Status => status(ctx),
        StashCommand::Catalog => Ok(catalog(ctx)),
    }
}

fn remote_details(ctx: &AssetContext) -> serde_json::Value {
    let remote = ctx.config().remote();
    json!({
        "endpoint": remote.endpoint.as_str(),
        "bucket": remote.bucket,
    })
}

fn probe(ctx: &AssetContext) -> ExecutionOutcome {
    let mut details = remote_details(ctx);
    if ctx.gate().is_available() {
        details["available"] = json!(true);
        ExecutionOutcome::success("remote store available", details)
    } else {
        details["available"] = json!(false);
        details["hint"] = json!("check REMOTE_STORE_ENDPOINT and credentials");
        ExecutionOutcome::failure("remote store unavailable", details)
    }
}

fn list(ctx: &AssetContext) -> ExecutionOutcome {
    if !ctx.gate().is_available() {
        return ExecutionOutcome::failure("remote store unavailable", remote_details(ctx));
    }
    let keys = ctx.remote().list();
    let mut details = remote_details(ctx);
    details["count"] = json!(keys.len());
    details["keys"] = json!(keys);
    ExecutionOutcome::success(format!("{} assets available", keys.len()), details)
}

fn fetch(ctx: &AssetContext, raw_keys: &[String], refresh: bool) -> ExecutionOutcome {
    let keys: Vec<AssetKey> = raw_keys.iter().map(|key| AssetKey::new(key.as_str())).collect();
    let fetcher = ctx.fetcher();
    let mut progress = ProgressObserver::new("fetching assets");
    let report = fetcher.fetch_all_observed(&keys, refresh, &mut progress);
    let counts = report.counts();

    let details = json!({
        "cache_root": ctx.config().cache().root,
        "counts": counts,
        "assets": report,
    });
    if report.all_present() {
        let message = format!(
            "{} assets ready ({} cached, {} fetched)",
            counts.requested, counts.cached, counts.fetched
        );
        progress.finish(&message);
        ExecutionOutcome::success(message, details)
    } else {
        let message = format!("{} of {} assets unavailable", counts.absent, counts.requested);
        progress.finish(&message);
        ExecutionOutcome::failure(message, details)
    }
}

fn populate(ctx: &AssetContext, refresh: bool) -> ExecutionOutcome {
    let root = ctx.config().cache().root.clone();
    let mut progress = ProgressObserver::new("populating cache");
    let outcome = ctx.populator().populate_report(&root, refresh, &mut progress);
    let absent = progress.absent();

    let mut details = json!({ "cache_root": root, "result": outcome });
    let result = match &outcome {
        PopulateOutcome::Completed { report } if report.all_present() => {
            details["counts"] = json!(report.counts());
            ExecutionOutcome::success(format!("cached {} assets", report.len()), details)
        }
        PopulateOutcome::Completed { report } => {
            details["counts"] = json!(report.counts());
            ExecutionOutcome::failure(
                format!("{absent} of {} assets could not be cached", report.len()),
                details,
            )
        }
        PopulateOutcome::RemoteUnavailable => {
            ExecutionOutcome::failure("remote store unavailable", details)
        }
        PopulateOutcome::EmptyInventory => {
            ExecutionOutcome::failure("remote store lists no assets", details)
        }
        PopulateOutcome::CacheRootUnavailable { error, .. } => ExecutionOutcome::failure(
            format!("cache root {} is unusable: {error}", root.display()),
            details,
        ),
    };
    progress.finish(&result.message);
    result
}

fn status(ctx: &AssetContext) -> Result<ExecutionOutcome> {
    let cache = ctx.cache();
    let config = ctx.config().cache();
    let usage = cache
        .usage()
        .with_context(|| format!("failed to inspect cache root {}", cache.root().display()))?;
    let message = if usage.exists {
        format!(
            "{} assets cached ({} bytes)",
            usage.total_entries, usage.total_size_bytes
        )
    } else {
        "cache root does not exist yet".to_string()
    };
    Ok(ExecutionOutcome::success(
        message,
        json!({
            "cache_root": cache.root(),
            "source": config.source,
            "fallback": config.fallback,
            "usage": usage,
        }),
    ))
}

fn catalog(ctx: &AssetContext) -> ExecutionOutcome {
    let config = ctx.config().cache();
    match load_catalog(&ctx.populator(), &config.root, config.fallback.as_deref()) {
        Ok(catalog) => ExecutionOutcome::success(
            format!("{} assets catalogued", catalog.len()),
            json!(catalog),
        ),
        Err(err) => ExecutionOutcome::user_error(
            format!("{err:#}"),
            json!({
                "cache_root": config.root,
                "hint": "set BUNDLED_ASSETS_DIR or pass --fallback to use bundled assets",
            }),
        ),
    }
}
