use atty::Stream;
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};
use stash_core::{AssetContext, CommandStatus, Config, ExecutionOutcome, StashCommand};

mod cli;
mod style;

use cli::{StashCli, StashSubcommand};
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = StashCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let command = cli.command.to_command();
    let outcome = match build_context(&cli) {
        Ok(ctx) => stash_core::execute(&ctx, &command).map_err(|err| eyre!("{err:?}"))?,
        Err(err) => ExecutionOutcome::user_error(
            format!("{err:#}"),
            json!({ "hint": "check the REMOTE_STORE_* and CACHE_ROOT_DIR environment variables" }),
        ),
    };
    let code = emit_output(&cli, &command, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn build_context(cli: &StashCli) -> anyhow::Result<AssetContext> {
    let mut config = Config::from_env()?;
    if let Some(root) = &cli.cache_root {
        config = config.with_cache_root(root);
    }
    if let Some(bucket) = &cli.bucket {
        config = config.with_bucket(bucket);
    }
    if let Some(concurrency) = cli.concurrency {
        config = config.with_concurrency(concurrency);
    }
    if let StashSubcommand::Catalog(args) = &cli.command {
        if let Some(fallback) = &args.fallback {
            config = config.with_fallback(fallback);
        }
    }
    AssetContext::from_config(config)
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("stash={level},stash_cli={level},stash_core={level},stash_store={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(cli: &StashCli, command: &StashCommand, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.exit_code();
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = stash_core::to_json_response(command.name(), outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !cli.quiet {
        if let Some(table) = render_table(&style, command, &outcome.details) {
            println!("{table}");
        }
        let message = stash_core::format_status_message(command.name(), &outcome.message);
        let line = style.status(outcome.status, &message);
        if outcome.status == CommandStatus::Ok {
            println!("{line}");
        } else {
            eprintln!("{line}");
        }
        if let Some(hint) = hint_from_details(&outcome.details) {
            eprintln!("{}", style.info(&format!("Hint: {hint}")));
        }
    }

    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}

fn render_table(style: &Style, command: &StashCommand, details: &Value) -> Option<String> {
    match command {
        StashCommand::List => {
            let keys = details.get("keys")?.as_array()?;
            let lines: Vec<&str> = keys.iter().filter_map(Value::as_str).collect();
            (!lines.is_empty()).then(|| lines.join("\n"))
        }
        StashCommand::Fetch { .. } => render_assets(style, details.get("assets")?),
        StashCommand::Populate { .. } => {
            let report = details.get("result")?.get("report")?;
            let rows = report.as_object()?;
            let failed: serde_json::Map<String, Value> = rows
                .iter()
                .filter(|(_, result)| result.get("status").and_then(Value::as_str) == Some("absent"))
                .map(|(key, result)| (key.clone(), result.clone()))
                .collect();
            render_assets(style, &Value::Object(failed))
        }
        StashCommand::Catalog => {
            let assets = details.get("assets")?.as_object()?;
            if assets.is_empty() {
                return None;
            }
            let width = assets.keys().map(String::len).max().unwrap_or(0);
            let mut lines = vec![style.table_header(&format!("{:<width$}  {:<5}  PATH", "NAME", "KIND"))];
            for (name, entry) in assets {
                let kind = entry.get("kind").and_then(Value::as_str).unwrap_or("?");
                let path = entry.get("path").and_then(Value::as_str).unwrap_or("");
                lines.push(format!("{name:<width$}  {kind:<5}  {}", style.dim(path)));
            }
            Some(lines.join("\n"))
        }
        StashCommand::Probe | StashCommand::Status => None,
    }
}

fn render_assets(style: &Style, assets: &Value) -> Option<String> {
    let assets = assets.as_object()?;
    if assets.is_empty() {
        return None;
    }
    let lines: Vec<String> = assets
        .iter()
        .map(|(key, result)| {
            let state = result.get("status").and_then(Value::as_str).unwrap_or("absent");
            let detail = result
                .get("path")
                .or_else(|| result.get("reason"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            format!("{} {key}  {}", style.asset_state(state), style.dim(detail))
        })
        .collect();
    Some(lines.join("\n"))
}
