use std::path::PathBuf;

use clap::{value_parser, ArgAction, Args, Parser, Subcommand};
use stash_core::StashCommand;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Remote-backed asset cache",
    long_about = "Mirror a remote object store into a local asset cache and resolve assets from it.",
    after_help = "Examples:\n  stash probe\n  stash --json populate\n  stash fetch sprites/hero.png sounds/theme.mp3\n  stash catalog --fallback bundled_assets"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct StashCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[arg(
        long,
        value_name = "DIR",
        value_parser = value_parser!(PathBuf),
        help = "Local cache root (overrides CACHE_ROOT_DIR)",
        global = true
    )]
    pub cache_root: Option<PathBuf>,
    #[arg(
        long,
        value_name = "NAME",
        help = "Remote bucket (overrides REMOTE_BUCKET_NAME)",
        global = true
    )]
    pub bucket: Option<String>,
    #[arg(
        long,
        value_name = "N",
        value_parser = value_parser!(usize),
        help = "Parallel downloads (overrides ASSET_FETCH_CONCURRENCY)",
        global = true
    )]
    pub concurrency: Option<usize>,
    #[command(subcommand)]
    pub command: StashSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum StashSubcommand {
    #[command(about = "Check whether the remote store is reachable.")]
    Probe,
    #[command(about = "List every asset key in the remote store.")]
    List,
    #[command(
        about = "Resolve assets into the cache, downloading only what is missing.",
        override_usage = "stash fetch <KEY>... [--refresh]"
    )]
    Fetch(FetchArgs),
    #[command(about = "Mirror the whole remote inventory into the cache root.")]
    Populate(RefreshArgs),
    #[command(about = "Show what the cache root currently holds (read-only).")]
    Status,
    #[command(
        about = "Populate the cache and print the asset catalog, falling back to bundled assets.",
        override_usage = "stash catalog [--fallback DIR]"
    )]
    Catalog(CatalogArgs),
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    #[arg(value_name = "KEY", required = true, help = "Asset keys to resolve")]
    pub keys: Vec<String>,
    #[command(flatten)]
    pub refresh: RefreshArgs,
}

#[derive(Args, Debug)]
pub struct RefreshArgs {
    #[arg(long, help = "Download even when a cached copy exists")]
    pub refresh: bool,
}

#[derive(Args, Debug)]
pub struct CatalogArgs {
    #[arg(
        long,
        value_name = "DIR",
        value_parser = value_parser!(PathBuf),
        help = "Bundled asset directory (overrides BUNDLED_ASSETS_DIR)"
    )]
    pub fallback: Option<PathBuf>,
}

impl StashSubcommand {
    pub fn to_command(&self) -> StashCommand {
        match self {
            Self::Probe => StashCommand::Probe,
            Self::List => StashCommand::List,
            Self::Fetch(args) => StashCommand::Fetch {
                keys: args.keys.clone(),
                refresh: args.refresh.refresh,
            },
            Self::Populate(args) => StashCommand::Populate {
                refresh: args.refresh,
            },
            Self::Status => StashCommand::Status,
            Self::Catalog(_) => StashCommand::Catalog,
        }
    }
}
