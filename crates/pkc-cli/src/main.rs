use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use pkc_schemas::Source;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "pkc")]
#[command(about = "Package keeper: reconcile installed software against a declared manifest", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Layered config YAML, in merge order. Repeatable.
    #[arg(long = "config", global = true)]
    pub config: Vec<PathBuf>,

    /// Manifest path (overrides paths.manifest)
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// History log path (overrides paths.history)
    #[arg(long, global = true)]
    pub history: Option<PathBuf>,

    /// What to do with config keys the engine never reads
    #[arg(long = "unused-keys", value_enum, default_value_t = UnusedKeys::Warn, global = true)]
    pub unused_keys: UnusedKeys,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeys {
    Warn,
    Fail,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan installed packages from every available source
    Scan {
        /// Restrict to these sources (apt | flatpak). Repeatable.
        #[arg(long = "source")]
        sources: Vec<Source>,

        /// Also write the scan as JSON for offline use
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Create a manifest that keeps every manual, unprotected package
    Init {
        /// Build from a scan export instead of a live scan
        #[arg(long = "from-scan")]
        from_scan: Option<PathBuf>,

        /// Overwrite an existing manifest
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Show new / missing / extra packages
    Diff {
        #[arg(long = "source")]
        sources: Vec<Source>,

        #[arg(long = "from-scan")]
        from_scan: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Install missing and remove extra packages. Guardrail: live runs require --yes.
    Apply {
        #[arg(long = "source")]
        sources: Vec<Source>,

        /// Purge configuration on removal (apt only)
        #[arg(long, default_value_t = false)]
        purge: bool,

        #[arg(long = "dry-run", default_value_t = false)]
        dry_run: bool,

        /// Acknowledge that packages will be installed and removed
        #[arg(long, default_value_t = false)]
        yes: bool,

        /// Plan from a scan export (dry-run only)
        #[arg(long = "from-scan")]
        from_scan: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Scan, bootstrap a missing manifest, merge advisor decisions, then apply.
    /// Guardrail: live runs require --yes.
    Sync {
        #[arg(long = "source")]
        sources: Vec<Source>,

        /// Advisor decisions to merge before applying
        #[arg(long)]
        decisions: Option<PathBuf>,

        #[arg(long, default_value_t = false)]
        purge: bool,

        #[arg(long = "dry-run", default_value_t = false)]
        dry_run: bool,

        #[arg(long, default_value_t = false)]
        yes: bool,

        /// Plan from a scan export (dry-run only)
        #[arg(long = "from-scan")]
        from_scan: Option<PathBuf>,
    },

    /// Remove named packages. Protected names are refused.
    Remove {
        #[arg(long)]
        source: Source,

        #[arg(required = true)]
        names: Vec<String>,

        #[arg(long, default_value_t = false)]
        purge: bool,

        #[arg(long = "dry-run", default_value_t = false)]
        dry_run: bool,

        #[arg(long, default_value_t = false)]
        yes: bool,
    },

    /// Exchange files with an external advisor
    Advisor {
        #[command(subcommand)]
        cmd: AdvisorCmd,
    },

    /// List recorded batches, newest first
    History {
        #[arg(long)]
        limit: Option<usize>,

        /// RFC3339 timestamp or YYYY-MM-DD
        #[arg(long)]
        since: Option<String>,

        /// Oldest first
        #[arg(long, default_value_t = false)]
        chronological: bool,

        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Reverse recent batches by appending compensating ones
    Undo {
        /// Number of most recent batches to reverse (default 1)
        #[arg(long, conflicts_with = "since")]
        steps: Option<usize>,

        /// Reverse every batch at or after this time
        #[arg(long)]
        since: Option<String>,

        #[arg(long = "dry-run", default_value_t = false)]
        dry_run: bool,

        #[arg(long, default_value_t = false)]
        yes: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdvisorCmd {
    /// Write a scan export for the advisor to classify
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Merge an advisor decisions file into the manifest
    Apply {
        /// Decisions file (TOML, or JSON with a .json extension)
        #[arg(long)]
        decisions: PathBuf,

        #[arg(long = "dry-run", default_value_t = false)]
        dry_run: bool,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn init_tracing() {
    // stdout carries key=value results; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let g = &cli.global;

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let loaded = pkc_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Scan { sources, export } => commands::inventory::scan(g, &sources, export.as_deref())?,

        Commands::Init { from_scan, force } => commands::inventory::init(g, from_scan.as_deref(), force)?,

        Commands::Diff {
            sources,
            from_scan,
            json,
        } => commands::inventory::diff(g, &sources, from_scan.as_deref(), json)?,

        Commands::Apply {
            sources,
            purge,
            dry_run,
            yes,
            from_scan,
            json,
        } => commands::apply::apply(
            g,
            commands::apply::ApplyArgs {
                sources,
                purge,
                dry_run,
                yes,
                from_scan,
                json,
            },
        )?,

        Commands::Sync {
            sources,
            decisions,
            purge,
            dry_run,
            yes,
            from_scan,
        } => commands::sync::sync(
            g,
            commands::sync::SyncArgs {
                sources,
                decisions,
                purge,
                dry_run,
                yes,
                from_scan,
            },
        )?,

        Commands::Remove {
            source,
            names,
            purge,
            dry_run,
            yes,
        } => commands::apply::remove(g, source, &names, purge, dry_run, yes)?,

        Commands::Advisor { cmd } => match cmd {
            AdvisorCmd::Export { out } => commands::advisor::export(g, out.as_deref())?,
            AdvisorCmd::Apply {
                decisions,
                dry_run,
                json,
            } => commands::advisor::apply(g, &decisions, dry_run, json)?,
        },

        Commands::History {
            limit,
            since,
            chronological,
            json,
        } => commands::history::list(g, limit, since.as_deref(), chronological, json)?,

        Commands::Undo {
            steps,
            since,
            dry_run,
            yes,
        } => commands::history::undo(g, steps, since.as_deref(), dry_run, yes)?,
    }

    Ok(())
}
