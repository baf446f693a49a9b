mod logging;
mod render;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use audioshelf_client::{CatalogApi, CatalogClient, ClientError, DuplicatesResponse, ReviewRunner};
use audioshelf_core::{
    AppConfig, Database, DeletionCoordinator, DuplicateGroup, DuplicateGrouper, EquivalenceMode,
    ExitCode, HashGenerator, HashRunOptions, ImportOptions, RecordId, ReviewCommand, ReviewSession,
    SelectionTracker, ShelfError, ViewStatus, import_file,
};

use render::{print_json, print_notices};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "audioshelf",
    about = "Find duplicate audiobooks and remove extra copies safely",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format. Also enabled by setting AUDIOSHELF_JSON=1.
    #[arg(long, global = true)]
    json: bool,

    /// Raise log verbosity (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the scanner's JSON export into the catalog.
    Import {
        file: PathBuf,
        /// Replace the catalog, keeping narrators and genres by file path.
        #[arg(long)]
        replace: bool,
    },

    /// Show library statistics.
    Stats,

    /// List duplicate groups.
    Dupes {
        /// `hash` (identical files) or `title` (same title and author).
        #[arg(long)]
        mode: Option<EquivalenceMode>,
        /// Also write the groups as JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check which ids a deletion would remove and which it would protect.
    Check {
        #[arg(long)]
        mode: Option<EquivalenceMode>,
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Remove duplicate copies. Dry run unless --execute is given.
    Remove {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Content hash maintenance.
    Hashes {
        #[command(subcommand)]
        action: HashAction,
    },

    /// Work against a running catalog service.
    Remote {
        /// Service base URL, overriding `remote.base_url`.
        #[arg(long, global = true)]
        url: Option<String>,

        #[command(subcommand)]
        action: RemoteAction,
    },
}

#[derive(clap::Args)]
struct SelectionArgs {
    #[arg(long)]
    mode: Option<EquivalenceMode>,
    /// Record to remove. Repeatable.
    #[arg(long = "id", action = clap::ArgAction::Append)]
    ids: Vec<i64>,
    /// Select every copy except each group's keeper.
    #[arg(long, conflicts_with = "ids")]
    all: bool,
    #[arg(long)]
    execute: bool,
}

#[derive(Subcommand)]
enum HashAction {
    /// Hash files that have no hash yet, smallest first.
    Generate {
        /// Rehash every file.
        #[arg(long)]
        force: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show hashing progress.
    Stats,
    /// Rehash a random sample and compare with the stored hashes.
    Verify {
        #[arg(long)]
        sample: Option<usize>,
    },
}

#[derive(Subcommand)]
enum RemoteAction {
    /// List duplicate groups known to the service.
    Dupes {
        #[arg(long)]
        mode: Option<EquivalenceMode>,
    },
    /// Show the service's hash and library statistics.
    Stats,
    /// Remove duplicate copies through the service. Dry run unless --execute.
    Delete {
        #[command(flatten)]
        selection: SelectionArgs,
    },
}

struct App {
    config: AppConfig,
    json: bool,
    start: Instant,
}

impl App {
    fn mode(&self, requested: Option<EquivalenceMode>) -> EquivalenceMode {
        requested.unwrap_or(self.config.dedup.default_mode)
    }

    fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let json = cli.json || std::env::var("AUDIOSHELF_JSON").as_deref() == Ok("1");

    if let Err(err) = run(cli.command, json) {
        let code = exit_code_for(&err);
        if json {
            let _ = print_json(&serde_json::json!({
                "status": "error",
                "error": format!("{err:#}"),
            }));
        } else {
            eprintln!("Error: {err:#}");
        }
        std::process::exit(code.code());
    }
}

fn run(command: Commands, json: bool) -> Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    let ctx = App {
        config,
        json,
        start: Instant::now(),
    };

    match command {
        Commands::Import { file, replace } => cmd_import(&ctx, &file, replace),
        Commands::Stats => cmd_stats(&ctx),
        Commands::Dupes { mode, output } => cmd_dupes(&ctx, ctx.mode(mode), output),
        Commands::Check { mode, ids } => cmd_check(&ctx, ctx.mode(mode), ids),
        Commands::Remove { selection } => cmd_remove(&ctx, selection),
        Commands::Hashes { action } => cmd_hashes(&ctx, action),
        Commands::Remote { url, action } => {
            let mut remote = ctx.config.remote.clone();
            if let Some(url) = url {
                remote.base_url = url;
            }
            let client = CatalogClient::new(&remote)?;
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(cmd_remote(&ctx, &client, action))
        }
    }
}

// ─── Local catalog ──────────────────────────────────────────────────────────

fn open_db(config: &AppConfig) -> Result<Database> {
    Ok(Database::open_existing(&config.database_path())?)
}

fn cmd_import(ctx: &App, file: &Path, replace: bool) -> Result<()> {
    let db = Database::open(&ctx.config.database_path())?;
    let report = import_file(&db, file, ImportOptions { replace })
        .with_context(|| format!("importing {}", file.display()))?;

    if ctx.json {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": report,
            "meta": { "duration_ms": ctx.elapsed_ms() }
        }))?;
    } else {
        println!("Imported {} audiobook(s)", report.imported);
        if report.skipped_existing > 0 {
            println!("  {} already in catalog", report.skipped_existing);
        }
        if report.skipped_invalid > 0 {
            println!("  {} skipped (no file path)", report.skipped_invalid);
        }
        if report.preserved_metadata > 0 {
            println!("  narrator/genre data kept for {}", report.preserved_metadata);
        }
    }
    Ok(())
}

fn cmd_stats(ctx: &App) -> Result<()> {
    let db = open_db(&ctx.config)?;
    let library = db.library_stats()?;
    let hashes = db.hash_stats()?;

    if ctx.json {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": { "library": library, "hashes": hashes },
            "meta": { "duration_ms": ctx.elapsed_ms() }
        }))?;
    } else {
        render::print_library_stats(&library);
        println!();
        render::print_hash_stats(&hashes);
    }
    Ok(())
}

fn local_groups(db: &Database, mode: EquivalenceMode) -> Result<Vec<DuplicateGroup>> {
    Ok(db.duplicate_groups(&DuplicateGrouper::new(), mode)?)
}

fn cmd_dupes(ctx: &App, mode: EquivalenceMode, output: Option<PathBuf>) -> Result<()> {
    let db = open_db(&ctx.config)?;
    let groups = local_groups(&db, mode)?;
    let wire = DuplicatesResponse::from_groups(mode, &groups);

    if let Some(path) = &output {
        std::fs::write(path, serde_json::to_string_pretty(&wire)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    if ctx.json {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": wire,
            "meta": { "duration_ms": ctx.elapsed_ms() }
        }))?;
    } else {
        let library_bytes = db.library_stats()?.total_size_bytes;
        render::print_groups(mode, &groups, Some(library_bytes));
        if let Some(path) = output {
            println!("\nReport written to {}", path.display());
        }
    }
    Ok(())
}

fn cmd_check(ctx: &App, mode: EquivalenceMode, ids: Vec<i64>) -> Result<()> {
    let db = open_db(&ctx.config)?;
    let groups = local_groups(&db, mode)?;
    let requested: BTreeSet<RecordId> = ids.into_iter().map(RecordId).collect();
    let plan = DeletionCoordinator::new(&db).plan(&requested, &groups);

    if ctx.json {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": plan,
            "meta": { "duration_ms": ctx.elapsed_ms() }
        }))?;
    } else {
        render::print_plan(&plan);
    }
    Ok(())
}

fn build_selection(args: &SelectionArgs, groups: &[DuplicateGroup], json: bool) -> SelectionTracker {
    let mut selection = SelectionTracker::new();
    if args.all {
        selection.select_all_deletable(groups);
    }
    for id in &args.ids {
        if let Err(err) = selection.toggle_visible(RecordId(*id), groups) {
            if !json {
                eprintln!("warning: {err}");
            }
            tracing::warn!(%err, "selection rejected");
        }
    }
    selection
}

fn cmd_remove(ctx: &App, args: SelectionArgs) -> Result<()> {
    let mode = ctx.mode(args.mode);
    let db = open_db(&ctx.config)?;
    let groups = local_groups(&db, mode)?;
    let selection = build_selection(&args, &groups, ctx.json);

    if selection.is_empty() {
        return nothing_selected(ctx);
    }

    let requested = selection.snapshot();
    let coordinator = DeletionCoordinator::new(&db);

    if !args.execute {
        let plan = coordinator.plan(&requested, &groups);
        if ctx.json {
            print_json(&serde_json::json!({
                "status": "ok",
                "data": { "dry_run": true, "plan": plan },
                "meta": { "duration_ms": ctx.elapsed_ms() }
            }))?;
        } else {
            render::print_plan(&plan);
            println!("\nDry run. Add --execute to delete.");
        }
        return Ok(());
    }

    let report = coordinator.execute(&requested, &groups);
    if ctx.json {
        print_json(&serde_json::json!({
            "status": "ok",
            "data": report,
            "meta": { "duration_ms": ctx.elapsed_ms() }
        }))?;
    } else {
        render::print_report(&report);
    }
    if !report.failed.is_empty() {
        std::process::exit(ExitCode::GeneralError.code());
    }
    Ok(())
}

fn nothing_selected(ctx: &App) -> Result<()> {
    if ctx.json {
        print_json(&serde_json::json!({ "status": "ok", "data": { "selected": 0 } }))?;
    } else {
        println!("Nothing selected. Use --id <ID> or --all.");
    }
    Ok(())
}

fn cmd_hashes(ctx: &App, action: HashAction) -> Result<()> {
    let db = open_db(&ctx.config)?;
    let generator = HashGenerator::new(&db, &ctx.config.hashing);

    match action {
        HashAction::Generate { force, limit } => {
            let quiet = ctx.json;
            let report = generator.run(HashRunOptions { force, limit }, |p| {
                if !quiet {
                    eprintln!("[{}/{}] {}", p.index, p.total, p.record.title);
                }
            })?;
            let stats = db.hash_stats()?;

            if ctx.json {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "run": report, "stats": stats },
                    "meta": { "duration_ms": ctx.elapsed_ms() }
                }))?;
            } else {
                println!(
                    "Hashed {} of {} file(s) in {:.1}s, {} error(s)",
                    report.hashed,
                    report.pending,
                    report.elapsed_secs,
                    report.errors.len()
                );
                for error in &report.errors {
                    println!("  {:>6}  {}  ({})", error.id, error.file_path, error.message);
                }
                println!();
                render::print_hash_stats(&stats);
            }
        }

        HashAction::Stats => {
            let stats = db.hash_stats()?;
            if ctx.json {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": stats,
                    "meta": { "duration_ms": ctx.elapsed_ms() }
                }))?;
            } else {
                render::print_hash_stats(&stats);
            }
        }

        HashAction::Verify { sample } => {
            let size = sample.unwrap_or(ctx.config.hashing.verify_sample_size);
            let report = generator.verify_sample(size)?;
            if ctx.json {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": report,
                    "meta": { "duration_ms": ctx.elapsed_ms() }
                }))?;
            } else {
                println!(
                    "Verified {}: {} passed, {} mismatched, {} missing",
                    report.checked,
                    report.passed,
                    report.mismatched.len(),
                    report.missing.len()
                );
            }
            if !report.is_clean() {
                std::process::exit(ExitCode::Conflict.code());
            }
        }
    }
    Ok(())
}

// ─── Remote catalog ─────────────────────────────────────────────────────────

async fn cmd_remote(ctx: &App, client: &CatalogClient, action: RemoteAction) -> Result<()> {
    match action {
        RemoteAction::Stats => {
            let hashes = client.fetch_hash_stats().await?;
            let library = client.fetch_library_stats().await?;
            if ctx.json {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "library": library, "hashes": hashes },
                    "meta": { "duration_ms": ctx.elapsed_ms() }
                }))?;
            } else {
                render::print_library_stats(&library);
                println!();
                render::print_hash_stats(&hashes);
            }
            Ok(())
        }

        RemoteAction::Dupes { mode } => {
            let mode = ctx.mode(mode);
            let runner = ReviewRunner::new(client);
            let mut session = ReviewSession::new(mode);
            open_view(ctx, &runner, &mut session, mode).await?;

            if ctx.json {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": DuplicatesResponse::from_groups(mode, session.groups()),
                    "meta": { "duration_ms": ctx.elapsed_ms() }
                }))?;
            } else {
                render::print_groups(mode, session.groups(), None);
            }
            Ok(())
        }

        RemoteAction::Delete { selection } => {
            let mode = ctx.mode(selection.mode);
            let runner = ReviewRunner::new(client);
            let mut session = ReviewSession::new(mode);
            open_view(ctx, &runner, &mut session, mode).await?;

            if selection.all {
                runner.dispatch(&mut session, ReviewCommand::SelectAllDeletable).await;
            }
            for id in &selection.ids {
                let notices = runner
                    .dispatch(&mut session, ReviewCommand::Toggle(RecordId(*id)))
                    .await;
                if !ctx.json {
                    print_notices(&notices);
                }
            }

            if session.selection().is_empty() {
                return nothing_selected(ctx);
            }

            if !selection.execute {
                let ids: Vec<RecordId> = session.selection().ids().iter().copied().collect();
                if ctx.json {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": { "dry_run": true, "selected": ids },
                        "meta": { "duration_ms": ctx.elapsed_ms() }
                    }))?;
                } else {
                    println!("Would ask the service to delete {} record(s):", ids.len());
                    for id in ids {
                        println!("  {id}");
                    }
                    println!("\nDry run. Add --execute to delete.");
                }
                return Ok(());
            }

            let notices = runner.dispatch(&mut session, ReviewCommand::Confirm).await;
            let report = session.last_report().cloned();
            if ctx.json {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "report": report, "notices": notices },
                    "meta": { "duration_ms": ctx.elapsed_ms() }
                }))?;
            } else {
                print_notices(&notices);
                if let Some(report) = &report {
                    render::print_report_details(report);
                }
            }

            match report {
                Some(report) if report.failed.is_empty() => Ok(()),
                Some(_) => std::process::exit(ExitCode::GeneralError.code()),
                None => std::process::exit(ExitCode::NetworkError.code()),
            }
        }
    }
}

/// Loads the view for `mode`; a failed load is an error.
async fn open_view(
    ctx: &App,
    runner: &ReviewRunner<'_, CatalogClient>,
    session: &mut ReviewSession,
    mode: EquivalenceMode,
) -> Result<()> {
    let notices = runner.dispatch(session, ReviewCommand::Open(mode)).await;
    if let ViewStatus::Failed(err) = session.status() {
        return Err(ClientError::from(err.clone()).into());
    }
    if !ctx.json {
        print_notices(&notices);
    }
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    if let Some(err) = err.downcast_ref::<ShelfError>() {
        return match err {
            ShelfError::RecordNotFound(_) | ShelfError::LibraryNotInitialized => ExitCode::NotFound,
            ShelfError::ValidationError(_) | ShelfError::ConfigError(_) => ExitCode::InvalidArgs,
            ShelfError::Io(_) => ExitCode::FileSystemError,
            _ => ExitCode::GeneralError,
        };
    }
    if let Some(err) = err.downcast_ref::<ClientError>() {
        return match err {
            ClientError::BadResponse(_) => ExitCode::ProtocolError,
            _ => ExitCode::NetworkError,
        };
    }
    if err.downcast_ref::<std::io::Error>().is_some() {
        return ExitCode::FileSystemError;
    }
    ExitCode::GeneralError
}

#[cfg(test)]
mod tests {
    use super::*;
    use audioshelf_core::LoadError;

    #[test]
    fn test_exit_code_separates_transport_and_contract_failures() {
        let bad = anyhow::Error::from(ClientError::from(LoadError::BadResponse("2 keepers".into())));
        assert_eq!(exit_code_for(&bad).code(), ExitCode::ProtocolError.code());

        let down = anyhow::Error::from(ClientError::from(LoadError::Unreachable("refused".into())));
        assert_eq!(exit_code_for(&down).code(), ExitCode::NetworkError.code());

        let missing = anyhow::Error::from(ShelfError::LibraryNotInitialized);
        assert_eq!(exit_code_for(&missing).code(), ExitCode::NotFound.code());
    }
}
