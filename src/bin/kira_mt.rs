use std::fs;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_media_tracker::anilist::AniListHttpClient;
use kira_media_tracker::config::{ConfigLoader, ResolvedConfig};
use kira_media_tracker::domain::{MediaId, TrackedItem, WatchStatus};
use kira_media_tracker::engine::Orchestrator;
use kira_media_tracker::error::KiraError;
use kira_media_tracker::output::{JsonOutput, OutputMode, RunSummary, StderrLog, UnresolvedEntry};
use kira_media_tracker::runtime::{DEFAULT_TICK, QueueRuntime};
use kira_media_tracker::store::JsonStore;
use kira_media_tracker::tui::Tui;

#[derive(Parser)]
#[command(name = "kira-mt")]
#[command(about = "Media collection tracker with background metadata enrichment")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the background fetch queue until it settles")]
    Run(RunArgs),
    #[command(about = "List tracked items")]
    List,
    #[command(about = "List items the metadata service could not match")]
    Unresolved,
    #[command(about = "Show queue status")]
    Status,
    #[command(about = "Show one tracked item")]
    Show(IdArgs),
    #[command(about = "Search for matches and resolve an unmatched item")]
    Resolve(ResolveArgs),
    #[command(about = "Replace the collection with a JSON export")]
    Import(ImportArgs),
    #[command(about = "Track a new item")]
    Add(AddArgs),
    #[command(about = "Stop tracking an item")]
    Remove(IdArgs),
    #[command(about = "Drop fetched metadata and unresolved ids")]
    ClearCache,
}

#[derive(Args)]
struct RunArgs {
    /// Give up waiting after this many seconds.
    #[arg(long, default_value_t = 3600)]
    timeout_secs: u64,
}

#[derive(Args)]
struct IdArgs {
    id: String,
}

#[derive(Args)]
struct ResolveArgs {
    id: String,

    /// 1-based index of the candidate to accept. Without it, candidates are listed.
    #[arg(long)]
    pick: Option<usize>,
}

#[derive(Args)]
struct ImportArgs {
    file: String,
}

#[derive(Args)]
struct AddArgs {
    id: String,
    title: String,

    #[arg(long, value_enum, default_value_t = WatchStatus::PlanToWatch)]
    status: WatchStatus,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::MissingConfig(_)
        | KiraError::InvalidMediaId(_)
        | KiraError::NotTracked(_)
        | KiraError::NotUnresolved(_)
        | KiraError::AlreadyTracked(_)
        | KiraError::InvalidCandidate { .. } => 2,
        KiraError::AniListHttp(_)
        | KiraError::AniListStatus { .. }
        | KiraError::AniListQuery(_)
        | KiraError::RateLimited { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let resolved = ConfigLoader::resolve(cli.config.as_deref())?;
    let store = JsonStore::new(resolved.data_dir.clone());
    store.ensure_root()?;

    let command = cli.command.unwrap_or(Commands::Run(RunArgs {
        timeout_secs: 3600,
    }));

    match command {
        Commands::Run(args) => run_queue(args, &resolved, store, output_mode),
        Commands::List => {
            let engine = load_engine(&resolved, store);
            match output_mode {
                OutputMode::NonInteractive => {
                    JsonOutput::print_collection(engine.collection()).into_diagnostic()
                }
                OutputMode::Interactive => {
                    for item in engine.collection() {
                        print_item_line(item, engine.unresolved().contains(item.id));
                    }
                    Ok(())
                }
            }
        }
        Commands::Unresolved => {
            let engine = load_engine(&resolved, store);
            let entries: Vec<UnresolvedEntry> = engine
                .unresolved()
                .iter()
                .map(|id| UnresolvedEntry {
                    id,
                    title: engine
                        .item(id)
                        .map(|item| item.title.clone())
                        .unwrap_or_else(|| format!("Anime ID {id}")),
                })
                .collect();
            match output_mode {
                OutputMode::NonInteractive => {
                    JsonOutput::print_unresolved(&entries).into_diagnostic()
                }
                OutputMode::Interactive => {
                    for entry in &entries {
                        println!("{:>8}  {}", entry.id, entry.title);
                    }
                    Ok(())
                }
            }
        }
        Commands::Status => {
            let engine = load_engine(&resolved, store);
            let status = engine.snapshot();
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_status(&status).into_diagnostic(),
                OutputMode::Interactive => {
                    println!("Tracked: {}", status.tracked);
                    println!("Pending fetches: {}", status.queue_len);
                    println!("Unresolved: {}", status.unresolved.len());
                    Ok(())
                }
            }
        }
        Commands::Show(args) => {
            let id: MediaId = args.id.parse()?;
            let mut engine = load_engine(&resolved, store);
            let item = engine
                .open_detail(id)
                .cloned()
                .ok_or_else(|| KiraError::NotTracked(id.to_string()))?;
            JsonOutput::print_item(&item).into_diagnostic()
        }
        Commands::Resolve(args) => run_resolve(args, &resolved, store, output_mode),
        Commands::Import(args) => {
            let content = fs::read_to_string(&args.file)
                .map_err(|err| KiraError::ImportParse(format!("{}: {err}", args.file)))?;
            let items: Vec<TrackedItem> = serde_json::from_str(&content)
                .map_err(|err| KiraError::ImportParse(err.to_string()))?;
            let mut engine = load_engine(&resolved, store);
            engine.import_replaced(items);
            print_last_log(&engine);
            Ok(())
        }
        Commands::Add(args) => {
            let id: MediaId = args.id.parse()?;
            let mut item = TrackedItem::new(id, args.title);
            item.status = args.status;
            let mut engine = load_engine(&resolved, store);
            if !engine.add(item) {
                return Err(miette::Report::msg(format!("{id} is already tracked")));
            }
            print_last_log(&engine);
            Ok(())
        }
        Commands::Remove(args) => {
            let id: MediaId = args.id.parse()?;
            let mut engine = load_engine(&resolved, store);
            if !engine.remove(id) {
                return Err(KiraError::NotTracked(id.to_string()).into());
            }
            print_last_log(&engine);
            Ok(())
        }
        Commands::ClearCache => {
            let mut engine = load_engine(&resolved, store);
            engine.clear_cache();
            print_last_log(&engine);
            Ok(())
        }
    }
}

fn load_engine(resolved: &ResolvedConfig, store: JsonStore) -> Orchestrator<JsonStore> {
    let mut engine = Orchestrator::new(store, resolved.engine);
    engine.load();
    engine
}

fn http_client(resolved: &ResolvedConfig) -> Result<AniListHttpClient, KiraError> {
    AniListHttpClient::with_endpoint(&resolved.endpoint, resolved.timeout)
}

fn run_queue(
    args: RunArgs,
    resolved: &ResolvedConfig,
    store: JsonStore,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let client = http_client(resolved)?;
    let engine = load_engine(resolved, store);

    match output_mode {
        OutputMode::NonInteractive => {
            let runtime = QueueRuntime::start(engine, client, StderrLog, DEFAULT_TICK);
            let settled = runtime.wait_until_settled(Duration::from_secs(args.timeout_secs));
            let status = runtime
                .snapshot()
                .ok_or_else(|| miette::Report::msg("queue engine is unavailable"))?;
            runtime.shutdown();
            JsonOutput::print_run(&RunSummary { settled, status }).into_diagnostic()
        }
        OutputMode::Interactive => {
            let mut tui = Tui::new();
            let runtime = QueueRuntime::start(engine, client, tui.sink(), DEFAULT_TICK);
            let result = tui.run(&runtime);
            runtime.shutdown();
            result
        }
    }
}

fn run_resolve(
    args: ResolveArgs,
    resolved: &ResolvedConfig,
    store: JsonStore,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let id: MediaId = args.id.parse()?;
    let client = http_client(resolved)?;
    let mut engine = load_engine(resolved, store);
    if !engine.unresolved().contains(id) {
        return Err(KiraError::NotUnresolved(id.to_string()).into());
    }
    let candidates = engine.candidates(id, &client)?;

    let Some(pick) = args.pick else {
        return match output_mode {
            OutputMode::NonInteractive => {
                JsonOutput::print_candidates(&candidates).into_diagnostic()
            }
            OutputMode::Interactive => {
                for (index, candidate) in candidates.iter().enumerate() {
                    println!("{:>3}. {} (MAL ID: {})", index + 1, candidate.title, candidate.id);
                }
                Ok(())
            }
        };
    };

    let candidate = pick
        .checked_sub(1)
        .and_then(|index| candidates.get(index))
        .ok_or(KiraError::InvalidCandidate {
            choice: pick,
            available: candidates.len(),
        })?;
    let item = engine.resolve(id, candidate)?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_item(&item).into_diagnostic(),
        OutputMode::Interactive => {
            print_last_log(&engine);
            Ok(())
        }
    }
}

fn print_item_line(item: &TrackedItem, unresolved: bool) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let gray = "\x1b[90m";
    let reset = "\x1b[0m";
    let (marker, color) = if unresolved {
        ("?", yellow)
    } else if item.has_complete_metadata() {
        ("+", green)
    } else {
        (".", gray)
    };
    println!(
        "{color}{marker} {:>8}  {}  [{}] {}/{}{reset}",
        item.id, item.title, item.status, item.episodes_watched, item.total_episodes
    );
}

fn print_last_log(engine: &Orchestrator<JsonStore>) {
    if let Some(entry) = engine
        .log()
        .entries()
        .filter(|entry| !entry.message.starts_with("Scheduling") && !entry.message.starts_with("Starting"))
        .last()
    {
        println!("{}", entry.line());
    }
}
