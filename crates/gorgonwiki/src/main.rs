use std::env;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use gorgonwiki_core::ability_pages::generate_pages;
use gorgonwiki_core::ability_templates::write_templates;
use gorgonwiki_core::ai_profiles::{AI_PROFILE_PREFIX, generate_ai_profiles};
use gorgonwiki_core::cdn::{CdnClient, CdnClientConfig, GameData};
use gorgonwiki_core::config::{BotConfig, PageKind, load_config};
use gorgonwiki_core::mediawiki::{MediaWikiClient, MediaWikiClientConfig};
use gorgonwiki_core::pet_profiles::generate_pet_profiles;
use gorgonwiki_core::publish::{
    PageSet, PublishAction, PublishOptions, PublishReport, publish_pages, with_title_prefix,
};
use gorgonwiki_core::quest_pages::{QuestSelection, generate_missing_pages};
use gorgonwiki_core::runtime::{
    PathOverrides, ResolutionContext, ResolvedPaths, normalize_for_display, resolve_paths,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "gorgonwiki",
    version,
    about = "Entrypoint for scripts dealing with the Project: Gorgon wiki"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Dry-run mode prints page source instead of modifying the wiki"
    )]
    dry: bool,
    #[arg(
        long,
        global = true,
        value_name = "NAME",
        help = "Run only for a specific quest (by \"Name\")"
    )]
    quest: Option<String>,
    #[arg(
        long,
        global = true,
        default_value_t = 0,
        help = "Skip the first n quests in the data file"
    )]
    offset: usize,
    #[arg(long, global = true, value_name = "TEXT", help = "Edit summary override")]
    summary: Option<String>,
    #[arg(long, global = true, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PATH")]
    cache_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        value_name = "VERSION",
        help = "Use this data version instead of asking the CDN"
    )]
    data_version: Option<String>,
    #[arg(long, global = true, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[arg(long, global = true, help = "Print reports as JSON")]
    json: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone)]
struct RuntimeOptions {
    project_root: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    config: Option<PathBuf>,
    data_version: Option<String>,
    summary: Option<String>,
    dry: bool,
    diagnostics: bool,
    json: bool,
}

impl RuntimeOptions {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            project_root: cli.project_root.clone(),
            cache_dir: cli.cache_dir.clone(),
            config: cli.config.clone(),
            data_version: cli.data_version.clone(),
            summary: cli.summary.clone(),
            dry: cli.dry,
            diagnostics: cli.diagnostics,
            json: cli.json,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Create ability pages, redirects and disambiguation notices")]
    Abilities,
    #[command(about = "Create AIP: pages listing enemy combat abilities")]
    AiProfiles,
    #[command(about = "Create pet profile tables")]
    PetProfiles,
    #[command(about = "Create pages for quests that have none yet")]
    Quests,
    #[command(about = "Write ability description and icon switch templates")]
    AbilityTemplates(AbilityTemplatesArgs),
    #[command(about = "Print the current game data version")]
    Version,
}

#[derive(Debug, Args)]
struct AbilityTemplatesArgs {
    #[arg(default_value = ".", value_name = "DIR")]
    dir: PathBuf,
}

/// Everything a page command needs, resolved once per run.
struct Session {
    paths: ResolvedPaths,
    config: BotConfig,
    data: GameData,
}

impl Session {
    fn open(runtime: &RuntimeOptions) -> Result<Self> {
        let paths = resolve_runtime_paths(runtime)?;
        let config = load_config(&paths.config_path)?;
        let fetcher = CdnClient::new(CdnClientConfig::from_config(&config))?;
        let data = GameData::open(
            Box::new(fetcher),
            &paths.cache_dir,
            runtime.data_version.as_deref(),
        )?;
        tracing::info!(version = data.version(), "using game data");
        if runtime.diagnostics {
            println!("[diagnostics]\n{}", paths.diagnostics());
        }
        Ok(Self {
            paths,
            config,
            data,
        })
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let runtime = RuntimeOptions::from_cli(&cli);

    match cli.command {
        Some(Commands::Abilities) => run_pages(&runtime, PageKind::Ability, |session| {
            Ok(generate_pages(&session.data)?.into_iter().collect())
        }),
        Some(Commands::AiProfiles) => run_pages(&runtime, PageKind::AiProfile, |session| {
            Ok(with_title_prefix(
                generate_ai_profiles(&session.data)?,
                AI_PROFILE_PREFIX,
            ))
        }),
        Some(Commands::PetProfiles) => run_pages(&runtime, PageKind::PetProfile, |session| {
            Ok(with_title_prefix(
                generate_pet_profiles(&session.data)?,
                session.config.pet_profile_prefix(),
            ))
        }),
        Some(Commands::Quests) => run_quests(
            &runtime,
            QuestSelection {
                quest: cli.quest,
                offset: cli.offset,
            },
        ),
        Some(Commands::AbilityTemplates(args)) => run_ability_templates(&runtime, args),
        Some(Commands::Version) => run_version(&runtime),
        None => {
            let mut command = Cli::command();
            command.print_help()?;
            println!();
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_pages<F>(runtime: &RuntimeOptions, kind: PageKind, generate: F) -> Result<()>
where
    F: FnOnce(&Session) -> Result<PageSet>,
{
    let session = Session::open(runtime)?;
    let pages = generate(&session)?;
    tracing::info!(count = pages.len(), "generated pages");
    publish(runtime, &session, kind, &pages)
}

fn run_quests(runtime: &RuntimeOptions, selection: QuestSelection) -> Result<()> {
    let session = Session::open(runtime)?;
    let mut api = MediaWikiClient::new(MediaWikiClientConfig::from_config(&session.config))?;
    let pages = generate_missing_pages(&session.data, &selection, &mut api)?;
    tracing::info!(count = pages.len(), "generated quest pages");
    publish_with(runtime, &session, PageKind::Quest, &pages, &mut api)
}

fn publish(
    runtime: &RuntimeOptions,
    session: &Session,
    kind: PageKind,
    pages: &PageSet,
) -> Result<()> {
    let mut api = MediaWikiClient::new(MediaWikiClientConfig::from_config(&session.config))?;
    publish_with(runtime, session, kind, pages, &mut api)
}

fn publish_with(
    runtime: &RuntimeOptions,
    session: &Session,
    kind: PageKind,
    pages: &PageSet,
    api: &mut MediaWikiClient,
) -> Result<()> {
    if runtime.dry && !runtime.json {
        println!("Dry-run mode, not creating pages...\n");
    }
    let options = PublishOptions {
        summary: runtime
            .summary
            .clone()
            .unwrap_or_else(|| session.config.summary_for(kind).to_string()),
        dry_run: runtime.dry,
    };
    let credentials = bot_credentials();
    let report = publish_pages(
        pages,
        &options,
        api,
        credentials
            .as_ref()
            .map(|(user, pass)| (user.as_str(), pass.as_str())),
    )?;
    if runtime.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &PublishReport) {
    for page in &report.pages {
        match page.action {
            PublishAction::WouldCreate | PublishAction::WouldUpdate => {
                if let Some(preview) = &page.preview {
                    println!("{}\n{preview}\n", page.title);
                }
                if let Some(diff) = &page.diff {
                    println!("{diff}");
                }
            }
            PublishAction::Unchanged | PublishAction::Created | PublishAction::Updated => {}
        }
    }
    println!(
        "{}: created={} updated={} unchanged={} requests={}",
        if report.dry_run { "dry run" } else { "published" },
        report.created,
        report.updated,
        report.unchanged,
        report.request_count
    );
}

fn run_ability_templates(runtime: &RuntimeOptions, args: AbilityTemplatesArgs) -> Result<()> {
    let session = Session::open(runtime)?;
    let dir = if args.dir.is_absolute() {
        args.dir
    } else {
        session.paths.project_root.join(args.dir)
    };
    let report = write_templates(&session.data, &dir)?;
    if runtime.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("ability templates");
    println!("abilities: {}", report.abilities);
    for file in &report.files {
        println!("wrote: {}", normalize_for_display(file));
    }
    Ok(())
}

fn run_version(runtime: &RuntimeOptions) -> Result<()> {
    let session = Session::open(runtime)?;
    println!("data_version: {}", session.data.version());
    if let Some(dir) = session.data.version_dir() {
        println!("cache_dir: {}", normalize_for_display(dir));
    }
    Ok(())
}

fn bot_credentials() -> Option<(String, String)> {
    let user = env::var("WIKI_BOT_USER").ok()?;
    let pass = env::var("WIKI_BOT_PASS").ok()?;
    if user.trim().is_empty() || pass.is_empty() {
        return None;
    }
    Some((user.trim().to_string(), pass))
}

fn resolve_runtime_paths(runtime: &RuntimeOptions) -> Result<ResolvedPaths> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: runtime.project_root.clone(),
        cache_dir: runtime.cache_dir.clone(),
        config: runtime.config.clone(),
    };

    let initial = resolve_paths(&context, &overrides)?;
    let project_env = initial.project_root.join(".env");
    if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
    }

    resolve_paths(&context, &overrides)
}
