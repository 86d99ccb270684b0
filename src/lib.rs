pub mod config;
pub mod host;
pub mod logging;
pub mod model;
pub mod remote;
pub mod search;
pub mod ui;

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};

use config::{Endpoints, SettingsStore};
use host::{DirectoryImporter, TracingNotifier};
use model::types::{SearchQuery, SortKey, split_tags};
use remote::{RemoteClient, ReqwestProxy};
use ui::autocomplete::MAX_SUGGESTIONS;
use ui::render::truncate_description;

static LONG_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{} (built {}, {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown target"),
    )
});

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "chub-search",
    version,
    long_version = LONG_VERSION.as_str(),
    about = "Search the CHub character catalog and import cards"
)]
pub struct Cli {
    /// Proxy endpoint that relays catalog requests (`?url=<target>`)
    #[arg(long, global = true)]
    pub proxy_url: Option<String>,

    /// Talk to the catalog directly instead of through the proxy
    #[arg(long, global = true, default_value_t = false)]
    pub direct: bool,

    /// Override data dir (logs, default import folder)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Override config dir (settings.json)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive search popup
    Tui {
        /// Render once and exit (headless-friendly)
        #[arg(long, default_value_t = false)]
        once: bool,

        /// Where downloaded cards are written
        #[arg(long)]
        import_dir: Option<PathBuf>,
    },
    /// Run one catalog search and print the results
    Search {
        /// Free-text search term
        #[arg(long, default_value = "")]
        query: String,

        /// Comma separated tags that must be present
        #[arg(long, default_value = "")]
        include: String,

        /// Comma separated tags that must be absent
        #[arg(long, default_value = "")]
        exclude: String,

        /// Sort order
        #[arg(long, value_parser = parse_sort, default_value = "download_count")]
        sort: SortKey,

        /// Page number (1-based)
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Results per page (defaults to the saved setting)
        #[arg(long)]
        per_page: Option<u32>,

        /// Include NSFW results (defaults to the saved setting)
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        nsfw: Option<bool>,

        /// Print records as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Fetch the tag catalog
    Tags {
        /// Print autocomplete matches for this fragment
        #[arg(long)]
        prefix: Option<String>,

        /// Maximum tags to print
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Download one card and import it
    Download {
        /// Catalog path, e.g. `author/character`
        full_path: String,

        /// Explicit card image URL (skips the canonical PNG location)
        #[arg(long)]
        card_url: Option<String>,

        /// Where the card is written
        #[arg(long)]
        import_dir: Option<PathBuf>,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page to stdout
    Man,
}

fn parse_sort(value: &str) -> Result<SortKey, String> {
    SortKey::parse(value).ok_or_else(|| {
        let known: Vec<&str> = SortKey::all().iter().map(|k| k.as_str()).collect();
        format!("unknown sort `{value}` (expected one of {})", known.join(", "))
    })
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config_dir = cli.config_dir.clone().unwrap_or_else(default_config_dir);
    let settings_path = settings_path_for(&config_dir);
    let endpoints = Endpoints::resolve(cli.proxy_url.clone(), cli.direct);

    match cli.command {
        Commands::Tui { once, import_dir } => {
            let _guard = logging::init_file(&data_dir, "info")?;
            let opts = ui::tui::TuiOptions {
                settings_path,
                import_dir: import_dir.unwrap_or_else(|| default_import_dir(&data_dir)),
                endpoints,
                once,
            };
            let handle = tokio::runtime::Handle::current();
            tokio::task::block_in_place(|| ui::tui::run_tui(handle, opts))
        }
        Commands::Search {
            query,
            include,
            exclude,
            sort,
            page,
            per_page,
            nsfw,
            json,
        } => {
            logging::init_stderr("warn");
            let saved = SettingsStore::load(&settings_path).chub();
            let query = SearchQuery {
                search_term: query,
                include_tags: split_tags(&include),
                exclude_tags: split_tags(&exclude),
                nsfw: nsfw.unwrap_or(saved.nsfw),
                sort: Some(sort),
                page: page.max(1),
                results_per_page: per_page.unwrap_or(saved.find_count).max(1),
            };
            run_search(endpoints, &query, json).await
        }
        Commands::Tags { prefix, limit } => {
            logging::init_stderr("warn");
            run_tags(endpoints, prefix, limit).await
        }
        Commands::Download {
            full_path,
            card_url,
            import_dir,
        } => {
            logging::init_stderr("warn");
            let import_dir = import_dir.unwrap_or_else(|| default_import_dir(&data_dir));
            run_download(endpoints, &full_path, card_url.as_deref(), import_dir).await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "chub-search", &mut std::io::stdout());
            Ok(())
        }
        Commands::Man => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            let mut out = std::io::stdout();
            man.render(&mut out)?;
            Ok(())
        }
    }
}

fn client_for(endpoints: Endpoints) -> Result<RemoteClient<ReqwestProxy>> {
    let transport = ReqwestProxy::new(endpoints.proxy.clone(), endpoints.timeout)
        .context("building HTTP client")?;
    Ok(RemoteClient::new(transport, endpoints))
}

async fn run_search(endpoints: Endpoints, query: &SearchQuery, json: bool) -> Result<()> {
    let client = client_for(endpoints)?;
    let records = client.search(query).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("{}", ui::render::EMPTY_STATE_MESSAGE);
        return Ok(());
    }
    for record in &records {
        let name = if record.name.is_empty() {
            "Unnamed"
        } else {
            record.name.as_str()
        };
        println!("{name} by {}  [{}]", record.author, record.full_path);
        println!("  {}", truncate_description(&record.description));
        if !record.tags.is_empty() {
            println!("  #{}", record.tags.join(" #"));
        }
    }
    Ok(())
}

async fn run_tags(endpoints: Endpoints, prefix: Option<String>, limit: Option<usize>) -> Result<()> {
    let client = client_for(endpoints)?;
    let catalog = client.fetch_tag_catalog().await;
    let tags: Vec<String> = match prefix {
        Some(fragment) => catalog.prefix_matches(
            &fragment.trim().to_lowercase(),
            limit.unwrap_or(MAX_SUGGESTIONS),
        ),
        None => catalog
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(str::to_string)
            .collect(),
    };
    for tag in tags {
        println!("{tag}");
    }
    Ok(())
}

async fn run_download(
    endpoints: Endpoints,
    full_path: &str,
    card_url: Option<&str>,
    import_dir: PathBuf,
) -> Result<()> {
    let client = client_for(endpoints)?;
    let importer = DirectoryImporter::new(import_dir);
    let written = client
        .download_card(full_path, card_url.unwrap_or(""), &importer, &TracingNotifier)
        .await;
    if written.is_empty() {
        bail!("nothing imported for {full_path}");
    }
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("ai", "chub", "chub-search")
}

pub fn default_data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".chub-search"))
}

pub fn default_config_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".chub-search"))
}

pub fn settings_path_for(config_dir: &Path) -> PathBuf {
    config_dir.join("settings.json")
}

pub fn default_import_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("imports")
}
