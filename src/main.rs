//! `ra`: research assistant for an Obsidian vault
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ra init <vault>` | Register the vault with qmd and write the config |
//! | `ra search "<query>"` | Search the vault index |
//! | `ra index` | Re-scan and embed the vault |
//! | `ra ask "<question>"` | One question, streamed answer |
//! | `ra chat` | Interactive multi-turn session |
//! | `ra list` | List every note in the vault |
//! | `ra link-suggest <file>` | Suggest `[[wikilinks]]` for a note |
//! | `ra review` | Review recently modified notes |
//! | `ra serve` | HTTP server for editor plugins |

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;

use vault_agent::agent::tasks::{self, count_of, ReviewPlan};
use vault_agent::agent::{AgentBridge, AnthropicBackend, ConversationRequest};
use vault_agent::cli::Console;
use vault_agent::config::{self, Config, VaultConfig};
use vault_agent::integrations::{vault_fs, HostApp, ObsidianCli, QmdClient};
use vault_agent::llm::AnthropicClient;
use vault_agent::logging;
use vault_agent::search::{dispatch, SearchBackend, SearchMode, SearchOptions};
use vault_agent::session::SessionStore;
use vault_agent::tools::build_registry;
use vault_agent::transport::http::{self, AppState};
use vault_agent::transport::terminal::{run_ask, run_chat, ChatOptions};

#[derive(Parser)]
#[command(name = "ra", about = "Research assistant for an Obsidian vault", version)]
struct Cli {
    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a vault: create the qmd collection, build the index, save config
    Init {
        /// Path to the vault root (must contain `.obsidian/`)
        vault: PathBuf,
    },

    /// Search the vault index
    Search {
        query: String,

        /// keyword, semantic or hybrid
        #[arg(short, long)]
        mode: Option<SearchMode>,

        /// Maximum number of results
        #[arg(short = 'n', long)]
        limit: Option<u32>,

        /// Drop results scoring below this
        #[arg(long)]
        min_score: Option<f64>,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Update the index
    Index {
        /// Re-scan files only, skip embeddings
        #[arg(long)]
        update: bool,

        /// Show index status and exit
        #[arg(long)]
        status: bool,
    },

    /// Ask a single question
    Ask {
        question: String,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        max_turns: Option<u32>,
    },

    /// Start an interactive chat
    Chat {
        #[arg(long)]
        model: Option<String>,

        /// File to include as context with the first message
        #[arg(long)]
        context: Option<PathBuf>,
    },

    /// List all notes in the vault
    List {
        #[arg(long)]
        json: bool,
    },

    /// Suggest wikilinks for a note
    LinkSuggest {
        /// Note path relative to the vault root
        file: String,

        /// Rewrite the note with the suggested links woven in
        #[arg(long)]
        apply: bool,

        #[arg(long)]
        model: Option<String>,
    },

    /// Review notes modified in the last few days
    Review {
        /// Number of days to look back
        #[arg(long = "recent", default_value_t = tasks::DEFAULT_REVIEW_DAYS,
              value_parser = clap::value_parser!(u32).range(1..))]
        days: u32,

        #[arg(long)]
        model: Option<String>,
    },

    /// Run the HTTP server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let guard = match logging::init_logging(cli.verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: file logging disabled: {:#}", e);
            None
        }
    };

    let console = Console::new();
    let code = match run(cli.command, &console).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            console.print_error(&format!("{:#}", e));
            1
        }
    };

    drop(guard);
    std::process::exit(code);
}

async fn run(command: Commands, console: &Console) -> Result<i32> {
    match command {
        Commands::Init { vault } => init(&vault, console).await,
        Commands::Search {
            query,
            mode,
            limit,
            min_score,
            json,
        } => search(&query, mode, limit, min_score, json, console).await,
        Commands::Index { update, status } => index(update, status, console).await,
        Commands::Ask {
            question,
            model,
            max_turns,
        } => {
            let (bridge, _) = build_bridge(config::load_config()?);
            let request = ConversationRequest::new(question)
                .with_model(model)
                .with_max_turns(max_turns);
            let succeeded = run_ask(&bridge, console, request).await?;
            Ok(if succeeded { 0 } else { 1 })
        }
        Commands::Chat { model, context } => {
            let (bridge, _) = build_bridge(config::load_config()?);
            let input = BufReader::new(tokio::io::stdin());
            run_chat(&bridge, console, input, ChatOptions { context, model }).await?;
            Ok(0)
        }
        Commands::List { json } => list(json).await,
        Commands::LinkSuggest { file, apply, model } => {
            let config = config::load_config()?;
            let request = tasks::link_suggest_request(&config, &file, apply, model).await?;
            let (bridge, _) = build_bridge(config);
            let succeeded = run_ask(&bridge, console, request).await?;
            Ok(if succeeded { 0 } else { 1 })
        }
        Commands::Review { days, model } => {
            let config = config::load_config()?;
            match tasks::plan_review(&config, days, model).await? {
                ReviewPlan::NothingRecent { days } => {
                    console.print_info(&format!(
                        "No notes modified in the last {}.",
                        count_of(days as usize, "day")
                    ));
                    Ok(0)
                }
                ReviewPlan::Run { request, notes } => {
                    console.print_info(&format!(
                        "Found {} modified in the last {}.\n",
                        count_of(notes.len(), "note"),
                        count_of(days as usize, "day")
                    ));
                    let (bridge, _) = build_bridge(config);
                    let succeeded = run_ask(&bridge, console, request).await?;
                    Ok(if succeeded { 0 } else { 1 })
                }
            }
        }
        Commands::Serve { port } => {
            let config = config::load_config()?;
            let port = port.unwrap_or(config.server.port);
            let sessions = Arc::new(SessionStore::new(config.server.session_capacity));
            let (bridge, search) = build_bridge(config);
            http::serve(AppState::new(bridge, search, sessions), port).await?;
            Ok(0)
        }
    }
}

/// Wire qmd, Obsidian and the Anthropic backend into a bridge
fn build_bridge(config: Config) -> (AgentBridge, Arc<dyn SearchBackend>) {
    let search: Arc<dyn SearchBackend> =
        Arc::new(QmdClient::new(&config.integrations.qmd_command));
    let host: Arc<dyn HostApp> = Arc::new(ObsidianCli::new(
        &config.integrations.obsidian_command,
        config.vault.obsidian_cli,
    ));

    let tools = build_registry(config.vault.path.clone(), search.clone(), host);
    tracing::info!("Registered {} tools", tools.len());

    let backend =
        AnthropicBackend::new(AnthropicClient::new()).with_capacity(config.server.session_capacity);
    let bridge = AgentBridge::new(Arc::new(config), Arc::new(backend), Arc::new(tools));
    (bridge, search)
}

/// qmd collection name for a vault directory
fn collection_name(vault: &Path) -> String {
    let base = vault
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "vault".to_string());
    base.chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

async fn init(vault: &Path, console: &Console) -> Result<i32> {
    let vault = std::fs::canonicalize(vault)
        .with_context(|| format!("Vault path not found: {}", vault.display()))?;

    if !vault_fs::is_obsidian_vault(&vault) {
        console.print_error(&format!(
            "{} is not an Obsidian vault (no .obsidian/ directory)",
            vault.display()
        ));
        return Ok(1);
    }
    console.print_success(&format!("Vault: {}", vault.display()));

    let mut config = config::load_or_default()?;
    let name = collection_name(&vault);
    let vault_str = vault.to_string_lossy().to_string();

    let qmd = QmdClient::new(&config.integrations.qmd_command);
    if !qmd.is_available().await {
        console.print_error("qmd not found. Install it and make sure it is on PATH.");
        return Ok(1);
    }
    console.print_success("qmd found");

    let obsidian = ObsidianCli::new(&config.integrations.obsidian_command, true);
    let obsidian_cli = obsidian.is_available().await;
    if obsidian_cli {
        console.print_success("Obsidian CLI found");
    } else {
        console.print_warning("Obsidian CLI not found; obsidian_eval will be unavailable");
    }

    match qmd.collection_add(&vault_str, &name).await {
        Ok(()) => console.print_success(&format!("Created qmd collection '{}'", name)),
        Err(e) if e.to_string().contains("already exists") => {
            console.print_warning(&format!("qmd collection '{}' already exists", name))
        }
        Err(e) => return Err(e.into()),
    }

    if let Err(e) = qmd
        .context_add(&format!("qmd://{}", name), "Personal Obsidian knowledge base")
        .await
    {
        console.print_warning(&format!("Could not add collection context: {}", e));
    }

    console.print_info("Indexing vault (this can take a while)...");
    let indexed = match qmd.update().await {
        Ok(()) => qmd.embed().await,
        Err(e) => Err(e),
    };
    match indexed {
        Ok(()) => console.print_success("Index built"),
        Err(e) => console.print_warning(&format!(
            "Indexing failed: {}. Run 'ra index' to retry.",
            e
        )),
    }

    config.vault = VaultConfig {
        path: vault,
        qmd_collection: name,
        obsidian_cli,
    };
    config::save_config(&config)?;
    console.print_success(&format!("Config written to {}", config::config_path()?.display()));
    console.print_info("\nTry: ra ask \"What have I written about ...?\" or ra chat");

    Ok(0)
}

async fn search(
    query: &str,
    mode: Option<SearchMode>,
    limit: Option<u32>,
    min_score: Option<f64>,
    json: bool,
    console: &Console,
) -> Result<i32> {
    let config = config::load_config()?;
    let mode = mode.unwrap_or(config.defaults.search_mode);
    let options = SearchOptions {
        limit: Some(limit.unwrap_or(config.defaults.search_results)),
        min_score,
    };

    let qmd = QmdClient::new(&config.integrations.qmd_command);
    match dispatch(&qmd, query, mode, options).await {
        Ok(results) if json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(0)
        }
        Ok(results) => {
            console.print_search_results(&results);
            Ok(0)
        }
        Err(e) => {
            console.print_error(&format!("Search failed: {}", e));
            Ok(1)
        }
    }
}

async fn index(update_only: bool, status_only: bool, console: &Console) -> Result<i32> {
    let config = config::load_config()?;
    let qmd = QmdClient::new(&config.integrations.qmd_command);

    if !status_only {
        console.print_info("Updating index...");
        qmd.update().await?;
        if !update_only {
            console.print_info("Computing embeddings...");
            qmd.embed().await?;
        }
        console.print_success("Index up to date");
    }

    console.print_status(&qmd.status().await?);
    Ok(0)
}

async fn list(json: bool) -> Result<i32> {
    let config = config::load_config()?;
    let notes = vault_fs::list_notes(&config.vault.path).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
    } else {
        println!("{} in vault:\n", count_of(notes.len(), "note"));
        for note in &notes {
            println!("  {}", note);
        }
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_name() {
        assert_eq!(collection_name(Path::new("/home/me/My Notes")), "my-notes");
        assert_eq!(collection_name(Path::new("/v/work_2024")), "work-2024");
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["ra", "-v", "search", "ideas", "--mode", "keyword", "-n", "5"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Search { mode, limit, .. } => {
                assert_eq!(mode, Some(SearchMode::Keyword));
                assert_eq!(limit, Some(5));
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_task_commands_parse() {
        let cli = Cli::try_parse_from(["ra", "link-suggest", "Daily/today.md", "--apply"]).unwrap();
        match cli.command {
            Commands::LinkSuggest { file, apply, model } => {
                assert_eq!(file, "Daily/today.md");
                assert!(apply);
                assert!(model.is_none());
            }
            _ => panic!("expected link-suggest"),
        }

        let cli = Cli::try_parse_from(["ra", "review"]).unwrap();
        assert!(matches!(cli.command, Commands::Review { days: 7, .. }));

        let cli = Cli::try_parse_from(["ra", "review", "--recent", "30"]).unwrap();
        assert!(matches!(cli.command, Commands::Review { days: 30, .. }));

        assert!(Cli::try_parse_from(["ra", "review", "--recent", "0"]).is_err());
        assert!(matches!(
            Cli::try_parse_from(["ra", "list", "--json"]).unwrap().command,
            Commands::List { json: true }
        ));
    }
}
