use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use docent_core::{AnswerRequest, Config, Engine, MemorySource, SyncStatus};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "docent")]
#[command(about = "Conversational assistant over a Notion knowledge base", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "docent.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Rebuild the index from the content source")]
    Sync {
        #[arg(short, long, help = "Read the content tree from a JSON snapshot instead of Notion")]
        snapshot: Option<PathBuf>,

        #[arg(short, long, help = "Root page or database id (overrides the configuration)")]
        root: Option<String>,
    },

    #[command(about = "Ask a single question")]
    Ask {
        question: String,

        #[arg(short, long, default_value = "cli")]
        session: String,

        #[arg(short, long, help = "Image URL to attach to the question")]
        image: Option<String>,
    },

    #[command(about = "Interactive chat session")]
    Chat {
        #[arg(short, long, default_value = "cli")]
        session: String,
    },

    #[command(about = "Model management commands")]
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },
}

#[derive(Subcommand)]
enum ModelCommands {
    #[command(about = "Show current model")]
    Show,

    #[command(about = "Set the completion model")]
    Set {
        #[arg(help = "Model name (e.g., 'qwen2.5:3b' or 'mistral-small-latest')")]
        model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("docent_core=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show => show_config(&cli.config),
        Commands::Sync { snapshot, root } => sync(&cli.config, snapshot, root).await,
        Commands::Ask { question, session, image } => ask(&cli.config, question, session, image).await,
        Commands::Chat { session } => chat(&cli.config, &session).await,
        Commands::Model { command } => match command {
            ModelCommands::Show => show_model(&cli.config),
            ModelCommands::Set { model } => set_model(&cli.config, &model),
        },
    }
}

/// Loads the config file, or defaults when it does not exist.
fn load_config(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        return Ok(Config::default());
    }
    Config::load(config_path).context("Failed to load config")
}

fn show_config(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Provider:       {}", config.llm.provider_name().cyan());
    println!("  Model:          {}", config.llm.model().cyan());
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Model:          {}", config.embedding.model.cyan());
    println!("  Base URL:       {}", config.embedding.base_url);
    println!();
    println!("{}", "Retrieval:".bold());
    println!("  K Neighbors:    {}", config.retrieval.k_neighbors);
    println!("  Max Docs:       {}", config.retrieval.max_docs);
    println!();
    println!("{}", "Chat:".bold());
    println!("  Max History:    {}", config.chat.max_history);
    println!("  Session Idle:   {} min", config.chat.session_timeout_minutes);
    println!();
    println!("{}", "Source:".bold());
    println!("  Base URL:       {}", config.source.base_url);
    println!(
        "  Root:           {}",
        config.source.resolved_root_id().unwrap_or_else(|| "(not set)".to_string())
    );
    println!(
        "  Token:          {}",
        if config.source.resolved_token().is_some() { "set" } else { "(not set)" }
    );
    println!();
    println!("{}", "Storage:".bold());
    println!("  Index:          {}", config.storage.index_path.display());

    Ok(())
}

async fn sync(config_path: &Path, snapshot: Option<PathBuf>, root: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let mut builder = Engine::builder(config);

    if let Some(snapshot) = snapshot {
        let source = MemorySource::load(&snapshot)
            .with_context(|| format!("Failed to read snapshot {}", snapshot.display()))?;
        builder = builder.source(Arc::new(source));
    }
    if let Some(root) = root {
        builder = builder.root_id(root);
    }

    let engine = builder.build().context("Failed to initialize engine")?;

    println!("{} Syncing content...", "→".blue());
    let report = engine.sync().await;

    match report.status {
        SyncStatus::Success => println!("{} {}", "✓".green().bold(), report.message),
        SyncStatus::Warning => println!("{} {}", "!".yellow().bold(), report.message.yellow()),
        SyncStatus::Error => anyhow::bail!("Sync failed: {}", report.message),
    }

    Ok(())
}

async fn ask(config_path: &Path, question: String, session: String, image: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = Engine::from_config(config).context("Failed to initialize engine")?;

    let mut request = AnswerRequest::new(question, session);
    if let Some(image) = image {
        request = request.with_image(image);
    }

    let answer = engine.answer(request).await?;
    println!("{}", answer.text);
    Ok(())
}

async fn chat(config_path: &Path, session: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let engine = Engine::from_config(config).context("Failed to initialize engine")?;

    println!("{}", "Docent chat".bold().green());
    println!("Type {} to clear the conversation, {} to leave.", "/reset".bold(), "exit".bold());
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", "You:".bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "exit" | "quit" => break,
            "/reset" => {
                engine.reset(session);
                println!("{}", "Session cleared.".yellow());
                continue;
            }
            _ => {}
        }

        let answer = engine.answer(AnswerRequest::new(input, session)).await?;
        println!("{} {}", "Docent:".bold().cyan(), answer.text);
        println!();
    }

    Ok(())
}

fn show_model(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!(
        "{}: {} ({})",
        "Current model".bold(),
        config.llm.model().cyan(),
        config.llm.provider_name()
    );
    Ok(())
}

fn set_model(config_path: &Path, model: &str) -> Result<()> {
    let content = std::fs::read_to_string(config_path)
        .context("Failed to read config file")?;

    let mut config: serde_yaml::Value = serde_yaml::from_str(&content)
        .context("Failed to parse config")?;

    let llm = config
        .get_mut("llm")
        .and_then(|llm| llm.as_mapping_mut())
        .context("Config has no llm section")?;
    llm.insert(
        serde_yaml::Value::String("model".to_string()),
        serde_yaml::Value::String(model.to_string()),
    );

    // Reject edits that no longer parse as a valid configuration.
    let updated_content = serde_yaml::to_string(&config)
        .context("Failed to serialize config")?;
    Config::from_yaml(&updated_content).context("Updated config is invalid")?;

    std::fs::write(config_path, updated_content)
        .context("Failed to write config file")?;

    println!(
        "{} Model updated to: {}",
        "✓".green().bold(),
        model.cyan()
    );

    Ok(())
}
