//! cta-scanner: keyword and call-to-action scanner for documents

use clap::Parser;
use colored::Colorize;
use cta_scanner::cli::{Cli, Commands, ConfigAction, ModelAction, ScanArgs};
use cta_scanner::config::{BackendKind, Config};
use cta_scanner::input::InputManager;
use cta_scanner::llm::hosted::HostedInvoker;
use cta_scanner::llm::local::LocalInvoker;
use cta_scanner::llm::model_manager::ModelManager;
use cta_scanner::llm::ModelBackend;
use cta_scanner::output::formatter::save_report_to_file;
use cta_scanner::output::ReportGenerator;
use cta_scanner::processing::embeddings::EmbeddingEngine;
use cta_scanner::processing::phrases::{parse_phrase_list, PhraseTable};
use cta_scanner::processing::synonyms::build_expander;
use cta_scanner::processing::{KeywordMatcher, Scanner};
use cta_scanner::{Result, ScanError};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::process;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if !config.output.color_output {
        colored::control::set_override(false);
    }

    if let Err(e) = run_command(cli.command, config).await {
        error!("Command failed: {}", e);
        process::exit(1);
    }
}

async fn run_command(command: Commands, config: Config) -> Result<()> {
    match command {
        Commands::Scan(args) => run_scan(args, config).await,
        Commands::Models { action } => run_models(action, &config).await,
        Commands::Config { action } => run_config(action, &config),
    }
}

async fn run_scan(args: ScanArgs, mut config: Config) -> Result<()> {
    // Nothing is loaded for a document that is not there
    InputManager::ensure_exists(&args.file)?;

    args.apply_to(&mut config);
    config.validate()?;

    eprintln!("{} {}", "Scanning".green().bold(), args.file.display());

    let table = build_phrase_table(&args, &config)?;
    info!("Phrase table: {} phrases, {} candidates", table.len(), table.all_candidates().len());

    let backend = build_backend(&args, &config).await?;
    eprintln!("{} {}", "Backend".cyan().bold(), backend.label());

    let matcher = KeywordMatcher::new(config.matching.mode);
    let mut scanner = Scanner::new(table, matcher, backend);

    let progress = spinner("Analyzing document...");
    let report = scanner.scan(&args.file).await;
    progress.finish_and_clear();
    let report = report?;

    let rendered = ReportGenerator::new(args.detailed).generate_report(&report, config.output.format)?;

    print!("{}", rendered);
    if !rendered.ends_with('\n') {
        println!();
    }

    if let Some(output_path) = &args.output {
        save_report_to_file(&rendered, output_path)?;
        eprintln!("{} {}", "Saved report to".green(), output_path.display());
    }

    Ok(())
}

fn build_phrase_table(args: &ScanArgs, config: &Config) -> Result<PhraseTable> {
    let phrases: Vec<String> = match &args.phrases {
        Some(list) => parse_phrase_list(list),
        None => config
            .matching
            .phrases
            .iter()
            .map(|entry| entry.phrase.clone())
            .collect(),
    };

    if phrases.is_empty() {
        return Err(ScanError::InvalidInput("No phrases to scan for".to_string()));
    }

    let expander = build_expander(
        config.matching.synonyms,
        &config.matching.phrases,
        config.matching.wordnet_dir.as_deref(),
    )?;
    PhraseTable::build(&phrases, &*expander)
}

async fn build_backend(args: &ScanArgs, config: &Config) -> Result<ModelBackend> {
    match config.backend {
        BackendKind::Local => {
            let manager = ModelManager::new(config.models_dir().clone()).await?;
            let model = args
                .model
                .as_deref()
                .unwrap_or(&config.models.default_local_model);
            let paths = manager.resolve_local_model(model, config.local.tokenizer.as_deref())?;

            let progress = spinner("Loading local model...");
            let invoker = LocalInvoker::load(&paths.weights, &paths.tokenizer, config.local.context_length);
            progress.finish_and_clear();

            Ok(ModelBackend::Generative(
                Box::new(invoker?),
                config.local.inference.clone(),
            ))
        }
        BackendKind::Hosted => {
            let invoker = HostedInvoker::from_config(&config.hosted, args.model.as_deref())?;
            Ok(ModelBackend::Generative(
                Box::new(invoker),
                config.hosted.inference.clone(),
            ))
        }
        BackendKind::Embedding => {
            let progress = spinner("Loading embedding model...");
            let engine = EmbeddingEngine::from_config(config, args.model.as_deref());
            progress.finish_and_clear();

            Ok(ModelBackend::Embedding {
                embedder: Box::new(engine?),
                threshold: config.similarity.threshold,
            })
        }
        BackendKind::None => Ok(ModelBackend::Disabled),
    }
}

fn spinner(message: &str) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.set_message(message.to_string());
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

async fn run_models(action: ModelAction, config: &Config) -> Result<()> {
    let mut manager = ModelManager::new(config.models_dir().clone()).await?;

    match action {
        ModelAction::List => {
            println!("{}\n", "Available Models".bold());
            for info in manager.list_available_models() {
                let status = if manager.is_model_downloaded(&info.id) {
                    "downloaded".green()
                } else {
                    "available".yellow()
                };
                println!(
                    "  {} ({}) - {} MB [{}]",
                    info.id.bold(),
                    info.repo_id,
                    info.size_mb,
                    status
                );
                println!("    {}", info.description);
            }

            if manager.list_downloaded_models().is_empty() {
                println!("\nNo models downloaded yet. Get started with:");
                println!("   cta-scanner models download {}", config.models.default_local_model);
            }
        }

        ModelAction::Download { model, force } => {
            let progress = spinner(&format!("Downloading {}...", model));
            let result = manager.download_model(&model, force).await;
            progress.finish_and_clear();

            let model_path = result?;
            println!("{} {}", "Downloaded".green().bold(), model);
            println!("Location: {}", model_path.display());
        }

        ModelAction::Remove { model } => {
            manager.remove_model(&model).await?;
            println!("{} {}", "Removed".green().bold(), model);
        }

        ModelAction::Info { model } => {
            let info = manager
                .get_model_info(&model)
                .ok_or_else(|| ScanError::ModelNotFound(model.clone()))?;

            println!("Id: {}", info.id);
            println!("Name: {}", info.name);
            println!("Repository: {}", info.repo_id);
            println!("Type: {:?}", info.model_type);
            println!("Files: {}", info.files.join(", "));
            if let Some(tokenizer_repo) = &info.tokenizer_repo {
                println!("Tokenizer: {}", tokenizer_repo);
            }
            println!("Size: {} MB", info.size_mb);
            println!("Description: {}", info.description);

            match manager.get_model_path(&model) {
                Some(path) => println!("Status: downloaded ({})", path.display()),
                None => {
                    println!("Status: available for download");
                    println!("   cta-scanner models download {}", model);
                }
            }
        }
    }

    Ok(())
}

fn run_config(action: Option<ConfigAction>, config: &Config) -> Result<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let content = toml::to_string_pretty(config)
                .map_err(|e| ScanError::Configuration(format!("Failed to serialize config: {}", e)))?;
            println!("{}", content);
        }

        Some(ConfigAction::Reset) => {
            Config::default().save()?;
            println!("{} {}", "Configuration reset:".green(), Config::config_path().display());
        }

        Some(ConfigAction::Path) => {
            println!("{}", Config::config_path().display());
        }
    }

    Ok(())
}
