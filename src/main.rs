use anyhow::{Context, Result};
use brick_runtime::bricks::builtin::builtin_registry;
use brick_runtime::bricks::describe;
use brick_runtime::cli::commands::{BricksCommand, RunCommand, StateCommand, ValidateCommand};
use brick_runtime::cli::output::*;
use brick_runtime::cli::{Cli, Command};
use brick_runtime::core::config::PipelineDocument;
use brick_runtime::core::state::ExecutionStatus;
use brick_runtime::core::RegistryId;
use brick_runtime::execution::ExecutionEngine;
use brick_runtime::persistence::{InMemoryStateStore, ModComponentRef, ModStateStore};
use brick_runtime::platform::{HeadlessPlatform, Platform, TerminalPlatform};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd).await?,
        Command::Bricks(cmd) => list_bricks(cmd)?,
        Command::State(cmd) => show_state(cmd).await?,
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_state_store(path: Option<&Path>) -> Result<Arc<dyn ModStateStore>> {
    use brick_runtime::persistence::SqliteStateStore;

    let store = match path {
        Some(path) => SqliteStateStore::new(path).await?,
        None => SqliteStateStore::with_default_path().await?,
    };
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_state_store(_path: Option<&Path>) -> Result<Arc<dyn ModStateStore>> {
    Ok(Arc::new(InMemoryStateStore::new()))
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    // Load pipeline document
    let mut document = PipelineDocument::from_file(&cmd.file).context("Failed to load pipeline")?;
    if let Some(version) = cmd.api_version {
        document.api_version = version;
    }

    if !cmd.json {
        println!(
            "{} Loaded pipeline: {} ({})",
            INFO,
            style(&document.name).bold(),
            style(document.api_version).dim()
        );
        for (key, value) in &cmd.input {
            println!("{} Input override: {} = {}", INFO, style(key).cyan(), style(value).dim());
        }
    }

    // Set up persistence
    let store: Arc<dyn ModStateStore> = if cmd.no_state {
        Arc::new(InMemoryStateStore::new())
    } else {
        open_state_store(cmd.state_db.as_deref()).await?
    };

    let platform: Arc<dyn Platform> = if cmd.headless {
        Arc::new(HeadlessPlatform::new())
    } else {
        Arc::new(TerminalPlatform)
    };

    let engine = ExecutionEngine::new(Arc::new(builtin_registry()))
        .with_platform(platform)
        .with_state_store(store);

    // Console progress
    if !cmd.json {
        engine.add_event_handler(|event| {
            if let Some(line) = format_execution_event(event) {
                println!("{}", line);
            }
        });
    }

    let options = engine.run_options().with_headless(cmd.headless);
    let report = engine.run_document(&document, &cmd.input, options).await;

    if cmd.trace && !cmd.json {
        println!("\n{}", style("Trace:").bold());
        for entry in &report.trace {
            println!("{}", format_trace_entry(entry));
        }
    }

    match &report.result {
        Ok(value) if cmd.json => println!("{}", serde_json::to_string(value)?),
        Ok(value) => {
            println!("\n{}", format_value(value, 40));
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&document.name).bold(),
                style("successfully").green()
            );
        }
        Err(e) if report.state.status == ExecutionStatus::Interrupted => {
            println!("\n{} {} ended early: {}", WARN, style(&document.name).bold(), e);
        }
        Err(e) => {
            println!("\n{} {} {}", CROSS, style(&document.name).bold(), style("failed").red());
            error!("{}", e.user_message());
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let document = match PipelineDocument::from_file(&cmd.file) {
        Ok(document) => document,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    };

    // Every brick must resolve, at any depth
    let engine = ExecutionEngine::new(Arc::new(builtin_registry()));
    let capabilities = match engine.required_capabilities(&document.steps()).await {
        Ok(capabilities) => capabilities,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    };
    let mut capabilities: Vec<String> = capabilities.iter().map(|c| c.to_string()).collect();
    capabilities.sort();

    println!("{} Pipeline document is valid!", CHECK);
    println!("  Name: {}", style(&document.name).bold());
    println!("  apiVersion: {}", style(document.api_version).cyan());
    println!("  Steps: {}", style(document.pipeline.len()).cyan());
    if !capabilities.is_empty() {
        println!("  Requires: {}", style(capabilities.join(", ")).cyan());
    }

    if cmd.json {
        let json = serde_json::to_string_pretty(&document)?;
        println!("\n{}", json);
    }
    Ok(())
}

fn list_bricks(cmd: &BricksCommand) -> Result<()> {
    let registry = builtin_registry();
    let typed = registry.all_typed();

    if cmd.json {
        let listing: Vec<_> = registry
            .ids()
            .iter()
            .filter_map(|id| typed.get(id))
            .map(|entry| describe(entry.brick.as_ref()))
            .collect();
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("{} Built-in bricks:", INFO);
    for id in registry.ids() {
        if let Some(entry) = typed.get(&id) {
            println!(
                "  {} {} {}",
                style(format!("{:<32}", id.as_str())).bold(),
                style(format!("{:<12}", entry.kind.to_string())).cyan(),
                style(entry.brick.name()).dim()
            );
        }
    }
    Ok(())
}

#[cfg(feature = "sqlite")]
async fn list_state_keys(cmd: &StateCommand) -> Result<()> {
    use brick_runtime::persistence::SqliteStateStore;

    let store = match cmd.state_db.as_deref() {
        Some(path) => SqliteStateStore::new(path).await?,
        None => SqliteStateStore::with_default_path().await?,
    };
    let keys = store.keys().await?;
    if keys.is_empty() {
        println!("{} No state stored", INFO);
    }
    for key in keys {
        println!("  {}", style(key).bold());
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn list_state_keys(_cmd: &StateCommand) -> Result<()> {
    anyhow::bail!("Listing state keys requires the sqlite feature")
}

async fn show_state(cmd: &StateCommand) -> Result<()> {
    if cmd.keys {
        return list_state_keys(cmd).await;
    }

    let store = open_state_store(cmd.state_db.as_deref()).await?;
    let mod_id = cmd
        .mod_id
        .as_deref()
        .map(RegistryId::parse)
        .transpose()
        .context("Invalid mod id")?;
    let component = ModComponentRef::new(mod_id);
    let state = store.get_state(cmd.namespace, &component).await?;

    println!("{} {} state:", INFO, style(cmd.namespace).bold());
    println!("{}", format_value(&state, 200));
    Ok(())
}
