mod display;
mod load;
mod refresh;

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use log::{LevelFilter, debug, warn};

use umbrella_core::effect::Effect;
use umbrella_core::graph::sort_by_dependencies;
use umbrella_core::interpreter::{EffectOutcome, Interpreter, InterpreterConfig};
use umbrella_core::parser::ParsedFile;
use umbrella_core::plan::Plan;
use umbrella_core::provider::{Provider, ProviderError};
use umbrella_core::resource::ResourceId;
use umbrella_provider::schemas::all_schemas;
use umbrella_provider::{UmbrellaConfig, UmbrellaProvider};
use umbrella_state::{LockInfo, ResourceState, StateBackend, StateFile, create_backend};

use crate::display::{format_value, print_attributes, print_plan};
use crate::load::{SchemaSet, load_config, prepare_resources};
use crate::refresh::{plan, refresh, warn_orphans};

const PROVIDER_NAME: &str = "umbrella";

#[derive(Parser)]
#[command(name = "umbrella")]
#[command(about = "Declarative management of Cisco Umbrella organizations", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Path to the state file (overrides the backend block)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration without contacting the API
    Validate {
        /// Configuration file or directory of .tf files
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Show execution plan without applying changes
    Plan {
        /// Configuration file or directory of .tf files
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// Apply changes to reach the desired state
    Apply {
        /// Configuration file or directory of .tf files
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Destroy every resource recorded in state
    Destroy {
        /// Configuration file or directory of .tf files
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Bring an existing remote object under management
    Import {
        /// Resource address (e.g., umbrella_site.hq)
        address: String,
        /// Remote identifier of the object
        id: String,

        /// Configuration file or directory of .tf files
        #[arg(long, default_value = ".")]
        config: PathBuf,
    },
    /// Inspect or modify the state
    State {
        #[command(subcommand)]
        command: StateCommands,

        /// Configuration file or directory of .tf files
        #[arg(long, default_value = ".")]
        config: PathBuf,
    },
    /// Describe resource types and data sources
    Schema {
        /// Resource type or data source to describe
        resource_type: Option<String>,
    },
    /// Remove a state lock left behind by an interrupted run
    ForceUnlock {
        lock_id: String,

        /// Configuration file or directory of .tf files
        #[arg(long, default_value = ".")]
        config: PathBuf,
    },
    /// Generate shell completions
    Completions { shell: Shell },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List recorded resources
    List,
    /// Show the recorded attributes of a resource
    Show { address: String },
    /// Forget a resource without deleting it remotely
    Rm { address: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let state = cli.state;
    let result = match cli.command {
        Commands::Validate { path } => run_validate(&path),
        Commands::Plan { path } => run_plan(&path, state).await,
        Commands::Apply { path, auto_approve } => run_apply(&path, state, auto_approve).await,
        Commands::Destroy { path, auto_approve } => run_destroy(&path, state, auto_approve).await,
        Commands::Import {
            address,
            id,
            config,
        } => run_import(&config, state, &address, &id).await,
        Commands::State { command, config } => run_state_command(command, &config, state).await,
        Commands::Schema { resource_type } => run_schema(resource_type.as_deref()),
        Commands::ForceUnlock { lock_id, config } => {
            run_force_unlock(&config, state, &lock_id).await
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "umbrella", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let mut builder = if verbose {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(LevelFilter::Debug);
        builder
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
    };
    builder.format_timestamp(None).init();
}

/// Load, normalize and validate the configuration
fn load_and_prepare(path: &Path) -> Result<(ParsedFile, SchemaSet), String> {
    let mut parsed = load_config(path)?;
    let schemas = SchemaSet::new(all_schemas());
    prepare_resources(&mut parsed.resources, &schemas)?;
    Ok((parsed, schemas))
}

fn get_provider(parsed: &ParsedFile) -> Result<UmbrellaProvider, String> {
    let attributes = parsed
        .provider(PROVIDER_NAME)
        .map(|p| p.attributes.clone())
        .unwrap_or_default();
    let config = UmbrellaConfig::from_attributes(&attributes)
        .map_err(|e| format!("Provider configuration error: {}", e))?;
    UmbrellaProvider::from_config(&config).map_err(|e| e.to_string())
}

fn open_backend(
    parsed: &ParsedFile,
    state_override: Option<PathBuf>,
) -> Result<Box<dyn StateBackend>, String> {
    let backend =
        create_backend(parsed.backend.as_ref(), state_override).map_err(|e| e.to_string())?;
    debug!("Using state at {}", backend.location());
    Ok(backend)
}

/// Backend for commands that only need the backend block of the configuration
fn open_backend_at(
    config: &Path,
    state_override: Option<PathBuf>,
) -> Result<Box<dyn StateBackend>, String> {
    if state_override.is_some() && !config.exists() {
        return open_backend(&ParsedFile::default(), state_override);
    }
    let parsed = load_config(config)?;
    open_backend(&parsed, state_override)
}

async fn read_state(backend: &dyn StateBackend) -> Result<StateFile, String> {
    Ok(backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default())
}

async fn write_state(backend: &dyn StateBackend, state: &mut StateFile) -> Result<(), String> {
    state.increment_serial();
    backend
        .write_state(state)
        .await
        .map_err(|e| format!("Failed to write state to {}: {}", backend.location(), e))
}

/// Release the lock; a failure here must not hide the outcome of the run
async fn release(backend: &dyn StateBackend, lock: &LockInfo) {
    if let Err(e) = backend.release_lock(lock).await {
        warn!("Failed to release state lock {}: {}", lock.id, e);
        eprintln!(
            "{} failed to release lock {}; run `umbrella force-unlock {}`",
            "Warning:".yellow().bold(),
            lock.id,
            lock.id
        );
    }
}

fn confirm(question: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!("  {}", "Only 'yes' will be accepted to confirm.".yellow());
    print!("\n  Enter a value: ");
    std::io::stdout().flush().map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();
    Ok(input.trim() == "yes")
}

fn run_validate(path: &Path) -> Result<(), String> {
    println!("{}", "Validating...".cyan());

    let (parsed, _) = load_and_prepare(path)?;
    if let Some(provider) = parsed.provider(PROVIDER_NAME) {
        UmbrellaConfig::resolve(&provider.attributes, |_| Some("set".to_string()))
            .map_err(|e| format!("Provider configuration error: {}", e))?;
    }

    println!(
        "{}",
        format!(
            "✓ {} resources validated successfully.",
            parsed.resources.len()
        )
        .green()
        .bold()
    );
    for resource in &parsed.resources {
        println!("  • {}", resource.binding());
    }
    Ok(())
}

async fn run_plan(path: &Path, state_override: Option<PathBuf>) -> Result<(), String> {
    let (parsed, schemas) = load_and_prepare(path)?;
    let backend = open_backend(&parsed, state_override)?;
    let state = read_state(backend.as_ref()).await?;
    let provider = get_provider(&parsed)?;

    println!("{}", "Refreshing state...".cyan());
    let refreshed = refresh(&provider, &parsed.resources, &state).await?;
    let plan = plan(&refreshed, &schemas);

    println!();
    warn_orphans(&refreshed);
    print_plan(&plan, &schemas);
    Ok(())
}

async fn run_apply(
    path: &Path,
    state_override: Option<PathBuf>,
    auto_approve: bool,
) -> Result<(), String> {
    let (parsed, schemas) = load_and_prepare(path)?;
    let backend = open_backend(&parsed, state_override)?;
    let provider = get_provider(&parsed)?;

    let lock = backend
        .acquire_lock("apply")
        .await
        .map_err(|e| e.to_string())?;
    let result = apply_locked(&parsed, &schemas, backend.as_ref(), provider, auto_approve).await;
    release(backend.as_ref(), &lock).await;
    result
}

async fn apply_locked(
    parsed: &ParsedFile,
    schemas: &SchemaSet,
    backend: &dyn StateBackend,
    provider: UmbrellaProvider,
    auto_approve: bool,
) -> Result<(), String> {
    let mut state = read_state(backend).await?;

    println!("{}", "Refreshing state...".cyan());
    let refreshed = refresh(&provider, &parsed.resources, &state).await?;
    refreshed.update_state_file(&mut state, PROVIDER_NAME);
    write_state(backend, &mut state).await?;

    let plan = plan(&refreshed, schemas);
    println!();
    warn_orphans(&refreshed);
    print_plan(&plan, schemas);
    if plan.is_empty() {
        return Ok(());
    }
    println!();

    if !auto_approve && !confirm("Do you want to perform these actions?")? {
        println!("{}", "Apply cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let interpreter = Interpreter::new(provider);
    let result = interpreter
        .apply(&plan, refreshed.bindings.clone())
        .await;

    for (effect, outcome) in plan.effects().iter().zip(&result.outcomes) {
        match outcome {
            Ok(outcome) => {
                println!("  {} {}", "✓".green(), effect);
                record_outcome(&mut state, outcome);
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), effect, e);
                if let Effect::Replace { id, from, .. } = effect {
                    forget_if_gone(interpreter.provider(), &mut state, id, from.identifier.as_deref())
                        .await;
                }
            }
        }
    }
    let skipped = plan.effects().len() - result.outcomes.len();

    write_state(backend, &mut state).await?;

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", result.success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply failed. {} succeeded, {} failed, {} not attempted.",
            result.success_count, result.failure_count, skipped
        ))
    }
}

/// Record the result of a successful effect in the state file
fn record_outcome(state: &mut StateFile, outcome: &EffectOutcome) {
    match outcome {
        EffectOutcome::Created { state: s }
        | EffectOutcome::Updated { state: s }
        | EffectOutcome::Replaced { state: s } => {
            state.upsert_resource(ResourceState::from_state(s, PROVIDER_NAME));
        }
        EffectOutcome::Deleted { id } => {
            state.remove_resource(id);
        }
        EffectOutcome::Read { .. } | EffectOutcome::Skipped { .. } => {}
    }
}

/// A failed replacement may have deleted the old object before the create
/// failed; drop it from state if it no longer exists
async fn forget_if_gone<P: Provider>(
    provider: &P,
    state: &mut StateFile,
    id: &ResourceId,
    identifier: Option<&str>,
) {
    match provider.read(id, identifier).await {
        Ok(current) if !current.exists => {
            state.remove_resource(id);
        }
        Ok(_) => {}
        Err(e) => warn!("{}: could not check state after failed replacement: {}", id, e),
    }
}

async fn run_destroy(
    path: &Path,
    state_override: Option<PathBuf>,
    auto_approve: bool,
) -> Result<(), String> {
    let parsed = load_config(path)?;
    let backend = open_backend(&parsed, state_override)?;
    let provider = get_provider(&parsed)?;

    let lock = backend
        .acquire_lock("destroy")
        .await
        .map_err(|e| e.to_string())?;
    let result = destroy_locked(&parsed, backend.as_ref(), provider, auto_approve).await;
    release(backend.as_ref(), &lock).await;
    result
}

/// Delete effects for every recorded resource, dependents first
fn destroy_plan(parsed: &ParsedFile, state: &StateFile) -> Result<Plan, String> {
    let sorted = sort_by_dependencies(&parsed.resources).map_err(|e| e.to_string())?;

    let mut plan = Plan::new();
    let mut planned: HashSet<ResourceId> = HashSet::new();
    let mut add = |recorded: &ResourceState, plan: &mut Plan| {
        let id = recorded.resource_id();
        let Some(identifier) = &recorded.identifier else {
            return;
        };
        if planned.insert(id.clone()) {
            plan.add(Effect::Delete {
                id,
                identifier: identifier.clone(),
            });
        }
    };

    for resource in sorted.iter().rev().filter(|r| !r.is_data_source()) {
        if let Some(recorded) = state.find_resource(&resource.id) {
            add(recorded, &mut plan);
        }
    }
    for recorded in state.resources.iter().rev() {
        add(recorded, &mut plan);
    }
    Ok(plan)
}

async fn destroy_locked(
    parsed: &ParsedFile,
    backend: &dyn StateBackend,
    provider: UmbrellaProvider,
    auto_approve: bool,
) -> Result<(), String> {
    let mut state = read_state(backend).await?;
    let plan = destroy_plan(parsed, &state)?;

    if plan.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for effect in plan.effects() {
        println!("  {} {}", "-".red().bold(), effect.resource_id());
    }
    println!();
    println!(
        "Plan: {} to destroy.",
        plan.effects().len().to_string().red()
    );
    println!();

    if !auto_approve
        && !confirm("Do you really want to destroy all resources? This cannot be undone.")?
    {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let interpreter = Interpreter::new(provider).with_config(InterpreterConfig {
        dry_run: false,
        continue_on_error: true,
    });
    let result = interpreter.apply(&plan, Default::default()).await;

    for (effect, outcome) in plan.effects().iter().zip(&result.outcomes) {
        match outcome {
            Ok(outcome) => {
                println!("  {} {}", "✓".green(), effect);
                record_outcome(&mut state, outcome);
            }
            Err(e) => println!("  {} {} - {}", "✗".red(), effect, e),
        }
    }

    write_state(backend, &mut state).await?;

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!(
                "Destroy complete! {} resources destroyed.",
                result.success_count
            )
            .green()
            .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Destroy failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

fn parse_address(address: &str) -> Result<ResourceId, String> {
    ResourceId::parse_address(address)
        .ok_or_else(|| format!("Invalid address '{}', expected <type>.<name>", address))
}

async fn run_import(
    config: &Path,
    state_override: Option<PathBuf>,
    address: &str,
    identifier: &str,
) -> Result<(), String> {
    let id = parse_address(address)?;
    let schemas = SchemaSet::new(all_schemas());
    if schemas.resource(&id.resource_type).is_none() {
        return Err(format!("Unknown resource type '{}'", id.resource_type));
    }

    let parsed = load_config(config)?;
    let backend = open_backend(&parsed, state_override)?;
    let provider = get_provider(&parsed)?;

    let lock = backend
        .acquire_lock("import")
        .await
        .map_err(|e| e.to_string())?;
    let result = import_locked(backend.as_ref(), &provider, &id, identifier).await;
    release(backend.as_ref(), &lock).await;
    result
}

async fn import_locked(
    backend: &dyn StateBackend,
    provider: &UmbrellaProvider,
    id: &ResourceId,
    identifier: &str,
) -> Result<(), String> {
    let mut state = read_state(backend).await?;
    if state.find_resource(id).is_some() {
        return Err(format!("{} is already managed", id));
    }

    let current = Provider::read(provider, id, Some(identifier))
        .await
        .map_err(|e: ProviderError| e.to_string())?;
    if !current.exists {
        return Err(format!("Cannot import {}: object {} not found", id, identifier));
    }

    state.upsert_resource(ResourceState::from_state(&current, PROVIDER_NAME));
    write_state(backend, &mut state).await?;

    println!(
        "{}",
        format!("✓ Imported {} ({})", id, identifier).green().bold()
    );
    Ok(())
}

async fn run_state_command(
    command: StateCommands,
    config: &Path,
    state_override: Option<PathBuf>,
) -> Result<(), String> {
    let backend = open_backend_at(config, state_override)?;

    match command {
        StateCommands::List => {
            let state = read_state(backend.as_ref()).await?;
            for resource in state.sorted_resources() {
                println!("{}", resource.address());
            }
            Ok(())
        }
        StateCommands::Show { address } => {
            let id = parse_address(&address)?;
            let state = read_state(backend.as_ref()).await?;
            let recorded = state
                .find_resource(&id)
                .ok_or_else(|| format!("{} is not in state", id))?;

            let schemas = SchemaSet::new(all_schemas());
            println!("{}", recorded.address().cyan().bold());
            if let Some(identifier) = &recorded.identifier {
                println!("  {}", format!("identifier: {}", identifier).bold());
            }
            print_attributes(&recorded.values(), schemas.resource(&id.resource_type));
            Ok(())
        }
        StateCommands::Rm { address } => {
            let id = parse_address(&address)?;
            let lock = backend
                .acquire_lock("state rm")
                .await
                .map_err(|e| e.to_string())?;
            let result = remove_locked(backend.as_ref(), &id).await;
            release(backend.as_ref(), &lock).await;
            result
        }
    }
}

async fn remove_locked(backend: &dyn StateBackend, id: &ResourceId) -> Result<(), String> {
    let mut state = read_state(backend).await?;
    if state.remove_resource(id).is_none() {
        return Err(format!("{} is not in state", id));
    }
    write_state(backend, &mut state).await?;
    println!("{} Removed {}", "✓".green(), id);
    Ok(())
}

fn run_schema(resource_type: Option<&str>) -> Result<(), String> {
    let schemas = SchemaSet::new(all_schemas());

    let Some(resource_type) = resource_type else {
        for schema in schemas.sorted() {
            let kind = if schema.is_data_source() {
                "data"
            } else {
                "resource"
            };
            println!(
                "{:8} {:36} {}",
                kind,
                schema.resource_type.cyan(),
                schema.description.as_deref().unwrap_or("")
            );
        }
        return Ok(());
    };

    let matching: Vec<_> = schemas
        .sorted()
        .into_iter()
        .filter(|s| s.resource_type == resource_type)
        .collect();
    if matching.is_empty() {
        return Err(format!("Unknown resource type '{}'", resource_type));
    }

    for schema in matching {
        let kind = if schema.is_data_source() {
            "data source"
        } else {
            "resource"
        };
        println!("{} ({})", schema.resource_type.cyan().bold(), kind);
        if let Some(description) = &schema.description {
            println!("  {}", description);
        }
        for name in schema.attribute_names() {
            let Some(attr) = schema.attributes.get(name) else {
                continue;
            };
            let mut flags = Vec::new();
            if attr.required {
                flags.push("required".to_string());
            }
            if attr.computed {
                flags.push("computed".to_string());
            }
            if attr.force_new {
                flags.push("forces replacement".to_string());
            }
            if attr.sensitive {
                flags.push("sensitive".to_string());
            }
            if attr.write_only {
                flags.push("write-only".to_string());
            }
            if let Some(default) = &attr.default {
                flags.push(format!("default {}", format_value(default)));
            }
            println!(
                "  {:28} {:12} {}",
                name,
                attr.attr_type.to_string(),
                flags.join(", ").dimmed()
            );
        }
        println!();
    }
    Ok(())
}

async fn run_force_unlock(
    config: &Path,
    state_override: Option<PathBuf>,
    lock_id: &str,
) -> Result<(), String> {
    let backend = open_backend_at(config, state_override)?;
    backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| e.to_string())?;
    println!(
        "{}",
        format!("✓ Lock {} removed from {}", lock_id, backend.location())
            .green()
            .bold()
    );
    Ok(())
}
