use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use persona_server::{PersonaServer, ServerConfig};
use persona_store::{DurableProfileStore, WalConfig};
use persona_tracker::{NewProfile, ProfileService, RetryPolicy};
use persona_types::{Profile, ProfileKey, ViewerId};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Create(args) => cmd_create(args, format),
        Command::Show(args) => cmd_show(args, format),
        Command::Stats(args) => cmd_stats(args, format),
        Command::Config(args) => cmd_config(args),
    }
}

fn open_service(data_dir: &Path) -> anyhow::Result<ProfileService> {
    let store = DurableProfileStore::open(data_dir, WalConfig::default())
        .with_context(|| format!("opening store in {}", data_dir.display()))?;
    Ok(ProfileService::new(Arc::new(store), RetryPolicy::default()))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("reading config {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }
    println!("Persona server on {}", config.bind_addr.to_string().bold());
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(PersonaServer::new(config).serve())?;
    Ok(())
}

fn cmd_create(args: CreateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(&args.payload).context("payload is not valid JSON")?;
    let mut request = NewProfile::new(payload);
    if let Some(key) = args.key {
        request = request.with_key(ProfileKey::parse(key)?);
    }
    if let Some(owner) = args.owner {
        request = request.owned_by(owner);
    }
    let profile = open_service(&args.data_dir)?.create_profile(request)?;
    match format {
        OutputFormat::Json => print_json(&profile)?,
        OutputFormat::Text => {
            println!("{} Created profile {}", "✓".green().bold(), profile.key.as_str().yellow());
        }
    }
    Ok(())
}

fn cmd_show(args: ShowArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = ProfileKey::parse(args.key)?;
    let viewer = match args.viewer {
        Some(v) => ViewerId::new(v)?,
        None => ViewerId::anonymous(),
    };
    let profile = open_service(&args.data_dir)?.load_profile(&key, &viewer)?;
    match format {
        OutputFormat::Json => print_json(&profile)?,
        OutputFormat::Text => {
            print_profile(&profile);
            println!("  Payload: {}", serde_json::to_string_pretty(&profile.payload)?);
        }
    }
    Ok(())
}

fn cmd_stats(args: StatsArgs, format: OutputFormat) -> anyhow::Result<()> {
    let key = ProfileKey::parse(args.key)?;
    let profile = open_service(&args.data_dir)?.profile(&key)?;
    match format {
        OutputFormat::Json => {
            let counters = profile.counters();
            print_json(&serde_json::json!({
                "uuid": profile.key,
                "totalInteractions": counters.total,
                "uniqueViewers": counters.unique,
                "lastUpdated": profile.last_updated,
            }))?;
        }
        OutputFormat::Text => print_profile(&profile),
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}

fn print_profile(profile: &Profile) {
    println!("Profile {}", profile.key.as_str().yellow().bold());
    if let Some(owner) = &profile.owner {
        println!("  Owner: {}", owner.cyan());
    }
    println!("  Interactions: {}", profile.total_interactions.to_string().bold());
    println!("  Unique viewers: {}", profile.unique_viewers.to_string().bold());
    println!("  Last updated: {}", profile.last_updated.to_rfc3339().dimmed());
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
