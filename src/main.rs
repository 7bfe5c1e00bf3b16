//! Quiltpipe CLI - Tiled Microscopy Preprocessing
//!
//! This is a demonstration CLI for the quiltpipe library.

use anyhow::{bail, Context, Result};
use quiltpipe::prelude::*;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage(&args[0]);
        return;
    }

    let result = match args[1].as_str() {
        "list" => {
            list_operations();
            Ok(())
        }
        "info" => match args.get(2) {
            Some(name) => operation_info(name),
            None => Err(anyhow::anyhow!("Please specify an operation name")),
        },
        "check" => match args.get(2) {
            Some(path) => check_config(path, &args[3..]),
            None => Err(anyhow::anyhow!("Please specify a config file")),
        },
        "demo" => match args.get(2) {
            Some(path) => run_demo(path, &args[3..]),
            None => Err(anyhow::anyhow!("Please specify a config file")),
        },
        "help" | "--help" | "-h" => {
            print_usage(&args[0]);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(&args[0]);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("quiltpipe v{}", quiltpipe::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list                          List all available operations");
    println!("  info <operation>              Show detailed info about an operation");
    println!("  check <config> [channel...]   Validate a config against channel names");
    println!("  demo <config> [channel...]    Run a config on a synthetic scene");
    println!("  help                          Show this help message");
    println!();
    println!("Channel names default to the channels listed in the config.");
    println!("Set RUST_LOG=debug for per-stage detail.");
}

fn list_operations() {
    let registry = OperationRegistry::with_builtins();
    let grouped = registry.grouped_by_category();

    println!("Available operations ({} total):", registry.len());
    println!();

    for (category, descriptors) in grouped {
        println!("  {}", category);
        for descriptor in descriptors {
            println!("      {:<10} {}", descriptor.name(), descriptor.description);
        }
        println!();
    }
}

fn operation_info(name: &str) -> Result<()> {
    let registry = OperationRegistry::with_builtins();
    let Some(entry) = registry.get_entry(name) else {
        bail!("Operation not found: {} (use 'list' to see available operations)", name);
    };
    let descriptor = &entry.descriptor;

    println!("Operation: {}", descriptor.display_name);
    println!("Name: {}", descriptor.name());
    println!("Category: {}", descriptor.category);
    println!("Enabled: {}", entry.enabled);
    if !descriptor.aliases.is_empty() {
        println!("Aliases: {}", descriptor.aliases.join(", "));
    }
    println!();
    println!("Description:");
    println!("  {}", descriptor.description);

    if !descriptor.parameters.is_empty() {
        let defaults = serde_json::to_value(OperationParameters::default())?;
        println!();
        println!("Parameters:");
        for key in &descriptor.parameters {
            match defaults.get(key) {
                Some(value) => println!("  {} = {}", key, value),
                None => println!("  {}", key),
            }
        }
    }
    Ok(())
}

fn load(path: &str, channel_args: &[String]) -> Result<(PipelineConfig, ChannelMap)> {
    let config = PipelineConfig::load(path).with_context(|| format!("Failed to load {}", path))?;
    let channels = if channel_args.is_empty() {
        ChannelMap::from_names(config.process_channels.keys())?
    } else {
        ChannelMap::from_names(channel_args)?
    };
    Ok((config, channels))
}

fn check_config(path: &str, channel_args: &[String]) -> Result<()> {
    let (config, channels) = load(path, channel_args)?;
    let registry = OperationRegistry::with_builtins();
    let ctx = PlanContext::new(&config, &channels, &registry);
    let report = PlanValidator::default_checks().validate(&ctx);

    for warning in &report.warnings {
        println!("warning: {}", warning.message);
        if let Some(suggestion) = &warning.suggestion {
            println!("         {}", suggestion);
        }
    }
    for line in report.detailed_errors() {
        println!("error: {}", line);
    }
    println!("{}", report.summary());

    if !report.can_execute() {
        bail!("{} has {} error(s)", path, report.errors.len());
    }

    let plan = resolve_plan(&channels, &config.process_channels, &registry, &config.parameters)?;
    for (channel, chain) in plan.iter() {
        println!("  {} -> {}", channels.display_name(channel), chain);
    }
    if !config.stitch_processing.is_empty() {
        let chain = registry.resolve_chain(
            config.stitch_processing.as_slice(),
            &config.parameters,
            "stitch_processing",
        )?;
        println!("  mosaic -> {}", chain);
    }
    Ok(())
}

fn run_demo(path: &str, channel_args: &[String]) -> Result<()> {
    let (config, channels) = load(path, channel_args)?;
    let tiles = config.grid_shape.map(|g| g.tile_count()).unwrap_or(4);
    let shape = SceneShape::new(2, channels.len(), tiles, 64, 64);

    println!("Running {} on a synthetic scene {}", path, shape);
    let scene = SceneTensor::from_fn(shape, AxisOrder::TCMYX, |t, c, m, y, x| {
        let spot = ((y as f32 - 32.0).powi(2) + (x as f32 - 32.0).powi(2)).sqrt();
        let signal = (200.0 - spot * 6.0).max(0.0);
        signal + (t * 5 + c * 20 + m * 3) as f32 + ((x * 7 + y * 13) % 11) as f32
    });

    let pipeline = Pipeline::new(config)?.with_progress(|update| match update {
        ProgressUpdate::ChannelStarted { stage, name, planes, .. } => {
            println!("   {} {} ({} planes)", stage, name, planes);
        }
        ProgressUpdate::StageSkipped { stage, reason } => {
            println!("   {} skipped ({:?})", stage, reason);
        }
        ProgressUpdate::Error { message, .. } => {
            eprintln!("   error: {}", message);
        }
        _ => {}
    });

    let output = pipeline.run(&scene, &channels)?;
    for (stage, tensor) in output.stages() {
        println!("{:<16} {}", stage.display_name(), tensor.shape());
    }
    println!("{}", output.stats.summary());
    Ok(())
}
