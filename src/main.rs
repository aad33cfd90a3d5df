//! gsdk-build CLI
//!
//! Entry point for the `gsdk-build` command-line tool.

use clap::{Parser, Subcommand};
use gsdk_build::config::PROJECT_CONFIG_FILE;
use gsdk_build::descriptor::{discover_descriptor, generate_default_project, is_project_empty};
use gsdk_build::pipeline::PipelineError;
use gsdk_build::sdk::SdkError;
use gsdk_build::targets::plan_for;
use gsdk_build::{Configurator, EffectiveSettings, OsFileSystem, ProcessInvoker, ToolError};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "gsdk-build")]
#[command(about = "Gecko SDK configuration bridge", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Regenerate the SDK configuration if stale and print the build environment
    Configure {
        /// Path to project settings (default: ./gsdk.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Stream SLC CLI output instead of capturing it
        #[arg(long, short = 'v')]
        verbose: bool,

        /// Output the full report in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Report whether the SDK configuration must be reloaded
    Check {
        /// Path to project settings (default: ./gsdk.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate a default project descriptor and entry point if none exists
    Init {
        /// Path to project settings (default: ./gsdk.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },

    /// Print the upload command for a target (upload, program_bootloader, upload_bootloader)
    Target {
        /// Target name
        name: String,

        /// Path to project settings (default: ./gsdk.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let verbose = matches!(cli.command, Commands::Configure { verbose: true, .. });
    env_logger::Builder::new()
        .filter_module(
            "gsdk_build",
            if verbose {
                log::LevelFilter::Debug
            } else {
                log::LevelFilter::Info
            },
        )
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Configure {
            config,
            verbose,
            json,
        } => run_configure(config, verbose, json),
        Commands::Check { config, json } => run_check(config, json),
        Commands::Init { config } => run_init(config),
        Commands::Target { name, config } => run_target(&name, config),
    }
}

fn load_settings(config_path: Option<PathBuf>, verbose: bool) -> EffectiveSettings {
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            eprintln!("Error: cannot determine working directory: {}", e);
            process::exit(1);
        }
    };
    let path = config_path.unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    let cli_overrides = verbose.then(|| serde_json::json!({ "verbose": true }));
    let host = EffectiveSettings::default_host_path();

    match EffectiveSettings::build(host.as_deref(), Some(path.as_path()), cli_overrides, &cwd) {
        Ok(effective) => effective,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    }
}

fn run_configure(config_path: Option<PathBuf>, verbose: bool, json: bool) {
    let effective = load_settings(config_path, verbose);
    let invoker = ProcessInvoker::new(effective.settings.verbose);
    let configurator = Configurator::from_effective(&effective, &OsFileSystem, &invoker);

    let report = match configurator.configure() {
        Ok(report) => report,
        Err(e) => exit_with(e),
    };

    if json {
        match report.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let env = &report.environment;
    println!("Project: {} ({})", report.project_name, report.target);
    println!("  Descriptor: {}", report.descriptor.path.display());
    match report.reload_reason {
        Some(ref reason) => println!("  SDK configuration: regenerated ({})", reason),
        None => println!("  SDK configuration: up to date"),
    }
    println!(
        "  Flags: {} asm, {} c, {} c++, {} link",
        env.asflags.len(),
        env.cflags.len(),
        env.cxxflags.len(),
        env.linkflags.len()
    );
    println!("  Defines: {}", env.cppdefines.len());
    println!("  Include paths: {}", env.cpppath.len());
    println!("  Libraries: {}", env.libs.len() + env.raw_lib_flags.len());
    println!("  Source groups: {}", env.build_rules.len());
    if let Some(ref ldscript) = env.ldscript {
        println!("  Linker script: {}", ldscript.display());
    }
    for source in &report.settings_sources {
        if let (Some(path), Some(digest)) = (&source.path, &source.digest) {
            println!("  Settings: {} (sha256:{})", path, digest.get(..12).unwrap_or(digest.as_str()));
        }
    }
}

fn run_check(config_path: Option<PathBuf>, json: bool) {
    let settings = load_settings(config_path, false).settings;
    let invoker = ProcessInvoker::new(false);
    let configurator = Configurator::new(&settings, &OsFileSystem, &invoker);

    let report = match configurator.check() {
        Ok(report) => report,
        Err(e) => exit_with(e),
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    match report.reason {
        Some(reason) => println!("Reload required: {}", reason),
        None => println!("SDK configuration is up to date"),
    }
}

fn run_init(config_path: Option<PathBuf>) {
    let settings = load_settings(config_path, false).settings;
    let fs = OsFileSystem;

    let found = match discover_descriptor(&fs, &settings) {
        Ok(found) => found,
        Err(e) => exit_with(e.into()),
    };
    if !is_project_empty(&fs, found.as_ref()) {
        if let Some(descriptor) = found {
            println!("Project descriptor exists: {}", descriptor.path.display());
        }
        return;
    }

    match generate_default_project(&fs, &settings) {
        Ok(descriptor) => println!("Created {}", descriptor.path.display()),
        Err(e) => exit_with(e.into()),
    }
}

fn run_target(name: &str, config_path: Option<PathBuf>) {
    let settings = load_settings(config_path, false).settings;

    match plan_for(&OsFileSystem, &settings, name) {
        Ok(plan) => {
            println!("UPLOADCMD: {}", plan.command);
            if let Some(offset) = plan.offset_address {
                println!("upload.offset_address: {}", offset);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Report a fatal pipeline error and exit non-zero
fn exit_with(err: PipelineError) -> ! {
    if let PipelineError::Sdk(SdkError::Tool(ToolError::Failed { ref output, .. })) = err {
        if !output.is_empty() {
            eprintln!("{}", output);
        }
        eprintln!("Error: Failed to run external tool.");
    } else {
        eprintln!("Error: {}", err);
    }
    process::exit(1);
}
