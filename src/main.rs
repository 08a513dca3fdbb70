//! mintdoc: generate Mintlify reference pages from JSDoc comments.
//!
//! - `mintdoc generate --package client` renders one configured package
//! - `mintdoc generate --all --no-nav` renders every package, leaving the
//!   navigation document alone
//! - `mintdoc list` shows what is configured

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use mintdoc::{Config, GenerateOptions};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status when output was written but a source root could not be read.
const EXIT_ROOT_UNREADABLE: u8 = 2;

#[derive(Parser)]
#[command(
    name = "mintdoc",
    version,
    about = "Generate Mintlify MDX reference pages from JSDoc-annotated sources"
)]
struct Cli {
    /// Configuration file (default: ./mintdoc.toml, then built-in defaults)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate documentation for configured packages
    Generate {
        /// Package to generate. Can be specified multiple times.
        #[arg(short = 'p', long = "package", value_name = "NAME", required_unless_present = "all")]
        packages: Vec<String>,

        /// Generate every configured package
        #[arg(long, conflicts_with = "packages")]
        all: bool,

        /// Do not touch the navigation document
        #[arg(long)]
        no_nav: bool,

        /// Output format: mdx (default) or json
        #[arg(short = 'f', long, default_value = "mdx")]
        format: String,
    },
    /// List configured packages
    List,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::List => {
            list(&config);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Generate {
            packages,
            all,
            no_nav,
            format,
        } => {
            let options = GenerateOptions {
                format,
                update_navigation: !no_nav,
            };
            generate(&config, &packages, all, &options)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mintdoc={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn list(config: &Config) {
    if config.packages.is_empty() {
        println!("no packages configured");
        return;
    }
    let width = config
        .packages
        .iter()
        .map(|p| p.name.len())
        .max()
        .unwrap_or(0);
    for package in &config.packages {
        let mode = match package.mode {
            mintdoc::config::OutputMode::Pages => "pages",
            mintdoc::config::OutputMode::Import => "import",
        };
        println!(
            "{:<width$}  {} -> {} ({})",
            package.name,
            package.title(),
            package.output_path(),
            mode,
            width = width
        );
    }
}

fn generate(
    config: &Config,
    names: &[String],
    all: bool,
    options: &GenerateOptions,
) -> Result<ExitCode> {
    let mut wanted: Vec<&str> = if all {
        config.package_names()
    } else {
        names.iter().map(String::as_str).collect()
    };
    let mut seen = std::collections::HashSet::new();
    wanted.retain(|name| seen.insert(*name));

    // Resolve every name first so a typo fails before anything is written
    let packages = wanted
        .iter()
        .map(|name| config.package(name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut root_unreadable = false;
    let mut errors = false;
    for package in packages {
        // A failed package is reported and the rest still run.
        let report = mintdoc::generate_package(config, package, options);
        print!("{}", report.summary());
        root_unreadable |= report.root_unreadable;
        errors |= report.errors() > 0;
    }

    Ok(if errors {
        ExitCode::FAILURE
    } else if root_unreadable {
        ExitCode::from(EXIT_ROOT_UNREADABLE)
    } else {
        ExitCode::SUCCESS
    })
}
