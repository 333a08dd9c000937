//! bald CLI tool
//!
//! Command-line interface for rendering and validating dataset descriptions with bald-core.
//!
//! ## Commands
//!
//! - `render <dataset>`: load a dataset and print its RDF graph
//! - `validate <dataset>`: load a dataset and report unresolvable URIs and broadcast errors
//!
//! Both commands exit non-zero when loading fails; `validate` also does when the graph is
//! invalid. Load diagnostics are logged at `warn` level.

use bald_core::{
    build::{LoadResult, Loader},
    config::BaldConfig,
    serialize::{GraphSerializer, OutputFormat},
    validation::Validator,
    BaldError,
};
use clap::{Args, Parser, Subcommand};
use std::{io::Write, path::PathBuf, process::ExitCode};

#[derive(Parser)]
#[command(name = "bald")]
#[command(author, version, about = "Describe array container files as linked data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LoadArgs {
    /// Dataset description (.toml, .json, .yaml)
    dataset: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Identity base for the graph (default: file://<dataset path>/)
    #[arg(long)]
    base_uri: Option<String>,

    /// Download URL recorded in the distribution block
    #[arg(long)]
    file_locator: Option<String>,

    /// Alias ontology declaration, as name=uri
    #[arg(long = "alias", value_parser = parse_alias)]
    aliases: Vec<(String, String)>,

    /// JSON-LD prefix context (URL or inline JSON)
    #[arg(long = "context")]
    contexts: Vec<String>,

    /// Only serve the documents listed in the configuration; never touch the network
    #[arg(long)]
    offline: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a dataset and print its graph
    Render {
        #[command(flatten)]
        load: LoadArgs,

        /// Output format: ttl, n3, nt, xml or jsonld
        #[arg(short = 'o', long, default_value = "ttl")]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Load a dataset and check it
    Validate {
        #[command(flatten)]
        load: LoadArgs,

        /// Skip URI reachability checks
        #[arg(long)]
        no_uri_checks: bool,
    },
}

fn parse_alias(arg: &str) -> Result<(String, String), String> {
    arg.split_once('=')
        .map(|(name, uri)| (name.trim().to_string(), uri.trim().to_string()))
        .filter(|(name, uri)| !name.is_empty() && !uri.is_empty())
        .ok_or_else(|| format!("expected name=uri, got '{arg}'"))
}

impl LoadArgs {
    fn config(&self) -> Result<BaldConfig, BaldError> {
        let mut config = match &self.config {
            Some(path) => BaldConfig::from_path(path)?,
            None => BaldConfig::default(),
        };
        if let Some(base_uri) = &self.base_uri {
            config.base_uri = Some(base_uri.clone());
        }
        if let Some(locator) = &self.file_locator {
            config.file_locator = Some(locator.clone());
        }
        for (name, uri) in &self.aliases {
            config = config.with_alias(name.clone(), uri.clone());
        }
        config.prefix_contexts.extend(self.contexts.iter().cloned());
        Ok(config)
    }

    fn loader(&self, config: BaldConfig) -> Result<Loader, BaldError> {
        if self.offline {
            Loader::offline(config)
        } else {
            Loader::new(config)
        }
    }

    fn load(&self, loader: &Loader) -> Result<LoadResult, BaldError> {
        let result = loader.load_path(&self.dataset)?;
        for diagnostic in &result.diagnostics {
            tracing::warn!("{diagnostic}");
        }
        Ok(result)
    }
}

fn run(cli: Cli) -> Result<bool, BaldError> {
    match cli.command {
        Commands::Render {
            load,
            format,
            output,
        } => {
            let loader = load.loader(load.config()?)?;
            let result = load.load(&loader)?;
            let serializer = GraphSerializer::new(&result.model);
            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)?;
                    serializer.write(format, file)?;
                    tracing::info!("Wrote {format} to {:?}", path);
                }
                None => {
                    let text = serializer.serialize(format)?;
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(text.as_bytes())?;
                    stdout.flush()?;
                }
            }
            Ok(true)
        }

        Commands::Validate {
            load,
            no_uri_checks,
        } => {
            let mut config = load.config()?;
            if no_uri_checks {
                config.validation.check_uris = false;
            }
            let loader = load.loader(config)?;
            let result = load.load(&loader)?;
            let validator = Validator::new(loader.cache(), loader.config().validation.clone());
            let validation = validator.validate(&result.model)?;
            for message in validation.messages() {
                println!("{message}");
            }
            if validation.is_valid() {
                println!("{}: valid", load.dataset.display());
            }
            Ok(validation.is_valid())
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
