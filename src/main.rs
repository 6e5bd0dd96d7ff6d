pub mod types;
pub mod config;
pub mod error;
pub mod geocoder;
pub mod population;
pub mod penetration;
pub mod processing;
pub mod sampling;
pub mod estimator;
pub mod server;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the estimate API and the map front-end
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },
    /// Run a single estimate and print the JSON payload
    Estimate {
        #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
        config: PathBuf,

        #[command(flatten)]
        location: LocationArgs,

        /// Map zoom level; above 12 every dot is a single phone
        #[arg(short, long)]
        zoom: Option<f64>,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct LocationArgs {
    /// Free-text place, e.g. "Nairobi, Kenya"
    #[arg(short, long)]
    address: Option<String>,

    /// Viewport as south,west,north,east
    #[arg(short, long, allow_hyphen_values = true)]
    bounds: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { config } => {
            let app_config = load_config(config)?;
            server::start_server(app_config).await?;
        }
        Commands::Estimate { config, location, zoom } => {
            let app_config = load_config(config)?;
            let estimator = server::build_estimator(&app_config)?;

            let query = match (&location.address, &location.bounds) {
                (Some(address), _) => estimator::parse_query(Some(address.as_str()), None, None)?,
                (None, Some(bounds)) => types::LocationQuery::Viewport {
                    bounds: estimator::parse_bounds(bounds)?,
                    zoom: *zoom,
                },
                (None, None) => return Err(error::EstimateError::MissingLocation.into()),
            };
            let result = estimator.estimate(&query).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

/// The default config file is optional; one named explicitly must exist.
fn load_config(path: &Path) -> anyhow::Result<config::AppConfig> {
    let mut app_config = if path == Path::new(DEFAULT_CONFIG) && !path.exists() {
        info!("No {} found, using built-in defaults", DEFAULT_CONFIG);
        config::AppConfig::default()
    } else {
        info!("Loading config: {:?}", path);
        config::AppConfig::load_from_file(path)?
    };
    app_config.apply_env_overrides()?;
    app_config.validate().context("Invalid configuration after environment overrides")?;
    Ok(app_config)
}
