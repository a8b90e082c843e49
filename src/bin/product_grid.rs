use {
    anyhow::{
        Context,
        Result,
        anyhow,
    },
    clap::Parser,
    product_grid::catalog::{
        Catalog,
        config::{
            self,
            Config,
        },
    },
    std::{
        io::IsTerminal,
        path::PathBuf,
    },
    tracing_subscriber::{
        EnvFilter,
        prelude::*,
    },
};

#[derive(Parser, Debug)]
#[clap(author, version)]
/// Product Grid - page through a remote product catalog
struct Arguments {
    #[clap(short, long, default_value = "config/config.toml")]
    /// Path to configuration file
    config: PathBuf,

    #[clap(long, default_value = ".env")]
    /// Path to an optional environment file
    env_file: PathBuf,

    #[clap(short = 'L', long)]
    /// Whether to print file:line info for each log statement
    log_locations: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse();

    // Secrets such as CATALOG_API__API_KEY may live in a local .env file.
    let env_file_loaded = config::load_env_file(&args.env_file)?;

    // Initialize a Tracing Subscriber
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_file(args.log_locations)
        .with_line_number(args.log_locations)
        .with_thread_ids(true)
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    // Use the compact formatter if we're in a terminal, otherwise use the JSON formatter.
    if std::io::stderr().is_terminal() {
        registry.with(fmt_layer.compact()).init();
    } else {
        registry.with(fmt_layer.json()).init();
    }

    if !args.config.as_path().exists() {
        return Err(anyhow!("No config found under {:?}", args.config.to_str()));
    }

    if env_file_loaded {
        tracing::info!(env_file = %args.env_file.display(), "Loaded environment file.");
    }
    tracing::info!(config = %args.config.display(), "Loading config.");

    let config = Config::new(&args.config).context("Could not parse config")?;

    Catalog::new(config).start().await;
    Ok(())
}
