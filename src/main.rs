use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;

use gemini_proxy::config::{ApiProtocol, AppConfig};

/// Serve OpenAI or Ollama compatible endpoints backed by Gemini.
#[derive(Debug, Parser)]
#[command(name = "gemini-proxy", version, about)]
struct Cli {
    /// Address to listen on, e.g. 0.0.0.0:5555 or :5555
    #[arg(long)]
    listen: Option<String>,

    /// Front-end protocol to expose
    #[arg(long, value_enum)]
    api: Option<ApiProtocol>,

    /// YAML config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Gemini REST endpoint override
    #[arg(long)]
    base_url: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, hide = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(api) = cli.api {
        config.api = api;
    }
    if let Some(base_url) = cli.base_url {
        config.base_url = Some(base_url);
    }
    config.debug |= cli.debug;

    gemini_proxy::init_tracing(config.debug);

    let api_key = match cli.api_key {
        Some(key) if !key.is_empty() => key,
        _ => bail!("GEMINI_API_KEY environment variable is not set"),
    };

    gemini_proxy::run(config, api_key).await
}
