// Configuration module for gemini-proxy

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Which front-end protocol the server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ApiProtocol {
    #[default]
    #[serde(rename = "openai")]
    #[value(name = "openai")]
    OpenAi,
    Ollama,
}

impl fmt::Display for ApiProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiProtocol::OpenAi => write!(f, "openai"),
            ApiProtocol::Ollama => write!(f, "ollama"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default)]
    pub api: ApiProtocol,

    /// Overrides the Gemini REST endpoint.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub debug: bool,
}

pub const DEFAULT_LISTEN: &str = "0.0.0.0:5555";

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            api: ApiProtocol::default(),
            base_url: None,
            debug: false,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// `:5555` binds every interface, as Go-style listen addresses do.
    pub fn bind_addr(&self) -> String {
        if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        }
    }
}
