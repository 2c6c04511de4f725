use std::fs::File;
use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, Registry};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Plain,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct LogConfig {
    /// Env-filter directives, e.g. `"info,tradenet_connector=debug"`. Empty
    /// means `info`.
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Required when `output` is `file`.
    pub file_path: Option<String>,
}

/// Installs the global `tracing` subscriber described by `config`.
pub fn init(config: &LogConfig) -> Result<()> {
    let directives = if config.level.is_empty() {
        "info"
    } else {
        &config.level
    };
    let filter = EnvFilter::try_new(directives)
        .with_context(|| format!("invalid log filter '{directives}'"))?;
    let registry = Registry::default().with(filter);

    match config.output {
        LogOutput::File => {
            let path = config
                .file_path
                .as_deref()
                .context("log output is 'file' but 'file-path' is not set")?;
            let writer = Arc::new(
                File::create(path).with_context(|| format!("failed to create log file {path}"))?,
            );
            match config.format {
                LogFormat::Json => registry
                    .with(fmt::layer().with_writer(writer).with_ansi(false).json())
                    .init(),
                LogFormat::Plain => registry
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .init(),
            }
        }
        LogOutput::Stdout => match config.format {
            LogFormat::Json => registry
                .with(fmt::layer().with_writer(io::stdout).json())
                .init(),
            LogFormat::Plain => registry.with(fmt::layer().with_writer(io::stdout)).init(),
        },
    }

    Ok(())
}
