use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("host must not be empty")]
    EmptyHost,

    #[error("port must be non-zero")]
    ZeroPort,

    #[error("workers must be at least 1")]
    ZeroWorkers,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "catboost-serve")]
#[command(about = "HTTP inference service for the student outcome classifier")]
pub struct ServerConfig {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Resolved against the working directory.
    #[arg(long, env = "MODEL_PATH", default_value = "../models/catboost-model.onnx")]
    pub model_path: PathBuf,

    /// Defaults to the number of CPUs.
    #[arg(long, env = "WORKERS")]
    pub workers: Option<usize>,

    #[arg(long, env = "VERBOSE", help = "Enable verbose output")]
    pub verbose: bool,
}

impl ServerConfig {
    pub fn bind_address(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.workers == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }
}
