use std::path::PathBuf;

use anyhow::{bail, Result};
use hookgate_common::AppConfig;
use tracing::info;

pub const DEFAULT_CONFIG_PATH: &str = "config/hookgate.yaml";

/// Command line: `hookgate [CONFIG_PATH] [--allow-exec]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerArgs {
    pub config_path: PathBuf,
    pub allow_exec: bool,
}

impl ServerArgs {
    /// Parse arguments, excluding the program name. Unknown `--` flags and
    /// a second config path are errors.
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config_path = None;
        let mut allow_exec = false;

        for arg in args.into_iter().map(Into::into) {
            if arg == "--allow-exec" {
                allow_exec = true;
            } else if arg.starts_with("--") {
                bail!("unknown option {arg}; usage: hookgate [CONFIG_PATH] [--allow-exec]");
            } else if config_path.is_none() {
                config_path = Some(PathBuf::from(arg));
            } else {
                bail!("unexpected argument {arg}; usage: hookgate [CONFIG_PATH] [--allow-exec]");
            }
        }

        Ok(Self {
            config_path: config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            allow_exec,
        })
    }
}

/// Configuration resolved from file and command line.
pub struct ServerConfig {
    pub config: AppConfig,
}

impl ServerConfig {
    /// Load the file named by `args`; `--allow-exec` overrides the file.
    pub fn load(args: &ServerArgs) -> Result<Self> {
        let path = args.config_path.to_string_lossy().to_string();
        info!(path = %path, "loading configuration");

        let mut config = AppConfig::load(&path)?;
        if args.allow_exec {
            config.executor.allow_exec = true;
        }

        Ok(Self { config })
    }
}
