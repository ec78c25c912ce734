// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

///
/// Start tracing. Logs are always written to stderr, as stdout
/// carries the report. `RUST_LOG` takes precedence over `verbose`,
/// and `RUST_LOG_FORMAT` can be set to `json` or `pretty`.
///
pub fn initialise_tracing(verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(match verbose {
            true => "debug",
            false => "warn",
        })
    });

    let sub = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match std::env::var("RUST_LOG_FORMAT") {
        Ok(format) => {
            let format = format.to_lowercase();
            match format.as_str() {
                "json" => {
                    sub.json().init();
                }
                "pretty" => {
                    sub.pretty().init();
                }
                _ => {
                    sub.init();
                }
            }
        }
        Err(_) => sub.init(),
    };
}

fn default_sinfo() -> String {
    "sinfo".to_string()
}

fn default_squeue() -> String {
    "squeue".to_string()
}

fn default_scontrol() -> String {
    "scontrol".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_expand_hostlists() -> bool {
    true
}

///
/// Configuration of the external Slurm commands. Each command is
/// a shell-style string, so composite commands such as
/// `"ssh login01 squeue"` or `"docker exec slurmctld sinfo"` can
/// be used.
///
/// ```toml
/// sinfo = "sinfo"
/// squeue = "/opt/slurm/bin/squeue"
/// scontrol = "scontrol"
/// timeout_secs = 30
/// expand_hostlists = true
/// ```
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_sinfo")]
    sinfo: String,

    #[serde(default = "default_squeue")]
    squeue: String,

    #[serde(default = "default_scontrol")]
    scontrol: String,

    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,

    #[serde(default = "default_expand_hostlists")]
    expand_hostlists: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sinfo: default_sinfo(),
            squeue: default_squeue(),
            scontrol: default_scontrol(),
            timeout_secs: default_timeout_secs(),
            expand_hostlists: default_expand_hostlists(),
        }
    }
}

impl Config {
    pub fn sinfo(&self) -> &str {
        &self.sinfo
    }

    pub fn squeue(&self) -> &str {
        &self.squeue
    }

    pub fn scontrol(&self) -> &str {
        &self.scontrol
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn expand_hostlists(&self) -> bool {
        self.expand_hostlists
    }

    pub fn parse(config: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(config)?;

        if config.timeout_secs == 0 {
            return Err(Error::Misconfigured(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        for (key, command) in [
            ("sinfo", &config.sinfo),
            ("squeue", &config.squeue),
            ("scontrol", &config.scontrol),
        ] {
            if command.trim().is_empty() {
                return Err(Error::Misconfigured(format!(
                    "The '{}' command cannot be empty",
                    key
                )));
            }
        }

        Ok(config)
    }

    ///
    /// Load the config from the passed file. It is an error if the
    /// file does not exist.
    ///
    pub fn load(config_file: &Path) -> Result<Self, Error> {
        let config = std::fs::read_to_string(config_file)
            .with_context(|| format!("Could not read config file: {:?}", config_file))?;

        Self::parse(&config)
    }

    ///
    /// Load the config from `config_file` if passed, else from the
    /// default location if a file exists there, else use the defaults.
    ///
    pub fn load_or_default(config_file: Option<&Path>) -> Result<Self, Error> {
        match config_file {
            Some(config_file) => Self::load(config_file),
            None => {
                let config_file = default_config_file();

                match config_file.try_exists()? {
                    true => {
                        tracing::debug!("Loading config from {}", config_file.display());
                        Self::load(&config_file)
                    }
                    false => Ok(Self::default()),
                }
            }
        }
    }
}

pub fn default_config_file() -> PathBuf {
    dirs::config_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gpureport")
        .join("config.toml")
}
