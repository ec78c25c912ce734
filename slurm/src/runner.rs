// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

use anyhow::Context;
use gpureport::config::Config;
use gpureport::Error;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Sinfo,
    Squeue,
    Scontrol,
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Command::Sinfo => write!(f, "sinfo"),
            Command::Squeue => write!(f, "squeue"),
            Command::Scontrol => write!(f, "scontrol"),
        }
    }
}

///
/// A fully split command line, tagged with the query it runs so that
/// log and error messages can name it
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    query: Command,
    argv: Vec<String>,
}

impl CommandLine {
    pub fn query(&self) -> Command {
        self.query
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.argv.join(" "))
    }
}

///
/// Runs the Slurm query commands. Each command is run to completion,
/// one at a time, and is killed if it takes longer than the timeout.
///
#[derive(Debug, Clone)]
pub struct SlurmRunner {
    sinfo: String,
    squeue: String,
    scontrol: String,
    timeout: std::time::Duration,
}

impl SlurmRunner {
    pub fn new(config: &Config) -> Self {
        SlurmRunner {
            sinfo: config.sinfo().to_string(),
            squeue: config.squeue().to_string(),
            scontrol: config.scontrol().to_string(),
            timeout: config.timeout(),
        }
    }

    fn binary(&self, cmd_type: Command) -> &str {
        match cmd_type {
            Command::Sinfo => &self.sinfo,
            Command::Squeue => &self.squeue,
            Command::Scontrol => &self.scontrol,
        }
    }

    ///
    /// Build the command line for the passed query. The configured
    /// program may be composite (e.g. "docker exec slurmctld squeue"),
    /// so it is split shell-style before the arguments are appended.
    /// Empty arguments are dropped.
    ///
    pub fn build_command(&self, query: Command, args: Vec<String>) -> Result<CommandLine, Error> {
        let program = self.binary(query);

        let mut argv = match shlex::split(program) {
            Some(parts) if !parts.is_empty() => parts,
            _ => {
                return Err(Error::Call(format!(
                    "Could not parse the {} program '{}'",
                    query, program
                )));
            }
        };

        argv.extend(args);
        argv.retain(|arg| !arg.trim().is_empty());

        Ok(CommandLine { query, argv })
    }

    ///
    /// Return whether or not the program for the passed command can
    /// be found, either as a path or on the PATH
    ///
    pub fn is_available(&self, cmd_type: Command) -> bool {
        let program = match shlex::split(self.binary(cmd_type)) {
            Some(parts) => match parts.into_iter().next() {
                Some(program) => program,
                None => return false,
            },
            None => return false,
        };

        if program.contains('/') {
            return Path::new(&program).is_file();
        }

        match std::env::var_os("PATH") {
            Some(paths) => std::env::split_paths(&paths).any(|dir| dir.join(&program).is_file()),
            None => false,
        }
    }

    ///
    /// Run the passed command line and return its standard output.
    /// A query that takes more than half of the timeout is reported
    /// as slow, and one that exceeds the timeout is killed.
    ///
    pub async fn run(&self, cmd: &CommandLine) -> Result<String, Error> {
        let query = cmd.query();
        let (program, args) = match cmd.argv.split_first() {
            Some(split) => split,
            None => return Err(Error::Call(format!("No program to run for {}", query))),
        };

        tracing::debug!("{} query: {}", query, cmd);

        let started = tokio::time::Instant::now();
        let child = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::error!("Could not start {} query '{}': {}", query, cmd, e);
                return Err(Error::Call(format!("Could not start {}: {}", query, e)));
            }
            Err(_) => {
                tracing::error!(
                    "{} query '{}' was killed after {}s",
                    query,
                    cmd,
                    self.timeout.as_secs()
                );
                return Err(Error::Timeout(format!(
                    "{} did not finish within {}s",
                    query,
                    self.timeout.as_secs()
                )));
            }
        };

        let elapsed = started.elapsed();

        if elapsed > self.timeout / 2 {
            tracing::warn!(
                "{} query is slow: took {:.1}s of a {}s timeout",
                query,
                elapsed.as_secs_f64(),
                self.timeout.as_secs()
            );
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(
                "{} query '{}' failed ({}): {}",
                query,
                cmd,
                output.status,
                stderr.trim()
            );
            return Err(Error::Call(format!(
                "{} exited with {}: {}",
                query,
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .with_context(|| format!("{} printed output that is not UTF-8", query))
            .map_err(Error::from)
    }
}
