// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

use gpureport::config::Config;
use gpureport::hostlist::{is_compressed, LiteralExpander, NodeExpander};
use gpureport::query::{
    ActiveJobRow, InventoryRow, JobRow, ACTIVE_JOBS_FORMAT, ALL_JOBS_FORMAT, INVENTORY_FORMAT,
};
use gpureport::Error;

use crate::runner::{Command, SlurmRunner};

///
/// Query sinfo for every node and partition pair
///
pub async fn query_inventory(runner: &SlurmRunner) -> Result<Vec<InventoryRow>, Error> {
    let cmd = runner.build_command(
        Command::Sinfo,
        vec![
            "--noheader".to_string(),
            "--Node".to_string(),
            format!("--format={}", INVENTORY_FORMAT),
        ],
    )?;

    let rows = InventoryRow::parse_all(&runner.run(&cmd).await?);

    tracing::debug!("sinfo returned {} node rows", rows.len());

    Ok(rows)
}

///
/// Query squeue for the jobs in its default (pending and running) view
///
pub async fn query_active_jobs(runner: &SlurmRunner) -> Result<Vec<ActiveJobRow>, Error> {
    let cmd = runner.build_command(
        Command::Squeue,
        vec![
            "--noheader".to_string(),
            format!("--format={}", ACTIVE_JOBS_FORMAT),
        ],
    )?;

    let rows = ActiveJobRow::parse_all(&runner.run(&cmd).await?);

    tracing::debug!("squeue returned {} active jobs", rows.len());

    Ok(rows)
}

///
/// Query squeue for jobs in all states, across all partitions
///
pub async fn query_all_jobs(runner: &SlurmRunner) -> Result<Vec<JobRow>, Error> {
    let cmd = runner.build_command(
        Command::Squeue,
        vec![
            "--noheader".to_string(),
            "--all".to_string(),
            "--states=all".to_string(),
            format!("--format={}", ALL_JOBS_FORMAT),
        ],
    )?;

    let rows = JobRow::parse_all(&runner.run(&cmd).await?);

    tracing::debug!("squeue returned {} jobs", rows.len());

    Ok(rows)
}

///
/// Expands hostlists using `scontrol show hostnames`
///
#[derive(Debug, Clone)]
pub struct ScontrolExpander {
    runner: SlurmRunner,
}

impl ScontrolExpander {
    pub fn new(runner: &SlurmRunner) -> Self {
        Self {
            runner: runner.clone(),
        }
    }

    async fn call(&self, token: &str) -> Result<Vec<String>, Error> {
        let cmd = self.runner.build_command(
            Command::Scontrol,
            vec![
                "show".to_string(),
                "hostnames".to_string(),
                token.to_string(),
            ],
        )?;

        Ok(self
            .runner
            .run(&cmd)
            .await?
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect())
    }
}

impl NodeExpander for ScontrolExpander {
    async fn expand(&self, token: &str) -> Vec<String> {
        let token = token.trim();

        if !is_compressed(token) {
            return vec![token.to_string()];
        }

        match self.call(token).await {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::error!("Could not expand hostlist '{}': {}", token, e);
                Vec::new()
            }
        }
    }
}

///
/// The hostlist expander chosen at runtime
///
#[derive(Debug, Clone)]
pub enum Expander {
    Scontrol(ScontrolExpander),
    Literal(LiteralExpander),
}

impl Expander {
    ///
    /// Use scontrol if it is enabled and can be found, otherwise
    /// treat every node-list token as a single node name
    ///
    pub fn new(runner: &SlurmRunner, config: &Config) -> Self {
        if !config.expand_hostlists() {
            tracing::debug!("Hostlist expansion is disabled");
            return Expander::Literal(LiteralExpander);
        }

        match runner.is_available(Command::Scontrol) {
            true => Expander::Scontrol(ScontrolExpander::new(runner)),
            false => {
                tracing::warn!(
                    "{} is not available - node lists will not be expanded",
                    Command::Scontrol
                );
                Expander::Literal(LiteralExpander)
            }
        }
    }
}

impl NodeExpander for Expander {
    async fn expand(&self, token: &str) -> Vec<String> {
        match self {
            Expander::Scontrol(expander) => expander.expand(token).await,
            Expander::Literal(expander) => expander.expand(token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpureport::report::Report;
    use gpureport::NodesView;

    fn setup(config: &str) -> (Config, SlurmRunner) {
        #[allow(clippy::unwrap_used)]
        let config = Config::parse(config).unwrap();
        let runner = SlurmRunner::new(&config);
        (config, runner)
    }

    #[tokio::test]
    async fn test_queries() {
        let (_, runner) = setup(
            r#"
            sinfo = "sh -c 'echo \"gpu01|gpu:a100:4|gpuA*\"; echo \"gpu02|gpu:a100:2|gpuA\"' sinfo"
            squeue = "sh -c 'echo \"gpu01|gres/gpu:a100:2|100|alice|gpuA\"' squeue"
            "#,
        );

        #[allow(clippy::unwrap_used)]
        let inventory = query_inventory(&runner).await.unwrap();
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory[0].partition(), "gpuA");

        #[allow(clippy::unwrap_used)]
        let jobs = query_active_jobs(&runner).await.unwrap();
        assert_eq!(jobs.len(), 1);

        let view = NodesView::build(&inventory, &jobs, &LiteralExpander).await;
        let rows = view.rows();
        assert_eq!(rows[0][3..7], ["4", "2", "2", "1"]);
        assert_eq!(rows[1][3..7], ["2", "0", "2", "0"]);
    }

    #[tokio::test]
    async fn test_failed_query() {
        let (_, runner) = setup("squeue = \"sh -c 'exit 1' squeue\"");
        assert!(query_all_jobs(&runner).await.is_err());
    }

    #[tokio::test]
    async fn test_scontrol_expander() {
        let (_, runner) = setup("scontrol = \"sh -c 'echo gpu01; echo; echo gpu02' scontrol\"");
        let expander = ScontrolExpander::new(&runner);

        assert_eq!(expander.expand("gpu[01-02]").await, vec!["gpu01", "gpu02"]);

        // plain node names are not passed to scontrol
        assert_eq!(expander.expand("gpu07").await, vec!["gpu07"]);
    }

    #[tokio::test]
    async fn test_scontrol_expander_failure() {
        let (_, runner) = setup("scontrol = \"sh -c 'exit 1' scontrol\"");
        let expander = ScontrolExpander::new(&runner);

        assert!(expander.expand("gpu[01-02]").await.is_empty());
    }

    #[tokio::test]
    async fn test_expander_fallback() {
        let (config, runner) = setup("scontrol = \"/nonexistent/bin/scontrol\"");
        let expander = Expander::new(&runner, &config);

        assert!(matches!(expander, Expander::Literal(_)));
        assert_eq!(expander.expand("gpu[01-02]").await, vec!["gpu[01-02]"]);

        let (config, runner) = setup("scontrol = \"sh\"\nexpand_hostlists = false");
        assert!(matches!(
            Expander::new(&runner, &config),
            Expander::Literal(_)
        ));

        let (config, runner) = setup("scontrol = \"sh\"");
        assert!(matches!(
            Expander::new(&runner, &config),
            Expander::Scontrol(_)
        ));
    }
}
