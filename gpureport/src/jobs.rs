// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

use crate::gres::gpu_total;
use crate::query::JobRow;
use crate::report::Report;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    row: JobRow,
    gpus: u64,
}

impl JobRecord {
    pub fn row(&self) -> &JobRow {
        &self.row
    }

    pub fn gpus(&self) -> u64 {
        self.gpus
    }
}

///
/// One record per job, in the order reported by squeue. Pending jobs
/// keep their reason in place of the node list.
///
#[derive(Debug, Clone, Default)]
pub struct JobsView {
    jobs: Vec<JobRecord>,
}

impl JobsView {
    pub fn build(rows: &[JobRow]) -> Self {
        Self {
            jobs: rows
                .iter()
                .map(|row| JobRecord {
                    row: row.clone(),
                    gpus: gpu_total(row.gres()),
                })
                .collect(),
        }
    }

    pub fn jobs(&self) -> &[JobRecord] {
        &self.jobs
    }
}

impl Report for JobsView {
    fn headers(&self) -> Vec<String> {
        [
            "JOBID",
            "USER",
            "PARTITION",
            "NAME",
            "STATE",
            "ELAPSED",
            "NODES",
            "NODELIST(REASON)",
            "GPUS",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect()
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.jobs
            .iter()
            .map(|job| {
                let row = job.row();
                vec![
                    row.job_id().to_string(),
                    row.user().to_string(),
                    row.partition().to_string(),
                    row.name().to_string(),
                    row.state().to_string(),
                    row.elapsed().to_string(),
                    row.node_count().to_string(),
                    row.nodes_or_reason().to_string(),
                    job.gpus().to_string(),
                ]
            })
            .collect()
    }
}
