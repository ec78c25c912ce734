// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, BTreeSet};

use crate::gres::gpu_total;
use crate::hostlist::is_sentinel;
use crate::query::JobRow;
use crate::report::Report;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecord {
    user: String,
    job_count: u64,
    gpus: u64,
    partitions: BTreeSet<String>,
    node_tokens: BTreeSet<String>,
    job_ids: Vec<String>,
}

impl UserRecord {
    fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            ..Default::default()
        }
    }

    fn add_job(&mut self, row: &JobRow) {
        self.job_count += 1;
        self.gpus = self.gpus.saturating_add(gpu_total(row.gres()));

        if !row.partition().is_empty() {
            self.partitions.insert(row.partition().to_string());
        }

        self.node_tokens.insert(row.nodes_or_reason().to_string());
        self.job_ids.push(row.job_id().to_string());
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn job_count(&self) -> u64 {
        self.job_count
    }

    pub fn gpus(&self) -> u64 {
        self.gpus
    }

    pub fn partitions(&self) -> &BTreeSet<String> {
        &self.partitions
    }

    /// The raw node-list (or reason) tokens of all of the user's jobs
    pub fn node_tokens(&self) -> &BTreeSet<String> {
        &self.node_tokens
    }

    /// Job ids in the order they were seen. Not de-duplicated.
    pub fn job_ids(&self) -> &[String] {
        &self.job_ids
    }

    ///
    /// The number of distinct nodes named by the user's jobs. Tokens are
    /// split on commas but not hostlist-expanded, so "gpu[01-04]" counts
    /// as one node. This is an approximation.
    ///
    pub fn distinct_nodes(&self) -> usize {
        self.node_tokens
            .iter()
            .filter(|token| !is_sentinel(token))
            .flat_map(|token| token.split(','))
            .map(|node| node.trim())
            .filter(|node| !is_sentinel(node))
            .collect::<BTreeSet<&str>>()
            .len()
    }
}

///
/// Per-user totals over jobs in every state, ordered by user name
///
#[derive(Debug, Clone, Default)]
pub struct UsersView {
    users: BTreeMap<String, UserRecord>,
}

impl UsersView {
    pub fn build(rows: &[JobRow]) -> Self {
        let mut users: BTreeMap<String, UserRecord> = BTreeMap::new();

        for row in rows {
            users
                .entry(row.user().to_string())
                .or_insert_with(|| UserRecord::new(row.user()))
                .add_job(row);
        }

        tracing::debug!("Found {} users from {} jobs", users.len(), rows.len());

        Self { users }
    }

    pub fn users(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.values()
    }

    pub fn get(&self, user: &str) -> Option<&UserRecord> {
        self.users.get(user)
    }
}

impl Report for UsersView {
    fn headers(&self) -> Vec<String> {
        ["USER", "JOBS", "GPUS", "PARTITIONS", "NODES", "JOBIDS"]
            .iter()
            .map(|h| h.to_string())
            .collect()
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.users()
            .map(|user| {
                vec![
                    user.user().to_string(),
                    user.job_count().to_string(),
                    user.gpus().to_string(),
                    user.partitions()
                        .iter()
                        .cloned()
                        .collect::<Vec<String>>()
                        .join(","),
                    user.distinct_nodes().to_string(),
                    user.job_ids().join(","),
                ]
            })
            .collect()
    }
}
