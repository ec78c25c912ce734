// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::gres::{gpu_total, GpuTally};
use crate::hostlist::{is_sentinel, NodeExpander};
use crate::query::{ActiveJobRow, InventoryRow};
use crate::report::Report;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRecord {
    name: String,
    partitions: BTreeSet<String>,
    gpus: GpuTally,
    allocated: u64,
    jobs: Vec<String>,
}

impl NodeRecord {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn add_partition(&mut self, partition: &str) {
        if !partition.is_empty() {
            self.partitions.insert(partition.to_string());
        }
    }

    fn allocate(&mut self, gpus: u64, job_id: &str, user: &str, partition: &str) {
        self.allocated = self.allocated.saturating_add(gpus);
        self.jobs.push(format!("{}({})", job_id, user));
        self.add_partition(partition);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partitions(&self) -> &BTreeSet<String> {
        &self.partitions
    }

    pub fn gpus(&self) -> &GpuTally {
        &self.gpus
    }

    pub fn total(&self) -> u64 {
        self.gpus.total()
    }

    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    /// GPUs not allocated to any job. This is never negative, even
    /// if jobs have been allocated more GPUs than the node reports.
    pub fn idle(&self) -> u64 {
        self.total().saturating_sub(self.allocated)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// The "jobid(user)" annotations, in the order the jobs were seen
    pub fn jobs(&self) -> &[String] {
        &self.jobs
    }
}

///
/// Per-node GPU capacity and allocation. Nodes are kept in the order
/// they were first listed by the inventory query.
///
#[derive(Debug, Clone, Default)]
pub struct NodesView {
    nodes: Vec<NodeRecord>,
    index: HashMap<String, usize>,

    // allocations against nodes that the inventory did not list
    unlisted: BTreeMap<String, NodeRecord>,
}

impl NodesView {
    ///
    /// Build the list of known nodes from the inventory rows. A node
    /// appears once per partition, so partitions are merged, while
    /// the GPU descriptor is the same on every row.
    ///
    pub fn from_inventory(rows: &[InventoryRow]) -> Self {
        let mut view = Self::default();

        for row in rows {
            let position = match view.index.get(row.node()) {
                Some(position) => *position,
                None => {
                    view.nodes.push(NodeRecord::new(row.node()));
                    view.index
                        .insert(row.node().to_string(), view.nodes.len() - 1);
                    view.nodes.len() - 1
                }
            };

            let node = &mut view.nodes[position];
            node.add_partition(row.partition());
            node.gpus = GpuTally::parse(row.gres());
        }

        tracing::debug!("Found {} nodes in the inventory", view.nodes.len());

        view
    }

    ///
    /// Add the allocations of the passed (active) jobs to the nodes.
    /// Jobs without a node assignment, e.g. pending jobs, are skipped.
    ///
    pub async fn reconcile<E: NodeExpander>(&mut self, rows: &[ActiveJobRow], expander: &E) {
        for row in rows {
            if is_sentinel(row.nodes()) {
                tracing::debug!("Job {} has no allocated nodes", row.job_id());
                continue;
            }

            let gpus = gpu_total(row.gres());
            let names = expander.expand(row.nodes()).await;

            if names.is_empty() {
                tracing::warn!(
                    "Could not find any nodes for job {} from '{}'",
                    row.job_id(),
                    row.nodes()
                );
                continue;
            }

            for name in names {
                let node = match self.index.get(&name) {
                    Some(position) => &mut self.nodes[*position],
                    None => {
                        tracing::debug!(
                            "Job {} is allocated node {} which is not in the inventory",
                            row.job_id(),
                            name
                        );
                        self.unlisted
                            .entry(name.clone())
                            .or_insert_with(|| NodeRecord::new(&name))
                    }
                };

                node.allocate(gpus, row.job_id(), row.user(), row.partition());
            }
        }
    }

    ///
    /// Build the view from the inventory and the active jobs
    ///
    pub async fn build<E: NodeExpander>(
        inventory: &[InventoryRow],
        jobs: &[ActiveJobRow],
        expander: &E,
    ) -> Self {
        let mut view = Self::from_inventory(inventory);
        view.reconcile(jobs, expander).await;
        view
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn get(&self, name: &str) -> Option<&NodeRecord> {
        self.index.get(name).map(|position| &self.nodes[*position])
    }

    ///
    /// Allocations against nodes that were not listed by the inventory.
    /// These are not part of the report.
    ///
    pub fn unlisted(&self) -> impl Iterator<Item = &NodeRecord> {
        self.unlisted.values()
    }
}

impl Report for NodesView {
    fn headers(&self) -> Vec<String> {
        [
            "NODE",
            "PARTITIONS",
            "GPU_MODELS",
            "TOTAL",
            "ALLOC",
            "IDLE",
            "JOBS",
            "JOB_IDS(USER)",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect()
    }

    fn rows(&self) -> Vec<Vec<String>> {
        self.nodes
            .iter()
            .map(|node| {
                vec![
                    node.name().to_string(),
                    node.partitions()
                        .iter()
                        .cloned()
                        .collect::<Vec<String>>()
                        .join(","),
                    node.gpus().breakdown(),
                    node.total().to_string(),
                    node.allocated().to_string(),
                    node.idle().to_string(),
                    node.job_count().to_string(),
                    match node.jobs().is_empty() {
                        true => "-".to_string(),
                        false => node.jobs().join(","),
                    },
                ]
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hostlist::LiteralExpander;

    /// Expands a fixed set of tokens, for testing without scontrol
    struct MapExpander(HashMap<String, Vec<String>>);

    impl NodeExpander for MapExpander {
        async fn expand(&self, token: &str) -> Vec<String> {
            self.0
                .get(token)
                .cloned()
                .unwrap_or_else(|| vec![token.to_string()])
        }
    }

    fn inventory(output: &str) -> Vec<InventoryRow> {
        InventoryRow::parse_all(output)
    }

    fn jobs(output: &str) -> Vec<ActiveJobRow> {
        ActiveJobRow::parse_all(output)
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let view = NodesView::build(
            &inventory("gpu01|gpu:a100:4|gpuA\ngpu02|gpu:a100:2|gpuA\n"),
            &jobs("gpu01|gpu:a100:2|100|alice|gpuA\n"),
            &LiteralExpander,
        )
        .await;

        let rows = view.rows();
        assert_eq!(
            rows[0],
            vec!["gpu01", "gpuA", "a100:4", "4", "2", "2", "1", "100(alice)"]
        );
        assert_eq!(
            rows[1],
            vec!["gpu02", "gpuA", "a100:2", "2", "0", "2", "0", "-"]
        );
    }

    #[test]
    fn test_inventory_order_and_partitions() {
        let view = NodesView::from_inventory(&inventory(
            "gpu09|gpu:v100:2|gpuB\n\
             gpu01|gpu:a100:4|gpuA\n\
             gpu09|gpu:v100:2|gpuA\n\
             gpu01|gpu:a100:4|gpuA\n\
             cpu01|(null)|cpu*\n",
        ));

        let names: Vec<&str> = view.nodes().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["gpu09", "gpu01", "cpu01"]);

        let rows = view.rows();
        assert_eq!(rows[0][1], "gpuA,gpuB");
        assert_eq!(rows[1][1], "gpuA");
        assert_eq!(rows[2][1], "cpu");
        assert_eq!(rows[2][2], "-");
        assert_eq!(rows[2][3], "0");
    }

    #[tokio::test]
    async fn test_order_independent_of_jobs() {
        let view = NodesView::build(
            &inventory("b|gpu:2|p\na|gpu:2|p\nc|gpu:2|p\n"),
            &jobs("c|gpu:1|1|u|p\na|gpu:1|2|u|p\nb|gpu:1|3|u|p\n"),
            &LiteralExpander,
        )
        .await;

        let names: Vec<&str> = view.nodes().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_expansion_and_annotations() {
        let expander = MapExpander(HashMap::from([(
            "gpu[01-02]".to_string(),
            vec!["gpu01".to_string(), "gpu02".to_string()],
        )]));

        let view = NodesView::build(
            &inventory("gpu01|gpu:a100:4|gpuA\ngpu02|gpu:a100:4|gpuA\n"),
            &jobs(
                "gpu[01-02]|gres/gpu:2|J1|alice|gpuA\n\
                 gpu01|gres/gpu:1|J2|bob|debug\n",
            ),
            &expander,
        )
        .await;

        #[allow(clippy::unwrap_used)]
        let gpu01 = view.get("gpu01").unwrap();
        assert_eq!(gpu01.allocated(), 3);
        assert_eq!(gpu01.idle(), 1);
        assert_eq!(gpu01.job_count(), 2);
        assert_eq!(gpu01.jobs().join(","), "J1(alice),J2(bob)");
        assert_eq!(view.rows()[0][1], "debug,gpuA");

        #[allow(clippy::unwrap_used)]
        let gpu02 = view.get("gpu02").unwrap();
        assert_eq!(gpu02.allocated(), 2);
        assert_eq!(gpu02.job_count(), 1);
    }

    #[tokio::test]
    async fn test_pending_jobs_skipped() {
        let view = NodesView::build(
            &inventory("gpu01|gpu:4|gpuA\n"),
            &jobs("|gpu:2|1|alice|gpuA\n(Priority)|gpu:2|2|bob|gpuA\nn/a|gpu:2|3|carol|gpuA\n"),
            &LiteralExpander,
        )
        .await;

        #[allow(clippy::unwrap_used)]
        let gpu01 = view.get("gpu01").unwrap();
        assert_eq!(gpu01.allocated(), 0);
        assert_eq!(gpu01.job_count(), 0);
        assert_eq!(view.unlisted().count(), 0);
    }

    #[tokio::test]
    async fn test_idle_never_negative() {
        let view = NodesView::build(
            &inventory("gpu01|gpu:a100:2|gpuA\ngpu02|gpu:a100:x|gpuA\n"),
            &jobs("gpu01|gpu:4|1|alice|gpuA\ngpu02|gpu:1|2|bob|gpuA\n"),
            &LiteralExpander,
        )
        .await;

        for node in view.nodes() {
            assert_eq!(node.idle(), node.total().saturating_sub(node.allocated()));
        }

        #[allow(clippy::unwrap_used)]
        let gpu01 = view.get("gpu01").unwrap();
        assert_eq!(gpu01.allocated(), 4);
        assert_eq!(gpu01.idle(), 0);
    }

    #[tokio::test]
    async fn test_comma_list_without_scontrol() {
        let view = NodesView::build(
            &inventory("gpu01|gpu:4|gpuA\ngpu02|gpu:4|gpuA\n"),
            &jobs("gpu01,gpu02|gpu:1|7|dave|gpuA\n"),
            &LiteralExpander,
        )
        .await;

        for name in ["gpu01", "gpu02"] {
            #[allow(clippy::unwrap_used)]
            let node = view.get(name).unwrap();
            assert_eq!(node.allocated(), 1);
            assert_eq!(node.jobs(), &["7(dave)".to_string()]);
        }
        assert_eq!(view.unlisted().count(), 0);
    }

    #[tokio::test]
    async fn test_huge_allocations_saturate() {
        let view = NodesView::build(
            &inventory("gpu01|gpu:4|gpuA\n"),
            &jobs("gpu01|gpu:18446744073709551615|1|alice|gpuA\ngpu01|gpu:1|2|bob|gpuA\n"),
            &LiteralExpander,
        )
        .await;

        #[allow(clippy::unwrap_used)]
        let gpu01 = view.get("gpu01").unwrap();
        assert_eq!(gpu01.allocated(), u64::MAX);
        assert_eq!(gpu01.idle(), 0);
        assert_eq!(gpu01.job_count(), 2);
    }

    #[tokio::test]
    async fn test_unlisted_nodes_not_reported() {
        let view = NodesView::build(
            &inventory("gpu01|gpu:4|gpuA\n"),
            &jobs("gpu99|gpu:2|1|alice|gpuA\n"),
            &LiteralExpander,
        )
        .await;

        assert_eq!(view.rows().len(), 1);
        assert_eq!(view.rows()[0][4], "0");

        let unlisted: Vec<&NodeRecord> = view.unlisted().collect();
        assert_eq!(unlisted.len(), 1);
        assert_eq!(unlisted[0].name(), "gpu99");
        assert_eq!(unlisted[0].allocated(), 2);
    }

    #[tokio::test]
    async fn test_failed_expansion_skipped() {
        let expander = MapExpander(HashMap::from([("gpu[01-02]".to_string(), vec![])]));

        let view = NodesView::build(
            &inventory("gpu01|gpu:4|gpuA\n"),
            &jobs("gpu[01-02]|gpu:2|1|alice|gpuA\ngpu01|gpu:1|2|bob|gpuA\n"),
            &expander,
        )
        .await;

        #[allow(clippy::unwrap_used)]
        let gpu01 = view.get("gpu01").unwrap();
        assert_eq!(gpu01.allocated(), 1);
        assert_eq!(gpu01.jobs(), &["2(bob)".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_inputs() {
        let view = NodesView::build(&[], &[], &LiteralExpander).await;
        assert!(view.rows().is_empty());
        assert_eq!(view.headers().len(), 8);
    }

    #[tokio::test]
    async fn test_idempotent() {
        let inv = inventory("gpu01|gpu:a100:4|gpuA\ngpu02|gpu:v100:2|gpuB\n");
        let active = jobs("gpu01|gpu:1|1|alice|gpuA\ngpu02|gpu:2|2|bob|gpuB\n");

        let first = NodesView::build(&inv, &active, &LiteralExpander).await;
        let second = NodesView::build(&inv, &active, &LiteralExpander).await;
        assert_eq!(first.rows(), second.rows());
    }
}
