// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

//! Parsing of Slurm generic-resource (GRES / TRES) descriptors.
//!
//! A descriptor is a comma-separated list of entries of the form
//! `[gres/]name[:model][:count][(annotation)]`, e.g.
//! `gpu:a100:4(S:0-1),nvme:1` or `gres/gpu:2`. Only the `gpu` entries
//! are counted. Malformed entries are tolerated and count as zero.

use serde::{Deserialize, Serialize};

/// Values that Slurm prints when a descriptor has no value
const PLACEHOLDERS: [&str; 5] = ["", "(null)", "N/A", "n/a", "-"];

/// Namespace tags that may prefix an entry
const NAMESPACES: [&str; 2] = ["gres/", "gres:"];

/// Name used in the breakdown for a gpu entry without a model
const UNTYPED_MODEL: &str = "gpu";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuModel {
    name: String,
    count: Option<u64>,
}

impl GpuModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of GPUs of this model, or None if the count
    /// was missing or could not be parsed
    pub fn count(&self) -> Option<u64> {
        self.count
    }
}

impl std::fmt::Display for GpuModel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.count {
            Some(count) => write!(f, "{}:{}", self.name, count),
            None => write!(f, "{}:?", self.name),
        }
    }
}

///
/// The GPUs described by a single descriptor. The total is always
/// the sum of the parseable per-model counts, capped at `u64::MAX`.
///
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuTally {
    total: u64,
    models: Vec<GpuModel>,
}

impl GpuTally {
    pub fn parse(descriptor: &str) -> Self {
        let descriptor = descriptor.trim();

        if PLACEHOLDERS.contains(&descriptor) {
            return Self::default();
        }

        let mut tally = Self::default();

        for entry in split_entries(descriptor) {
            if let Some(model) = parse_gpu_entry(entry) {
                tally.total = tally.total.saturating_add(model.count.unwrap_or(0));
                tally.models.push(model);
            }
        }

        tally
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn models(&self) -> &[GpuModel] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// The per-model breakdown, e.g. `a100:2+v100:1`, or `-` if
    /// there were no gpu entries
    pub fn breakdown(&self) -> String {
        match self.models.is_empty() {
            true => "-".to_string(),
            false => self
                .models
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<String>>()
                .join("+"),
        }
    }
}

impl std::fmt::Display for GpuTally {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.breakdown())
    }
}

///
/// Return the total number of GPUs in the passed descriptor
///
pub fn gpu_total(descriptor: &str) -> u64 {
    GpuTally::parse(descriptor).total()
}

// split on commas that are not inside an annotation, e.g.
// "gpu:a100:2(S:0,1),nvme:1" has two entries
fn split_entries(descriptor: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut depth: usize = 0;
    let mut start = 0;

    for (i, c) in descriptor.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                entries.push(&descriptor[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    entries.push(&descriptor[start..]);

    entries
        .into_iter()
        .map(|e| e.trim())
        .filter(|e| !e.is_empty())
        .collect()
}

fn parse_gpu_entry(entry: &str) -> Option<GpuModel> {
    // drop any trailing annotation, e.g. "(S:0-1)" or "(IDX:0-3)"
    let entry = match entry.find('(') {
        Some(pos) => &entry[..pos],
        None => entry,
    };

    let entry = NAMESPACES
        .iter()
        .find_map(|ns| entry.strip_prefix(ns))
        .unwrap_or(entry);

    if entry != "gpu" && !entry.starts_with("gpu:") {
        return None;
    }

    // excess fields are ignored
    let fields: Vec<&str> = entry.split(':').take(3).collect();

    let (model, count) = match fields.as_slice() {
        [_, model, count] => (*model, parse_count(count)),
        [_, count] => (UNTYPED_MODEL, parse_count(count)),
        _ => (UNTYPED_MODEL, None),
    };

    let model = match model.trim().is_empty() {
        true => UNTYPED_MODEL,
        false => model.trim(),
    };

    Some(GpuModel {
        name: model.to_string(),
        count,
    })
}

fn parse_count(count: &str) -> Option<u64> {
    let count = count.trim();

    match !count.is_empty() && count.chars().all(|c| c.is_ascii_digit()) {
        true => count.parse::<u64>().ok(),
        false => None,
    }
}
