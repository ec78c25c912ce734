// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

//! Typed rows parsed from the `|`-delimited output of `sinfo` and `squeue`.

use crate::error::Error;

pub const FIELD_SEPARATOR: char = '|';

/// `sinfo -N` format: one row per node and partition
pub const INVENTORY_FORMAT: &str = "%N|%G|%P";

/// `squeue` format for the allocation reconciler
pub const ACTIVE_JOBS_FORMAT: &str = "%N|%b|%i|%u|%P";

/// `squeue -t all` format for the jobs and users views
pub const ALL_JOBS_FORMAT: &str = "%i|%u|%P|%j|%T|%M|%D|%R|%b";

fn split_fields(line: &str, expected: usize) -> Result<Vec<&str>, Error> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(|f| f.trim()).collect();

    if fields.len() != expected {
        return Err(Error::Parse(format!(
            "Expected {} fields but found {} in line '{}'",
            expected,
            fields.len(),
            line
        )));
    }

    Ok(fields)
}

///
/// Parse every non-empty line of `output` with `parser`. Lines that
/// cannot be parsed are logged and skipped.
///
pub fn parse_lines<T, F>(output: &str, parser: F) -> Vec<T>
where
    F: Fn(&str) -> Result<T, Error>,
{
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parser(line) {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::warn!("Skipping unparseable line: {}", e);
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRow {
    node: String,
    gres: String,
    partition: String,
}

impl InventoryRow {
    pub fn parse(line: &str) -> Result<Self, Error> {
        let fields = split_fields(line, 3)?;

        if fields[0].is_empty() {
            return Err(Error::Parse(format!("Missing node name in line '{}'", line)));
        }

        Ok(Self {
            node: fields[0].to_string(),
            gres: fields[1].to_string(),
            // the default partition is marked with a trailing '*'
            partition: fields[2].trim_end_matches('*').to_string(),
        })
    }

    pub fn parse_all(output: &str) -> Vec<Self> {
        parse_lines(output, Self::parse)
    }

    pub fn node(&self) -> &str {
        &self.node
    }

    pub fn gres(&self) -> &str {
        &self.gres
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveJobRow {
    nodes: String,
    gres: String,
    job_id: String,
    user: String,
    partition: String,
}

impl ActiveJobRow {
    pub fn parse(line: &str) -> Result<Self, Error> {
        let fields = split_fields(line, 5)?;

        Ok(Self {
            nodes: fields[0].to_string(),
            gres: fields[1].to_string(),
            job_id: fields[2].to_string(),
            user: fields[3].to_string(),
            partition: fields[4].to_string(),
        })
    }

    pub fn parse_all(output: &str) -> Vec<Self> {
        parse_lines(output, Self::parse)
    }

    pub fn nodes(&self) -> &str {
        &self.nodes
    }

    pub fn gres(&self) -> &str {
        &self.gres
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRow {
    job_id: String,
    user: String,
    partition: String,
    name: String,
    state: String,
    elapsed: String,
    node_count: String,
    nodes_or_reason: String,
    gres: String,
}

impl JobRow {
    ///
    /// Parse a line in `ALL_JOBS_FORMAT`. Job names are free text and
    /// may contain the separator, so the three fields before the name
    /// are read from the left and the five after it from the right.
    ///
    pub fn parse(line: &str) -> Result<Self, Error> {
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();

        if fields.len() < 9 {
            return Err(Error::Parse(format!(
                "Expected at least 9 fields but found {} in line '{}'",
                fields.len(),
                line
            )));
        }

        let tail = &fields[fields.len() - 5..];
        let name = fields[3..fields.len() - 5].join("|");

        Ok(Self {
            job_id: fields[0].trim().to_string(),
            user: fields[1].trim().to_string(),
            partition: fields[2].trim().to_string(),
            name: name.trim().to_string(),
            state: tail[0].trim().to_string(),
            elapsed: tail[1].trim().to_string(),
            node_count: tail[2].trim().to_string(),
            nodes_or_reason: tail[3].trim().to_string(),
            gres: tail[4].trim().to_string(),
        })
    }

    pub fn parse_all(output: &str) -> Vec<Self> {
        parse_lines(output, Self::parse)
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn elapsed(&self) -> &str {
        &self.elapsed
    }

    pub fn node_count(&self) -> &str {
        &self.node_count
    }

    pub fn nodes_or_reason(&self) -> &str {
        &self.nodes_or_reason
    }

    pub fn gres(&self) -> &str {
        &self.gres
    }
}
