// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

use anyhow::Error as AnyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Any(#[from] AnyError),

    #[error("{0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    IO(#[from] std::io::Error),

    #[error("{0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("{0}")]
    Call(String),

    #[error("{0}")]
    Misconfigured(String),

    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Timeout(String),
}
