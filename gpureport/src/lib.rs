// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

mod error;

// public API
pub mod config;
pub mod gres;
pub mod hostlist;
pub mod jobs;
pub mod nodes;
pub mod query;
pub mod report;
pub mod users;

pub use error::Error;
pub use jobs::JobsView;
pub use nodes::NodesView;
pub use users::UsersView;
