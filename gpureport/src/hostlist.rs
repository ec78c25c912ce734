// SPDX-FileCopyrightText: © 2024 Christopher Woods <Christopher.Woods@bristol.ac.uk>
// SPDX-License-Identifier: MIT

///
/// Return whether or not the passed node-list token names no nodes,
/// e.g. the empty list, "n/a", or a pending reason such as "(Priority)"
///
pub fn is_sentinel(token: &str) -> bool {
    let token = token.trim();

    token.is_empty()
        || token.eq_ignore_ascii_case("n/a")
        || token == "(null)"
        || token.starts_with('(')
}

///
/// Return whether or not the passed token uses compressed hostlist
/// syntax, e.g. "gpu[01-04]" or "gpu01,gpu02"
///
pub fn is_compressed(token: &str) -> bool {
    token.contains('[') || token.contains(',')
}

///
/// Expands a compressed hostlist token into the individual node names,
/// in order. Implementations must not fail: a token that cannot be
/// expanded yields no nodes, and the failure is logged.
///
#[allow(async_fn_in_trait)]
pub trait NodeExpander {
    async fn expand(&self, token: &str) -> Vec<String>;
}

///
/// Expander used when no hostlist expansion is available. A plain
/// comma list such as "gpu01,gpu02" is split into its names, while a
/// token using bracket ranges is kept as a single literal node name.
///
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralExpander;

impl NodeExpander for LiteralExpander {
    async fn expand(&self, token: &str) -> Vec<String> {
        let token = token.trim();

        if token.contains('[') {
            return vec![token.to_string()];
        }

        token
            .split(',')
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(|name| name.to_string())
            .collect()
    }
}
