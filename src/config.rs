// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module contains the configuration options for the `Network`.

/// Default upper bound for node numbers in node-breaker voltage levels.
pub const DEFAULT_MAX_NODE_INDEX: usize = 1000;

/// Configuration options for the `Network`.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    /// Whether the working variant is tracked per thread.  When this is
    /// `false`, a single working variant is shared by every thread using the
    /// network.
    pub allow_variant_multi_thread_access: bool,

    /// The highest node number accepted in node-breaker voltage levels.
    pub max_node_index: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            allow_variant_multi_thread_access: false,
            max_node_index: DEFAULT_MAX_NODE_INDEX,
        }
    }
}
