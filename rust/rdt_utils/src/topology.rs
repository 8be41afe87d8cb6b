// Copyright (c) Meta Platforms, Inc. and affiliates.

// This software may be used and distributed according to the terms of the
// GNU General Public License version 2.

//! # System Topology Grid
//!
//! The backend describes the host as a flat list of logical cores, each
//! tagged with its socket, L2 cache ID and (optionally) L3 cache ID. For
//! display the cores are grouped hierarchically:
//!
//!```text
//!                 SystemTopology
//!                       |
//!          o------------o------------o
//!          |                         |
//!     Node (socket 0)   ...     Node (socket N)
//!     L3 IDs  [0]
//!     L2 IDs  [0, 1, 2, ...]
//!     Cores   <lcore, L2ID, L3ID, SST-BF HP>
//!```
//!
//! Nodes, L2 IDs and L3 IDs keep the order in which the backend first lists
//! them. Each L2 ID is one cell of the node's grid.

use crate::caps::Sstbf;
use log::debug;
use serde::Deserialize;
use serde::Serialize;

/// Grid columns used unless the L2 ID count calls for something else.
pub const DEFAULT_COLS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub level: u32,
    pub num_ways: usize,
    pub num_sets: u64,
    pub num_partitions: u32,
    pub line_size: u32,
    pub total_size: u64,
    pub way_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreInfo {
    pub socket: usize,
    pub lcore: usize,
    #[serde(rename = "L2ID")]
    pub l2_id: usize,
    #[serde(rename = "L3ID", default, skip_serializing_if = "Option::is_none")]
    pub l3_id: Option<usize>,
}

/// `GET /caps/system_topology`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTopology {
    pub vendor: String,
    pub cache: Vec<CacheInfo>,
    pub core: Vec<CoreInfo>,
}

impl SystemTopology {
    /// Get the description of the cache at `level`, if reported.
    pub fn cache(&self, level: u32) -> Option<&CacheInfo> {
        self.cache.iter().find(|cache| cache.level == level)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Core {
    info: CoreInfo,
    sstbf_hp: bool,
}

impl Core {
    /// Get the logical core ID
    pub fn lcore(&self) -> usize {
        self.info.lcore
    }

    /// Get the ID of the L2 cache this core sits on
    pub fn l2_id(&self) -> usize {
        self.info.l2_id
    }

    /// Get the ID of the L3 cache this core sits on, if known
    pub fn l3_id(&self) -> Option<usize> {
        self.info.l3_id
    }

    /// Is this a SST-BF high priority core?
    pub fn sstbf_hp(&self) -> bool {
        self.sstbf_hp
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: usize,
    cores: Vec<Core>,
    l2_ids: Vec<usize>,
    l3_ids: Vec<usize>,
}

impl Node {
    /// Get the ID of this node (the socket ID)
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get the cores of this node in backend order
    pub fn cores(&self) -> &[Core] {
        &self.cores
    }

    /// Get the distinct L2 cache IDs of this node
    pub fn l2_ids(&self) -> &[usize] {
        &self.l2_ids
    }

    /// Get the distinct L3 cache IDs of this node
    pub fn l3_ids(&self) -> &[usize] {
        &self.l3_ids
    }

    /// Get the cores sharing the L2 cache `l2_id`
    pub fn l2_cores(&self, l2_id: usize) -> impl Iterator<Item = &Core> {
        self.cores.iter().filter(move |core| core.l2_id() == l2_id)
    }

    /// Number of grid columns that leaves no row partially filled.
    ///
    /// A single row is used when there are fewer L2 IDs than columns. With
    /// one thread per core the column limit doubles.
    pub fn num_cols(&self) -> usize {
        let nr_l2 = self.l2_ids.len();
        let mut max_cols = DEFAULT_COLS;

        if nr_l2 == self.cores.len() {
            max_cols *= 2;
        }

        if nr_l2 < max_cols {
            return nr_l2;
        }

        (1..=max_cols)
            .rev()
            .find(|cols| nr_l2 % cols == 0)
            .unwrap_or(DEFAULT_COLS)
    }
}

fn push_unique(ids: &mut Vec<usize>, id: usize) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

/// Group the cores of `topology` into nodes. When `sstbf` is configured, its
/// high priority cores are flagged.
pub fn group_nodes(topology: &SystemTopology, sstbf: Option<&Sstbf>) -> Vec<Node> {
    let hp_cores: &[usize] = match sstbf {
        Some(sstbf) if sstbf.configured => &sstbf.hp_cores,
        _ => &[],
    };

    let mut nodes: Vec<Node> = Vec::new();
    for info in topology.core.iter() {
        let idx = match nodes.iter().position(|node| node.id == info.socket) {
            Some(idx) => idx,
            None => {
                nodes.push(Node {
                    id: info.socket,
                    cores: Vec::new(),
                    l2_ids: Vec::new(),
                    l3_ids: Vec::new(),
                });
                nodes.len() - 1
            }
        };
        let node = &mut nodes[idx];

        push_unique(&mut node.l2_ids, info.l2_id);
        if let Some(l3_id) = info.l3_id {
            push_unique(&mut node.l3_ids, l3_id);
        }

        node.cores.push(Core {
            info: info.clone(),
            sstbf_hp: hp_cores.contains(&info.lcore),
        });
    }

    debug!(
        "grouped {} cores into {} nodes",
        topology.core.len(),
        nodes.len()
    );
    nodes
}
