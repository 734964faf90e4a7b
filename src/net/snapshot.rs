//! 只读拓扑快照

use std::collections::BTreeMap;

use super::id::{InterfaceId, NodeId};
use crate::sim::SimTime;
use serde::Serialize;

/// 每个 tick 结束时发布的拓扑快照
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopologySnapshot {
    pub time: SimTime,
    pub adjacency: BTreeMap<NodeId, Vec<NodeId>>,
    pub gsl_attachments: BTreeMap<InterfaceId, Option<NodeId>>,
}

impl TopologySnapshot {
    pub fn neighbors(&self, node: NodeId) -> &[NodeId] {
        self.adjacency.get(&node).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn attached(&self, iface: InterfaceId) -> Option<NodeId> {
        self.gsl_attachments.get(&iface).copied().flatten()
    }
}
