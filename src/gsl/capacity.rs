//! 馈电链路容量账本

use std::collections::{HashMap, HashSet};

use crate::net::NodeId;

/// 每颗卫星至多服务 `capacity` 个地面接口；同一 (地面站, 卫星) 对只计一次，
/// 即同一地面站的两个接口不会挂到同一颗卫星。
#[derive(Debug, Clone)]
pub struct CapacityLedger {
    capacity: usize,
    load: HashMap<NodeId, usize>,
    pairs: HashSet<(NodeId, NodeId)>,
}

impl CapacityLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            load: HashMap::new(),
            pairs: HashSet::new(),
        }
    }

    pub fn load(&self, sat: NodeId) -> usize {
        self.load.get(&sat).copied().unwrap_or(0)
    }

    pub fn can_take(&self, station: NodeId, sat: NodeId) -> bool {
        self.load(sat) < self.capacity && !self.pairs.contains(&(station, sat))
    }

    /// 占用一个名额；已满或重复时返回 false 且不改变状态
    pub fn take(&mut self, station: NodeId, sat: NodeId) -> bool {
        if !self.can_take(station, sat) {
            return false;
        }
        self.pairs.insert((station, sat));
        *self.load.entry(sat).or_insert(0) += 1;
        true
    }
}
