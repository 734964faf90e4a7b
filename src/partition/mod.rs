//! 节点分区
//!
//! 仿真开始前把每颗卫星与每个地面站映射到 K 个 worker 之一。结果在 tick 0
//! 之前计算一次，此后不可变。所有策略要么给出完整分区，要么直接失败。

mod even;
mod explicit;
mod grid;
mod merge;

use std::path::Path;

use crate::error::{Result, TopoError};
use crate::net::{NodeId, WorkerId};
use crate::sim::PartitionSpec;
use crate::topo::{ContactEntry, read_coalition_file, read_contact_log};
use serde::Serialize;
use tracing::{debug, info};

pub use even::split_in_order;

/// 分区结果：每个节点一个 worker id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionAssignment {
    workers: usize,
    owner: Vec<usize>,
}

impl PartitionAssignment {
    /// 校验并构造：长度即节点数，每个值都必须 `< workers`
    pub fn new(owner: Vec<usize>, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(TopoError::Config("worker count must be > 0".into()));
        }
        if let Some((node, w)) = owner.iter().enumerate().find(|(_, w)| **w >= workers) {
            return Err(TopoError::invariant(format!(
                "node {node} assigned to worker {w}, only {workers} workers exist"
            )));
        }
        Ok(Self { workers, owner })
    }

    /// 单 worker：全部节点归 worker 0
    pub fn single(node_count: usize) -> Self {
        Self {
            workers: 1,
            owner: vec![0; node_count],
        }
    }

    pub fn len(&self) -> usize {
        self.owner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owner.is_empty()
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn worker_of(&self, node: NodeId) -> Option<WorkerId> {
        self.owner.get(node.0).map(|w| WorkerId(*w))
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.owner
    }

    pub fn members(&self, worker: WorkerId) -> Vec<NodeId> {
        self.owner
            .iter()
            .enumerate()
            .filter(|(_, w)| **w == worker.0)
            .map(|(n, _)| NodeId(n))
            .collect()
    }

    /// 每个 worker 的节点数
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.workers];
        for &w in &self.owner {
            sizes[w] += 1;
        }
        sizes
    }
}

/// 壳层的网格形状（供 GridAware 使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellGrid {
    pub first: NodeId,
    pub orbits: usize,
    pub sats_per_orbit: usize,
}

/// 分区所需的拓扑提示
#[derive(Debug, Clone, Default)]
pub struct TopologyHint {
    /// 卫星数；卫星占 `[0, satellites)`，其余为地面站
    pub satellites: usize,
    pub shells: Vec<ShellGrid>,
    /// 预先计算的接触日志
    pub contacts: Vec<ContactEntry>,
    /// 参与合并的接触记录时间上限（含）
    pub merge_horizon_ms: u64,
}

/// 分区策略（互斥）
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionStrategy {
    EvenInOrder,
    GridAware,
    HandoverDecoupled,
    /// 外层下标为 worker id，内层为节点 id
    Explicit(Vec<Vec<usize>>),
}

impl PartitionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            PartitionStrategy::EvenInOrder => "even_in_order",
            PartitionStrategy::GridAware => "grid_aware",
            PartitionStrategy::HandoverDecoupled => "handover_decoupled",
            PartitionStrategy::Explicit(_) => "explicit",
        }
    }
}

/// 由配置加载策略与外部文件（接触日志、联盟文件）。
///
/// `contact_override` / `coalition_override` 来自命令行，优先于配置。
pub fn plan_from_spec(
    spec: &PartitionSpec,
    satellites: usize,
    shells: Vec<ShellGrid>,
    contact_override: Option<&Path>,
    coalition_override: Option<&Path>,
) -> Result<(PartitionStrategy, TopologyHint)> {
    let mut hint = TopologyHint {
        satellites,
        shells,
        ..Default::default()
    };
    let strategy = match spec {
        PartitionSpec::EvenInOrder {
            contact_log,
            merge_horizon_ms,
            ..
        }
        | PartitionSpec::GridAware {
            contact_log,
            merge_horizon_ms,
            ..
        } => {
            if let Some(path) = contact_override.or(contact_log.as_deref()) {
                hint.contacts = read_contact_log(path)?;
            }
            hint.merge_horizon_ms = *merge_horizon_ms;
            if matches!(spec, PartitionSpec::GridAware { .. }) {
                PartitionStrategy::GridAware
            } else {
                PartitionStrategy::EvenInOrder
            }
        }
        PartitionSpec::HandoverDecoupled { .. } => PartitionStrategy::HandoverDecoupled,
        PartitionSpec::Explicit { coalition, .. } => {
            let path = coalition_override.unwrap_or(coalition);
            PartitionStrategy::Explicit(read_coalition_file(path)?)
        }
    };
    Ok((strategy, hint))
}

/// 计算分区。
#[tracing::instrument(skip(strategy, hint), fields(strategy = strategy.name()))]
pub fn assign(
    strategy: &PartitionStrategy,
    node_count: usize,
    worker_count: usize,
    hint: &TopologyHint,
) -> Result<PartitionAssignment> {
    if worker_count == 0 {
        return Err(TopoError::Config("worker count must be > 0".into()));
    }
    if hint.satellites > node_count {
        return Err(TopoError::Config(format!(
            "topology hint has {} satellites but only {node_count} nodes",
            hint.satellites
        )));
    }

    let owner = match strategy {
        PartitionStrategy::EvenInOrder => {
            let mut owner = split_in_order(hint.satellites, worker_count)?;
            owner.resize(node_count, merge::UNASSIGNED);
            merge::merge_ground_stations(&mut owner, hint, worker_count)?;
            owner
        }
        PartitionStrategy::GridAware => {
            let mut owner = grid::grid_partition(hint, worker_count)?;
            owner.resize(node_count, merge::UNASSIGNED);
            merge::merge_ground_stations(&mut owner, hint, worker_count)?;
            owner
        }
        PartitionStrategy::HandoverDecoupled => {
            if worker_count < 2 {
                return Err(TopoError::Config(
                    "handover_decoupled needs at least 2 workers (one reserved for ground stations)"
                        .into(),
                ));
            }
            let ground_worker = worker_count - 1;
            let mut owner = split_in_order(hint.satellites, ground_worker)?;
            owner.resize(node_count, ground_worker);
            owner
        }
        PartitionStrategy::Explicit(coalition) => {
            explicit::from_coalition(coalition, node_count, worker_count)?
        }
    };

    let assignment = PartitionAssignment::new(owner, worker_count)?;
    if assignment.len() != node_count {
        return Err(TopoError::invariant(format!(
            "partition has {} entries for {node_count} nodes",
            assignment.len()
        )));
    }
    debug!(sizes = ?assignment.sizes(), "分区大小");
    info!(nodes = node_count, workers = worker_count, "🧩 分区完成");
    Ok(assignment)
}
