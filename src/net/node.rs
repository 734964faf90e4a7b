//! 节点类型
//!
//! 卫星与地面站节点，以及地面站接口槽位。节点在启动时一次性创建，之后不再销毁。

use super::id::{InterfaceId, NodeId, WorkerId};
use crate::error::{Result, TopoError};
use crate::geo::{Vec3, geodetic_to_ecef};
use crate::partition::PartitionAssignment;
use crate::sim::ScenarioSpec;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Satellite { shell: usize },
    GroundStation,
}

/// 网络节点
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
    /// 分区编号；`apply_partition` 之前为 None
    pub partition: Option<WorkerId>,
    /// 地面站的接口槽位（卫星为空：卫星的对地接口由 GSL 信道隐式表示）
    pub interfaces: Vec<InterfaceId>,
}

impl Node {
    pub fn is_satellite(&self) -> bool {
        matches!(self.kind, NodeKind::Satellite { .. })
    }
}

/// 地面站接口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundInterface {
    pub id: InterfaceId,
    pub station: NodeId,
    /// 接口在所属地面站内的序号
    pub slot: usize,
}

/// 节点表：按 NodeId 下标存放所有节点
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    nodes: Vec<Node>,
    interfaces: Vec<GroundInterface>,
    ground_positions: Vec<Vec3>,
    satellite_count: usize,
    partitioned: bool,
}

impl NodeTable {
    /// 按场景创建节点：先所有壳层的卫星，再地面站
    pub fn from_scenario(spec: &ScenarioSpec) -> Self {
        let mut table = NodeTable::default();
        for (shell_idx, shell) in spec.shells.iter().enumerate() {
            let shell_name = shell
                .name
                .clone()
                .unwrap_or_else(|| format!("shell{shell_idx}"));
            for i in 0..shell.satellite_count() {
                let id = NodeId(table.nodes.len());
                table.nodes.push(Node {
                    id,
                    kind: NodeKind::Satellite { shell: shell_idx },
                    name: format!("{shell_name}-sat{i}"),
                    partition: None,
                    interfaces: Vec::new(),
                });
            }
        }
        table.satellite_count = table.nodes.len();

        for (gs_idx, gs) in spec.ground_stations.iter().enumerate() {
            table.add_ground_station(
                gs.name.clone().unwrap_or_else(|| format!("gs{gs_idx}")),
                geodetic_to_ecef(gs.latitude_deg, gs.longitude_deg, 0.0),
                gs.interfaces,
            );
        }
        debug!(
            satellites = table.satellite_count,
            ground_stations = table.ground_station_count(),
            interfaces = table.interfaces.len(),
            "节点表已创建"
        );
        table
    }

    /// 仅含卫星的节点表（测试与脚本化场景使用）
    pub fn with_satellites(count: usize) -> Self {
        let mut table = NodeTable::default();
        for i in 0..count {
            table.nodes.push(Node {
                id: NodeId(i),
                kind: NodeKind::Satellite { shell: 0 },
                name: format!("sat{i}"),
                partition: None,
                interfaces: Vec::new(),
            });
        }
        table.satellite_count = count;
        table
    }

    /// 追加一个地面站；必须在所有卫星之后调用
    pub fn add_ground_station(
        &mut self,
        name: impl Into<String>,
        position: Vec3,
        interfaces: usize,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut slots = Vec::with_capacity(interfaces);
        for slot in 0..interfaces {
            let iface = InterfaceId(self.interfaces.len());
            self.interfaces.push(GroundInterface {
                id: iface,
                station: id,
                slot,
            });
            slots.push(iface);
        }
        self.nodes.push(Node {
            id,
            kind: NodeKind::GroundStation,
            name: name.into(),
            partition: None,
            interfaces: slots,
        });
        self.ground_positions.push(position);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn satellite_count(&self) -> usize {
        self.satellite_count
    }

    pub fn ground_station_count(&self) -> usize {
        self.nodes.len() - self.satellite_count
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn is_satellite(&self, id: NodeId) -> bool {
        id.0 < self.satellite_count
    }

    pub fn satellites(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.satellite_count).map(NodeId)
    }

    pub fn ground_stations(&self) -> impl Iterator<Item = NodeId> + '_ {
        (self.satellite_count..self.nodes.len()).map(NodeId)
    }

    pub fn interfaces(&self) -> &[GroundInterface] {
        &self.interfaces
    }

    pub fn interface(&self, id: InterfaceId) -> Option<&GroundInterface> {
        self.interfaces.get(id.0)
    }

    /// 地面站位置（ECEF）
    pub fn ground_position(&self, gs: NodeId) -> Option<Vec3> {
        gs.0.checked_sub(self.satellite_count)
            .and_then(|i| self.ground_positions.get(i).copied())
    }

    pub fn partition_of(&self, id: NodeId) -> Option<WorkerId> {
        self.get(id).and_then(|n| n.partition)
    }

    /// 写入分区结果。只允许调用一次，之后分区不可变。
    pub fn apply_partition(&mut self, assignment: &PartitionAssignment) -> Result<()> {
        if self.partitioned {
            return Err(TopoError::invariant("partition assignment applied twice"));
        }
        if assignment.len() != self.nodes.len() {
            return Err(TopoError::invariant(format!(
                "partition covers {} nodes, node table has {}",
                assignment.len(),
                self.nodes.len()
            )));
        }
        for node in &mut self.nodes {
            node.partition = assignment.worker_of(node.id);
        }
        self.partitioned = true;
        Ok(())
    }
}
