//! 切换引擎与差分算法

use super::strategy::{HandoverContext, SwitchStrategy};
use super::visibility::VisibilityTable;
use crate::error::{Result, TopoError};
use crate::geo::SatState;
use crate::net::{InterfaceId, NodeId, NodeTable};
use tracing::debug;

/// 挂接变化动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GslAction {
    Detach {
        iface: InterfaceId,
        station: NodeId,
        satellite: NodeId,
    },
    Attach {
        iface: InterfaceId,
        station: NodeId,
        satellite: NodeId,
    },
}

impl GslAction {
    pub fn iface(&self) -> InterfaceId {
        match self {
            GslAction::Detach { iface, .. } | GslAction::Attach { iface, .. } => *iface,
        }
    }

    pub fn satellite(&self) -> NodeId {
        match self {
            GslAction::Detach { satellite, .. } | GslAction::Attach { satellite, .. } => *satellite,
        }
    }
}

/// 比较上一 tick 与本 tick 的挂接，生成动作序列。
///
/// 所有 Detach 排在所有 Attach 之前（各自按接口 id 升序）：同一接口
/// `s1 → s2` 时一定先 `Detach(s1)` 再 `Attach(s2)`，且释放的容量与地址
/// 在同一 tick 内即可被其他接口复用。
pub fn diff(
    nodes: &NodeTable,
    previous: &[Option<NodeId>],
    desired: &[Option<NodeId>],
) -> Vec<GslAction> {
    let mut detaches = Vec::new();
    let mut attaches = Vec::new();
    for iface in nodes.interfaces() {
        let prev = previous.get(iface.id.0).copied().flatten();
        let next = desired.get(iface.id.0).copied().flatten();
        match (prev, next) {
            (None, None) => {}
            (None, Some(s)) => attaches.push(GslAction::Attach {
                iface: iface.id,
                station: iface.station,
                satellite: s,
            }),
            (Some(s), None) => detaches.push(GslAction::Detach {
                iface: iface.id,
                station: iface.station,
                satellite: s,
            }),
            (Some(s1), Some(s2)) if s1 == s2 => {}
            (Some(s1), Some(s2)) => {
                detaches.push(GslAction::Detach {
                    iface: iface.id,
                    station: iface.station,
                    satellite: s1,
                });
                attaches.push(GslAction::Attach {
                    iface: iface.id,
                    station: iface.station,
                    satellite: s2,
                });
            }
        }
    }
    detaches.extend(attaches);
    detaches
}

#[derive(Debug)]
pub struct GslHandoverEngine {
    strategy: SwitchStrategy,
    min_elevation_deg: f64,
    capacity: usize,
    /// 上一 tick 的全局挂接决策（下标为 InterfaceId）
    previous: Vec<Option<NodeId>>,
}

impl GslHandoverEngine {
    pub fn new(
        strategy: SwitchStrategy,
        min_elevation_deg: f64,
        capacity: usize,
        interfaces: usize,
    ) -> Self {
        Self {
            strategy,
            min_elevation_deg,
            capacity,
            previous: vec![None; interfaces],
        }
    }

    pub fn strategy(&self) -> &SwitchStrategy {
        &self.strategy
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn previous(&self) -> &[Option<NodeId>] {
        &self.previous
    }

    pub fn visibility(&self, nodes: &NodeTable, states: &[SatState]) -> VisibilityTable {
        VisibilityTable::compute(nodes, states, self.min_elevation_deg)
    }

    /// 按本 tick 几何计算期望挂接
    #[tracing::instrument(skip_all, fields(strategy = self.strategy.name()))]
    pub fn recompute(&self, nodes: &NodeTable, states: &[SatState]) -> Vec<Option<NodeId>> {
        let visibility = self.visibility(nodes, states);
        let ctx = HandoverContext {
            nodes,
            visibility: &visibility,
            states,
            previous: &self.previous,
            capacity: self.capacity,
        };
        self.strategy.decide(&ctx)
    }

    /// 接受新的期望挂接，返回相对上一 tick 的动作并推进状态
    pub fn plan(&mut self, nodes: &NodeTable, desired: Vec<Option<NodeId>>) -> Result<Vec<GslAction>> {
        if desired.len() != self.previous.len() {
            return Err(TopoError::invariant(format!(
                "handover snapshot has {} interfaces, expected {}",
                desired.len(),
                self.previous.len()
            )));
        }
        self.check_capacity(nodes, &desired)?;
        let actions = diff(nodes, &self.previous, &desired);
        debug!(actions = actions.len(), "切换差分");
        self.previous = desired;
        Ok(actions)
    }

    /// 每颗卫星同时挂接的接口数不超过容量，且同一地面站不重复计入同一卫星
    fn check_capacity(&self, nodes: &NodeTable, desired: &[Option<NodeId>]) -> Result<()> {
        let mut ledger = super::CapacityLedger::new(self.capacity);
        for iface in nodes.interfaces() {
            if let Some(sat) = desired.get(iface.id.0).copied().flatten() {
                if !ledger.take(iface.station, sat) {
                    return Err(TopoError::invariant(format!(
                        "satellite {sat} over capacity or doubly attached to station {} via {}",
                        iface.station, iface.id
                    )));
                }
            }
        }
        Ok(())
    }
}
