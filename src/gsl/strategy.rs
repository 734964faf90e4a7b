//! 切换策略
//!
//! 三种策略统一通过 `SwitchStrategy::decide` 分派。决策分两遍：
//! 先让“保持当前挂接”的接口占用容量，再按策略给出的候选顺序为其余接口选星。

use std::collections::{BTreeMap, HashSet};

use super::capacity::CapacityLedger;
use super::geo_partition::{GeoCell, GeoPartitionMap};
use super::visibility::VisibilityTable;
use crate::geo::SatState;
use crate::net::{NodeId, NodeTable};
use crate::sim::SwitchStrategySpec;
use crate::topo::Constellation;
use tracing::trace;

#[derive(Debug, Clone, PartialEq)]
pub enum SwitchStrategy {
    /// 选择距离最近的可见卫星；距离相同取 id 较小者
    NearestDistance,
    /// 当前卫星不可见时才切换到最近的可见卫星
    InvisibilityTriggered,
    /// 按静态地理分区选择正经过本站分区的卫星
    GeographicPartition(GeoPartitionMap),
}

/// 一次决策所需的输入
pub struct HandoverContext<'a> {
    pub nodes: &'a NodeTable,
    pub visibility: &'a VisibilityTable,
    pub states: &'a [SatState],
    /// 以 InterfaceId 为下标的上一 tick 挂接
    pub previous: &'a [Option<NodeId>],
    pub capacity: usize,
}

impl SwitchStrategy {
    pub fn from_spec(spec: &SwitchStrategySpec, nodes: &NodeTable, shells: &[Constellation]) -> Self {
        match spec {
            SwitchStrategySpec::NearestDistance => SwitchStrategy::NearestDistance,
            SwitchStrategySpec::InvisibilityTriggered => SwitchStrategy::InvisibilityTriggered,
            SwitchStrategySpec::GeographicPartition {
                lat_bands,
                lon_sectors,
            } => {
                let first = shells.first();
                let bands = lat_bands
                    .or(first.map(|c| (c.sats_per_orbit / 2).max(1)))
                    .unwrap_or(1);
                let sectors = lon_sectors.or(first.map(|c| c.orbits)).unwrap_or(1);
                SwitchStrategy::GeographicPartition(GeoPartitionMap::new(nodes, bands, sectors))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SwitchStrategy::NearestDistance => "nearest_distance",
            SwitchStrategy::InvisibilityTriggered => "invisibility_triggered",
            SwitchStrategy::GeographicPartition(_) => "geographic_partition",
        }
    }

    /// 每个接口期望挂接的卫星（下标为 InterfaceId）
    pub fn decide(&self, ctx: &HandoverContext<'_>) -> Vec<Option<NodeId>> {
        let ifaces = ctx.nodes.interfaces();
        let mut desired = vec![None; ifaces.len()];
        let mut ledger = CapacityLedger::new(ctx.capacity);

        let occupancy = match self {
            SwitchStrategy::GeographicPartition(map) => Some(map.occupancy(ctx.states)),
            _ => None,
        };

        // 第一遍：保持
        for iface in ifaces {
            let Some(prev) = ctx.previous.get(iface.id.0).copied().flatten() else {
                continue;
            };
            if self.retains(iface.station, prev, ctx, occupancy.as_ref())
                && ledger.take(iface.station, prev)
            {
                desired[iface.id.0] = Some(prev);
            }
        }

        // 第二遍：选星
        for iface in ifaces {
            if desired[iface.id.0].is_some() {
                continue;
            }
            let ranked = self.ranked(iface.station, ctx, occupancy.as_ref());
            let choice = ranked.into_iter().find(|&s| ledger.take(iface.station, s));
            trace!(iface = %iface.id, station = %iface.station, choice = ?choice, "选星");
            desired[iface.id.0] = choice;
        }
        desired
    }

    fn retains(
        &self,
        station: NodeId,
        prev: NodeId,
        ctx: &HandoverContext<'_>,
        occupancy: Option<&BTreeMap<GeoCell, Vec<NodeId>>>,
    ) -> bool {
        match self {
            SwitchStrategy::NearestDistance => false,
            SwitchStrategy::InvisibilityTriggered => ctx.visibility.is_visible(station, prev),
            SwitchStrategy::GeographicPartition(map) => {
                ctx.visibility.is_visible(station, prev)
                    && Self::cell_members(map, station, occupancy).contains(&prev)
            }
        }
    }

    /// 候选卫星的优先顺序
    fn ranked(
        &self,
        station: NodeId,
        ctx: &HandoverContext<'_>,
        occupancy: Option<&BTreeMap<GeoCell, Vec<NodeId>>>,
    ) -> Vec<NodeId> {
        let visible = ctx.visibility.visible(station);
        match self {
            SwitchStrategy::NearestDistance | SwitchStrategy::InvisibilityTriggered => {
                visible.iter().map(|c| c.satellite).collect()
            }
            SwitchStrategy::GeographicPartition(map) => {
                // 先是正经过本站分区的可见卫星，再退回到其余可见卫星
                let members = Self::cell_members(map, station, occupancy);
                let (mut inside, outside): (Vec<_>, Vec<_>) = visible
                    .iter()
                    .map(|c| c.satellite)
                    .partition(|s| members.contains(s));
                inside.extend(outside);
                inside
            }
        }
    }

    fn cell_members(
        map: &GeoPartitionMap,
        station: NodeId,
        occupancy: Option<&BTreeMap<GeoCell, Vec<NodeId>>>,
    ) -> HashSet<NodeId> {
        let (Some(cells), Some(occ)) = (map.station_cells(station), occupancy) else {
            return HashSet::new();
        };
        cells
            .iter()
            .filter_map(|c| occ.get(c))
            .flatten()
            .copied()
            .collect()
    }
}
