//! 挂接/拆除的副作用
//!
//! Attach：挂信道 → 分配地址 → 两端邻居缓存 → 通知 up → 打开历史区间。
//! Detach 以相反顺序执行：关闭区间 → 通知 down → 删缓存 → 释放地址 → 拆信道。

use super::handover::GslAction;
use crate::error::{Result, TopoError};
use crate::geo::{SatState, propagation_delay_s};
use crate::net::{
    AddressLifecycleManager, InterfaceId, LinkRegistry, NetEvent, NodeId, NodeTable, Ownership,
};
use crate::sim::SimTime;
use tracing::{debug, info};

pub struct ApplyContext<'a> {
    pub nodes: &'a NodeTable,
    pub registry: &'a mut LinkRegistry,
    pub addresses: &'a mut AddressLifecycleManager,
    pub ownership: &'a Ownership,
    pub states: &'a [SatState],
    pub events: &'a mut Vec<NetEvent>,
    pub now: SimTime,
}

impl ApplyContext<'_> {
    fn gsl_delay(&self, station: NodeId, sat: NodeId) -> Result<SimTime> {
        let gs = self
            .nodes
            .ground_position(station)
            .ok_or_else(|| TopoError::invariant(format!("{station} is not a ground station")))?;
        let s = self
            .states
            .get(sat.0)
            .ok_or_else(|| TopoError::invariant(format!("{sat} has no orbital state")))?;
        Ok(SimTime::from_secs_f64(propagation_delay_s(&gs, &s.position)))
    }

    fn attach(&mut self, iface: InterfaceId, station: NodeId, sat: NodeId) -> Result<()> {
        let delay = self.gsl_delay(station, sat)?;
        self.registry.attach_channel(iface, sat, delay, self.now)?;

        let addr = self.addresses.allocate(iface, sat)?;
        self.registry.bind_address(iface, Some(addr))?;

        let sat_addr = self.addresses.satellite_address(sat)?;
        self.registry.add_neighbor_pair(station, addr, sat, sat_addr)?;

        self.events.push(NetEvent::InterfaceUp {
            node: station,
            iface,
            peer: sat,
        });
        self.events.push(NetEvent::AddressChanged {
            iface,
            address: Some(addr),
        });

        self.registry.open_interval(iface, sat, self.now)?;
        debug!(%iface, station = %station, satellite = %sat, address = %addr, "🛰️  GSL 挂接");
        Ok(())
    }

    fn detach(&mut self, iface: InterfaceId, station: NodeId, sat: NodeId) -> Result<()> {
        match self.registry.close_interval(iface, self.now)? {
            Some(open) if open == sat => {}
            other => {
                return Err(TopoError::invariant(format!(
                    "{iface}: open history interval is {other:?}, detaching from {sat}"
                )));
            }
        }

        self.events.push(NetEvent::InterfaceDown {
            node: station,
            iface,
            peer: sat,
        });

        self.registry.remove_neighbor_pair(station, sat);

        if self.addresses.release(iface).is_none() {
            return Err(TopoError::invariant(format!(
                "{iface} detached from {sat} without a bound address"
            )));
        }
        self.registry.bind_address(iface, None)?;
        self.events.push(NetEvent::AddressChanged {
            iface,
            address: None,
        });

        self.registry.detach_channel(iface, sat)?;
        debug!(%iface, station = %station, satellite = %sat, "GSL 拆除");
        Ok(())
    }
}

/// 执行动作序列；只处理地面站属于本 worker 的接口，返回实际执行的动作。
pub fn apply_actions(actions: &[GslAction], ctx: &mut ApplyContext<'_>) -> Result<Vec<GslAction>> {
    let mut applied = Vec::with_capacity(actions.len());
    for action in actions {
        match *action {
            GslAction::Detach {
                iface,
                station,
                satellite,
            } => {
                if !ctx.ownership.is_local(station) {
                    continue;
                }
                ctx.detach(iface, station, satellite)?;
            }
            GslAction::Attach {
                iface,
                station,
                satellite,
            } => {
                if !ctx.ownership.is_local(station) {
                    continue;
                }
                ctx.attach(iface, station, satellite)?;
            }
        }
        applied.push(*action);
    }
    if !applied.is_empty() {
        info!(now = ?ctx.now, applied = applied.len(), "🔁 GSL 切换已执行");
    }
    Ok(applied)
}
