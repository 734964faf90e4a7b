//! 地面接口记录
//!
//! 每个地面接口当前挂接的卫星、绑定的地址，以及只追加的挂接历史。

use super::id::{InterfaceId, NodeId};
use super::link::GslChannel;
use crate::sim::SimTime;
use serde::Serialize;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttachInterval {
    pub satellite: NodeId,
    pub connect_ns: u64,
    /// None 表示区间一直开放到仿真结束
    pub disconnect_ns: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct GslInterfaceRecord {
    pub iface: InterfaceId,
    pub station: NodeId,
    pub(crate) channel: Option<GslChannel>,
    pub(crate) address: Option<Ipv4Addr>,
    pub(crate) history: Vec<AttachInterval>,
}

impl GslInterfaceRecord {
    pub fn new(iface: InterfaceId, station: NodeId) -> Self {
        Self {
            iface,
            station,
            channel: None,
            address: None,
            history: Vec::new(),
        }
    }

    /// 当前挂接的卫星：GSL up 当且仅当为 Some
    pub fn attached_satellite(&self) -> Option<NodeId> {
        self.channel.as_ref().map(|c| c.satellite)
    }

    pub fn channel(&self) -> Option<&GslChannel> {
        self.channel.as_ref()
    }

    pub fn address(&self) -> Option<Ipv4Addr> {
        self.address
    }

    pub fn history(&self) -> &[AttachInterval] {
        &self.history
    }

    pub(crate) fn open_interval(&mut self, satellite: NodeId, now: SimTime) {
        self.history.push(AttachInterval {
            satellite,
            connect_ns: now.0,
            disconnect_ns: None,
        });
    }

    /// 关闭最后一个开放区间；返回被关闭区间的卫星
    pub(crate) fn close_interval(&mut self, now: SimTime) -> Option<NodeId> {
        let last = self.history.last_mut()?;
        if last.disconnect_ns.is_some() {
            return None;
        }
        last.disconnect_ns = Some(now.0);
        Some(last.satellite)
    }
}
