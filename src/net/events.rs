//! 面向上层的拓扑通知
//!
//! 引擎在 tick 内只把通知压入出站队列；编排器在 tick 末尾、不变量校验通过后
//! 再统一分发给路由/应用等观察者。

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use super::id::{InterfaceId, LinkId, NodeId};
use super::snapshot::TopologySnapshot;
use crate::sim::SimTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetEvent {
    /// 地面接口 up（已挂接到 `peer`）
    InterfaceUp {
        node: NodeId,
        iface: InterfaceId,
        peer: NodeId,
    },
    InterfaceDown {
        node: NodeId,
        iface: InterfaceId,
        peer: NodeId,
    },
    AddressChanged {
        iface: InterfaceId,
        address: Option<Ipv4Addr>,
    },
    IslUp {
        link: LinkId,
        a: NodeId,
        b: NodeId,
    },
    IslDown {
        link: LinkId,
        a: NodeId,
        b: NodeId,
    },
}

/// 拓扑观察者（路由协议、应用等外部协作者）
pub trait TopologyObserver {
    fn on_event(&mut self, now: SimTime, ev: &NetEvent);
    fn on_snapshot(&mut self, _snapshot: &TopologySnapshot) {}
}

/// 记录所有通知的观察者，便于测试与离线分析
#[derive(Debug, Default, Clone)]
pub struct EventRecorder {
    pub events: Vec<(SimTime, NetEvent)>,
    pub snapshots: usize,
}

impl TopologyObserver for EventRecorder {
    fn on_event(&mut self, now: SimTime, ev: &NetEvent) {
        self.events.push((now, ev.clone()));
    }

    fn on_snapshot(&mut self, _snapshot: &TopologySnapshot) {
        self.snapshots += 1;
    }
}

/// 共享句柄：编排器持有一份，调用方保留另一份读取结果
impl<T: TopologyObserver> TopologyObserver for Arc<Mutex<T>> {
    fn on_event(&mut self, now: SimTime, ev: &NetEvent) {
        if let Ok(mut inner) = self.lock() {
            inner.on_event(now, ev);
        }
    }

    fn on_snapshot(&mut self, snapshot: &TopologySnapshot) {
        if let Ok(mut inner) = self.lock() {
            inner.on_snapshot(snapshot);
        }
    }
}
