//! Worker 间消息传递
//!
//! 跨 worker 的传输本身在拓扑引擎之外，这里只定义收发原语与一个进程内实现。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::id::{InterfaceId, NodeId, WorkerId};
use crate::error::{Result, TopoError};
use crate::sim::SimTime;
use serde::{Deserialize, Serialize};

/// 跨分区的 GSL 挂接变化：接口所在 worker 通知卫星所在 worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowUpdate {
    pub time: SimTime,
    pub from: WorkerId,
    pub iface: InterfaceId,
    pub station: NodeId,
    pub satellite: NodeId,
    pub attached: bool,
}

/// 收发原语。消息丢失会让影子状态与卫星所属 worker 分叉，失败必须上报。
pub trait WorkerTransport: Send {
    fn send(&mut self, to: WorkerId, msg: ShadowUpdate) -> Result<()>;
    /// 取出发往 `me` 的全部消息
    fn drain(&mut self, me: WorkerId) -> Result<Vec<ShadowUpdate>>;
}

/// 进程内回环实现：按目的 worker 排队
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    queues: HashMap<WorkerId, VecDeque<ShadowUpdate>>,
    sent: u64,
}

impl LoopbackTransport {
    pub fn sent(&self) -> u64 {
        self.sent
    }
}

impl WorkerTransport for LoopbackTransport {
    fn send(&mut self, to: WorkerId, msg: ShadowUpdate) -> Result<()> {
        self.sent += 1;
        self.queues.entry(to).or_default().push_back(msg);
        Ok(())
    }

    fn drain(&mut self, me: WorkerId) -> Result<Vec<ShadowUpdate>> {
        Ok(self
            .queues
            .get_mut(&me)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default())
    }
}

/// 多个 worker 在同一进程内共享一个传输
impl<T: WorkerTransport> WorkerTransport for Arc<Mutex<T>> {
    fn send(&mut self, to: WorkerId, msg: ShadowUpdate) -> Result<()> {
        let Ok(mut inner) = self.lock() else {
            return Err(TopoError::invariant(format!(
                "worker transport lock poisoned, {} update for {to} lost",
                msg.iface
            )));
        };
        inner.send(to, msg)
    }

    fn drain(&mut self, me: WorkerId) -> Result<Vec<ShadowUpdate>> {
        let Ok(mut inner) = self.lock() else {
            return Err(TopoError::invariant(format!(
                "worker transport lock poisoned, updates for {me} unreadable"
            )));
        };
        inner.drain(me)
    }
}
