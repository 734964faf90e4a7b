//! 分区归属
//!
//! 分布式模式下每个 worker 只持有本分区节点相关的活动链路对象，
//! 其余节点只保留只读影子副本。

use super::id::{NodeId, WorkerId};
use crate::partition::PartitionAssignment;

#[derive(Debug, Clone)]
pub struct Ownership {
    assignment: PartitionAssignment,
    /// None 表示单进程模式：所有节点都是本地的
    local: Option<WorkerId>,
}

impl Ownership {
    pub fn new(assignment: PartitionAssignment, local: Option<WorkerId>) -> Self {
        Self { assignment, local }
    }

    pub fn assignment(&self) -> &PartitionAssignment {
        &self.assignment
    }

    pub fn local_worker(&self) -> Option<WorkerId> {
        self.local
    }

    pub fn is_distributed(&self) -> bool {
        self.local.is_some()
    }

    pub fn owner(&self, node: NodeId) -> Option<WorkerId> {
        self.assignment.worker_of(node)
    }

    pub fn is_local(&self, node: NodeId) -> bool {
        match self.local {
            None => true,
            Some(w) => self.assignment.worker_of(node) == Some(w),
        }
    }

    /// 链路对象在本 worker 上实体化：至少一个端点属于本地
    pub fn owns_link(&self, a: NodeId, b: NodeId) -> bool {
        self.is_local(a) || self.is_local(b)
    }
}
