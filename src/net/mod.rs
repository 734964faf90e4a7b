//! 网络拓扑状态模块
//!
//! 此模块包含节点、链路记录、链路注册表、地址生命周期与面向上层的通知。

// 子模块声明
mod address;
mod events;
mod id;
mod link;
mod node;
mod ownership;
mod record;
mod registry;
mod snapshot;
mod transport;

// 重新导出公共接口
pub use address::{AddressLifecycleManager, AddressingPolicy};
pub use events::{EventRecorder, NetEvent, TopologyObserver};
pub use id::{InterfaceId, LinkId, NodeId, WorkerId};
pub use link::{
    GslChannel, IslChannel, IslLink, LinkTransition, OutageCause, OutageCauses, OutageInterval,
    OutageRecord,
};
pub use node::{GroundInterface, Node, NodeKind, NodeTable};
pub use ownership::Ownership;
pub use record::{AttachInterval, GslInterfaceRecord};
pub use registry::LinkRegistry;
pub use snapshot::TopologySnapshot;
pub use transport::{LoopbackTransport, ShadowUpdate, WorkerTransport};
