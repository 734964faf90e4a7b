//! 星地链路切换引擎
//!
//! 每个 tick 按可插拔策略重新计算每个地面接口期望挂接的卫星，与上一 tick
//! 比较得到 Detach/Attach 动作，再由编排器按固定顺序执行副作用。

mod apply;
mod capacity;
mod geo_partition;
mod handover;
mod strategy;
mod visibility;

pub use apply::{ApplyContext, apply_actions};
pub use capacity::CapacityLedger;
pub use geo_partition::{GeoCell, GeoPartitionMap};
pub use handover::{GslAction, GslHandoverEngine, diff};
pub use strategy::{HandoverContext, SwitchStrategy};
pub use visibility::{Candidate, VisibilityTable};
